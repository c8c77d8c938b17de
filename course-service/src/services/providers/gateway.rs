//! Name-based dispatch onto the concrete provider clients.

use super::claude::ClaudeProvider;
use super::classifier::classify_error;
use super::gemini::GeminiProvider;
use super::openai::OpenAiCompatibleProvider;
use super::{CallOutcome, ContentGenerator, ProviderError, ProviderKind, TextProvider};
use crate::config::ProvidersConfig;
use crate::services::metrics::PROVIDER_CALL_DURATION;
use async_trait::async_trait;
use reqwest::Client;

/// Builds a fresh provider client from the raw key on every call.
///
/// The underlying connection pool is shared; no key outlives the call it was
/// passed to.
#[derive(Clone)]
pub struct ProviderGateway {
    client: Client,
    config: ProvidersConfig,
}

impl ProviderGateway {
    pub fn new(config: ProvidersConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ProviderError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn provider_for(&self, kind: ProviderKind, api_key: &str) -> Box<dyn TextProvider> {
        let client = self.client.clone();
        match kind {
            ProviderKind::Gemini => Box::new(GeminiProvider::new(
                client,
                self.config.gemini.clone(),
                api_key,
            )),
            ProviderKind::Claude => Box::new(ClaudeProvider::new(
                client,
                self.config.claude.clone(),
                api_key,
            )),
            ProviderKind::OpenAi => Box::new(OpenAiCompatibleProvider::new(
                client,
                self.config.openai.clone(),
                api_key,
            )),
            ProviderKind::DeepSeek => Box::new(OpenAiCompatibleProvider::new(
                client,
                self.config.deepseek.clone(),
                api_key,
            )),
        }
    }
}

#[async_trait]
impl ContentGenerator for ProviderGateway {
    async fn call(&self, provider: &str, api_key: &str, prompt: &str) -> CallOutcome {
        let kind = match provider.parse::<ProviderKind>() {
            Ok(kind) => kind,
            Err(unsupported) => {
                tracing::warn!(provider = %provider, "Unsupported provider requested");
                return CallOutcome::failed(provider, unsupported.to_string());
            }
        };

        let timer = PROVIDER_CALL_DURATION
            .with_label_values(&[kind.name()])
            .start_timer();
        let result = self.provider_for(kind, api_key).generate(prompt).await;
        timer.observe_duration();

        match result {
            Ok(text) if text.trim().is_empty() => {
                tracing::warn!(provider = %kind, "Provider returned an empty response");
                CallOutcome::failed(
                    kind.name(),
                    format!("El modelo {} no devolvió respuesta.", kind),
                )
            }
            Ok(text) => CallOutcome::Generated(text),
            Err(error) => {
                tracing::warn!(provider = %kind, error = %error, "Provider call failed");
                CallOutcome::failed(kind.name(), classify_error(&error))
            }
        }
    }

    async fn verify(&self, provider: &str, api_key: &str) -> bool {
        let Ok(kind) = provider.parse::<ProviderKind>() else {
            return false;
        };

        match self.provider_for(kind, api_key).verify().await {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(provider = %kind, error = %error, "API key verification failed");
                false
            }
        }
    }
}
