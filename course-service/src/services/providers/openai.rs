//! OpenAI-compatible chat completions provider.
//!
//! DeepSeek exposes the same wire shape, so both providers use this client
//! with different base URLs and models.

use super::{ProviderError, TextProvider};
use crate::config::ProviderSettings;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};

pub struct OpenAiCompatibleProvider {
    client: Client,
    settings: ProviderSettings,
    api_key: Secret<String>,
}

impl OpenAiCompatibleProvider {
    pub fn new(client: Client, settings: ProviderSettings, api_key: &str) -> Self {
        Self {
            client,
            settings,
            api_key: Secret::new(api_key.to_string()),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.settings.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl TextProvider for OpenAiCompatibleProvider {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let request = ChatCompletionRequest {
            model: &self.settings.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        tracing::debug!(
            model = %self.settings.model,
            base_url = %self.settings.base_url,
            prompt_len = prompt.len(),
            "Sending chat completion request"
        );

        let response = self
            .client
            .post(self.endpoint("chat/completions"))
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::from_response(response).await);
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        Ok(completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default())
    }

    async fn verify(&self) -> Result<(), ProviderError> {
        let response = self
            .client
            .get(self.endpoint("models"))
            .bearer_auth(self.api_key.expose_secret())
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ProviderError::from_response(response).await)
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}
