//! Anthropic Messages API provider.

use super::{ProviderError, TextProvider};
use crate::config::ProviderSettings;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 2048;
const VERIFY_MAX_TOKENS: u32 = 10;

pub struct ClaudeProvider {
    client: Client,
    settings: ProviderSettings,
    api_key: Secret<String>,
}

impl ClaudeProvider {
    pub fn new(client: Client, settings: ProviderSettings, api_key: &str) -> Self {
        Self {
            client,
            settings,
            api_key: Secret::new(api_key.to_string()),
        }
    }

    fn messages_endpoint(&self) -> String {
        format!("{}/v1/messages", self.settings.base_url.trim_end_matches('/'))
    }

    async fn send(&self, content: &str, max_tokens: u32) -> Result<MessagesResponse, ProviderError> {
        let request = MessagesRequest {
            model: &self.settings.model,
            max_tokens,
            messages: vec![Message {
                role: "user",
                content,
            }],
        };

        let response = self
            .client
            .post(self.messages_endpoint())
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::from_response(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl TextProvider for ClaudeProvider {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        tracing::debug!(
            model = %self.settings.model,
            prompt_len = prompt.len(),
            "Sending request to Anthropic API"
        );

        let response = self.send(prompt, MAX_TOKENS).await?;

        Ok(response
            .content
            .into_iter()
            .find(|block| block.block_type == "text")
            .and_then(|block| block.text)
            .unwrap_or_default())
    }

    async fn verify(&self) -> Result<(), ProviderError> {
        self.send("hello", VERIFY_MAX_TOKENS).await.map(|_| ())
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}
