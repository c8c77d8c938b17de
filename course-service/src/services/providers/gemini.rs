//! Gemini AI provider implementation.
//!
//! Text generation through Google's `generateContent` endpoint; keys are
//! verified with the free `countTokens` call.

use super::{ProviderError, TextProvider};
use crate::config::ProviderSettings;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini text provider bound to one API key.
pub struct GeminiProvider {
    client: Client,
    settings: ProviderSettings,
    api_key: Secret<String>,
}

impl GeminiProvider {
    pub fn new(client: Client, settings: ProviderSettings, api_key: &str) -> Self {
        Self {
            client,
            settings,
            api_key: Secret::new(api_key.to_string()),
        }
    }

    /// Build the API URL for the configured model and method. The key travels
    /// in a header so it never shows up in URLs or transport errors.
    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/models/{}:{}",
            self.settings.base_url.trim_end_matches('/'),
            self.settings.model,
            method
        )
    }

    fn user_turn(text: &str) -> Vec<Content> {
        vec![Content {
            role: Some("user".to_string()),
            parts: vec![ContentPart {
                text: Some(text.to_string()),
            }],
        }]
    }
}

#[async_trait]
impl TextProvider for GeminiProvider {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let request = GenerateContentRequest {
            contents: Self::user_turn(prompt),
        };

        tracing::debug!(
            model = %self.settings.model,
            prompt_len = prompt.len(),
            "Sending request to Gemini API"
        );

        let response = self
            .client
            .post(self.api_url("generateContent"))
            .header(API_KEY_HEADER, self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::from_response(response).await);
        }

        let api_response: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        if let Some(reason) = api_response
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
        {
            return Err(ProviderError::Api {
                status: 400,
                message: format!("Prompt blocked: {}", reason),
            });
        }

        let text: String = api_response
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect()
            })
            .unwrap_or_default();

        Ok(text)
    }

    async fn verify(&self) -> Result<(), ProviderError> {
        let request = GenerateContentRequest {
            contents: Self::user_turn("test"),
        };

        let response = self
            .client
            .post(self.api_url("countTokens"))
            .header(API_KEY_HEADER, self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ProviderError::from_response(response).await)
        }
    }
}

// ============================================================================
// Gemini API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<ContentPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ContentPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}
