//! AI provider abstractions and implementations.
//!
//! Every provider speaks its own wire format; [`TextProvider`] hides that
//! behind `generate`/`verify`, and [`ContentGenerator`] is the name-based
//! entry point the generation code uses.

pub mod claude;
pub mod classifier;
pub mod gateway;
pub mod gemini;
pub mod mock;
pub mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub use gateway::ProviderGateway;

/// Error type for provider operations.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to parse response: {0}")]
    InvalidResponse(String),

    #[error("Provider returned no text")]
    EmptyResponse,
}

impl ProviderError {
    /// HTTP status reported by the provider, if the request got that far.
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The provider's own error text, without our formatting.
    pub fn message(&self) -> String {
        match self {
            ProviderError::Api { message, .. } => message.clone(),
            ProviderError::Network(message) | ProviderError::InvalidResponse(message) => {
                message.clone()
            }
            ProviderError::EmptyResponse => self.to_string(),
        }
    }

    /// Build an error from a non-success HTTP response.
    ///
    /// All four providers nest the human message under `error.message`; the
    /// raw body is used when it is not JSON.
    pub async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        ProviderError::Api {
            status: status.as_u16(),
            message: extract_error_message(&body)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("").to_string()),
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        // Request URLs may carry credentials; keep them out of user-facing text.
        let err = err.without_url();
        match err.status() {
            Some(status) => ProviderError::Api {
                status: status.as_u16(),
                message: err.to_string(),
            },
            None if err.is_decode() => ProviderError::InvalidResponse(err.to_string()),
            None => ProviderError::Network(err.to_string()),
        }
    }
}

fn extract_error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    let nested = serde_json::from_str::<serde_json::Value>(trimmed)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .or_else(|| value.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        });
    Some(nested.unwrap_or_else(|| trimmed.to_string()))
}

/// The fixed set of supported providers, in canonical iteration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    Gemini,
    Claude,
    #[serde(rename = "OpenAI")]
    OpenAi,
    DeepSeek,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::Gemini,
        ProviderKind::Claude,
        ProviderKind::OpenAi,
        ProviderKind::DeepSeek,
    ];

    /// Identifier used on the wire and in provenance footers.
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "Gemini",
            ProviderKind::Claude => "Claude",
            ProviderKind::OpenAi => "OpenAI",
            ProviderKind::DeepSeek => "DeepSeek",
        }
    }

    /// Key under which the provider's API key is stored.
    pub fn credential_key(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "GOOGLE_API_KEY",
            ProviderKind::Claude => "ANTHROPIC_API_KEY",
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::DeepSeek => "DEEPSEEK_API_KEY",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("El modelo '{0}' no es soportado.")]
pub struct UnsupportedProvider(pub String);

impl FromStr for ProviderKind {
    type Err = UnsupportedProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProviderKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| UnsupportedProvider(s.to_string()))
    }
}

/// Result of one provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    Generated(String),
    Failed { provider: String, reason: String },
}

impl CallOutcome {
    pub fn failed(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        CallOutcome::Failed {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    pub fn is_generated(&self) -> bool {
        matches!(self, CallOutcome::Generated(_))
    }

    /// The user-facing failure line, `Error in <provider>: <reason>`.
    pub fn failure_message(&self) -> Option<String> {
        match self {
            CallOutcome::Generated(_) => None,
            CallOutcome::Failed { provider, reason } => {
                Some(format!("Error in {}: {}", provider, reason))
            }
        }
    }
}

/// Single-turn text generation against one provider with one key.
#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Send `prompt` as the entire user turn and return the primary text.
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError>;

    /// Issue the cheapest request that proves the key is accepted.
    async fn verify(&self) -> Result<(), ProviderError>;
}

/// Name-based provider access used by the generation step and the API.
///
/// Implementations never fail: provider errors come back as
/// [`CallOutcome::Failed`] and a rejected key as `false`.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn call(&self, provider: &str, api_key: &str, prompt: &str) -> CallOutcome;

    async fn verify(&self, provider: &str, api_key: &str) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canonical_names_only() {
        assert_eq!("Gemini".parse::<ProviderKind>(), Ok(ProviderKind::Gemini));
        assert_eq!("OpenAI".parse::<ProviderKind>(), Ok(ProviderKind::OpenAi));
        assert_eq!("DeepSeek".parse::<ProviderKind>(), Ok(ProviderKind::DeepSeek));
        assert_eq!(
            "openai".parse::<ProviderKind>(),
            Err(UnsupportedProvider("openai".to_string()))
        );
        assert!("Mistral".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn canonical_order_and_credential_keys() {
        let names: Vec<_> = ProviderKind::ALL.iter().map(|k| k.name()).collect();
        assert_eq!(names, ["Gemini", "Claude", "OpenAI", "DeepSeek"]);
        assert_eq!(ProviderKind::Claude.credential_key(), "ANTHROPIC_API_KEY");
        assert_eq!(ProviderKind::Gemini.credential_key(), "GOOGLE_API_KEY");
    }

    #[test]
    fn failure_message_has_provider_prefix() {
        let outcome = CallOutcome::failed("Claude", "La API Key es inválida o ha sido revocada.");
        assert_eq!(
            outcome.failure_message().as_deref(),
            Some("Error in Claude: La API Key es inválida o ha sido revocada.")
        );
        assert_eq!(CallOutcome::Generated("x".into()).failure_message(), None);
    }

    #[test]
    fn extracts_nested_error_message() {
        let body = r#"{"type":"error","error":{"type":"authentication_error","message":"invalid x-api-key"}}"#;
        assert_eq!(
            extract_error_message(body).as_deref(),
            Some("invalid x-api-key")
        );
        assert_eq!(
            extract_error_message("gateway timeout").as_deref(),
            Some("gateway timeout")
        );
        assert_eq!(extract_error_message("  "), None);
    }
}
