//! Request and response bodies of the HTTP API.
//!
//! Field names follow the JSON contract used by the browser client.

use crate::models::{ContentBlock, ContentType};
use crate::services::generation::GenerationContext;
use serde::{Deserialize, Deserializer, Serialize};
use validator::{Validate, ValidationError};

/// Accepts ids sent either as JSON numbers or as numeric strings.
fn deserialize_optional_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(i64),
        Text(String),
    }

    match Option::<RawId>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawId::Number(id)) => Ok(Some(id)),
        Some(RawId::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(RawId::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct GenerateStepRequest {
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    #[validate(required, range(min = 1))]
    pub id_tema: Option<i64>,
    #[validate(required, length(min = 1))]
    pub tipo_contenido: Option<String>,
    #[validate(required, length(min = 1))]
    pub nombre_modelo: Option<String>,
    /// Context captured by a caller that drives the loop itself.
    pub contexto: Option<GenerationContext>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextUsed {
    pub tema: String,
    pub unidad: String,
    pub contenidos_previos: usize,
}

/// Outcome of one generation step as reported to the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StepResponse {
    Success {
        aporte: String,
        contexto_usado: ContextUsed,
    },
    Error {
        message: String,
    },
}

impl StepResponse {
    pub fn error(message: impl Into<String>) -> Self {
        StepResponse::Error {
            message: message.into(),
        }
    }
}

/// The `{status, message}` envelope used by the administrative endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StatusMessage {
    Success { message: String },
    Error { message: String },
}

impl StatusMessage {
    pub fn success(message: impl Into<String>) -> Self {
        StatusMessage::Success {
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        StatusMessage::Error {
            message: message.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct VerifyKeyRequest {
    #[serde(default)]
    pub servicio: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiKeyResponse {
    #[serde(rename = "apiKey")]
    pub api_key: Option<String>,
}

fn validate_ai_flag(value: &str) -> Result<(), ValidationError> {
    match value {
        "SI" | "NO" => Ok(()),
        _ => {
            let mut error = ValidationError::new("aplica_ia");
            error.message = Some("Valor inválido para aplicaIA. Debe ser SI o NO".into());
            Err(error)
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ToggleAiRequest {
    #[serde(rename = "aplicaIA")]
    #[validate(custom(function = "validate_ai_flag"))]
    pub aplica_ia: String,
}

impl ToggleAiRequest {
    pub fn enabled(&self) -> bool {
        self.aplica_ia == "SI"
    }
}

/// Provider keys to store; absent or blank entries are left untouched.
#[derive(Debug, Default, Deserialize)]
pub struct CredentialsRequest {
    #[serde(rename = "GOOGLE_API_KEY")]
    pub google: Option<String>,
    #[serde(rename = "ANTHROPIC_API_KEY")]
    pub anthropic: Option<String>,
    #[serde(rename = "OPENAI_API_KEY")]
    pub openai: Option<String>,
    #[serde(rename = "DEEPSEEK_API_KEY")]
    pub deepseek: Option<String>,
}

impl CredentialsRequest {
    /// `(credential key, trimmed value)` pairs that carry a value.
    pub fn entries(&self) -> Vec<(&'static str, &str)> {
        [
            ("GOOGLE_API_KEY", &self.google),
            ("ANTHROPIC_API_KEY", &self.anthropic),
            ("OPENAI_API_KEY", &self.openai),
            ("DEEPSEEK_API_KEY", &self.deepseek),
        ]
        .into_iter()
        .filter_map(|(key, value)| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| (key, v))
        })
        .collect()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ContentTypeResponse {
    pub id_tipo_contenido: i64,
    pub descripcion: String,
    #[serde(rename = "aplicaIA")]
    pub aplica_ia: String,
    pub orden: i32,
}

impl From<ContentType> for ContentTypeResponse {
    fn from(content_type: ContentType) -> Self {
        Self {
            id_tipo_contenido: content_type.content_type_id,
            descripcion: content_type.description,
            aplica_ia: if content_type.ai_enabled { "SI" } else { "NO" }.to_string(),
            orden: content_type.display_order,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ContentBlockResponse {
    pub id_contenido: i64,
    pub tipo_contenido: String,
    pub cuerpo: String,
    pub fuente_ia: Option<String>,
    pub orden: i32,
}

impl From<ContentBlock> for ContentBlockResponse {
    fn from(block: ContentBlock) -> Self {
        Self {
            id_contenido: block.block_id,
            tipo_contenido: block.content_type,
            cuerpo: block.body,
            fuente_ia: block.ai_sources,
            orden: block.display_order,
        }
    }
}
