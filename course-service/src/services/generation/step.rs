//! One generation step: prompt, provider call, merge.
//!
//! Shared by the orchestrator loop and the single-step endpoint so both
//! produce identical prompts, messages and block updates.

use super::merge::{merge_contribution, MergeOutcome};
use super::prompt::{build_prompt, GenerationContext};
use crate::services::metrics::GENERATION_STEPS_TOTAL;
use crate::services::providers::{CallOutcome, ContentGenerator, ProviderKind};
use crate::services::repository::ContentRepository;
use service_core::error::AppError;
use thiserror::Error;
use tracing::{info, instrument, warn};

#[derive(Error, Debug)]
pub enum StepError {
    #[error("API Key para {0} no configurada.")]
    MissingCredential(ProviderKind),

    #[error("El tipo de contenido \"{0}\" no permite generación con IA")]
    NotAiEnabled(String),

    /// Already rendered as `Error in <provider>: <reason>`.
    #[error("{0}")]
    Provider(String),

    #[error("Error al guardar el aporte: {0}")]
    Persistence(#[source] AppError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepSuccess {
    pub contribution: String,
    pub outcome: MergeOutcome,
}

/// The stored key for `kind`, trimmed; `None` when absent or blank.
pub async fn load_api_key(
    repo: &dyn ContentRepository,
    kind: ProviderKind,
) -> Result<Option<String>, AppError> {
    Ok(repo
        .credential(kind.credential_key())
        .await?
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty()))
}

#[instrument(skip(repo, generator, api_key, context), fields(provider = %provider))]
pub async fn execute_step(
    repo: &dyn ContentRepository,
    generator: &dyn ContentGenerator,
    topic_id: i64,
    content_type: &str,
    provider: ProviderKind,
    api_key: &str,
    context: &GenerationContext,
) -> Result<StepSuccess, StepError> {
    let prompt = build_prompt(context, content_type);

    let result = match generator.call(provider.name(), api_key, &prompt).await {
        CallOutcome::Generated(text) => {
            match merge_contribution(repo, topic_id, content_type, provider.name(), &text).await {
                Ok(outcome) => Ok(StepSuccess {
                    contribution: text,
                    outcome,
                }),
                Err(e) => Err(StepError::Persistence(e)),
            }
        }
        failed => Err(StepError::Provider(
            failed.failure_message().unwrap_or_default(),
        )),
    };

    match &result {
        Ok(success) => {
            GENERATION_STEPS_TOTAL
                .with_label_values(&[provider.name(), "success"])
                .inc();
            info!(block_id = success.outcome.block_id(), "Generation step succeeded");
        }
        Err(error) => {
            GENERATION_STEPS_TOTAL
                .with_label_values(&[provider.name(), "error"])
                .inc();
            warn!(error = %error, "Generation step failed");
        }
    }

    result
}
