//! Server-side generation run over every (content type, provider) pair.

use super::merge::MergeOutcome;
use super::prompt::build_context;
use super::step::{execute_step, load_api_key};
use crate::services::metrics::GENERATION_RUNS_TOTAL;
use crate::services::providers::{ContentGenerator, ProviderKind};
use crate::services::repository::ContentRepository;
use serde::Serialize;
use service_core::error::AppError;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{error, info, instrument, warn};

pub const FREE_TIER_HINT: &str = "Todos los modelos fallaron. Puedes configurar la API gratuita de Google Gemini en la página de Configuración.";

/// Fatal conditions that stop a run before its first step.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("No hay tipos de contenido habilitados para IA.")]
    NoEligibleTypes,

    #[error("No hay APIs configuradas.")]
    NoUsableProviders,

    #[error("Tema no encontrado")]
    TopicNotFound(i64),

    #[error("Error interno del servidor")]
    Repository(#[from] AppError),
}

/// Progress of a run, in execution order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProgressEvent {
    TypesDiscovered {
        content_types: Vec<String>,
    },
    ProvidersDiscovered {
        providers: Vec<String>,
    },
    ContextBuilt {
        existing_blocks: usize,
        total_steps: usize,
    },
    StepStarted {
        content_type: String,
        provider: String,
    },
    StepSucceeded {
        content_type: String,
        provider: String,
        outcome: &'static str,
        block_id: i64,
    },
    StepFailed {
        content_type: String,
        provider: String,
        message: String,
    },
    Progress {
        completed: usize,
        total: usize,
        percentage: u8,
    },
    Finished {
        succeeded: usize,
        failed: usize,
    },
    Hint {
        message: String,
    },
    Aborted {
        status: &'static str,
        message: String,
    },
}

impl ProgressEvent {
    /// Matches the serialized `kind` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            ProgressEvent::TypesDiscovered { .. } => "types_discovered",
            ProgressEvent::ProvidersDiscovered { .. } => "providers_discovered",
            ProgressEvent::ContextBuilt { .. } => "context_built",
            ProgressEvent::StepStarted { .. } => "step_started",
            ProgressEvent::StepSucceeded { .. } => "step_succeeded",
            ProgressEvent::StepFailed { .. } => "step_failed",
            ProgressEvent::Progress { .. } => "progress",
            ProgressEvent::Finished { .. } => "finished",
            ProgressEvent::Hint { .. } => "hint",
            ProgressEvent::Aborted { .. } => "aborted",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub succeeded: usize,
    pub failed: usize,
}

pub fn percentage(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((completed as f64 / total as f64) * 100.0).round() as u8
}

#[derive(Clone)]
pub struct Orchestrator {
    repo: Arc<dyn ContentRepository>,
    generator: Arc<dyn ContentGenerator>,
    step_delay: Duration,
}

impl Orchestrator {
    pub fn new(
        repo: Arc<dyn ContentRepository>,
        generator: Arc<dyn ContentGenerator>,
        step_delay: Duration,
    ) -> Self {
        Self {
            repo,
            generator,
            step_delay,
        }
    }

    /// Run every step for `topic_id`, reporting through `events`.
    ///
    /// A closed receiver does not stop the run.
    #[instrument(skip(self, events))]
    pub async fn run(
        &self,
        topic_id: i64,
        events: mpsc::Sender<ProgressEvent>,
    ) -> Result<RunSummary, GenerationError> {
        let result = self.run_steps(topic_id, &events).await;

        match &result {
            Ok(summary) => {
                GENERATION_RUNS_TOTAL.with_label_values(&["finished"]).inc();
                info!(
                    succeeded = summary.succeeded,
                    failed = summary.failed,
                    "Generation run finished"
                );
            }
            Err(e) => {
                GENERATION_RUNS_TOTAL.with_label_values(&["aborted"]).inc();
                if let GenerationError::Repository(source) = e {
                    error!(error = %source, "Generation run aborted by storage error");
                } else {
                    warn!(reason = %e, "Generation run aborted");
                }
                emit(
                    &events,
                    ProgressEvent::Aborted {
                        status: "error",
                        message: e.to_string(),
                    },
                )
                .await;
            }
        }

        result
    }

    async fn run_steps(
        &self,
        topic_id: i64,
        events: &mpsc::Sender<ProgressEvent>,
    ) -> Result<RunSummary, GenerationError> {
        let content_types: Vec<String> = self
            .repo
            .ai_content_types()
            .await?
            .into_iter()
            .filter(|t| t.accepts_ai())
            .map(|t| t.description)
            .collect();
        if content_types.is_empty() {
            return Err(GenerationError::NoEligibleTypes);
        }
        emit(
            events,
            ProgressEvent::TypesDiscovered {
                content_types: content_types.clone(),
            },
        )
        .await;

        let mut providers = Vec::new();
        for kind in ProviderKind::ALL {
            if let Some(key) = load_api_key(self.repo.as_ref(), kind).await? {
                providers.push((kind, key));
            }
        }
        if providers.is_empty() {
            return Err(GenerationError::NoUsableProviders);
        }
        emit(
            events,
            ProgressEvent::ProvidersDiscovered {
                providers: providers.iter().map(|(k, _)| k.name().to_string()).collect(),
            },
        )
        .await;

        let (topic, unit) = self
            .repo
            .topic_with_unit(topic_id)
            .await?
            .ok_or(GenerationError::TopicNotFound(topic_id))?;
        let blocks = self.repo.content_blocks(topic_id).await?;
        let context = build_context(&topic, Some(&unit), &blocks);

        let total = content_types.len() * providers.len();
        emit(
            events,
            ProgressEvent::ContextBuilt {
                existing_blocks: blocks.len(),
                total_steps: total,
            },
        )
        .await;

        let mut summary = RunSummary::default();
        let mut completed = 0;

        for content_type in &content_types {
            for (kind, api_key) in &providers {
                emit(
                    events,
                    ProgressEvent::StepStarted {
                        content_type: content_type.clone(),
                        provider: kind.name().to_string(),
                    },
                )
                .await;

                let step = execute_step(
                    self.repo.as_ref(),
                    self.generator.as_ref(),
                    topic_id,
                    content_type,
                    *kind,
                    api_key,
                    &context,
                )
                .await;

                let event = match step {
                    Ok(success) => {
                        summary.succeeded += 1;
                        ProgressEvent::StepSucceeded {
                            content_type: content_type.clone(),
                            provider: kind.name().to_string(),
                            outcome: match success.outcome {
                                MergeOutcome::Created(_) => "created",
                                MergeOutcome::Updated(_) => "updated",
                            },
                            block_id: success.outcome.block_id(),
                        }
                    }
                    Err(e) => {
                        summary.failed += 1;
                        ProgressEvent::StepFailed {
                            content_type: content_type.clone(),
                            provider: kind.name().to_string(),
                            message: e.to_string(),
                        }
                    }
                };
                emit(events, event).await;

                completed += 1;
                info!(topic_id, completed, total, "Generation progress");
                emit(
                    events,
                    ProgressEvent::Progress {
                        completed,
                        total,
                        percentage: percentage(completed, total),
                    },
                )
                .await;

                tokio::time::sleep(self.step_delay).await;
            }
        }

        emit(
            events,
            ProgressEvent::Finished {
                succeeded: summary.succeeded,
                failed: summary.failed,
            },
        )
        .await;

        if summary.succeeded == 0 && summary.failed > 0 {
            emit(
                events,
                ProgressEvent::Hint {
                    message: FREE_TIER_HINT.to_string(),
                },
            )
            .await;
        }

        Ok(summary)
    }
}

async fn emit(events: &mpsc::Sender<ProgressEvent>, event: ProgressEvent) {
    // The listener may be gone; the run still completes.
    let _ = events.send(event).await;
}
