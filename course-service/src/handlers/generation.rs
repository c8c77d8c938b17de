//! AI generation endpoints: one step at a time, or the whole run as SSE.

use std::convert::Infallible;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::Stream;
use service_core::error::AppError;
use tokio::sync::mpsc;
use tokio_stream::{wrappers::ReceiverStream, StreamExt};
use validator::Validate;

use crate::{
    dtos::{ContextUsed, GenerateStepRequest, StepResponse},
    services::generation::{
        build_context, execute_step, load_api_key, ProgressEvent, StepError,
    },
    services::providers::ProviderKind,
    startup::AppState,
};

const EVENT_BUFFER: usize = 32;

const INTERNAL_ERROR: &str = "Error interno del servidor";

type StepReply = (StatusCode, Json<StepResponse>);

/// Run a single (content type, provider) step for a topic.
///
/// Every outcome, including malformed bodies and storage failures, is
/// answered with a `{status, message}` body.
pub async fn generate_step(
    State(state): State<AppState>,
    payload: Result<Json<GenerateStepRequest>, JsonRejection>,
) -> StepReply {
    let payload = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => {
            tracing::warn!(error = %rejection, "Rejected generation step body");
            return missing_parameters();
        }
    };

    match run_step(&state, payload).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::error!(error = %e, "Generation step failed on storage");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(StepResponse::error(INTERNAL_ERROR)),
            )
        }
    }
}

async fn run_step(state: &AppState, payload: GenerateStepRequest) -> Result<StepReply, AppError> {
    if payload.validate().is_err() {
        return Ok(missing_parameters());
    }
    let (Some(topic_id), Some(content_type), Some(provider)) = (
        payload.id_tema,
        payload.tipo_contenido.as_deref(),
        payload.nombre_modelo.as_deref(),
    ) else {
        return Ok(missing_parameters());
    };

    let kind: ProviderKind = match provider.parse() {
        Ok(kind) => kind,
        Err(unsupported) => return Ok(step_error(unsupported.to_string())),
    };

    let Some(api_key) = load_api_key(state.repo.as_ref(), kind).await? else {
        return Ok(step_error(StepError::MissingCredential(kind).to_string()));
    };

    let Some((topic, unit)) = state.repo.topic_with_unit(topic_id).await? else {
        return Ok(step_error("Tema no encontrado"));
    };
    let blocks = state.repo.content_blocks(topic_id).await?;

    let known_type = match state.repo.content_type(content_type).await? {
        Some(existing) if !existing.accepts_ai() => {
            return Ok(step_error(
                StepError::NotAiEnabled(content_type.to_string()).to_string(),
            ));
        }
        Some(_) => true,
        None => false,
    };

    let context = match payload.contexto {
        Some(context) => context,
        None => build_context(&topic, Some(&unit), &blocks),
    };

    tracing::info!(
        topic_id,
        content_type = %content_type,
        provider = %kind,
        "Generating content step"
    );

    let response = match execute_step(
        state.repo.as_ref(),
        state.generator.as_ref(),
        topic_id,
        content_type,
        kind,
        &api_key,
        &context,
    )
    .await
    {
        Ok(success) => {
            // A type first seen here becomes a regular, listable content type.
            if !known_type {
                state.repo.register_content_type(content_type).await?;
            }
            StepResponse::Success {
                aporte: success.contribution,
                contexto_usado: ContextUsed {
                    tema: topic.title,
                    unidad: unit.name,
                    contenidos_previos: blocks.len(),
                },
            }
        }
        Err(e) => StepResponse::error(e.to_string()),
    };

    Ok((StatusCode::OK, Json(response)))
}

fn missing_parameters() -> StepReply {
    (
        StatusCode::BAD_REQUEST,
        Json(StepResponse::error("Parámetros faltantes")),
    )
}

fn step_error(message: impl Into<String>) -> StepReply {
    (StatusCode::OK, Json(StepResponse::error(message)))
}

/// Run every step for a topic server-side and stream progress as SSE.
///
/// The run is detached from the connection and completes even if the client
/// goes away.
pub async fn autocomplete(
    State(state): State<AppState>,
    Path(topic_id): Path<i64>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel::<ProgressEvent>(EVENT_BUFFER);
    let orchestrator = state.orchestrator.clone();

    tracing::info!(topic_id, "Starting generation run");
    tokio::spawn(async move {
        // Outcome is already reported through the event stream and logs.
        let _ = orchestrator.run(topic_id, tx).await;
    });

    let stream = ReceiverStream::new(rx).map(|event| Ok(to_sse_event(&event)));

    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn to_sse_event(event: &ProgressEvent) -> Event {
    let data = serde_json::to_string(event).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to serialize progress event");
        "{}".to_string()
    });
    Event::default().event(event.kind()).data(data)
}
