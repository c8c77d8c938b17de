//! Content type listing and the administrator AI toggle.

use axum::{
    extract::{Path, State},
    Json,
};
use service_core::error::AppError;
use validator::Validate;

use crate::{
    dtos::{ContentTypeResponse, StatusMessage, ToggleAiRequest},
    startup::AppState,
};

/// Descriptions of the content types the generator may write to.
pub async fn list_ai_content_types(
    State(state): State<AppState>,
) -> Result<Json<Vec<String>>, AppError> {
    let types = state.repo.ai_content_types().await?;

    Ok(Json(types.into_iter().map(|t| t.description).collect()))
}

pub async fn list_content_types(
    State(state): State<AppState>,
) -> Result<Json<Vec<ContentTypeResponse>>, AppError> {
    let types = state.repo.content_types().await?;

    Ok(Json(types.into_iter().map(Into::into).collect()))
}

pub async fn toggle_ai(
    State(state): State<AppState>,
    Path(content_type_id): Path<i64>,
    Json(payload): Json<ToggleAiRequest>,
) -> Result<Json<StatusMessage>, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.into()))?;

    tracing::info!(
        content_type_id,
        aplica_ia = %payload.aplica_ia,
        "Toggling AI generation for content type"
    );

    let updated = state
        .repo
        .set_content_type_ai(content_type_id, payload.enabled())
        .await?;
    if !updated {
        return Err(AppError::NotFound(anyhow::anyhow!(
            "Tipo de contenido no encontrado"
        )));
    }

    Ok(Json(StatusMessage::success(format!(
        "Tipo de contenido actualizado: aplicaIA = {}",
        payload.aplica_ia
    ))))
}
