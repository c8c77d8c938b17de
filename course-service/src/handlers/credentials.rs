//! Provider credential storage and verification.

use axum::{
    extract::{Path, State},
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::{ApiKeyResponse, CredentialsRequest, StatusMessage, VerifyKeyRequest},
    services::generation::load_api_key,
    services::providers::ProviderKind,
    startup::AppState,
};

/// Stored key for a provider, `null` when none is configured.
pub async fn get_api_key(
    State(state): State<AppState>,
    Path(provider): Path<String>,
) -> Result<Json<ApiKeyResponse>, AppError> {
    let kind: ProviderKind = provider
        .parse()
        .map_err(|_| AppError::BadRequest(anyhow::anyhow!("Servicio no válido")))?;

    let api_key = load_api_key(state.repo.as_ref(), kind).await?;

    Ok(Json(ApiKeyResponse { api_key }))
}

pub async fn verify_api_key(
    State(state): State<AppState>,
    Json(payload): Json<VerifyKeyRequest>,
) -> Json<StatusMessage> {
    let api_key = payload.api_key.as_deref().map(str::trim).unwrap_or_default();
    if api_key.is_empty() {
        return Json(StatusMessage::error("La clave está vacía."));
    }

    tracing::info!(servicio = %payload.servicio, "Verifying provider API key");

    if state.generator.verify(&payload.servicio, api_key).await {
        Json(StatusMessage::success("¡Clave válida!"))
    } else {
        Json(StatusMessage::error("Clave inválida o error de conexión."))
    }
}

/// Upsert the provider keys present in the request.
pub async fn save_credentials(
    State(state): State<AppState>,
    Json(payload): Json<CredentialsRequest>,
) -> Result<Json<StatusMessage>, AppError> {
    let entries = payload.entries();

    for (key, value) in &entries {
        state.repo.save_credential(key, value).await?;
    }

    tracing::info!(saved = entries.len(), "Provider credentials updated");

    Ok(Json(StatusMessage::success("Configuración guardada.")))
}
