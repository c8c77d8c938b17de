use axum::{
    extract::{Path, State},
    Json,
};
use service_core::error::AppError;

use crate::{dtos::ContentBlockResponse, startup::AppState};

/// Content blocks of a topic in display order.
pub async fn get_topic_content(
    State(state): State<AppState>,
    Path(topic_id): Path<i64>,
) -> Result<Json<Vec<ContentBlockResponse>>, AppError> {
    tracing::debug!(topic_id, "Fetching topic content");

    let blocks = state.repo.content_blocks(topic_id).await?;

    Ok(Json(blocks.into_iter().map(Into::into).collect()))
}
