//! Data-access contract between the generation code and storage.
//!
//! Each method is one atomic statement; nothing here opens a transaction
//! spanning several calls.

use crate::models::{ContentBlock, ContentType, Topic, Unit};
use async_trait::async_trait;
use service_core::error::AppError;

#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// Active content types with AI generation enabled, in display order.
    async fn ai_content_types(&self) -> Result<Vec<ContentType>, AppError>;

    /// All active content types, in display order.
    async fn content_types(&self) -> Result<Vec<ContentType>, AppError>;

    async fn content_type(&self, description: &str) -> Result<Option<ContentType>, AppError>;

    /// Add an AI-enabled content type at the end of the list, or return the id
    /// of the one already registered under that description.
    async fn register_content_type(&self, description: &str) -> Result<i64, AppError>;

    /// Returns `false` when no content type has that id.
    async fn set_content_type_ai(
        &self,
        content_type_id: i64,
        enabled: bool,
    ) -> Result<bool, AppError>;

    async fn topic_with_unit(&self, topic_id: i64) -> Result<Option<(Topic, Unit)>, AppError>;

    /// Blocks of a topic ordered by display order, then id.
    async fn content_blocks(&self, topic_id: i64) -> Result<Vec<ContentBlock>, AppError>;

    /// The merge target for (topic, content type): the first matching block.
    async fn find_block(
        &self,
        topic_id: i64,
        content_type: &str,
    ) -> Result<Option<ContentBlock>, AppError>;

    /// Create a block at the end of the topic and return its id.
    async fn insert_block(
        &self,
        topic_id: i64,
        content_type: &str,
        body: &str,
        ai_sources: &str,
    ) -> Result<i64, AppError>;

    /// Replace body and provenance together.
    async fn update_block(&self, block_id: i64, body: &str, ai_sources: &str)
        -> Result<(), AppError>;

    async fn credential(&self, key: &str) -> Result<Option<String>, AppError>;

    async fn save_credential(&self, key: &str, value: &str) -> Result<(), AppError>;
}
