//! Content types and the content blocks stored under topics.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A named category of content, e.g. `definicion` or `codigo`.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct ContentType {
    pub content_type_id: i64,
    /// Unique key; content blocks reference it by this value.
    pub description: String,
    pub ai_enabled: bool,
    pub display_order: i32,
    pub active: bool,
}

impl ContentType {
    /// Whether the orchestrator may generate contributions for this type.
    pub fn accepts_ai(&self) -> bool {
        self.ai_enabled && self.active
    }
}

/// One stored piece of content under a topic.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct ContentBlock {
    pub block_id: i64,
    pub topic_id: i64,
    pub content_type: String,
    pub body: String,
    pub display_order: i32,
    /// Comma separated, sorted model names that contributed to `body`.
    pub ai_sources: Option<String>,
}
