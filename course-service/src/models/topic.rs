//! Units and the topics they own.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A unit of a subject; deleting it cascades to its topics.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Unit {
    pub unit_id: i64,
    pub name: String,
}

/// A titled unit of subject matter owned by a [`Unit`].
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Topic {
    pub topic_id: i64,
    pub unit_id: i64,
    /// Ordinal such as `"1.2"`.
    pub number: Option<String>,
    pub title: String,
}
