//! Domain models for the course service.

mod content;
mod topic;

pub use content::{ContentBlock, ContentType};
pub use topic::{Topic, Unit};
