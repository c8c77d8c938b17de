//! Generation context and prompt rendering.

use crate::models::{ContentBlock, Topic, Unit};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Body placeholder used when a content type has nothing yet.
pub const EMPTY_BODY: &str = "Vacío";

static ORDINAL_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\d+(?:\.\d+)*\.?\s*-\s*").expect("valid ordinal prefix regex"));

/// Snapshot of a topic taken once before the first generation step.
///
/// Serializes to the flat shape browsers send back to the single-step
/// endpoint: `{"titulo": ..., "unidad": ..., "<tipo>": "<cuerpo>", ...}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationContext {
    #[serde(rename = "titulo")]
    pub title: String,
    #[serde(rename = "unidad", default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(flatten)]
    pub bodies: BTreeMap<String, String>,
}

impl GenerationContext {
    pub fn body(&self, content_type: &str) -> Option<&str> {
        self.bodies.get(content_type).map(String::as_str)
    }
}

/// Strip a leading `"1.2 - "` style ordinal from a topic title.
pub fn clean_title(title: &str) -> String {
    ORDINAL_PREFIX.replace(title, "").trim().to_string()
}

/// `blocks` are expected in display order; a later block of the same type
/// replaces an earlier one.
pub fn build_context(topic: &Topic, unit: Option<&Unit>, blocks: &[ContentBlock]) -> GenerationContext {
    let bodies = blocks
        .iter()
        .map(|block| (block.content_type.clone(), block.body.clone()))
        .collect();

    GenerationContext {
        title: clean_title(&topic.title),
        unit: unit.map(|u| u.name.clone()),
        bodies,
    }
}

pub fn build_prompt(context: &GenerationContext, content_type: &str) -> String {
    let current = context
        .body(content_type)
        .filter(|body| !body.trim().is_empty())
        .unwrap_or(EMPTY_BODY);

    format!(
        "Para el tema '{}', y específicamente para el tipo de contenido '{}', agrega un aporte pedagógico y conciso. \
         El contenido actual de este bloque es: '{}'. No repitas la información. \
         Responde solo con el texto del nuevo aporte.",
        context.title, content_type, current
    )
}
