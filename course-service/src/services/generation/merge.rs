//! Merging AI contributions into stored content blocks.

use crate::services::repository::ContentRepository;
use service_core::error::AppError;
use std::collections::BTreeSet;
use tracing::{debug, instrument};

/// Start of the provenance footer appended to AI-touched bodies.
pub const SOURCES_MARKER: &str = "(Fuentes de IA:";

const CONTRIBUTION_SEPARATOR: &str = "\n\n---\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Created(i64),
    Updated(i64),
}

impl MergeOutcome {
    pub fn block_id(&self) -> i64 {
        match self {
            MergeOutcome::Created(id) | MergeOutcome::Updated(id) => *id,
        }
    }
}

/// Body with the provenance footer and everything after it removed.
pub fn strip_sources_footer(body: &str) -> &str {
    match body.find(SOURCES_MARKER) {
        Some(index) => body[..index].trim(),
        None => body.trim(),
    }
}

pub fn parse_sources(raw: Option<&str>) -> BTreeSet<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn render_sources(sources: &BTreeSet<String>) -> String {
    sources.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

pub fn with_sources_footer(body: &str, sources: &str) -> String {
    format!("{}\n\n{} {})", body, SOURCES_MARKER, sources)
}

/// Append `contribution` to an existing body, keeping no leading separator
/// when the body has no content of its own.
pub fn append_contribution(existing_body: &str, contribution: &str) -> String {
    let base = strip_sources_footer(existing_body);
    let contribution = contribution.trim();
    if base.is_empty() {
        contribution.to_string()
    } else {
        format!("{}{}{}", base, CONTRIBUTION_SEPARATOR, contribution)
    }
}

/// Create or amend the block for (`topic_id`, `content_type`) with a
/// contribution produced by `model_name`.
#[instrument(skip(repo, contribution))]
pub async fn merge_contribution(
    repo: &dyn ContentRepository,
    topic_id: i64,
    content_type: &str,
    model_name: &str,
    contribution: &str,
) -> Result<MergeOutcome, AppError> {
    match repo.find_block(topic_id, content_type).await? {
        None => {
            let body = with_sources_footer(contribution.trim(), model_name);
            let block_id = repo
                .insert_block(topic_id, content_type, &body, model_name)
                .await?;
            debug!(block_id, "Created content block from contribution");
            Ok(MergeOutcome::Created(block_id))
        }
        Some(block) => {
            let mut sources = parse_sources(block.ai_sources.as_deref());
            sources.insert(model_name.to_string());
            let sources = render_sources(&sources);

            let merged = append_contribution(&block.body, contribution);
            let body = with_sources_footer(&merged, &sources);

            repo.update_block(block.block_id, &body, &sources).await?;
            debug!(block_id = block.block_id, sources = %sources, "Amended content block");
            Ok(MergeOutcome::Updated(block.block_id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_footer_and_trailing_text() {
        assert_eq!(
            strip_sources_footer("Hola\n\n(Fuentes de IA: Gemini)"),
            "Hola"
        );
        assert_eq!(strip_sources_footer("  Sin pie  "), "Sin pie");
        assert_eq!(strip_sources_footer("(Fuentes de IA: Claude)"), "");
    }

    #[test]
    fn provenance_is_sorted_union() {
        let mut sources = parse_sources(Some("OpenAI, Claude"));
        sources.insert("Gemini".to_string());
        sources.insert("Claude".to_string());
        assert_eq!(render_sources(&sources), "Claude, Gemini, OpenAI");

        assert!(parse_sources(None).is_empty());
        assert!(parse_sources(Some(" , ")).is_empty());
    }

    #[test]
    fn provenance_ignores_insertion_order() {
        let mut a = parse_sources(Some("Gemini"));
        a.insert("OpenAI".to_string());
        let mut b = parse_sources(Some("OpenAI"));
        b.insert("Gemini".to_string());
        assert_eq!(render_sources(&a), render_sources(&b));
    }

    #[test]
    fn empty_base_has_no_leading_separator() {
        assert_eq!(append_contribution("", "Nuevo"), "Nuevo");
        assert_eq!(
            append_contribution("(Fuentes de IA: Gemini)", "Nuevo"),
            "Nuevo"
        );
        assert_eq!(
            append_contribution("Viejo\n\n(Fuentes de IA: OpenAI)", "Nuevo"),
            "Viejo\n\n---\n\nNuevo"
        );
    }

    #[test]
    fn footer_format() {
        assert_eq!(
            with_sources_footer("X", "Gemini"),
            "X\n\n(Fuentes de IA: Gemini)"
        );
    }
}
