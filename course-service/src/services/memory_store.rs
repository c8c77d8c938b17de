//! In-memory [`ContentRepository`] used by tests and local runs without
//! PostgreSQL.

use crate::models::{ContentBlock, ContentType, Topic, Unit};
use crate::services::repository::ContentRepository;
use async_trait::async_trait;
use service_core::error::AppError;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct State {
    units: Vec<Unit>,
    topics: Vec<Topic>,
    content_types: Vec<ContentType>,
    blocks: Vec<ContentBlock>,
    credentials: HashMap<String, String>,
    next_id: i64,
    failing_writes: bool,
    failing_reads: bool,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct InMemoryRepository {
    state: Mutex<State>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, AppError> {
        self.state
            .lock()
            .map_err(|_| AppError::DatabaseError(anyhow::anyhow!("In-memory store poisoned")))
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_unit(&self, name: &str) -> i64 {
        let mut state = self.state();
        let unit_id = state.next_id();
        state.units.push(Unit {
            unit_id,
            name: name.to_string(),
        });
        unit_id
    }

    pub fn add_topic(&self, unit_id: i64, number: &str, title: &str) -> i64 {
        let mut state = self.state();
        let topic_id = state.next_id();
        state.topics.push(Topic {
            topic_id,
            unit_id,
            number: Some(number.to_string()),
            title: title.to_string(),
        });
        topic_id
    }

    pub fn add_content_type(&self, description: &str, ai_enabled: bool, display_order: i32) -> i64 {
        let mut state = self.state();
        let content_type_id = state.next_id();
        state.content_types.push(ContentType {
            content_type_id,
            description: description.to_string(),
            ai_enabled,
            display_order,
            active: true,
        });
        content_type_id
    }

    pub fn add_block(
        &self,
        topic_id: i64,
        content_type: &str,
        body: &str,
        ai_sources: Option<&str>,
    ) -> i64 {
        let mut state = self.state();
        let block_id = state.next_id();
        let display_order = next_display_order(&state, topic_id);
        state.blocks.push(ContentBlock {
            block_id,
            topic_id,
            content_type: content_type.to_string(),
            body: body.to_string(),
            display_order,
            ai_sources: ai_sources.map(str::to_string),
        });
        block_id
    }

    pub fn set_credential(&self, key: &str, value: &str) {
        self.state()
            .credentials
            .insert(key.to_string(), value.to_string());
    }

    /// Make every block insert and update fail.
    pub fn fail_writes(&self, failing: bool) {
        self.state().failing_writes = failing;
    }

    /// Make every query fail, as if the database were unreachable.
    pub fn fail_reads(&self, failing: bool) {
        self.state().failing_reads = failing;
    }

    pub fn blocks(&self, topic_id: i64) -> Vec<ContentBlock> {
        sorted_blocks(&self.state(), topic_id)
    }
}

fn next_display_order(state: &State, topic_id: i64) -> i32 {
    state
        .blocks
        .iter()
        .filter(|b| b.topic_id == topic_id)
        .map(|b| b.display_order)
        .max()
        .unwrap_or(0)
        + 1
}

fn sorted_blocks(state: &State, topic_id: i64) -> Vec<ContentBlock> {
    let mut blocks: Vec<_> = state
        .blocks
        .iter()
        .filter(|b| b.topic_id == topic_id)
        .cloned()
        .collect();
    blocks.sort_by_key(|b| (b.display_order, b.block_id));
    blocks
}

fn sorted_types(state: &State, filter: impl Fn(&ContentType) -> bool) -> Vec<ContentType> {
    let mut types: Vec<_> = state
        .content_types
        .iter()
        .filter(|t| filter(t))
        .cloned()
        .collect();
    types.sort_by(|a, b| {
        a.display_order
            .cmp(&b.display_order)
            .then_with(|| a.description.cmp(&b.description))
    });
    types
}

fn read_guard(state: &State) -> Result<(), AppError> {
    if state.failing_reads {
        return Err(AppError::DatabaseError(anyhow::anyhow!(
            "Simulated read failure"
        )));
    }
    Ok(())
}

fn write_guard(state: &State) -> Result<(), AppError> {
    if state.failing_writes {
        return Err(AppError::DatabaseError(anyhow::anyhow!(
            "Simulated write failure"
        )));
    }
    Ok(())
}

#[async_trait]
impl ContentRepository for InMemoryRepository {
    async fn ai_content_types(&self) -> Result<Vec<ContentType>, AppError> {
        let state = self.lock()?;
        read_guard(&state)?;
        Ok(sorted_types(&state, ContentType::accepts_ai))
    }

    async fn content_types(&self) -> Result<Vec<ContentType>, AppError> {
        let state = self.lock()?;
        read_guard(&state)?;
        Ok(sorted_types(&state, |t| t.active))
    }

    async fn content_type(&self, description: &str) -> Result<Option<ContentType>, AppError> {
        let state = self.lock()?;
        read_guard(&state)?;
        Ok(state
            .content_types
            .iter()
            .find(|t| t.description == description)
            .cloned())
    }

    async fn register_content_type(&self, description: &str) -> Result<i64, AppError> {
        let mut state = self.lock()?;
        write_guard(&state)?;
        if let Some(existing) = state
            .content_types
            .iter()
            .find(|t| t.description == description)
        {
            return Ok(existing.content_type_id);
        }
        let content_type_id = state.next_id();
        let display_order = state
            .content_types
            .iter()
            .map(|t| t.display_order)
            .max()
            .unwrap_or(0)
            + 1;
        state.content_types.push(ContentType {
            content_type_id,
            description: description.to_string(),
            ai_enabled: true,
            display_order,
            active: true,
        });
        Ok(content_type_id)
    }

    async fn set_content_type_ai(
        &self,
        content_type_id: i64,
        enabled: bool,
    ) -> Result<bool, AppError> {
        let mut state = self.lock()?;
        match state
            .content_types
            .iter_mut()
            .find(|t| t.content_type_id == content_type_id)
        {
            Some(content_type) => {
                content_type.ai_enabled = enabled;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn topic_with_unit(&self, topic_id: i64) -> Result<Option<(Topic, Unit)>, AppError> {
        let state = self.lock()?;
        read_guard(&state)?;
        let Some(topic) = state.topics.iter().find(|t| t.topic_id == topic_id) else {
            return Ok(None);
        };
        Ok(state
            .units
            .iter()
            .find(|u| u.unit_id == topic.unit_id)
            .map(|unit| (topic.clone(), unit.clone())))
    }

    async fn content_blocks(&self, topic_id: i64) -> Result<Vec<ContentBlock>, AppError> {
        let state = self.lock()?;
        read_guard(&state)?;
        Ok(sorted_blocks(&state, topic_id))
    }

    async fn find_block(
        &self,
        topic_id: i64,
        content_type: &str,
    ) -> Result<Option<ContentBlock>, AppError> {
        let state = self.lock()?;
        read_guard(&state)?;
        Ok(sorted_blocks(&state, topic_id)
            .into_iter()
            .find(|b| b.content_type == content_type))
    }

    async fn insert_block(
        &self,
        topic_id: i64,
        content_type: &str,
        body: &str,
        ai_sources: &str,
    ) -> Result<i64, AppError> {
        let mut state = self.lock()?;
        write_guard(&state)?;
        let block_id = state.next_id();
        let display_order = next_display_order(&state, topic_id);
        state.blocks.push(ContentBlock {
            block_id,
            topic_id,
            content_type: content_type.to_string(),
            body: body.to_string(),
            display_order,
            ai_sources: Some(ai_sources.to_string()),
        });
        Ok(block_id)
    }

    async fn update_block(
        &self,
        block_id: i64,
        body: &str,
        ai_sources: &str,
    ) -> Result<(), AppError> {
        let mut state = self.lock()?;
        write_guard(&state)?;
        let block = state
            .blocks
            .iter_mut()
            .find(|b| b.block_id == block_id)
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!("Content block {} not found", block_id))
            })?;
        block.body = body.to_string();
        block.ai_sources = Some(ai_sources.to_string());
        Ok(())
    }

    async fn credential(&self, key: &str) -> Result<Option<String>, AppError> {
        let state = self.lock()?;
        read_guard(&state)?;
        Ok(state.credentials.get(key).cloned())
    }

    async fn save_credential(&self, key: &str, value: &str) -> Result<(), AppError> {
        self.lock()?
            .credentials
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn inserted_blocks_go_to_the_end() {
        let repo = InMemoryRepository::new();
        let unit = repo.add_unit("Fundamentos");
        let topic = repo.add_topic(unit, "1.1", "1.1 - Variables");
        repo.add_block(topic, "definicion", "a", None);

        let id = repo.insert_block(topic, "tip", "b", "Gemini").await.unwrap();
        let blocks = repo.content_blocks(topic).await.unwrap();

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].block_id, id);
        assert_eq!(blocks[1].display_order, 2);
    }

    #[tokio::test]
    async fn ai_types_exclude_disabled_ones() {
        let repo = InMemoryRepository::new();
        repo.add_content_type("ejemplo", true, 10);
        repo.add_content_type("codigo", false, 9);
        repo.add_content_type("definicion", true, 1);

        let names: Vec<_> = repo
            .ai_content_types()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.description)
            .collect();

        assert_eq!(names, ["definicion", "ejemplo"]);
        assert_eq!(repo.content_types().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn registering_a_known_type_returns_its_id() {
        let repo = InMemoryRepository::new();
        let known = repo.add_content_type("tip", false, 4);

        assert_eq!(repo.register_content_type("tip").await.unwrap(), known);
        let added = repo.register_content_type("resumen").await.unwrap();

        let types = repo.content_types().await.unwrap();
        assert_eq!(types.len(), 2);
        assert_eq!(types[1].content_type_id, added);
        assert_eq!(types[1].display_order, 5);
        assert!(types[1].accepts_ai());
        // An existing type keeps its flag.
        assert!(!types[0].ai_enabled);
    }

    #[tokio::test]
    async fn failing_reads_surface_as_database_errors() {
        let repo = InMemoryRepository::new();
        repo.set_credential("GOOGLE_API_KEY", "k");
        repo.fail_reads(true);

        assert!(matches!(
            repo.credential("GOOGLE_API_KEY").await,
            Err(AppError::DatabaseError(_))
        ));
    }
}
