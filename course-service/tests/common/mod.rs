//! Common test utilities for course-service integration tests.

#![allow(dead_code)]

use course_service::services::generation::{Orchestrator, ProgressEvent};
use course_service::services::providers::mock::MockContentGenerator;
use course_service::services::InMemoryRepository;
use course_service::{router, AppState};
use std::sync::{Arc, Once};
use std::time::Duration;
use tokio::sync::mpsc;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,course_service=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// A unit with one topic, `"1.2 - Variables"`.
pub struct Fixture {
    pub repo: Arc<InMemoryRepository>,
    pub topic_id: i64,
}

impl Fixture {
    pub fn new() -> Self {
        init_tracing();
        let repo = Arc::new(InMemoryRepository::new());
        let unit_id = repo.add_unit("Fundamentos de programación");
        let topic_id = repo.add_topic(unit_id, "1.2", "1.2 - Variables");
        Self { repo, topic_id }
    }

    /// Adds AI-enabled content types in the given order.
    pub fn with_types(self, types: &[&str]) -> Self {
        for (index, description) in types.iter().enumerate() {
            self.repo
                .add_content_type(description, true, index as i32 + 1);
        }
        self
    }

    /// Stores a key for each provider, e.g. `&["Gemini", "OpenAI"]`.
    pub fn with_keys(self, providers: &[&str]) -> Self {
        for provider in providers {
            let key = match *provider {
                "Gemini" => "GOOGLE_API_KEY",
                "Claude" => "ANTHROPIC_API_KEY",
                "OpenAI" => "OPENAI_API_KEY",
                "DeepSeek" => "DEEPSEEK_API_KEY",
                other => panic!("unknown provider {}", other),
            };
            self.repo
                .set_credential(key, &format!("{}-key", provider.to_lowercase()));
        }
        self
    }

    pub fn orchestrator(&self, generator: Arc<MockContentGenerator>) -> Orchestrator {
        Orchestrator::new(self.repo.clone(), generator, Duration::ZERO)
    }

    pub fn app(&self, generator: Arc<MockContentGenerator>) -> axum::Router {
        router(AppState::new(self.repo.clone(), generator, Duration::ZERO))
    }
}

/// Drain every event of a finished run.
pub async fn collect_events(mut rx: mpsc::Receiver<ProgressEvent>) -> Vec<ProgressEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

pub fn count_kind(events: &[ProgressEvent], kind: &str) -> usize {
    events.iter().filter(|e| e.kind() == kind).count()
}
