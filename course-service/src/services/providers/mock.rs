//! Mock generator for testing.

use super::{CallOutcome, ContentGenerator, ProviderKind};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

#[derive(Debug, Clone)]
enum Scripted {
    Text(String),
    Failure(String),
}

/// A provider call observed by [`MockContentGenerator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub provider: String,
    pub api_key: String,
    pub prompt: String,
}

/// Returns scripted responses per provider name and records every call.
///
/// Providers without a script fail with a generic reason; unsupported names
/// are rejected exactly as the real gateway does.
#[derive(Default)]
pub struct MockContentGenerator {
    scripts: HashMap<String, Scripted>,
    valid_keys: HashSet<String>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockContentGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, provider: &str, text: &str) -> Self {
        self.scripts
            .insert(provider.to_string(), Scripted::Text(text.to_string()));
        self
    }

    pub fn fail(mut self, provider: &str, reason: &str) -> Self {
        self.scripts
            .insert(provider.to_string(), Scripted::Failure(reason.to_string()));
        self
    }

    pub fn accept_key(mut self, api_key: &str) -> Self {
        self.valid_keys.insert(api_key.to_string());
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ContentGenerator for MockContentGenerator {
    async fn call(&self, provider: &str, api_key: &str, prompt: &str) -> CallOutcome {
        if let Err(unsupported) = provider.parse::<ProviderKind>() {
            return CallOutcome::failed(provider, unsupported.to_string());
        }

        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                provider: provider.to_string(),
                api_key: api_key.to_string(),
                prompt: prompt.to_string(),
            });
        }

        match self.scripts.get(provider) {
            Some(Scripted::Text(text)) => CallOutcome::Generated(text.clone()),
            Some(Scripted::Failure(reason)) => CallOutcome::failed(provider, reason.clone()),
            None => CallOutcome::failed(provider, "Mock provider has no scripted response"),
        }
    }

    async fn verify(&self, provider: &str, api_key: &str) -> bool {
        provider.parse::<ProviderKind>().is_ok() && self.valid_keys.contains(api_key)
    }
}
