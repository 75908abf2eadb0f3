//! Scripted provider for tests.

use super::CompletionProvider;
use crate::error::ChatError;
use crate::protocol::ModelInfo;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Replays canned results in order and records every event it sees into a
/// shared log, so tests can assert on ordering across provider and output.
pub struct FakeProvider {
    replies: Mutex<VecDeque<Result<String, ChatError>>>,
    models: Vec<ModelInfo>,
    healthy: bool,
    pub log: Arc<Mutex<Vec<String>>>,
}

impl FakeProvider {
    pub fn new(replies: Vec<Result<String, ChatError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            models: vec![ModelInfo {
                name: "llama3.2:latest".to_string(),
                size: 2_019_393_189,
                modified_at: Some("2024-10-01T12:00:00Z".to_string()),
            }],
            healthy: true,
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            healthy: false,
            ..Self::new(Vec::new())
        }
    }

    /// Share the event log with something else, e.g. an output writer.
    pub fn with_log(mut self, log: Arc<Mutex<Vec<String>>>) -> Self {
        self.log = log;
        self
    }

    /// Prompts received, in order.
    pub fn requests(&self) -> Vec<String> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| e.strip_prefix("request:").map(str::to_string))
            .collect()
    }

    fn connection_error(&self) -> ChatError {
        ChatError::Connection {
            host: self.endpoint().to_string(),
            reason: "Connection refused (os error 111)".to_string(),
        }
    }
}

#[async_trait]
impl CompletionProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    fn endpoint(&self) -> &str {
        "http://fake:11434"
    }

    async fn complete(&self, model: &str, prompt: &str) -> Result<String, ChatError> {
        self.log.lock().unwrap().push(format!("request:{}", prompt));
        tokio::task::yield_now().await;
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(format!("{} says nothing", model)));
        self.log.lock().unwrap().push(format!("reply:{}", prompt));
        reply
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, ChatError> {
        if self.healthy {
            Ok(self.models.clone())
        } else {
            Err(self.connection_error())
        }
    }

    async fn health_check(&self) -> Result<(), ChatError> {
        if self.healthy {
            Ok(())
        } else {
            Err(self.connection_error())
        }
    }
}
