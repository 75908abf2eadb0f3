//! Ollama backend implementation.
//!
//! Talks to a local Ollama server over its HTTP API.

use super::CompletionProvider;
use crate::error::ChatError;
use crate::protocol::{ErrorBody, GenerateRequest, GenerateResponse, ModelInfo, TagsResponse};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use tracing::debug;

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Ollama provider for local LLM inference.
pub struct OllamaProvider {
    host: String,
    client: Client,
}

impl OllamaProvider {
    /// Create a new Ollama provider with a request timeout.
    pub fn new(host: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self::with_client(host, client))
    }

    /// Create a provider around an existing HTTP client.
    pub fn with_client(host: String, client: Client) -> Self {
        Self { host, client }
    }

    async fn fetch_tags(&self, timeout: Option<Duration>) -> Result<TagsResponse, ChatError> {
        let url = format!("{}/api/tags", self.host);
        let mut request = self.client.get(&url);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let body = self.success_body(response).await?;
        serde_json::from_str(&body)
            .map_err(|e| ChatError::Response(format!("malformed model list: {}", e)))
    }

    /// Return the body of a 2xx response, or turn the status into an error.
    async fn success_body(&self, response: Response) -> Result<String, ChatError> {
        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(status_error(status, &body))
        }
    }

    fn transport_error(&self, err: reqwest::Error) -> ChatError {
        if err.is_timeout() {
            ChatError::Connection {
                host: self.host.clone(),
                reason: "request timed out".to_string(),
            }
        } else if err.is_connect() {
            ChatError::Connection {
                host: self.host.clone(),
                reason: root_cause(&err),
            }
        } else {
            ChatError::Response(root_cause(&err))
        }
    }
}

#[async_trait]
impl CompletionProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn endpoint(&self) -> &str {
        &self.host
    }

    async fn complete(&self, model: &str, prompt: &str) -> Result<String, ChatError> {
        let url = format!("{}/api/generate", self.host);
        let request = GenerateRequest::new(model, prompt);

        debug!(model, prompt_len = prompt.len(), "sending generate request");
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let body = self.success_body(response).await?;
        let generated: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| ChatError::Response(format!("malformed reply: {}", e)))?;

        let reply = generated.response.trim();
        if reply.is_empty() {
            return Err(ChatError::Response("server returned an empty reply".to_string()));
        }
        debug!(reply_len = reply.len(), done = generated.done, "received reply");
        Ok(reply.to_string())
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, ChatError> {
        Ok(self.fetch_tags(None).await?.models)
    }

    async fn health_check(&self) -> Result<(), ChatError> {
        self.fetch_tags(Some(HEALTH_CHECK_TIMEOUT)).await.map(|_| ())
    }
}

/// Build an error for a non-2xx status, preferring Ollama's own message.
fn status_error(status: StatusCode, body: &str) -> ChatError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|e| e.error)
        .unwrap_or_else(|_| body.trim().to_string());
    if message.is_empty() {
        ChatError::Response(format!("status {}", status))
    } else {
        ChatError::Response(format!("status {}: {}", status, message))
    }
}

/// The innermost error in a source chain, which is the one that says what
/// actually happened ("Connection refused" rather than "error sending request").
fn root_cause(err: &(dyn std::error::Error + 'static)) -> String {
    let mut current = err;
    while let Some(source) = current.source() {
        current = source;
    }
    current.to_string()
}
