//! Wire types for the subset of the Ollama HTTP API this client speaks.
//!
//! Requests and responses are plain JSON; `stream` is always `false` so each
//! generate call yields exactly one response object.

use serde::{Deserialize, Serialize};

/// Body of `POST /api/generate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
}

impl GenerateRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            stream: false,
        }
    }
}

/// Response of a non-streaming `POST /api/generate`.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateResponse {
    pub response: String,
    #[serde(default)]
    pub done: bool,
}

/// Response of `GET /api/tags`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TagsResponse {
    #[serde(default)]
    pub models: Vec<ModelInfo>,
}

/// A locally installed model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub modified_at: Option<String>,
}

impl ModelInfo {
    /// `2024-05-01T10:00:00Z` → `2024-05-01`.
    pub fn modified_date(&self) -> &str {
        self.modified_at
            .as_deref()
            .map(|s| s.split('T').next().unwrap_or(s))
            .unwrap_or("?")
    }

    /// Whether this entry satisfies a user-supplied model name. Ollama treats
    /// a bare name as the `:latest` tag.
    pub fn matches(&self, wanted: &str) -> bool {
        self.name == wanted || (!wanted.contains(':') && self.name == format!("{}:latest", wanted))
    }
}

/// Error body Ollama sends with non-2xx statuses.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Format bytes to human-readable size.
pub fn format_size(bytes: u64) -> String {
    const GB: u64 = 1024 * 1024 * 1024;
    const MB: u64 = 1024 * 1024;

    if bytes >= GB {
        format!("{:.1}GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.0}MB", bytes as f64 / MB as f64)
    } else {
        format!("{}B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_request_is_not_streaming() {
        let json = serde_json::to_value(GenerateRequest::new("llama3.2", "hello")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "model": "llama3.2", "prompt": "hello", "stream": false })
        );
    }

    #[test]
    fn test_generate_response_ignores_extra_fields() {
        let body = r#"{"model":"llama3.2","created_at":"2024-01-01T00:00:00Z","response":"hi","done":true,"context":[1,2,3],"total_duration":12}"#;
        let parsed: GenerateResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.response, "hi");
        assert!(parsed.done);
    }

    #[test]
    fn test_tags_response() {
        let body = r#"{"models":[{"name":"llama3.2:latest","size":2019393189,"modified_at":"2024-10-01T12:00:00.123Z","digest":"abc"}]}"#;
        let parsed: TagsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.models.len(), 1);
        assert_eq!(parsed.models[0].modified_date(), "2024-10-01");
        assert_eq!(format_size(parsed.models[0].size), "1.9GB");
    }

    #[test]
    fn test_model_matches_latest_tag() {
        let info = ModelInfo {
            name: "llama3.2:latest".to_string(),
            size: 0,
            modified_at: None,
        };
        assert!(info.matches("llama3.2"));
        assert!(info.matches("llama3.2:latest"));
        assert!(!info.matches("llama3.2:1b"));
        assert!(!info.matches("llama3"));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512B");
        assert_eq!(format_size(5 * 1024 * 1024), "5MB");
    }
}
