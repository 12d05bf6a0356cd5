//! Generation backend client
//!
//! Talks to an Ollama-compatible HTTP API:
//! - `POST {base}/api/generate` with `{model, prompt, system, stream, options}`
//! - `GET {base}/api/tags` for the installed model list
//!
//! The generate response may be a single JSON payload or newline-delimited
//! partial payloads; both are reduced to one string.

use async_trait::async_trait;
use pestwise_common::config::GenerationConfig;
use pestwise_common::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// One generation call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: String,
    /// Intent-specific system preamble
    pub system: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stream: bool,
}

/// External text generation service
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Raw, uncleaned completion text
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;

    /// Installed model ids in `name:tag` form
    async fn list_models(&self) -> Result<Vec<String>>;

    fn name(&self) -> &str;
}

#[derive(Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Deserialize)]
struct TagEntry {
    name: String,
}

/// Reduce a generate response body to its text
pub fn parse_generate_body(body: &str) -> Result<String> {
    let body = body.trim();
    if body.is_empty() {
        return Err(AppError::GenerationInvalidOutput {
            reason: "empty response body".to_string(),
        });
    }

    if let Ok(chunk) = serde_json::from_str::<GenerateChunk>(body) {
        return match chunk.error {
            Some(error) => Err(AppError::GenerationUnavailable { message: error }),
            None => Ok(chunk.response),
        };
    }

    let mut text = String::new();
    for line in body.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let chunk: GenerateChunk =
            serde_json::from_str(line).map_err(|e| AppError::GenerationInvalidOutput {
                reason: format!("malformed stream payload: {}", e),
            })?;
        if let Some(error) = chunk.error {
            return Err(AppError::GenerationUnavailable { message: error });
        }
        text.push_str(&chunk.response);
        if chunk.done {
            break;
        }
    }
    Ok(text)
}

/// HTTP backend for an Ollama-compatible server
pub struct OllamaBackend {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl OllamaBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn from_config(config: &GenerationConfig) -> Result<Self> {
        Self::new(&config.base_url, config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request_error(&self, e: reqwest::Error) -> AppError {
        if e.is_timeout() {
            AppError::GenerationTimeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            AppError::GenerationUnavailable {
                message: format!("request to {} failed: {}", self.base_url, e),
            }
        }
    }
}

#[async_trait]
impl GenerationBackend for OllamaBackend {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateBody {
            model: &request.model,
            prompt: &request.prompt,
            system: request.system.as_deref(),
            stream: request.stream,
            options: GenerateOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::GenerationUnavailable {
                message: format!("backend returned HTTP {}", status.as_u16()),
            });
        }

        let text = response.text().await.map_err(|e| self.request_error(e))?;
        debug!(model = %request.model, bytes = text.len(), "Generation response received");
        parse_generate_body(&text)
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::GenerationUnavailable {
                message: format!("model listing returned HTTP {}", status.as_u16()),
            });
        }

        let tags: TagsResponse = response.json().await.map_err(|e| {
            AppError::GenerationUnavailable {
                message: format!("unreadable model listing: {}", e),
            }
        })?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::testing::spawn_mock;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};

    fn request() -> GenerationRequest {
        GenerationRequest {
            model: "llama3.2".to_string(),
            prompt: "How do I control aphids?".to_string(),
            system: Some("You are an agronomist.".to_string()),
            temperature: 0.3,
            max_tokens: 64,
            stream: false,
        }
    }

    #[test]
    fn test_parse_single_payload() {
        let text = parse_generate_body(r#"{"model":"m","response":"Use neem oil.","done":true}"#);
        assert_eq!(text.unwrap(), "Use neem oil.");
    }

    #[test]
    fn test_parse_ndjson_stream() {
        let body = "{\"response\":\"Use \",\"done\":false}\n\
                    {\"response\":\"neem \",\"done\":false}\n\n\
                    {\"response\":\"oil.\",\"done\":true}\n";
        assert_eq!(parse_generate_body(body).unwrap(), "Use neem oil.");
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse_generate_body("  "),
            Err(AppError::GenerationInvalidOutput { .. })
        ));
        assert!(matches!(
            parse_generate_body("<html>oops</html>"),
            Err(AppError::GenerationInvalidOutput { .. })
        ));
        assert!(matches!(
            parse_generate_body(r#"{"error":"model 'x' not found"}"#),
            Err(AppError::GenerationUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_generate_single_json() {
        let app = Router::new().route(
            "/api/generate",
            post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["model"], "llama3.2");
                assert_eq!(body["options"]["num_predict"], 64);
                assert_eq!(body["system"], "You are an agronomist.");
                Json(serde_json::json!({"response": "Spray neem oil weekly.", "done": true}))
            }),
        );
        let base = spawn_mock(app).await;
        let backend = OllamaBackend::new(&base, Duration::from_secs(5)).unwrap();
        assert_eq!(backend.generate(&request()).await.unwrap(), "Spray neem oil weekly.");
    }

    #[tokio::test]
    async fn test_generate_ndjson() {
        let app = Router::new().route(
            "/api/generate",
            post(|| async {
                "{\"response\":\"Hand-pick \",\"done\":false}\n{\"response\":\"larvae.\",\"done\":true}\n"
            }),
        );
        let base = spawn_mock(app).await;
        let backend = OllamaBackend::new(&base, Duration::from_secs(5)).unwrap();
        let mut req = request();
        req.stream = true;
        assert_eq!(backend.generate(&req).await.unwrap(), "Hand-pick larvae.");
    }

    #[tokio::test]
    async fn test_http_500_is_unavailable() {
        let app = Router::new().route(
            "/api/generate",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let base = spawn_mock(app).await;
        let backend = OllamaBackend::new(&base, Duration::from_secs(5)).unwrap();
        let err = backend.generate(&request()).await.unwrap_err();
        assert!(matches!(err, AppError::GenerationUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_slow_backend_times_out() {
        let app = Router::new().route(
            "/api/generate",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                Json(serde_json::json!({"response": "late", "done": true}))
            }),
        );
        let base = spawn_mock(app).await;
        let backend = OllamaBackend::new(&base, Duration::from_millis(200)).unwrap();
        let err = backend.generate(&request()).await.unwrap_err();
        assert!(matches!(err, AppError::GenerationTimeout { timeout_ms: 200 }));
    }

    #[tokio::test]
    async fn test_list_models() {
        let app = Router::new().route(
            "/api/tags",
            get(|| async {
                Json(serde_json::json!({
                    "models": [{"name": "llama3.2:latest"}, {"name": "mistral:7b"}]
                }))
            }),
        );
        let base = spawn_mock(app).await;
        let backend = OllamaBackend::new(&format!("{}/", base), Duration::from_secs(5)).unwrap();
        assert_eq!(
            backend.list_models().await.unwrap(),
            vec!["llama3.2:latest".to_string(), "mistral:7b".to_string()]
        );
    }

    #[tokio::test]
    async fn test_unreachable_backend() {
        // Nothing listens on port 9 of localhost in the test environment
        let backend = OllamaBackend::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = backend.list_models().await.unwrap_err();
        assert!(err.is_generation_failure());
    }
}
