//! [`TextGenerator`] – the text-generation seam – and [`OllamaDriver`].
//!
//! Departments only see the trait.  The production implementation talks to
//! a locally running [Ollama](https://ollama.com) server:
//!
//! | call | endpoint | timeout |
//! |---|---|---|
//! | [`TextGenerator::generate`] | `POST /api/generate` `{model, prompt, system?, stream: false}` → `{response}` | 30 s |
//! | [`TextGenerator::is_available`] | `GET /api/tags` | 5 s |
//!
//! Successful generations are cached by `(model, system, prompt)`; a repeat
//! of the same prompt returns without a network round trip.
//!
//! # Example
//!
//! ```rust,no_run
//! use ark_runtime::llm_driver::{OllamaDriver, TextGenerator};
//!
//! # async fn demo() -> Result<(), ark_runtime::LlmError> {
//! let driver = OllamaDriver::new("http://localhost:11434", "llama3:8b");
//! if driver.is_available().await {
//!     let text = driver.generate("Summarise today's work.", Some("Be brief.")).await?;
//!     println!("{text}");
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum LlmError {
    /// Connection failure or timeout.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Model {model} requires more memory than available")]
    InsufficientMemory { model: String },
    #[error("Model {model} failed to load: {detail}")]
    ModelLoad { model: String, detail: String },
    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Unexpected response format: {0}")]
    BadResponse(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Anything that can turn a prompt into text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, system: Option<&str>) -> Result<String, LlmError>;

    /// Cheap health probe consulted before each department call.
    async fn is_available(&self) -> bool;

    fn model(&self) -> &str;
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration / statistics
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct DriverConfig {
    pub timeout: Duration,
    pub probe_timeout: Duration,
    /// Maximum cached generations; the oldest is dropped first.
    pub cache_limit: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(5),
            cache_limit: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverStats {
    pub model: String,
    pub requests: u64,
    pub errors: u64,
    pub cache_size: usize,
    pub success_rate: f64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire shapes
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// OllamaDriver
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct ResponseCache {
    entries: HashMap<String, String>,
    order: VecDeque<String>,
}

pub struct OllamaDriver {
    base_url: String,
    model: String,
    config: DriverConfig,
    client: reqwest::Client,
    cache: Mutex<ResponseCache>,
    requests: AtomicU64,
    errors: AtomicU64,
}

impl OllamaDriver {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_config(base_url, model, DriverConfig::default())
    }

    pub fn with_config(base_url: impl Into<String>, model: impl Into<String>, config: DriverConfig) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            config,
            // Ollama is a local service; never route it through a system proxy.
            client: reqwest::Client::builder()
                .no_proxy()
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            cache: Mutex::new(ResponseCache::default()),
            requests: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    pub fn stats(&self) -> DriverStats {
        let requests = self.requests.load(Ordering::Relaxed);
        let errors = self.errors.load(Ordering::Relaxed);
        DriverStats {
            model: self.model.clone(),
            requests,
            errors,
            cache_size: self.cache().entries.len(),
            success_rate: requests.saturating_sub(errors) as f64 / requests.max(1) as f64,
        }
    }

    fn cache(&self) -> MutexGuard<'_, ResponseCache> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn cache_key(&self, prompt: &str, system: Option<&str>) -> String {
        format!("{}\u{1f}{}\u{1f}{}", self.model, system.unwrap_or_default(), prompt)
    }

    fn remember(&self, key: String, text: String) {
        if self.config.cache_limit == 0 {
            return;
        }
        let mut cache = self.cache();
        if cache.entries.contains_key(&key) {
            return;
        }
        while cache.entries.len() >= self.config.cache_limit {
            let Some(oldest) = cache.order.pop_front() else { break };
            cache.entries.remove(&oldest);
        }
        cache.order.push_back(key.clone());
        cache.entries.insert(key, text);
    }

    async fn request(&self, prompt: &str, system: Option<&str>) -> Result<String, LlmError> {
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            system,
        };
        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .timeout(self.config.timeout)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(&self.model, status, body));
        }
        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| LlmError::BadResponse(e.to_string()))?;
        Ok(parsed.response)
    }
}

fn classify_failure(model: &str, status: StatusCode, body: String) -> LlmError {
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        if body.to_lowercase().contains("memory") {
            LlmError::InsufficientMemory {
                model: model.to_string(),
            }
        } else {
            LlmError::ModelLoad {
                model: model.to_string(),
                detail: body,
            }
        }
    } else {
        LlmError::Status {
            status: status.as_u16(),
            body,
        }
    }
}

#[async_trait]
impl TextGenerator for OllamaDriver {
    async fn generate(&self, prompt: &str, system: Option<&str>) -> Result<String, LlmError> {
        let key = self.cache_key(prompt, system);
        if let Some(hit) = self.cache().entries.get(&key).cloned() {
            debug!(model = %self.model, "generation served from cache");
            return Ok(hit);
        }

        self.requests.fetch_add(1, Ordering::Relaxed);
        match self.request(prompt, system).await {
            Ok(text) => {
                self.remember(key, text.clone());
                Ok(text)
            }
            Err(e) => {
                self.errors.fetch_add(1, Ordering::Relaxed);
                warn!(model = %self.model, error = %e, "text generation failed");
                Err(e)
            }
        }
    }

    async fn is_available(&self) -> bool {
        self.client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(self.config.probe_timeout)
            .send()
            .await
            .is_ok_and(|r| r.status().is_success())
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve exactly one HTTP response, then close.  Returns the base URL.
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            read_request(&mut socket).await;
            let reply = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(reply.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });
        format!("http://{addr}")
    }

    /// Consume headers and the declared body so closing never resets the peer.
    async fn read_request(socket: &mut tokio::net::TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    return;
                }
            }
        }
    }

    #[tokio::test]
    async fn generate_returns_response_text_and_caches_it() {
        let url = serve_once("200 OK", r#"{"response":"all systems nominal","done":true}"#).await;
        let driver = OllamaDriver::new(url, "llama3:8b");

        let text = driver.generate("status?", Some("be brief")).await.unwrap();
        assert_eq!(text, "all systems nominal");
        // The server is gone; only the cache can answer now.
        let again = driver.generate("status?", Some("be brief")).await.unwrap();
        assert_eq!(again, text);

        let stats = driver.stats();
        assert_eq!(stats.requests, 1);
        assert_eq!(stats.errors, 0);
        assert_eq!(stats.cache_size, 1);
        assert_eq!(stats.success_rate, 1.0);
    }

    #[tokio::test]
    async fn server_error_mentioning_memory_is_insufficient_memory() {
        let url = serve_once(
            "500 Internal Server Error",
            r#"{"error":"model requires more system memory (9.1 GiB) than is available"}"#,
        )
        .await;
        let driver = OllamaDriver::new(url, "deepseek-coder-v2:latest");
        let err = driver.generate("x", None).await.unwrap_err();
        assert!(matches!(err, LlmError::InsufficientMemory { ref model } if model == "deepseek-coder-v2:latest"));
        assert_eq!(driver.stats().errors, 1);
        assert_eq!(driver.stats().cache_size, 0);
    }

    #[tokio::test]
    async fn malformed_body_is_bad_response() {
        let url = serve_once("200 OK", r#"{"unexpected":true}"#).await;
        let driver = OllamaDriver::new(url, "llama3:8b");
        let err = driver.generate("x", None).await.unwrap_err();
        assert!(matches!(err, LlmError::BadResponse(_)));
    }

    #[tokio::test]
    async fn probe_reports_server_presence() {
        let url = serve_once("200 OK", r#"{"models":[]}"#).await;
        assert!(OllamaDriver::new(url, "llama3:8b").is_available().await);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let closed = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);
        let driver = OllamaDriver::new(closed, "llama3:8b");
        assert!(!driver.is_available().await);
        assert!(matches!(driver.generate("x", None).await, Err(LlmError::Http(_))));
        assert_eq!(driver.stats().success_rate, 0.0);
    }

    #[test]
    fn classify_failure_distinguishes_statuses() {
        let load = classify_failure("m", StatusCode::INTERNAL_SERVER_ERROR, "bad gguf".into());
        assert!(matches!(load, LlmError::ModelLoad { .. }));
        let other = classify_failure("m", StatusCode::NOT_FOUND, "no such model".into());
        assert!(matches!(other, LlmError::Status { status: 404, .. }));
    }

    #[test]
    fn cache_drops_oldest_beyond_limit() {
        let driver = OllamaDriver::with_config(
            "http://localhost:11434",
            "llama3:8b",
            DriverConfig {
                cache_limit: 2,
                ..DriverConfig::default()
            },
        );
        for prompt in ["a", "b", "c"] {
            driver.remember(driver.cache_key(prompt, None), prompt.to_uppercase());
        }
        let cache = driver.cache();
        assert_eq!(cache.entries.len(), 2);
        assert!(!cache.entries.contains_key(&driver.cache_key("a", None)));
    }

    #[test]
    fn cache_key_separates_system_prompts() {
        let driver = OllamaDriver::new("http://localhost:11434/", "llama3:8b");
        assert_ne!(driver.cache_key("p", Some("s1")), driver.cache_key("p", Some("s2")));
        assert_eq!(driver.base_url, "http://localhost:11434");
    }
}
