//! Ollama discovery for the startup probe and `/models`.
//!
//! Queries `/api/tags` with a short timeout so an absent server does not
//! stall the prompt.

use serde::Deserialize;
use std::time::Duration;

const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// A locally downloaded model as listed by `/api/tags`.
#[derive(Debug, Clone, Deserialize)]
pub struct OllamaModel {
    pub name: String,
    /// Size on disk in bytes.
    #[serde(default)]
    pub size: u64,
}

impl OllamaModel {
    pub fn size_gb(&self) -> f64 {
        self.size as f64 / 1_000_000_000.0
    }
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<OllamaModel>,
}

/// List the models available on the Ollama server at `base_url`.
pub fn fetch_models(base_url: &str) -> Result<Vec<OllamaModel>, String> {
    let url = format!("{}/api/tags", base_url.trim_end_matches('/'));
    let client = reqwest::blocking::Client::builder()
        .timeout(PROBE_TIMEOUT)
        .no_proxy()
        .build()
        .map_err(|e| format!("Failed to build HTTP client: {}", e))?;
    let response = client
        .get(&url)
        .send()
        .map_err(|e| format!("Ollama unreachable at {}: {}", url, e))?;

    if !response.status().is_success() {
        return Err(format!("Ollama returned HTTP {}", response.status()));
    }
    let body = response
        .text()
        .map_err(|e| format!("Failed to read Ollama response: {}", e))?;
    parse_tags(&body)
}

fn parse_tags(body: &str) -> Result<Vec<OllamaModel>, String> {
    serde_json::from_str::<TagsResponse>(body)
        .map(|tags| tags.models)
        .map_err(|e| format!("Failed to parse Ollama response: {}", e))
}

/// `true` when `wanted` is among `models`.  An untagged name matches its
/// `:latest` variant.
pub fn has_model(models: &[OllamaModel], wanted: &str) -> bool {
    models.iter().any(|m| {
        m.name == wanted || (!wanted.contains(':') && m.name.strip_suffix(":latest") == Some(wanted))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(name: &str) -> OllamaModel {
        OllamaModel {
            name: name.to_string(),
            size: 0,
        }
    }

    #[test]
    fn parse_tags_reads_names_and_sizes() {
        let body = r#"{"models":[{"name":"llama3:8b","size":4661224676},{"name":"mistral:latest"}]}"#;
        let models = parse_tags(body).unwrap();
        assert_eq!(models.len(), 2);
        assert_eq!(models[0].name, "llama3:8b");
        assert!((models[0].size_gb() - 4.661).abs() < 0.001);
        assert_eq!(models[1].size, 0);
    }

    #[test]
    fn parse_tags_rejects_garbage() {
        assert!(parse_tags("<html>").is_err());
        assert!(parse_tags("{}").unwrap().is_empty());
    }

    #[test]
    fn has_model_matches_latest_alias() {
        let models = vec![model("mistral:latest"), model("llama3:8b")];
        assert!(has_model(&models, "mistral"));
        assert!(has_model(&models, "llama3:8b"));
        assert!(!has_model(&models, "llama3"));
        assert!(!has_model(&models, "mistral:7b"));
    }

    #[test]
    fn fetch_models_reports_unreachable_server() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);
        assert!(fetch_models(&url).unwrap_err().starts_with("Ollama unreachable"));
    }
}
