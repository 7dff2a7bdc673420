//! Settings file – reads/writes `~/.ark/config.toml`.

use ark_runtime::BrainConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Persisted user configuration stored in `~/.ark/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the Ollama instance.
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    /// Model used by every department except the Engineer.
    #[serde(default = "default_model")]
    pub default_model: String,

    #[serde(default = "default_coder_model")]
    pub coder_model: String,

    /// SQLite file for long-term memory.  Unset keeps memories in RAM.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_db: Option<String>,

    /// Minimum seconds between two recomputed meta reports.
    #[serde(default = "default_analysis_interval_secs")]
    pub analysis_interval_secs: u64,

    /// Consensus confidence below which a review is queued.
    #[serde(default = "default_follow_up_threshold")]
    pub follow_up_threshold: f64,
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_model() -> String {
    "llama3:8b".to_string()
}
fn default_coder_model() -> String {
    "deepseek-coder-v2:latest".to_string()
}
fn default_analysis_interval_secs() -> u64 {
    3600
}
fn default_follow_up_threshold() -> f64 {
    0.7
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ollama_url: default_ollama_url(),
            default_model: default_model(),
            coder_model: default_coder_model(),
            memory_db: None,
            analysis_interval_secs: default_analysis_interval_secs(),
            follow_up_threshold: default_follow_up_threshold(),
        }
    }
}

impl Config {
    /// Translate the on-disk settings into the orchestrator's config.
    pub fn brain_config(&self) -> BrainConfig {
        let mut brain = BrainConfig {
            ollama_url: self.ollama_url.clone(),
            default_model: self.default_model.clone(),
            coder_model: self.coder_model.clone(),
            persistence_path: self.memory_db.clone(),
            follow_up_threshold: self.follow_up_threshold.clamp(0.0, 1.0),
            ..BrainConfig::default()
        };
        brain.observer.analysis_interval = Duration::from_secs(self.analysis_interval_secs);
        brain
    }
}

/// Return the path to `~/.ark/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(&home_dir())
}

/// Default location for the memory database: `~/.ark/memory.db`.
pub fn default_memory_db() -> PathBuf {
    PathBuf::from(home_dir()).join(".ark").join("memory.db")
}

fn home_dir() -> String {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string())
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".ark").join("config.toml")
}

/// Load the config from disk and apply `ARK_*` overrides.  Returns `None`
/// if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    let mut cfg = load_from(&config_path())?;
    if let Some(cfg) = cfg.as_mut() {
        apply_env_overrides(cfg);
    }
    Ok(cfg)
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config = toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    Ok(Some(cfg))
}

/// Apply `ARK_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `ARK_OLLAMA_URL` | `ollama_url` |
/// | `ARK_MODEL` | `default_model` |
/// | `ARK_CODER_MODEL` | `coder_model` |
/// | `ARK_MEMORY_DB` | `memory_db` |
/// | `ARK_ANALYSIS_INTERVAL_SECS` | `analysis_interval_secs` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("ARK_OLLAMA_URL") {
        cfg.ollama_url = v;
    }
    if let Ok(v) = std::env::var("ARK_MODEL") {
        cfg.default_model = v;
    }
    if let Ok(v) = std::env::var("ARK_CODER_MODEL") {
        cfg.coder_model = v;
    }
    if let Ok(v) = std::env::var("ARK_MEMORY_DB") {
        cfg.memory_db = Some(v).filter(|p| !p.trim().is_empty());
    }
    if let Ok(v) = std::env::var("ARK_ANALYSIS_INTERVAL_SECS")
        && let Ok(secs) = v.parse::<u64>()
    {
        cfg.analysis_interval_secs = secs;
    }
}

/// Save the config to disk, creating `~/.ark/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw = toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    // Memories and model endpoints are private to the owner.
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw).map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saved_config_loads_back() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        let cfg = Config {
            memory_db: Some("/tmp/ark.db".into()),
            follow_up_threshold: 0.55,
            ..Config::default()
        };
        save_to(&cfg, &path).expect("save");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.memory_db.as_deref(), Some("/tmp/ark.db"));
        assert_eq!(loaded.follow_up_threshold, 0.55);
        assert_eq!(loaded.coder_model, "deepseek-coder-v2:latest");
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "default_model = \"mistral\"\n").unwrap();

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.default_model, "mistral");
        assert_eq!(loaded.ollama_url, "http://localhost:11434");
        assert_eq!(loaded.analysis_interval_secs, 3600);
        assert!(loaded.memory_db.is_none());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "follow_up_threshold = \"high\"").unwrap();
        assert!(load_from(&path).unwrap_err().starts_with("Failed to parse config"));
    }

    #[cfg(unix)]
    #[test]
    fn config_file_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        save_to(&Config::default(), &path).expect("save");

        let file_mode = fs::metadata(&path).expect("file metadata").permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600);
        let dir_mode = fs::metadata(path.parent().unwrap()).expect("dir metadata").permissions().mode() & 0o777;
        assert_eq!(dir_mode, 0o700);
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn brain_config_carries_settings() {
        let cfg = Config {
            default_model: "mistral".into(),
            analysis_interval_secs: 60,
            follow_up_threshold: 1.4,
            ..Config::default()
        };
        let brain = cfg.brain_config();
        assert_eq!(brain.default_model, "mistral");
        assert_eq!(brain.observer.analysis_interval, Duration::from_secs(60));
        assert_eq!(brain.follow_up_threshold, 1.0);
        assert!(brain.persistence_path.is_none());
    }

    #[test]
    fn apply_env_overrides_changes_models() {
        // SAFETY: single-threaded test; no other test reads these env-vars.
        unsafe {
            std::env::set_var("ARK_MODEL", "mistral");
            std::env::set_var("ARK_CODER_MODEL", "codellama");
        }
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.default_model, "mistral");
        assert_eq!(cfg.coder_model, "codellama");
        unsafe {
            std::env::remove_var("ARK_MODEL");
            std::env::remove_var("ARK_CODER_MODEL");
        }
    }

    #[test]
    fn apply_env_overrides_blank_memory_db_means_in_memory() {
        // SAFETY: single-threaded test; no other test reads this env-var.
        unsafe { std::env::set_var("ARK_MEMORY_DB", " ") };
        let mut cfg = Config {
            memory_db: Some("/var/ark.db".into()),
            ..Config::default()
        };
        apply_env_overrides(&mut cfg);
        assert!(cfg.memory_db.is_none());
        unsafe { std::env::remove_var("ARK_MEMORY_DB") };
    }

    #[test]
    fn apply_env_overrides_ignores_invalid_interval() {
        // SAFETY: single-threaded test; no other test reads this env-var.
        unsafe { std::env::set_var("ARK_ANALYSIS_INTERVAL_SECS", "hourly") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.analysis_interval_secs, 3600);
        unsafe { std::env::remove_var("ARK_ANALYSIS_INTERVAL_SECS") };
    }
}
