//! Layered settings: defaults → optional file → `MEDIRX_`-prefixed env vars

use crate::ConfigError;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

fn default_llm_base_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_llm_models() -> Vec<String> {
    vec!["llama3".to_string()]
}
fn default_llm_max_retries() -> u32 {
    2
}
fn default_llm_initial_backoff_ms() -> u64 {
    250
}
fn default_llm_timeout_ms() -> u64 {
    20_000
}
fn default_llm_max_tokens() -> u32 {
    2048
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Sequential fallback list; first model that succeeds wins (§4.8).
    #[serde(default = "default_llm_models")]
    pub models: Vec<String>,
    #[serde(default = "default_llm_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_llm_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_llm_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: u32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            api_key: None,
            models: default_llm_models(),
            max_retries: default_llm_max_retries(),
            initial_backoff_ms: default_llm_initial_backoff_ms(),
            timeout_ms: default_llm_timeout_ms(),
            max_tokens: default_llm_max_tokens(),
        }
    }
}

fn default_asr_base_url() -> String {
    "http://localhost:9000".to_string()
}
fn default_asr_timeout_ms() -> u64 {
    15_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsrSettings {
    #[serde(default = "default_asr_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_asr_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for AsrSettings {
    fn default() -> Self {
        Self {
            base_url: default_asr_base_url(),
            api_key: None,
            timeout_ms: default_asr_timeout_ms(),
        }
    }
}

fn default_handoff_path() -> String {
    "/tmp/medirx-handoff.json".to_string()
}
fn default_metrics_path() -> String {
    "/tmp/medirx-metrics.ndjson".to_string()
}

/// Process-wide settings, loaded once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Directory of Medical Knowledge Base YAML tables. `None` means use
    /// the built-in default gazetteer.
    #[serde(default)]
    pub kb_dir: Option<String>,
    #[serde(default = "default_handoff_path")]
    pub handoff_path: String,
    #[serde(default = "default_metrics_path")]
    pub metrics_path: String,
    #[serde(default)]
    pub llm: LlmSettings,
    #[serde(default)]
    pub asr: AsrSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            kb_dir: None,
            handoff_path: default_handoff_path(),
            metrics_path: default_metrics_path(),
            llm: LlmSettings::default(),
            asr: AsrSettings::default(),
        }
    }
}

impl Settings {
    /// Load an optional file at `path`, then `MEDIRX_`-prefixed environment
    /// variables (double-underscore separated for nesting, e.g.
    /// `MEDIRX_LLM__BASE_URL`), falling back to the `#[serde(default)]`
    /// values above for anything neither source sets.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path).required(false));
        }

        builder = builder.add_source(
            Environment::with_prefix("MEDIRX")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize().map_err(ConfigError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_loadable_without_a_file() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.llm.models, vec!["llama3".to_string()]);
        assert!(settings.kb_dir.is_none());
    }

    #[test]
    fn env_var_overrides_default_llm_base_url() {
        std::env::set_var("MEDIRX_LLM__BASE_URL", "http://example.internal:8080");
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.llm.base_url, "http://example.internal:8080");
        std::env::remove_var("MEDIRX_LLM__BASE_URL");
    }

    #[test]
    fn file_source_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        std::fs::write(&path, "handoff_path: /var/run/medirx/handoff.json\n").unwrap();
        let settings = Settings::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(settings.handoff_path, "/var/run/medirx/handoff.json");
    }
}
