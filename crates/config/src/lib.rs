//! Settings and Medical Knowledge Base loading
//!
//! Supports loading from:
//! - YAML knowledge base tables (one file per table, or none — every table
//!   but the drug gazetteer is optional and defaults to no-op)
//! - Layered settings: defaults, an optional file, `MEDIRX_`-prefixed
//!   environment variables

pub mod knowledge_base;
pub mod settings;

pub use knowledge_base::{
    AdviceTemplate, DangerousCombination, DiagnosisAnatomy, Drug, KnowledgeBase,
    PhoneticCorrection,
};
pub use settings::{LlmSettings, Settings};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("environment error: {0}")]
    Environment(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
