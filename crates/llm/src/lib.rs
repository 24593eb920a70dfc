//! LLM Extractor crate
//!
//! Houses the chat backend (`backend::ChatBackend`), the deterministic
//! system prompt (`prompt::SystemPromptBuilder`), the four-level JSON
//! recovery strategy (`json_recovery`), and the `Extractor` implementation
//! that ties them together (`extractor::LlmExtractor`).

pub mod backend;
pub mod extractor;
pub mod json_recovery;
pub mod prompt;

pub use backend::{ChatBackend, ChatBackendConfig};
pub use extractor::LlmExtractor;
pub use json_recovery::{recover, Recovered, RecoveryLevel};
pub use prompt::SystemPromptBuilder;

use thiserror::Error;

/// Errors from the LLM collaborator backend, converted into
/// `medirx_core::Error` at the `LanguageModel`/`Extractor` trait boundary.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("network error: {0}")]
    Network(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("rate limited")]
    RateLimit,

    #[error("request timed out")]
    Timeout,

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl From<LlmError> for medirx_core::Error {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::RateLimit | LlmError::Network(_) | LlmError::Timeout => {
                medirx_core::Error::Transient {
                    stage: "llm_extractor",
                    message: err.to_string(),
                }
            }
            LlmError::Api(_) | LlmError::InvalidResponse(_) => {
                medirx_core::Error::Extraction(err.to_string())
            }
            LlmError::Configuration(_) => medirx_core::Error::Configuration(err.to_string()),
        }
    }
}
