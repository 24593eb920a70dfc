//! Aggregate error type surfaced by `process()`
//!
//! Each stage crate defines its own narrow `thiserror` enum. This module
//! gives callers of the pipeline entry point one stable error shape with a
//! `kind` and a `retriable` bit, per the error-taxonomy design in the spec.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable, serializable error kind surfaced across the process boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Transcription,
    Extraction,
    Timeout,
    Transient,
}

/// Top-level pipeline error
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Missing or malformed Medical Knowledge Base / credentials. Fatal at
    /// process start.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// No transcription tier produced any text.
    #[error("transcription error: {0}")]
    Transcription(String),

    /// Both the LLM extractor (all models) and the Rule extractor returned
    /// an empty shell.
    #[error("extraction error: {0}")]
    Extraction(String),

    /// A stage-local operation exceeded its timeout budget and no
    /// fallback was available.
    #[error("timeout in stage {stage}")]
    Timeout { stage: &'static str },

    /// Transient collaborator failure (rate limit / network) that
    /// exhausted its retry budget.
    #[error("transient error in stage {stage}: {message}")]
    Transient { stage: &'static str, message: String },

    /// The caller's cancellation signal was observed at a stage boundary
    /// (§5). Not one of the taxonomy's primary five failure shapes, but
    /// surfaced the same way: stable kind, retriable, no persistence
    /// side effects beyond metrics for stages that already completed.
    #[error("cancelled at stage {stage}")]
    Cancelled { stage: &'static str },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Transcription(_) => ErrorKind::Transcription,
            Self::Extraction(_) => ErrorKind::Extraction,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Transient { .. } => ErrorKind::Transient,
            Self::Cancelled { .. } => ErrorKind::Timeout,
        }
    }

    /// Whether a caller may reasonably retry the whole invocation.
    pub fn retriable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Transient { .. } | Self::Cancelled { .. })
    }

    /// The stage name this error originated in, when known.
    pub fn stage(&self) -> Option<&'static str> {
        match self {
            Self::Timeout { stage } | Self::Transient { stage, .. } | Self::Cancelled { stage } => {
                Some(stage)
            }
            _ => None,
        }
    }
}

/// Structured failure object returned to the caller (§7 "User-visible
/// failure").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureReport {
    pub kind: ErrorKind,
    pub stage: Option<&'static str>,
    pub message: String,
    pub retriable: bool,
}

impl From<&Error> for FailureReport {
    fn from(err: &Error) -> Self {
        Self {
            kind: err.kind(),
            stage: err.stage(),
            message: err.to_string(),
            retriable: err.retriable(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_errors_are_not_retriable() {
        let err = Error::Configuration("missing gazetteer".into());
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(!err.retriable());
    }

    #[test]
    fn transient_errors_are_retriable_and_carry_stage() {
        let err = Error::Transient {
            stage: "llm_extractor",
            message: "rate limited".into(),
        };
        assert!(err.retriable());
        assert_eq!(err.stage(), Some("llm_extractor"));
    }

    #[test]
    fn failure_report_round_trips_through_serde() {
        let err = Error::Extraction("all models failed".into());
        let report: FailureReport = (&err).into();
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"kind\":\"extraction\""));
    }
}
