//! Audio input to the pipeline
//!
//! A single invocation owns one [`AudioInput`] for its whole lifetime; no
//! stage mutates it.

use crate::language::Language;
use std::path::PathBuf;

/// Reference to the consultation recording, either on disk or in memory.
#[derive(Debug, Clone)]
pub enum AudioSource {
    Path(PathBuf),
    Bytes {
        data: Vec<u8>,
        mime: String,
    },
}

/// Audio plus the options that accompany a single `process()` invocation.
#[derive(Debug, Clone)]
pub struct AudioInput {
    pub source: AudioSource,
    /// Caller-supplied language hint, when known in advance.
    pub hint_language: Option<Language>,
}

impl AudioInput {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            source: AudioSource::Path(path.into()),
            hint_language: None,
        }
    }

    pub fn from_bytes(data: Vec<u8>, mime: impl Into<String>) -> Self {
        Self {
            source: AudioSource::Bytes {
                data,
                mime: mime.into(),
            },
            hint_language: None,
        }
    }

    pub fn with_hint_language(mut self, language: Language) -> Self {
        self.hint_language = Some(language);
        self
    }

    /// A short reference string for logging and metrics, never the raw bytes.
    pub fn reference(&self) -> String {
        match &self.source {
            AudioSource::Path(path) => path.display().to_string(),
            AudioSource::Bytes { mime, data } => format!("<{} bytes, {}>", data.len(), mime),
        }
    }
}

/// Per-invocation knobs recognized by `process()`.
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    pub hint_language: Option<Language>,
    pub max_tier: u8,
    pub llm_enabled: bool,
    pub timeout_ms: u64,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            hint_language: None,
            max_tier: 3,
            llm_enabled: true,
            timeout_ms: 30_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_never_includes_raw_bytes() {
        let input = AudioInput::from_bytes(vec![0u8; 128], "audio/wav");
        let reference = input.reference();
        assert!(reference.contains("128 bytes"));
        assert!(!reference.contains('\0'));
    }

    #[test]
    fn default_options_allow_all_tiers() {
        let opts = ProcessOptions::default();
        assert_eq!(opts.max_tier, 3);
        assert!(opts.llm_enabled);
    }
}
