//! ASR collaborator interface
//!
//! The production speech-to-text service lives outside this workspace
//! (§1 Out-of-scope); this trait is the seam the Transcriber drives it
//! through, with a [`MockAsr`] test double standing in for it in tests.

use crate::error::Result;
use crate::language::Language;
use async_trait::async_trait;

/// Whether to ask the ASR collaborator to transcribe in the source
/// language or translate into English. The pipeline always transcribes;
/// `Translate` exists so the trait documents the collaborator's full
/// contract (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsrMode {
    Transcribe,
    Translate,
}

/// One ASR call's raw result, before the Transcriber wraps it into a
/// [`crate::transcript::TranscriptionResult`] with a tier label.
#[derive(Debug, Clone)]
pub struct AsrOutput {
    pub text: String,
    pub language: String,
    pub no_speech_prob: f32,
    pub confidence: f32,
}

/// Speech-to-text collaborator.
///
/// Implementations: an HTTP adapter calling out to the production ASR
/// service, and `MockAsr` for tests.
#[async_trait]
pub trait SpeechToText: Send + Sync + 'static {
    /// Transcribe `audio_ref` (a path or byte buffer reference string),
    /// optionally hinted with a language, in the given mode.
    async fn transcribe(
        &self,
        audio_ref: &str,
        hint: Option<Language>,
        mode: AsrMode,
        model: AsrModel,
    ) -> Result<AsrOutput>;

    /// Ensure `model` is resident before the first call that needs it.
    /// The base model is assumed always loaded; the high-capacity medium
    /// model is lazy — the default implementation is a no-op for
    /// collaborators that load eagerly or on demand.
    async fn ensure_loaded(&self, _model: AsrModel) -> Result<()> {
        Ok(())
    }

    fn model_name(&self) -> &str;
}

/// Which ASR model tier to invoke; mirrors the Transcriber's tier policy
/// rather than naming a specific vendor model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsrModel {
    Base,
    Medium,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub struct MockAsr {
        pub calls: AtomicUsize,
    }

    impl MockAsr {
        pub fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SpeechToText for MockAsr {
        async fn transcribe(
            &self,
            _audio_ref: &str,
            _hint: Option<Language>,
            _mode: AsrMode,
            _model: AsrModel,
        ) -> Result<AsrOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(AsrOutput {
                text: "take paracetamol 500 mg twice daily".to_string(),
                language: "en".to_string(),
                no_speech_prob: 0.05,
                confidence: 0.9,
            })
        }

        fn model_name(&self) -> &str {
            "mock-asr"
        }
    }

    #[tokio::test]
    async fn mock_asr_counts_calls() {
        let asr = MockAsr::new();
        let _ = asr
            .transcribe("ref.wav", None, AsrMode::Transcribe, AsrModel::Base)
            .await
            .unwrap();
        assert_eq!(asr.calls.load(Ordering::SeqCst), 1);
    }
}
