//! Transcription output shape
//!
//! Produced once by the Transcriber and never mutated afterwards; the
//! Cleaner and every later stage read `text` and propagate the rest.

use serde::{Deserialize, Serialize};

/// One ASR tier's segment, kept only when the caller asked for raw segments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub text: String,
    pub start_s: f32,
    pub end_s: f32,
}

/// The tier that produced a [`TranscriptionResult`].
///
/// `Degraded` marks a Tier 3 allocation failure that fell back to the best
/// prior tier's result; it is distinct from the three ordinary tiers and
/// must never be treated as "higher" than them by a router or metrics
/// consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TranscriptionTier {
    One,
    Two,
    Three,
    Degraded,
}

impl TranscriptionTier {
    pub fn as_i8(&self) -> i8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::Three => 3,
            Self::Degraded => -1,
        }
    }
}

/// Output of the Transcriber, immutable after production.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionResult {
    pub text: String,
    /// Language as reported by the ASR collaborator, independent of the
    /// pipeline's own Language Detector decision downstream.
    pub whisper_language: String,
    pub transcription_tier: TranscriptionTier,
    pub confidence: f32,
    pub no_speech_prob: f32,
    pub segments: Option<Vec<Segment>>,
    /// Total audio duration in seconds, used for the words-per-minute gate.
    pub audio_duration_s: f32,
}

impl TranscriptionResult {
    /// Words per minute over the full audio duration, the metric used by
    /// the tier-escalation quality gate.
    pub fn words_per_minute(&self) -> f32 {
        if self.audio_duration_s <= 0.0 {
            return 0.0;
        }
        let words = self.text.split_whitespace().count() as f32;
        words / (self.audio_duration_s / 60.0)
    }
}
