//! Tiered transcription and transcript cleaning
//!
//! The first two stages of the pipeline (§2): the Transcriber drives the
//! ASR collaborator through an escalating three-tier policy, and the
//! Transcript Cleaner applies the Knowledge Base's ordered correction list
//! to whatever text comes out.

pub mod asr_http;
pub mod audio_duration;
pub mod cleaner;
pub mod error;
pub mod transcriber;

pub use asr_http::{HttpAsr, HttpAsrConfig};
pub use audio_duration::wav_duration_seconds;
pub use cleaner::{CleanedTranscript, TranscriptCleaner};
pub use error::PipelineError;
pub use transcriber::{Tier3Guard, Transcriber};
