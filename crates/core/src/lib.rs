//! Core types and trait seams for the prescription extraction pipeline
//!
//! This crate has no stage logic of its own. It provides:
//! - The data model every stage reads and writes (§3): audio input,
//!   transcription result, language decision, and the `Prescription`
//!   output schema.
//! - The aggregate `Error` type stage crates convert their own errors into.
//! - The trait seams (`SpeechToText`, `LanguageModel`, `Extractor`) that let
//!   the ASR collaborator, LLM collaborator, and the three extractors be
//!   swapped or mocked without touching calling code.

pub mod audio;
pub mod cancel;
pub mod error;
pub mod language;
pub mod llm_types;
pub mod prescription;
pub mod traits;
pub mod transcript;

pub use audio::{AudioInput, AudioSource, ProcessOptions};
pub use cancel::CancellationToken;
pub use error::{Error, ErrorKind, FailureReport, Result};
pub use language::{Language, Script};
pub use llm_types::{FinishReason, GenerateRequest, GenerateResponse, Message, Role, TokenUsage};
pub use prescription::{
    ExtractionMethod, LanguageDecision, Medicine, Prescription, Route, TestItem, TestKind,
    ValidationReport,
};
pub use traits::{AsrMode, AsrModel, AsrOutput, ExtractionInput, Extractor, LanguageModel, SpeechToText};
pub use transcript::{Segment, TranscriptionResult, TranscriptionTier};
