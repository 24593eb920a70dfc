//! Trait seams between the pipeline and its external collaborators
//!
//! # Trait Hierarchy
//!
//! ```text
//! SpeechToText  — ASR collaborator (§6)
//! LanguageModel — LLM collaborator (§6)
//! Extractor     — LLM Extractor, Rule Extractor, Ensemble Merger (§9)
//! ```

mod extractor;
mod llm;
mod speech;

pub use extractor::{ExtractionInput, Extractor};
pub use llm::LanguageModel;
pub use speech::{AsrMode, AsrModel, AsrOutput, SpeechToText};
