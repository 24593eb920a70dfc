//! The extractor abstraction
//!
//! LLM Extractor, Rule Extractor, and Ensemble Merger all produce a
//! `Prescription` from the same normalized-text input; none requires the
//! others' internals. The Ensemble Merger is just another `Extractor` that
//! happens to hold two more of them.

use crate::error::Result;
use crate::prescription::{LanguageDecision, Prescription};
use async_trait::async_trait;

/// Normalized input handed to every extractor.
#[derive(Debug, Clone)]
pub struct ExtractionInput<'a> {
    pub cleaned_text: &'a str,
    /// Text to run patient-name extraction against. Usually the same as
    /// `cleaned_text`, but the Thanglish Normalizer rewrites the very
    /// greeting tokens ("peru"/"peyar") the name patterns key on, so the
    /// pipeline passes the pre-normalization text here specifically for
    /// name extraction while `cleaned_text` carries the normalized form
    /// used everywhere else.
    pub name_source_text: &'a str,
    pub language: &'a LanguageDecision,
    pub transcription_tier: i8,
}

/// Produces a `Prescription` from normalized consultation text.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, input: ExtractionInput<'_>) -> Result<Prescription>;

    /// Label used in `Prescription::extraction_method` and metrics.
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::Language;
    use crate::prescription::ExtractionMethod;

    struct AlwaysEmpty;

    #[async_trait]
    impl Extractor for AlwaysEmpty {
        async fn extract(&self, input: ExtractionInput<'_>) -> Result<Prescription> {
            Ok(Prescription::empty(
                input.language.clone(),
                ExtractionMethod::Rules,
            ))
        }

        fn name(&self) -> &'static str {
            "always-empty"
        }
    }

    #[tokio::test]
    async fn extractor_trait_object_is_usable() {
        let extractor: Box<dyn Extractor> = Box::new(AlwaysEmpty);
        let decision = LanguageDecision {
            primary: Language::English,
            confidence: 1.0,
            acoustic_hint: None,
            lexical_hint: None,
        };
        let input = ExtractionInput {
            cleaned_text: "take paracetamol",
            name_source_text: "take paracetamol",
            language: &decision,
            transcription_tier: 1,
        };
        let rx = extractor.extract(input).await.unwrap();
        assert!(rx.medicines.is_empty());
        assert_eq!(extractor.name(), "always-empty");
    }
}
