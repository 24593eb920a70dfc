//! The extraction pipeline's output schema
//!
//! `Prescription` is produced once, by whichever extractor the Router
//! selected, then refined in place by the Post-Processor before the
//! Validator inspects it. Every field is schema-enforced end to end.

use crate::language::Language;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Administration route, inferred from dose form when present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    Oral,
    Nasal,
    Topical,
    Ophthalmic,
    Otic,
    Inhaled,
    Parenteral,
    Rectal,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Oral => "oral",
            Self::Nasal => "nasal",
            Self::Topical => "topical",
            Self::Ophthalmic => "ophthalmic",
            Self::Otic => "otic",
            Self::Inhaled => "inhaled",
            Self::Parenteral => "parenteral",
            Self::Rectal => "rectal",
        }
    }
}

impl Default for Route {
    fn default() -> Self {
        Self::Oral
    }
}

/// Which extractor produced (or contributed to) the `Prescription`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    Llm,
    Rules,
    Ensemble,
}

/// Tag distinguishing the kind of test named in `Prescription::tests`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestKind {
    Lab,
    Imaging,
    Home,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestItem {
    pub name: String,
    pub kind: TestKind,
}

/// One prescribed medicine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Medicine {
    /// Canonical generic name, never a brand name.
    pub name: String,
    /// `None` when no numeric token was detectable in the source text —
    /// never a hallucinated value.
    pub dose: Option<String>,
    pub frequency: String,
    pub duration: String,
    pub instruction: String,
    pub route: Route,
}

impl Medicine {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dose: None,
            frequency: String::new(),
            duration: String::new(),
            instruction: String::new(),
            route: Route::default(),
        }
    }

    /// A dose is "sane" when absent, or present with a numeric token.
    pub fn dose_is_sane(&self) -> bool {
        match &self.dose {
            None => true,
            Some(dose) => dose.chars().any(|c| c.is_ascii_digit()),
        }
    }
}

/// Result of the Language Detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageDecision {
    pub primary: Language,
    pub confidence: f32,
    pub acoustic_hint: Option<Language>,
    pub lexical_hint: Option<Language>,
}

/// The pipeline's final output record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prescription {
    pub patient_name: String,
    pub age: Option<String>,
    pub gender: Option<String>,
    pub complaints: Vec<String>,
    pub diagnosis: Vec<String>,
    pub medicines: Vec<Medicine>,
    pub tests: Vec<TestItem>,
    pub advice: Vec<String>,
    pub follow_up_days: Option<u32>,
    pub language: LanguageDecision,
    pub confidence: f32,
    pub extraction_method: ExtractionMethod,
    pub transcription_tier: i8,
    pub timestamp: DateTime<Utc>,
    pub warnings: Vec<String>,
}

impl Prescription {
    /// An empty shell, used when every extractor attempt fails. Still a
    /// well-formed `Prescription`, never a null or absent value.
    pub fn empty(language: LanguageDecision, extraction_method: ExtractionMethod) -> Self {
        Self {
            patient_name: String::new(),
            age: None,
            gender: None,
            complaints: Vec::new(),
            diagnosis: Vec::new(),
            medicines: Vec::new(),
            tests: Vec::new(),
            advice: Vec::new(),
            follow_up_days: None,
            language,
            confidence: 0.0,
            extraction_method,
            transcription_tier: 1,
            timestamp: Utc::now(),
            warnings: Vec::new(),
        }
    }

    pub fn medicine_names_are_unique(&self) -> bool {
        let mut seen = std::collections::HashSet::new();
        self.medicines
            .iter()
            .all(|m| seen.insert(m.name.to_lowercase()))
    }
}

/// Outcome of the Validator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn passing() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decision() -> LanguageDecision {
        LanguageDecision {
            primary: Language::English,
            confidence: 0.9,
            acoustic_hint: Some(Language::English),
            lexical_hint: None,
        }
    }

    #[test]
    fn empty_shell_has_no_medicines_and_zero_confidence() {
        let rx = Prescription::empty(decision(), ExtractionMethod::Llm);
        assert!(rx.medicines.is_empty());
        assert_eq!(rx.confidence, 0.0);
    }

    #[test]
    fn dose_with_no_digits_is_insane() {
        let mut med = Medicine::new("paracetamol");
        med.dose = Some("a pinch".to_string());
        assert!(!med.dose_is_sane());
    }

    #[test]
    fn dose_absent_is_sane() {
        let med = Medicine::new("paracetamol");
        assert!(med.dose_is_sane());
    }

    #[test]
    fn duplicate_medicine_names_detected_case_insensitively() {
        let mut rx = Prescription::empty(decision(), ExtractionMethod::Rules);
        rx.medicines.push(Medicine::new("Paracetamol"));
        rx.medicines.push(Medicine::new("paracetamol"));
        assert!(!rx.medicine_names_are_unique());
    }
}
