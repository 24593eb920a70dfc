//! Validator (§4.12)
//!
//! Runs after the Post-Processor. Never discards the record on failure —
//! a failing `ValidationReport` is still returned alongside the
//! `Prescription` it describes.

use medirx_config::KnowledgeBase;
use medirx_core::prescription::{Prescription, ValidationReport};
use regex::Regex;
use serde_json::json;
use std::sync::OnceLock;

fn dose_format_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^\d+(\.\d+)?\s*(mg|ml|g|mcg)$").unwrap())
}

/// Wire-shape schema for the serialized `Prescription`, checked in
/// addition to the in-memory invariants below. Redundant with the Rust
/// type system for any record this process produced itself, but catches
/// shape drift for records a downstream consumer round-trips back in.
fn wire_schema() -> &'static serde_json::Value {
    static SCHEMA: OnceLock<serde_json::Value> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        json!({
            "type": "object",
            "required": ["patient_name", "medicines", "extraction_method", "confidence"],
            "properties": {
                "patient_name": { "type": "string" },
                "medicines": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["name", "frequency", "duration", "instruction", "route"],
                    }
                },
                "extraction_method": { "type": "string", "enum": ["llm", "rules", "ensemble"] },
                "confidence": { "type": "number", "minimum": 0.0, "maximum": 1.0 },
            }
        })
    })
}

pub struct Validator<'a> {
    kb: &'a KnowledgeBase,
}

impl<'a> Validator<'a> {
    pub fn new(kb: &'a KnowledgeBase) -> Self {
        Self { kb }
    }

    pub fn validate(&self, rx: &Prescription) -> ValidationReport {
        let mut report = ValidationReport::passing();

        if rx.medicines.is_empty() {
            report.errors.push("at-least-one-medicine-required".to_string());
        }
        if rx.diagnosis.is_empty() {
            report.warnings.push("diagnosis is empty".to_string());
        }

        for med in &rx.medicines {
            if let Some(dose) = &med.dose {
                if !dose_format_regex().is_match(dose.trim()) {
                    report.errors.push(format!("invalid dose format for {}", med.name));
                }
            }
        }

        if !rx.medicine_names_are_unique() {
            report
                .errors
                .push("duplicate medicine names after merge".to_string());
        }

        for (i, a) in rx.medicines.iter().enumerate() {
            for b in &rx.medicines[i + 1..] {
                if self.kb.is_dangerous_combination(&a.name, &b.name) {
                    report
                        .warnings
                        .push(format!("dangerous combination: {} + {}", a.name, b.name));
                }
            }
        }

        self.validate_wire_shape(rx, &mut report);

        report.valid = report.errors.is_empty();
        report
    }

    fn validate_wire_shape(&self, rx: &Prescription, report: &mut ValidationReport) {
        let value = match serde_json::to_value(rx) {
            Ok(value) => value,
            Err(e) => {
                report.errors.push(format!("prescription did not serialize: {e}"));
                return;
            }
        };

        let compiled = match jsonschema::JSONSchema::compile(wire_schema()) {
            Ok(schema) => schema,
            Err(e) => {
                report.errors.push(format!("wire schema failed to compile: {e}"));
                return;
            }
        };

        if let Err(errors) = compiled.validate(&value) {
            for error in errors {
                report.errors.push(format!("wire shape violation: {error}"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medirx_core::language::Language;
    use medirx_core::prescription::{ExtractionMethod, LanguageDecision, Medicine};

    fn decision() -> LanguageDecision {
        LanguageDecision {
            primary: Language::English,
            confidence: 0.8,
            acoustic_hint: Some(Language::English),
            lexical_hint: None,
        }
    }

    #[test]
    fn empty_medicines_is_an_error() {
        let kb = KnowledgeBase::default_builtin();
        let validator = Validator::new(&kb);
        let rx = Prescription::empty(decision(), ExtractionMethod::Ensemble);

        let report = validator.validate(&rx);
        assert!(!report.valid);
        assert!(report.errors.contains(&"at-least-one-medicine-required".to_string()));
    }

    #[test]
    fn well_formed_dose_passes() {
        let kb = KnowledgeBase::default_builtin();
        let validator = Validator::new(&kb);
        let mut rx = Prescription::empty(decision(), ExtractionMethod::Ensemble);
        let mut med = Medicine::new("paracetamol");
        med.dose = Some("500 mg".to_string());
        med.frequency = "once daily".to_string();
        rx.medicines.push(med);

        let report = validator.validate(&rx);
        assert!(report.valid);
    }

    #[test]
    fn malformed_dose_is_an_error() {
        let kb = KnowledgeBase::default_builtin();
        let validator = Validator::new(&kb);
        let mut rx = Prescription::empty(decision(), ExtractionMethod::Ensemble);
        let mut med = Medicine::new("paracetamol");
        med.dose = Some("a pinch".to_string());
        rx.medicines.push(med);

        let report = validator.validate(&rx);
        assert!(!report.valid);
        assert!(report.errors.iter().any(|e| e.contains("invalid dose format")));
    }

    #[test]
    fn dangerous_combination_is_a_warning_not_an_error() {
        let kb = KnowledgeBase::default_builtin();
        let validator = Validator::new(&kb);
        let mut rx = Prescription::empty(decision(), ExtractionMethod::Ensemble);
        rx.medicines.push(Medicine::new("warfarin"));
        rx.medicines.push(Medicine::new("aspirin"));

        let report = validator.validate(&rx);
        assert!(report.valid);
        assert!(report.warnings.iter().any(|w| w.contains("dangerous combination")));
    }

    #[test]
    fn duplicate_medicines_are_an_internal_invariant_error() {
        let kb = KnowledgeBase::default_builtin();
        let validator = Validator::new(&kb);
        let mut rx = Prescription::empty(decision(), ExtractionMethod::Ensemble);
        rx.medicines.push(Medicine::new("paracetamol"));
        rx.medicines.push(Medicine::new("Paracetamol"));

        let report = validator.validate(&rx);
        assert!(!report.valid);
        assert!(report
            .errors
            .iter()
            .any(|e| e.contains("duplicate medicine names")));
    }
}
