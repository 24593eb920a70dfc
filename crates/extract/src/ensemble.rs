//! Ensemble Merger (§4.10)
//!
//! Just another `Extractor`, holding the other two. Runs the LLM Extractor
//! and Rule Extractor in parallel and merges their outputs field by field
//! rather than picking a single winner wholesale.

use async_trait::async_trait;
use medirx_core::prescription::{ExtractionMethod, Medicine, Prescription};
use medirx_core::traits::{ExtractionInput, Extractor};
use medirx_core::Result;
use std::collections::HashSet;
use std::sync::Arc;

const ARTICLES: &[&str] = &["a", "an", "the"];

fn dedupe_key(s: &str) -> String {
    let lower = s.trim().to_lowercase();
    let stripped = ARTICLES
        .iter()
        .find_map(|article| lower.strip_prefix(&format!("{article} ")))
        .unwrap_or(&lower);
    stripped.trim().to_string()
}

/// Union two string lists, deduplicating case-insensitively after
/// stripping leading articles, preserving `first`'s insertion order.
fn union_dedup(first: Vec<String>, second: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for item in first.into_iter().chain(second) {
        if seen.insert(dedupe_key(&item)) {
            out.push(item);
        }
    }
    out
}

/// Greeting-pattern name extraction is structurally reliable (§4.10), so
/// the Rule Extractor's name wins whenever it found one.
fn merge_patient_name(llm: &str, rule: &str) -> String {
    if !rule.trim().is_empty() {
        rule.to_string()
    } else {
        llm.to_string()
    }
}

/// LLM wins on conflicting fields for a shared drug; any field LLM left
/// blank is filled from the Rule Extractor's record for that drug.
fn merge_medicine(llm: Medicine, rule: &Medicine) -> Medicine {
    Medicine {
        name: llm.name,
        dose: llm.dose.or_else(|| rule.dose.clone()),
        frequency: if llm.frequency.is_empty() { rule.frequency.clone() } else { llm.frequency },
        duration: if llm.duration.is_empty() { rule.duration.clone() } else { llm.duration },
        instruction: if llm.instruction.is_empty() { rule.instruction.clone() } else { llm.instruction },
        route: llm.route,
    }
}

fn merge_medicines(llm: Vec<Medicine>, rule: Vec<Medicine>) -> Vec<Medicine> {
    let mut rule_by_name: std::collections::HashMap<String, Medicine> = rule
        .into_iter()
        .map(|m| (m.name.to_lowercase(), m))
        .collect();

    let mut merged: Vec<Medicine> = Vec::new();
    let mut seen = HashSet::new();

    for med in llm {
        let key = med.name.to_lowercase();
        let merged_med = match rule_by_name.remove(&key) {
            Some(rule_med) => merge_medicine(med, &rule_med),
            None => med,
        };
        seen.insert(key);
        merged.push(merged_med);
    }

    for (key, rule_med) in rule_by_name {
        if seen.insert(key) {
            merged.push(rule_med);
        }
    }

    merged
}

pub fn merge(llm: Prescription, rule: Prescription) -> Prescription {
    Prescription {
        patient_name: merge_patient_name(&llm.patient_name, &rule.patient_name),
        age: llm.age.or(rule.age),
        gender: llm.gender.or(rule.gender),
        complaints: union_dedup(llm.complaints, rule.complaints),
        diagnosis: union_dedup(llm.diagnosis, rule.diagnosis),
        medicines: merge_medicines(llm.medicines, rule.medicines),
        tests: {
            let mut seen = HashSet::new();
            llm.tests
                .into_iter()
                .chain(rule.tests)
                .filter(|t| seen.insert(dedupe_key(&t.name)))
                .collect()
        },
        advice: union_dedup(llm.advice, rule.advice),
        follow_up_days: llm.follow_up_days.or(rule.follow_up_days),
        language: llm.language,
        confidence: (llm.confidence + rule.confidence) / 2.0,
        extraction_method: ExtractionMethod::Ensemble,
        transcription_tier: llm.transcription_tier,
        timestamp: llm.timestamp,
        warnings: union_dedup(llm.warnings, rule.warnings),
    }
}

pub struct EnsembleMerger {
    llm_extractor: Arc<dyn Extractor>,
    rule_extractor: Arc<dyn Extractor>,
}

impl EnsembleMerger {
    pub fn new(llm_extractor: Arc<dyn Extractor>, rule_extractor: Arc<dyn Extractor>) -> Self {
        Self { llm_extractor, rule_extractor }
    }
}

#[async_trait]
impl Extractor for EnsembleMerger {
    async fn extract(&self, input: ExtractionInput<'_>) -> Result<Prescription> {
        let (llm_result, rule_result) =
            tokio::join!(self.llm_extractor.extract(input.clone()), self.rule_extractor.extract(input));
        let rule_rx = rule_result?;
        let llm_rx = llm_result?;
        Ok(merge(llm_rx, rule_rx))
    }

    fn name(&self) -> &'static str {
        "ensemble"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medirx_core::language::Language;
    use medirx_core::prescription::{LanguageDecision, Route};

    fn decision() -> LanguageDecision {
        LanguageDecision {
            primary: Language::English,
            confidence: 0.8,
            acoustic_hint: Some(Language::English),
            lexical_hint: None,
        }
    }

    fn empty(method: ExtractionMethod) -> Prescription {
        Prescription::empty(decision(), method)
    }

    #[test]
    fn rule_name_wins_when_present() {
        let mut rule = empty(ExtractionMethod::Rules);
        rule.patient_name = "John".to_string();
        let mut llm = empty(ExtractionMethod::Llm);
        llm.patient_name = "Jon".to_string();

        let merged = merge(llm, rule);
        assert_eq!(merged.patient_name, "John");
    }

    #[test]
    fn llm_name_used_when_rule_found_none() {
        let rule = empty(ExtractionMethod::Rules);
        let mut llm = empty(ExtractionMethod::Llm);
        llm.patient_name = "Jon".to_string();

        let merged = merge(llm, rule);
        assert_eq!(merged.patient_name, "Jon");
    }

    #[test]
    fn shared_medicine_merges_missing_fields_from_rule() {
        let mut llm = empty(ExtractionMethod::Llm);
        llm.medicines.push(Medicine {
            name: "paracetamol".to_string(),
            dose: Some("500 mg".to_string()),
            frequency: String::new(),
            duration: String::new(),
            instruction: String::new(),
            route: Route::Oral,
        });
        let mut rule = empty(ExtractionMethod::Rules);
        rule.medicines.push(Medicine {
            name: "paracetamol".to_string(),
            dose: None,
            frequency: "twice daily".to_string(),
            duration: "3 days".to_string(),
            instruction: "after food".to_string(),
            route: Route::Oral,
        });

        let merged = merge(llm, rule);
        assert_eq!(merged.medicines.len(), 1);
        let med = &merged.medicines[0];
        assert_eq!(med.dose.as_deref(), Some("500 mg"));
        assert_eq!(med.frequency, "twice daily");
        assert_eq!(med.duration, "3 days");
    }

    #[test]
    fn medicine_only_in_rule_is_still_included() {
        let llm = empty(ExtractionMethod::Llm);
        let mut rule = empty(ExtractionMethod::Rules);
        rule.medicines.push(Medicine::new("aspirin"));

        let merged = merge(llm, rule);
        assert_eq!(merged.medicines.len(), 1);
        assert_eq!(merged.medicines[0].name, "aspirin");
    }

    #[test]
    fn complaints_union_dedupes_articles_case_insensitively() {
        let mut llm = empty(ExtractionMethod::Llm);
        llm.complaints = vec!["Fever".to_string()];
        let mut rule = empty(ExtractionMethod::Rules);
        rule.complaints = vec!["the fever".to_string(), "cough".to_string()];

        let merged = merge(llm, rule);
        assert_eq!(merged.complaints, vec!["Fever".to_string(), "cough".to_string()]);
    }
}
