//! LLM Extractor (§4.8)
//!
//! Prompt-driven structured extraction to the fixed `Prescription` schema,
//! deterministic decoding (temperature 0), robust JSON recovery, and the
//! post-extraction cleanup steps the spec assigns to this stage rather
//! than the Post-Processor: patient-name dedup/validity, fuzzy drug-name
//! correction with a no-undo guard, and dose hallucination prevention.

use crate::json_recovery::recover;
use crate::prompt::SystemPromptBuilder;
use async_trait::async_trait;
use medirx_config::KnowledgeBase;
use medirx_core::language::Language;
use medirx_core::llm_types::GenerateRequest;
use medirx_core::prescription::{
    ExtractionMethod, LanguageDecision, Medicine, Prescription, Route, TestItem, TestKind,
};
use medirx_core::traits::{ExtractionInput, Extractor, LanguageModel};
use medirx_core::Result;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;

/// Similarity floor below which a fuzzy drug-name correction is rejected
/// (§4.8: "a similarity floor (≈ 0.4)").
const FUZZY_SIMILARITY_FLOOR: f32 = 0.4;

#[derive(Debug, Default, Deserialize)]
struct LlmPayload {
    #[serde(default)]
    patient_name: Option<String>,
    #[serde(default)]
    age: Option<String>,
    #[serde(default)]
    gender: Option<String>,
    #[serde(default)]
    complaints: Vec<String>,
    #[serde(default)]
    diagnosis: Vec<String>,
    #[serde(default)]
    medicines: Vec<LlmMedicine>,
    #[serde(default)]
    tests: Vec<LlmTest>,
    #[serde(default)]
    advice: Vec<String>,
    #[serde(default)]
    follow_up_days: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmMedicine {
    name: String,
    #[serde(default)]
    dose: Option<String>,
    #[serde(default)]
    frequency: String,
    #[serde(default)]
    duration: String,
    #[serde(default)]
    instruction: String,
    #[serde(default)]
    route: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LlmTest {
    Named(String),
    Tagged { name: String, #[serde(default)] kind: Option<String> },
}

fn parse_route(s: &str) -> Route {
    match s.to_lowercase().as_str() {
        "nasal" => Route::Nasal,
        "topical" => Route::Topical,
        "ophthalmic" => Route::Ophthalmic,
        "otic" => Route::Otic,
        "inhaled" => Route::Inhaled,
        "parenteral" => Route::Parenteral,
        "rectal" => Route::Rectal,
        _ => Route::Oral,
    }
}

fn parse_test_kind(s: &str) -> TestKind {
    match s.to_lowercase().as_str() {
        "imaging" => TestKind::Imaging,
        "home" => TestKind::Home,
        _ => TestKind::Lab,
    }
}

/// Normalized Levenshtein similarity in `[0, 1]`, 1.0 for identical
/// strings. Local to this extractor per §9 ("robust JSON parsing ...
/// belongs with the LLM extractor"): fuzzy correction is this stage's own
/// concern, not shared utility code.
fn string_similarity(a: &str, b: &str) -> f32 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    if a == b {
        return 1.0;
    }
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    let distance = levenshtein(&a, &b);
    1.0 - (distance as f32 / max_len as f32)
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=b.len() {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Words a patient-name candidate must not match, rejecting symptom/drug
/// tokens misidentified as names (§4.8, §4.9).
fn looks_like_symptom_or_drug(candidate: &str, kb: &KnowledgeBase) -> bool {
    let lower = candidate.trim().to_lowercase();
    if lower.is_empty() {
        return true;
    }
    const SYMPTOM_WORDS: &[&str] = &["fever", "pain", "cough", "cold", "headache", "vomiting"];
    SYMPTOM_WORDS.contains(&lower.as_str()) || kb.drug(&lower).is_some()
}

pub struct LlmExtractor {
    llm: Arc<dyn LanguageModel>,
    kb: Arc<KnowledgeBase>,
    max_tokens: u32,
}

impl LlmExtractor {
    pub fn new(llm: Arc<dyn LanguageModel>, kb: Arc<KnowledgeBase>, max_tokens: u32) -> Self {
        Self { llm, kb, max_tokens }
    }

    async fn call_and_recover(&self, system: &str, user: &str) -> Result<Option<serde_json::Value>> {
        let request = GenerateRequest::new(system.to_string())
            .with_user_message(user.to_string())
            .with_max_tokens(self.max_tokens);
        let response = self.llm.generate(request).await?;

        if let Some(recovered) = recover(&response.text) {
            return Ok(Some(recovered.value));
        }

        // One retry with a reminder to return raw JSON (§4.8).
        let retry_request = GenerateRequest::new(system.to_string())
            .with_user_message(format!("{user}\n\n{}", SystemPromptBuilder::retry_reminder()))
            .with_max_tokens(self.max_tokens);
        let retry_response = self.llm.generate(retry_request).await?;
        Ok(recover(&retry_response.text).map(|r| r.value))
    }

    /// Collapse repeated name tokens ("John John" → "John") and reject
    /// candidates matching known symptom/drug words.
    fn clean_patient_name(&self, raw: &str) -> String {
        let tokens: Vec<&str> = raw.split_whitespace().collect();
        let mut deduped: Vec<&str> = Vec::new();
        for token in tokens {
            if deduped.last().map(|last| last.eq_ignore_ascii_case(token)).unwrap_or(false) {
                continue;
            }
            deduped.push(token);
        }
        let name = deduped.join(" ");
        if looks_like_symptom_or_drug(&name, &self.kb) {
            String::new()
        } else {
            name
        }
    }

    /// Fuzzy drug-name correction against the gazetteer. The no-undo guard
    /// (§4.8: "if a phonetic/brand correction has already been applied for
    /// a given medicine, skip fuzzy replacement") is the `kb.drug(name)`
    /// check below: the Transcript Cleaner applies brand→generic and
    /// phonetic corrections to the raw text before any extractor sees it,
    /// so a name that already resolves to a gazetteer entry (exact canonical,
    /// alias, or brand) has already been corrected upstream and is returned
    /// as-is rather than re-scored against every drug by fuzzy similarity.
    fn correct_drug_name(&self, name: &str) -> String {
        if let Some(drug) = self.kb.drug(name) {
            return drug.canonical.clone();
        }

        let mut best: Option<(&str, f32)> = None;
        for drug in self.kb.drugs() {
            let score = string_similarity(name, &drug.canonical);
            if best.map(|(_, best_score)| score > best_score).unwrap_or(true) {
                best = Some((&drug.canonical, score));
            }
        }

        match best {
            Some((canonical, score)) if score >= FUZZY_SIMILARITY_FLOOR => canonical.to_string(),
            _ => name.to_string(),
        }
    }

    fn to_prescription(&self, payload: LlmPayload, language: LanguageDecision, transcription_tier: i8) -> Prescription {
        let patient_name = payload
            .patient_name
            .map(|n| self.clean_patient_name(&n))
            .unwrap_or_default();

        let mut seen_names = HashSet::new();
        let medicines = payload
            .medicines
            .into_iter()
            .filter_map(|m| {
                let canonical = self.correct_drug_name(&m.name);
                let key = canonical.to_lowercase();
                if !seen_names.insert(key) {
                    return None;
                }
                let dose = m
                    .dose
                    .filter(|d| d.chars().any(|c| c.is_ascii_digit()));
                Some(Medicine {
                    name: canonical,
                    dose,
                    frequency: m.frequency,
                    duration: m.duration,
                    instruction: m.instruction,
                    route: m.route.as_deref().map(parse_route).unwrap_or_default(),
                })
            })
            .collect();

        let tests = payload
            .tests
            .into_iter()
            .map(|t| match t {
                LlmTest::Named(name) => TestItem { name, kind: TestKind::Lab },
                LlmTest::Tagged { name, kind } => TestItem {
                    name,
                    kind: kind.as_deref().map(parse_test_kind).unwrap_or(TestKind::Lab),
                },
            })
            .collect();

        Prescription {
            patient_name,
            age: payload.age,
            gender: payload.gender,
            complaints: dedupe(payload.complaints),
            diagnosis: dedupe(payload.diagnosis),
            medicines,
            tests,
            advice: dedupe(payload.advice),
            follow_up_days: payload.follow_up_days,
            language,
            confidence: 0.0,
            extraction_method: ExtractionMethod::Llm,
            transcription_tier,
            timestamp: chrono::Utc::now(),
            warnings: Vec::new(),
        }
    }
}

fn dedupe(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.to_lowercase()))
        .collect()
}

#[async_trait]
impl Extractor for LlmExtractor {
    async fn extract(&self, input: ExtractionInput<'_>) -> Result<Prescription> {
        let system = SystemPromptBuilder::build();
        let value = self.call_and_recover(&system, input.cleaned_text).await?;

        match value {
            Some(value) => match serde_json::from_value::<LlmPayload>(value) {
                Ok(payload) => {
                    let mut rx =
                        self.to_prescription(payload, input.language.clone(), input.transcription_tier);
                    rx.confidence = input.language.confidence;
                    Ok(rx)
                }
                Err(e) => {
                    let mut rx = Prescription::empty(input.language.clone(), ExtractionMethod::Llm);
                    rx.warnings.push(format!("llm payload did not match schema: {e}"));
                    Ok(rx)
                }
            },
            None => {
                let mut rx = Prescription::empty(input.language.clone(), ExtractionMethod::Llm);
                rx.warnings.push("llm response was not recoverable JSON".to_string());
                Ok(rx)
            }
        }
    }

    fn name(&self) -> &'static str {
        "llm"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medirx_core::llm_types::GenerateResponse;

    struct ScriptedLlm {
        reply: String,
    }

    #[async_trait]
    impl LanguageModel for ScriptedLlm {
        async fn generate(&self, _request: GenerateRequest) -> Result<GenerateResponse> {
            Ok(GenerateResponse::text(self.reply.clone()))
        }
        async fn is_available(&self) -> bool {
            true
        }
        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    fn decision() -> LanguageDecision {
        LanguageDecision {
            primary: Language::English,
            confidence: 0.9,
            acoustic_hint: Some(Language::English),
            lexical_hint: None,
        }
    }

    fn input(text: &'static str, decision: &LanguageDecision) -> ExtractionInput<'static> {
        ExtractionInput {
            cleaned_text: text,
            name_source_text: text,
            language: decision,
            transcription_tier: 1,
        }
    }

    #[tokio::test]
    async fn extracts_medicine_from_clean_json() {
        let llm = Arc::new(ScriptedLlm {
            reply: r#"{"patient_name":"John","complaints":["fever"],"diagnosis":["pharyngitis"],
                "medicines":[{"name":"erythromycin","dose":"500 mg","frequency":"3 times a day","duration":"5 days","instruction":"after food","route":"oral"}],
                "tests":[],"advice":["drink warm fluids"],"follow_up_days":null}"#
                .to_string(),
        });
        let kb = Arc::new(KnowledgeBase::default_builtin());
        let extractor = LlmExtractor::new(llm, kb, 2000);
        let decision = decision();
        let rx = extractor.extract(input("take erythromycin", &decision)).await.unwrap();
        assert_eq!(rx.patient_name, "John");
        assert_eq!(rx.medicines.len(), 1);
        assert_eq!(rx.medicines[0].name, "erythromycin");
        assert_eq!(rx.extraction_method, ExtractionMethod::Llm);
    }

    #[tokio::test]
    async fn unrecoverable_response_yields_empty_shell_with_warning() {
        let llm = Arc::new(ScriptedLlm {
            reply: "I'm not able to help with that.".to_string(),
        });
        let kb = Arc::new(KnowledgeBase::default_builtin());
        let extractor = LlmExtractor::new(llm, kb, 2000);
        let decision = decision();
        let rx = extractor.extract(input("mumbled audio", &decision)).await.unwrap();
        assert!(rx.medicines.is_empty());
        assert!(!rx.warnings.is_empty());
    }

    #[tokio::test]
    async fn dose_without_digits_becomes_null() {
        let llm = Arc::new(ScriptedLlm {
            reply: r#"{"medicines":[{"name":"paracetamol","dose":"a pinch","frequency":"once daily","duration":"","instruction":"","route":"oral"}]}"#
                .to_string(),
        });
        let kb = Arc::new(KnowledgeBase::default_builtin());
        let extractor = LlmExtractor::new(llm, kb, 2000);
        let decision = decision();
        let rx = extractor.extract(input("paracetamol once daily", &decision)).await.unwrap();
        assert_eq!(rx.medicines[0].dose, None);
    }

    #[tokio::test]
    async fn duplicate_medicines_are_collapsed() {
        let llm = Arc::new(ScriptedLlm {
            reply: r#"{"medicines":[
                {"name":"paracetamol","dose":"500 mg","frequency":"once daily","duration":"3 days","instruction":"","route":"oral"},
                {"name":"Paracetamol","dose":"500 mg","frequency":"once daily","duration":"3 days","instruction":"","route":"oral"}
            ]}"#
                .to_string(),
        });
        let kb = Arc::new(KnowledgeBase::default_builtin());
        let extractor = LlmExtractor::new(llm, kb, 2000);
        let decision = decision();
        let rx = extractor.extract(input("paracetamol twice", &decision)).await.unwrap();
        assert_eq!(rx.medicines.len(), 1);
    }

    #[test]
    fn similarity_of_identical_strings_is_one() {
        assert_eq!(string_similarity("paracetamol", "paracetamol"), 1.0);
    }

    #[test]
    fn similarity_rewards_close_misspelling() {
        let score = string_similarity("paracetmol", "paracetamol");
        assert!(score > 0.8);
    }
}
