//! Rule Extractor (§4.9)
//!
//! Gazetteer- and regex-driven extraction with no model dependency. Used
//! standalone when the Router picks `RulesOnly`, and as one half of the
//! Ensemble Merger's input when it picks `Ensemble`. Never fails: a
//! transcript with no recognizable structure simply yields an empty
//! `Prescription`.

use async_trait::async_trait;
use medirx_config::KnowledgeBase;
use medirx_core::prescription::{ExtractionMethod, Medicine, Prescription, TestItem, TestKind};
use medirx_core::traits::{ExtractionInput, Extractor};
use medirx_core::Result;
use regex::Regex;
use std::sync::{Arc, OnceLock};

const SYMPTOM_WORDS: &[&str] = &["fever", "pain", "cough", "cold", "headache", "vomiting"];

/// English/Tamil-Thanglish/Arabic greeting patterns that precede a
/// patient's name. Ordered longest-alternative-first so a more specific
/// phrase (e.g. "patient name is") wins over a bare "hi".
fn name_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        vec![
            Regex::new(r"(?i)patient\s+(?:name|peru|peyar)\s+(?:is\s+)?([a-z][a-z' .]{1,40})").unwrap(),
            Regex::new(r"(?i)\b(?:hello|hi|good morning|good afternoon)\s*,?\s+([a-z][a-z' .]{1,40})")
                .unwrap(),
            Regex::new(r"مرحبا[ً]?\s+([\p{Arabic} .]{1,40})|اهلاً\s+([\p{Arabic} .]{1,40})").unwrap(),
        ]
    })
}

const COMPLAINT_CUES: &[(&str, &str)] = &[
    ("fever", "fever"),
    ("kaichel", "fever"),
    ("sooda", "fever"),
    ("حمى", "fever"),
    ("pain", "pain"),
    ("vali", "pain"),
    ("ألم", "pain"),
    ("cough", "cough"),
    ("cold", "cold"),
    ("mooku adaipu", "nasal congestion"),
    ("headache", "headache"),
];

const DIAGNOSIS_NAMES: &[&str] = &["sinusitis", "pharyngitis", "bronchitis", "otitis media"];

const TEST_CATALOG: &[(&str, TestKind)] = &[
    ("cbc", TestKind::Lab),
    ("complete blood count", TestKind::Lab),
    ("blood test", TestKind::Lab),
    ("urine test", TestKind::Lab),
    ("throat swab", TestKind::Lab),
    ("x-ray", TestKind::Imaging),
    ("xray", TestKind::Imaging),
    ("ct scan", TestKind::Imaging),
    ("ultrasound", TestKind::Imaging),
    ("temperature check", TestKind::Home),
    ("pulse oximeter", TestKind::Home),
];

/// Everything after a drug mention, within this many characters, is
/// scanned for dose/frequency/duration/instruction.
const MEDICINE_WINDOW: usize = 80;

fn frequency_in(window: &str) -> String {
    const FREQ_CUES: &[&str] = &[
        "three times a day",
        "3 times a day",
        "twice daily",
        "twice a day",
        "once daily",
        "once a day",
        "once at night",
        "every 8 hours",
        "every 6 hours",
        "every 12 hours",
        "as needed",
    ];
    FREQ_CUES
        .iter()
        .find(|cue| window.contains(*cue))
        .map(|cue| cue.to_string())
        .unwrap_or_default()
}

fn duration_in(window: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(?i)(\d+)\s*(day|days|week|weeks)").unwrap());
    re.captures(window)
        .map(|c| format!("{} {}", &c[1], &c[2]))
        .unwrap_or_default()
}

fn dose_in(window: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(mg|ml|g|mcg)\b").unwrap());
    re.captures(window).map(|c| format!("{} {}", &c[1], &c[2].to_lowercase()))
}

fn instruction_in(window: &str) -> String {
    const INSTRUCTION_CUES: &[&str] = &["after food", "before food", "with food", "empty stomach"];
    INSTRUCTION_CUES
        .iter()
        .find(|cue| window.contains(*cue))
        .map(|cue| cue.to_string())
        .unwrap_or_default()
}

fn looks_like_symptom_or_drug(candidate: &str, kb: &KnowledgeBase) -> bool {
    let lower = candidate.trim().to_lowercase();
    if lower.is_empty() {
        return true;
    }
    SYMPTOM_WORDS.contains(&lower.as_str()) || kb.drug(&lower).is_some()
}

pub struct RuleExtractor {
    kb: Arc<KnowledgeBase>,
}

impl RuleExtractor {
    pub fn new(kb: Arc<KnowledgeBase>) -> Self {
        Self { kb }
    }

    fn extract_patient_name(&self, text: &str) -> String {
        for pattern in name_patterns() {
            if let Some(caps) = pattern.captures(text) {
                let raw = caps
                    .iter()
                    .skip(1)
                    .find_map(|g| g)
                    .map(|m| m.as_str().trim())
                    .unwrap_or("");
                let name = raw.split(|c: char| c == '.' || c == ',').next().unwrap_or("").trim();
                if !looks_like_symptom_or_drug(name, &self.kb) {
                    return name.to_string();
                }
            }
        }
        String::new()
    }

    fn extract_complaints(&self, text: &str) -> Vec<String> {
        let lower = text.to_lowercase();
        let mut found = Vec::new();
        for (cue, canonical) in COMPLAINT_CUES {
            if lower.contains(cue) && !found.contains(&canonical.to_string()) {
                found.push(canonical.to_string());
            }
        }
        found
    }

    fn extract_diagnosis(&self, text: &str) -> Vec<String> {
        let lower = text.to_lowercase();
        DIAGNOSIS_NAMES
            .iter()
            .filter(|name| lower.contains(*name))
            .map(|name| name.to_string())
            .collect()
    }

    fn extract_tests(&self, text: &str) -> Vec<TestItem> {
        let lower = text.to_lowercase();
        TEST_CATALOG
            .iter()
            .filter(|(name, _)| lower.contains(name))
            .map(|(name, kind)| TestItem {
                name: name.to_string(),
                kind: *kind,
            })
            .collect()
    }

    fn extract_advice(&self, text: &str) -> Vec<String> {
        let lower = text.to_lowercase();
        let mut out = Vec::new();
        for template in self.kb.advice_templates() {
            if lower.contains(&template.trigger_keyword.to_lowercase())
                && !out.contains(&template.canonical_advice)
            {
                out.push(template.canonical_advice.clone());
            }
        }
        out
    }

    fn extract_medicines(&self, text: &str) -> Vec<Medicine> {
        let lower = text.to_lowercase();
        let mut seen = std::collections::HashSet::new();
        let mut medicines = Vec::new();

        for drug in self.kb.drugs() {
            let candidates = std::iter::once(drug.canonical.clone())
                .chain(drug.aliases.iter().cloned())
                .chain(drug.brand_names.iter().cloned())
                .chain(drug.transliterations.iter().cloned());

            for candidate in candidates {
                let needle = candidate.to_lowercase();
                let Some(pos) = lower.find(&needle) else {
                    continue;
                };
                if !seen.insert(drug.canonical.clone()) {
                    break;
                }

                let window_end = (pos + needle.len() + MEDICINE_WINDOW).min(lower.len());
                let window = &lower[pos + needle.len()..window_end];

                let route = self
                    .kb
                    .form_terms()
                    .find(|form| window.contains(*form))
                    .and_then(|form| self.kb.route_for_form(form))
                    .unwrap_or_default();

                medicines.push(Medicine {
                    name: drug.canonical.clone(),
                    dose: dose_in(window),
                    frequency: frequency_in(window),
                    duration: duration_in(window),
                    instruction: instruction_in(window),
                    route,
                });
                break;
            }
        }

        medicines
    }
}

#[async_trait]
impl Extractor for RuleExtractor {
    async fn extract(&self, input: ExtractionInput<'_>) -> Result<Prescription> {
        let text = input.cleaned_text;
        let mut rx = Prescription::empty(input.language.clone(), ExtractionMethod::Rules);

        rx.patient_name = self.extract_patient_name(input.name_source_text);
        rx.complaints = self.extract_complaints(text);
        rx.diagnosis = self.extract_diagnosis(text);
        rx.medicines = self.extract_medicines(text);
        rx.tests = self.extract_tests(text);
        rx.advice = self.extract_advice(text);
        rx.confidence = if rx.medicines.is_empty() { 0.2 } else { 0.6 };

        tracing::debug!(
            medicines = rx.medicines.len(),
            complaints = rx.complaints.len(),
            "rule extraction complete"
        );

        Ok(rx)
    }

    fn name(&self) -> &'static str {
        "rules"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medirx_core::language::Language;
    use medirx_core::prescription::LanguageDecision;

    fn decision() -> LanguageDecision {
        LanguageDecision {
            primary: Language::English,
            confidence: 0.8,
            acoustic_hint: Some(Language::English),
            lexical_hint: None,
        }
    }

    fn extract_sync(kb: Arc<KnowledgeBase>, text: &'static str) -> Prescription {
        let extractor = RuleExtractor::new(kb);
        let decision = decision();
        let input = ExtractionInput {
            cleaned_text: text,
            name_source_text: text,
            language: &decision,
            transcription_tier: 1,
        };
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(extractor.extract(input))
            .unwrap()
    }

    #[test]
    fn greeting_pattern_extracts_patient_name() {
        let kb = KnowledgeBase::default_builtin();
        let rx = extract_sync(Arc::new(kb), "Hello John, how are you feeling today?");
        assert_eq!(rx.patient_name, "John");
    }

    #[test]
    fn name_pattern_rejects_symptom_word() {
        let kb = KnowledgeBase::default_builtin();
        let rx = extract_sync(Arc::new(kb), "Hello fever, how long has this lasted?");
        assert_eq!(rx.patient_name, "");
    }

    #[test]
    fn medicine_window_captures_dose_frequency_and_instruction() {
        let kb = KnowledgeBase::default_builtin();
        let rx = extract_sync(
            Arc::new(kb),
            "Take erythromycin 500 mg three times a day for 5 days after food.",
        );
        assert_eq!(rx.medicines.len(), 1);
        let med = &rx.medicines[0];
        assert_eq!(med.name, "erythromycin");
        assert_eq!(med.dose.as_deref(), Some("500 mg"));
        assert_eq!(med.frequency, "three times a day");
        assert_eq!(med.duration, "5 days");
        assert_eq!(med.instruction, "after food");
    }

    #[test]
    fn brand_name_mention_resolves_to_canonical() {
        let kb = KnowledgeBase::default_builtin();
        let rx = extract_sync(Arc::new(kb), "Give stayhappi twice daily for infection.");
        assert_eq!(rx.medicines.len(), 1);
        assert_eq!(rx.medicines[0].name, "nitrofurantoin");
    }

    #[test]
    fn advice_templates_match_trigger_keywords() {
        let kb = KnowledgeBase::default_builtin();
        let rx = extract_sync(Arc::new(kb), "Please drink warm fluids and rest well.");
        assert!(rx.advice.contains(&"drink warm fluids".to_string()));
        assert!(rx.advice.contains(&"rest adequately".to_string()));
    }

    #[test]
    fn empty_transcript_yields_empty_prescription_not_an_error() {
        let kb = KnowledgeBase::default_builtin();
        let rx = extract_sync(Arc::new(kb), "");
        assert!(rx.medicines.is_empty());
        assert!(rx.complaints.is_empty());
    }
}
