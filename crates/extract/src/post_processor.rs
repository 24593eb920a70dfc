//! Post-Processor (§4.11)
//!
//! Five ordered repair passes over an already-merged `Prescription`. Runs
//! after the Ensemble Merger (or a lone extractor) and before the
//! Validator. Mutates in place and appends a warning for every repair it
//! makes — repairs are never silent.

use medirx_config::KnowledgeBase;
use medirx_core::prescription::Prescription;
use medirx_normalize::TermNormalizer;
use regex::Regex;
use std::sync::OnceLock;

const ADVICE_INDICATOR_WORDS: &[&str] =
    &["rest", "avoid", "drink", "take", "follow", "wait", "continue", "complete"];

fn advice_indicator_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let alternation = ADVICE_INDICATOR_WORDS.join("|");
        Regex::new(&format!(r"(?i)\b(?:{alternation})\b")).unwrap()
    })
}

fn name_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        vec![
            Regex::new(r"(?i)patient\s+(?:name|peru|peyar)\s+(?:is\s+)?([a-z][a-z' .]{1,40})").unwrap(),
            Regex::new(r"(?i)\b(?:hello|hi|good morning|good afternoon)\s*,?\s+([a-z][a-z' .]{1,40})")
                .unwrap(),
        ]
    })
}

fn split_sentences(text: &str) -> Vec<&str> {
    text.split(|c| c == '.' || c == '!' || c == '?')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect()
}

fn content_words(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| w.len() > 3)
        .collect()
}

/// Token-overlap distance between a requested frequency phrase and each
/// KB-allowed schedule; ties favor the allowed schedule listed first
/// (the KB orders a drug's `allowed_frequencies` from most to least
/// common).
fn nearest_allowed_frequency(requested: &str, allowed: &[String]) -> Option<String> {
    let requested_tokens: std::collections::HashSet<&str> = requested.split_whitespace().collect();
    allowed
        .iter()
        .map(|candidate| {
            let candidate_tokens: std::collections::HashSet<&str> = candidate.split_whitespace().collect();
            let overlap = requested_tokens.intersection(&candidate_tokens).count();
            overlap
        })
        .enumerate()
        .max_by_key(|(idx, overlap)| (*overlap, std::cmp::Reverse(*idx)))
        .map(|(idx, _)| allowed[idx].clone())
}

pub struct PostProcessor<'a> {
    kb: &'a KnowledgeBase,
}

impl<'a> PostProcessor<'a> {
    pub fn new(kb: &'a KnowledgeBase) -> Self {
        Self { kb }
    }

    /// `cleaned_text` is the (possibly Thanglish-normalized) text every
    /// other pass reads; `name_source_text` is the pre-normalization text
    /// used only for name repair, since normalization rewrites the
    /// "peru"/"peyar" greeting tokens the name patterns key on.
    pub fn process(&self, rx: &mut Prescription, cleaned_text: &str, name_source_text: &str) {
        self.fix_frequency_legality(rx);
        self.fix_form_route(rx);
        self.fix_organ_context(rx, cleaned_text);
        self.gate_advice_on_evidence(rx, cleaned_text);
        self.repair_patient_name(rx, name_source_text);
    }

    fn fix_frequency_legality(&self, rx: &mut Prescription) {
        let mut warnings = Vec::new();
        for med in &mut rx.medicines {
            let Some(drug) = self.kb.drug(&med.name) else {
                continue;
            };
            if drug.allowed_frequencies.is_empty() || drug.allowed_frequencies.contains(&med.frequency) {
                continue;
            }
            if let Some(corrected) = nearest_allowed_frequency(&med.frequency, &drug.allowed_frequencies) {
                med.frequency = corrected;
                warnings.push(format!("frequency corrected for {}", med.name));
            }
        }
        rx.warnings.extend(warnings);
    }

    fn fix_form_route(&self, rx: &mut Prescription) {
        for med in &mut rx.medicines {
            let haystack = format!("{} {}", med.name, med.instruction).to_lowercase();
            if let Some(form) = self.kb.form_terms().find(|form| haystack.contains(*form)) {
                if let Some(route) = self.kb.route_for_form(form) {
                    med.route = route;
                }
            }
        }
    }

    fn fix_organ_context(&self, rx: &mut Prescription, cleaned_text: &str) {
        let normalizer = TermNormalizer::new(self.kb);
        let annotations = normalizer.check_anatomy_conflicts(cleaned_text);
        let mut warnings = Vec::new();

        for diagnosis in &mut rx.diagnosis {
            for annotation in &annotations {
                if !diagnosis.to_lowercase().contains(&annotation.diagnosis.to_lowercase()) {
                    continue;
                }
                if !diagnosis.to_lowercase().contains(&annotation.disallowed_organ.to_lowercase()) {
                    continue;
                }
                let Some(anatomy) = self.kb.diagnosis_anatomy(&annotation.diagnosis) else {
                    continue;
                };
                let Some(replacement) = anatomy.allowed_anatomy.first() else {
                    continue;
                };
                *diagnosis = diagnosis.replace(&annotation.disallowed_organ, replacement);
                warnings.push(format!("organ context corrected for {}", annotation.diagnosis));
            }
        }
        rx.warnings.extend(warnings);
    }

    fn gate_advice_on_evidence(&self, rx: &mut Prescription, cleaned_text: &str) {
        let transcript_words: std::collections::HashSet<String> =
            content_words(cleaned_text).into_iter().collect();
        let sentences = split_sentences(cleaned_text);
        let indicator = advice_indicator_regex();

        let mut kept = Vec::with_capacity(rx.advice.len());
        let mut dropped = Vec::new();

        for advice in rx.advice.drain(..) {
            let words = content_words(&advice);
            let has_evidence = !words.is_empty() && {
                let hits = words.iter().filter(|w| transcript_words.contains(*w)).count();
                let overlap = hits as f32 / words.len() as f32;
                overlap >= 0.7
                    && sentences.iter().any(|sentence| {
                        let lower = sentence.to_lowercase();
                        words.iter().any(|w| lower.contains(w.as_str())) && indicator.is_match(sentence)
                    })
            };
            if has_evidence {
                kept.push(advice);
            } else {
                dropped.push(format!("advice dropped: {advice}"));
            }
        }

        rx.advice = kept;
        rx.warnings.extend(dropped);
    }

    fn repair_patient_name(&self, rx: &mut Prescription, cleaned_text: &str) {
        if !rx.patient_name.trim().is_empty() {
            return;
        }
        for pattern in name_patterns() {
            if let Some(caps) = pattern.captures(cleaned_text) {
                let name = caps[1].split(|c: char| c == '.' || c == ',').next().unwrap_or("").trim();
                if !name.is_empty() {
                    rx.patient_name = name.to_string();
                    return;
                }
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

    fn rx_with(medicines: Vec<Medicine>) -> Prescription {
        let mut rx = Prescription::empty(decision(), ExtractionMethod::Ensemble);
        rx.medicines = medicines;
        rx
    }

    #[test]
    fn frequency_outside_allowed_set_is_corrected() {
        let kb = KnowledgeBase::default_builtin();
        let post = PostProcessor::new(&kb);
        let mut med = Medicine::new("erythromycin");
        med.frequency = "once at night".to_string();
        let mut rx = rx_with(vec![med]);

        post.process(&mut rx, "erythromycin once at night", "erythromycin once at night");

        assert_eq!(rx.medicines[0].frequency, "3 times a day");
        assert!(rx.warnings.iter().any(|w| w.contains("frequency corrected")));
    }

    #[test]
    fn form_term_in_instruction_overrides_route() {
        let kb = KnowledgeBase::default_builtin();
        let post = PostProcessor::new(&kb);
        let mut med = Medicine::new("levocetirizine");
        med.instruction = "use as nasal spray".to_string();
        let mut rx = rx_with(vec![med]);

        post.process(&mut rx, "use the spray at night", "use the spray at night");

        assert_eq!(rx.medicines[0].route, medirx_core::prescription::Route::Nasal);
    }

    #[test]
    fn organ_context_repair_replaces_disallowed_organ() {
        let kb = KnowledgeBase::default_builtin();
        let post = PostProcessor::new(&kb);
        let mut rx = rx_with(vec![]);
        rx.diagnosis = vec!["pulmonary sinusitis".to_string()];

        post.process(&mut rx, "She has sinusitis with pulmonary involvement. Rest well.", "She has sinusitis with pulmonary involvement. Rest well.");

        assert_eq!(rx.diagnosis[0], "nasal sinusitis");
        assert!(rx.warnings.iter().any(|w| w.contains("organ context corrected")));
    }

    #[test]
    fn advice_without_transcript_support_is_dropped() {
        let kb = KnowledgeBase::default_builtin();
        let post = PostProcessor::new(&kb);
        let mut rx = rx_with(vec![]);
        rx.advice = vec!["avoid dairy products".to_string()];

        post.process(&mut rx, "Take paracetamol twice daily.", "Take paracetamol twice daily.");

        assert!(rx.advice.is_empty());
        assert!(rx.warnings.iter().any(|w| w == "advice dropped: avoid dairy products"));
    }

    #[test]
    fn advice_with_matching_sentence_and_indicator_survives() {
        let kb = KnowledgeBase::default_builtin();
        let post = PostProcessor::new(&kb);
        let mut rx = rx_with(vec![]);
        rx.advice = vec!["drink warm fluids".to_string()];

        post.process(&mut rx, "Please drink warm fluids through the day.", "Please drink warm fluids through the day.");

        assert_eq!(rx.advice, vec!["drink warm fluids".to_string()]);
    }

    #[test]
    fn empty_patient_name_is_repaired_from_greeting() {
        let kb = KnowledgeBase::default_builtin();
        let post = PostProcessor::new(&kb);
        let mut rx = rx_with(vec![]);

        post.process(&mut rx, "Hello Priya, what brings you in today?", "Hello Priya, what brings you in today?");

        assert_eq!(rx.patient_name, "Priya");
    }
}
