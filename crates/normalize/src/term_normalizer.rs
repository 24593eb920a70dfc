//! Dosage/Term Normalizer (§4.6)

use medirx_config::KnowledgeBase;
use regex::Regex;

/// Flags a sentence where a diagnosis co-occurs with an anatomical term
/// its allowed-anatomy set forbids, for the Post-Processor's organ-context
/// repair step to act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnatomyAnnotation {
    pub diagnosis: String,
    pub disallowed_organ: String,
    pub sentence: String,
}

/// Canonicalize a unit token to one of `mg`, `ml`, `g`, `mcg`.
pub fn canonicalize_unit(unit: &str) -> Option<&'static str> {
    let cleaned = unit.trim().to_lowercase().replace(' ', "");
    match cleaned.trim_end_matches('s') {
        "mg" | "milligram" | "milligm" => Some("mg"),
        "ml" | "milliliter" | "millilitre" => Some("ml"),
        "g" | "gram" | "gm" => Some("g"),
        "mcg" | "microgram" | "ug" => Some("mcg"),
        _ => None,
    }
}

/// Rewrite a free-form dose like "500 milli grams" into "500 mg". Returns
/// `None` if no numeric token is present at all — the caller treats that
/// as `dose = null` per §4.8's hallucination guard.
pub fn canonicalize_dose(dose: &str) -> Option<String> {
    let re = Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*([a-z]+(?:\s?[a-z]+)?)").unwrap();
    let caps = re.captures(dose)?;
    let number = caps.get(1)?.as_str();
    let unit_raw = caps.get(2).map(|m| m.as_str()).unwrap_or("");
    let unit = canonicalize_unit(unit_raw).unwrap_or("mg");
    Some(format!("{number} {unit}"))
}

/// Rewrite a free-form frequency phrase into one of the canonical forms
/// from §4.6.
pub fn canonicalize_frequency(freq: &str) -> String {
    let lower = freq.to_lowercase();

    if let Some(hours) = extract_every_n_hours(&lower) {
        return format!("every {hours} hours");
    }

    let has = |needle: &str| lower.contains(needle);

    if has("night") && !has("twice") && !has("two") {
        "once at night".to_string()
    } else if has("as needed") || has("sos") || has("prn") {
        "as needed".to_string()
    } else if has("three") || has("3 times") || has("thrice") || (has("morning") && has("afternoon") && has("night")) {
        "3 times a day".to_string()
    } else if has("twice") || has("two times") || (has("morning") && has("night") && !has("afternoon")) {
        "twice daily".to_string()
    } else if has("once") || has("daily") || has("one time") {
        "once daily".to_string()
    } else {
        freq.trim().to_string()
    }
}

fn extract_every_n_hours(text: &str) -> Option<u32> {
    let re = Regex::new(r"every\s+(\d+)\s*hour").unwrap();
    re.captures(text)?.get(1)?.as_str().parse().ok()
}

pub struct TermNormalizer<'a> {
    kb: &'a KnowledgeBase,
}

impl<'a> TermNormalizer<'a> {
    pub fn new(kb: &'a KnowledgeBase) -> Self {
        Self { kb }
    }

    /// Brand→generic using the Knowledge Base. Runs before any fuzzy
    /// matching in the extractor (§4.6) so a brand name is never left to
    /// be fuzzy-matched against the wrong generic.
    pub fn brand_to_generic(&self, name: &str) -> String {
        self.kb
            .drug(name)
            .map(|drug| drug.canonical.clone())
            .unwrap_or_else(|| name.to_string())
    }

    /// Flag sentences where a known diagnosis co-occurs with a forbidden
    /// anatomical term, for the Post-Processor's organ-context repair.
    pub fn check_anatomy_conflicts(&self, text: &str) -> Vec<AnatomyAnnotation> {
        let mut annotations = Vec::new();
        for sentence in split_sentences(text) {
            let lower = sentence.to_lowercase();
            for diagnosis in known_diagnoses(self.kb) {
                if !lower.contains(&diagnosis.to_lowercase()) {
                    continue;
                }
                if let Some(anatomy) = self.kb.diagnosis_anatomy(diagnosis) {
                    for forbidden in &anatomy.forbidden_anatomy {
                        if lower.contains(&forbidden.to_lowercase()) {
                            annotations.push(AnatomyAnnotation {
                                diagnosis: diagnosis.to_string(),
                                disallowed_organ: forbidden.clone(),
                                sentence: sentence.to_string(),
                            });
                        }
                    }
                }
            }
        }
        annotations
    }
}

fn known_diagnoses(kb: &KnowledgeBase) -> Vec<&str> {
    // The KB only exposes anatomy lookup by name; the small set of names
    // recognized by diagnosis_anatomy is embedded at load time, so the
    // normalizer keeps its own list of names it actively checks.
    let candidates = ["sinusitis", "pharyngitis"];
    candidates
        .iter()
        .copied()
        .filter(|name| kb.diagnosis_anatomy(name).is_some())
        .collect()
}

fn split_sentences(text: &str) -> Vec<&str> {
    text.split(|c| c == '.' || c == '!' || c == '?')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_variants_canonicalize_to_mg() {
        assert_eq!(canonicalize_unit("milligrams"), Some("mg"));
        assert_eq!(canonicalize_unit("milli gram"), Some("mg"));
        assert_eq!(canonicalize_unit("MG"), Some("mg"));
    }

    #[test]
    fn dose_canonicalization_rewrites_unit() {
        assert_eq!(canonicalize_dose("500 milligrams").as_deref(), Some("500 mg"));
    }

    #[test]
    fn dose_with_no_digits_canonicalizes_to_none() {
        assert_eq!(canonicalize_dose("a pinch of salt"), None);
    }

    #[test]
    fn frequency_canonicalizes_morning_and_night_to_twice_daily() {
        assert_eq!(canonicalize_frequency("morning and night"), "twice daily");
    }

    #[test]
    fn frequency_canonicalizes_every_n_hours() {
        assert_eq!(canonicalize_frequency("every 8 hours"), "every 8 hours");
    }

    #[test]
    fn brand_resolves_to_generic() {
        let kb = KnowledgeBase::default_builtin();
        let normalizer = TermNormalizer::new(&kb);
        assert_eq!(normalizer.brand_to_generic("stayhappi"), "nitrofurantoin");
    }

    #[test]
    fn anatomy_conflict_detected_within_same_sentence() {
        let kb = KnowledgeBase::default_builtin();
        let normalizer = TermNormalizer::new(&kb);
        let annotations =
            normalizer.check_anatomy_conflicts("She has sinusitis with pulmonary involvement. Rest well.");
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].diagnosis, "sinusitis");
        assert_eq!(annotations[0].disallowed_organ, "pulmonary");
    }

    #[test]
    fn no_anatomy_conflict_across_sentence_boundary() {
        let kb = KnowledgeBase::default_builtin();
        let normalizer = TermNormalizer::new(&kb);
        let annotations =
            normalizer.check_anatomy_conflicts("She has sinusitis. Pulmonary function is unrelated here.");
        assert!(annotations.is_empty());
    }
}
