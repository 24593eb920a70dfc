//! Language Detector (§4.4)
//!
//! Merges the Transcriber's acoustic language hint with lexical evidence
//! from the cleaned text, generalizing the Devanagari/Latin script-ratio
//! technique to Tamil/Arabic/Latin plus a Thanglish cue lexicon.

use medirx_core::language::{Language, Script};
use medirx_core::prescription::LanguageDecision;

/// Romanized Tamil function words and medical terms. Longer entries come
/// first only for readability; matching is substring-based on whole words.
const THANGLISH_CUES: &[&str] = &[
    "peru", "peyar", "iruku", "irukku", "kaichel", "vali", "enaku", "unaku", "romba", "nalla",
    "venam", "saptu", "maathirai", "marundhu", "noi", "kanakku", "vangi", "sollunga",
];

const ENGLISH_CUES: &[&str] = &[
    "the", "is", "have", "has", "take", "days", "morning", "night", "fever", "pain", "patient",
    "prescribe", "tablet", "please", "with", "after", "before",
];

/// Minimum Thanglish cue hits required before the Open Questions' adopted
/// threshold ("≥ 2 romanized-Tamil cue tokens") can fire.
const THANGLISH_MIN_HITS: u32 = 2;

fn count_cue_hits(words: &[&str], cues: &[&str]) -> u32 {
    words
        .iter()
        .filter(|w| cues.contains(&w.to_lowercase().trim_matches(|c: char| !c.is_alphanumeric())))
        .count() as u32
}

pub struct LanguageDetector;

impl LanguageDetector {
    pub fn new() -> Self {
        Self
    }

    /// `acoustic_hint`/`acoustic_confidence` come from the Transcriber's
    /// ASR-reported language and its overall confidence.
    pub fn detect(
        &self,
        cleaned_text: &str,
        acoustic_hint: Option<Language>,
        acoustic_confidence: f32,
    ) -> LanguageDecision {
        if let Some(script) = Script::detect(cleaned_text) {
            match script {
                Script::Arabic => {
                    return LanguageDecision {
                        primary: Language::Arabic,
                        confidence: 0.95,
                        acoustic_hint,
                        lexical_hint: Some(Language::Arabic),
                    };
                }
                Script::Tamil => {
                    return LanguageDecision {
                        primary: Language::Tamil,
                        confidence: 0.95,
                        acoustic_hint,
                        lexical_hint: Some(Language::Tamil),
                    };
                }
                Script::Latin | Script::Mixed => {}
            }
        }

        let words: Vec<&str> = cleaned_text.split_whitespace().collect();
        let total_words = words.len().max(1) as f32;
        let thanglish_hits = count_cue_hits(&words, THANGLISH_CUES);
        let english_hits = count_cue_hits(&words, ENGLISH_CUES);
        let english_ratio = english_hits as f32 / total_words;

        let predominantly_english = english_ratio > 0.6;
        let is_thanglish = thanglish_hits >= THANGLISH_MIN_HITS && !predominantly_english;

        if is_thanglish {
            // The explicit cue-count threshold (§9) is decisive on its own,
            // not merely one vote in the generic confidence tie-break:
            // acoustic ASR tags a Thanglish utterance by its spoken
            // language (commonly "ta" or "en", never "thanglish"), so an
            // acoustic/lexical mismatch here is expected, not a signal to
            // distrust the lexical evidence.
            let agrees = matches!(acoustic_hint, Some(Language::Tamil) | Some(Language::Thanglish));
            let conf = (thanglish_hits as f32 / total_words).clamp(0.5, 0.95);
            let confidence = if agrees { (conf + 0.1).min(0.95) } else { conf };
            return LanguageDecision {
                primary: Language::Thanglish,
                confidence,
                acoustic_hint,
                lexical_hint: Some(Language::Thanglish),
            };
        }

        let (lexical_hint, lexical_confidence) = if english_hits > 0 {
            (Some(Language::English), english_ratio.clamp(0.4, 0.9))
        } else {
            (None, 0.3)
        };

        self.merge(acoustic_hint, acoustic_confidence, lexical_hint, lexical_confidence)
    }

    fn merge(
        &self,
        acoustic_hint: Option<Language>,
        acoustic_confidence: f32,
        lexical_hint: Option<Language>,
        lexical_confidence: f32,
    ) -> LanguageDecision {
        let decision = match (acoustic_hint, lexical_hint) {
            (Some(a), Some(l)) if a == l => LanguageDecision {
                primary: a,
                confidence: (acoustic_confidence.max(lexical_confidence) + 0.05).min(1.0),
                acoustic_hint,
                lexical_hint,
            },
            (Some(a), Some(l)) => {
                let max_confidence = acoustic_confidence.max(lexical_confidence);
                if max_confidence < 0.5 {
                    LanguageDecision {
                        primary: Language::Mixed,
                        confidence: max_confidence,
                        acoustic_hint: Some(a),
                        lexical_hint: Some(l),
                    }
                } else if acoustic_confidence >= lexical_confidence {
                    LanguageDecision {
                        primary: a,
                        confidence: acoustic_confidence,
                        acoustic_hint: Some(a),
                        lexical_hint: Some(l),
                    }
                } else {
                    LanguageDecision {
                        primary: l,
                        confidence: lexical_confidence,
                        acoustic_hint: Some(a),
                        lexical_hint: Some(l),
                    }
                }
            }
            (Some(a), None) => LanguageDecision {
                primary: a,
                confidence: acoustic_confidence,
                acoustic_hint: Some(a),
                lexical_hint: None,
            },
            (None, Some(l)) => LanguageDecision {
                primary: l,
                confidence: lexical_confidence,
                acoustic_hint: None,
                lexical_hint: Some(l),
            },
            (None, None) => LanguageDecision {
                primary: Language::English,
                confidence: 0.3,
                acoustic_hint: None,
                lexical_hint: None,
            },
        };
        decision
    }
}

impl Default for LanguageDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arabic_script_wins_outright() {
        let detector = LanguageDetector::new();
        let decision = detector.detect("مرحباً فاطمة لديها التهاب", None, 0.5);
        assert_eq!(decision.primary, Language::Arabic);
    }

    #[test]
    fn tamil_script_wins_outright() {
        let detector = LanguageDetector::new();
        let decision = detector.detect("காய்ச்சல் இருக்கு", None, 0.5);
        assert_eq!(decision.primary, Language::Tamil);
    }

    #[test]
    fn thanglish_detected_with_two_or_more_cues_and_no_tamil_script() {
        let detector = LanguageDetector::new();
        let decision = detector.detect(
            "patient peru Karuppan kaichel iruku paracetamol 500 mg",
            Some(Language::English),
            0.6,
        );
        assert_eq!(decision.primary, Language::Thanglish);
    }

    #[test]
    fn single_thanglish_cue_does_not_trigger_thanglish() {
        let detector = LanguageDetector::new();
        let decision = detector.detect(
            "the patient has fever and iruku once",
            Some(Language::English),
            0.9,
        );
        assert_ne!(decision.primary, Language::Thanglish);
    }

    #[test]
    fn disagreement_with_low_confidence_yields_mixed() {
        let detector = LanguageDetector::new();
        let decision = detector.merge(Some(Language::English), 0.3, Some(Language::Tamil), 0.3);
        assert_eq!(decision.primary, Language::Mixed);
    }

    #[test]
    fn agreement_boosts_confidence() {
        let detector = LanguageDetector::new();
        let decision = detector.merge(Some(Language::English), 0.6, Some(Language::English), 0.6);
        assert!(decision.confidence > 0.6);
    }
}
