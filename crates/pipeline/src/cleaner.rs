//! Transcript Cleaner (§4.3)
//!
//! Applies the Knowledge Base's ordered phonetic/brand/transliteration
//! correction list. Idempotent and infallible by construction: a bad regex
//! in the Knowledge Base is simply skipped rather than surfaced as an
//! error, since this stage must never fail.

use medirx_config::KnowledgeBase;
use regex::Regex;

pub struct CleanedTranscript {
    pub text: String,
    pub corrections_applied: u32,
}

pub struct TranscriptCleaner<'a> {
    kb: &'a KnowledgeBase,
}

impl<'a> TranscriptCleaner<'a> {
    pub fn new(kb: &'a KnowledgeBase) -> Self {
        Self { kb }
    }

    /// Apply every phonetic correction in order, first match wins per
    /// pattern. Brand→generic substitutions live in the same ordered list
    /// so generics survive before any fuzzy matching downstream sees them.
    pub fn clean(&self, text: &str) -> CleanedTranscript {
        let mut cleaned = text.to_string();
        let mut corrections_applied = 0u32;

        for correction in self.kb.phonetic_corrections() {
            let re = match Regex::new(&format!("(?i){}", correction.pattern)) {
                Ok(re) => re,
                Err(_) => continue,
            };
            if re.is_match(&cleaned) {
                cleaned = re.replace_all(&cleaned, correction.replacement.as_str()).into_owned();
                corrections_applied += 1;
            }
        }

        CleanedTranscript {
            text: cleaned,
            corrections_applied,
        }
    }
}
