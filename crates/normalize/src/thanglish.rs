//! Thanglish Normalizer (§4.5)
//!
//! Maps Latin-script Tamil phrases into Tamil script using a longest-prefix
//! tokenizer over a lookup table. Out-of-vocabulary tokens pass through
//! unchanged. Deterministic: the same input always yields the same output.

use std::collections::HashMap;

pub struct ThanglishNormalizer {
    table: HashMap<String, String>,
    max_phrase_words: usize,
}

fn builtin_table() -> HashMap<String, String> {
    let pairs: &[(&str, &str)] = &[
        ("peru", "பெயர்"),
        ("peyar", "பெயர்"),
        ("kaichel iruku", "காய்ச்சல் இருக்கு"),
        ("kaichel", "காய்ச்சல்"),
        ("iruku", "இருக்கு"),
        ("irukku", "இருக்கு"),
        ("vali", "வலி"),
        ("maathirai", "மாத்திரை"),
        ("marundhu", "மருந்து"),
        ("romba nalla", "ரொம்ப நல்லா"),
        ("nalla", "நல்லா"),
        ("venam", "வேணாம்"),
        ("saptu", "சாப்பிட்டு"),
        ("sollunga", "சொல்லுங்க"),
    ];
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

impl ThanglishNormalizer {
    pub fn new() -> Self {
        Self::with_table(builtin_table())
    }

    pub fn with_table(table: HashMap<String, String>) -> Self {
        let max_phrase_words = table.keys().map(|k| k.split_whitespace().count()).max().unwrap_or(1);
        Self {
            table,
            max_phrase_words,
        }
    }

    /// Longest-prefix replace: at each position, try the longest remaining
    /// word span first, falling back to shorter spans, and finally to
    /// passing the single word through unchanged.
    pub fn normalize(&self, text: &str) -> String {
        let words: Vec<&str> = text.split_whitespace().collect();
        let mut out = Vec::with_capacity(words.len());
        let mut i = 0;

        while i < words.len() {
            let mut matched = false;
            let max_len = self.max_phrase_words.min(words.len() - i);

            for len in (1..=max_len).rev() {
                let candidate = words[i..i + len].join(" ").to_lowercase();
                let trimmed: String = candidate
                    .chars()
                    .filter(|c| c.is_alphanumeric() || c.is_whitespace())
                    .collect();
                if let Some(replacement) = self.table.get(&trimmed) {
                    out.push(replacement.clone());
                    i += len;
                    matched = true;
                    break;
                }
            }

            if !matched {
                out.push(words[i].to_string());
                i += 1;
            }
        }

        out.join(" ")
    }
}

impl Default for ThanglishNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longest_phrase_match_wins_over_single_word() {
        let normalizer = ThanglishNormalizer::new();
        let result = normalizer.normalize("patient kaichel iruku today");
        assert!(result.contains("காய்ச்சல் இருக்கு"));
    }

    #[test]
    fn out_of_vocabulary_tokens_pass_through_unchanged() {
        let normalizer = ThanglishNormalizer::new();
        let result = normalizer.normalize("paracetamol 500 mg");
        assert_eq!(result, "paracetamol 500 mg");
    }

    #[test]
    fn deterministic_across_repeated_calls() {
        let normalizer = ThanglishNormalizer::new();
        let input = "peru Karuppan kaichel iruku";
        assert_eq!(normalizer.normalize(input), normalizer.normalize(input));
    }
}
