//! Language classification for consultation transcripts
//!
//! Consultations are English, Tamil, Thanglish (Tamil written in Latin
//! script), Arabic, or an unresolved code-mixed blend of the above.

use serde::{Deserialize, Serialize};

/// Detected or hinted consultation language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    English,
    Tamil,
    Thanglish,
    Arabic,
    Mixed,
}

impl Language {
    /// ISO-ish short code used in transcripts and metrics records
    pub fn code(&self) -> &'static str {
        match self {
            Self::English => "en",
            Self::Tamil => "ta",
            Self::Thanglish => "thanglish",
            Self::Arabic => "ar",
            Self::Mixed => "mixed",
        }
    }

    /// Script this language is ordinarily written in
    pub fn script(&self) -> Script {
        match self {
            Self::English | Self::Thanglish => Script::Latin,
            Self::Tamil => Script::Tamil,
            Self::Arabic => Script::Arabic,
            Self::Mixed => Script::Mixed,
        }
    }

    /// Parse a language code loosely (case-insensitive, a few aliases)
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "en" | "eng" | "english" => Some(Self::English),
            "ta" | "tam" | "tamil" => Some(Self::Tamil),
            "thanglish" | "tanglish" => Some(Self::Thanglish),
            "ar" | "ara" | "arabic" => Some(Self::Arabic),
            "mixed" | "mix" | "codemixed" | "code-mixed" => Some(Self::Mixed),
            _ => None,
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Script detected in raw text, independent of the language classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Script {
    Latin,
    Tamil,
    Arabic,
    Mixed,
}

impl Script {
    /// First Unicode block associated with this script
    fn unicode_range(&self) -> Option<(u32, u32)> {
        match self {
            Self::Latin => Some((0x0000, 0x024F)),
            Self::Tamil => Some((0x0B80, 0x0BFF)),
            Self::Arabic => Some((0x0600, 0x06FF)),
            Self::Mixed => None,
        }
    }

    fn contains_char(&self, c: char) -> bool {
        match self.unicode_range() {
            Some((start, end)) => {
                let code = c as u32;
                code >= start && code <= end
            }
            None => false,
        }
    }

    /// Majority script among Tamil/Arabic/Latin characters in `text`.
    /// Returns `None` for text with no alphabetic characters in any of
    /// these scripts (e.g. all digits/punctuation).
    pub fn detect(text: &str) -> Option<Self> {
        let mut tamil = 0u32;
        let mut arabic = 0u32;
        let mut latin = 0u32;

        for c in text.chars() {
            if Self::Tamil.contains_char(c) {
                tamil += 1;
            } else if Self::Arabic.contains_char(c) {
                arabic += 1;
            } else if c.is_ascii_alphabetic() {
                latin += 1;
            }
        }

        [(tamil, Self::Tamil), (arabic, Self::Arabic), (latin, Self::Latin)]
            .into_iter()
            .filter(|(count, _)| *count > 0)
            .max_by_key(|(count, _)| *count)
            .map(|(_, script)| script)
    }
}
