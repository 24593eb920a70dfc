//! Router (§4.7)
//!
//! Scores the normalized transcript and picks which extractor(s) handle
//! it. The composite score averages four signals the spec names: a text
//! length bucket, how much of the transcript is non-repeated, medical
//! keyword density, and ASR confidence.

use medirx_config::KnowledgeBase;
use medirx_core::prescription::LanguageDecision;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    LlmOnly,
    Ensemble,
    RulesOnly,
}

#[derive(Debug, Clone)]
pub struct RouteConfig {
    pub retry_budget: u32,
    pub timeout_ms: u64,
}

impl RouteConfig {
    fn for_route(route: Route) -> Self {
        match route {
            Route::LlmOnly => RouteConfig {
                retry_budget: 1,
                timeout_ms: 20_000,
            },
            Route::Ensemble => RouteConfig {
                retry_budget: 1,
                timeout_ms: 25_000,
            },
            Route::RulesOnly => RouteConfig {
                retry_budget: 0,
                timeout_ms: 2_000,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct RouterDecision {
    pub route: Route,
    pub config: RouteConfig,
    pub score: f32,
}

fn length_bucket_score(text: &str) -> f32 {
    let len = text.len();
    if len < 50 {
        0.0
    } else if len < 150 {
        0.3
    } else if len < 400 {
        0.6
    } else {
        1.0
    }
}

fn split_sentences(text: &str) -> Vec<String> {
    text.split(|c| c == '.' || c == '!' || c == '?')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn unique_sentence_ratio(text: &str) -> f32 {
    let sentences = split_sentences(text);
    if sentences.is_empty() {
        return 0.0;
    }
    let unique: HashSet<&String> = sentences.iter().collect();
    unique.len() as f32 / sentences.len() as f32
}

fn medical_keyword_density(text: &str, kb: &KnowledgeBase) -> f32 {
    let total_words = text.split_whitespace().count().max(1) as f32;
    let lower = text.to_lowercase();
    let hits = kb
        .drugs()
        .iter()
        .filter(|d| lower.contains(&d.canonical.to_lowercase()))
        .count() as f32;
    (hits / total_words).min(1.0)
}

pub struct Router<'a> {
    kb: &'a KnowledgeBase,
}

impl<'a> Router<'a> {
    pub fn new(kb: &'a KnowledgeBase) -> Self {
        Self { kb }
    }

    pub fn route(
        &self,
        normalized_text: &str,
        _language: &LanguageDecision,
        asr_confidence: f32,
    ) -> RouterDecision {
        let length_score = length_bucket_score(normalized_text);
        let unique_ratio = unique_sentence_ratio(normalized_text);
        let keyword_density = medical_keyword_density(normalized_text, self.kb);
        let score = (length_score + unique_ratio + keyword_density + asr_confidence) / 4.0;

        let has_medical_keyword = self.kb.medical_keyword_hit(normalized_text);

        let route = if score >= 0.75 {
            Route::LlmOnly
        } else if score >= 0.45 && has_medical_keyword {
            Route::Ensemble
        } else {
            Route::RulesOnly
        };

        RouterDecision {
            route,
            config: RouteConfig::for_route(route),
            score,
        }
    }
}
