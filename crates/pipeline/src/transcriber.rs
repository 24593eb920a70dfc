//! Tiered ASR policy (§4.2)
//!
//! Tiers are attempted in order until a quality gate passes or the tier
//! budget is exhausted. Each attempt is logged independently with its own
//! quality score so the escalation decision is auditable from the logs
//! alone.

use crate::error::PipelineError;
use medirx_config::KnowledgeBase;
use medirx_core::language::Language;
use medirx_core::traits::{AsrMode, AsrModel, AsrOutput, SpeechToText};
use medirx_core::transcript::{TranscriptionResult, TranscriptionTier};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};

/// Quality gate thresholds from §4.2. All three must pass to stop
/// escalating to the next tier.
const MIN_WORDS_PER_MINUTE: f32 = 20.0;
const MAX_NO_SPEECH_PROB: f32 = 0.60;

fn gates_pass(text: &str, audio_duration_s: f32, no_speech_prob: f32, kb: &KnowledgeBase) -> bool {
    let wpm = if audio_duration_s > 0.0 {
        text.split_whitespace().count() as f32 / (audio_duration_s / 60.0)
    } else {
        0.0
    };
    wpm >= MIN_WORDS_PER_MINUTE && kb.medical_keyword_hit(text) && no_speech_prob < MAX_NO_SPEECH_PROB
}

/// Single-flighted readiness signal for the lazily-loaded Tier 3 model:
/// the first caller pays the load cost, concurrent callers wait on the
/// same cell instead of each triggering their own load.
pub struct Tier3Guard {
    ready: OnceCell<Result<(), String>>,
}

impl Tier3Guard {
    pub fn new() -> Self {
        Self {
            ready: OnceCell::new(),
        }
    }

    async fn ensure_ready(&self, asr: &dyn SpeechToText) -> Result<(), String> {
        self.ready
            .get_or_init(|| async {
                asr.ensure_loaded(AsrModel::Medium)
                    .await
                    .map_err(|e| e.to_string())
            })
            .await
            .clone()
    }
}

impl Default for Tier3Guard {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Transcriber {
    asr: Arc<dyn SpeechToText>,
    kb: Arc<KnowledgeBase>,
    tier3_guard: Arc<Tier3Guard>,
}

impl Transcriber {
    pub fn new(asr: Arc<dyn SpeechToText>, kb: Arc<KnowledgeBase>, tier3_guard: Arc<Tier3Guard>) -> Self {
        Self {
            asr,
            kb,
            tier3_guard,
        }
    }

    fn to_result(
        &self,
        output: AsrOutput,
        tier: TranscriptionTier,
        audio_duration_s: f32,
    ) -> TranscriptionResult {
        TranscriptionResult {
            text: output.text,
            whisper_language: output.language,
            transcription_tier: tier,
            confidence: output.confidence,
            no_speech_prob: output.no_speech_prob,
            segments: None,
            audio_duration_s,
        }
    }

    /// Run the tiered policy against `audio_ref`, escalating while gates
    /// fail, up to `max_tier`.
    pub async fn transcribe(
        &self,
        audio_ref: &str,
        hint_language: Option<Language>,
        audio_duration_s: f32,
        max_tier: u8,
    ) -> Result<TranscriptionResult, PipelineError> {
        let tier1 = self
            .asr
            .transcribe(audio_ref, hint_language, AsrMode::Transcribe, AsrModel::Base)
            .await
            .map_err(|e| PipelineError::Transcription(e.to_string()))?;
        info!(tier = 1, confidence = tier1.confidence, "transcription attempt");

        // `best` only ever holds a tier's result once that tier produced
        // non-empty text; an empty tier is a reason to escalate, not to
        // give up, since a later tier (with a language hint this one
        // lacked) may still recover text.
        let mut best: Option<TranscriptionResult> = if tier1.text.trim().is_empty() {
            None
        } else {
            let result = self.to_result(tier1.clone(), TranscriptionTier::One, audio_duration_s);
            if max_tier < 2 || gates_pass(&result.text, audio_duration_s, result.no_speech_prob, &self.kb) {
                return Ok(result);
            }
            Some(result)
        };

        if max_tier < 2 {
            return best.ok_or_else(|| {
                PipelineError::Transcription("no tier produced any text".to_string())
            });
        }

        // Tier 2: re-hint with the acoustic language if Tier 1 was
        // confident about a non-English language but text quality was low
        // (or Tier 1 produced no text at all).
        let tier2_hint = Language::from_str_loose(&tier1.language)
            .filter(|lang| *lang != Language::English)
            .or(hint_language);

        let tier2 = self
            .asr
            .transcribe(audio_ref, tier2_hint, AsrMode::Transcribe, AsrModel::Base)
            .await;

        if let Ok(tier2) = tier2 {
            info!(tier = 2, confidence = tier2.confidence, "transcription attempt");
            if !tier2.text.trim().is_empty() {
                let result = self.to_result(tier2, TranscriptionTier::Two, audio_duration_s);
                if max_tier < 3
                    || gates_pass(&result.text, audio_duration_s, result.no_speech_prob, &self.kb)
                {
                    return Ok(result);
                }
                best = Some(result);
            }
        } else {
            warn!("tier 2 transcription attempt errored, keeping prior result");
        }

        if max_tier < 3 {
            return best.ok_or_else(|| {
                PipelineError::Transcription("no tier produced any text".to_string())
            });
        }

        match self.tier3_guard.ensure_ready(self.asr.as_ref()).await {
            Ok(()) => {
                match self
                    .asr
                    .transcribe(audio_ref, hint_language, AsrMode::Transcribe, AsrModel::Medium)
                    .await
                {
                    Ok(tier3) if !tier3.text.trim().is_empty() => {
                        info!(tier = 3, confidence = tier3.confidence, "transcription attempt");
                        Ok(self.to_result(tier3, TranscriptionTier::Three, audio_duration_s))
                    }
                    _ => {
                        warn!("tier 3 produced no usable text, returning best prior result degraded");
                        match best {
                            Some(mut result) => {
                                result.transcription_tier = TranscriptionTier::Degraded;
                                Ok(result)
                            }
                            None => Err(PipelineError::Transcription(
                                "no tier produced any text".to_string(),
                            )),
                        }
                    }
                }
            }
            Err(reason) => {
                warn!(reason, "tier 3 model allocation failed, returning best prior result degraded");
                match best {
                    Some(mut result) => {
                        result.transcription_tier = TranscriptionTier::Degraded;
                        Ok(result)
                    }
                    None => Err(PipelineError::Transcription(
                        "no tier produced any text".to_string(),
                    )),
                }
            }
        }
    }
}
