//! Pipeline entry point (§2, §5)
//!
//! `process()` wires every stage crate into the linear order the spec
//! names: Transcriber → Transcript Cleaner → Language Detector →
//! Thanglish Normalizer (conditionally) → Router → extractor(s) → the
//! confidence min-rule → Post-Processor → Validator → handoff write →
//! Metrics Collector. Cooperative cancellation (§5) is checked at each of
//! these stage boundaries via [`medirx_core::CancellationToken`].

use crate::metrics::{MetricsCollector, MetricsError, MetricsRecord};
use medirx_config::{KnowledgeBase, Settings};
use medirx_core::{
    AudioInput, AudioSource, CancellationToken, Error as CoreError, ExtractionInput, Extractor,
    Language, LanguageModel, Prescription, ProcessOptions, Result as CoreResult, SpeechToText,
    ValidationReport,
};
use medirx_extract::{EnsembleMerger, PostProcessor, Validator};
use medirx_llm::LlmExtractor;
use medirx_normalize::{LanguageDetector, Route as StageRoute, Router, ThanglishNormalizer};
use medirx_pipeline::{wav_duration_seconds, Tier3Guard, TranscriptCleaner, Transcriber};
use medirx_rules::RuleExtractor;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error(transparent)]
    Pipeline(#[from] CoreError),

    #[error("failed to write handoff file: {0}")]
    Handoff(String),

    #[error(transparent)]
    Metrics(#[from] MetricsError),
}

/// Collaborators and reference data a `process()` invocation needs. Built
/// once at startup and shared read-only across concurrent invocations.
pub struct PipelineDeps {
    pub kb: Arc<KnowledgeBase>,
    pub asr: Arc<dyn SpeechToText>,
    pub llm: Arc<dyn LanguageModel>,
    pub tier3_guard: Arc<Tier3Guard>,
    pub settings: Settings,
    pub metrics: MetricsCollector,
}

fn check_cancelled(cancel: Option<&CancellationToken>, stage: &'static str) -> CoreResult<()> {
    if cancel.map(|token| token.is_cancelled()).unwrap_or(false) {
        return Err(CoreError::Cancelled { stage });
    }
    Ok(())
}

fn is_empty_shell(rx: &Prescription) -> bool {
    rx.patient_name.trim().is_empty()
        && rx.complaints.is_empty()
        && rx.diagnosis.is_empty()
        && rx.medicines.is_empty()
        && rx.advice.is_empty()
}

fn route_label(route: StageRoute) -> &'static str {
    match route {
        StageRoute::LlmOnly => "llm_only",
        StageRoute::Ensemble => "ensemble",
        StageRoute::RulesOnly => "rules_only",
    }
}

/// Whether the Thanglish Normalizer should run (§4.5): the decided
/// language is Thanglish outright, or Mixed with Tamil-leaning evidence
/// from either signal.
fn should_normalize_thanglish(decision: &medirx_core::LanguageDecision) -> bool {
    match decision.primary {
        Language::Thanglish => true,
        Language::Mixed => {
            matches!(decision.lexical_hint, Some(Language::Tamil) | Some(Language::Thanglish))
                || matches!(decision.acoustic_hint, Some(Language::Tamil))
        }
        _ => false,
    }
}

/// Run the full pipeline over one consultation recording.
pub async fn process(
    deps: &PipelineDeps,
    audio: AudioInput,
    options: ProcessOptions,
    cancel: Option<&CancellationToken>,
) -> Result<(Prescription, ValidationReport, MetricsRecord), ProcessError> {
    let start = Instant::now();
    let invocation_id = Uuid::new_v4().to_string();
    let audio_ref = audio.reference();

    let audio_path = match &audio.source {
        AudioSource::Path(path) => path.clone(),
        AudioSource::Bytes { .. } => {
            return Err(CoreError::Transcription(
                "in-memory audio buffers are not supported by the reference ASR adapter"
                    .to_string(),
            )
            .into())
        }
    };
    let audio_duration_s = if audio_path.extension().map(|e| e.eq_ignore_ascii_case("wav")).unwrap_or(false) {
        wav_duration_seconds(&audio_path).unwrap_or(0.0)
    } else {
        0.0
    };
    let audio_ref_str = audio_path.to_string_lossy().to_string();

    check_cancelled(cancel, "transcriber")?;
    let transcriber = Transcriber::new(deps.asr.clone(), deps.kb.clone(), deps.tier3_guard.clone());
    let transcription = transcriber
        .transcribe(&audio_ref_str, options.hint_language, audio_duration_s, options.max_tier)
        .await
        .map_err(CoreError::from)?;

    check_cancelled(cancel, "transcript_cleaner")?;
    let cleaned = TranscriptCleaner::new(&deps.kb).clean(&transcription.text);

    check_cancelled(cancel, "language_detector")?;
    let acoustic_hint = Language::from_str_loose(&transcription.whisper_language);
    let language_decision =
        LanguageDetector::new().detect(&cleaned.text, acoustic_hint, transcription.confidence);

    let normalized_text = if should_normalize_thanglish(&language_decision) {
        ThanglishNormalizer::new().normalize(&cleaned.text)
    } else {
        cleaned.text.clone()
    };

    check_cancelled(cancel, "router")?;
    let router_decision = Router::new(&deps.kb).route(&normalized_text, &language_decision, transcription.confidence);
    let effective_route = if options.llm_enabled {
        router_decision.route
    } else {
        StageRoute::RulesOnly
    };

    check_cancelled(cancel, "extraction")?;
    let rule_extractor = RuleExtractor::new(deps.kb.clone());
    let llm_extractor = LlmExtractor::new(deps.llm.clone(), deps.kb.clone(), deps.settings.llm.max_tokens);
    // Patient-name extraction runs against the pre-Thanglish-normalization
    // text: the normalizer rewrites the very "peru"/"peyar" greeting
    // tokens the name patterns key on, so normalized_text would never
    // match for genuine Thanglish input.
    let extraction_input = ExtractionInput {
        cleaned_text: &normalized_text,
        name_source_text: &cleaned.text,
        language: &language_decision,
        transcription_tier: transcription.transcription_tier.as_i8(),
    };

    let mut rx = match effective_route {
        StageRoute::RulesOnly => rule_extractor.extract(extraction_input).await?,
        StageRoute::LlmOnly => {
            let llm_rx = llm_extractor.extract(extraction_input.clone()).await?;
            if is_empty_shell(&llm_rx) {
                let fallback = rule_extractor.extract(extraction_input).await?;
                if is_empty_shell(&fallback) {
                    return Err(CoreError::Extraction(
                        "llm extractor and rule-extractor fallback both produced an empty prescription"
                            .to_string(),
                    )
                    .into());
                }
                fallback
            } else {
                llm_rx
            }
        }
        StageRoute::Ensemble => {
            let merger = EnsembleMerger::new(Arc::new(llm_extractor), Arc::new(rule_extractor));
            let merged = merger.extract(extraction_input).await?;
            if is_empty_shell(&merged) {
                return Err(CoreError::Extraction(
                    "ensemble merger produced an empty prescription".to_string(),
                )
                .into());
            }
            merged
        }
    };

    // Confidence min-rule: the extractor's self-reported confidence can
    // never exceed how confident the Transcriber was about the text it
    // extracted from.
    rx.confidence = transcription.confidence.min(rx.confidence);

    check_cancelled(cancel, "post_processor")?;
    PostProcessor::new(&deps.kb).process(&mut rx, &normalized_text, &cleaned.text);

    check_cancelled(cancel, "validator")?;
    let report = Validator::new(&deps.kb).validate(&rx);

    check_cancelled(cancel, "handoff")?;
    let handoff_json = serde_json::to_vec_pretty(&rx)
        .map_err(|e| ProcessError::Handoff(e.to_string()))?;
    tokio::fs::write(&deps.settings.handoff_path, handoff_json)
        .await
        .map_err(|e| ProcessError::Handoff(e.to_string()))?;

    let record = MetricsRecord {
        invocation_id,
        timestamp: chrono::Utc::now(),
        audio_ref,
        transcription_tier: transcription.transcription_tier.as_i8(),
        no_speech_prob: transcription.no_speech_prob,
        text_length: normalized_text.len(),
        language: language_decision.primary.code().to_string(),
        language_confidence: language_decision.confidence,
        router_decision: route_label(effective_route).to_string(),
        router_score: router_decision.score,
        extraction_method: rx.extraction_method,
        medicine_count: rx.medicines.len(),
        diagnosis_count: rx.diagnosis.len(),
        test_count: rx.tests.len(),
        advice_count: rx.advice.len(),
        valid: report.valid,
        error_count: report.errors.len(),
        warning_count: report.warnings.len(),
        wall_time_ms: start.elapsed().as_millis() as u64,
    };
    deps.metrics.record(record.clone())?;

    Ok((rx, report, record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use medirx_core::llm_types::{GenerateRequest, GenerateResponse};
    use medirx_core::traits::{AsrMode, AsrModel, AsrOutput};

    struct ScriptedAsr;

    #[async_trait]
    impl SpeechToText for ScriptedAsr {
        async fn transcribe(
            &self,
            _audio_ref: &str,
            _hint: Option<Language>,
            _mode: AsrMode,
            _model: AsrModel,
        ) -> CoreResult<AsrOutput> {
            Ok(AsrOutput {
                text: "Hello John. You have pharyngitis. Take erythromycin 500 mg three times a day for 5 days after food. Drink warm fluids and rest.".to_string(),
                language: "en".to_string(),
                no_speech_prob: 0.05,
                confidence: 0.9,
            })
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    struct ScriptedLlm;

    #[async_trait]
    impl LanguageModel for ScriptedLlm {
        async fn generate(&self, _request: GenerateRequest) -> CoreResult<GenerateResponse> {
            Ok(GenerateResponse::text(
                r#"{"patient_name":"John","complaints":["fever"],"diagnosis":["pharyngitis"],
                "medicines":[{"name":"erythromycin","dose":"500 mg","frequency":"3 times a day","duration":"5 days","instruction":"after food","route":"oral"}],
                "tests":[],"advice":["drink warm fluids"],"follow_up_days":null}"#
                    .to_string(),
            ))
        }
        async fn is_available(&self) -> bool {
            true
        }
        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    fn deps(metrics: MetricsCollector) -> PipelineDeps {
        PipelineDeps {
            kb: Arc::new(KnowledgeBase::default_builtin()),
            asr: Arc::new(ScriptedAsr),
            llm: Arc::new(ScriptedLlm),
            tier3_guard: Arc::new(Tier3Guard::new()),
            settings: Settings::default(),
            metrics,
        }
    }

    #[tokio::test]
    async fn end_to_end_run_produces_a_valid_prescription() {
        let dir = tempfile::tempdir().unwrap();
        let audio_path = dir.path().join("consult.wav");
        std::fs::write(&audio_path, b"not a real wav, duration lookup will fail gracefully").unwrap();

        let mut settings = Settings::default();
        settings.handoff_path = dir.path().join("handoff.json").to_string_lossy().to_string();
        let mut deps = deps(MetricsCollector::memory());
        deps.settings = settings;

        let audio = AudioInput::from_path(&audio_path);
        let (rx, report, record) = process(&deps, audio, ProcessOptions::default(), None).await.unwrap();

        assert_eq!(rx.patient_name, "John");
        assert!(!rx.medicines.is_empty());
        assert!(report.valid);
        assert_eq!(record.extraction_method, medirx_core::ExtractionMethod::Llm);
        assert!(std::path::Path::new(&deps.settings.handoff_path).exists());
    }

    #[tokio::test]
    async fn cancellation_observed_before_transcription_starts() {
        let dir = tempfile::tempdir().unwrap();
        let audio_path = dir.path().join("consult.wav");
        std::fs::write(&audio_path, b"irrelevant").unwrap();

        let deps = deps(MetricsCollector::memory());
        let token = CancellationToken::new();
        token.cancel();

        let audio = AudioInput::from_path(&audio_path);
        let err = process(&deps, audio, ProcessOptions::default(), Some(&token))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::Pipeline(CoreError::Cancelled { stage: "transcriber" })));
    }

    #[tokio::test]
    async fn in_memory_audio_is_rejected_by_the_reference_asr_adapter() {
        let deps = deps(MetricsCollector::memory());
        let audio = AudioInput::from_bytes(vec![0u8; 16], "audio/wav");
        let err = process(&deps, audio, ProcessOptions::default(), None).await.unwrap_err();
        assert!(matches!(err, ProcessError::Pipeline(CoreError::Transcription(_))));
    }

    struct ThanglishAsr;

    #[async_trait]
    impl SpeechToText for ThanglishAsr {
        async fn transcribe(
            &self,
            _audio_ref: &str,
            _hint: Option<Language>,
            _mode: AsrMode,
            _model: AsrModel,
        ) -> CoreResult<AsrOutput> {
            Ok(AsrOutput {
                text: "patient peru Karuppan, kaichel iruku, take paracetamol 500 mg".to_string(),
                language: "en".to_string(),
                no_speech_prob: 0.05,
                confidence: 0.9,
            })
        }

        fn model_name(&self) -> &str {
            "scripted-thanglish"
        }
    }

    /// Regression for spec.md §8 scenario 2: Thanglish normalization must
    /// not clobber the "patient peru NAME" greeting pattern before name
    /// extraction runs.
    #[tokio::test]
    async fn thanglish_greeting_name_survives_normalization() {
        let dir = tempfile::tempdir().unwrap();
        let audio_path = dir.path().join("consult.wav");
        std::fs::write(&audio_path, b"not a real wav, duration lookup will fail gracefully").unwrap();

        let mut settings = Settings::default();
        settings.handoff_path = dir.path().join("handoff.json").to_string_lossy().to_string();
        let deps = PipelineDeps {
            kb: Arc::new(KnowledgeBase::default_builtin()),
            asr: Arc::new(ThanglishAsr),
            llm: Arc::new(ScriptedLlm),
            tier3_guard: Arc::new(Tier3Guard::new()),
            settings,
            metrics: MetricsCollector::memory(),
        };

        let audio = AudioInput::from_path(&audio_path);
        let options = ProcessOptions {
            llm_enabled: false,
            ..ProcessOptions::default()
        };
        let (rx, _report, _record) = process(&deps, audio, options, None).await.unwrap();

        assert_eq!(rx.patient_name, "Karuppan");
    }
}
