//! Reference HTTP-backed ASR collaborator
//!
//! Grounded on the teacher's `ChatBackend`-style adapter in `medirx-llm`:
//! a thin `reqwest` client speaking a documented wire shape, with no
//! vendor-specific logic baked into the `Transcriber`. The production
//! speech-to-text service lives outside this workspace (§1); this is the
//! shape a real deployment's ASR sidecar is expected to expose.

use async_trait::async_trait;
use medirx_core::language::Language;
use medirx_core::traits::{AsrMode, AsrModel, AsrOutput, SpeechToText};
use medirx_core::Result;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpAsrConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

/// Multipart-upload ASR adapter. POSTs the audio file at `audio_ref` to
/// `{base_url}/transcribe` and parses a JSON response shaped like
/// [`AsrResponse`]. `audio_ref` must be a filesystem path; in-memory byte
/// buffers are not supported by this reference adapter (§6: "out of
/// scope ... for this implementation").
pub struct HttpAsr {
    client: Client,
    config: HttpAsrConfig,
}

impl HttpAsr {
    pub fn new(config: HttpAsrConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build().map_err(|e| {
            medirx_core::Error::Configuration(format!("failed to build ASR HTTP client: {e}"))
        })?;
        Ok(Self { client, config })
    }

    fn url(&self) -> String {
        format!("{}/transcribe", self.config.base_url)
    }
}

#[async_trait]
impl SpeechToText for HttpAsr {
    async fn transcribe(
        &self,
        audio_ref: &str,
        hint: Option<Language>,
        mode: AsrMode,
        model: AsrModel,
    ) -> Result<AsrOutput> {
        let bytes = tokio::fs::read(audio_ref).await.map_err(|e| {
            medirx_core::Error::Transcription(format!("failed to read {audio_ref}: {e}"))
        })?;
        let file_name = audio_ref.rsplit('/').next().unwrap_or(audio_ref).to_string();
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("audio/wav")
            .map_err(|e| medirx_core::Error::Transcription(e.to_string()))?;

        let mut form = reqwest::multipart::Form::new()
            .part("audio", part)
            .text("model", model_name_for(model))
            .text("task", mode_name(mode));
        if let Some(language) = hint {
            form = form.text("language", language.code().to_string());
        }

        let mut req = self.client.post(self.url()).multipart(form);
        if let Some(key) = &self.config.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                medirx_core::Error::Timeout { stage: "transcriber" }
            } else {
                medirx_core::Error::Transient {
                    stage: "transcriber",
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            let text = response.text().await.unwrap_or_default();
            return Err(medirx_core::Error::Transient {
                stage: "transcriber",
                message: format!("{status}: {text}"),
            });
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(medirx_core::Error::Transcription(format!("{status}: {text}")));
        }

        let parsed: AsrResponse = response
            .json()
            .await
            .map_err(|e| medirx_core::Error::Transcription(format!("invalid ASR response: {e}")))?;

        Ok(AsrOutput {
            text: parsed.text,
            language: parsed.language,
            no_speech_prob: parsed.no_speech_prob,
            confidence: parsed.confidence.unwrap_or(1.0 - parsed.no_speech_prob),
        })
    }

    async fn ensure_loaded(&self, model: AsrModel) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/load", self.config.base_url))
            .json(&serde_json::json!({ "model": model_name_for(model) }))
            .send()
            .await
            .map_err(|e| medirx_core::Error::Transient {
                stage: "transcriber",
                message: e.to_string(),
            })?;
        if !response.status().is_success() {
            return Err(medirx_core::Error::Transient {
                stage: "transcriber",
                message: format!("model load failed: {}", response.status()),
            });
        }
        Ok(())
    }

    fn model_name(&self) -> &str {
        "http-asr"
    }
}

fn model_name_for(model: AsrModel) -> &'static str {
    match model {
        AsrModel::Base => "base",
        AsrModel::Medium => "medium",
    }
}

fn mode_name(mode: AsrMode) -> &'static str {
    match mode {
        AsrMode::Transcribe => "transcribe",
        AsrMode::Translate => "translate",
    }
}

#[derive(Debug, Deserialize)]
struct AsrResponse {
    text: String,
    language: String,
    no_speech_prob: f32,
    #[serde(default)]
    confidence: Option<f32>,
}
