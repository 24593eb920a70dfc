//! Batch CLI entry point
//!
//! Runs one consultation recording through the pipeline and prints the
//! resulting prescription and validation report as JSON. The pipeline is
//! a single-invocation batch unit of work (§1, §5) — this binary is one
//! out-of-scope collaborator's worth of plumbing around `process()`, not
//! part of the extraction pipeline itself.

use medirx_config::{KnowledgeBase, Settings};
use medirx_core::{AudioInput, ProcessOptions};
use medirx_llm::{ChatBackend, ChatBackendConfig};
use medirx_pipeline::{HttpAsr, HttpAsrConfig, Tier3Guard};
use medirx_server::{process, MetricsCollector, PipelineDeps};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "medirx=info".into());
    let fmt_layer = tracing_subscriber::fmt::layer().json().boxed();
    tracing_subscriber::registry().with(env_filter).with(fmt_layer).init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let audio_path = match std::env::args().nth(1) {
        Some(path) => path,
        None => {
            eprintln!("usage: medirx <audio-file-path>");
            std::process::exit(2);
        }
    };

    let config_path = std::env::var("MEDIRX_SETTINGS_PATH").ok();
    let settings = Settings::load(config_path.as_deref()).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load settings, using defaults");
        Settings::default()
    });

    let kb = match &settings.kb_dir {
        Some(dir) => KnowledgeBase::load(dir).map_err(|e| {
            tracing::error!(error = %e, dir = %dir, "failed to load knowledge base");
            e
        })?,
        None => {
            tracing::info!("no kb_dir configured, using built-in gazetteer");
            KnowledgeBase::default_builtin()
        }
    };

    let asr = HttpAsr::new(HttpAsrConfig {
        base_url: settings.asr.base_url.clone(),
        api_key: settings.asr.api_key.clone(),
        timeout: std::time::Duration::from_millis(settings.asr.timeout_ms),
    })?;

    let llm = ChatBackend::new(ChatBackendConfig {
        base_url: settings.llm.base_url.clone(),
        api_key: settings.llm.api_key.clone(),
        models: settings.llm.models.clone(),
        max_retries: settings.llm.max_retries,
        initial_backoff: std::time::Duration::from_millis(settings.llm.initial_backoff_ms),
        timeout: std::time::Duration::from_millis(settings.llm.timeout_ms),
    })?;

    let deps = PipelineDeps {
        kb: Arc::new(kb),
        asr: Arc::new(asr),
        llm: Arc::new(llm),
        tier3_guard: Arc::new(Tier3Guard::new()),
        metrics: MetricsCollector::file(settings.metrics_path.clone()),
        settings,
    };

    let audio = AudioInput::from_path(&audio_path);
    match process(&deps, audio, ProcessOptions::default(), None).await {
        Ok((prescription, report, record)) => {
            tracing::info!(
                valid = report.valid,
                extraction_method = ?record.extraction_method,
                wall_time_ms = record.wall_time_ms,
                "pipeline run complete"
            );
            let output = serde_json::json!({
                "prescription": prescription,
                "validation": report,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            if !report.valid {
                std::process::exit(1);
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "pipeline run failed");
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}
