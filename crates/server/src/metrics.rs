//! Metrics Collector (§4.13)
//!
//! Every `process()` invocation ends in exactly one [`MetricsRecord`],
//! appended to an ndjson sink. There is no scrape endpoint here: this is a
//! batch pipeline invoked per consultation, not a long-running service with
//! a `/metrics` surface, so the append-only record is the whole story —
//! unlike the teacher's Prometheus exporter, which this crate intentionally
//! drops (see `DESIGN.md`).

use chrono::{DateTime, Utc};
use medirx_core::prescription::ExtractionMethod;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("failed to write metrics record: {0}")]
    Write(String),
    #[error("failed to read metrics records: {0}")]
    Read(String),
}

/// One invocation's outcome, independent of whether it succeeded, failed
/// validation, or errored outright.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsRecord {
    pub invocation_id: String,
    pub timestamp: DateTime<Utc>,
    pub audio_ref: String,
    pub transcription_tier: i8,
    pub no_speech_prob: f32,
    pub text_length: usize,
    pub language: String,
    pub language_confidence: f32,
    pub router_decision: String,
    pub router_score: f32,
    pub extraction_method: ExtractionMethod,
    pub medicine_count: usize,
    pub diagnosis_count: usize,
    pub test_count: usize,
    pub advice_count: usize,
    pub valid: bool,
    pub error_count: usize,
    pub warning_count: usize,
    pub wall_time_ms: u64,
}

/// Where recorded invocations go.
pub enum MetricsSink {
    File(PathBuf),
    Memory(Arc<Mutex<Vec<MetricsRecord>>>),
}

/// Appends [`MetricsRecord`]s to their sink. Cheap to construct per
/// invocation; the `File` variant serializes concurrent writers through an
/// internal lock so ndjson lines never interleave.
pub struct MetricsCollector {
    sink: MetricsSink,
    write_lock: Mutex<()>,
}

impl MetricsCollector {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            sink: MetricsSink::File(path.into()),
            write_lock: Mutex::new(()),
        }
    }

    pub fn memory() -> Self {
        Self {
            sink: MetricsSink::Memory(Arc::new(Mutex::new(Vec::new()))),
            write_lock: Mutex::new(()),
        }
    }

    pub fn record(&self, record: MetricsRecord) -> Result<(), MetricsError> {
        match &self.sink {
            MetricsSink::Memory(buf) => {
                buf.lock().push(record);
                Ok(())
            }
            MetricsSink::File(path) => {
                let _guard = self.write_lock.lock();
                let line = serde_json::to_string(&record)
                    .map_err(|e| MetricsError::Write(e.to_string()))?;
                let mut file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|e| MetricsError::Write(e.to_string()))?;
                writeln!(file, "{line}").map_err(|e| MetricsError::Write(e.to_string()))?;
                Ok(())
            }
        }
    }

    /// All records recorded so far, read back from the sink.
    pub fn records(&self) -> Result<Vec<MetricsRecord>, MetricsError> {
        match &self.sink {
            MetricsSink::Memory(buf) => Ok(buf.lock().clone()),
            MetricsSink::File(path) => {
                let _guard = self.write_lock.lock();
                let file = match OpenOptions::new().read(true).open(path) {
                    Ok(file) => file,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
                    Err(e) => return Err(MetricsError::Read(e.to_string())),
                };
                BufReader::new(file)
                    .lines()
                    .filter(|line| line.as_ref().map(|l| !l.trim().is_empty()).unwrap_or(true))
                    .map(|line| {
                        let line = line.map_err(|e| MetricsError::Read(e.to_string()))?;
                        serde_json::from_str(&line).map_err(|e| MetricsError::Read(e.to_string()))
                    })
                    .collect()
            }
        }
    }
}

/// Aggregate view over a batch of [`MetricsRecord`]s — the shape an
/// operator dashboard or nightly report would compute from the ndjson log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateSummary {
    pub total: usize,
    pub success_rate: f32,
    pub route_distribution: std::collections::HashMap<String, usize>,
    pub extraction_method_distribution: std::collections::HashMap<String, usize>,
    pub language_distribution: std::collections::HashMap<String, usize>,
    pub tier_distribution: std::collections::HashMap<i8, usize>,
    pub mean_wall_time_ms: f64,
    pub median_wall_time_ms: f64,
}

impl AggregateSummary {
    pub fn from_records(records: &[MetricsRecord]) -> Self {
        let total = records.len();
        if total == 0 {
            return Self {
                total: 0,
                success_rate: 0.0,
                route_distribution: Default::default(),
                extraction_method_distribution: Default::default(),
                language_distribution: Default::default(),
                tier_distribution: Default::default(),
                mean_wall_time_ms: 0.0,
                median_wall_time_ms: 0.0,
            };
        }

        let valid_count = records.iter().filter(|r| r.valid).count();
        let mut route_distribution = std::collections::HashMap::new();
        let mut extraction_method_distribution = std::collections::HashMap::new();
        let mut language_distribution = std::collections::HashMap::new();
        let mut tier_distribution = std::collections::HashMap::new();

        for r in records {
            *route_distribution.entry(r.router_decision.clone()).or_insert(0) += 1;
            *extraction_method_distribution
                .entry(format!("{:?}", r.extraction_method).to_lowercase())
                .or_insert(0) += 1;
            *language_distribution.entry(r.language.clone()).or_insert(0) += 1;
            *tier_distribution.entry(r.transcription_tier).or_insert(0) += 1;
        }

        let mut wall_times: Vec<u64> = records.iter().map(|r| r.wall_time_ms).collect();
        wall_times.sort_unstable();
        let mean_wall_time_ms = wall_times.iter().sum::<u64>() as f64 / total as f64;
        let median_wall_time_ms = if wall_times.len() % 2 == 0 {
            let mid = wall_times.len() / 2;
            (wall_times[mid - 1] + wall_times[mid]) as f64 / 2.0
        } else {
            wall_times[wall_times.len() / 2] as f64
        };

        Self {
            total,
            success_rate: valid_count as f32 / total as f32,
            route_distribution,
            extraction_method_distribution,
            language_distribution,
            tier_distribution,
            mean_wall_time_ms,
            median_wall_time_ms,
        }
    }
}
