//! Pipeline entry point, Metrics Collector, and CLI
//!
//! Wires the stage crates (`medirx-pipeline`, `medirx-normalize`,
//! `medirx-llm`, `medirx-rules`, `medirx-extract`) into the single
//! `process()` call documented in §2, and records the Metrics Collector's
//! per-invocation summary (§4.13).

pub mod metrics;
pub mod process;

pub use metrics::{AggregateSummary, MetricsCollector, MetricsRecord, MetricsSink};
pub use process::{process, PipelineDeps, ProcessError};
