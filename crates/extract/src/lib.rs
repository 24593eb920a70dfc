//! Ensemble Merger, Post-Processor, and Validator (§4.10-§4.12)
//!
//! The three stages that run after whichever extractor(s) the Router
//! picked, and before the Metrics Collector records the outcome.

pub mod ensemble;
pub mod post_processor;
pub mod validator;

pub use ensemble::EnsembleMerger;
pub use post_processor::PostProcessor;
pub use validator::Validator;
