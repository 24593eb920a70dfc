//! LLM collaborator interface

use crate::error::Result;
use crate::llm_types::{GenerateRequest, GenerateResponse};
use async_trait::async_trait;

/// Language model collaborator.
///
/// Implementations: a sequential-model-fallback HTTP backend
/// (`medirx-llm::backend::ChatBackend`) and test doubles.
#[async_trait]
pub trait LanguageModel: Send + Sync + 'static {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse>;

    /// Whether the backend currently believes it can serve a request,
    /// without making one.
    async fn is_available(&self) -> bool;

    fn model_name(&self) -> &str;

    /// Rough token estimate, used to size prompts against the model's
    /// context window before sending.
    fn estimate_tokens(&self, text: &str) -> usize {
        text.chars().count() / 3
    }
}
