//! Completion model abstraction.
//!
//! The chain only needs "prompt in, text out". [`CompletionModel`] is that
//! seam; [`OpenAiCompletion`] is the hosted implementation.

pub mod openai;

pub use openai::OpenAiCompletion;

use crate::error::AppResult;
use async_trait::async_trait;

/// A text completion model.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Complete `prompt`, stopping before any of the `stop` sequences.
    async fn complete(&self, prompt: &str, stop: &[&str]) -> AppResult<String>;

    /// Model name for logging.
    fn name(&self) -> &str;
}
