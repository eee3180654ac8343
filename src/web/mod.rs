//! Browser front end.
//!
//! A single page with a question box. Submitting it hands the question to an
//! [`Answerer`] and renders the outcome under the form.

pub mod page;
pub mod server;

pub use server::{AppState, HttpServer, router};

use crate::error::AppResult;
use async_trait::async_trait;

/// Turns a natural-language question into displayable result text.
#[async_trait]
pub trait Answerer: Send + Sync {
    async fn answer(&self, question: &str) -> AppResult<String>;
}
