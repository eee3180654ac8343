//! askdb library
//!
//! Answers natural-language questions about a SQL database (PostgreSQL or
//! SQLite). A hosted completion model writes the SQL, the database runs it,
//! and a small web page shows the result.

pub mod chain;
pub mod config;
pub mod db;
pub mod error;
pub mod llm;
pub mod web;

pub use chain::{ChainOutput, SqlDatabaseChain};
pub use config::Config;
pub use error::{AppError, AppResult};
