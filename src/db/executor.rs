//! Query execution engine.
//!
//! Runs a single SQL statement produced by the chain and renders the rows as
//! text. Rows are streamed and capped at a hard maximum so a question that
//! ignores the row limit cannot pull an entire table into memory.
//!
//! Statements are sent without bind parameters, so PostgreSQL uses the
//! simple query protocol and returns text-format values.

use crate::db::pool::DbPool;
use crate::db::types::{RowValues, SqlValue, render_rows};
use crate::error::{AppError, AppResult};
use futures_util::StreamExt;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Default execution timeout in seconds.
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;

/// Maximum number of rows kept from a single result.
pub const MAX_RESULT_ROWS: usize = 1000;

/// Decoded result of one statement.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutput {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
    /// True when more rows existed than [`MAX_RESULT_ROWS`].
    pub truncated: bool,
}

impl QueryOutput {
    /// Render the rows as a list of tuples.
    pub fn render(&self) -> String {
        render_rows(&self.rows)
    }
}

/// Query executor that handles database query execution.
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    default_timeout: Duration,
    row_cap: usize,
}

impl QueryExecutor {
    /// Create a new query executor with default settings.
    pub fn new() -> Self {
        Self {
            default_timeout: Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
            row_cap: MAX_RESULT_ROWS,
        }
    }

    /// Create a new query executor with a custom timeout.
    pub fn with_timeout(query_timeout: Duration) -> Self {
        Self {
            default_timeout: query_timeout,
            ..Self::new()
        }
    }

    /// Execute one statement and decode its rows.
    pub async fn execute(&self, pool: &DbPool, sql: &str) -> AppResult<QueryOutput> {
        let start = Instant::now();
        debug!(sql = %sql, timeout_secs = self.default_timeout.as_secs(), "Executing query");

        let fetch_limit = self.row_cap + 1;
        let (columns, mut rows) = match pool {
            DbPool::Postgres(p) => {
                postgres::fetch(p, sql, fetch_limit, self.default_timeout).await?
            }
            DbPool::SQLite(p) => sqlite::fetch(p, sql, fetch_limit, self.default_timeout).await?,
        };

        let truncated = rows.len() > self.row_cap;
        if truncated {
            warn!(limit = self.row_cap, "Query result truncated");
            rows.truncate(self.row_cap);
        }

        debug!(
            rows = rows.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Query finished"
        );
        Ok(QueryOutput {
            columns,
            rows,
            truncated,
        })
    }

    /// Execute one statement and return its rendered result.
    pub async fn run(&self, pool: &DbPool, sql: &str) -> AppResult<String> {
        Ok(self.execute(pool, sql).await?.render())
    }
}

impl Default for QueryExecutor {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Database-Specific Implementations
// =============================================================================

type Fetched = (Vec<String>, Vec<Vec<SqlValue>>);

fn collect_rows<R: RowValues>(results: Vec<Result<R, sqlx::Error>>) -> AppResult<Fetched> {
    let mut columns = Vec::new();
    let mut rows = Vec::with_capacity(results.len());
    for result in results {
        let row = result.map_err(AppError::from)?;
        if columns.is_empty() {
            columns = row.column_names();
        }
        rows.push(row.values());
    }
    Ok((columns, rows))
}

fn timeout_error(query_timeout: Duration) -> AppError {
    AppError::timeout("query execution", query_timeout.as_secs() as u32)
}

mod postgres {
    use super::*;
    use sqlx::Executor;
    use sqlx::PgPool;

    pub async fn fetch(
        pool: &PgPool,
        sql: &str,
        fetch_limit: usize,
        query_timeout: Duration,
    ) -> AppResult<Fetched> {
        let rows_future = pool.fetch(sql).take(fetch_limit).collect::<Vec<_>>();
        match timeout(query_timeout, rows_future).await {
            Ok(results) => collect_rows(results),
            Err(_) => Err(timeout_error(query_timeout)),
        }
    }
}

mod sqlite {
    use super::*;
    use sqlx::Executor;
    use sqlx::SqlitePool;

    pub async fn fetch(
        pool: &SqlitePool,
        sql: &str,
        fetch_limit: usize,
        query_timeout: Duration,
    ) -> AppResult<Fetched> {
        let rows_future = pool.fetch(sql).take(fetch_limit).collect::<Vec<_>>();
        match timeout(query_timeout, rows_future).await {
            Ok(results) => collect_rows(results),
            Err(_) => Err(timeout_error(query_timeout)),
        }
    }
}
