//! Natural-language question to SQL to answer.
//!
//! [`SqlDatabaseChain`] asks the completion model for a query, runs it, and
//! (unless `return_direct` is set) asks the model once more to phrase the
//! result as an answer.

pub mod prompt;
pub mod sql_validator;

use crate::config::{Config, DEFAULT_SAMPLE_ROWS, DEFAULT_TOP_K};
use crate::db::{DbPool, QueryExecutor, SchemaInspector};
use crate::error::{AppError, AppResult};
use crate::llm::CompletionModel;
use crate::web::Answerer;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

/// Everything one run of the chain produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainOutput {
    pub question: String,
    pub sql: String,
    pub sql_result: String,
    pub answer: String,
}

pub struct SqlDatabaseChain {
    model: Arc<dyn CompletionModel>,
    pool: DbPool,
    executor: QueryExecutor,
    top_k: usize,
    sample_rows: usize,
    allow_writes: bool,
    return_direct: bool,
}

impl SqlDatabaseChain {
    /// Chain with default settings: read-only, model-phrased answers.
    pub fn new(model: Arc<dyn CompletionModel>, pool: DbPool) -> Self {
        Self {
            model,
            pool,
            executor: QueryExecutor::new(),
            top_k: DEFAULT_TOP_K,
            sample_rows: DEFAULT_SAMPLE_ROWS,
            allow_writes: false,
            return_direct: false,
        }
    }

    pub fn from_config(config: &Config, model: Arc<dyn CompletionModel>, pool: DbPool) -> Self {
        Self {
            executor: QueryExecutor::with_timeout(config.query_timeout_duration()),
            top_k: config.top_k,
            sample_rows: config.sample_rows,
            allow_writes: config.allow_writes,
            return_direct: config.return_direct,
            ..Self::new(model, pool)
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_allow_writes(mut self, allow_writes: bool) -> Self {
        self.allow_writes = allow_writes;
        self
    }

    pub fn with_return_direct(mut self, return_direct: bool) -> Self {
        self.return_direct = return_direct;
        self
    }

    /// Run the chain for one question.
    pub async fn run(&self, question: &str) -> AppResult<ChainOutput> {
        info!(question = %question, model = %self.model.name(), "Entering SQL chain");

        let db_type = self.pool.db_type();
        let table_info = SchemaInspector::table_info(&self.pool, &self.executor, self.sample_rows).await?;
        debug!(table_info_chars = table_info.len(), "Collected table info");

        let sql_prompt = prompt::sql_prompt(db_type, self.top_k, &table_info, question);
        let completion = self
            .model
            .complete(&sql_prompt, &[prompt::SQL_RESULT_STOP])
            .await?;

        let sql = prompt::extract_sql(&completion);
        if sql.is_empty() {
            return Err(AppError::llm("The model did not return a SQL query", None));
        }
        info!(sql = %sql, "Generated SQL");

        if !self.allow_writes {
            sql_validator::validate_readonly(&sql, db_type)?;
        }

        let sql_result = self.executor.run(&self.pool, &sql).await?;
        info!(sql_result = %sql_result, "SQL result");

        let answer = if self.return_direct {
            sql_result.clone()
        } else {
            let answer_prompt = prompt::answer_prompt(&sql_prompt, &sql, &sql_result);
            self.model
                .complete(&answer_prompt, &[prompt::SQL_RESULT_STOP])
                .await?
                .trim()
                .to_string()
        };
        info!(answer = %answer, "Finished SQL chain");

        Ok(ChainOutput {
            question: question.to_string(),
            sql,
            sql_result,
            answer,
        })
    }
}

#[async_trait]
impl Answerer for SqlDatabaseChain {
    async fn answer(&self, question: &str) -> AppResult<String> {
        Ok(self.run(question).await?.answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ConnectionDescriptor;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Model that replays canned completions and records prompts.
    struct ScriptedModel {
        replies: Mutex<VecDeque<String>>,
        prompts: Mutex<Vec<(String, Vec<String>)>>,
    }

    impl ScriptedModel {
        fn new(replies: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn prompts(&self) -> Vec<(String, Vec<String>)> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CompletionModel for ScriptedModel {
        async fn complete(&self, prompt: &str, stop: &[&str]) -> AppResult<String> {
            self.prompts.lock().unwrap().push((
                prompt.to_string(),
                stop.iter().map(|s| s.to_string()).collect(),
            ));
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| AppError::llm("script exhausted", None))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    async fn pets_pool() -> DbPool {
        let descriptor = ConnectionDescriptor::from_url("sqlite::memory:").unwrap();
        let pool = DbPool::connect(&descriptor, false).await.unwrap();
        if let DbPool::SQLite(p) = &pool {
            sqlx::query("CREATE TABLE pets (id INTEGER PRIMARY KEY, name TEXT NOT NULL)")
                .execute(p)
                .await
                .unwrap();
            sqlx::query("INSERT INTO pets (name) VALUES ('Rex'), ('Tom'), ('Kiki')")
                .execute(p)
                .await
                .unwrap();
        }
        pool
    }

    #[tokio::test]
    async fn test_run_two_step() {
        let model = ScriptedModel::new(&[" SELECT COUNT(*) FROM pets", " There are 3 pets."]);
        let chain = SqlDatabaseChain::new(model.clone(), pets_pool().await);

        let output = chain.run("How many pets?").await.unwrap();
        assert_eq!(output.sql, "SELECT COUNT(*) FROM pets");
        assert_eq!(output.sql_result, "[(3,)]");
        assert_eq!(output.answer, "There are 3 pets.");

        let prompts = model.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].0.contains("CREATE TABLE \"pets\""));
        assert!(prompts[0].0.contains("3 rows from pets table"));
        assert!(prompts[0].0.ends_with("Question: How many pets?\nSQLQuery:"));
        assert_eq!(prompts[0].1, vec![prompt::SQL_RESULT_STOP.to_string()]);
        assert!(prompts[1].0.ends_with("SQLResult: [(3,)]\nAnswer:"));
        assert_eq!(prompts[1].1, vec![prompt::SQL_RESULT_STOP.to_string()]);
    }

    #[tokio::test]
    async fn test_return_direct_skips_second_call() {
        let model = ScriptedModel::new(&["SELECT name FROM pets ORDER BY id LIMIT 1"]);
        let chain = SqlDatabaseChain::new(model.clone(), pets_pool().await).with_return_direct(true);

        let output = chain.run("First pet?").await.unwrap();
        assert_eq!(output.answer, "[('Rex',)]");
        assert_eq!(model.prompts().len(), 1);
    }

    #[tokio::test]
    async fn test_write_rejected_by_default() {
        let model = ScriptedModel::new(&["DELETE FROM pets"]);
        let chain = SqlDatabaseChain::new(model, pets_pool().await);

        let err = chain.run("Remove all pets").await.unwrap_err();
        assert!(matches!(err, AppError::Permission { .. }));
    }

    #[tokio::test]
    async fn test_empty_sql_is_error() {
        let model = ScriptedModel::new(&["```sql\n```"]);
        let chain = SqlDatabaseChain::new(model, pets_pool().await);

        let err = chain.run("?").await.unwrap_err();
        assert!(matches!(err, AppError::Llm { .. }));
    }

    #[tokio::test]
    async fn test_answerer_returns_answer() {
        let model = ScriptedModel::new(&["SELECT 1", "One."]);
        let chain = SqlDatabaseChain::new(model, pets_pool().await);
        assert_eq!(chain.answer("q").await.unwrap(), "One.");
    }
}
