//! Configuration handling for askdb.
//!
//! Values come from CLI arguments and environment variables. `main` loads a
//! local `.env` file first, so the variables may live there as well. The
//! credential variables keep their short historical names (`user`, `pass`,
//! `host`, `dbase`).

use crate::error::{AppError, AppResult};
use clap::Parser;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_HTTP_HOST: &str = "127.0.0.1";
pub const DEFAULT_HTTP_PORT: u16 = 8501;
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo-instruct";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_SAMPLE_ROWS: usize = 3;
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 60;

/// Configuration for askdb.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "askdb",
    about = "Ask natural-language questions about a SQL database",
    version,
    author
)]
pub struct Config {
    /// API key for the hosted completion API
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Database user
    #[arg(long = "db-user", env = "user")]
    pub db_user: Option<String>,

    /// Database password
    #[arg(long = "db-pass", env = "pass", hide_env_values = true)]
    pub db_pass: Option<String>,

    /// Database host
    #[arg(long = "db-host", env = "host")]
    pub db_host: Option<String>,

    /// Database name
    #[arg(long = "db-name", env = "dbase")]
    pub db_name: Option<String>,

    /// Full connection URL; replaces the one assembled from user/pass/host/dbase.
    /// Accepts postgres://, postgresql:// and sqlite: URLs.
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// Completion model name
    #[arg(long, default_value = DEFAULT_MODEL, env = "OPENAI_MODEL")]
    pub model: String,

    /// Base URL of the completion API
    #[arg(long, default_value = DEFAULT_OPENAI_BASE_URL, env = "OPENAI_BASE_URL")]
    pub openai_base_url: String,

    /// HTTP host to bind to
    #[arg(long, default_value = DEFAULT_HTTP_HOST, env = "ASKDB_HTTP_HOST")]
    pub http_host: String,

    /// HTTP port to bind to
    #[arg(long, default_value_t = DEFAULT_HTTP_PORT, env = "ASKDB_HTTP_PORT")]
    pub http_port: u16,

    /// Row limit the model is told to apply when the question names none
    #[arg(long, default_value_t = DEFAULT_TOP_K, env = "ASKDB_TOP_K")]
    pub top_k: usize,

    /// Example rows per table included in the schema description
    #[arg(long, default_value_t = DEFAULT_SAMPLE_ROWS, env = "ASKDB_SAMPLE_ROWS")]
    pub sample_rows: usize,

    /// SQL execution timeout in seconds
    #[arg(long, default_value_t = DEFAULT_QUERY_TIMEOUT_SECS, env = "ASKDB_QUERY_TIMEOUT")]
    pub query_timeout: u64,

    /// Completion request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_LLM_TIMEOUT_SECS, env = "ASKDB_LLM_TIMEOUT")]
    pub llm_timeout: u64,

    /// Allow generated SQL that modifies data or schema
    #[arg(long, env = "ASKDB_ALLOW_WRITES")]
    pub allow_writes: bool,

    /// Show the raw SQL result instead of a model-phrased answer
    #[arg(long, env = "ASKDB_RETURN_DIRECT")]
    pub return_direct: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "ASKDB_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "ASKDB_JSON_LOGS")]
    pub json_logs: bool,
}

impl Config {
    /// Create a default configuration (useful for testing).
    pub fn default_config() -> Self {
        Self {
            openai_api_key: None,
            db_user: None,
            db_pass: None,
            db_host: None,
            db_name: None,
            database_url: None,
            model: DEFAULT_MODEL.to_string(),
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            http_host: DEFAULT_HTTP_HOST.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            top_k: DEFAULT_TOP_K,
            sample_rows: DEFAULT_SAMPLE_ROWS,
            query_timeout: DEFAULT_QUERY_TIMEOUT_SECS,
            llm_timeout: DEFAULT_LLM_TIMEOUT_SECS,
            allow_writes: false,
            return_direct: false,
            log_level: "info".to_string(),
            json_logs: false,
        }
    }

    /// Names of required environment variables that are unset or blank.
    ///
    /// The database credentials are only required when no `DATABASE_URL`
    /// override is given.
    pub fn missing_required(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if is_blank(&self.openai_api_key) {
            missing.push("OPENAI_API_KEY");
        }
        if is_blank(&self.database_url) {
            let parts = [
                ("user", &self.db_user),
                ("pass", &self.db_pass),
                ("host", &self.db_host),
                ("dbase", &self.db_name),
            ];
            missing.extend(
                parts
                    .into_iter()
                    .filter(|(_, value)| is_blank(value))
                    .map(|(name, _)| name),
            );
        }
        missing
    }

    /// Check that everything needed to start is present and sane.
    pub fn validate(&self) -> AppResult<()> {
        let missing = self.missing_required();
        if !missing.is_empty() {
            return Err(AppError::config(format!(
                "missing required environment variables: {}",
                missing.join(", ")
            )));
        }
        if self.top_k == 0 {
            return Err(AppError::config("top_k must be greater than 0"));
        }
        if self.query_timeout == 0 || self.llm_timeout == 0 {
            return Err(AppError::config("timeouts must be greater than 0"));
        }
        Ok(())
    }

    /// Get the HTTP bind address.
    pub fn http_bind_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }

    /// Get the query timeout as a Duration.
    pub fn query_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.query_timeout)
    }

    /// Get the completion request timeout as a Duration.
    pub fn llm_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.llm_timeout)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

/// Load `.env` from the current directory or its parents.
///
/// A missing file is fine; a file that cannot be read or parsed is an error.
pub fn load_dotenv() -> AppResult<()> {
    ignore_missing(dotenvy::dotenv().map(|_| ()))
}

/// Load variables from a specific env file, with the same rules as [`load_dotenv`].
pub fn load_env_file(path: &Path) -> AppResult<()> {
    ignore_missing(dotenvy::from_path(path))
}

fn ignore_missing(result: Result<(), dotenvy::Error>) -> AppResult<()> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.not_found() => Ok(()),
        Err(e) => Err(AppError::config(format!("failed to load .env file: {}", e))),
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|v| v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn complete_config() -> Config {
        Config {
            openai_api_key: Some("sk-test".to_string()),
            db_user: Some("analyst".to_string()),
            db_pass: Some("secret".to_string()),
            db_host: Some("db.internal".to_string()),
            db_name: Some("sales".to_string()),
            ..Config::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.http_host, DEFAULT_HTTP_HOST);
        assert_eq!(config.http_port, DEFAULT_HTTP_PORT);
        assert_eq!(config.model, DEFAULT_MODEL);
        assert!(!config.allow_writes);
    }

    #[test]
    fn test_http_bind_addr() {
        let config = Config {
            http_host: "0.0.0.0".to_string(),
            http_port: 3000,
            ..Config::default()
        };
        assert_eq!(config.http_bind_addr(), "0.0.0.0:3000");
    }

    #[test]
    fn test_complete_config_validates() {
        assert!(complete_config().validate().is_ok());
    }

    #[test]
    fn test_missing_variables_are_all_reported() {
        let config = Config {
            db_pass: None,
            db_name: Some("   ".to_string()),
            openai_api_key: None,
            ..complete_config()
        };
        assert_eq!(config.missing_required(), vec!["OPENAI_API_KEY", "pass", "dbase"]);

        let err = config.validate().unwrap_err();
        assert!(matches!(err, AppError::Config { .. }));
        let msg = err.to_string();
        assert!(msg.contains("OPENAI_API_KEY"));
        assert!(msg.contains("pass"));
        assert!(msg.contains("dbase"));
        assert!(!msg.contains("user"));
    }

    #[test]
    fn test_database_url_replaces_credentials() {
        let config = Config {
            openai_api_key: Some("sk-test".to_string()),
            database_url: Some("sqlite:local.db".to_string()),
            ..Config::default()
        };
        assert!(config.missing_required().is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_top_k_rejected() {
        let config = Config {
            top_k: 0,
            ..complete_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_timeout_durations() {
        let config = Config {
            query_timeout: 12,
            llm_timeout: 90,
            ..Config::default()
        };
        assert_eq!(config.query_timeout_duration(), Duration::from_secs(12));
        assert_eq!(config.llm_timeout_duration(), Duration::from_secs(90));
    }

    #[test]
    fn test_missing_env_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_env_file(&dir.path().join(".env")).is_ok());
    }

    #[test]
    fn test_malformed_env_file_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not a valid line").unwrap();

        let err = load_env_file(file.path()).unwrap_err();
        assert!(matches!(err, AppError::Config { .. }));
        assert!(err.to_string().contains("failed to load .env file"));
    }
}
