//! Connection descriptor assembly.
//!
//! The descriptor is the URI handed to the pool. It is normally built from
//! the `user`/`pass`/`host`/`dbase` variables against the fixed PostgreSQL
//! port, or taken verbatim from `DATABASE_URL`.

use crate::config::Config;
use crate::error::{AppError, AppResult};
use url::Url;

/// PostgreSQL port used for assembled descriptors.
pub const POSTGRES_PORT: u16 = 5432;

/// Supported database types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseType {
    PostgreSQL,
    SQLite,
}

impl DatabaseType {
    /// Parse database type from a connection string.
    pub fn from_connection_string(connection_string: &str) -> Option<Self> {
        let lower = connection_string.to_lowercase();
        if lower.starts_with("postgres://") || lower.starts_with("postgresql://") {
            Some(Self::PostgreSQL)
        } else if lower.starts_with("sqlite:") {
            Some(Self::SQLite)
        } else {
            None
        }
    }

    /// Get the display name for this database type.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::PostgreSQL => "PostgreSQL",
            Self::SQLite => "SQLite",
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// How to reach the target database.
#[derive(Clone)]
pub struct ConnectionDescriptor {
    db_type: DatabaseType,
    /// Contains the password - never log
    connection_string: String,
}

impl ConnectionDescriptor {
    /// Build the descriptor from configuration.
    ///
    /// `DATABASE_URL` wins when set; otherwise the PostgreSQL URI is assembled
    /// from the individual credential variables.
    pub fn from_config(config: &Config) -> AppResult<Self> {
        if let Some(url) = config.database_url.as_deref().filter(|u| !u.trim().is_empty()) {
            return Self::from_url(url.trim());
        }

        let required = |value: &Option<String>, name: &str| {
            value
                .as_deref()
                .filter(|v| !v.trim().is_empty())
                .map(str::to_string)
                .ok_or_else(|| {
                    AppError::config(format!("missing required environment variable: {}", name))
                })
        };

        let user = required(&config.db_user, "user")?;
        let pass = required(&config.db_pass, "pass")?;
        let host = required(&config.db_host, "host")?;
        let dbase = required(&config.db_name, "dbase")?;

        Self::postgres(&user, &pass, &host, &dbase)
    }

    /// Assemble `postgresql://<user>:<pass>@<host>:5432/<dbase>`.
    ///
    /// Characters that are not valid in the userinfo or path are
    /// percent-encoded; ordinary values appear verbatim.
    pub fn postgres(user: &str, pass: &str, host: &str, dbase: &str) -> AppResult<Self> {
        let invalid = |part: &str| AppError::config(format!("invalid database {} value", part));

        let mut url = Url::parse(&format!("postgresql://{}", host.trim()))
            .map_err(|e| AppError::config(format!("invalid database host: {}", e)))?;
        url.set_username(user).map_err(|_| invalid("user"))?;
        url.set_password(Some(pass)).map_err(|_| invalid("pass"))?;
        url.set_port(Some(POSTGRES_PORT))
            .map_err(|_| invalid("host"))?;
        url.set_path(&format!("/{}", dbase));

        Ok(Self {
            db_type: DatabaseType::PostgreSQL,
            connection_string: url.to_string(),
        })
    }

    /// Use a complete connection URL as-is.
    pub fn from_url(url: &str) -> AppResult<Self> {
        let db_type = DatabaseType::from_connection_string(url).ok_or_else(|| {
            AppError::config("DATABASE_URL must start with postgres://, postgresql:// or sqlite:")
        })?;
        Ok(Self {
            db_type,
            connection_string: url.to_string(),
        })
    }

    pub fn db_type(&self) -> DatabaseType {
        self.db_type
    }

    /// Full connection string including the password.
    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    /// Display-safe version of the connection string (password masked).
    pub fn masked(&self) -> String {
        match Url::parse(&self.connection_string) {
            Ok(mut url) if url.password().is_some() => {
                if url.set_password(Some("****")).is_err() {
                    return "<unprintable connection string>".to_string();
                }
                url.to_string()
            }
            _ => self.connection_string.clone(),
        }
    }
}

impl std::fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionDescriptor")
            .field("db_type", &self.db_type)
            .field("connection_string", &self.masked())
            .finish()
    }
}
