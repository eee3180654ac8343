//! Read-only enforcement for generated SQL.
//!
//! The model writes the SQL, so nothing guarantees it only reads. Unless the
//! application is started with writes allowed, every generated statement is
//! parsed with [sqlparser](https://docs.rs/sqlparser/) and anything other
//! than a query is refused before it reaches the database. Queries are also
//! walked for writing CTEs and `SELECT ... INTO`, which PostgreSQL accepts
//! inside an otherwise ordinary query.

use crate::db::DatabaseType;
use crate::error::{AppError, AppResult};
use sqlparser::ast::{Query, SetExpr, Statement};
use sqlparser::dialect::{Dialect, PostgreSqlDialect, SQLiteDialect};
use sqlparser::parser::Parser;

/// Type of SQL statement detected by the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SqlStatementType {
    /// SELECT and other read-only queries (SELECT, SHOW, EXPLAIN of a query)
    Select,
    /// INSERT, UPDATE, DELETE, MERGE, COPY
    DmlWrite,
    /// CREATE, DROP, ALTER, TRUNCATE
    Ddl,
    /// BEGIN, COMMIT, ROLLBACK, SAVEPOINT
    Transaction,
    /// CALL, EXECUTE, PREPARE
    ProcedureCall,
    /// GRANT, REVOKE, SET, PRAGMA
    Administrative,
    /// Unknown or unparseable statement
    Unknown,
}

mod error_messages {
    pub const DML_WRITE: &str = "The generated SQL would modify data.";
    pub const DDL: &str = "The generated SQL would modify the schema.";
    pub const TRANSACTION: &str = "The generated SQL contains transaction control.";
    pub const PROCEDURE: &str = "The generated SQL calls a procedure whose effects cannot be checked.";
    pub const ADMINISTRATIVE: &str = "The generated SQL is an administrative command.";
    pub const UNKNOWN: &str = "The generated SQL is not a recognised read-only statement.";
    pub const PARSE_ERROR: &str = "Failed to parse the generated SQL.";
}

fn get_dialect(db_type: DatabaseType) -> Box<dyn Dialect> {
    match db_type {
        DatabaseType::PostgreSQL => Box::new(PostgreSqlDialect {}),
        DatabaseType::SQLite => Box::new(SQLiteDialect {}),
    }
}

/// Validate that `sql` only reads.
///
/// Returns `Err(AppError::Permission)` for write, DDL, transaction,
/// procedure and administrative statements, and `Err(AppError::InvalidInput)`
/// when the SQL cannot be parsed.
///
/// # Examples
///
/// ```
/// use askdb::chain::sql_validator::validate_readonly;
/// use askdb::db::DatabaseType;
///
/// assert!(validate_readonly("SELECT * FROM users", DatabaseType::PostgreSQL).is_ok());
/// assert!(validate_readonly("DELETE FROM users", DatabaseType::PostgreSQL).is_err());
/// ```
pub fn validate_readonly(sql: &str, db_type: DatabaseType) -> AppResult<()> {
    let dialect = get_dialect(db_type);

    let statements = Parser::parse_sql(dialect.as_ref(), sql).map_err(|e| {
        AppError::invalid_input(format!("{} Error: {}", error_messages::PARSE_ERROR, e))
    })?;

    if statements.is_empty() {
        return Err(AppError::invalid_input("Empty SQL statement"));
    }

    for stmt in &statements {
        validate_statement(stmt)?;
    }

    Ok(())
}

fn validate_statement(stmt: &Statement) -> AppResult<()> {
    let (stmt_type, operation_name) = classify_statement(stmt);

    let reason = match stmt_type {
        SqlStatementType::Select => return Ok(()),
        SqlStatementType::DmlWrite => error_messages::DML_WRITE,
        SqlStatementType::Ddl => error_messages::DDL,
        SqlStatementType::Transaction => error_messages::TRANSACTION,
        SqlStatementType::ProcedureCall => error_messages::PROCEDURE,
        SqlStatementType::Administrative => error_messages::ADMINISTRATIVE,
        SqlStatementType::Unknown => error_messages::UNKNOWN,
    };
    Err(AppError::permission(operation_name, reason))
}

fn classify_statement(stmt: &Statement) -> (SqlStatementType, &'static str) {
    match stmt {
        // Read-only
        Statement::Query(query) => match query_write(query) {
            Some(operation) => (SqlStatementType::DmlWrite, operation),
            None => (SqlStatementType::Select, "SELECT"),
        },
        Statement::ShowTables { .. } => (SqlStatementType::Select, "SHOW TABLES"),
        Statement::ShowColumns { .. } => (SqlStatementType::Select, "SHOW COLUMNS"),
        Statement::ShowVariable { .. } => (SqlStatementType::Select, "SHOW"),

        // EXPLAIN inherits the classification of what it explains
        Statement::Explain { statement, .. } => {
            let (inner_type, inner_name) = classify_statement(statement);
            if inner_type == SqlStatementType::Select {
                (SqlStatementType::Select, "EXPLAIN")
            } else {
                (inner_type, inner_name)
            }
        }

        // DML writes
        Statement::Insert { .. } => (SqlStatementType::DmlWrite, "INSERT"),
        Statement::Update { .. } => (SqlStatementType::DmlWrite, "UPDATE"),
        Statement::Delete { .. } => (SqlStatementType::DmlWrite, "DELETE"),
        Statement::Merge { .. } => (SqlStatementType::DmlWrite, "MERGE"),
        Statement::Copy { .. } => (SqlStatementType::DmlWrite, "COPY"),

        // DDL
        Statement::CreateTable { .. } => (SqlStatementType::Ddl, "CREATE TABLE"),
        Statement::CreateView { .. } => (SqlStatementType::Ddl, "CREATE VIEW"),
        Statement::CreateIndex { .. } => (SqlStatementType::Ddl, "CREATE INDEX"),
        Statement::CreateSchema { .. } => (SqlStatementType::Ddl, "CREATE SCHEMA"),
        Statement::CreateDatabase { .. } => (SqlStatementType::Ddl, "CREATE DATABASE"),
        Statement::CreateFunction { .. } => (SqlStatementType::Ddl, "CREATE FUNCTION"),
        Statement::AlterTable { .. } => (SqlStatementType::Ddl, "ALTER TABLE"),
        Statement::AlterView { .. } => (SqlStatementType::Ddl, "ALTER VIEW"),
        Statement::AlterIndex { .. } => (SqlStatementType::Ddl, "ALTER INDEX"),
        Statement::Drop { .. } => (SqlStatementType::Ddl, "DROP"),
        Statement::Truncate { .. } => (SqlStatementType::Ddl, "TRUNCATE"),

        // Transaction control
        Statement::StartTransaction { .. } => (SqlStatementType::Transaction, "BEGIN"),
        Statement::Commit { .. } => (SqlStatementType::Transaction, "COMMIT"),
        Statement::Rollback { .. } => (SqlStatementType::Transaction, "ROLLBACK"),
        Statement::Savepoint { .. } => (SqlStatementType::Transaction, "SAVEPOINT"),

        // Procedure calls
        Statement::Call { .. } => (SqlStatementType::ProcedureCall, "CALL"),
        Statement::Execute { .. } => (SqlStatementType::ProcedureCall, "EXECUTE"),
        Statement::Prepare { .. } => (SqlStatementType::ProcedureCall, "PREPARE"),

        // Administrative
        Statement::Grant { .. } => (SqlStatementType::Administrative, "GRANT"),
        Statement::Revoke { .. } => (SqlStatementType::Administrative, "REVOKE"),
        Statement::Set { .. } => (SqlStatementType::Administrative, "SET"),
        Statement::Pragma { .. } => (SqlStatementType::Administrative, "PRAGMA"),

        _ => (SqlStatementType::Unknown, "Unknown"),
    }
}

/// Find a data-modifying part of a query: a writing CTE
/// (`WITH d AS (DELETE ... RETURNING *) SELECT ...`) or `SELECT ... INTO`.
fn query_write(query: &Query) -> Option<&'static str> {
    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            if let Some(operation) = query_write(&cte.query) {
                return Some(operation);
            }
        }
    }
    set_expr_write(&query.body)
}

fn set_expr_write(expr: &SetExpr) -> Option<&'static str> {
    match expr {
        SetExpr::Select(select) if select.into.is_some() => Some("SELECT INTO"),
        SetExpr::Query(query) => query_write(query),
        SetExpr::SetOperation { left, right, .. } => {
            set_expr_write(left).or_else(|| set_expr_write(right))
        }
        SetExpr::Insert(_) => Some("INSERT"),
        SetExpr::Update(_) => Some("UPDATE"),
        SetExpr::Delete(_) => Some("DELETE"),
        SetExpr::Merge(_) => Some("MERGE"),
        _ => None,
    }
}
