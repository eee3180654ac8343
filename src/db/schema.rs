//! Schema introspection.
//!
//! Builds the "table info" text the model sees: one `CREATE TABLE` rendering
//! per user table followed by a few example rows.

use crate::db::executor::QueryExecutor;
use crate::db::pool::DbPool;
use crate::db::types::SqlValue;
use crate::error::AppResult;
use tracing::debug;

/// Sample values longer than this are cut off in the table info.
const MAX_SAMPLE_VALUE_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub primary_key: bool,
}

/// One table's definition plus a handful of example rows.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDescription {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    pub sample_columns: Vec<String>,
    pub sample_rows: Vec<Vec<SqlValue>>,
}

impl TableDescription {
    /// Render as DDL followed by a comment block of sample rows.
    pub fn render(&self) -> String {
        let mut lines: Vec<String> = self
            .columns
            .iter()
            .map(|c| {
                let not_null = if c.nullable { "" } else { " NOT NULL" };
                format!("\t{} {}{}", quote_ident(&c.name), c.data_type, not_null)
            })
            .collect();

        let pk: Vec<String> = self
            .columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| quote_ident(&c.name))
            .collect();
        if !pk.is_empty() {
            lines.push(format!("\tPRIMARY KEY ({})", pk.join(", ")));
        }

        let mut out = format!(
            "CREATE TABLE {} (\n{}\n)",
            quote_ident(&self.name),
            lines.join(", \n")
        );

        if !self.sample_columns.is_empty() {
            out.push_str(&format!(
                "\n\n/*\n{} rows from {} table:\n{}",
                self.sample_rows.len(),
                self.name,
                self.sample_columns.join("\t")
            ));
            for row in &self.sample_rows {
                let cells: Vec<String> = row.iter().map(sample_cell).collect();
                out.push('\n');
                out.push_str(&cells.join("\t"));
            }
            out.push_str("\n*/");
        }
        out
    }
}

fn sample_cell(value: &SqlValue) -> String {
    let text = value.to_plain_string();
    if text.chars().count() > MAX_SAMPLE_VALUE_CHARS {
        text.chars().take(MAX_SAMPLE_VALUE_CHARS).collect()
    } else {
        text
    }
}

/// Quote an identifier with double quotes (valid in PostgreSQL and SQLite).
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Schema inspector for the connected database.
pub struct SchemaInspector;

impl SchemaInspector {
    /// Names of all user tables, sorted.
    pub async fn table_names(pool: &DbPool) -> AppResult<Vec<String>> {
        let names = match pool {
            DbPool::Postgres(p) => postgres::table_names(p).await?,
            DbPool::SQLite(p) => sqlite::table_names(p).await?,
        };
        debug!(count = names.len(), "Listed tables");
        Ok(names)
    }

    /// Describe one table, including up to `sample_rows` example rows
    /// fetched through `executor`.
    pub async fn describe(
        pool: &DbPool,
        executor: &QueryExecutor,
        table: &str,
        sample_rows: usize,
    ) -> AppResult<TableDescription> {
        let columns = match pool {
            DbPool::Postgres(p) => postgres::columns(p, table).await?,
            DbPool::SQLite(p) => sqlite::columns(p, table).await?,
        };

        let (sample_columns, sample_rows) = if sample_rows > 0 {
            let sql = format!("SELECT * FROM {} LIMIT {}", quote_ident(table), sample_rows);
            let output = executor.execute(pool, &sql).await?;
            let names = if output.columns.is_empty() {
                columns.iter().map(|c| c.name.clone()).collect()
            } else {
                output.columns
            };
            (names, output.rows)
        } else {
            (Vec::new(), Vec::new())
        };

        Ok(TableDescription {
            name: table.to_string(),
            columns,
            sample_columns,
            sample_rows,
        })
    }

    /// Table info for every user table, separated by blank lines.
    pub async fn table_info(
        pool: &DbPool,
        executor: &QueryExecutor,
        sample_rows: usize,
    ) -> AppResult<String> {
        let mut sections = Vec::new();
        for table in Self::table_names(pool).await? {
            sections.push(
                Self::describe(pool, executor, &table, sample_rows)
                    .await?
                    .render(),
            );
        }
        Ok(sections.join("\n\n"))
    }
}

// =============================================================================
// Database-Specific Implementations
// =============================================================================

mod queries {
    pub mod postgres {
        pub const LIST_TABLES: &str = r#"
            SELECT table_name::text AS table_name
            FROM information_schema.tables
            WHERE table_schema = current_schema()
            AND table_type = 'BASE TABLE'
            ORDER BY table_name
            "#;

        pub const DESCRIBE_COLUMNS: &str = r#"
        SELECT
            c.column_name::text AS column_name,
            format_type(a.atttypid, a.atttypmod) AS column_type,
            c.is_nullable::text AS is_nullable,
            CASE WHEN pk.column_name IS NOT NULL THEN true ELSE false END AS is_primary_key
        FROM information_schema.columns c
        JOIN pg_class t ON t.relname = c.table_name
        JOIN pg_namespace n ON n.oid = t.relnamespace AND n.nspname = c.table_schema
        JOIN pg_attribute a ON a.attrelid = t.oid AND a.attname = c.column_name
        LEFT JOIN (
            SELECT kcu.column_name
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
                ON tc.constraint_name = kcu.constraint_name
                AND tc.table_schema = kcu.table_schema
            WHERE tc.table_name = $1
            AND tc.table_schema = current_schema()
            AND tc.constraint_type = 'PRIMARY KEY'
        ) pk ON c.column_name = pk.column_name
        WHERE c.table_name = $1 AND c.table_schema = current_schema()
        ORDER BY c.ordinal_position
        "#;
    }

    pub mod sqlite {
        pub const LIST_TABLES: &str = r#"
            SELECT name FROM sqlite_master
            WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
            ORDER BY name
            "#;

        pub const DESCRIBE_COLUMNS: &str =
            r#"SELECT name, type, "notnull", pk FROM pragma_table_info(?1) ORDER BY cid"#;
    }
}

mod postgres {
    use super::*;
    use sqlx::{PgPool, Row};

    pub async fn table_names(pool: &PgPool) -> AppResult<Vec<String>> {
        Ok(sqlx::query_scalar::<_, String>(queries::postgres::LIST_TABLES)
            .fetch_all(pool)
            .await?)
    }

    pub async fn columns(pool: &PgPool, table: &str) -> AppResult<Vec<ColumnInfo>> {
        let rows = sqlx::query(queries::postgres::DESCRIBE_COLUMNS)
            .bind(table)
            .fetch_all(pool)
            .await?;

        rows.iter()
            .map(|row| -> AppResult<ColumnInfo> {
                let nullable: String = row.try_get("is_nullable")?;
                Ok(ColumnInfo {
                    name: row.try_get("column_name")?,
                    data_type: row.try_get("column_type")?,
                    nullable: nullable == "YES",
                    primary_key: row.try_get("is_primary_key")?,
                })
            })
            .collect()
    }
}

mod sqlite {
    use super::*;
    use sqlx::{Row, SqlitePool};

    pub async fn table_names(pool: &SqlitePool) -> AppResult<Vec<String>> {
        Ok(sqlx::query_scalar::<_, String>(queries::sqlite::LIST_TABLES)
            .fetch_all(pool)
            .await?)
    }

    pub async fn columns(pool: &SqlitePool, table: &str) -> AppResult<Vec<ColumnInfo>> {
        let rows = sqlx::query(queries::sqlite::DESCRIBE_COLUMNS)
            .bind(table)
            .fetch_all(pool)
            .await?;

        rows.iter()
            .map(|row| -> AppResult<ColumnInfo> {
                let notnull: i64 = row.try_get("notnull")?;
                let pk: i64 = row.try_get("pk")?;
                let data_type: String = row.try_get("type")?;
                Ok(ColumnInfo {
                    name: row.try_get("name")?,
                    data_type: if data_type.is_empty() {
                        "TEXT".to_string()
                    } else {
                        data_type
                    },
                    nullable: notnull == 0,
                    primary_key: pk > 0,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ConnectionDescriptor;
    use crate::error::AppError;
    use std::time::Duration;

    async fn notes_pool() -> DbPool {
        let descriptor = ConnectionDescriptor::from_url("sqlite::memory:").unwrap();
        let pool = DbPool::connect(&descriptor, false).await.unwrap();
        if let DbPool::SQLite(p) = &pool {
            sqlx::query("CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT)")
                .execute(p)
                .await
                .unwrap();
            sqlx::query("INSERT INTO notes (body) VALUES ('first'), ('second')")
                .execute(p)
                .await
                .unwrap();
        }
        pool
    }

    #[tokio::test]
    async fn test_table_info_samples_through_executor() {
        let pool = notes_pool().await;
        let executor = QueryExecutor::with_timeout(Duration::from_secs(5));

        let info = SchemaInspector::table_info(&pool, &executor, 1).await.unwrap();
        assert!(info.contains("1 rows from notes table:\nid\tbody\n1\tfirst\n*/"));
    }

    #[tokio::test]
    async fn test_table_info_honours_executor_timeout() {
        let pool = notes_pool().await;
        let executor = QueryExecutor::with_timeout(Duration::ZERO);

        let err = SchemaInspector::table_info(&pool, &executor, 3)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_table_info_without_samples_skips_executor() {
        let pool = notes_pool().await;
        let executor = QueryExecutor::with_timeout(Duration::ZERO);

        let info = SchemaInspector::table_info(&pool, &executor, 0).await.unwrap();
        assert!(info.starts_with("CREATE TABLE \"notes\""));
        assert!(!info.contains("/*"));
    }

    fn orders() -> TableDescription {
        TableDescription {
            name: "orders".to_string(),
            columns: vec![
                ColumnInfo {
                    name: "id".to_string(),
                    data_type: "integer".to_string(),
                    nullable: false,
                    primary_key: true,
                },
                ColumnInfo {
                    name: "customer".to_string(),
                    data_type: "text".to_string(),
                    nullable: true,
                    primary_key: false,
                },
            ],
            sample_columns: vec!["id".to_string(), "customer".to_string()],
            sample_rows: vec![
                vec![SqlValue::Int(1), SqlValue::Text("Alice".to_string())],
                vec![SqlValue::Int(2), SqlValue::Null],
            ],
        }
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("users"), "\"users\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_render_table_description() {
        let rendered = orders().render();
        assert!(rendered.starts_with("CREATE TABLE \"orders\" (\n"));
        assert!(rendered.contains("\t\"id\" integer NOT NULL"));
        assert!(rendered.contains("\t\"customer\" text"));
        assert!(rendered.contains("PRIMARY KEY (\"id\")"));
        assert!(rendered.contains("2 rows from orders table:\nid\tcustomer\n1\tAlice\n2\tNULL\n*/"));
    }

    #[test]
    fn test_render_without_samples() {
        let table = TableDescription {
            sample_columns: Vec::new(),
            sample_rows: Vec::new(),
            ..orders()
        };
        assert!(!table.render().contains("/*"));
    }

    #[test]
    fn test_long_sample_value_truncated() {
        let long = "x".repeat(250);
        let cell = sample_cell(&SqlValue::Text(long));
        assert_eq!(cell.len(), MAX_SAMPLE_VALUE_CHARS);
    }
}
