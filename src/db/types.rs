//! Column value decoding and rendering.
//!
//! # Architecture
//!
//! Decoding uses a two-phase approach:
//! 1. `TypeCategory` classifies the column's type name into a logical category
//! 2. Database-specific decoders turn the raw value into a [`SqlValue`]
//!
//! PostgreSQL results fetched without bind parameters arrive in text format,
//! so the PostgreSQL decoder reads the raw text and parses it according to
//! the category. SQLite is dynamically typed; its decoder follows the storage
//! class of each value rather than the declared column type.

use crate::db::connection::DatabaseType;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueFormat, PgValueRef};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Decode, Row, Type, TypeInfo, ValueRef};
use std::fmt;

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Text,
    Binary,
    Json,
    Uuid,
    Temporal,
    Unknown,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str, db: DatabaseType) -> TypeCategory {
    let lower = type_name.to_lowercase();

    // Decimal/Numeric - check first as it overlaps with "numeric" in float checks
    if lower.contains("decimal") || lower.contains("numeric") {
        // SQLite's NUMERIC is actually a float
        if db == DatabaseType::SQLite && lower == "numeric" {
            return TypeCategory::Float;
        }
        return TypeCategory::Decimal;
    }

    if lower.contains("int") || lower.contains("serial") {
        return TypeCategory::Integer;
    }

    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }

    if lower.contains("float") || lower.contains("double") || lower == "real" {
        return TypeCategory::Float;
    }

    if lower == "json" || lower == "jsonb" {
        return TypeCategory::Json;
    }

    if lower == "uuid" {
        return TypeCategory::Uuid;
    }

    if lower.contains("blob") || lower.contains("binary") || lower == "bytea" {
        return TypeCategory::Binary;
    }

    if lower.contains("timestamp")
        || lower.contains("date")
        || lower == "time"
        || lower == "timetz"
        || lower == "interval"
    {
        return TypeCategory::Temporal;
    }

    if lower.contains("char") || lower.contains("text") || lower == "name" {
        return TypeCategory::Text;
    }

    TypeCategory::Unknown
}

// =============================================================================
// Values
// =============================================================================

/// A single decoded column value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Exact numeric kept in its database representation.
    Decimal(String),
    Text(String),
    Json(JsonValue),
    Bytes(Vec<u8>),
}

impl SqlValue {
    /// Unquoted rendering, used for the tab-separated sample rows.
    pub fn to_plain_string(&self) -> String {
        match self {
            SqlValue::Text(s) | SqlValue::Decimal(s) => s.clone(),
            SqlValue::Bytes(b) => STANDARD.encode(b),
            other => other.to_string(),
        }
    }
}

/// Literal-style rendering: strings quoted, NULL spelled out.
impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Bool(v) => write!(f, "{}", v),
            SqlValue::Int(v) => write!(f, "{}", v),
            SqlValue::Float(v) => write!(f, "{}", v),
            SqlValue::Decimal(v) => write!(f, "{}", v),
            SqlValue::Text(v) => write!(f, "'{}'", v.replace('\\', "\\\\").replace('\'', "\\'")),
            SqlValue::Json(v) => write!(f, "{}", v),
            SqlValue::Bytes(v) => write!(f, "b'{}'", STANDARD.encode(v)),
        }
    }
}

/// Render rows as a list of tuples, e.g. `[(1, 'Alice'), (2, NULL)]`.
///
/// Single-column rows keep the trailing comma (`[(3,)]`) so a one-value
/// result is still recognisable as a row.
pub fn render_rows(rows: &[Vec<SqlValue>]) -> String {
    let rendered: Vec<String> = rows
        .iter()
        .map(|row| {
            let values: Vec<String> = row.iter().map(SqlValue::to_string).collect();
            if values.len() == 1 {
                format!("({},)", values[0])
            } else {
                format!("({})", values.join(", "))
            }
        })
        .collect();
    format!("[{}]", rendered.join(", "))
}

// =============================================================================
// Raw text support
// =============================================================================

/// Raw textual representation of any PostgreSQL value.
#[derive(Debug)]
pub struct RawText(pub String);

impl Type<sqlx::Postgres> for RawText {
    fn type_info() -> PgTypeInfo {
        <String as Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(_ty: &PgTypeInfo) -> bool {
        true
    }
}

impl<'r> Decode<'r, sqlx::Postgres> for RawText {
    fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::Postgres>>::decode(value)?;
        Ok(RawText(s.to_string()))
    }
}

// =============================================================================
// Row decoding
// =============================================================================

/// Trait for converting database rows to decoded values.
pub trait RowValues {
    fn column_names(&self) -> Vec<String>;
    fn values(&self) -> Vec<SqlValue>;
}

impl RowValues for PgRow {
    fn column_names(&self) -> Vec<String> {
        self.columns().iter().map(|c| c.name().to_string()).collect()
    }

    fn values(&self) -> Vec<SqlValue> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let category = categorize_type(col.type_info().name(), DatabaseType::PostgreSQL);
                postgres::decode_column(self, idx, category)
            })
            .collect()
    }
}

impl RowValues for SqliteRow {
    fn column_names(&self) -> Vec<String> {
        self.columns().iter().map(|c| c.name().to_string()).collect()
    }

    fn values(&self) -> Vec<SqlValue> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let category = categorize_type(col.type_info().name(), DatabaseType::SQLite);
                sqlite::decode_column(self, idx, category)
            })
            .collect()
    }
}

// =============================================================================
// Database-Specific Decoders
// =============================================================================

mod postgres {
    use super::*;

    pub fn decode_column(row: &PgRow, idx: usize, category: TypeCategory) -> SqlValue {
        let raw = match row.try_get_raw(idx) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!(column = idx, error = %e, "Failed to read column");
                return SqlValue::Null;
            }
        };
        if raw.is_null() {
            return SqlValue::Null;
        }

        if raw.format() == PgValueFormat::Binary {
            return decode_binary_format(row, idx, category);
        }

        match row.try_get::<RawText, _>(idx) {
            Ok(RawText(text)) => from_text(text, category),
            Err(e) => {
                tracing::error!(column = idx, error = %e, "Failed to decode column text");
                SqlValue::Null
            }
        }
    }

    /// Interpret a text-format value according to its category.
    pub(super) fn from_text(text: String, category: TypeCategory) -> SqlValue {
        match category {
            TypeCategory::Integer => text
                .parse()
                .map(SqlValue::Int)
                .unwrap_or(SqlValue::Text(text)),
            TypeCategory::Float => text
                .parse()
                .map(SqlValue::Float)
                .unwrap_or(SqlValue::Text(text)),
            TypeCategory::Decimal => SqlValue::Decimal(text),
            TypeCategory::Boolean => match text.as_str() {
                "t" | "true" => SqlValue::Bool(true),
                "f" | "false" => SqlValue::Bool(false),
                _ => SqlValue::Text(text),
            },
            TypeCategory::Json => serde_json::from_str(&text)
                .map(SqlValue::Json)
                .unwrap_or(SqlValue::Text(text)),
            _ => SqlValue::Text(text),
        }
    }

    fn decode_binary_format(row: &PgRow, idx: usize, category: TypeCategory) -> SqlValue {
        match category {
            TypeCategory::Integer => {
                if let Ok(v) = row.try_get::<i64, _>(idx) {
                    return SqlValue::Int(v);
                }
                if let Ok(v) = row.try_get::<i32, _>(idx) {
                    return SqlValue::Int(v.into());
                }
                if let Ok(v) = row.try_get::<i16, _>(idx) {
                    return SqlValue::Int(v.into());
                }
            }
            TypeCategory::Float => {
                if let Ok(v) = row.try_get::<f64, _>(idx) {
                    return SqlValue::Float(v);
                }
                if let Ok(v) = row.try_get::<f32, _>(idx) {
                    return SqlValue::Float(v.into());
                }
            }
            TypeCategory::Boolean => {
                if let Ok(v) = row.try_get::<bool, _>(idx) {
                    return SqlValue::Bool(v);
                }
            }
            TypeCategory::Json => {
                if let Ok(v) = row.try_get::<JsonValue, _>(idx) {
                    return SqlValue::Json(v);
                }
            }
            TypeCategory::Uuid => {
                if let Ok(v) = row.try_get::<uuid::Uuid, _>(idx) {
                    return SqlValue::Text(v.to_string());
                }
            }
            TypeCategory::Binary => {
                if let Ok(v) = row.try_get::<Vec<u8>, _>(idx) {
                    return SqlValue::Bytes(v);
                }
            }
            TypeCategory::Temporal => {
                if let Ok(v) = row.try_get::<chrono::DateTime<chrono::Utc>, _>(idx) {
                    return SqlValue::Text(v.to_rfc3339());
                }
                if let Ok(v) = row.try_get::<chrono::NaiveDateTime, _>(idx) {
                    return SqlValue::Text(v.to_string());
                }
                if let Ok(v) = row.try_get::<chrono::NaiveDate, _>(idx) {
                    return SqlValue::Text(v.to_string());
                }
                if let Ok(v) = row.try_get::<chrono::NaiveTime, _>(idx) {
                    return SqlValue::Text(v.to_string());
                }
            }
            _ => {}
        }
        row.try_get::<String, _>(idx)
            .map(SqlValue::Text)
            .unwrap_or(SqlValue::Null)
    }
}

mod sqlite {
    use super::*;

    pub fn decode_column(row: &SqliteRow, idx: usize, category: TypeCategory) -> SqlValue {
        match row.try_get_raw(idx) {
            Ok(raw) if raw.is_null() => return SqlValue::Null,
            Ok(_) => {}
            Err(e) => {
                tracing::error!(column = idx, error = %e, "Failed to read column");
                return SqlValue::Null;
            }
        }

        if category == TypeCategory::Boolean {
            if let Ok(v) = row.try_get::<bool, _>(idx) {
                return SqlValue::Bool(v);
            }
        }
        if let Ok(v) = row.try_get::<i64, _>(idx) {
            return SqlValue::Int(v);
        }
        if let Ok(v) = row.try_get::<f64, _>(idx) {
            return SqlValue::Float(v);
        }
        if let Ok(v) = row.try_get::<String, _>(idx) {
            if category == TypeCategory::Json {
                if let Ok(json) = serde_json::from_str::<JsonValue>(&v) {
                    return SqlValue::Json(json);
                }
            }
            return SqlValue::Text(v);
        }
        row.try_get::<Vec<u8>, _>(idx)
            .map(SqlValue::Bytes)
            .unwrap_or(SqlValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorize_type_integer() {
        assert_eq!(
            categorize_type("INT4", DatabaseType::PostgreSQL),
            TypeCategory::Integer
        );
        assert_eq!(
            categorize_type("BIGINT", DatabaseType::SQLite),
            TypeCategory::Integer
        );
        assert_eq!(
            categorize_type("SERIAL", DatabaseType::PostgreSQL),
            TypeCategory::Integer
        );
    }

    #[test]
    fn test_categorize_type_decimal() {
        assert_eq!(
            categorize_type("NUMERIC", DatabaseType::PostgreSQL),
            TypeCategory::Decimal
        );
        // SQLite NUMERIC is a float
        assert_eq!(
            categorize_type("numeric", DatabaseType::SQLite),
            TypeCategory::Float
        );
    }

    #[test]
    fn test_categorize_type_other() {
        assert_eq!(
            categorize_type("jsonb", DatabaseType::PostgreSQL),
            TypeCategory::Json
        );
        assert_eq!(
            categorize_type("TIMESTAMPTZ", DatabaseType::PostgreSQL),
            TypeCategory::Temporal
        );
        assert_eq!(
            categorize_type("VARCHAR", DatabaseType::PostgreSQL),
            TypeCategory::Text
        );
        assert_eq!(
            categorize_type("BYTEA", DatabaseType::PostgreSQL),
            TypeCategory::Binary
        );
        assert_eq!(
            categorize_type("INET", DatabaseType::PostgreSQL),
            TypeCategory::Unknown
        );
    }

    #[test]
    fn test_postgres_text_values() {
        use super::postgres::from_text;
        assert_eq!(from_text("42".into(), TypeCategory::Integer), SqlValue::Int(42));
        assert_eq!(from_text("t".into(), TypeCategory::Boolean), SqlValue::Bool(true));
        assert_eq!(
            from_text("12.50".into(), TypeCategory::Decimal),
            SqlValue::Decimal("12.50".into())
        );
        assert_eq!(
            from_text("{\"a\":1}".into(), TypeCategory::Json),
            SqlValue::Json(serde_json::json!({"a": 1}))
        );
        assert_eq!(
            from_text("2024-01-01".into(), TypeCategory::Temporal),
            SqlValue::Text("2024-01-01".into())
        );
    }

    #[test]
    fn test_render_rows() {
        assert_eq!(render_rows(&[]), "[]");
        assert_eq!(render_rows(&[vec![SqlValue::Int(3)]]), "[(3,)]");
        assert_eq!(
            render_rows(&[
                vec![SqlValue::Text("Alice".into()), SqlValue::Int(42)],
                vec![SqlValue::Text("Bob".into()), SqlValue::Null],
            ]),
            "[('Alice', 42), ('Bob', NULL)]"
        );
    }

    #[test]
    fn test_render_escapes_quotes() {
        assert_eq!(SqlValue::Text("O'Brien".into()).to_string(), "'O\\'Brien'");
        assert_eq!(SqlValue::Text("O'Brien".into()).to_plain_string(), "O'Brien");
    }

    #[test]
    fn test_render_bytes() {
        let value = SqlValue::Bytes(b"hello world".to_vec());
        assert_eq!(value.to_string(), "b'aGVsbG8gd29ybGQ='");
        assert_eq!(value.to_plain_string(), "aGVsbG8gd29ybGQ=");
    }
}
