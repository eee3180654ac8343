//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - Connection descriptor assembly
//! - Connection pool setup
//! - Query execution and result rendering
//! - Schema introspection for the model prompt
//! - Type mappings

pub mod connection;
pub mod executor;
pub mod pool;
pub mod schema;
pub mod types;

pub use connection::{ConnectionDescriptor, DatabaseType};
pub use executor::{QueryExecutor, QueryOutput};
pub use pool::DbPool;
pub use schema::{SchemaInspector, TableDescription};
pub use types::SqlValue;
