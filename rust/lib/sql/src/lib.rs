//! SQLite record store for policy and access-request records.
//!
//! Statements that reference a table, column or index the database lacks
//! fail with [`SQLError::MissingSchema`], which callers use to detect older
//! record layouts.

pub mod error;
pub mod sqlite;
pub mod traits;

pub use error::SQLError;
pub use sqlite::SqliteStore;
pub use traits::{Row, SQLStore, Value};
