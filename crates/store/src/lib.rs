// Local source catalog: SQLite tables and CSV export

pub mod error;
pub mod export;
pub mod sqlite;

pub use error::StoreError;
pub use sqlite::{SourceRepository, SqliteStore, StoredSource};

/// Schema version written to `PRAGMA user_version`.
/// Increment when the tables change in a way older builds can't read.
pub const SCHEMA_VERSION: i32 = 1;
