use std::fmt;

#[derive(Debug)]
pub enum StoreError {
    /// Opening the database file failed.
    Open { path: String, message: String },
    /// A statement or transaction failed.
    Sqlite(String),
    /// The database was written by a newer schema.
    SchemaVersion { found: i32, supported: i32 },
    /// A source with this object id is already stored.
    DuplicateSource(String),
    /// No stored source with this object id.
    UnknownSource(String),
    /// CSV writing failed.
    Csv(String),
    /// IO error (export file, etc.).
    Io(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open { path, message } => write!(f, "cannot open database {path}: {message}"),
            Self::Sqlite(msg) => write!(f, "database error: {msg}"),
            Self::SchemaVersion { found, supported } => write!(
                f,
                "database schema version {found} is newer than supported version {supported}"
            ),
            Self::DuplicateSource(id) => write!(f, "source '{id}' already stored"),
            Self::UnknownSource(id) => write!(f, "source '{id}' not found"),
            Self::Csv(msg) => write!(f, "CSV error: {msg}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Sqlite(e.to_string())
    }
}

impl From<csv::Error> for StoreError {
    fn from(e: csv::Error) -> Self {
        Self::Csv(e.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
