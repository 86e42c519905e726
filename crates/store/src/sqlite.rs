// Source catalog persisted in SQLite

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use transient_photometry::model::{PageCursor, PhotometryPoint, SourceRecord};

use crate::error::StoreError;
use crate::SCHEMA_VERSION;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS source_table (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    obj_id TEXT NOT NULL UNIQUE,
    ra REAL,
    dec REAL,
    redshift REAL,
    transient INTEGER NOT NULL DEFAULT 1,
    varstar INTEGER NOT NULL DEFAULT 0,
    is_roid INTEGER NOT NULL DEFAULT 0,
    mjd REAL
);

CREATE TABLE IF NOT EXISTS photometry_table (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id INTEGER NOT NULL REFERENCES source_table(id) ON DELETE CASCADE,
    mjd REAL NOT NULL,
    mag REAL,
    magerr REAL,
    filter TEXT,
    limiting_mag REAL
);

CREATE INDEX IF NOT EXISTS photometry_source ON photometry_table (source_id, mjd);

CREATE TABLE IF NOT EXISTS fetch_cursor (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    page INTEGER NOT NULL,
    per_page INTEGER NOT NULL
);
"#;

/// A catalog source together with its row id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredSource {
    /// Catalog row id; the object id serializes as `id`.
    #[serde(rename = "row_id")]
    pub id: i64,
    #[serde(flatten)]
    pub record: SourceRecord,
}

/// Persistence for ingested catalog sources and their photometry.
pub trait SourceRepository {
    fn find_source(&self, obj_id: &str) -> Result<Option<StoredSource>, StoreError>;

    /// Insert a new source and return its row id. Fails with
    /// [`StoreError::DuplicateSource`] when the object id is already stored.
    fn insert_source(&mut self, source: &SourceRecord) -> Result<i64, StoreError>;

    /// Store all points for a source in one transaction: either every
    /// point is written or none is.
    fn add_photometry(&mut self, source_id: i64, points: &[PhotometryPoint]) -> Result<usize, StoreError>;

    /// Stored photometry for an object, in MJD order.
    fn photometry_for(&self, obj_id: &str) -> Result<Vec<PhotometryPoint>, StoreError>;

    /// Most recently inserted sources first.
    fn recent_sources(&self, limit: usize) -> Result<Vec<StoredSource>, StoreError>;

    fn load_cursor(&self) -> Result<PageCursor, StoreError>;

    fn save_cursor(&mut self, cursor: PageCursor) -> Result<(), StoreError>;
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the catalog at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path).map_err(|e| StoreError::Open {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        let version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
        if version > SCHEMA_VERSION {
            return Err(StoreError::SchemaVersion {
                found: version,
                supported: SCHEMA_VERSION,
            });
        }

        conn.pragma_update(None, "foreign_keys", true)?;
        conn.execute_batch(SCHEMA)?;
        if version < SCHEMA_VERSION {
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        }

        Ok(Self { conn })
    }

    fn source_id(&self, obj_id: &str) -> Result<Option<i64>, StoreError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id FROM source_table WHERE obj_id = ?1",
                params![obj_id],
                |row| row.get(0),
            )
            .optional()?)
    }
}

fn source_from_row(row: &Row<'_>) -> rusqlite::Result<StoredSource> {
    Ok(StoredSource {
        id: row.get(0)?,
        record: SourceRecord {
            obj_id: row.get(1)?,
            ra: row.get(2)?,
            dec: row.get(3)?,
            redshift: row.get(4)?,
            transient: row.get(5)?,
            varstar: row.get(6)?,
            is_roid: row.get(7)?,
            mjd: row.get(8)?,
        },
    })
}

const SOURCE_COLUMNS: &str = "id, obj_id, ra, dec, redshift, transient, varstar, is_roid, mjd";

impl SourceRepository for SqliteStore {
    fn find_source(&self, obj_id: &str) -> Result<Option<StoredSource>, StoreError> {
        let sql = format!("SELECT {SOURCE_COLUMNS} FROM source_table WHERE obj_id = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![obj_id], source_from_row)
            .optional()?)
    }

    fn insert_source(&mut self, source: &SourceRecord) -> Result<i64, StoreError> {
        if self.source_id(&source.obj_id)?.is_some() {
            return Err(StoreError::DuplicateSource(source.obj_id.clone()));
        }

        self.conn.execute(
            "INSERT INTO source_table (obj_id, ra, dec, redshift, transient, varstar, is_roid, mjd) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                source.obj_id,
                source.ra,
                source.dec,
                source.redshift,
                source.transient,
                source.varstar,
                source.is_roid,
                source.mjd,
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        log::debug!("stored source {} as id {id}", source.obj_id);
        Ok(id)
    }

    fn add_photometry(&mut self, source_id: i64, points: &[PhotometryPoint]) -> Result<usize, StoreError> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO photometry_table (source_id, mjd, mag, magerr, filter, limiting_mag) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for p in points {
                stmt.execute(params![
                    source_id,
                    p.mjd,
                    p.mag,
                    p.magerr,
                    p.filter,
                    p.limiting_mag,
                ])?;
            }
        }
        // dropping an uncommitted transaction rolls it back
        tx.commit()?;
        Ok(points.len())
    }

    fn photometry_for(&self, obj_id: &str) -> Result<Vec<PhotometryPoint>, StoreError> {
        let source_id = self
            .source_id(obj_id)?
            .ok_or_else(|| StoreError::UnknownSource(obj_id.to_string()))?;

        let mut stmt = self.conn.prepare(
            "SELECT mjd, mag, magerr, filter, limiting_mag FROM photometry_table \
             WHERE source_id = ?1 ORDER BY mjd, id",
        )?;
        let rows = stmt.query_map(params![source_id], |row| {
            Ok(PhotometryPoint {
                mjd: row.get(0)?,
                mag: row.get(1)?,
                magerr: row.get(2)?,
                filter: row.get(3)?,
                limiting_mag: row.get(4)?,
            })
        })?;

        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn recent_sources(&self, limit: usize) -> Result<Vec<StoredSource>, StoreError> {
        let sql = format!("SELECT {SOURCE_COLUMNS} FROM source_table ORDER BY id DESC LIMIT ?1");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![limit as i64], source_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn load_cursor(&self) -> Result<PageCursor, StoreError> {
        let stored = self
            .conn
            .query_row("SELECT page, per_page FROM fetch_cursor WHERE id = 1", [], |row| {
                Ok(PageCursor {
                    page: row.get(0)?,
                    per_page: row.get(1)?,
                })
            })
            .optional()?;
        Ok(stored.unwrap_or_default())
    }

    fn save_cursor(&mut self, cursor: PageCursor) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO fetch_cursor (id, page, per_page) VALUES (1, ?1, ?2) \
             ON CONFLICT(id) DO UPDATE SET page = excluded.page, per_page = excluded.per_page",
            params![cursor.page, cursor.per_page],
        )?;
        Ok(())
    }
}
