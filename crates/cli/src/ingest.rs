//! Fritz → local catalog ingestion, one page at a time.
//!
//! Each call advances the cursor, lists that page of sources, inserts the
//! ones not already stored and pulls their photometry. A source whose
//! photometry cannot be fetched or stored stays in the catalog without
//! points; the failure is logged and counted, and the page continues.

use serde::Serialize;

use transient_client::{ClientError, FritzClient};
use transient_photometry::{PageCursor, PhotometryPoint, SourceRecord};
use transient_store::{SourceRepository, StoreError};

/// What one ingested page did to the catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestReport {
    pub page: u32,
    pub listed: usize,
    pub inserted: usize,
    pub skipped: usize,
    pub photometry_points: usize,
    pub failures: Vec<IngestFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestFailure {
    pub obj_id: String,
    pub message: String,
}

#[derive(Debug)]
pub enum IngestError {
    /// The page listing itself could not be fetched.
    Fetch(ClientError),
    /// The catalog rejected a write that is not per-source.
    Store(StoreError),
}

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestError::Fetch(e) => write!(f, "source listing failed: {e}"),
            IngestError::Store(e) => write!(f, "catalog write failed: {e}"),
        }
    }
}

impl std::error::Error for IngestError {}

impl From<ClientError> for IngestError {
    fn from(e: ClientError) -> Self {
        IngestError::Fetch(e)
    }
}

impl From<StoreError> for IngestError {
    fn from(e: StoreError) -> Self {
        IngestError::Store(e)
    }
}

/// Where sources and their photometry come from.
pub trait SourceFeed {
    fn sources(&self, cursor: PageCursor) -> Result<Vec<SourceRecord>, ClientError>;
    fn photometry(&self, obj_id: &str) -> Result<Vec<PhotometryPoint>, ClientError>;
}

impl SourceFeed for FritzClient {
    fn sources(&self, cursor: PageCursor) -> Result<Vec<SourceRecord>, ClientError> {
        self.fetch_sources(cursor)
    }

    fn photometry(&self, obj_id: &str) -> Result<Vec<PhotometryPoint>, ClientError> {
        self.fetch_photometry(obj_id)
    }
}

/// Ingest the page after `cursor`. The returned report's `page` is the
/// page that was fetched; the caller persists it as the new cursor.
pub fn ingest_page<F, R>(feed: &F, repo: &mut R, cursor: PageCursor) -> Result<IngestReport, IngestError>
where
    F: SourceFeed + ?Sized,
    R: SourceRepository + ?Sized,
{
    let next = cursor.advance();
    let sources = feed.sources(next)?;
    log::info!("page {}: {} sources listed", next.page, sources.len());

    let mut report = IngestReport {
        page: next.page,
        listed: sources.len(),
        ..IngestReport::default()
    };

    for source in &sources {
        if repo.find_source(&source.obj_id)?.is_some() {
            log::info!("{} already in catalog, skipping", source.obj_id);
            report.skipped += 1;
            continue;
        }

        let source_id = repo.insert_source(source)?;
        report.inserted += 1;
        log::debug!("inserted {} as #{source_id}", source.obj_id);

        match store_photometry(feed, repo, source_id, &source.obj_id) {
            Ok(n) => report.photometry_points += n,
            Err(message) => {
                log::warn!("{}: photometry not stored: {message}", source.obj_id);
                report.failures.push(IngestFailure {
                    obj_id: source.obj_id.clone(),
                    message,
                });
            }
        }
    }

    Ok(report)
}

fn store_photometry<F, R>(feed: &F, repo: &mut R, source_id: i64, obj_id: &str) -> Result<usize, String>
where
    F: SourceFeed + ?Sized,
    R: SourceRepository + ?Sized,
{
    let points = feed.photometry(obj_id).map_err(|e| e.to_string())?;
    if points.is_empty() {
        log::debug!("{obj_id}: no photometry");
        return Ok(0);
    }
    repo.add_photometry(source_id, &points).map_err(|e| e.to_string())
}
