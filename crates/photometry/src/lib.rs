//! `transient-photometry`: light-curve reconciliation for transient alerts.
//!
//! Pure engine crate: receives pre-fetched broker records, returns merged
//! light curves, sky positions and decoded cutout triplets.
//! No HTTP or database dependencies.

pub mod aggregate;
pub mod config;
pub mod cutout;
pub mod error;
pub mod fits;
pub mod loader;
pub mod model;
pub mod policy;
pub mod position;
pub mod reconcile;
pub mod series;
pub mod time;

pub use config::{HistoryInclusion, LimitPreference, ReconcileConfig};
pub use cutout::{make_triplet, StampSet, Triplet};
pub use error::{CutoutError, PhotometryError};
pub use model::{
    AlertCandidate, ForcedPhotometry, LightCurve, LightCurveRow, PageCursor, PhotometryInput,
    PhotometryPoint, PrvCandidate, SourceRecord,
};
pub use position::{estimate_position, galactic_latitude, SkyPosition};
pub use reconcile::reconcile;
