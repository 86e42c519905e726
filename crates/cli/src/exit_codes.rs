//! CLI Exit Code Registry
//!
//! This is the single source of truth for all `tlc` exit codes.
//! Scripts that batch over object ids branch on these.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain     | Description                                 |
//! |---------|------------|---------------------------------------------|
//! | 0       | Universal  | Success                                     |
//! | 1       | Universal  | General error (unspecified)                 |
//! | 2       | Universal  | CLI usage error (bad args, unreadable file) |
//! | 3-9     | photometry | Record decoding, position and cutout codes  |
//! | 10-19   | store      | Local SQLite catalog codes                  |
//! | 50-59   | fetch      | Fritz / Kowalski broker codes               |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Map it in the matching `*_exit_code` function

use transient_client::ClientError;
use transient_photometry::{CutoutError, PhotometryError};
use transient_store::StoreError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, unreadable input file, bad settings file.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Photometry (3-9)
// =============================================================================

/// A broker record could not be decoded (wrong shape, non-numeric field).
pub const EXIT_PHOT_DECODE: u8 = 3;

/// A record has no usable `jd` join key.
pub const EXIT_PHOT_JOIN_KEY: u8 = 4;

/// Not enough points for the requested statistic (no usable alert position).
pub const EXIT_PHOT_INSUFFICIENT: u8 = 5;

/// Cutout stamps missing, undecodable, or larger than the triplet.
pub const EXIT_PHOT_CUTOUT: u8 = 6;

/// Reconciliation settings rejected.
pub const EXIT_PHOT_CONFIG: u8 = 7;

// =============================================================================
// Store (10-19)
// =============================================================================

/// Catalog database could not be opened.
pub const EXIT_STORE_OPEN: u8 = 10;

/// Catalog was written by a newer schema.
pub const EXIT_STORE_SCHEMA: u8 = 11;

/// Object id is not in the catalog.
pub const EXIT_STORE_UNKNOWN_SOURCE: u8 = 12;

/// SQL, CSV or filesystem failure while reading or writing.
pub const EXIT_STORE_WRITE: u8 = 13;

// =============================================================================
// Fetch (50-59)
// =============================================================================

/// Credentials missing or rejected.
pub const EXIT_FETCH_AUTH: u8 = 50;

/// Broker unreachable (DNS, TLS, timeout).
pub const EXIT_FETCH_NETWORK: u8 = 51;

/// Broker answered with an HTTP error or a non-"success" status.
pub const EXIT_FETCH_UPSTREAM: u8 = 52;

/// Broker response could not be parsed.
pub const EXIT_FETCH_PARSE: u8 = 53;

/// Broker has no alert packet for the object.
pub const EXIT_FETCH_NOT_FOUND: u8 = 54;

pub fn photometry_exit_code(err: &PhotometryError) -> u8 {
    match err {
        PhotometryError::ConfigParse(_) | PhotometryError::ConfigValidation(_) => EXIT_PHOT_CONFIG,
        PhotometryError::MissingJoinKey { .. } | PhotometryError::NonFiniteJoinKey { .. } => EXIT_PHOT_JOIN_KEY,
        PhotometryError::Decode { .. } => EXIT_PHOT_DECODE,
        PhotometryError::InsufficientData(_) => EXIT_PHOT_INSUFFICIENT,
    }
}

pub fn cutout_exit_code(_err: &CutoutError) -> u8 {
    EXIT_PHOT_CUTOUT
}

pub fn store_exit_code(err: &StoreError) -> u8 {
    match err {
        StoreError::Open { .. } => EXIT_STORE_OPEN,
        StoreError::SchemaVersion { .. } => EXIT_STORE_SCHEMA,
        StoreError::UnknownSource(_) => EXIT_STORE_UNKNOWN_SOURCE,
        StoreError::Sqlite(_)
        | StoreError::DuplicateSource(_)
        | StoreError::Csv(_)
        | StoreError::Io(_) => EXIT_STORE_WRITE,
    }
}

pub fn client_exit_code(err: &ClientError) -> u8 {
    match err {
        ClientError::NotAuthenticated(_) | ClientError::AuthRejected(_) => EXIT_FETCH_AUTH,
        ClientError::Network(_) => EXIT_FETCH_NETWORK,
        ClientError::Http(_, _) | ClientError::Upstream(_) => EXIT_FETCH_UPSTREAM,
        ClientError::Parse(_) => EXIT_FETCH_PARSE,
    }
}
