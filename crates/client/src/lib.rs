//! Broker API clients, shared by ingestion and the CLI.
//!
//! Fritz (SkyPortal) supplies the source catalog and its stored photometry;
//! Kowalski supplies alert packets and the per-object histories.
//!
//! Blocking reqwest clients. No retries, no caching.

mod error;
mod fritz;
mod kowalski;

pub use error::ClientError;
pub use fritz::{FritzClient, FRITZ_API_BASE};
pub use kowalski::{KowalskiClient, KowalskiCredentials, ALERTS_AUX_CATALOG, ALERTS_CATALOG};

pub(crate) fn user_agent() -> String {
    format!("tlc/{}", env!("CARGO_PKG_VERSION"))
}
