// Configuration loading

pub mod error;
pub mod secrets;
pub mod settings;

pub use error::ConfigError;
pub use secrets::{resolve_secret, Secret, SecretSource};
pub use settings::{FritzSettings, KowalskiSettings, Settings, StoreSettings};
