// Application settings
// Loaded from ~/.config/transient/settings.toml

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use transient_photometry::ReconcileConfig;

use crate::error::ConfigError;

pub const DEFAULT_FRITZ_BASE_URL: &str = "https://fritz.science/api";
pub const DEFAULT_KOWALSKI_HOST: &str = "kowalski.caltech.edu";

/// Fritz (SkyPortal) connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FritzSettings {
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Sources per ingested page
    pub per_page: u32,
}

impl Default for FritzSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_FRITZ_BASE_URL.to_string(),
            token: None,
            per_page: 10,
        }
    }
}

/// Kowalski connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KowalskiSettings {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl Default for KowalskiSettings {
    fn default() -> Self {
        Self {
            protocol: "https".to_string(),
            host: DEFAULT_KOWALSKI_HOST.to_string(),
            port: 443,
            username: None,
            password: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// SQLite catalog path. Unset = platform data dir.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub fritz: FritzSettings,
    pub kowalski: KowalskiSettings,
    pub store: StoreSettings,
    pub reconcile: ReconcileConfig,
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("transient")
            .join("settings.toml")
    }

    /// Load settings from disk, falling back to defaults
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            log::debug!("no settings at {}, using defaults", path.display());
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("{e}");
                log::warn!("using default settings");
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml(&contents).map_err(|e| match e {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.display().to_string(),
                message,
            },
            other => other,
        })
    }

    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(input).map_err(|e| ConfigError::Parse {
            path: "<input>".into(),
            message: e.to_string(),
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fritz.per_page == 0 {
            return Err(ConfigError::Invalid("fritz.per_page must be at least 1".into()));
        }
        if self.kowalski.port == 0 {
            return Err(ConfigError::Invalid("kowalski.port must be non-zero".into()));
        }
        self.reconcile
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("reconcile: {e}")))
    }

    /// Save current settings to disk
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |e: std::io::Error| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(path, self.to_toml()?).map_err(io_err)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Copy with credentials masked, for display.
    pub fn redacted(&self) -> Self {
        let mask = |v: &Option<String>| v.as_ref().map(|_| "********".to_string());
        let mut out = self.clone();
        out.fritz.token = mask(&self.fritz.token);
        out.kowalski.password = mask(&self.kowalski.password);
        out
    }

    /// Database path, defaulting to the platform data dir.
    pub fn effective_database(&self) -> PathBuf {
        match &self.store.database {
            Some(path) => path.clone(),
            None => dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("transient")
                .join("catalog.db"),
        }
    }
}
