use serde::{Deserialize, Serialize};

use crate::error::PhotometryError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Tunables for light-curve reconciliation and position estimation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Forced photometry is trusted as a detection only above this SNR.
    pub snr_threshold: f64,
    /// Which limiting magnitude wins when both histories supply one.
    pub limit_preference: LimitPreference,
    /// Which previous candidates join the positional scatter.
    pub history_inclusion: HistoryInclusion,
}

pub const DEFAULT_SNR_THRESHOLD: f64 = 3.0;
pub const DEFAULT_MIN_FIELDS: usize = 50;

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            snr_threshold: DEFAULT_SNR_THRESHOLD,
            limit_preference: LimitPreference::default(),
            history_inclusion: HistoryInclusion::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Limit preference
// ---------------------------------------------------------------------------

/// Resolution of `maglim` when the forced 5-sigma limit and the
/// previous-candidate difference-image limit are both present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitPreference {
    /// Forced-photometry `limmag5sig` first, `diffmaglim` as fallback.
    #[default]
    ForcedFiveSigma,
    /// `diffmaglim` first, `limmag5sig` as fallback.
    DiffImage,
    /// The fainter (numerically larger) of the two.
    Deepest,
}

impl std::fmt::Display for LimitPreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ForcedFiveSigma => write!(f, "forced_five_sigma"),
            Self::DiffImage => write!(f, "diff_image"),
            Self::Deepest => write!(f, "deepest"),
        }
    }
}

// ---------------------------------------------------------------------------
// History inclusion
// ---------------------------------------------------------------------------

/// Rule deciding whether a previous candidate contributes to the
/// positional scatter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum HistoryInclusion {
    /// Include records carrying more than `min_fields` fields (full
    /// candidate records; non-detections carry far fewer).
    FieldCount {
        #[serde(default = "default_min_fields")]
        min_fields: usize,
    },
    /// Include records that carry both `ra` and `dec`.
    HasCoordinates,
}

fn default_min_fields() -> usize {
    DEFAULT_MIN_FIELDS
}

impl Default for HistoryInclusion {
    fn default() -> Self {
        Self::FieldCount {
            min_fields: DEFAULT_MIN_FIELDS,
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconcileConfig {
    pub fn from_toml(input: &str) -> Result<Self, PhotometryError> {
        let config: ReconcileConfig =
            toml::from_str(input).map_err(|e| PhotometryError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PhotometryError> {
        if !self.snr_threshold.is_finite() || self.snr_threshold < 0.0 {
            return Err(PhotometryError::ConfigValidation(format!(
                "snr_threshold must be a non-negative number, got {}",
                self.snr_threshold
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
