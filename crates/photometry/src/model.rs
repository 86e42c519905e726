use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// The three broker feeds that contribute photometry for one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Alerts,
    ForcedHistory,
    PrvCandidates,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Alerts => write!(f, "alerts"),
            Self::ForcedHistory => write!(f, "forced_history"),
            Self::PrvCandidates => write!(f, "prv_candidates"),
        }
    }
}

// ---------------------------------------------------------------------------
// Input records
// ---------------------------------------------------------------------------

/// Candidate block of a real-time alert packet.
///
/// Only the fields the merge reads are typed; every other instrument field
/// lands in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertCandidate {
    pub jd: f64,
    #[serde(default)]
    pub fid: Option<i64>,
    #[serde(default)]
    pub ra: Option<f64>,
    #[serde(default)]
    pub dec: Option<f64>,
    #[serde(default)]
    pub magpsf: Option<f64>,
    #[serde(default)]
    pub sigmapsf: Option<f64>,
    #[serde(default)]
    pub diffmaglim: Option<f64>,
    #[serde(default)]
    pub programid: Option<i64>,
    #[serde(default)]
    pub field: Option<i64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// One epoch of the 30-day forced-photometry history (`fp_hists`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForcedPhotometry {
    pub jd: f64,
    #[serde(default)]
    pub fid: Option<i64>,
    #[serde(default)]
    pub programid: Option<i64>,
    #[serde(default)]
    pub field: Option<i64>,
    #[serde(default)]
    pub mag: Option<f64>,
    #[serde(default)]
    pub magerr: Option<f64>,
    #[serde(default)]
    pub snr: Option<f64>,
    #[serde(default)]
    pub limmag5sig: Option<f64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// One entry of the previous-candidate history (`prv_candidates`).
///
/// Non-detections carry only a handful of fields (`jd`, `fid`,
/// `diffmaglim`, ...); detections carry the full candidate schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "serde_json::Map<String, serde_json::Value>")]
pub struct PrvCandidate {
    pub jd: f64,
    pub fid: Option<i64>,
    pub programid: Option<i64>,
    pub field: Option<i64>,
    pub ra: Option<f64>,
    pub dec: Option<f64>,
    pub magpsf: Option<f64>,
    pub sigmapsf: Option<f64>,
    pub diffmaglim: Option<f64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
    /// Typed keys that were present in the record but `null`.
    #[serde(skip)]
    pub null_fields: usize,
}

const PRV_TYPED_KEYS: [&str; 8] = [
    "fid",
    "programid",
    "field",
    "ra",
    "dec",
    "magpsf",
    "sigmapsf",
    "diffmaglim",
];

#[derive(Deserialize)]
struct PrvFields {
    jd: f64,
    #[serde(default)]
    fid: Option<i64>,
    #[serde(default)]
    programid: Option<i64>,
    #[serde(default)]
    field: Option<i64>,
    #[serde(default)]
    ra: Option<f64>,
    #[serde(default)]
    dec: Option<f64>,
    #[serde(default)]
    magpsf: Option<f64>,
    #[serde(default)]
    sigmapsf: Option<f64>,
    #[serde(default)]
    diffmaglim: Option<f64>,
    #[serde(flatten)]
    extra: BTreeMap<String, serde_json::Value>,
}

impl TryFrom<serde_json::Map<String, serde_json::Value>> for PrvCandidate {
    type Error = serde_json::Error;

    fn try_from(map: serde_json::Map<String, serde_json::Value>) -> Result<Self, Self::Error> {
        let null_fields = PRV_TYPED_KEYS
            .iter()
            .filter(|key| map.get(**key).is_some_and(serde_json::Value::is_null))
            .count();
        let f: PrvFields = serde_json::from_value(serde_json::Value::Object(map))?;
        Ok(PrvCandidate {
            jd: f.jd,
            fid: f.fid,
            programid: f.programid,
            field: f.field,
            ra: f.ra,
            dec: f.dec,
            magpsf: f.magpsf,
            sigmapsf: f.sigmapsf,
            diffmaglim: f.diffmaglim,
            extra: f.extra,
            null_fields,
        })
    }
}

impl PrvCandidate {
    /// Number of keys the record carried, `null` values included.
    pub fn field_count(&self) -> usize {
        let typed = [
            self.fid.is_some(),
            self.programid.is_some(),
            self.field.is_some(),
            self.ra.is_some(),
            self.dec.is_some(),
            self.magpsf.is_some(),
            self.sigmapsf.is_some(),
            self.diffmaglim.is_some(),
        ];
        1 + typed.iter().filter(|set| **set).count() + self.null_fields + self.extra.len()
    }
}

/// Pre-fetched records for one object.
#[derive(Debug, Clone, Default)]
pub struct PhotometryInput {
    pub object_id: String,
    pub alerts: Vec<AlertCandidate>,
    /// `None` when the object is older than the forced-photometry window.
    pub forced: Option<Vec<ForcedPhotometry>>,
    /// `None` when the object has no previous candidates.
    pub prv: Option<Vec<PrvCandidate>>,
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// One epoch of the merged light curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightCurveRow {
    pub jd: f64,
    pub fid: Option<i64>,
    pub is_alert: bool,
    pub mag_final: Option<f64>,
    pub emag_final: Option<f64>,
    pub maglim: Option<f64>,
    pub is_detection: bool,
}

/// What each merge stage contributed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergeReport {
    pub alert_epochs: usize,
    pub forced_joined: bool,
    pub forced_epochs: usize,
    pub prv_joined: bool,
    pub prv_epochs: usize,
    /// Rows discarded because they had neither magnitude nor limit.
    pub dropped_rows: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LightCurve {
    pub object_id: String,
    pub rows: Vec<LightCurveRow>,
    pub report: MergeReport,
}

impl LightCurve {
    pub fn empty(object_id: &str) -> Self {
        Self {
            object_id: object_id.to_string(),
            rows: Vec::new(),
            report: MergeReport::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn detections(&self) -> impl Iterator<Item = &LightCurveRow> {
        self.rows.iter().filter(|r| r.is_detection)
    }

    pub fn upper_limits(&self) -> impl Iterator<Item = &LightCurveRow> {
        self.rows.iter().filter(|r| !r.is_detection)
    }
}

// ---------------------------------------------------------------------------
// Catalog records (Fritz / SkyPortal)
// ---------------------------------------------------------------------------

/// A source as listed by the Fritz `/sources` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Object identifier, e.g. `ZTF21aaaaaaa`.
    #[serde(rename = "id")]
    pub obj_id: String,
    #[serde(default)]
    pub ra: Option<f64>,
    #[serde(default)]
    pub dec: Option<f64>,
    #[serde(default)]
    pub redshift: Option<f64>,
    #[serde(default = "default_true")]
    pub transient: bool,
    #[serde(default)]
    pub varstar: bool,
    #[serde(default)]
    pub is_roid: bool,
    #[serde(default)]
    pub mjd: Option<f64>,
}

fn default_true() -> bool {
    true
}

/// One stored photometry point in magnitude space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotometryPoint {
    pub mjd: f64,
    #[serde(default)]
    pub mag: Option<f64>,
    #[serde(default)]
    pub magerr: Option<f64>,
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub limiting_mag: Option<f64>,
}

/// Position in the paged source listing. `page` is the last page fetched;
/// 0 means nothing has been fetched yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageCursor {
    pub page: u32,
    pub per_page: u32,
}

pub const DEFAULT_PER_PAGE: u32 = 10;

impl Default for PageCursor {
    fn default() -> Self {
        Self {
            page: 0,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl PageCursor {
    /// The cursor for the page after this one.
    pub fn advance(self) -> Self {
        Self {
            page: self.page.saturating_add(1),
            ..self
        }
    }
}

/// Conventional band name for a ZTF filter id.
pub fn ztf_filter_name(fid: i64) -> &'static str {
    match fid {
        1 => "ztfg",
        2 => "ztfr",
        3 => "ztfi",
        _ => "unknown",
    }
}
