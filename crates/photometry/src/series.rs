//! Plot-ready per-filter series.
//!
//! x is days before `now`, y is magnitude (plotted on an inverted axis).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{ztf_filter_name, LightCurve, PhotometryPoint};
use crate::time::{days_ago, days_ago_jd};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DetectionPoint {
    pub days_ago: f64,
    pub mag: f64,
    pub emag: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LimitPoint {
    pub days_ago: f64,
    pub maglim: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterSeries {
    pub detections: Vec<DetectionPoint>,
    pub upper_limits: Vec<LimitPoint>,
}

impl FilterSeries {
    pub fn is_empty(&self) -> bool {
        self.detections.is_empty() && self.upper_limits.is_empty()
    }
}

/// Series keyed by filter name (`ztfg`, `ztfr`, ...).
pub type SeriesByFilter = BTreeMap<String, FilterSeries>;

/// Split a reconciled light curve into per-filter series.
///
/// Detections without a magnitude (alert epochs with no `magpsf`) and
/// non-detections without a limit carry nothing to plot and are skipped.
pub fn series_by_filter(lc: &LightCurve, now: DateTime<Utc>) -> SeriesByFilter {
    let mut out = SeriesByFilter::new();

    for row in &lc.rows {
        let filter = row.fid.map(ztf_filter_name).unwrap_or("unknown");
        let x = days_ago_jd(row.jd, now);
        let entry = out.entry(filter.to_string()).or_default();

        if row.is_detection {
            if let Some(mag) = row.mag_final {
                entry.detections.push(DetectionPoint {
                    days_ago: x,
                    mag,
                    emag: row.emag_final,
                });
            }
        } else if let Some(maglim) = row.maglim {
            entry.upper_limits.push(LimitPoint { days_ago: x, maglim });
        }
    }

    out.retain(|_, s| !s.is_empty());
    out
}

/// Per-filter series for stored catalog photometry. Points with a
/// magnitude are detections; the rest plot their limiting magnitude.
pub fn points_by_filter(points: &[PhotometryPoint], now: DateTime<Utc>) -> SeriesByFilter {
    let mut out = SeriesByFilter::new();

    for p in points {
        let filter = p.filter.clone().unwrap_or_else(|| "unknown".to_string());
        let x = days_ago(p.mjd, now);
        let entry = out.entry(filter).or_default();

        match (p.mag, p.limiting_mag) {
            (Some(mag), _) => entry.detections.push(DetectionPoint {
                days_ago: x,
                mag,
                emag: p.magerr,
            }),
            (None, Some(maglim)) => entry.upper_limits.push(LimitPoint { days_ago: x, maglim }),
            (None, None) => {}
        }
    }

    out.retain(|_, s| !s.is_empty());
    out
}
