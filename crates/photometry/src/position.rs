//! Robust sky position and positional scatter from alert detections.

use serde::Serialize;

use crate::config::HistoryInclusion;
use crate::error::PhotometryError;
use crate::model::{AlertCandidate, PrvCandidate};

const ARCSEC_PER_RADIAN: f64 = 206_264.806_247_096_36;

/// ICRS (J2000) to galactic rotation matrix.
const ICRS_TO_GALACTIC: [[f64; 3]; 3] = [
    [-0.054_875_560_416_215_4, -0.873_437_090_234_885, -0.483_835_015_548_713_2],
    [0.494_109_427_875_583_7, -0.444_829_629_960_011_2, 0.746_982_244_497_218_9],
    [-0.867_666_149_019_004_7, -0.198_076_373_431_201_5, 0.455_983_776_175_066_9],
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkyPosition {
    /// Median right ascension of the alert detections, degrees.
    pub ra: f64,
    /// Median declination of the alert detections, degrees.
    pub dec: f64,
    /// Median separation between successive points, arcseconds.
    pub scatter_arcsec: f64,
    /// Alert detections used for the median.
    pub alert_points: usize,
    /// Historical points added to the scatter.
    pub history_points: usize,
}

/// Median position of the alerts plus the median successive-pair separation
/// over alerts followed by the qualifying historical detections.
///
/// Alerts without coordinates are skipped. With no usable alert the median
/// is undefined and [`PhotometryError::InsufficientData`] is returned.
pub fn estimate_position(
    alerts: &[AlertCandidate],
    history: Option<&[PrvCandidate]>,
    rule: HistoryInclusion,
) -> Result<SkyPosition, PhotometryError> {
    let mut points: Vec<(f64, f64)> = alerts
        .iter()
        .filter_map(|a| Some((a.ra?, a.dec?)))
        .filter(|(ra, dec)| ra.is_finite() && dec.is_finite())
        .collect();

    if points.is_empty() {
        return Err(PhotometryError::InsufficientData(
            "no alert detection with coordinates".into(),
        ));
    }

    let alert_points = points.len();
    let ras: Vec<f64> = points.iter().map(|p| p.0).collect();
    let decs: Vec<f64> = points.iter().map(|p| p.1).collect();
    // non-empty, checked above
    let ra = median(&ras).unwrap_or(f64::NAN);
    let dec = median(&decs).unwrap_or(f64::NAN);

    for prv in history.unwrap_or(&[]) {
        if !include_history(prv, rule) {
            continue;
        }
        if let (Some(ra), Some(dec)) = (prv.ra, prv.dec) {
            points.push((ra, dec));
        }
    }
    let history_points = points.len() - alert_points;

    let separations: Vec<f64> = points
        .windows(2)
        .map(|w| angular_separation_arcsec(w[0].0, w[0].1, w[1].0, w[1].1))
        .collect();
    let scatter_arcsec = median(&separations).unwrap_or(0.0);

    Ok(SkyPosition {
        ra,
        dec,
        scatter_arcsec,
        alert_points,
        history_points,
    })
}

fn include_history(prv: &PrvCandidate, rule: HistoryInclusion) -> bool {
    match rule {
        HistoryInclusion::FieldCount { min_fields } => prv.field_count() > min_fields,
        HistoryInclusion::HasCoordinates => prv.ra.is_some() && prv.dec.is_some(),
    }
}

/// Median with even-length averaging. `None` for an empty slice.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Great-circle separation in arcseconds (Vincenty formula, stable at
/// small and antipodal separations).
pub fn angular_separation_arcsec(ra1: f64, dec1: f64, ra2: f64, dec2: f64) -> f64 {
    let (lon1, lat1) = (ra1.to_radians(), dec1.to_radians());
    let (lon2, lat2) = (ra2.to_radians(), dec2.to_radians());

    let (sdlon, cdlon) = (lon2 - lon1).sin_cos();
    let (slat1, clat1) = lat1.sin_cos();
    let (slat2, clat2) = lat2.sin_cos();

    let num1 = clat2 * sdlon;
    let num2 = clat1 * slat2 - slat1 * clat2 * cdlon;
    let denominator = slat1 * slat2 + clat1 * clat2 * cdlon;

    num1.hypot(num2).atan2(denominator) * ARCSEC_PER_RADIAN
}

/// Galactic latitude `b` in degrees for an ICRS position in degrees.
pub fn galactic_latitude(ra: f64, dec: f64) -> f64 {
    let (ra, dec) = (ra.to_radians(), dec.to_radians());
    let v = [dec.cos() * ra.cos(), dec.cos() * ra.sin(), dec.sin()];
    let m = ICRS_TO_GALACTIC[2];
    let z = m[0] * v[0] + m[1] * v[1] + m[2] * v[2];
    z.clamp(-1.0, 1.0).asin().to_degrees()
}
