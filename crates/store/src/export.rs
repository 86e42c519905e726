// Light-curve CSV export

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use transient_photometry::model::{ztf_filter_name, LightCurve, LightCurveRow};
use transient_photometry::time::jd_to_mjd;

use crate::error::StoreError;

#[derive(Serialize)]
struct CsvRow<'a> {
    jd: f64,
    mjd: f64,
    fid: Option<i64>,
    filter: &'a str,
    is_alert: bool,
    mag_final: Option<f64>,
    emag_final: Option<f64>,
    maglim: Option<f64>,
    is_detection: bool,
}

impl<'a> From<&'a LightCurveRow> for CsvRow<'a> {
    fn from(row: &'a LightCurveRow) -> Self {
        Self {
            jd: row.jd,
            mjd: jd_to_mjd(row.jd),
            fid: row.fid,
            filter: row.fid.map(ztf_filter_name).unwrap_or(""),
            is_alert: row.is_alert,
            mag_final: row.mag_final,
            emag_final: row.emag_final,
            maglim: row.maglim,
            is_detection: row.is_detection,
        }
    }
}

/// Write one header line and one record per row. Absent values are empty
/// fields.
pub fn write_light_curve<W: Write>(lc: &LightCurve, out: W) -> Result<(), StoreError> {
    let mut writer = csv::Writer::from_writer(out);
    for row in &lc.rows {
        writer.serialize(CsvRow::from(row))?;
    }
    if lc.rows.is_empty() {
        writer.write_record([
            "jd", "mjd", "fid", "filter", "is_alert", "mag_final", "emag_final", "maglim",
            "is_detection",
        ])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn export_light_curve(lc: &LightCurve, path: &Path) -> Result<(), StoreError> {
    let file = std::fs::File::create(path)?;
    write_light_curve(lc, file)?;
    log::info!("wrote {} rows for {} to {}", lc.rows.len(), lc.object_id, path.display());
    Ok(())
}
