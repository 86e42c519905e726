use std::collections::BTreeMap;

use ordered_float::OrderedFloat;

use crate::error::PhotometryError;
use crate::model::{AlertCandidate, ForcedPhotometry, PrvCandidate, Source};

/// Julian Date as an ordered map key.
pub type JdKey = OrderedFloat<f64>;

/// A record that joins on Julian Date.
pub trait JdRecord: Clone {
    const SOURCE: Source;

    fn jd(&self) -> f64;

    /// Fill every field absent on `self` from `later`.
    fn fill_missing(&mut self, later: &Self);
}

/// Group records by Julian Date, keeping one record per epoch.
///
/// Records sharing a JD collapse first-non-null-wins in input order.
/// Returns an error for a NaN or infinite JD.
pub fn collapse_by_jd<R: JdRecord>(records: &[R]) -> Result<BTreeMap<JdKey, R>, PhotometryError> {
    let mut by_jd: BTreeMap<JdKey, R> = BTreeMap::new();

    for (index, record) in records.iter().enumerate() {
        let jd = record.jd();
        if !jd.is_finite() {
            return Err(PhotometryError::NonFiniteJoinKey {
                source: R::SOURCE,
                index,
                value: jd,
            });
        }
        match by_jd.get_mut(&OrderedFloat(jd)) {
            Some(existing) => existing.fill_missing(record),
            None => {
                by_jd.insert(OrderedFloat(jd), record.clone());
            }
        }
    }

    if by_jd.len() < records.len() {
        log::debug!(
            "{}: collapsed {} records into {} epochs",
            R::SOURCE,
            records.len(),
            by_jd.len()
        );
    }

    Ok(by_jd)
}

fn fill<T: Clone>(slot: &mut Option<T>, later: &Option<T>) {
    if slot.is_none() {
        slot.clone_from(later);
    }
}

fn fill_extra(
    extra: &mut BTreeMap<String, serde_json::Value>,
    later: &BTreeMap<String, serde_json::Value>,
) {
    for (k, v) in later {
        let slot = extra.entry(k.clone()).or_insert(serde_json::Value::Null);
        if slot.is_null() {
            *slot = v.clone();
        }
    }
}

impl JdRecord for AlertCandidate {
    const SOURCE: Source = Source::Alerts;

    fn jd(&self) -> f64 {
        self.jd
    }

    fn fill_missing(&mut self, later: &Self) {
        fill(&mut self.fid, &later.fid);
        fill(&mut self.ra, &later.ra);
        fill(&mut self.dec, &later.dec);
        fill(&mut self.magpsf, &later.magpsf);
        fill(&mut self.sigmapsf, &later.sigmapsf);
        fill(&mut self.diffmaglim, &later.diffmaglim);
        fill(&mut self.programid, &later.programid);
        fill(&mut self.field, &later.field);
        fill_extra(&mut self.extra, &later.extra);
    }
}

impl JdRecord for ForcedPhotometry {
    const SOURCE: Source = Source::ForcedHistory;

    fn jd(&self) -> f64 {
        self.jd
    }

    fn fill_missing(&mut self, later: &Self) {
        fill(&mut self.fid, &later.fid);
        fill(&mut self.programid, &later.programid);
        fill(&mut self.field, &later.field);
        fill(&mut self.mag, &later.mag);
        fill(&mut self.magerr, &later.magerr);
        fill(&mut self.snr, &later.snr);
        fill(&mut self.limmag5sig, &later.limmag5sig);
        fill_extra(&mut self.extra, &later.extra);
    }
}

impl JdRecord for PrvCandidate {
    const SOURCE: Source = Source::PrvCandidates;

    fn jd(&self) -> f64 {
        self.jd
    }

    fn fill_missing(&mut self, later: &Self) {
        fill(&mut self.fid, &later.fid);
        fill(&mut self.programid, &later.programid);
        fill(&mut self.field, &later.field);
        fill(&mut self.ra, &later.ra);
        fill(&mut self.dec, &later.dec);
        fill(&mut self.magpsf, &later.magpsf);
        fill(&mut self.sigmapsf, &later.sigmapsf);
        fill(&mut self.diffmaglim, &later.diffmaglim);
        fill_extra(&mut self.extra, &later.extra);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forced(jd: f64, snr: Option<f64>, limit: Option<f64>) -> ForcedPhotometry {
        ForcedPhotometry {
            jd,
            fid: None,
            programid: None,
            field: None,
            mag: None,
            magerr: None,
            snr,
            limmag5sig: limit,
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn distinct_epochs_are_kept_in_jd_order() {
        let rows = vec![
            forced(2.0, None, Some(20.0)),
            forced(1.0, None, Some(19.0)),
            forced(3.0, None, Some(21.0)),
        ];
        let by_jd = collapse_by_jd(&rows).unwrap();
        let jds: Vec<f64> = by_jd.keys().map(|k| k.0).collect();
        assert_eq!(jds, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn duplicate_epoch_fills_first_non_null() {
        let rows = vec![
            forced(1.0, Some(2.0), None),
            forced(1.0, Some(9.0), Some(20.5)),
        ];
        let by_jd = collapse_by_jd(&rows).unwrap();
        assert_eq!(by_jd.len(), 1);
        let rec = &by_jd[&OrderedFloat(1.0)];
        // first value wins
        assert_eq!(rec.snr, Some(2.0));
        // gap filled from the later record
        assert_eq!(rec.limmag5sig, Some(20.5));
    }

    #[test]
    fn nan_jd_is_rejected() {
        let rows = vec![forced(1.0, None, None), forced(f64::NAN, None, None)];
        let err = collapse_by_jd(&rows).unwrap_err();
        match err {
            PhotometryError::NonFiniteJoinKey { source, index, .. } => {
                assert_eq!(source, Source::ForcedHistory);
                assert_eq!(index, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn extra_fields_fill_nulls_only() {
        let mut a = forced(1.0, None, None);
        a.extra.insert("pid".into(), serde_json::json!(1));
        a.extra.insert("rcid".into(), serde_json::Value::Null);
        let mut b = forced(1.0, None, None);
        b.extra.insert("pid".into(), serde_json::json!(2));
        b.extra.insert("rcid".into(), serde_json::json!(40));
        b.extra.insert("exptime".into(), serde_json::json!(30.0));

        let by_jd = collapse_by_jd(&[a, b]).unwrap();
        let rec = &by_jd[&OrderedFloat(1.0)];
        assert_eq!(rec.extra["pid"], serde_json::json!(1));
        assert_eq!(rec.extra["rcid"], serde_json::json!(40));
        assert_eq!(rec.extra["exptime"], serde_json::json!(30.0));
    }
}
