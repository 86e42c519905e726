use std::collections::{BTreeMap, BTreeSet};

use crate::aggregate::{collapse_by_jd, JdKey};
use crate::config::ReconcileConfig;
use crate::error::PhotometryError;
use crate::model::{
    AlertCandidate, ForcedPhotometry, LightCurve, LightCurveRow, MergeReport, PhotometryInput,
    PrvCandidate,
};
use crate::policy::{Column, PolicyTable};

/// A row between stages. `is_alert` stays optional until finalize so the
/// policy table, not insertion order, decides provenance.
#[derive(Debug, Clone, Default)]
struct StageRow {
    fid: Option<i64>,
    is_alert: Option<bool>,
    mag_final: Option<f64>,
    emag_final: Option<f64>,
    maglim: Option<f64>,
}

type Stage = BTreeMap<JdKey, StageRow>;

/// Merge alerts, forced history and previous candidates into one light curve.
///
/// The alert stream anchors the curve: with no alerts the result is empty
/// even when the histories have data.
pub fn reconcile(config: &ReconcileConfig, input: &PhotometryInput) -> Result<LightCurve, PhotometryError> {
    config.validate()?;

    if input.alerts.is_empty() {
        log::info!("{}: no alert detections, light curve is empty", input.object_id);
        return Ok(LightCurve::empty(&input.object_id));
    }

    let alerts = collapse_by_jd(&input.alerts)?;
    let mut report = MergeReport {
        alert_epochs: alerts.len(),
        ..MergeReport::default()
    };

    let stage_one = match input.forced.as_deref() {
        Some(forced) if has_limit_column(forced) => {
            let forced = collapse_by_jd(forced)?;
            report.forced_joined = true;
            report.forced_epochs = forced.len();
            let (stage, dropped) = join_forced(&alerts, &forced, config.snr_threshold);
            report.dropped_rows += dropped;
            stage
        }
        Some(forced) if !forced.is_empty() => {
            log::debug!(
                "{}: forced history has no limmag5sig, skipping join",
                input.object_id
            );
            alerts_only(&alerts)
        }
        _ => alerts_only(&alerts),
    };

    let stage_two = match input.prv.as_deref() {
        Some(prv) if !prv.is_empty() => {
            let prv = collapse_by_jd(prv)?;
            report.prv_joined = true;
            report.prv_epochs = prv.len();
            join_prv(&stage_one, &prv, &PolicyTable::with_prv_candidates(config.limit_preference))
        }
        _ => stage_one,
    };

    let (rows, dropped) = finalize(stage_two);
    report.dropped_rows += dropped;

    log::debug!(
        "{}: {} rows (forced joined: {}, prv joined: {}, dropped: {})",
        input.object_id,
        rows.len(),
        report.forced_joined,
        report.prv_joined,
        report.dropped_rows
    );

    Ok(LightCurve {
        object_id: input.object_id.clone(),
        rows,
        report,
    })
}

/// The forced history is usable for limits only if it reports a 5-sigma
/// limiting magnitude somewhere.
fn has_limit_column(forced: &[ForcedPhotometry]) -> bool {
    forced.iter().any(|f| f.limmag5sig.is_some())
}

fn has_mag_column(forced: &BTreeMap<JdKey, ForcedPhotometry>) -> bool {
    forced.values().any(|f| f.mag.is_some())
}

fn alert_row(alert: &AlertCandidate) -> StageRow {
    StageRow {
        fid: alert.fid,
        is_alert: Some(true),
        mag_final: alert.magpsf,
        emag_final: alert.sigmapsf,
        maglim: None,
    }
}

fn alerts_only(alerts: &BTreeMap<JdKey, AlertCandidate>) -> Stage {
    alerts.iter().map(|(jd, a)| (*jd, alert_row(a))).collect()
}

fn union_keys<A, B>(left: &BTreeMap<JdKey, A>, right: &BTreeMap<JdKey, B>) -> BTreeSet<JdKey> {
    left.keys().chain(right.keys()).copied().collect()
}

/// Stage 1: alerts ⋈ forced history.
///
/// Magnitudes default to the alert PSF fit and switch to forced photometry
/// where the forced SNR exceeds the threshold. The limit is the forced
/// 5-sigma limit. Rows with neither magnitude nor limit are dropped.
fn join_forced(
    alerts: &BTreeMap<JdKey, AlertCandidate>,
    forced: &BTreeMap<JdKey, ForcedPhotometry>,
    snr_threshold: f64,
) -> (Stage, usize) {
    let table = PolicyTable::alerts_forced();
    let use_forced_mag = has_mag_column(forced);
    let mut stage = Stage::new();
    let mut dropped = 0;

    for jd in union_keys(alerts, forced) {
        let a = alerts.get(&jd);
        let f = forced.get(&jd);

        let significant = f
            .and_then(|f| f.snr)
            .map_or(false, |snr| snr > snr_threshold);

        let mut mag_final = a.and_then(|a| a.magpsf);
        let mut emag_final = a.and_then(|a| a.sigmapsf);
        if significant && use_forced_mag {
            if let Some(f) = f.filter(|f| f.mag.is_some()) {
                mag_final = f.mag;
                emag_final = f.magerr;
            }
        }

        let maglim = f.and_then(|f| f.limmag5sig);
        if mag_final.is_none() && maglim.is_none() {
            dropped += 1;
            continue;
        }

        stage.insert(
            jd,
            StageRow {
                fid: table.resolve(Column::Fid, a.and_then(|a| a.fid), f.and_then(|f| f.fid)),
                is_alert: table.resolve(
                    Column::IsAlert,
                    a.map(|_| true),
                    f.map(|_| false),
                ),
                mag_final,
                emag_final,
                maglim,
            },
        );
    }

    (stage, dropped)
}

/// Stage 2: stage-1 result ⋈ previous candidates. Every column resolves
/// through the policy table.
fn join_prv(stage: &Stage, prv: &BTreeMap<JdKey, PrvCandidate>, table: &PolicyTable) -> Stage {
    union_keys(stage, prv)
        .into_iter()
        .map(|jd| {
            let s = stage.get(&jd);
            let p = prv.get(&jd);
            let row = StageRow {
                fid: table.resolve(Column::Fid, s.and_then(|s| s.fid), p.and_then(|p| p.fid)),
                is_alert: table.resolve(
                    Column::IsAlert,
                    s.and_then(|s| s.is_alert),
                    p.map(|_| false),
                ),
                mag_final: table.resolve(
                    Column::MagFinal,
                    s.and_then(|s| s.mag_final),
                    p.and_then(|p| p.magpsf),
                ),
                emag_final: table.resolve(
                    Column::EmagFinal,
                    s.and_then(|s| s.emag_final),
                    p.and_then(|p| p.sigmapsf),
                ),
                maglim: table.resolve(
                    Column::Maglim,
                    s.and_then(|s| s.maglim),
                    p.and_then(|p| p.diffmaglim),
                ),
            };
            (jd, row)
        })
        .collect()
}

/// Stage 3: detection flag, discard rows without photometry, JD order.
fn finalize(stage: Stage) -> (Vec<LightCurveRow>, usize) {
    let mut dropped = 0;
    let rows = stage
        .into_iter()
        .filter_map(|(jd, row)| {
            if row.mag_final.is_none() && row.maglim.is_none() {
                dropped += 1;
                return None;
            }
            let is_alert = row.is_alert.unwrap_or(false);
            Some(LightCurveRow {
                jd: jd.0,
                fid: row.fid,
                is_alert,
                mag_final: row.mag_final,
                emag_final: row.emag_final,
                maglim: row.maglim,
                is_detection: is_alert || row.mag_final.is_some(),
            })
        })
        .collect();
    (rows, dropped)
}
