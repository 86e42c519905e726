use std::path::PathBuf;

use serde_json::Value;
use transient_photometry::config::{HistoryInclusion, LimitPreference, ReconcileConfig};
use transient_photometry::loader::build_input;
use transient_photometry::model::{LightCurve, PhotometryInput};
use transient_photometry::{estimate_position, reconcile, PhotometryError};

const OBJ: &str = "ZTF21aagppzg";

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load_json(name: &str) -> Value {
    let path = fixtures_dir().join(name);
    let text = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()));
    serde_json::from_str(&text).unwrap()
}

fn fixture_input(with_forced: bool, with_prv: bool) -> PhotometryInput {
    let alerts = load_json(&format!("{OBJ}_alerts.json"));
    let forced = with_forced.then(|| load_json(&format!("{OBJ}_forced.json")));
    let prv = with_prv.then(|| load_json(&format!("{OBJ}_prv.json")));
    build_input(
        OBJ,
        alerts.as_array().unwrap(),
        forced.as_ref(),
        prv.as_ref(),
    )
    .unwrap()
}

fn run(config: &ReconcileConfig, with_forced: bool, with_prv: bool) -> LightCurve {
    reconcile(config, &fixture_input(with_forced, with_prv)).unwrap()
}

fn row_at(lc: &LightCurve, jd: f64) -> &transient_photometry::LightCurveRow {
    lc.rows
        .iter()
        .find(|r| r.jd == jd)
        .unwrap_or_else(|| panic!("no row at jd {jd}"))
}

// -------------------------------------------------------------------------
// Full three-source merge
// -------------------------------------------------------------------------

#[test]
fn full_merge_rows_and_report() {
    let lc = run(&ReconcileConfig::default(), true, true);

    let jds: Vec<f64> = lc.rows.iter().map(|r| r.jd).collect();
    assert_eq!(
        jds,
        vec![2459285.70, 2459290.70, 2459298.70, 2459300.70, 2459302.80, 2459305.75]
    );

    assert_eq!(lc.report.alert_epochs, 3);
    assert!(lc.report.forced_joined);
    assert_eq!(lc.report.forced_epochs, 4);
    assert!(lc.report.prv_joined);
    assert_eq!(lc.report.prv_epochs, 4);
    // forced epoch with neither magnitude nor limit
    assert_eq!(lc.report.dropped_rows, 1);

    assert_eq!(lc.detections().count(), 4);
    assert_eq!(lc.upper_limits().count(), 2);
}

#[test]
fn significant_forced_photometry_overrides_alert() {
    let lc = run(&ReconcileConfig::default(), true, true);
    let row = row_at(&lc, 2459300.70);
    assert!(row.is_alert);
    assert!(row.is_detection);
    assert_eq!(row.mag_final, Some(18.45));
    assert_eq!(row.emag_final, Some(0.03));
    assert_eq!(row.maglim, Some(20.9));
}

#[test]
fn weak_forced_photometry_keeps_alert_magnitude() {
    let lc = run(&ReconcileConfig::default(), true, true);
    let row = row_at(&lc, 2459302.80);
    assert_eq!(row.fid, Some(2));
    assert_eq!(row.mag_final, Some(18.20));
    assert_eq!(row.emag_final, Some(0.04));
    assert_eq!(row.maglim, Some(20.7));
}

#[test]
fn history_only_epochs() {
    let lc = run(&ReconcileConfig::default(), true, true);

    let limit = row_at(&lc, 2459285.70);
    assert!(!limit.is_alert);
    assert!(!limit.is_detection);
    assert_eq!(limit.maglim, Some(20.3));

    // forced 5-sigma limit wins over the difference-image limit
    let both = row_at(&lc, 2459290.70);
    assert_eq!(both.maglim, Some(20.8));
    assert!(!both.is_detection);

    let prv_detection = row_at(&lc, 2459298.70);
    assert!(!prv_detection.is_alert);
    assert!(prv_detection.is_detection);
    assert_eq!(prv_detection.mag_final, Some(19.2));
    assert_eq!(prv_detection.maglim, Some(20.4));

    let last = row_at(&lc, 2459305.75);
    assert!(last.is_alert);
    assert_eq!(last.maglim, None);
}

#[test]
fn diff_image_preference_swaps_limits() {
    let config = ReconcileConfig {
        limit_preference: LimitPreference::DiffImage,
        ..ReconcileConfig::default()
    };
    let lc = run(&config, true, true);
    assert_eq!(row_at(&lc, 2459290.70).maglim, Some(20.1));
    assert_eq!(row_at(&lc, 2459300.70).maglim, Some(20.6));
    // magnitudes are unaffected
    assert_eq!(row_at(&lc, 2459300.70).mag_final, Some(18.45));
}

#[test]
fn deepest_preference_takes_larger_limit() {
    let config = ReconcileConfig {
        limit_preference: LimitPreference::Deepest,
        ..ReconcileConfig::default()
    };
    let lc = run(&config, true, true);
    assert_eq!(row_at(&lc, 2459290.70).maglim, Some(20.8));
    assert_eq!(row_at(&lc, 2459300.70).maglim, Some(20.9));
}

#[test]
fn higher_threshold_disables_override() {
    let config = ReconcileConfig {
        snr_threshold: 30.0,
        ..ReconcileConfig::default()
    };
    let lc = run(&config, true, false);
    assert_eq!(row_at(&lc, 2459300.70).mag_final, Some(18.50));
}

// -------------------------------------------------------------------------
// Partial inputs
// -------------------------------------------------------------------------

#[test]
fn alerts_only() {
    let lc = run(&ReconcileConfig::default(), false, false);
    assert_eq!(lc.rows.len(), 3);
    assert!(lc.rows.iter().all(|r| r.is_alert && r.is_detection));
    assert!(lc.rows.iter().all(|r| r.maglim.is_none()));
    assert!(!lc.report.forced_joined);
    assert!(!lc.report.prv_joined);
}

#[test]
fn forced_without_prv() {
    let lc = run(&ReconcileConfig::default(), true, false);
    let jds: Vec<f64> = lc.rows.iter().map(|r| r.jd).collect();
    assert_eq!(jds, vec![2459290.70, 2459300.70, 2459302.80, 2459305.75]);
}

#[test]
fn prv_without_forced() {
    let lc = run(&ReconcileConfig::default(), false, true);
    assert_eq!(lc.rows.len(), 6);
    assert_eq!(row_at(&lc, 2459290.70).maglim, Some(20.1));
    // no forced limit, so the difference-image limit fills in
    assert_eq!(row_at(&lc, 2459300.70).maglim, Some(20.6));
    assert_eq!(row_at(&lc, 2459300.70).mag_final, Some(18.50));
}

#[test]
fn histories_without_alerts_give_empty_curve() {
    let forced = load_json(&format!("{OBJ}_forced.json"));
    let prv = load_json(&format!("{OBJ}_prv.json"));
    let input = build_input(OBJ, &[], Some(&forced), Some(&prv)).unwrap();
    let lc = reconcile(&ReconcileConfig::default(), &input).unwrap();
    assert!(lc.is_empty());
    assert_eq!(lc.object_id, OBJ);
}

#[test]
fn missing_jd_in_history_is_reported() {
    let alerts = load_json(&format!("{OBJ}_alerts.json"));
    let prv = serde_json::json!([{"fid": 1, "diffmaglim": 20.0}]);
    let err = build_input(OBJ, alerts.as_array().unwrap(), None, Some(&prv)).unwrap_err();
    assert!(matches!(err, PhotometryError::MissingJoinKey { index: 0, .. }));
}

// -------------------------------------------------------------------------
// Output shape
// -------------------------------------------------------------------------

#[test]
fn json_rows_carry_every_column() {
    let lc = run(&ReconcileConfig::default(), true, true);
    let json = serde_json::to_value(&lc).unwrap();
    let first = &json["rows"][0];
    for key in ["jd", "fid", "is_alert", "mag_final", "emag_final", "maglim", "is_detection"] {
        assert!(first.get(key).is_some(), "missing {key}");
    }
    assert_eq!(json["object_id"], OBJ);
}

// -------------------------------------------------------------------------
// Position
// -------------------------------------------------------------------------

#[test]
fn position_from_fixture_alerts() {
    let input = fixture_input(false, true);
    let pos = estimate_position(
        &input.alerts,
        input.prv.as_deref(),
        HistoryInclusion::default(),
    )
    .unwrap();
    assert!((pos.ra - 150.00010).abs() < 1e-9);
    assert!((pos.dec - 2.20010).abs() < 1e-9);
    assert_eq!(pos.alert_points, 3);
    // history records are short, none pass the field-count rule
    assert_eq!(pos.history_points, 0);
    assert!(pos.scatter_arcsec > 0.0 && pos.scatter_arcsec < 1.0);
}

#[test]
fn position_with_coordinate_rule_adds_history() {
    let input = fixture_input(false, true);
    let pos = estimate_position(
        &input.alerts,
        input.prv.as_deref(),
        HistoryInclusion::HasCoordinates,
    )
    .unwrap();
    assert_eq!(pos.history_points, 2);
    assert!((pos.ra - 150.00010).abs() < 1e-9);
}
