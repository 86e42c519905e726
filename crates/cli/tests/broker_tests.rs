// Integration tests for `tlc` commands that talk to Fritz and Kowalski,
// against local mock servers.
// Run with: cargo test -p transient-cli --test broker_tests -- --nocapture

use std::path::Path;
use std::process::{Command, Output};

use httpmock::prelude::*;
use serde_json::{json, Value};

const OBJ: &str = "ZTF21aagppzg";

fn tlc() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_tlc"));
    cmd.current_dir(env!("CARGO_MANIFEST_DIR"))
        .env_remove("TLC_CONFIG")
        .env_remove("FRITZ_API_TOKEN")
        .env_remove("KOWALSKI_USERNAME")
        .env_remove("KOWALSKI_PASSWORD")
        .env("RUST_LOG", "warn");
    cmd
}

fn load_fixture(name: &str) -> Value {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name);
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

/// Settings pointing both brokers at `server` and the catalog into `dir`.
fn settings_for(server: &MockServer, dir: &Path) -> String {
    let path = dir.join("settings.toml");
    let body = format!(
        r#"[fritz]
base_url = "{base}"
token = "fritz_test_token"
per_page = 2

[kowalski]
protocol = "http"
host = "{host}"
port = {port}
username = "astro"
password = "secret"

[store]
database = {db:?}
"#,
        base = server.base_url(),
        host = server.host(),
        port = server.port(),
        db = dir.join("catalog.db"),
    );
    std::fs::write(&path, body).unwrap();
    path.to_string_lossy().into_owned()
}

fn stdout_json(output: &Output) -> Value {
    assert!(
        output.status.success(),
        "exit code was {:?}, stderr: {}",
        output.status,
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("valid JSON on stdout")
}

// ---------------------------------------------------------------------------
// Kowalski: lc / position
// ---------------------------------------------------------------------------

fn mock_kowalski_auth(server: &MockServer) -> httpmock::Mock<'_> {
    server.mock(|when, then| {
        when.method(POST).path("/api/auth");
        then.status(200)
            .json_body(json!({"status": "success", "token": "kw_token"}));
    })
}

/// Every Kowalski query answers with `data`. Alert queries read the
/// packets' `candidate` blocks and history queries read the named field of
/// the first record, so one response can serve both.
fn mock_queries(server: &MockServer, data: Value) -> httpmock::Mock<'_> {
    server.mock(|when, then| {
        when.method(POST)
            .path("/api/queries")
            .header("Authorization", "Bearer kw_token");
        then.status(200).json_body(json!({"status": "success", "data": data}));
    })
}

fn packets_with_histories() -> Value {
    let mut packets = load_fixture("ZTF21aagppzg_alerts.json");
    packets[0]["fp_hists"] = load_fixture("ZTF21aagppzg_forced.json");
    packets[0]["prv_candidates"] = load_fixture("ZTF21aagppzg_prv.json");
    packets
}

#[test]
fn lc_fetches_and_reconciles() {
    let server = MockServer::start();
    let dir = tempfile::tempdir().unwrap();
    let auth = mock_kowalski_auth(&server);
    let queries = mock_queries(&server, packets_with_histories());

    let output = tlc()
        .args(["--config", &settings_for(&server, dir.path()), "lc", OBJ, "--json"])
        .output()
        .unwrap();

    let lc = stdout_json(&output);
    assert_eq!(lc["object_id"], OBJ);
    assert_eq!(lc["rows"].as_array().unwrap().len(), 6);
    assert_eq!(lc["report"]["forced_joined"], true);
    assert_eq!(lc["report"]["prv_joined"], true);
    auth.assert_calls(1);
    // alerts, forced history, previous candidates
    queries.assert_calls(3);
}

#[test]
fn lc_skips_histories_on_request() {
    let server = MockServer::start();
    let dir = tempfile::tempdir().unwrap();
    mock_kowalski_auth(&server);
    let queries = mock_queries(&server, packets_with_histories());

    let output = tlc()
        .args(["--config", &settings_for(&server, dir.path()), "lc", OBJ, "--json"])
        .args(["--no-forced", "--no-prv"])
        .output()
        .unwrap();

    let lc = stdout_json(&output);
    assert_eq!(lc["rows"].as_array().unwrap().len(), 3);
    assert_eq!(lc["report"]["forced_joined"], false);
    queries.assert_calls(1);
}

#[test]
fn lc_degrades_when_forced_history_fails() {
    let server = MockServer::start();
    let dir = tempfile::tempdir().unwrap();
    mock_kowalski_auth(&server);
    let failing = server.mock(|when, then| {
        when.method(POST).path("/api/queries").body_includes("fp_hists");
        then.status(500).body("boom");
    });
    let queries = server.mock(|when, then| {
        when.method(POST)
            .path("/api/queries")
            .header("Authorization", "Bearer kw_token")
            .body_excludes("fp_hists");
        then.status(200)
            .json_body(json!({"status": "success", "data": packets_with_histories()}));
    });

    let output = tlc()
        .args(["--config", &settings_for(&server, dir.path()), "lc", OBJ, "--json"])
        .output()
        .unwrap();

    let lc = stdout_json(&output);
    assert_eq!(lc["report"]["forced_joined"], false);
    assert_eq!(lc["report"]["prv_joined"], true);
    assert!(!lc["rows"].as_array().unwrap().is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("forced history unavailable"));
    failing.assert_calls(1);
    queries.assert_calls(2);
}

#[test]
fn position_fetches_alerts_and_history() {
    let server = MockServer::start();
    let dir = tempfile::tempdir().unwrap();
    mock_kowalski_auth(&server);
    let queries = mock_queries(&server, packets_with_histories());

    let output = tlc()
        .args(["--config", &settings_for(&server, dir.path()), "position", OBJ, "--json"])
        .args(["--history", "coordinates"])
        .output()
        .unwrap();

    let pos = stdout_json(&output);
    assert_eq!(pos["alert_points"], 3);
    assert_eq!(pos["history_points"], 2);
    queries.assert_calls(2);
}

#[test]
fn rejected_kowalski_login_is_auth_error() {
    let server = MockServer::start();
    let dir = tempfile::tempdir().unwrap();
    server.mock(|when, then| {
        when.method(POST).path("/api/auth");
        then.status(401)
            .json_body(json!({"status": "error", "message": "wrong credentials"}));
    });

    let output = tlc()
        .args(["--config", &settings_for(&server, dir.path()), "position", OBJ])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(50));
}

#[test]
fn triplet_for_object_without_alerts_is_not_found() {
    let server = MockServer::start();
    let dir = tempfile::tempdir().unwrap();
    mock_kowalski_auth(&server);
    mock_queries(&server, Value::Null);

    let output = tlc()
        .args(["--config", &settings_for(&server, dir.path()), "triplet", OBJ])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(54));
}

// ---------------------------------------------------------------------------
// Fritz: ingest / sources / series
// ---------------------------------------------------------------------------

fn source_json(id: &str, ra: f64) -> Value {
    json!({"id": id, "ra": ra, "dec": 1.5, "redshift": 0.04})
}

fn mock_page<'a>(server: &'a MockServer, page: &str, sources: Value) -> httpmock::Mock<'a> {
    server.mock(|when, then| {
        when.method(GET)
            .path("/sources")
            .query_param("numPerPage", "2")
            .query_param("pageNumber", page)
            .header("Authorization", "token fritz_test_token");
        then.status(200)
            .json_body(json!({"status": "success", "data": {"sources": sources}}));
    })
}

fn mock_photometry<'a>(server: &'a MockServer, obj_id: &str, data: Value) -> httpmock::Mock<'a> {
    let path = format!("/sources/{obj_id}/photometry");
    server.mock(|when, then| {
        when.method(GET).path(path.as_str());
        then.status(200).json_body(json!({"status": "success", "data": data}));
    })
}

#[test]
fn ingest_advances_cursor_and_skips_known_sources() {
    let server = MockServer::start();
    let dir = tempfile::tempdir().unwrap();
    let settings = settings_for(&server, dir.path());

    let page1 = mock_page(
        &server,
        "1",
        json!([source_json("ZTF21aaaaaaa", 150.1), source_json("ZTF21bbbbbbb", 151.2)]),
    );
    let page2 = mock_page(
        &server,
        "2",
        json!([source_json("ZTF21bbbbbbb", 151.2), source_json("ZTF21ccccccc", 152.3)]),
    );
    mock_photometry(
        &server,
        "ZTF21aaaaaaa",
        json!([
            {"mjd": 59300.2, "mag": 18.4, "magerr": 0.05, "filter": "ztfg", "limiting_mag": 20.6},
            {"mjd": 59301.2, "mag": null, "magerr": null, "filter": "ztfr", "limiting_mag": 20.9}
        ]),
    );
    mock_photometry(&server, "ZTF21bbbbbbb", json!([]));
    server.mock(|when, then| {
        when.method(GET).path("/sources/ZTF21ccccccc/photometry");
        then.status(500).body("database unavailable");
    });

    let first = stdout_json(&tlc().args(["--config", &settings, "ingest", "--json"]).output().unwrap());
    assert_eq!(first["page"], 1);
    assert_eq!(first["inserted"], 2);
    assert_eq!(first["photometry_points"], 2);

    let second = stdout_json(&tlc().args(["--config", &settings, "ingest", "--json"]).output().unwrap());
    assert_eq!(second["page"], 2);
    assert_eq!(second["inserted"], 1);
    assert_eq!(second["skipped"], 1);
    assert_eq!(second["failures"][0]["obj_id"], "ZTF21ccccccc");

    page1.assert_calls(1);
    page2.assert_calls(1);

    let sources = stdout_json(
        &tlc()
            .args(["--config", &settings, "sources", "--json"])
            .output()
            .unwrap(),
    );
    let ids: Vec<&str> = sources
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, ["ZTF21ccccccc", "ZTF21bbbbbbb", "ZTF21aaaaaaa"]);

    let series = stdout_json(
        &tlc()
            .args(["--config", &settings, "series", "ZTF21aaaaaaa", "--json"])
            .output()
            .unwrap(),
    );
    assert_eq!(series["ztfg"]["detections"].as_array().unwrap().len(), 1);
    assert_eq!(series["ztfr"]["upper_limits"].as_array().unwrap().len(), 1);
}

#[test]
fn ingest_explicit_page() {
    let server = MockServer::start();
    let dir = tempfile::tempdir().unwrap();
    let settings = settings_for(&server, dir.path());
    let page = mock_page(&server, "7", json!([]));

    let report = stdout_json(
        &tlc()
            .args(["--config", &settings, "ingest", "--page", "7", "--json"])
            .output()
            .unwrap(),
    );
    assert_eq!(report["page"], 7);
    page.assert();
}

#[test]
fn ingest_listing_failure_keeps_cursor() {
    let server = MockServer::start();
    let dir = tempfile::tempdir().unwrap();
    let settings = settings_for(&server, dir.path());
    server.mock(|when, then| {
        when.method(GET).path("/sources").query_param("pageNumber", "1");
        then.status(200)
            .json_body(json!({"status": "error", "message": "Invalid page number"}));
    });

    let output = tlc().args(["--config", &settings, "ingest"]).output().unwrap();
    assert_eq!(output.status.code(), Some(52));

    // still asks for page 1 next time
    let output = tlc().args(["--config", &settings, "ingest"]).output().unwrap();
    assert_eq!(output.status.code(), Some(52));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Invalid page number"));
}

#[test]
fn series_of_unknown_source_fails() {
    let server = MockServer::start();
    let dir = tempfile::tempdir().unwrap();
    let output = tlc()
        .args(["--config", &settings_for(&server, dir.path()), "series", "ZTF99zzzzzzz"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(12));
}
