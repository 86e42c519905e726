//! Decode broker JSON into typed source records.
//!
//! Every record must carry a numeric `jd`; a record without one cannot be
//! joined and is reported as [`PhotometryError::MissingJoinKey`] instead of
//! being dropped.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::aggregate::JdRecord;
use crate::error::PhotometryError;
use crate::model::{AlertCandidate, ForcedPhotometry, PhotometryInput, PrvCandidate, Source};

/// Decode a list of JSON objects into records of one source schema.
pub fn parse_records<R>(values: &[Value]) -> Result<Vec<R>, PhotometryError>
where
    R: JdRecord + DeserializeOwned,
{
    values
        .iter()
        .enumerate()
        .map(|(index, value)| parse_record::<R>(R::SOURCE, index, value))
        .collect()
}

fn parse_record<R: DeserializeOwned>(source: Source, index: usize, value: &Value) -> Result<R, PhotometryError> {
    let obj = value.as_object().ok_or_else(|| PhotometryError::Decode {
        source,
        index,
        message: format!("expected an object, found {}", json_kind(value)),
    })?;

    match obj.get("jd") {
        None | Some(Value::Null) => return Err(PhotometryError::MissingJoinKey { source, index }),
        Some(Value::Number(_)) => {}
        Some(other) => {
            return Err(PhotometryError::Decode {
                source,
                index,
                message: format!("'jd' must be a number, found {}", json_kind(other)),
            })
        }
    }

    serde_json::from_value(value.clone()).map_err(|e| PhotometryError::Decode {
        source,
        index,
        message: e.to_string(),
    })
}

/// Decode alert packets (`{"objectId": ..., "candidate": {...}}`), keeping
/// the candidate block of each. Bare candidate objects are accepted too.
pub fn parse_alert_packets(values: &[Value]) -> Result<Vec<AlertCandidate>, PhotometryError> {
    let candidates: Vec<Value> = values
        .iter()
        .map(|v| v.get("candidate").cloned().unwrap_or_else(|| v.clone()))
        .collect();
    parse_records(&candidates)
}

/// Decode an optional history list. `null` or a missing document means the
/// source is absent, which is not an error.
pub fn parse_optional<R>(value: Option<&Value>) -> Result<Option<Vec<R>>, PhotometryError>
where
    R: JdRecord + DeserializeOwned,
{
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => parse_records(items).map(Some),
        Some(other) => Err(PhotometryError::Decode {
            source: R::SOURCE,
            index: 0,
            message: format!("expected an array, found {}", json_kind(other)),
        }),
    }
}

/// Build a reconciliation input from raw broker documents.
pub fn build_input(
    object_id: &str,
    alerts: &[Value],
    forced: Option<&Value>,
    prv: Option<&Value>,
) -> Result<PhotometryInput, PhotometryError> {
    Ok(PhotometryInput {
        object_id: object_id.to_string(),
        alerts: parse_alert_packets(alerts)?,
        forced: parse_optional::<ForcedPhotometry>(forced)?,
        prv: parse_optional::<PrvCandidate>(prv)?,
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_alert_packet_candidate() {
        let packets = vec![json!({
            "objectId": "ZTF21abcdefg",
            "candid": 1234,
            "candidate": {
                "jd": 2459300.75,
                "fid": 2,
                "ra": 150.0,
                "dec": 2.0,
                "magpsf": 18.2,
                "sigmapsf": 0.08,
                "rb": 0.93
            }
        })];
        let alerts = parse_alert_packets(&packets).unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].fid, Some(2));
        assert_eq!(alerts[0].magpsf, Some(18.2));
        assert_eq!(alerts[0].extra["rb"], json!(0.93));
    }

    #[test]
    fn integer_jd_is_accepted() {
        let recs: Vec<ForcedPhotometry> =
            parse_records(&[json!({"jd": 2459300, "limmag5sig": 20.1, "snr": null})]).unwrap();
        assert_eq!(recs[0].jd, 2459300.0);
        assert_eq!(recs[0].snr, None);
    }

    #[test]
    fn missing_jd_is_a_typed_error() {
        let err = parse_records::<PrvCandidate>(&[json!({"jd": 1.0}), json!({"fid": 1})]).unwrap_err();
        match err {
            PhotometryError::MissingJoinKey { source, index } => {
                assert_eq!(source, Source::PrvCandidates);
                assert_eq!(index, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn null_jd_is_missing() {
        let err = parse_records::<ForcedPhotometry>(&[json!({"jd": null})]).unwrap_err();
        assert!(matches!(err, PhotometryError::MissingJoinKey { .. }));
    }

    #[test]
    fn string_jd_is_a_decode_error() {
        let err = parse_records::<ForcedPhotometry>(&[json!({"jd": "2459300.5"})]).unwrap_err();
        assert!(err.to_string().contains("must be a number"));
    }

    #[test]
    fn optional_absent_and_null() {
        assert!(parse_optional::<ForcedPhotometry>(None).unwrap().is_none());
        assert!(parse_optional::<ForcedPhotometry>(Some(&Value::Null)).unwrap().is_none());
        let some = parse_optional::<ForcedPhotometry>(Some(&json!([]))).unwrap();
        assert_eq!(some.map(|v| v.len()), Some(0));
    }

    #[test]
    fn build_input_wires_all_sources() {
        let alerts = vec![json!({"candidate": {"jd": 10.0, "magpsf": 18.0}})];
        let forced = json!([{"jd": 5.0, "limmag5sig": 20.0}]);
        let input = build_input("ZTF21x", &alerts, Some(&forced), None).unwrap();
        assert_eq!(input.object_id, "ZTF21x");
        assert_eq!(input.alerts.len(), 1);
        assert_eq!(input.forced.as_ref().map(|f| f.len()), Some(1));
        assert!(input.prv.is_none());
    }
}
