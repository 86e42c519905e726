//! Kowalski client: alert packets and per-object histories.
//!
//! Auth: `POST /api/auth` with username/password returns a token, sent as
//! `Authorization: Bearer <TOKEN>` on every query.
//! Queries: `POST /api/queries` with `{query_type, query}`; the result is
//! the `data` member of the response envelope.

use std::cell::RefCell;
use std::time::Duration;

use serde_json::{json, Value};

use crate::error::{check_status, success_data, ClientError};

/// Real-time alert packets, keyed by `objectId`.
pub const ALERTS_CATALOG: &str = "ZTF_alerts";
/// Per-object auxiliary histories, keyed by `_id` = object id.
pub const ALERTS_AUX_CATALOG: &str = "ZTF_alerts_aux";

#[derive(Debug, Clone)]
pub struct KowalskiCredentials {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl KowalskiCredentials {
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.host, self.port)
    }
}

pub struct KowalskiClient {
    http: reqwest::blocking::Client,
    base_url: String,
    username: String,
    password: String,
    token: RefCell<Option<String>>,
}

impl KowalskiClient {
    pub fn new(creds: &KowalskiCredentials) -> Result<Self, ClientError> {
        Self::with_base_url(creds, creds.base_url())
    }

    pub fn with_base_url(creds: &KowalskiCredentials, base_url: String) -> Result<Self, ClientError> {
        if creds.username.is_empty() || creds.password.is_empty() {
            return Err(ClientError::NotAuthenticated("Kowalski".into()));
        }
        let http = reqwest::blocking::Client::builder()
            .user_agent(crate::user_agent())
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            username: creds.username.clone(),
            password: creds.password.clone(),
            token: RefCell::new(None),
        })
    }

    /// Alert packets for an object (each `{"candidate": {...}}`).
    pub fn alerts(&self, obj_id: &str) -> Result<Vec<Value>, ClientError> {
        let data = self.query(json!({
            "query_type": "find",
            "query": {
                "catalog": ALERTS_CATALOG,
                "filter": {"objectId": obj_id},
                "projection": {"_id": 0, "candidate": 1},
            }
        }))?;
        match data {
            Value::Array(items) => Ok(items),
            Value::Null => Ok(Vec::new()),
            other => Err(ClientError::Parse(format!("expected alert array, found {other}"))),
        }
    }

    /// Previous-candidate history. `None` when the object has no
    /// auxiliary record.
    pub fn prv_candidates(&self, obj_id: &str) -> Result<Option<Value>, ClientError> {
        self.aux_field(obj_id, "prv_candidates")
    }

    /// 30-day forced-photometry history. `None` when the object has no
    /// auxiliary record or is older than the forced-photometry window.
    pub fn forced_history(&self, obj_id: &str) -> Result<Option<Value>, ClientError> {
        self.aux_field(obj_id, "fp_hists")
    }

    /// One full alert packet including its cutout stamps.
    pub fn latest_alert(&self, obj_id: &str) -> Result<Option<Value>, ClientError> {
        let data = self.query(json!({
            "query_type": "find_one",
            "query": {
                "catalog": ALERTS_CATALOG,
                "filter": {"objectId": obj_id},
            }
        }))?;
        Ok(match data {
            Value::Null => None,
            Value::Object(ref map) if map.is_empty() => None,
            other => Some(other),
        })
    }

    fn aux_field(&self, obj_id: &str, field: &str) -> Result<Option<Value>, ClientError> {
        let mut projection = serde_json::Map::new();
        projection.insert("_id".into(), json!(0));
        projection.insert(field.into(), json!(1));
        let data = self.query(json!({
            "query_type": "find",
            "query": {
                "catalog": ALERTS_AUX_CATALOG,
                "filter": {"_id": {"$eq": obj_id}},
                "projection": projection,
            }
        }))?;

        let first = match data {
            Value::Array(mut items) if !items.is_empty() => items.swap_remove(0),
            _ => {
                log::debug!("{obj_id}: no {ALERTS_AUX_CATALOG} record");
                return Ok(None);
            }
        };
        Ok(match first.get(field) {
            None | Some(Value::Null) => None,
            Some(v) => Some(v.clone()),
        })
    }

    // ── Transport ──────────────────────────────────────────────────

    fn query(&self, body: Value) -> Result<Value, ClientError> {
        let token = self.token()?;
        let url = format!("{}/api/queries", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let body: Value = check_status(response)?
            .json()
            .map_err(|e| ClientError::Parse(e.to_string()))?;
        success_data(body)
    }

    /// Cached token, authenticating on first use.
    fn token(&self) -> Result<String, ClientError> {
        if let Some(token) = self.token.borrow().as_ref() {
            return Ok(token.clone());
        }

        let url = format!("{}/api/auth", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&json!({"username": self.username, "password": self.password}))
            .send()
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let body: Value = check_status(response)?
            .json()
            .map_err(|e| ClientError::Parse(e.to_string()))?;
        let token = match (body["status"].as_str(), body["token"].as_str()) {
            (Some("success"), Some(token)) => token.to_string(),
            _ => {
                let message = body["message"].as_str().unwrap_or("no token in auth response");
                return Err(ClientError::AuthRejected(message.to_string()));
            }
        };

        log::debug!("authenticated with Kowalski as {}", self.username);
        *self.token.borrow_mut() = Some(token.clone());
        Ok(token)
    }
}
