//! Fritz (SkyPortal) client: paged source listing and per-source photometry.
//!
//! Auth: `Authorization: token <TOKEN>`
//! Responses: `{"status": "success", "data": ...}`

use std::time::Duration;

use transient_photometry::model::{PageCursor, PhotometryPoint, SourceRecord};

use crate::error::{check_status, success_data, ClientError};

pub const FRITZ_API_BASE: &str = "https://fritz.science/api";

#[derive(Clone)]
pub struct FritzClient {
    http: reqwest::blocking::Client,
    base_url: String,
    token: String,
}

impl FritzClient {
    pub fn new(token: String) -> Result<Self, ClientError> {
        Self::with_base_url(token, FRITZ_API_BASE.to_string())
    }

    pub fn with_base_url(token: String, base_url: String) -> Result<Self, ClientError> {
        if token.trim().is_empty() {
            return Err(ClientError::NotAuthenticated("Fritz".into()));
        }
        let http = reqwest::blocking::Client::builder()
            .user_agent(crate::user_agent())
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// One page of the source listing.
    pub fn fetch_sources(&self, cursor: PageCursor) -> Result<Vec<SourceRecord>, ClientError> {
        let url = format!("{}/sources", self.base_url);
        let per_page = cursor.per_page.to_string();
        let page = cursor.page.to_string();
        let data = self.get(&url, &[("numPerPage", per_page.as_str()), ("pageNumber", page.as_str())])?;

        let sources = data
            .get("sources")
            .and_then(|s| s.as_array())
            .ok_or_else(|| ClientError::Parse("response missing 'data.sources' array".into()))?;

        let mut out = Vec::with_capacity(sources.len());
        for source in sources {
            match serde_json::from_value::<SourceRecord>(source.clone()) {
                Ok(rec) => out.push(rec),
                Err(e) => log::warn!("skipping malformed source entry: {e}"),
            }
        }
        log::debug!("page {}: {} sources", cursor.page, out.len());
        Ok(out)
    }

    /// Stored photometry for one source, in AB magnitudes.
    pub fn fetch_photometry(&self, obj_id: &str) -> Result<Vec<PhotometryPoint>, ClientError> {
        let url = format!("{}/sources/{}/photometry", self.base_url, obj_id);
        let data = self.get(&url, &[("format", "mag"), ("magsys", "ab")])?;
        serde_json::from_value(data)
            .map_err(|e| ClientError::Parse(format!("photometry for {obj_id}: {e}")))
    }

    fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<serde_json::Value, ClientError> {
        let response = self
            .http
            .get(url)
            .header("Authorization", format!("token {}", self.token))
            .query(query)
            .send()
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let body: serde_json::Value = check_status(response)?
            .json()
            .map_err(|e| ClientError::Parse(e.to_string()))?;
        success_data(body)
    }
}
