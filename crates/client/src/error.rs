/// Error type for broker API calls.
#[derive(Debug)]
pub enum ClientError {
    /// No token or credentials configured
    NotAuthenticated(String),
    /// Credentials were rejected
    AuthRejected(String),
    /// Network error
    Network(String),
    /// HTTP error with status code
    Http(u16, String),
    /// JSON parsing error
    Parse(String),
    /// Server answered with a non-"success" status
    Upstream(String),
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::NotAuthenticated(service) => write!(f, "no {service} credentials configured"),
            ClientError::AuthRejected(msg) => write!(f, "authentication failed: {msg}"),
            ClientError::Network(msg) => write!(f, "network error: {msg}"),
            ClientError::Http(code, msg) => write!(f, "HTTP {code}: {msg}"),
            ClientError::Parse(msg) => write!(f, "parse error: {msg}"),
            ClientError::Upstream(msg) => write!(f, "upstream error: {msg}"),
        }
    }
}

impl std::error::Error for ClientError {}

/// Map a non-2xx response to an error, keeping the body for context.
pub(crate) fn check_status(
    response: reqwest::blocking::Response,
) -> Result<reqwest::blocking::Response, ClientError> {
    let status = response.status().as_u16();
    if !response.status().is_success() {
        let body = response.text().unwrap_or_default();
        if status == 401 || status == 403 {
            return Err(ClientError::AuthRejected(body));
        }
        return Err(ClientError::Http(status, body));
    }
    Ok(response)
}

/// Read a `{status, message?, data}` envelope and return `data`.
pub(crate) fn success_data(mut body: serde_json::Value) -> Result<serde_json::Value, ClientError> {
    match body["status"].as_str() {
        Some("success") => Ok(body["data"].take()),
        Some(other) => {
            let message = body["message"].as_str().unwrap_or(other);
            Err(ClientError::Upstream(message.to_string()))
        }
        None => Err(ClientError::Parse("response missing 'status'".into())),
    }
}
