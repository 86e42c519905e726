// Credential resolution
//
// Checks in order:
// 1. Command-line flag
// 2. Environment variable (FRITZ_API_TOKEN, KOWALSKI_USERNAME, ...)
// 3. Settings file

use std::env;

use crate::error::ConfigError;

pub const FRITZ_TOKEN_ENV: &str = "FRITZ_API_TOKEN";
pub const KOWALSKI_USERNAME_ENV: &str = "KOWALSKI_USERNAME";
pub const KOWALSKI_PASSWORD_ENV: &str = "KOWALSKI_PASSWORD";

/// Where a credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretSource {
    Flag,
    Environment,
    SettingsFile,
}

impl SecretSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecretSource::Flag => "flag",
            SecretSource::Environment => "environment",
            SecretSource::SettingsFile => "settings file",
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Secret {
    pub value: String,
    pub source: SecretSource,
}

// never print the value
impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secret")
            .field("value", &"***")
            .field("source", &self.source)
            .finish()
    }
}

/// Resolve a credential from the process environment.
pub fn resolve_secret(
    name: &str,
    flag: Option<&str>,
    env_var: &str,
    file_value: Option<&str>,
) -> Result<Secret, ConfigError> {
    resolve_with(name, flag, env_var, file_value, |key| env::var(key).ok())
}

/// Resolve a credential with an explicit environment lookup. Empty values
/// count as absent at every level.
pub fn resolve_with(
    name: &str,
    flag: Option<&str>,
    env_var: &str,
    file_value: Option<&str>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Secret, ConfigError> {
    let present = |v: &str| !v.trim().is_empty();

    if let Some(v) = flag.filter(|v| present(v)) {
        return Ok(Secret { value: v.to_string(), source: SecretSource::Flag });
    }
    if let Some(v) = lookup(env_var).filter(|v| present(v)) {
        return Ok(Secret { value: v, source: SecretSource::Environment });
    }
    if let Some(v) = file_value.filter(|v| present(v)) {
        return Ok(Secret { value: v.to_string(), source: SecretSource::SettingsFile });
    }
    Err(ConfigError::MissingSecret {
        name: name.to_string(),
        env_var: env_var.to_string(),
    })
}
