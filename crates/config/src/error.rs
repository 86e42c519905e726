use std::fmt;

#[derive(Debug)]
pub enum ConfigError {
    /// Settings file could not be read or written.
    Io { path: String, message: String },
    /// Settings file is not valid TOML for the settings schema.
    Parse { path: String, message: String },
    /// A setting has an unusable value.
    Invalid(String),
    /// A required credential was not supplied anywhere.
    MissingSecret { name: String, env_var: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, message } => write!(f, "{path}: {message}"),
            Self::Parse { path, message } => write!(f, "{path}: invalid settings: {message}"),
            Self::Invalid(msg) => write!(f, "invalid setting: {msg}"),
            Self::MissingSecret { name, env_var } => {
                write!(f, "missing {name} (pass it as a flag, set {env_var}, or add it to the settings file)")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
