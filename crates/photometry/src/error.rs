use std::fmt;

use crate::model::Source;

#[derive(Debug)]
pub enum PhotometryError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (negative threshold, etc.).
    ConfigValidation(String),
    /// A record has no `jd` field, so it cannot be joined.
    MissingJoinKey { source: Source, index: usize },
    /// A record's `jd` is NaN or infinite.
    NonFiniteJoinKey { source: Source, index: usize, value: f64 },
    /// A record could not be decoded into the source schema.
    Decode { source: Source, index: usize, message: String },
    /// Not enough points for the requested statistic.
    InsufficientData(String),
}

impl fmt::Display for PhotometryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::MissingJoinKey { source, index } => {
                write!(f, "{source} record {index}: missing join key 'jd'")
            }
            Self::NonFiniteJoinKey { source, index, value } => {
                write!(f, "{source} record {index}: join key 'jd' is not finite ({value})")
            }
            Self::Decode { source, index, message } => {
                write!(f, "{source} record {index}: {message}")
            }
            Self::InsufficientData(msg) => write!(f, "insufficient data: {msg}"),
        }
    }
}

impl std::error::Error for PhotometryError {}

/// Failure while turning an alert's cutout stamps into a triplet.
#[derive(Debug)]
pub enum CutoutError {
    /// Stamp payload missing from the alert or not valid base64.
    Payload { channel: String, message: String },
    /// Stamp bytes are not a valid gzip stream.
    Gzip { channel: String, message: String },
    /// Decompressed stamp is not a readable FITS image.
    Fits { channel: String, message: String },
    /// Stamp exceeds the fixed triplet size.
    StampTooLarge { channel: String, width: usize, height: usize },
}

impl fmt::Display for CutoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Payload { channel, message } => write!(f, "{channel} stamp: {message}"),
            Self::Gzip { channel, message } => {
                write!(f, "{channel} stamp: gzip decode failed: {message}")
            }
            Self::Fits { channel, message } => {
                write!(f, "{channel} stamp: FITS decode failed: {message}")
            }
            Self::StampTooLarge { channel, width, height } => write!(
                f,
                "{channel} stamp is {width}x{height}, larger than {size}x{size}",
                size = crate::cutout::STAMP_SIZE
            ),
        }
    }
}

impl std::error::Error for CutoutError {}
