//! Science / template / difference cutout triplets.
//!
//! Each alert carries three gzip-compressed FITS stamps. A triplet stacks
//! them into a fixed 63×63×3 array, channel order science, template,
//! difference.

use std::io::Read;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::read::GzDecoder;
use serde::Serialize;
use serde_json::Value;

use crate::error::CutoutError;
use crate::fits::{self, FitsImage};

/// Edge length of a triplet channel.
pub const STAMP_SIZE: usize = 63;

/// Fill value for pixels added when a stamp is smaller than the triplet.
pub const PAD_VALUE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Science,
    Template,
    Difference,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Science, Channel::Template, Channel::Difference];

    pub fn index(self) -> usize {
        match self {
            Self::Science => 0,
            Self::Template => 1,
            Self::Difference => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Science => "science",
            Self::Template => "template",
            Self::Difference => "difference",
        }
    }

    /// Alert packet key holding this stamp.
    fn alert_key(self) -> &'static str {
        match self {
            Self::Science => "cutoutScience",
            Self::Template => "cutoutTemplate",
            Self::Difference => "cutoutDifference",
        }
    }
}

/// Raw gzip-compressed stamps of one alert.
#[derive(Debug, Clone, PartialEq)]
pub struct StampSet {
    pub science: Vec<u8>,
    pub template: Vec<u8>,
    pub difference: Vec<u8>,
}

impl StampSet {
    pub fn get(&self, channel: Channel) -> &[u8] {
        match channel {
            Channel::Science => &self.science,
            Channel::Template => &self.template,
            Channel::Difference => &self.difference,
        }
    }

    /// Extract the stamps from an alert packet as returned by the broker
    /// API. `stampData` may be a base64 string or an extended-JSON binary
    /// (`{"$binary": {"base64": ...}}` or `{"$binary": "..."}`).
    pub fn from_alert_json(alert: &Value) -> Result<Self, CutoutError> {
        Ok(Self {
            science: stamp_bytes(alert, Channel::Science)?,
            template: stamp_bytes(alert, Channel::Template)?,
            difference: stamp_bytes(alert, Channel::Difference)?,
        })
    }
}

fn stamp_bytes(alert: &Value, channel: Channel) -> Result<Vec<u8>, CutoutError> {
    let payload_err = |message: String| CutoutError::Payload {
        channel: channel.name().to_string(),
        message,
    };

    let data = alert
        .get(channel.alert_key())
        .and_then(|c| c.get("stampData"))
        .ok_or_else(|| payload_err(format!("missing {}.stampData", channel.alert_key())))?;

    let encoded = match data {
        Value::String(s) => s.as_str(),
        Value::Object(obj) => match obj.get("$binary") {
            Some(Value::String(s)) => s.as_str(),
            Some(Value::Object(bin)) => bin
                .get("base64")
                .and_then(Value::as_str)
                .ok_or_else(|| payload_err("$binary without base64 payload".into()))?,
            _ => return Err(payload_err("unrecognised stampData object".into())),
        },
        _ => return Err(payload_err("stampData must be a string or binary object".into())),
    };

    STANDARD
        .decode(encoded.trim())
        .map_err(|e| payload_err(format!("invalid base64: {e}")))
}

/// A 63×63×3 stack, indexed `(row, col, channel)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Triplet {
    data: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChannelStats {
    pub min: f64,
    pub max: f64,
    pub sum: f64,
}

impl Triplet {
    pub fn get(&self, row: usize, col: usize, channel: Channel) -> f64 {
        self.data[(row * STAMP_SIZE + col) * 3 + channel.index()]
    }

    /// One channel as a row-major 63×63 plane.
    pub fn channel(&self, channel: Channel) -> Vec<f64> {
        self.data
            .iter()
            .skip(channel.index())
            .step_by(3)
            .copied()
            .collect()
    }

    pub fn stats(&self, channel: Channel) -> ChannelStats {
        let plane = self.channel(channel);
        ChannelStats {
            min: plane.iter().copied().fold(f64::INFINITY, f64::min),
            max: plane.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            sum: plane.iter().sum(),
        }
    }

    /// Flat `(row, col, channel)` buffer.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }
}

/// Decode the three stamps and stack them into a triplet.
///
/// Non-finite pixels become 0. With `normalize`, each stamp is divided by
/// its Frobenius norm before padding (skipped when the norm is 0). Stamps
/// smaller than 63×63 are padded bottom and right with [`PAD_VALUE`].
pub fn make_triplet(stamps: &StampSet, normalize: bool) -> Result<Triplet, CutoutError> {
    let mut data = vec![0.0; STAMP_SIZE * STAMP_SIZE * 3];

    for channel in Channel::ALL {
        let image = decode_stamp(stamps.get(channel), channel)?;
        if image.width > STAMP_SIZE || image.height > STAMP_SIZE {
            return Err(CutoutError::StampTooLarge {
                channel: channel.name().to_string(),
                width: image.width,
                height: image.height,
            });
        }

        let mut pixels: Vec<f64> = image
            .data
            .iter()
            .map(|v| if v.is_finite() { *v } else { 0.0 })
            .collect();

        if normalize {
            let norm = pixels.iter().map(|v| v * v).sum::<f64>().sqrt();
            if norm != 0.0 {
                pixels.iter_mut().for_each(|v| *v /= norm);
            }
        }

        for row in 0..STAMP_SIZE {
            for col in 0..STAMP_SIZE {
                let value = if row < image.height && col < image.width {
                    pixels[row * image.width + col]
                } else {
                    PAD_VALUE
                };
                data[(row * STAMP_SIZE + col) * 3 + channel.index()] = value;
            }
        }

        if image.width != STAMP_SIZE || image.height != STAMP_SIZE {
            log::debug!(
                "{} stamp {}x{} padded to {STAMP_SIZE}x{STAMP_SIZE}",
                channel.name(),
                image.width,
                image.height
            );
        }
    }

    Ok(Triplet { data })
}

fn decode_stamp(gz: &[u8], channel: Channel) -> Result<FitsImage, CutoutError> {
    let mut raw = Vec::new();
    GzDecoder::new(gz)
        .read_to_end(&mut raw)
        .map_err(|e| CutoutError::Gzip {
            channel: channel.name().to_string(),
            message: e.to_string(),
        })?;

    fits::decode_primary(&raw).map_err(|e| CutoutError::Fits {
        channel: channel.name().to_string(),
        message: e.to_string(),
    })
}
