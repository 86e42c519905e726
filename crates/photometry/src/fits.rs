//! Minimal reader for the primary image HDU of a FITS file.
//!
//! Alert stamps are single 2-D images, so only the primary header and data
//! unit is decoded. Header cards are 80 ASCII characters, grouped into
//! 2880-byte blocks; data is big-endian and starts on the next block.

use std::fmt;

const BLOCK: usize = 2880;
const CARD: usize = 80;
const MAX_AXIS: i64 = 1 << 16;

#[derive(Debug, Clone, PartialEq)]
pub struct FitsError(pub String);

impl fmt::Display for FitsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for FitsError {}

/// A decoded 2-D image, row-major (`NAXIS1` varies fastest).
#[derive(Debug, Clone, PartialEq)]
pub struct FitsImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f64>,
}

impl FitsImage {
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.width + col]
    }
}

#[derive(Debug, Default)]
struct Header {
    bitpix: Option<i64>,
    naxis: Option<i64>,
    naxis1: Option<i64>,
    naxis2: Option<i64>,
    bscale: Option<f64>,
    bzero: Option<f64>,
}

/// Decode the primary HDU. A missing `SIMPLE` card is tolerated.
pub fn decode_primary(bytes: &[u8]) -> Result<FitsImage, FitsError> {
    let (header, header_len) = read_header(bytes)?;

    let bitpix = header.bitpix.ok_or_else(|| FitsError("missing BITPIX".into()))?;
    let naxis = header.naxis.ok_or_else(|| FitsError("missing NAXIS".into()))?;
    if naxis != 2 {
        return Err(FitsError(format!("expected a 2-D image, NAXIS = {naxis}")));
    }
    let width = axis_len(header.naxis1, "NAXIS1")?;
    let height = axis_len(header.naxis2, "NAXIS2")?;

    let sample = match bitpix {
        8 => 1,
        16 => 2,
        32 | -32 => 4,
        64 | -64 => 8,
        other => return Err(FitsError(format!("unsupported BITPIX {other}"))),
    };

    let data_len = width
        .checked_mul(height)
        .and_then(|count| count.checked_mul(sample))
        .ok_or_else(|| FitsError("image dimensions overflow".into()))?;
    let data_end = header_len
        .checked_add(data_len)
        .ok_or_else(|| FitsError("image dimensions overflow".into()))?;
    let body = bytes
        .get(header_len..data_end)
        .ok_or_else(|| {
            FitsError(format!(
                "truncated data unit: need {data_len} bytes, have {}",
                bytes.len().saturating_sub(header_len)
            ))
        })?;

    let scale = header.bscale.unwrap_or(1.0);
    let zero = header.bzero.unwrap_or(0.0);

    let data = body
        .chunks_exact(sample)
        .map(|raw| {
            let v = read_sample(bitpix, raw);
            v * scale + zero
        })
        .collect();

    Ok(FitsImage { width, height, data })
}

fn axis_len(value: Option<i64>, key: &str) -> Result<usize, FitsError> {
    match value {
        Some(n) if n > MAX_AXIS => Err(FitsError(format!("{key} = {n} exceeds {MAX_AXIS}"))),
        Some(n) if n > 0 => usize::try_from(n)
            .map_err(|_| FitsError(format!("{key} = {n} does not fit in memory"))),
        Some(n) => Err(FitsError(format!("{key} must be positive, got {n}"))),
        None => Err(FitsError(format!("missing {key}"))),
    }
}

fn read_sample(bitpix: i64, raw: &[u8]) -> f64 {
    match bitpix {
        8 => raw[0] as f64,
        16 => i16::from_be_bytes([raw[0], raw[1]]) as f64,
        32 => i32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]) as f64,
        64 => {
            let mut b = [0u8; 8];
            b.copy_from_slice(raw);
            i64::from_be_bytes(b) as f64
        }
        -32 => f32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]) as f64,
        _ => {
            let mut b = [0u8; 8];
            b.copy_from_slice(raw);
            f64::from_be_bytes(b)
        }
    }
}

/// Parse header cards up to `END`. Returns the header and the offset of the
/// data unit.
fn read_header(bytes: &[u8]) -> Result<(Header, usize), FitsError> {
    let mut header = Header::default();
    let mut offset = 0;

    loop {
        let card = bytes
            .get(offset..offset + CARD)
            .ok_or_else(|| FitsError("header ended without END card".into()))?;
        offset += CARD;

        if !card.is_ascii() {
            return Err(FitsError(format!("non-ASCII header card at byte {}", offset - CARD)));
        }
        let card = std::str::from_utf8(card)
            .map_err(|e| FitsError(format!("header card at byte {}: {e}", offset - CARD)))?;
        let key = card[..8].trim_end();

        if key == "END" {
            break;
        }
        if &card[8..10] != "= " {
            continue;
        }
        let value = card_value(&card[10..]);

        match key {
            "BITPIX" => header.bitpix = Some(parse_int(key, value)?),
            "NAXIS" => header.naxis = Some(parse_int(key, value)?),
            "NAXIS1" => header.naxis1 = Some(parse_int(key, value)?),
            "NAXIS2" => header.naxis2 = Some(parse_int(key, value)?),
            "BSCALE" => header.bscale = Some(parse_float(key, value)?),
            "BZERO" => header.bzero = Some(parse_float(key, value)?),
            _ => {}
        }
    }

    let data_start = offset.div_ceil(BLOCK) * BLOCK;
    Ok((header, data_start))
}

/// Value part of a card, without the trailing `/ comment`.
fn card_value(raw: &str) -> &str {
    let trimmed = raw.trim_start();
    if trimmed.starts_with('\'') {
        // string value; comments cannot start inside the quotes
        return match trimmed[1..].find('\'') {
            Some(end) => &trimmed[..end + 2],
            None => trimmed,
        };
    }
    match trimmed.find('/') {
        Some(idx) => trimmed[..idx].trim(),
        None => trimmed.trim(),
    }
}

fn parse_int(key: &str, value: &str) -> Result<i64, FitsError> {
    value
        .parse()
        .map_err(|_| FitsError(format!("{key}: expected an integer, found '{value}'")))
}

fn parse_float(key: &str, value: &str) -> Result<f64, FitsError> {
    value
        .replace(['D', 'd'], "E")
        .parse()
        .map_err(|_| FitsError(format!("{key}: expected a number, found '{value}'")))
}

/// Encode a row-major image as a minimal single-HDU FITS file.
///
/// Test fixtures only; enabled by the `test-util` feature.
#[cfg(any(test, feature = "test-util"))]
pub fn encode_f32(width: usize, height: usize, data: &[f32]) -> Vec<u8> {
    let cards = [
        "SIMPLE  =                    T".to_string(),
        "BITPIX  =                  -32".to_string(),
        "NAXIS   =                    2".to_string(),
        format!("NAXIS1  = {width:>20}"),
        format!("NAXIS2  = {height:>20}"),
        "END".to_string(),
    ];
    let mut out = Vec::new();
    for card in &cards {
        out.extend_from_slice(format!("{card:<80}").as_bytes());
    }
    out.resize(out.len().div_ceil(BLOCK) * BLOCK, b' ');

    for v in data {
        out.extend_from_slice(&v.to_be_bytes());
    }
    out.resize(out.len().div_ceil(BLOCK) * BLOCK, 0);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_block(cards: &[&str]) -> Vec<u8> {
        let mut out = Vec::new();
        for card in cards {
            out.extend_from_slice(format!("{card:<80}").as_bytes());
        }
        out.resize(BLOCK, b' ');
        out
    }

    #[test]
    fn float_image_round_trips() {
        let data: Vec<f32> = (0..6).map(|i| i as f32 * 0.5).collect();
        let bytes = encode_f32(3, 2, &data);
        assert_eq!(bytes.len() % BLOCK, 0);

        let img = decode_primary(&bytes).unwrap();
        assert_eq!((img.width, img.height), (3, 2));
        assert_eq!(img.get(0, 2), 1.0);
        assert_eq!(img.get(1, 0), 1.5);
    }

    #[test]
    fn integer_image_applies_scale_and_zero() {
        let mut bytes = header_block(&[
            "BITPIX  =                   16",
            "NAXIS   =                    2",
            "NAXIS1  =                    2 / width",
            "NAXIS2  =                    1",
            "BSCALE  =                  2.0",
            "BZERO   =               32768.",
            "END",
        ]);
        bytes.extend_from_slice(&(-1i16).to_be_bytes());
        bytes.extend_from_slice(&(3i16).to_be_bytes());

        let img = decode_primary(&bytes).unwrap();
        assert_eq!(img.data, vec![32766.0, 32774.0]);
    }

    #[test]
    fn missing_end_is_an_error() {
        let bytes = vec![b' '; 160];
        let err = decode_primary(&bytes).unwrap_err();
        assert!(err.0.contains("END"));
    }

    #[test]
    fn truncated_data_is_an_error() {
        let mut bytes = encode_f32(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        bytes.truncate(BLOCK + 8);
        let err = decode_primary(&bytes).unwrap_err();
        assert!(err.0.contains("truncated"));
    }

    #[test]
    fn huge_axes_are_an_error() {
        let bytes = header_block(&[
            "SIMPLE  =                    T",
            "BITPIX  =                  -64",
            "NAXIS   =                    2",
            "NAXIS1  =           4294967297",
            "NAXIS2  =           4294967297",
            "END",
        ]);
        let err = decode_primary(&bytes).unwrap_err();
        assert!(err.0.contains("NAXIS1"), "{err}");
    }

    #[test]
    fn axes_at_the_bound_do_not_overflow() {
        let bytes = header_block(&[
            "BITPIX  =                  -64",
            "NAXIS   =                    2",
            "NAXIS1  =                65536",
            "NAXIS2  =                65536",
            "END",
        ]);
        let err = decode_primary(&bytes).unwrap_err();
        assert!(err.0.contains("truncated") || err.0.contains("overflow"), "{err}");
    }

    #[test]
    fn cube_is_rejected() {
        let bytes = header_block(&[
            "SIMPLE  =                    T",
            "BITPIX  =                    8",
            "NAXIS   =                    3",
            "END",
        ]);
        assert!(decode_primary(&bytes).unwrap_err().0.contains("NAXIS = 3"));
    }

    #[test]
    fn string_values_keep_slashes() {
        assert_eq!(card_value(" 'a/b'   / comment"), "'a/b'");
        assert_eq!(card_value("   42 / comment"), "42");
    }
}
