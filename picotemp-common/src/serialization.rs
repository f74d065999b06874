//! JSON wire codec for [`Reading`].

use crate::error::{Error, Result};
use crate::reading::Reading;

/// MIME type of an encoded reading.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Append the JSON encoding of `reading` to `buf`.
///
/// Nothing is allocated when `buf` already has enough spare capacity, so a
/// caller can keep one buffer alive across requests and `clear()` it between
/// uses. Non-finite readings have no JSON number form and are rejected
/// without touching `buf`.
pub fn encode_into(reading: &Reading, buf: &mut Vec<u8>) -> Result<()> {
    if !reading.celsius().is_finite() || !reading.fahrenheit().is_finite() {
        return Err(Error::InvalidReading(format!(
            "non-finite temperature {}",
            reading.celsius()
        )));
    }
    serde_json::to_writer(buf, reading).map_err(Error::from)
}

/// Encode a reading into a fresh buffer.
pub fn encode(reading: &Reading) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_into(reading, &mut buf)?;
    Ok(buf)
}

/// Decode a reading. Both `tempC` and `tempF` must be present and numeric.
pub fn decode(data: &[u8]) -> Result<Reading> {
    serde_json::from_slice(data).map_err(Error::from)
}
