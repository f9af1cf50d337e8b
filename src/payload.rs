//! Decoding of the `sonos/current_track` message
//!
//! The publisher sends a small JSON object:
//!
//! ```json
//! {"Artist": "The Beatles", "Title": "Let It Be", "Album": "..."}
//! ```
//!
//! Only `Artist` and `Title` are used, everything else is ignored.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest payload accepted. The MQTT client buffer is sized to match, a
/// bigger message would arrive in fragments that are never reassembled.
pub const MAX_PAYLOAD_BYTES: usize = 4096;

/// The track currently playing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TrackMetadata {
    pub artist: String,
    pub title: String,
}

/// The payload could not be read as a track update
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("payload of {0} bytes exceeds the {max} byte limit", max = MAX_PAYLOAD_BYTES)]
    TooLarge(usize),
}

pub fn decode(bytes: &[u8]) -> Result<TrackMetadata, DecodeError> {
    if bytes.len() > MAX_PAYLOAD_BYTES {
        return Err(DecodeError::TooLarge(bytes.len()));
    }

    Ok(serde_json::from_slice(bytes)?)
}
