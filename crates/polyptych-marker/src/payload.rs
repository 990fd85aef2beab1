//! Wire payload carried inside each calibration marker.

use serde::{Deserialize, Serialize};

/// Prefix separating this system's markers from foreign barcodes that may
/// share the photographed scene (posters, stickers, packaging).
pub const CONTENT_PREFIX: &str = "PLPT:";

/// Identity and declared geometry of one panel. Round-trips verbatim through
/// the barcode's error-corrected encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MarkerPayload {
    pub device_id: String,
    pub screen_type: String,
    pub screen_width_px: u32,
    pub screen_height_px: u32,
    /// Edge length the rendered marker was sized against, in panel pixels.
    /// Declared here so the decoder never has to guess it.
    pub marker_size_px: u32,
}

impl MarkerPayload {
    /// Serializes to the prefixed compact-JSON form stored in the barcode.
    pub fn encode_content(&self) -> Result<String, serde_json::Error> {
        Ok(format!("{CONTENT_PREFIX}{}", serde_json::to_string(self)?))
    }

    /// Parses barcode content back into a payload. `None` for content that is
    /// not ours or does not match the schema.
    pub fn parse_content(content: &str) -> Option<Self> {
        let body = content.strip_prefix(CONTENT_PREFIX)?;
        serde_json::from_str(body).ok()
    }
}
