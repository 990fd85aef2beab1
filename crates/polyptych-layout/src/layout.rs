//! The reconstructed layout record.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use polyptych_core::{Point, Rectangle, Size};

/// Mapping from `device_id` to its reconstructed placement. Replaced
/// wholesale on every recalibration; [`write_layout`] and [`read_layout`]
/// handle the JSON file form, callers decide when.
pub type Layout = BTreeMap<String, PanelPlacement>;

#[derive(Debug, Error)]
pub enum LayoutFileError {
    #[error("layout file i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("layout file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Writes a layout as pretty-printed JSON keyed by `device_id`.
pub fn write_layout(path: &Path, layout: &Layout) -> Result<(), LayoutFileError> {
    let json = serde_json::to_string_pretty(layout)?;
    Ok(fs::write(path, json)?)
}

/// Reads a layout previously written by [`write_layout`].
pub fn read_layout(path: &Path) -> Result<Layout, LayoutFileError> {
    let json = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

/// One panel's place in the shared physical frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelPlacement {
    pub device_id: String,
    pub screen_type: String,
    /// Top-left corner of the panel's axis-aligned footprint, millimeters.
    pub position: Point,
    /// Content rotation in degrees, clockwise. The footprint itself is
    /// axis-aligned; rotation applies to the bitmap sent to the panel.
    #[serde(default)]
    pub rotation_deg: f64,
    /// Footprint extent in millimeters, as measured from the photograph.
    pub detected_size: Size,
}

impl PanelPlacement {
    /// Axis-aligned footprint in the shared millimeter frame.
    pub fn footprint(&self) -> Rectangle {
        Rectangle::axis_aligned(self.position, self.detected_size)
    }
}
