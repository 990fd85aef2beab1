//! Known screen types and their physical geometry.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use polyptych_core::Size;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read screen registry: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed screen registry: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unknown screen type {0:?}")]
    UnknownScreenType(String),
}

/// Physical and native-resolution geometry of one screen model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenSpec {
    pub description: String,
    /// Visible active area, millimeters.
    pub active_area_mm: Size,
    pub native_width_px: u32,
    pub native_height_px: u32,
}

/// Registry of screen models addressable by the payload's `screen_type`
/// label. Ships with the panel models this project is deployed on; a JSON
/// file can override or extend them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScreenRegistry {
    specs: BTreeMap<String, ScreenSpec>,
}

impl Default for ScreenRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ScreenRegistry {
    /// The built-in screen models.
    pub fn builtin() -> Self {
        let mut specs = BTreeMap::new();
        // https://www.panelook.com/ED060XC3_E_Ink_6.0_EPD_parameter_21976.html
        specs.insert(
            "ED060XC3".to_owned(),
            ScreenSpec {
                description: "6.0\" E-Paper Display".to_owned(),
                active_area_mm: size_mm(122.4, 90.6),
                native_width_px: 1024,
                native_height_px: 758,
            },
        );
        specs.insert(
            "ED097TC2".to_owned(),
            ScreenSpec {
                description: "9.7\" E-Paper Display".to_owned(),
                active_area_mm: size_mm(203.0, 139.5),
                native_width_px: 1200,
                native_height_px: 825,
            },
        );
        Self { specs }
    }

    /// Built-ins plus the entries of a JSON override file. File entries win
    /// on name collisions.
    pub fn load_json(path: &Path) -> Result<Self, RegistryError> {
        let text = std::fs::read_to_string(path)?;
        let overrides: BTreeMap<String, ScreenSpec> = serde_json::from_str(&text)?;
        let mut registry = Self::builtin();
        registry.specs.extend(overrides);
        Ok(registry)
    }

    pub fn insert(&mut self, name: impl Into<String>, spec: ScreenSpec) {
        self.specs.insert(name.into(), spec);
    }

    pub fn get(&self, name: &str) -> Option<&ScreenSpec> {
        self.specs.get(name)
    }

    /// Lookup that treats an unknown name as an error, for callers where a
    /// missing model is a configuration mistake rather than noise.
    pub fn require(&self, name: &str) -> Result<&ScreenSpec, RegistryError> {
        self.get(name)
            .ok_or_else(|| RegistryError::UnknownScreenType(name.to_owned()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ScreenSpec)> {
        self.specs.iter().map(|(name, spec)| (name.as_str(), spec))
    }
}

fn size_mm(width: f64, height: f64) -> Size {
    Size { width, height }
}
