//! High-level facade crate for the `polyptych-*` workspace.
//!
//! This crate provides:
//! - stable, convenient re-exports of the underlying crates
//! - end-to-end helpers that run the whole photo -> layout -> panels flow.
//!
//! ## Quickstart
//!
//! ```no_run
//! use polyptych::pipeline;
//! use polyptych::{ReconstructParams, ScreenRegistry};
//! use image::ImageReader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let photo = ImageReader::open("wall.jpg")?.decode()?;
//! let registry = ScreenRegistry::default();
//! let layout = pipeline::layout_from_photo(&photo, &registry, &ReconstructParams::default());
//! println!("found {} panels", layout.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `polyptych::core`: geometry primitives and homography estimation.
//! - `polyptych::marker`: QR layout markers, rendering and photo decoding.
//! - `polyptych::layout`: screen registry and layout reconstruction.
//! - `polyptych::tile`: image tiling, panel transport and concurrent dispatch.
//! - `polyptych::pipeline`: end-to-end helpers over a whole panel wall.

pub use polyptych_core as core;
pub use polyptych_layout as layout;
pub use polyptych_marker as marker;
pub use polyptych_tile as tile;

pub use polyptych_core::{Point, Rectangle, Size};
pub use polyptych_layout::{Layout, PanelPlacement, ReconstructParams, ScreenRegistry};
pub use polyptych_marker::DetectedMarker;
pub use polyptych_tile::{
    clear_panels, send_layout_image, DeviceInfo, DispatchReport, HttpTransport, PushOptions,
    Transport, TransportError,
};

pub mod pipeline;
