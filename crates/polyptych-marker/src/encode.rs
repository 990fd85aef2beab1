//! Calibration marker rendering.
//!
//! A marker is a QR symbol centered on a white canvas at the panel's full
//! resolution. The symbol is sized to a fixed fraction of the panel's shorter
//! side and rendered at a whole number of pixels per module, so the on-screen
//! geometry stays exactly reproducible from the declared edge length alone.

use image::{imageops, GrayImage, Luma};
use qrcode::{EcLevel, QrCode};
use thiserror::Error;

use crate::payload::MarkerPayload;

/// Fraction of the panel's shorter side the marker is sized to fill.
pub const MARKER_FILL_RATIO: f64 = 0.75;

/// Quiet-zone width on each side of the symbol, in modules.
pub const QUIET_ZONE_MODULES: u32 = 4;

/// Legibility floor. Below this the symbol will not survive a photograph.
pub const MIN_PX_PER_MODULE: u32 = 3;

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error(
        "marker edge {edge_px}px too small for a {modules}-module symbol at {MIN_PX_PER_MODULE}px/module"
    )]
    MarkerTooSmall { edge_px: u32, modules: u32 },
    #[error("payload exceeds barcode capacity: {0:?}")]
    Capacity(#[from] qrcode::types::QrError),
    #[error("payload serialization failed: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Marker edge length for a panel of the given resolution.
#[inline]
pub fn marker_edge_px(screen_width_px: u32, screen_height_px: u32) -> u32 {
    let short = screen_width_px.min(screen_height_px) as f64;
    (MARKER_FILL_RATIO * short).round() as u32
}

/// Assembles the payload a panel of this identity and resolution displays.
pub fn build_payload(
    device_id: &str,
    screen_type: &str,
    screen_width_px: u32,
    screen_height_px: u32,
) -> MarkerPayload {
    MarkerPayload {
        device_id: device_id.to_owned(),
        screen_type: screen_type.to_owned(),
        screen_width_px,
        screen_height_px,
        marker_size_px: marker_edge_px(screen_width_px, screen_height_px),
    }
}

/// Integer render scale for a symbol of `modules` modules inside a declared
/// edge, quiet zone included. `None` when even one pixel per module does not
/// fit. Shared with the decoder, which reverses it to recover the pixel
/// dimensions the encoder actually produced.
#[inline]
pub fn symbol_scale_px(declared_edge_px: u32, modules: u32) -> Option<u32> {
    let total = modules + 2 * QUIET_ZONE_MODULES;
    let px = declared_edge_px / total;
    (px > 0).then_some(px)
}

/// Renders the payload to a full-panel bitmap: a white canvas at the declared
/// resolution with the QR symbol centered on it.
pub fn render_marker(payload: &MarkerPayload) -> Result<GrayImage, EncodeError> {
    let content = payload.encode_content()?;
    let code = QrCode::with_error_correction_level(content.as_bytes(), EcLevel::M)?;
    let modules = code.width() as u32;

    let px = symbol_scale_px(payload.marker_size_px, modules)
        .filter(|&px| px >= MIN_PX_PER_MODULE)
        .ok_or(EncodeError::MarkerTooSmall {
            edge_px: payload.marker_size_px,
            modules,
        })?;

    let symbol: GrayImage = code
        .render::<Luma<u8>>()
        .quiet_zone(true)
        .module_dimensions(px, px)
        .build();

    let mut canvas = GrayImage::from_pixel(
        payload.screen_width_px,
        payload.screen_height_px,
        Luma([255]),
    );
    let dx = i64::from(payload.screen_width_px.saturating_sub(symbol.width())) / 2;
    let dy = i64::from(payload.screen_height_px.saturating_sub(symbol.height())) / 2;
    imageops::replace(&mut canvas, &symbol, dx, dy);
    Ok(canvas)
}
