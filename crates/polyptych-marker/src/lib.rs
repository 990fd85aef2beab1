//! Calibration marker encoding and decoding.
//!
//! Design idea:
//! - Every panel renders a QR symbol holding its identity and declared
//!   geometry, centered on a white canvas at the panel's full resolution.
//! - A single photograph of the assembled wall is scanned back into
//!   [`DetectedMarker`] records carrying measured center, corners, rotation,
//!   and a locally recovered pixel scale.
//! - Payloads are schema-checked, so foreign barcodes in the scene are
//!   filtered rather than fatal.

mod decode;
mod encode;
mod payload;

pub use decode::{decode_markers, DetectedMarker};
pub use encode::{
    build_payload, marker_edge_px, render_marker, symbol_scale_px, EncodeError, MARKER_FILL_RATIO,
    MIN_PX_PER_MODULE, QUIET_ZONE_MODULES,
};
pub use payload::{MarkerPayload, CONTENT_PREFIX};
