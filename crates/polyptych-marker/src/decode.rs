//! Photograph scanning: locate markers and measure their image-space
//! geometry.
//!
//! Detection and decoding are delegated to `rqrr`. Every decoded symbol is
//! schema-filtered through [`MarkerPayload`], so foreign barcodes in the
//! scene are skipped, not treated as errors. Candidates that fail to decode
//! at all (blur, occlusion) are logged and skipped the same way.

use image::DynamicImage;
use log::{debug, warn};

use polyptych_core::{quad_centroid, quad_side_lengths, Point};

use crate::encode::symbol_scale_px;
use crate::payload::MarkerPayload;

/// One successfully decoded marker, measured in photograph pixels.
#[derive(Debug, Clone)]
pub struct DetectedMarker {
    pub payload: MarkerPayload,
    /// Arithmetic mean of the 4 corners.
    pub center: Point,
    /// Symbol corners in photograph space, ordered top-left, top-right,
    /// bottom-right, bottom-left in the symbol's own frame.
    pub corners: [Point; 4],
    /// Panel rotation snapped to the nearest multiple of 90°, in `[0, 360)`.
    pub rotation_deg: f64,
    /// Photographed edge length normalized to the declared footprint, so
    /// `measured_edge_px / payload.marker_size_px` is the local pixel scale.
    pub measured_edge_px: f64,
}

/// Scans a photograph for calibration markers.
///
/// Returns at most one entry per `device_id`; a photograph without markers
/// yields an empty list. Detection order is not significant.
pub fn decode_markers(photo: &DynamicImage) -> Vec<DetectedMarker> {
    let gray = photo.to_luma8();
    let photo_center = Point::new(f64::from(gray.width()) / 2.0, f64::from(gray.height()) / 2.0);
    let mut prepared = rqrr::PreparedImage::prepare(gray);
    let grids = prepared.detect_grids();
    debug!("barcode pass found {} candidate grids", grids.len());

    let mut markers = Vec::new();
    for grid in &grids {
        let corners = grid
            .bounds
            .map(|p| Point::new(f64::from(p.x), f64::from(p.y)));
        let (meta, content) = match grid.decode() {
            Ok(decoded) => decoded,
            Err(err) => {
                warn!("undecodable barcode candidate near {:?}: {err:?}", grid.bounds[0]);
                continue;
            }
        };
        let Some(payload) = MarkerPayload::parse_content(&content) else {
            debug!("skipping foreign barcode: {content:?}");
            continue;
        };

        let Some(marker) = measure(payload, corners, meta.version.0) else {
            continue;
        };
        debug!(
            "marker {} at ({:.1}, {:.1}), rotation {}",
            marker.payload.device_id, marker.center.x, marker.center.y, marker.rotation_deg
        );
        markers.push(marker);
    }

    dedup_by_device_keep_central(&mut markers, photo_center);
    markers
}

/// Builds the measured record for one decoded symbol. `None` when the
/// declared edge is inconsistent with the symbol's module count.
fn measure(payload: MarkerPayload, corners: [Point; 4], version: usize) -> Option<DetectedMarker> {
    let modules = 17 + 4 * version as u32;
    let Some(scale) = symbol_scale_px(payload.marker_size_px, modules) else {
        warn!(
            "marker {}: declared edge {}px cannot hold {modules} modules, skipping",
            payload.device_id, payload.marker_size_px
        );
        return None;
    };

    // The detector's corner quad spans the dark modules only. Rescale the
    // measurement to the declared quiet-zone-inclusive footprint so the
    // caller can divide by `marker_size_px` directly.
    let rendered_px = f64::from(modules * scale);
    let declared_px = f64::from(payload.marker_size_px);
    let measured_symbol = quad_side_lengths(&corners).iter().sum::<f64>() / 4.0;
    let measured_edge_px = measured_symbol * declared_px / rendered_px;

    Some(DetectedMarker {
        center: quad_centroid(&corners),
        rotation_deg: snapped_rotation_deg(&corners),
        corners,
        measured_edge_px,
        payload,
    })
}

/// Angle of the top edge (corner 0 → corner 1) in degrees, normalized to
/// `[0, 360)` and snapped to the nearest multiple of 90.
fn snapped_rotation_deg(corners: &[Point; 4]) -> f64 {
    let dx = corners[1].x - corners[0].x;
    let dy = corners[1].y - corners[0].y;
    let raw = dy.atan2(dx).to_degrees().rem_euclid(360.0);
    (raw / 90.0).round().rem_euclid(4.0) * 90.0
}

/// Collapses repeat detections of one `device_id`, keeping the copy closest
/// to the photograph center (the least perspective-stressed one).
fn dedup_by_device_keep_central(markers: &mut Vec<DetectedMarker>, photo_center: Point) {
    markers.sort_by(|a, b| {
        a.payload
            .device_id
            .cmp(&b.payload.device_id)
            .then_with(|| {
                a.center
                    .distance_to(photo_center)
                    .total_cmp(&b.center.distance_to(photo_center))
            })
    });
    markers.dedup_by(|later, kept| {
        let dup = later.payload.device_id == kept.payload.device_id;
        if dup {
            warn!(
                "duplicate marker for {}, keeping the most central detection",
                kept.payload.device_id
            );
        }
        dup
    });
}
