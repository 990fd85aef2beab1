//! End-to-end helpers over a whole panel wall.

use image::DynamicImage;
use log::info;

use polyptych_layout::{reconstruct_layout, Layout, ReconstructParams, ScreenRegistry};
use polyptych_marker::{build_payload, decode_markers, render_marker};
use polyptych_tile::{DispatchReport, PushOptions, Transport, TransportError};

/// Reconstructs the panel layout from one photograph of the wall.
///
/// Convenience over [`decode_markers`] followed by [`reconstruct_layout`];
/// see those for the per-stage behavior.
pub fn layout_from_photo(
    photo: &DynamicImage,
    registry: &ScreenRegistry,
    params: &ReconstructParams,
) -> Layout {
    let markers = decode_markers(photo);
    info!("decoded {} layout markers in the photo", markers.len());
    reconstruct_layout(&markers, registry, params)
}

/// Pushes each panel's identification marker to it, sized from what the
/// panel reports about itself. Markers go out unrotated: the symbol has to
/// land in the panel's own frame for the photo to reveal the mounting.
pub fn display_markers(transport: &dyn Transport, device_ids: &[String]) -> DispatchReport {
    let mut report = DispatchReport::default();
    for id in device_ids {
        report
            .outcomes
            .insert(id.clone(), push_marker(transport, id));
    }
    report
}

fn push_marker(transport: &dyn Transport, device_id: &str) -> Result<(), TransportError> {
    let device = transport.query(device_id)?;
    let payload = build_payload(device_id, &device.screen_model, device.width, device.height);
    let marker = render_marker(&payload)
        .map_err(|err| TransportError::Task(format!("marker for {device_id}: {err}")))?;
    info!(
        "pushing {}x{} marker to {device_id} ({})",
        marker.width(),
        marker.height(),
        device.screen_model
    );
    transport.push(
        device_id,
        &marker,
        &PushOptions {
            clear: true,
            rotated: false,
        },
    )
}
