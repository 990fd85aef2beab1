//! Marker detections to physical layout.
//!
//! Each panel's screen rectangle is first estimated in photograph space from
//! its marker's measured pixel scale. When at least two panels are visible,
//! the estimates are scored for rectangularity and a corrective homography
//! is fitted from observed corners to ideal rectangles. The corrected
//! rectangles are then assembled into a shared millimeter frame anchored at
//! a fixed margin.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use polyptych_core::{
    estimate_homography_ransac, quad_centroid, quad_extent, quad_interior_angles,
    quad_side_lengths, reprojection_error, Homography, Point, RansacParams, Size,
};
use polyptych_marker::DetectedMarker;

use crate::layout::{Layout, PanelPlacement};
use crate::registry::{ScreenRegistry, ScreenSpec};

/// Tunables for layout reconstruction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconstructParams {
    /// Width/height ratio the ideal correction rectangles are built with.
    /// Matches the 9.7" panel family.
    pub known_aspect_ratio: f64,
    /// Margin the assembled layout is anchored at, millimeters.
    pub margin_mm: f64,
    /// Homography search parameters for the correction stage.
    pub ransac: RansacParams,
}

impl Default for ReconstructParams {
    fn default() -> Self {
        Self {
            known_aspect_ratio: 1.45,
            margin_mm: 20.0,
            ransac: RansacParams::default(),
        }
    }
}

/// Reconstructs the physical layout from one photograph's markers.
///
/// Markers naming a screen type absent from `registry` are skipped with a
/// warning. No markers, or none usable, yields an empty layout.
#[cfg_attr(
    feature = "tracing",
    tracing::instrument(level = "debug", skip_all, fields(markers = markers.len()))
)]
pub fn reconstruct_layout(
    markers: &[DetectedMarker],
    registry: &ScreenRegistry,
    params: &ReconstructParams,
) -> Layout {
    let mut estimates = Vec::with_capacity(markers.len());
    for marker in markers {
        let Some(spec) = registry.get(&marker.payload.screen_type) else {
            warn!(
                "unknown screen type {:?} for {}, skipping",
                marker.payload.screen_type, marker.payload.device_id
            );
            continue;
        };
        estimates.push(screen_estimate(marker, spec));
    }
    if estimates.is_empty() {
        return Layout::new();
    }

    let correction = fit_correction(&estimates, params);
    assemble(&estimates, &correction, params.margin_mm)
}

/// One panel's screen-rectangle estimate in photograph space.
struct ScreenEstimate<'a> {
    marker: &'a DetectedMarker,
    spec: &'a ScreenSpec,
    /// Cyclic top-left, top-right, bottom-right, bottom-left.
    screen_corners: [Point; 4],
}

/// Estimates the screen rectangle in photograph space. The marker's measured
/// edge over its declared edge gives a local pixel scale; the declared panel
/// resolution times that scale, centered on the marker and turned by its
/// rotation, is the screen rectangle.
fn screen_estimate<'a>(marker: &'a DetectedMarker, spec: &'a ScreenSpec) -> ScreenEstimate<'a> {
    let ratio = marker.measured_edge_px / f64::from(marker.payload.marker_size_px);
    let width_px = f64::from(marker.payload.screen_width_px) * ratio;
    let height_px = f64::from(marker.payload.screen_height_px) * ratio;
    let screen_corners =
        rect_corners_about(marker.center, width_px, height_px, marker.rotation_deg);
    ScreenEstimate {
        marker,
        spec,
        screen_corners,
    }
}

/// Cyclic corners of a `width × height` rectangle centered on `center` and
/// turned clockwise by `rotation_deg`.
fn rect_corners_about(center: Point, width: f64, height: f64, rotation_deg: f64) -> [Point; 4] {
    let (sin, cos) = rotation_deg.to_radians().sin_cos();
    let (hw, hh) = (width / 2.0, height / 2.0);
    [(-hw, -hh), (hw, -hh), (hw, hh), (-hw, hh)].map(|(dx, dy)| {
        Point::new(
            center.x + dx * cos - dy * sin,
            center.y + dx * sin + dy * cos,
        )
    })
}

/// How rectangular a quadrilateral is: 1.0 for a perfect rectangle, falling
/// toward 0 as opposite sides diverge or interior angles leave 90°.
pub fn rectangularity_score(corners: &[Point; 4]) -> f64 {
    let sides = quad_side_lengths(corners);
    let mut score = 1.0;
    for (a, b) in [(sides[0], sides[2]), (sides[1], sides[3])] {
        let longer = a.max(b);
        if longer <= 0.0 {
            return 0.0;
        }
        score *= a.min(b) / longer;
    }
    for angle in quad_interior_angles(corners) {
        score *= (1.0 - (angle - 90.0).abs() / 90.0).max(0.0);
    }
    score.clamp(0.0, 1.0)
}

/// The two-branch correction state: either a fitted homography or no
/// correction at all. Degenerate inputs land on `Identity`, never an error.
enum Correction {
    Identity,
    Projective(Homography),
}

impl Correction {
    fn apply(&self, quad: &[Point; 4]) -> [Point; 4] {
        match self {
            Correction::Identity => *quad,
            Correction::Projective(h) => quad.map(|p| h.apply(p)),
        }
    }
}

/// Fits the perspective correction. Ideal rectangles share the median
/// estimated width and the known aspect ratio, each centered on its screen
/// and turned to its locally estimated rotation. A robust fit from observed
/// to ideal corners is accepted only when it explains a majority of the
/// corners; anything less keeps identity.
fn fit_correction(estimates: &[ScreenEstimate<'_>], params: &ReconstructParams) -> Correction {
    if estimates.len() < 2 {
        debug!(
            "{} panel(s) visible, skipping perspective correction",
            estimates.len()
        );
        return Correction::Identity;
    }

    let scores: Vec<f64> = estimates
        .iter()
        .map(|e| rectangularity_score(&e.screen_corners))
        .collect();
    if let Some((best, score)) = scores
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
    {
        debug!(
            "least distorted panel: {} (rectangularity {score:.3})",
            estimates[best].marker.payload.device_id
        );
    }

    let mut widths = Vec::with_capacity(estimates.len());
    let mut rotations = Vec::with_capacity(estimates.len());
    for e in estimates {
        let sides = quad_side_lengths(&e.screen_corners);
        let mut width = (sides[0] + sides[2]) / 2.0;
        let mut height = (sides[1] + sides[3]) / 2.0;
        if height > 0.0 && width / height < params.known_aspect_ratio {
            std::mem::swap(&mut width, &mut height);
        }
        widths.push(width);
        let top_dx = e.screen_corners[1].x - e.screen_corners[0].x;
        let top_dy = e.screen_corners[1].y - e.screen_corners[0].y;
        rotations.push(top_dy.atan2(top_dx).to_degrees());
    }
    let ideal_width = median(&widths);
    let ideal_height = ideal_width / params.known_aspect_ratio;

    let mut observed = Vec::with_capacity(4 * estimates.len());
    let mut ideal = Vec::with_capacity(4 * estimates.len());
    for (e, rotation) in estimates.iter().zip(&rotations) {
        let target = rect_corners_about(
            quad_centroid(&e.screen_corners),
            ideal_width,
            ideal_height,
            *rotation,
        );
        observed.extend_from_slice(&e.screen_corners);
        ideal.extend_from_slice(&target);
    }

    let Some(h) = estimate_homography_ransac(&observed, &ideal, &params.ransac) else {
        warn!("perspective correction fit failed, keeping identity");
        return Correction::Identity;
    };
    let inliers = observed
        .iter()
        .zip(&ideal)
        .filter(|(obs, idl)| reprojection_error(&h, **obs, **idl) <= params.ransac.inlier_threshold)
        .count();
    if inliers * 2 <= observed.len() {
        debug!(
            "correction consensus too thin ({inliers}/{} corners), keeping identity",
            observed.len()
        );
        return Correction::Identity;
    }
    debug!(
        "perspective correction accepted ({inliers}/{} corners)",
        observed.len()
    );
    Correction::Projective(h)
}

/// One panel's corrected footprint, ready for physical assembly.
struct CorrectedPanel<'a> {
    estimate: &'a ScreenEstimate<'a>,
    origin_px: Point,
    extent_px: Size,
    mm_per_px: f64,
}

/// Assembles corrected rectangles into the millimeter frame. Each rectangle's
/// axis-aligned extent is compared with the screen type's physical size to
/// get a per-panel millimeter scale; the average of those becomes the single
/// global scale, and the topmost-leftmost panel corner is anchored at the
/// margin.
fn assemble(estimates: &[ScreenEstimate<'_>], correction: &Correction, margin_mm: f64) -> Layout {
    let mut corrected = Vec::with_capacity(estimates.len());
    for e in estimates {
        let quad = correction.apply(&e.screen_corners);
        let (origin_px, extent_px) = quad_extent(&quad);
        if extent_px.width <= 0.0 || extent_px.height <= 0.0 {
            warn!(
                "panel {}: degenerate corrected extent, skipping",
                e.marker.payload.device_id
            );
            continue;
        }
        let phys = e.spec.active_area_mm;
        // A quarter-turn panel presents its native axes swapped in the
        // photograph frame.
        let (phys_w, phys_h) = if is_quarter_turn(e.marker.rotation_deg) {
            (phys.height, phys.width)
        } else {
            (phys.width, phys.height)
        };
        let mm_per_px = (phys_w / extent_px.width + phys_h / extent_px.height) / 2.0;
        corrected.push(CorrectedPanel {
            estimate: e,
            origin_px,
            extent_px,
            mm_per_px,
        });
    }
    if corrected.is_empty() {
        return Layout::new();
    }

    let global_scale =
        corrected.iter().map(|c| c.mm_per_px).sum::<f64>() / corrected.len() as f64;
    let min_x = corrected
        .iter()
        .map(|c| c.origin_px.x)
        .fold(f64::INFINITY, f64::min);
    let min_y = corrected
        .iter()
        .map(|c| c.origin_px.y)
        .fold(f64::INFINITY, f64::min);
    debug!("global scale {global_scale:.4} mm/px");

    let mut layout = Layout::new();
    for panel in corrected {
        let payload = &panel.estimate.marker.payload;
        let placement = PanelPlacement {
            device_id: payload.device_id.clone(),
            screen_type: payload.screen_type.clone(),
            position: Point::new(
                (panel.origin_px.x - min_x) * global_scale + margin_mm,
                (panel.origin_px.y - min_y) * global_scale + margin_mm,
            ),
            rotation_deg: panel.estimate.marker.rotation_deg,
            detected_size: panel.extent_px.scaled(global_scale),
        };
        debug!(
            "panel {} at ({:.1}, {:.1}) mm, rotation {}",
            placement.device_id, placement.position.x, placement.position.y,
            placement.rotation_deg
        );
        layout.insert(payload.device_id.clone(), placement);
    }
    layout
}

fn is_quarter_turn(rotation_deg: f64) -> bool {
    let folded = rotation_deg.rem_euclid(180.0);
    (folded - 90.0).abs() < 45.0
}

/// Median of a non-empty slice.
fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
