//! Scaling and cutting the source image against a layout.

use image::{imageops, DynamicImage, GrayImage, Luma};
use log::debug;
use thiserror::Error;

use polyptych_core::{bounding_rectangle, GeometryError, Point, Rectangle};
use polyptych_layout::{Layout, PanelPlacement};

#[derive(Debug, Error)]
pub enum TileError {
    #[error("layout has no panels")]
    EmptyLayout,
    #[error("layout bounding box is degenerate")]
    DegenerateBounds,
    #[error("source image too small to cover the layout")]
    SourceTooSmall,
    #[error("geometry failure: {0}")]
    Geometry(#[from] GeometryError),
}

/// The source image scaled to cover the layout's bounding box, plus the
/// mapping between the millimeter and pixel frames.
pub struct ScaledSource {
    pub image: GrayImage,
    /// Pixels per millimeter in the scaled image.
    pub mm_to_px_ratio: f64,
    /// Millimeter position of the scaled image's top-left corner.
    pub origin_mm: Point,
}

/// Scales the source to the layout's bounding box, preserving aspect ratio
/// by cropping rather than letterboxing. The dimension-limiting axis sets
/// the millimeter-to-pixel ratio.
pub fn scale_to_layout(image: &DynamicImage, layout: &Layout) -> Result<ScaledSource, TileError> {
    if layout.is_empty() {
        return Err(TileError::EmptyLayout);
    }
    let footprints: Vec<Rectangle> = layout.values().map(PanelPlacement::footprint).collect();
    let bounds = bounding_rectangle(&footprints)?;
    if bounds.size.width <= 0.0 || bounds.size.height <= 0.0 {
        return Err(TileError::DegenerateBounds);
    }

    let ratio = (f64::from(image.width()) / bounds.size.width)
        .min(f64::from(image.height()) / bounds.size.height);
    let target_w = (bounds.size.width * ratio) as u32;
    let target_h = (bounds.size.height * ratio) as u32;
    if target_w == 0 || target_h == 0 {
        return Err(TileError::SourceTooSmall);
    }
    debug!(
        "scaling {}x{} source to {target_w}x{target_h} at {ratio:.3} px/mm",
        image.width(),
        image.height()
    );
    let scaled = image
        .resize_to_fill(target_w, target_h, imageops::FilterType::Lanczos3)
        .to_luma8();
    Ok(ScaledSource {
        image: scaled,
        mm_to_px_ratio: ratio,
        origin_mm: bounds.origin,
    })
}

/// Cuts one panel's tile from the scaled source and applies the panel's own
/// rotation. Sub-rectangles that poke past the scaled image through integer
/// rounding are padded with white rather than failing.
pub fn panel_tile(source: &ScaledSource, placement: &PanelPlacement) -> GrayImage {
    let ratio = source.mm_to_px_ratio;
    let left = ((placement.position.x - source.origin_mm.x) * ratio) as i64;
    let top = ((placement.position.y - source.origin_mm.y) * ratio) as i64;
    let width = ((placement.detected_size.width * ratio) as u32).max(1);
    let height = ((placement.detected_size.height * ratio) as u32).max(1);
    let tile = cut_padded(&source.image, left, top, width, height);
    rotate_tile(tile, placement.rotation_deg)
}

fn cut_padded(image: &GrayImage, left: i64, top: i64, width: u32, height: u32) -> GrayImage {
    let mut tile = GrayImage::from_pixel(width, height, Luma([255]));
    let src_x0 = left.clamp(0, i64::from(image.width()));
    let src_y0 = top.clamp(0, i64::from(image.height()));
    let src_x1 = (left + i64::from(width)).clamp(0, i64::from(image.width()));
    let src_y1 = (top + i64::from(height)).clamp(0, i64::from(image.height()));
    if src_x1 > src_x0 && src_y1 > src_y0 {
        let view = imageops::crop_imm(
            image,
            src_x0 as u32,
            src_y0 as u32,
            (src_x1 - src_x0) as u32,
            (src_y1 - src_y0) as u32,
        );
        imageops::replace(&mut tile, &view.to_image(), src_x0 - left, src_y0 - top);
    }
    tile
}

/// The panel is physically turned clockwise by `rotation_deg`, so its bitmap
/// is counter-rotated for the content to read upright on the wall.
fn rotate_tile(tile: GrayImage, rotation_deg: f64) -> GrayImage {
    match (rotation_deg.rem_euclid(360.0) / 90.0).round() as u32 % 4 {
        1 => imageops::rotate270(&tile),
        2 => imageops::rotate180(&tile),
        3 => imageops::rotate90(&tile),
        _ => tile,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use polyptych_core::Size;

    fn placement(id: &str, screen: &str, pos: (f64, f64), size: (f64, f64), rot: f64) -> PanelPlacement {
        PanelPlacement {
            device_id: id.into(),
            screen_type: screen.into(),
            position: Point::new(pos.0, pos.1),
            rotation_deg: rot,
            detected_size: Size {
                width: size.0,
                height: size.1,
            },
        }
    }

    fn two_panel_layout() -> Layout {
        let mut layout = Layout::new();
        layout.insert(
            "10.0.0.21".into(),
            placement("10.0.0.21", "ED097TC2", (20.0, 20.0), (203.0, 139.5), 180.0),
        );
        layout.insert(
            "10.0.0.30".into(),
            placement("10.0.0.30", "ED060XC3", (248.0, 76.0), (122.4, 90.6), 0.0),
        );
        layout
    }

    fn flat_source(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_pixel(w, h, Luma([128])))
    }

    #[test]
    fn empty_layout_is_an_error() {
        let err = scale_to_layout(&flat_source(100, 100), &Layout::new());
        assert!(matches!(err, Err(TileError::EmptyLayout)));
    }

    #[test]
    fn scaled_source_matches_limiting_axis() {
        let layout = two_panel_layout();
        // Bounding box spans (20,20)..(370.4,166.6): 350.4 x 146.6 mm.
        let source = scale_to_layout(&flat_source(1600, 800), &layout).expect("scale");
        assert_abs_diff_eq!(source.mm_to_px_ratio, 1600.0 / 350.4, epsilon = 1e-9);
        assert_eq!(source.image.dimensions(), (1600, 669));
        assert_eq!(source.origin_mm, Point::new(20.0, 20.0));
    }

    #[test]
    fn tiles_match_footprints_and_stay_in_bounds() {
        let layout = two_panel_layout();
        let source = scale_to_layout(&flat_source(1600, 800), &layout).expect("scale");
        let ratio = source.mm_to_px_ratio;
        let (scaled_w, scaled_h) = source.image.dimensions();

        for p in layout.values() {
            let tile = panel_tile(&source, p);
            let expect_w = (p.detected_size.width * ratio) as u32;
            let expect_h = (p.detected_size.height * ratio) as u32;
            // 180 turns keep dimensions; this layout has no quarter turns.
            assert_eq!(tile.dimensions(), (expect_w, expect_h), "{}", p.device_id);

            let left = ((p.position.x - source.origin_mm.x) * ratio) as i64;
            let top = ((p.position.y - source.origin_mm.y) * ratio) as i64;
            assert!(left >= 0 && top >= 0, "{}", p.device_id);
            assert!(left + i64::from(expect_w) <= i64::from(scaled_w) + 1);
            assert!(top + i64::from(expect_h) <= i64::from(scaled_h) + 1);
        }
    }

    #[test]
    fn quarter_turn_tile_swaps_dimensions() {
        let source = ScaledSource {
            image: GrayImage::from_pixel(500, 500, Luma([40])),
            mm_to_px_ratio: 1.0,
            origin_mm: Point::new(0.0, 0.0),
        };
        let p = placement("x", "ED060XC3", (10.0, 10.0), (80.0, 100.0), 90.0);
        let tile = panel_tile(&source, &p);
        assert_eq!(tile.dimensions(), (100, 80));
    }

    #[test]
    fn half_turn_flips_content() {
        let mut img = GrayImage::from_pixel(60, 40, Luma([255]));
        img.put_pixel(0, 0, Luma([0]));
        let source = ScaledSource {
            image: img,
            mm_to_px_ratio: 1.0,
            origin_mm: Point::new(0.0, 0.0),
        };
        let p = placement("x", "ED060XC3", (0.0, 0.0), (60.0, 40.0), 180.0);
        let tile = panel_tile(&source, &p);
        assert_eq!(tile.get_pixel(59, 39).0[0], 0);
        assert_eq!(tile.get_pixel(0, 0).0[0], 255);
    }

    #[test]
    fn out_of_bounds_window_is_padded_white() {
        let dark = GrayImage::from_pixel(100, 100, Luma([0]));
        let tile = cut_padded(&dark, 80, 90, 30, 20);
        assert_eq!(tile.dimensions(), (30, 20));
        // In-source region stays dark, overhang is white.
        assert_eq!(tile.get_pixel(5, 5).0[0], 0);
        assert_eq!(tile.get_pixel(25, 5).0[0], 255);
        assert_eq!(tile.get_pixel(5, 15).0[0], 255);
    }

    #[test]
    fn negative_window_origin_is_padded_white() {
        let dark = GrayImage::from_pixel(50, 50, Luma([0]));
        let tile = cut_padded(&dark, -10, -5, 30, 20);
        assert_eq!(tile.get_pixel(0, 0).0[0], 255);
        assert_eq!(tile.get_pixel(9, 4).0[0], 255);
        assert_eq!(tile.get_pixel(15, 10).0[0], 0);
    }
}
