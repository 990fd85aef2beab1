//! Geometry primitives and homography estimation for panel layout
//! reconstruction.
//!
//! Deliberately free of imaging, barcode, and transport concerns: this crate
//! holds the shared value types ([`Point`], [`Size`], [`Rectangle`]) and the
//! projective machinery the pipeline crates build on.

mod geometry;
mod homography;

pub use geometry::{
    bounding_rectangle, quad_centroid, quad_extent, quad_interior_angles, quad_side_lengths,
    GeometryError, Point, Rectangle, Size,
};
pub use homography::{
    estimate_homography, estimate_homography_ransac, homography_from_4pt, reprojection_error,
    Homography, RansacParams,
};
