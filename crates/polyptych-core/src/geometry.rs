//! Planar geometry in the image convention: x grows right, y grows down,
//! positive rotation turns clockwise on screen.
//!
//! Units are deliberately untyped. The same value types carry photograph
//! pixels and physical millimetres; callers must not mix the two in one
//! expression.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum GeometryError {
    #[error("empty rectangle set")]
    EmptyInput,
    #[error("negative size {width} x {height}")]
    NegativeSize { width: f64, height: f64 },
}

/// A 2D coordinate (photograph pixels or physical millimetres).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn distance_to(&self, other: Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

impl std::ops::Add<Size> for Point {
    type Output = Point;

    /// Translate by an extent: moves right/down by `rhs`.
    fn add(self, rhs: Size) -> Point {
        Point::new(self.x + rhs.width, self.y + rhs.height)
    }
}

impl From<Point> for nalgebra::Point2<f64> {
    fn from(p: Point) -> Self {
        nalgebra::Point2::new(p.x, p.y)
    }
}

impl From<nalgebra::Point2<f64>> for Point {
    fn from(p: nalgebra::Point2<f64>) -> Self {
        Point::new(p.x, p.y)
    }
}

/// A non-negative width/height pair, unit-agnostic like [`Point`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    /// Build a size, rejecting negative extents.
    pub fn new(width: f64, height: f64) -> Result<Self, GeometryError> {
        if width < 0.0 || height < 0.0 {
            return Err(GeometryError::NegativeSize { width, height });
        }
        Ok(Self { width, height })
    }

    /// Both extents multiplied by `ratio` (callers pass ratios ≥ 0).
    #[inline]
    pub fn scaled(&self, ratio: f64) -> Size {
        Size {
            width: self.width * ratio,
            height: self.height * ratio,
        }
    }
}

/// A rectangle with an origin, an extent, and a rotation about the origin.
///
/// `rotation_deg` turns clockwise on screen; the origin is the top-left
/// corner at rotation 0.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    pub origin: Point,
    pub size: Size,
    #[serde(default)]
    pub rotation_deg: f64,
}

impl Rectangle {
    pub fn new(origin: Point, size: Size, rotation_deg: f64) -> Self {
        Self {
            origin,
            size,
            rotation_deg,
        }
    }

    pub fn axis_aligned(origin: Point, size: Size) -> Self {
        Self::new(origin, size, 0.0)
    }

    /// The four corners in top-left, top-right, bottom-left, bottom-right
    /// order.
    ///
    /// The top edge runs along `rotation_deg`, the left edge a quarter turn
    /// clockwise from it (straight down at rotation 0).
    pub fn corners(&self) -> [Point; 4] {
        let (sin, cos) = self.rotation_deg.to_radians().sin_cos();
        let ew = (self.size.width * cos, self.size.width * sin);
        let eh = (-self.size.height * sin, self.size.height * cos);
        let o = self.origin;
        [
            o,
            Point::new(o.x + ew.0, o.y + ew.1),
            Point::new(o.x + eh.0, o.y + eh.1),
            Point::new(o.x + ew.0 + eh.0, o.y + ew.1 + eh.1),
        ]
    }

    /// Mean of the four corners.
    pub fn center(&self) -> Point {
        let c = self.corners();
        Point::new(
            (c[0].x + c[1].x + c[2].x + c[3].x) / 4.0,
            (c[0].y + c[1].y + c[2].y + c[3].y) / 4.0,
        )
    }

    /// Origin and size multiplied by `ratio`, rotation unchanged. Converts
    /// between unit systems once a single scale is known (`ratio` ≥ 0).
    pub fn scaled(&self, ratio: f64) -> Rectangle {
        Rectangle {
            origin: Point::new(self.origin.x * ratio, self.origin.y * ratio),
            size: self.size.scaled(ratio),
            rotation_deg: self.rotation_deg,
        }
    }
}

/// Tightest axis-aligned rectangle enclosing every corner of every input
/// rectangle. Rotated inputs are enclosed whole, not just their origins.
pub fn bounding_rectangle(rects: &[Rectangle]) -> Result<Rectangle, GeometryError> {
    if rects.is_empty() {
        return Err(GeometryError::EmptyInput);
    }

    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;

    for rect in rects {
        for corner in rect.corners() {
            min_x = min_x.min(corner.x);
            min_y = min_y.min(corner.y);
            max_x = max_x.max(corner.x);
            max_y = max_y.max(corner.y);
        }
    }

    Ok(Rectangle::axis_aligned(
        Point::new(min_x, min_y),
        Size {
            width: max_x - min_x,
            height: max_y - min_y,
        },
    ))
}

/// Side lengths of a quadrilateral, corners in cyclic order (top-left,
/// top-right, bottom-right, bottom-left): top, right, bottom, left.
pub fn quad_side_lengths(corners: &[Point; 4]) -> [f64; 4] {
    [
        corners[0].distance_to(corners[1]),
        corners[1].distance_to(corners[2]),
        corners[2].distance_to(corners[3]),
        corners[3].distance_to(corners[0]),
    ]
}

/// Interior angle in degrees at each corner of a quadrilateral, corners in
/// cyclic order. Degenerate (zero-length) edges yield a 0° angle.
pub fn quad_interior_angles(corners: &[Point; 4]) -> [f64; 4] {
    let mut out = [0.0; 4];
    for (i, angle) in out.iter_mut().enumerate() {
        let cur = corners[i];
        let prev = corners[(i + 3) % 4];
        let next = corners[(i + 1) % 4];
        let a = (prev.x - cur.x, prev.y - cur.y);
        let b = (next.x - cur.x, next.y - cur.y);
        let na = (a.0 * a.0 + a.1 * a.1).sqrt();
        let nb = (b.0 * b.0 + b.1 * b.1).sqrt();
        if na < f64::EPSILON || nb < f64::EPSILON {
            continue;
        }
        let dot = a.0 * b.0 + a.1 * b.1;
        *angle = (dot / (na * nb)).clamp(-1.0, 1.0).acos().to_degrees();
    }
    out
}

/// Arithmetic mean of four points.
pub fn quad_centroid(corners: &[Point; 4]) -> Point {
    Point::new(
        corners.iter().map(|c| c.x).sum::<f64>() / 4.0,
        corners.iter().map(|c| c.y).sum::<f64>() / 4.0,
    )
}

/// Axis-aligned extent of four points: min corner and spanned size.
pub fn quad_extent(corners: &[Point; 4]) -> (Point, Size) {
    let min_x = corners.iter().map(|c| c.x).fold(f64::INFINITY, f64::min);
    let min_y = corners.iter().map(|c| c.y).fold(f64::INFINITY, f64::min);
    let max_x = corners
        .iter()
        .map(|c| c.x)
        .fold(f64::NEG_INFINITY, f64::max);
    let max_y = corners
        .iter()
        .map(|c| c.y)
        .fold(f64::NEG_INFINITY, f64::max);
    (
        Point::new(min_x, min_y),
        Size {
            width: max_x - min_x,
            height: max_y - min_y,
        },
    )
}
