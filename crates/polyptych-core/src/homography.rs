//! Projective correction between observed and ideal panel positions.
//!
//! Estimation is the normalized DLT: Hartley-normalize both point sets,
//! solve the stacked linear system (direct 8x8 solve for exactly four
//! pairs, SVD otherwise), then denormalize. [`estimate_homography_ransac`]
//! wraps the solver for correspondence sets that contain outliers.

use log::debug;
use nalgebra::{DMatrix, Matrix3, Point2, SMatrix, SVector, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::Point;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    pub fn identity() -> Self {
        Self::new(Matrix3::identity())
    }

    #[inline]
    pub fn apply(&self, p: Point) -> Point {
        let v = self.h * Vector3::new(p.x, p.y, 1.0);
        let w = v[2];
        Point::new(v[0] / w, v[1] / w)
    }

    pub fn inverse(&self) -> Option<Self> {
        self.h.try_inverse().map(Self::new)
    }
}

/// Distance between `dst` and `src` mapped through `h`.
pub fn reprojection_error(h: &Homography, src: Point, dst: Point) -> f64 {
    h.apply(src).distance_to(dst)
}

fn hartley_normalization(cx: f64, cy: f64, mean_dist: f64) -> Matrix3<f64> {
    let s = if mean_dist > 1e-12 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };

    Matrix3::<f64>::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0)
}

fn normalize_points(pts: &[Point]) -> (Vec<Point2<f64>>, Matrix3<f64>) {
    // Hartley normalization: translate to centroid, scale so mean distance = sqrt(2)
    let n = pts.len() as f64;
    let cx = pts.iter().map(|p| p.x).sum::<f64>() / n;
    let cy = pts.iter().map(|p| p.y).sum::<f64>() / n;

    let mean_dist = pts
        .iter()
        .map(|p| ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;

    let t = hartley_normalization(cx, cy, mean_dist);

    let mut out = Vec::with_capacity(pts.len());
    for p in pts {
        let v = t * Vector3::new(p.x, p.y, 1.0);
        out.push(Point2::new(v[0], v[1]));
    }
    (out, t)
}

fn normalize_points4(pts: &[Point; 4]) -> ([Point2<f64>; 4], Matrix3<f64>) {
    let cx = pts.iter().map(|p| p.x).sum::<f64>() / 4.0;
    let cy = pts.iter().map(|p| p.y).sum::<f64>() / 4.0;

    let mean_dist = pts
        .iter()
        .map(|p| ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt())
        .sum::<f64>()
        / 4.0;

    let t = hartley_normalization(cx, cy, mean_dist);

    let mut out = [Point2::new(0.0_f64, 0.0_f64); 4];
    for (i, p) in pts.iter().enumerate() {
        let v = t * Vector3::new(p.x, p.y, 1.0);
        out[i] = Point2::new(v[0], v[1]);
    }

    (out, t)
}

fn normalize_homography(h: Matrix3<f64>) -> Option<Matrix3<f64>> {
    let s = h[(2, 2)];
    if s.abs() < 1e-12 {
        return None;
    }
    Some(h / s)
}

fn denormalize_homography(
    hn: Matrix3<f64>,
    t_src: Matrix3<f64>,
    t_dst: Matrix3<f64>,
) -> Option<Matrix3<f64>> {
    let t_dst_inv = t_dst.try_inverse()?;
    Some(t_dst_inv * hn * t_src)
}

/// Estimate H such that: dst ~ H * src.
///
/// Needs at least 4 correspondences with matching lengths; corner order must
/// be consistent between the two slices.
pub fn estimate_homography(src: &[Point], dst: &[Point]) -> Option<Homography> {
    if src.len() != dst.len() || src.len() < 4 {
        return None;
    }

    if src.len() == 4 {
        let s: &[Point; 4] = src.try_into().ok()?;
        let d: &[Point; 4] = dst.try_into().ok()?;
        return homography_from_4pt(s, d);
    }

    let (s, ts) = normalize_points(src);
    let (d, td) = normalize_points(dst);

    // Build A (2N x 9)
    let n = src.len();
    let mut a = DMatrix::<f64>::zeros(2 * n, 9);

    for k in 0..n {
        let x = s[k].x;
        let y = s[k].y;
        let u = d[k].x;
        let v = d[k].y;

        // [ -x -y -1   0  0  0   u*x u*y u ]
        a[(2 * k, 0)] = -x;
        a[(2 * k, 1)] = -y;
        a[(2 * k, 2)] = -1.0;
        a[(2 * k, 6)] = u * x;
        a[(2 * k, 7)] = u * y;
        a[(2 * k, 8)] = u;

        // [ 0  0  0  -x -y -1   v*x v*y v ]
        a[(2 * k + 1, 3)] = -x;
        a[(2 * k + 1, 4)] = -y;
        a[(2 * k + 1, 5)] = -1.0;
        a[(2 * k + 1, 6)] = v * x;
        a[(2 * k + 1, 7)] = v * y;
        a[(2 * k + 1, 8)] = v;
    }

    // Solve Ah = 0 -> h is the right singular vector with smallest singular value
    let svd = a.svd(true, true);
    let vt = svd.v_t?;
    let last = vt.nrows().checked_sub(1)?;
    let h = vt.row(last); // last row of V^T = last column of V

    let hn =
        Matrix3::<f64>::from_row_slice(&[h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]]);

    // Denormalize: H = Td^{-1} * Hn * Ts
    let h_den = denormalize_homography(hn, ts, td)?;
    let h_den = normalize_homography(h_den)?;

    Some(Homography::new(h_den))
}

/// Compute H such that: dst ~ H * src, from exactly 4 correspondences.
///
/// Corner order must be consistent between `src` and `dst`.
pub fn homography_from_4pt(src: &[Point; 4], dst: &[Point; 4]) -> Option<Homography> {
    // Unknowns: [h11 h12 h13 h21 h22 h23 h31 h32], with h33 = 1
    // For each correspondence (x,y)->(u,v):
    // h11 x + h12 y + h13 - u h31 x - u h32 y = u
    // h21 x + h22 y + h23 - v h31 x - v h32 y = v
    let (src_n, t_src) = normalize_points4(src);
    let (dst_n, t_dst) = normalize_points4(dst);

    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();

    for k in 0..4 {
        let x = src_n[k].x;
        let y = src_n[k].y;
        let u = dst_n[k].x;
        let v = dst_n[k].y;

        let r0 = 2 * k;
        a[(r0, 0)] = x;
        a[(r0, 1)] = y;
        a[(r0, 2)] = 1.0;
        a[(r0, 6)] = -u * x;
        a[(r0, 7)] = -u * y;
        b[r0] = u;

        let r1 = 2 * k + 1;
        a[(r1, 3)] = x;
        a[(r1, 4)] = y;
        a[(r1, 5)] = 1.0;
        a[(r1, 6)] = -v * x;
        a[(r1, 7)] = -v * y;
        b[r1] = v;
    }

    let x = a.lu().solve(&b)?;

    let hn = Matrix3::<f64>::new(
        x[0], x[1], x[2], //
        x[3], x[4], x[5], //
        x[6], x[7], 1.0,
    );

    let h_den = denormalize_homography(hn, t_src, t_dst)?;
    let h_den = normalize_homography(h_den)?;

    Some(Homography::new(h_den))
}

/// Parameters for the robust homography search.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacParams {
    /// Reprojection error below which a pair counts as an inlier, in
    /// destination-frame units.
    pub inlier_threshold: f64,
    /// Iteration budget for the random search.
    pub max_iterations: usize,
    /// Seed for the deterministic sampler.
    pub seed: u64,
}

impl Default for RansacParams {
    fn default() -> Self {
        Self {
            inlier_threshold: 5.0,
            max_iterations: 500,
            seed: 7,
        }
    }
}

fn has_collinear_triple(pts: &[Point; 4]) -> bool {
    for i in 0..2 {
        for j in (i + 1)..3 {
            for k in (j + 1)..4 {
                let ux = pts[j].x - pts[i].x;
                let uy = pts[j].y - pts[i].y;
                let vx = pts[k].x - pts[i].x;
                let vy = pts[k].y - pts[i].y;
                let cross = ux * vy - uy * vx;
                let scale = (ux * ux + uy * uy).max(vx * vx + vy * vy);
                if cross.abs() < 1e-9 * scale.max(1.0) {
                    return true;
                }
            }
        }
    }
    false
}

fn sample_distinct4(rng: &mut StdRng, n: usize) -> [usize; 4] {
    let mut indices = [0usize; 4];
    loop {
        for idx in &mut indices {
            *idx = rng.gen_range(0..n);
        }
        let mut ok = true;
        for i in 0..4 {
            for j in (i + 1)..4 {
                if indices[i] == indices[j] {
                    ok = false;
                }
            }
        }
        if ok {
            return indices;
        }
    }
}

/// Robust estimate of H (dst ~ H * src) tolerating outlier pairs.
///
/// Runs a fixed-budget random search over 4-pair samples, keeps the model
/// with the most inliers, and refits on the full inlier set. Returns `None`
/// when fewer than 4 pairs are supplied or no model reaches 4 inliers.
pub fn estimate_homography_ransac(
    src: &[Point],
    dst: &[Point],
    params: &RansacParams,
) -> Option<Homography> {
    let n = src.len();
    if n != dst.len() || n < 4 {
        return None;
    }
    if n == 4 {
        let s: &[Point; 4] = src.try_into().ok()?;
        let d: &[Point; 4] = dst.try_into().ok()?;
        if has_collinear_triple(s) || has_collinear_triple(d) {
            return None;
        }
        return homography_from_4pt(s, d);
    }

    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut best_count = 0usize;
    let mut best_mask = vec![false; n];
    let mut best_h: Option<Homography> = None;

    for _ in 0..params.max_iterations {
        let indices = sample_distinct4(&mut rng, n);
        let s4 = indices.map(|i| src[i]);
        let d4 = indices.map(|i| dst[i]);
        if has_collinear_triple(&s4) || has_collinear_triple(&d4) {
            continue;
        }

        let Some(h) = homography_from_4pt(&s4, &d4) else {
            continue;
        };

        let mut mask = vec![false; n];
        let mut count = 0usize;
        for i in 0..n {
            if reprojection_error(&h, src[i], dst[i]) < params.inlier_threshold {
                mask[i] = true;
                count += 1;
            }
        }

        if count > best_count {
            best_count = count;
            best_mask = mask;
            best_h = Some(h);

            // Saturated consensus, stop searching.
            if count * 10 > n * 9 {
                break;
            }
        }
    }

    let best = best_h?;
    if best_count < 4 {
        return None;
    }
    debug!("homography consensus: {best_count}/{n} inliers");

    let inlier_src: Vec<Point> = (0..n).filter(|&i| best_mask[i]).map(|i| src[i]).collect();
    let inlier_dst: Vec<Point> = (0..n).filter(|&i| best_mask[i]).map(|i| dst[i]).collect();

    Some(estimate_homography(&inlier_src, &inlier_dst).unwrap_or(best))
}
