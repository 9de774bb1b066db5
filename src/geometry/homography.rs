//! Planar homography estimation
//!
//! Normalized DLT (Hartley) over point correspondences, wrapped in the
//! generic RANSAC engine for outlier-tolerant fitting.

use super::ransac::{Ransac, RansacConfig, RobustModel};
use nalgebra::{DMatrix, Matrix3, Vector3};
use serde::{Serialize, Serializer};

const EPS: f64 = 1e-10;

/// A matched point pair: `src` in template space, `dst` in target space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correspondence {
    pub src: (f64, f64),
    pub dst: (f64, f64),
}

impl Correspondence {
    pub fn new(src: (f64, f64), dst: (f64, f64)) -> Self {
        Self { src, dst }
    }
}

/// 3x3 projective transform, normalized so that `h33 = 1` when possible
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography(Matrix3<f64>);

impl Homography {
    pub fn identity() -> Self {
        Self(Matrix3::identity())
    }

    /// Wrap a raw matrix. Returns `None` for singular or non-finite input.
    pub fn from_matrix(m: Matrix3<f64>) -> Option<Self> {
        if m.iter().any(|v| !v.is_finite()) || m.determinant().abs() < EPS {
            return None;
        }
        let scale = if m[(2, 2)].abs() > EPS { m[(2, 2)] } else { m.norm() };
        Some(Self(m / scale))
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.0
    }

    /// Fit a homography to at least four correspondences (least squares when more)
    pub fn from_correspondences(pairs: &[Correspondence]) -> Option<Self> {
        if pairs.len() < 4 {
            return None;
        }

        let (src_t, src_n) = normalize(pairs.iter().map(|p| p.src))?;
        let (dst_t, dst_n) = normalize(pairs.iter().map(|p| p.dst))?;

        let rows = pairs.len() * 2;
        let mut a = DMatrix::<f64>::zeros(rows.max(9), 9);
        for (i, (&(x1, y1), &(x2, y2))) in src_n.iter().zip(&dst_n).enumerate() {
            let r = 2 * i;
            a[(r, 0)] = -x1;
            a[(r, 1)] = -y1;
            a[(r, 2)] = -1.0;
            a[(r, 6)] = x2 * x1;
            a[(r, 7)] = x2 * y1;
            a[(r, 8)] = x2;

            a[(r + 1, 3)] = -x1;
            a[(r + 1, 4)] = -y1;
            a[(r + 1, 5)] = -1.0;
            a[(r + 1, 6)] = y2 * x1;
            a[(r + 1, 7)] = y2 * y1;
            a[(r + 1, 8)] = y2;
        }

        // Null vector of A: right singular vector of the smallest singular value
        let svd = a.svd(false, true);
        let v_t = svd.v_t?;
        let (min_idx, _) = svd
            .singular_values
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))?;
        let h = v_t.row(min_idx);

        let hn = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]);
        let dst_inv = dst_t.try_inverse()?;
        Self::from_matrix(dst_inv * hn * src_t)
    }

    /// Map a point through the transform. `None` when it lands at infinity.
    pub fn project(&self, (x, y): (f64, f64)) -> Option<(f64, f64)> {
        let p = self.0 * Vector3::new(x, y, 1.0);
        if p[2].abs() < EPS {
            return None;
        }
        Some((p[0] / p[2], p[1] / p[2]))
    }

    pub fn project_all(&self, points: &[(f64, f64)]) -> Option<Vec<(f64, f64)>> {
        points.iter().map(|&p| self.project(p)).collect()
    }

    /// Euclidean distance between the projected `src` and `dst`
    pub fn transfer_error(&self, pair: &Correspondence) -> f64 {
        match self.project(pair.src) {
            Some((x, y)) => ((x - pair.dst.0).powi(2) + (y - pair.dst.1).powi(2)).sqrt(),
            None => f64::INFINITY,
        }
    }

    pub fn inverse(&self) -> Option<Self> {
        self.0.try_inverse().and_then(Self::from_matrix)
    }

    /// Largest corner displacement between two transforms over a `width`x`height` frame
    pub fn max_corner_deviation(&self, other: &Homography, width: f64, height: f64) -> f64 {
        [(0.0, 0.0), (0.0, height), (width, height), (width, 0.0)]
            .iter()
            .map(|&c| match (self.project(c), other.project(c)) {
                (Some(a), Some(b)) => ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt(),
                _ => f64::INFINITY,
            })
            .fold(0.0, f64::max)
    }
}

impl Serialize for Homography {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let rows: [[f64; 3]; 3] = std::array::from_fn(|r| std::array::from_fn(|c| self.0[(r, c)]));
        rows.serialize(serializer)
    }
}

/// Similarity transform moving the centroid to the origin with mean distance sqrt(2)
fn normalize(points: impl Iterator<Item = (f64, f64)>) -> Option<(Matrix3<f64>, Vec<(f64, f64)>)> {
    let points: Vec<(f64, f64)> = points.collect();
    let n = points.len() as f64;
    let cx = points.iter().map(|p| p.0).sum::<f64>() / n;
    let cy = points.iter().map(|p| p.1).sum::<f64>() / n;
    let mean_dist = points
        .iter()
        .map(|p| ((p.0 - cx).powi(2) + (p.1 - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    if mean_dist < EPS {
        return None;
    }

    let s = std::f64::consts::SQRT_2 / mean_dist;
    let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);
    let normalized = points
        .iter()
        .map(|p| (s * (p.0 - cx), s * (p.1 - cy)))
        .collect();
    Some((t, normalized))
}

/// Twice the signed area of the triangle `a, b, c`
fn cross(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> f64 {
    (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0)
}

fn has_collinear_triple(points: &[(f64, f64)]) -> bool {
    let n = points.len();
    for i in 0..n {
        for j in (i + 1)..n {
            for k in (j + 1)..n {
                if cross(points[i], points[j], points[k]).abs() < 1e-6 {
                    return true;
                }
            }
        }
    }
    false
}

/// RANSAC model adapter for homographies
pub struct HomographyEstimator;

impl RobustModel<Correspondence> for HomographyEstimator {
    type Model = Homography;

    fn min_sample_size(&self) -> usize {
        4
    }

    fn is_degenerate(&self, sample: &[&Correspondence]) -> bool {
        let src: Vec<_> = sample.iter().map(|c| c.src).collect();
        let dst: Vec<_> = sample.iter().map(|c| c.dst).collect();
        has_collinear_triple(&src) || has_collinear_triple(&dst)
    }

    fn estimate(&self, data: &[&Correspondence]) -> Option<Homography> {
        let pairs: Vec<Correspondence> = data.iter().map(|&&c| c).collect();
        Homography::from_correspondences(&pairs)
    }

    fn residual(&self, model: &Homography, data: &Correspondence) -> f64 {
        model.transfer_error(data)
    }
}

/// Outcome of a robust homography fit
#[derive(Debug, Clone)]
pub struct HomographyFit {
    pub homography: Homography,
    /// Inlier flags, aligned with the input slice order
    pub inliers: Vec<bool>,
    pub num_inliers: usize,
}

/// Fit a homography to `pairs` with RANSAC.
///
/// Correspondences are sorted into a canonical order before sampling, so the
/// result does not depend on the order of `pairs`.
pub fn find_homography(pairs: &[Correspondence], config: &RansacConfig) -> Option<HomographyFit> {
    if pairs.len() < 4 {
        log::debug!("Homography needs 4 correspondences, got {}", pairs.len());
        return None;
    }

    let mut order: Vec<usize> = (0..pairs.len()).collect();
    order.sort_by(|&a, &b| {
        let (pa, pb) = (&pairs[a], &pairs[b]);
        pa.src
            .0
            .total_cmp(&pb.src.0)
            .then(pa.src.1.total_cmp(&pb.src.1))
            .then(pa.dst.0.total_cmp(&pb.dst.0))
            .then(pa.dst.1.total_cmp(&pb.dst.1))
    });
    let canonical: Vec<Correspondence> = order.iter().map(|&i| pairs[i]).collect();

    let result = Ransac::new(config.clone()).run(&HomographyEstimator, &canonical);
    let homography = result.model?;

    let mut inliers = vec![false; pairs.len()];
    for (canonical_idx, &original_idx) in order.iter().enumerate() {
        inliers[original_idx] = result.inliers[canonical_idx];
    }

    Some(HomographyFit {
        homography,
        inliers,
        num_inliers: result.num_inliers,
    })
}
