//! Scale-space extrema detection, sub-pixel refinement and orientation assignment

use super::SiftConfig;
use super::keypoint::{KeyPoint, ScaleLocation};
use super::scale_space::{FloatImage, ScaleSpace};
use nalgebra::{Matrix3, Vector3};
use std::f32::consts::TAU;

/// Pixels near the border of every octave are never searched
const IMG_BORDER: i32 = 5;
const MAX_INTERP_STEPS: usize = 5;
const ORI_HIST_BINS: usize = 36;
/// Orientation window sigma relative to keypoint scale
const ORI_SIG_FCTR: f32 = 1.5;
const ORI_RADIUS: f32 = 3.0 * ORI_SIG_FCTR;
const ORI_PEAK_RATIO: f32 = 0.8;

#[inline]
pub(crate) fn at(image: &FloatImage, x: i32, y: i32) -> f32 {
    image.as_raw()[y as usize * image.width() as usize + x as usize]
}

/// Find oriented keypoints in every octave of `space`
pub(crate) fn detect(space: &ScaleSpace, config: &SiftConfig) -> Vec<(KeyPoint, ScaleLocation)> {
    let n = config.n_octave_layers;
    let threshold = 0.5 * config.contrast_threshold / n as f32;
    let mut found = Vec::new();

    for (octave, dogs) in space.dogs.iter().enumerate() {
        let (w, h) = (dogs[0].width() as i32, dogs[0].height() as i32);
        if w <= 2 * IMG_BORDER || h <= 2 * IMG_BORDER {
            continue;
        }

        for layer in 1..=n {
            let (prev, cur, next) = (&dogs[layer - 1], &dogs[layer], &dogs[layer + 1]);
            for y in IMG_BORDER..h - IMG_BORDER {
                for x in IMG_BORDER..w - IMG_BORDER {
                    let v = at(cur, x, y);
                    if v.abs() <= threshold || !is_extremum(prev, cur, next, x, y, v) {
                        continue;
                    }
                    let Some(extremum) = refine(dogs, octave, layer, x, y, config) else {
                        continue;
                    };
                    let gaussian = &space.gaussians[octave][extremum.location.layer];
                    for angle in orientations(gaussian, &extremum.location) {
                        found.push(extremum.to_keypoint(space, angle));
                    }
                }
            }
        }
    }

    found
}

fn is_extremum(prev: &FloatImage, cur: &FloatImage, next: &FloatImage, x: i32, y: i32, v: f32) -> bool {
    let is_max = v > 0.0;
    for (img, is_center_layer) in [(prev, false), (cur, true), (next, false)] {
        for dy in -1..=1 {
            for dx in -1..=1 {
                if is_center_layer && dx == 0 && dy == 0 {
                    continue;
                }
                let other = at(img, x + dx, y + dy);
                if (is_max && other > v) || (!is_max && other < v) {
                    return false;
                }
            }
        }
    }
    true
}

struct Extremum {
    location: ScaleLocation,
    response: f32,
}

impl Extremum {
    fn to_keypoint(&self, space: &ScaleSpace, angle: f32) -> (KeyPoint, ScaleLocation) {
        let scale = space.octave_scale(self.location.octave);
        let keypoint = KeyPoint {
            x: self.location.x * scale,
            y: self.location.y * scale,
            size: self.location.sigma * scale * 2.0,
            angle: angle.to_degrees().rem_euclid(360.0),
            response: self.response,
            octave: self.location.octave,
            layer: self.location.layer,
        };
        (keypoint, self.location)
    }
}

/// Derivatives of the DoG at an integer scale-space position
struct LocalFit {
    value: f64,
    gradient: Vector3<f64>,
    hessian: Matrix3<f64>,
}

fn local_fit(dogs: &[FloatImage], layer: usize, x: i32, y: i32) -> LocalFit {
    let (prev, cur, next) = (&dogs[layer - 1], &dogs[layer], &dogs[layer + 1]);
    let c = |img: &FloatImage, dx: i32, dy: i32| at(img, x + dx, y + dy) as f64;

    let value = c(cur, 0, 0);
    let gradient = Vector3::new(
        (c(cur, 1, 0) - c(cur, -1, 0)) * 0.5,
        (c(cur, 0, 1) - c(cur, 0, -1)) * 0.5,
        (c(next, 0, 0) - c(prev, 0, 0)) * 0.5,
    );

    let v2 = value * 2.0;
    let dxx = c(cur, 1, 0) + c(cur, -1, 0) - v2;
    let dyy = c(cur, 0, 1) + c(cur, 0, -1) - v2;
    let dss = c(next, 0, 0) + c(prev, 0, 0) - v2;
    let dxy = (c(cur, 1, 1) - c(cur, -1, 1) - c(cur, 1, -1) + c(cur, -1, -1)) * 0.25;
    let dxs = (c(next, 1, 0) - c(next, -1, 0) - c(prev, 1, 0) + c(prev, -1, 0)) * 0.25;
    let dys = (c(next, 0, 1) - c(next, 0, -1) - c(prev, 0, 1) + c(prev, 0, -1)) * 0.25;

    LocalFit {
        value,
        gradient,
        hessian: Matrix3::new(dxx, dxy, dxs, dxy, dyy, dys, dxs, dys, dss),
    }
}

/// Newton refinement of an extremum, followed by contrast and edge rejection
fn refine(
    dogs: &[FloatImage],
    octave: usize,
    layer: usize,
    x: i32,
    y: i32,
    config: &SiftConfig,
) -> Option<Extremum> {
    let n = config.n_octave_layers as i32;
    let (w, h) = (dogs[0].width() as i32, dogs[0].height() as i32);
    let (mut x, mut y, mut layer) = (x, y, layer as i32);

    let mut converged = None;
    for _ in 0..MAX_INTERP_STEPS {
        let fit = local_fit(dogs, layer as usize, x, y);
        let offset = -fit.hessian.lu().solve(&fit.gradient)?;

        if offset.iter().all(|v| v.abs() < 0.5) {
            converged = Some((fit, offset));
            break;
        }
        if offset.iter().any(|v| !v.is_finite() || v.abs() > (w.max(h)) as f64) {
            return None;
        }

        x += offset[0].round() as i32;
        y += offset[1].round() as i32;
        layer += offset[2].round() as i32;

        if layer < 1
            || layer > n
            || x < IMG_BORDER
            || x >= w - IMG_BORDER
            || y < IMG_BORDER
            || y >= h - IMG_BORDER
        {
            return None;
        }
    }

    let (fit, offset) = converged?;

    let contrast = fit.value + 0.5 * fit.gradient.dot(&offset);
    if contrast.abs() * (n as f64) < config.contrast_threshold as f64 {
        return None;
    }

    let (dxx, dyy, dxy) = (fit.hessian[(0, 0)], fit.hessian[(1, 1)], fit.hessian[(0, 1)]);
    let trace = dxx + dyy;
    let det = dxx * dyy - dxy * dxy;
    let r = config.edge_threshold as f64;
    if det <= 0.0 || trace * trace * r >= (r + 1.0) * (r + 1.0) * det {
        return None;
    }

    let scale_offset = offset[2] as f32;
    Some(Extremum {
        location: ScaleLocation {
            octave,
            layer: layer as usize,
            x: x as f32 + offset[0] as f32,
            y: y as f32 + offset[1] as f32,
            sigma: config.sigma * 2f32.powf((layer as f32 + scale_offset) / n as f32),
        },
        response: contrast.abs() as f32,
    })
}

/// Dominant gradient orientations (radians) around a keypoint
pub(crate) fn orientations(gaussian: &FloatImage, location: &ScaleLocation) -> Vec<f32> {
    let (w, h) = (gaussian.width() as i32, gaussian.height() as i32);
    let (px, py) = (location.x.round() as i32, location.y.round() as i32);
    let radius = (ORI_RADIUS * location.sigma).round() as i32;
    let weight_scale = -1.0 / (2.0 * (ORI_SIG_FCTR * location.sigma).powi(2));

    let mut raw = [0f32; ORI_HIST_BINS];
    for i in -radius..=radius {
        let yy = py + i;
        if yy <= 0 || yy >= h - 1 {
            continue;
        }
        for j in -radius..=radius {
            let xx = px + j;
            if xx <= 0 || xx >= w - 1 {
                continue;
            }
            let dx = at(gaussian, xx + 1, yy) - at(gaussian, xx - 1, yy);
            let dy = at(gaussian, xx, yy + 1) - at(gaussian, xx, yy - 1);
            let magnitude = (dx * dx + dy * dy).sqrt();
            let weight = (((i * i + j * j) as f32) * weight_scale).exp();
            let angle = dy.atan2(dx).rem_euclid(TAU);
            let bin = ((angle * ORI_HIST_BINS as f32 / TAU).round() as usize) % ORI_HIST_BINS;
            raw[bin] += weight * magnitude;
        }
    }

    let bins = ORI_HIST_BINS;
    let hist: Vec<f32> = (0..bins)
        .map(|i| {
            let get = |offset: isize| raw[(i as isize + offset).rem_euclid(bins as isize) as usize];
            (get(-2) + get(2)) / 16.0 + (get(-1) + get(1)) * 4.0 / 16.0 + get(0) * 6.0 / 16.0
        })
        .collect();

    let max = hist.iter().copied().fold(0f32, f32::max);
    if max <= 0.0 {
        return Vec::new();
    }

    let mut angles = Vec::new();
    for i in 0..bins {
        let left = hist[(i + bins - 1) % bins];
        let right = hist[(i + 1) % bins];
        let v = hist[i];
        if v > left && v > right && v >= ORI_PEAK_RATIO * max {
            let denom = left - 2.0 * v + right;
            let shift = if denom.abs() > f32::EPSILON {
                0.5 * (left - right) / denom
            } else {
                0.0
            };
            let bin = (i as f32 + shift).rem_euclid(bins as f32);
            angles.push(bin * TAU / bins as f32);
        }
    }
    angles
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma};

    #[test]
    fn test_orientation_of_horizontal_ramp() {
        // Intensity grows with x: gradient points along +x (angle 0)
        let img: FloatImage = ImageBuffer::from_fn(41, 41, |x, _| Luma([x as f32 / 40.0]));
        let location = ScaleLocation {
            octave: 0,
            layer: 1,
            x: 20.0,
            y: 20.0,
            sigma: 2.0,
        };
        let angles = orientations(&img, &location);
        assert_eq!(angles.len(), 1);
        let a = angles[0];
        assert!(a < 0.1 || a > TAU - 0.1, "angle was {a}");
    }

    #[test]
    fn test_orientation_of_vertical_ramp() {
        // Intensity grows with y (downwards): angle pi/2
        let img: FloatImage = ImageBuffer::from_fn(41, 41, |_, y| Luma([y as f32 / 40.0]));
        let location = ScaleLocation {
            octave: 0,
            layer: 1,
            x: 20.0,
            y: 20.0,
            sigma: 2.0,
        };
        let angles = orientations(&img, &location);
        assert_eq!(angles.len(), 1);
        assert!((angles[0] - std::f32::consts::FRAC_PI_2).abs() < 0.1);
    }

    #[test]
    fn test_flat_patch_has_no_orientation() {
        let img: FloatImage = ImageBuffer::from_pixel(21, 21, Luma([0.5]));
        let location = ScaleLocation {
            octave: 0,
            layer: 1,
            x: 10.0,
            y: 10.0,
            sigma: 1.6,
        };
        assert!(orientations(&img, &location).is_empty());
    }

    #[test]
    fn test_extremum_check() {
        let mut cur: FloatImage = ImageBuffer::from_pixel(5, 5, Luma([0.0]));
        let flat: FloatImage = ImageBuffer::from_pixel(5, 5, Luma([0.0]));
        cur.put_pixel(2, 2, Luma([1.0]));
        assert!(is_extremum(&flat, &cur, &flat, 2, 2, 1.0));

        cur.put_pixel(1, 1, Luma([2.0]));
        assert!(!is_extremum(&flat, &cur, &flat, 2, 2, 1.0));
    }
}
