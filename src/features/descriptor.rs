//! 128-dimensional SIFT descriptors

use super::detector::at;
use super::keypoint::{DESCRIPTOR_SIZE, Descriptor, ScaleLocation};
use super::scale_space::FloatImage;
use std::f32::consts::{SQRT_2, TAU};

/// Spatial cells per side
const DESCR_WIDTH: usize = 4;
/// Orientation bins per cell
const DESCR_HIST_BINS: usize = 8;
/// Cell size relative to keypoint scale
const DESCR_SCL_FCTR: f32 = 3.0;
const DESCR_MAG_THR: f32 = 0.2;

/// Compute the descriptor of a keypoint with orientation `angle` (radians)
pub(crate) fn describe(gaussian: &FloatImage, location: &ScaleLocation, angle: f32) -> Descriptor {
    let d = DESCR_WIDTH;
    let n = DESCR_HIST_BINS;
    let (w, h) = (gaussian.width() as i32, gaussian.height() as i32);
    let (px, py) = (location.x.round() as i32, location.y.round() as i32);

    let hist_width = DESCR_SCL_FCTR * location.sigma;
    let diagonal = (w as f32).hypot(h as f32);
    let radius = (hist_width * SQRT_2 * (d as f32 + 1.0) * 0.5)
        .round()
        .min(diagonal) as i32;

    let cos_t = angle.cos() / hist_width;
    let sin_t = angle.sin() / hist_width;
    let exp_scale = -1.0 / (d as f32 * d as f32 * 0.5);
    let bins_per_rad = n as f32 / TAU;
    let half = d as f32 / 2.0 - 0.5;

    // Padded histogram: one extra cell on each side and one wrap-around bin
    let row_stride = (d + 2) * (n + 2);
    let col_stride = n + 2;
    let mut hist = vec![0f32; (d + 2) * (d + 2) * (n + 2)];

    for i in -radius..=radius {
        for j in -radius..=radius {
            let x_rot = j as f32 * cos_t + i as f32 * sin_t;
            let y_rot = -(j as f32) * sin_t + i as f32 * cos_t;
            let rbin = y_rot + half;
            let cbin = x_rot + half;

            if rbin <= -1.0 || rbin >= d as f32 || cbin <= -1.0 || cbin >= d as f32 {
                continue;
            }

            let (r, c) = (py + i, px + j);
            if r <= 0 || r >= h - 1 || c <= 0 || c >= w - 1 {
                continue;
            }

            let dx = at(gaussian, c + 1, r) - at(gaussian, c - 1, r);
            let dy = at(gaussian, c, r + 1) - at(gaussian, c, r - 1);
            let magnitude = (dx * dx + dy * dy).sqrt();
            let weight = ((x_rot * x_rot + y_rot * y_rot) * exp_scale).exp();
            let obin = (dy.atan2(dx) - angle).rem_euclid(TAU) * bins_per_rad;

            let (r0, c0, o0) = (rbin.floor(), cbin.floor(), obin.floor());
            let (rf, cf, of) = (rbin - r0, cbin - c0, obin - o0);
            let o0 = (o0 as i32).rem_euclid(n as i32) as usize;

            let mag = magnitude * weight;
            let v_r1 = mag * rf;
            let v_r0 = mag - v_r1;
            let v_rc11 = v_r1 * cf;
            let v_rc10 = v_r1 - v_rc11;
            let v_rc01 = v_r0 * cf;
            let v_rc00 = v_r0 - v_rc01;
            let v_rco111 = v_rc11 * of;
            let v_rco110 = v_rc11 - v_rco111;
            let v_rco101 = v_rc10 * of;
            let v_rco100 = v_rc10 - v_rco101;
            let v_rco011 = v_rc01 * of;
            let v_rco010 = v_rc01 - v_rco011;
            let v_rco001 = v_rc00 * of;
            let v_rco000 = v_rc00 - v_rco001;

            let idx = ((r0 as i32 + 1) as usize) * row_stride + ((c0 as i32 + 1) as usize) * col_stride + o0;
            hist[idx] += v_rco000;
            hist[idx + 1] += v_rco001;
            hist[idx + col_stride] += v_rco010;
            hist[idx + col_stride + 1] += v_rco011;
            hist[idx + row_stride] += v_rco100;
            hist[idx + row_stride + 1] += v_rco101;
            hist[idx + row_stride + col_stride] += v_rco110;
            hist[idx + row_stride + col_stride + 1] += v_rco111;
        }
    }

    let mut descriptor = [0f32; DESCRIPTOR_SIZE];
    for i in 0..d {
        for j in 0..d {
            let idx = (i + 1) * row_stride + (j + 1) * col_stride;
            // Fold the wrap-around bins back into the circular histogram
            hist[idx] += hist[idx + n];
            hist[idx + 1] += hist[idx + n + 1];
            let out = (i * d + j) * n;
            descriptor[out..out + n].copy_from_slice(&hist[idx..idx + n]);
        }
    }

    normalize(&mut descriptor);
    descriptor
}

/// Unit-normalize, clip large components, and renormalize
fn normalize(descriptor: &mut Descriptor) {
    let norm = descriptor.iter().map(|v| v * v).sum::<f32>().sqrt();
    let threshold = norm * DESCR_MAG_THR;
    for v in descriptor.iter_mut() {
        *v = v.min(threshold);
    }

    let norm = descriptor.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for v in descriptor.iter_mut() {
            *v /= norm;
        }
    }
}
