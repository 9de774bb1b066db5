//! Saturating per-channel image arithmetic
//!
//! Each operation has a scalar version and a 16-lane SIMD version built on
//! `wide::u8x16`. Both produce identical output.

use crate::error::{MatchError, MatchResult};
use clap::ValueEnum;
use image::RgbImage;
use serde::Serialize;
use wide::u8x16;

const LANES: usize = 16;

/// Arithmetic operation on two images
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ArithOp {
    /// Sum clamped at 255
    Add,
    /// Difference clamped at 0
    Subtract,
}

impl ArithOp {
    pub fn name(self) -> &'static str {
        match self {
            ArithOp::Add => "add",
            ArithOp::Subtract => "subtract",
        }
    }

    fn scalar(self, a: u8, b: u8) -> u8 {
        match self {
            ArithOp::Add => a.saturating_add(b),
            ArithOp::Subtract => a.saturating_sub(b),
        }
    }

    fn lanes(self, a: u8x16, b: u8x16) -> u8x16 {
        match self {
            ArithOp::Add => a.saturating_add(b),
            ArithOp::Subtract => a.saturating_sub(b),
        }
    }
}

/// Implementation used for the per-channel loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Backend {
    Scalar,
    Simd,
}

impl Backend {
    pub fn name(self) -> &'static str {
        match self {
            Backend::Scalar => "scalar",
            Backend::Simd => "simd",
        }
    }
}

/// Apply `op` to every channel of `first` and `second`
pub fn apply(op: ArithOp, backend: Backend, first: &RgbImage, second: &RgbImage) -> MatchResult<RgbImage> {
    if first.dimensions() != second.dimensions() {
        return Err(MatchError::DimensionMismatch {
            first: first.dimensions(),
            second: second.dimensions(),
        });
    }

    let (width, height) = first.dimensions();
    let mut result = RgbImage::new(width, height);
    match backend {
        Backend::Scalar => apply_scalar(op, first.as_raw(), second.as_raw(), &mut result),
        Backend::Simd => apply_simd(op, first.as_raw(), second.as_raw(), &mut result),
    }
    Ok(result)
}

pub fn add(first: &RgbImage, second: &RgbImage, backend: Backend) -> MatchResult<RgbImage> {
    apply(ArithOp::Add, backend, first, second)
}

pub fn subtract(first: &RgbImage, second: &RgbImage, backend: Backend) -> MatchResult<RgbImage> {
    apply(ArithOp::Subtract, backend, first, second)
}

fn apply_scalar(op: ArithOp, a: &[u8], b: &[u8], out: &mut [u8]) {
    for ((o, &x), &y) in out.iter_mut().zip(a).zip(b) {
        *o = op.scalar(x, y);
    }
}

fn apply_simd(op: ArithOp, a: &[u8], b: &[u8], out: &mut [u8]) {
    let mut out_chunks = out.chunks_exact_mut(LANES);
    let mut a_chunks = a.chunks_exact(LANES);
    let mut b_chunks = b.chunks_exact(LANES);

    for ((o, x), y) in (&mut out_chunks).zip(&mut a_chunks).zip(&mut b_chunks) {
        let mut xa = [0u8; LANES];
        let mut ya = [0u8; LANES];
        xa.copy_from_slice(x);
        ya.copy_from_slice(y);
        let r = op.lanes(u8x16::new(xa), u8x16::new(ya));
        o.copy_from_slice(&r.to_array());
    }

    // Tail shorter than one vector
    apply_scalar(
        op,
        a_chunks.remainder(),
        b_chunks.remainder(),
        out_chunks.into_remainder(),
    );
}
