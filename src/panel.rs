//! Side-by-side composition of result images

use image::imageops::replace;
use image::{GrayImage, Luma};

/// Gap between panels, in pixels
pub const PANEL_GAP: u32 = 10;

/// Place `images` left to right on a white canvas, top-aligned
pub fn side_by_side(images: &[&GrayImage]) -> GrayImage {
    let height = images.iter().map(|img| img.height()).max().unwrap_or(0);
    let width = images.iter().map(|img| img.width()).sum::<u32>()
        + PANEL_GAP * images.len().saturating_sub(1) as u32;

    let mut canvas = GrayImage::from_pixel(width, height, Luma([255]));
    let mut x = 0i64;
    for img in images {
        replace(&mut canvas, *img, x, 0);
        x += (img.width() + PANEL_GAP) as i64;
    }
    canvas
}
