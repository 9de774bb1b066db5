//! Drawing of match overlays on grayscale images
//!
//! Thick strokes are rasterized as filled quads per segment with round joins,
//! optionally edged with Wu anti-aliased lines. Segments are clipped to a
//! frame slightly larger than the image before rasterizing.

use image::{GrayImage, Luma};
use imageproc::drawing::{
    draw_antialiased_line_segment_mut, draw_filled_circle_mut, draw_filled_rect_mut,
    draw_line_segment_mut, draw_polygon_mut,
};
use imageproc::pixelops::interpolate;
use imageproc::point::Point;
use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};

/// Stroke style for overlays
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayStyle {
    /// Gray level of the stroke (0 = black)
    pub intensity: u8,
    /// Stroke width in pixels
    pub thickness: u32,
    /// Smooth stroke edges
    pub anti_aliased: bool,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            intensity: 0,
            thickness: 10,
            anti_aliased: true,
        }
    }
}

impl OverlayStyle {
    fn color(&self) -> Luma<u8> {
        Luma([self.intensity])
    }

    fn half_width(&self) -> f64 {
        self.thickness.max(1) as f64 / 2.0
    }
}

/// Draw a closed polyline through `points` onto `image`.
///
/// Points may lie outside the image; everything is clipped.
pub fn draw_closed_polyline(image: &mut GrayImage, points: &[(f64, f64)], style: &OverlayStyle) {
    if points.len() < 2 || image.width() == 0 || image.height() == 0 {
        return;
    }

    // Clip against the image grown by a stroke width so caps and joins stay off-canvas
    let margin = style.thickness.max(1) as f64 + 2.0;
    let lo = (-margin, -margin);
    let hi = (image.width() as f64 - 1.0 + margin, image.height() as f64 - 1.0 + margin);

    for i in 0..points.len() {
        let (start, end) = (points[i], points[(i + 1) % points.len()]);
        if let Some((start, end)) = clip_segment(start, end, lo, hi) {
            draw_thick_segment(image, start, end, style);
        }
    }

    let radius = style.half_width().round() as i32;
    if radius >= 1 {
        for &(x, y) in points {
            if x >= lo.0 && x <= hi.0 && y >= lo.1 && y <= hi.1 {
                draw_filled_circle_mut(image, (x.round() as i32, y.round() as i32), radius, style.color());
            }
        }
    }
}

/// Liang-Barsky clipping of the segment `start`-`end` to the box `lo`..`hi`
fn clip_segment(
    start: (f64, f64),
    end: (f64, f64),
    lo: (f64, f64),
    hi: (f64, f64),
) -> Option<((f64, f64), (f64, f64))> {
    if ![start.0, start.1, end.0, end.1].iter().all(|v| v.is_finite()) {
        return None;
    }

    let (dx, dy) = (end.0 - start.0, end.1 - start.1);
    let (mut t0, mut t1) = (0.0f64, 1.0f64);

    for (p, q) in [
        (-dx, start.0 - lo.0),
        (dx, hi.0 - start.0),
        (-dy, start.1 - lo.1),
        (dy, hi.1 - start.1),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let t = q / p;
        if p < 0.0 {
            t0 = t0.max(t);
        } else {
            t1 = t1.min(t);
        }
        if t0 > t1 {
            return None;
        }
    }

    Some((
        (start.0 + t0 * dx, start.1 + t0 * dy),
        (start.0 + t1 * dx, start.1 + t1 * dy),
    ))
}

fn draw_thick_segment(
    image: &mut GrayImage,
    start: (f64, f64),
    end: (f64, f64),
    style: &OverlayStyle,
) {
    let (dx, dy) = (end.0 - start.0, end.1 - start.1);
    let length = (dx * dx + dy * dy).sqrt();
    if length < 1e-9 {
        return;
    }

    let half = style.half_width();
    let (nx, ny) = (-dy / length * half, dx / length * half);

    let left_start = (start.0 + nx, start.1 + ny);
    let left_end = (end.0 + nx, end.1 + ny);
    let right_start = (start.0 - nx, start.1 - ny);
    let right_end = (end.0 - nx, end.1 - ny);

    let quad = [
        to_point(left_start),
        to_point(left_end),
        to_point(right_end),
        to_point(right_start),
    ];

    // draw_polygon_mut rejects polygons whose first and last points coincide
    if quad[0] == quad[3] || quad[0] == quad[1] {
        draw_line_segment_mut(
            image,
            (start.0 as f32, start.1 as f32),
            (end.0 as f32, end.1 as f32),
            style.color(),
        );
    } else {
        draw_polygon_mut(image, &quad, style.color());
    }

    if style.anti_aliased {
        for (a, b) in [(left_start, left_end), (right_start, right_end)] {
            draw_antialiased_line_segment_mut(
                image,
                (a.0.round() as i32, a.1.round() as i32),
                (b.0.round() as i32, b.1.round() as i32),
                style.color(),
                interpolate,
            );
        }
    }
}

fn to_point((x, y): (f64, f64)) -> Point<i32> {
    Point::new(x.round() as i32, y.round() as i32)
}

/// Draw an axis-aligned rectangle outline with its stroke centred on the edges
pub fn draw_rectangle(
    image: &mut GrayImage,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    style: &OverlayStyle,
) {
    if width == 0 || height == 0 {
        return;
    }

    let t = style.thickness.max(1);
    let half = (t / 2) as i32;
    let (left, top) = (x as i32, y as i32);
    let (right, bottom) = (left + width as i32 - 1, top + height as i32 - 1);
    let span_w = (right - left) as u32 + t;
    let span_h = (bottom - top) as u32 + t;

    let bands = [
        Rect::at(left - half, top - half).of_size(span_w, t),
        Rect::at(left - half, bottom - half).of_size(span_w, t),
        Rect::at(left - half, top - half).of_size(t, span_h),
        Rect::at(right - half, top - half).of_size(t, span_h),
    ];
    for band in bands {
        draw_filled_rect_mut(image, band, style.color());
    }
}
