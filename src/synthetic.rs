//! Deterministic synthetic images for tests and the `synth` command

use image::{GrayImage, Luma};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut};
use imageproc::filter::gaussian_blur_f32;
use imageproc::rect::Rect;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Random overlapping rectangles and discs on a mid-gray background, lightly blurred
pub fn textured_scene(width: u32, height: u32, seed: u64) -> GrayImage {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut image = GrayImage::from_pixel(width, height, Luma([128]));
    if width == 0 || height == 0 {
        return image;
    }

    let shapes = ((width * height) / 300).max(8);
    let max_extent = (width.min(height) / 6).max(3);

    for _ in 0..shapes {
        let color = Luma([rng.gen_range(0..=255u8)]);
        let x = rng.gen_range(0..width) as i32;
        let y = rng.gen_range(0..height) as i32;
        if rng.gen_bool(0.5) {
            let w = rng.gen_range(2..=max_extent);
            let h = rng.gen_range(2..=max_extent);
            draw_filled_rect_mut(&mut image, Rect::at(x, y).of_size(w, h), color);
        } else {
            let r = rng.gen_range(1..=max_extent as i32 / 2 + 1);
            draw_filled_circle_mut(&mut image, (x, y), r, color);
        }
    }

    gaussian_blur_f32(&image, 1.0)
}

/// Uniform random noise
pub fn noise(width: u32, height: u32, seed: u64) -> GrayImage {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    GrayImage::from_fn(width, height, |_, _| Luma([rng.r#gen::<u8>()]))
}

/// Copy of the `width`x`height` window at `(x, y)`
pub fn crop(image: &GrayImage, x: u32, y: u32, width: u32, height: u32) -> GrayImage {
    image::imageops::crop_imm(image, x, y, width, height).to_image()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_is_deterministic_and_textured() {
        let a = textured_scene(64, 48, 1);
        let b = textured_scene(64, 48, 1);
        assert_eq!(a, b);
        assert_eq!(a.dimensions(), (64, 48));

        let first = a.get_pixel(0, 0)[0];
        assert!(a.pixels().any(|p| p[0] != first));
    }

    #[test]
    fn test_crop_copies_window() {
        let img = noise(20, 20, 4);
        let c = crop(&img, 5, 6, 3, 2);
        assert_eq!(c.dimensions(), (3, 2));
        assert_eq!(c.get_pixel(2, 1), img.get_pixel(7, 7));
    }
}
