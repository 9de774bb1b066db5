//! Gaussian and difference-of-Gaussian pyramids

use super::SiftConfig;
use image::imageops::{self, FilterType};
use image::{GrayImage, ImageBuffer, Luma};
use imageproc::filter::gaussian_blur_f32;

pub(crate) type FloatImage = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Assumed blur of the input image
const INIT_SIGMA: f32 = 0.5;
/// Octaves stop once the smaller side drops under this many pixels
const MIN_OCTAVE_SIDE: u32 = 16;

pub(crate) struct ScaleSpace {
    /// `octaves x (n_octave_layers + 3)` blurred images
    pub gaussians: Vec<Vec<FloatImage>>,
    /// `octaves x (n_octave_layers + 2)` differences of adjacent Gaussians
    pub dogs: Vec<Vec<FloatImage>>,
    /// Whether octave 0 is the input doubled in size
    pub upsampled: bool,
}

impl ScaleSpace {
    pub fn build(image: &GrayImage, config: &SiftConfig) -> Option<Self> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return None;
        }

        let base = base_image(image, config);
        let n_octaves = octave_count(base.width().min(base.height()));
        if n_octaves == 0 {
            return None;
        }

        let sigmas = layer_sigmas(config);
        let mut gaussians: Vec<Vec<FloatImage>> = Vec::with_capacity(n_octaves);

        for octave in 0..n_octaves {
            let first = if octave == 0 {
                base.clone()
            } else {
                halve(&gaussians[octave - 1][config.n_octave_layers])
            };

            let mut layers = Vec::with_capacity(sigmas.len());
            layers.push(first);
            for &sigma in &sigmas[1..] {
                let blurred = gaussian_blur_f32(&layers[layers.len() - 1], sigma);
                layers.push(blurred);
            }
            gaussians.push(layers);
        }

        let dogs = gaussians
            .iter()
            .map(|layers| layers.windows(2).map(|w| subtract(&w[1], &w[0])).collect())
            .collect();

        log::debug!(
            "SIFT scale space: {} octaves of {} layers from {}x{} (upsampled: {})",
            n_octaves,
            sigmas.len(),
            width,
            height,
            config.upsample
        );

        Some(Self {
            gaussians,
            dogs,
            upsampled: config.upsample,
        })
    }

    /// Factor mapping octave-local coordinates back to input coordinates
    pub fn octave_scale(&self, octave: usize) -> f32 {
        let scale = (1u64 << octave) as f32;
        if self.upsampled { scale * 0.5 } else { scale }
    }
}

fn base_image(image: &GrayImage, config: &SiftConfig) -> FloatImage {
    let float: FloatImage = ImageBuffer::from_fn(image.width(), image.height(), |x, y| {
        Luma([image.get_pixel(x, y)[0] as f32 / 255.0])
    });

    let (resized, assumed) = if config.upsample {
        let up = imageops::resize(
            &float,
            float.width() * 2,
            float.height() * 2,
            FilterType::Triangle,
        );
        (up, INIT_SIGMA * 2.0)
    } else {
        (float, INIT_SIGMA)
    };

    let sigma_diff = (config.sigma * config.sigma - assumed * assumed).max(0.01).sqrt();
    gaussian_blur_f32(&resized, sigma_diff)
}

fn octave_count(min_side: u32) -> usize {
    let mut count = 0;
    let mut side = min_side;
    while side >= MIN_OCTAVE_SIDE {
        count += 1;
        side /= 2;
    }
    count
}

/// Incremental blur applied to reach each layer from the previous one
fn layer_sigmas(config: &SiftConfig) -> Vec<f32> {
    let n = config.n_octave_layers;
    let k = 2f32.powf(1.0 / n as f32);
    let mut sigmas = vec![config.sigma; n + 3];
    for (i, s) in sigmas.iter_mut().enumerate().skip(1) {
        let prev = config.sigma * k.powi(i as i32 - 1);
        let total = prev * k;
        *s = (total * total - prev * prev).sqrt();
    }
    sigmas
}

fn halve(image: &FloatImage) -> FloatImage {
    let (w, h) = ((image.width() / 2).max(1), (image.height() / 2).max(1));
    ImageBuffer::from_fn(w, h, |x, y| *image.get_pixel(x * 2, y * 2))
}

fn subtract(a: &FloatImage, b: &FloatImage) -> FloatImage {
    let data = a.as_raw().iter().zip(b.as_raw()).map(|(x, y)| x - y).collect();
    ImageBuffer::from_raw(a.width(), a.height(), data).unwrap_or_else(|| FloatImage::new(0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pyramid_shape() {
        let image = GrayImage::from_pixel(64, 48, Luma([128]));
        let config = SiftConfig::default();
        let space = ScaleSpace::build(&image, &config).unwrap();

        // 96 -> 48 -> 24 (stops below 16)
        assert_eq!(space.gaussians.len(), 3);
        for (gaussians, dogs) in space.gaussians.iter().zip(&space.dogs) {
            assert_eq!(gaussians.len(), config.n_octave_layers + 3);
            assert_eq!(dogs.len(), config.n_octave_layers + 2);
        }
        assert_eq!(space.gaussians[0][0].dimensions(), (128, 96));
        assert_eq!(space.gaussians[1][0].dimensions(), (64, 48));
    }

    #[test]
    fn test_flat_image_has_flat_dog() {
        let image = GrayImage::from_pixel(32, 32, Luma([90]));
        let space = ScaleSpace::build(&image, &SiftConfig::default()).unwrap();
        let max_abs = space
            .dogs
            .iter()
            .flatten()
            .flat_map(|img| img.as_raw().iter())
            .fold(0f32, |m, v| m.max(v.abs()));
        assert!(max_abs < 1e-4);
    }

    #[test]
    fn test_layer_sigmas_compose_to_octave_doubling() {
        let config = SiftConfig::default();
        let sigmas = layer_sigmas(&config);
        let n = config.n_octave_layers;
        let total_sq: f32 = sigmas[..=n].iter().map(|s| s * s).sum();
        assert!((total_sq.sqrt() - 2.0 * config.sigma).abs() < 1e-3);
    }

    #[test]
    fn test_octave_scale_accounts_for_upsampling() {
        let image = GrayImage::from_pixel(64, 64, Luma([0]));
        let space = ScaleSpace::build(&image, &SiftConfig::default()).unwrap();
        assert_eq!(space.octave_scale(0), 0.5);
        assert_eq!(space.octave_scale(2), 2.0);
    }

    #[test]
    fn test_tiny_image_has_no_octaves() {
        let image = GrayImage::from_pixel(4, 4, Luma([0]));
        assert!(ScaleSpace::build(&image, &SiftConfig::default()).is_none());
    }
}
