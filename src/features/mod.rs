//! Scale-invariant feature extraction (SIFT)
//!
//! This module provides the feature extraction stage of keypoint matching:
//! - Gaussian / DoG scale space with optional 2x up-sampled base
//! - Sub-pixel extremum refinement with contrast and edge rejection
//! - 36-bin orientation assignment
//! - 4x4x8 gradient histogram descriptors
pub mod keypoint;

mod descriptor;
mod detector;
mod scale_space;

pub use keypoint::{DESCRIPTOR_SIZE, Descriptor, Features, KeyPoint};

use image::GrayImage;
use rayon::prelude::*;
use scale_space::ScaleSpace;
use serde::{Deserialize, Serialize};

/// SIFT parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiftConfig {
    /// Keep at most this many keypoints by response (0 keeps all)
    pub max_features: usize,
    /// Layers per octave in which extrema are searched
    pub n_octave_layers: usize,
    /// DoG contrast threshold, on intensities scaled to [0, 1]
    pub contrast_threshold: f32,
    /// Principal curvature ratio limit for edge rejection
    pub edge_threshold: f32,
    /// Blur of the base layer of each octave
    pub sigma: f32,
    /// Double the input image before building the pyramid
    pub upsample: bool,
}

impl Default for SiftConfig {
    fn default() -> Self {
        Self {
            max_features: 0,
            n_octave_layers: 3,
            contrast_threshold: 0.04,
            edge_threshold: 10.0,
            sigma: 1.6,
            upsample: true,
        }
    }
}

/// SIFT feature extractor
#[derive(Debug, Clone, Default)]
pub struct Sift {
    config: SiftConfig,
}

impl Sift {
    pub fn new(config: SiftConfig) -> Self {
        Self { config }
    }

    /// Detect keypoints and compute one descriptor per keypoint.
    ///
    /// Images without texture, or too small to build a single octave, yield
    /// empty features.
    pub fn detect_and_compute(&self, image: &GrayImage) -> Features {
        let config = self.sanitized_config();
        let Some(space) = ScaleSpace::build(image, &config) else {
            log::debug!(
                "SIFT: image {}x{} too small for a scale space",
                image.width(),
                image.height()
            );
            return Features::default();
        };

        let mut found = detector::detect(&space, &config);
        dedup_keypoints(&mut found);

        if config.max_features > 0 && found.len() > config.max_features {
            found.sort_by(|a, b| b.0.response.total_cmp(&a.0.response));
            found.truncate(config.max_features);
        }

        let descriptors: Vec<Descriptor> = found
            .par_iter()
            .map(|(keypoint, location)| {
                let gaussian = &space.gaussians[location.octave][location.layer];
                descriptor::describe(gaussian, location, keypoint.angle.to_radians())
            })
            .collect();

        log::debug!(
            "SIFT: {} keypoints in {}x{} image",
            found.len(),
            image.width(),
            image.height()
        );

        Features {
            keypoints: found.into_iter().map(|(kp, _)| kp).collect(),
            descriptors,
        }
    }

    fn sanitized_config(&self) -> SiftConfig {
        SiftConfig {
            n_octave_layers: self.config.n_octave_layers.max(1),
            sigma: if self.config.sigma > 0.0 { self.config.sigma } else { 1.6 },
            ..self.config.clone()
        }
    }
}

/// Drop keypoints identical in position, size and angle, keeping the first
fn dedup_keypoints(found: &mut Vec<(KeyPoint, keypoint::ScaleLocation)>) {
    found.sort_by(|(a, _), (b, _)| {
        a.x.total_cmp(&b.x)
            .then(a.y.total_cmp(&b.y))
            .then(b.size.total_cmp(&a.size))
            .then(a.angle.total_cmp(&b.angle))
    });
    found.dedup_by(|(a, _), (b, _)| a.x == b.x && a.y == b.y && a.size == b.size && a.angle == b.angle);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::textured_scene;
    use image::Luma;

    #[test]
    fn test_flat_image_has_no_features() {
        let image = GrayImage::from_pixel(96, 96, Luma([128]));
        let features = Sift::default().detect_and_compute(&image);
        assert!(features.is_empty());
        assert_eq!(features.keypoints.len(), features.descriptors.len());
    }

    #[test]
    fn test_textured_image_has_features() {
        let image = textured_scene(128, 128, 3);
        let features = Sift::default().detect_and_compute(&image);
        assert!(features.len() >= 10, "only {} keypoints", features.len());
        assert_eq!(features.keypoints.len(), features.descriptors.len());
        for kp in &features.keypoints {
            assert!(kp.x >= 0.0 && kp.x < 128.0 && kp.y >= 0.0 && kp.y < 128.0);
            assert!(kp.size > 0.0);
            assert!((0.0..360.0).contains(&kp.angle));
        }
    }

    #[test]
    fn test_detection_is_deterministic() {
        let image = textured_scene(96, 80, 5);
        let sift = Sift::default();
        let a = sift.detect_and_compute(&image);
        let b = sift.detect_and_compute(&image);
        assert_eq!(a.keypoints, b.keypoints);
        assert_eq!(a.descriptors, b.descriptors);
    }

    #[test]
    fn test_max_features_keeps_strongest() {
        let image = textured_scene(128, 128, 9);
        let all = Sift::default().detect_and_compute(&image);
        let limited = Sift::new(SiftConfig {
            max_features: 5,
            ..SiftConfig::default()
        })
        .detect_and_compute(&image);

        assert_eq!(limited.len(), 5.min(all.len()));
        let weakest_kept = limited
            .keypoints
            .iter()
            .map(|k| k.response)
            .fold(f32::INFINITY, f32::min);
        let stronger = all.keypoints.iter().filter(|k| k.response > weakest_kept).count();
        assert!(stronger <= 5);
    }
}
