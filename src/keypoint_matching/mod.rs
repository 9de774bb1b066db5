//! Keypoint matching pipeline
//!
//! SIFT features on both images, cross-checked descriptor matching, a RANSAC
//! homography from template space to target space, and an outline of the
//! projected template drawn on a copy of the target.
//!
//! The pipeline never fails hard. Missing descriptors, too few matches and an
//! unfittable transform are reported as a [`KeypointFailure`], logged at warn
//! level, and the target is passed through unchanged.

#[cfg(test)]
mod tests;

use crate::config::KeypointConfig;
use crate::features::{Features, Sift};
use crate::geometry::{Correspondence, Homography, HomographyFit, find_homography};
use crate::matching::{DescriptorMatch, DescriptorMatcher};
use crate::overlay::draw_closed_polyline;
use image::GrayImage;
use serde::Serialize;
use std::fmt;

/// Soft failure of the keypoint pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KeypointFailure {
    /// One of the images produced no descriptors
    NoDescriptors,
    /// Fewer cross-checked matches than required
    InsufficientMatches { found: usize, required: usize },
    /// No homography reached the minimum inlier support
    HomographyFailed,
}

impl fmt::Display for KeypointFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeypointFailure::NoDescriptors => write!(f, "Descriptor computation failed."),
            KeypointFailure::InsufficientMatches { found, required } => {
                write!(f, "Not enough matches are found - {}/{}", found, required)
            }
            KeypointFailure::HomographyFailed => write!(f, "Homography computation failed."),
        }
    }
}

/// Summary of one pipeline run
#[derive(Debug, Clone, Default, Serialize)]
pub struct KeypointReport {
    pub template_keypoints: usize,
    pub target_keypoints: usize,
    pub matches: usize,
    pub inliers: usize,
    /// Template-to-target transform, when one was found
    pub homography: Option<Homography>,
    /// Template corners projected into the target
    pub corners: Option<Vec<(f64, f64)>>,
    pub failure: Option<KeypointFailure>,
}

impl KeypointReport {
    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }
}

/// Template corners in drawing order: top-left, bottom-left, bottom-right, top-right
pub fn template_corners(width: u32, height: u32) -> [(f64, f64); 4] {
    let w = width.saturating_sub(1) as f64;
    let h = height.saturating_sub(1) as f64;
    [(0.0, 0.0), (0.0, h), (w, h), (w, 0.0)]
}

/// Keypoint matcher for locating a planar template in a target image
#[derive(Debug, Clone, Default)]
pub struct KeypointMatcher {
    config: KeypointConfig,
}

impl KeypointMatcher {
    pub fn new(config: KeypointConfig) -> Self {
        Self { config }
    }

    /// Run the pipeline and return the annotated copy of `target` with a report.
    ///
    /// On any soft failure the returned image equals `target`.
    pub fn run(&self, target: &GrayImage, template: &GrayImage) -> (GrayImage, KeypointReport) {
        let sift = Sift::new(self.config.sift.clone());
        let (template_features, target_features) =
            rayon::join(|| sift.detect_and_compute(template), || sift.detect_and_compute(target));

        let mut report = KeypointReport {
            template_keypoints: template_features.len(),
            target_keypoints: target_features.len(),
            ..KeypointReport::default()
        };
        log::debug!(
            "Keypoints: template {}, target {}",
            report.template_keypoints,
            report.target_keypoints
        );

        match self.locate(&template_features, &target_features, template, &mut report) {
            Ok(corners) => {
                let mut annotated = target.clone();
                draw_closed_polyline(&mut annotated, &corners, &self.config.overlay);
                log::info!(
                    "Keypoint matching: {} matches, {} inliers",
                    report.matches,
                    report.inliers
                );
                (annotated, report)
            }
            Err(failure) => {
                log::warn!("{}", failure);
                report.failure = Some(failure);
                (target.clone(), report)
            }
        }
    }

    /// Match, fit and project. Fills the report as far as the pipeline gets.
    fn locate(
        &self,
        template_features: &Features,
        target_features: &Features,
        template: &GrayImage,
        report: &mut KeypointReport,
    ) -> Result<Vec<(f64, f64)>, KeypointFailure> {
        if template_features.is_empty() || target_features.is_empty() {
            return Err(KeypointFailure::NoDescriptors);
        }

        let matches = DescriptorMatcher::new(self.config.matcher.clone())
            .match_descriptors(&template_features.descriptors, &target_features.descriptors);
        report.matches = matches.len();

        if matches.len() < self.config.min_matches {
            return Err(KeypointFailure::InsufficientMatches {
                found: matches.len(),
                required: self.config.min_matches,
            });
        }

        let pairs = correspondences(&matches, template_features, target_features);
        let fit = find_homography(&pairs, &self.config.ransac).ok_or(KeypointFailure::HomographyFailed)?;
        record_fit(report, &fit, template.width(), template.height())
    }
}

/// Project the template corners and store the fit in `report`.
///
/// A transform that sends a corner to infinity cannot be drawn; the report is
/// then left without a homography.
fn record_fit(
    report: &mut KeypointReport,
    fit: &HomographyFit,
    width: u32,
    height: u32,
) -> Result<Vec<(f64, f64)>, KeypointFailure> {
    let corners = fit
        .homography
        .project_all(&template_corners(width, height))
        .ok_or(KeypointFailure::HomographyFailed)?;

    report.inliers = fit.num_inliers;
    report.homography = Some(fit.homography);
    report.corners = Some(corners.clone());
    Ok(corners)
}

fn correspondences(
    matches: &[DescriptorMatch],
    template_features: &Features,
    target_features: &Features,
) -> Vec<Correspondence> {
    matches
        .iter()
        .map(|m| {
            Correspondence::new(
                template_features.keypoints[m.query_idx].pt(),
                target_features.keypoints[m.train_idx].pt(),
            )
        })
        .collect()
}
