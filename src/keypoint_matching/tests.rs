//! Tests for the keypoint matching pipeline

use super::*;
use crate::geometry::RansacConfig;
use crate::synthetic::{crop, textured_scene};
use image::Luma;
use image::imageops::{self, FilterType};
use nalgebra::Matrix3;

fn assert_corners_near(report: &KeypointReport, expected: [(f64, f64); 4], tolerance: f64) {
    let corners = report.corners.as_ref().unwrap();
    for (projected, expected) in corners.iter().zip(expected) {
        assert!(
            (projected.0 - expected.0).abs() < tolerance && (projected.1 - expected.1).abs() < tolerance,
            "corner {:?} expected near {:?}",
            projected,
            expected
        );
    }
}

fn matcher_with_min_matches(min_matches: usize) -> KeypointMatcher {
    KeypointMatcher::new(KeypointConfig {
        min_matches,
        ..KeypointConfig::default()
    })
}

#[test]
fn test_template_corners_order() {
    assert_eq!(
        template_corners(40, 30),
        [(0.0, 0.0), (0.0, 29.0), (39.0, 29.0), (39.0, 0.0)]
    );
}

#[test]
fn test_featureless_images_pass_through() {
    let target = GrayImage::from_pixel(120, 90, Luma([200]));
    let template = GrayImage::from_pixel(40, 30, Luma([200]));

    let (output, report) = KeypointMatcher::default().run(&target, &template);

    assert_eq!(output, target);
    assert_eq!(report.failure, Some(KeypointFailure::NoDescriptors));
    assert_eq!(report.template_keypoints, 0);
    assert!(report.homography.is_none());
}

#[test]
fn test_featureless_template_only() {
    let target = textured_scene(128, 128, 11);
    let template = GrayImage::from_pixel(48, 48, Luma([90]));

    let (output, report) = KeypointMatcher::default().run(&target, &template);
    assert_eq!(output, target);
    assert_eq!(report.failure, Some(KeypointFailure::NoDescriptors));
    assert!(report.target_keypoints > 0);
}

#[test]
fn test_too_few_matches_pass_through() {
    let target = textured_scene(160, 160, 12);
    let template = crop(&target, 30, 30, 80, 80);

    let (output, report) = matcher_with_min_matches(usize::MAX).run(&target, &template);

    assert_eq!(output, target);
    match report.failure {
        Some(KeypointFailure::InsufficientMatches { found, required }) => {
            assert_eq!(found, report.matches);
            assert_eq!(required, usize::MAX);
        }
        other => panic!("unexpected failure {:?}", other),
    }
}

#[test]
fn test_threshold_is_monotonic() {
    let target = textured_scene(160, 160, 13);
    let template = crop(&target, 20, 40, 90, 70);

    let (_, baseline) = matcher_with_min_matches(0).run(&target, &template);
    let found = baseline.matches;

    for threshold in [found + 1, found + 5, found * 2 + 1] {
        let (output, report) = matcher_with_min_matches(threshold).run(&target, &template);
        assert_eq!(output, target, "threshold {} should reject", threshold);
        assert_eq!(
            report.failure,
            Some(KeypointFailure::InsufficientMatches {
                found,
                required: threshold
            })
        );
    }

    for threshold in [0, found / 2, found] {
        let (_, report) = matcher_with_min_matches(threshold).run(&target, &template);
        assert!(
            !matches!(report.failure, Some(KeypointFailure::InsufficientMatches { .. })),
            "threshold {} should pass the match count check",
            threshold
        );
    }
}

#[test]
fn test_unreachable_inlier_support_passes_through() {
    let target = textured_scene(160, 160, 14);
    let template = crop(&target, 40, 40, 80, 80);
    let matcher = KeypointMatcher::new(KeypointConfig {
        min_matches: 4,
        ransac: RansacConfig {
            min_inliers: 1_000_000,
            ..RansacConfig::default()
        },
        ..KeypointConfig::default()
    });

    let (output, report) = matcher.run(&target, &template);
    assert_eq!(output, target);
    assert_eq!(report.failure, Some(KeypointFailure::HomographyFailed));
    assert!(report.homography.is_none() && report.corners.is_none());
}

#[test]
fn test_self_match_is_identity() {
    let image = textured_scene(160, 160, 15);

    let (output, report) = KeypointMatcher::default().run(&image, &image);

    assert!(report.succeeded(), "failed with {:?}", report.failure);
    let homography = report.homography.unwrap();
    let deviation = homography.max_corner_deviation(&Homography::identity(), 159.0, 159.0);
    assert!(deviation < 1.0, "corner deviation {}", deviation);

    let corners = report.corners.unwrap();
    for (projected, expected) in corners.iter().zip(template_corners(160, 160)) {
        assert!((projected.0 - expected.0).abs() < 1.0);
        assert!((projected.1 - expected.1).abs() < 1.0);
    }
    assert_ne!(output, image);
}

#[test]
fn test_translated_crop_is_located() {
    let target = textured_scene(200, 160, 16);
    let template = crop(&target, 50, 35, 100, 90);

    let (output, report) = KeypointMatcher::default().run(&target, &template);

    assert!(report.succeeded(), "failed with {:?}", report.failure);
    assert_corners_near(
        &report,
        [(50.0, 35.0), (50.0, 124.0), (149.0, 124.0), (149.0, 35.0)],
        2.0,
    );
    // Outline is drawn in black along the left edge of the located template
    assert_eq!(output.get_pixel(50, 80)[0], 0);
}

#[test]
fn test_rotated_target_is_located() {
    let scene = textured_scene(200, 160, 18);
    let template = crop(&scene, 50, 35, 100, 90);
    // Clockwise quarter turn: (x, y) -> (159 - y, x)
    let target = imageops::rotate90(&scene);

    let (_, report) = KeypointMatcher::default().run(&target, &template);

    assert!(report.succeeded(), "failed with {:?}", report.failure);
    assert_corners_near(
        &report,
        [(124.0, 50.0), (35.0, 50.0), (35.0, 149.0), (124.0, 149.0)],
        2.0,
    );
}

#[test]
fn test_scaled_target_is_located() {
    let scene = textured_scene(200, 160, 19);
    let template = crop(&scene, 50, 35, 100, 90);
    // Pixel centres map as x -> 1.5 * x + 0.25
    let target = imageops::resize(&scene, 300, 240, FilterType::CatmullRom);

    let (_, report) = KeypointMatcher::default().run(&target, &template);

    assert!(report.succeeded(), "failed with {:?}", report.failure);
    assert_corners_near(
        &report,
        [(75.25, 52.75), (75.25, 186.25), (223.75, 186.25), (223.75, 52.75)],
        3.0,
    );
}

#[test]
fn test_corner_at_infinity_leaves_report_without_fit() {
    // Third row sends x = 39 to the line at infinity
    let h = Homography::from_matrix(Matrix3::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0, -1.0 / 39.0, 0.0, 1.0)).unwrap();
    let fit = HomographyFit {
        homography: h,
        inliers: vec![true; 4],
        num_inliers: 4,
    };
    let mut report = KeypointReport::default();

    let result = record_fit(&mut report, &fit, 40, 30);

    assert_eq!(result, Err(KeypointFailure::HomographyFailed));
    assert!(report.homography.is_none());
    assert!(report.corners.is_none());
    assert_eq!(report.inliers, 0);
}

#[test]
fn test_target_is_not_mutated() {
    let target = textured_scene(160, 160, 17);
    let template = crop(&target, 30, 30, 90, 90);
    let before = target.clone();

    let _ = KeypointMatcher::default().run(&target, &template);
    assert_eq!(target, before);
}

#[test]
fn test_report_serializes_failure() {
    let report = KeypointReport {
        failure: Some(KeypointFailure::InsufficientMatches {
            found: 3,
            required: 10,
        }),
        ..KeypointReport::default()
    };
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["failure"]["kind"], "insufficient_matches");
    assert_eq!(json["failure"]["found"], 3);
    assert!(json["homography"].is_null());
}

#[test]
fn test_failure_messages() {
    assert_eq!(
        KeypointFailure::InsufficientMatches {
            found: 4,
            required: 10
        }
        .to_string(),
        "Not enough matches are found - 4/10"
    );
    assert_eq!(KeypointFailure::NoDescriptors.to_string(), "Descriptor computation failed.");
}
