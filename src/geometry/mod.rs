//! Geometric verification of descriptor matches
//!
//! Provides a generic RANSAC engine and a homography model built on it.

pub mod homography;
pub mod ransac;

pub use homography::{Correspondence, Homography, HomographyEstimator, HomographyFit, find_homography};
pub use ransac::{Ransac, RansacConfig, RansacResult, RobustModel};
