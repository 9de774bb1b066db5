/// Template matching module for locating a patch inside a search image
///
/// This module provides grayscale template matching with:
/// - Zero-mean normalized cross-correlation (default)
/// - imageproc-backed normalized correlation and squared-error scoring
/// - Best-match lookup and thresholded multi-match search
/// - Rectangle overlay of the best match
pub mod matcher;
pub mod types;

pub use matcher::{ScoreMap, TemplateMatcher};
pub use types::{MatchMethod, TemplateLocation};
