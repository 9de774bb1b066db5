use std::path::PathBuf;
use thiserror::Error;

/// A specialized `Result` type for matching operations.
pub type MatchResult<T> = Result<T, MatchError>;

/// The error type for all hard failures in the crate.
///
/// Soft failures of the keypoint pipeline (no descriptors, too few matches,
/// no homography) are not errors; see [`crate::keypoint_matching::KeypointFailure`].
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("Failed to open image {path:?}: {source}")]
    ImageOpen {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("Failed to save image {path:?}: {source}")]
    ImageSave {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("{what} image is empty ({width}x{height})")]
    EmptyImage {
        what: &'static str,
        width: u32,
        height: u32,
    },

    #[error(
        "Template {template_width}x{template_height} is larger than image {image_width}x{image_height}"
    )]
    TemplateTooLarge {
        template_width: u32,
        template_height: u32,
        image_width: u32,
        image_height: u32,
    },

    #[error("Images must be the same size: {first:?} vs {second:?}")]
    DimensionMismatch { first: (u32, u32), second: (u32, u32) },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Failed to read config {path:?}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config {path:?}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to serialize report: {source}")]
    ReportSerialize {
        #[from]
        source: serde_json::Error,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("Background task failed to complete: {source}")]
    JoinError {
        #[from]
        source: tokio::task::JoinError,
    },
}

impl MatchError {
    /// Check whether the error comes from bad user input rather than the environment
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            MatchError::EmptyImage { .. }
                | MatchError::TemplateTooLarge { .. }
                | MatchError::DimensionMismatch { .. }
                | MatchError::ConfigParse { .. }
                | MatchError::InvalidArgument { .. }
        )
    }

    /// Build an `EmptyImage` error if either dimension is zero
    pub fn check_non_empty(what: &'static str, width: u32, height: u32) -> MatchResult<()> {
        if width == 0 || height == 0 {
            return Err(MatchError::EmptyImage {
                what,
                width,
                height,
            });
        }
        Ok(())
    }
}
