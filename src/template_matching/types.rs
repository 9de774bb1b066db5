/// Template matching data types
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Scoring method for template matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum MatchMethod {
    /// Zero-mean normalized cross-correlation, in [-1, 1]
    #[default]
    CorrelationCoefficientNormed,
    /// Normalized cross-correlation without mean removal, in [0, 1]
    CrossCorrelationNormed,
    /// Normalized sum of squared errors; lower is better
    SumSquaredErrorsNormed,
}

impl MatchMethod {
    /// Whether the best match is the minimum of the score map
    pub fn prefers_minimum(self) -> bool {
        matches!(self, MatchMethod::SumSquaredErrorsNormed)
    }

    /// True when `score` is at least as good as `threshold` under this method
    pub fn passes(self, score: f32, threshold: f32) -> bool {
        if self.prefers_minimum() {
            score <= threshold
        } else {
            score >= threshold
        }
    }
}

/// A single match result
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct TemplateLocation {
    /// X coordinate of the top-left corner in the search image
    pub x: u32,
    /// Y coordinate of the top-left corner in the search image
    pub y: u32,
    /// Width of the matched template
    pub width: u32,
    /// Height of the matched template
    pub height: u32,
    /// Score under the method used
    pub score: f32,
}

impl std::fmt::Display for TemplateLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}x{} at ({},{}) - score {:.3}",
            self.width, self.height, self.x, self.y, self.score
        )
    }
}
