//! Configuration for template and keypoint matching

use crate::error::{MatchError, MatchResult};
use crate::features::SiftConfig;
use crate::geometry::RansacConfig;
use crate::matching::MatcherConfig;
use crate::overlay::OverlayStyle;
use crate::template_matching::MatchMethod;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings for the template matcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    /// Scoring method
    pub method: MatchMethod,
    /// Score a placement must reach to be listed as a match
    pub threshold: f32,
    /// Maximum number of placements to list
    pub max_matches: usize,
    /// Rectangle style for the best match
    pub overlay: OverlayStyle,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            method: MatchMethod::default(),
            threshold: 0.8,
            max_matches: 1,
            overlay: OverlayStyle::default(),
        }
    }
}

/// Settings for the keypoint matching pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeypointConfig {
    /// Minimum number of cross-checked matches before a homography is attempted
    pub min_matches: usize,
    pub sift: SiftConfig,
    pub matcher: MatcherConfig,
    pub ransac: RansacConfig,
    /// Outline style for the projected template
    pub overlay: OverlayStyle,
}

impl Default for KeypointConfig {
    fn default() -> Self {
        Self {
            min_matches: 10,
            sift: SiftConfig::default(),
            matcher: MatcherConfig::default(),
            ransac: RansacConfig::default(),
            overlay: OverlayStyle::default(),
        }
    }
}

/// Top-level configuration, as loaded from a JSON file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub template: TemplateConfig,
    pub keypoint: KeypointConfig,
}

impl AppConfig {
    /// Load a configuration file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> MatchResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| MatchError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config: AppConfig =
            serde_json::from_str(&text).map_err(|source| MatchError::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;
        log::debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Look up a preset by name
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "default" => Some(Self::default()),
            "strict" => Some(create_strict_config()),
            "permissive" => Some(create_permissive_config()),
            _ => None,
        }
    }
}

/// Configuration preset for clean, well-textured inputs
pub fn create_strict_config() -> AppConfig {
    AppConfig {
        template: TemplateConfig {
            threshold: 0.9,
            ..TemplateConfig::default()
        },
        keypoint: KeypointConfig {
            min_matches: 20,
            matcher: MatcherConfig {
                cross_check: true,
                ratio_threshold: Some(0.8),
            },
            ransac: RansacConfig {
                threshold: 3.0,
                min_inliers: 8,
                ..RansacConfig::default()
            },
            ..KeypointConfig::default()
        },
    }
}

/// Configuration preset for small or low-contrast templates
pub fn create_permissive_config() -> AppConfig {
    AppConfig {
        template: TemplateConfig {
            threshold: 0.6,
            max_matches: 5,
            ..TemplateConfig::default()
        },
        keypoint: KeypointConfig {
            min_matches: 6,
            sift: SiftConfig {
                contrast_threshold: 0.02,
                ..SiftConfig::default()
            },
            ransac: RansacConfig {
                threshold: 8.0,
                max_iterations: 5000,
                ..RansacConfig::default()
            },
            ..KeypointConfig::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.keypoint.min_matches, 10);
        assert_eq!(config.keypoint.ransac.threshold, 5.0);
        assert_eq!(config.keypoint.overlay.thickness, 10);
        assert_eq!(config.template.method, MatchMethod::CorrelationCoefficientNormed);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r#"{ "keypoint": { "min_matches": 25, "ransac": { "threshold": 2.5 } } }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.keypoint.min_matches, 25);
        assert_eq!(config.keypoint.ransac.threshold, 2.5);
        assert_eq!(config.keypoint.ransac.max_iterations, 2000);
        assert_eq!(config.template, TemplateConfig::default());
    }

    #[test]
    fn test_method_names() {
        let json = r#"{ "template": { "method": "sum-squared-errors-normed" } }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.template.method, MatchMethod::SumSquaredErrorsNormed);
    }

    #[test]
    fn test_presets() {
        let strict = AppConfig::preset("strict").unwrap();
        let permissive = AppConfig::preset("permissive").unwrap();
        assert!(strict.keypoint.min_matches > permissive.keypoint.min_matches);
        assert!(strict.keypoint.ransac.threshold < permissive.keypoint.ransac.threshold);
        assert!(AppConfig::preset("nope").is_none());
    }

    #[test]
    fn test_missing_file() {
        let err = AppConfig::from_json_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, MatchError::ConfigRead { .. }));
    }
}
