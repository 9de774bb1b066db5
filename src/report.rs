//! JSON report of a `compare` run

use crate::keypoint_matching::KeypointReport;
use crate::template_matching::TemplateLocation;
use serde::Serialize;
use std::path::PathBuf;

/// Combined outcome of template and keypoint matching on one image pair
#[derive(Debug, Clone, Serialize)]
pub struct CompareReport {
    pub template_path: PathBuf,
    pub target_path: PathBuf,
    pub template_size: (u32, u32),
    pub target_size: (u32, u32),
    pub template_matching: TemplateSection,
    pub keypoint_matching: KeypointReport,
    pub keypoint_elapsed_ms: u128,
}

#[derive(Debug, Clone, Serialize)]
pub struct TemplateSection {
    pub best: TemplateLocation,
    /// Placements passing the configured threshold, best first
    pub matches: Vec<TemplateLocation>,
    pub elapsed_ms: u128,
}

impl CompareReport {
    pub fn to_json(&self) -> crate::error::MatchResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
