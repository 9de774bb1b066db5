pub mod arithmetic;
pub mod config;
pub mod error;
pub mod features;
pub mod geometry;
pub mod image_io;
pub mod keypoint_matching;
pub mod matching;
pub mod overlay;
pub mod panel;
pub mod report;
pub mod synthetic;
pub mod template_matching;

pub use config::AppConfig;
pub use error::{MatchError, MatchResult};
pub use keypoint_matching::{KeypointFailure, KeypointMatcher, KeypointReport};
pub use template_matching::{MatchMethod, TemplateLocation, TemplateMatcher};
