use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;
use vision_match::arithmetic::ArithOp;
use vision_match::template_matching::MatchMethod;

#[derive(Debug, Parser)]
#[command(name = "vision-match")]
#[command(about = "Template matching and SIFT keypoint matching with homography overlay")]
#[command(version)]
pub struct Args {
    /// JSON configuration file (missing fields use defaults)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Named configuration preset: default, strict or permissive
    #[arg(long, global = true, conflicts_with = "config")]
    pub preset: Option<String>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run template matching and keypoint matching on the same pair
    Compare {
        #[command(flatten)]
        pair: ImagePair,

        /// Directory for template_matching.png, keypoint_matching.png and panel.png
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,

        /// Write a JSON report of both results
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Locate the template by correlation and draw the best-match box
    Template {
        #[command(flatten)]
        pair: ImagePair,

        /// Output image
        #[arg(long)]
        out: PathBuf,

        #[arg(long, value_enum)]
        method: Option<MatchMethod>,

        /// List every placement scoring at least this well
        #[arg(long)]
        threshold: Option<f32>,

        #[arg(long)]
        max_matches: Option<usize>,
    },

    /// Locate the template by SIFT keypoints and draw its projected outline
    Keypoints {
        #[command(flatten)]
        pair: ImagePair,

        /// Output image
        #[arg(long)]
        out: PathBuf,

        /// Minimum cross-checked matches before fitting a homography
        #[arg(long)]
        min_matches: Option<usize>,

        /// RANSAC inlier tolerance in pixels
        #[arg(long)]
        ransac_threshold: Option<f64>,
    },

    /// Saturating add and subtract of two RGB images, scalar and SIMD
    Arith {
        #[arg(long)]
        first: PathBuf,

        #[arg(long)]
        second: PathBuf,

        #[arg(long, default_value = ".")]
        out_dir: PathBuf,

        /// Run only this operation
        #[arg(long, value_enum)]
        op: Option<ArithOp>,
    },

    /// Write a synthetic textured target and a crop of it as template
    Synth {
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,

        #[arg(long, default_value_t = 320)]
        width: u32,

        #[arg(long, default_value_t = 240)]
        height: u32,

        /// Crop window as x,y,w,h
        #[arg(long, value_delimiter = ',', default_values_t = [80u32, 60, 120, 100])]
        crop: Vec<u32>,

        #[arg(long, default_value_t = 1)]
        seed: u64,
    },
}

#[derive(Debug, ClapArgs)]
pub struct ImagePair {
    /// Template image (the small patch)
    #[arg(long)]
    pub template: PathBuf,

    /// Target image to search
    #[arg(long)]
    pub target: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_compare() {
        let args = Args::parse_from([
            "vision-match",
            "--debug",
            "compare",
            "--template",
            "t.png",
            "--target",
            "i.png",
            "--report",
            "r.json",
        ]);
        assert!(args.debug);
        match args.command {
            Command::Compare { pair, out_dir, report } => {
                assert_eq!(pair.template, PathBuf::from("t.png"));
                assert_eq!(out_dir, PathBuf::from("."));
                assert_eq!(report, Some(PathBuf::from("r.json")));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_template_method() {
        let args = Args::parse_from([
            "vision-match",
            "template",
            "--template",
            "t.png",
            "--target",
            "i.png",
            "--out",
            "o.png",
            "--method",
            "sum-squared-errors-normed",
        ]);
        match args.command {
            Command::Template { method, .. } => {
                assert_eq!(method, Some(MatchMethod::SumSquaredErrorsNormed))
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_synth_crop_list() {
        let args = Args::parse_from(["vision-match", "synth", "--crop", "1,2,3,4"]);
        match args.command {
            Command::Synth { crop, .. } => assert_eq!(crop, vec![1, 2, 3, 4]),
            other => panic!("unexpected command {:?}", other),
        }
    }
}
