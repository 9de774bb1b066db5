mod args;

use args::{Args, Command, ImagePair};
use clap::Parser;
use image::GrayImage;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use vision_match::arithmetic::{self, ArithOp, Backend};
use vision_match::config::{AppConfig, TemplateConfig};
use vision_match::error::{MatchError, MatchResult};
use vision_match::image_io::{encode_png, load_gray, load_rgb};
use vision_match::keypoint_matching::{KeypointMatcher, KeypointReport};
use vision_match::panel::side_by_side;
use vision_match::report::{CompareReport, TemplateSection};
use vision_match::synthetic;
use vision_match::template_matching::TemplateMatcher;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.debug);

    if let Err(e) = run(args).await {
        log::error!("{}", e);
        std::process::exit(if e.is_input_error() { 2 } else { 1 });
    }
}

fn init_logging(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_millis()
        .init();
}

async fn run(args: Args) -> MatchResult<()> {
    let config = load_config(args.config.as_deref(), args.preset.as_deref())?;

    match args.command {
        Command::Compare {
            pair,
            out_dir,
            report,
        } => compare(config, pair, &out_dir, report.as_deref()).await,
        Command::Template {
            pair,
            out,
            method,
            threshold,
            max_matches,
        } => {
            let mut cfg = config.template;
            if let Some(method) = method {
                cfg.method = method;
            }
            if let Some(threshold) = threshold {
                cfg.threshold = threshold;
            }
            if let Some(max_matches) = max_matches {
                cfg.max_matches = max_matches;
            }
            let (template, target) = load_pair(&pair).await?;
            let (annotated, section) =
                tokio::task::spawn_blocking(move || template_matching(&cfg, &target, &template))
                    .await??;
            for (rank, location) in section.matches.iter().enumerate() {
                log::info!("  #{} {}", rank + 1, location);
            }
            write_png(&out, annotated).await
        }
        Command::Keypoints {
            pair,
            out,
            min_matches,
            ransac_threshold,
        } => {
            let mut cfg = config.keypoint;
            if let Some(min_matches) = min_matches {
                cfg.min_matches = min_matches;
            }
            if let Some(threshold) = ransac_threshold {
                cfg.ransac.threshold = threshold;
            }
            let (template, target) = load_pair(&pair).await?;
            let (annotated, _report, _elapsed) = tokio::task::spawn_blocking(move || {
                keypoint_matching(KeypointMatcher::new(cfg), &target, &template)
            })
            .await?;
            write_png(&out, annotated).await
        }
        Command::Arith {
            first,
            second,
            out_dir,
            op,
        } => arith(&first, &second, &out_dir, op).await,
        Command::Synth {
            out_dir,
            width,
            height,
            crop,
            seed,
        } => synth(&out_dir, width, height, &crop, seed).await,
    }
}

fn load_config(path: Option<&Path>, preset: Option<&str>) -> MatchResult<AppConfig> {
    if let Some(path) = path {
        return AppConfig::from_json_file(path);
    }
    match preset {
        Some(name) => AppConfig::preset(name).ok_or_else(|| MatchError::InvalidArgument {
            message: format!("unknown preset '{}', expected default, strict or permissive", name),
        }),
        None => Ok(AppConfig::default()),
    }
}

async fn load_pair(pair: &ImagePair) -> MatchResult<(GrayImage, GrayImage)> {
    let (template_path, target_path) = (pair.template.clone(), pair.target.clone());
    tokio::task::spawn_blocking(move || {
        Ok::<_, MatchError>((load_gray(&template_path)?, load_gray(&target_path)?))
    })
    .await?
}

async fn write_png(path: &Path, image: impl Into<image::DynamicImage>) -> MatchResult<()> {
    let bytes = encode_png(image, path)?;
    tokio::fs::write(path, bytes).await?;
    log::info!("Saved {}", path.display());
    Ok(())
}

fn template_matching(
    cfg: &TemplateConfig,
    target: &GrayImage,
    template: &GrayImage,
) -> MatchResult<(GrayImage, TemplateSection)> {
    let started = Instant::now();
    let matcher = TemplateMatcher::new(cfg.method);
    let (annotated, best) = matcher.annotate(target, template, &cfg.overlay)?;
    let matches = matcher.find_matches(target, template, cfg.threshold, cfg.max_matches)?;
    let elapsed_ms = started.elapsed().as_millis();
    log::info!("Template matching took {} ms", elapsed_ms);

    Ok((
        annotated,
        TemplateSection {
            best,
            matches,
            elapsed_ms,
        },
    ))
}

fn keypoint_matching(
    matcher: KeypointMatcher,
    target: &GrayImage,
    template: &GrayImage,
) -> (GrayImage, KeypointReport, u128) {
    let started = Instant::now();
    let (annotated, report) = matcher.run(target, template);
    let elapsed_ms = started.elapsed().as_millis();
    log::info!("Keypoint matching took {} ms", elapsed_ms);
    (annotated, report, elapsed_ms)
}

async fn compare(
    config: AppConfig,
    pair: ImagePair,
    out_dir: &Path,
    report_path: Option<&Path>,
) -> MatchResult<()> {
    let (template, target) = load_pair(&pair).await?;
    let (template, target) = (Arc::new(template), Arc::new(target));
    log::info!(
        "Comparing template {}x{} against target {}x{}",
        template.width(),
        template.height(),
        target.width(),
        target.height()
    );

    let template_task = {
        let (template, target) = (Arc::clone(&template), Arc::clone(&target));
        let cfg = config.template.clone();
        tokio::task::spawn_blocking(move || template_matching(&cfg, &target, &template))
    };
    let keypoint_task = {
        let (template, target) = (Arc::clone(&template), Arc::clone(&target));
        let matcher = KeypointMatcher::new(config.keypoint.clone());
        tokio::task::spawn_blocking(move || keypoint_matching(matcher, &target, &template))
    };

    let (template_result, keypoint_result) = tokio::join!(template_task, keypoint_task);
    let (template_image, template_section) = template_result??;
    let (keypoint_image, keypoint_report, keypoint_elapsed_ms) = keypoint_result?;

    tokio::fs::create_dir_all(out_dir).await?;
    let panel = side_by_side(&[&template_image, &*template, &keypoint_image]);
    write_png(&out_dir.join("template_matching.png"), template_image).await?;
    write_png(&out_dir.join("keypoint_matching.png"), keypoint_image).await?;
    write_png(&out_dir.join("panel.png"), panel).await?;

    if let Some(path) = report_path {
        let report = CompareReport {
            template_path: pair.template,
            target_path: pair.target,
            template_size: template.dimensions(),
            target_size: target.dimensions(),
            template_matching: template_section,
            keypoint_matching: keypoint_report,
            keypoint_elapsed_ms,
        };
        tokio::fs::write(path, report.to_json()?).await?;
        log::info!("Report written to {}", path.display());
    }
    Ok(())
}

async fn arith(first: &Path, second: &Path, out_dir: &Path, only: Option<ArithOp>) -> MatchResult<()> {
    let (first_path, second_path) = (first.to_path_buf(), second.to_path_buf());
    let (a, b) =
        tokio::task::spawn_blocking(move || Ok::<_, MatchError>((load_rgb(&first_path)?, load_rgb(&second_path)?)))
            .await??;

    let stem = first
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    log::info!("Processing image: {} ({}x{})", stem, a.width(), a.height());

    let ops = match only {
        Some(op) => vec![op],
        None => vec![ArithOp::Add, ArithOp::Subtract],
    };
    tokio::fs::create_dir_all(out_dir).await?;

    for op in ops {
        for backend in [Backend::Scalar, Backend::Simd] {
            let started = Instant::now();
            let result = arithmetic::apply(op, backend, &a, &b)?;
            log::info!(
                "{} ({}) took {} us",
                op.name(),
                backend.name(),
                started.elapsed().as_micros()
            );
            let name = format!("result_{}_{}_{}.png", op.name(), stem, backend.name());
            write_png(&out_dir.join(name), result).await?;
        }
    }
    Ok(())
}

async fn synth(out_dir: &Path, width: u32, height: u32, crop: &[u32], seed: u64) -> MatchResult<()> {
    let &[x, y, w, h] = crop else {
        return Err(MatchError::InvalidArgument {
            message: format!("--crop takes x,y,w,h, got {} values", crop.len()),
        });
    };
    if x.saturating_add(w) > width || y.saturating_add(h) > height {
        return Err(MatchError::InvalidArgument {
            message: format!("crop {},{} {}x{} falls outside {}x{}", x, y, w, h, width, height),
        });
    }
    MatchError::check_non_empty("Synthetic template", w, h)?;

    let target = synthetic::textured_scene(width, height, seed);
    let template = synthetic::crop(&target, x, y, w, h);

    tokio::fs::create_dir_all(out_dir).await?;
    write_png(&out_dir.join("target.png"), target).await?;
    write_png(&out_dir.join("template.png"), template).await
}
