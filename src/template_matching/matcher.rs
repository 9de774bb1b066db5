/// Template matching implementation
///
/// Slides a template over a search image and scores every placement. The
/// zero-mean normalized correlation is computed here with exact integer
/// window statistics; the other methods delegate to `imageproc`.
use super::types::{MatchMethod, TemplateLocation};
use crate::error::{MatchError, MatchResult};
use crate::overlay::{OverlayStyle, draw_rectangle};
use image::{GrayImage, ImageBuffer, Luma};
use imageproc::template_matching::{MatchTemplateMethod, find_extremes, match_template};
use rayon::prelude::*;

/// Score map produced by template matching, one value per top-left placement
pub type ScoreMap = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Template matcher for finding a template in an image
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateMatcher {
    method: MatchMethod,
}

impl TemplateMatcher {
    /// Create a matcher using `method`
    pub fn new(method: MatchMethod) -> Self {
        Self { method }
    }

    /// Score every placement of `template` inside `image`.
    ///
    /// The map is `(W - w + 1) x (H - h + 1)`.
    pub fn score_map(&self, image: &GrayImage, template: &GrayImage) -> MatchResult<ScoreMap> {
        validate(image, template)?;

        log::debug!(
            "Template matching {}x{} in {}x{} using {:?}",
            template.width(),
            template.height(),
            image.width(),
            image.height(),
            self.method
        );

        let map = match self.method {
            MatchMethod::CorrelationCoefficientNormed => correlation_coefficient_map(image, template),
            MatchMethod::CrossCorrelationNormed => {
                match_template(image, template, MatchTemplateMethod::CrossCorrelationNormalized)
            }
            MatchMethod::SumSquaredErrorsNormed => {
                match_template(image, template, MatchTemplateMethod::SumOfSquaredErrorsNormalized)
            }
        };
        Ok(map)
    }

    /// Find the single best placement. Ties resolve to the first in row-major order.
    pub fn locate(&self, image: &GrayImage, template: &GrayImage) -> MatchResult<TemplateLocation> {
        let map = self.score_map(image, template)?;
        let extremes = find_extremes(&map);

        let ((x, y), score) = if self.method.prefers_minimum() {
            (extremes.min_value_location, extremes.min_value)
        } else {
            (extremes.max_value_location, extremes.max_value)
        };

        Ok(TemplateLocation {
            x,
            y,
            width: template.width(),
            height: template.height(),
            score,
        })
    }

    /// Find all placements whose score passes `threshold`
    ///
    /// # Returns
    /// Vec of locations sorted best first, at most `max_matches` long
    pub fn find_matches(
        &self,
        image: &GrayImage,
        template: &GrayImage,
        threshold: f32,
        max_matches: usize,
    ) -> MatchResult<Vec<TemplateLocation>> {
        let map = self.score_map(image, template)?;

        let mut matches: Vec<TemplateLocation> = map
            .enumerate_pixels()
            .filter(|(_, _, p)| self.method.passes(p[0], threshold))
            .map(|(x, y, p)| TemplateLocation {
                x,
                y,
                width: template.width(),
                height: template.height(),
                score: p[0],
            })
            .collect();

        // Sort best first; stable sort keeps row-major order among equal scores
        if self.method.prefers_minimum() {
            matches.sort_by(|a, b| a.score.total_cmp(&b.score));
        } else {
            matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        }
        matches.truncate(max_matches);

        log::debug!("Found {} placements passing {:.3}", matches.len(), threshold);
        Ok(matches)
    }

    /// Draw the best-match rectangle on a copy of `image`
    pub fn annotate(
        &self,
        image: &GrayImage,
        template: &GrayImage,
        style: &OverlayStyle,
    ) -> MatchResult<(GrayImage, TemplateLocation)> {
        let location = self.locate(image, template)?;
        let mut annotated = image.clone();
        draw_rectangle(
            &mut annotated,
            location.x,
            location.y,
            location.width,
            location.height,
            style,
        );
        log::info!("Template matching: best match {}", location);
        Ok((annotated, location))
    }
}

fn validate(image: &GrayImage, template: &GrayImage) -> MatchResult<()> {
    MatchError::check_non_empty("Search", image.width(), image.height())?;
    MatchError::check_non_empty("Template", template.width(), template.height())?;

    if template.width() > image.width() || template.height() > image.height() {
        return Err(MatchError::TemplateTooLarge {
            template_width: template.width(),
            template_height: template.height(),
            image_width: image.width(),
            image_height: image.height(),
        });
    }
    Ok(())
}

/// Zero-mean normalized cross-correlation.
///
/// Window sums are accumulated in integers so flat windows score exactly 0
/// and an exact copy of the template scores 1.
fn correlation_coefficient_map(image: &GrayImage, template: &GrayImage) -> ScoreMap {
    let (image_width, image_height) = image.dimensions();
    let (tw, th) = template.dimensions();
    let (out_w, out_h) = (image_width - tw + 1, image_height - th + 1);

    let pixels = image.as_raw();
    let tpl = template.as_raw();
    let n = (tw as i128) * (th as i128);

    let sum_t: u64 = tpl.iter().map(|&v| v as u64).sum();
    let sum_tt: u64 = tpl.iter().map(|&v| v as u64 * v as u64).sum();
    let n_var_t = n * sum_tt as i128 - (sum_t as i128) * (sum_t as i128);

    let scores: Vec<f32> = (0..out_h)
        .into_par_iter()
        .flat_map_iter(|y| {
            (0..out_w).map(move |x| {
                let (mut sum_i, mut sum_ii, mut sum_ti) = (0u64, 0u64, 0u64);
                for ty in 0..th {
                    let image_row = ((y + ty) * image_width + x) as usize;
                    let template_row = (ty * tw) as usize;
                    let window = &pixels[image_row..image_row + tw as usize];
                    let reference = &tpl[template_row..template_row + tw as usize];
                    for (&iv, &tv) in window.iter().zip(reference) {
                        let (iv, tv) = (iv as u64, tv as u64);
                        sum_i += iv;
                        sum_ii += iv * iv;
                        sum_ti += iv * tv;
                    }
                }

                let n_var_i = n * sum_ii as i128 - (sum_i as i128) * (sum_i as i128);
                if n_var_t == 0 || n_var_i == 0 {
                    return 0.0;
                }
                let cross = n * sum_ti as i128 - (sum_t as i128) * (sum_i as i128);
                let score = cross as f64 / ((n_var_t as f64).sqrt() * (n_var_i as f64).sqrt());
                score.clamp(-1.0, 1.0) as f32
            })
        })
        .collect();

    ImageBuffer::from_fn(out_w, out_h, |x, y| Luma([scores[(y * out_w + x) as usize]]))
}
