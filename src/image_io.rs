//! Loading and encoding of images with path-aware errors

use crate::error::{MatchError, MatchResult};
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use std::io::Cursor;
use std::path::Path;

fn open(path: &Path) -> MatchResult<DynamicImage> {
    image::open(path).map_err(|source| MatchError::ImageOpen {
        path: path.to_path_buf(),
        source,
    })
}

/// Load an image as 8-bit grayscale
pub fn load_gray(path: impl AsRef<Path>) -> MatchResult<GrayImage> {
    let path = path.as_ref();
    let image = open(path)?.to_luma8();
    log::debug!("Loaded {:?} ({}x{})", path, image.width(), image.height());
    Ok(image)
}

/// Load an image as 8-bit RGB
pub fn load_rgb(path: impl AsRef<Path>) -> MatchResult<RgbImage> {
    let path = path.as_ref();
    Ok(open(path)?.to_rgb8())
}

/// Encode `image` as PNG bytes. `path` is only used for error context.
pub fn encode_png(image: impl Into<DynamicImage>, path: impl AsRef<Path>) -> MatchResult<Vec<u8>> {
    let mut bytes = Vec::new();
    image
        .into()
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|source| MatchError::ImageSave {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
    Ok(bytes)
}
