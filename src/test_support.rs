//! Sample images for tests.

use image::{Rgb, RgbImage};
use std::path::{Path, PathBuf};

fn sample_image() -> RgbImage {
    RgbImage::from_fn(16, 12, |x, y| Rgb([(x * 16) as u8, (y * 20) as u8, 90]))
}

fn save_sample(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    sample_image().save(&path).unwrap();
    path
}

/// A 16x12 baseline JPEG without EXIF.
pub(crate) fn sample_jpeg(dir: &Path, name: &str) -> PathBuf {
    save_sample(dir, name)
}

pub(crate) fn sample_png(dir: &Path, name: &str) -> PathBuf {
    save_sample(dir, name)
}

/// A 16x12 lossless WebP.
pub(crate) fn sample_webp(dir: &Path, name: &str) -> PathBuf {
    save_sample(dir, name)
}
