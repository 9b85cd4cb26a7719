//! Image decode/encode service used by fallback delivery.

use anyhow::{Context, Result};
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ColorType, ImageEncoder};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

/// Converts a sticker file into a PNG file.
///
/// Implementations must be callable from a worker thread.
pub trait Transcoder: Send + Sync {
    /// Decode `src` and write it as PNG to `dest`. `quality` is 0-100.
    fn to_png(&self, src: &Path, dest: &Path, quality: u8) -> Result<()>;
}

/// Transcoder on top of the `image` crate.
///
/// The source format is sniffed from the file content, so misnamed stickers
/// still convert. Animated sources (gif, animated webp) are reduced to their
/// first frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct PngTranscoder;

impl Transcoder for PngTranscoder {
    fn to_png(&self, src: &Path, dest: &Path, quality: u8) -> Result<()> {
        let img = image::io::Reader::open(src)
            .and_then(|r| r.with_guessed_format())
            .with_context(|| format!("open {}", src.display()))?
            .decode()
            .with_context(|| format!("decode {}", src.display()))?;
        let rgba = img.to_rgba8();

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        let file = File::create(dest).with_context(|| format!("create {}", dest.display()))?;
        let encoder = PngEncoder::new_with_quality(
            BufWriter::new(file),
            compression_for(quality),
            FilterType::Adaptive,
        );
        encoder
            .write_image(rgba.as_raw(), rgba.width(), rgba.height(), ColorType::Rgba8)
            .with_context(|| format!("encode {}", dest.display()))?;
        Ok(())
    }
}

// PNG is lossless; quality only trades size for speed.
fn compression_for(quality: u8) -> CompressionType {
    match quality {
        0..=33 => CompressionType::Fast,
        34..=90 => CompressionType::Default,
        _ => CompressionType::Best,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};

    #[test]
    fn test_misnamed_source_becomes_png() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("in.webp");
        RgbaImage::from_pixel(3, 2, Rgba([10, 20, 30, 255]))
            .save_with_format(&src, ImageFormat::Gif)
            .unwrap();

        let dest = dir.path().join("out/nested/o.png");
        PngTranscoder.to_png(&src, &dest, 90).unwrap();

        let decoded = image::open(&dest).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (3, 2));
        assert_eq!(
            image::ImageFormat::from_path(&dest).unwrap(),
            ImageFormat::Png
        );
    }

    #[test]
    fn test_garbage_source_fails() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("bad.webp");
        fs::write(&src, b"not an image").unwrap();
        let dest = dir.path().join("o.png");
        assert!(PngTranscoder.to_png(&src, &dest, 90).is_err());
        assert!(!dest.exists());
    }
}
