use std::io::Cursor;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
}

impl OutputFormat {
    pub fn mime(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }
}

#[derive(Debug, Clone)]
pub struct NormalizedImage {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
}

impl NormalizedImage {
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.format.mime(), B64.encode(&self.bytes))
    }
}

/// Scale `(width, height)` down so neither side exceeds `max`, keeping the
/// aspect ratio. Never scales up.
pub fn target_dimensions(width: u32, height: u32, max: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (width, height);
    }

    let ratio = f64::min(max as f64 / width as f64, max as f64 / height as f64);
    if ratio >= 1.0 {
        return (width, height);
    }

    let scaled = |side: u32| ((side as f64 * ratio).round() as u32).clamp(1, max);
    (scaled(width), scaled(height))
}

/// Decode, downscale and re-encode an image. JPEG at `quality` is preferred;
/// PNG is used when the JPEG encoder refuses the image.
pub fn normalize(
    bytes: &[u8],
    max_dimension: u32,
    quality: u8,
) -> Result<NormalizedImage, image::ImageError> {
    let img = image::load_from_memory(bytes)?;

    let (width, height) = img.dimensions();
    let (target_w, target_h) = target_dimensions(width, height, max_dimension);
    let img = if (target_w, target_h) == (width, height) {
        img
    } else {
        debug!("Resizing {}x{} to {}x{}", width, height, target_w, target_h);
        img.resize_exact(target_w, target_h, FilterType::Lanczos3)
    };

    match encode_jpeg(&img, quality) {
        Ok(bytes) => Ok(NormalizedImage {
            bytes,
            format: OutputFormat::Jpeg,
            width: target_w,
            height: target_h,
        }),
        Err(e) => {
            warn!("JPEG encoding failed, falling back to PNG: {}", e);
            let mut out = Cursor::new(Vec::new());
            img.write_to(&mut out, ImageFormat::Png)?;
            Ok(NormalizedImage {
                bytes: out.into_inner(),
                format: OutputFormat::Png,
                width: target_w,
                height: target_h,
            })
        }
    }
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, image::ImageError> {
    // JPEG has no alpha channel
    let rgb = img.to_rgb8();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality).encode_image(&rgb)?;
    Ok(out)
}
