//! Encoding the flattened composite for download.

use std::io::Cursor;

use chrono::Utc;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbaImage};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::RenderError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "lowercase")]
pub enum ExportFormat {
    Png,
    /// `quality` in 0..=1 (0.7 for size-constrained mobile export).
    Jpeg { quality: f32 },
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Jpeg { .. } => "jpg",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Png => "image/png",
            ExportFormat::Jpeg { .. } => "image/jpeg",
        }
    }
}

/// An encoded image ready to hand to the user.
#[derive(Debug, Clone)]
pub struct ExportedImage {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub mime_type: &'static str,
    pub width: u32,
    pub height: u32,
}

/// Encode `image` as `format`.
///
/// JPEG has no alpha channel, so the image is flattened over opaque black
/// first.
pub fn encode(image: &RgbaImage, format: ExportFormat) -> Result<ExportedImage, RenderError> {
    let (width, height) = image.dimensions();
    let mut bytes = Vec::new();
    match format {
        ExportFormat::Png => {
            PngEncoder::new(Cursor::new(&mut bytes)).write_image(
                image.as_raw(),
                width,
                height,
                ExtendedColorType::Rgba8,
            )?;
        }
        ExportFormat::Jpeg { quality } => {
            let rgb = flatten_over_black(image);
            JpegEncoder::new_with_quality(Cursor::new(&mut bytes), jpeg_quality(quality)).write_image(
                &rgb,
                width,
                height,
                ExtendedColorType::Rgb8,
            )?;
        }
    }
    tracing::debug!(width, height, bytes = bytes.len(), ?format, "encoded export");
    Ok(ExportedImage {
        bytes,
        filename: export_filename(format),
        mime_type: format.mime_type(),
        width,
        height,
    })
}

/// `backdrop-{timestamp}-{8 hex chars}.{ext}`, unique per call.
pub fn export_filename(format: ExportFormat) -> String {
    let stamp = Utc::now().format("%Y%m%d-%H%M%S");
    let id = Uuid::new_v4().simple().to_string();
    format!("backdrop-{stamp}-{}.{}", &id[..8], format.extension())
}

/// Map 0..=1 onto the encoder's 1..=100 scale.
fn jpeg_quality(quality: f32) -> u8 {
    (quality.clamp(0.0, 1.0) * 100.0).round().clamp(1.0, 100.0) as u8
}

fn flatten_over_black(image: &RgbaImage) -> Vec<u8> {
    image
        .pixels()
        .flat_map(|px| {
            let [r, g, b, a] = px.0;
            let scale = |c: u8| ((c as u32 * a as u32 + 127) / 255) as u8;
            [scale(r), scale(g), scale(b)]
        })
        .collect()
}
