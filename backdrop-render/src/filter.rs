//! Pixel implementations of the surface filter chain.
//!
//! Operates on premultiplied RGBA (tiny-skia's native layout). The order is
//! the one the filter string spells: brightness, then contrast, then blur.

use backdrop_api::FilterSettings;
use image::{imageops, RgbaImage};
use tiny_skia::Pixmap;

/// Apply `settings` to every pixel of `pixmap` in place.
pub fn apply_filter(pixmap: &mut Pixmap, settings: &FilterSettings) {
    if settings.is_identity() {
        return;
    }

    let brightness = (settings.brightness / 100.0).max(0.0);
    let contrast = (settings.contrast / 100.0).max(0.0);
    if brightness != 1.0 || contrast != 1.0 {
        for px in pixmap.data_mut().chunks_exact_mut(4) {
            let a = px[3] as f32;
            if a == 0.0 {
                continue;
            }
            for channel in &mut px[..3] {
                let v = *channel as f32 * brightness;
                let v = (v - 0.5 * a) * contrast + 0.5 * a;
                *channel = v.round().clamp(0.0, a) as u8;
            }
        }
    }

    if settings.blur > 0.0 {
        gaussian_blur(pixmap, settings.blur);
    }
}

/// Gaussian blur with standard deviation `sigma`, in place.
///
/// Blurring premultiplied data keeps edges free of dark fringes.
pub fn gaussian_blur(pixmap: &mut Pixmap, sigma: f32) {
    if sigma <= 0.0 {
        return;
    }
    let (width, height) = (pixmap.width(), pixmap.height());
    let Some(source) = RgbaImage::from_raw(width, height, pixmap.data().to_vec()) else {
        return;
    };
    let blurred = imageops::blur(&source, sigma);
    let data = pixmap.data_mut();
    data.copy_from_slice(blurred.as_raw());
    // Rounding in the kernel can push a color channel above alpha.
    for px in data.chunks_exact_mut(4) {
        let a = px[3];
        for channel in &mut px[..3] {
            *channel = (*channel).min(a);
        }
    }
}
