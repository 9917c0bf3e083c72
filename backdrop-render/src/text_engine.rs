//! Text Engine - cosmic-text integration for measuring and rasterizing lines.
//!
//! The font system is expensive to build (it scans system fonts), so a single
//! instance is shared process-wide behind a mutex together with the swash
//! glyph cache. Lines are shaped with advanced shaping, then glyph bitmaps
//! are composited into a small premultiplied pixmap that surfaces place with
//! their current transform.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, OnceLock};

use backdrop_api::{FontStyle, Rgba};
use cosmic_text::{
    Attrs, Buffer, CacheKey, Family, FontSystem, Metrics, Shaping, Style, SwashCache,
    SwashContent, Weight,
};
use tiny_skia::{ColorU8, Pixmap, PremultipliedColorU8};

use crate::surface::{FontDescriptor, TextMetrics};

/// Font system and glyph cache, shared by every surface.
struct FontEngine {
    font_system: FontSystem,
    swash_cache: SwashCache,
}

static ENGINE: OnceLock<Mutex<FontEngine>> = OnceLock::new();

fn engine() -> MutexGuard<'static, FontEngine> {
    ENGINE
        .get_or_init(|| {
            Mutex::new(FontEngine {
                font_system: FontSystem::new(),
                swash_cache: SwashCache::new(),
            })
        })
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Register every font in a directory. Returns the number of faces added.
pub fn load_fonts_dir(path: &Path) -> usize {
    let mut engine = engine();
    let before = engine.font_system.db().len();
    engine.font_system.db_mut().load_fonts_dir(path);
    let added = engine.font_system.db().len().saturating_sub(before);
    tracing::debug!(path = %path.display(), added, "loaded font directory");
    added
}

fn family(name: &str) -> Family<'_> {
    let trimmed = name.trim();
    match trimmed.to_ascii_lowercase().as_str() {
        "serif" => Family::Serif,
        "sans-serif" => Family::SansSerif,
        "monospace" => Family::Monospace,
        "cursive" => Family::Cursive,
        "fantasy" => Family::Fantasy,
        _ => Family::Name(trimmed),
    }
}

struct ShapedGlyph {
    cache_key: CacheKey,
    x: i32,
    y: i32,
    /// Letter-spacing steps to the left of this glyph's cluster.
    spacing_steps: usize,
}

/// Number of letter-spacing steps a line takes: one per character, so a
/// ligature advances by as many steps as the characters it covers.
pub fn spacing_steps(text: &str) -> usize {
    text.chars().count()
}

/// A shaped single line: glyph keys plus line box metrics.
struct ShapedLine {
    glyphs: Vec<ShapedGlyph>,
    width: f32,
    /// Baseline offset from the top of the line box.
    baseline: f32,
    line_height: f32,
}

/// Shape a line, degrading to an empty line if cosmic-text panics
/// (it can on some glyph cache arithmetic or with an empty font database).
fn shape_line(font_system: &mut FontSystem, text: &str, font: &FontDescriptor) -> ShapedLine {
    let shaped = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        shape_line_unguarded(font_system, text, font)
    }));
    shaped.unwrap_or_else(|_| {
        tracing::warn!(len = text.len(), font = %font, "text shaping panicked, drawing nothing");
        ShapedLine {
            glyphs: Vec::new(),
            width: 0.0,
            baseline: font.size_px * 0.8,
            line_height: font.size_px,
        }
    })
}

fn shape_line_unguarded(font_system: &mut FontSystem, text: &str, font: &FontDescriptor) -> ShapedLine {
    // The line box is exactly one em tall so "vertical middle" means the em box middle.
    let size = font.size_px.max(0.5);
    let mut buffer = Buffer::new(font_system, Metrics::new(size, size));
    buffer.set_size(font_system, Some(f32::MAX), Some(f32::MAX));

    let style = match font.style {
        FontStyle::Normal => Style::Normal,
        FontStyle::Italic => Style::Italic,
    };
    let attrs = Attrs::new()
        .family(family(&font.family))
        .weight(Weight(font.weight.0))
        .style(style);
    buffer.set_text(font_system, text, attrs, Shaping::Advanced);
    buffer.shape_until_scroll(font_system, false);

    let mut line = ShapedLine {
        glyphs: Vec::new(),
        width: 0.0,
        baseline: size * 0.8,
        line_height: size,
    };
    for run in buffer.layout_runs() {
        line.width = line.width.max(run.line_w);
        line.baseline = run.line_y - run.line_top;
        line.line_height = run.line_height;
        for glyph in run.glyphs.iter() {
            let physical = glyph.physical((0., 0.), 1.0);
            line.glyphs.push(ShapedGlyph {
                cache_key: physical.cache_key,
                x: physical.x,
                y: physical.y,
                spacing_steps: text.get(..glyph.start).map_or(0, spacing_steps),
            });
        }
    }
    line
}

/// Measure one line of text with the shared font system.
pub fn measure_line(text: &str, font: &FontDescriptor) -> TextMetrics {
    let mut engine = engine();
    let line = shape_line(&mut engine.font_system, text, font);
    TextMetrics {
        width: line.width,
        ascent: line.baseline,
        descent: (line.line_height - line.baseline).max(0.0),
    }
}

/// A rasterized line and where its pixmap sits relative to the line box.
pub struct LineRaster {
    pub pixmap: Pixmap,
    /// Offset of the pixmap's left edge from the line's left edge.
    pub left: f32,
    /// Offset of the pixmap's top edge from the top of the line box.
    pub top: f32,
}

/// Rasterize `text` in `color` into a premultiplied pixmap.
///
/// `margin` extra pixels are kept around the line box so that strokes and
/// overhanging glyphs are not clipped. Returns `None` when there is nothing
/// to draw.
pub fn rasterize_line(
    text: &str,
    font: &FontDescriptor,
    color: Rgba,
    letter_spacing: f32,
    margin: f32,
) -> Option<LineRaster> {
    let mut guard = engine();
    let FontEngine {
        font_system,
        swash_cache,
    } = &mut *guard;

    let line = shape_line(font_system, text, font);
    if line.glyphs.is_empty() {
        return None;
    }

    let margin = (margin.max(0.0) + font.size_px * 0.25).ceil() as i32 + 2;
    let spacing_total = (letter_spacing * spacing_steps(text) as f32).max(0.0);
    let width = (line.width + spacing_total).ceil() as i32 + margin * 2;
    let height = line.line_height.ceil() as i32 + margin * 2;
    let mut pixmap = Pixmap::new(width.max(1) as u32, height.max(1) as u32)?;
    let pixels = pixmap.pixels_mut();

    for glyph in &line.glyphs {
        let Some(image) = swash_cache.get_image_uncached(font_system, glyph.cache_key) else {
            continue;
        };
        let spacing = (letter_spacing * glyph.spacing_steps as f32).round() as i32;
        let gx = margin + glyph.x + spacing + image.placement.left;
        let gy = margin + line.baseline.round() as i32 + glyph.y - image.placement.top;
        let gw = image.placement.width as i32;
        let gh = image.placement.height as i32;

        for row in 0..gh {
            for col in 0..gw {
                let (px, py) = (gx + col, gy + row);
                if px < 0 || py < 0 || px >= width || py >= height {
                    continue;
                }
                let src_idx = (row * gw + col) as usize;
                let src = match image.content {
                    SwashContent::Mask => {
                        tint(color, image.data.get(src_idx).copied().unwrap_or(0))
                    }
                    SwashContent::SubpixelMask => {
                        let base = src_idx * 4;
                        let sum: u32 = (0..3)
                            .map(|c| image.data.get(base + c).copied().unwrap_or(0) as u32)
                            .sum();
                        tint(color, (sum / 3) as u8)
                    }
                    SwashContent::Color => {
                        let base = src_idx * 4;
                        let channel = |c: usize| image.data.get(base + c).copied().unwrap_or(0);
                        ColorU8::from_rgba(channel(0), channel(1), channel(2), channel(3))
                            .premultiply()
                    }
                };
                let dst = &mut pixels[(py * width + px) as usize];
                *dst = source_over(src, *dst);
            }
        }
    }

    Some(LineRaster {
        pixmap,
        left: -(margin as f32),
        top: -(margin as f32),
    })
}

/// Premultiplied `color` at `coverage` (0-255).
#[inline]
fn tint(color: Rgba, coverage: u8) -> PremultipliedColorU8 {
    let a = (color.a as u32 * coverage as u32 + 127) / 255;
    ColorU8::from_rgba(color.r, color.g, color.b, a as u8).premultiply()
}

/// Porter-Duff source-over on premultiplied pixels.
#[inline]
pub(crate) fn source_over(src: PremultipliedColorU8, dst: PremultipliedColorU8) -> PremultipliedColorU8 {
    let inv = 255 - src.alpha() as u32;
    let blend = |s: u8, d: u8| (s as u32 + (d as u32 * inv + 127) / 255).min(255) as u8;
    let a = blend(src.alpha(), dst.alpha());
    PremultipliedColorU8::from_rgba(
        blend(src.red(), dst.red()).min(a),
        blend(src.green(), dst.green()).min(a),
        blend(src.blue(), dst.blue()).min(a),
        a,
    )
    .unwrap_or(dst)
}
