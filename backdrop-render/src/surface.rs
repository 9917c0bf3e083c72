//! The drawing target abstraction.
//!
//! `Surface` mirrors the subset of a 2D canvas context the compositor needs:
//! a save/restore state stack (transform, global alpha, filter, shadow),
//! rect and image draws, and single-line text draws. Text layout (line
//! splitting, alignment, vertical centering) is done by the caller; a
//! surface only places one already-positioned line at a time.

use std::fmt;

use backdrop_api::{FilterSettings, FontStyle, FontWeight, Rgba, TextLayer};
use image::RgbaImage;

use crate::primitives::Rect;

/// Fully resolved font: style, weight, pixel size and family.
#[derive(Debug, Clone, PartialEq)]
pub struct FontDescriptor {
    pub style: FontStyle,
    pub weight: FontWeight,
    pub size_px: f32,
    pub family: String,
}

impl FontDescriptor {
    /// Resolve a layer's font against a surface width.
    pub fn for_layer(layer: &TextLayer, surface_width: f32) -> Self {
        Self {
            style: layer.font_style,
            weight: layer.font_weight,
            size_px: layer.font_px(surface_width),
            family: layer.font.clone(),
        }
    }

    /// CSS font shorthand, e.g. `italic 700 500px Inter`.
    ///
    /// Doubles as the measurement cache key.
    pub fn css(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for FontDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}px {}",
            self.style.as_css(),
            self.weight.0,
            self.size_px,
            self.family
        )
    }
}

/// Result of measuring a single line of text.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TextMetrics {
    /// Advance width without letter spacing.
    pub width: f32,
    /// Distance from the baseline to the top of the line box.
    pub ascent: f32,
    /// Distance from the baseline to the bottom of the line box.
    pub descent: f32,
}

/// Drop shadow applied to draws while set on a surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shadow {
    pub color: Rgba,
    pub offset_x: f32,
    pub offset_y: f32,
    /// Canvas-style shadow blur (twice the gaussian sigma).
    pub blur: f32,
}

/// One positioned line of text.
///
/// `x` is the left edge of the line and `y` its vertical middle, both in the
/// current (transformed) coordinate space.
#[derive(Debug, Clone, Copy)]
pub struct TextRun<'a> {
    pub text: &'a str,
    pub x: f32,
    pub y: f32,
    pub font: &'a FontDescriptor,
    /// Extra advance after each character, in pixels.
    pub letter_spacing: f32,
}

/// Text measurement primitive.
pub trait TextMeasurer {
    fn measure_text(&mut self, text: &str, font: &FontDescriptor) -> TextMetrics;
}

/// A drawing target: on-screen preview or off-screen export.
pub trait Surface: TextMeasurer {
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    /// Resize to `width` x `height`, clearing pixels and resetting state.
    fn resize(&mut self, width: u32, height: u32);

    fn save(&mut self);
    fn restore(&mut self);

    /// Replace the current transform with the identity.
    fn reset_transform(&mut self);
    fn translate(&mut self, dx: f32, dy: f32);
    /// Rotate clockwise by `degrees`.
    fn rotate(&mut self, degrees: f32);

    fn set_global_alpha(&mut self, alpha: f32);
    /// Filter applied to subsequent draws; `None` clears it.
    fn set_filter(&mut self, filter: Option<FilterSettings>);
    /// Shadow applied to subsequent draws; `None` clears it.
    fn set_shadow(&mut self, shadow: Option<Shadow>);

    fn fill_rect(&mut self, rect: Rect, color: Rgba);
    fn stroke_round_rect(&mut self, rect: Rect, radius: f32, color: Rgba, line_width: f32);

    /// Draw `image` at the origin at its native size.
    fn draw_image(&mut self, image: &RgbaImage);

    fn fill_text(&mut self, run: &TextRun<'_>, color: Rgba);
    fn stroke_text(&mut self, run: &TextRun<'_>, color: Rgba, line_width: f32);
}
