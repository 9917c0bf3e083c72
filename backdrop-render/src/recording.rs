//! A surface that records draw calls instead of rasterizing.
//!
//! Used to assert paint order and state handling without depending on
//! installed fonts. Text measurement is deterministic: each character is
//! half an em wide.

use backdrop_api::{FilterSettings, Rgba};
use image::RgbaImage;

use crate::primitives::Rect;
use crate::surface::{FontDescriptor, Shadow, Surface, TextMeasurer, TextMetrics, TextRun};

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Resize { width: u32, height: u32 },
    Save,
    Restore,
    ResetTransform,
    Translate { dx: f32, dy: f32 },
    Rotate { degrees: f32 },
    GlobalAlpha(f32),
    Filter(Option<FilterSettings>),
    Shadow(Option<Shadow>),
    FillRect { rect: Rect, color: Rgba },
    StrokeRoundRect { rect: Rect, radius: f32, color: Rgba, line_width: f32 },
    DrawImage { width: u32, height: u32 },
    FillText { text: String, x: f32, y: f32, font: String, color: Rgba },
    StrokeText { text: String, x: f32, y: f32, font: String, color: Rgba, line_width: f32 },
}

#[derive(Debug, Default)]
pub struct RecordingSurface {
    width: u32,
    height: u32,
    pub commands: Vec<DrawCommand>,
    /// Number of `measure_text` calls that reached this surface.
    pub measure_calls: usize,
}

impl RecordingSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    /// Text of every fill_text call, in order.
    pub fn filled_texts(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::FillText { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Width of a run under the deterministic metric.
    pub fn advance(text: &str, size_px: f32) -> f32 {
        text.chars().count() as f32 * size_px * 0.5
    }
}

impl TextMeasurer for RecordingSurface {
    fn measure_text(&mut self, text: &str, font: &FontDescriptor) -> TextMetrics {
        self.measure_calls += 1;
        TextMetrics {
            width: Self::advance(text, font.size_px),
            ascent: font.size_px * 0.8,
            descent: font.size_px * 0.2,
        }
    }
}

impl Surface for RecordingSurface {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.commands.push(DrawCommand::Resize { width, height });
    }

    fn save(&mut self) {
        self.commands.push(DrawCommand::Save);
    }

    fn restore(&mut self) {
        self.commands.push(DrawCommand::Restore);
    }

    fn reset_transform(&mut self) {
        self.commands.push(DrawCommand::ResetTransform);
    }

    fn translate(&mut self, dx: f32, dy: f32) {
        self.commands.push(DrawCommand::Translate { dx, dy });
    }

    fn rotate(&mut self, degrees: f32) {
        self.commands.push(DrawCommand::Rotate { degrees });
    }

    fn set_global_alpha(&mut self, alpha: f32) {
        self.commands.push(DrawCommand::GlobalAlpha(alpha));
    }

    fn set_filter(&mut self, filter: Option<FilterSettings>) {
        self.commands.push(DrawCommand::Filter(filter));
    }

    fn set_shadow(&mut self, shadow: Option<Shadow>) {
        self.commands.push(DrawCommand::Shadow(shadow));
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgba) {
        self.commands.push(DrawCommand::FillRect { rect, color });
    }

    fn stroke_round_rect(&mut self, rect: Rect, radius: f32, color: Rgba, line_width: f32) {
        self.commands.push(DrawCommand::StrokeRoundRect {
            rect,
            radius,
            color,
            line_width,
        });
    }

    fn draw_image(&mut self, image: &RgbaImage) {
        self.commands.push(DrawCommand::DrawImage {
            width: image.width(),
            height: image.height(),
        });
    }

    fn fill_text(&mut self, run: &TextRun<'_>, color: Rgba) {
        self.commands.push(DrawCommand::FillText {
            text: run.text.to_string(),
            x: run.x,
            y: run.y,
            font: run.font.css(),
            color,
        });
    }

    fn stroke_text(&mut self, run: &TextRun<'_>, color: Rgba, line_width: f32) {
        self.commands.push(DrawCommand::StrokeText {
            text: run.text.to_string(),
            x: run.x,
            y: run.y,
            font: run.font.css(),
            color,
            line_width,
        });
    }
}
