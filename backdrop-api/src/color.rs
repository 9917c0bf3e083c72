//! Color strings as typed in the editor.
//!
//! Parsing never fails: a missing `#` on a hex literal is restored, and
//! anything unparseable degrades to opaque black, matching what a 2D canvas
//! does with a bad fill style.

use serde::{Deserialize, Serialize};

/// 8-bit straight-alpha RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const BLACK: Self = Self::new(0, 0, 0, 255);
    pub const WHITE: Self = Self::new(255, 255, 255, 255);
    pub const TRANSPARENT: Self = Self::new(0, 0, 0, 0);

    #[inline]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Scale the alpha channel by `factor` (clamped to 0..=1).
    #[inline]
    pub fn with_opacity(self, factor: f32) -> Self {
        let a = (self.a as f32 * factor.clamp(0.0, 1.0)).round() as u8;
        Self { a, ..self }
    }
}

/// Restore a missing `#` on bare hex literals (`fff`, `ff0000`, `ff000080`).
pub fn normalize_color(input: &str) -> String {
    let trimmed = input.trim();
    let is_bare_hex = matches!(trimmed.len(), 3 | 4 | 6 | 8)
        && trimmed.chars().all(|c| c.is_ascii_hexdigit());
    if is_bare_hex {
        format!("#{trimmed}")
    } else {
        trimmed.to_string()
    }
}

/// Parse any CSS color string, degrading to opaque black.
pub fn parse_color(input: &str) -> Rgba {
    let normalized = normalize_color(input);
    match csscolorparser::parse(&normalized) {
        Ok(color) => {
            let [r, g, b, a] = color.to_rgba8();
            Rgba::new(r, g, b, a)
        }
        Err(_) => {
            tracing::debug!(color = input, "unparseable color, using black");
            Rgba::BLACK
        }
    }
}
