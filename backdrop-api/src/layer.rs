//! Text layer representation - one independently styled text element.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Stable identity of a text layer within an editor session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerId(pub u64);

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "layer#{}", self.0)
    }
}

/// A point in surface pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ORIGIN: Self = Self { x: 0.0, y: 0.0 };

    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
}

impl FontStyle {
    pub fn as_css(&self) -> &'static str {
        match self {
            FontStyle::Normal => "normal",
            FontStyle::Italic => "italic",
        }
    }
}

/// Numeric font weight (1..=1000, CSS scale).
///
/// Deserializes from a number or a name such as `"bold"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct FontWeight(pub u16);

impl FontWeight {
    pub const THIN: Self = Self(100);
    pub const LIGHT: Self = Self(300);
    pub const NORMAL: Self = Self(400);
    pub const MEDIUM: Self = Self(500);
    pub const BOLD: Self = Self(700);
    pub const BLACK: Self = Self(900);

    /// Resolve a named or numeric weight. Unknown names fall back to normal.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if let Ok(n) = value.parse::<u16>() {
            return Self(n.clamp(1, 1000));
        }
        match value.to_ascii_lowercase().as_str() {
            "thin" | "hairline" => Self::THIN,
            "extralight" | "ultralight" => Self(200),
            "light" => Self::LIGHT,
            "medium" => Self::MEDIUM,
            "semibold" | "demibold" => Self(600),
            "bold" => Self::BOLD,
            "extrabold" | "ultrabold" => Self(800),
            "black" | "heavy" => Self::BLACK,
            _ => Self::NORMAL,
        }
    }
}

impl Default for FontWeight {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl<'de> Deserialize<'de> for FontWeight {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u16),
            Name(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Self(n.clamp(1, 1000)),
            Raw::Name(name) => Self::parse(&name),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    Left,
    #[default]
    Center,
    Right,
}

/// Drop shadow painted under each line of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextShadow {
    pub enabled: bool,
    pub color: String,
    pub offset_x: f32,
    pub offset_y: f32,
    pub blur: f32,
}

impl Default for TextShadow {
    fn default() -> Self {
        Self {
            enabled: false,
            color: "#000000".to_string(),
            offset_x: 4.0,
            offset_y: 4.0,
            blur: 10.0,
        }
    }
}

/// Solid box drawn behind the whole text block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBackground {
    pub enabled: bool,
    pub color: String,
    pub opacity: f32,
    pub padding: f32,
}

impl Default for TextBackground {
    fn default() -> Self {
        Self {
            enabled: false,
            color: "#000000".to_string(),
            opacity: 0.5,
            padding: 16.0,
        }
    }
}

/// Outline stroked over the glyphs after they are filled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextStroke {
    pub enabled: bool,
    pub color: String,
    pub width: f32,
}

impl Default for TextStroke {
    fn default() -> Self {
        Self {
            enabled: false,
            color: "#000000".to_string(),
            width: 2.0,
        }
    }
}

/// One text element composited onto the image.
///
/// `position` is derived from `slider_x`/`slider_y` and the surface size; the
/// editor session owns that recomputation. Renderers only ever read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextLayer {
    pub id: LayerId,
    pub content: String,
    pub font: String,
    /// Percentage of the output surface width.
    pub font_size: f32,
    pub font_weight: FontWeight,
    pub font_style: FontStyle,
    pub color: String,
    pub position: Point,
    pub slider_x: f32,
    pub slider_y: f32,
    pub opacity: f32,
    /// Line advance multiplier. Negative values are accepted and stack lines upwards.
    pub line_height: f32,
    pub letter_spacing: f32,
    /// Degrees, clockwise.
    pub rotation: f32,
    pub alignment: TextAlign,
    pub shadow: TextShadow,
    pub background: TextBackground,
    pub stroke: TextStroke,
    pub on_top: bool,
}

impl Default for TextLayer {
    fn default() -> Self {
        Self::new(LayerId(0))
    }
}

impl TextLayer {
    pub const DEFAULT_CONTENT: &'static str = "edit";
    pub const DEFAULT_FONT: &'static str = "Inter";
    pub const DEFAULT_FONT_SIZE: f32 = 50.0;

    /// A layer with every field at its documented default.
    pub fn new(id: LayerId) -> Self {
        Self {
            id,
            content: Self::DEFAULT_CONTENT.to_string(),
            font: Self::DEFAULT_FONT.to_string(),
            font_size: Self::DEFAULT_FONT_SIZE,
            font_weight: FontWeight::BOLD,
            font_style: FontStyle::Normal,
            color: "#FFFFFF".to_string(),
            position: Point::ORIGIN,
            slider_x: 0.0,
            slider_y: 0.0,
            opacity: 1.0,
            line_height: 1.2,
            letter_spacing: 0.0,
            rotation: 0.0,
            alignment: TextAlign::Center,
            shadow: TextShadow::default(),
            background: TextBackground::default(),
            stroke: TextStroke::default(),
            on_top: false,
        }
    }

    /// Lines of the content, split on explicit line breaks.
    ///
    /// Always yields at least one (possibly empty) line.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.content.split('\n').map(|line| line.strip_suffix('\r').unwrap_or(line))
    }

    /// Whether the content has any visible characters.
    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }

    /// Absolute font size in pixels for a surface of the given width.
    #[inline]
    pub fn font_px(&self, surface_width: f32) -> f32 {
        self.font_size / 100.0 * surface_width
    }
}
