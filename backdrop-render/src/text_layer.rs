//! Text Layer - lays out and paints one styled text block.
//!
//! A layer is drawn centered on its position: lines are stacked so the block
//! is vertically centered on the origin, each line is anchored horizontally
//! by the layer's alignment, and the whole block is rotated about the
//! origin. All state changes happen inside one save/restore scope.

use backdrop_api::{parse_color, Rgba, TextAlign, TextLayer};
use serde::{Deserialize, Serialize};

use crate::measure_cache::MeasureCache;
use crate::primitives::{Point, Rect, Size};
use crate::surface::{FontDescriptor, Shadow, Surface, TextRun};
use crate::text_engine::spacing_steps;

/// Appearance of the active-layer outline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionStyle {
    pub color: String,
    pub line_width: f32,
    pub corner_radius: f32,
    /// Gap between the text block and the outline.
    pub padding: f32,
}

impl Default for SelectionStyle {
    fn default() -> Self {
        Self {
            color: "#3B82F6".into(),
            line_width: 2.0,
            corner_radius: 8.0,
            padding: 10.0,
        }
    }
}

/// Per-call rendering options.
#[derive(Debug, Clone, Copy)]
pub struct LayerRenderContext<'a> {
    /// This layer is the one being edited.
    pub is_active: bool,
    /// Draw the outline for the active layer (preview only).
    pub show_selection: bool,
    pub selection: &'a SelectionStyle,
}

/// One laid-out line, in layer-local coordinates (origin at the position).
#[derive(Debug, Clone, PartialEq)]
pub struct LineLayout {
    pub text: String,
    /// Left edge.
    pub x: f32,
    /// Vertical middle.
    pub y: f32,
    /// Width including letter spacing.
    pub width: f32,
}

/// What `render_text_layer` computed for a layer.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlockLayout {
    pub font: FontDescriptor,
    pub lines: Vec<LineLayout>,
    pub max_width: f32,
    pub block_height: f32,
    /// Axis-aligned bounds of the (rotated) block in surface coordinates,
    /// including the background box when one is drawn.
    pub bounds: Rect,
}

/// Lay out `layer` for a surface of width `surface_width` without drawing.
pub fn layout_text_layer<S: Surface + ?Sized>(
    surface: &mut S,
    cache: &mut MeasureCache,
    layer: &TextLayer,
    surface_width: f32,
) -> TextBlockLayout {
    let font = FontDescriptor::for_layer(layer, surface_width);
    let size = font.size_px;
    let step = size * layer.line_height;

    let texts: Vec<&str> = layer.lines().collect();
    let widths: Vec<f32> = texts
        .iter()
        .map(|text| {
            let metrics = cache.measure(surface, text, &font);
            metrics.width + layer.letter_spacing * spacing_steps(text) as f32
        })
        .collect();
    let max_width = widths.iter().copied().fold(0.0_f32, f32::max);
    let count = texts.len();
    let block_height = count as f32 * step;

    let middle = (count as f32 - 1.0) / 2.0;
    let lines = texts
        .iter()
        .zip(&widths)
        .enumerate()
        .map(|(i, (text, &width))| LineLayout {
            text: (*text).to_string(),
            x: match layer.alignment {
                TextAlign::Left => -max_width / 2.0,
                TextAlign::Center => -width / 2.0,
                TextAlign::Right => max_width / 2.0 - width,
            },
            y: (i as f32 - middle) * step,
            width,
        })
        .collect();

    let pad = if has_background(layer) {
        layer.background.padding
    } else {
        0.0
    };
    let extent = Size::new(max_width + pad * 2.0, block_height.abs() + pad * 2.0);
    let bounds = Rect::centered(layer.position, rotated_extent(extent, layer.rotation));

    TextBlockLayout {
        font,
        lines,
        max_width,
        block_height,
        bounds,
    }
}

/// Paint `layer` onto `surface` and return its layout.
pub fn render_text_layer<S: Surface + ?Sized>(
    surface: &mut S,
    cache: &mut MeasureCache,
    layer: &TextLayer,
    ctx: &LayerRenderContext<'_>,
) -> TextBlockLayout {
    let surface_width = surface.width() as f32;
    let layout = layout_text_layer(surface, cache, layer, surface_width);

    surface.save();
    surface.set_global_alpha(layer.opacity.clamp(0.0, 1.0));
    surface.translate(layer.position.x, layer.position.y);
    if layer.rotation != 0.0 {
        surface.rotate(layer.rotation);
    }

    if has_background(layer) {
        let bg = &layer.background;
        let size = Size::new(
            layout.max_width + bg.padding * 2.0,
            layout.block_height + bg.padding * 2.0,
        );
        let color = parse_color(&bg.color).with_opacity(bg.opacity);
        surface.fill_rect(Rect::centered(Point::ORIGIN, size), color);
    }

    let fill = parse_color(&layer.color);
    let shadow = layer.shadow.enabled.then(|| Shadow {
        color: parse_color(&layer.shadow.color),
        offset_x: layer.shadow.offset_x,
        offset_y: layer.shadow.offset_y,
        blur: layer.shadow.blur,
    });
    let stroke = (layer.stroke.enabled && layer.stroke.width > 0.0)
        .then(|| (parse_color(&layer.stroke.color), layer.stroke.width));

    for line in &layout.lines {
        let run = TextRun {
            text: &line.text,
            x: line.x,
            y: line.y,
            font: &layout.font,
            letter_spacing: layer.letter_spacing,
        };
        if shadow.is_some() {
            surface.set_shadow(shadow);
            surface.fill_text(&run, fill);
            surface.set_shadow(None);
        }
        surface.fill_text(&run, fill);
        if let Some((color, width)) = stroke {
            surface.stroke_text(&run, color, width);
        }
    }

    if ctx.is_active && ctx.show_selection {
        draw_selection(surface, &layout, ctx.selection);
    }

    surface.restore();
    layout
}

fn has_background(layer: &TextLayer) -> bool {
    layer.background.enabled && !layer.is_blank()
}

fn draw_selection<S: Surface + ?Sized>(surface: &mut S, layout: &TextBlockLayout, style: &SelectionStyle) {
    surface.reset_transform();
    surface.set_global_alpha(1.0);
    let rect = layout.bounds.inflate(style.padding);
    let color: Rgba = parse_color(&style.color);
    surface.stroke_round_rect(rect, style.corner_radius, color, style.line_width);
}

/// Axis-aligned extent of a `size` box rotated by `degrees`.
fn rotated_extent(size: Size, degrees: f32) -> Size {
    if degrees == 0.0 {
        return size;
    }
    let (sin, cos) = degrees.to_radians().sin_cos();
    let (sin, cos) = (sin.abs(), cos.abs());
    Size::new(
        size.width * cos + size.height * sin,
        size.width * sin + size.height * cos,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{DrawCommand, RecordingSurface};
    use backdrop_api::LayerId;

    fn layer(content: &str) -> TextLayer {
        TextLayer {
            content: content.into(),
            font_size: 10.0,
            position: Point::new(100.0, 50.0),
            ..TextLayer::new(LayerId(1))
        }
    }

    fn ctx(style: &SelectionStyle, is_active: bool) -> LayerRenderContext<'_> {
        LayerRenderContext {
            is_active,
            show_selection: true,
            selection: style,
        }
    }

    #[test]
    fn state_is_scoped() {
        let mut surface = RecordingSurface::new(200, 100);
        let mut cache = MeasureCache::default();
        let style = SelectionStyle::default();
        render_text_layer(&mut surface, &mut cache, &layer("hi"), &ctx(&style, false));
        assert_eq!(surface.commands.first(), Some(&DrawCommand::Save));
        assert_eq!(surface.commands.last(), Some(&DrawCommand::Restore));
        assert!(surface.commands.contains(&DrawCommand::Translate { dx: 100.0, dy: 50.0 }));
        assert!(!surface.commands.iter().any(|c| matches!(c, DrawCommand::Rotate { .. })));
    }

    #[test]
    fn font_scales_with_surface_width() {
        let mut surface = RecordingSurface::new(200, 100);
        let mut cache = MeasureCache::default();
        let layout = layout_text_layer(&mut surface, &mut cache, &layer("hi"), 200.0);
        assert_eq!(layout.font.size_px, 20.0);
        assert_eq!(layout.font.css(), "normal 700 20px Inter");
    }

    #[test]
    fn lines_are_vertically_centered() {
        let mut surface = RecordingSurface::new(200, 100);
        let mut cache = MeasureCache::default();
        let mut l = layer("a\nbb\nccc");
        l.line_height = 1.0;
        let layout = layout_text_layer(&mut surface, &mut cache, &l, 200.0);
        let ys: Vec<f32> = layout.lines.iter().map(|l| l.y).collect();
        assert_eq!(ys, vec![-20.0, 0.0, 20.0]);
        assert_eq!(layout.block_height, 60.0);
        // Half an em per char at 20px.
        assert_eq!(layout.max_width, 30.0);
    }

    #[test]
    fn alignment_anchors() {
        let mut surface = RecordingSurface::new(200, 100);
        let mut cache = MeasureCache::default();
        let mut l = layer("a\nccc");
        let xs = |l: &TextLayer, s: &mut RecordingSurface, c: &mut MeasureCache| {
            layout_text_layer(s, c, l, 200.0)
                .lines
                .iter()
                .map(|line| line.x)
                .collect::<Vec<_>>()
        };
        l.alignment = TextAlign::Center;
        assert_eq!(xs(&l, &mut surface, &mut cache), vec![-5.0, -15.0]);
        l.alignment = TextAlign::Left;
        assert_eq!(xs(&l, &mut surface, &mut cache), vec![-15.0, -15.0]);
        l.alignment = TextAlign::Right;
        assert_eq!(xs(&l, &mut surface, &mut cache), vec![5.0, -15.0]);
    }

    #[test]
    fn letter_spacing_widens_lines() {
        let mut surface = RecordingSurface::new(200, 100);
        let mut cache = MeasureCache::default();
        let mut l = layer("abc");
        l.letter_spacing = 2.0;
        let layout = layout_text_layer(&mut surface, &mut cache, &l, 200.0);
        assert_eq!(layout.max_width, 36.0);
    }

    #[test]
    fn empty_content_draws_one_empty_line() {
        let mut surface = RecordingSurface::new(200, 100);
        let mut cache = MeasureCache::default();
        let style = SelectionStyle::default();
        let mut l = layer("");
        l.background.enabled = true;
        let layout = render_text_layer(&mut surface, &mut cache, &l, &ctx(&style, false));
        assert_eq!(layout.lines.len(), 1);
        assert_eq!(layout.max_width, 0.0);
        assert_eq!(surface.filled_texts(), vec![""]);
        assert!(!surface.commands.iter().any(|c| matches!(c, DrawCommand::FillRect { .. })));
    }

    #[test]
    fn whitespace_lines_take_space_without_background() {
        let mut surface = RecordingSurface::new(200, 100);
        let mut cache = MeasureCache::default();
        let style = SelectionStyle::default();
        let mut l = layer(" \n ");
        l.background.enabled = true;
        let layout = render_text_layer(&mut surface, &mut cache, &l, &ctx(&style, false));
        assert_eq!(layout.lines.len(), 2);
        assert!(layout.block_height > 0.0);
        assert!(!surface.commands.iter().any(|c| matches!(c, DrawCommand::FillRect { .. })));
    }

    #[test]
    fn background_drawn_before_text() {
        let mut surface = RecordingSurface::new(200, 100);
        let mut cache = MeasureCache::default();
        let style = SelectionStyle::default();
        let mut l = layer("abcd");
        l.line_height = 1.0;
        l.background.enabled = true;
        l.background.padding = 5.0;
        l.background.opacity = 0.5;
        render_text_layer(&mut surface, &mut cache, &l, &ctx(&style, false));

        let rect_at = surface
            .commands
            .iter()
            .position(|c| matches!(c, DrawCommand::FillRect { .. }))
            .unwrap();
        let text_at = surface
            .commands
            .iter()
            .position(|c| matches!(c, DrawCommand::FillText { .. }))
            .unwrap();
        assert!(rect_at < text_at);
        match &surface.commands[rect_at] {
            DrawCommand::FillRect { rect, color } => {
                assert_eq!(*rect, Rect::new(-25.0, -15.0, 50.0, 30.0));
                assert_eq!(color.a, 128);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn shadow_pass_then_plain_fill_then_stroke() {
        let mut surface = RecordingSurface::new(200, 100);
        let mut cache = MeasureCache::default();
        let style = SelectionStyle::default();
        let mut l = layer("x");
        l.shadow.enabled = true;
        l.stroke.enabled = true;
        render_text_layer(&mut surface, &mut cache, &l, &ctx(&style, false));

        let kinds: Vec<&str> = surface
            .commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Shadow(Some(_)) => Some("shadow"),
                DrawCommand::Shadow(None) => Some("no-shadow"),
                DrawCommand::FillText { .. } => Some("fill"),
                DrawCommand::StrokeText { .. } => Some("stroke"),
                _ => None,
            })
            .collect();
        assert_eq!(kinds, vec!["shadow", "fill", "no-shadow", "fill", "stroke"]);
    }

    #[test]
    fn selection_only_for_active_and_axis_aligned() {
        let style = SelectionStyle::default();
        let mut cache = MeasureCache::default();
        let mut l = layer("abcd");
        l.rotation = 90.0;
        l.line_height = 1.0;

        let mut surface = RecordingSurface::new(200, 100);
        render_text_layer(&mut surface, &mut cache, &l, &ctx(&style, false));
        assert!(!surface.commands.iter().any(|c| matches!(c, DrawCommand::StrokeRoundRect { .. })));

        let mut surface = RecordingSurface::new(200, 100);
        render_text_layer(&mut surface, &mut cache, &l, &ctx(&style, true));
        let reset_at = surface
            .commands
            .iter()
            .position(|c| *c == DrawCommand::ResetTransform)
            .unwrap();
        let outline = surface.commands[reset_at..]
            .iter()
            .find_map(|c| match c {
                DrawCommand::StrokeRoundRect { rect, .. } => Some(*rect),
                _ => None,
            })
            .unwrap();
        // 40x20 block rotated a quarter turn is 20x40, plus padding.
        assert!((outline.width - 40.0).abs() < 0.01);
        assert!((outline.height - 60.0).abs() < 0.01);
        assert!((outline.center().x - 100.0).abs() < 0.01);
        assert!((outline.center().y - 50.0).abs() < 0.01);
    }

    #[test]
    fn negative_line_height_flips_stacking() {
        let mut surface = RecordingSurface::new(200, 100);
        let mut cache = MeasureCache::default();
        let mut l = layer("a\nb");
        l.line_height = -1.0;
        let layout = layout_text_layer(&mut surface, &mut cache, &l, 200.0);
        assert!(layout.lines[0].y > layout.lines[1].y);
        assert!(layout.bounds.height > 0.0);
    }
}
