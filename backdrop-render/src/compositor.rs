//! Full-frame compositing.
//!
//! Every call redraws the surface from scratch, in this order:
//!
//! ```text
//! background (flat color | filtered base image)
//!   -> behind layers (on_top = false, collection order)
//!   -> filtered foreground cutout
//!   -> on-top layers (on_top = true, collection order)
//! ```
//!
//! The selection outline is part of the owning layer's pass and is only
//! drawn in [`CompositeMode::Interactive`].

use backdrop_api::{parse_color, LayerId, SurfaceFilters, TextLayer};
use image::RgbaImage;

use crate::frame_timing;
use crate::measure_cache::MeasureCache;
use crate::primitives::Rect;
use crate::surface::Surface;
use crate::text_layer::{render_text_layer, LayerRenderContext, SelectionStyle};

/// Everything a composite reads. Borrowed so the caller's current state is
/// what gets drawn.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub base: Option<&'a RgbaImage>,
    pub cutout: Option<&'a RgbaImage>,
    pub layers: &'a [TextLayer],
    pub filters: &'a SurfaceFilters,
    pub active: Option<LayerId>,
    pub selection: &'a SelectionStyle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeMode {
    /// On-screen preview, with the active-layer outline.
    Interactive,
    /// Final output, no editing affordances.
    Export,
}

impl CompositeMode {
    pub fn shows_selection(self) -> bool {
        matches!(self, CompositeMode::Interactive)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeOutcome {
    Drawn { width: u32, height: u32, layers: usize },
    /// Base image or cutout not available yet; nothing was drawn.
    Skipped,
}

/// Layer indices split by tier, each in collection order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaintOrder {
    pub behind: Vec<usize>,
    pub on_top: Vec<usize>,
}

impl PaintOrder {
    /// All indices in paint order.
    pub fn sequence(&self) -> impl Iterator<Item = usize> + '_ {
        self.behind.iter().chain(&self.on_top).copied()
    }
}

/// Z-order of `layers` as the sort key `(on_top, index)`.
pub fn paint_order(layers: &[TextLayer]) -> PaintOrder {
    let mut keyed: Vec<(bool, usize)> = layers
        .iter()
        .enumerate()
        .map(|(index, layer)| (layer.on_top, index))
        .collect();
    keyed.sort_unstable();
    let split = keyed.partition_point(|&(on_top, _)| !on_top);
    let (behind, on_top) = keyed.split_at(split);
    PaintOrder {
        behind: behind.iter().map(|&(_, i)| i).collect(),
        on_top: on_top.iter().map(|&(_, i)| i).collect(),
    }
}

/// Redraw `surface` from `frame`.
pub fn composite_frame<S: Surface + ?Sized>(
    surface: &mut S,
    cache: &mut MeasureCache,
    frame: &Frame<'_>,
    mode: CompositeMode,
) -> CompositeOutcome {
    let (Some(base), Some(cutout)) = (frame.base, frame.cutout) else {
        tracing::debug!(
            has_base = frame.base.is_some(),
            has_cutout = frame.cutout.is_some(),
            "images not ready, skipping composite"
        );
        return CompositeOutcome::Skipped;
    };

    let frame_no = frame_timing::next_frame();
    let (width, height) = base.dimensions();
    surface.resize(width, height);

    let order = paint_order(frame.layers);

    frame_timing::measure("background", frame_no, || {
        draw_background(surface, base, frame.filters);
    });

    frame_timing::measure("behind", frame_no, || {
        draw_layers(surface, cache, frame, &order.behind, mode);
    });

    frame_timing::measure("cutout", frame_no, || {
        surface.set_filter(Some(frame.filters.foreground));
        surface.draw_image(cutout);
        surface.set_filter(None);
    });

    frame_timing::measure("on_top", frame_no, || {
        draw_layers(surface, cache, frame, &order.on_top, mode);
    });

    frame_timing::stat("layers", frame_no, frame.layers.len());
    frame_timing::stat("measure_cache", frame_no, cache.len());
    tracing::debug!(
        width,
        height,
        layers = frame.layers.len(),
        ?mode,
        background = %frame.filters.background.filters.filter_string(),
        foreground = %frame.filters.foreground.filter_string(),
        "composited frame"
    );

    CompositeOutcome::Drawn {
        width,
        height,
        layers: frame.layers.len(),
    }
}

fn draw_background<S: Surface + ?Sized>(surface: &mut S, base: &RgbaImage, filters: &SurfaceFilters) {
    let bg = &filters.background;
    if bg.use_flat_color {
        if bg.filters.blur > 0.0 {
            surface.set_filter(Some(bg.filters.blur_only()));
        }
        let full = Rect::new(0.0, 0.0, surface.width() as f32, surface.height() as f32);
        surface.fill_rect(full, parse_color(&bg.flat_color));
    } else {
        surface.set_filter(Some(bg.filters));
        surface.draw_image(base);
    }
    surface.set_filter(None);
}

fn draw_layers<S: Surface + ?Sized>(
    surface: &mut S,
    cache: &mut MeasureCache,
    frame: &Frame<'_>,
    indices: &[usize],
    mode: CompositeMode,
) {
    for &index in indices {
        let Some(layer) = frame.layers.get(index) else {
            continue;
        };
        let ctx = LayerRenderContext {
            is_active: frame.active == Some(layer.id),
            show_selection: mode.shows_selection(),
            selection: frame.selection,
        };
        render_text_layer(surface, cache, layer, &ctx);
    }
}
