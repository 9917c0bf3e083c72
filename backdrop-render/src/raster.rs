//! CPU raster surface backed by a tiny-skia pixmap.
//!
//! Draws go straight to the pixmap unless a shadow or non-identity filter is
//! active. In that case the draw is rendered into a scratch pixmap covering
//! only its device-space bounds, the shadow is derived from the scratch
//! coverage, the filter runs on the scratch, and the result is composited
//! with the current global alpha.

use backdrop_api::{FilterSettings, Rgba};
use image::RgbaImage;
use tiny_skia::{ColorU8, Paint, PathBuilder, Pixmap, PixmapPaint, Stroke, Transform};

use crate::filter::{apply_filter, gaussian_blur};
use crate::primitives::Rect;
use crate::surface::{FontDescriptor, Shadow, Surface, TextMeasurer, TextMetrics, TextRun};
use crate::text_engine::{self, LineRaster};
use crate::RenderError;

#[derive(Debug, Clone, Copy)]
struct DrawState {
    transform: Transform,
    alpha: f32,
    filter: Option<FilterSettings>,
    shadow: Option<Shadow>,
}

impl Default for DrawState {
    fn default() -> Self {
        Self {
            transform: Transform::identity(),
            alpha: 1.0,
            filter: None,
            shadow: None,
        }
    }
}

/// A pixel surface for preview and export rendering.
pub struct RasterSurface {
    pixmap: Pixmap,
    state: DrawState,
    stack: Vec<DrawState>,
}

impl RasterSurface {
    /// Create a transparent surface.
    pub fn new(width: u32, height: u32) -> Result<Self, RenderError> {
        let pixmap = Pixmap::new(width, height).ok_or(RenderError::InvalidSize { width, height })?;
        Ok(Self {
            pixmap,
            state: DrawState::default(),
            stack: Vec::new(),
        })
    }

    /// The underlying premultiplied pixmap.
    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    /// Straight-alpha color of one pixel, `None` outside the surface.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        let px = self.pixmap.pixel(x, y)?.demultiply();
        Some(Rgba::new(px.red(), px.green(), px.blue(), px.alpha()))
    }

    /// Copy the surface out as a straight-alpha image.
    pub fn to_image(&self) -> RgbaImage {
        image_from_pixmap(&self.pixmap)
    }

    /// Draw `op` honoring the current shadow, filter and alpha.
    ///
    /// `local_bounds` is the op's extent in the current coordinate space and
    /// only sizes the scratch buffer.
    fn composite<F>(&mut self, local_bounds: Rect, op: F)
    where
        F: Fn(&mut Pixmap, Transform, f32),
    {
        let state = self.state;
        let filter = state.filter.filter(|f| !f.is_identity());
        if state.shadow.is_none() && filter.is_none() {
            op(&mut self.pixmap, state.transform, state.alpha);
            return;
        }

        let surface = Rect::new(0.0, 0.0, self.pixmap.width() as f32, self.pixmap.height() as f32);
        let device = transform_bounds(local_bounds, state.transform);
        let filter_pad = filter.map(|f| f.blur * 3.0).unwrap_or(0.0);
        let mut region = device.inflate(filter_pad);
        if let Some(shadow) = state.shadow {
            let shadow_pad = shadow.blur * 1.5;
            region = region.union(&device.translate(shadow.offset_x, shadow.offset_y).inflate(shadow_pad));
        }
        let Some(region) = region.intersection(&surface) else {
            return;
        };
        let rx = region.x.floor();
        let ry = region.y.floor();
        let rw = (region.right().ceil() - rx).max(1.0) as u32;
        let rh = (region.bottom().ceil() - ry).max(1.0) as u32;
        let Some(mut scratch) = Pixmap::new(rw, rh) else {
            return;
        };
        op(&mut scratch, state.transform.post_translate(-rx, -ry), 1.0);

        let paint = PixmapPaint {
            opacity: state.alpha.clamp(0.0, 1.0),
            ..PixmapPaint::default()
        };
        if let Some(shadow) = state.shadow {
            let mut shadow_pm = recolor(&scratch, shadow.color);
            gaussian_blur(&mut shadow_pm, shadow.blur / 2.0);
            self.pixmap.draw_pixmap(
                0,
                0,
                shadow_pm.as_ref(),
                &paint,
                Transform::from_translate(rx + shadow.offset_x, ry + shadow.offset_y),
                None,
            );
        }
        if let Some(filter) = filter {
            apply_filter(&mut scratch, &filter);
        }
        self.pixmap.draw_pixmap(
            0,
            0,
            scratch.as_ref(),
            &paint,
            Transform::from_translate(rx, ry),
            None,
        );
    }

    fn draw_line_raster(&mut self, raster: LineRaster, run: &TextRun<'_>) {
        let x = run.x + raster.left;
        let y = run.y - run.font.size_px / 2.0 + raster.top;
        let bounds = Rect::new(x, y, raster.pixmap.width() as f32, raster.pixmap.height() as f32);
        self.composite(bounds, |target, transform, alpha| {
            let paint = PixmapPaint {
                opacity: alpha.clamp(0.0, 1.0),
                ..PixmapPaint::default()
            };
            target.draw_pixmap(0, 0, raster.pixmap.as_ref(), &paint, transform.pre_translate(x, y), None);
        });
    }
}

impl TextMeasurer for RasterSurface {
    fn measure_text(&mut self, text: &str, font: &FontDescriptor) -> TextMetrics {
        text_engine::measure_line(text, font)
    }
}

impl Surface for RasterSurface {
    fn width(&self) -> u32 {
        self.pixmap.width()
    }

    fn height(&self) -> u32 {
        self.pixmap.height()
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.state = DrawState::default();
        self.stack.clear();
        if width == self.pixmap.width() && height == self.pixmap.height() {
            self.pixmap.fill(tiny_skia::Color::TRANSPARENT);
            return;
        }
        match Pixmap::new(width, height) {
            Some(pixmap) => self.pixmap = pixmap,
            None => {
                tracing::warn!(width, height, "cannot allocate surface, clearing existing one");
                self.pixmap.fill(tiny_skia::Color::TRANSPARENT);
            }
        }
    }

    fn save(&mut self) {
        self.stack.push(self.state);
    }

    fn restore(&mut self) {
        if let Some(state) = self.stack.pop() {
            self.state = state;
        }
    }

    fn reset_transform(&mut self) {
        self.state.transform = Transform::identity();
    }

    fn translate(&mut self, dx: f32, dy: f32) {
        self.state.transform = self.state.transform.pre_translate(dx, dy);
    }

    fn rotate(&mut self, degrees: f32) {
        self.state.transform = self.state.transform.pre_concat(Transform::from_rotate(degrees));
    }

    fn set_global_alpha(&mut self, alpha: f32) {
        self.state.alpha = alpha.clamp(0.0, 1.0);
    }

    fn set_filter(&mut self, filter: Option<FilterSettings>) {
        self.state.filter = filter;
    }

    fn set_shadow(&mut self, shadow: Option<Shadow>) {
        self.state.shadow = shadow;
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgba) {
        let Some(sk_rect) = rect.to_skia() else {
            return;
        };
        self.composite(rect.normalized(), |target, transform, alpha| {
            let paint = solid_paint(color.with_opacity(alpha));
            target.fill_rect(sk_rect, &paint, transform, None);
        });
    }

    fn stroke_round_rect(&mut self, rect: Rect, radius: f32, color: Rgba, line_width: f32) {
        let Some(path) = round_rect_path(rect, radius) else {
            return;
        };
        let bounds = rect.inflate(line_width);
        self.composite(bounds, |target, transform, alpha| {
            let paint = solid_paint(color.with_opacity(alpha));
            let stroke = Stroke {
                width: line_width.max(0.0),
                ..Stroke::default()
            };
            target.stroke_path(&path, &paint, &stroke, transform, None);
        });
    }

    fn draw_image(&mut self, image: &RgbaImage) {
        let Some(source) = pixmap_from_image(image) else {
            return;
        };
        let bounds = Rect::new(0.0, 0.0, image.width() as f32, image.height() as f32);
        self.composite(bounds, |target, transform, alpha| {
            let paint = PixmapPaint {
                opacity: alpha.clamp(0.0, 1.0),
                ..PixmapPaint::default()
            };
            target.draw_pixmap(0, 0, source.as_ref(), &paint, transform, None);
        });
    }

    fn fill_text(&mut self, run: &TextRun<'_>, color: Rgba) {
        if let Some(raster) = text_engine::rasterize_line(run.text, run.font, color, run.letter_spacing, 0.0) {
            self.draw_line_raster(raster, run);
        }
    }

    fn stroke_text(&mut self, run: &TextRun<'_>, color: Rgba, line_width: f32) {
        let radius = line_width / 2.0;
        let Some(mut raster) =
            text_engine::rasterize_line(run.text, run.font, Rgba::WHITE, run.letter_spacing, radius)
        else {
            return;
        };
        raster.pixmap = outline(&raster.pixmap, color, radius);
        self.draw_line_raster(raster, run);
    }
}

fn solid_paint(color: Rgba) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color.r, color.g, color.b, color.a);
    paint.anti_alias = true;
    paint
}

/// Axis-aligned device bounds of `rect` under `transform`.
fn transform_bounds(rect: Rect, transform: Transform) -> Rect {
    let mut points = [
        tiny_skia::Point::from_xy(rect.x, rect.y),
        tiny_skia::Point::from_xy(rect.right(), rect.y),
        tiny_skia::Point::from_xy(rect.x, rect.bottom()),
        tiny_skia::Point::from_xy(rect.right(), rect.bottom()),
    ];
    transform.map_points(&mut points);
    let (mut min_x, mut min_y) = (f32::INFINITY, f32::INFINITY);
    let (mut max_x, mut max_y) = (f32::NEG_INFINITY, f32::NEG_INFINITY);
    for p in points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    Rect::new(min_x, min_y, max_x - min_x, max_y - min_y)
}

fn round_rect_path(rect: Rect, radius: f32) -> Option<tiny_skia::Path> {
    if !(rect.width > 0.0 && rect.height > 0.0) {
        return None;
    }
    let r = radius.max(0.0).min(rect.width / 2.0).min(rect.height / 2.0);
    let (l, t, rt, b) = (rect.x, rect.y, rect.right(), rect.bottom());
    let mut pb = PathBuilder::new();
    pb.move_to(l + r, t);
    pb.line_to(rt - r, t);
    pb.quad_to(rt, t, rt, t + r);
    pb.line_to(rt, b - r);
    pb.quad_to(rt, b, rt - r, b);
    pb.line_to(l + r, b);
    pb.quad_to(l, b, l, b - r);
    pb.line_to(l, t + r);
    pb.quad_to(l, t, l + r, t);
    pb.close();
    pb.finish()
}

/// Replace every pixel's color with `color`, keeping coverage.
fn recolor(source: &Pixmap, color: Rgba) -> Pixmap {
    let mut out = source.clone();
    for px in out.pixels_mut() {
        let coverage = px.alpha() as u32;
        let a = (color.a as u32 * coverage + 127) / 255;
        *px = ColorU8::from_rgba(color.r, color.g, color.b, a as u8).premultiply();
    }
    out
}

/// The ring between a dilation and an erosion of `source`'s coverage, in `color`.
///
/// Approximates a stroke of width `2 * radius` centered on the glyph outline.
fn outline(source: &Pixmap, color: Rgba, radius: f32) -> Pixmap {
    let (w, h) = (source.width() as i32, source.height() as i32);
    let r = radius.ceil().max(1.0) as i32;
    let r2 = (radius.max(0.5) * radius.max(0.5)).max(1.0);
    let offsets: Vec<(i32, i32)> = (-r..=r)
        .flat_map(|dy| (-r..=r).map(move |dx| (dx, dy)))
        .filter(|&(dx, dy)| (dx * dx + dy * dy) as f32 <= r2)
        .collect();

    let coverage: Vec<u8> = source.pixels().iter().map(|p| p.alpha()).collect();
    let at = |x: i32, y: i32| -> u8 {
        if x < 0 || y < 0 || x >= w || y >= h {
            0
        } else {
            coverage[(y * w + x) as usize]
        }
    };

    let mut out = source.clone();
    for (i, px) in out.pixels_mut().iter_mut().enumerate() {
        let (x, y) = (i as i32 % w, i as i32 / w);
        let mut grown = 0u8;
        let mut shrunk = 255u8;
        for &(dx, dy) in &offsets {
            let c = at(x + dx, y + dy);
            grown = grown.max(c);
            shrunk = shrunk.min(c);
        }
        let ring = grown.saturating_sub(shrunk) as u32;
        let a = (color.a as u32 * ring + 127) / 255;
        *px = ColorU8::from_rgba(color.r, color.g, color.b, a as u8).premultiply();
    }
    out
}

/// Straight-alpha image to premultiplied pixmap.
pub fn pixmap_from_image(image: &RgbaImage) -> Option<Pixmap> {
    let mut pixmap = Pixmap::new(image.width(), image.height())?;
    for (dst, src) in pixmap.pixels_mut().iter_mut().zip(image.pixels()) {
        let [r, g, b, a] = src.0;
        *dst = ColorU8::from_rgba(r, g, b, a).premultiply();
    }
    Some(pixmap)
}

/// Premultiplied pixmap to straight-alpha image.
pub fn image_from_pixmap(pixmap: &Pixmap) -> RgbaImage {
    let mut image = RgbaImage::new(pixmap.width(), pixmap.height());
    for (dst, src) in image.pixels_mut().zip(pixmap.pixels()) {
        let c = src.demultiply();
        dst.0 = [c.red(), c.green(), c.blue(), c.alpha()];
    }
    image
}
