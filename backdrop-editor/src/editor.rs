//! The editor: session state, redraw scheduling and rendering wired together.
//!
//! All mutation goes through `&mut Editor` from a single task. Input that
//! arrives at pointer rate (sliders, filter drags) is debounced first, with a
//! host timer armed for the earliest deadline so queued input is applied from
//! the event loop. Every change requests a redraw, and the preview is
//! composited from the session's current state when the frame callback
//! arrives.

use std::path::Path;
use std::time::Duration;

use backdrop_api::{Point, SurfaceFilters};
use backdrop_render::{
    composite_frame, encode, CompositeMode, CompositeOutcome, ExportFormat, ExportedImage, MeasureCache,
    MemoryProbe, NoMemoryProbe, ProcessMemoryProbe, RasterSurface,
};
use image::RgbaImage;

use crate::config::EditorConfig;
use crate::coords::to_slider;
use crate::debounce::Debouncer;
use crate::error::{EditorError, Result};
use crate::host::HostEvent;
use crate::scheduler::{Clock, FrameHost, FrameToken, RedrawScheduler};
use crate::segment::Segmenter;
use crate::session::EditorSession;

pub struct Editor<H, C> {
    config: EditorConfig,
    session: EditorSession,
    cache: MeasureCache,
    probe: Box<dyn MemoryProbe + Send + Sync>,
    scheduler: RedrawScheduler<H, C>,
    slider_input: Debouncer<(f32, f32)>,
    filter_input: Debouncer<SurfaceFilters>,
    input_timer: Option<FrameToken>,
    preview: Option<RasterSurface>,
}

impl<H: FrameHost, C: Clock> Editor<H, C> {
    pub fn new(config: EditorConfig, host: H, clock: C) -> Self {
        let probe: Box<dyn MemoryProbe + Send + Sync> = if config.memory_budget_bytes > 0 {
            Box::new(ProcessMemoryProbe::new(config.memory_budget_bytes))
        } else {
            Box::new(NoMemoryProbe)
        };
        Self {
            cache: MeasureCache::new(config.measure_cache_capacity),
            scheduler: RedrawScheduler::with_min_gap(host, clock, config.min_frame_gap()),
            slider_input: Debouncer::new(config.debounce()),
            filter_input: Debouncer::new(config.debounce()),
            session: EditorSession::new(),
            input_timer: None,
            preview: None,
            probe,
            config,
        }
    }

    /// Replace the memory pressure source.
    pub fn with_memory_probe(mut self, probe: impl MemoryProbe + Send + Sync + 'static) -> Self {
        self.probe = Box::new(probe);
        self
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn session(&self) -> &EditorSession {
        &self.session
    }

    pub fn cache(&self) -> &MeasureCache {
        &self.cache
    }

    pub fn scheduler(&self) -> &RedrawScheduler<H, C> {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut RedrawScheduler<H, C> {
        &mut self.scheduler
    }

    /// The last composited preview, if any.
    pub fn preview(&self) -> Option<&RasterSurface> {
        self.preview.as_ref()
    }

    // ---------------------------------------------------------------------
    // State changes
    // ---------------------------------------------------------------------

    /// Apply `f` to the session and schedule a redraw if it changed anything.
    pub fn edit<R>(&mut self, f: impl FnOnce(&mut EditorSession) -> R) -> R {
        let revision = self.session.revision();
        let result = f(&mut self.session);
        if self.session.revision() != revision {
            self.scheduler.request_redraw();
        }
        result
    }

    /// Install an image and its cutout. They must be the same size.
    pub fn load_images(&mut self, base: RgbaImage, cutout: RgbaImage) -> Result<()> {
        let (width, height) = base.dimensions();
        let (cutout_width, cutout_height) = cutout.dimensions();
        if (width, height) != (cutout_width, cutout_height) {
            tracing::warn!(width, height, cutout_width, cutout_height, "cutout size mismatch");
            return Err(EditorError::DimensionMismatch {
                width,
                height,
                cutout_width,
                cutout_height,
            });
        }
        tracing::debug!(width, height, "loaded image pair");
        self.preview = None;
        self.edit(|session| session.load_images(base, cutout));
        Ok(())
    }

    /// Decode `bytes`, cut out the subject and install both.
    pub async fn load_image_bytes(&mut self, bytes: &[u8], segmenter: &dyn Segmenter) -> Result<()> {
        let base = image::load_from_memory(bytes)?.to_rgba8();
        let cutout = segmenter.remove_background(&base).await?;
        self.load_images(base, cutout)
    }

    pub async fn load_image_path(&mut self, path: &Path, segmenter: &dyn Segmenter) -> Result<()> {
        let bytes = tokio::fs::read(path).await?;
        self.load_image_bytes(&bytes, segmenter).await
    }

    /// Queue a slider move for the active layer. Returns when it applies.
    pub fn nudge_slider(&mut self, slider_x: f32, slider_y: f32) -> Duration {
        let now = self.scheduler.clock().now();
        let deadline = self.slider_input.push((slider_x, slider_y), now);
        self.arm_input_timer();
        deadline
    }

    /// Queue a pointer drag to `position` in image pixels.
    pub fn nudge_position(&mut self, position: Point) -> Duration {
        let (width, height) = self.session.surface_size().unwrap_or((0, 0));
        let (slider_x, slider_y) = to_slider(position, width, height);
        self.nudge_slider(slider_x, slider_y)
    }

    /// Queue a filter change. Returns when it applies.
    pub fn nudge_filters(&mut self, filters: SurfaceFilters) -> Duration {
        let now = self.scheduler.clock().now();
        let deadline = self.filter_input.push(filters, now);
        self.arm_input_timer();
        deadline
    }

    /// Earliest time a queued input becomes due.
    pub fn next_input_deadline(&self) -> Option<Duration> {
        match (self.slider_input.deadline(), self.filter_input.deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Apply queued inputs that are due. Returns whether anything changed.
    pub fn poll_input(&mut self) -> bool {
        let now = self.scheduler.clock().now();
        let slider = self.slider_input.poll(now);
        let filters = self.filter_input.poll(now);
        let applied = slider.is_some() || filters.is_some();
        if applied {
            self.edit(|session| {
                if let Some((x, y)) = slider {
                    session.set_slider(x, y);
                }
                if let Some(filters) = filters {
                    session.set_filters(filters);
                }
            });
        }
        if applied || self.input_timer.is_none() {
            self.arm_input_timer();
        }
        applied
    }

    /// Keep one host timer armed for the earliest queued input.
    fn arm_input_timer(&mut self) {
        self.cancel_input_timer();
        if let Some(deadline) = self.next_input_deadline() {
            let delay = deadline.saturating_sub(self.scheduler.clock().now());
            self.input_timer = self.scheduler.arm_timer(delay);
        }
    }

    fn cancel_input_timer(&mut self) {
        if let Some(token) = self.input_timer.take() {
            self.scheduler.cancel_timer(token);
        }
    }

    /// Return to the initial state ("try another image").
    pub fn reset(&mut self) {
        self.slider_input.cancel();
        self.filter_input.cancel();
        self.cancel_input_timer();
        self.preview = None;
        self.edit(EditorSession::reset);
    }

    /// Stop scheduling. Nothing is drawn afterwards.
    pub fn teardown(&mut self) {
        self.slider_input.cancel();
        self.filter_input.cancel();
        self.cancel_input_timer();
        self.scheduler.teardown();
    }

    // ---------------------------------------------------------------------
    // Frames
    // ---------------------------------------------------------------------

    /// A host timer fired: either queued input is due or a deferred redraw.
    pub fn on_timer(&mut self, token: FrameToken) {
        if self.input_timer == Some(token) {
            self.input_timer = None;
            self.poll_input();
        } else {
            self.scheduler.on_timer(token);
        }
    }

    /// Draw the preview for a frame callback. `None` if the token was stale.
    pub fn on_frame(&mut self, token: FrameToken) -> Option<CompositeOutcome> {
        if !self.scheduler.begin_frame(token) {
            return None;
        }
        let outcome = self.render_preview();
        self.scheduler.end_frame();
        Some(outcome)
    }

    pub fn handle_event(&mut self, event: HostEvent) -> Option<CompositeOutcome> {
        match event {
            HostEvent::Frame(token) => self.on_frame(token),
            HostEvent::Timer(token) => {
                self.on_timer(token);
                None
            }
        }
    }

    /// Composite the current state onto the preview surface now.
    pub fn render_preview(&mut self) -> CompositeOutcome {
        self.cache
            .relieve_memory_pressure(self.probe.as_ref(), self.config.memory_pressure_threshold);

        let Some((width, height)) = self.session.surface_size() else {
            tracing::debug!("no image loaded, skipping preview");
            return CompositeOutcome::Skipped;
        };
        if self.preview.is_none() {
            match RasterSurface::new(width, height) {
                Ok(surface) => self.preview = Some(surface),
                Err(err) => {
                    tracing::warn!(%err, "cannot create preview surface");
                    return CompositeOutcome::Skipped;
                }
            }
        }
        let Some(surface) = self.preview.as_mut() else {
            return CompositeOutcome::Skipped;
        };
        let frame = self.session.frame(&self.config.selection);
        composite_frame(surface, &mut self.cache, &frame, CompositeMode::Interactive)
    }

    // ---------------------------------------------------------------------
    // Export
    // ---------------------------------------------------------------------

    /// Render at full image resolution without editing affordances and encode.
    pub fn export(&mut self, format: ExportFormat) -> Result<ExportedImage> {
        let (width, height) = self.session.surface_size().ok_or(EditorError::NoImage)?;
        let mut surface = RasterSurface::new(width, height)?;
        let frame = self.session.frame(&self.config.selection);
        match composite_frame(&mut surface, &mut self.cache, &frame, CompositeMode::Export) {
            CompositeOutcome::Skipped => Err(EditorError::NoImage),
            CompositeOutcome::Drawn { .. } => {
                let exported = encode(&surface.to_image(), format)?;
                tracing::info!(filename = %exported.filename, bytes = exported.bytes.len(), "exported image");
                Ok(exported)
            }
        }
    }

    /// JPEG at the configured mobile quality.
    pub fn export_mobile(&mut self) -> Result<ExportedImage> {
        let quality = self.config.mobile_jpeg_quality;
        self.export(ExportFormat::Jpeg { quality })
    }
}
