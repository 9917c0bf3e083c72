//! Integration tests for the editor session, scheduling and export paths.
//!
//! Rendering goes through `RecordingSurface` where the assertion is about
//! what was drawn and in which order, and through the real editor (raster
//! preview, PNG/JPEG export) where it is about the end-to-end flow.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use backdrop_api::{LayerId, Point, SurfaceFilters, TextLayer};
use backdrop_editor::{
    to_absolute, Editor, EditorConfig, EditorError, EditorSession, ManualClock, ManualFrameHost,
    RedrawScheduler, RedrawState, SegmentError, Segmenter, TokioClock, TokioFrameHost,
};
use backdrop_render::{
    composite_frame, CompositeMode, CompositeOutcome, DrawCommand, ExportFormat, FontDescriptor, HeapUsage,
    MeasureCache, MemoryProbe, RecordingSurface, SelectionStyle, Surface,
};
use image::{Rgba, RgbaImage};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn image_pair(width: u32, height: u32) -> (RgbaImage, RgbaImage) {
    (
        RgbaImage::from_pixel(width, height, Rgba([200, 30, 30, 255])),
        RgbaImage::new(width, height),
    )
}

fn loaded_session(width: u32, height: u32) -> EditorSession {
    let (base, cutout) = image_pair(width, height);
    let mut session = EditorSession::new();
    session.load_images(base, cutout);
    session
}

/// Composite `session` onto a recording surface and return it.
fn record(session: &EditorSession, mode: CompositeMode) -> RecordingSurface {
    let selection = SelectionStyle::default();
    let mut surface = RecordingSurface::new(1, 1);
    let mut cache = MeasureCache::default();
    composite_frame(&mut surface, &mut cache, &session.frame(&selection), mode);
    surface
}

fn translations(surface: &RecordingSurface) -> Vec<(f32, f32)> {
    surface
        .commands
        .iter()
        .filter_map(|c| match c {
            DrawCommand::Translate { dx, dy } => Some((*dx, *dy)),
            _ => None,
        })
        .collect()
}

// =========================================================================
// Coordinate mapping and layout
// =========================================================================

#[test]
fn hello_scenario_on_1000x800() {
    init_tracing();
    let mut session = loaded_session(1000, 800);
    session.add_text();
    session.update_active(|layer| {
        layer.content = "Hello".into();
        layer.slider_x = 0.0;
        layer.slider_y = 0.0;
        layer.font_size = 50.0;
    });

    let layer = session.active_layer().unwrap();
    assert_eq!(layer.position, Point::new(500.0, 400.0));
    let font = FontDescriptor::for_layer(layer, 1000.0);
    assert_eq!(font.size_px, 500.0);

    let surface = record(&session, CompositeMode::Export);
    assert!(surface.commands.iter().any(|c| matches!(
        c,
        DrawCommand::FillText { text, font, .. } if text == "Hello" && font.contains("500px")
    )));
}

#[test]
fn relative_position_is_resolution_invariant() {
    let mut small = loaded_session(400, 300);
    let mut large = loaded_session(1600, 1200);
    for session in [&mut small, &mut large] {
        session.set_slider(30.0, -20.0);
    }

    let a = translations(&record(&small, CompositeMode::Export));
    let b = translations(&record(&large, CompositeMode::Export));
    assert_eq!(a.len(), 1);
    assert_eq!(b.len(), 1);
    assert!((a[0].0 / 400.0 - b[0].0 / 1600.0).abs() < 1e-6);
    assert!((a[0].1 / 300.0 - b[0].1 / 1200.0).abs() < 1e-6);

    // Font size scales with the surface too.
    let small_font = FontDescriptor::for_layer(&small.layers()[0], 400.0);
    let large_font = FontDescriptor::for_layer(&large.layers()[0], 1600.0);
    assert!((small_font.size_px / 400.0 - large_font.size_px / 1600.0).abs() < 1e-6);
}

#[test]
fn positions_are_never_stale() {
    let mut session = loaded_session(100, 100);
    session.set_slider(50.0, 50.0);
    session.add_text();
    session.set_slider(-50.0, -50.0);
    let (base, cutout) = image_pair(300, 200);
    session.load_images(base, cutout);

    for layer in session.layers() {
        assert_eq!(layer.position, to_absolute(layer.slider_x, layer.slider_y, 300, 200));
    }
}

// =========================================================================
// Z-order
// =========================================================================

#[test]
fn on_top_layer_paints_after_cutout() {
    let mut session = loaded_session(100, 100);
    session.update_active(|l| l.content = "behind".into());
    session.add_text();
    session.update_active(|l| {
        l.content = "front".into();
        l.on_top = true;
    });

    let surface = record(&session, CompositeMode::Export);
    let order: Vec<&str> = surface
        .commands
        .iter()
        .filter_map(|c| match c {
            DrawCommand::DrawImage { .. } => Some("image"),
            DrawCommand::FillText { text, .. } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(order, vec!["image", "behind", "image", "front"]);
}

#[test]
fn reordering_changes_paint_order_within_tier() {
    let mut session = loaded_session(100, 100);
    session.update_active(|l| l.content = "first".into());
    session.add_text();
    session.update_active(|l| l.content = "second".into());
    session.move_layer_down();

    let surface = record(&session, CompositeMode::Export);
    assert_eq!(surface.filled_texts(), vec!["second", "first"]);
    assert_eq!(session.active_layer().unwrap().content, "second");
}

// =========================================================================
// Measurement cache
// =========================================================================

#[test]
fn cache_measures_each_pair_once() {
    let layer = TextLayer::default();
    let font = FontDescriptor::for_layer(&layer, 800.0);
    let mut surface = RecordingSurface::new(800, 600);
    let mut cache = MeasureCache::default();

    let a = cache.measure(&mut surface, "same", &font);
    let b = cache.measure(&mut surface, "same", &font);
    assert_eq!(a.width.to_bits(), b.width.to_bits());
    assert_eq!(a.ascent.to_bits(), b.ascent.to_bits());
    assert_eq!(surface.measure_calls, 1);
}

#[test]
fn cache_keeps_newest_thousand() {
    let layer = TextLayer::default();
    let font = FontDescriptor::for_layer(&layer, 800.0);
    let mut surface = RecordingSurface::new(800, 600);
    let mut cache = MeasureCache::default();

    for i in 0..1001 {
        cache.measure(&mut surface, &format!("text {i}"), &font);
    }
    assert_eq!(cache.len(), 1000);
    assert!(!cache.contains(&font, "text 0"));
    assert!(cache.contains(&font, "text 1"));

    // The evicted pair is measured again; a survivor is not.
    cache.measure(&mut surface, "text 500", &font);
    assert_eq!(surface.measure_calls, 1001);
    cache.measure(&mut surface, "text 0", &font);
    assert_eq!(surface.measure_calls, 1002);
}

#[test]
fn repeated_frames_reuse_measurements() {
    let session = loaded_session(100, 100);
    let selection = SelectionStyle::default();
    let mut surface = RecordingSurface::new(1, 1);
    let mut cache = MeasureCache::default();
    for _ in 0..5 {
        composite_frame(&mut surface, &mut cache, &session.frame(&selection), CompositeMode::Interactive);
    }
    assert_eq!(surface.measure_calls, 1);
}

// =========================================================================
// Session lifecycle
// =========================================================================

#[test]
fn reset_is_idempotent() {
    let mut session = loaded_session(640, 480);
    session.add_text();
    session.update_active(|l| {
        l.content = "changed".into();
        l.font_size = 12.0;
        l.opacity = 0.3;
        l.on_top = true;
        l.slider_x = 70.0;
    });
    session.set_filters(SurfaceFilters::default());
    session.reset();
    let once = session.clone();
    session.reset();

    assert_eq!(session.layers(), once.layers());
    let layer = &session.layers()[0];
    assert_eq!(session.layers().len(), 1);
    assert_eq!(session.active_index(), 0);
    assert_eq!(layer.font_size, 50.0);
    assert_eq!(layer.opacity, 1.0);
    assert_eq!((layer.slider_x, layer.slider_y), (0.0, 0.0));
    assert_eq!(layer.position, to_absolute(0.0, 0.0, 0, 0));
    assert_eq!(*layer, TextLayer::new(LayerId(1)));
    assert_eq!(session.filters(), &SurfaceFilters::default());
}

#[test]
fn deletion_stops_at_one_layer() {
    let mut session = loaded_session(100, 100);
    for _ in 0..4 {
        session.add_text();
    }
    while session.layers().len() > 1 {
        assert!(session.delete_text());
    }
    assert!(!session.delete_text());
    assert_eq!(session.layers().len(), 1);
    assert_eq!(session.active_index(), 0);
}

// =========================================================================
// Redraw scheduling
// =========================================================================

#[test]
fn rapid_requests_draw_once_with_latest_state() {
    init_tracing();
    let clock = ManualClock::new();
    let mut scheduler = RedrawScheduler::new(ManualFrameHost::new(), clock.clone());
    let mut session = loaded_session(100, 100);
    let selection = SelectionStyle::default();
    let mut surface = RecordingSurface::new(1, 1);
    let mut cache = MeasureCache::default();

    session.update_active(|l| l.content = "first".into());
    scheduler.request_redraw();
    clock.advance(Duration::from_millis(3));
    session.update_active(|l| l.content = "second".into());
    scheduler.request_redraw();

    let frames = scheduler.host_mut().take_frames();
    assert_eq!(frames.len(), 1);
    let drew = scheduler.on_frame(frames[0], || {
        composite_frame(&mut surface, &mut cache, &session.frame(&selection), CompositeMode::Interactive);
    });
    assert!(drew);
    assert_eq!(scheduler.draws(), 1);
    assert_eq!(scheduler.state(), RedrawState::Idle);
    assert_eq!(scheduler.host().pending_frames(), 0);
    assert!(scheduler.host().timers().is_empty());
    assert_eq!(surface.filled_texts(), vec!["second"]);
}

#[test]
fn editor_coalesces_edits_into_one_preview() {
    let clock = ManualClock::new();
    let mut editor = Editor::new(EditorConfig::default(), ManualFrameHost::new(), clock.clone());
    let (base, cutout) = image_pair(64, 48);
    editor.load_images(base, cutout).unwrap();
    editor.edit(|s| s.update_active(|l| l.opacity = 0.5));
    clock.advance(Duration::from_millis(2));
    editor.edit(|s| s.update_active(|l| l.opacity = 0.8));

    let frames = editor.scheduler_mut().host_mut().take_frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(
        editor.on_frame(frames[0]),
        Some(CompositeOutcome::Drawn { width: 64, height: 48, layers: 1 })
    );
    assert_eq!(editor.scheduler().draws(), 1);
    assert_eq!(editor.preview().map(|p| (p.width(), p.height())), Some((64, 48)));
    assert_eq!(editor.on_frame(frames[0]), None);
}

#[test]
fn teardown_prevents_pending_draw() {
    let clock = ManualClock::new();
    let mut editor = Editor::new(EditorConfig::default(), ManualFrameHost::new(), clock);
    let (base, cutout) = image_pair(10, 10);
    editor.load_images(base, cutout).unwrap();
    let token = editor.scheduler().host().next_frame().unwrap();
    editor.teardown();
    assert_eq!(editor.on_frame(token), None);
    assert!(editor.preview().is_none());
}

#[tokio::test(start_paused = true)]
async fn tokio_host_applies_debounced_input() {
    init_tracing();
    let (host, mut rx) = TokioFrameHost::new(Duration::from_millis(16)).unwrap();
    let mut editor = Editor::new(EditorConfig::default(), host, TokioClock::default());
    let (base, cutout) = image_pair(200, 100);
    editor.load_images(base, cutout).unwrap();
    editor.nudge_slider(50.0, 0.0);
    let mut filters = SurfaceFilters::default();
    filters.background.filters.brightness = 40.0;
    editor.nudge_filters(filters.clone());

    // Only host events drive the editor from here on.
    let deadline = tokio::time::Instant::now() + Duration::from_millis(200);
    while let Ok(Some(event)) = tokio::time::timeout_at(deadline, rx.recv()).await {
        editor.handle_event(event);
        if editor.scheduler().state() == RedrawState::Idle && editor.next_input_deadline().is_none() {
            break;
        }
    }

    let layer = editor.session().active_layer().unwrap();
    assert_eq!(layer.slider_x, 50.0);
    assert_eq!(layer.position, Point::new(150.0, 50.0));
    assert_eq!(editor.session().filters(), &filters);
    assert!(editor.scheduler().draws() >= 1);
    assert_eq!(editor.preview().map(|p| (p.width(), p.height())), Some((200, 100)));
}

#[tokio::test(start_paused = true)]
async fn tokio_host_draws_once_for_a_burst() {
    let (host, mut rx) = TokioFrameHost::new(Duration::from_millis(16)).unwrap();
    let mut editor = Editor::new(EditorConfig::default(), host, TokioClock::default());
    let (base, cutout) = image_pair(32, 32);
    editor.load_images(base, cutout).unwrap();
    for i in 0..5 {
        editor.edit(|s| s.update_active(|l| l.content = format!("v{i}")));
    }

    let event = rx.recv().await.unwrap();
    assert!(matches!(
        editor.handle_event(event),
        Some(CompositeOutcome::Drawn { width: 32, height: 32, .. })
    ));
    assert_eq!(editor.scheduler().state(), RedrawState::Idle);
    assert!(tokio::time::timeout(Duration::from_millis(100), rx.recv()).await.is_err());
    assert_eq!(editor.scheduler().draws(), 1);
}

/// Reports `used` out of a 100 byte limit.
#[derive(Clone, Default)]
struct SharedProbe {
    used: Arc<AtomicU64>,
}

impl MemoryProbe for SharedProbe {
    fn heap_usage(&self) -> Option<HeapUsage> {
        Some(HeapUsage {
            used: self.used.load(Ordering::SeqCst),
            limit: 100,
        })
    }
}

#[test]
fn memory_pressure_clears_measurements_before_preview() {
    let probe = SharedProbe::default();
    let mut editor = manual_editor().with_memory_probe(probe.clone());
    let (base, cutout) = image_pair(64, 48);
    editor.load_images(base, cutout).unwrap();
    editor.edit(|s| s.update_active(|l| l.content = "pressure".into()));

    editor.render_preview();
    let measured = editor.cache().misses;
    assert!(measured > 0);
    editor.render_preview();
    assert_eq!(editor.cache().misses, measured);

    // At the threshold nothing is dropped.
    probe.used.store(70, Ordering::SeqCst);
    editor.render_preview();
    assert_eq!(editor.cache().misses, measured);

    probe.used.store(90, Ordering::SeqCst);
    editor.render_preview();
    assert_eq!(editor.cache().misses, measured * 2);
    assert!(!editor.cache().is_empty());
}

// =========================================================================
// Loading and export
// =========================================================================

/// Makes the left half of the image transparent.
struct LeftHalfSegmenter;

#[async_trait]
impl Segmenter for LeftHalfSegmenter {
    async fn remove_background(&self, image: &RgbaImage) -> Result<RgbaImage, SegmentError> {
        let mut cutout = image.clone();
        let half = cutout.width() / 2;
        for (x, _, px) in cutout.enumerate_pixels_mut() {
            if x < half {
                px.0[3] = 0;
            }
        }
        Ok(cutout)
    }
}

struct ShrinkingSegmenter;

#[async_trait]
impl Segmenter for ShrinkingSegmenter {
    async fn remove_background(&self, image: &RgbaImage) -> Result<RgbaImage, SegmentError> {
        Ok(RgbaImage::new(image.width() / 2, image.height()))
    }
}

struct OfflineSegmenter;

#[async_trait]
impl Segmenter for OfflineSegmenter {
    async fn remove_background(&self, _image: &RgbaImage) -> Result<RgbaImage, SegmentError> {
        Err(SegmentError::Unavailable("model not loaded".into()))
    }
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([10, 120, 200, 255]));
    backdrop_render::encode(&img, ExportFormat::Png).unwrap().bytes
}

fn manual_editor() -> Editor<ManualFrameHost, ManualClock> {
    Editor::new(EditorConfig::default(), ManualFrameHost::new(), ManualClock::new())
}

#[tokio::test]
async fn load_and_export_round_trip() {
    init_tracing();
    let mut editor = manual_editor();
    editor
        .load_image_bytes(&png_bytes(40, 30), &LeftHalfSegmenter)
        .await
        .unwrap();
    assert_eq!(editor.session().surface_size(), Some((40, 30)));
    assert_eq!(editor.session().cutout().unwrap().get_pixel(0, 0).0[3], 0);

    let png = editor.export(ExportFormat::Png).unwrap();
    assert_eq!(png.mime_type, "image/png");
    let decoded = image::load_from_memory(&png.bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (40, 30));

    let jpeg = editor.export_mobile().unwrap();
    assert_eq!(jpeg.mime_type, "image/jpeg");
    assert!(jpeg.filename.ends_with(".jpg"));
    assert_ne!(png.filename, jpeg.filename);
}

#[tokio::test]
async fn mismatched_cutout_is_an_error() {
    let mut editor = manual_editor();
    let err = editor
        .load_image_bytes(&png_bytes(40, 30), &ShrinkingSegmenter)
        .await
        .unwrap_err();
    assert!(matches!(err, EditorError::DimensionMismatch { width: 40, cutout_width: 20, .. }));
    assert!(editor.session().base().is_none());
}

#[tokio::test]
async fn segmentation_failure_is_reported() {
    let mut editor = manual_editor();
    let err = editor
        .load_image_bytes(&png_bytes(8, 8), &OfflineSegmenter)
        .await
        .unwrap_err();
    assert!(matches!(err, EditorError::Segmentation(SegmentError::Unavailable(_))));
}

#[tokio::test]
async fn undecodable_bytes_are_an_error() {
    let mut editor = manual_editor();
    let err = editor
        .load_image_bytes(b"not an image", &LeftHalfSegmenter)
        .await
        .unwrap_err();
    assert!(matches!(err, EditorError::Decode(_)));
}

#[test]
fn export_omits_selection_but_preview_has_it() {
    let session = loaded_session(100, 100);
    let outline = |s: &RecordingSurface| {
        s.commands
            .iter()
            .any(|c| matches!(c, DrawCommand::StrokeRoundRect { .. }))
    };
    assert!(outline(&record(&session, CompositeMode::Interactive)));
    assert!(!outline(&record(&session, CompositeMode::Export)));
}
