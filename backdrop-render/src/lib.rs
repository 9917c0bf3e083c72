//! Backdrop Render: raster compositing and text layout.
//!
//! Provides the drawing side of the editor:
//! - A canvas-like [`Surface`] trait with a tiny-skia backed [`RasterSurface`]
//!   and a command-recording [`RecordingSurface`]
//! - Text measurement through cosmic-text with a bounded [`MeasureCache`]
//! - Per-layer text rendering (shadow, background box, stroke, selection outline)
//! - The full-frame [`composite_frame`] pipeline and PNG/JPEG export
//!
//! # Architecture
//!
//! ```text
//! Frame (images + layers + filters)
//!   -> composite_frame: background -> behind texts -> cutout -> on-top texts
//!        -> render_text_layer (per layer, save/restore scoped)
//!             -> MeasureCache -> Surface::measure_text
//!   -> Surface (RasterSurface pixels | RecordingSurface commands)
//!   -> export::encode (PNG | JPEG)
//! ```

// Core primitives
pub mod primitives;
pub mod surface;

// Surfaces
pub mod raster;
pub mod recording;

// Text
pub mod text_engine;
pub mod measure_cache;
pub mod text_layer;

// Compositing
pub mod filter;
pub mod compositor;
pub mod export;

// Resource signals and instrumentation
pub mod memory;
pub mod frame_timing;

mod error;

pub use compositor::{composite_frame, paint_order, CompositeMode, CompositeOutcome, Frame, PaintOrder};
pub use error::RenderError;
pub use export::{encode, export_filename, ExportFormat, ExportedImage};
pub use measure_cache::{MeasureCache, DEFAULT_MEASURE_CAPACITY};
pub use memory::{HeapUsage, MemoryProbe, NoMemoryProbe, ProcessMemoryProbe, DEFAULT_PRESSURE_THRESHOLD};
pub use primitives::{Point, Rect, Size};
pub use raster::RasterSurface;
pub use recording::{DrawCommand, RecordingSurface};
pub use surface::{FontDescriptor, Shadow, Surface, TextMeasurer, TextMetrics, TextRun};
pub use text_layer::{layout_text_layer, render_text_layer, LayerRenderContext, LineLayout, SelectionStyle, TextBlockLayout};
