//! Backdrop Editor: session state, redraw scheduling and the editor facade.
//!
//! # Architecture
//!
//! ```text
//! slider / filter input ──▶ Debouncer (12ms) ──▶ EditorSession (positions recomputed)
//!                                                   │
//!                                                   ▼
//!                              RedrawScheduler (Idle ─▶ Pending ─▶ Drawing)
//!                                   │  FrameHost: ManualFrameHost | TokioFrameHost
//!                                   ▼
//!                         backdrop_render::composite_frame ─▶ RasterSurface
//! ```

pub mod config;
pub mod coords;
pub mod debounce;
pub mod editor;
pub mod host;
pub mod scheduler;
pub mod segment;
pub mod session;

mod error;

pub use config::EditorConfig;
pub use coords::{clamp_slider, to_absolute, to_slider};
pub use debounce::{Debouncer, DEFAULT_DEBOUNCE};
pub use editor::Editor;
pub use error::{EditorError, Result};
pub use host::{HostEvent, TokioClock, TokioFrameHost};
pub use scheduler::{
    Clock, FrameHost, FrameToken, HostCall, ManualClock, ManualFrameHost, RedrawScheduler, RedrawState,
    SystemClock, DEFAULT_MIN_FRAME_GAP,
};
pub use segment::{SegmentError, Segmenter};
pub use session::EditorSession;
