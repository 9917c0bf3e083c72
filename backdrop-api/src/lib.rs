//! Backdrop API - Shared data model for the Backdrop compositor.
//!
//! Everything here is plain data: text layers and their style sub-state,
//! per-surface filter settings, and color parsing. The render and editor
//! crates both depend on these types.

mod color;
mod filters;
mod layer;

pub use color::*;
pub use filters::*;
pub use layer::*;
