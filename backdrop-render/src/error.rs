//! Render error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("invalid surface size: {width}x{height}")]
    InvalidSize { width: u32, height: u32 },

    #[error("encode error: {0}")]
    Encode(#[from] image::ImageError),
}
