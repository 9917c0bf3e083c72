use backdrop_render::RenderError;
use thiserror::Error;

use crate::segment::SegmentError;

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("background removal failed: {0}")]
    Segmentation(#[from] SegmentError),

    #[error("cutout is {cutout_width}x{cutout_height} but the image is {width}x{height}")]
    DimensionMismatch {
        width: u32,
        height: u32,
        cutout_width: u32,
        cutout_height: u32,
    },

    #[error("no image loaded")]
    NoImage,

    #[error("no tokio runtime available for frame scheduling")]
    NoRuntime,

    #[error("render error: {0}")]
    Render(#[from] RenderError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EditorError>;
