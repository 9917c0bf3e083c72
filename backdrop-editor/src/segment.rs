//! Background removal collaborator.

use async_trait::async_trait;
use image::RgbaImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SegmentError {
    #[error("segmentation service unavailable: {0}")]
    Unavailable(String),

    #[error("segmentation failed: {0}")]
    Failed(String),
}

/// Produces the foreground cutout for an image: same dimensions, with the
/// background made transparent.
#[async_trait]
pub trait Segmenter: Send + Sync {
    async fn remove_background(&self, image: &RgbaImage) -> Result<RgbaImage, SegmentError>;
}
