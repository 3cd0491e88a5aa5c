use thiserror::Error;

/// Errors raised while building a face region.
///
/// `InvalidBox` and `InvalidMargin` reject caller input. The remaining
/// variants are resampler faults.
#[derive(Debug, Error)]
pub enum FaceRegionError {
    #[error("invalid face box: {reason}")]
    InvalidBox { reason: String },

    #[error("face margin must be a finite ratio >= 1.0, got {margin}")]
    InvalidMargin { margin: f32 },

    #[error("resampled buffer does not match {width}x{height} RGB")]
    BufferMismatch { width: u32, height: u32 },

    #[error("failed to wrap pixel buffer for resampling: {0}")]
    Buffer(#[from] fast_image_resize::ImageBufferError),

    #[error("failed to resample face crop: {0}")]
    Resize(#[from] fast_image_resize::ResizeError),
}

impl FaceRegionError {
    pub fn invalid_box(reason: impl Into<String>) -> Self {
        FaceRegionError::InvalidBox {
            reason: reason.into(),
        }
    }
}
