use thiserror::Error;

/// Errors produced by the pixelation pipeline.
///
/// None of these reach the host document: the orchestrator logs them and
/// leaves the affected image with its original source (or falls back to the
/// whole-image mosaic).
#[derive(Debug, Error)]
pub enum PixelateError {
    #[error("image has zero area ({width}x{height})")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("pixel buffer holds {actual} bytes, expected {expected} for {width}x{height} RGBA")]
    BufferSizeMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("dimension mismatch: {what} is {actual:?}, expected {expected:?}")]
    DimensionMismatch {
        what: &'static str,
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("mosaic factor {0} is outside 1..=1000")]
    InvalidFactor(u32),

    #[error("segmentation failed: {0}")]
    SegmentationFailure(String),

    #[error("response for unknown request {0}")]
    StaleResponse(String),

    #[error("image already has a pending mask request")]
    DuplicateRequest,

    #[error("background segmentation context unavailable: {0}")]
    WorkerUnavailable(String),

    #[error("failed to encode image")]
    Encode(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, PixelateError>;
