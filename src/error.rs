use thiserror::Error;

/// Every way a detection call can fail. None of these leave the heat maps
/// half-updated: size and shape checks run before any accumulation.
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("invalid frame dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("invalid frame rate: {0}")]
    InvalidFrameRate(f64),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("pipeline is already initialized")]
    AlreadyInitialized,
    #[error("frame is {actual_width}x{actual_height}, pipeline is locked to {expected_width}x{expected_height}")]
    ShapeMismatch {
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
    #[error("background model returned a {actual_width}x{actual_height} mask for a {expected_width}x{expected_height} frame")]
    ForegroundMaskMismatch {
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },
    #[error("pipeline task is no longer running")]
    PipelineClosed,
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, DetectionError>;
