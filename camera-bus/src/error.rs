use thiserror::Error;

use crate::frame::PixelFormat;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no free frame buffer ({0} slots outstanding)")]
    PoolExhausted(usize),
    #[error("device error: {0}")]
    Device(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid source config: {0}")]
    Config(String),
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("frame is already {0}")]
    AlreadyEncoded(PixelFormat),
    #[error("invalid frame size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
    #[error("short frame buffer: expected {expected} bytes, got {actual}")]
    ShortBuffer { expected: usize, actual: usize },
    #[error("jpeg encoder: {0}")]
    Jpeg(#[from] jpeg_encoder::EncodingError),
}
