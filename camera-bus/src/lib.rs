//! Camera-side plumbing: frame sources with a fixed frame-buffer pool,
//! pixel-format conversion and JPEG encoding.

pub mod convert;
pub mod encoder;
pub mod error;
pub mod frame;
pub mod jpeg_dir;
pub mod pattern;
pub mod source;

pub use encoder::{EncodeStats, Encoder, JpegEncoder};
pub use error::{CaptureError, EncodeError};
pub use frame::{Frame, PixelFormat};
pub use source::{FrameSource, SourceConfig};
