use bytes::Bytes;
use jpeg_encoder::ColorType;

use crate::{convert, error::EncodeError, frame::Frame, frame::PixelFormat};

/// JPEG quality the stream uses unless configured otherwise.
pub const DEFAULT_QUALITY: u8 = 80;

/// Turns a raw frame into a JPEG buffer the caller owns.
///
/// Buffers returned by `encode` go back through `free` exactly once. A failed
/// `encode` allocates nothing that needs freeing.
pub trait Encoder: Send {
    fn encode(&mut self, frame: &Frame) -> Result<Bytes, EncodeError>;

    fn free(&mut self, buffer: Bytes) {
        drop(buffer);
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EncodeStats {
    pub encoded: u64,
    pub failed: u64,
    pub freed: u64,
}

impl EncodeStats {
    /// Buffers handed out and not yet returned through `free`.
    pub fn outstanding(&self) -> u64 {
        self.encoded - self.freed
    }
}

pub struct JpegEncoder {
    quality: u8,
    stats: EncodeStats,
}

impl JpegEncoder {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
            stats: EncodeStats::default(),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn stats(&self) -> EncodeStats {
        self.stats
    }

    fn encode_inner(&self, frame: &Frame) -> Result<Vec<u8>, EncodeError> {
        let format = frame.format();
        if format.is_jpeg() {
            return Err(EncodeError::AlreadyEncoded(format));
        }

        let (width, height) = (frame.width(), frame.height());
        if width == 0 || height == 0 || width > u16::MAX as u32 || height > u16::MAX as u32 {
            return Err(EncodeError::InvalidSize { width, height });
        }

        let data = frame.data();
        let expected = format.frame_len(width, height).unwrap_or_default();
        if data.len() < expected {
            return Err(EncodeError::ShortBuffer {
                expected,
                actual: data.len(),
            });
        }

        let short = || EncodeError::ShortBuffer {
            expected,
            actual: data.len(),
        };
        let (pixels, color) = match format {
            PixelFormat::Rgb888 => (data[..expected].to_vec(), ColorType::Rgb),
            PixelFormat::Grayscale => (data[..expected].to_vec(), ColorType::Luma),
            PixelFormat::Rgb565 => (
                convert::rgb565_to_rgb888(data, width, height).ok_or_else(short)?,
                ColorType::Rgb,
            ),
            PixelFormat::Yuyv => (
                convert::yuyv_to_ycbcr(data, width, height).ok_or_else(short)?,
                ColorType::Ycbcr,
            ),
            PixelFormat::Jpeg => return Err(EncodeError::AlreadyEncoded(format)),
        };

        let mut out = Vec::with_capacity(expected / 8);
        let encoder = jpeg_encoder::Encoder::new(&mut out, self.quality);
        encoder.encode(&pixels, width as u16, height as u16, color)?;
        Ok(out)
    }
}

impl Default for JpegEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_QUALITY)
    }
}

impl Encoder for JpegEncoder {
    fn encode(&mut self, frame: &Frame) -> Result<Bytes, EncodeError> {
        match self.encode_inner(frame) {
            Ok(buf) => {
                self.stats.encoded += 1;
                log::trace!(
                    "encoded {} {}x{} frame into {} bytes",
                    frame.format(),
                    frame.width(),
                    frame.height(),
                    buf.len()
                );
                Ok(Bytes::from(buf))
            }
            Err(e) => {
                self.stats.failed += 1;
                Err(e)
            }
        }
    }

    fn free(&mut self, buffer: Bytes) {
        self.stats.freed += 1;
        drop(buffer);
    }
}
