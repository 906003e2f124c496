use std::{
    fmt::{Display, Formatter},
    str::FromStr,
    time::Instant,
};

use bytes::Bytes;

/// Pixel layout of a captured frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Jpeg,
    Rgb888,
    // big-endian, as embedded sensors emit it
    Rgb565,
    // YUV 4:2:2 packed as Y0 U Y1 V
    Yuyv,
    Grayscale,
}

impl PixelFormat {
    pub fn is_jpeg(&self) -> bool {
        matches!(self, PixelFormat::Jpeg)
    }

    /// Bytes per pixel for raw formats, `None` for compressed ones.
    pub fn bytes_per_pixel(&self) -> Option<usize> {
        match self {
            PixelFormat::Jpeg => None,
            PixelFormat::Rgb888 => Some(3),
            PixelFormat::Rgb565 | PixelFormat::Yuyv => Some(2),
            PixelFormat::Grayscale => Some(1),
        }
    }

    /// Expected buffer length of a raw frame of `width`x`height`.
    pub fn frame_len(&self, width: u32, height: u32) -> Option<usize> {
        self.bytes_per_pixel()
            .map(|bpp| width as usize * height as usize * bpp)
    }
}

impl Display for PixelFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PixelFormat::Jpeg => "jpeg",
            PixelFormat::Rgb888 => "rgb888",
            PixelFormat::Rgb565 => "rgb565",
            PixelFormat::Yuyv => "yuyv",
            PixelFormat::Grayscale => "grayscale",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for PixelFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" | "mjpeg" => Ok(PixelFormat::Jpeg),
            "rgb888" | "rgb" | "rgb24" => Ok(PixelFormat::Rgb888),
            "rgb565" => Ok(PixelFormat::Rgb565),
            "yuyv" | "yuv422" => Ok(PixelFormat::Yuyv),
            "gray" | "grayscale" => Ok(PixelFormat::Grayscale),
            other => Err(format!("unknown pixel format '{}'", other)),
        }
    }
}

/// A captured frame occupying one slot of the source's frame-buffer pool.
///
/// A `Frame` is deliberately not `Clone`: the slot it holds is only given
/// back through [`crate::FrameSource::release`].
#[derive(Debug)]
pub struct Frame {
    slot: usize,
    format: PixelFormat,
    width: u32,
    height: u32,
    data: Bytes,
    captured_at: Instant,
}

impl Frame {
    pub fn new(slot: usize, format: PixelFormat, width: u32, height: u32, data: Bytes) -> Self {
        Self {
            slot,
            format,
            width,
            height,
            data,
            captured_at: Instant::now(),
        }
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// The frame's bytes. Cloning the returned `Bytes` does not copy.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }
}
