//! Synthetic camera rendering moving colour bars.
//!
//! Stands in for sensor hardware on a bench: frames come out in any
//! [`PixelFormat`], at a fixed rate, from the same bounded slot pool a
//! driver would use.

use bytes::Bytes;

use crate::{
    convert,
    error::CaptureError,
    frame::{Frame, PixelFormat},
    source::{DEFAULT_SLOTS, FrameSource, Pacer, SlotPool},
};

const BARS: [[u8; 3]; 8] = [
    [255, 255, 255],
    [255, 255, 0],
    [0, 255, 255],
    [0, 255, 0],
    [255, 0, 255],
    [255, 0, 0],
    [0, 0, 255],
    [0, 0, 0],
];

pub struct PatternSource {
    format: PixelFormat,
    width: u32,
    height: u32,
    pool: SlotPool,
    pacer: Pacer,
    frame_count: u64,
}

impl PatternSource {
    pub fn new(format: PixelFormat, width: u32, height: u32, fps: f32) -> Result<Self, CaptureError> {
        Self::with_slots(format, width, height, fps, DEFAULT_SLOTS)
    }

    pub fn with_slots(
        format: PixelFormat,
        width: u32,
        height: u32,
        fps: f32,
        slots: usize,
    ) -> Result<Self, CaptureError> {
        if width == 0 || height == 0 || width > u16::MAX as u32 || height > u16::MAX as u32 {
            return Err(CaptureError::Config(format!(
                "invalid frame size {}x{}",
                width, height
            )));
        }
        if format == PixelFormat::Yuyv && width % 2 != 0 {
            return Err(CaptureError::Config(format!(
                "yuyv needs an even width, got {}",
                width
            )));
        }
        let pacer = Pacer::new(fps)?;
        log::info!(
            "pattern source: {} {}x{} @ {} fps, {} slots",
            format,
            width,
            height,
            fps,
            slots
        );
        Ok(Self {
            format,
            width,
            height,
            pool: SlotPool::new(slots),
            pacer,
            frame_count: 0,
        })
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    fn render_rgb(&self) -> Vec<u8> {
        let (w, h) = (self.width as usize, self.height as usize);
        let bar_width = (w / BARS.len()).max(1);
        let shift = self.frame_count as usize;
        let mut rgb = Vec::with_capacity(w * h * 3);
        for _ in 0..h {
            for x in 0..w {
                let bar = ((x + shift) / bar_width) % BARS.len();
                rgb.extend_from_slice(&BARS[bar]);
            }
        }
        rgb
    }

    fn render(&self) -> Result<Vec<u8>, CaptureError> {
        let (w, h) = (self.width, self.height);
        let rgb = self.render_rgb();
        let converted = match self.format {
            PixelFormat::Rgb888 => Some(rgb),
            PixelFormat::Rgb565 => convert::rgb888_to_rgb565(&rgb, w, h),
            PixelFormat::Yuyv => convert::rgb888_to_yuyv(&rgb, w, h),
            PixelFormat::Grayscale => convert::rgb888_to_luma(&rgb, w, h),
            PixelFormat::Jpeg => {
                // sensors with an on-chip JPEG engine
                let mut out = Vec::new();
                jpeg_encoder::Encoder::new(&mut out, 80)
                    .encode(&rgb, w as u16, h as u16, jpeg_encoder::ColorType::Rgb)
                    .map_err(|e| CaptureError::Device(format!("jpeg engine: {}", e)))?;
                Some(out)
            }
        };
        converted.ok_or_else(|| CaptureError::Device("pattern conversion failed".to_string()))
    }
}

impl FrameSource for PatternSource {
    fn acquire(&mut self) -> Result<Frame, CaptureError> {
        let slot = self.pool.take()?;
        self.pacer.wait();
        match self.render() {
            Ok(data) => {
                self.frame_count += 1;
                Ok(Frame::new(slot, self.format, self.width, self.height, Bytes::from(data)))
            }
            Err(e) => {
                self.pool.give_back(slot);
                Err(e)
            }
        }
    }

    fn release(&mut self, frame: Frame) {
        self.pool.give_back(frame.slot());
    }

    fn format(&self) -> PixelFormat {
        self.format
    }

    fn outstanding(&self) -> usize {
        self.pool.outstanding()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_frame_sizes() {
        for format in [
            PixelFormat::Rgb888,
            PixelFormat::Rgb565,
            PixelFormat::Yuyv,
            PixelFormat::Grayscale,
        ] {
            let mut source = PatternSource::new(format, 16, 4, 1000.0).unwrap();
            let frame = source.acquire().unwrap();
            assert_eq!(frame.format(), format);
            assert_eq!(Some(frame.len()), format.frame_len(16, 4));
            source.release(frame);
            assert_eq!(source.outstanding(), 0);
        }
    }

    #[test]
    fn test_pattern_jpeg_frames_are_jpeg() {
        let mut source = PatternSource::new(PixelFormat::Jpeg, 32, 16, 1000.0).unwrap();
        let frame = source.acquire().unwrap();
        assert_eq!(&frame.data()[..2], &[0xff, 0xd8]);
        source.release(frame);
    }

    #[test]
    fn test_pattern_pool_exhausts_without_release() {
        let mut source = PatternSource::with_slots(PixelFormat::Rgb888, 8, 8, 1000.0, 2).unwrap();
        let a = source.acquire().unwrap();
        let b = source.acquire().unwrap();
        assert!(matches!(source.acquire(), Err(CaptureError::PoolExhausted(2))));
        source.release(a);
        let c = source.acquire().unwrap();
        source.release(b);
        source.release(c);
        assert_eq!(source.outstanding(), 0);
        assert_eq!(source.frame_count(), 3);
    }

    #[test]
    fn test_pattern_moves_between_frames() {
        let mut source = PatternSource::new(PixelFormat::Rgb888, 16, 1, 1000.0).unwrap();
        let first = source.acquire().unwrap();
        let second = source.acquire().unwrap();
        assert_ne!(first.data(), second.data());
        source.release(first);
        source.release(second);
    }

    #[test]
    fn test_pattern_rejects_bad_config() {
        assert!(PatternSource::new(PixelFormat::Yuyv, 7, 4, 10.0).is_err());
        assert!(PatternSource::new(PixelFormat::Rgb888, 0, 4, 10.0).is_err());
        assert!(PatternSource::new(PixelFormat::Rgb888, 4, 4, 0.0).is_err());
        assert!(matches!(
            PatternSource::new(PixelFormat::Rgb888, 4, 4, 1e-39),
            Err(CaptureError::Config(_))
        ));
    }
}
