//! Replays a directory of JPEG files as a native-JPEG camera.

use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::{
    error::CaptureError,
    frame::{Frame, PixelFormat},
    source::{DEFAULT_SLOTS, FrameSource, Pacer, SlotPool},
};

struct JpegFile {
    data: Bytes,
    width: u32,
    height: u32,
}

pub struct JpegDirSource {
    files: Vec<JpegFile>,
    next: usize,
    pool: SlotPool,
    pacer: Pacer,
}

impl JpegDirSource {
    pub fn open(dir: &Path, fps: f32) -> Result<Self, CaptureError> {
        let pacer = Pacer::new(fps)?;
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"))
            })
            .collect();
        paths.sort();

        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            let data = std::fs::read(&path)?;
            match jpeg_dimensions(&data) {
                Some((width, height)) => files.push(JpegFile {
                    data: Bytes::from(data),
                    width,
                    height,
                }),
                None => log::warn!("skipping {}: not a baseline/progressive JPEG", path.display()),
            }
        }

        if files.is_empty() {
            return Err(CaptureError::Config(format!(
                "no JPEG files in {}",
                dir.display()
            )));
        }
        log::info!(
            "jpeg-dir source: {} frames from {} @ {} fps",
            files.len(),
            dir.display(),
            fps
        );
        Ok(Self {
            files,
            next: 0,
            pool: SlotPool::new(DEFAULT_SLOTS),
            pacer,
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FrameSource for JpegDirSource {
    fn acquire(&mut self) -> Result<Frame, CaptureError> {
        let slot = self.pool.take()?;
        self.pacer.wait();
        let file = &self.files[self.next];
        self.next = (self.next + 1) % self.files.len();
        Ok(Frame::new(
            slot,
            PixelFormat::Jpeg,
            file.width,
            file.height,
            file.data.clone(),
        ))
    }

    fn release(&mut self, frame: Frame) {
        self.pool.give_back(frame.slot());
    }

    fn format(&self) -> PixelFormat {
        PixelFormat::Jpeg
    }

    fn outstanding(&self) -> usize {
        self.pool.outstanding()
    }
}

/// Reads width and height from the first SOF marker.
pub fn jpeg_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    if data.len() < 4 || data[0] != 0xff || data[1] != 0xd8 {
        return None;
    }
    let mut pos = 2;
    while pos + 4 <= data.len() {
        if data[pos] != 0xff {
            return None;
        }
        let marker = data[pos + 1];
        // fill bytes
        if marker == 0xff {
            pos += 1;
            continue;
        }
        let seg_len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        match marker {
            0xc0..=0xc3 | 0xc5..=0xc7 | 0xc9..=0xcb | 0xcd..=0xcf => {
                let sof = data.get(pos + 4..pos + 9)?;
                let height = u16::from_be_bytes([sof[1], sof[2]]) as u32;
                let width = u16::from_be_bytes([sof[3], sof[4]]) as u32;
                return Some((width, height));
            }
            0xd9 | 0xda => return None,
            _ => pos += 2 + seg_len,
        }
    }
    None
}
