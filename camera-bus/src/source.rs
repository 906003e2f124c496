use std::{
    fmt::{Display, Formatter},
    path::PathBuf,
    str::FromStr,
    time::{Duration, Instant},
};

use crate::{
    error::CaptureError,
    frame::{Frame, PixelFormat},
    jpeg_dir::JpegDirSource,
    pattern::PatternSource,
};

/// Frame buffers a camera driver keeps by default.
pub const DEFAULT_SLOTS: usize = 2;
pub const DEFAULT_FPS: f32 = 10.0;
pub const DEFAULT_WIDTH: u32 = 320;
pub const DEFAULT_HEIGHT: u32 = 240;

/// A camera: hands out frames from a small fixed pool of buffers.
///
/// Every frame returned by `acquire` must be passed to `release` exactly once,
/// whatever happens to it downstream. A source whose slots are all held fails
/// `acquire` with [`CaptureError::PoolExhausted`].
pub trait FrameSource: Send {
    /// Blocks until the next frame is available.
    fn acquire(&mut self) -> Result<Frame, CaptureError>;

    fn release(&mut self, frame: Frame);

    fn format(&self) -> PixelFormat;

    /// Slots currently held by callers.
    fn outstanding(&self) -> usize;
}

#[derive(Clone, Debug, PartialEq)]
pub enum SourceConfig {
    /// Synthetic moving colour bars.
    Pattern {
        format: PixelFormat,
        width: u32,
        height: u32,
        fps: f32,
    },
    /// JPEG files from a directory, replayed in name order.
    JpegDir { path: PathBuf, fps: f32 },
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Pattern {
            format: PixelFormat::Jpeg,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            fps: DEFAULT_FPS,
        }
    }
}

impl SourceConfig {
    pub fn open(&self) -> Result<Box<dyn FrameSource>, CaptureError> {
        match self {
            SourceConfig::Pattern {
                format,
                width,
                height,
                fps,
            } => Ok(Box::new(PatternSource::new(*format, *width, *height, *fps)?)),
            SourceConfig::JpegDir { path, fps } => Ok(Box::new(JpegDirSource::open(path, *fps)?)),
        }
    }
}

fn split_fps(s: &str) -> Result<(&str, f32), CaptureError> {
    match s.rsplit_once('@') {
        Some((head, fps)) => {
            let fps: f32 = fps
                .parse()
                .map_err(|_| CaptureError::Config(format!("invalid fps '{}'", fps)))?;
            frame_interval(fps)?;
            Ok((head, fps))
        }
        None => Ok((s, DEFAULT_FPS)),
    }
}

fn parse_size(s: &str) -> Result<(u32, u32), CaptureError> {
    let invalid = || CaptureError::Config(format!("invalid frame size '{}'", s));
    let (w, h) = s.split_once('x').ok_or_else(invalid)?;
    let w: u32 = w.parse().map_err(|_| invalid())?;
    let h: u32 = h.parse().map_err(|_| invalid())?;
    if w == 0 || h == 0 {
        return Err(invalid());
    }
    Ok((w, h))
}

/// Accepts `pattern[:<format>[:<W>x<H>]][@<fps>]` and `jpeg-dir:<path>[@<fps>]`.
impl FromStr for SourceConfig {
    type Err = CaptureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(path) = s.strip_prefix("jpeg-dir:") {
            let (path, fps) = split_fps(path)?;
            if path.is_empty() {
                return Err(CaptureError::Config("jpeg-dir needs a path".to_string()));
            }
            return Ok(SourceConfig::JpegDir {
                path: PathBuf::from(path),
                fps,
            });
        }

        let (spec, fps) = split_fps(s)?;
        let mut parts = spec.split(':');
        if parts.next() != Some("pattern") {
            return Err(CaptureError::Config(format!("unknown source '{}'", s)));
        }
        let (mut format, mut width, mut height) = (PixelFormat::Jpeg, DEFAULT_WIDTH, DEFAULT_HEIGHT);
        if let Some(f) = parts.next() {
            format = f.parse().map_err(CaptureError::Config)?;
        }
        if let Some(size) = parts.next() {
            (width, height) = parse_size(size)?;
        }
        if parts.next().is_some() {
            return Err(CaptureError::Config(format!("trailing fields in '{}'", s)));
        }
        Ok(SourceConfig::Pattern {
            format,
            width,
            height,
            fps,
        })
    }
}

impl Display for SourceConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceConfig::Pattern {
                format,
                width,
                height,
                fps,
            } => write!(f, "pattern:{}:{}x{}@{}", format, width, height, fps),
            SourceConfig::JpegDir { path, fps } => write!(f, "jpeg-dir:{}@{}", path.display(), fps),
        }
    }
}

/// Bookkeeping for a fixed pool of frame buffers.
#[derive(Debug)]
pub(crate) struct SlotPool {
    held: Vec<bool>,
}

impl SlotPool {
    pub(crate) fn new(slots: usize) -> Self {
        Self {
            held: vec![false; slots.max(1)],
        }
    }

    pub(crate) fn take(&mut self) -> Result<usize, CaptureError> {
        match self.held.iter().position(|held| !held) {
            Some(slot) => {
                self.held[slot] = true;
                Ok(slot)
            }
            None => Err(CaptureError::PoolExhausted(self.held.len())),
        }
    }

    pub(crate) fn give_back(&mut self, slot: usize) {
        match self.held.get_mut(slot) {
            Some(held) if *held => *held = false,
            _ => log::warn!("release of frame slot {} that is not outstanding", slot),
        }
    }

    pub(crate) fn outstanding(&self) -> usize {
        self.held.iter().filter(|held| **held).count()
    }
}

/// Time between frames at `fps`, rejecting rates with no representable interval.
pub(crate) fn frame_interval(fps: f32) -> Result<Duration, CaptureError> {
    if !(fps > 0.0 && fps.is_finite()) {
        return Err(CaptureError::Config(format!("fps must be positive, got {}", fps)));
    }
    Duration::try_from_secs_f32(1.0 / fps)
        .map_err(|_| CaptureError::Config(format!("fps {} is out of range", fps)))
}

/// Paces a capture loop to a fixed frame rate.
#[derive(Debug)]
pub(crate) struct Pacer {
    interval: Duration,
    next_due: Option<Instant>,
}

impl Pacer {
    pub(crate) fn new(fps: f32) -> Result<Self, CaptureError> {
        Ok(Self {
            interval: frame_interval(fps)?,
            next_due: None,
        })
    }

    /// Sleeps until the next frame is due. The first call returns immediately.
    pub(crate) fn wait(&mut self) {
        let now = Instant::now();
        let due = match self.next_due {
            Some(due) if due > now => {
                std::thread::sleep(due - now);
                due
            }
            // behind schedule: resync instead of bursting
            _ => now,
        };
        self.next_due = Some(due + self.interval);
    }
}
