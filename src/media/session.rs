//! One MJPEG client session: capture, normalise to JPEG, emit, release.
//!
//! Cycle:
//! ```text
//!   acquire ──► JPEG? ──yes──► Payload::Frame ───┐
//!                 │                              ├──► header ─► payload ─► boundary
//!                 no ──► encode ─► release frame │                 │
//!                              └─► Payload::Encoded                ▼
//!                                                          dispose payload
//! ```
//! Whatever the outcome of the writes, the payload of a cycle is disposed of
//! before the next cycle starts or the session returns. A frame goes back to
//! the source, an encoded buffer goes back to the encoder.

use std::time::{Duration, Instant};

use bytes::Bytes;
use camera_bus::{CaptureError, EncodeError, Encoder, Frame, FrameSource};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::media::chunk::{
    ChunkWriter, STREAM_BOUNDARY, STREAM_CONTENT_TYPE, WriteError, part_header,
};

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("camera capture failed: {0}")]
    Acquire(#[from] CaptureError),
    #[error("jpeg conversion failed: {0}")]
    Encode(#[from] EncodeError),
    #[error("chunk write failed: {0}")]
    Write(#[from] WriteError),
}

/// The bytes sent for one cycle, tagged by who owns them.
enum Payload {
    /// Native JPEG, still held from the source.
    Frame(Frame),
    /// Produced by the encoder; the source frame has already been released.
    Encoded(Bytes),
}

impl Payload {
    fn bytes(&self) -> &Bytes {
        match self {
            Payload::Frame(frame) => frame.data(),
            Payload::Encoded(buf) => buf,
        }
    }

    fn dispose(self, source: &mut dyn FrameSource, encoder: &mut dyn Encoder) {
        match self {
            Payload::Frame(frame) => source.release(frame),
            Payload::Encoded(buf) => encoder.free(buf),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SessionSummary {
    pub frames: u64,
    pub bytes: u64,
    pub elapsed: Duration,
    pub cancelled: bool,
}

impl SessionSummary {
    pub fn fps(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.frames as f64 / secs
        } else {
            0.0
        }
    }
}

/// State scoped to one streaming connection.
pub struct StreamSession {
    peer: String,
    cancel: CancellationToken,
    started_at: Instant,
    last_frame: Option<Instant>,
    frames_sent: u64,
    bytes_sent: u64,
}

impl StreamSession {
    pub fn new(peer: impl Into<String>, cancel: CancellationToken) -> Self {
        Self {
            peer: peer.into(),
            cancel,
            started_at: Instant::now(),
            last_frame: None,
            frames_sent: 0,
            bytes_sent: 0,
        }
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    /// When the last complete part went out.
    pub fn last_frame(&self) -> Option<Instant> {
        self.last_frame
    }

    fn summary(&self, cancelled: bool) -> SessionSummary {
        SessionSummary {
            frames: self.frames_sent,
            bytes: self.bytes_sent,
            elapsed: self.started_at.elapsed(),
            cancelled,
        }
    }

    /// Streams until a capture, encode or write fails, or the session is cancelled.
    ///
    /// Blocks the calling thread. Cancellation is checked between cycles.
    pub fn run(
        &mut self,
        source: &mut dyn FrameSource,
        encoder: &mut dyn Encoder,
        writer: &mut dyn ChunkWriter,
    ) -> Result<SessionSummary, StreamError> {
        writer.set_content_type(STREAM_CONTENT_TYPE)?;
        writer.set_header("Access-Control-Allow-Origin", "*")?;
        writer.set_header("Cache-Control", "no-cache")?;
        writer.write_chunk(Bytes::from_static(STREAM_BOUNDARY))?;
        log::info!("stream {}: started ({} source)", self.peer, source.format());

        loop {
            if self.cancel.is_cancelled() {
                let summary = self.summary(true);
                log::info!(
                    "stream {}: cancelled after {} frames, {} bytes ({:.1} fps)",
                    self.peer,
                    summary.frames,
                    summary.bytes,
                    summary.fps()
                );
                return Ok(summary);
            }

            match self.cycle(source, encoder, writer) {
                Ok(len) => {
                    self.frames_sent += 1;
                    self.bytes_sent += len as u64;
                    self.last_frame = Some(Instant::now());
                }
                Err(e) => {
                    let summary = self.summary(false);
                    log::error!(
                        "stream {}: {} (after {} frames, {} bytes, {:.1} fps)",
                        self.peer,
                        e,
                        summary.frames,
                        summary.bytes,
                        summary.fps()
                    );
                    return Err(e);
                }
            }
        }
    }

    fn cycle(
        &mut self,
        source: &mut dyn FrameSource,
        encoder: &mut dyn Encoder,
        writer: &mut dyn ChunkWriter,
    ) -> Result<usize, StreamError> {
        let frame = source.acquire()?;
        let captured_at = frame.captured_at();
        let payload = if frame.format().is_jpeg() {
            Payload::Frame(frame)
        } else {
            let encoded = encoder.encode(&frame);
            source.release(frame);
            Payload::Encoded(encoded?)
        };

        let len = payload.bytes().len();
        let sent = Self::emit(writer, payload.bytes());
        payload.dispose(source, encoder);
        sent?;

        log::trace!(
            "stream {}: part of {} bytes, {:?} after capture",
            self.peer,
            len,
            captured_at.elapsed()
        );
        Ok(len)
    }

    fn emit(writer: &mut dyn ChunkWriter, data: &Bytes) -> Result<(), WriteError> {
        writer.write_chunk(part_header(data.len()))?;
        writer.write_chunk(data.clone())?;
        writer.write_chunk(Bytes::from_static(STREAM_BOUNDARY))
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;
