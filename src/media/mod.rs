//! MJPEG streaming for a single client connection.
//!
//! Data Flow:
//! ```text
//!  FrameSource ──acquire──► StreamSession ──header/payload/boundary──► ChunkWriter ──► HTTP body
//!       ▲                        │   ▲
//!       └────────release─────────┘   │ raw frames only
//!                                Encoder (encode / free)
//! ```
//!
//! The session runs on a blocking thread and owns the camera for its whole
//! lifetime; the HTTP side only sees the chunks.

pub mod chunk;
pub mod session;
