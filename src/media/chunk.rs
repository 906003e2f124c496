use bytes::Bytes;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

pub const PART_BOUNDARY: &str = "123456789000000000000987654321";
pub const STREAM_CONTENT_TYPE: &str =
    "multipart/x-mixed-replace; boundary=123456789000000000000987654321";
pub const STREAM_BOUNDARY: &[u8] = b"\r\n--123456789000000000000987654321\r\n";

/// Part header announcing a JPEG payload of `len` bytes.
pub fn part_header(len: usize) -> Bytes {
    Bytes::from(format!(
        "Content-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        len
    ))
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("response head already sent")]
    HeadAlreadySent,
    #[error("content type must be set before the first chunk")]
    HeadNotSent,
    #[error("peer closed the connection")]
    Closed,
}

/// Chunked response writer for a single connection.
///
/// The head (content type and headers) is fixed by the first `write_chunk`.
/// After any `Err`, the connection is unusable.
pub trait ChunkWriter {
    fn set_content_type(&mut self, content_type: &str) -> Result<(), WriteError>;

    fn set_header(&mut self, name: &str, value: &str) -> Result<(), WriteError>;

    fn write_chunk(&mut self, chunk: Bytes) -> Result<(), WriteError>;
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResponseHead {
    pub content_type: Option<String>,
    pub headers: Vec<(String, String)>,
}

/// Writer side of a streamed HTTP body.
///
/// Chunks are handed to the body through a channel with room for a single
/// chunk, so writes block while the client is slow and fail once the body
/// has been dropped. Must be driven from a blocking thread.
pub struct ChannelChunkWriter {
    head: ResponseHead,
    head_tx: Option<oneshot::Sender<ResponseHead>>,
    body_tx: mpsc::Sender<Bytes>,
}

impl ChannelChunkWriter {
    pub fn new() -> (Self, oneshot::Receiver<ResponseHead>, mpsc::Receiver<Bytes>) {
        let (head_tx, head_rx) = oneshot::channel();
        let (body_tx, body_rx) = mpsc::channel(1);
        let writer = Self {
            head: ResponseHead::default(),
            head_tx: Some(head_tx),
            body_tx,
        };
        (writer, head_rx, body_rx)
    }

    fn pending_head(&mut self) -> Result<&mut ResponseHead, WriteError> {
        match &self.head_tx {
            Some(tx) if tx.is_closed() => Err(WriteError::Closed),
            Some(_) => Ok(&mut self.head),
            None => Err(WriteError::HeadAlreadySent),
        }
    }

    fn flush_head(&mut self) -> Result<(), WriteError> {
        let Some(tx) = self.head_tx.take() else {
            return Ok(());
        };
        if self.head.content_type.is_none() {
            self.head_tx = Some(tx);
            return Err(WriteError::HeadNotSent);
        }
        tx.send(std::mem::take(&mut self.head))
            .map_err(|_| WriteError::Closed)
    }
}

impl ChunkWriter for ChannelChunkWriter {
    fn set_content_type(&mut self, content_type: &str) -> Result<(), WriteError> {
        self.pending_head()?.content_type = Some(content_type.to_string());
        Ok(())
    }

    fn set_header(&mut self, name: &str, value: &str) -> Result<(), WriteError> {
        self.pending_head()?
            .headers
            .push((name.to_string(), value.to_string()));
        Ok(())
    }

    fn write_chunk(&mut self, chunk: Bytes) -> Result<(), WriteError> {
        self.flush_head()?;
        self.body_tx
            .blocking_send(chunk)
            .map_err(|_| WriteError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_header_layout() {
        assert_eq!(
            &part_header(1200)[..],
            b"Content-Type: image/jpeg\r\nContent-Length: 1200\r\n\r\n"
        );
        assert_eq!(
            &part_header(0)[..],
            b"Content-Type: image/jpeg\r\nContent-Length: 0\r\n\r\n"
        );
    }

    #[test]
    fn test_part_header_is_not_truncated_at_max_length() {
        let header = part_header(usize::MAX);
        let expected = format!(
            "Content-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
            usize::MAX
        );
        assert_eq!(&header[..], expected.as_bytes());
        // wider than the 64-byte scratch buffers embedded servers format into
        assert!(header.len() > 64 || usize::BITS < 64);
    }

    #[test]
    fn test_boundary_constants_agree() {
        assert!(STREAM_CONTENT_TYPE.ends_with(PART_BOUNDARY));
        assert_eq!(STREAM_BOUNDARY, format!("\r\n--{}\r\n", PART_BOUNDARY).as_bytes());
    }

    #[test]
    fn test_channel_writer_requires_content_type() {
        let (mut writer, _head_rx, _body_rx) = ChannelChunkWriter::new();
        assert!(matches!(
            writer.write_chunk(Bytes::from_static(b"x")),
            Err(WriteError::HeadNotSent)
        ));
    }

    #[test]
    fn test_channel_writer_delivers_head_then_chunks() {
        let (mut writer, mut head_rx, mut body_rx) = ChannelChunkWriter::new();
        writer.set_content_type("text/plain").unwrap();
        writer.set_header("X-Test", "1").unwrap();
        writer.write_chunk(Bytes::from_static(b"hello")).unwrap();

        let head = head_rx.try_recv().unwrap();
        assert_eq!(head.content_type.as_deref(), Some("text/plain"));
        assert_eq!(head.headers, vec![("X-Test".to_string(), "1".to_string())]);
        assert_eq!(body_rx.try_recv().unwrap(), Bytes::from_static(b"hello"));

        assert!(matches!(
            writer.set_header("X-Late", "1"),
            Err(WriteError::HeadAlreadySent)
        ));
    }

    #[test]
    fn test_channel_writer_fails_after_body_dropped() {
        let (mut writer, _head_rx, body_rx) = ChannelChunkWriter::new();
        writer.set_content_type("text/plain").unwrap();
        drop(body_rx);
        assert!(matches!(
            writer.write_chunk(Bytes::from_static(b"x")),
            Err(WriteError::Closed)
        ));
    }

    #[test]
    fn test_channel_writer_fails_after_head_receiver_dropped() {
        let (mut writer, head_rx, _body_rx) = ChannelChunkWriter::new();
        drop(head_rx);
        assert!(matches!(
            writer.set_content_type("text/plain"),
            Err(WriteError::Closed)
        ));
    }
}
