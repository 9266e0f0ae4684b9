//! The split reader/writer halves that sit between the raw stream and the
//! rest of the client.
//!
//! [`FrameReader`] drives the [`Framer`](crate::framer::Framer) against
//! whatever implements `AsyncRead`, decoding each frame into a
//! [`Message`](crate::message::Message) and handling the one-time banner
//! line. [`FrameWriter`] is the write-side critical section described in the
//! core design: serialize, write, flush, release — never held across a
//! reply.
//!
//! Both are generic over the stream type rather than tied to `TcpStream`, so
//! tests can drive them over an in-memory [`tokio::io::duplex`] pair.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

use crate::client::ClientError;
use crate::framer::Framer;
use crate::message::Message;

/// Callback fired with the exact bytes written or read, for debugging. Drops
/// are acceptable — this is best-effort, not a delivery guarantee.
pub type DataHook = Arc<dyn Fn(&[u8]) + Send + Sync>;

const READ_CHUNK: usize = 4096;

pub struct FrameReader<R> {
    stream: R,
    framer: Framer,
    banner_checked: bool,
    on_data_received: Option<DataHook>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(stream: R) -> Self {
        Self::with_max_frame_len(stream, crate::framer::DEFAULT_MAX_FRAME_LEN)
    }

    pub fn with_max_frame_len(stream: R, max_frame_len: usize) -> Self {
        FrameReader {
            stream,
            framer: Framer::with_max_frame_len(max_frame_len),
            banner_checked: false,
            on_data_received: None,
        }
    }

    pub fn with_data_hook(mut self, hook: DataHook) -> Self {
        self.on_data_received = Some(hook);
        self
    }

    /// Reads the next message from the stream.
    ///
    /// `Ok(Some(msg))` is a complete message. `Ok(None)` is a clean EOF (the
    /// stream closed with no partial frame buffered). `Err` covers a decode
    /// failure, a frame exceeding the size cap, or an EOF that left a
    /// partial frame behind (`UnexpectedEof`).
    pub async fn read_message(&mut self) -> Result<Option<Message>, ClientError> {
        if !self.banner_checked {
            self.consume_banner().await?;
            self.banner_checked = true;
        }

        loop {
            if let Some(frame) = self.framer.next_frame()? {
                trace!(len = frame.len(), "decoded AMI frame");
                return Ok(Some(Message::decode(&frame)?));
            }
            if !self.fill().await? {
                return if self.framer.is_empty() {
                    Ok(None)
                } else {
                    Err(ClientError::UnexpectedEof)
                };
            }
        }
    }

    /// Discards the server's non-conformant banner line, if present. The
    /// banner is only ever the very first thing on the wire, so this only
    /// runs once. If the first line already looks like `Key: Value`, it is
    /// left in the buffer — it's a real header, not a banner.
    async fn consume_banner(&mut self) -> Result<(), ClientError> {
        loop {
            match self.framer.peek_line() {
                // Not a banner: leave it exactly where it is, at the front of
                // the buffer, for `next_frame` to see.
                Some(line) if looks_like_header_line(line) => return Ok(()),
                Some(line) => {
                    debug!(banner = %String::from_utf8_lossy(line).trim(), "discarded AMI banner");
                    self.framer.discard_line();
                    return Ok(());
                }
                None => {
                    if !self.fill().await? {
                        return Ok(()); // EOF before any line; let the main loop report clean EOF.
                    }
                }
            }
        }
    }

    /// Reads one chunk from the stream into the framer. Returns `false` on
    /// EOF.
    async fn fill(&mut self) -> Result<bool, ClientError> {
        let mut chunk = [0u8; READ_CHUNK];
        let n = self.stream.read(&mut chunk).await.map_err(ClientError::Io)?;
        if n == 0 {
            return Ok(false);
        }
        if let Some(hook) = &self.on_data_received {
            hook(&chunk[..n]);
        }
        self.framer.feed(&chunk[..n]);
        Ok(true)
    }
}

/// A header line always has a colon with a non-empty key before it and no
/// whitespace inside the key. The banner (`Asterisk Call Manager/2.6.0`) has
/// none of those.
fn looks_like_header_line(line: &[u8]) -> bool {
    let line = line
        .strip_suffix(b"\n")
        .map(|l| l.strip_suffix(b"\r").unwrap_or(l))
        .unwrap_or(line);
    match line.iter().position(|&b| b == b':') {
        Some(0) => false,
        Some(idx) => line[..idx].iter().all(|&b| b != b' ' && b != b'\t'),
        None => false,
    }
}

pub struct FrameWriter<W> {
    stream: W,
    on_data_sent: Option<DataHook>,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(stream: W) -> Self {
        FrameWriter {
            stream,
            on_data_sent: None,
        }
    }

    pub fn with_data_hook(mut self, hook: DataHook) -> Self {
        self.on_data_sent = Some(hook);
        self
    }

    /// Serializes and writes one message, then flushes. This is the entire
    /// critical section guarded by the writer mutex in
    /// [`crate::client::Client`] — it never spans an await on a reply.
    pub async fn write_message(&mut self, message: &Message) -> Result<(), ClientError> {
        let bytes = message.encode();
        self.stream.write_all(&bytes).await.map_err(ClientError::Io)?;
        self.stream.flush().await.map_err(ClientError::Io)?;
        trace!(action_id = ?message.action_id(), len = bytes.len(), "sent AMI message");
        if let Some(hook) = &self.on_data_sent {
            hook(&bytes);
        }
        Ok(())
    }

    /// Closes the write half. Idempotent at the `AsyncWrite` level; the
    /// client only ever calls this once per terminal transition.
    pub async fn shutdown(&mut self) -> Result<(), ClientError> {
        self.stream.shutdown().await.map_err(ClientError::Io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_banner_then_message() {
        let (client_side, mut server_side) = tokio::io::duplex(256);
        tokio::spawn(async move {
            server_side
                .write_all(b"Asterisk Call Manager/2.6.0\r\nResponse: Pong\r\nActionID: A\r\n\r\n")
                .await
                .unwrap();
        });

        let mut reader = FrameReader::new(client_side);
        let msg = reader.read_message().await.unwrap().unwrap();
        assert_eq!(msg.get("Response"), Some("Pong"));
        assert_eq!(msg.action_id(), Some("A"));
    }

    #[tokio::test]
    async fn no_banner_is_handled_transparently() {
        let (client_side, mut server_side) = tokio::io::duplex(256);
        tokio::spawn(async move {
            server_side
                .write_all(b"Response: Pong\r\nActionID: A\r\n\r\n")
                .await
                .unwrap();
        });

        let mut reader = FrameReader::new(client_side);
        let msg = reader.read_message().await.unwrap().unwrap();
        assert_eq!(msg.get("Response"), Some("Pong"));
    }

    #[tokio::test]
    async fn clean_eof_with_empty_buffer_is_none() {
        let (client_side, server_side) = tokio::io::duplex(16);
        drop(server_side);
        let mut reader = FrameReader::new(client_side);
        assert!(reader.read_message().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn eof_mid_frame_is_unexpected_eof() {
        let (client_side, mut server_side) = tokio::io::duplex(64);
        server_side.write_all(b"Response: Pong\r\n").await.unwrap();
        drop(server_side);
        let mut reader = FrameReader::new(client_side);
        let err = reader.read_message().await.unwrap_err();
        assert!(matches!(err, ClientError::UnexpectedEof));
    }

    #[tokio::test]
    async fn write_message_flushes_full_bytes() {
        let (mut client_side, mut server_side) = tokio::io::duplex(256);
        let mut writer = FrameWriter::new(&mut client_side);
        let msg = Message::new().with("Action", "Ping").with("ActionID", "A");
        writer.write_message(&msg).await.unwrap();
        drop(writer);
        drop(client_side);

        let mut received = Vec::new();
        server_side.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, msg.encode());
    }
}
