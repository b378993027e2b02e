//! The single accepted viewer connection.
//!
//! A [`Session`] owns the buffered socket and all per-viewer state.  It is
//! created by the bootstrap, negotiated once, and then handed to the
//! [`ProtocolEngine`](super::engine::ProtocolEngine) for the rest of the
//! process lifetime.

use std::collections::VecDeque;
use std::net::SocketAddr;

use rfb_core::protocol::messages::ClientCutTextMessage;
use rfb_core::{EventBridge, InputEvent, ProtocolError, WireMessage};
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufStream,
};
use tracing::trace;

use super::SessionError;

/// One accepted connection plus the viewer-facing state tied to it.
#[derive(Debug)]
pub struct Session<S> {
    io: BufStream<S>,
    peer: Option<SocketAddr>,
    framebuffer_size: Option<(u16, u16)>,
    bridge: EventBridge,
    events: VecDeque<InputEvent>,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps a freshly accepted stream.  The handshake has not run yet.
    pub fn new(stream: S, peer: Option<SocketAddr>) -> Self {
        Self {
            io: BufStream::new(stream),
            peer,
            framebuffer_size: None,
            bridge: EventBridge::new(),
            events: VecDeque::new(),
        }
    }

    /// Address of the viewer, when the transport has one.
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Whether the handshake completed on this connection.
    pub fn is_negotiated(&self) -> bool {
        self.framebuffer_size.is_some()
    }

    /// Width and height announced in `ServerInit`, once negotiated.
    pub fn framebuffer_size(&self) -> Option<(u16, u16)> {
        self.framebuffer_size
    }

    pub(crate) fn mark_negotiated(&mut self, width: u16, height: u16) {
        self.framebuffer_size = Some((width, height));
    }

    pub fn bridge(&self) -> &EventBridge {
        &self.bridge
    }

    pub fn bridge_mut(&mut self) -> &mut EventBridge {
        &mut self.bridge
    }

    /// Appends an event to the back of the queue.
    pub fn push_event(&mut self, event: InputEvent) {
        self.events.push_back(event);
    }

    /// Removes the oldest queued event.
    pub fn pop_event(&mut self) -> Option<InputEvent> {
        self.events.pop_front()
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    // ── Reading ──────────────────────────────────────────────────────────────

    /// Waits until at least one byte is buffered or the peer hangs up.
    ///
    /// Returns the number of buffered bytes; `0` means end of stream.  This
    /// is cancel safe, so it may be raced against a deadline.
    pub async fn wait_readable(&mut self) -> std::io::Result<usize> {
        let buffered = self.io.fill_buf().await?;
        Ok(buffered.len())
    }

    /// Reads one byte, the message-type tag.
    pub async fn read_tag(&mut self) -> Result<u8, SessionError> {
        Ok(self.io.read_u8().await?)
    }

    /// Reads one complete record: its fixed prefix, then the tail the prefix
    /// declares.
    pub async fn read_record<M: WireMessage>(&mut self) -> Result<M, SessionError> {
        let mut buf = vec![0u8; M::FIXED_LEN];
        self.io.read_exact(&mut buf).await?;
        let tail = M::trailing_len(&buf)?;
        if tail > 0 {
            buf.resize(M::FIXED_LEN + tail, 0);
            self.io.read_exact(&mut buf[M::FIXED_LEN..]).await?;
        }
        trace!(len = buf.len(), "record read");
        Ok(M::decode(&buf)?)
    }

    /// Reads a ClientCutText body and throws the text away.
    ///
    /// The declared length is checked against `limit` before any of the text
    /// is consumed.  Returns the number of bytes discarded.
    pub async fn skip_cut_text(&mut self, limit: usize) -> Result<usize, SessionError> {
        let mut prefix = [0u8; ClientCutTextMessage::FIXED_LEN];
        self.io.read_exact(&mut prefix).await?;
        let declared = ClientCutTextMessage::trailing_len(&prefix)?;
        if declared > limit {
            return Err(ProtocolError::LengthLimitExceeded {
                field: "ClientCutText.length",
                declared,
                limit,
            }
            .into());
        }

        let mut body = (&mut self.io).take(declared as u64);
        let skipped = tokio::io::copy(&mut body, &mut tokio::io::sink()).await?;
        if skipped < declared as u64 {
            return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
        }
        trace!(skipped, "client cut text discarded");
        Ok(declared)
    }

    // ── Writing ──────────────────────────────────────────────────────────────

    /// Buffers a record for sending.
    pub async fn write_record<M: WireMessage>(&mut self, msg: &M) -> Result<(), SessionError> {
        let mut buf = Vec::with_capacity(M::FIXED_LEN);
        msg.encode(&mut buf);
        self.write_bytes(&buf).await
    }

    /// Buffers raw bytes for sending.
    pub async fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), SessionError> {
        self.io.write_all(bytes).await?;
        Ok(())
    }

    /// Pushes all buffered output to the socket.
    pub async fn flush(&mut self) -> Result<(), SessionError> {
        self.io.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rfb_core::protocol::messages::{KeyEventMessage, SetEncodingsMessage};
    use rfb_core::{encode_to_vec, HostKey};
    use tokio::io::duplex;

    #[tokio::test]
    async fn test_read_record_reads_prefix_then_declared_tail() {
        // Arrange
        let (mut viewer, server) = duplex(256);
        let mut session = Session::new(server, None);
        let msg = SetEncodingsMessage {
            encodings: vec![0, 1, -239],
        };
        viewer.write_all(&encode_to_vec(&msg)).await.unwrap();

        // Act
        let decoded: SetEncodingsMessage = session.read_record().await.unwrap();

        // Assert
        assert_eq!(decoded, msg);
    }

    #[tokio::test]
    async fn test_read_record_on_closed_stream_is_closed_error() {
        let (viewer, server) = duplex(64);
        drop(viewer);
        let mut session = Session::new(server, None);

        let err = session.read_record::<KeyEventMessage>().await.unwrap_err();

        assert!(matches!(
            err,
            SessionError::Connection(super::super::ConnectionError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_skip_cut_text_consumes_exactly_declared_bytes() {
        // Arrange: a 5-byte body followed by the first byte of the next message
        let (mut viewer, server) = duplex(64);
        let mut session = Session::new(server, None);
        viewer
            .write_all(&[0, 0, 0, 0, 0, 0, 5, b'h', b'e', b'l', b'l', b'o', 0x42])
            .await
            .unwrap();

        // Act
        let skipped = session.skip_cut_text(1024).await.unwrap();
        let next = session.read_tag().await.unwrap();

        // Assert
        assert_eq!(skipped, 5);
        assert_eq!(next, 0x42);
    }

    #[tokio::test]
    async fn test_skip_cut_text_rejects_length_above_limit() {
        let (mut viewer, server) = duplex(64);
        let mut session = Session::new(server, None);
        viewer.write_all(&[0, 0, 0, 0, 0, 1, 0]).await.unwrap();

        let err = session.skip_cut_text(255).await.unwrap_err();

        assert_eq!(
            err.as_protocol(),
            Some(&ProtocolError::LengthLimitExceeded {
                field: "ClientCutText.length",
                declared: 256,
                limit: 255,
            })
        );
    }

    #[tokio::test]
    async fn test_new_session_keeps_peer_and_is_not_negotiated() {
        let (_viewer, server) = duplex(64);
        let peer: SocketAddr = "127.0.0.1:5900".parse().unwrap();

        let mut session = Session::new(server, Some(peer));

        assert_eq!(session.peer(), Some(peer));
        assert!(!session.is_negotiated());
        session.mark_negotiated(640, 480);
        assert!(session.is_negotiated());
        assert_eq!(session.framebuffer_size(), Some((640, 480)));
    }

    #[tokio::test]
    async fn test_event_queue_is_fifo() {
        let (_viewer, server) = duplex(8);
        let mut session = Session::new(server, None);
        session.push_event(InputEvent::KeyDown(HostKey::A));
        session.push_event(InputEvent::KeyUp(HostKey::A));

        assert_eq!(session.pending_events(), 2);
        assert_eq!(session.pop_event(), Some(InputEvent::KeyDown(HostKey::A)));
        assert_eq!(session.pop_event(), Some(InputEvent::KeyUp(HostKey::A)));
        assert_eq!(session.pop_event(), None);
    }

    #[tokio::test]
    async fn test_write_is_buffered_until_flush() {
        // Arrange
        let (mut viewer, server) = duplex(64);
        let mut session = Session::new(server, None);

        // Act
        session.write_bytes(&[1, 2, 3]).await.unwrap();
        session.flush().await.unwrap();
        let mut got = [0u8; 3];
        viewer.read_exact(&mut got).await.unwrap();

        // Assert
        assert_eq!(got, [1, 2, 3]);
    }
}
