//! The protocol engine: a bounded, cooperative request/response loop.
//!
//! # States
//!
//! ```text
//!            poll()                 byte available
//!   ┌─────────────────► WAITING ─────────────────────► DISPATCHING
//!   │                     ▲                               │
//!   │                     └──── reply flushed ────────────┘
//!   │
//!   └── any error ───► FAILED  (every later call: SessionTerminated)
//! ```
//!
//! `poll` waits for input until its deadline, then handles one whole message
//! at a time.  It returns as soon as an input event is queued or the
//! deadline has passed.  The only suspension point that is raced against the
//! deadline is "wait until readable"; once a message has started it is read,
//! dispatched and answered to completion.
//!
//! # Frame-sent flag
//!
//! A viewer sends a `FramebufferUpdateRequest` after every update it
//! receives.  Only the first request in a refresh cycle gets the whole frame;
//! later ones get an empty update.  [`UpdatePolicy`] decides what a cycle is.

use std::time::Duration;

use rfb_core::protocol::messages::{
    ClientMessageType, FramebufferUpdateMessage, FramebufferUpdateRequestMessage,
    KeyEventMessage, PointerEventMessage, RectangleHeader, ServerCutTextMessage,
    ServerMessageType, SetEncodingsMessage, SetPixelFormatMessage,
};
use rfb_core::{
    encode_raw, FrameSource, InputEvent, Point, PointerState, ProtocolError, WireMessage,
};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, trace};

use super::session::Session;
use super::{ConnectionError, SessionError};

/// Default cap on the length a viewer may declare for ClientCutText.
pub const DEFAULT_MAX_CUT_TEXT_LEN: usize = 1024 * 1024;

/// Stand-in deadline for timeouts too large to add to `Instant::now()`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// When the "full frame already sent" flag is cleared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdatePolicy {
    /// Cleared at the start of every `poll`.
    #[default]
    PerPoll,
    /// Cleared only by [`ProtocolEngine::mark_repainted`].
    UntilRepaint,
}

/// Engine tunables, usually filled from the `[session]` config section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    pub update_policy: UpdatePolicy,
    pub max_cut_text_len: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            update_policy: UpdatePolicy::default(),
            max_cut_text_len: DEFAULT_MAX_CUT_TEXT_LEN,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Waiting,
    Dispatching,
    Failed,
}

/// Owns the negotiated session and answers the viewer.
#[derive(Debug)]
pub struct ProtocolEngine<S> {
    session: Session<S>,
    state: EngineState,
    options: EngineOptions,
    frame_sent: bool,
}

impl<S> ProtocolEngine<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(session: Session<S>, options: EngineOptions) -> Self {
        Self {
            session,
            state: EngineState::Waiting,
            options,
            frame_sent: false,
        }
    }

    /// Wraps a negotiated session and absorbs whatever the viewer already
    /// sent with one zero-timeout poll.
    pub async fn start<F>(
        session: Session<S>,
        options: EngineOptions,
        frames: &F,
    ) -> Result<Self, SessionError>
    where
        F: FrameSource + ?Sized,
    {
        let mut engine = Self::new(session, options);
        engine.poll(frames, Duration::ZERO).await?;
        Ok(engine)
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn session(&self) -> &Session<S> {
        &self.session
    }

    /// Processes viewer messages until an input event is queued or `timeout`
    /// has elapsed.
    ///
    /// Returns whether at least one event is waiting in the queue.  A zero
    /// timeout still handles input that is already buffered.
    ///
    /// # Errors
    ///
    /// Any error is fatal: the engine moves to [`EngineState::Failed`] and
    /// every later call returns [`ConnectionError::SessionTerminated`]
    /// without touching the socket.
    pub async fn poll<F>(&mut self, frames: &F, timeout: Duration) -> Result<bool, SessionError>
    where
        F: FrameSource + ?Sized,
    {
        self.ensure_live()?;
        let result = self.poll_until(frames, deadline_after(timeout)).await;
        self.settle(result)
    }

    async fn poll_until<F>(&mut self, frames: &F, deadline: Instant) -> Result<bool, SessionError>
    where
        F: FrameSource + ?Sized,
    {
        if self.options.update_policy == UpdatePolicy::PerPoll {
            self.frame_sent = false;
        }

        loop {
            self.state = EngineState::Waiting;
            match timeout_at(deadline, self.session.wait_readable()).await {
                Ok(Ok(0)) => return Err(ConnectionError::Closed.into()),
                Ok(Ok(_)) => {
                    self.state = EngineState::Dispatching;
                    self.dispatch(frames).await?;
                    self.session.flush().await?;
                }
                Ok(Err(e)) => return Err(e.into()),
                Err(_elapsed) => {}
            }

            if self.session.pending_events() > 0 || Instant::now() >= deadline {
                break;
            }
        }

        self.state = EngineState::Waiting;
        Ok(self.session.pending_events() > 0)
    }

    /// Reads one message-type tag and handles the message that follows.
    async fn dispatch<F>(&mut self, frames: &F) -> Result<(), SessionError>
    where
        F: FrameSource + ?Sized,
    {
        let tag = self.session.read_tag().await?;
        let kind = ClientMessageType::try_from(tag)
            .map_err(|()| ProtocolError::UnknownMessageType(tag))?;
        debug!(?kind, "client message");

        match kind {
            ClientMessageType::SetPixelFormat => {
                let _: SetPixelFormatMessage = self.session.read_record().await?;
            }
            ClientMessageType::SetEncodings => {
                let msg: SetEncodingsMessage = self.session.read_record().await?;
                trace!(count = msg.encodings.len(), "encodings ignored, RAW only");
            }
            ClientMessageType::FramebufferUpdateRequest => {
                let _: FramebufferUpdateRequestMessage = self.session.read_record().await?;
                self.send_update(frames).await?;
            }
            ClientMessageType::KeyEvent => {
                let msg: KeyEventMessage = self.session.read_record().await?;
                let event = self.session.bridge().key_event(&msg)?;
                self.session.push_event(event);
            }
            ClientMessageType::PointerEvent => {
                let msg: PointerEventMessage = self.session.read_record().await?;
                if let Some(event) = self.session.bridge_mut().pointer_event(&msg) {
                    self.session.push_event(event);
                }
            }
            ClientMessageType::ClientCutText => {
                self.session
                    .skip_cut_text(self.options.max_cut_text_len)
                    .await?;
            }
        }
        Ok(())
    }

    /// Answers a FramebufferUpdateRequest.  `incremental` is not consulted.
    async fn send_update<F>(&mut self, frames: &F) -> Result<(), SessionError>
    where
        F: FrameSource + ?Sized,
    {
        let mut header = vec![ServerMessageType::FramebufferUpdate as u8];
        if self.frame_sent {
            FramebufferUpdateMessage { rect_count: 0 }.encode(&mut header);
            trace!("frame already sent this cycle, empty update");
            return self.session.write_bytes(&header).await;
        }

        let snapshot = frames.snapshot();
        if let Some((width, height)) = self.session.framebuffer_size() {
            check_frame_size(width, height, snapshot.width(), snapshot.height())?;
        }
        FramebufferUpdateMessage { rect_count: 1 }.encode(&mut header);
        RectangleHeader::full_frame(snapshot.width(), snapshot.height()).encode(&mut header);
        let pixels = encode_raw(&snapshot);
        trace!(
            width = snapshot.width(),
            height = snapshot.height(),
            bytes = pixels.len(),
            "full frame"
        );
        self.session.write_bytes(&header).await?;
        self.session.write_bytes(&pixels).await?;
        self.frame_sent = true;
        Ok(())
    }

    // ── Queue and input state ────────────────────────────────────────────────

    /// Takes the oldest queued event.
    pub fn next_event(&mut self) -> Option<InputEvent> {
        self.session.pop_event()
    }

    pub fn pending_events(&self) -> usize {
        self.session.pending_events()
    }

    /// Primary button state as of the last processed PointerEvent.
    pub fn button_state(&self) -> PointerState {
        self.session.bridge().pointer_state()
    }

    /// Pointer position as of the last processed PointerEvent.
    pub fn pointer_position(&self) -> Point {
        self.session.bridge().position()
    }

    /// Starts a new refresh cycle under [`UpdatePolicy::UntilRepaint`].
    pub fn mark_repainted(&mut self) {
        self.frame_sent = false;
    }

    // ── Unsolicited server messages ──────────────────────────────────────────

    /// Sends a Bell message.
    pub async fn ring_bell(&mut self) -> Result<(), SessionError> {
        self.send_now(&[ServerMessageType::Bell as u8]).await
    }

    /// Pushes clipboard text to the viewer.
    pub async fn send_cut_text(&mut self, text: &[u8]) -> Result<(), SessionError> {
        let mut buf = vec![ServerMessageType::ServerCutText as u8];
        ServerCutTextMessage {
            text: text.to_vec(),
        }
        .encode(&mut buf);
        self.send_now(&buf).await
    }

    async fn send_now(&mut self, bytes: &[u8]) -> Result<(), SessionError> {
        self.ensure_live()?;
        let result = async {
            self.session.write_bytes(bytes).await?;
            self.session.flush().await
        }
        .await;
        self.settle(result)
    }

    // ── Failure handling ─────────────────────────────────────────────────────

    fn ensure_live(&self) -> Result<(), SessionError> {
        if self.state == EngineState::Failed {
            return Err(ConnectionError::SessionTerminated.into());
        }
        Ok(())
    }

    fn settle<T>(&mut self, result: Result<T, SessionError>) -> Result<T, SessionError> {
        if let Err(e) = &result {
            error!(peer = ?self.session.peer(), "session failed: {e}");
            self.state = EngineState::Failed;
        }
        result
    }
}

/// Fails when a frame is not the size announced to the viewer.
pub(crate) fn check_frame_size(
    width: u16,
    height: u16,
    actual_width: u16,
    actual_height: u16,
) -> Result<(), ProtocolError> {
    if (width, height) != (actual_width, actual_height) {
        return Err(ProtocolError::FramebufferSizeMismatch {
            width,
            height,
            actual_width,
            actual_height,
        });
    }
    Ok(())
}

fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout).unwrap_or(now + FAR_FUTURE)
}
