//! VncDriver: the host-facing facade over the protocol engine.
//!
//! The host loop never touches the socket.  It asks the driver for the next
//! input event with a bounded wait, and the driver polls the engine for at
//! most that long.
//!
//! ```text
//! host loop                     VncDriver                 ProtocolEngine
//! ─────────                     ─────────                 ──────────────
//! wait_next_event(frames, t) ─► poll(frames, t) ────────► read / answer viewer
//!                            ◄─ Some(event) | None ◄───── queue
//! button_state(frames)       ─► poll(frames, 0), then read bridge state
//! elapsed_ticks()            ─► Clock, 60 ticks per second
//! ```

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use rfb_core::{FrameSource, InputEvent, Point, PointerState, ProtocolError};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::infrastructure::network::bootstrap::{self, ServerIdentity};
use crate::infrastructure::network::engine::{check_frame_size, EngineOptions, ProtocolEngine};
use crate::infrastructure::network::session::Session;
use crate::infrastructure::network::SessionError;

/// Tick rate of [`VncDriver::elapsed_ticks`].
pub const TICKS_PER_SECOND: u64 = 60;

/// Monotonic time source in microseconds.
#[cfg_attr(test, mockall::automock)]
pub trait Clock {
    fn now_micros(&self) -> u64;
}

/// [`Clock`] backed by [`std::time::Instant`].
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_micros(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_micros()).unwrap_or(u64::MAX)
    }
}

/// Host facade owning the engine and the clock.
#[derive(Debug)]
pub struct VncDriver<S, C = MonotonicClock> {
    engine: ProtocolEngine<S>,
    clock: C,
    start_micros: u64,
}

impl<C: Clock> VncDriver<TcpStream, C> {
    /// Listens on every interface at `port`, accepts one viewer, negotiates,
    /// and absorbs anything the viewer sent right after the handshake.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::FramebufferSizeMismatch`] before anything is bound
    /// if `frames` is not the size `identity` announces.
    pub async fn establish<F>(
        port: u16,
        identity: &ServerIdentity,
        options: EngineOptions,
        frames: &F,
        clock: C,
    ) -> Result<Self, SessionError>
    where
        F: FrameSource + ?Sized,
    {
        check_identity(identity, frames)?;
        let session = bootstrap::establish(port, identity).await?;
        Self::start(session, options, frames, clock).await
    }

    /// Like [`VncDriver::establish`], on an explicit listen address.
    pub async fn establish_on<F>(
        addr: SocketAddr,
        identity: &ServerIdentity,
        options: EngineOptions,
        frames: &F,
        clock: C,
    ) -> Result<Self, SessionError>
    where
        F: FrameSource + ?Sized,
    {
        check_identity(identity, frames)?;
        let session = bootstrap::establish_on(addr, identity).await?;
        Self::start(session, options, frames, clock).await
    }

    async fn start<F>(
        session: Session<TcpStream>,
        options: EngineOptions,
        frames: &F,
        clock: C,
    ) -> Result<Self, SessionError>
    where
        F: FrameSource + ?Sized,
    {
        let engine = ProtocolEngine::start(session, options, frames).await?;
        Ok(Self::new(engine, clock))
    }
}

fn check_identity<F>(identity: &ServerIdentity, frames: &F) -> Result<(), ProtocolError>
where
    F: FrameSource + ?Sized,
{
    let snapshot = frames.snapshot();
    check_frame_size(
        identity.width,
        identity.height,
        snapshot.width(),
        snapshot.height(),
    )
}

impl<S, C> VncDriver<S, C>
where
    S: AsyncRead + AsyncWrite + Unpin,
    C: Clock,
{
    /// The tick counter starts at zero now.
    pub fn new(engine: ProtocolEngine<S>, clock: C) -> Self {
        let start_micros = clock.now_micros();
        Self {
            engine,
            clock,
            start_micros,
        }
    }

    /// Waits up to `timeout` for input and returns the oldest queued event.
    ///
    /// If an event is already queued the wait is skipped, but buffered input
    /// is still processed so framebuffer requests keep getting answered.
    pub async fn wait_next_event<F>(
        &mut self,
        frames: &F,
        timeout: Duration,
    ) -> Result<Option<InputEvent>, SessionError>
    where
        F: FrameSource + ?Sized,
    {
        let timeout = if self.engine.pending_events() > 0 {
            Duration::ZERO
        } else {
            timeout
        };
        self.engine.poll(frames, timeout).await?;
        Ok(self.engine.next_event())
    }

    /// Primary button state after absorbing already-sent input.
    pub async fn button_state<F>(&mut self, frames: &F) -> Result<PointerState, SessionError>
    where
        F: FrameSource + ?Sized,
    {
        self.engine.poll(frames, Duration::ZERO).await?;
        Ok(self.engine.button_state())
    }

    /// Pointer position after absorbing already-sent input.
    pub async fn pointer_position<F>(&mut self, frames: &F) -> Result<Point, SessionError>
    where
        F: FrameSource + ?Sized,
    {
        self.engine.poll(frames, Duration::ZERO).await?;
        Ok(self.engine.pointer_position())
    }

    /// Sixtieths of a second since the driver was created.
    pub fn elapsed_ticks(&self) -> u64 {
        let elapsed = self.clock.now_micros().saturating_sub(self.start_micros);
        elapsed * TICKS_PER_SECOND / 1_000_000
    }

    pub fn engine(&self) -> &ProtocolEngine<S> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut ProtocolEngine<S> {
        &mut self.engine
    }
}
