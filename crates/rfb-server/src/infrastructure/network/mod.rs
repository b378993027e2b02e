//! Network infrastructure for the RFB server.
//!
//! # Sub-modules
//!
//! - **`bootstrap`** – Binds the listening socket, accepts the single viewer
//!   and runs the RFB 3.8 handshake up to and including `ServerInit`.
//!
//! - **`session`** – The accepted connection: buffered socket, pointer and
//!   key state, and the FIFO queue of translated input events.
//!
//! - **`engine`** – The request/response state machine.  Each bounded
//!   `poll` drains the socket, answers framebuffer requests, and enqueues
//!   input events for the host.
//!
//! # Errors
//!
//! Transport problems are [`ConnectionError`]s, wire-level problems are
//! [`rfb_core::ProtocolError`]s, and both are carried by [`SessionError`].
//! Every one of them is fatal: there is no reconnection.

pub mod bootstrap;
pub mod engine;
pub mod session;

use std::io;
use std::net::SocketAddr;

use rfb_core::ProtocolError;
use thiserror::Error;

/// Transport-level failures.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Creating, binding or listening on the server socket failed.
    #[error("bind failed on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// Accepting the viewer's connection failed.
    #[error("accept failed: {0}")]
    Accept(#[source] io::Error),

    /// A socket option (`SO_REUSEADDR`, `TCP_NODELAY`) could not be set.
    #[error("failed to configure socket: {0}")]
    Configure(#[source] io::Error),

    /// Sending or receiving failed.
    #[error("connection I/O error: {0}")]
    Io(#[from] io::Error),

    /// The viewer closed the connection.
    #[error("connection closed by viewer")]
    Closed,

    /// An earlier error already ended this session.
    #[error("session already terminated by an earlier error")]
    SessionTerminated,
}

/// Any error that ends a session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl From<io::Error> for SessionError {
    fn from(e: io::Error) -> Self {
        // `read_exact` reports a peer that hung up mid-record as UnexpectedEof.
        if e.kind() == io::ErrorKind::UnexpectedEof {
            SessionError::Connection(ConnectionError::Closed)
        } else {
            SessionError::Connection(ConnectionError::Io(e))
        }
    }
}

impl SessionError {
    /// The wire-level cause, if this error came from the protocol layer.
    pub fn as_protocol(&self) -> Option<&ProtocolError> {
        match self {
            SessionError::Protocol(e) => Some(e),
            SessionError::Connection(_) => None,
        }
    }
}
