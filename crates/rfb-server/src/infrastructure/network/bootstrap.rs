//! Connection bootstrap: listen, accept one viewer, run the handshake.
//!
//! # Handshake (RFB 3.8, security type None)
//!
//! ```text
//! Server                               Viewer
//! ──────                               ──────
//! ProtocolVersion "RFB 003.008\n"  ──►
//!                                  ◄── ProtocolVersion (must match exactly)
//! SecurityList [1, None]           ──►
//!                                  ◄── SecurityChoice (must be None)
//! SecurityResult 0                 ──►
//!                                  ◄── ClientInit (shared flag, ignored)
//! ServerInit (size, format, name)  ──►
//! ```
//!
//! Any deviation is a fatal [`ProtocolError`] and no `ServerInit` is sent.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use rfb_core::protocol::messages::{
    ClientInitMessage, PixelFormat, ProtocolVersionMessage, SecurityChoiceMessage,
    SecurityListMessage, SecurityResultMessage, ServerInitMessage, PROTOCOL_VERSION,
    SECURITY_RESULT_OK, SECURITY_TYPE_NONE,
};
use rfb_core::ProtocolError;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tracing::{debug, info, warn};

use super::session::Session;
use super::{ConnectionError, SessionError};

/// Pending-connection queue length of the listening socket.
pub const LISTEN_BACKLOG: u32 = 5;

/// Desktop name sent in `ServerInit` unless configured otherwise.
pub const DEFAULT_DESKTOP_NAME: &str = "Antares";

/// What the server announces about itself in `ServerInit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerIdentity {
    pub width: u16,
    pub height: u16,
    pub name: String,
}

impl ServerIdentity {
    pub fn new(width: u16, height: u16, name: impl Into<String>) -> Self {
        Self {
            width,
            height,
            name: name.into(),
        }
    }

    fn server_init(&self) -> ServerInitMessage {
        ServerInitMessage {
            width: self.width,
            height: self.height,
            format: PixelFormat::server_default(),
            name: self.name.as_bytes().to_vec(),
        }
    }
}

impl Default for ServerIdentity {
    fn default() -> Self {
        Self::new(640, 480, DEFAULT_DESKTOP_NAME)
    }
}

/// A bound listening socket waiting for its single viewer.
#[derive(Debug)]
pub struct RfbListener {
    listener: TcpListener,
}

impl RfbListener {
    /// Binds `addr` with `SO_REUSEADDR` and starts listening.
    ///
    /// Port 0 picks a free port; see [`RfbListener::local_addr`].
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Bind`] if the socket cannot be created,
    /// bound or put into listening mode.
    pub fn bind(addr: SocketAddr) -> Result<Self, ConnectionError> {
        let bind_err = |source| ConnectionError::Bind { addr, source };

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(bind_err)?;
        socket
            .set_reuseaddr(true)
            .map_err(ConnectionError::Configure)?;
        socket.bind(addr).map_err(bind_err)?;
        let listener = socket.listen(LISTEN_BACKLOG).map_err(bind_err)?;

        info!("listening for a viewer on {addr}");
        Ok(Self { listener })
    }

    /// The address actually bound.
    pub fn local_addr(&self) -> Result<SocketAddr, ConnectionError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts one viewer, sets `TCP_NODELAY`, and negotiates the session.
    pub async fn accept_session(
        &self,
        identity: &ServerIdentity,
    ) -> Result<Session<TcpStream>, SessionError> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(ConnectionError::Accept)?;
        stream
            .set_nodelay(true)
            .map_err(ConnectionError::Configure)?;
        info!("viewer connected from {peer}");

        let mut session = Session::new(stream, Some(peer));
        negotiate(&mut session, identity).await?;
        Ok(session)
    }
}

/// Listens on every interface at `port`, accepts exactly one viewer and
/// negotiates it.
pub async fn establish(
    port: u16,
    identity: &ServerIdentity,
) -> Result<Session<TcpStream>, SessionError> {
    establish_on(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port), identity).await
}

/// Like [`establish`], on an explicit listen address.
pub async fn establish_on(
    addr: SocketAddr,
    identity: &ServerIdentity,
) -> Result<Session<TcpStream>, SessionError> {
    RfbListener::bind(addr)?.accept_session(identity).await
}

/// Runs the server side of the RFB 3.8 handshake on `session`.
///
/// Each server step is flushed before the viewer's answer is read.
///
/// # Errors
///
/// - [`ProtocolError::VersionMismatch`] if the viewer's 12 bytes differ from
///   `"RFB 003.008\n"`.
/// - [`ProtocolError::SecurityRejected`] if the viewer picks anything but None.
/// - [`ConnectionError`] for any transport failure.
pub async fn negotiate<S>(
    session: &mut Session<S>,
    identity: &ServerIdentity,
) -> Result<(), SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    // 1. Version
    session
        .write_record(&ProtocolVersionMessage::default())
        .await?;
    session.flush().await?;
    let theirs: ProtocolVersionMessage = session.read_record().await?;
    if theirs.version != PROTOCOL_VERSION {
        let received = String::from_utf8_lossy(&theirs.version).into_owned();
        warn!("viewer sent unsupported version {received:?}");
        return Err(ProtocolError::VersionMismatch { received }.into());
    }
    debug!("protocol version agreed");

    // 2. Security
    session
        .write_record(&SecurityListMessage {
            types: vec![SECURITY_TYPE_NONE],
        })
        .await?;
    session.flush().await?;
    let choice: SecurityChoiceMessage = session.read_record().await?;
    if choice.security_type != SECURITY_TYPE_NONE {
        warn!("viewer chose security type {}", choice.security_type);
        return Err(ProtocolError::SecurityRejected(choice.security_type).into());
    }
    session
        .write_record(&SecurityResultMessage {
            status: SECURITY_RESULT_OK,
        })
        .await?;
    session.flush().await?;

    // 3. Initialisation
    let _init: ClientInitMessage = session.read_record().await?;
    session.write_record(&identity.server_init()).await?;
    session.flush().await?;

    session.mark_negotiated(identity.width, identity.height);
    info!(
        "handshake complete: {}x{} desktop {:?}",
        identity.width, identity.height, identity.name
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rfb_core::encode_to_vec;
    use tokio_test::io::Builder;

    fn server_init_bytes(identity: &ServerIdentity) -> Vec<u8> {
        encode_to_vec(&identity.server_init())
    }

    #[test]
    fn test_default_identity_is_antares_vga() {
        let id = ServerIdentity::default();
        assert_eq!((id.width, id.height), (640, 480));
        assert_eq!(id.name, "Antares");
    }

    #[test]
    fn test_server_init_carries_name_and_fixed_format() {
        let bytes = server_init_bytes(&ServerIdentity::new(2, 1, "ab"));
        assert_eq!(
            bytes,
            [
                0, 2, 0, 1, // width, height
                32, 24, 1, 1, 0, 255, 0, 255, 0, 255, 8, 16, 24, 0, 0, 0, // format
                0, 0, 0, 2, b'a', b'b', // name
            ]
        );
    }

    #[tokio::test]
    async fn test_negotiate_happy_path_exact_bytes() {
        // Arrange: the full scripted conversation
        let identity = ServerIdentity::new(4, 3, "t");
        let mock = Builder::new()
            .write(b"RFB 003.008\n")
            .read(b"RFB 003.008\n")
            .write(&[1, 1])
            .read(&[1])
            .write(&[0, 0, 0, 0])
            .read(&[1])
            .write(&server_init_bytes(&identity))
            .build();
        let mut session = Session::new(mock, None);

        // Act
        let result = negotiate(&mut session, &identity).await;

        // Assert
        assert!(result.is_ok(), "handshake failed: {result:?}");
        assert!(session.is_negotiated());
    }

    #[tokio::test]
    async fn test_negotiate_records_announced_size() {
        let identity = ServerIdentity::new(4, 3, "t");
        let mock = Builder::new()
            .write(b"RFB 003.008\n")
            .read(b"RFB 003.008\n")
            .write(&[1, 1])
            .read(&[1])
            .write(&[0, 0, 0, 0])
            .read(&[0])
            .write(&server_init_bytes(&identity))
            .build();
        let mut session = Session::new(mock, None);
        assert_eq!(session.framebuffer_size(), None);

        negotiate(&mut session, &identity).await.unwrap();

        assert_eq!(session.framebuffer_size(), Some((4, 3)));
    }

    #[tokio::test]
    async fn test_negotiate_rejects_older_version_before_security() {
        // Arrange: viewer answers with 3.3; nothing else may be written
        let mock = Builder::new()
            .write(b"RFB 003.008\n")
            .read(b"RFB 003.003\n")
            .build();
        let mut session = Session::new(mock, None);

        // Act
        let err = negotiate(&mut session, &ServerIdentity::default())
            .await
            .unwrap_err();

        // Assert
        assert_eq!(
            err.as_protocol(),
            Some(&ProtocolError::VersionMismatch {
                received: "RFB 003.003\n".to_string()
            })
        );
        assert!(!session.is_negotiated());
    }

    #[tokio::test]
    async fn test_negotiate_rejects_vnc_authentication_choice() {
        let mock = Builder::new()
            .write(b"RFB 003.008\n")
            .read(b"RFB 003.008\n")
            .write(&[1, 1])
            .read(&[2])
            .build();
        let mut session = Session::new(mock, None);

        let err = negotiate(&mut session, &ServerIdentity::default())
            .await
            .unwrap_err();

        assert_eq!(err.as_protocol(), Some(&ProtocolError::SecurityRejected(2)));
    }

    #[tokio::test]
    async fn test_bind_port_zero_reports_chosen_port() {
        let listener = RfbListener::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
        assert!(addr.ip().is_loopback());
    }
}
