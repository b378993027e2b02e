//! Integration tests for the protocol engine.
//!
//! # Purpose
//!
//! These tests drive a [`ProtocolEngine`] through its *public* API with an
//! in-memory `tokio::io::duplex` pipe standing in for the viewer's socket.
//! The test plays the viewer: it writes client messages, calls `poll`, and
//! reads back exactly what the server sent.  They verify:
//!
//! - Framebuffer requests: one full frame per cycle, empty updates after.
//! - Pointer and key translation into queued input events.
//! - ClientCutText bodies are skipped byte-exactly.
//! - Fatal errors: unknown keys, unknown message types, oversized text.

use std::time::Duration;

use rfb_core::protocol::messages::{
    FramebufferUpdateRequestMessage, KeyEventMessage, PointerEventMessage, SetEncodingsMessage,
    SetPixelFormatMessage, PixelFormat,
};
use rfb_core::{encode_to_vec, Canvas, HostKey, InputEvent, Point, ProtocolError, Rgb, Transition};
use rfb_server::infrastructure::network::engine::{EngineOptions, EngineState, ProtocolEngine};
use rfb_server::infrastructure::network::session::Session;
use rfb_server::infrastructure::network::{ConnectionError, SessionError};
use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};

/// Long enough for every buffered message to be handled, short enough to
/// keep the suite fast.
const SHORT: Duration = Duration::from_millis(50);

fn setup(options: EngineOptions) -> (DuplexStream, ProtocolEngine<DuplexStream>) {
    let (viewer, server) = duplex(1 << 20);
    (viewer, ProtocolEngine::new(Session::new(server, None), options))
}

fn tagged(tag: u8, body: Vec<u8>) -> Vec<u8> {
    let mut bytes = vec![tag];
    bytes.extend(body);
    bytes
}

fn update_request() -> Vec<u8> {
    tagged(
        3,
        encode_to_vec(&FramebufferUpdateRequestMessage {
            incremental: false,
            x: 0,
            y: 0,
            width: 2,
            height: 2,
        }),
    )
}

fn key(down: bool, keysym: u32) -> Vec<u8> {
    tagged(4, encode_to_vec(&KeyEventMessage { down, keysym }))
}

fn pointer(button_mask: u8, x: u16, y: u16) -> Vec<u8> {
    tagged(5, encode_to_vec(&PointerEventMessage { button_mask, x, y }))
}

/// A 2×2 canvas with four distinct pixels.
fn canvas() -> Canvas {
    let mut c = Canvas::new(2, 2);
    c.set_pixel(0, 0, Rgb::new(100, 0, 0));
    c.set_pixel(1, 0, Rgb::new(0, 100, 0));
    c.set_pixel(0, 1, Rgb::new(0, 0, 100));
    c.set_pixel(1, 1, Rgb::new(100, 100, 100));
    c
}

// ── Framebuffer updates ───────────────────────────────────────────────────────

/// Two requests handled by the same poll: the first gets one RAW rectangle
/// with the whole frame, the second an update with zero rectangles.
#[tokio::test]
async fn test_two_requests_in_one_poll_send_full_then_empty() {
    // Arrange
    let (mut viewer, mut engine) = setup(EngineOptions::default());
    let frame = canvas();
    let mut burst = update_request();
    burst.extend(update_request());
    viewer.write_all(&burst).await.unwrap();

    // Act
    let pending = engine.poll(&frame, SHORT).await.unwrap();

    // Assert
    assert!(!pending);
    let mut full = vec![0u8; 4 + 12 + 16];
    viewer.read_exact(&mut full).await.unwrap();
    assert_eq!(&full[..4], &[0, 0, 0, 1], "type, pad, rect count 1");
    assert_eq!(
        &full[4..16],
        &[0, 0, 0, 0, 0, 2, 0, 2, 0, 0, 0, 0],
        "x, y, w, h, RAW"
    );
    assert_eq!(
        &full[16..],
        &[0, 100, 0, 0, 0, 0, 100, 0, 0, 0, 0, 100, 0, 100, 100, 100]
    );

    let mut empty = [0u8; 4];
    viewer.read_exact(&mut empty).await.unwrap();
    assert_eq!(empty, [0, 0, 0, 0], "type, pad, rect count 0");
}

/// Under the default per-poll policy the next poll sends the frame again.
#[tokio::test]
async fn test_next_poll_starts_a_new_cycle() {
    let (mut viewer, mut engine) = setup(EngineOptions::default());
    let frame = canvas();

    viewer.write_all(&update_request()).await.unwrap();
    engine.poll(&frame, Duration::ZERO).await.unwrap();
    viewer.write_all(&update_request()).await.unwrap();
    engine.poll(&frame, Duration::ZERO).await.unwrap();

    let mut both = vec![0u8; 2 * (4 + 12 + 16)];
    viewer.read_exact(&mut both).await.unwrap();
    assert_eq!(&both[..4], &[0, 0, 0, 1]);
    assert_eq!(&both[32..36], &[0, 0, 0, 1]);
}

/// A transition frame is blended per channel with the padding byte zeroed.
#[tokio::test]
async fn test_transition_frame_is_blended() {
    // Arrange: every pixel is (100, 100, 100), halfway to (200, 200, 200)
    let (mut viewer, mut engine) = setup(EngineOptions::default());
    let mut frame = Canvas::new(2, 2);
    frame.fill(Rgb::new(100, 100, 100));
    frame.set_transition(Some(Transition::new(0.5, Rgb::new(200, 200, 200))));
    viewer.write_all(&update_request()).await.unwrap();

    // Act
    engine.poll(&frame, Duration::ZERO).await.unwrap();

    // Assert
    let mut full = vec![0u8; 32];
    viewer.read_exact(&mut full).await.unwrap();
    for px in full[16..].chunks(4) {
        assert_eq!(px, &[0, 150, 150, 150]);
    }
}

/// SetPixelFormat and SetEncodings are read completely and produce nothing.
#[tokio::test]
async fn test_format_and_encodings_are_consumed_silently() {
    // Arrange
    let (mut viewer, mut engine) = setup(EngineOptions::default());
    let mut burst = tagged(
        0,
        encode_to_vec(&SetPixelFormatMessage {
            format: PixelFormat::server_default(),
        }),
    );
    burst.extend(tagged(
        2,
        encode_to_vec(&SetEncodingsMessage {
            encodings: vec![5, 16, 0],
        }),
    ));
    burst.extend(key(true, 'a' as u32));
    viewer.write_all(&burst).await.unwrap();

    // Act
    let pending = engine.poll(&canvas(), SHORT).await.unwrap();

    // Assert: the key after them was parsed from the right offset
    assert!(pending);
    assert_eq!(engine.next_event(), Some(InputEvent::KeyDown(HostKey::A)));
}

// ── Input translation ─────────────────────────────────────────────────────────

/// Mask 0→1→1→0: mouse-down at the second message's position, nothing for
/// the repeat (position still tracked), mouse-up at the last position.
#[tokio::test]
async fn test_pointer_press_hold_release() {
    // Arrange
    let (mut viewer, mut engine) = setup(EngineOptions::default());
    let frame = canvas();
    let mut burst = pointer(0, 1, 1);
    burst.extend(pointer(1, 10, 20));
    burst.extend(pointer(1, 30, 40));
    burst.extend(pointer(0, 50, 60));
    viewer.write_all(&burst).await.unwrap();

    // Act: the first poll stops at the mouse-down
    engine.poll(&frame, SHORT).await.unwrap();
    let down = engine.next_event();
    engine.poll(&frame, SHORT).await.unwrap();
    let up = engine.next_event();

    // Assert
    assert_eq!(
        down,
        Some(InputEvent::MouseDown {
            button: 0,
            at: Point::new(10, 20)
        })
    );
    assert_eq!(
        up,
        Some(InputEvent::MouseUp {
            button: 0,
            at: Point::new(50, 60)
        })
    );
    assert_eq!(engine.pointer_position(), Point::new(50, 60));
    assert_eq!(engine.next_event(), None);
}

#[tokio::test]
async fn test_key_down_and_up_are_queued_in_order() {
    let (mut viewer, mut engine) = setup(EngineOptions::default());
    let mut burst = key(true, 0xFF51);
    burst.extend(key(false, 0xFF51));
    viewer.write_all(&burst).await.unwrap();

    engine.poll(&canvas(), SHORT).await.unwrap();
    engine.poll(&canvas(), SHORT).await.unwrap();

    assert_eq!(engine.next_event(), Some(InputEvent::KeyDown(HostKey::LeftArrow)));
    assert_eq!(engine.next_event(), Some(InputEvent::KeyUp(HostKey::LeftArrow)));
}

/// ClientCutText with length 5 consumes exactly 5 body bytes and queues
/// nothing; the message after it is parsed normally.
#[tokio::test]
async fn test_client_cut_text_is_skipped_exactly() {
    // Arrange
    let (mut viewer, mut engine) = setup(EngineOptions::default());
    let mut burst = vec![6, 0, 0, 0, 0, 0, 0, 5];
    burst.extend_from_slice(b"hello");
    viewer.write_all(&burst).await.unwrap();

    // Act
    let pending = engine.poll(&canvas(), Duration::ZERO).await.unwrap();

    // Assert
    assert!(!pending);
    assert_eq!(engine.pending_events(), 0);

    viewer.write_all(&key(true, ' ' as u32)).await.unwrap();
    engine.poll(&canvas(), SHORT).await.unwrap();
    assert_eq!(engine.next_event(), Some(InputEvent::KeyDown(HostKey::Space)));
}

// ── Fatal errors ──────────────────────────────────────────────────────────────

/// An unmapped keysym fails the session and leaves the queue as it was.
#[tokio::test]
async fn test_unknown_key_fails_and_leaves_queue_unchanged() {
    // Arrange: one good event queued first
    let (mut viewer, mut engine) = setup(EngineOptions::default());
    viewer.write_all(&key(true, 'z' as u32)).await.unwrap();
    engine.poll(&canvas(), SHORT).await.unwrap();
    assert_eq!(engine.pending_events(), 1);

    // Act: shifted 'Z' is not in the table
    viewer.write_all(&key(true, 'Z' as u32)).await.unwrap();
    let err = engine.poll(&canvas(), Duration::ZERO).await.unwrap_err();

    // Assert
    assert_eq!(err.as_protocol(), Some(&ProtocolError::UnknownKey(0x5A)));
    assert_eq!(engine.pending_events(), 1);
    assert_eq!(engine.state(), EngineState::Failed);
}

#[tokio::test]
async fn test_unknown_message_type_is_fatal() {
    let (mut viewer, mut engine) = setup(EngineOptions::default());
    viewer.write_all(&[1]).await.unwrap();

    let err = engine.poll(&canvas(), Duration::ZERO).await.unwrap_err();

    assert_eq!(err.as_protocol(), Some(&ProtocolError::UnknownMessageType(1)));
    let again = engine.poll(&canvas(), Duration::ZERO).await.unwrap_err();
    assert!(matches!(
        again,
        SessionError::Connection(ConnectionError::SessionTerminated)
    ));
}

#[tokio::test]
async fn test_cut_text_above_limit_is_fatal() {
    let (mut viewer, mut engine) = setup(EngineOptions {
        max_cut_text_len: 4,
        ..EngineOptions::default()
    });
    viewer
        .write_all(&[6, 0, 0, 0, 0, 0, 0, 5, b'h', b'e', b'l', b'l', b'o'])
        .await
        .unwrap();

    let err = engine.poll(&canvas(), Duration::ZERO).await.unwrap_err();

    assert_eq!(
        err.as_protocol(),
        Some(&ProtocolError::LengthLimitExceeded {
            field: "ClientCutText.length",
            declared: 5,
            limit: 4,
        })
    );
}
