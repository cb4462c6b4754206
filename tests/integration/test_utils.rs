//! Test utilities for integration tests.
//!
//! Provides a `TestClient` that feeds framed events into a session and
//! collects its outbound frames, plus synthetic cube providers.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use prost::Message;
use tokio::sync::mpsc;
use uuid::Uuid;

use cube_streamer::proto::{self, event, EventHeader, OpenFile, OpenFileAck, RegisterViewer};
use cube_streamer::{
    AccessPolicy, AllowAll, MemoryProvider, MemorySource, Session, WorkerPool,
};

// =============================================================================
// Test Client
// =============================================================================

/// Drives one session the way the websocket layer would.
pub struct TestClient {
    session: Session,
    rx: mpsc::Receiver<Bytes>,
    buf: BytesMut,
}

impl TestClient {
    pub fn new(provider: MemoryProvider) -> Self {
        Self::with_policy(provider, Arc::new(AllowAll))
    }

    pub fn with_policy(provider: MemoryProvider, policy: Arc<dyn AccessPolicy>) -> Self {
        let (tx, rx) = mpsc::channel(256);
        let session = Session::new(
            Uuid::new_v4(),
            Arc::new(provider),
            policy,
            Arc::new(WorkerPool::new(2)),
            std::env::temp_dir(),
            tx,
        );
        Self {
            session,
            rx,
            buf: BytesMut::new(),
        }
    }

    /// Frame and deliver one event; panics on a fatal session error.
    pub async fn send(&mut self, name: &str, request_id: u32, payload: &impl Message) {
        let frame = proto::encode_frame(&mut self.buf, name, request_id, payload);
        self.session
            .on_message(&frame)
            .await
            .expect("session hit a fatal error");
    }

    /// Deliver a raw frame (header assembled by the caller's rules).
    pub async fn send_raw(&mut self, frame: &[u8]) {
        self.session
            .on_message(frame)
            .await
            .expect("session hit a fatal error");
    }

    /// Pop the next outbound event.
    pub fn recv(&mut self) -> (EventHeader, Bytes) {
        let frame = self.rx.try_recv().expect("expected an outbound event");
        let (header, payload) = proto::decode_frame(&frame).expect("outbound frame is well-formed");
        (header, Bytes::copy_from_slice(payload))
    }

    /// Pop the next outbound event, asserting its tag, and decode it.
    pub fn recv_expect<M: Message + Default>(&mut self, name: &str) -> (u32, M) {
        let (header, payload) = self.recv();
        assert_eq!(header.name, name, "unexpected outbound event");
        let decoded = M::decode(&payload[..]).expect("payload decodes");
        (header.request_id, decoded)
    }

    /// Assert that no outbound event is pending.
    pub fn assert_idle(&mut self) {
        assert!(
            self.rx.try_recv().is_err(),
            "expected no further outbound events"
        );
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }
}

/// Register the viewer and open `file` under `file_id`, asserting success.
pub async fn register_and_open(client: &mut TestClient, file: &str, file_id: i32) {
    client
        .send(
            event::REGISTER_VIEWER,
            1,
            &RegisterViewer {
                api_key: String::new(),
            },
        )
        .await;
    let (_, ack): (_, proto::RegisterViewerAck) = client.recv_expect(event::REGISTER_VIEWER_ACK);
    assert!(ack.success);

    client
        .send(
            event::OPEN_FILE,
            2,
            &OpenFile {
                directory: String::new(),
                file: file.into(),
                hdu: String::new(),
                file_id,
            },
        )
        .await;
    let (_, ack): (_, OpenFileAck) = client.recv_expect(event::OPEN_FILE_ACK);
    assert!(ack.success, "open failed: {}", ack.message);
}

// =============================================================================
// Synthetic cubes
// =============================================================================

/// 64x64 2D ramp with value `x + y`, registered as `ramp.fits`.
pub fn ramp_provider() -> MemoryProvider {
    let mut provider = MemoryProvider::new();
    provider.insert("ramp.fits", || {
        Box::new(MemorySource::from_fn_2d(64, 64, |x, y| (x + y) as f32))
    });
    provider
}

/// 10x10 2D gradient with value `x + 10y`, registered as `grid.fits`.
pub fn gradient_provider() -> MemoryProvider {
    let mut provider = MemoryProvider::new();
    provider.insert("grid.fits", || {
        Box::new(MemorySource::from_fn_2d(10, 10, |x, y| (x + 10 * y) as f32))
    });
    provider
}

/// 8x8x3x2 4D cube with value `x + 10y + 100c + 1000s`, as `cube.fits`.
pub fn cube_provider() -> MemoryProvider {
    let mut provider = MemoryProvider::new();
    provider.insert("cube.fits", || {
        Box::new(MemorySource::from_fn_4d(8, 8, 3, 2, |x, y, c, s| {
            (x + 10 * y + 100 * c + 1000 * s) as f32
        }))
    });
    provider
}

// =============================================================================
// Byte helpers
// =============================================================================

pub fn f32s_from_le(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

pub fn i32s_from_le(bytes: &[u8]) -> Vec<i32> {
    bytes
        .chunks_exact(4)
        .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}
