//! WebSocket connection handling.
//!
//! Each accepted connection gets a v4 UUID, its own [`Session`], and two
//! tasks: the read loop feeding inbound frames to the session, and a send
//! task draining the session's outbound channel and emitting liveness
//! pings. A configurable run of missed pongs closes the connection, which
//! cascades into session teardown and pool cancellation.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::comp::WorkerPool;
use crate::image::SourceProvider;
use crate::proto::HEADER_LEN;
use crate::server::policy::AccessPolicy;
use crate::session::Session;

/// Default interval between liveness pings.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(5);

/// Default number of unanswered pings before the connection is closed.
pub const DEFAULT_MAX_MISSED_PINGS: u32 = 3;

/// Shared state handed to every connection.
#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<dyn SourceProvider>,
    pub policy: Arc<dyn AccessPolicy>,
    pub pool: Arc<WorkerPool>,
    pub base_folder: PathBuf,
    pub ping_interval: Duration,
    pub max_missed_pings: u32,
}

/// Build the router: the websocket endpoint plus a health probe.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(ws_handler))
        .route("/healthz", get(health_handler))
        .with_state(state)
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn ws_handler(State(state): State<AppState>, upgrade: WebSocketUpgrade) -> impl IntoResponse {
    upgrade.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let session_id = Uuid::new_v4();
    info!(session = %session_id, "client connected");

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<Bytes>(64);
    let mut session = Session::new(
        session_id,
        state.provider,
        state.policy,
        state.pool,
        state.base_folder,
        out_tx,
    );

    // The send task drains outbound frames and paces pings so the read
    // loop can await long-running handlers without starving the socket.
    let missed_pings = Arc::new(AtomicU32::new(0));
    let ping_counter = Arc::clone(&missed_pings);
    let ping_interval = state.ping_interval;
    let max_missed = state.max_missed_pings;
    let send_task = tokio::spawn(async move {
        let mut ping_timer = tokio::time::interval(ping_interval);
        ping_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                frame = out_rx.recv() => match frame {
                    Some(bytes) => {
                        if ws_tx.send(Message::Binary(bytes.to_vec())).await.is_err() {
                            return;
                        }
                    }
                    None => {
                        let _ = ws_tx.send(Message::Close(None)).await;
                        return;
                    }
                },
                _ = ping_timer.tick() => {
                    if ping_counter.fetch_add(1, Ordering::Relaxed) >= max_missed {
                        warn!("liveness pings unanswered, closing connection");
                        let _ = ws_tx.send(Message::Close(None)).await;
                        return;
                    }
                    if ws_tx.send(Message::Ping(Vec::new())).await.is_err() {
                        return;
                    }
                }
            }
        }
    });

    while let Some(inbound) = ws_rx.next().await {
        match inbound {
            Ok(Message::Binary(data)) => {
                if data.len() < HEADER_LEN {
                    warn!(session = %session_id, len = data.len(), "dropping undersized frame");
                    continue;
                }
                // a fatal session error tears the connection down
                if session.on_message(&data).await.is_err() {
                    break;
                }
            }
            Ok(Message::Pong(_)) => {
                missed_pings.store(0, Ordering::Relaxed);
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {
                debug!(session = %session_id, "ignoring non-binary message");
            }
            Err(err) => {
                debug!(session = %session_id, error = %err, "socket error");
                break;
            }
        }
    }

    session.close();
    drop(session);
    send_task.abort();
    info!(session = %session_id, "client disconnected");
}
