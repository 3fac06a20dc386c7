//! WebSocket session lifecycle: one connected client from upgrade through
//! teardown.
//!
//! Each session runs `Connecting → Open → Closing → Closed`. The reader loop
//! owns inbound frames; a spawned writer task owns the socket sink and drains
//! the connection's outbound queue, so every outbound envelope (replies
//! included) goes through that queue in order.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket};
use carehub_core::{ConnectionId, Envelope};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::broadcast::BroadcastManager;
use super::connection::ClientConnection;
use super::protocol::{ClientFrame, parse_frame};
use super::registry::ConnectionRegistry;
use crate::metrics::{
    WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL,
    WS_DISCONNECTIONS_TOTAL,
};

/// How long the writer keeps flushing queued envelopes after close.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// How long teardown waits for the writer task before aborting it.
const WRITER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(3);

/// Greeting text on the call-status endpoint.
pub const CALL_STATUS_GREETING: &str = "Connected to call status updates";

/// Which WebSocket route the client connected to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endpoint {
    /// General live updates.
    LiveUpdates,
    /// Call status; greets with `call_status_init` after connecting.
    CallStatus,
}

impl Endpoint {
    /// HTTP route.
    pub fn path(self) -> &'static str {
        match self {
            Self::LiveUpdates => "/ws/live-updates",
            Self::CallStatus => "/ws/call-status",
        }
    }

    /// Metric/log label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LiveUpdates => "live_updates",
            Self::CallStatus => "call_status",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-connection lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Upgraded, not yet registered and greeted.
    Connecting,
    /// Serving inbound frames.
    Open,
    /// Tearing down; the registry entry is being released.
    Closing,
    /// Done.
    Closed,
}

/// Why a session left `Open`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseReason {
    /// Close frame or end of stream from the client.
    ClientClosed,
    /// Read error on the transport.
    TransportError,
    /// The connection's close signal fired (evicted, or the writer failed).
    Evicted,
    /// The server is shutting down.
    Shutdown,
}

/// Unregisters the connection exactly once, on every exit path.
struct RegistrationGuard {
    registry: Arc<ConnectionRegistry>,
    id: ConnectionId,
    started: Instant,
}

impl RegistrationGuard {
    fn new(registry: Arc<ConnectionRegistry>, id: ConnectionId) -> Self {
        Self {
            registry,
            id,
            started: Instant::now(),
        }
    }
}

impl Drop for RegistrationGuard {
    fn drop(&mut self) {
        let _ = self.registry.unregister(&self.id);
        let elapsed = self.started.elapsed();
        counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
        gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
        histogram!(WS_CONNECTION_DURATION_SECONDS).record(elapsed.as_secs_f64());
        info!(conn_id = %self.id, duration_secs = elapsed.as_secs(), "client disconnected");
    }
}

/// Protocol state for one connection.
pub struct Session {
    connection: Arc<ClientConnection>,
    broadcast: Arc<BroadcastManager>,
    endpoint: Endpoint,
    state: SessionState,
}

impl Session {
    /// Wrap a registered connection.
    pub fn new(
        connection: Arc<ClientConnection>,
        broadcast: Arc<BroadcastManager>,
        endpoint: Endpoint,
    ) -> Self {
        Self {
            connection,
            broadcast,
            endpoint,
            state: SessionState::Connecting,
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    fn transition(&mut self, next: SessionState) {
        debug!(conn_id = %self.connection.id(), from = ?self.state, to = ?next, "session state");
        self.state = next;
    }

    fn reply(&self, envelope: &Envelope) {
        let _ = self.broadcast.send_to_one(envelope, self.connection.id());
    }

    /// Greet the client and move to `Open`.
    pub fn open(&mut self) {
        self.reply(&Envelope::connection_established(self.connection.id()));
        if self.endpoint == Endpoint::CallStatus {
            self.reply(&Envelope::call_status_init(CALL_STATUS_GREETING));
        }
        self.transition(SessionState::Open);
    }

    /// Handle one transport message. Returns a reason when the session
    /// should close.
    pub fn on_message(&self, message: Message) -> Option<CloseReason> {
        match message {
            Message::Text(text) => self.on_text(text.as_str()),
            Message::Binary(data) => match std::str::from_utf8(&data) {
                Ok(text) => self.on_text(text),
                Err(_) => debug!(len = data.len(), "ignoring non-UTF8 binary frame"),
            },
            Message::Ping(_) | Message::Pong(_) => {
                self.broadcast.registry().touch(self.connection.id());
            }
            Message::Close(_) => {
                debug!("client sent close frame");
                return Some(CloseReason::ClientClosed);
            }
        }
        None
    }

    /// Handle one inbound text frame.
    pub fn on_text(&self, text: &str) {
        match parse_frame(text) {
            Ok(ClientFrame::Ping) => {
                self.broadcast.registry().touch(self.connection.id());
                self.reply(&Envelope::pong());
            }
            Ok(ClientFrame::Subscribe { events }) => {
                // Acknowledged only; broadcasts still go to every connection.
                debug!(?events, "subscription requested");
                self.reply(&Envelope::subscription_confirmed(&events));
            }
            Err(e) if e.is_unrecognized() => {
                warn!(conn_id = %self.connection.id(), error = %e, "ignoring frame");
            }
            Err(e) => {
                warn!(conn_id = %self.connection.id(), error = %e, "malformed frame ignored");
            }
        }
    }
}

/// Run a WebSocket session for a connected client.
///
/// 1. Registers the connection (with the optional claimed identity)
/// 2. Sends `connection_established` (and `call_status_init` on the
///    call-status endpoint)
/// 3. Answers `ping` and `subscribe` frames until the client leaves, the
///    transport fails, the connection is evicted, or `shutdown` fires
/// 4. Unregisters, lets the writer drain, and sends a Close frame
#[instrument(skip_all, fields(
    endpoint = %endpoint,
    identity = identity.as_deref().unwrap_or("-"),
    conn_id = tracing::field::Empty,
))]
pub async fn run_ws_session(
    ws: WebSocket,
    endpoint: Endpoint,
    identity: Option<String>,
    broadcast: Arc<BroadcastManager>,
    shutdown: CancellationToken,
) {
    let registry = Arc::clone(broadcast.registry());
    let (connection, outbound_rx) = registry.register(identity.as_deref());
    let _ = tracing::Span::current().record("conn_id", tracing::field::display(connection.id()));
    let guard = RegistrationGuard::new(Arc::clone(&registry), connection.id().clone());

    info!("client connected");
    counter!(WS_CONNECTIONS_TOTAL, "endpoint" => endpoint.as_str()).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    let (ws_tx, mut ws_rx) = ws.split();
    let writer = tokio::spawn(write_loop(ws_tx, outbound_rx, Arc::clone(&connection)));

    let mut session = Session::new(Arc::clone(&connection), broadcast, endpoint);
    session.open();

    let reason = loop {
        tokio::select! {
            biased;
            () = shutdown.cancelled() => break CloseReason::Shutdown,
            () = connection.closed() => break CloseReason::Evicted,
            frame = ws_rx.next() => match frame {
                None => break CloseReason::ClientClosed,
                Some(Err(e)) => {
                    debug!(error = %e, "transport read failed");
                    break CloseReason::TransportError;
                }
                Some(Ok(message)) => {
                    if let Some(reason) = session.on_message(message) {
                        break reason;
                    }
                }
            },
        }
    };

    session.transition(SessionState::Closing);
    debug!(?reason, "closing session");
    drop(guard);

    let abort = writer.abort_handle();
    if tokio::time::timeout(WRITER_SHUTDOWN_TIMEOUT, writer).await.is_err() {
        warn!("writer did not finish in time, aborting");
        abort.abort();
    }
    session.transition(SessionState::Closed);
}

/// Forward queued envelopes to the socket until the close signal fires,
/// then drain what is left (bounded) and send a Close frame.
async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<Arc<String>>,
    connection: Arc<ClientConnection>,
) {
    loop {
        tokio::select! {
            msg = outbound.recv() => match msg {
                Some(text) => {
                    if let Err(e) = sink.send(Message::Text(text.as_str().into())).await {
                        debug!(conn_id = %connection.id(), error = %e, "transport write failed");
                        connection.close();
                        return;
                    }
                }
                None => break,
            },
            () = connection.closed() => break,
        }
    }

    let drain = async {
        while let Ok(text) = outbound.try_recv() {
            if sink.send(Message::Text(text.as_str().into())).await.is_err() {
                return false;
            }
        }
        true
    };
    if matches!(tokio::time::timeout(DRAIN_TIMEOUT, drain).await, Ok(true)) {
        let _ = sink.send(Message::Close(None)).await;
    }
    let _ = sink.close().await;
}
