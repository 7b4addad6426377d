use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::config::WsConfig;
use crate::ws::{ConnectionRegistry, ConnectionSender};

/// Close code sent when the server goes away (shutdown or dead peer).
const CLOSE_GOING_AWAY: u16 = 1001;

/// How long to let the writer flush a final Close frame before aborting it.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// What moved the connection from Open to Closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCause {
    /// Peer sent a Close frame
    PeerClosed,
    /// Stream ended without a Close frame
    StreamEnded,
    /// Transport error while reading
    TransportError,
    /// No pong within the keepalive window
    PongTimeout,
    /// Server is shutting down
    Shutdown,
}

/// Run the actor-per-connection pattern for a receiver WebSocket.
///
/// Splits the WebSocket into reader and writer halves:
/// - Writer task: owns the sink, forwards messages from an mpsc channel
/// - Reader loop: waits on inbound traffic; content is ignored, only the
///   close/error signal matters
///
/// The connection is registered once the upgrade has completed and
/// deregistered exactly once, whichever way it ends.
pub async fn run_connection(
    socket: WebSocket,
    registry: ConnectionRegistry,
    ws_config: WsConfig,
    shutdown: CancellationToken,
) -> CloseCause {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    let handle = registry.register(tx.clone());
    let connection_id = handle.id();

    tracing::info!(
        connection_id = %connection_id,
        connections = registry.len(),
        "Receiver connected"
    );

    let mut writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    // Track pong reception; the ping task cancels `keepalive_failed` on timeout
    let (pong_tx, pong_rx) = mpsc::unbounded_channel::<()>();
    let keepalive_failed = CancellationToken::new();
    let ping_handle = ws_config.ping_interval().map(|every| {
        tokio::spawn(ping_task(
            tx.clone(),
            pong_rx,
            every,
            ws_config.pong_timeout(),
            keepalive_failed.clone(),
        ))
    });

    let cause = loop {
        let next = tokio::select! {
            _ = shutdown.cancelled() => break CloseCause::Shutdown,
            _ = keepalive_failed.cancelled() => break CloseCause::PongTimeout,
            next = ws_receiver.next() => next,
        };

        match next {
            Some(Ok(msg)) => match msg {
                Message::Text(_) | Message::Binary(_) => {
                    // Receivers have nothing to say; inbound content is not interpreted
                    tracing::trace!(connection_id = %connection_id, "Ignoring inbound frame");
                }
                Message::Pong(_) => {
                    let _ = pong_tx.send(());
                }
                Message::Ping(data) => {
                    let _ = tx.send(Message::Pong(data));
                }
                Message::Close(frame) => {
                    tracing::debug!(
                        connection_id = %connection_id,
                        reason = ?frame,
                        "Client initiated close"
                    );
                    break CloseCause::PeerClosed;
                }
            },
            Some(Err(e)) => {
                tracing::warn!(
                    connection_id = %connection_id,
                    error = %e,
                    "WebSocket receive error"
                );
                break CloseCause::TransportError;
            }
            None => break CloseCause::StreamEnded,
        }
    };

    if let Some(ping_handle) = ping_handle {
        ping_handle.abort();
        let _ = ping_handle.await;
    }

    registry.deregister(&handle);

    let farewell = match cause {
        CloseCause::Shutdown => Some("Server shutting down"),
        CloseCause::PongTimeout => Some("Pong timeout"),
        _ => None,
    };
    if let Some(reason) = farewell {
        let _ = tx.send(Message::Close(Some(CloseFrame {
            code: CLOSE_GOING_AWAY,
            reason: reason.into(),
        })));
    }

    // Last sender gone: the writer drains what is queued and exits
    drop(tx);
    finish_writer(&mut writer_handle).await;

    tracing::info!(
        connection_id = %connection_id,
        cause = ?cause,
        connections = registry.len(),
        "Receiver disconnected"
    );

    cause
}

/// Writer task: receives messages from mpsc channel and forwards them to the WebSocket sink.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        let is_close = matches!(msg, Message::Close(_));
        if ws_sender.send(msg).await.is_err() || is_close {
            break;
        }
    }
}

/// Send periodic pings; signal `failed` if a pong does not come back in time.
async fn ping_task(
    tx: ConnectionSender,
    mut pong_rx: mpsc::UnboundedReceiver<()>,
    every: Duration,
    pong_timeout: Duration,
    failed: CancellationToken,
) {
    let mut ping_timer = interval(every);
    // Skip the first immediate tick
    ping_timer.tick().await;

    loop {
        ping_timer.tick().await;

        // Pongs that arrived late or unsolicited do not count for this round
        while pong_rx.try_recv().is_ok() {}

        if tx.send(Message::Ping(vec![1, 2, 3, 4].into())).is_err() {
            // Writer task has died, connection is gone
            break;
        }

        match timeout(pong_timeout, pong_rx.recv()).await {
            Ok(Some(())) => {}
            _ => {
                tracing::warn!("Pong timeout, closing connection");
                failed.cancel();
                break;
            }
        }
    }
}

/// Stop tracking new actors and wait up to `limit` for the running ones to
/// finish, Close frames included. Returns false if some were still running.
pub async fn drain(actors: &TaskTracker, limit: Duration) -> bool {
    actors.close();
    timeout(limit, actors.wait()).await.is_ok()
}

async fn finish_writer(writer_handle: &mut JoinHandle<()>) {
    if timeout(WRITER_DRAIN_TIMEOUT, &mut *writer_handle).await.is_err() {
        writer_handle.abort();
    }
}
