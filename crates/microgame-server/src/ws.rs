//! `WebSocket` handler for game clients.
//!
//! Clients connect to `GET /game`. Each socket is split in two:
//!
//! - a writer task drains the connection's outbound queue into the sink
//! - the read loop decodes inbound frames and calls into the core
//!
//! The two halves live and die together. The connection is registered
//! before the read loop starts and cleaned up exactly once when either
//! half stops, after which the freed icon is announced to everyone.
//! Dropping the registry record closes the queue, which stops the writer
//! and closes the socket.

use std::fmt::Display;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{Sink, SinkExt, Stream, StreamExt};
use microgame_types::{ClientMessage, ConnectionId};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::registry::Frame;
use crate::state::AppState;

/// Upgrade an HTTP request to a game socket.
///
/// Any origin is accepted.
///
/// # Route
///
/// `GET /game`
pub async fn ws_game(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

async fn handle_ws(socket: WebSocket, state: Arc<AppState>) {
    let (sink, stream) = socket.split();
    serve_connection(sink, stream, state).await;
}

async fn serve_connection<S, R, E>(mut sink: S, stream: R, state: Arc<AppState>)
where
    S: Sink<Message> + Send + Unpin + 'static,
    S::Error: Display + Send,
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let conn = ConnectionId::new();
    let (tx, mut rx) = mpsc::unbounded_channel::<Frame>();

    let mut writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if let Err(e) = sink.send(Message::Text(frame)).await {
                debug!(%conn, "WebSocket write failed: {e}");
                return;
            }
        }
        let _ = sink.close().await;
    });

    state.registry.register(conn, tx).await;
    info!(%conn, "Client connected");

    // Give the client a moment to attach its handlers before the first list.
    let icons = state.icons.clone();
    let delay = state.game.initial_icons_delay();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        icons.send_available(conn).await;
    });

    let writer_finished = tokio::select! {
        () = read_loop(stream, &state, conn) => false,
        result = &mut writer => {
            if let Err(e) = result {
                debug!(%conn, "Writer task ended abnormally: {e}");
            }
            debug!(%conn, "Writer stopped, closing connection");
            true
        }
    };

    disconnect(&state, conn).await;

    if !writer_finished {
        if let Err(e) = writer.await {
            debug!(%conn, "Writer task ended abnormally: {e}");
        }
    }
}

async fn read_loop<R, E>(mut stream: R, state: &AppState, conn: ConnectionId)
where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => handle_text(state, conn, text.as_str()).await,
            Ok(Message::Binary(_)) => {
                debug!(%conn, "Ignoring binary frame");
            }
            Ok(Message::Close(_)) => {
                debug!(%conn, "Client sent close frame");
                break;
            }
            Ok(Message::Ping(_) | Message::Pong(_)) => {}
            Err(e) => {
                debug!(%conn, "WebSocket read error: {e}");
                break;
            }
        }
    }
}

/// Drop `conn` from the registry and announce its freed icon.
///
/// Returns `false` if the connection was already gone, e.g. evicted by
/// the dispatcher, in which case the dispatcher has announced it.
pub async fn disconnect(state: &AppState, conn: ConnectionId) -> bool {
    let removed = state.registry.unregister(conn).await;
    if removed {
        state.icons.broadcast_available();
    }
    info!(%conn, "Client disconnected");
    removed
}

/// Decode one text frame and act on it. Malformed frames are logged and
/// dropped; the sender is not told.
pub async fn handle_text(state: &AppState, conn: ConnectionId, text: &str) {
    debug!(%conn, incoming = text, "Received frame");
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => handle_client_message(state, conn, message).await,
        Err(e) => warn!(%conn, error = %e, "Ignoring unrecognized client message"),
    }
}

/// Route a decoded client message to the core operation it names.
pub async fn handle_client_message(state: &AppState, conn: ConnectionId, message: ClientMessage) {
    match message {
        ClientMessage::IconSelection { icon } => {
            state.icons.try_select(conn, &icon).await;
        }
        ClientMessage::NameEntry { name } => {
            debug!(%conn, ?name, "Name entry");
            state.validator.validate(conn).await;
        }
        ClientMessage::MicrogameResult { id, percentage } => {
            state.scheduler.record_result(id, percentage).await;
        }
    }
}
