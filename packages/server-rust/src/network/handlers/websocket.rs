//! WebSocket session handling.
//!
//! Each session registers a connection, runs a write loop draining its
//! outbound channel, and reads text frames until the peer leaves, the
//! session idles out, or shutdown begins. Every envelope is dispatched on
//! its own task, so a slow handler never blocks the next frame.

use std::sync::Arc;

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use pktinject_core::JsonMessage;
use tokio::sync::mpsc;
use tower::ServiceExt;
use tracing::{debug, info, warn};

use super::AppState;
use crate::network::{ConnectionHandle, HealthState, OutboundMessage};
use crate::service::{DispatchError, InboundMessage};
use crate::traits::JsonSpeaker;

/// Upgrades an HTTP connection to a WebSocket session.
///
/// Refused with 503 unless the server is `Ready`.
pub async fn ws_upgrade_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    if state.shutdown.health_state() != HealthState::Ready {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    ws.max_message_size(state.config.session.max_frame_bytes)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (handle, rx) = state.registry.register(&state.config.session);
    let conn_id = handle.id;
    info!(connection = %conn_id, "connection opened");

    let (sink, stream) = socket.split();
    let writer = tokio::spawn(write_loop(sink, rx));

    read_loop(stream, &handle, &state).await;

    // In-flight handlers keep their own handle clones; the writer exits once
    // the last of them has replied.
    state.registry.remove(conn_id);
    drop(handle);
    let _ = writer.await;

    info!(connection = %conn_id, "connection closed");
}

async fn read_loop(
    mut stream: SplitStream<WebSocket>,
    handle: &Arc<ConnectionHandle>,
    state: &AppState,
) {
    let idle_timeout = state.config.session.idle_timeout;
    let mut shutdown = state.shutdown.shutdown_receiver();
    if *shutdown.borrow() {
        return;
    }

    loop {
        let next = tokio::select! {
            _ = shutdown.changed() => break,
            next = tokio::time::timeout(idle_timeout, stream.next()) => next,
        };

        let frame = match next {
            Err(_) => {
                debug!(connection = %handle.id, "idle timeout");
                let _ = handle.try_send(OutboundMessage::Close(Some("idle timeout".to_string())));
                break;
            }
            Ok(None) => break,
            Ok(Some(Err(err))) => {
                debug!(connection = %handle.id, error = %err, "read failed");
                break;
            }
            Ok(Some(Ok(frame))) => frame,
        };

        match frame {
            Message::Text(text) => dispatch_text(text.as_str(), handle, state),
            Message::Binary(_) => {
                warn!(connection = %handle.id, "ignoring binary frame");
            }
            Message::Close(_) => break,
            // Pings are answered by the WebSocket layer itself.
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }
}

fn dispatch_text(text: &str, handle: &Arc<ConnectionHandle>, state: &AppState) {
    let message: JsonMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(err) => {
            warn!(connection = %handle.id, error = %err, "dropping malformed envelope");
            return;
        }
    };

    let guard = state.shutdown.in_flight_guard();
    let pipeline = state.pipeline.clone();
    let speaker: Arc<dyn JsonSpeaker> = Arc::clone(handle) as Arc<dyn JsonSpeaker>;

    tokio::spawn(async move {
        let _guard = guard;
        let inbound = InboundMessage::new(speaker, message);
        match pipeline.oneshot(inbound).await {
            Ok(()) => {}
            Err(DispatchError::UnknownNamespace { namespace }) => {
                warn!(namespace = %namespace, "no handler for namespace");
            }
            Err(err) => warn!(error = %err, "dispatch failed"),
        }
    });
}

async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<OutboundMessage>,
) {
    while let Some(outbound) = rx.recv().await {
        match outbound {
            OutboundMessage::Text(text) => {
                if sink.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            OutboundMessage::Close(reason) => {
                let frame = CloseFrame {
                    code: close_code::NORMAL,
                    reason: reason.unwrap_or_default().into(),
                };
                let _ = sink.send(Message::Close(Some(frame))).await;
                break;
            }
        }
    }
    let _ = sink.close().await;
}
