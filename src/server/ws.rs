//! Device and viewer websocket endpoints
//!
//! Every socket gets its own task. The task owns the socket halves and the
//! receiving end of its registry queue, and selects between the two until
//! either side goes away.

use axum::extract::ws::{close_code, CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;

use crate::registry::{CloseReason, DeviceId, Outbound};

use super::extract::Caller;
use super::listener::RelayState;

/// Query string of both stream endpoints
#[derive(Debug, Default, Deserialize)]
pub struct StreamQuery {
    pub device_id: Option<String>,
}

impl StreamQuery {
    fn device_id(&self) -> Result<DeviceId, crate::registry::RegistryError> {
        DeviceId::parse(self.device_id.as_deref().unwrap_or_default())
    }
}

/// Websocket close code sent for a registry close
pub fn close_code_for(reason: CloseReason) -> u16 {
    match reason {
        CloseReason::Superseded => close_code::NORMAL,
        CloseReason::Evicted | CloseReason::DeviceNotActive => close_code::POLICY,
    }
}

fn close_frame(code: u16, reason: &'static str) -> Message {
    Message::Close(Some(CloseFrame {
        code,
        reason: Utf8Bytes::from_static(reason),
    }))
}

/// `GET /ws/device?device_id=<id>`
pub async fn device_socket(
    ws: WebSocketUpgrade,
    State(state): State<RelayState>,
    Query(query): Query<StreamQuery>,
) -> Response {
    ws.on_upgrade(move |socket| handle_device(socket, state, query))
}

/// `GET /ws/viewer?device_id=<id>&token=<token>`
///
/// The caller is authenticated before the upgrade, so a bad token is a
/// plain 401 response.
pub async fn viewer_socket(
    _caller: Caller,
    ws: WebSocketUpgrade,
    State(state): State<RelayState>,
    Query(query): Query<StreamQuery>,
) -> Response {
    ws.on_upgrade(move |socket| handle_viewer(socket, state, query))
}

async fn handle_device(mut socket: WebSocket, state: RelayState, query: StreamQuery) {
    let device_id = match query.device_id() {
        Ok(id) => id,
        Err(e) => {
            tracing::info!(error = %e, "Device connection rejected");
            let _ = socket
                .send(close_frame(close_code::POLICY, "missing device_id"))
                .await;
            return;
        }
    };

    let (handle, mut outbound) = state.registry.open_connection();
    let connection = handle.id();
    state.registry.register_device(&device_id, handle).await;

    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            biased;

            // Registry -> device (close requests only)
            msg = outbound.recv() => {
                match msg {
                    Some(Outbound::Close(reason)) => {
                        send_close(&mut ws_tx, reason).await;
                        break;
                    }
                    Some(Outbound::Frame(_)) => continue,
                    None => break,
                }
            }

            // Device -> pipeline
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        // Dropped once superseded; the queued close ends the loop
                        let _ = state
                            .pipeline
                            .on_device_message(&device_id, connection, text.as_str())
                            .await;
                    }
                    Some(Ok(Message::Binary(_))) => {
                        tracing::debug!(device = %device_id, "Binary message ignored");
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        tracing::debug!(device = %device_id, error = %e, "Device socket error");
                        break;
                    }
                }
            }
        }
    }

    // The trailing flush runs on its own; the socket task is done
    let _ = state
        .pipeline
        .on_device_disconnect(&device_id, connection)
        .await;
}

async fn handle_viewer(mut socket: WebSocket, state: RelayState, query: StreamQuery) {
    let device_id = match query.device_id() {
        Ok(id) => id,
        Err(e) => {
            tracing::info!(error = %e, "Viewer connection rejected");
            let _ = socket
                .send(close_frame(close_code::POLICY, "missing device_id"))
                .await;
            return;
        }
    };

    let (handle, mut outbound) = state.registry.open_connection();
    let connection = handle.id();
    if let Err(e) = state.registry.register_viewer(&device_id, handle).await {
        tracing::debug!(device = %device_id, error = %e, "Viewer not admitted");
        let _ = socket
            .send(close_frame(
                close_code_for(CloseReason::DeviceNotActive),
                CloseReason::DeviceNotActive.as_str(),
            ))
            .await;
        return;
    }

    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            biased;

            // Device frames -> viewer
            msg = outbound.recv() => {
                match msg {
                    Some(Outbound::Frame(frame)) => {
                        let text = Utf8Bytes::from(String::from(&*frame));
                        if ws_tx.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Some(Outbound::Close(reason)) => {
                        send_close(&mut ws_tx, reason).await;
                        break;
                    }
                    None => break,
                }
            }

            // Viewer -> relay (logged and ignored)
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!(device = %device_id, message = %text.as_str(), "Viewer message ignored");
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        tracing::debug!(device = %device_id, error = %e, "Viewer socket error");
                        break;
                    }
                }
            }
        }
    }

    if state.registry.remove_viewer(&device_id, connection).await {
        tracing::debug!(device = %device_id, connection = connection, "Viewer disconnected");
    }
}

async fn send_close(ws_tx: &mut SplitSink<WebSocket, Message>, reason: CloseReason) {
    let _ = ws_tx
        .send(close_frame(close_code_for(reason), reason.as_str()))
        .await;
    let _ = ws_tx.flush().await;
}
