//! WebSocket connection lifecycle, from upgrade through disconnect.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tracing::{debug, info, instrument, warn};

use super::connection::Role;
use crate::hub::SessionHub;

/// Ping cadence and liveness window for one connection.
#[derive(Clone, Copy, Debug)]
pub struct Liveness {
    /// Interval between server-initiated Ping frames.
    pub ping_interval: Duration,
    /// Disconnect after this long without a Pong.
    pub pong_timeout: Duration,
}

/// Run one client connection against `hub`.
///
/// 1. Attaches the connection under `role` (closed hubs reject it)
/// 2. Forwards the outbound queue to the socket and sends periodic Pings
/// 3. Hands every Text or UTF-8 Binary frame to the hub
/// 4. Detaches on close, socket error, pong timeout, or session teardown
#[instrument(skip_all, fields(session = %hub.key(), %role))]
pub async fn run_ws_session(ws: WebSocket, hub: Arc<SessionHub>, role: Role, liveness: Liveness) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let (connection, mut send_rx) = hub.new_connection(role);
    let conn_id = connection.id;

    if let Err(e) = hub.attach(connection.clone()) {
        debug!(conn_id, error = %e, "refusing connection");
        let _ = ws_tx.send(Message::Close(None)).await;
        return;
    }
    info!(conn_id, "client connected");

    let outbound_conn = connection.clone();
    let cancel = connection.token();
    let outbound = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(liveness.ping_interval);
        // Skip the immediate first tick
        let _ = ping_interval.tick().await;

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
                msg = send_rx.recv() => {
                    let Some(text) = msg else { break };
                    if ws_tx.send(Message::Text(text.to_string().into())).await.is_err() {
                        break;
                    }
                }
                _ = ping_interval.tick() => {
                    if !outbound_conn.check_alive()
                        && outbound_conn.last_pong_elapsed() > liveness.pong_timeout
                    {
                        warn!(conn_id, "client unresponsive for {:?}, disconnecting", liveness.pong_timeout);
                        break;
                    }
                    if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
        outbound_conn.close();
    });

    let cancel = connection.token();
    loop {
        let msg = tokio::select! {
            () = cancel.cancelled() => break,
            msg = ws_rx.next() => msg,
        };
        let Some(Ok(msg)) = msg else { break };
        let text = match msg {
            Message::Text(t) => t.to_string(),
            Message::Binary(data) => match String::from_utf8(data.to_vec()) {
                Ok(s) => s,
                Err(_) => {
                    debug!(conn_id, len = data.len(), "dropping non-UTF8 binary frame");
                    continue;
                }
            },
            Message::Ping(_) | Message::Pong(_) => {
                connection.mark_alive();
                continue;
            }
            Message::Close(_) => {
                debug!(conn_id, "client sent close frame");
                break;
            }
        };
        connection.mark_alive();
        let _ = hub.deliver(&connection, text).await;
    }

    connection.close();
    if let Err(e) = outbound.await {
        debug!(conn_id, error = %e, "writer task ended abnormally");
    }
    hub.detach(conn_id);
    info!(
        conn_id,
        dropped = connection.drop_count(),
        age_secs = connection.age().as_secs(),
        "client disconnected"
    );
}
