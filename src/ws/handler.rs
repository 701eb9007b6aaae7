//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::fmt::Display;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{ArenaHandle, ClientEvent, ConnectionId, InboundEvent, Outbound};
use crate::util::rate_limit::{ConnectionRateLimiter, InputVerdict};
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let sid = Uuid::new_v4();
    info!(sid = %sid, "New WebSocket connection");

    let (ws_sink, ws_stream) = socket.split();

    // Subscribe before any event is submitted so the join reply cannot be missed
    let outbound_rx = state.arena.subscribe();
    let rate_limiter = ConnectionRateLimiter::new(state.config.input_rate_limit);

    // Spawn writer task: arena broadcasts addressed to us -> WebSocket
    let writer_handle = tokio::spawn(write_outbound(sid, outbound_rx, ws_sink));

    // Reader loop: WebSocket -> arena, then the disconnect
    read_inbound(sid, ws_stream, &state.arena, &rate_limiter).await;

    writer_handle.abort();

    info!(sid = %sid, "WebSocket connection closed");
}

/// Forward every outbound message targeted at `sid` into the sink
async fn write_outbound<S>(
    sid: ConnectionId,
    mut outbound_rx: broadcast::Receiver<Arc<Outbound>>,
    mut sink: S,
) where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    loop {
        match outbound_rx.recv().await {
            Ok(outbound) => {
                if !outbound.target.includes(sid) {
                    continue;
                }
                trace!(sid = %sid, event = outbound.msg.name(), "Sending event");
                if let Err(e) = send_msg(&mut sink, &outbound.msg).await {
                    debug!(sid = %sid, error = %e, "WebSocket send failed");
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(sid = %sid, lagged_count = n, "Client lagged, skipping {} messages", n);
                // The next snapshot resynchronises the client
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!(sid = %sid, "Outbound channel closed");
                break;
            }
        }
    }
}

/// Feed client frames to the arena until the socket ends, then report the disconnect
async fn read_inbound<St, E>(
    sid: ConnectionId,
    mut stream: St,
    arena: &ArenaHandle,
    rate_limiter: &ConnectionRateLimiter,
) where
    St: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                match rate_limiter.check_input() {
                    InputVerdict::Allowed => {}
                    InputVerdict::Throttled { first_in_burst: true } => {
                        warn!(sid = %sid, "Rate limited input, dropping until the burst ends");
                        continue;
                    }
                    InputVerdict::Throttled { first_in_burst: false } => {
                        debug!(sid = %sid, "Rate limited input message");
                        continue;
                    }
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(client_msg) => {
                        let event = ClientEvent {
                            sid,
                            event: InboundEvent::Message(client_msg),
                            received_at: unix_millis(),
                        };

                        if !arena.submit(event).await {
                            debug!(sid = %sid, "Arena input channel closed");
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(sid = %sid, error = %e, "Failed to parse client message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(sid = %sid, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) => {
                debug!(sid = %sid, "Received ping");
            }
            Ok(Message::Pong(_)) => {
                debug!(sid = %sid, "Received pong");
            }
            Ok(Message::Close(_)) => {
                info!(sid = %sid, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(sid = %sid, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Signal disconnect to the arena
    let _ = arena
        .submit(ClientEvent {
            sid,
            event: InboundEvent::Disconnect,
            received_at: unix_millis(),
        })
        .await;
}

/// Send a message over WebSocket
async fn send_msg<S>(sink: &mut S, msg: &ServerMsg) -> Result<(), String>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
