// WebSocket endpoint: handshake, subscription bookkeeping, publish fan-out.
//
// One task per connection. Outbound frames (acks, errors, broadcasts)
// funnel through an unbounded mpsc so fan-out from other connections and
// direct replies share one ordered writer.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use cahier_common::protocol::ws::{ClientFrame, ServerFrame};
use cahier_common::protocol::CURRENT_PROTOCOL_VERSION;

use crate::acl::{ChannelAcl, TokenStore};
use crate::store::ConnectionStore;

#[derive(Clone)]
pub struct RegistryState {
    pub connections: ConnectionStore,
    pub acl: ChannelAcl,
    pub tokens: TokenStore,
    /// Shared secret for the REST publish ingress.
    pub service_token: std::sync::Arc<str>,
}

pub fn router(state: RegistryState) -> Router {
    Router::new().route("/v1/ws", get(ws_upgrade)).with_state(state)
}

async fn ws_upgrade(State(state): State<RegistryState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

fn error_frame(code: &str, message: impl Into<String>, retryable: bool) -> ServerFrame {
    ServerFrame::Error { code: code.to_string(), message: message.into(), retryable }
}

async fn send_frame(socket: &mut WebSocket, frame: &ServerFrame) -> Result<(), axum::Error> {
    let encoded = serde_json::to_string(frame).map_err(axum::Error::new)?;
    socket.send(Message::Text(encoded.into())).await
}

async fn handle_socket(state: RegistryState, mut socket: WebSocket) {
    // First frame must be a hello; anything else ends the connection.
    let user_id = match socket.recv().await {
        Some(Ok(Message::Text(raw))) => match serde_json::from_str::<ClientFrame>(&raw) {
            Ok(ClientFrame::Hello { protocol_version, token }) => {
                if protocol_version != CURRENT_PROTOCOL_VERSION {
                    let _ = send_frame(
                        &mut socket,
                        &error_frame(
                            "PROTOCOL_UNSUPPORTED",
                            format!("this registry speaks {CURRENT_PROTOCOL_VERSION}"),
                            false,
                        ),
                    )
                    .await;
                    let _ = socket.send(Message::Close(None)).await;
                    return;
                }
                match state.tokens.verify(&token).await {
                    Some(user_id) => user_id,
                    None => {
                        let _ = send_frame(
                            &mut socket,
                            &error_frame("AUTH_INVALID_TOKEN", "credential rejected", false),
                        )
                        .await;
                        let _ = socket.send(Message::Close(None)).await;
                        return;
                    }
                }
            }
            _ => {
                let _ = send_frame(
                    &mut socket,
                    &error_frame("HELLO_REQUIRED", "first frame must be a hello", false),
                )
                .await;
                let _ = socket.send(Message::Close(None)).await;
                return;
            }
        },
        _ => return,
    };

    let connection_id = Uuid::new_v4();
    let (outbound_sender, mut outbound_receiver) = mpsc::unbounded_channel::<ServerFrame>();
    state.connections.register(connection_id, user_id, outbound_sender.clone()).await;

    let hello_ack = ServerFrame::HelloAck { connection_id, server_time: Utc::now() };
    if send_frame(&mut socket, &hello_ack).await.is_err() {
        state.connections.unregister(connection_id).await;
        return;
    }
    info!(%connection_id, %user_id, "realtime connection established");

    loop {
        tokio::select! {
            maybe_outbound = outbound_receiver.recv() => {
                match maybe_outbound {
                    Some(frame) => {
                        if send_frame(&mut socket, &frame).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            maybe_message = socket.recv() => {
                let Some(Ok(message)) = maybe_message else {
                    break;
                };
                match message {
                    Message::Text(raw) => {
                        let reply = match serde_json::from_str::<ClientFrame>(&raw) {
                            Ok(frame) => {
                                process_frame(&state, connection_id, user_id, frame).await
                            }
                            Err(error) => {
                                debug!(%connection_id, %error, "undecodable frame");
                                Some(error_frame(
                                    "MALFORMED_FRAME",
                                    "frame did not decode",
                                    true,
                                ))
                            }
                        };
                        if let Some(frame) = reply {
                            if outbound_sender.send(frame).is_err() {
                                break;
                            }
                        }
                    }
                    Message::Close(_) => break,
                    // Pings are answered by axum; binary frames are not
                    // part of the protocol.
                    _ => {}
                }
            }
        }
    }

    state.connections.unregister(connection_id).await;
    info!(%connection_id, "realtime connection closed");
}

/// Handle one decoded post-handshake frame, returning the direct reply
/// (if any). A denied channel yields an error frame, not a disconnect.
async fn process_frame(
    state: &RegistryState,
    connection_id: Uuid,
    user_id: Uuid,
    frame: ClientFrame,
) -> Option<ServerFrame> {
    match frame {
        ClientFrame::Hello { .. } => {
            warn!(%connection_id, "hello after handshake");
            Some(error_frame("HELLO_UNEXPECTED", "handshake already complete", false))
        }
        ClientFrame::Subscribe { channel } => {
            if !state.acl.allows(user_id, channel).await {
                debug!(%connection_id, %channel, "subscribe denied");
                return Some(error_frame(
                    "CHANNEL_FORBIDDEN",
                    format!("no access to {channel}"),
                    false,
                ));
            }
            state.connections.subscribe(connection_id, channel).await;
            Some(ServerFrame::Subscribed { channel })
        }
        ClientFrame::Unsubscribe { channel } => {
            state.connections.unsubscribe(connection_id, channel).await;
            Some(ServerFrame::Unsubscribed { channel })
        }
        ClientFrame::Publish { channel, event } => {
            if !state.acl.allows(user_id, channel).await {
                debug!(%connection_id, %channel, "publish denied");
                return Some(error_frame(
                    "CHANNEL_FORBIDDEN",
                    format!("no access to {channel}"),
                    false,
                ));
            }
            let envelope = ConnectionStore::envelope(
                channel,
                event,
                Some(connection_id),
                Some(user_id),
            );
            let delivered = state.connections.broadcast(envelope).await;
            debug!(%connection_id, %channel, delivered, "event fanned out");
            None
        }
    }
}
