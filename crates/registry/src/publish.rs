// REST publish ingress.
//
// The CRUD API calls this after a successful write so the mutation is
// fanned out to channel subscribers. Authenticated with a shared service
// token; the registry stamps sender and timestamp, and no origin is set
// because the caller holds no WebSocket connection.

use axum::{
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use cahier_common::channel::ChannelName;
use cahier_common::protocol::event::EventKind;

use crate::store::ConnectionStore;
use crate::ws::RegistryState;

#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    /// User on whose behalf the event is published.
    #[serde(default)]
    pub sender_id: Option<Uuid>,
    #[serde(flatten)]
    pub event: EventKind,
}

#[derive(Debug, Serialize)]
struct PublishResponse {
    success: bool,
    delivered: usize,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    success: bool,
    message: String,
}

fn failure(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorResponse { success: false, message: message.into() })).into_response()
}

pub fn router(state: RegistryState) -> Router {
    Router::new().route("/v1/publish/{channel}", post(publish)).with_state(state)
}

async fn publish(
    Path(raw_channel): Path<String>,
    State(state): State<RegistryState>,
    headers: HeaderMap,
    Json(payload): Json<PublishRequest>,
) -> Response {
    let authorized = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|token| token == state.service_token.as_ref());
    if !authorized {
        return failure(StatusCode::UNAUTHORIZED, "invalid service token");
    }

    let channel: ChannelName = match raw_channel.parse() {
        Ok(channel) => channel,
        Err(error) => return failure(StatusCode::BAD_REQUEST, error.to_string()),
    };

    let envelope = ConnectionStore::envelope(channel, payload.event, None, payload.sender_id);
    let delivered = state.connections.broadcast(envelope).await;
    debug!(%channel, delivered, "publish ingress fanned out");

    (StatusCode::OK, Json(PublishResponse { success: true, delivered })).into_response()
}
