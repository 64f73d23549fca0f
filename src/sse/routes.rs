use std::{convert::Infallible, sync::Arc};

use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use crate::{Bus, Config, Error, KIND_CONNECTED, RelayEvent, sse::SseConnection, sse::frame};

/// Shared state handed to every route.
#[derive(Clone)]
pub struct AppState {
    pub bus: Bus<RelayEvent>,
    pub config: Arc<Config>,
    /// Cancelled on server shutdown; ends every open stream.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(bus: Bus<RelayEvent>, config: Config) -> Self {
        Self {
            bus,
            config: Arc::new(config),
            shutdown: CancellationToken::new(),
        }
    }
}

/// Routes:
/// - `GET  /api/cafe/{cafe_id}/events`: SSE stream of the cafe's channel
/// - `POST /api/cafe/{cafe_id}/events`: publish `{ "type", "payload"? }` to it
/// - `GET  /health`
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/cafe/{cafe_id}/events",
            get(cafe_events).post(emit_cafe_event),
        )
        .route("/health", get(health))
        .with_state(state)
}

async fn cafe_events(State(state): State<AppState>, Path(cafe_id): Path<String>) -> Response {
    let connection = SseConnection::open(
        &state.bus,
        &cafe_id,
        state.config.heartbeat_interval,
        state.shutdown.child_token(),
    );
    tracing::info!(cafe_id = %cafe_id, connection = %connection.id(), "Client subscribed");

    let body = Body::from_stream(connection.map(Ok::<_, Infallible>));
    (
        [
            (header::CONTENT_TYPE, frame::CONTENT_TYPE),
            (header::CACHE_CONTROL, frame::CACHE_CONTROL),
            (header::CONNECTION, frame::CONNECTION),
        ],
        body,
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
struct EmitRequest {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Option<Value>,
}

async fn emit_cafe_event(
    State(state): State<AppState>,
    Path(cafe_id): Path<String>,
    body: Result<Json<EmitRequest>, JsonRejection>,
) -> Result<impl IntoResponse, Error> {
    let Json(request) = body.map_err(|rejection| Error::InvalidRequest(rejection.body_text()))?;
    let kind = request.kind.trim();
    if kind.is_empty() {
        return Err(Error::InvalidEvent("event type must not be empty"));
    }
    if kind == KIND_CONNECTED {
        return Err(Error::InvalidEvent("'connected' is reserved for the handshake"));
    }
    let payload = match request.payload {
        None | Some(Value::Null) => json!({}),
        Some(payload @ Value::Object(_)) => payload,
        Some(_) => return Err(Error::InvalidEvent("payload must be a JSON object")),
    };

    let event = RelayEvent::cafe(&cafe_id, kind, payload);
    let delivered = state.bus.emit(&event);
    tracing::info!(cafe_id = %cafe_id, event = %kind, delivered, "Cafe event published");

    Ok((StatusCode::ACCEPTED, Json(json!({ "delivered": delivered }))))
}

async fn health() -> &'static str {
    "ok"
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match self {
            Error::InvalidEvent(_) | Error::InvalidRequest(_) | Error::Serialization(_) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
