//! HTTP control surface for the relay.
//!
//! Mirrors the control messages over plain routes, and streams every
//! state mutation as a `stateUpdate` server-sent event.

use std::convert::Infallible;
use std::time::Duration;

use action_flow::{ControlRequest, ControlResponse};
use async_stream::stream;
use axum::extract::{Query, State};
use axum::http::Method;
use axum::response::sse::{Event, KeepAlive};
use axum::response::{IntoResponse, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use relay_event_bus::next_event;
use relay_state_center::{RunState, StateUpdate, StopOptions};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, warn};

use super::state::ServeState;

pub fn build_router(state: ServeState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/automation/start", post(start_handler))
        .route("/api/automation/stop", post(stop_handler))
        .route("/api/automation/state", get(state_handler))
        .route("/api/automation/events", get(events_handler))
        .route("/api/messages", post(message_handler))
        .layer(cors_layer())
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

async fn health_handler(State(state): State<ServeState>) -> Json<Value> {
    let run = state.controller.state();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "running": state.controller.is_running(),
        "phase": run.phase,
        "ws_url": state.ws_url,
        "uptime_secs": state.uptime_secs(),
    }))
}

async fn start_handler(State(state): State<ServeState>) -> Json<ControlResponse> {
    Json(state.controller.handle(ControlRequest::StartAutomation))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StopQuery {
    #[serde(default)]
    preserve_state: bool,
}

async fn stop_handler(
    State(state): State<ServeState>,
    Query(query): Query<StopQuery>,
) -> Json<ControlResponse> {
    let options = if query.preserve_state {
        StopOptions::preserve()
    } else {
        StopOptions::default()
    };
    state.controller.stop(options);
    Json(ControlResponse::ack())
}

async fn state_handler(State(state): State<ServeState>) -> Json<RunState> {
    Json(state.controller.state())
}

async fn message_handler(
    State(state): State<ServeState>,
    Json(request): Json<ControlRequest>,
) -> Json<ControlResponse> {
    debug!(?request, "control message");
    Json(state.controller.handle(request))
}

async fn events_handler(State(state): State<ServeState>) -> impl IntoResponse {
    let mut receiver = state.controller.subscribe();
    let initial = StateUpdate {
        state: state.controller.state(),
    };

    let stream = stream! {
        if let Some(event) = event_from_update(&initial) {
            yield Ok::<Event, Infallible>(event);
        }
        while let Some(update) = next_event(&mut receiver).await {
            if let Some(event) = event_from_update(&update) {
                yield Ok(event);
            }
        }
        debug!("state update stream closed");
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

fn event_from_update(update: &StateUpdate) -> Option<Event> {
    match serde_json::to_string(update) {
        Ok(payload) => Some(Event::default().event("stateUpdate").data(payload)),
        Err(err) => {
            warn!(?err, "failed to serialize state update");
            None
        }
    }
}
