//! ==============================================================================
//! server.rs - http api and websocket event channel
//! ==============================================================================
//!
//! routes:
//!     GET  /ws            websocket event channel (controller and dashboards)
//!     POST /api/command   same as a web_command event, answered with an echo
//!     GET  /api/state     current state snapshot
//!     GET  /*             dashboard assets (only when a static dir is set)
//!
//! relationships:
//!     - used by: main.rs (builds the router and serves it)
//!     - uses: hub.rs (all state access), events.rs (frame encoding)
//!
//! ==============================================================================

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::config::ServerConfig;
use crate::domain::{DeviceReport, DeviceState};
use crate::error::RelayError;
use crate::events::{InboundEvent, OutboundEvent};
use crate::hub::RelayHub;

pub fn router(hub: RelayHub, config: &ServerConfig) -> Router {
    let mut app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/api/command", post(command_handler))
        .route("/api/state", get(state_handler));

    if let Some(dir) = &config.static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    let app = app.with_state(hub);

    // dashboards are served from another origin while developing
    if config.is_production() {
        app
    } else {
        app.layer(CorsLayer::permissive())
    }
}

// ==============================================================================
// http
// ==============================================================================

/// POST /api/command
///
/// relays and applies the command exactly like a websocket `web_command`.
/// always answers 200 with the payload echoed back; a command that fails
/// validation is still a successful relay.
async fn command_handler(State(hub): State<RelayHub>, Json(payload): Json<Value>) -> Json<Value> {
    hub.handle_web_command(payload.clone()).await;
    Json(json!({ "status": "success", "data": payload }))
}

/// GET /api/state
async fn state_handler(State(hub): State<RelayHub>) -> Json<DeviceState> {
    Json(hub.snapshot().await)
}

// ==============================================================================
// websocket
// ==============================================================================

async fn ws_handler(State(hub): State<RelayHub>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| session(hub, socket))
}

/// one connected peer.
///
/// the peer is subscribed before its greeting snapshot is taken, so no
/// update can fall between the two.
async fn session(hub: RelayHub, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = hub.subscribe();
    tracing::info!(peers = hub.peer_count(), "peer connected");

    let greeting = OutboundEvent::WebUpdate(hub.snapshot().await);
    if !send_event(&mut sender, &greeting).await {
        tracing::info!("peer left before greeting");
        return;
    }

    loop {
        tokio::select! {
            frame = receiver.next() => {
                let text = match frame {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        tracing::debug!(error = %e, "websocket read failed");
                        break;
                    }
                };

                match handle_frame(&hub, &text).await {
                    Ok(Some(reply)) => {
                        if !send_event(&mut sender, &reply).await {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => tracing::warn!(error = %e, "ignoring frame"),
                }
            }
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        if !send_event(&mut sender, &event).await {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "peer lagging, events dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    drop(events);
    tracing::info!(peers = hub.peer_count(), "peer disconnected");
}

/// dispatch one inbound frame. returns a reply meant for this peer only.
async fn handle_frame(hub: &RelayHub, text: &str) -> Result<Option<OutboundEvent>, RelayError> {
    match InboundEvent::from_text(text)? {
        InboundEvent::DeviceMessage(data) => {
            let report = DeviceReport::from_value(&data)?;
            if report.is_empty() {
                tracing::trace!("device report carried no known fields");
            }
            hub.handle_device_report(&report).await;
            Ok(None)
        }
        InboundEvent::WebCommand(payload) => {
            hub.handle_web_command(payload).await;
            Ok(None)
        }
        InboundEvent::RequestState => Ok(Some(OutboundEvent::WebUpdate(hub.snapshot().await))),
    }
}

/// false once the peer can no longer be written to
async fn send_event<S>(sender: &mut S, event: &OutboundEvent) -> bool
where
    S: SinkExt<Message> + Unpin,
{
    let text = match event.to_text() {
        Ok(text) => text,
        Err(e) => {
            // a state snapshot always serializes; skip rather than drop the peer
            tracing::error!(error = %e, event = event.name(), "failed to encode event");
            return true;
        }
    };
    sender.send(Message::Text(text)).await.is_ok()
}
