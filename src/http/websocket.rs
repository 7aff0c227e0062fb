//! WebSocket push of busy-state changes.
//!
//! # Data Flow
//! ```text
//! BusyState watch channel ──── {"busy": bool} frames ────→ Client (spinner)
//! ```
//!
//! # Design Decisions
//! - Current value sent immediately on connect
//! - Latest-value semantics: a slow client may skip intermediate values but
//!   always converges on the current one
//! - Client frames other than Close are ignored

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use tokio::sync::watch;

use crate::http::server::AppState;

pub async fn status_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let rx = state.coordinator.state().watch();
    ws.on_upgrade(move |socket| stream_busy(socket, rx))
}

async fn stream_busy(mut socket: WebSocket, mut rx: watch::Receiver<bool>) {
    let initial = *rx.borrow_and_update();
    if send_busy(&mut socket, initial).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let busy = *rx.borrow_and_update();
                if send_busy(&mut socket, busy).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
    tracing::debug!("Status websocket closed");
}

async fn send_busy(socket: &mut WebSocket, busy: bool) -> Result<(), axum::Error> {
    let payload = serde_json::json!({ "busy": busy }).to_string();
    socket.send(Message::Text(payload.into())).await
}
