//! HTTP and WebSocket routes for Searchbook server.

use std::sync::Arc;

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::StatusCode,
    response::{Html, IntoResponse, Json},
    routing::get,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::Mutex as TokioMutex;
use tower_http::cors::CorsLayer;

use crate::protocol::{ClientMessage, ServerMessage};
use crate::session::SessionHandle;

/// Application state shared across handlers.
pub struct AppState {
    /// Active notebook session.
    pub session: SessionHandle,
}

type WsSender = Arc<TokioMutex<futures::stream::SplitSink<WebSocket, Message>>>;

/// Create the router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .route("/api/state", get(state_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Index page describing the endpoints.
async fn index_handler() -> Html<&'static str> {
    Html(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Searchbook</title>
    <style>
        body { font-family: system-ui, sans-serif; margin: 2rem; }
        pre { background: #f3f4f6; padding: 1rem; border-radius: 0.5rem; }
    </style>
</head>
<body>
    <h1>Searchbook Server</h1>
    <p>WebSocket endpoint: <code>/ws</code></p>
    <p>API endpoints:</p>
    <ul>
        <li><code>GET /health</code> - Health check</li>
        <li><code>GET /api/state</code> - Current notebook state</li>
    </ul>
    <script>
        const ws = new WebSocket(`ws://${location.host}/ws`);
        ws.onmessage = (e) => console.log('Server:', JSON.parse(e.data));
        ws.onopen = () => ws.send(JSON.stringify({ type: 'get_state' }));
    </script>
</body>
</html>"#,
    )
}

/// Health check handler.
async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Get current notebook state.
async fn state_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let session = state.session.read().await;
    match session.get_state() {
        Ok(notebook_state) => (StatusCode::OK, Json(notebook_state)),
        Err(e) => {
            tracing::error!("Failed to build notebook state: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ServerMessage::Error {
                    message: e.to_string(),
                }),
            )
        }
    }
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_websocket(socket, state))
}

/// Handle WebSocket connection.
async fn handle_websocket(socket: WebSocket, state: Arc<AppState>) {
    let (sender, mut receiver) = socket.split();
    let sender: WsSender = Arc::new(TokioMutex::new(sender));

    // Subscribe before sending the initial state so no update is missed.
    let (mut rx, initial_state) = {
        let session = state.session.read().await;
        (session.subscribe(), session.get_state())
    };

    match initial_state {
        Ok(msg) => send_message(&sender, &msg).await,
        Err(e) => {
            send_message(
                &sender,
                &ServerMessage::Error {
                    message: e.to_string(),
                },
            )
            .await
        }
    }

    // Spawn task to forward server messages to client
    let sender_clone = sender.clone();
    let forward_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(msg) => {
                    let Ok(json) = serde_json::to_string(&msg) else {
                        continue;
                    };
                    let mut sender = sender_clone.lock().await;
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("WebSocket client lagged, skipped {} messages", skipped);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // Handle incoming client messages
    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(msg) => handle_client_message(msg, &state, &sender).await,
                Err(e) => {
                    tracing::warn!("Failed to parse client message: {} (input: {})", e, text.as_str());
                    send_message(
                        &sender,
                        &ServerMessage::Error {
                            message: format!("Invalid message format: {}", e),
                        },
                    )
                    .await;
                }
            },
            Ok(Message::Close(_)) => break,
            Err(e) => {
                tracing::warn!("WebSocket error: {}", e);
                break;
            }
            _ => {}
        }
    }

    forward_task.abort();
}

/// Send a server message through the WebSocket.
async fn send_message(sender: &WsSender, msg: &ServerMessage) {
    if let Ok(json) = serde_json::to_string(msg) {
        let mut sender = sender.lock().await;
        let _ = sender.send(Message::Text(json.into())).await;
    }
}

/// Apply a client message; replies and errors go to this client only.
async fn handle_client_message(msg: ClientMessage, state: &Arc<AppState>, sender: &WsSender) {
    let result = {
        let mut session = state.session.write().await;
        session.handle_message(msg)
    };

    match result {
        Ok(Some(reply)) => send_message(sender, &reply).await,
        Ok(None) => {}
        Err(e) => {
            tracing::debug!("Client request failed: {}", e);
            send_message(
                sender,
                &ServerMessage::Error {
                    message: e.to_string(),
                },
            )
            .await;
        }
    }
}
