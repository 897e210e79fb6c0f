// WebSocket feeds fed by manager subscriptions

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use bytes::Bytes;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::{Duration, timeout};

use super::AppState;

pub(super) const WS_PING_INTERVAL: Duration = Duration::from_secs(30);
pub(super) const WS_SEND_TIMEOUT: Duration = Duration::from_secs(10);

pub(super) async fn ws_pupdates(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let manager = state.manager.clone();
    ws.on_upgrade(move |socket| async move {
        // Subscribe before the snapshot so a change racing the two shows up in
        // the feed. The client may see it twice but never misses it.
        let rx = manager.subscribe_pupdates().await;
        let welcome = serde_json::json!({ "type": "state", "pups": manager.list_pups().await });
        tracing::info!("Client connected to pupdates stream");
        if let Err(e) = stream_feed(socket, Some(welcome), rx).await {
            tracing::info!("Pupdates stream error: {}", e);
        }
    })
}

pub(super) async fn ws_stats(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let manager = state.manager.clone();
    ws.on_upgrade(move |socket| async move {
        let rx = manager.subscribe_stats().await;
        tracing::info!("Client connected to stats stream");
        if let Err(e) = stream_feed(socket, None, rx).await {
            tracing::info!("Stats stream error: {}", e);
        }
    })
}

/// Forward every item from `rx` as a JSON text frame until the client goes
/// away or the manager drops this subscriber for falling behind.
async fn stream_feed<T: Serialize>(
    mut socket: WebSocket,
    welcome: Option<serde_json::Value>,
    mut rx: mpsc::Receiver<T>,
) -> anyhow::Result<()> {
    if let Some(welcome) = welcome {
        let json = serde_json::to_string(&welcome)?;
        if !send(&mut socket, Message::Text(json.into())).await {
            return Ok(());
        }
    }

    let mut ping_interval = tokio::time::interval(WS_PING_INTERVAL);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            item = rx.recv() => {
                let Some(item) = item else {
                    tracing::debug!("subscription closed by manager");
                    break;
                };
                let json = serde_json::to_string(&item)?;
                if !send(&mut socket, Message::Text(json.into())).await {
                    break;
                }
            }
            _ = ping_interval.tick() => {
                if !send(&mut socket, Message::Ping(Bytes::new())).await {
                    break;
                }
            }
        }
    }
    Ok(())
}

/// False when the client is gone or too slow to take the frame.
async fn send(socket: &mut WebSocket, msg: Message) -> bool {
    matches!(timeout(WS_SEND_TIMEOUT, socket.send(msg)).await, Ok(Ok(())))
}
