use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::{sync::mpsc, time};

use super::WebSocketManager;

/// Interval between server-initiated pings.
const PING_EVERY: Duration = Duration::from_secs(30);

/// Pumps every broadcast on `topic` down `socket` until the client goes away.
///
/// The stream is one-directional: inbound frames other than ping/close are ignored.
pub async fn serve_topic(
    socket: WebSocket,
    manager: WebSocketManager,
    topic: String,
    user_id: i64,
) {
    let mut rx = manager.subscribe(&topic).await;
    manager.register(&topic, user_id).await;

    let (mut sink, mut inbound) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<Message>(64);

    let writer = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            if sink.send(frame).await.is_err() {
                break;
            }
        }
    });

    let forward = {
        let out_tx = out_tx.clone();
        tokio::spawn(async move {
            while let Ok(msg) = rx.recv().await {
                if out_tx.send(Message::Text(msg.into())).await.is_err() {
                    break;
                }
            }
        })
    };

    let ping = {
        let out_tx = out_tx.clone();
        tokio::spawn(async move {
            loop {
                time::sleep(PING_EVERY).await;
                if out_tx.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
        })
    };

    while let Some(Ok(msg)) = inbound.next().await {
        match msg {
            Message::Ping(payload) => {
                let _ = out_tx.send(Message::Pong(payload)).await;
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    forward.abort();
    ping.abort();
    drop(out_tx);
    let _ = writer.await;
    manager.unregister(&topic, user_id).await;
    tracing::info!(%topic, user_id, "ws session ended");
}
