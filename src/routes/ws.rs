use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Extension,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use chrono::Utc;
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;

use crate::{
    relay::{Outbound, Relay, Scope},
    state::{SharedRelay, Tx},
};

pub fn router() -> Router {
    Router::new().route("/ws", get(ws_handler))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Extension(relay): Extension<SharedRelay>,
    Extension(tx): Extension<Tx>,
) -> impl IntoResponse {
    // connection identity is ours to assign, opaque to the client
    let conn_id = uuid::Uuid::new_v4().to_string();
    ws.on_upgrade(move |sock| client_session(sock, conn_id, relay, tx))
}

/// Runs one transition under the relay lock. Broadcast sends happen inside
/// the lock so every subscriber sees events in registry-mutation order;
/// sender-only replies are returned for the caller's own sink.
async fn process(
    relay: &SharedRelay,
    tx: &Tx,
    apply: impl FnOnce(&mut Relay) -> Vec<Outbound>,
) -> Vec<String> {
    let mut guard = relay.lock().await;
    let mut direct = Vec::new();
    for out in apply(&mut *guard) {
        let json = match serde_json::to_string(&out.event) {
            Ok(json) => json,
            Err(err) => {
                tracing::error!(%err, "failed to encode outbound event");
                continue;
            }
        };
        match out.scope {
            Scope::All => {
                // no subscribers is fine (last client racing its own close)
                tx.send(json).ok();
            }
            Scope::Sender => direct.push(json),
        }
    }
    direct
}

/* ---------------- per connection ---------------- */

async fn client_session(sock: WebSocket, conn_id: String, relay: SharedRelay, tx: Tx) {
    let mut rx = tx.subscribe();
    let (mut sink, mut stream) = sock.split();
    tracing::debug!(%conn_id, "connection open");

    loop {
        tokio::select! {
            inbound = stream.next() => {
                let Some(Ok(frame)) = inbound else { break };
                match frame {
                    Message::Text(raw) => {
                        let replies =
                            process(&relay, &tx, |r| r.on_text(&conn_id, &raw, Utc::now())).await;
                        if send_all(&mut sink, replies).await.is_err() {
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            fanned_out = rx.recv() => {
                match fanned_out {
                    Ok(json) => {
                        if sink.send(Message::Text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(%conn_id, skipped, "slow consumer dropped broadcasts");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    // terminal transition; the remaining connections hear the leave notice
    process(&relay, &tx, |r| r.on_disconnect(&conn_id, Utc::now())).await;
    tracing::debug!(%conn_id, "connection closed");
}

async fn send_all(
    sink: &mut SplitSink<WebSocket, Message>,
    replies: Vec<String>,
) -> Result<(), axum::Error> {
    for json in replies {
        sink.send(Message::Text(json)).await?;
    }
    Ok(())
}
