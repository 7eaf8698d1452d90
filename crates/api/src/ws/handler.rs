use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use gauntlet_events::JobEvent;

use crate::state::AppState;

/// HTTP handler that upgrades the connection to the broadcast WebSocket.
///
/// After the upgrade the connection is subscribed to every bus event,
/// registered with `WsManager`, and served by a sender task plus the
/// receive loop on the current task.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Manage a single WebSocket connection after upgrade.
///
///   1. Subscribes to the bus and registers with `WsManager`.
///   2. Spawns a sender task forwarding control frames and events.
///   3. Processes inbound frames on the current task.
///   4. Cleans up on disconnect.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = uuid::Uuid::new_v4().to_string();

    let mut subscriber = state.event_bus.subscribe_broadcast();
    let subscriber_id = subscriber.id();
    let mut control = state.ws_manager.add(conn_id.clone(), subscriber_id).await;
    tracing::info!(conn_id = %conn_id, subscriber_id, "WebSocket connected");

    let (mut sink, mut stream) = socket.split();

    // New clients start from the current counts.
    let snapshot = JobEvent::StatsUpdate(state.repo.stats().await);
    if sink
        .send(Message::Text(snapshot.to_json().into()))
        .await
        .is_err()
    {
        state.ws_manager.remove(&conn_id).await;
        state.event_bus.unsubscribe(subscriber_id);
        return;
    }

    // Sender task: control frames take priority over queued events.
    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                biased;
                frame = control.recv() => match frame {
                    Some(frame) => frame,
                    None => break,
                },
                event = subscriber.recv() => match event {
                    Some(event) => Message::Text(event.to_json().into()),
                    None => break,
                },
            };

            let closing = matches!(msg, Message::Close(_));
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
            if closing {
                break;
            }
        }
    });

    // Receiver loop: the channel is push-only, inbound data is ignored.
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(_msg) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    // Clean up: remove connection, drop the subscription, stop the sender.
    state.ws_manager.remove(&conn_id).await;
    state.event_bus.unsubscribe(subscriber_id);
    send_task.abort();
    tracing::info!(conn_id = %conn_id, "WebSocket disconnected");
}
