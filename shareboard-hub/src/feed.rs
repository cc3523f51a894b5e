/// WebSocket change feed.
///
/// Protocol:
///   Client connects to /boards/{board_id}/changes.
///   Server subscribes to the board and replies Ready { boardId }.
///   Every insert/update/delete of that row follows as a Change message,
///   including writes made by the subscriber itself.
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use shareboard_core::gateway::{ChangeEvent, RemoteBoardGateway};

use crate::api::{check_board_id, ApiError};
use crate::state::AppState;

/// Messages sent from the hub to a feed subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedMessage {
    #[serde(rename_all = "camelCase")]
    Ready { board_id: String },
    Change(ChangeEvent),
    #[serde(rename_all = "camelCase")]
    Error { message: String },
}

pub fn feed_router() -> Router<AppState> {
    Router::new().route("/boards/{board_id}/changes", get(ws_handler))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(board_id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    check_board_id(&board_id)?;
    Ok(ws.on_upgrade(move |socket| handle_feed_session(socket, board_id, state)))
}

async fn handle_feed_session(socket: WebSocket, board_id: String, state: AppState) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let mut subscription = match state.gateway.subscribe(&board_id).await {
        Ok(subscription) => subscription,
        Err(e) => {
            log::warn!(target: "shareboard.hub.feed", "Subscribe to {} failed: {}", board_id, e);
            let err = serde_json::to_string(&FeedMessage::Error {
                message: e.to_string(),
            })
            .unwrap_or_default();
            let _ = ws_tx.send(Message::Text(err.into())).await;
            return;
        }
    };

    let ready = serde_json::to_string(&FeedMessage::Ready {
        board_id: board_id.clone(),
    })
    .unwrap_or_default();
    if ws_tx.send(Message::Text(ready.into())).await.is_err() {
        return;
    }
    log::info!(target: "shareboard.hub.feed", "Subscriber attached to board {}", board_id);

    // Write task: forward row changes to the socket
    let mut write_task = tokio::spawn(async move {
        while let Some(event) = subscription.next().await {
            let msg = match serde_json::to_string(&FeedMessage::Change(event)) {
                Ok(msg) => msg,
                Err(e) => {
                    log::warn!(target: "shareboard.hub.feed", "Failed to encode change: {}", e);
                    continue;
                }
            };
            if ws_tx.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    // Read task: the feed is one-way; only watch for the close
    let mut read_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_rx.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    // Wait for either task to finish, abort the other to prevent leaks
    tokio::select! {
        _ = &mut write_task => { read_task.abort(); }
        _ = &mut read_task => { write_task.abort(); }
    }

    log::info!(target: "shareboard.hub.feed", "Subscriber detached from board {}", board_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use shareboard_core::gateway::ChangeKind;

    #[test]
    fn test_feed_message_wire_format() {
        let ready = serde_json::to_value(FeedMessage::Ready {
            board_id: "abc123".to_string(),
        })
        .unwrap();
        assert_eq!(ready, serde_json::json!({ "type": "ready", "boardId": "abc123" }));

        let change = serde_json::to_value(FeedMessage::Change(ChangeEvent {
            event_type: ChangeKind::Delete,
            board_id: "abc123".to_string(),
            new_document: None,
        }))
        .unwrap();
        assert_eq!(change["type"], "change");
        assert_eq!(change["eventType"], "DELETE");
        assert_eq!(change["boardId"], "abc123");

        let parsed: FeedMessage = serde_json::from_value(change).unwrap();
        assert!(matches!(parsed, FeedMessage::Change(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_feed_rejects_invalid_board_id() {
        let port = crate::server::spawn_server(AppState::in_memory("127.0.0.1", 0))
            .await
            .unwrap();
        let url = format!("ws://127.0.0.1:{}/boards/bad.id/changes", port);
        match tokio_tungstenite::connect_async(url).await {
            Err(tokio_tungstenite::tungstenite::Error::Http(resp)) => {
                assert_eq!(resp.status().as_u16(), 400);
            }
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("feed opened for an invalid board id"),
        }
    }
}
