/// Hub client: `RemoteBoardGateway` over HTTP (rows) and WebSocket (change feed).
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::StatusCode;
use shareboard_core::gateway::{BoardDocument, GatewayError, RemoteBoardGateway, Subscription};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use crate::feed::FeedMessage;

const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

const READY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct HttpGateway {
    base_url: String,
    client: reqwest::Client,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn ensure_configured(&self) -> Result<(), GatewayError> {
        if self.base_url.is_empty() {
            Err(GatewayError::Unavailable("no hub URL configured".to_string()))
        } else {
            Ok(())
        }
    }

    fn board_url(&self, board_id: &str) -> String {
        format!(
            "{}/boards/{}",
            self.base_url,
            utf8_percent_encode(board_id, PATH_SEGMENT)
        )
    }

    fn feed_url(&self, board_id: &str) -> String {
        format!(
            "{}/changes",
            self.board_url(board_id)
                .replacen("http://", "ws://", 1)
                .replacen("https://", "wss://", 1)
        )
    }
}

fn transport(e: reqwest::Error) -> GatewayError {
    GatewayError::Transport(e.to_string())
}

/// Turn a non-success response into an error, keeping the hub's message.
async fn rejected(resp: reqwest::Response) -> GatewayError {
    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|v| v["error"].as_str().map(str::to_string))
        .unwrap_or(text);
    GatewayError::Rejected(format!("{}: {}", status, message))
}

#[async_trait]
impl RemoteBoardGateway for HttpGateway {
    async fn fetch(&self, board_id: &str) -> Result<Option<BoardDocument>, GatewayError> {
        self.ensure_configured()?;
        let resp = self
            .client
            .get(self.board_url(board_id))
            .send()
            .await
            .map_err(transport)?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => resp
                .json::<BoardDocument>()
                .await
                .map(Some)
                .map_err(|e| GatewayError::Decode(e.to_string())),
            _ => Err(rejected(resp).await),
        }
    }

    async fn insert(&self, document: &BoardDocument) -> Result<(), GatewayError> {
        self.ensure_configured()?;
        let resp = self
            .client
            .post(format!("{}/boards", self.base_url))
            .json(document)
            .send()
            .await
            .map_err(transport)?;
        match resp.status() {
            StatusCode::CONFLICT => Err(GatewayError::AlreadyExists(document.id.clone())),
            status if status.is_success() => Ok(()),
            _ => Err(rejected(resp).await),
        }
    }

    async fn upsert(&self, document: &BoardDocument) -> Result<(), GatewayError> {
        self.ensure_configured()?;
        let resp = self
            .client
            .put(self.board_url(&document.id))
            .json(document)
            .send()
            .await
            .map_err(transport)?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(rejected(resp).await)
        }
    }

    async fn delete(&self, board_id: &str) -> Result<(), GatewayError> {
        self.ensure_configured()?;
        let resp = self
            .client
            .delete(self.board_url(board_id))
            .send()
            .await
            .map_err(transport)?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(()),
            status if status.is_success() => Ok(()),
            _ => Err(rejected(resp).await),
        }
    }

    async fn subscribe(&self, board_id: &str) -> Result<Subscription, GatewayError> {
        self.ensure_configured()?;
        let url = self.feed_url(board_id);
        let (ws_stream, _) = tokio_tungstenite::connect_async(&url)
            .await
            .map_err(|e| GatewayError::Transport(format!("WS connect failed: {}", e)))?;
        let (mut ws_tx, mut ws_rx) = ws_stream.split();

        // The hub acknowledges once the feed is attached; nothing is missed after this.
        let ready = tokio::time::timeout(READY_TIMEOUT, async {
            while let Some(msg) = ws_rx.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        return serde_json::from_str::<FeedMessage>(&text).ok();
                    }
                    Ok(Message::Close(_)) | Err(_) => return None,
                    Ok(_) => continue,
                }
            }
            None
        })
        .await;
        match ready {
            Ok(Some(FeedMessage::Ready { .. })) => {}
            Ok(Some(FeedMessage::Error { message })) => {
                return Err(GatewayError::Rejected(message));
            }
            _ => {
                return Err(GatewayError::Transport(format!(
                    "change feed for {} did not become ready",
                    board_id
                )));
            }
        }
        log::info!(target: "shareboard.hub.client", "Subscribed to {}", url);

        let (tx, rx) = mpsc::unbounded_channel();
        let feed_board = board_id.to_string();
        let task = tokio::spawn(async move {
            while let Some(msg) = ws_rx.next().await {
                let text = match msg {
                    Ok(Message::Text(t)) => t.to_string(),
                    Ok(Message::Ping(data)) => {
                        let _ = ws_tx.send(Message::Pong(data)).await;
                        continue;
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        log::warn!(target: "shareboard.hub.client", "WS read error for {}: {}", feed_board, e);
                        break;
                    }
                };
                match serde_json::from_str::<FeedMessage>(&text) {
                    Ok(FeedMessage::Change(event)) => {
                        if tx.send(event).is_err() {
                            break;
                        }
                    }
                    Ok(FeedMessage::Error { message }) => {
                        log::error!(target: "shareboard.hub.client", "Hub error for {}: {}", feed_board, message);
                        break;
                    }
                    Ok(FeedMessage::Ready { .. }) => {}
                    Err(e) => {
                        log::warn!(target: "shareboard.hub.client", "Unreadable feed message for {}: {}", feed_board, e);
                    }
                }
            }
            log::info!(target: "shareboard.hub.client", "Change feed for {} closed", feed_board);
        });

        let abort = task.abort_handle();
        Ok(Subscription::new(board_id, rx, move || abort.abort()))
    }
}
