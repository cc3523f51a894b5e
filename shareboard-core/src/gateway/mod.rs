/// Narrow interface to the shared document store.
///
/// One logical row per board: `{ id, app_id, board_data, settings,
/// created_at, updated_at }`. The store offers point lookup, insert, full
/// upsert, delete and a change feed scoped to a single board id that
/// delivers `{ eventType, boardId, new }` notifications to every subscriber,
/// including the client that made the write.
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::types::{Column, Settings};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardDocument {
    pub id: String,
    #[serde(default)]
    pub app_id: String,
    #[serde(default)]
    pub board_data: Vec<Column>,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl BoardDocument {
    /// Build a document stamped with the current time as `updated_at`.
    pub fn new(
        id: impl Into<String>,
        app_id: impl Into<String>,
        board_data: Vec<Column>,
        settings: Settings,
    ) -> Self {
        Self {
            id: id.into(),
            app_id: app_id.into(),
            board_data,
            settings,
            created_at: None,
            updated_at: Some(now_rfc3339()),
        }
    }

    pub fn mutation_id(&self) -> &str {
        &self.settings.last_mutation_id
    }
}

pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One change-feed notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub event_type: ChangeKind,
    pub board_id: String,
    /// Row after the change; `None` for deletes.
    #[serde(rename = "new", default)]
    pub new_document: Option<BoardDocument>,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Document store unavailable: {0}")]
    Unavailable(String),

    #[error("Board already exists: {0}")]
    AlreadyExists(String),

    #[error("Write rejected: {0}")]
    Rejected(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed response: {0}")]
    Decode(String),
}

/// Live change feed for one board. Dropping (or cancelling) the subscription
/// detaches it from the store; no event is delivered afterwards.
pub struct Subscription {
    board_id: String,
    events: mpsc::UnboundedReceiver<ChangeEvent>,
    on_cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(
        board_id: impl Into<String>,
        events: mpsc::UnboundedReceiver<ChangeEvent>,
        on_cancel: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            board_id: board_id.into(),
            events,
            on_cancel: Some(Box::new(on_cancel)),
        }
    }

    pub fn board_id(&self) -> &str {
        &self.board_id
    }

    /// Next notification, or `None` once the feed has closed.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }

    /// Non-blocking poll for an already delivered notification.
    pub fn try_next(&mut self) -> Option<ChangeEvent> {
        self.events.try_recv().ok()
    }

    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.events.close();
        if let Some(on_cancel) = self.on_cancel.take() {
            on_cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("board_id", &self.board_id)
            .finish_non_exhaustive()
    }
}

/// Abstract document store. Implementations: [`memory::MemoryGateway`]
/// (in-process), the hub's HTTP/WebSocket client.
#[async_trait]
pub trait RemoteBoardGateway: Send + Sync {
    /// Point lookup. `Ok(None)` when no row exists for the id.
    async fn fetch(&self, board_id: &str) -> Result<Option<BoardDocument>, GatewayError>;

    /// Insert a new row; fails with `AlreadyExists` if the id is taken.
    async fn insert(&self, document: &BoardDocument) -> Result<(), GatewayError>;

    /// Insert or overwrite the whole row.
    async fn upsert(&self, document: &BoardDocument) -> Result<(), GatewayError>;

    async fn delete(&self, board_id: &str) -> Result<(), GatewayError>;

    /// Open a change feed scoped to one board id.
    async fn subscribe(&self, board_id: &str) -> Result<Subscription, GatewayError>;

    fn unsubscribe(&self, subscription: Subscription) {
        subscription.cancel();
    }
}
