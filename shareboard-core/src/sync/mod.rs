/// Board session synchronization.
///
/// Local mutations are applied to the store first, rendered, then pushed as a
/// whole document to the remote store in the background, one write at a time
/// in the order they were made. Change notifications coming back are either
/// recognised as our own echo and dropped, or replace the local board
/// wholesale.
pub mod coordinator;
pub mod echo;

pub use coordinator::{Applied, BoardSource, ConnectReport, PushHandle, RemoteOutcome, SyncCoordinator};
pub use echo::{EchoMatch, MutationEchoGuard};

use crate::gateway::GatewayError;
use crate::store::BoardError;

/// Notifications for the rendering layer.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The session now shows this board.
    Connected { board_id: String, realtime: bool },
    /// Board content changed; redraw from the store.
    Render,
    /// Labels or members may have changed under an open editor.
    SettingsRefreshed,
    /// Transient user-facing message.
    Notice { level: NoticeLevel, message: String },
    SyncStatus(SyncStatus),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Syncing,
    Idle,
    Failed,
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Board not found: {0}")]
    NotFound(String),

    #[error("Document store unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("Failed to persist board {board_id}: {source}")]
    PersistFailure {
        board_id: String,
        #[source]
        source: GatewayError,
    },

    #[error("Realtime subscription failed for board {board_id}: {source}")]
    SubscriptionFailure {
        board_id: String,
        #[source]
        source: GatewayError,
    },

    #[error(transparent)]
    Board(#[from] BoardError),

    #[error("No board connected")]
    NotConnected,
}
