/// Shared application state passed to axum handlers.
use std::sync::{Arc, Mutex};

use shareboard_core::gateway::memory::MemoryGateway;
use shareboard_core::gateway::BoardDocument;
use shareboard_core::storage::{KeyValueStore, StorageError};

/// Storage key of the board table snapshot.
pub const SNAPSHOT_KEY: &str = "hub.boards";

#[derive(Clone)]
pub struct AppState {
    /// The board table and its per-board change feeds.
    pub gateway: MemoryGateway,
    /// Where the table is snapshotted after every write. `None` keeps it in memory.
    pub snapshots: Option<Arc<dyn KeyValueStore>>,
    pub port: u16,
    pub bind_address: String,
    /// Held from reading the table until the snapshot is on disk.
    snapshot_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn in_memory(bind_address: impl Into<String>, port: u16) -> Self {
        Self {
            gateway: MemoryGateway::new(),
            snapshots: None,
            port,
            bind_address: bind_address.into(),
            snapshot_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Rebuild the table from the last snapshot (empty if there is none).
    pub fn restore(
        snapshots: Arc<dyn KeyValueStore>,
        bind_address: impl Into<String>,
        port: u16,
    ) -> Result<Self, StorageError> {
        let documents: Vec<BoardDocument> = match snapshots.read(SNAPSHOT_KEY)? {
            Some(raw) => serde_json::from_str(&raw)?,
            None => Vec::new(),
        };
        log::info!(
            target: "shareboard.hub.state",
            "Restored {} board(s) from snapshot",
            documents.len()
        );
        Ok(Self {
            gateway: MemoryGateway::with_documents(documents),
            snapshots: Some(snapshots),
            port,
            bind_address: bind_address.into(),
            snapshot_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Write the whole table. Failures are logged; the in-memory table stays authoritative.
    pub fn persist(&self) {
        if let Err(e) = self.try_persist() {
            log::error!(
                target: "shareboard.hub.state",
                "Failed to write board snapshot: {}",
                e
            );
        }
    }

    /// Snapshot the table. Concurrent callers are serialized so the last
    /// snapshot written is always taken from the newest table.
    pub fn try_persist(&self) -> Result<(), StorageError> {
        let Some(store) = &self.snapshots else {
            return Ok(());
        };
        let _guard = self
            .snapshot_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let raw = serde_json::to_string(&self.gateway.documents())?;
        store.write(SNAPSHOT_KEY, &raw)
    }
}
