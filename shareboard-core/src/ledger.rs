/// Device-local history of visited boards for the quick-access list.
///
/// Most recent first, capped, one entry per board id. Read and written as a
/// single JSON array under a fixed storage key. Not synchronized anywhere.
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::storage::{KeyValueStore, StorageError};

pub const DEFAULT_LIMIT: usize = 5;
pub const DEFAULT_KEY: &str = "shareboard.recentBoards";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentBoard {
    pub id: String,
    pub title: String,
    pub last_seen_date: String,
}

pub struct RecentBoardsLedger {
    store: Arc<dyn KeyValueStore>,
    key: String,
    limit: usize,
    entries: Vec<RecentBoard>,
}

impl RecentBoardsLedger {
    /// Load the ledger. A missing or unreadable value starts an empty list.
    pub fn load(store: Arc<dyn KeyValueStore>, key: impl Into<String>, limit: usize) -> Self {
        let key = key.into();
        let entries = match store.read(&key) {
            Ok(Some(raw)) => serde_json::from_str::<Vec<RecentBoard>>(&raw).unwrap_or_else(|e| {
                log::warn!("[shareboard.ledger] Discarding unreadable recent boards: {}", e);
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                log::warn!("[shareboard.ledger] Failed to read recent boards: {}", e);
                Vec::new()
            }
        };
        let mut ledger = Self {
            store,
            key,
            limit: limit.max(1),
            entries,
        };
        ledger.entries.truncate(ledger.limit);
        ledger
    }

    pub fn entries(&self) -> &[RecentBoard] {
        &self.entries
    }

    /// Move (or add) a board to the front, stamped with today's date.
    pub fn record_visit(&mut self, board_id: &str, title: &str) -> Result<(), StorageError> {
        self.record_visit_on(board_id, title, chrono::Local::now().date_naive())
    }

    pub fn record_visit_on(
        &mut self,
        board_id: &str,
        title: &str,
        date: NaiveDate,
    ) -> Result<(), StorageError> {
        self.entries.retain(|e| e.id != board_id);
        self.entries.insert(
            0,
            RecentBoard {
                id: board_id.to_string(),
                title: title.to_string(),
                last_seen_date: date.format("%Y-%m-%d").to_string(),
            },
        );
        self.entries.truncate(self.limit);
        self.persist()
    }

    /// Drop a board from the history (e.g. after deleting it).
    pub fn remove(&mut self, board_id: &str) -> Result<(), StorageError> {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != board_id);
        if self.entries.len() == before {
            return Ok(());
        }
        self.persist()
    }

    fn persist(&self) -> Result<(), StorageError> {
        let raw = serde_json::to_string(&self.entries)?;
        self.store.write(&self.key, &raw)
    }
}
