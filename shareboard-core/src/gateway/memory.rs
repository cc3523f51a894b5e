/// In-process document store.
///
/// Holds board rows in memory and fans change notifications out to every
/// subscriber of the affected board id, including the writer. Used by tests,
/// by single-process setups, and as the table behind the hub server.
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::*;

#[derive(Default)]
struct Table {
    rows: HashMap<String, BoardDocument>,
    /// board_id -> listener id -> sender
    listeners: HashMap<String, HashMap<u64, mpsc::UnboundedSender<ChangeEvent>>>,
    next_listener: u64,
    offline: bool,
    refuse_subscriptions: bool,
}

impl Table {
    fn broadcast(&mut self, event: ChangeEvent) {
        if let Some(listeners) = self.listeners.get_mut(&event.board_id) {
            listeners.retain(|_, tx| tx.send(event.clone()).is_ok());
        }
    }

    fn check_online(&self) -> Result<(), GatewayError> {
        if self.offline {
            Err(GatewayError::Rejected("store is offline".to_string()))
        } else {
            Ok(())
        }
    }
}

#[derive(Clone, Default)]
pub struct MemoryGateway {
    table: Arc<Mutex<Table>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with existing rows (e.g. loaded from a snapshot file).
    pub fn with_documents(documents: impl IntoIterator<Item = BoardDocument>) -> Self {
        let gateway = Self::new();
        {
            let mut table = gateway.table();
            for doc in documents {
                table.rows.insert(doc.id.clone(), doc);
            }
        }
        gateway
    }

    fn table(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of every row, ordered by id.
    pub fn documents(&self) -> Vec<BoardDocument> {
        let mut docs: Vec<BoardDocument> = self.table().rows.values().cloned().collect();
        docs.sort_by(|a, b| a.id.cmp(&b.id));
        docs
    }

    /// Make lookups and writes fail, simulating an unreachable store.
    pub fn set_offline(&self, offline: bool) {
        self.table().offline = offline;
    }

    /// Make `subscribe` fail, simulating a realtime channel that cannot open.
    pub fn set_refuse_subscriptions(&self, refuse: bool) {
        self.table().refuse_subscriptions = refuse;
    }

    /// Number of live subscriptions for a board.
    pub fn listener_count(&self, board_id: &str) -> usize {
        let mut table = self.table();
        match table.listeners.get_mut(board_id) {
            Some(listeners) => {
                listeners.retain(|_, tx| !tx.is_closed());
                listeners.len()
            }
            None => 0,
        }
    }

    fn write(&self, document: &BoardDocument, insert_only: bool) -> Result<(), GatewayError> {
        let mut table = self.table();
        table.check_online()?;

        let existing = table.rows.get(&document.id);
        if insert_only && existing.is_some() {
            return Err(GatewayError::AlreadyExists(document.id.clone()));
        }
        let kind = if existing.is_some() {
            ChangeKind::Update
        } else {
            ChangeKind::Insert
        };

        let now = now_rfc3339();
        let mut row = document.clone();
        let created_at = existing
            .and_then(|e| e.created_at.clone())
            .or(row.created_at.take())
            .unwrap_or_else(|| now.clone());
        row.created_at = Some(created_at);
        if row.updated_at.is_none() {
            row.updated_at = Some(now);
        }

        table.rows.insert(row.id.clone(), row.clone());
        table.broadcast(ChangeEvent {
            event_type: kind,
            board_id: row.id.clone(),
            new_document: Some(row),
        });
        Ok(())
    }
}

#[async_trait]
impl RemoteBoardGateway for MemoryGateway {
    async fn fetch(&self, board_id: &str) -> Result<Option<BoardDocument>, GatewayError> {
        let table = self.table();
        if table.offline {
            return Err(GatewayError::Transport("store is offline".to_string()));
        }
        Ok(table.rows.get(board_id).cloned())
    }

    async fn insert(&self, document: &BoardDocument) -> Result<(), GatewayError> {
        self.write(document, true)
    }

    async fn upsert(&self, document: &BoardDocument) -> Result<(), GatewayError> {
        self.write(document, false)
    }

    async fn delete(&self, board_id: &str) -> Result<(), GatewayError> {
        let mut table = self.table();
        table.check_online()?;
        if table.rows.remove(board_id).is_some() {
            table.broadcast(ChangeEvent {
                event_type: ChangeKind::Delete,
                board_id: board_id.to_string(),
                new_document: None,
            });
        }
        Ok(())
    }

    async fn subscribe(&self, board_id: &str) -> Result<Subscription, GatewayError> {
        let mut table = self.table();
        if table.refuse_subscriptions {
            return Err(GatewayError::Unavailable(
                "realtime channel refused".to_string(),
            ));
        }
        let listener_id = table.next_listener;
        table.next_listener += 1;
        let (tx, rx) = mpsc::unbounded_channel();
        table
            .listeners
            .entry(board_id.to_string())
            .or_default()
            .insert(listener_id, tx);
        drop(table);

        let weak = Arc::downgrade(&self.table);
        let key = board_id.to_string();
        Ok(Subscription::new(board_id, rx, move || {
            if let Some(table) = weak.upgrade() {
                let mut table = table.lock().unwrap_or_else(PoisonError::into_inner);
                if let Some(listeners) = table.listeners.get_mut(&key) {
                    listeners.remove(&listener_id);
                    if listeners.is_empty() {
                        table.listeners.remove(&key);
                    }
                }
            }
        }))
    }
}
