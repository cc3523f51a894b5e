/// Session orchestration: connect, push, apply remote changes.
///
/// The coordinator owns the board session: the state store, the echo guard,
/// the recent-boards ledger and at most one live change feed. All mutation
/// goes through `&mut self`, so local state never races with itself; the only
/// race is against the remote store and is settled by last-writer-wins.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc, oneshot};

use super::echo::{EchoMatch, MutationEchoGuard};
use super::{NoticeLevel, SessionEvent, SyncError, SyncStatus};
use crate::config::SessionConfig;
use crate::gateway::{
    BoardDocument, ChangeEvent, ChangeKind, GatewayError, RemoteBoardGateway, Subscription,
};
use crate::ids;
use crate::ledger::{RecentBoard, RecentBoardsLedger};
use crate::storage::KeyValueStore;
use crate::store::{BoardMutation, BoardStateStore, MutationOutcome};
use crate::template;
use crate::types::Settings;

const EVENT_CAPACITY: usize = 256;

/// Completion of a queued push.
pub type PushHandle = oneshot::Receiver<Result<(), SyncError>>;

struct PushJob {
    document: BoardDocument,
    done: oneshot::Sender<Result<(), SyncError>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardSource {
    /// An existing row was loaded.
    Loaded,
    /// No row existed; the board was seeded from the template and inserted.
    Created,
    /// The lookup failed; the board stays empty until a change arrives.
    Unreachable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectReport {
    pub board_id: String,
    pub source: BoardSource,
    /// Whether a change feed is open. `false` means a non-realtime session.
    pub realtime: bool,
}

/// Result of a local mutation.
#[derive(Debug)]
pub struct Applied {
    pub outcome: MutationOutcome,
    pub push: Option<PushHandle>,
}

/// What a remote change notification did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOutcome {
    /// Our own write coming back; dropped.
    Echo,
    /// Local board replaced by the remote snapshot.
    Replaced,
    /// The row was deleted; local board reset to the template.
    Reset,
    /// Not for the current board, or malformed.
    Ignored,
}

pub struct SyncCoordinator {
    gateway: Arc<dyn RemoteBoardGateway>,
    config: SessionConfig,
    store: BoardStateStore,
    echo: MutationEchoGuard,
    ledger: RecentBoardsLedger,
    subscription: Option<Subscription>,
    events: broadcast::Sender<SessionEvent>,
    in_flight: Arc<AtomicUsize>,
    /// Upserts reach the remote store in the order they were queued.
    writer: Option<mpsc::UnboundedSender<PushJob>>,
}

impl SyncCoordinator {
    pub fn new(
        gateway: Arc<dyn RemoteBoardGateway>,
        storage: Arc<dyn KeyValueStore>,
        config: SessionConfig,
    ) -> Self {
        let ledger = RecentBoardsLedger::load(
            storage,
            config.recent_boards_key.clone(),
            config.recent_boards_limit,
        );
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            gateway,
            config,
            store: BoardStateStore::new(),
            echo: MutationEchoGuard::new(),
            ledger,
            subscription: None,
            events,
            in_flight: Arc::new(AtomicUsize::new(0)),
            writer: None,
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn store(&self) -> &BoardStateStore {
        &self.store
    }

    pub fn board_id(&self) -> Option<&str> {
        self.store.board_id()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn recent_boards(&self) -> &[RecentBoard] {
        self.ledger.entries()
    }

    pub fn is_realtime(&self) -> bool {
        self.subscription.is_some()
    }

    /// Number of self-originated pushes whose echo has not come back yet.
    pub fn pending_echoes(&self) -> usize {
        self.echo.pending_count()
    }

    fn emit(&self, event: SessionEvent) {
        // No receivers is fine: nothing is rendering.
        let _ = self.events.send(event);
    }

    fn notice(&self, level: NoticeLevel, message: &str) {
        self.emit(SessionEvent::Notice {
            level,
            message: message.to_string(),
        });
    }

    fn document(&self, board_id: &str) -> BoardDocument {
        BoardDocument::new(
            board_id,
            self.config.app_id.clone(),
            self.store.columns().to_vec(),
            self.store.settings().clone(),
        )
    }

    // ── Connection ──────────────────────────────────────────────────────

    /// Switch the session to `board_id`: load it, or create it from the
    /// template if no row exists, then open its change feed.
    pub async fn connect(&mut self, board_id: &str) -> Result<ConnectReport, SyncError> {
        self.disconnect();
        let fetched = self.gateway.fetch(board_id).await;
        self.attach(board_id, fetched).await
    }

    /// Open an existing board by its code. Unknown codes are rejected and the
    /// current session is left as it was.
    pub async fn join(&mut self, code: &str) -> Result<ConnectReport, SyncError> {
        let code = code.trim().to_ascii_lowercase();
        let well_formed = code.chars().count() == self.config.join_code_length
            && code.chars().all(ids::is_code_char);
        if !well_formed {
            self.notice(NoticeLevel::Error, "Invalid board code");
            return Err(SyncError::NotFound(code));
        }

        match self.gateway.fetch(&code).await {
            Ok(None) => {
                log::info!("[shareboard.sync] Join rejected, no board {}", code);
                self.notice(NoticeLevel::Error, "Board not found");
                Err(SyncError::NotFound(code))
            }
            fetched => self.attach(&code, fetched).await,
        }
    }

    /// Generate a fresh board code and connect to it.
    pub async fn create_board(&mut self) -> Result<ConnectReport, SyncError> {
        let code = ids::board_code(self.config.join_code_length);
        log::info!("[shareboard.sync] Creating board {}", code);
        self.connect(&code).await
    }

    /// Drop the change feed and forget outstanding echo tokens. Idempotent.
    pub fn disconnect(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            log::debug!(
                "[shareboard.sync] Closing change feed for {}",
                subscription.board_id()
            );
            self.gateway.unsubscribe(subscription);
        }
        self.echo.clear();
    }

    async fn attach(
        &mut self,
        board_id: &str,
        fetched: Result<Option<BoardDocument>, GatewayError>,
    ) -> Result<ConnectReport, SyncError> {
        self.disconnect();

        let source = match fetched {
            Ok(Some(doc)) => {
                log::info!("[shareboard.sync] Loaded board {}", board_id);
                self.store.set_board_id(board_id);
                self.store.replace_all(doc.board_data, doc.settings);
                self.emit(SessionEvent::Render);
                self.remember_visit();
                BoardSource::Loaded
            }
            Ok(None) => {
                log::info!(
                    "[shareboard.sync] Board {} not found, creating from template",
                    board_id
                );
                self.store.set_board_id(board_id);
                self.store
                    .replace_all(template::default_columns(), template::default_settings());
                self.emit(SessionEvent::Render);
                self.insert_seeded(board_id).await;
                BoardSource::Created
            }
            Err(GatewayError::Unavailable(reason)) => {
                log::error!("[shareboard.sync] Document store unavailable: {}", reason);
                self.store.clear_board_id();
                self.notice(NoticeLevel::Error, "Document store unavailable");
                return Err(SyncError::GatewayUnavailable(reason));
            }
            Err(e) => {
                log::error!("[shareboard.sync] Error fetching board {}: {}", board_id, e);
                self.store.set_board_id(board_id);
                self.store.replace_all(Vec::new(), Settings::default());
                self.emit(SessionEvent::Render);
                self.notice(NoticeLevel::Error, "Error connecting to server");
                BoardSource::Unreachable
            }
        };

        let realtime = self.open_feed(board_id).await;
        self.emit(SessionEvent::Connected {
            board_id: board_id.to_string(),
            realtime,
        });
        Ok(ConnectReport {
            board_id: board_id.to_string(),
            source,
            realtime,
        })
    }

    async fn insert_seeded(&mut self, board_id: &str) {
        let token = self.echo.issue();
        self.store.stamp_mutation(&token);
        let doc = self.document(board_id);

        match self.gateway.insert(&doc).await {
            Ok(()) => {}
            Err(GatewayError::AlreadyExists(_)) => {
                // Another client created it first; take theirs.
                log::info!(
                    "[shareboard.sync] Board {} was created concurrently, reloading",
                    board_id
                );
                match self.gateway.fetch(board_id).await {
                    Ok(Some(doc)) => {
                        self.store.replace_all(doc.board_data, doc.settings);
                        self.emit(SessionEvent::Render);
                    }
                    Ok(None) => {}
                    Err(e) => log::warn!("[shareboard.sync] Reload of {} failed: {}", board_id, e),
                }
            }
            Err(source) => {
                let err = SyncError::PersistFailure {
                    board_id: board_id.to_string(),
                    source,
                };
                log::error!("[shareboard.sync] {}", err);
                self.notice(NoticeLevel::Error, "Failed to create board");
            }
        }
    }

    async fn open_feed(&mut self, board_id: &str) -> bool {
        match self.gateway.subscribe(board_id).await {
            Ok(subscription) => {
                self.subscription = Some(subscription);
                true
            }
            Err(source) => {
                let err = SyncError::SubscriptionFailure {
                    board_id: board_id.to_string(),
                    source,
                };
                log::warn!("[shareboard.sync] {}, continuing without live updates", err);
                self.notice(NoticeLevel::Error, "Live updates unavailable");
                false
            }
        }
    }

    fn remember_visit(&mut self) {
        let Some(board_id) = self.store.board_id().map(str::to_string) else {
            return;
        };
        let title = self.store.settings().display_title().to_string();
        if let Err(e) = self.ledger.record_visit(&board_id, &title) {
            log::warn!("[shareboard.ledger] Failed to save recent boards: {}", e);
        }
    }

    // ── Local mutations ─────────────────────────────────────────────────

    /// Apply a user gesture: mutate, render, then push in the background.
    pub fn apply(&mut self, mutation: BoardMutation) -> Result<Applied, SyncError> {
        if self.store.board_id().is_none() {
            return Err(SyncError::NotConnected);
        }
        let outcome = self.store.apply(mutation)?;
        if outcome.needs_render() {
            self.emit(SessionEvent::Render);
        }
        let push = if outcome.needs_push() {
            Some(self.push()?)
        } else {
            None
        };
        Ok(Applied { outcome, push })
    }

    /// Stamp a fresh token and queue an upsert of the whole board without
    /// waiting. Local state is never rolled back if the write fails.
    pub fn push(&mut self) -> Result<PushHandle, SyncError> {
        let board_id = self
            .store
            .board_id()
            .map(str::to_string)
            .ok_or(SyncError::NotConnected)?;
        let runtime =
            Handle::try_current().map_err(|e| SyncError::GatewayUnavailable(e.to_string()))?;
        if self.writer.as_ref().map_or(true, mpsc::UnboundedSender::is_closed) {
            self.writer = Some(self.spawn_writer(&runtime));
        }

        let token = self.echo.issue();
        self.store.stamp_mutation(&token);
        let document = self.document(&board_id);
        log::debug!("[shareboard.sync] Pushing {} with token {}", board_id, token);

        self.in_flight.fetch_add(1, Ordering::SeqCst);
        self.emit(SessionEvent::SyncStatus(SyncStatus::Syncing));

        let (done, handle) = oneshot::channel();
        let queued = self
            .writer
            .as_ref()
            .is_some_and(|tx| tx.send(PushJob { document, done }).is_ok());
        if !queued {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            return Err(SyncError::GatewayUnavailable(
                "push writer stopped".to_string(),
            ));
        }
        Ok(handle)
    }

    /// Start the task that performs queued upserts one after another.
    fn spawn_writer(&self, runtime: &Handle) -> mpsc::UnboundedSender<PushJob> {
        let (tx, mut rx) = mpsc::unbounded_channel::<PushJob>();
        let gateway = Arc::clone(&self.gateway);
        let events = self.events.clone();
        let in_flight = Arc::clone(&self.in_flight);
        let linger = Duration::from_millis(self.config.sync_indicator_linger_ms);

        runtime.spawn(async move {
            while let Some(job) = rx.recv().await {
                let result = gateway.upsert(&job.document).await;
                let remaining = in_flight.fetch_sub(1, Ordering::SeqCst) - 1;
                let result = match result {
                    Ok(()) => {
                        if linger.is_zero() {
                            if remaining == 0 {
                                let _ = events.send(SessionEvent::SyncStatus(SyncStatus::Idle));
                            }
                        } else {
                            let events = events.clone();
                            let in_flight = Arc::clone(&in_flight);
                            tokio::spawn(async move {
                                tokio::time::sleep(linger).await;
                                if in_flight.load(Ordering::SeqCst) == 0 {
                                    let _ =
                                        events.send(SessionEvent::SyncStatus(SyncStatus::Idle));
                                }
                            });
                        }
                        Ok(())
                    }
                    Err(source) => {
                        let err = SyncError::PersistFailure {
                            board_id: job.document.id.clone(),
                            source,
                        };
                        log::error!("[shareboard.sync] {}", err);
                        let _ = events.send(SessionEvent::Notice {
                            level: NoticeLevel::Error,
                            message: "Failed to save changes".to_string(),
                        });
                        let _ = events.send(SessionEvent::SyncStatus(SyncStatus::Failed));
                        Err(err)
                    }
                };
                let _ = job.done.send(result);
            }
            log::debug!("[shareboard.sync] Push writer stopped");
        });
        tx
    }

    /// Delete the current board from the remote store and from the recent
    /// list. The view resets when the delete notification arrives.
    pub async fn delete_board(&mut self) -> Result<(), SyncError> {
        let board_id = self
            .store
            .board_id()
            .map(str::to_string)
            .ok_or(SyncError::NotConnected)?;

        if let Err(source) = self.gateway.delete(&board_id).await {
            let err = SyncError::PersistFailure { board_id, source };
            log::error!("[shareboard.sync] {}", err);
            self.notice(NoticeLevel::Error, "Failed to delete board");
            return Err(err);
        }
        log::info!("[shareboard.sync] Deleted board {}", board_id);

        if let Err(e) = self.ledger.remove(&board_id) {
            log::warn!("[shareboard.ledger] Failed to save recent boards: {}", e);
        }
        if self.subscription.is_none() {
            self.reset_view();
        }
        self.notice(NoticeLevel::Success, "Board deleted");
        Ok(())
    }

    // ── Remote changes ──────────────────────────────────────────────────

    /// Wait for the next change notification and apply it. `None` when no
    /// feed is open or the feed has closed.
    pub async fn next_remote_change(&mut self) -> Option<RemoteOutcome> {
        let event = self.subscription.as_mut()?.next().await;
        match event {
            Some(event) => Some(self.handle_change(event)),
            None => {
                log::warn!("[shareboard.sync] Change feed closed");
                self.subscription = None;
                None
            }
        }
    }

    /// Apply every notification already delivered, without waiting.
    pub fn drain_remote_changes(&mut self) -> Vec<RemoteOutcome> {
        let mut outcomes = Vec::new();
        while let Some(event) = self.subscription.as_mut().and_then(Subscription::try_next) {
            outcomes.push(self.handle_change(event));
        }
        outcomes
    }

    pub fn handle_change(&mut self, event: ChangeEvent) -> RemoteOutcome {
        if self.store.board_id() != Some(event.board_id.as_str()) {
            log::debug!(
                "[shareboard.sync] Ignoring change for other board {}",
                event.board_id
            );
            return RemoteOutcome::Ignored;
        }

        match event.event_type {
            ChangeKind::Insert | ChangeKind::Update => {
                let Some(doc) = event.new_document else {
                    log::warn!(
                        "[shareboard.sync] {:?} for {} without a document",
                        event.event_type,
                        event.board_id
                    );
                    return RemoteOutcome::Ignored;
                };
                match self.echo.match_echo(doc.mutation_id()) {
                    // A newer push of ours lands after this one.
                    EchoMatch::Superseded => {
                        log::debug!("[shareboard.sync] Suppressed echo {}", doc.mutation_id());
                        return RemoteOutcome::Echo;
                    }
                    EchoMatch::Latest
                        if self.store.content_eq(&doc.board_data, &doc.settings) =>
                    {
                        log::debug!("[shareboard.sync] Suppressed echo {}", doc.mutation_id());
                        return RemoteOutcome::Echo;
                    }
                    EchoMatch::Latest => {
                        log::info!(
                            "[shareboard.sync] Own write to {} landed after a remote change, adopting it",
                            event.board_id
                        );
                    }
                    EchoMatch::Foreign => {
                        log::info!("[shareboard.sync] Remote update for {}", event.board_id);
                    }
                }
                self.store.replace_all(doc.board_data, doc.settings);
                self.emit(SessionEvent::Render);
                self.emit(SessionEvent::SettingsRefreshed);
                RemoteOutcome::Replaced
            }
            ChangeKind::Delete => {
                log::info!("[shareboard.sync] Board {} was deleted", event.board_id);
                self.reset_view();
                self.notice(NoticeLevel::Info, "This board was deleted");
                RemoteOutcome::Reset
            }
        }
    }

    fn reset_view(&mut self) {
        self.store.reset_to_template();
        self.emit(SessionEvent::Render);
        self.emit(SessionEvent::SettingsRefreshed);
    }
}

impl Drop for SyncCoordinator {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::memory::MemoryGateway;
    use crate::landing::{InputOutcome, JoinCodeInput};
    use crate::storage::MemoryStore;
    use crate::types::LabelColor;
    use async_trait::async_trait;

    fn config() -> SessionConfig {
        SessionConfig {
            app_id: "test-app".to_string(),
            sync_indicator_linger_ms: 0,
            ..SessionConfig::default()
        }
    }

    fn coordinator(gw: &MemoryGateway) -> SyncCoordinator {
        SyncCoordinator::new(
            Arc::new(gw.clone()),
            Arc::new(MemoryStore::new()),
            config(),
        )
    }

    fn seeded_gateway(board_id: &str, title: &str) -> MemoryGateway {
        let mut settings = template::default_settings();
        settings.board_title = title.to_string();
        MemoryGateway::with_documents(vec![BoardDocument::new(
            board_id,
            "test-app",
            template::default_columns(),
            settings,
        )])
    }

    fn drain_events(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    async fn settle(applied: Applied) -> Result<(), SyncError> {
        match applied.push {
            Some(handle) => handle.await.unwrap(),
            None => Ok(()),
        }
    }

    #[tokio::test]
    async fn test_connect_creates_missing_board() {
        let gw = MemoryGateway::new();
        let mut session = coordinator(&gw);

        let report = session.connect("abc123").await.unwrap();
        assert_eq!(report.source, BoardSource::Created);
        assert!(report.realtime);

        let row = gw.fetch("abc123").await.unwrap().unwrap();
        assert_eq!(row.board_data, template::default_columns());
        assert_eq!(row.app_id, "test-app");
        assert!(!row.mutation_id().is_empty());
        assert_eq!(session.store().columns().len(), 2);
        // only boards that already existed are remembered
        assert!(session.recent_boards().is_empty());
    }

    #[tokio::test]
    async fn test_connect_loads_existing_board() {
        let gw = seeded_gateway("abc123", "Roadmap");
        let mut session = coordinator(&gw);
        let mut events = session.subscribe_events();

        let report = session.connect("abc123").await.unwrap();
        assert_eq!(report.source, BoardSource::Loaded);
        assert_eq!(session.store().settings().board_title, "Roadmap");
        assert_eq!(session.recent_boards()[0].id, "abc123");
        assert_eq!(session.recent_boards()[0].title, "Roadmap");

        let events = drain_events(&mut events);
        assert_eq!(events[0], SessionEvent::Render);
        assert!(events.contains(&SessionEvent::Connected {
            board_id: "abc123".to_string(),
            realtime: true,
        }));
    }

    #[tokio::test]
    async fn test_own_echo_leaves_store_untouched() {
        let gw = seeded_gateway("abc123", "Roadmap");
        let mut session = coordinator(&gw);
        session.connect("abc123").await.unwrap();

        let applied = session
            .apply(BoardMutation::CreateColumn {
                title: "Backlog".to_string(),
            })
            .unwrap();
        settle(applied).await.unwrap();

        let revision = session.store().revision();
        let columns = session.store().columns().to_vec();
        assert_eq!(session.next_remote_change().await, Some(RemoteOutcome::Echo));
        assert_eq!(session.store().revision(), revision);
        assert_eq!(session.store().columns(), columns.as_slice());
        assert_eq!(session.pending_echoes(), 0);
    }

    #[tokio::test]
    async fn test_echoes_of_queued_pushes_are_suppressed() {
        let gw = seeded_gateway("abc123", "Roadmap");
        let mut session = coordinator(&gw);
        session.connect("abc123").await.unwrap();

        let first = session
            .apply(BoardMutation::RenameBoard {
                title: "One".to_string(),
            })
            .unwrap();
        let second = session
            .apply(BoardMutation::RenameBoard {
                title: "Two".to_string(),
            })
            .unwrap();
        settle(first).await.unwrap();
        settle(second).await.unwrap();

        let revision = session.store().revision();
        assert_eq!(
            session.drain_remote_changes(),
            vec![RemoteOutcome::Echo, RemoteOutcome::Echo]
        );
        assert_eq!(session.store().revision(), revision);
        assert_eq!(session.store().settings().board_title, "Two");
    }

    /// Delays the first upsert so a later one could overtake it.
    struct SlowFirstUpsert {
        inner: MemoryGateway,
        delayed: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl RemoteBoardGateway for SlowFirstUpsert {
        async fn fetch(&self, board_id: &str) -> Result<Option<BoardDocument>, GatewayError> {
            self.inner.fetch(board_id).await
        }
        async fn insert(&self, document: &BoardDocument) -> Result<(), GatewayError> {
            self.inner.insert(document).await
        }
        async fn upsert(&self, document: &BoardDocument) -> Result<(), GatewayError> {
            if !self.delayed.swap(true, Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            self.inner.upsert(document).await
        }
        async fn delete(&self, board_id: &str) -> Result<(), GatewayError> {
            self.inner.delete(board_id).await
        }
        async fn subscribe(&self, board_id: &str) -> Result<Subscription, GatewayError> {
            self.inner.subscribe(board_id).await
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_slow_push_does_not_leave_remote_behind() {
        let gw = seeded_gateway("abc123", "Roadmap");
        let mut session = SyncCoordinator::new(
            Arc::new(SlowFirstUpsert {
                inner: gw.clone(),
                delayed: std::sync::atomic::AtomicBool::new(false),
            }),
            Arc::new(MemoryStore::new()),
            config(),
        );
        session.connect("abc123").await.unwrap();

        let first = session
            .apply(BoardMutation::RenameBoard {
                title: "One".to_string(),
            })
            .unwrap();
        let second = session
            .apply(BoardMutation::RenameBoard {
                title: "Two".to_string(),
            })
            .unwrap();
        settle(second).await.unwrap();
        settle(first).await.unwrap();

        assert_eq!(
            session.drain_remote_changes(),
            vec![RemoteOutcome::Echo, RemoteOutcome::Echo]
        );
        let remote = gw.fetch("abc123").await.unwrap().unwrap();
        assert_eq!(remote.settings.board_title, "Two");
        assert!(session
            .store()
            .content_eq(&remote.board_data, &remote.settings));
    }

    #[tokio::test]
    async fn test_own_write_landing_after_remote_change_is_adopted() {
        let gw = seeded_gateway("abc123", "Roadmap");
        let mut session = coordinator(&gw);
        session.connect("abc123").await.unwrap();

        let applied = session
            .apply(BoardMutation::RenameBoard {
                title: "Mine".to_string(),
            })
            .unwrap();
        settle(applied).await.unwrap();

        // someone else's write reached the store just before ours
        let mut theirs = gw.fetch("abc123").await.unwrap().unwrap();
        theirs.settings.board_title = "Theirs".to_string();
        theirs.settings.last_mutation_id = "other-client".to_string();
        let outcome = session.handle_change(ChangeEvent {
            event_type: ChangeKind::Update,
            board_id: "abc123".to_string(),
            new_document: Some(theirs),
        });
        assert_eq!(outcome, RemoteOutcome::Replaced);
        assert_eq!(session.store().settings().board_title, "Theirs");

        assert_eq!(session.drain_remote_changes(), vec![RemoteOutcome::Replaced]);
        let remote = gw.fetch("abc123").await.unwrap().unwrap();
        assert_eq!(remote.settings.board_title, "Mine");
        assert_eq!(session.store().settings().board_title, "Mine");
    }

    #[tokio::test]
    async fn test_remote_update_replaces_store() {
        let gw = seeded_gateway("abc123", "Roadmap");
        let mut alice = coordinator(&gw);
        let mut bob = coordinator(&gw);
        alice.connect("abc123").await.unwrap();
        bob.connect("abc123").await.unwrap();
        let mut bob_events = bob.subscribe_events();

        let applied = alice
            .apply(BoardMutation::RenameBoard {
                title: "Sprint 12".to_string(),
            })
            .unwrap();
        settle(applied).await.unwrap();

        assert_eq!(bob.next_remote_change().await, Some(RemoteOutcome::Replaced));
        assert_eq!(bob.store().settings().board_title, "Sprint 12");
        assert_eq!(
            drain_events(&mut bob_events),
            vec![SessionEvent::Render, SessionEvent::SettingsRefreshed]
        );
        assert_eq!(alice.next_remote_change().await, Some(RemoteOutcome::Echo));
    }

    #[tokio::test]
    async fn test_remote_label_removal_reaches_other_client() {
        let gw = MemoryGateway::new();
        let mut alice = coordinator(&gw);
        alice.connect("qa0001").await.unwrap();
        let mut bob = coordinator(&gw);
        bob.connect("qa0001").await.unwrap();

        let qa = match alice
            .apply(BoardMutation::AddLabel {
                name: "QA".to_string(),
                color: LabelColor::Purple,
            })
            .unwrap()
        {
            Applied {
                outcome: MutationOutcome::Created(id),
                push: Some(handle),
            } => {
                handle.await.unwrap().unwrap();
                id
            }
            other => panic!("unexpected {:?}", other),
        };
        let attach = alice
            .apply(BoardMutation::UpdateCard {
                card_id: "card-1".to_string(),
                content: "Welcome! 👋".to_string(),
                description: String::new(),
                labels: vec!["l1".to_string(), qa.clone()],
                members: vec!["m1".to_string()],
            })
            .unwrap();
        settle(attach).await.unwrap();
        let remove = alice
            .apply(BoardMutation::RemoveLabel {
                label_id: qa.clone(),
            })
            .unwrap();
        settle(remove).await.unwrap();

        bob.drain_remote_changes();
        let card = bob.store().card("card-1").unwrap();
        assert_eq!(card.labels, vec!["l1"]);
        assert!(bob.store().settings().label(&qa).is_none());
    }

    #[tokio::test]
    async fn test_delete_resets_and_purges_ledger() {
        let gw = seeded_gateway("abc123", "Roadmap");
        let mut alice = coordinator(&gw);
        let mut bob = coordinator(&gw);
        alice.connect("abc123").await.unwrap();
        bob.connect("abc123").await.unwrap();

        let applied = bob
            .apply(BoardMutation::CreateColumn {
                title: "Later".to_string(),
            })
            .unwrap();
        settle(applied).await.unwrap();
        assert_eq!(alice.drain_remote_changes(), vec![RemoteOutcome::Replaced]);
        assert_eq!(alice.store().columns().len(), 3);

        alice.delete_board().await.unwrap();
        assert!(alice.recent_boards().is_empty());
        assert!(gw.fetch("abc123").await.unwrap().is_none());

        assert_eq!(bob.drain_remote_changes(), vec![RemoteOutcome::Echo, RemoteOutcome::Reset]);
        assert_eq!(bob.store().columns(), template::default_columns().as_slice());
        // no navigation away
        assert_eq!(bob.board_id(), Some("abc123"));
        assert_eq!(bob.recent_boards()[0].id, "abc123");

        assert_eq!(alice.next_remote_change().await, Some(RemoteOutcome::Reset));
        assert_eq!(alice.store().columns().len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_not_fatal() {
        let gw = MemoryGateway::new();
        gw.set_offline(true);
        let mut session = coordinator(&gw);
        let mut events = session.subscribe_events();

        let report = session.connect("abc123").await.unwrap();
        assert_eq!(report.source, BoardSource::Unreachable);
        assert!(report.realtime);
        assert!(session.store().columns().is_empty());
        assert!(drain_events(&mut events).contains(&SessionEvent::Notice {
            level: NoticeLevel::Error,
            message: "Error connecting to server".to_string(),
        }));

        // the row shows up later and the open feed picks it up
        gw.set_offline(false);
        gw.insert(&BoardDocument::new(
            "abc123",
            "other-app",
            template::default_columns(),
            template::default_settings(),
        ))
        .await
        .unwrap();
        assert_eq!(session.next_remote_change().await, Some(RemoteOutcome::Replaced));
        assert_eq!(session.store().columns().len(), 2);
    }

    struct Uninitialised;

    #[async_trait]
    impl RemoteBoardGateway for Uninitialised {
        async fn fetch(&self, _: &str) -> Result<Option<BoardDocument>, GatewayError> {
            Err(GatewayError::Unavailable("client not initialised".to_string()))
        }
        async fn insert(&self, _: &BoardDocument) -> Result<(), GatewayError> {
            Err(GatewayError::Unavailable("client not initialised".to_string()))
        }
        async fn upsert(&self, _: &BoardDocument) -> Result<(), GatewayError> {
            Err(GatewayError::Unavailable("client not initialised".to_string()))
        }
        async fn delete(&self, _: &str) -> Result<(), GatewayError> {
            Err(GatewayError::Unavailable("client not initialised".to_string()))
        }
        async fn subscribe(&self, _: &str) -> Result<Subscription, GatewayError> {
            Err(GatewayError::Unavailable("client not initialised".to_string()))
        }
    }

    #[tokio::test]
    async fn test_unavailable_gateway_is_fatal() {
        let mut session = SyncCoordinator::new(
            Arc::new(Uninitialised),
            Arc::new(MemoryStore::new()),
            config(),
        );
        assert!(matches!(
            session.connect("abc123").await,
            Err(SyncError::GatewayUnavailable(_))
        ));
        assert!(session.board_id().is_none());
        assert!(matches!(
            session.apply(BoardMutation::CreateColumn {
                title: "x".to_string()
            }),
            Err(SyncError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_subscription_failure_degrades() {
        let gw = seeded_gateway("abc123", "Roadmap");
        gw.set_refuse_subscriptions(true);
        let mut session = coordinator(&gw);

        let report = session.connect("abc123").await.unwrap();
        assert!(!report.realtime);
        assert!(!session.is_realtime());
        assert_eq!(session.next_remote_change().await, None);

        // pushes still work
        let applied = session
            .apply(BoardMutation::RenameBoard {
                title: "Offline-ish".to_string(),
            })
            .unwrap();
        settle(applied).await.unwrap();
        let row = gw.fetch("abc123").await.unwrap().unwrap();
        assert_eq!(row.settings.board_title, "Offline-ish");
    }

    #[tokio::test]
    async fn test_push_failure_keeps_local_state() {
        let gw = seeded_gateway("abc123", "Roadmap");
        let mut session = coordinator(&gw);
        session.connect("abc123").await.unwrap();
        let mut events = session.subscribe_events();

        gw.set_offline(true);
        let applied = session
            .apply(BoardMutation::CreateColumn {
                title: "Unsaved".to_string(),
            })
            .unwrap();
        assert!(matches!(
            settle(applied).await,
            Err(SyncError::PersistFailure { .. })
        ));
        assert_eq!(session.store().columns().len(), 3);

        let events = drain_events(&mut events);
        assert!(events.contains(&SessionEvent::SyncStatus(SyncStatus::Failed)));
        assert!(events.contains(&SessionEvent::Notice {
            level: NoticeLevel::Error,
            message: "Failed to save changes".to_string(),
        }));
    }

    #[tokio::test]
    async fn test_sync_indicator_cycle() {
        let gw = seeded_gateway("abc123", "Roadmap");
        let mut session = coordinator(&gw);
        session.connect("abc123").await.unwrap();
        let mut events = session.subscribe_events();

        let applied = session
            .apply(BoardMutation::CreateColumn {
                title: "Next".to_string(),
            })
            .unwrap();
        settle(applied).await.unwrap();
        assert_eq!(
            drain_events(&mut events),
            vec![
                SessionEvent::Render,
                SessionEvent::SyncStatus(SyncStatus::Syncing),
                SessionEvent::SyncStatus(SyncStatus::Idle),
            ]
        );
    }

    #[tokio::test]
    async fn test_reverted_and_ignored_do_not_push() {
        let gw = seeded_gateway("abc123", "Roadmap");
        let mut session = coordinator(&gw);
        session.connect("abc123").await.unwrap();
        let mut events = session.subscribe_events();

        let reverted = session
            .apply(BoardMutation::RenameBoard {
                title: "   ".to_string(),
            })
            .unwrap();
        assert_eq!(reverted.outcome, MutationOutcome::Reverted);
        assert!(reverted.push.is_none());

        let ignored = session
            .apply(BoardMutation::CreateColumn {
                title: String::new(),
            })
            .unwrap();
        assert_eq!(ignored.outcome, MutationOutcome::Ignored);
        assert!(ignored.push.is_none());

        assert_eq!(drain_events(&mut events), vec![SessionEvent::Render]);
        assert_eq!(session.pending_echoes(), 0);
    }

    #[tokio::test]
    async fn test_same_position_move_still_pushes() {
        let gw = seeded_gateway("abc123", "Roadmap");
        let mut session = coordinator(&gw);
        session.connect("abc123").await.unwrap();

        let applied = session
            .apply(BoardMutation::MoveCard {
                card_id: "card-1".to_string(),
                from_column_id: "col-1".to_string(),
                to_column_id: "col-1".to_string(),
                index: 0,
            })
            .unwrap();
        assert!(applied.push.is_some());
        settle(applied).await.unwrap();
        assert_eq!(session.next_remote_change().await, Some(RemoteOutcome::Echo));
    }

    #[tokio::test]
    async fn test_switching_boards_cancels_old_feed() {
        let gw = MemoryGateway::new();
        let mut session = coordinator(&gw);
        session.connect("aaa111").await.unwrap();
        assert_eq!(gw.listener_count("aaa111"), 1);

        session.connect("bbb222").await.unwrap();
        assert_eq!(gw.listener_count("aaa111"), 0);
        assert_eq!(gw.listener_count("bbb222"), 1);

        // writes to the old board no longer reach this session
        let mut other = coordinator(&gw);
        other.connect("aaa111").await.unwrap();
        let applied = other
            .apply(BoardMutation::RenameBoard {
                title: "Elsewhere".to_string(),
            })
            .unwrap();
        settle(applied).await.unwrap();
        assert!(session.drain_remote_changes().is_empty());
        assert_eq!(session.board_id(), Some("bbb222"));
    }

    #[tokio::test]
    async fn test_change_for_other_board_is_ignored() {
        let gw = seeded_gateway("abc123", "Roadmap");
        let mut session = coordinator(&gw);
        session.connect("abc123").await.unwrap();
        let revision = session.store().revision();

        let outcome = session.handle_change(ChangeEvent {
            event_type: ChangeKind::Delete,
            board_id: "zzz999".to_string(),
            new_document: None,
        });
        assert_eq!(outcome, RemoteOutcome::Ignored);
        assert_eq!(session.store().revision(), revision);
    }

    #[tokio::test]
    async fn test_join_unknown_code_is_rejected() {
        let gw = MemoryGateway::new();
        let mut session = coordinator(&gw);
        let mut input = JoinCodeInput::new(session.config().join_code_length);

        let code = match input.paste("zzz999") {
            InputOutcome::Complete(code) => code,
            other => panic!("unexpected {:?}", other),
        };
        assert!(matches!(
            session.join(&code).await,
            Err(SyncError::NotFound(_))
        ));
        input.reject();

        assert!(input.is_empty());
        assert_eq!(input.focus(), 0);
        assert!(session.board_id().is_none());
        assert!(gw.fetch("zzz999").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_join_malformed_code_is_rejected() {
        let gw = MemoryGateway::new();
        let mut session = coordinator(&gw);
        assert!(matches!(
            session.join("abc").await,
            Err(SyncError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_join_existing_board_records_visit() {
        let gw = seeded_gateway("q1w2e3", "Team board");
        let mut session = coordinator(&gw);
        let mut events = session.subscribe_events();

        let report = session.join(" Q1W2E3 ").await.unwrap();
        assert_eq!(report.source, BoardSource::Loaded);
        assert_eq!(session.board_id(), Some("q1w2e3"));
        assert_eq!(session.recent_boards()[0].id, "q1w2e3");
        assert!(drain_events(&mut events).contains(&SessionEvent::Connected {
            board_id: "q1w2e3".to_string(),
            realtime: true,
        }));
    }

    #[tokio::test]
    async fn test_create_board_generates_code() {
        let gw = MemoryGateway::new();
        let mut session = coordinator(&gw);
        let report = session.create_board().await.unwrap();
        assert_eq!(report.source, BoardSource::Created);
        assert_eq!(report.board_id.len(), 6);
        assert!(report.board_id.chars().all(ids::is_code_char));
        assert!(gw.fetch(&report.board_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_ledger_survives_sessions() {
        let gw = seeded_gateway("abc123", "Roadmap");
        let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        {
            let mut session = SyncCoordinator::new(Arc::new(gw.clone()), storage.clone(), config());
            session.connect("abc123").await.unwrap();
        }
        let session = SyncCoordinator::new(Arc::new(gw.clone()), storage, config());
        assert_eq!(session.recent_boards()[0].id, "abc123");
        assert_eq!(gw.listener_count("abc123"), 0);
    }

    #[test]
    fn test_push_without_runtime_is_an_error() {
        let gw = seeded_gateway("abc123", "Roadmap");
        let mut session = coordinator(&gw);
        session.store.set_board_id("abc123");
        assert!(matches!(
            session.push(),
            Err(SyncError::GatewayUnavailable(_))
        ));
    }
}
