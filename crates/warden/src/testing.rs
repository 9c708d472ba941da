//! In-memory collaborators for unit and integration testing.
//!
//! Each fake records how it was called so tests can assert on side effects
//! (commands issued, messages sent, lookups performed) without any network.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::WardenError;
use crate::game_server::{GameServerClient, RosterEntry};
use crate::identity::{Member, MemberDirectory};
use crate::log_entry::LogEntry;
use crate::metrics::WardenMetrics;
use crate::notify::{ChannelRoutes, NotificationSink, Notifier};
use crate::storage::MemoryAccountLinkStore;
use crate::types::{ChannelId, ExternalId, GameId};

/// Ordered record of side effects shared between fakes.
///
/// Commands are recorded as `command: <text>` and messages as
/// `send <channel>: <text>`, in the order the fakes received them.
#[derive(Default)]
pub struct Journal {
    events: Mutex<Vec<String>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: impl Into<String>) {
        self.events.lock().push(event.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.events.lock().clone()
    }
}

/// Scriptable game server.
///
/// Log fetches return the currently configured window every time, the way
/// the real API returns its recent history on each call.
#[derive(Default)]
pub struct FakeGameServer {
    state: Mutex<FakeGameState>,
    journal: Arc<Journal>,
    roster_fetches: AtomicUsize,
    join_leave_fetches: AtomicUsize,
    kill_fetches: AtomicUsize,
}

#[derive(Default)]
struct FakeGameState {
    join_leave: Vec<LogEntry>,
    kill: Vec<LogEntry>,
    roster: Vec<RosterEntry>,
    join_leave_status: Option<u16>,
    kill_status: Option<u16>,
    roster_status: Option<u16>,
    command_statuses: VecDeque<u16>,
    commands: Vec<String>,
}

impl FakeGameServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record commands into `journal` as well.
    pub fn with_journal(journal: Arc<Journal>) -> Self {
        Self {
            journal,
            ..Self::default()
        }
    }

    pub fn set_join_leave_log(&self, entries: Vec<LogEntry>) {
        self.state.lock().join_leave = entries;
    }

    pub fn set_kill_log(&self, entries: Vec<LogEntry>) {
        self.state.lock().kill = entries;
    }

    pub fn set_roster(&self, roster: Vec<RosterEntry>) {
        self.state.lock().roster = roster;
    }

    /// Put a player on the roster, replacing any entry with the same id.
    pub fn place_player(&self, id: &str, name: &str, team: &str) {
        let mut state = self.state.lock();
        state.roster.retain(|entry| entry.id.as_ref() != id);
        state.roster.push(RosterEntry {
            id: GameId::new(id),
            name: name.to_string(),
            team: Some(team.to_string()),
        });
    }

    /// Make join/leave fetches fail with `status` until cleared with `None`.
    pub fn fail_join_leave(&self, status: Option<u16>) {
        self.state.lock().join_leave_status = status;
    }

    /// Make kill fetches fail with `status` until cleared with `None`.
    pub fn fail_kill(&self, status: Option<u16>) {
        self.state.lock().kill_status = status;
    }

    pub fn fail_roster(&self, status: Option<u16>) {
        self.state.lock().roster_status = status;
    }

    /// Fail the next command with `status`. Queued failures apply in order.
    pub fn fail_next_command(&self, status: u16) {
        self.state.lock().command_statuses.push_back(status);
    }

    /// Commands received, including ones that were made to fail.
    pub fn commands(&self) -> Vec<String> {
        self.state.lock().commands.clone()
    }

    pub fn roster_fetches(&self) -> usize {
        self.roster_fetches.load(Ordering::SeqCst)
    }

    pub fn join_leave_fetches(&self) -> usize {
        self.join_leave_fetches.load(Ordering::SeqCst)
    }

    pub fn kill_fetches(&self) -> usize {
        self.kill_fetches.load(Ordering::SeqCst)
    }
}

fn status_error(endpoint: &str, status: u16) -> WardenError {
    WardenError::UnexpectedStatus {
        endpoint: endpoint.to_string(),
        status,
    }
}

#[async_trait]
impl GameServerClient for FakeGameServer {
    async fn fetch_roster(&self) -> Result<Vec<RosterEntry>, WardenError> {
        self.roster_fetches.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock();
        match state.roster_status {
            Some(status) => Err(status_error("/players", status)),
            None => Ok(state.roster.clone()),
        }
    }

    async fn fetch_join_leave_log(&self) -> Result<Vec<LogEntry>, WardenError> {
        self.join_leave_fetches.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock();
        match state.join_leave_status {
            Some(status) => Err(status_error("/joinlogs", status)),
            None => Ok(state.join_leave.clone()),
        }
    }

    async fn fetch_kill_log(&self) -> Result<Vec<LogEntry>, WardenError> {
        self.kill_fetches.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock();
        match state.kill_status {
            Some(status) => Err(status_error("/killlogs", status)),
            None => Ok(state.kill.clone()),
        }
    }

    async fn run_command(&self, command: &str) -> Result<(), WardenError> {
        self.journal.record(format!("command: {command}"));
        let mut state = self.state.lock();
        state.commands.push(command.to_string());
        match state.command_statuses.pop_front() {
            Some(status) => Err(status_error("/command", status)),
            None => Ok(()),
        }
    }
}

/// Sink that records every message it is asked to deliver.
#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<(ChannelId, String)>>,
    failing: AtomicBool,
    journal: Arc<Journal>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record sends into `journal` as well.
    pub fn with_journal(journal: Arc<Journal>) -> Self {
        Self {
            journal,
            ..Self::default()
        }
    }

    /// Make subsequent sends fail (they are still recorded).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(ChannelId, String)> {
        self.sent.lock().clone()
    }

    /// Messages sent to one channel, in order.
    pub fn sent_to(&self, channel: ChannelId) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter(|(c, _)| *c == channel)
            .map(|(_, text)| text.clone())
            .collect()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn send(&self, channel: ChannelId, text: &str) -> Result<(), WardenError> {
        self.journal.record(format!("send {channel}: {text}"));
        self.sent.lock().push((channel, text.to_string()));
        if self.failing.load(Ordering::SeqCst) {
            return Err(WardenError::UnexpectedStatus {
                endpoint: format!("/channels/{channel}/messages"),
                status: 403,
            });
        }
        Ok(())
    }
}

/// Fixed member directory.
#[derive(Default)]
pub struct StaticDirectory {
    members: Mutex<HashMap<ExternalId, Member>>,
    lookups: AtomicUsize,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a member holding the given role names.
    pub fn insert(&self, external_id: &str, display_name: &str, roles: &[&str]) {
        let member = Member {
            external_id: ExternalId::new(external_id),
            display_name: display_name.to_string(),
            credentials: roles.iter().map(|r| r.to_string()).collect::<HashSet<_>>(),
        };
        self.members.lock().insert(member.external_id.clone(), member);
    }

    pub fn remove(&self, external_id: &str) {
        self.members.lock().remove(&ExternalId::new(external_id));
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MemberDirectory for StaticDirectory {
    async fn resolve_member(
        &self,
        external_id: &ExternalId,
    ) -> Result<Option<Member>, WardenError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.members.lock().get(external_id).cloned())
    }
}

/// Channel ids used by [`TestHarness`] routes.
pub const JOIN_CHANNEL: ChannelId = ChannelId(1);
pub const LEAVE_CHANNEL: ChannelId = ChannelId(2);
pub const KILL_CHANNEL: ChannelId = ChannelId(3);
pub const MODERATION_CHANNEL: ChannelId = ChannelId(4);

/// Fakes wired together with every notification category enabled.
///
/// The game server and sink share `journal`, so the relative order of
/// commands and messages can be asserted.
pub struct TestHarness {
    pub journal: Arc<Journal>,
    pub game: Arc<FakeGameServer>,
    pub sink: Arc<RecordingSink>,
    pub directory: Arc<StaticDirectory>,
    pub links: Arc<MemoryAccountLinkStore>,
    pub metrics: Arc<WardenMetrics>,
}

impl TestHarness {
    pub fn new() -> Self {
        let journal = Arc::new(Journal::new());
        Self {
            game: Arc::new(FakeGameServer::with_journal(journal.clone())),
            sink: Arc::new(RecordingSink::with_journal(journal.clone())),
            journal,
            directory: Arc::new(StaticDirectory::new()),
            links: Arc::new(MemoryAccountLinkStore::new()),
            metrics: Arc::new(WardenMetrics::unregistered()),
        }
    }

    pub fn routes() -> ChannelRoutes {
        ChannelRoutes {
            join: Some(JOIN_CHANNEL),
            leave: Some(LEAVE_CHANNEL),
            kill: Some(KILL_CHANNEL),
            moderation: Some(MODERATION_CHANNEL),
        }
    }

    pub fn notifier(&self) -> Notifier {
        Notifier::new(self.sink.clone(), Self::routes())
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
