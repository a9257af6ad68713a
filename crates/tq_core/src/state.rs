use std::time::Duration;

use crate::activity::{ActivityLevel, ActivityLog};
use crate::connection::{ConnectionState, Reconnector};
use crate::dispatch::CommandLedger;
use crate::mirror::Mirror;
use crate::view_model::{ActiveTaskView, AppViewModel};

/// Everything the event loop owns: the mirror plus the bookkeeping that
/// keeps it in step with the server.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppState {
    connection: ConnectionState,
    reconnect: Reconnector,
    mirror: Mirror,
    ledger: CommandLedger,
    activity: ActivityLog,
    snapshots_applied: u64,
    dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reconnect_delay(delay: Duration) -> Self {
        Self {
            reconnect: Reconnector::new(delay),
            ..Self::default()
        }
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn mirror(&self) -> &Mirror {
        &self.mirror
    }

    pub fn ledger(&self) -> &CommandLedger {
        &self.ledger
    }

    pub fn reconnect(&self) -> &Reconnector {
        &self.reconnect
    }

    pub fn activity(&self) -> &ActivityLog {
        &self.activity
    }

    /// Snapshots applied since startup, including repeats.
    pub fn snapshots_applied(&self) -> u64 {
        self.snapshots_applied
    }

    pub fn view(&self) -> AppViewModel {
        let active_task = self.mirror.active_task().map(|task| ActiveTaskView {
            task: task.clone(),
            last_output: self.mirror.last_output().map(ToOwned::to_owned),
        });
        AppViewModel {
            connection: self.connection,
            queue: self.mirror.queue().to_vec(),
            history: self.mirror.history().to_vec(),
            active_task,
            search_results: self.mirror.search_results().to_vec(),
            activity: self.activity.to_vec(),
            outstanding_commands: self.ledger.outstanding(),
        }
    }

    /// Returns whether anything changed since the last call, and resets the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn connection_mut(&mut self) -> &mut ConnectionState {
        &mut self.connection
    }

    pub(crate) fn reconnect_mut(&mut self) -> &mut Reconnector {
        &mut self.reconnect
    }

    pub(crate) fn mirror_mut(&mut self) -> &mut Mirror {
        &mut self.mirror
    }

    pub(crate) fn ledger_mut(&mut self) -> &mut CommandLedger {
        &mut self.ledger
    }

    pub(crate) fn note_snapshot(&mut self) {
        self.snapshots_applied += 1;
    }

    pub(crate) fn record(&mut self, level: ActivityLevel, message: impl Into<String>) {
        self.activity.push(level, message);
        self.dirty = true;
    }
}
