use thiserror::Error;

use crate::protocol::{ProgressUpdate, Snapshot};
use crate::task::{SearchFile, Task, TaskId, TaskStatus};

/// A mirror state the server should never produce.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("{} queue members are processing: {ids:?}", .ids.len())]
    MultipleProcessing { ids: Vec<TaskId> },
    #[error("active task {active} is not the processing queue member")]
    ActiveNotInQueue { active: TaskId },
    #[error("queue member {processing} is processing but no active task is set")]
    ProcessingWithoutActive { processing: TaskId },
    #[error("active task {id} has status {status}")]
    ActiveNotProcessing { id: TaskId, status: TaskStatus },
    #[error("queue holds task {id} with status {status}")]
    FinishedInQueue { id: TaskId, status: TaskStatus },
    #[error("history holds task {id} with status {status}")]
    UnfinishedInHistory { id: TaskId, status: TaskStatus },
}

/// Client-side copy of server-asserted state.
///
/// Written by two paths only: [`Mirror::apply_snapshot`] replaces everything,
/// [`Mirror::patch_progress`] touches the active task's transient fields.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mirror {
    queue: Vec<Task>,
    history: Vec<Task>,
    active_task: Option<Task>,
    search_results: Vec<SearchFile>,
    last_output: Option<String>,
}

impl Mirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&self) -> &[Task] {
        &self.queue
    }

    pub fn history(&self) -> &[Task] {
        &self.history
    }

    pub fn active_task(&self) -> Option<&Task> {
        self.active_task.as_ref()
    }

    pub fn search_results(&self) -> &[SearchFile] {
        &self.search_results
    }

    /// Latest converter output line from a progress notification.
    pub fn last_output(&self) -> Option<&str> {
        self.last_output.as_deref()
    }

    pub fn find(&self, id: &TaskId) -> Option<&Task> {
        self.queue
            .iter()
            .chain(self.history.iter())
            .find(|task| task.id == *id)
    }

    /// Replaces queue, history and active task wholesale.
    ///
    /// The active output line is dropped when the active task changes.
    pub fn apply_snapshot(&mut self, snapshot: Snapshot) -> Vec<InvariantViolation> {
        let previous_active = self.active_task.as_ref().map(|task| task.id.clone());
        let next_active = snapshot.active_task.as_ref().map(|task| task.id.clone());
        if previous_active != next_active {
            self.last_output = None;
        }

        self.queue = snapshot.queue;
        self.history = snapshot.history;
        self.active_task = snapshot.active_task;
        self.violations()
    }

    /// Applies numeric progress fields to the active task and its queue entry.
    ///
    /// Never changes status, identifiers or membership. Returns whether any
    /// field changed.
    pub fn patch_progress(&mut self, update: &ProgressUpdate) -> bool {
        let Some(active) = self.active_task.as_mut() else {
            return false;
        };
        if update.task_id.as_ref().is_some_and(|id| *id != active.id) {
            return false;
        }

        let changed = apply_progress_fields(active, update);
        let id = active.id.clone();
        if let Some(member) = self.queue.iter_mut().find(|task| task.id == id) {
            apply_progress_fields(member, update);
        }
        changed
    }

    pub fn set_last_output(&mut self, line: Option<String>) -> bool {
        let line = line.filter(|text| !text.trim().is_empty());
        if line.is_none() || line == self.last_output {
            return false;
        }
        self.last_output = line;
        true
    }

    /// Supersedes the previous search results.
    pub fn set_search_results(&mut self, files: Vec<SearchFile>) {
        self.search_results = files;
    }

    pub fn clear_search_results(&mut self) -> bool {
        if self.search_results.is_empty() {
            return false;
        }
        self.search_results.clear();
        true
    }

    pub fn processing_count(&self) -> usize {
        self.queue
            .iter()
            .filter(|task| task.status == TaskStatus::Processing)
            .count()
    }

    /// Checks the queue/active-task invariants.
    pub fn violations(&self) -> Vec<InvariantViolation> {
        let mut found = Vec::new();

        for task in &self.queue {
            if task.status.is_finished() {
                found.push(InvariantViolation::FinishedInQueue {
                    id: task.id.clone(),
                    status: task.status,
                });
            }
        }
        for task in &self.history {
            if task.status.is_queued() {
                found.push(InvariantViolation::UnfinishedInHistory {
                    id: task.id.clone(),
                    status: task.status,
                });
            }
        }

        let processing: Vec<TaskId> = self
            .queue
            .iter()
            .filter(|task| task.status == TaskStatus::Processing)
            .map(|task| task.id.clone())
            .collect();
        if processing.len() > 1 {
            found.push(InvariantViolation::MultipleProcessing {
                ids: processing.clone(),
            });
        }

        match (&self.active_task, processing.first()) {
            (Some(active), _) if active.status != TaskStatus::Processing => {
                found.push(InvariantViolation::ActiveNotProcessing {
                    id: active.id.clone(),
                    status: active.status,
                });
            }
            (Some(active), _) if !processing.contains(&active.id) => {
                found.push(InvariantViolation::ActiveNotInQueue {
                    active: active.id.clone(),
                });
            }
            (None, Some(id)) => {
                found.push(InvariantViolation::ProcessingWithoutActive {
                    processing: id.clone(),
                });
            }
            _ => {}
        }

        found
    }
}

fn apply_progress_fields(task: &mut Task, update: &ProgressUpdate) -> bool {
    let mut changed = false;
    if let Some(progress) = update.progress {
        let progress = progress.clamp(0.0, 100.0);
        changed |= task.progress != Some(progress);
        task.progress = Some(progress);
    }
    if let Some(current_time) = update.current_time {
        changed |= task.current_time != Some(current_time);
        task.current_time = Some(current_time);
    }
    if let Some(duration) = update.duration {
        changed |= task.duration != Some(duration);
        task.duration = Some(duration);
    }
    changed
}
