use crate::{ActivityEntry, ConnectionState, SearchFile, Task};

/// Read-only projection published to the presentation layer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppViewModel {
    pub connection: ConnectionState,
    pub queue: Vec<Task>,
    pub history: Vec<Task>,
    pub active_task: Option<ActiveTaskView>,
    pub search_results: Vec<SearchFile>,
    pub activity: Vec<ActivityEntry>,
    pub outstanding_commands: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActiveTaskView {
    pub task: Task,
    pub last_output: Option<String>,
}

impl ActiveTaskView {
    /// Progress in percent, derived from time figures when the server sent none.
    pub fn percent(&self) -> f64 {
        if let Some(progress) = self.task.progress {
            return progress.clamp(0.0, 100.0);
        }
        match (self.task.current_time, self.task.duration) {
            (Some(current), Some(total)) if total > 0.0 => (current / total * 100.0).clamp(0.0, 100.0),
            _ => 0.0,
        }
    }
}
