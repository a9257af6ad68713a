use crate::protocol::Notification;
use crate::task::Task;

/// What the reconciler should do with an inbound signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResyncDecision {
    /// Update the active task's transient progress fields in place.
    Patch,
    /// Ask the server for a fresh snapshot.
    Refetch,
    None,
}

/// Inputs that can require a resync.
#[derive(Debug, Clone, Copy)]
pub enum ResyncSignal<'a> {
    Notification(&'a Notification),
    /// The channel came back online; anything may have changed meanwhile.
    Reconnected,
}

/// Decision table for patch vs refetch.
///
/// | signal                                        | decision |
/// |-----------------------------------------------|----------|
/// | reconnected                                   | refetch  |
/// | `queue_update`                                | refetch  |
/// | progress with a status different from active  | refetch  |
/// | progress naming a task other than the active  | refetch  |
/// | numeric progress for the active task          | patch    |
/// | anything else                                 | none     |
pub fn decide(signal: ResyncSignal<'_>, active: Option<&Task>) -> ResyncDecision {
    let notification = match signal {
        ResyncSignal::Reconnected => return ResyncDecision::Refetch,
        ResyncSignal::Notification(notification) => notification,
    };

    match notification {
        Notification::QueueUpdate => ResyncDecision::Refetch,
        Notification::ConversionProgress(update) => {
            if let Some(status) = update.status {
                if active.map(|task| task.status) != Some(status) {
                    return ResyncDecision::Refetch;
                }
            }
            let Some(active) = active else {
                return ResyncDecision::None;
            };
            if update
                .task_id
                .as_ref()
                .is_some_and(|id| *id != active.id)
            {
                return ResyncDecision::Refetch;
            }
            if update.has_numeric_fields() {
                ResyncDecision::Patch
            } else {
                ResyncDecision::None
            }
        }
        Notification::InitialState(_) | Notification::Log(_) | Notification::CommandResponse(_) => {
            ResyncDecision::None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ProgressUpdate, ServerLog};
    use crate::task::{TaskId, TaskStatus};

    fn processing(id: &str) -> Task {
        Task::new(id, format!("/media/{id}.mkv"), TaskStatus::Processing)
    }

    fn progress(update: ProgressUpdate) -> Notification {
        Notification::ConversionProgress(update)
    }

    #[test]
    fn structural_signals_refetch() {
        assert_eq!(
            decide(ResyncSignal::Reconnected, None),
            ResyncDecision::Refetch
        );
        assert_eq!(
            decide(ResyncSignal::Notification(&Notification::QueueUpdate), None),
            ResyncDecision::Refetch
        );
    }

    #[test]
    fn status_change_refetches_even_with_numbers() {
        let active = processing("1");
        let update = progress(ProgressUpdate {
            status: Some(TaskStatus::Completed),
            progress: Some(100.0),
            ..ProgressUpdate::default()
        });
        assert_eq!(
            decide(ResyncSignal::Notification(&update), Some(&active)),
            ResyncDecision::Refetch
        );
    }

    #[test]
    fn status_without_active_task_refetches() {
        let update = progress(ProgressUpdate {
            status: Some(TaskStatus::Processing),
            progress: Some(0.0),
            ..ProgressUpdate::default()
        });
        assert_eq!(
            decide(ResyncSignal::Notification(&update), None),
            ResyncDecision::Refetch
        );
    }

    #[test]
    fn numeric_progress_for_active_task_patches() {
        let active = processing("1");
        let same_status = progress(ProgressUpdate {
            task_id: Some(TaskId::new("1")),
            status: Some(TaskStatus::Processing),
            progress: Some(12.0),
            ..ProgressUpdate::default()
        });
        let bare = progress(ProgressUpdate {
            current_time: Some(30.0),
            ..ProgressUpdate::default()
        });
        assert_eq!(
            decide(ResyncSignal::Notification(&same_status), Some(&active)),
            ResyncDecision::Patch
        );
        assert_eq!(
            decide(ResyncSignal::Notification(&bare), Some(&active)),
            ResyncDecision::Patch
        );
    }

    #[test]
    fn progress_for_another_task_refetches() {
        let active = processing("1");
        let update = progress(ProgressUpdate {
            task_id: Some(TaskId::new("2")),
            progress: Some(5.0),
            ..ProgressUpdate::default()
        });
        assert_eq!(
            decide(ResyncSignal::Notification(&update), Some(&active)),
            ResyncDecision::Refetch
        );
    }

    #[test]
    fn untracked_or_text_only_progress_is_ignored() {
        let numeric = progress(ProgressUpdate {
            progress: Some(50.0),
            ..ProgressUpdate::default()
        });
        assert_eq!(
            decide(ResyncSignal::Notification(&numeric), None),
            ResyncDecision::None
        );

        let active = processing("1");
        let text_only = progress(ProgressUpdate {
            message: Some("frame=100".into()),
            ..ProgressUpdate::default()
        });
        assert_eq!(
            decide(ResyncSignal::Notification(&text_only), Some(&active)),
            ResyncDecision::None
        );

        let log = Notification::Log(ServerLog::default());
        assert_eq!(
            decide(ResyncSignal::Notification(&log), Some(&active)),
            ResyncDecision::None
        );
    }
}
