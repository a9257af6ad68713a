use std::collections::VecDeque;

/// Entries kept for the presentation layer's log panel.
pub const ACTIVITY_CAPACITY: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityLevel {
    Info,
    Warning,
    Error,
}

impl ActivityLevel {
    /// Maps a server `log` level label; anything below warning reads as info.
    pub fn from_server_label(label: Option<&str>) -> Self {
        match tq_logging::server_level(label) {
            log::Level::Error => ActivityLevel::Error,
            log::Level::Warn => ActivityLevel::Warning,
            log::Level::Info | log::Level::Debug | log::Level::Trace => ActivityLevel::Info,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActivityLevel::Info => "info",
            ActivityLevel::Warning => "warning",
            ActivityLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityEntry {
    pub level: ActivityLevel,
    pub message: String,
}

/// Bounded, oldest-first log of human-readable lines.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ActivityLog {
    entries: VecDeque<ActivityEntry>,
}

impl ActivityLog {
    pub fn push(&mut self, level: ActivityLevel, message: impl Into<String>) {
        if self.entries.len() == ACTIVITY_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(ActivityEntry {
            level,
            message: message.into(),
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&ActivityEntry> {
        self.entries.back()
    }

    pub fn to_vec(&self) -> Vec<ActivityEntry> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_labels_share_the_log_level_mapping() {
        assert_eq!(ActivityLevel::from_server_label(Some("error")), ActivityLevel::Error);
        assert_eq!(ActivityLevel::from_server_label(Some(" WARN ")), ActivityLevel::Warning);
        assert_eq!(ActivityLevel::from_server_label(Some("warning")), ActivityLevel::Warning);
        assert_eq!(ActivityLevel::from_server_label(Some("debug")), ActivityLevel::Info);
        assert_eq!(ActivityLevel::from_server_label(None), ActivityLevel::Info);
    }

    #[test]
    fn log_drops_oldest_entry_at_capacity() {
        let mut log = ActivityLog::default();
        for index in 0..=ACTIVITY_CAPACITY {
            log.push(ActivityLevel::Info, format!("line {index}"));
        }
        assert_eq!(log.len(), ACTIVITY_CAPACITY);
        assert_eq!(log.to_vec()[0].message, "line 1");
    }
}
