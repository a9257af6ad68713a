use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Delay before a reconnect attempt after the channel goes offline.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Lifecycle of the realtime channel.
///
/// Allowed transitions: offline -> connecting -> online -> offline, plus
/// connecting -> offline when an attempt fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Offline,
    Connecting,
    Online,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid connection transition {from} -> {to}")]
pub struct TransitionError {
    pub from: ConnectionState,
    pub to: ConnectionState,
}

impl ConnectionState {
    pub fn is_online(self) -> bool {
        self == ConnectionState::Online
    }

    pub fn transition(self, to: ConnectionState) -> Result<ConnectionState, TransitionError> {
        use ConnectionState::*;
        match (self, to) {
            (Offline, Connecting) | (Connecting, Online) | (Connecting, Offline) | (Online, Offline) => {
                Ok(to)
            }
            (from, to) => Err(TransitionError { from, to }),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ConnectionState::Offline => "offline",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Online => "online",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Transport lifecycle events reported by the connector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Opened,
    Closed { reason: Option<String> },
    Failed { error: String },
}

/// Fixed-delay reconnection schedule with at most one pending attempt.
///
/// There is no attempt cap and no growth of the delay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconnector {
    delay: Duration,
    pending: bool,
    scheduled_total: u64,
}

impl Default for Reconnector {
    fn default() -> Self {
        Self::new(DEFAULT_RECONNECT_DELAY)
    }
}

impl Reconnector {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: false,
            scheduled_total: 0,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Number of attempts scheduled since creation.
    pub fn scheduled_total(&self) -> u64 {
        self.scheduled_total
    }

    /// Schedules an attempt unless one is already pending.
    pub fn schedule(&mut self) -> Option<Duration> {
        if self.pending {
            return None;
        }
        self.pending = true;
        self.scheduled_total += 1;
        Some(self.delay)
    }

    /// Marks the pending attempt as due. Returns false for a stray timer.
    pub fn fire(&mut self) -> bool {
        std::mem::replace(&mut self.pending, false)
    }

    pub fn cancel(&mut self) {
        self.pending = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_documented_transitions_are_allowed() {
        use ConnectionState::*;
        assert_eq!(Offline.transition(Connecting), Ok(Connecting));
        assert_eq!(Connecting.transition(Online), Ok(Online));
        assert_eq!(Connecting.transition(Offline), Ok(Offline));
        assert_eq!(Online.transition(Offline), Ok(Offline));

        assert!(Offline.transition(Online).is_err());
        assert!(Online.transition(Connecting).is_err());
        assert!(Online.transition(Online).is_err());
        assert!(Offline.transition(Offline).is_err());
    }

    #[test]
    fn reconnector_keeps_a_single_pending_attempt() {
        let mut reconnector = Reconnector::new(Duration::from_millis(10));
        assert_eq!(reconnector.schedule(), Some(Duration::from_millis(10)));
        assert_eq!(reconnector.schedule(), None);
        assert_eq!(reconnector.scheduled_total(), 1);

        assert!(reconnector.fire());
        assert!(!reconnector.fire());
        assert_eq!(reconnector.schedule(), Some(Duration::from_millis(10)));
        assert_eq!(reconnector.scheduled_total(), 2);
    }
}
