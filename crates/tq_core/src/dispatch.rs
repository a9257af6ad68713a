use std::collections::{BTreeMap, VecDeque};

use thiserror::Error;

use crate::protocol::{Command, CommandKind, RequestId, ResponseBody};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("not connected")]
    NotConnected,
    #[error("{0}")]
    Rejected(String),
    #[error("connection closed before a response arrived")]
    ConnectionClosed,
    #[error("client stopped")]
    ClientStopped,
}

pub type CommandResult = Result<ResponseBody, DispatchError>;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct Lane {
    in_flight: Option<RequestId>,
    waiting: VecDeque<(RequestId, Command)>,
}

/// Outcome of matching a response frame against the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Settlement {
    /// Request the response belongs to, if any caller was waiting.
    pub settled: Option<RequestId>,
    /// Next same-type command released onto the wire.
    pub next: Option<(RequestId, Command)>,
}

/// Per-type bookkeeping of caller commands.
///
/// At most one command of each type is on the wire. A response that does not
/// echo a request id therefore has exactly one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandLedger {
    lanes: BTreeMap<CommandKind, Lane>,
}

impl CommandLedger {
    /// Registers a command. Returns it back when it may be sent right away,
    /// or `None` when it waits behind an in-flight command of the same type.
    pub fn admit(&mut self, request_id: RequestId, command: Command) -> Option<Command> {
        let lane = self.lanes.entry(command.kind()).or_default();
        if lane.in_flight.is_some() {
            lane.waiting.push_back((request_id, command));
            return None;
        }
        lane.in_flight = Some(request_id);
        Some(command)
    }

    pub fn settle(&mut self, kind: CommandKind, echoed: Option<RequestId>) -> Settlement {
        let Some(lane) = self.lanes.get_mut(&kind) else {
            return Settlement::default();
        };
        let Some(in_flight) = lane.in_flight else {
            return Settlement::default();
        };
        if echoed.is_some_and(|id| id != in_flight) {
            return Settlement::default();
        }

        lane.in_flight = None;
        let next = lane.waiting.pop_front();
        if let Some((id, _)) = &next {
            lane.in_flight = Some(*id);
        }
        Settlement {
            settled: Some(in_flight),
            next,
        }
    }

    /// Removes every tracked request, in-flight first within each type.
    pub fn drain(&mut self) -> Vec<(RequestId, CommandKind)> {
        let mut drained = Vec::new();
        for (kind, lane) in std::mem::take(&mut self.lanes) {
            drained.extend(lane.in_flight.map(|id| (id, kind)));
            drained.extend(lane.waiting.into_iter().map(|(id, _)| (id, kind)));
        }
        drained
    }

    pub fn in_flight(&self, kind: CommandKind) -> Option<RequestId> {
        self.lanes.get(&kind).and_then(|lane| lane.in_flight)
    }

    pub fn waiting(&self, kind: CommandKind) -> usize {
        self.lanes.get(&kind).map_or(0, |lane| lane.waiting.len())
    }

    /// Total number of caller commands awaiting an outcome.
    pub fn outstanding(&self) -> usize {
        self.lanes
            .values()
            .map(|lane| usize::from(lane.in_flight.is_some()) + lane.waiting.len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn search(pattern: &str) -> Command {
        Command::SearchFiles {
            pattern: pattern.to_string(),
        }
    }

    #[test]
    fn same_type_commands_are_serialized() {
        let mut ledger = CommandLedger::default();
        assert_eq!(ledger.admit(1, search("a")), Some(search("a")));
        assert_eq!(ledger.admit(2, search("b")), None);
        assert_eq!(ledger.waiting(CommandKind::SearchFiles), 1);

        let settlement = ledger.settle(CommandKind::SearchFiles, None);
        assert_eq!(settlement.settled, Some(1));
        assert_eq!(settlement.next, Some((2, search("b"))));
        assert_eq!(ledger.in_flight(CommandKind::SearchFiles), Some(2));

        let settlement = ledger.settle(CommandKind::SearchFiles, Some(2));
        assert_eq!(settlement.settled, Some(2));
        assert_eq!(settlement.next, None);
        assert_eq!(ledger.outstanding(), 0);
    }

    #[test]
    fn different_types_do_not_block_each_other() {
        let mut ledger = CommandLedger::default();
        assert!(ledger.admit(1, search("a")).is_some());
        assert!(ledger
            .admit(
                2,
                Command::AddTask {
                    file_path: "/media/a.mkv".into()
                }
            )
            .is_some());
        assert_eq!(ledger.outstanding(), 2);
    }

    #[test]
    fn mismatched_echo_and_unsolicited_responses_settle_nothing() {
        let mut ledger = CommandLedger::default();
        assert_eq!(
            ledger.settle(CommandKind::GetState, None),
            Settlement::default()
        );

        ledger.admit(7, search("a"));
        assert_eq!(
            ledger.settle(CommandKind::SearchFiles, Some(3)),
            Settlement::default()
        );
        assert_eq!(ledger.in_flight(CommandKind::SearchFiles), Some(7));
    }

    #[test]
    fn drain_returns_in_flight_and_waiting() {
        let mut ledger = CommandLedger::default();
        ledger.admit(1, search("a"));
        ledger.admit(2, search("b"));
        ledger.admit(3, Command::GetState);

        let drained = ledger.drain();
        assert_eq!(
            drained,
            vec![
                (3, CommandKind::GetState),
                (1, CommandKind::SearchFiles),
                (2, CommandKind::SearchFiles),
            ]
        );
        assert_eq!(ledger.outstanding(), 0);
    }
}
