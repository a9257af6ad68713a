use std::time::Duration;

use crate::{CommandResult, RequestId};

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Start one connection attempt.
    Connect,
    ScheduleReconnect { delay: Duration },
    /// Write a text frame. `request_id` is `None` for internal refetches.
    Send {
        request_id: Option<RequestId>,
        frame: String,
    },
    /// Deliver a command outcome to the waiting caller.
    Settle {
        request_id: RequestId,
        result: CommandResult,
    },
    /// Hand a server `log` line to the log sink.
    ForwardServerLog {
        level: Option<String>,
        message: String,
    },
}
