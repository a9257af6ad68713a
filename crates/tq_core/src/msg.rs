use crate::{Command, ConnectionEvent, Notification, RequestId};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// Open the realtime channel (startup or explicit retry).
    ConnectRequested,
    /// The reconnect delay elapsed.
    ReconnectTimerFired,
    /// Transport lifecycle change.
    Connection(ConnectionEvent),
    /// Raw text frame from the transport, not yet classified.
    FrameReceived(String),
    /// Already-decoded notification. The pull client feeds snapshots this way.
    Notification(Notification),
    /// A caller issued a command and awaits its outcome under `request_id`.
    CommandIssued {
        request_id: RequestId,
        command: Command,
    },
    /// User closed the search results.
    SearchCleared,
}
