//! Transcode queue core: pure state machine that mirrors server-side queue state.
mod activity;
mod connection;
mod dispatch;
mod effect;
mod file_list;
mod mirror;
mod msg;
mod protocol;
mod resync;
mod state;
mod task;
mod update;
mod view_model;

pub use activity::{ActivityEntry, ActivityLevel, ActivityLog, ACTIVITY_CAPACITY};
pub use connection::{
    ConnectionEvent, ConnectionState, Reconnector, TransitionError, DEFAULT_RECONNECT_DELAY,
};
pub use dispatch::{CommandLedger, CommandResult, DispatchError, Settlement};
pub use effect::Effect;
pub use file_list::{validate_media_path, PathRejection, StagedFiles, MEDIA_PREFIX};
pub use mirror::{InvariantViolation, Mirror};
pub use msg::Msg;
pub use protocol::{
    decode_notification, Command, CommandKind, CommandResponse, Notification, ProgressUpdate,
    ProtocolError, RequestId, ResponseBody, SearchResults, ServerLog, Snapshot,
    DEFAULT_SEARCH_PATTERN,
};
pub use resync::{decide, ResyncDecision, ResyncSignal};
pub use state::AppState;
pub use task::{AudioInfo, SearchFile, Task, TaskId, TaskStatus};
pub use update::{outcome_line, update};
pub use view_model::{ActiveTaskView, AppViewModel};
