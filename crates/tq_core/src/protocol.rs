//! Wire format of the realtime channel: `{type, data}` JSON frames.
//!
//! Outbound frames carry a client-generated `requestId`. Inbound frames are
//! classified by their `type` field into [`Notification`]s; command responses
//! are `<command>_response` frames that may carry a top-level `error` string.

use serde::Deserialize;
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::task::{null_as_empty, SearchFile, Task, TaskId, TaskStatus};

/// Client-generated correlation id attached to outbound commands.
pub type RequestId = u64;

/// Pattern the server substitutes when a search is sent with an empty pattern.
pub const DEFAULT_SEARCH_PATTERN: &str = r"DTS.*5\.1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CommandKind {
    GetState,
    SearchFiles,
    AddTask,
    CancelTask,
    DeleteTask,
}

impl CommandKind {
    pub const ALL: [CommandKind; 5] = [
        CommandKind::GetState,
        CommandKind::SearchFiles,
        CommandKind::AddTask,
        CommandKind::CancelTask,
        CommandKind::DeleteTask,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CommandKind::GetState => "get_state",
            CommandKind::SearchFiles => "search_files",
            CommandKind::AddTask => "add_task",
            CommandKind::CancelTask => "cancel_task",
            CommandKind::DeleteTask => "delete_task",
        }
    }

    pub fn response_type(self) -> &'static str {
        match self {
            CommandKind::GetState => "get_state_response",
            CommandKind::SearchFiles => "search_files_response",
            CommandKind::AddTask => "add_task_response",
            CommandKind::CancelTask => "cancel_task_response",
            CommandKind::DeleteTask => "delete_task_response",
        }
    }

    pub fn from_response_type(kind: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.response_type() == kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    GetState,
    SearchFiles { pattern: String },
    AddTask { file_path: String },
    CancelTask { task_id: TaskId },
    DeleteTask { task_id: TaskId, force: bool },
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::GetState => CommandKind::GetState,
            Command::SearchFiles { .. } => CommandKind::SearchFiles,
            Command::AddTask { .. } => CommandKind::AddTask,
            Command::CancelTask { .. } => CommandKind::CancelTask,
            Command::DeleteTask { .. } => CommandKind::DeleteTask,
        }
    }

    fn data(&self) -> Value {
        match self {
            Command::GetState => json!({}),
            Command::SearchFiles { pattern } => json!({ "pattern": pattern }),
            Command::AddTask { file_path } => json!({ "filePath": file_path }),
            Command::CancelTask { task_id } => json!({ "taskId": task_id.as_str() }),
            Command::DeleteTask { task_id, force } => {
                json!({ "taskId": task_id.as_str(), "force": force })
            }
        }
    }

    /// Serializes the command as a text frame.
    pub fn to_frame(&self, request_id: Option<RequestId>) -> String {
        let mut envelope = Map::new();
        envelope.insert("type".into(), Value::from(self.kind().as_str()));
        envelope.insert("data".into(), self.data());
        if let Some(id) = request_id {
            envelope.insert("requestId".into(), Value::from(id));
        }
        Value::Object(envelope).to_string()
    }
}

/// Full-state payload sufficient to replace the mirror wholesale.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub queue: Vec<Task>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub history: Vec<Task>,
    #[serde(default)]
    pub active_task: Option<Task>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    #[serde(default)]
    pub task_id: Option<TaskId>,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub current_time: Option<f64>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ProgressUpdate {
    /// True when the update carries at least one numeric progress field.
    pub fn has_numeric_fields(&self) -> bool {
        self.progress.is_some() || self.current_time.is_some() || self.duration.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct ServerLog {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResults {
    pub files: Vec<SearchFile>,
    pub count: usize,
}

/// Success payload of a command response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    Ack { message: Option<String> },
    TaskAdded { task_id: Option<TaskId> },
    Search(SearchResults),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResponse {
    pub kind: CommandKind,
    pub request_id: Option<RequestId>,
    pub result: Result<ResponseBody, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    InitialState(Snapshot),
    QueueUpdate,
    ConversionProgress(ProgressUpdate),
    Log(ServerLog),
    CommandResponse(CommandResponse),
}

impl Notification {
    pub fn type_name(&self) -> &'static str {
        match self {
            Notification::InitialState(_) => "initial_state",
            Notification::QueueUpdate => "queue_update",
            Notification::ConversionProgress(_) => "conversion_progress",
            Notification::Log(_) => "log",
            Notification::CommandResponse(response) => response.kind.response_type(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unknown notification type {0:?}")]
    UnknownType(String),
    #[error("invalid {kind} payload: {source}")]
    InvalidPayload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Deserialize)]
struct InboundEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    error: Option<String>,
    #[serde(default, rename = "requestId")]
    request_id: Option<RequestId>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

impl InboundEnvelope {
    /// Payload object: `data` when it is an object, otherwise the top-level
    /// fields (older servers put log and progress fields beside `type`).
    fn payload(&self) -> Value {
        match &self.data {
            Value::Object(_) => self.data.clone(),
            _ => Value::Object(self.rest.clone()),
        }
    }

    fn error_text(&self) -> Option<String> {
        let nested = self
            .data
            .get("error")
            .and_then(Value::as_str)
            .map(str::to_owned);
        self.error
            .clone()
            .or(nested)
            .filter(|text| !text.is_empty())
    }
}

fn parse_payload<T>(kind: &str, payload: Value) -> Result<T, ProtocolError>
where
    T: for<'de> Deserialize<'de>,
{
    serde_json::from_value(payload).map_err(|source| ProtocolError::InvalidPayload {
        kind: kind.to_string(),
        source,
    })
}

/// Classifies one inbound text frame.
pub fn decode_notification(frame: &str) -> Result<Notification, ProtocolError> {
    let envelope: InboundEnvelope = serde_json::from_str(frame)?;
    let kind = envelope.kind.as_str();
    match kind {
        "initial_state" => Ok(Notification::InitialState(parse_payload(
            kind,
            envelope.payload(),
        )?)),
        "queue_update" => Ok(Notification::QueueUpdate),
        "conversion_progress" => Ok(Notification::ConversionProgress(parse_payload(
            kind,
            envelope.payload(),
        )?)),
        "log" => Ok(Notification::Log(parse_payload(kind, envelope.payload())?)),
        other => match CommandKind::from_response_type(other) {
            Some(command) => decode_response(command, &envelope).map(Notification::CommandResponse),
            None => Err(ProtocolError::UnknownType(other.to_string())),
        },
    }
}

#[derive(Debug, Default, Deserialize)]
struct SearchPayload {
    #[serde(default, deserialize_with = "null_as_empty")]
    files: Vec<SearchFile>,
    #[serde(default)]
    count: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AckPayload {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    task_id: Option<TaskId>,
}

fn decode_response(
    kind: CommandKind,
    envelope: &InboundEnvelope,
) -> Result<CommandResponse, ProtocolError> {
    let request_id = envelope.request_id;
    if let Some(error) = envelope.error_text() {
        return Ok(CommandResponse {
            kind,
            request_id,
            result: Err(error),
        });
    }

    let body = match kind {
        CommandKind::SearchFiles => {
            let payload: SearchPayload = match &envelope.data {
                Value::Object(_) => parse_payload(kind.response_type(), envelope.data.clone())?,
                _ => SearchPayload::default(),
            };
            let count = payload.count.unwrap_or(payload.files.len());
            ResponseBody::Search(SearchResults {
                files: payload.files,
                count,
            })
        }
        _ => {
            let payload: AckPayload = match &envelope.data {
                Value::Object(_) => parse_payload(kind.response_type(), envelope.data.clone())?,
                _ => AckPayload::default(),
            };
            if kind == CommandKind::AddTask {
                ResponseBody::TaskAdded {
                    task_id: payload.task_id,
                }
            } else {
                ResponseBody::Ack {
                    message: payload.message,
                }
            }
        }
    };

    Ok(CommandResponse {
        kind,
        request_id,
        result: Ok(body),
    })
}
