use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tq_core::{
    validate_media_path, PathRejection, SearchFile, SearchResults, Snapshot, Task, TaskId,
};
use tq_logging::{tq_debug, tq_info};

use crate::settings::{ClientSettings, SettingsError};

#[derive(Debug, Error)]
pub enum PullError {
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Path(#[from] PathRejection),
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    /// Non-2xx reply; `message` is the server's `error` text when it sent one.
    #[error("server replied {status}: {message}")]
    Server { status: u16, message: String },
    #[error("unexpected response body: {0}")]
    Body(String),
}

fn map_reqwest_error(err: reqwest::Error) -> PullError {
    if err.is_timeout() {
        return PullError::Timeout;
    }
    PullError::Network(err.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerStatus {
    pub status: String,
    #[serde(default)]
    pub timestamp: i64,
    /// Connected realtime clients.
    #[serde(default)]
    pub clients: u32,
}

#[derive(Debug, Deserialize)]
struct QueueBody {
    #[serde(default)]
    queue: Option<Vec<Task>>,
}

#[derive(Debug, Deserialize)]
struct HistoryBody {
    #[serde(default)]
    history: Option<Vec<Task>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActiveTaskBody {
    #[serde(default)]
    active_task: Option<Task>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddTaskBody {
    #[serde(default)]
    task_id: Option<TaskId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchBody {
    #[serde(default)]
    files: Option<Vec<SearchFile>>,
    #[serde(default)]
    count: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Request/response client for the HTTP endpoints.
///
/// Reads the same model as the realtime channel; [`PullClient::fetch_snapshot`]
/// yields a [`Snapshot`] that feeds the same reconciler.
#[derive(Debug, Clone)]
pub struct PullClient {
    settings: ClientSettings,
    http: reqwest::Client,
}

impl PullClient {
    pub fn new(settings: ClientSettings) -> Result<Self, PullError> {
        // Fail early on a bad base url.
        settings.api_url("/")?;
        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(map_reqwest_error)?;
        Ok(Self { settings, http })
    }

    pub async fn status(&self) -> Result<ServerStatus, PullError> {
        self.get("/api/status").await
    }

    pub async fn queue(&self) -> Result<Vec<Task>, PullError> {
        let body: QueueBody = self.get("/api/queue").await?;
        Ok(body.queue.unwrap_or_default())
    }

    pub async fn history(&self) -> Result<Vec<Task>, PullError> {
        let body: HistoryBody = self.get("/api/history").await?;
        Ok(body.history.unwrap_or_default())
    }

    pub async fn active_task(&self) -> Result<Option<Task>, PullError> {
        let body: ActiveTaskBody = self.get("/api/active-task").await?;
        Ok(body.active_task)
    }

    /// Queue, history and active task read in one go.
    pub async fn fetch_snapshot(&self) -> Result<Snapshot, PullError> {
        let (queue, history, active_task) =
            tokio::try_join!(self.queue(), self.history(), self.active_task())?;
        Ok(Snapshot {
            queue,
            history,
            active_task,
        })
    }

    /// Only paths under `/media/` are submitted.
    pub async fn add_task(&self, file_path: &str) -> Result<Option<TaskId>, PullError> {
        let file_path = validate_media_path(file_path)?;
        let body: AddTaskBody = self
            .post("/api/tasks", json!({ "filePath": file_path }))
            .await?;
        tq_info!("Queued {} over HTTP", file_path);
        Ok(body.task_id)
    }

    pub async fn cancel_task(&self, task_id: &TaskId) -> Result<(), PullError> {
        let _: Value = self
            .post("/api/tasks/cancel", json!({ "taskId": task_id.as_str() }))
            .await?;
        Ok(())
    }

    pub async fn delete_task(&self, task_id: &TaskId, force: bool) -> Result<(), PullError> {
        let _: Value = self
            .post(
                "/api/tasks/delete",
                json!({ "taskId": task_id.as_str(), "force": force }),
            )
            .await?;
        Ok(())
    }

    pub async fn search_files(&self, pattern: &str) -> Result<SearchResults, PullError> {
        let body: SearchBody = self
            .post("/api/search", json!({ "pattern": pattern }))
            .await?;
        let files = body.files.unwrap_or_default();
        let count = body.count.unwrap_or(files.len());
        Ok(SearchResults { files, count })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, PullError> {
        let url = self.settings.api_url(path)?;
        tq_debug!("GET {}", url);
        let response = self.http.get(url).send().await.map_err(map_reqwest_error)?;
        read_body(response).await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: Value) -> Result<T, PullError> {
        let url = self.settings.api_url(path)?;
        tq_debug!("POST {}", url);
        let response = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        read_body(response).await
    }
}

async fn read_body<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, PullError> {
    let status = response.status();
    let bytes = response.bytes().await.map_err(map_reqwest_error)?;

    if !status.is_success() {
        let message = serde_json::from_slice::<ErrorBody>(&bytes)
            .map(|body| body.error)
            .unwrap_or_else(|_| status.to_string());
        return Err(PullError::Server {
            status: status.as_u16(),
            message,
        });
    }

    let bytes = if bytes.is_empty() { &b"{}"[..] } else { &bytes[..] };
    serde_json::from_slice(bytes).map_err(|err| PullError::Body(err.to_string()))
}
