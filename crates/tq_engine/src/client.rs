use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tq_core::{
    update, AppState, AppViewModel, Command, CommandResult, ConnectionEvent, ConnectionState,
    DispatchError, Effect, Msg, RequestId, ResponseBody, SearchResults, TaskId,
};
use tq_logging::{tq_debug, tq_info, tq_warn};

use crate::settings::ClientSettings;
use crate::transport::{Connector, TransportError, TransportEvent, TransportLink};

enum ClientRequest {
    Issue {
        command: Command,
        reply: oneshot::Sender<CommandResult>,
    },
    ClearSearch,
    Shutdown,
}

enum Internal {
    Connected(Result<TransportLink, TransportError>),
    ReconnectDue,
}

enum Step {
    Request(ClientRequest),
    Internal(Internal),
    Link(Option<TransportEvent>),
    Stop,
}

/// Handle to the realtime mirror.
///
/// Owns one event-loop task that holds the mirror state, the open link, and
/// every caller awaiting a command outcome. The mirror is published through a
/// `watch` channel whenever it changes.
pub struct MirrorClient {
    requests: mpsc::UnboundedSender<ClientRequest>,
    view: watch::Receiver<AppViewModel>,
    task: JoinHandle<()>,
}

impl MirrorClient {
    /// Starts the event loop and the first connection attempt.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(settings: ClientSettings, connector: Arc<dyn Connector>) -> Self {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let state = AppState::with_reconnect_delay(settings.reconnect_delay);
        let (view_tx, view_rx) = watch::channel(state.view());
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let event_loop = EventLoop {
            state,
            settings,
            connector,
            link: None,
            pending: HashMap::new(),
            next_request_id: 1,
            internal_tx,
            view_tx,
        };
        let task = tokio::spawn(event_loop.run(request_rx, internal_rx));

        Self {
            requests: request_tx,
            view: view_rx,
            task,
        }
    }

    /// Receiver that observes every published mirror change.
    pub fn subscribe(&self) -> watch::Receiver<AppViewModel> {
        self.view.clone()
    }

    /// Latest published view.
    pub fn view(&self) -> AppViewModel {
        self.view.borrow().clone()
    }

    pub fn connection(&self) -> ConnectionState {
        self.view.borrow().connection
    }

    /// Sends a command and waits for its single outcome.
    pub async fn issue(&self, command: Command) -> CommandResult {
        let (reply, outcome) = oneshot::channel();
        if self
            .requests
            .send(ClientRequest::Issue { command, reply })
            .is_err()
        {
            return Err(DispatchError::ClientStopped);
        }
        outcome.await.unwrap_or(Err(DispatchError::ClientStopped))
    }

    /// Asks for a fresh snapshot. The mirror updates from the
    /// `initial_state` that precedes the acknowledgement.
    pub async fn refresh(&self) -> Result<(), DispatchError> {
        self.issue(Command::GetState).await.map(|_| ())
    }

    /// An empty pattern makes the server use its default.
    pub async fn search_files(&self, pattern: &str) -> Result<SearchResults, DispatchError> {
        let body = self
            .issue(Command::SearchFiles {
                pattern: pattern.to_string(),
            })
            .await?;
        match body {
            ResponseBody::Search(results) => Ok(results),
            _ => Ok(SearchResults {
                files: Vec::new(),
                count: 0,
            }),
        }
    }

    /// Returns the server-assigned id when the server reports one.
    pub async fn add_task(&self, file_path: &str) -> Result<Option<TaskId>, DispatchError> {
        let body = self
            .issue(Command::AddTask {
                file_path: file_path.to_string(),
            })
            .await?;
        Ok(match body {
            ResponseBody::TaskAdded { task_id } => task_id,
            _ => None,
        })
    }

    pub async fn cancel_task(&self, task_id: TaskId) -> Result<(), DispatchError> {
        self.issue(Command::CancelTask { task_id }).await.map(|_| ())
    }

    /// `force` is required to delete the task that is currently processing.
    pub async fn delete_task(&self, task_id: TaskId, force: bool) -> Result<(), DispatchError> {
        self.issue(Command::DeleteTask { task_id, force })
            .await
            .map(|_| ())
    }

    pub fn clear_search(&self) {
        let _ = self.requests.send(ClientRequest::ClearSearch);
    }

    /// Stops the loop. Callers still waiting get [`DispatchError::ClientStopped`].
    pub async fn shutdown(self) {
        let _ = self.requests.send(ClientRequest::Shutdown);
        if let Err(err) = self.task.await {
            tq_warn!("Client loop ended abnormally: {}", err);
        }
    }
}

struct EventLoop {
    state: AppState,
    settings: ClientSettings,
    connector: Arc<dyn Connector>,
    link: Option<TransportLink>,
    pending: HashMap<RequestId, oneshot::Sender<CommandResult>>,
    next_request_id: RequestId,
    internal_tx: mpsc::UnboundedSender<Internal>,
    view_tx: watch::Sender<AppViewModel>,
}

impl EventLoop {
    async fn run(
        mut self,
        mut requests: mpsc::UnboundedReceiver<ClientRequest>,
        mut internal_rx: mpsc::UnboundedReceiver<Internal>,
    ) {
        self.dispatch(Msg::ConnectRequested);

        loop {
            let step = tokio::select! {
                request = requests.recv() => match request {
                    Some(ClientRequest::Shutdown) | None => Step::Stop,
                    Some(request) => Step::Request(request),
                },
                Some(internal) = internal_rx.recv() => Step::Internal(internal),
                event = next_link_event(&mut self.link) => Step::Link(event),
            };

            match step {
                Step::Request(request) => self.on_request(request),
                Step::Internal(internal) => self.on_internal(internal),
                Step::Link(event) => self.on_link_event(event),
                Step::Stop => break,
            }
        }

        self.stop();
    }

    fn on_request(&mut self, request: ClientRequest) {
        match request {
            ClientRequest::Issue { command, reply } => {
                let request_id = self.next_request_id;
                self.next_request_id += 1;
                self.pending.insert(request_id, reply);
                self.dispatch(Msg::CommandIssued {
                    request_id,
                    command,
                });
            }
            ClientRequest::ClearSearch => self.dispatch(Msg::SearchCleared),
            ClientRequest::Shutdown => {}
        }
    }

    fn on_internal(&mut self, internal: Internal) {
        match internal {
            Internal::Connected(Ok(link)) => {
                if self.state.connection() != ConnectionState::Connecting {
                    tq_debug!("Dropping link opened while {}", self.state.connection());
                    return;
                }
                self.link = Some(link);
                self.dispatch(Msg::Connection(ConnectionEvent::Opened));
            }
            Internal::Connected(Err(err)) => {
                self.dispatch(Msg::Connection(ConnectionEvent::Failed {
                    error: err.to_string(),
                }));
            }
            Internal::ReconnectDue => self.dispatch(Msg::ReconnectTimerFired),
        }
    }

    fn on_link_event(&mut self, event: Option<TransportEvent>) {
        match event {
            Some(TransportEvent::Payload(frame)) => self.dispatch(Msg::FrameReceived(frame)),
            Some(TransportEvent::Closed { reason }) => {
                self.link = None;
                self.dispatch(Msg::Connection(ConnectionEvent::Closed { reason }));
            }
            Some(TransportEvent::Error(error)) => {
                self.link = None;
                self.dispatch(Msg::Connection(ConnectionEvent::Failed { error }));
            }
            None => {
                self.link = None;
                self.dispatch(Msg::Connection(ConnectionEvent::Closed { reason: None }));
            }
        }
    }

    /// Runs `update` until no follow-up messages remain, then publishes.
    fn dispatch(&mut self, msg: Msg) {
        let mut queue = VecDeque::from([msg]);
        while let Some(msg) = queue.pop_front() {
            let state = std::mem::take(&mut self.state);
            let (next, effects) = update(state, msg);
            self.state = next;
            for effect in effects {
                if let Some(follow_up) = self.execute(effect) {
                    queue.push_back(follow_up);
                }
            }
        }

        if self.state.consume_dirty() {
            self.view_tx.send_replace(self.state.view());
        }
    }

    fn execute(&mut self, effect: Effect) -> Option<Msg> {
        match effect {
            Effect::Connect => {
                let url = match self.settings.websocket_url() {
                    Ok(url) => url,
                    Err(err) => {
                        return Some(Msg::Connection(ConnectionEvent::Failed {
                            error: err.to_string(),
                        }))
                    }
                };
                tq_info!("Connecting to {}", url);
                let connector = self.connector.clone();
                let internal_tx = self.internal_tx.clone();
                tokio::spawn(async move {
                    let result = connector.connect(&url).await;
                    let _ = internal_tx.send(Internal::Connected(result));
                });
                None
            }
            Effect::ScheduleReconnect { delay } => {
                let internal_tx = self.internal_tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = internal_tx.send(Internal::ReconnectDue);
                });
                None
            }
            Effect::Send { request_id, frame } => {
                let sent = self
                    .link
                    .as_ref()
                    .is_some_and(|link| link.outbound.send(frame).is_ok());
                if sent {
                    return None;
                }
                tq_warn!("Could not write frame for request {:?}", request_id);
                self.link = None;
                Some(Msg::Connection(ConnectionEvent::Failed {
                    error: "write side of the channel is gone".to_string(),
                }))
            }
            Effect::Settle { request_id, result } => {
                match self.pending.remove(&request_id) {
                    Some(reply) => {
                        let _ = reply.send(result);
                    }
                    None => tq_debug!("No caller waits for request {}", request_id),
                }
                None
            }
            Effect::ForwardServerLog { level, message } => {
                tq_logging::forward_server_log(level.as_deref(), &message);
                None
            }
        }
    }

    fn stop(&mut self) {
        self.link = None;
        for (_, reply) in self.pending.drain() {
            let _ = reply.send(Err(DispatchError::ClientStopped));
        }
        tq_info!("Client loop stopped");
    }
}

async fn next_link_event(link: &mut Option<TransportLink>) -> Option<TransportEvent> {
    match link {
        Some(link) => link.inbound.recv().await,
        None => std::future::pending().await,
    }
}
