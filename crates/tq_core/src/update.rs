use tq_logging::{tq_debug, tq_error, tq_info, tq_warn};

use crate::resync::{decide, ResyncDecision, ResyncSignal};
use crate::{
    decode_notification, ActivityLevel, AppState, Command, CommandKind, CommandResponse,
    ConnectionEvent, ConnectionState, DispatchError, Effect, Msg, Notification, ProgressUpdate,
    ResponseBody, ServerLog,
};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::ConnectRequested => begin_connect(&mut state),
        Msg::ReconnectTimerFired => {
            if !state.reconnect_mut().fire() {
                tq_debug!("Reconnect timer fired with no attempt pending");
            }
            begin_connect(&mut state)
        }
        Msg::Connection(event) => on_connection(&mut state, event),
        Msg::FrameReceived(frame) => match decode_notification(&frame) {
            Ok(notification) => on_notification(&mut state, notification),
            Err(err) => {
                tq_warn!("Discarding inbound frame: {}", err);
                Vec::new()
            }
        },
        Msg::Notification(notification) => on_notification(&mut state, notification),
        Msg::CommandIssued {
            request_id,
            command,
        } => {
            if !state.connection().is_online() {
                record_outcome(&mut state, command.kind(), &Err(DispatchError::NotConnected));
                return (
                    state,
                    vec![Effect::Settle {
                        request_id,
                        result: Err(DispatchError::NotConnected),
                    }],
                );
            }
            let kind = command.kind();
            match state.ledger_mut().admit(request_id, command) {
                Some(command) => {
                    state.mark_dirty();
                    vec![Effect::Send {
                        request_id: Some(request_id),
                        frame: command.to_frame(Some(request_id)),
                    }]
                }
                None => {
                    tq_debug!(
                        "Request {} ({}) waits behind an in-flight command of the same type",
                        request_id,
                        kind.as_str()
                    );
                    state.mark_dirty();
                    Vec::new()
                }
            }
        }
        Msg::SearchCleared => {
            if state.mirror_mut().clear_search_results() {
                state.mark_dirty();
            }
            Vec::new()
        }
    };

    (state, effects)
}

fn begin_connect(state: &mut AppState) -> Vec<Effect> {
    match state.connection().transition(ConnectionState::Connecting) {
        Ok(next) => {
            *state.connection_mut() = next;
            state.mark_dirty();
            vec![Effect::Connect]
        }
        Err(_) => {
            tq_debug!(
                "Connect skipped: channel is already {}",
                state.connection()
            );
            Vec::new()
        }
    }
}

fn on_connection(state: &mut AppState, event: ConnectionEvent) -> Vec<Effect> {
    match event {
        ConnectionEvent::Opened => {
            match state.connection().transition(ConnectionState::Online) {
                Ok(next) => *state.connection_mut() = next,
                Err(err) => {
                    tq_warn!("Ignoring open event: {}", err);
                    return Vec::new();
                }
            }
            state.reconnect_mut().cancel();
            state.record(ActivityLevel::Info, "Realtime channel connected");
            tq_info!("Realtime channel connected");

            let active = state.mirror().active_task();
            match decide(ResyncSignal::Reconnected, active) {
                ResyncDecision::Refetch => vec![refetch()],
                ResyncDecision::Patch | ResyncDecision::None => Vec::new(),
            }
        }
        ConnectionEvent::Closed { reason } => {
            let detail = reason.unwrap_or_else(|| "connection closed".to_string());
            go_offline(state, ActivityLevel::Warning, detail)
        }
        ConnectionEvent::Failed { error } => go_offline(state, ActivityLevel::Error, error),
    }
}

fn go_offline(state: &mut AppState, level: ActivityLevel, detail: String) -> Vec<Effect> {
    let mut effects = Vec::new();
    match state.connection().transition(ConnectionState::Offline) {
        Ok(next) => {
            *state.connection_mut() = next;
            state.record(level, format!("Realtime channel offline: {detail}"));
            tq_warn!("Realtime channel offline: {}", detail);
        }
        Err(_) => tq_debug!("Already offline: {}", detail),
    }

    for (request_id, kind) in state.ledger_mut().drain() {
        record_outcome(state, kind, &Err(DispatchError::ConnectionClosed));
        effects.push(Effect::Settle {
            request_id,
            result: Err(DispatchError::ConnectionClosed),
        });
    }

    if let Some(delay) = state.reconnect_mut().schedule() {
        tq_info!("Reconnecting in {:?}", delay);
        effects.push(Effect::ScheduleReconnect { delay });
    }
    effects
}

fn refetch() -> Effect {
    Effect::Send {
        request_id: None,
        frame: Command::GetState.to_frame(None),
    }
}

fn on_notification(state: &mut AppState, notification: Notification) -> Vec<Effect> {
    let decision = decide(
        ResyncSignal::Notification(&notification),
        state.mirror().active_task(),
    );

    match notification {
        Notification::InitialState(snapshot) => {
            let violations = state.mirror_mut().apply_snapshot(snapshot);
            for violation in violations {
                tq_error!("Mirror invariant violated after snapshot: {}", violation);
            }
            state.note_snapshot();
            state.mark_dirty();
            Vec::new()
        }
        Notification::QueueUpdate => request_refetch(state, decision),
        Notification::ConversionProgress(update) => on_progress(state, update, decision),
        Notification::Log(log) => on_server_log(state, log),
        Notification::CommandResponse(response) => on_response(state, response),
    }
}

fn request_refetch(state: &AppState, decision: ResyncDecision) -> Vec<Effect> {
    if decision != ResyncDecision::Refetch {
        return Vec::new();
    }
    if !state.connection().is_online() {
        tq_debug!("Refetch deferred until the channel is online");
        return Vec::new();
    }
    vec![refetch()]
}

fn on_progress(
    state: &mut AppState,
    update: ProgressUpdate,
    decision: ResyncDecision,
) -> Vec<Effect> {
    if state.mirror_mut().set_last_output(update.message.clone()) {
        state.mark_dirty();
    }

    match decision {
        ResyncDecision::Patch => {
            if state.mirror_mut().patch_progress(&update) {
                state.mark_dirty();
            }
            Vec::new()
        }
        ResyncDecision::Refetch => request_refetch(state, decision),
        ResyncDecision::None => Vec::new(),
    }
}

fn on_server_log(state: &mut AppState, log: ServerLog) -> Vec<Effect> {
    let Some(message) = log.message.filter(|text| !text.trim().is_empty()) else {
        tq_debug!("Dropping empty server log line");
        return Vec::new();
    };
    state.record(ActivityLevel::from_server_label(log.level.as_deref()), message.clone());
    vec![Effect::ForwardServerLog {
        level: log.level,
        message,
    }]
}

fn on_response(state: &mut AppState, response: CommandResponse) -> Vec<Effect> {
    let CommandResponse {
        kind,
        request_id,
        result,
    } = response;

    if let Ok(ResponseBody::Search(results)) = &result {
        state.mirror_mut().set_search_results(results.files.clone());
        state.mark_dirty();
    }

    let settlement = state.ledger_mut().settle(kind, request_id);
    let result = result.map_err(DispatchError::Rejected);
    // The server announces task mutations only as log lines, so pull the new queue.
    let mutated = result.is_ok()
        && matches!(
            kind,
            CommandKind::AddTask | CommandKind::CancelTask | CommandKind::DeleteTask
        );
    let mut effects = Vec::new();

    match settlement.settled {
        Some(settled) => {
            record_outcome(state, kind, &result);
            effects.push(Effect::Settle {
                request_id: settled,
                result,
            });
        }
        None if kind == CommandKind::GetState => {
            tq_debug!("Snapshot request acknowledged");
        }
        None => {
            tq_debug!(
                "{} without a waiting caller (request id {:?})",
                kind.response_type(),
                request_id
            );
            record_outcome(state, kind, &result);
        }
    }

    if mutated {
        effects.extend(request_refetch(state, ResyncDecision::Refetch));
    }
    if let Some((next_id, next)) = settlement.next {
        effects.push(Effect::Send {
            request_id: Some(next_id),
            frame: next.to_frame(Some(next_id)),
        });
    }
    effects
}

fn record_outcome(state: &mut AppState, kind: CommandKind, result: &Result<ResponseBody, DispatchError>) {
    let level = if result.is_ok() {
        ActivityLevel::Info
    } else {
        ActivityLevel::Error
    };
    let line = outcome_line(kind, result);
    match level {
        ActivityLevel::Error => tq_warn!("{}", line),
        _ => tq_info!("{}", line),
    }
    state.record(level, line);
}

/// One human-readable line per command outcome.
pub fn outcome_line(kind: CommandKind, result: &Result<ResponseBody, DispatchError>) -> String {
    match (kind, result) {
        (_, Err(DispatchError::NotConnected)) => {
            format!("Cannot {}: realtime channel is not connected", verb(kind))
        }
        (_, Err(err)) => format!("{} failed: {}", title(kind), err),
        (CommandKind::SearchFiles, Ok(ResponseBody::Search(results))) => {
            format!("Found {} file(s)", results.count)
        }
        (CommandKind::AddTask, Ok(ResponseBody::TaskAdded { task_id: Some(id) })) => {
            format!("File added to the queue as task {id}")
        }
        (CommandKind::AddTask, Ok(_)) => "File added to the queue".to_string(),
        (CommandKind::CancelTask, Ok(_)) => "Task cancelled".to_string(),
        (CommandKind::DeleteTask, Ok(_)) => "Task deleted".to_string(),
        (CommandKind::GetState, Ok(_)) => "State refreshed".to_string(),
        (CommandKind::SearchFiles, Ok(_)) => "Search finished".to_string(),
    }
}

fn verb(kind: CommandKind) -> &'static str {
    match kind {
        CommandKind::GetState => "refresh state",
        CommandKind::SearchFiles => "search files",
        CommandKind::AddTask => "add task",
        CommandKind::CancelTask => "cancel task",
        CommandKind::DeleteTask => "delete task",
    }
}

fn title(kind: CommandKind) -> &'static str {
    match kind {
        CommandKind::GetState => "Refresh",
        CommandKind::SearchFiles => "Search",
        CommandKind::AddTask => "Add task",
        CommandKind::CancelTask => "Cancel",
        CommandKind::DeleteTask => "Delete",
    }
}
