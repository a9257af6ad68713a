use std::sync::Once;

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tq_core::{
    update, AppState, ConnectionEvent, Effect, InvariantViolation, Msg, TaskId, TaskStatus,
};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(tq_logging::initialize_for_tests);
}

fn online() -> AppState {
    let (state, _) = update(AppState::new(), Msg::ConnectRequested);
    let (state, _) = update(state, Msg::Connection(ConnectionEvent::Opened));
    state
}

fn frame(state: AppState, value: Value) -> (AppState, Vec<Effect>) {
    update(state, Msg::FrameReceived(value.to_string()))
}

fn refetches(effects: &[Effect]) -> usize {
    effects
        .iter()
        .filter(|effect| {
            matches!(effect, Effect::Send { request_id: None, frame } if frame.contains("\"get_state\""))
        })
        .count()
}

fn snapshot(queue: Value, history: Value, active: Value) -> Value {
    json!({
        "type": "initial_state",
        "data": {
            "queue": queue,
            "history": history,
            "activeTask": active,
            "status": "online",
            "timestamp": 1_700_000_000
        }
    })
}

fn pending(id: &str) -> Value {
    json!({ "id": id, "filePath": format!("/media/{id}.mkv"), "status": "pending", "progress": 0 })
}

fn processing(id: &str) -> Value {
    json!({
        "id": id,
        "filePath": format!("/media/{id}.mkv"),
        "status": "processing",
        "progress": 0,
        "duration": 5400.0,
        "startedAt": "2026-10-19T10:00:00Z"
    })
}

fn completed(id: &str) -> Value {
    json!({
        "id": id,
        "filePath": format!("/media/{id}.mkv"),
        "status": "completed",
        "progress": 100,
        "completedAt": "2026-10-19T11:30:00Z"
    })
}

#[test]
fn snapshot_with_pending_task_has_no_active_task() {
    init_logging();
    let (mut state, effects) = frame(
        online(),
        snapshot(json!([{ "id": "1", "status": "pending" }]), json!([]), Value::Null),
    );

    assert!(effects.is_empty());
    assert!(state.consume_dirty());
    let view = state.view();
    assert!(view.active_task.is_none());
    assert_eq!(view.queue.len(), 1);
    assert_eq!(view.queue[0].id, TaskId::new("1"));
    assert_eq!(view.queue[0].status, TaskStatus::Pending);
    assert!(state.mirror().violations().is_empty());
}

#[test]
fn null_collections_read_as_empty() {
    init_logging();
    let (state, _) = frame(online(), snapshot(Value::Null, Value::Null, Value::Null));
    assert!(state.mirror().queue().is_empty());
    assert!(state.mirror().history().is_empty());
    assert_eq!(state.snapshots_applied(), 1);
}

#[test]
fn replaying_a_snapshot_is_idempotent() {
    init_logging();
    let payload = snapshot(
        json!([processing("1"), pending("2")]),
        json!([completed("0")]),
        processing("1"),
    );
    let (state, _) = frame(online(), payload.clone());
    let once = state.mirror().clone();
    let (state, _) = frame(state, payload);

    assert_eq!(state.mirror(), &once);
    assert_eq!(state.snapshots_applied(), 2);
}

#[test]
fn progress_lifecycle_patches_between_refetches() {
    init_logging();
    let (state, _) = frame(online(), snapshot(json!([pending("1")]), json!([]), Value::Null));

    // Start of conversion: a status transition, so the mirror refetches.
    let (state, effects) = frame(
        state,
        json!({ "type": "conversion_progress", "data": { "taskId": "1", "status": "processing", "progress": 0 } }),
    );
    assert_eq!(refetches(&effects), 1);
    assert_eq!(state.mirror().queue()[0].status, TaskStatus::Pending);

    let (state, _) = frame(
        state,
        snapshot(json!([processing("1")]), json!([]), processing("1")),
    );
    assert_eq!(state.mirror().active_task().unwrap().id, TaskId::new("1"));

    // Progress only: patched in place, no round trip.
    let (state, effects) = frame(
        state,
        json!({ "type": "conversion_progress", "data": { "progress": 45, "currentTime": 2430.0 } }),
    );
    assert_eq!(effects, Vec::new());
    let active = state.mirror().active_task().unwrap();
    assert_eq!(active.progress, Some(45.0));
    assert_eq!(active.current_time, Some(2430.0));
    assert_eq!(active.status, TaskStatus::Processing);
    assert_eq!(state.mirror().queue()[0].progress, Some(45.0));
    assert_eq!(state.mirror().queue().len(), 1);

    // Completion: refetch, never a local move.
    let (state, effects) = frame(
        state,
        json!({ "type": "conversion_progress", "data": { "taskId": "1", "status": "completed", "progress": 100 } }),
    );
    assert_eq!(refetches(&effects), 1);
    assert_eq!(state.mirror().active_task().unwrap().status, TaskStatus::Processing);

    let (state, _) = frame(state, snapshot(json!([]), json!([completed("1")]), Value::Null));
    assert!(state.mirror().active_task().is_none());
    assert!(state.mirror().queue().is_empty());
    assert_eq!(state.mirror().history()[0].id, TaskId::new("1"));
    assert_eq!(state.mirror().history()[0].status, TaskStatus::Completed);
}

#[test]
fn progress_patch_never_changes_identity_or_membership() {
    init_logging();
    let (state, _) = frame(
        online(),
        snapshot(json!([processing("7"), pending("8")]), json!([]), processing("7")),
    );
    let before_ids: Vec<TaskId> = state.mirror().queue().iter().map(|t| t.id.clone()).collect();

    let (state, effects) = frame(
        state,
        json!({ "type": "conversion_progress", "data": { "taskId": "7", "status": "processing", "progress": 150, "duration": 60.0 } }),
    );
    assert!(effects.is_empty());

    let after_ids: Vec<TaskId> = state.mirror().queue().iter().map(|t| t.id.clone()).collect();
    assert_eq!(before_ids, after_ids);
    let active = state.mirror().active_task().unwrap();
    assert_eq!(active.id, TaskId::new("7"));
    assert_eq!(active.status, TaskStatus::Processing);
    assert_eq!(active.progress, Some(100.0));
    assert_eq!(active.duration, Some(60.0));
}

#[test]
fn progress_for_another_task_refetches() {
    init_logging();
    let (state, _) = frame(
        online(),
        snapshot(json!([processing("1")]), json!([]), processing("1")),
    );
    let (state, effects) = frame(
        state,
        json!({ "type": "conversion_progress", "data": { "taskId": "2", "progress": 10 } }),
    );
    assert_eq!(refetches(&effects), 1);
    assert_eq!(state.mirror().active_task().unwrap().progress, Some(0.0));
}

#[test]
fn converter_output_is_kept_for_the_active_task() {
    init_logging();
    let (state, _) = frame(
        online(),
        snapshot(json!([processing("1")]), json!([]), processing("1")),
    );
    let (state, _) = frame(
        state,
        json!({ "type": "conversion_progress", "data": { "message": "size=  1024kB time=00:01:00.00" } }),
    );
    assert_eq!(
        state.view().active_task.unwrap().last_output.as_deref(),
        Some("size=  1024kB time=00:01:00.00")
    );

    // A different active task starts with a clean output line.
    let (state, _) = frame(
        state,
        snapshot(json!([processing("2")]), json!([completed("1")]), processing("2")),
    );
    assert_eq!(state.view().active_task.unwrap().last_output, None);
}

#[test]
fn queue_update_always_refetches() {
    init_logging();
    let (state, effects) = frame(online(), json!({ "type": "queue_update", "data": { "queue": [] } }));
    assert_eq!(refetches(&effects), 1);

    let (_state, effects) = frame(state, json!({ "type": "queue_update" }));
    assert_eq!(refetches(&effects), 1);
}

#[test]
fn two_processing_tasks_are_reported_not_corrected() {
    init_logging();
    let (state, _) = frame(
        online(),
        snapshot(json!([processing("1"), processing("2")]), json!([]), processing("1")),
    );

    assert_eq!(state.mirror().processing_count(), 2);
    assert_eq!(
        state.mirror().violations(),
        vec![InvariantViolation::MultipleProcessing {
            ids: vec![TaskId::new("1"), TaskId::new("2")]
        }]
    );
}

#[test]
fn active_task_missing_from_queue_is_reported() {
    init_logging();
    let (state, _) = frame(online(), snapshot(json!([pending("1")]), json!([]), processing("9")));
    assert_eq!(
        state.mirror().violations(),
        vec![InvariantViolation::ActiveNotInQueue {
            active: TaskId::new("9")
        }]
    );
}

#[test]
fn malformed_and_unknown_frames_are_discarded() {
    init_logging();
    let (state, _) = frame(online(), snapshot(json!([pending("1")]), json!([]), Value::Null));
    let before = state.mirror().clone();

    let (state, effects) = update(state, Msg::FrameReceived("{not json".to_string()));
    assert!(effects.is_empty());
    let (state, effects) = frame(state, json!({ "type": "scan_progress", "data": { "progress": 3 } }));
    assert!(effects.is_empty());
    let (state, effects) = frame(
        state,
        json!({ "type": "initial_state", "data": { "queue": [{ "id": "1", "status": "exploded" }] } }),
    );
    assert!(effects.is_empty());

    assert_eq!(state.mirror(), &before);
}
