use std::fmt::Write as _;

use chrono::{DateTime, Local};
use tq_core::{ActivityLevel, ActiveTaskView, AppViewModel, SearchFile, Task, TaskStatus};

const HISTORY_ROWS: usize = 10;
const ACTIVITY_ROWS: usize = 6;
const BAR_WIDTH: usize = 30;

/// Full text rendering of the mirror.
pub fn render(view: &AppViewModel) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "== transcode queue | {} | queue {} | history {} | pending commands {} ==",
        view.connection,
        view.queue.len(),
        view.history.len(),
        view.outstanding_commands
    );

    match &view.active_task {
        Some(active) => render_active(&mut out, active),
        None => out.push_str("No active conversion\n"),
    }

    out.push_str("\nQueue:\n");
    if view.queue.is_empty() {
        out.push_str("  (empty)\n");
    }
    for task in &view.queue {
        let _ = writeln!(out, "  {}", format_task_row(task));
    }

    out.push_str("\nHistory:\n");
    if view.history.is_empty() {
        out.push_str("  (empty)\n");
    }
    for task in view.history.iter().take(HISTORY_ROWS) {
        let _ = writeln!(out, "  {}", format_task_row(task));
    }
    if view.history.len() > HISTORY_ROWS {
        let _ = writeln!(out, "  ... {} more", view.history.len() - HISTORY_ROWS);
    }

    if !view.search_results.is_empty() {
        let _ = writeln!(out, "\nSearch results ({}):", view.search_results.len());
        for file in &view.search_results {
            let _ = writeln!(out, "  {}", format_search_row(file));
        }
    }

    let start = view.activity.len().saturating_sub(ACTIVITY_ROWS);
    if start < view.activity.len() {
        out.push_str("\nActivity:\n");
    }
    for entry in &view.activity[start..] {
        let marker = match entry.level {
            ActivityLevel::Info => " ",
            ActivityLevel::Warning => "!",
            ActivityLevel::Error => "x",
        };
        let _ = writeln!(out, " {marker} {}", entry.message);
    }
    out
}

/// Numbered pending-file list.
pub fn render_staged(paths: &[String]) -> String {
    if paths.is_empty() {
        return "No files staged\n".to_string();
    }
    let mut out = String::from("Staged files:\n");
    for (index, path) in paths.iter().enumerate() {
        let _ = writeln!(out, "  {}. {}", index + 1, path);
    }
    out
}

fn render_active(out: &mut String, active: &ActiveTaskView) {
    let percent = active.percent();
    let filled = ((percent / 100.0) * BAR_WIDTH as f64).round() as usize;
    let _ = writeln!(
        out,
        "Converting #{} {}\n  [{}{}] {:5.1}%  {} / {}",
        active.task.id,
        active.task.file_name(),
        "#".repeat(filled.min(BAR_WIDTH)),
        "-".repeat(BAR_WIDTH - filled.min(BAR_WIDTH)),
        percent,
        format_clock(active.task.current_time),
        format_clock(active.task.duration),
    );
    if let Some(audio) = &active.task.audio_info {
        let _ = writeln!(
            out,
            "  audio: {} {} ({} ch, {} Hz)",
            audio.codec_name, audio.channel_layout, audio.channels, audio.sample_rate
        );
    }
    if let Some(line) = &active.last_output {
        let _ = writeln!(out, "  > {line}");
    }
}

fn format_task_row(task: &Task) -> String {
    let mut row = format!("#{:<5} {:<10} {}", task.id, status_label(task.status), task.file_name());
    match task.status {
        TaskStatus::Processing => {
            let _ = write!(row, " ({:.1}%)", task.progress.unwrap_or_default());
        }
        TaskStatus::Completed => {
            if let Some(output) = &task.output_path {
                let _ = write!(row, " -> {output}");
            }
        }
        TaskStatus::Error => {
            if let Some(error) = &task.error {
                let _ = write!(row, " [{error}]");
            }
        }
        TaskStatus::Pending => {}
    }
    let stamp = task
        .completed_at
        .as_deref()
        .or(task.started_at.as_deref())
        .or(task.created_at.as_deref())
        .and_then(format_timestamp);
    if let Some(stamp) = stamp {
        let _ = write!(row, "  {stamp}");
    }
    row
}

fn format_search_row(file: &SearchFile) -> String {
    let modified = DateTime::from_timestamp(file.modified, 0)
        .map(|time| time.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default();
    format!("{:>10}  {}  {}", format_size(file.size), modified, file.path)
}

fn status_label(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "pending",
        TaskStatus::Processing => "converting",
        TaskStatus::Completed => "done",
        TaskStatus::Error => "failed",
    }
}

/// RFC 3339 server timestamps shown in local time.
fn format_timestamp(raw: &str) -> Option<String> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|time| time.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
}

fn format_clock(seconds: Option<f64>) -> String {
    let Some(seconds) = seconds.filter(|value| value.is_finite() && *value >= 0.0) else {
        return "--:--".to_string();
    };
    let total = seconds as u64;
    let (hours, minutes, secs) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes:02}:{secs:02}")
    }
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
