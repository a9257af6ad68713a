//! Prompt line parsing.

use tq_core::TaskId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum InputCommand {
    /// Empty pattern means the server default.
    Search { pattern: String },
    ClearSearch,
    /// Put a path on the local pending list.
    Stage { path: String },
    /// 1-based position on the pending list.
    Unstage { position: usize },
    /// Submit every staged path as a task.
    Submit,
    Add { path: String },
    Cancel { task_id: TaskId },
    Delete { task_id: TaskId, force: bool },
    Refresh,
    Show,
    Help,
    Quit,
}

pub(crate) const HELP: &str = "\
commands:
  search [pattern]        search server files (empty: server default pattern)
  clear                   clear search results
  stage <path>            add a /media/ path to the pending list
  unstage <n>             remove entry n from the pending list
  submit                  queue every pending path
  add <path>              queue one path right away
  cancel <task id>        cancel a task
  delete <task id> [force]  delete a task; force is needed while it runs
  refresh                 fetch a fresh snapshot
  show                    print the current view
  help                    this text
  quit";

/// `Ok(None)` for a blank line.
pub(crate) fn parse_line(line: &str) -> Result<Option<InputCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "search" | "s" => InputCommand::Search {
            pattern: rest.to_string(),
        },
        "clear" => InputCommand::ClearSearch,
        "stage" => InputCommand::Stage {
            path: required(rest, "stage <path>")?,
        },
        "unstage" => {
            let position = rest
                .parse::<usize>()
                .ok()
                .filter(|position| *position > 0)
                .ok_or_else(|| "usage: unstage <n>".to_string())?;
            InputCommand::Unstage { position }
        }
        "submit" => InputCommand::Submit,
        "add" => InputCommand::Add {
            path: required(rest, "add <path>")?,
        },
        "cancel" => InputCommand::Cancel {
            task_id: TaskId::new(required(rest, "cancel <task id>")?),
        },
        "delete" | "rm" => {
            let mut parts = rest.split_whitespace();
            let task_id = parts
                .next()
                .ok_or_else(|| "usage: delete <task id> [force]".to_string())?;
            let force = match parts.next() {
                None => false,
                Some("force" | "--force" | "-f") => true,
                Some(other) => return Err(format!("unexpected argument {other:?}")),
            };
            InputCommand::Delete {
                task_id: TaskId::new(task_id),
                force,
            }
        }
        "refresh" | "r" => InputCommand::Refresh,
        "show" | "ls" => InputCommand::Show,
        "help" | "?" => InputCommand::Help,
        "quit" | "exit" | "q" => InputCommand::Quit,
        other => return Err(format!("unknown command {other:?}; type help")),
    };
    Ok(Some(command))
}

fn required(rest: &str, usage: &str) -> Result<String, String> {
    if rest.is_empty() {
        Err(format!("usage: {usage}"))
    } else {
        Ok(rest.to_string())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn paths_keep_inner_spaces() {
        assert_eq!(
            parse_line("  add /media/My Film (2020).mkv  "),
            Ok(Some(InputCommand::Add {
                path: "/media/My Film (2020).mkv".into()
            }))
        );
    }

    #[test]
    fn search_without_pattern_uses_server_default() {
        assert_eq!(
            parse_line("search"),
            Ok(Some(InputCommand::Search {
                pattern: String::new()
            }))
        );
        assert_eq!(
            parse_line(r"s DTS.*5\.1"),
            Ok(Some(InputCommand::Search {
                pattern: r"DTS.*5\.1".into()
            }))
        );
    }

    #[test]
    fn delete_accepts_force_flag() {
        assert_eq!(
            parse_line("delete 7 force"),
            Ok(Some(InputCommand::Delete {
                task_id: TaskId::new("7"),
                force: true
            }))
        );
        assert_eq!(
            parse_line("rm 7"),
            Ok(Some(InputCommand::Delete {
                task_id: TaskId::new("7"),
                force: false
            }))
        );
        assert!(parse_line("delete 7 now").is_err());
    }

    #[test]
    fn blank_and_unknown_lines() {
        assert_eq!(parse_line("   "), Ok(None));
        assert!(parse_line("frobnicate").is_err());
        assert!(parse_line("unstage 0").is_err());
        assert!(parse_line("cancel").is_err());
    }
}
