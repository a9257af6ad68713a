use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use futures_util::stream::{FuturesUnordered, StreamExt};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tq_core::{
    outcome_line, update, AppState, AppViewModel, Command, CommandKind, CommandResponse,
    DispatchError, Msg, Notification, ResponseBody, StagedFiles,
};
use tq_engine::{ClientSettings, MirrorClient, PullClient, PullError, WsConnector};
use tq_logging::{tq_info, tq_warn};

use super::config::{load_config, CONFIG_FILENAME};
use super::input::{self, InputCommand};
use super::logging;
use super::ui::render::{render, render_staged};

/// Minimum spacing between two full redraws.
const RENDER_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Parser, Debug)]
#[command(name = "tq_console")]
#[command(about = "Console mirror of a remote transcode queue")]
struct Cli {
    /// RON config file
    #[arg(long, default_value = CONFIG_FILENAME)]
    config: PathBuf,

    /// Server base url, e.g. http://127.0.0.1:8080
    #[arg(long, env = "TQ_SERVER_URL")]
    server: Option<String>,

    /// Poll the HTTP endpoints instead of holding the realtime channel
    #[arg(long)]
    pull: bool,

    #[arg(short, long)]
    verbose: bool,
}

pub async fn run_app() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let (config, warning) = load_config(&cli.config);
    logging::initialize(config.log_destination, cli.verbose);
    if let Some(warning) = warning {
        tq_warn!("{}", warning);
    }

    let settings = config.client_settings(cli.server.as_deref());
    tq_info!("tq_console starting against {}", settings.server_url);
    println!("{}", input::HELP);

    if cli.pull || config.pull {
        run_pull(settings, config.poll_interval()).await
    } else {
        run_realtime(settings).await
    }
}

async fn run_realtime(settings: ClientSettings) -> anyhow::Result<()> {
    settings
        .websocket_url()
        .context("server url cannot be used for the realtime channel")?;
    let client = MirrorClient::spawn(settings, Arc::new(WsConnector));
    let lines = BufReader::new(tokio::io::stdin()).lines();
    let outcome = realtime_loop(&client, lines).await;
    client.shutdown().await;
    outcome
}

/// Prompt and redraw loop. Issued commands run alongside it so the view
/// keeps refreshing while a round trip is pending.
async fn realtime_loop<R>(client: &MirrorClient, mut lines: Lines<R>) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut view = client.subscribe();
    let mut staged = StagedFiles::default();
    let mut redraw = tokio::time::interval(RENDER_INTERVAL);
    let mut in_flight = FuturesUnordered::new();
    let mut stale = true;

    loop {
        tokio::select! {
            changed = view.changed() => {
                if changed.is_err() {
                    break;
                }
                stale = true;
            }
            _ = redraw.tick() => {
                if stale {
                    print!("{}", render(&view.borrow_and_update()));
                    stale = false;
                }
            }
            Some(line) = in_flight.next(), if !in_flight.is_empty() => {
                println!("{line}");
            }
            line = lines.next_line() => {
                let Some(line) = line.context("reading stdin")? else {
                    break;
                };
                let command = match input::parse_line(&line) {
                    Ok(Some(InputCommand::Quit)) => break,
                    Ok(Some(command)) => command,
                    Ok(None) => continue,
                    Err(message) => {
                        println!("{message}");
                        continue;
                    }
                };
                let current = view.borrow().clone();
                let Some(remote) = handle_local(command, &mut staged, &current) else {
                    continue;
                };
                if matches!(remote, InputCommand::ClearSearch) {
                    client.clear_search();
                    continue;
                }
                for command in to_server_commands(remote, &mut staged) {
                    in_flight.push(issue_and_describe(client, command));
                }
            }
        }
    }

    if !in_flight.is_empty() {
        tq_info!("Leaving with {} command(s) still pending", in_flight.len());
    }
    Ok(())
}

async fn issue_and_describe(client: &MirrorClient, command: Command) -> String {
    let kind = command.kind();
    let result = client.issue(command).await;
    outcome_line(kind, &result)
}

async fn run_pull(settings: ClientSettings, poll_interval: Duration) -> anyhow::Result<()> {
    let client = PullClient::new(settings).context("server url cannot be used for HTTP")?;
    match client.status().await {
        Ok(status) => println!(
            "Server is {} ({} realtime client(s))",
            status.status, status.clients
        ),
        Err(err) => println!("Server status unavailable: {err}"),
    }

    let mut state = AppState::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut staged = StagedFiles::default();
    let mut poll = tokio::time::interval(poll_interval);

    loop {
        tokio::select! {
            _ = poll.tick() => {
                if let Err(err) = refresh_pull(&client, &mut state).await {
                    tq_warn!("Snapshot fetch failed: {}", err);
                }
            }
            line = lines.next_line() => {
                let Some(line) = line.context("reading stdin")? else {
                    break;
                };
                let command = match input::parse_line(&line) {
                    Ok(Some(InputCommand::Quit)) => break,
                    Ok(Some(command)) => command,
                    Ok(None) => continue,
                    Err(message) => {
                        println!("{message}");
                        continue;
                    }
                };
                if let Some(remote) = handle_local(command, &mut staged, &state.view()) {
                    for line in pull_command(&client, &mut state, &mut staged, remote).await {
                        println!("{line}");
                    }
                }
            }
        }

        if state.consume_dirty() {
            println!("(pull mode, refreshed every {}s)", poll_interval.as_secs());
            print!("{}", render(&state.view()));
        }
    }
    Ok(())
}

async fn refresh_pull(client: &PullClient, state: &mut AppState) -> Result<(), PullError> {
    let snapshot = client.fetch_snapshot().await?;
    apply(state, Msg::Notification(Notification::InitialState(snapshot)));
    Ok(())
}

/// Runs one prompt command over HTTP, feeds each outcome to the same
/// reconciler the realtime channel uses and returns the outcome lines.
async fn pull_command(
    client: &PullClient,
    state: &mut AppState,
    staged: &mut StagedFiles,
    command: InputCommand,
) -> Vec<String> {
    if matches!(command, InputCommand::ClearSearch) {
        apply(state, Msg::SearchCleared);
        return Vec::new();
    }
    let mut lines = Vec::new();
    for command in to_server_commands(command, staged) {
        let kind = command.kind();
        let result = match command {
            Command::GetState => refresh_pull(client, state)
                .await
                .map(|()| ResponseBody::Ack { message: None }),
            Command::SearchFiles { pattern } => {
                client.search_files(&pattern).await.map(ResponseBody::Search)
            }
            Command::AddTask { file_path } => client
                .add_task(&file_path)
                .await
                .map(|task_id| ResponseBody::TaskAdded { task_id }),
            Command::CancelTask { task_id } => client
                .cancel_task(&task_id)
                .await
                .map(|()| ResponseBody::Ack { message: None }),
            Command::DeleteTask { task_id, force } => client
                .delete_task(&task_id, force)
                .await
                .map(|()| ResponseBody::Ack { message: None }),
        };
        let result = result.map_err(|err: PullError| err.to_string());
        lines.push(outcome_line(
            kind,
            &result.clone().map_err(DispatchError::Rejected),
        ));
        let mutated = result.is_ok()
            && matches!(
                kind,
                CommandKind::AddTask | CommandKind::CancelTask | CommandKind::DeleteTask
            );
        apply(
            state,
            Msg::Notification(Notification::CommandResponse(CommandResponse {
                kind,
                request_id: None,
                result,
            })),
        );
        if mutated {
            if let Err(err) = refresh_pull(client, state).await {
                tq_warn!("Snapshot fetch after {} failed: {}", kind.as_str(), err);
            }
        }
    }
    lines
}

fn apply(state: &mut AppState, msg: Msg) {
    let (next, _effects) = update(std::mem::take(state), msg);
    *state = next;
}

/// Handles commands that never reach the server and returns the rest.
fn handle_local(
    command: InputCommand,
    staged: &mut StagedFiles,
    view: &AppViewModel,
) -> Option<InputCommand> {
    match command {
        InputCommand::Stage { path } => {
            match staged.stage(&path) {
                Ok(path) => println!("Staged {path}"),
                Err(rejection) => println!("{rejection}"),
            }
            None
        }
        InputCommand::Unstage { position } => {
            match staged.remove(position - 1) {
                Some(path) => println!("Removed {path}"),
                None => println!("No staged file at position {position}"),
            }
            None
        }
        InputCommand::Show => {
            print!("{}", render(view));
            print!("{}", render_staged(staged.paths()));
            None
        }
        InputCommand::Help => {
            println!("{}", input::HELP);
            None
        }
        InputCommand::Submit if staged.is_empty() => {
            println!("No files staged");
            None
        }
        other => Some(other),
    }
}

fn to_server_commands(command: InputCommand, staged: &mut StagedFiles) -> Vec<Command> {
    match command {
        InputCommand::Search { pattern } => vec![Command::SearchFiles { pattern }],
        InputCommand::Add { path } => vec![Command::AddTask { file_path: path }],
        InputCommand::Submit => staged
            .take_all()
            .into_iter()
            .map(|file_path| Command::AddTask { file_path })
            .collect(),
        InputCommand::Cancel { task_id } => vec![Command::CancelTask { task_id }],
        InputCommand::Delete { task_id, force } => vec![Command::DeleteTask { task_id, force }],
        InputCommand::Refresh => vec![Command::GetState],
        InputCommand::ClearSearch
        | InputCommand::Stage { .. }
        | InputCommand::Unstage { .. }
        | InputCommand::Show
        | InputCommand::Help
        | InputCommand::Quit => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tokio::io::AsyncWriteExt;
    use tokio::sync::mpsc;
    use tq_core::{ConnectionState, TaskId};
    use tq_engine::{Connector, TransportError, TransportEvent, TransportLink};
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    type ServerEnd = (mpsc::UnboundedReceiver<String>, mpsc::UnboundedSender<TransportEvent>);

    /// Accepts every link and never answers on it.
    #[derive(Default)]
    struct SilentServer {
        open: Mutex<Vec<ServerEnd>>,
    }

    #[async_trait]
    impl Connector for SilentServer {
        async fn connect(&self, _url: &Url) -> Result<TransportLink, TransportError> {
            let (outbound, frames) = mpsc::unbounded_channel();
            let (events, inbound) = mpsc::unbounded_channel();
            if let Ok(mut open) = self.open.lock() {
                open.push((frames, events));
            }
            Ok(TransportLink { outbound, inbound })
        }
    }

    #[tokio::test]
    async fn prompt_stays_live_while_a_command_waits() {
        let client =
            MirrorClient::spawn(ClientSettings::default(), Arc::new(SilentServer::default()));
        let mut view = client.subscribe();
        view.wait_for(|view| view.connection == ConnectionState::Online)
            .await
            .expect("client running");

        let (mut keyboard, input) = tokio::io::duplex(256);
        let typing = async {
            keyboard.write_all(b"search slow\n").await.expect("type search");
            view.wait_for(|view| view.outstanding_commands == 1)
                .await
                .expect("search in flight");
            keyboard.write_all(b"quit\n").await.expect("type quit");
        };

        let finished = tokio::time::timeout(
            Duration::from_secs(10),
            async { tokio::join!(realtime_loop(&client, BufReader::new(input).lines()), typing) },
        )
        .await;
        let (outcome, ()) = finished.expect("quit handled while the search was pending");
        assert!(outcome.is_ok());

        client.shutdown().await;
    }

    #[tokio::test]
    async fn failed_pull_refresh_is_reported_as_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(500).set_body_json(json!({ "error": "database locked" })),
            )
            .mount(&server)
            .await;
        let client =
            PullClient::new(ClientSettings::with_server_url(server.uri())).expect("valid settings");
        let mut state = AppState::new();
        let mut staged = StagedFiles::default();

        let lines = pull_command(&client, &mut state, &mut staged, InputCommand::Refresh).await;
        assert_eq!(
            lines,
            vec!["Refresh failed: server replied 500: database locked".to_string()]
        );
        assert_eq!(state.snapshots_applied(), 0);
    }

    #[tokio::test]
    async fn pull_delete_refreshes_the_mirror() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/tasks/delete"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "ok" })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/queue"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "queue": [] })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/history"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "history": [] })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/active-task"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "activeTask": null })))
            .mount(&server)
            .await;
        let client =
            PullClient::new(ClientSettings::with_server_url(server.uri())).expect("valid settings");
        let mut state = AppState::new();
        let mut staged = StagedFiles::default();

        let lines = pull_command(
            &client,
            &mut state,
            &mut staged,
            InputCommand::Delete {
                task_id: TaskId::new("2"),
                force: false,
            },
        )
        .await;
        assert_eq!(lines, vec!["Task deleted".to_string()]);
        assert_eq!(state.snapshots_applied(), 1);
    }
}
