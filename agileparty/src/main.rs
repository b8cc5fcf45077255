//! `agileparty`: headless planning-poker room client.
//!
//! Joins (or creates) a room, prints every state change as a line on
//! stdout and reads slash commands from stdin. Logs go to stderr or to
//! `--log-file`.
//!
//! ```bash
//! # Join an existing room
//! cargo run --bin agileparty -- --room 3f2a... --nickname alice
//!
//! # Create a room and join it
//! cargo run --bin agileparty -- --create "Sprint 42" --nickname alice
//!
//! # Or via environment variables
//! AGILEPARTY_WS_URL=ws://127.0.0.1:8080 AGILEPARTY_ROOM=3f2a... \
//!     AGILEPARTY_NICKNAME=alice cargo run
//! ```

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_appender::non_blocking::WorkerGuard;

use agileparty::api::HttpRoomApi;
use agileparty::cli::{self, HELP, Input};
use agileparty::config::{CliArgs, ClientConfig};
use agileparty::membership::{Joined, Membership};
use agileparty::net::{NetEvent, NetHandle};
use agileparty::room::{average_display, vote_counts, voted_count};
use agileparty::tasks::progress;
use agileparty_proto::room::{RoomId, RoomState};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = CliArgs::parse();

    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Warning: failed to load config file: {e}");
            ClientConfig::from_cli(&cli)
        }
    };

    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());
    tracing::info!("agileparty starting");

    let Some(nickname) = config.nickname.clone().filter(|n| !n.trim().is_empty()) else {
        eprintln!("a nickname is required (--nickname or AGILEPARTY_NICKNAME)");
        return ExitCode::FAILURE;
    };

    let api = match HttpRoomApi::new(&config.api_url, config.request_timeout) {
        Ok(api) => Arc::new(api),
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let room_id = config.room_id.clone();
    let mut membership = Membership::new(config, api);
    let joined = match (cli.create.as_deref(), room_id) {
        (Some(name), _) => membership.create_room(name, &nickname).await,
        (None, Some(room)) => membership.join_room(RoomId::new(room), &nickname).await,
        (None, None) => {
            eprintln!("pass --room <id> to join or --create <name> to start a room");
            return ExitCode::FAILURE;
        }
    };
    let Joined { room, mut events } = match joined {
        Ok(joined) => joined,
        Err(e) => {
            eprintln!("could not join: {e}");
            return ExitCode::FAILURE;
        }
    };
    println!("joined \"{}\" ({}) as {nickname}, /help for commands", room.name, room.id);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => {
                    let Some(session) = membership.session() else { break };
                    if !handle_line(session, &line).await {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(err = %e, "stdin read failed");
                    break;
                }
            },
            event = events.recv() => match event {
                Some(event) => print_event(&event),
                None => break,
            },
        }
    }

    if let Err(e) = membership.leave().await {
        tracing::warn!(err = %e, "leave request failed");
    }
    tracing::info!("agileparty exiting");
    ExitCode::SUCCESS
}

/// Initialize logging to `file_path`, or to stderr when none is given.
///
/// Returns a [`WorkerGuard`] that must be held until shutdown to ensure all
/// buffered log entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let (non_blocking, guard) = match file_path {
        Some(path) => {
            let log_dir = path.parent()?;
            let file_name = path.file_name()?.to_str()?;
            tracing_appender::non_blocking(tracing_appender::rolling::never(log_dir, file_name))
        }
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

/// Returns `false` when the user asked to quit.
async fn handle_line(session: &NetHandle, line: &str) -> bool {
    let result = match cli::parse(line) {
        Ok(Input::Quit) => return false,
        Ok(Input::Help) => {
            println!("{HELP}");
            return true;
        }
        Ok(Input::Reconnect) => session.connect().await,
        Ok(Input::Send(command)) => session.send(command).await,
        Err(e) => {
            println!("{e}");
            return true;
        }
    };
    if let Err(e) = result {
        println!("! {e}");
        return false;
    }
    true
}

fn print_event(event: &NetEvent) {
    match event {
        NetEvent::ConnectionChanged { to, .. } => println!("* {to}"),
        NetEvent::ReconnectScheduled {
            attempt,
            max_attempts,
            delay,
        } => println!("* reconnecting in {delay:.1?} ({attempt}/{max_attempts})"),
        NetEvent::ReconnectFailed => {
            println!("* gave up reconnecting, /reconnect to try again");
        }
        NetEvent::RoomUpdated(state) => print_room(state),
        NetEvent::TasksUpdated { tasks, active } => {
            let (estimated, total) = progress(tasks);
            println!("tasks: {estimated}/{total} estimated");
            for task in tasks {
                let marker = if active.as_ref() == Some(&task.id) { '>' } else { ' ' };
                let estimate = task.estimation.as_deref().unwrap_or("-");
                println!(" {marker} [{}] {} ({estimate})", task.id, task.headline);
            }
        }
        NetEvent::ServerError { message, code } => match code {
            Some(code) => println!("! server: {message} ({code})"),
            None => println!("! server: {message}"),
        },
        NetEvent::SnapshotFailed(message) => println!("! could not refresh room: {message}"),
        NetEvent::CommandDropped(kind) => println!("! not connected, {kind} not sent"),
    }
}

fn print_room(state: &RoomState) {
    println!(
        "room \"{}\": {}/{} voted",
        state.room_name,
        voted_count(state),
        state.users.len()
    );
    for user in &state.users {
        let mark = if user.is_voted { 'x' } else { ' ' };
        println!("  [{mark}] {}", user.name);
    }
    if state.is_revealed {
        let counts: Vec<String> = vote_counts(state)
            .iter()
            .map(|c| format!("{}x{}", c.value, c.count))
            .collect();
        println!("  revealed: {} | average {}", counts.join(" "), average_display(state));
    }
}
