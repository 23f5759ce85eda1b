//! Agora - debate room console
//!
//! Attaches to one debate session and drives it from stdin.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use agora_core::{LocalIdentity, Side};
use agora_net::{HttpSnapshotLoader, Room, RoomEvent, WsDialer};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;
mod console;

use config::AppConfig;
use console::Input;

const USAGE: &str = "usage: agora [--config PATH] create\n       agora [--config PATH] join <room-id> [for|against|none]";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Create,
    Join { room_id: String, side: Option<Side> },
}

fn parse_args(args: &[String]) -> Option<(Option<PathBuf>, Command)> {
    let mut config = None;
    let mut rest = args;
    if let [flag, path, tail @ ..] = rest {
        if flag == "--config" {
            config = Some(PathBuf::from(path));
            rest = tail;
        }
    }

    let command = match rest {
        [cmd] if cmd == "create" => Command::Create,
        [cmd, room_id] if cmd == "join" => Command::Join {
            room_id: room_id.clone(),
            side: None,
        },
        [cmd, room_id, side] if cmd == "join" => Command::Join {
            room_id: room_id.clone(),
            side: Some(match side.as_str() {
                "for" => Side::For,
                "against" => Side::Against,
                "none" => Side::Unassigned,
                _ => return None,
            }),
        },
        _ => return None,
    };
    Some((config, command))
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some((config_path, command)) = parse_args(&args) else {
        eprintln!("{}", USAGE);
        return ExitCode::from(2);
    };

    let config = match AppConfig::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    // Logs go to stderr; stdout belongs to the room
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    tracing::info!(http_base = %config.http_base, ws_url = %config.ws_url, "Starting Agora");

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Failed to create tokio runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(async {
        match command {
            Command::Create => create(&config).await,
            Command::Join { room_id, side } => join(&config, room_id, side).await,
        }
    })
}

async fn create(config: &AppConfig) -> ExitCode {
    match HttpSnapshotLoader::new(&config.http_base).create_session().await {
        Ok(update) => {
            println!("{}", update.room_id.unwrap_or_default());
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Could not create session");
            ExitCode::FAILURE
        }
    }
}

async fn join(config: &AppConfig, room_id: String, side: Option<Side>) -> ExitCode {
    let loader = HttpSnapshotLoader::new(&config.http_base)
        .with_argument_history(config.fetch_argument_history);
    let dialer = WsDialer::new(config.ws_url.clone());
    let identity = match &config.display_name {
        Some(name) => LocalIdentity::named(name.clone()),
        None => LocalIdentity::guest(),
    };

    let mut room = Room::new(room_id, identity, Arc::new(loader), Arc::new(dialer))
        .config(config.room_config())
        .on_failure(|e| tracing::debug!(error = %e, "Returning to lobby"));
    if let Some(side) = side {
        room = room.side(side);
    }
    let mut handle = room.enter();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut status = ExitCode::SUCCESS;

    loop {
        tokio::select! {
            event = handle.next_event() => {
                let Some(event) = event else { break };
                if let Some(line) = console::describe(&event, &*handle.state().await) {
                    println!("{}", line);
                }
                match event {
                    RoomEvent::Fatal(_) => {
                        status = ExitCode::FAILURE;
                        break;
                    }
                    RoomEvent::Left => break,
                    _ => {}
                }
            }

            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match console::parse_line(&line) {
                    Some(Input::Act(action)) => {
                        let _ = handle.act(action).await;
                    }
                    Some(Input::Status) => println!("{}", console::summary(&*handle.state().await)),
                    Some(Input::Leave) => handle.leave().await,
                    Some(Input::Help) => println!("{}", console::HELP),
                    Some(Input::Invalid(message)) => eprintln!("{}", message),
                    None => {}
                },
                Ok(None) | Err(_) => {
                    stdin_open = false;
                    handle.leave().await;
                }
            },
        }
    }

    status
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_args() {
        assert_eq!(
            parse_args(&args(&["create"])),
            Some((None, Command::Create))
        );
        assert_eq!(
            parse_args(&args(&["--config", "a.toml", "join", "ab12", "against"])),
            Some((
                Some(PathBuf::from("a.toml")),
                Command::Join {
                    room_id: "ab12".into(),
                    side: Some(Side::Against)
                }
            ))
        );
        assert_eq!(parse_args(&args(&["join", "ab12", "sideways"])), None);
        assert_eq!(parse_args(&args(&[])), None);
    }
}
