//! Line-based session view
//!
//! Renders session snapshots as they arrive and forwards user intents to
//! the reconciler or the connection manager. Deliberately declarative: all
//! state lives in the store, the view only reads it.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};

use showlink_client::{
    Action, ConnectionManager, MediaSession, PlaybackReconciler, SessionState, SessionStore,
};

type ConsoleReconciler = Arc<Mutex<PlaybackReconciler<MediaSession, ConnectionManager>>>;

/// A parsed console command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Play,
    Pause,
    Stop,
    Seek(f64),
    Chat(String),
    Reconnect,
    Status,
    Quit,
}

/// Parse one input line into a command
pub fn parse_command(line: &str) -> Result<Command, String> {
    let mut parts = line.split_whitespace();
    match parts.next() {
        Some("play") => Ok(Command::Play),
        Some("pause") => Ok(Command::Pause),
        Some("stop") => Ok(Command::Stop),
        Some("seek") => match parts.next().map(str::parse::<f64>) {
            Some(Ok(seconds)) if seconds >= 0.0 && seconds.is_finite() => {
                Ok(Command::Seek(seconds))
            }
            _ => Err("usage: seek <seconds>".to_string()),
        },
        Some("chat") => {
            let text = line.trim_start().trim_start_matches("chat").trim();
            if text.is_empty() {
                Err("usage: chat <message>".to_string())
            } else {
                Ok(Command::Chat(text.to_string()))
            }
        }
        Some("reconnect") => Ok(Command::Reconnect),
        Some("status") => Ok(Command::Status),
        Some("quit") | Some("exit") => Ok(Command::Quit),
        Some(other) => Err(format!("unknown command: {}", other)),
        None => Err("type `status` for the current session".to_string()),
    }
}

/// Read commands and render snapshots until the user quits
pub async fn run(store: &SessionStore, reconciler: &ConsoleReconciler) -> anyhow::Result<()> {
    let mut updates = store.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("commands: play | pause | stop | seek <seconds> | chat <message> | reconnect | status | quit");
    render(&store.snapshot(), store.is_connected());

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                render(&snapshot, store.is_connected());
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match parse_command(line) {
                    Ok(Command::Quit) => break,
                    Ok(command) => execute(command, store, reconciler),
                    Err(usage) => println!("{}", usage),
                }
            }
        }
    }

    Ok(())
}

fn execute(command: Command, store: &SessionStore, reconciler: &ConsoleReconciler) {
    match command {
        Command::Play => reconciler.lock().user_play(),
        Command::Pause => reconciler.lock().user_pause(),
        Command::Stop => reconciler.lock().user_stop(),
        Command::Seek(seconds) => reconciler.lock().user_seek(seconds),
        Command::Chat(text) => store.manager().send(Action::ChatMessage { text }),
        Command::Reconnect => store.reconnect(),
        Command::Status => render(&store.snapshot(), store.is_connected()),
        // Quit is handled by the caller before dispatch.
        Command::Quit => {}
    }
}

fn render(state: &SessionState, connected: bool) {
    let timestamp = chrono::Local::now().format("%H:%M:%S");
    let connectivity = if connected { "online" } else { "offline" };
    let song = state.current_song.as_deref().unwrap_or("no song");
    let playback = if state.is_playing { "playing" } else { "paused" };

    println!(
        "[{}] {} | {} | {} at {:.1}s",
        timestamp, connectivity, song, playback, state.position_seconds
    );
    if let Some(error) = &state.last_error {
        println!("[{}] error: {} (type `reconnect` to retry)", timestamp, error);
    }
}
