use anyhow::{Context, Result};
use aria_core::session::{generate_identity, DEFAULT_ROOM_NAME};
use aria_core::tap::{TapReader, DEFAULT_MAX_FRAME_BYTES};
use aria_core::{ConsoleEvent, ConsoleState, SessionConfig};
use clap::Parser;
use std::{
    fs::{File, OpenOptions},
    io,
    path::Path,
    sync::Mutex,
    time::Duration,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod sink;

use sink::{process, FrameSink};

const READ_CHUNK_BYTES: usize = 8 * 1024;

#[derive(Clone, Debug)]
struct Config {
    session_id: String,
    room_name: String,
    identity: String,
    debug: bool,
    log_dir: String,
    emit_snapshots: bool,
    require_connection: bool,
    max_frame_bytes: usize,
}

#[derive(Parser, Debug)]
#[command(name = "aria-console")]
struct Args {
    #[arg(long, default_value = "")]
    session: String,
    #[arg(long, default_value = "")]
    room: String,
    #[arg(long, default_value = "")]
    identity: String,
    #[arg(long, default_value_t = false)]
    debug: bool,
    #[arg(long, default_value = "")]
    log_dir: String,
    /// Emit a state snapshot frame after every applied event.
    #[arg(long, default_value_t = false)]
    snapshots: bool,
    /// Send commands even before a `connected` frame arrives.
    #[arg(long, default_value_t = false)]
    offline: bool,
    #[arg(long, default_value_t = DEFAULT_MAX_FRAME_BYTES)]
    max_frame_bytes: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config(Args::parse());
    init_logging(&config);
    run(config).await
}

async fn run(config: Config) -> Result<()> {
    let mut state = ConsoleState::new(SessionConfig {
        room_name: config.room_name.clone(),
        identity: config.identity.clone(),
    });
    let mut sink = FrameSink::new(
        &config.session_id,
        config.max_frame_bytes,
        config.require_connection,
    );
    let mut reader = TapReader::new(config.max_frame_bytes);

    let mut stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    let mut buf = vec![0u8; READ_CHUNK_BYTES];

    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let token_request = serde_json::to_string(&state.session().token_request())
        .context("failed to encode token request")?;
    info!(
        event = "console_start",
        session_id = %config.session_id,
        room = %config.room_name,
        identity = %config.identity,
        token_request = %token_request
    );

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!(event = "console_shutdown", reason = "ctrl_c");
                break;
            }
            _ = ticker.tick() => {
                state.apply(ConsoleEvent::Tick);
            }
            read = stdin.read(&mut buf) => {
                let count = read.context("failed to read session tap from stdin")?;
                let report = if count == 0 {
                    reader.finish()
                } else {
                    reader.feed(&buf[..count])
                };
                process(&mut state, &mut sink, report, config.emit_snapshots);
                for frame in sink.drain() {
                    stdout
                        .write_all(&frame)
                        .await
                        .context("failed to write outbound frame")?;
                }
                stdout.flush().await.context("failed to flush stdout")?;
                if count == 0 {
                    info!(event = "console_shutdown", reason = "eof");
                    break;
                }
            }
        }
    }

    info!(
        event = "console_stop",
        call_seconds = state.call_seconds(),
        utterances = state.conversation().len()
    );
    Ok(())
}

fn load_config(args: Args) -> Config {
    let room_name = first_non_empty(&args.room, "ARIA_ROOM")
        .unwrap_or_else(|| DEFAULT_ROOM_NAME.to_string());
    let session_id =
        first_non_empty(&args.session, "ARIA_SESSION_ID").unwrap_or_else(|| room_name.clone());
    let identity = first_non_empty(&args.identity, "ARIA_IDENTITY").unwrap_or_else(generate_identity);
    let log_dir =
        first_non_empty(&args.log_dir, "ARIA_LOG_DIR").unwrap_or_else(|| ".aria/logs".to_string());
    Config {
        session_id,
        room_name,
        identity,
        debug: args.debug || env_true("ARIA_DEBUG"),
        log_dir,
        emit_snapshots: args.snapshots,
        require_connection: !args.offline,
        max_frame_bytes: args.max_frame_bytes,
    }
}

/// Flag value when set, otherwise the environment variable when non-empty.
fn first_non_empty(flag: &str, env_key: &str) -> Option<String> {
    if !flag.trim().is_empty() {
        return Some(flag.trim().to_string());
    }
    std::env::var(env_key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn env_true(key: &str) -> bool {
    match std::env::var(key) {
        Ok(value) => matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        Err(_) => false,
    }
}

/// Stdout carries tap frames, so log lines go to stderr and, when a log
/// directory is configured, to a per-session file.
fn init_logging(config: &Config) {
    let default_level = if config.debug {
        "debug".to_string()
    } else {
        std::env::var("ARIA_LOG_LEVEL").unwrap_or_else(|_| "info".to_string())
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let file_layer = match open_log_file(&config.log_dir, &config.session_id) {
        Ok(file) => file.map(|file| {
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file))
        }),
        Err(err) => {
            eprintln!("log_file_error: {err}");
            None
        }
    };

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .try_init();
    if installed.is_err() {
        warn!(event = "log_init_skipped");
    }
}

fn open_log_file(log_dir: &str, session_id: &str) -> io::Result<Option<File>> {
    if log_dir.trim().is_empty() {
        return Ok(None);
    }
    let dir = Path::new(log_dir);
    std::fs::create_dir_all(dir)?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(format!("aria-console-{session_id}.log")))
        .map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["aria-console"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn flags_take_precedence() {
        let config = load_config(args(&[
            "--session",
            "sess-1",
            "--room",
            "room-a",
            "--identity",
            "user-abc123",
            "--log-dir",
            "/tmp/aria-logs",
            "--snapshots",
            "--offline",
        ]));
        assert_eq!(config.session_id, "sess-1");
        assert_eq!(config.room_name, "room-a");
        assert_eq!(config.identity, "user-abc123");
        assert_eq!(config.log_dir, "/tmp/aria-logs");
        assert!(config.emit_snapshots);
        assert!(!config.require_connection);
        assert_eq!(config.max_frame_bytes, DEFAULT_MAX_FRAME_BYTES);
    }

    #[test]
    fn blank_flag_is_not_a_value() {
        assert_eq!(
            first_non_empty("  ", "ARIA_TEST_UNSET_VARIABLE_FOR_CONSOLE"),
            None
        );
        assert_eq!(
            first_non_empty(" room-b ", "ARIA_TEST_UNSET_VARIABLE_FOR_CONSOLE"),
            Some("room-b".to_string())
        );
    }

    #[test]
    fn log_file_is_created_per_session() {
        let dir = tempfile::tempdir().expect("temp dir");
        let nested = dir.path().join("logs");
        let file = open_log_file(nested.to_str().expect("utf-8 path"), "sess-1")
            .expect("open log file");
        assert!(file.is_some());
        assert!(nested.join("aria-console-sess-1.log").exists());

        assert!(open_log_file("", "sess-1").expect("no log dir").is_none());
    }
}
