//! `chatline`: terminal chat client.
//!
//! Reads commands and chat text from stdin and prints the conversation to
//! stdout. Configuration via CLI flags, environment variables, or config
//! file (`~/.config/chatline/config.toml`).
//!
//! ```bash
//! # Start disconnected, then type `/connect 4000`
//! cargo run --bin chatline
//!
//! # Connect at startup
//! cargo run --bin chatline -- --host 127.0.0.1 --port 4000
//! ```

use std::io;
use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_appender::non_blocking::WorkerGuard;

use chatline::app::{App, Flow};
use chatline::config::{CliArgs, ClientConfig};
use chatline::console::ConsoleSink;
use chatline::session::Session;
use chatline::sink::PresentationSink;

#[tokio::main]
async fn main() -> io::Result<()> {
    let cli = CliArgs::parse();

    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Warning: failed to load config file: {e}");
            ClientConfig::default()
        }
    };

    // Logs go to a file; stdout belongs to the conversation.
    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());

    tracing::info!(host = %config.host, port = ?config.port, "chatline starting");

    let sink = ConsoleSink::new(io::stdout(), Some(config.timestamp_format.as_str()));
    let session = Arc::new(Session::new(
        config.connector(),
        sink,
        config.session_settings(),
    ));
    let app = App::new(Arc::clone(&session));

    session.sink().display_line("Type /help for commands");
    if let Some(port) = config.port {
        app.connect(Some(port));
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        // A pending port or name prompt takes plain lines first.
        let Some(line) = session.sink().offer_input(line) else {
            continue;
        };
        if app.handle_line(&line).await == Flow::Quit {
            break;
        }
    }

    app.shutdown().await;
    tracing::info!("chatline exiting");
    Ok(())
}

/// Initialize file-based logging.
///
/// Returns a [`WorkerGuard`] that must be held until shutdown to ensure all
/// buffered log entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("chatline.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}
