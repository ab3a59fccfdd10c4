//! Line-oriented terminal front end.
//!
//! [`ConsoleSink`] writes chat lines, roster updates and errors to any
//! [`Write`] target, optionally prefixed with a local timestamp. Prompts do
//! not read the terminal themselves: the input loop hands every line to
//! [`ConsoleSink::offer_input`] first, and a pending prompt takes it unless
//! it is a slash command.

use std::io::Write;

use chrono::format::{Item, StrftimeItems};
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::sink::PresentationSink;

/// Console implementation of [`PresentationSink`].
pub struct ConsoleSink<W> {
    out: Mutex<W>,
    pending: Mutex<Option<oneshot::Sender<String>>>,
    timestamp_format: Option<String>,
}

impl<W: Write + Send> ConsoleSink<W> {
    /// Creates a sink writing to `out`.
    ///
    /// `timestamp_format` is a chrono format string for the line prefix. An
    /// empty or invalid format disables timestamps.
    pub fn new(out: W, timestamp_format: Option<&str>) -> Self {
        let timestamp_format = timestamp_format
            .filter(|f| !f.is_empty())
            .and_then(|f| {
                if StrftimeItems::new(f).any(|item| matches!(item, Item::Error)) {
                    tracing::warn!(format = f, "invalid timestamp format, timestamps disabled");
                    None
                } else {
                    Some(f.to_string())
                }
            });
        Self {
            out: Mutex::new(out),
            pending: Mutex::new(None),
            timestamp_format,
        }
    }

    /// Route a line of user input.
    ///
    /// If a prompt is waiting, it receives the line and `None` is returned.
    /// Otherwise the line is handed back for command handling. Lines starting
    /// with `/` are always handed back and leave a pending prompt waiting.
    pub fn offer_input(&self, line: String) -> Option<String> {
        if line.trim_start().starts_with('/') {
            return Some(line);
        }
        let Some(waiting) = self.pending.lock().take() else {
            return Some(line);
        };
        // An abandoned prompt leaves the line for the caller.
        waiting.send(line).err()
    }

    /// Whether a prompt is waiting for input.
    pub fn is_prompting(&self) -> bool {
        self.pending.lock().as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Ask a question and wait for the next input line.
    async fn prompt(&self, question: &str) -> Option<String> {
        let (tx, rx) = oneshot::channel();
        if self.pending.lock().replace(tx).is_some() {
            tracing::debug!("replacing an unanswered prompt");
        }
        self.write_raw(question);
        rx.await.ok()
    }

    fn write_raw(&self, text: &str) {
        let mut out = self.out.lock();
        if let Err(e) = writeln!(out, "{text}").and_then(|()| out.flush()) {
            tracing::warn!(err = %e, "console write failed");
        }
    }

    fn write_stamped(&self, text: &str) {
        match &self.timestamp_format {
            Some(format) => {
                let stamp = chrono::Local::now().format(format);
                self.write_raw(&format!("[{stamp}] {text}"));
            }
            None => self.write_raw(text),
        }
    }
}

impl<W: Write + Send> PresentationSink for ConsoleSink<W> {
    async fn prompt_for_port(&self) -> Option<u16> {
        let answer = self.prompt("Enter the server port:").await?;
        let trimmed = answer.trim();
        match trimmed.parse::<u16>() {
            Ok(port) if port != 0 => Some(port),
            _ => {
                self.report_error(&format!("'{trimmed}' is not a valid port"));
                None
            }
        }
    }

    async fn prompt_for_name(&self) -> Option<String> {
        let answer = self.prompt("Enter your name:").await?;
        Some(answer.trim().to_string())
    }

    fn display_line(&self, text: &str) {
        self.write_stamped(text);
    }

    fn show_roster(&self, names: &[String]) {
        if names.is_empty() {
            self.write_stamped("No users online");
        } else {
            self.write_stamped(&format!("Users online ({}): {}", names.len(), names.join(", ")));
        }
    }

    fn report_error(&self, message: &str) {
        self.write_stamped(&format!("Error: {message}"));
    }

    fn cancel_prompt(&self) {
        if self.pending.lock().take().is_some() {
            tracing::debug!("pending prompt cancelled");
        }
    }
}
