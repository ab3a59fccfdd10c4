//! Command handling for the console client.
//!
//! Each input line is either a slash command or chat text. Connecting runs
//! the whole session (handshake and receive loop) on a background task so
//! the input loop keeps reading; sends and disconnects are awaited inline.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinSet;

use crate::session::Session;
use crate::sink::PresentationSink;
use crate::transport::Connector;

/// Help text shown by `/help`.
pub const HELP: &[&str] = &[
    "Commands:",
    "  /connect [port]  connect to the chat server (asks for the port if omitted)",
    "  /disconnect      leave the chat",
    "  /users           show who is online",
    "  /help            show this help",
    "  /quit            disconnect and exit",
    "Anything else is sent as a chat message.",
];

/// A parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/connect [port]`.
    Connect(Option<u16>),
    /// `/disconnect`.
    Disconnect,
    /// `/users`.
    Users,
    /// `/help`.
    Help,
    /// `/quit`.
    Quit,
    /// Plain chat text.
    Send(String),
    /// A slash command that could not be understood; carries the reason.
    Invalid(String),
}

/// Parse one line of user input. Blank lines yield `None`.
#[must_use]
pub fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return None;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Some(Command::Send(line.to_string()));
    };

    let mut parts = rest.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let arg = parts.next();
    let command = match (name, arg) {
        ("connect", None) => Command::Connect(None),
        ("connect", Some(port)) => match port.parse::<u16>() {
            Ok(port) if port != 0 => Command::Connect(Some(port)),
            _ => Command::Invalid(format!("'{port}' is not a valid port")),
        },
        ("disconnect", None) => Command::Disconnect,
        ("users", None) => Command::Users,
        ("help", None) => Command::Help,
        ("quit" | "exit", None) => Command::Quit,
        ("disconnect" | "users" | "help" | "quit" | "exit", Some(_)) => {
            Command::Invalid(format!("/{name} takes no arguments"))
        }
        _ => Command::Invalid(format!("unknown command: /{name} (try /help)")),
    };
    Some(command)
}

/// What the input loop should do after a line was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep reading input.
    Continue,
    /// Stop reading and shut down.
    Quit,
}

/// Console application: routes commands to a [`Session`].
pub struct App<K: Connector + 'static, P: PresentationSink + 'static> {
    session: Arc<Session<K, P>>,
    tasks: Mutex<JoinSet<()>>,
}

impl<K: Connector + 'static, P: PresentationSink + 'static> App<K, P> {
    /// Creates an app driving `session`.
    pub fn new(session: Arc<Session<K, P>>) -> Self {
        Self {
            session,
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    /// The session this app drives.
    pub const fn session(&self) -> &Arc<Session<K, P>> {
        &self.session
    }

    /// Start a session on a background task.
    ///
    /// With no port the user is prompted for one. Errors are already shown
    /// by the session, so the task only logs how it ended.
    pub fn connect(&self, port: Option<u16>) {
        let session = Arc::clone(&self.session);
        let mut tasks = self.tasks.lock();
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move {
            let result = match port {
                Some(port) => session.run(port).await,
                None => session.run_prompted().await,
            };
            match result {
                Ok(()) => tracing::info!("session ended"),
                Err(e) => tracing::info!(error = %e, "session ended with error"),
            }
        });
    }

    /// Handle one line of user input.
    pub async fn handle_line(&self, line: &str) -> Flow {
        let Some(command) = parse_command(line) else {
            return Flow::Continue;
        };
        tracing::debug!(?command, "handling command");

        match command {
            Command::Connect(port) => self.connect(port),
            Command::Disconnect => {
                // A name or port prompt for this session is moot now.
                self.session.sink().cancel_prompt();
                // Failures are reported to the sink by the session.
                let _ = self.session.disable_client().await;
            }
            Command::Users => self.session.sink().show_roster(&self.session.roster()),
            Command::Help => {
                for line in HELP {
                    self.session.sink().display_line(line);
                }
            }
            Command::Quit => {
                self.session.sink().cancel_prompt();
                return Flow::Quit;
            }
            Command::Send(text) => {
                let _ = self.session.send(&text).await;
            }
            Command::Invalid(reason) => self.session.sink().report_error(&reason),
        }
        Flow::Continue
    }

    /// Leave the chat if connected and stop background session tasks.
    pub async fn shutdown(&self) {
        if self.session.is_connected() {
            let _ = self.session.disable_client().await;
        }
        self.tasks.lock().abort_all();
    }
}
