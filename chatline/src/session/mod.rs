//! Client session: the connection and protocol state machine.
//!
//! A [`Session`] owns at most one live connection and the [`Roster`]. It
//! drives the registration handshake, the steady-state receive loop,
//! outbound sends and disconnect, and reports everything to a
//! [`PresentationSink`].
//!
//! # States
//!
//! ```text
//! Disconnected → Connecting → AwaitingNameRequest → NameSubmitted → Registered
//!      ↑                                                                 │
//!      └──────────── transport/protocol error, or disable_client ────────┘
//! ```
//!
//! # Concurrency
//!
//! The receive loop and user actions (`send`, `disable_client`, `connect`)
//! run on different tasks against the same `Session`. State, roster and the
//! connection handle live in one `parking_lot` mutex that is never held
//! across an `.await`; the state field is the only authority on whether
//! sends are allowed. Each `connect` bumps an epoch so a loop still draining
//! a closed connection can never tear down a newer one.

pub mod registration;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use chatline_proto::codec::{self, CodecError};
use chatline_proto::message::{Message, MessageKind};

use crate::format::{self, DEFAULT_DISPLAY_WIDTH};
use crate::roster::Roster;
use crate::sink::PresentationSink;
use crate::transport::{Connection, Connector, TransportError};

use registration::Registration;

/// Phase of the session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No connection.
    Disconnected,
    /// Opening the transport.
    Connecting,
    /// Connected; waiting for the server to ask for a name.
    AwaitingNameRequest,
    /// A candidate name has been sent; waiting for the verdict.
    NameSubmitted,
    /// Name accepted; chatting.
    Registered,
}

impl SessionState {
    /// Whether a connection exists or is being opened.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        !matches!(self, Self::Disconnected)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::AwaitingNameRequest => write!(f, "awaiting name request"),
            Self::NameSubmitted => write!(f, "name submitted"),
            Self::Registered => write!(f, "registered"),
        }
    }
}

/// Errors surfaced by session operations.
///
/// Every error is already reported to the [`PresentationSink`] by the time
/// the caller sees it, except [`SessionError::Interrupted`].
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The transport could not be opened.
    #[error("could not connect to port {port}: {source}")]
    ConnectionFailed {
        /// Port that was dialled.
        port: u16,
        /// Underlying transport failure.
        source: TransportError,
    },

    /// `connect` while a connection already exists.
    #[error("you are already connected")]
    AlreadyConnected,

    /// `disable_client` while no connection exists.
    #[error("you are already disconnected")]
    AlreadyDisconnected,

    /// The user gave no usable port.
    #[error("no valid port was given")]
    NoPort,

    /// Operation needs a connection and there is none.
    #[error("not connected to a server")]
    NotConnected,

    /// Operation needs a registered name and the handshake is still running.
    #[error("name registration has not finished yet")]
    NotRegistered,

    /// A received line could not be decoded.
    #[error("{0}")]
    Codec(#[from] CodecError),

    /// Reading from the transport failed.
    #[error("error receiving message: {0}")]
    Receive(TransportError),

    /// Writing during the handshake failed.
    #[error("connection lost during registration: {0}")]
    Transport(TransportError),

    /// Writing a chat message failed; the connection stays up.
    #[error("error sending message: {0}")]
    SendFailed(TransportError),

    /// The leave notice could not be written; the session is disconnected anyway.
    #[error("could not notify the server of disconnect: {0}")]
    DisconnectNotice(TransportError),

    /// The user cancelled name entry.
    #[error("name entry was cancelled")]
    NameEntryCancelled,

    /// The configured cap on name submissions was reached.
    #[error("no name was accepted after {attempts} attempts")]
    NameAttemptsExhausted {
        /// Names submitted before giving up.
        attempts: u32,
    },

    /// A local disconnect overtook a `connect` in progress.
    #[error("connection attempt interrupted by disconnect")]
    Interrupted,
}

impl SessionError {
    /// Whether this error ended the connection it occurred on.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Codec(_)
                | Self::Receive(_)
                | Self::Transport(_)
                | Self::NameEntryCancelled
                | Self::NameAttemptsExhausted { .. }
        )
    }
}

/// How long [`Session::disable_client`] waits to write the leave notice.
pub const DEFAULT_DISCONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Tunables for a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// Incoming text longer than this many characters is reflowed.
    pub display_width: usize,
    /// Cap on name submissions per handshake; `None` retries until accepted.
    pub max_name_attempts: Option<u32>,
    /// Upper bound on writing the leave notice before closing anyway.
    pub disconnect_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            display_width: DEFAULT_DISPLAY_WIDTH,
            max_name_attempts: None,
            disconnect_timeout: DEFAULT_DISCONNECT_TIMEOUT,
        }
    }
}

/// State guarded by the session mutex.
struct Shared<C> {
    state: SessionState,
    epoch: u64,
    connection: Option<Arc<C>>,
    roster: Roster,
}

impl<C> Shared<C> {
    /// Whether `epoch` names the live connection.
    const fn is_current(&self, epoch: u64) -> bool {
        self.epoch == epoch && self.state.is_connected()
    }
}

/// The client-side chat session.
pub struct Session<K: Connector, P: PresentationSink> {
    connector: K,
    sink: P,
    settings: SessionSettings,
    shared: Mutex<Shared<K::Connection>>,
}

impl<K: Connector, P: PresentationSink> Session<K, P> {
    /// Creates a disconnected session.
    pub fn new(connector: K, sink: P, settings: SessionSettings) -> Self {
        Self {
            connector,
            sink,
            settings,
            shared: Mutex::new(Shared {
                state: SessionState::Disconnected,
                epoch: 0,
                connection: None,
                roster: Roster::new(),
            }),
        }
    }

    /// Current phase.
    pub fn state(&self) -> SessionState {
        self.shared.lock().state
    }

    /// Whether a connection exists or is being opened.
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Sorted copy of the roster.
    pub fn roster(&self) -> Vec<String> {
        self.shared.lock().roster.snapshot()
    }

    /// The connector used to open connections.
    pub const fn connector(&self) -> &K {
        &self.connector
    }

    /// The presentation sink this session reports to.
    pub const fn sink(&self) -> &P {
        &self.sink
    }

    /// The settings this session was built with.
    pub const fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Connect, register, then process messages until the connection ends.
    ///
    /// Returns `Ok(())` when the connection ends through
    /// [`disable_client`](Self::disable_client).
    ///
    /// # Errors
    ///
    /// Any error from [`connect`](Self::connect) or
    /// [`receive_loop`](Self::receive_loop), except that a disconnect landing
    /// between the two ends the run with `Ok(())`.
    pub async fn run(&self, port: u16) -> Result<(), SessionError> {
        let (epoch, connection) = self.open(port).await?;
        self.receive_on(epoch, connection.as_ref()).await
    }

    /// Like [`run`](Self::run), asking the sink for the port first.
    ///
    /// # Errors
    ///
    /// [`SessionError::AlreadyConnected`] before prompting if a connection
    /// exists, [`SessionError::NoPort`] if the prompt yields nothing, plus
    /// anything [`run`](Self::run) returns.
    pub async fn run_prompted(&self) -> Result<(), SessionError> {
        if self.is_connected() {
            return Err(self.report(SessionError::AlreadyConnected));
        }
        let Some(port) = self.sink.prompt_for_port().await else {
            return Err(self.report(SessionError::NoPort));
        };
        self.run(port).await
    }

    /// Open a connection to `port` and complete the registration handshake.
    ///
    /// Returns once the server accepted a name and the session is
    /// [`SessionState::Registered`].
    ///
    /// # Errors
    ///
    /// - [`SessionError::AlreadyConnected`] if not disconnected (no-op).
    /// - [`SessionError::ConnectionFailed`] if the transport cannot be opened;
    ///   the session stays disconnected.
    /// - Any fatal handshake error; the connection is closed and the session
    ///   is disconnected.
    /// - [`SessionError::Interrupted`] if `disable_client` ran meanwhile.
    pub async fn connect(&self, port: u16) -> Result<(), SessionError> {
        self.open(port).await.map(|_| ())
    }

    /// [`connect`](Self::connect), keeping the epoch and handle it installed.
    async fn open(&self, port: u16) -> Result<(u64, Arc<K::Connection>), SessionError> {
        let epoch = {
            let mut shared = self.shared.lock();
            if shared.state.is_connected() {
                None
            } else {
                shared.state = SessionState::Connecting;
                shared.epoch += 1;
                Some(shared.epoch)
            }
        };
        let Some(epoch) = epoch else {
            return Err(self.report(SessionError::AlreadyConnected));
        };

        tracing::info!(port, "connecting to chat server");
        let connection = match self.connector.connect(port).await {
            Ok(connection) => Arc::new(connection),
            Err(source) => {
                let ours = {
                    let mut shared = self.shared.lock();
                    let ours = shared.is_current(epoch);
                    if ours {
                        shared.state = SessionState::Disconnected;
                    }
                    ours
                };
                if !ours {
                    return Err(SessionError::Interrupted);
                }
                return Err(self.report(SessionError::ConnectionFailed { port, source }));
            }
        };

        let installed = {
            let mut shared = self.shared.lock();
            let ours = shared.is_current(epoch);
            if ours {
                shared.state = SessionState::AwaitingNameRequest;
                shared.connection = Some(Arc::clone(&connection));
            }
            ours
        };
        if !installed {
            connection.close();
            return Err(SessionError::Interrupted);
        }

        tracing::info!(
            port,
            transport = %connection.transport_type(),
            "connected, awaiting name request"
        );
        self.sink.display_line("You connected to the server");
        self.register(epoch, connection.as_ref()).await?;
        Ok((epoch, connection))
    }

    /// Process steady-state messages until the connection ends.
    ///
    /// Text is reflowed past the display width and forwarded; join and leave
    /// notices update the roster. Other kinds are ignored.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotConnected`]/[`SessionError::NotRegistered`] if
    /// called outside [`SessionState::Registered`]. A transport or decode
    /// failure ends the loop with that error after moving the session to
    /// [`SessionState::Disconnected`] with an empty roster. A local
    /// disconnect ends it with `Ok(())`.
    pub async fn receive_loop(&self) -> Result<(), SessionError> {
        let (epoch, connection) = self.registered_connection().map_err(|e| self.report(e))?;
        self.receive_on(epoch, connection.as_ref()).await
    }

    /// Receive on the connection installed under `epoch` until it ends.
    ///
    /// A stale `epoch` is not an error: the first failed receive or
    /// dispatched message finds the session moved on and returns `Ok(())`.
    async fn receive_on(&self, epoch: u64, connection: &K::Connection) -> Result<(), SessionError> {
        tracing::info!("entering receive loop");

        loop {
            match receive(connection).await {
                Ok(message) => {
                    if !self.dispatch(epoch, message) {
                        return Ok(());
                    }
                }
                Err(err) => return self.teardown(epoch, err).map_or(Ok(()), Err),
            }
        }
    }

    /// Send a chat line.
    ///
    /// # Errors
    ///
    /// - [`SessionError::NotConnected`] / [`SessionError::NotRegistered`]
    ///   without touching the transport.
    /// - [`SessionError::SendFailed`] on a transport error. The session stays
    ///   connected.
    pub async fn send(&self, text: &str) -> Result<(), SessionError> {
        let (_, connection) = self.registered_connection().map_err(|e| self.report(e))?;
        let line = codec::encode(&Message::text(text)).map_err(|e| self.report(e.into()))?;
        connection
            .send_line(&line)
            .await
            .map_err(|source| self.report(SessionError::SendFailed(source)))?;
        tracing::debug!(chars = text.chars().count(), "message sent");
        Ok(())
    }

    /// Leave the chat: notify the server, clear the roster, disconnect.
    ///
    /// The local state always ends up [`SessionState::Disconnected`], even if
    /// the notice cannot be written.
    ///
    /// # Errors
    ///
    /// - [`SessionError::AlreadyDisconnected`] if there is no connection
    ///   (no-op, no transport write).
    /// - [`SessionError::DisconnectNotice`] if writing the notice failed or
    ///   did not finish within [`SessionSettings::disconnect_timeout`].
    pub async fn disable_client(&self) -> Result<(), SessionError> {
        let connection = {
            let mut shared = self.shared.lock();
            if shared.state.is_connected() {
                shared.state = SessionState::Disconnected;
                shared.roster.clear();
                Ok(shared.connection.take())
            } else {
                Err(SessionError::AlreadyDisconnected)
            }
        }
        .map_err(|e| self.report(e))?;

        let notified = match connection {
            Some(connection) => {
                let result = match codec::encode(&Message::disable_user()) {
                    Ok(line) => {
                        let limit = self.settings.disconnect_timeout;
                        match tokio::time::timeout(limit, connection.send_line(&line)).await {
                            Ok(sent) => sent.map_err(SessionError::DisconnectNotice),
                            Err(_) => {
                                tracing::warn!(?limit, "leave notice timed out");
                                Err(SessionError::DisconnectNotice(TransportError::Timeout))
                            }
                        }
                    }
                    Err(e) => Err(e.into()),
                };
                // Also releases sends still stuck on this connection.
                connection.close();
                result
            }
            None => Ok(()),
        };

        tracing::info!("disconnected by user");
        self.sink.show_roster(&[]);
        match notified {
            Ok(()) => {
                self.sink.display_line("You disconnected from the server");
                Ok(())
            }
            Err(err) => Err(self.report(err)),
        }
    }

    /// Run the handshake on a freshly opened connection.
    async fn register(&self, epoch: u64, connection: &K::Connection) -> Result<(), SessionError> {
        let mut registration = Registration::new(self.settings.max_name_attempts);
        loop {
            let message = match receive(connection).await {
                Ok(message) => message,
                Err(err) => return Err(self.abort_registration(epoch, err)),
            };

            match message.kind {
                MessageKind::RequestNameUser => {
                    if let Err(err) = self.submit_name(epoch, connection, &mut registration).await {
                        return Err(self.abort_registration(epoch, err));
                    }
                }
                MessageKind::NameUsed => {
                    tracing::info!(attempts = registration.attempts(), "name rejected by server");
                    self.sink
                        .report_error("This name is already in use. Try another");
                    if let Err(err) = self.submit_name(epoch, connection, &mut registration).await {
                        return Err(self.abort_registration(epoch, err));
                    }
                }
                MessageKind::NameAccepted => {
                    let snapshot = {
                        let mut shared = self.shared.lock();
                        if shared.is_current(epoch) {
                            shared
                                .roster
                                .replace(message.user_list.unwrap_or_default());
                            shared.state = SessionState::Registered;
                            Some(shared.roster.snapshot())
                        } else {
                            None
                        }
                    };
                    let Some(snapshot) = snapshot else {
                        return Err(SessionError::Interrupted);
                    };
                    tracing::info!(
                        attempts = registration.attempts(),
                        users = snapshot.len(),
                        "name accepted"
                    );
                    self.sink.display_line("Name accepted");
                    self.sink.show_roster(&snapshot);
                    return Ok(());
                }
                other => tracing::debug!(kind = %other, "ignoring message during registration"),
            }
        }
    }

    /// Ask the user for a name and send it.
    async fn submit_name(
        &self,
        epoch: u64,
        connection: &K::Connection,
        registration: &mut Registration,
    ) -> Result<(), SessionError> {
        let attempt = registration.begin_attempt()?;
        let name = self
            .sink
            .prompt_for_name()
            .await
            .ok_or(SessionError::NameEntryCancelled)?;
        let line = codec::encode(&Message::user_name(name))?;
        connection
            .send_line(&line)
            .await
            .map_err(SessionError::Transport)?;

        {
            let mut shared = self.shared.lock();
            if shared.is_current(epoch) {
                shared.state = SessionState::NameSubmitted;
            }
        }
        tracing::debug!(attempt, "name submitted");
        Ok(())
    }

    /// Apply one steady-state message. Returns `false` once `epoch` is stale.
    fn dispatch(&self, epoch: u64, message: Message) -> bool {
        match message.kind {
            MessageKind::TextMessage => {
                if !self.shared.lock().is_current(epoch) {
                    return false;
                }
                match message.text {
                    Some(text) => {
                        let shown = format::fit_to_width(&text, self.settings.display_width);
                        self.sink.display_line(&shown);
                    }
                    None => tracing::debug!("text message without text"),
                }
            }
            MessageKind::UserAdded | MessageKind::RemovedUser => {
                let joined = message.kind == MessageKind::UserAdded;
                let Some(name) = message.text else {
                    tracing::warn!(kind = %message.kind, "presence notice without a name");
                    return true;
                };
                let snapshot = {
                    let mut shared = self.shared.lock();
                    if shared.is_current(epoch) {
                        if joined {
                            shared.roster.add(name.clone());
                        } else {
                            shared.roster.remove(&name);
                        }
                        Some(shared.roster.snapshot())
                    } else {
                        None
                    }
                };
                let Some(snapshot) = snapshot else {
                    return false;
                };
                tracing::info!(user = %name, joined, "roster changed");
                self.sink.show_roster(&snapshot);
                if joined {
                    self.sink.display_line(&format!("{name} joined the chat"));
                } else {
                    self.sink.display_line(&format!("{name} left the chat"));
                }
            }
            other => tracing::debug!(kind = %other, "ignoring message in steady state"),
        }
        true
    }

    /// The live connection, if registration has completed.
    fn registered_connection(&self) -> Result<(u64, Arc<K::Connection>), SessionError> {
        let shared = self.shared.lock();
        match (shared.state, &shared.connection) {
            (SessionState::Registered, Some(connection)) => {
                Ok((shared.epoch, Arc::clone(connection)))
            }
            (SessionState::Disconnected, _) => Err(SessionError::NotConnected),
            _ => Err(SessionError::NotRegistered),
        }
    }

    /// Tear down after a handshake failure. Stale failures become `Interrupted`.
    fn abort_registration(&self, epoch: u64, err: SessionError) -> SessionError {
        self.teardown(epoch, err)
            .unwrap_or(SessionError::Interrupted)
    }

    /// Drop the connection identified by `epoch` after a fatal error.
    ///
    /// Returns the reported error, or `None` if the session had already moved
    /// on (local disconnect), in which case nothing is reported.
    fn teardown(&self, epoch: u64, err: SessionError) -> Option<SessionError> {
        let (ours, connection) = {
            let mut shared = self.shared.lock();
            if shared.is_current(epoch) {
                shared.state = SessionState::Disconnected;
                shared.roster.clear();
                (true, shared.connection.take())
            } else {
                (false, None)
            }
        };
        if !ours {
            tracing::debug!(error = %err, "connection ended after local disconnect");
            return None;
        }
        if let Some(connection) = connection {
            connection.close();
        }
        self.sink.show_roster(&[]);
        Some(self.report(err))
    }

    /// Log `err` and show it to the user.
    fn report(&self, err: SessionError) -> SessionError {
        tracing::warn!(error = %err, fatal = err.is_fatal(), "session error");
        self.sink.report_error(&err.to_string());
        err
    }
}

/// Receive and decode one message.
async fn receive<C: Connection>(connection: &C) -> Result<Message, SessionError> {
    let line = connection.recv_line().await.map_err(SessionError::Receive)?;
    Ok(codec::decode(&line)?)
}
