//! TCP transport to the chat server.
//!
//! Messages are newline-delimited. The read half sits behind a buffered
//! reader and the write half behind its own lock, so the receive loop and
//! user-triggered sends never wait on each other.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex, watch};

use super::{Connection, Connector, TransportError, TransportType, wait_closed};

/// Host used when none is configured.
pub const DEFAULT_HOST: &str = "localhost";

/// Opens TCP connections to a fixed host.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    host: String,
    connect_timeout: Option<Duration>,
}

impl TcpConnector {
    /// Creates a connector for `host` with no connect timeout.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            connect_timeout: None,
        }
    }

    /// Bounds how long opening a connection may take.
    ///
    /// Only connection establishment is bounded; receives never time out.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// The host this connector dials.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new(DEFAULT_HOST)
    }
}

impl Connector for TcpConnector {
    type Connection = TcpConnection;

    async fn connect(&self, port: u16) -> Result<TcpConnection, TransportError> {
        let target = format!("{}:{port}", self.host);
        let dial = TcpStream::connect((self.host.as_str(), port));
        let stream = match self.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, dial).await.map_err(|_| {
                tracing::warn!(addr = %target, "connect timed out");
                TransportError::Timeout
            })?,
            None => dial.await,
        }
        .map_err(|e| {
            tracing::warn!(addr = %target, err = %e, "connect failed");
            map_connect_error(e, &target)
        })?;

        TcpConnection::from_stream(stream)
    }
}

/// A connected TCP socket carrying one message per line.
pub struct TcpConnection {
    peer_addr: SocketAddr,
    reader: Mutex<BufReader<OwnedReadHalf>>,
    writer: Mutex<OwnedWriteHalf>,
    closed: watch::Sender<bool>,
}

impl TcpConnection {
    /// Wraps an already-connected stream.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Io`] if the peer address cannot be read.
    pub fn from_stream(stream: TcpStream) -> Result<Self, TransportError> {
        let peer_addr = stream.peer_addr()?;
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(err = %e, "could not disable Nagle");
        }
        let (read_half, write_half) = stream.into_split();
        tracing::info!(peer = %peer_addr, "tcp connection established");
        Ok(Self {
            peer_addr,
            reader: Mutex::new(BufReader::new(read_half)),
            writer: Mutex::new(write_half),
            closed: watch::Sender::new(false),
        })
    }

    /// Address of the server end.
    #[must_use]
    pub const fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }
}

impl Connection for TcpConnection {
    async fn send_line(&self, line: &str) -> Result<(), TransportError> {
        let closed = self.closed.subscribe();
        if *closed.borrow() {
            return Err(TransportError::ConnectionClosed);
        }
        let mut frame = String::with_capacity(line.len() + 1);
        frame.push_str(line);
        frame.push('\n');

        // A peer that stops reading must not pin the writer past close().
        tokio::select! {
            biased;
            () = wait_closed(closed) => Err(TransportError::ConnectionClosed),
            written = async {
                let mut writer = self.writer.lock().await;
                writer.write_all(frame.as_bytes()).await?;
                writer.flush().await
            } => written.map_err(TransportError::Io),
        }
    }

    async fn recv_line(&self) -> Result<String, TransportError> {
        let closed = self.closed.subscribe();
        let mut reader = self.reader.lock().await;
        let mut line = String::new();
        let read = tokio::select! {
            biased;
            () = wait_closed(closed) => None,
            read = reader.read_line(&mut line) => Some(read),
        };
        match read {
            None | Some(Ok(0)) => Err(TransportError::ConnectionClosed),
            Some(Ok(_)) => Ok(line.trim_end_matches(['\r', '\n']).to_string()),
            Some(Err(e)) => Err(TransportError::Io(e)),
        }
    }

    fn close(&self) {
        if !self.closed.send_replace(true) {
            tracing::debug!(peer = %self.peer_addr, "tcp connection closed locally");
        }
    }

    fn transport_type(&self) -> TransportType {
        TransportType::Tcp
    }
}

/// Map a socket connect error to a [`TransportError`].
fn map_connect_error(err: std::io::Error, target: &str) -> TransportError {
    match err.kind() {
        std::io::ErrorKind::ConnectionRefused | std::io::ErrorKind::AddrNotAvailable => {
            TransportError::Unreachable(target.to_string())
        }
        _ => TransportError::Io(err),
    }
}
