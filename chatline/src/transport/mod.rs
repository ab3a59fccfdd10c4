//! Transport layer abstraction for `Chatline`.
//!
//! A [`Connection`] carries one encoded message per line in each direction.
//! A [`Connector`] opens connections to the chat server on a given port.
//! Concrete implementations:
//! - [`tcp::TcpConnector`]: TCP to a fixed host
//! - [`loopback::LoopbackConnector`]: in-process channels for testing

pub mod loopback;
pub mod tcp;

use std::fmt;
use std::future::Future;

/// Describes which kind of transport is in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportType {
    /// TCP socket to the chat server.
    Tcp,
    /// In-process loopback for testing.
    Loopback,
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => write!(f, "TCP"),
            Self::Loopback => write!(f, "Loopback"),
        }
    }
}

/// Errors that can occur during transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection has been closed, locally or by the server.
    #[error("connection closed")]
    ConnectionClosed,

    /// Opening the connection timed out.
    #[error("transport operation timed out")]
    Timeout,

    /// Nothing is listening at the target address.
    #[error("{0} is unreachable")]
    Unreachable(String),

    /// An underlying I/O error occurred.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A live, line-oriented connection to the chat server.
///
/// Sends and receives may run concurrently from different tasks; each
/// direction is serialized internally.
pub trait Connection: Send + Sync + 'static {
    /// Write one encoded message. The line terminator is added by the transport.
    fn send_line(&self, line: &str) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Wait for the next encoded message, without its line terminator.
    ///
    /// Never times out. Returns [`TransportError::ConnectionClosed`] once the
    /// peer hangs up or [`close`](Self::close) is called, including for a
    /// receive that is already waiting.
    fn recv_line(&self) -> impl Future<Output = Result<String, TransportError>> + Send;

    /// Close the connection. Idempotent.
    fn close(&self);

    /// Return the type of this transport.
    fn transport_type(&self) -> TransportType;
}

/// Opens connections to the chat server.
pub trait Connector: Send + Sync {
    /// The connection type produced.
    type Connection: Connection;

    /// Open a connection to the server's `port`.
    fn connect(
        &self,
        port: u16,
    ) -> impl Future<Output = Result<Self::Connection, TransportError>> + Send;
}

/// Resolves once `closed` reads `true` or its sender is gone.
pub(crate) async fn wait_closed(mut closed: tokio::sync::watch::Receiver<bool>) {
    loop {
        let is_closed = *closed.borrow_and_update();
        if is_closed || closed.changed().await.is_err() {
            return;
        }
    }
}
