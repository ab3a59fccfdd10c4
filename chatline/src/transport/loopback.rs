//! Loopback transport for testing.
//!
//! Uses in-process [`tokio::sync::mpsc`] channels to simulate a server
//! connection. [`LoopbackConnection::create_pair`] returns two connected
//! endpoints (sending on one delivers to the other), and
//! [`LoopbackConnector`] hands prepared client endpoints to a session so a
//! test can play the server on the other end.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{Mutex, mpsc, watch};

use super::{Connection, Connector, TransportError, TransportType, wait_closed};

/// In-process connection backed by `tokio::sync::mpsc` channels.
pub struct LoopbackConnection {
    /// Sender for outgoing lines (delivers to the remote's receiver).
    tx: mpsc::Sender<String>,
    /// Receiver for incoming lines (fed by the remote's sender).
    rx: Mutex<mpsc::Receiver<String>>,
    /// Set once this endpoint is closed.
    closed: watch::Sender<bool>,
}

impl LoopbackConnection {
    /// Create a pair of connected loopback endpoints.
    ///
    /// Lines sent by one end are received by the other. The `buffer`
    /// parameter controls the channel capacity for each direction, so a test
    /// can queue a whole server script before the client starts reading.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use chatline::transport::Connection;
    /// use chatline::transport::loopback::LoopbackConnection;
    ///
    /// # async fn example() {
    /// let (client, server) = LoopbackConnection::create_pair(32);
    /// server.send_line("hello").await.unwrap();
    /// assert_eq!(client.recv_line().await.unwrap(), "hello");
    /// # }
    /// ```
    #[must_use]
    pub fn create_pair(buffer: usize) -> (Self, Self) {
        let (tx_a, rx_a) = mpsc::channel(buffer);
        let (tx_b, rx_b) = mpsc::channel(buffer);

        let a = Self {
            tx: tx_b, // A sends into B's receiver
            rx: Mutex::new(rx_a),
            closed: watch::Sender::new(false),
        };
        let b = Self {
            tx: tx_a, // B sends into A's receiver
            rx: Mutex::new(rx_b),
            closed: watch::Sender::new(false),
        };
        (a, b)
    }

    /// Take the next line if one is already waiting, without blocking.
    ///
    /// Returns `None` when nothing is queued, the remote end is gone, or a
    /// receive is in progress on another task.
    pub fn try_recv_line(&self) -> Option<String> {
        self.rx.try_lock().ok()?.try_recv().ok()
    }

}

impl Connection for LoopbackConnection {
    async fn send_line(&self, line: &str) -> Result<(), TransportError> {
        let closed = self.closed.subscribe();
        if *closed.borrow() {
            return Err(TransportError::ConnectionClosed);
        }
        // A full channel blocks like a peer that stopped reading.
        let sent = tokio::select! {
            biased;
            () = wait_closed(closed) => None,
            sent = self.tx.send(line.to_string()) => sent.ok(),
        };
        sent.ok_or(TransportError::ConnectionClosed)
    }

    async fn recv_line(&self) -> Result<String, TransportError> {
        let closed = self.closed.subscribe();
        let received = tokio::select! {
            biased;
            () = wait_closed(closed) => None,
            line = async { self.rx.lock().await.recv().await } => line,
        };
        received.ok_or(TransportError::ConnectionClosed)
    }

    fn close(&self) {
        self.closed.send_replace(true);
    }

    fn transport_type(&self) -> TransportType {
        TransportType::Loopback
    }
}

/// Connector that hands out prepared loopback endpoints in order.
///
/// Once the queue is empty every further attempt fails with
/// [`TransportError::Unreachable`], like a port nobody listens on.
#[derive(Default)]
pub struct LoopbackConnector {
    pending: parking_lot::Mutex<VecDeque<LoopbackConnection>>,
    attempts: AtomicUsize,
}

impl LoopbackConnector {
    /// Creates a connector with no prepared connections.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a connector holding one client endpoint and returns the
    /// matching server endpoint.
    #[must_use]
    pub fn with_server(buffer: usize) -> (Self, LoopbackConnection) {
        let connector = Self::new();
        let server = connector.prepare(buffer);
        (connector, server)
    }

    /// Queues another client endpoint and returns its server end.
    pub fn prepare(&self, buffer: usize) -> LoopbackConnection {
        let (client, server) = LoopbackConnection::create_pair(buffer);
        self.pending.lock().push_back(client);
        server
    }

    /// Number of `connect` calls made so far.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::Relaxed)
    }
}

impl Connector for LoopbackConnector {
    type Connection = LoopbackConnection;

    async fn connect(&self, port: u16) -> Result<LoopbackConnection, TransportError> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        let next = self.pending.lock().pop_front();
        next.ok_or_else(|| TransportError::Unreachable(format!("loopback:{port}")))
    }
}
