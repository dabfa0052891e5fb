//! Stream client connecting to the publish event endpoint.

use futures_util::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use skypress_protocol::ServerEvent;

/// Lifecycle state of the stream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Handshake in progress.
    Connecting,
    /// Connected; events are being delivered.
    Open,
    /// Connection is down; no further events will be delivered.
    Closed,
}

/// Errors from opening the event stream.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("WebSocket error: {0}")]
    Ws(#[from] tungstenite::Error),

    #[error("connection cancelled before it opened")]
    Cancelled,
}

/// Connects to the publish event stream.
pub struct StreamClient;

impl StreamClient {
    /// Opens the stream at `url`, scoped to `cancel`.
    ///
    /// Cancelling the token at any point, including mid-handshake, tears
    /// the connection down and ends the event channel. The returned
    /// subscription delivers decoded events in arrival order.
    pub async fn connect(
        url: &str,
        cancel: CancellationToken,
    ) -> Result<StreamSubscription, StreamError> {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);

        let ws_stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(StreamError::Cancelled),
            result = tokio_tungstenite::connect_async(url) => {
                let (ws_stream, _) = result?;
                ws_stream
            }
        };
        let (write, read) = ws_stream.split();

        let _ = state_tx.send(ConnectionState::Open);
        debug!(%url, "event stream open");

        let (events_tx, events_rx) = mpsc::channel(256);
        let (write_tx, write_rx) = mpsc::channel(16);

        let read_handle = {
            let state_tx = state_tx.clone();
            let write_tx = write_tx.clone();
            let cancel = cancel.clone();
            tokio::spawn(crate::pump::read_pump(
                read, events_tx, state_tx, write_tx, cancel,
            ))
        };

        let write_handle = {
            let cancel = cancel.clone();
            tokio::spawn(crate::pump::write_pump(write, write_rx, cancel))
        };

        Ok(StreamSubscription {
            events: events_rx,
            state: state_rx,
            cancel,
            _read_handle: read_handle,
            _write_handle: write_handle,
        })
    }
}

/// A live subscription to one attempt's event stream.
///
/// Dropping the subscription tears the connection down.
pub struct StreamSubscription {
    events: mpsc::Receiver<ServerEvent>,
    state: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
    _read_handle: tokio::task::JoinHandle<()>,
    _write_handle: tokio::task::JoinHandle<()>,
}

impl StreamSubscription {
    /// Waits for the next decoded event. Returns `None` once the
    /// connection is closed and all buffered events have been drained.
    pub async fn next_event(&mut self) -> Option<ServerEvent> {
        self.events.recv().await
    }

    /// The current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// A watch receiver for connection state changes.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Closes the connection. Safe to call any number of times; the
    /// underlying socket is torn down exactly once.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

impl Drop for StreamSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
        self._read_handle.abort();
        self._write_handle.abort();
    }
}
