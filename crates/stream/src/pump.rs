//! Stream pumps — decode incoming frames, serialise outbound control frames.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use skypress_protocol::{ServerEvent, decode_frame};

use crate::client::ConnectionState;

/// Reads frames from the connection and forwards decoded events.
///
/// Exits on server close, read error, stream end, cancellation, or a
/// dropped event receiver. On exit it marks the connection `Closed` and
/// cancels the shared token so the write pump shuts down with it.
pub(crate) async fn read_pump<S>(
    mut read: S,
    events_tx: mpsc::Sender<ServerEvent>,
    state_tx: watch::Sender<ConnectionState>,
    write_tx: mpsc::Sender<tungstenite::Message>,
    cancel: CancellationToken,
) where
    S: StreamExt<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            msg = read.next() => {
                match msg {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        match decode_frame(&text) {
                            Ok(event) => {
                                trace!(stage = %event.stage, status = ?event.status, "decoded stream event");
                                if events_tx.send(event).await.is_err() {
                                    debug!("event receiver dropped, closing stream");
                                    break;
                                }
                            }
                            Err(e) => {
                                warn!("dropping undecodable frame: {e}");
                            }
                        }
                    }
                    Some(Ok(tungstenite::Message::Ping(data))) => {
                        trace!("received ping, sending pong");
                        let _ = write_tx.send(tungstenite::Message::Pong(data)).await;
                    }
                    Some(Ok(tungstenite::Message::Close(_))) => {
                        debug!("received close frame");
                        break;
                    }
                    Some(Ok(_)) => {} // Pong, binary — ignore
                    Some(Err(e)) => {
                        warn!("stream read error: {e}");
                        break;
                    }
                    None => {
                        debug!("stream ended");
                        break;
                    }
                }
            }
        }
    }

    let _ = state_tx.send(ConnectionState::Closed);
    cancel.cancel();
}

/// Writes control frames (pong replies) to the connection, and a final
/// close frame on shutdown.
pub(crate) async fn write_pump<S>(
    mut write: S,
    mut write_rx: mpsc::Receiver<tungstenite::Message>,
    cancel: CancellationToken,
) where
    S: SinkExt<tungstenite::Message, Error = tungstenite::Error> + Unpin,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            msg = write_rx.recv() => {
                match msg {
                    Some(m) => {
                        if let Err(e) = write.send(m).await {
                            error!("stream write error: {e}");
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    let _ = write.send(tungstenite::Message::Close(None)).await;
}
