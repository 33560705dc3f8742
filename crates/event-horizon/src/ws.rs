//! WebSocket transport built on tokio-tungstenite.

use crate::config::HorizonConfig;
use crate::error::{HorizonError, HorizonResult};
use crate::transport::{CloseReason, Connection, ConnectionListener, Transport, NORMAL_CLOSURE};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Duration;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};
use url::Url;

/// How long to wait for the peer's close frame after sending ours.
const CLOSE_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens one WebSocket per call, each driven by its own task.
#[derive(Debug, Clone)]
pub struct WsTransport {
    outbound_capacity: usize,
}

impl WsTransport {
    pub fn new(outbound_capacity: usize) -> Self {
        Self {
            outbound_capacity: outbound_capacity.max(1),
        }
    }

    pub fn from_config(config: &HorizonConfig) -> Self {
        Self::new(config.outbound_queue_capacity)
    }
}

impl Default for WsTransport {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_OUTBOUND_QUEUE_CAPACITY)
    }
}

impl Transport for WsTransport {
    type Connection = WsConnection;

    fn open(&self, url: Url, listener: ConnectionListener) -> WsConnection {
        let (frames_tx, frames_rx) = mpsc::channel(self.outbound_capacity);
        let (close_tx, close_rx) = oneshot::channel();

        tokio::spawn(run_socket(url, listener, frames_rx, close_rx));

        WsConnection {
            frames: frames_tx,
            close: Mutex::new(Some(close_tx)),
        }
    }
}

/// Handle to a WebSocket driven by a background task.
///
/// Dropping the handle closes the socket.
#[derive(Debug)]
pub struct WsConnection {
    frames: mpsc::Sender<Vec<u8>>,
    close: Mutex<Option<oneshot::Sender<CloseReason>>>,
}

impl Connection for WsConnection {
    fn send(&self, payload: Vec<u8>) -> HorizonResult<()> {
        self.frames.try_send(payload).map_err(|e| match e {
            TrySendError::Full(_) => HorizonError::Send("outbound queue full".to_string()),
            TrySendError::Closed(_) => HorizonError::NotConnected,
        })
    }

    fn close(&self, code: u16, reason: &str) {
        if let Some(close) = self.close.lock().take() {
            let _ = close.send(CloseReason::new(code, reason));
        }
    }
}

async fn run_socket(
    url: Url,
    listener: ConnectionListener,
    mut frames: mpsc::Receiver<Vec<u8>>,
    mut close: oneshot::Receiver<CloseReason>,
) {
    let id = listener.id();

    let stream = tokio::select! {
        result = connect_async(url.as_str()) => match result {
            Ok((stream, _response)) => stream,
            Err(e) => {
                listener.failed(HorizonError::from(e)).await;
                return;
            }
        },
        requested = &mut close => {
            let reason = requested.unwrap_or_else(|_| dropped_handle());
            debug!(connection = %id, reason = %reason, "Closed before open");
            listener.closed(reason).await;
            return;
        }
    };

    listener.opened().await;
    let (mut write, mut read) = stream.split();

    let reason = loop {
        tokio::select! {
            // Queued frames go out before a requested close
            biased;

            frame = frames.recv() => match frame {
                Some(payload) => {
                    if let Err(e) = write.send(into_message(payload)).await {
                        warn!(connection = %id, error = %e, "WebSocket write failed");
                        listener.failed(HorizonError::from(e)).await;
                        return;
                    }
                }
                None => break dropped_handle(),
            },
            requested = &mut close => {
                break requested.unwrap_or_else(|_| dropped_handle());
            }
            inbound = read.next() => match inbound {
                Some(Ok(Message::Text(text))) => listener.message(text.as_str().to_owned()).await,
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|f| CloseReason::new(u16::from(f.code), f.reason.as_str()))
                        .unwrap_or_else(CloseReason::abnormal);
                    listener.closed(reason).await;
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    listener.failed(HorizonError::from(e)).await;
                    return;
                }
                None => {
                    listener.closed(CloseReason::abnormal()).await;
                    return;
                }
            }
        }
    };

    let frame = CloseFrame {
        code: CloseCode::from(reason.code),
        reason: reason.reason.clone().into(),
    };
    if let Err(e) = write.send(Message::Close(Some(frame))).await {
        debug!(connection = %id, error = %e, "Close frame not delivered");
    }

    // Give the peer a chance to acknowledge before dropping the socket
    let _ = tokio::time::timeout(CLOSE_HANDSHAKE_TIMEOUT, async {
        while let Some(Ok(message)) = read.next().await {
            if message.is_close() {
                break;
            }
        }
    })
    .await;

    listener.closed(reason).await;
}

fn dropped_handle() -> CloseReason {
    CloseReason::new(NORMAL_CLOSURE, "handle dropped")
}

fn into_message(payload: Vec<u8>) -> Message {
    match String::from_utf8(payload) {
        Ok(text) => Message::Text(text.into()),
        Err(e) => Message::Binary(e.into_bytes().into()),
    }
}
