//! Transport seam between the supervisor and a message socket.
//!
//! A [`Transport`] opens connections; the returned [`Connection`] handle can
//! send and close; lifecycle callbacks flow back through the
//! [`ConnectionListener`] handed to `open`.
//!
//! # Contract
//!
//! - `open` returns immediately. The outcome arrives later as exactly one of
//!   `opened` (possibly followed by `closed`/`failed`) or `failed`.
//! - `close` may be called before the connection opens; the transport must
//!   then close it as soon as it opens instead of leaving it running.
//! - `send` never blocks. An error means the frame was not accepted.

use crate::error::HorizonResult;
use crate::supervisor::Command;
use std::fmt;
use tokio::sync::mpsc;
use tracing::debug;
use url::Url;

/// WebSocket normal closure code.
pub const NORMAL_CLOSURE: u16 = 1000;

/// WebSocket close code for a connection that ended without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Identifies one opened connection for the lifetime of a supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Why a connection closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    pub code: u16,
    pub reason: String,
}

impl CloseReason {
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// The peer went away without a close handshake.
    pub fn abnormal() -> Self {
        Self::new(ABNORMAL_CLOSURE, "connection dropped")
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code, self.reason)
    }
}

/// Opens message-socket connections.
pub trait Transport: Send + 'static {
    type Connection: Connection;

    /// Start connecting to `url`. Must not block.
    fn open(&self, url: Url, listener: ConnectionListener) -> Self::Connection;
}

/// A live (or pending) connection handle.
pub trait Connection: Send + 'static {
    /// Queue one message for delivery.
    fn send(&self, payload: Vec<u8>) -> HorizonResult<()>;

    /// Close the connection with the given code.
    fn close(&self, code: u16, reason: &str);
}

/// Delivers connection lifecycle callbacks to the supervisor.
#[derive(Debug, Clone)]
pub struct ConnectionListener {
    id: ConnectionId,
    commands: mpsc::Sender<Command>,
}

impl ConnectionListener {
    pub(crate) fn new(id: ConnectionId, commands: mpsc::Sender<Command>) -> Self {
        Self { id, commands }
    }

    /// Id of the connection this listener reports for.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// The connection is open and ready to send.
    pub async fn opened(&self) {
        self.deliver(Command::Opened(self.id)).await;
    }

    /// The collector sent a text message.
    pub async fn message(&self, text: String) {
        self.deliver(Command::Message(self.id, text)).await;
    }

    /// The connection closed.
    pub async fn closed(&self, reason: CloseReason) {
        self.deliver(Command::Closed(self.id, reason)).await;
    }

    /// The connection failed to open or broke.
    pub async fn failed(&self, error: impl fmt::Display) {
        self.deliver(Command::Failed(self.id, error.to_string()))
            .await;
    }

    async fn deliver(&self, command: Command) {
        if self.commands.send(command).await.is_err() {
            debug!(connection = %self.id, "Supervisor gone, dropping connection callback");
        }
    }
}

/// Supplies the auth token embedded in the connection URL.
pub trait TokenSource: Send + Sync + 'static {
    /// Current token, or `None` when no signed-in session exists.
    fn token(&self) -> Option<String>;
}

/// A token that never changes.
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

impl TokenSource for StaticToken {
    fn token(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

impl<F> TokenSource for F
where
    F: Fn() -> Option<String> + Send + Sync + 'static,
{
    fn token(&self) -> Option<String> {
        self()
    }
}
