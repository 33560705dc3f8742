//! Connection supervisor actor.
//!
//! A single task owns the connection handle, the pending-event buffer and
//! the reconnect bookkeeping. Control traffic reaches it as [`Command`]s on
//! one bounded channel. Events take a separate path: a drop-oldest inbox the
//! actor drains before every command, so a burst never rejects the newest
//! events. Shutdown is a `watch` flag, which cannot be lost to a full queue.
//!
//! A connection is only opened when none exists and sign-out takes the
//! handle, so at most one connection is ever live.
//!
//! ## State Diagram
//!
//! ```text
//!              SetDesired(true) / Closed / Failed
//!                   (request_connect, backoff)
//! ┌──────────────┐ ───────────────────────────► ┌──────────────┐
//! │ Disconnected │                              │  Connecting  │
//! └──────────────┘ ◄─────────────────────────── └──────┬───────┘
//!        ▲             Failed / SetDesired(false)      │ Opened
//!        │                                             ▼
//!        │          Closed / Failed / SetDesired(false)┌──────────────┐
//!        └──────────────────────────────────────────── │  Connected   │
//!                                                      └──────────────┘
//! ```

use crate::backoff::Backoff;
use crate::buffer::EventBuffer;
use crate::config::HorizonConfig;
use crate::encoder::WireEncoder;
use crate::error::{HorizonError, HorizonResult};
use crate::record::EventRecord;
use crate::transport::{
    CloseReason, Connection, ConnectionId, ConnectionListener, TokenSource, Transport,
    NORMAL_CLOSURE,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};
use url::Url;

/// Connection state as seen by the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Point-in-time view of the supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorStatus {
    /// Current connection state.
    pub state: ConnectionState,
    /// Whether a connection should exist right now.
    pub desired: bool,
    /// Consecutive failed connection attempts.
    pub attempts: u32,
    /// Whether a reconnect timer is armed.
    pub reconnect_pending: bool,
    /// Number of buffered events.
    pub buffered: usize,
}

/// Messages processed by the supervisor actor.
#[derive(Debug)]
pub(crate) enum Command {
    /// Desired connectivity changed (sign-in state).
    SetDesired(bool),
    /// The reconnect delay has passed.
    BackoffElapsed,
    /// A connection finished opening.
    Opened(ConnectionId),
    /// A connection received a text message.
    Message(ConnectionId, String),
    /// A connection closed.
    Closed(ConnectionId, CloseReason),
    /// A connection failed to open or broke.
    Failed(ConnectionId, String),
    /// Report a status snapshot.
    Status(oneshot::Sender<SupervisorStatus>),
}

/// Cloneable handle for sending commands to a running supervisor.
#[derive(Debug, Clone)]
pub struct SupervisorHandle {
    commands: mpsc::Sender<Command>,
    inbox: Arc<Mutex<EventBuffer>>,
    inbox_ready: Arc<Notify>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl SupervisorHandle {
    /// Hand an event to the supervisor without waiting.
    ///
    /// Events wait in a drop-oldest inbox until the actor picks them up, so
    /// the newest `buffer_capacity` events always survive a burst.
    pub fn submit(&self, record: EventRecord) {
        let evicted = self.inbox.lock().enqueue(record);
        if let Some(evicted) = evicted {
            trace!(event = %evicted.name(), "Inbox full, dropped oldest event");
        }
        self.inbox_ready.notify_one();
    }

    /// Fetch a status snapshot.
    pub async fn status(&self) -> HorizonResult<SupervisorStatus> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Status(tx))
            .await
            .map_err(|_| HorizonError::SupervisorStopped)?;
        rx.await.map_err(|_| HorizonError::SupervisorStopped)
    }

    /// Ask the supervisor to close its connection and exit.
    ///
    /// Never blocks and is not affected by a full command queue.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Only the lifecycle trigger changes desired connectivity.
    pub(crate) async fn set_desired(&self, desired: bool) -> HorizonResult<()> {
        self.commands
            .send(Command::SetDesired(desired))
            .await
            .map_err(|_| HorizonError::SupervisorStopped)
    }
}

struct ActiveConnection<C> {
    id: ConnectionId,
    handle: C,
    open: bool,
}

/// The supervisor actor. Construct with [`Supervisor::new`], then
/// [`Supervisor::spawn`] it onto the runtime.
pub struct Supervisor<T: Transport> {
    transport: T,
    tokens: Arc<dyn TokenSource>,
    config: HorizonConfig,
    encoder: WireEncoder,
    backoff: Backoff,
    buffer: EventBuffer,
    desired: bool,
    attempts: u32,
    reconnect_pending: bool,
    next_connection_id: u64,
    connection: Option<ActiveConnection<T::Connection>>,
    commands_tx: mpsc::Sender<Command>,
    commands_rx: mpsc::Receiver<Command>,
    inbox: Arc<Mutex<EventBuffer>>,
    inbox_ready: Arc<Notify>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl<T: Transport> Supervisor<T> {
    pub fn new(config: HorizonConfig, transport: T, tokens: Arc<dyn TokenSource>) -> Self {
        let (commands_tx, commands_rx) = mpsc::channel(config.command_queue_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            transport,
            tokens,
            encoder: WireEncoder::new(config.anonymous_id.clone(), config.user_type.clone()),
            backoff: config.backoff(),
            buffer: EventBuffer::new(config.buffer_capacity),
            desired: false,
            attempts: 0,
            reconnect_pending: false,
            next_connection_id: 0,
            connection: None,
            commands_tx,
            commands_rx,
            inbox: Arc::new(Mutex::new(EventBuffer::new(config.buffer_capacity))),
            inbox_ready: Arc::new(Notify::new()),
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
            config,
        }
    }

    /// Handle for talking to this supervisor once spawned.
    pub fn handle(&self) -> SupervisorHandle {
        SupervisorHandle {
            commands: self.commands_tx.clone(),
            inbox: self.inbox.clone(),
            inbox_ready: self.inbox_ready.clone(),
            shutdown: self.shutdown_tx.clone(),
        }
    }

    /// Run the actor loop on the current runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        info!(url = %self.config.collector_url, "Event supervisor started");

        loop {
            tokio::select! {
                biased;

                _ = stop_requested(&mut self.shutdown_rx) => break,
                command = self.commands_rx.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                _ = self.inbox_ready.notified() => self.drain_inbox(),
            }
        }

        self.desired = false;
        self.drain_inbox();
        self.close_current("client shutdown");
        info!(dropped = self.buffer.len(), "Event supervisor stopped");
    }

    fn handle_command(&mut self, command: Command) {
        // Events submitted before this command are handled first
        self.drain_inbox();

        match command {
            Command::SetDesired(desired) => self.set_desired(desired),
            Command::BackoffElapsed => self.on_backoff_elapsed(),
            Command::Opened(id) => self.on_opened(id),
            Command::Message(id, text) => {
                debug!(connection = %id, len = text.len(), "Collector message ignored");
            }
            Command::Closed(id, reason) => self.on_lost(id, &reason.to_string()),
            Command::Failed(id, error) => self.on_lost(id, &error),
            Command::Status(reply) => {
                let _ = reply.send(self.status());
            }
        }
    }

    fn drain_inbox(&mut self) {
        let records = self.inbox.lock().drain_all();
        for record in records {
            self.submit(record);
        }
    }

    fn status(&self) -> SupervisorStatus {
        SupervisorStatus {
            state: self.state(),
            desired: self.desired,
            attempts: self.attempts,
            reconnect_pending: self.reconnect_pending,
            buffered: self.buffer.len(),
        }
    }

    fn state(&self) -> ConnectionState {
        match &self.connection {
            None => ConnectionState::Disconnected,
            Some(conn) if conn.open => ConnectionState::Connected,
            Some(_) => ConnectionState::Connecting,
        }
    }

    fn set_desired(&mut self, desired: bool) {
        if self.desired == desired {
            return;
        }
        self.desired = desired;
        info!(desired, "Desired connectivity changed");

        if desired {
            if self.connection.is_none() {
                self.request_connect();
            }
        } else {
            self.close_current("signed out");
        }
    }

    /// Arm a reconnect attempt unless one is already pending.
    fn request_connect(&mut self) {
        if !self.desired || self.connection.is_some() || self.reconnect_pending {
            return;
        }
        self.reconnect_pending = true;

        let delay = self.backoff.delay_for_attempt(self.attempts);
        info!(
            attempt = self.attempts,
            delay_secs = delay.as_secs_f64(),
            "Scheduling connect"
        );

        let commands = self.commands_tx.clone();
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let _ = commands.send(Command::BackoffElapsed).await;
        });
    }

    fn on_backoff_elapsed(&mut self) {
        // Released unconditionally so a failed attempt can re-arm.
        self.reconnect_pending = false;

        if !self.desired || self.connection.is_some() {
            debug!("Connect no longer wanted, skipping");
            return;
        }

        match self.connection_url() {
            Ok(url) => self.open(url),
            Err(e) => {
                warn!(error = %e, attempt = self.attempts, "Cannot open collector connection");
                self.attempts = self.attempts.saturating_add(1);
                self.request_connect();
            }
        }
    }

    fn connection_url(&self) -> HorizonResult<Url> {
        let token = self.tokens.token().ok_or(HorizonError::MissingToken)?;
        self.config.connection_url(&token)
    }

    fn open(&mut self, url: Url) {
        self.next_connection_id += 1;
        let id = ConnectionId(self.next_connection_id);

        info!(connection = %id, host = url.host_str().unwrap_or(""), "Connecting to collector");
        let listener = ConnectionListener::new(id, self.commands_tx.clone());
        let handle = self.transport.open(url, listener);

        debug_assert!(self.connection.is_none(), "opened over a live connection");
        self.connection = Some(ActiveConnection {
            id,
            handle,
            open: false,
        });
    }

    fn on_opened(&mut self, id: ConnectionId) {
        let Some(conn) = self.connection.as_mut().filter(|c| c.id == id) else {
            debug!(connection = %id, "Ignoring open from stale connection");
            return;
        };
        conn.open = true;
        self.attempts = 0;
        info!(connection = %id, "Connected to collector");
        // Sign-out takes the handle, so an open for it is already stale
        debug_assert!(self.desired, "connection opened while signed out");

        let drained = self.buffer.drain_all();
        if drained.is_empty() {
            return;
        }

        let count = drained.len();
        match self.encoder.encode(&drained) {
            Ok(payload) => {
                if let Some(conn) = &self.connection {
                    match conn.handle.send(payload) {
                        Ok(()) => info!(connection = %id, count, "Flushed buffered events"),
                        Err(e) => warn!(connection = %id, count, error = %e, "Buffered batch send failed, dropping"),
                    }
                }
            }
            Err(e) => warn!(count, error = %e, "Failed to encode buffered batch, dropping"),
        }
    }

    fn on_lost(&mut self, id: ConnectionId, reason: &str) {
        if self.connection.as_ref().map(|c| c.id) != Some(id) {
            debug!(connection = %id, reason, "Ignoring close from stale connection");
            return;
        }
        self.connection = None;
        self.attempts = self.attempts.saturating_add(1);
        info!(connection = %id, reason, attempts = self.attempts, "Collector connection lost");

        if self.desired {
            self.request_connect();
        }
    }

    fn submit(&mut self, record: EventRecord) {
        let Some(conn) = self.connection.as_ref().filter(|c| c.open) else {
            if let Some(evicted) = self.buffer.enqueue(record) {
                trace!(event = %evicted.name(), "Buffer full, dropped oldest event");
            }
            return;
        };

        let name = record.name().to_string();
        match self.encoder.encode(std::slice::from_ref(&record)) {
            Ok(payload) => {
                if let Err(e) = conn.handle.send(payload) {
                    warn!(connection = %conn.id, event = %name, error = %e, "Event send failed, dropping");
                }
            }
            Err(e) => warn!(event = %name, error = %e, "Failed to encode event, dropping"),
        }
    }

    fn close_current(&mut self, reason: &str) {
        if let Some(conn) = self.connection.take() {
            info!(connection = %conn.id, reason, "Closing collector connection");
            conn.handle.close(NORMAL_CLOSURE, reason);
        }
    }
}

async fn stop_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}
