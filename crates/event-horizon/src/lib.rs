//! Event Horizon: best-effort analytics delivery over a persistent WebSocket.
//!
//! Events go straight to the collector while a connection is open and into a
//! bounded drop-oldest buffer while it is not. The buffer is flushed as one
//! batch whenever a connection opens.
//!
//! # Core Invariants
//!
//! 1. **Never Blocks**: `on_event` only pushes into a drop-oldest inbox and wakes the supervisor
//! 2. **Bounded Memory**: inbox, buffer, command queue and outbound queues all have fixed capacity
//! 3. **One Connection**: at most one connection handle is current; superseded ones are closed
//! 4. **Follows Sign-In**: a connection exists or is being retried exactly while signed in
//! 5. **Capped Backoff**: retries wait `min(attempt * 15s, 60s)`, reset on success
//!
//! # Architecture
//!
//! ```text
//! tracker -> HorizonClient::on_event -> Supervisor --(connected)--> Connection::send
//!                                          |   ^
//!                        (disconnected)    v   | SetDesired
//!                                    EventBuffer   LifecycleTrigger <- sign-in stream
//! ```

pub mod backoff;
pub mod buffer;
pub mod client;
pub mod config;
pub mod encoder;
pub mod error;
pub mod lifecycle;
pub mod record;
pub mod supervisor;
pub mod transport;
pub mod ws;

#[cfg(test)]
mod tests;

pub use backoff::Backoff;
pub use buffer::EventBuffer;
pub use client::HorizonClient;
pub use config::HorizonConfig;
pub use encoder::WireEncoder;
pub use error::{HorizonError, HorizonResult};
pub use lifecycle::{spawn_lifecycle_trigger, MembershipState};
pub use record::{EventRecord, Properties, PropertyValue};
pub use supervisor::{ConnectionState, Supervisor, SupervisorHandle, SupervisorStatus};
pub use transport::{
    CloseReason, Connection, ConnectionId, ConnectionListener, StaticToken, TokenSource,
    Transport,
};
pub use ws::{WsConnection, WsTransport};
