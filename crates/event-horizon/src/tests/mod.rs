//! Integration tests for the Event Horizon client.
//!
//! - `harness.rs`   - Fake transport, connection log and client fixture
//! - `buffering.rs` - Offline buffering, flush on connect, direct sends, drops
//! - `reconnect.rs` - Backoff schedule, reset on success, failed attempts
//! - `lifecycle.rs` - Sign-in driven connect/disconnect and stale callbacks

mod buffering;
