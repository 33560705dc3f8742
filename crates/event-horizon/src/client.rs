//! Public entry point used by the analytics tracker.

use crate::config::HorizonConfig;
use crate::error::HorizonResult;
use crate::lifecycle::{spawn_lifecycle_trigger, MembershipState};
use crate::record::{EventRecord, Properties};
use crate::supervisor::{Supervisor, SupervisorHandle, SupervisorStatus};
use crate::transport::{TokenSource, Transport};
use chrono::{DateTime, Utc};
use futures_util::Stream;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Fire-and-forget analytics client.
///
/// Owns the supervisor task and the lifecycle trigger watching sign-in
/// state. Dropping the client asks the supervisor to shut down.
pub struct HorizonClient {
    platform: String,
    supervisor: SupervisorHandle,
    supervisor_task: Option<JoinHandle<()>>,
    trigger_task: JoinHandle<()>,
}

impl HorizonClient {
    /// Start the supervisor and subscribe to `sign_in`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start<T, S>(
        config: HorizonConfig,
        transport: T,
        tokens: Arc<dyn TokenSource>,
        sign_in: S,
    ) -> Self
    where
        T: Transport,
        S: Stream + Send + 'static,
        S::Item: MembershipState + Send,
    {
        let platform = config.platform.clone();
        let supervisor = Supervisor::new(config, transport, tokens);
        let handle = supervisor.handle();
        let supervisor_task = supervisor.spawn();
        let trigger_task = spawn_lifecycle_trigger(sign_in, handle.clone());

        Self {
            platform,
            supervisor: handle,
            supervisor_task: Some(supervisor_task),
            trigger_task,
        }
    }

    /// Record an event that happened now. Never blocks and never fails.
    pub fn on_event(&self, name: impl Into<String>, properties: Properties) {
        self.on_event_at(name, Utc::now(), properties);
    }

    /// Record an event with an explicit timestamp.
    pub fn on_event_at(
        &self,
        name: impl Into<String>,
        timestamp: DateTime<Utc>,
        properties: Properties,
    ) {
        let record = EventRecord::new(name, timestamp, properties, self.platform.clone());
        self.supervisor.submit(record);
    }

    /// Snapshot of the supervisor state.
    pub async fn status(&self) -> HorizonResult<SupervisorStatus> {
        self.supervisor.status().await
    }

    /// Handle to the underlying supervisor.
    pub fn supervisor(&self) -> &SupervisorHandle {
        &self.supervisor
    }

    /// Close the connection and wait for the supervisor to exit.
    pub async fn shutdown(mut self) {
        self.trigger_task.abort();
        self.supervisor.shutdown();
        if let Some(task) = self.supervisor_task.take() {
            if let Err(e) = task.await {
                debug!(error = %e, "Supervisor task ended abnormally");
            }
        }
    }
}

impl Drop for HorizonClient {
    fn drop(&mut self) {
        self.trigger_task.abort();
        if self.supervisor_task.is_some() {
            self.supervisor.shutdown();
        }
    }
}
