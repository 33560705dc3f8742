//! Ties desired connectivity to the external sign-in state.

use crate::supervisor::SupervisorHandle;
use futures_util::{Stream, StreamExt};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Anything that can say whether a user is signed in.
pub trait MembershipState {
    fn is_signed_in(&self) -> bool;
}

impl MembershipState for bool {
    fn is_signed_in(&self) -> bool {
        *self
    }
}

/// Watch `states` and forward each distinct sign-in value to the supervisor.
///
/// Consecutive duplicates are ignored. The task ends when the stream ends or
/// the supervisor stops.
pub fn spawn_lifecycle_trigger<S>(states: S, supervisor: SupervisorHandle) -> JoinHandle<()>
where
    S: Stream + Send + 'static,
    S::Item: MembershipState + Send,
{
    tokio::spawn(async move {
        let mut states = Box::pin(states);
        let mut last: Option<bool> = None;

        while let Some(state) = states.next().await {
            let signed_in = state.is_signed_in();
            if last == Some(signed_in) {
                continue;
            }
            last = Some(signed_in);

            info!(signed_in, "Sign-in state changed");
            if supervisor.set_desired(signed_in).await.is_err() {
                debug!("Supervisor stopped, ending lifecycle trigger");
                return;
            }
        }

        debug!("Sign-in stream ended");
    })
}
