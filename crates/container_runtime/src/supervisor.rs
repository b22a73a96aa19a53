//! Connection supervision.
//!
//! A [`ConnectionSupervisor`] owns the reconnect state machine for one
//! activation:
//!
//! ```text
//! Connecting ──ok──▶ Connected ──cancel──▶ Stopped
//!     ▲   │
//!     │   └─err──▶ Failed ──policy gives up──▶ Stopped
//!     └── delay ◀──┘
//! ```
//!
//! Attempts are strictly sequential: attempt N+1 starts only after attempt N
//! has resolved and the retry delay has elapsed.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use container_net::{EndpointConnector, TransportClientFactory};

use crate::policy::RetryPolicy;

/// Where a supervisor is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorState {
    /// Attempt `attempt` is in flight.
    Connecting {
        /// 1-based attempt number.
        attempt: u32,
    },
    /// Attempt `attempt` succeeded; no further attempts are made.
    Connected {
        /// The attempt that succeeded.
        attempt: u32,
        /// The session opened by that attempt.
        session_id: Uuid,
    },
    /// Attempt `attempt` failed; the next one starts after `retry_in`.
    Failed {
        /// The attempt that failed.
        attempt: u32,
        /// Why it failed.
        error: String,
        /// Delay before the next attempt.
        retry_in: Duration,
    },
    /// Terminal: retries exhausted, disabled, or cancelled.
    Stopped {
        /// Number of attempts made.
        attempts: u32,
    },
}

impl SupervisorState {
    /// Short label for listings.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Connecting { .. } => "connecting",
            Self::Connected { .. } => "connected",
            Self::Failed { .. } => "failed",
            Self::Stopped { .. } => "stopped",
        }
    }
}

/// Control handle for a running supervisor.
///
/// Dropping the handle does not stop the supervisor.
#[derive(Debug)]
pub struct SupervisorHandle {
    state: watch::Receiver<SupervisorState>,
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SupervisorHandle {
    /// The current state.
    #[must_use]
    pub fn state(&self) -> SupervisorState {
        self.state.borrow().clone()
    }

    /// Watch state transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SupervisorState> {
        self.state.clone()
    }

    /// Stop retrying and close a connected session. Returns immediately.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    /// Cancel and wait until the supervisor has stopped.
    pub async fn stop(self) {
        self.cancel();
        let _ = self.task.await;
    }

    /// Returns `true` once the supervisor task has ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Reconnect state machine for one activation.
#[derive(Debug)]
pub struct ConnectionSupervisor {
    connector: Arc<dyn EndpointConnector>,
    factory: Arc<TransportClientFactory>,
    policy: RetryPolicy,
}

impl ConnectionSupervisor {
    /// Create a supervisor; nothing happens until [`ConnectionSupervisor::spawn`].
    #[must_use]
    pub fn new(
        connector: Arc<dyn EndpointConnector>,
        factory: Arc<TransportClientFactory>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            connector,
            factory,
            policy,
        }
    }

    /// Start supervising on the current tokio runtime.
    ///
    /// The handle starts out in [`SupervisorState::Connecting`] for attempt 1.
    #[must_use]
    pub fn spawn(self) -> SupervisorHandle {
        let (state_tx, state_rx) = watch::channel(SupervisorState::Connecting { attempt: 1 });
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(state_tx, cancel_rx));
        SupervisorHandle {
            state: state_rx,
            cancel: cancel_tx,
            task,
        }
    }

    async fn run(self, state: watch::Sender<SupervisorState>, mut cancel: watch::Receiver<bool>) {
        let realm = self.factory.session_factory().realm().to_string();
        let mut attempt = 1;

        loop {
            state.send_replace(SupervisorState::Connecting { attempt });
            debug!(realm, attempt, "connecting to application router");

            let outcome = tokio::select! {
                biased;
                () = cancelled(&mut cancel) => {
                    info!(realm, attempt, "connection attempt cancelled");
                    state.send_replace(SupervisorState::Stopped { attempts: attempt });
                    return;
                }
                outcome = self.connector.connect(&self.factory) => outcome,
            };

            let err = match outcome {
                Ok(session) => {
                    info!(
                        realm,
                        attempt,
                        session_id = %session.session_id(),
                        peer = session.details().peer,
                        "connected to application router"
                    );
                    state.send_replace(SupervisorState::Connected {
                        attempt,
                        session_id: session.session_id(),
                    });
                    cancelled(&mut cancel).await;
                    session.close().await;
                    info!(realm, "session closed");
                    state.send_replace(SupervisorState::Stopped { attempts: attempt });
                    return;
                }
                Err(err) => err,
            };

            warn!(realm, attempt, error = %err, "failed to connect to application router");
            let Some(delay) = self.policy.retry_delay(attempt) else {
                warn!(realm, attempts = attempt, "could not connect to application router, giving up");
                state.send_replace(SupervisorState::Stopped { attempts: attempt });
                return;
            };

            info!(
                realm,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "retrying to connect"
            );
            state.send_replace(SupervisorState::Failed {
                attempt,
                error: err.to_string(),
                retry_in: delay,
            });

            tokio::select! {
                biased;
                () = cancelled(&mut cancel) => {
                    info!(realm, attempts = attempt, "reconnect cancelled");
                    state.send_replace(SupervisorState::Stopped { attempts: attempt });
                    return;
                }
                () = tokio::time::sleep(delay) => {}
            }
            attempt = attempt.saturating_add(1);
        }
    }
}

/// Resolves once cancellation is requested; never if the handle is dropped.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
