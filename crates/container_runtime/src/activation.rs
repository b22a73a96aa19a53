//! Component activation.
//!
//! [`ComponentActivationService::activate`] wires the pieces together for one
//! `(component, router)` request: resolve the component into a session
//! factory, bind it to a transport factory, build a connector for the
//! router's endpoint and hand all of it to a [`ConnectionSupervisor`].

use std::sync::Arc;

use tracing::info;

use container_component::{ComponentRegistry, ComponentSpec, ConfigurationError, ResolutionError};
use container_net::{ConnectorFactory, RouterTarget, build_transport_factory};

use crate::policy::RetryPolicy;
use crate::supervisor::{ConnectionSupervisor, SupervisorHandle};

/// Why an activation request was rejected. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActivationError {
    /// The component could not be resolved.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// The router or transport configuration is unusable.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

impl ActivationError {
    /// The stable, machine-readable reason code.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Resolution(e) => e.reason(),
            Self::Configuration(e) => e.reason(),
        }
    }
}

/// Activates components against routers.
#[derive(Debug)]
pub struct ComponentActivationService {
    registry: Arc<ComponentRegistry>,
    connectors: Arc<dyn ConnectorFactory>,
    policy: RetryPolicy,
}

impl ComponentActivationService {
    /// Create a service using the default retry policy.
    #[must_use]
    pub fn new(registry: Arc<ComponentRegistry>, connectors: Arc<dyn ConnectorFactory>) -> Self {
        Self {
            registry,
            connectors,
            policy: RetryPolicy::default(),
        }
    }

    /// Use `policy` for every supervisor started from now on.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The retry policy handed to new supervisors.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Activate `component` against `router`.
    ///
    /// Returns once the supervisor for the first connection attempt has been
    /// spawned; the outcome of that attempt is only observable through the
    /// handle. The handle reports `Connecting { attempt: 1 }` from the start,
    /// though on a current-thread runtime `connect` itself only begins once
    /// the caller yields. Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ActivationError`] if the component cannot be resolved or the
    /// transport or endpoint configuration is invalid. Nothing is started in
    /// that case.
    pub fn activate(
        &self,
        component: &ComponentSpec,
        router: &RouterTarget,
    ) -> Result<SupervisorHandle, ActivationError> {
        let sessions = self.registry.resolve(component, &router.realm)?;
        let factory = build_transport_factory(&router.transport, sessions)?;
        let connector = self.connectors.connector(router.transport.endpoint())?;

        info!(
            realm = router.realm,
            component = component.kind(),
            transport = factory.kind(),
            endpoint = router.transport.endpoint().describe(),
            "activating component"
        );
        Ok(ConnectionSupervisor::new(connector, Arc::new(factory), self.policy.clone()).spawn())
    }
}
