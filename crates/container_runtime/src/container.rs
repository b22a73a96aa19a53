//! Container management façade.
//!
//! The worker's management interface talks to a [`ContainerWorker`]: start a
//! component from JSON descriptors, list what is running, stop components.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use container_component::ComponentSpec;
use container_net::RouterTarget;

use crate::activation::{ActivationError, ComponentActivationService};
use crate::supervisor::SupervisorHandle;

/// Identifier of a started component, unique within one container.
pub type ComponentId = u64;

/// Errors from component management.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContainerError {
    /// No running component has this id.
    #[error("no component with id {0}")]
    NoSuchComponent(ComponentId),
}

/// A listing entry for a running component.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentSummary {
    /// Component id.
    pub id: ComponentId,
    /// Component kind label.
    pub kind: &'static str,
    /// Realm the component attaches to.
    pub realm: String,
    /// Transport kind label.
    pub transport: &'static str,
    /// Supervisor state label.
    pub state: &'static str,
    /// When the component was started.
    pub started: SystemTime,
}

/// A component started in this container.
#[derive(Debug)]
struct RunningComponent {
    spec: ComponentSpec,
    router: RouterTarget,
    supervisor: SupervisorHandle,
    started: SystemTime,
}

/// Hosts components and supervises their router connections.
#[derive(Debug)]
pub struct ContainerWorker {
    service: ComponentActivationService,
    components: DashMap<ComponentId, RunningComponent>,
    next_id: AtomicU64,
}

impl ContainerWorker {
    /// Create an empty container.
    #[must_use]
    pub fn new(service: ComponentActivationService) -> Self {
        Self {
            service,
            components: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Start a component from the JSON descriptors the management interface
    /// receives.
    ///
    /// # Errors
    ///
    /// Returns [`ActivationError`] for unknown component or transport kinds,
    /// malformed descriptors, or components that cannot be resolved.
    pub fn start_component(
        &self,
        component: &Value,
        router: &Value,
    ) -> Result<ComponentId, ActivationError> {
        let component = ComponentSpec::from_value(component)?;
        let router = RouterTarget::from_value(router)?;
        self.activate(component, router)
    }

    /// Start a component from typed descriptors.
    ///
    /// # Errors
    ///
    /// As [`ComponentActivationService::activate`].
    pub fn activate(
        &self,
        component: ComponentSpec,
        router: RouterTarget,
    ) -> Result<ComponentId, ActivationError> {
        let supervisor = match self.service.activate(&component, &router) {
            Ok(supervisor) => supervisor,
            Err(err) => {
                warn!(reason = err.reason(), error = %err, "component activation failed");
                return Err(err);
            }
        };
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        info!(id, realm = router.realm, "component started");
        self.components.insert(
            id,
            RunningComponent {
                spec: component,
                router,
                supervisor,
                started: SystemTime::now(),
            },
        );
        Ok(id)
    }

    /// Stop a component: cancel its supervisor and close its session.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::NoSuchComponent`] if `id` is not running.
    pub async fn stop_component(&self, id: ComponentId) -> Result<(), ContainerError> {
        let (_, running) = self
            .components
            .remove(&id)
            .ok_or(ContainerError::NoSuchComponent(id))?;
        running.supervisor.stop().await;
        info!(id, realm = running.router.realm, "component stopped");
        Ok(())
    }

    /// Stop every component.
    pub async fn stop_all(&self) {
        let ids: Vec<ComponentId> = self.components.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            // Already removed by a concurrent stop: nothing to do.
            let _ = self.stop_component(id).await;
        }
    }

    /// Summaries of running components, ordered by id.
    ///
    /// Components whose supervisor has given up are pruned first.
    #[must_use]
    pub fn get_components(&self) -> Vec<ComponentSummary> {
        self.prune_finished();
        let mut summaries: Vec<ComponentSummary> = self
            .components
            .iter()
            .map(|entry| {
                let running = entry.value();
                ComponentSummary {
                    id: *entry.key(),
                    kind: running.spec.kind(),
                    realm: running.router.realm.clone(),
                    transport: running.router.transport.kind(),
                    state: running.supervisor.state().label(),
                    started: running.started,
                }
            })
            .collect();
        summaries.sort_by_key(|s| s.id);
        summaries
    }

    /// Drop components whose supervisor has finished on its own, e.g. after
    /// exhausting its retry policy. Returns how many were removed.
    pub fn prune_finished(&self) -> usize {
        let before = self.components.len();
        self.components.retain(|id, running| {
            let finished = running.supervisor.is_finished();
            if finished {
                info!(id = *id, realm = running.router.realm, "component gave up, removing");
            }
            !finished
        });
        before.saturating_sub(self.components.len())
    }

    /// Number of running components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.prune_finished();
        self.components.len()
    }

    /// Returns `true` if nothing is running.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::policy::RetryPolicy;
    use crate::supervisor::SupervisorState;
    use crate::testing::{FakeConnectors, registry};

    fn container(connectors: std::sync::Arc<FakeConnectors>) -> ContainerWorker {
        ContainerWorker::new(ComponentActivationService::new(registry(), connectors))
    }

    fn router() -> Value {
        json!({
            "realm": "realm1",
            "transport": {
                "type": "rawsocket",
                "endpoint": {"type": "tcp", "host": "127.0.0.1", "port": 8080}
            }
        })
    }

    fn component() -> Value {
        json!({"type": "class", "classname": "app.sessions.Idle"})
    }

    #[tokio::test]
    async fn test_start_list_and_stop() {
        let connectors = FakeConnectors::accepting();
        let container = container(connectors.clone());

        let first = container.start_component(&component(), &router()).unwrap();
        let second = container.start_component(&component(), &router()).unwrap();
        assert_ne!(first, second);
        assert_eq!(container.len(), 2);

        let listing = container.get_components();
        assert_eq!(listing.iter().map(|c| c.id).collect::<Vec<_>>(), vec![first, second]);
        assert!(listing.iter().all(|c| c.realm == "realm1"));
        assert!(listing.iter().all(|c| c.kind == "qualified-class"));
        assert!(listing.iter().all(|c| c.transport == "rawsocket"));

        container.stop_component(first).await.unwrap();
        assert_eq!(container.len(), 1);
        assert_eq!(
            container.stop_component(first).await,
            Err(ContainerError::NoSuchComponent(first))
        );

        container.stop_all().await;
        assert!(container.is_empty());
    }

    #[tokio::test]
    async fn test_connected_state_is_listed() {
        let connectors = FakeConnectors::accepting();
        let container = container(connectors.clone());
        let id = container.start_component(&component(), &router()).unwrap();

        for _ in 0..100 {
            if container.get_components()[0].state == "connected" {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(container.get_components()[0].state, "connected");

        container.stop_component(id).await.unwrap();
        assert_eq!(*connectors.log.closed.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_rejected_start_is_not_listed() {
        let connectors = FakeConnectors::accepting();
        let container = container(connectors.clone());

        let err = container
            .start_component(&json!({"type": "function"}), &router())
            .unwrap_err();
        assert_eq!(err.reason(), "unknown-component-kind");

        let err = container
            .start_component(&component(), &json!({"realm": "realm1", "transport": {"type": "bogus"}}))
            .unwrap_err();
        assert_eq!(err.reason(), "unknown-transport-kind");

        let err = container
            .start_component(&json!({"type": "class"}), &router())
            .unwrap_err();
        assert_eq!(err.reason(), "invalid-configuration");

        assert!(container.is_empty());
        assert!(connectors.log.endpoints.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_all_cancels_retrying_components() {
        let connectors = FakeConnectors::refusing();
        let container = container(connectors.clone());
        container.start_component(&component(), &router()).unwrap();
        container.start_component(&component(), &router()).unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(2500)).await;
        assert!(container.get_components().iter().all(|c| c.state == "failed"));

        container.stop_all().await;
        assert!(container.is_empty());
        let attempts = connectors.log.attempts.lock().unwrap().len();
        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        assert_eq!(connectors.log.attempts.lock().unwrap().len(), attempts);
    }

    #[tokio::test]
    async fn test_given_up_components_are_pruned() {
        let connectors = FakeConnectors::refusing();
        let service = ComponentActivationService::new(registry(), connectors.clone())
            .with_retry_policy(RetryPolicy::disabled());
        let container = ContainerWorker::new(service);
        container.start_component(&component(), &router()).unwrap();

        for _ in 0..100 {
            if container.get_components().is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(container.get_components().is_empty());
        assert!(container.is_empty());
        assert_eq!(connectors.log.attempts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_start_with_legacy_class_descriptor() {
        let container = container(FakeConnectors::accepting());
        let id = container
            .start_component(&json!({"type": "class", "name": "app.sessions.Idle"}), &router())
            .unwrap();
        assert_eq!(container.get_components()[0].kind, "qualified-class");
        container.stop_component(id).await.unwrap();
    }

    #[test]
    fn test_summary_serializes() {
        let summary = ComponentSummary {
            id: 7,
            kind: "packaged-entrypoint",
            realm: "realm1".to_string(),
            transport: "websocket",
            state: SupervisorState::Connecting { attempt: 1 }.label(),
            started: SystemTime::UNIX_EPOCH,
        };
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["id"], 7);
        assert_eq!(value["state"], "connecting");
    }
}
