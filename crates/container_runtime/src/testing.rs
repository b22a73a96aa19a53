//! In-memory connectors for exercising activation without a router.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::oneshot;
use tokio::time::Instant;
use uuid::Uuid;

use container_component::{
    ComponentConfig, ComponentRegistry, ConfigurationError, Outbox, Session, SessionDetails,
};
use container_net::{
    ConnectError, ConnectResult, ConnectedSession, ConnectorFactory, EndpointConnector,
    EndpointSpec, TransportClientFactory,
};

/// A session that does nothing.
#[derive(Debug)]
pub struct Idle;

impl Session for Idle {
    fn on_open(&mut self, _details: &SessionDetails, _outbox: Outbox) {}
    fn on_message(&mut self, _message: serde_json::Value) {}
}

/// A registry with `app.sessions.Idle` registered.
pub fn registry() -> Arc<ComponentRegistry> {
    let mut registry = ComponentRegistry::new();
    registry.register_class("app.sessions.Idle", |_: ComponentConfig| Idle);
    Arc::new(registry)
}

/// Shared log of what the fake connectors were asked to do.
#[derive(Debug, Default)]
pub struct Log {
    /// Endpoints connectors were built for.
    pub endpoints: Mutex<Vec<EndpointSpec>>,
    /// Time of every connection attempt.
    pub attempts: Mutex<Vec<Instant>>,
    /// Realms of sessions that were opened.
    pub realms: Mutex<Vec<String>>,
    /// Number of sessions closed.
    pub closed: Mutex<usize>,
}

/// Builds [`FakeConnector`]s that either always connect or always refuse.
#[derive(Debug)]
pub struct FakeConnectors {
    pub log: Arc<Log>,
    succeed: bool,
}

impl FakeConnectors {
    pub fn refusing() -> Arc<Self> {
        Arc::new(Self {
            log: Arc::default(),
            succeed: false,
        })
    }

    pub fn accepting() -> Arc<Self> {
        Arc::new(Self {
            log: Arc::default(),
            succeed: true,
        })
    }
}

impl ConnectorFactory for FakeConnectors {
    fn connector(
        &self,
        endpoint: &EndpointSpec,
    ) -> Result<Arc<dyn EndpointConnector>, ConfigurationError> {
        self.log.endpoints.lock().unwrap().push(endpoint.clone());
        Ok(Arc::new(FakeConnector {
            log: Arc::clone(&self.log),
            succeed: self.succeed,
        }))
    }
}

#[derive(Debug)]
pub struct FakeConnector {
    log: Arc<Log>,
    succeed: bool,
}

#[async_trait]
impl EndpointConnector for FakeConnector {
    async fn connect(&self, factory: &TransportClientFactory) -> ConnectResult {
        self.log.attempts.lock().unwrap().push(Instant::now());
        if !self.succeed {
            return Err(ConnectError::Io(std::io::Error::from(
                std::io::ErrorKind::ConnectionRefused,
            )));
        }

        let sessions = factory.session_factory();
        let _session = sessions.create();
        self.log.realms.lock().unwrap().push(sessions.realm().to_string());

        let details = SessionDetails {
            session_id: Uuid::new_v4(),
            transport: factory.kind(),
            serializer: "json",
            peer: "fake".to_string(),
        };
        let (close_tx, close_rx) = oneshot::channel::<()>();
        let log = Arc::clone(&self.log);
        let task = tokio::spawn(async move {
            if close_rx.await.is_ok() {
                *log.closed.lock().unwrap() += 1;
            }
        });
        Ok(ConnectedSession::new(details, close_tx, task))
    }
}
