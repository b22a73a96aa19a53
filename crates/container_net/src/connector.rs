//! Endpoint connectors.
//!
//! An [`EndpointConnector`] opens a stream to the router and hands it to a
//! [`TransportClientFactory`]. The outcome is a plain `Result`: connection
//! failure is an expected, recurring result for the supervisor, not a panic
//! or a log line.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

use container_component::{ConfigurationError, SessionDetails};

use crate::endpoint::EndpointSpec;
use crate::error::ConnectError;
use crate::factory::TransportClientFactory;

/// Outcome of one connection attempt.
pub type ConnectResult = Result<ConnectedSession, ConnectError>;

/// A session attached to the router over an established transport.
///
/// Dropping this handle leaves the session running; [`ConnectedSession::close`]
/// shuts it down.
#[derive(Debug)]
pub struct ConnectedSession {
    details: SessionDetails,
    close: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ConnectedSession {
    /// Wrap a running session driver.
    #[must_use]
    pub fn new(details: SessionDetails, close: oneshot::Sender<()>, task: JoinHandle<()>) -> Self {
        Self {
            details,
            close: Some(close),
            task,
        }
    }

    /// The session instance id.
    #[must_use]
    pub fn session_id(&self) -> Uuid {
        self.details.session_id
    }

    /// Transport and peer details.
    #[must_use]
    pub fn details(&self) -> &SessionDetails {
        &self.details
    }

    /// Returns `true` once the transport has gone away.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Close the transport and wait for the session to observe it.
    pub async fn close(mut self) {
        if let Some(close) = self.close.take() {
            let _ = close.send(());
        }
        let _ = (&mut self.task).await;
    }
}

/// Opens connections to one router endpoint.
#[async_trait]
pub trait EndpointConnector: Send + Sync + fmt::Debug {
    /// Connect, run the transport handshake and open a session.
    async fn connect(&self, factory: &TransportClientFactory) -> ConnectResult;
}

/// Builds connectors from endpoint descriptors.
pub trait ConnectorFactory: Send + Sync + fmt::Debug {
    /// Create a connector for `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] if the descriptor is unusable.
    fn connector(
        &self,
        endpoint: &EndpointSpec,
    ) -> Result<Arc<dyn EndpointConnector>, ConfigurationError>;
}

/// Connects over TCP or Unix domain sockets.
#[derive(Debug, Clone)]
pub struct NetworkConnector {
    endpoint: EndpointSpec,
}

impl NetworkConnector {
    /// Create a connector, resolving relative socket paths against `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::Invalid`] for an unusable descriptor.
    pub fn from_spec(endpoint: &EndpointSpec, base_dir: &Path) -> Result<Self, ConfigurationError> {
        Ok(Self {
            endpoint: endpoint.resolved(base_dir)?,
        })
    }

    /// The resolved endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &EndpointSpec {
        &self.endpoint
    }

    async fn open(&self, factory: &TransportClientFactory) -> ConnectResult {
        match &self.endpoint {
            EndpointSpec::Tcp { host, port, .. } => {
                let stream = TcpStream::connect((host.as_str(), *port)).await?;
                stream.set_nodelay(true)?;
                let peer = match stream.peer_addr() {
                    Ok(addr) => format!("tcp:{addr}"),
                    Err(_) => self.endpoint.describe(),
                };
                factory.start(stream, peer).await
            }
            EndpointSpec::Unix { path, .. } => connect_unix(path, factory).await,
        }
    }
}

#[cfg(unix)]
async fn connect_unix(path: &Path, factory: &TransportClientFactory) -> ConnectResult {
    let stream = tokio::net::UnixStream::connect(path).await?;
    factory.start(stream, format!("unix:{}", path.display())).await
}

#[cfg(not(unix))]
async fn connect_unix(path: &Path, _factory: &TransportClientFactory) -> ConnectResult {
    Err(ConnectError::UnsupportedEndpoint(format!(
        "unix:{} (Unix sockets are not available on this platform)",
        path.display()
    )))
}

#[async_trait]
impl EndpointConnector for NetworkConnector {
    async fn connect(&self, factory: &TransportClientFactory) -> ConnectResult {
        let timeout = self.endpoint.timeout();
        debug!(
            endpoint = self.endpoint.describe(),
            transport = factory.kind(),
            "opening connection"
        );
        tokio::time::timeout(timeout, self.open(factory))
            .await
            .map_err(|_| ConnectError::Timeout(timeout))?
    }
}

/// Builds [`NetworkConnector`]s for a worker rooted at `base_dir`.
#[derive(Debug, Clone)]
pub struct NetworkConnectorFactory {
    base_dir: PathBuf,
}

impl NetworkConnectorFactory {
    /// Create a factory resolving relative socket paths against `base_dir`.
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }
}

impl ConnectorFactory for NetworkConnectorFactory {
    fn connector(
        &self,
        endpoint: &EndpointSpec,
    ) -> Result<Arc<dyn EndpointConnector>, ConfigurationError> {
        Ok(Arc::new(NetworkConnector::from_spec(endpoint, &self.base_dir)?))
    }
}
