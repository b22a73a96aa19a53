//! Endpoint descriptors: where a transport connects to.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use container_component::ConfigurationError;

/// Default connect timeout, in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

fn default_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

/// A connecting endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EndpointSpec {
    /// A TCP host and port.
    Tcp {
        /// Host name or address.
        host: String,
        /// Port number.
        port: u16,
        /// Connect timeout in seconds, covering the transport handshake.
        #[serde(default = "default_timeout")]
        timeout: u64,
    },
    /// A Unix domain socket.
    Unix {
        /// Socket path; relative paths resolve against the worker's base directory.
        path: PathBuf,
        /// Connect timeout in seconds, covering the transport handshake.
        #[serde(default = "default_timeout")]
        timeout: u64,
    },
}

impl EndpointSpec {
    /// A TCP endpoint with the default timeout.
    #[must_use]
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::Tcp {
            host: host.into(),
            port,
            timeout: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }

    /// A Unix socket endpoint with the default timeout.
    #[must_use]
    pub fn unix(path: impl Into<PathBuf>) -> Self {
        Self::Unix {
            path: path.into(),
            timeout: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }

    /// Override the connect timeout.
    #[must_use]
    pub fn with_timeout(mut self, secs: u64) -> Self {
        match &mut self {
            Self::Tcp { timeout, .. } | Self::Unix { timeout, .. } => *timeout = secs,
        }
        self
    }

    /// The connect timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        match self {
            Self::Tcp { timeout, .. } | Self::Unix { timeout, .. } => Duration::from_secs(*timeout),
        }
    }

    /// A short description for logs, e.g. `tcp:localhost:8080`.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Tcp { host, port, .. } => format!("tcp:{host}:{port}"),
            Self::Unix { path, .. } => format!("unix:{}", path.display()),
        }
    }

    /// Check the descriptor and resolve relative socket paths against `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::Invalid`] for an empty host, port `0`, or
    /// an empty socket path.
    pub fn resolved(&self, base_dir: &Path) -> Result<Self, ConfigurationError> {
        match self {
            Self::Tcp { host, port, .. } => {
                if host.is_empty() {
                    return Err(ConfigurationError::Invalid(
                        "tcp endpoint requires a host".to_string(),
                    ));
                }
                if *port == 0 {
                    return Err(ConfigurationError::Invalid(
                        "tcp endpoint requires a non-zero port".to_string(),
                    ));
                }
                Ok(self.clone())
            }
            Self::Unix { path, timeout } => {
                if path.as_os_str().is_empty() {
                    return Err(ConfigurationError::Invalid(
                        "unix endpoint requires a path".to_string(),
                    ));
                }
                let path = if path.is_absolute() {
                    path.clone()
                } else {
                    base_dir.join(path)
                };
                Ok(Self::Unix {
                    path,
                    timeout: *timeout,
                })
            }
        }
    }
}
