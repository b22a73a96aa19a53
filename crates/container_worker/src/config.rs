//! Worker configuration file.
//!
//! ```json
//! {
//!   "retry": {"enabled": true, "delay_ms": 1000},
//!   "components": [
//!     {
//!       "component": {"type": "class", "classname": "container_worker.sessions.HelloSession"},
//!       "router": {
//!         "realm": "realm1",
//!         "transport": {
//!           "type": "websocket",
//!           "url": "ws://localhost:8080/ws",
//!           "endpoint": {"type": "tcp", "host": "localhost", "port": 8080}
//!         }
//!       }
//!     }
//!   ]
//! }
//! ```
//!
//! Component and router descriptors are kept as raw JSON so that one bad
//! entry is reported by the container and does not prevent the others from
//! starting.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

use container_runtime::RetryPolicy;

/// Top-level worker configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    /// Reconnection policy shared by all components.
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Components to start.
    #[serde(default)]
    pub components: Vec<ComponentEntry>,
}

/// One `(component, router)` pair.
#[derive(Debug, Clone, Deserialize)]
pub struct ComponentEntry {
    pub component: Value,
    pub router: Value,
}

impl WorkerConfig {
    /// Read and parse the file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Parse a configuration document.
    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults() {
        let config = WorkerConfig::parse("{}").unwrap();
        assert_eq!(config.retry, RetryPolicy::default());
        assert!(config.components.is_empty());
    }

    #[test]
    fn test_parse_components() {
        let config = WorkerConfig::parse(
            r#"{
                "retry": {"delay_ms": 250, "max_attempts": 3},
                "components": [
                    {
                        "component": {"type": "wamplet", "dist": "container_worker", "entry": "hello"},
                        "router": {"realm": "realm1", "transport": {"type": "bogus"}}
                    }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(config.retry.delay_ms, 250);
        assert_eq!(config.retry.max_attempts, Some(3));
        assert_eq!(config.components.len(), 1);
        assert_eq!(config.components[0].router["transport"]["type"], "bogus");
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(WorkerConfig::parse(r#"{"component": []}"#).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = WorkerConfig::load(Path::new("/nonexistent/worker.json")).unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }
}
