//! Transport and router descriptors.
//!
//! A [`RouterTarget`] says which realm to join and how to reach the router:
//! a [`TransportSpec`] (framing plus serializers) wrapped around an
//! [`EndpointSpec`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use container_component::ConfigurationError;

use crate::codec::Serializer;
use crate::endpoint::EndpointSpec;

/// Transport kinds this worker can build.
const TRANSPORT_KINDS: &[&str] = &["websocket", "rawsocket"];

/// Default and upper bound for the RawSocket maximum message size (16 MiB).
pub const MAX_MESSAGE_SIZE: u32 = 16 * 1024 * 1024;

/// Lower bound for the RawSocket maximum message size.
pub const MIN_MESSAGE_SIZE: u32 = 512;

fn default_serializers() -> Vec<Serializer> {
    vec![Serializer::Json, Serializer::Msgpack]
}

fn default_rawsocket_serializer() -> Serializer {
    Serializer::Msgpack
}

fn default_max_message_size() -> u32 {
    MAX_MESSAGE_SIZE
}

/// WebSocket transport settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebSocketSpec {
    /// The WebSocket URL, e.g. `ws://localhost:8080/ws`.
    pub url: String,
    /// Verbose transport logging.
    #[serde(default)]
    pub debug: bool,
    /// Where to connect.
    pub endpoint: EndpointSpec,
    /// Serializers offered, in order of preference.
    #[serde(default = "default_serializers")]
    pub serializers: Vec<Serializer>,
}

/// RawSocket transport settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSocketSpec {
    /// Verbose transport logging.
    #[serde(default)]
    pub debug: bool,
    /// Where to connect.
    pub endpoint: EndpointSpec,
    /// The single serializer requested in the handshake.
    #[serde(default = "default_rawsocket_serializer")]
    pub serializer: Serializer,
    /// Largest message this side accepts, in bytes.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: u32,
}

/// How to reach the router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransportSpec {
    /// WAMP over WebSocket.
    Websocket(WebSocketSpec),
    /// WAMP over length-prefixed RawSocket.
    Rawsocket(RawSocketSpec),
}

impl TransportSpec {
    /// A WebSocket transport with default serializers.
    #[must_use]
    pub fn websocket(url: impl Into<String>, endpoint: EndpointSpec) -> Self {
        Self::Websocket(WebSocketSpec {
            url: url.into(),
            debug: false,
            endpoint,
            serializers: default_serializers(),
        })
    }

    /// A RawSocket transport with default serializer and message size.
    #[must_use]
    pub fn rawsocket(endpoint: EndpointSpec) -> Self {
        Self::Rawsocket(RawSocketSpec {
            debug: false,
            endpoint,
            serializer: default_rawsocket_serializer(),
            max_message_size: default_max_message_size(),
        })
    }

    /// Parse a descriptor as it arrives over the management interface.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::UnknownTransportKind`] if `type` is
    /// missing or unknown, [`ConfigurationError::Invalid`] if the remaining
    /// fields do not fit the kind.
    pub fn from_value(value: &Value) -> Result<Self, ConfigurationError> {
        let kind = match value.get("type") {
            Some(Value::String(kind)) => kind.as_str(),
            Some(other) => return Err(ConfigurationError::UnknownTransportKind(other.to_string())),
            None => return Err(ConfigurationError::UnknownTransportKind(String::new())),
        };
        if !TRANSPORT_KINDS.contains(&kind) {
            return Err(ConfigurationError::UnknownTransportKind(kind.to_string()));
        }
        serde_json::from_value(value.clone())
            .map_err(|e| ConfigurationError::Invalid(format!("transport: {e}")))
    }

    /// The kind label (`"websocket"` or `"rawsocket"`).
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Websocket(_) => TRANSPORT_KINDS[0],
            Self::Rawsocket(_) => TRANSPORT_KINDS[1],
        }
    }

    /// Whether verbose transport logging is on.
    #[must_use]
    pub fn debug(&self) -> bool {
        match self {
            Self::Websocket(ws) => ws.debug,
            Self::Rawsocket(raw) => raw.debug,
        }
    }

    /// The endpoint this transport connects through.
    #[must_use]
    pub fn endpoint(&self) -> &EndpointSpec {
        match self {
            Self::Websocket(ws) => &ws.endpoint,
            Self::Rawsocket(raw) => &raw.endpoint,
        }
    }
}

/// The router a component attaches to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterTarget {
    /// The realm to join.
    pub realm: String,
    /// How to reach the router.
    pub transport: TransportSpec,
}

impl RouterTarget {
    /// Create a router target.
    #[must_use]
    pub fn new(realm: impl Into<String>, transport: TransportSpec) -> Self {
        Self {
            realm: realm.into(),
            transport,
        }
    }

    /// Parse a router descriptor as it arrives over the management interface.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::Invalid`] if `realm` is missing or not a
    /// string, or `transport` is missing; transport errors as
    /// [`TransportSpec::from_value`].
    pub fn from_value(value: &Value) -> Result<Self, ConfigurationError> {
        let realm = value
            .get("realm")
            .and_then(Value::as_str)
            .ok_or_else(|| ConfigurationError::Invalid("router requires a 'realm' string".to_string()))?;
        let transport = value
            .get("transport")
            .ok_or_else(|| ConfigurationError::Invalid("router requires a 'transport'".to_string()))?;
        Ok(Self::new(realm, TransportSpec::from_value(transport)?))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_parse_websocket_router() {
        let router = RouterTarget::from_value(&json!({
            "realm": "realm1",
            "transport": {
                "type": "websocket",
                "url": "ws://localhost:8080/ws",
                "endpoint": {"type": "tcp", "host": "localhost", "port": 8080}
            }
        }))
        .unwrap();
        assert_eq!(router.realm, "realm1");
        assert_eq!(
            router.transport,
            TransportSpec::websocket("ws://localhost:8080/ws", EndpointSpec::tcp("localhost", 8080))
        );
        assert_eq!(router.transport.kind(), "websocket");
        assert!(!router.transport.debug());
    }

    #[test]
    fn test_parse_rawsocket_defaults() {
        let transport = TransportSpec::from_value(&json!({
            "type": "rawsocket",
            "debug": true,
            "endpoint": {"type": "unix", "path": "router.sock"}
        }))
        .unwrap();
        let TransportSpec::Rawsocket(raw) = &transport else {
            panic!("expected rawsocket, got {transport:?}");
        };
        assert!(raw.debug);
        assert_eq!(raw.serializer, Serializer::Msgpack);
        assert_eq!(raw.max_message_size, MAX_MESSAGE_SIZE);
        assert_eq!(transport.endpoint(), &EndpointSpec::unix("router.sock"));
    }

    #[test]
    fn test_unknown_transport_kind() {
        let err = TransportSpec::from_value(&json!({"type": "bogus", "endpoint": {}})).unwrap_err();
        assert_eq!(err, ConfigurationError::UnknownTransportKind("bogus".to_string()));
        assert_eq!(err.reason(), "unknown-transport-kind");
    }

    #[test]
    fn test_websocket_without_url_is_invalid() {
        let err = TransportSpec::from_value(&json!({
            "type": "websocket",
            "endpoint": {"type": "tcp", "host": "localhost", "port": 8080}
        }))
        .unwrap_err();
        assert_eq!(err.reason(), "invalid-configuration");
    }

    #[test]
    fn test_router_without_realm() {
        let err = RouterTarget::from_value(&json!({"transport": {"type": "rawsocket"}})).unwrap_err();
        assert_eq!(err.reason(), "invalid-configuration");
    }
}
