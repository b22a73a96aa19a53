//! Transport client factories.
//!
//! [`build_transport_factory`] binds a [`SessionFactory`] to a transport
//! descriptor. The resulting [`TransportClientFactory`] is handed to an
//! endpoint connector, which calls [`TransportClientFactory::start`] on every
//! freshly connected stream.

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::http::Uri;

use container_component::{ConfigurationError, SessionFactory};

use crate::codec::Serializer;
use crate::connector::ConnectedSession;
use crate::error::ConnectError;
use crate::rawsocket;
use crate::transport::{MAX_MESSAGE_SIZE, MIN_MESSAGE_SIZE, RawSocketSpec, TransportSpec, WebSocketSpec};
use crate::websocket;

/// Builds WAMP-over-WebSocket client connections.
#[derive(Debug, Clone)]
pub struct WebSocketClientFactory {
    sessions: SessionFactory,
    url: String,
    serializers: Vec<Serializer>,
    fail_by_drop: bool,
    debug: bool,
}

impl WebSocketClientFactory {
    /// Create a factory for `url` offering both serializers.
    ///
    /// `fail_by_drop` starts enabled: a peer dropping the connection without
    /// a closing handshake is reported as a transport error.
    #[must_use]
    pub fn new(sessions: SessionFactory, url: impl Into<String>) -> Self {
        Self {
            sessions,
            url: url.into(),
            serializers: vec![Serializer::Json, Serializer::Msgpack],
            fail_by_drop: true,
            debug: false,
        }
    }

    /// Whether an abrupt peer disconnect counts as a transport error.
    pub fn set_fail_by_drop(&mut self, fail_by_drop: bool) {
        self.fail_by_drop = fail_by_drop;
    }

    /// Replace the offered serializers.
    pub fn set_serializers(&mut self, serializers: Vec<Serializer>) {
        self.serializers = serializers;
    }

    /// Turn on verbose transport logging.
    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    /// The WebSocket URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Offered serializers, in order of preference.
    #[must_use]
    pub fn serializers(&self) -> &[Serializer] {
        &self.serializers
    }

    /// Whether an abrupt peer disconnect counts as a transport error.
    #[must_use]
    pub fn fail_by_drop(&self) -> bool {
        self.fail_by_drop
    }

    /// Whether verbose transport logging is on.
    #[must_use]
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// The bound session factory.
    #[must_use]
    pub fn session_factory(&self) -> &SessionFactory {
        &self.sessions
    }
}

/// Builds WAMP-over-RawSocket client connections.
#[derive(Debug, Clone)]
pub struct RawSocketClientFactory {
    sessions: SessionFactory,
    spec: RawSocketSpec,
}

impl RawSocketClientFactory {
    /// Create a factory bound to the full transport descriptor.
    #[must_use]
    pub fn new(sessions: SessionFactory, spec: RawSocketSpec) -> Self {
        Self { sessions, spec }
    }

    /// The transport descriptor.
    #[must_use]
    pub fn spec(&self) -> &RawSocketSpec {
        &self.spec
    }

    /// The bound session factory.
    #[must_use]
    pub fn session_factory(&self) -> &SessionFactory {
        &self.sessions
    }
}

/// A transport-specific client factory.
#[derive(Debug, Clone)]
pub enum TransportClientFactory {
    /// WebSocket framing.
    WebSocket(WebSocketClientFactory),
    /// Length-prefixed RawSocket framing.
    RawSocket(RawSocketClientFactory),
}

impl TransportClientFactory {
    /// The transport kind label.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::WebSocket(_) => "websocket",
            Self::RawSocket(_) => "rawsocket",
        }
    }

    /// The bound session factory.
    #[must_use]
    pub fn session_factory(&self) -> &SessionFactory {
        match self {
            Self::WebSocket(ws) => ws.session_factory(),
            Self::RawSocket(raw) => raw.session_factory(),
        }
    }

    /// Run the transport handshake on a connected stream and open a new
    /// session on it.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError`] if the handshake fails.
    pub async fn start<S>(&self, stream: S, peer: String) -> Result<ConnectedSession, ConnectError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        match self {
            Self::WebSocket(ws) => websocket::start(stream, peer, ws).await,
            Self::RawSocket(raw) => {
                rawsocket::start(stream, peer, raw.spec(), raw.session_factory()).await
            }
        }
    }
}

/// Bind `sessions` to the transport described by `transport`.
///
/// WebSocket factories are built with `fail_by_drop` disabled so an abrupt
/// peer disconnect ends the session quietly instead of as a protocol error.
///
/// # Errors
///
/// Returns [`ConfigurationError::Invalid`] for a WebSocket URL that is not a
/// plain `ws://` URL with a host, an empty serializer list, or a RawSocket
/// message size outside `512 ..= 16 MiB`.
pub fn build_transport_factory(
    transport: &TransportSpec,
    sessions: SessionFactory,
) -> Result<TransportClientFactory, ConfigurationError> {
    match transport {
        TransportSpec::Websocket(spec) => {
            validate_websocket(spec)?;
            let mut factory = WebSocketClientFactory::new(sessions, spec.url.clone());
            factory.set_serializers(spec.serializers.clone());
            factory.set_debug(spec.debug);
            factory.set_fail_by_drop(false);
            Ok(TransportClientFactory::WebSocket(factory))
        }
        TransportSpec::Rawsocket(spec) => {
            if !(MIN_MESSAGE_SIZE..=MAX_MESSAGE_SIZE).contains(&spec.max_message_size) {
                return Err(ConfigurationError::Invalid(format!(
                    "max_message_size must be between {MIN_MESSAGE_SIZE} and {MAX_MESSAGE_SIZE}, got {}",
                    spec.max_message_size
                )));
            }
            Ok(TransportClientFactory::RawSocket(RawSocketClientFactory::new(
                sessions,
                spec.clone(),
            )))
        }
    }
}

fn validate_websocket(spec: &WebSocketSpec) -> Result<(), ConfigurationError> {
    let uri: Uri = spec
        .url
        .parse()
        .map_err(|e| ConfigurationError::Invalid(format!("invalid WebSocket URL '{}': {e}", spec.url)))?;
    match uri.scheme_str() {
        Some("ws") => {}
        Some("wss") => {
            return Err(ConfigurationError::Invalid(
                "secure WebSocket (wss) is not supported by this worker".to_string(),
            ));
        }
        other => {
            return Err(ConfigurationError::Invalid(format!(
                "WebSocket URL must use the ws scheme, got {other:?}"
            )));
        }
    }
    if uri.host().is_none_or(str::is_empty) {
        return Err(ConfigurationError::Invalid(format!(
            "WebSocket URL '{}' has no host",
            spec.url
        )));
    }
    if spec.serializers.is_empty() {
        return Err(ConfigurationError::Invalid(
            "at least one serializer is required".to_string(),
        ));
    }
    Ok(())
}
