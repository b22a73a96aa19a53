//! Core [`Session`] trait and the values handed to it.
//!
//! A session is the application-level participant a component contributes to
//! a realm. The container never reuses a session: every connection attempt
//! gets a fresh instance from a [`SessionFactory`].

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::SessionClosed;

/// Configuration handed to a session constructor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentConfig {
    /// The realm the session attaches to.
    pub realm: String,
    /// Opaque component-specific configuration.
    pub extra: Option<Value>,
}

impl ComponentConfig {
    /// Create a config for `realm` with no extra configuration.
    #[must_use]
    pub fn new(realm: impl Into<String>) -> Self {
        Self {
            realm: realm.into(),
            extra: None,
        }
    }

    /// Attach component-specific configuration.
    #[must_use]
    pub fn with_extra(mut self, extra: Value) -> Self {
        self.extra = Some(extra);
        self
    }
}

/// Facts about the transport a session was opened on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDetails {
    /// Unique identifier of this session instance.
    pub session_id: Uuid,
    /// Transport kind label (`"websocket"` or `"rawsocket"`).
    pub transport: &'static str,
    /// Negotiated serializer (e.g. `"json"`, `"msgpack"`).
    pub serializer: &'static str,
    /// Human-readable description of the remote peer.
    pub peer: String,
}

/// Why a session's transport went away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Closed with a proper closing handshake, or closed locally.
    Clean,
    /// The peer dropped the connection without a closing handshake.
    Dropped,
    /// The transport failed.
    Error(String),
}

/// Sending half handed to a session when its transport opens.
///
/// Messages are queued and written by the transport driver in order.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<Value>,
}

impl Outbox {
    /// Create an outbox together with the receiver the transport drains.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Value>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue a message for the peer.
    ///
    /// # Errors
    ///
    /// Returns [`SessionClosed`] if the transport has already shut down.
    pub fn send(&self, message: Value) -> Result<(), SessionClosed> {
        self.tx.send(message).map_err(|_| SessionClosed)
    }
}

/// The application-session contract.
///
/// Implementations are driven by a transport: [`Session::on_open`] once the
/// transport handshake completes, [`Session::on_message`] for each decoded
/// message and [`Session::on_close`] exactly once at the end.
///
/// # Examples
///
/// ```rust
/// use container_component::{CloseReason, Outbox, Session, SessionDetails};
/// use serde_json::Value;
///
/// #[derive(Debug, Default)]
/// struct Quiet;
///
/// impl Session for Quiet {
///     fn on_open(&mut self, _details: &SessionDetails, _outbox: Outbox) {}
///     fn on_message(&mut self, _message: Value) {}
/// }
/// ```
pub trait Session: Send + 'static {
    /// Called once the transport is established.
    fn on_open(&mut self, details: &SessionDetails, outbox: Outbox);

    /// Called for every message received from the peer.
    fn on_message(&mut self, message: Value);

    /// Called once when the transport goes away.
    fn on_close(&mut self, _reason: &CloseReason) {}
}

/// A constructor registered for a component: builds a session from its config.
pub type SessionConstructor = Arc<dyn Fn(ComponentConfig) -> Box<dyn Session> + Send + Sync>;

/// Zero-argument capability producing a new session per connection attempt.
///
/// Closed over the realm and extra configuration of one activation; cloning
/// is cheap and shares the same constructor.
#[derive(Clone)]
pub struct SessionFactory {
    config: ComponentConfig,
    constructor: SessionConstructor,
}

impl SessionFactory {
    /// Bind `constructor` to `config`.
    #[must_use]
    pub fn new(config: ComponentConfig, constructor: SessionConstructor) -> Self {
        Self {
            config,
            constructor,
        }
    }

    /// Build a fresh session.
    #[must_use]
    pub fn create(&self) -> Box<dyn Session> {
        (self.constructor)(self.config.clone())
    }

    /// The configuration every session from this factory receives.
    #[must_use]
    pub fn config(&self) -> &ComponentConfig {
        &self.config
    }

    /// The realm sessions from this factory attach to.
    #[must_use]
    pub fn realm(&self) -> &str {
        &self.config.realm
    }
}

impl fmt::Debug for SessionFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionFactory")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Debug)]
    struct Counting;

    impl Session for Counting {
        fn on_open(&mut self, _details: &SessionDetails, _outbox: Outbox) {}
        fn on_message(&mut self, _message: Value) {}
    }

    #[test]
    fn test_factory_passes_config_to_constructor() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let constructor: SessionConstructor = Arc::new(move |cfg: ComponentConfig| {
            seen.fetch_add(1, Ordering::SeqCst);
            assert_eq!(cfg.realm, "realm1");
            assert_eq!(cfg.extra, Some(serde_json::json!({"k": 1})));
            Box::new(Counting) as Box<dyn Session>
        });
        let factory = SessionFactory::new(
            ComponentConfig::new("realm1").with_extra(serde_json::json!({"k": 1})),
            constructor,
        );

        let _a = factory.create();
        let _b = factory.create();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(factory.realm(), "realm1");
    }

    #[test]
    fn test_outbox_send_after_receiver_dropped() {
        let (outbox, rx) = Outbox::channel();
        assert!(outbox.send(serde_json::json!([1])).is_ok());
        drop(rx);
        assert_eq!(outbox.send(serde_json::json!([2])), Err(SessionClosed));
    }
}
