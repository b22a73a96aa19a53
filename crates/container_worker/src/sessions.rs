//! Built-in sessions.
//!
//! [`HelloSession`] opens a WAMP session on whatever realm it is configured
//! for and logs the router's answer. Useful for checking that a router is
//! reachable from the worker.

use serde_json::{Value, json};
use tracing::{debug, info, warn};

use container_component::{
    CloseReason, ComponentConfig, ComponentRegistry, Outbox, Session, SessionDetails,
};

/// Qualified class name of [`HelloSession`].
pub const HELLO_CLASS: &str = "container_worker.sessions.HelloSession";
/// Distribution and entry point name of [`HelloSession`].
pub const HELLO_ENTRY_POINT: (&str, &str) = ("container_worker", "hello");

const HELLO: u64 = 1;
const WELCOME: u64 = 2;
const ABORT: u64 = 3;

/// Register every built-in session with `registry`.
pub fn register_builtin(registry: &mut ComponentRegistry) {
    registry.register_class(HELLO_CLASS, HelloSession::new);
    let (dist, entry) = HELLO_ENTRY_POINT;
    registry.register_entry_point(dist, entry, HelloSession::new);
}

/// Sends `HELLO` on open and logs `WELCOME` or `ABORT`.
#[derive(Debug)]
pub struct HelloSession {
    config: ComponentConfig,
    outbox: Option<Outbox>,
    welcome: Option<u64>,
}

impl HelloSession {
    /// Create a session for `config.realm`.
    #[must_use]
    pub fn new(config: ComponentConfig) -> Self {
        Self {
            config,
            outbox: None,
            welcome: None,
        }
    }

    /// The router-assigned session id, once welcomed.
    #[must_use]
    pub fn welcome(&self) -> Option<u64> {
        self.welcome
    }

    fn hello(&self) -> Value {
        json!([
            HELLO,
            self.config.realm,
            {
                "roles": {
                    "caller": {},
                    "callee": {},
                    "publisher": {},
                    "subscriber": {}
                }
            }
        ])
    }
}

impl Session for HelloSession {
    fn on_open(&mut self, details: &SessionDetails, outbox: Outbox) {
        info!(
            realm = self.config.realm,
            transport = details.transport,
            serializer = details.serializer,
            peer = details.peer,
            "transport open, joining realm"
        );
        if outbox.send(self.hello()).is_err() {
            warn!(realm = self.config.realm, "transport closed before HELLO was sent");
        }
        self.outbox = Some(outbox);
    }

    fn on_message(&mut self, message: Value) {
        let code = message.get(0).and_then(Value::as_u64);
        match code {
            Some(WELCOME) => {
                self.welcome = message.get(1).and_then(Value::as_u64);
                info!(realm = self.config.realm, session = ?self.welcome, "joined realm");
            }
            Some(ABORT) => {
                let reason = message.get(2).and_then(Value::as_str).unwrap_or("unknown");
                warn!(realm = self.config.realm, reason, "router aborted session");
                self.outbox = None;
            }
            _ => debug!(realm = self.config.realm, %message, "ignoring message"),
        }
    }

    fn on_close(&mut self, reason: &CloseReason) {
        info!(realm = self.config.realm, ?reason, "session closed");
        self.outbox = None;
        self.welcome = None;
    }
}

#[cfg(test)]
mod tests {
    use container_component::ComponentSpec;
    use uuid::Uuid;

    use super::*;

    fn details() -> SessionDetails {
        SessionDetails {
            session_id: Uuid::new_v4(),
            transport: "rawsocket",
            serializer: "json",
            peer: "127.0.0.1:8080".to_string(),
        }
    }

    #[test]
    fn test_sends_hello_on_open() {
        let (outbox, mut rx) = Outbox::channel();
        let mut session = HelloSession::new(ComponentConfig::new("realm1"));
        session.on_open(&details(), outbox);

        let hello = rx.try_recv().unwrap();
        assert_eq!(hello[0], 1);
        assert_eq!(hello[1], "realm1");
        assert!(hello[2]["roles"].get("callee").is_some());
    }

    #[test]
    fn test_welcome_and_close() {
        let (outbox, _rx) = Outbox::channel();
        let mut session = HelloSession::new(ComponentConfig::new("realm1"));
        session.on_open(&details(), outbox);

        session.on_message(json!([2, 9129137332_u64, {"roles": {"broker": {}}}]));
        assert_eq!(session.welcome(), Some(9_129_137_332));

        session.on_close(&CloseReason::Clean);
        assert_eq!(session.welcome(), None);
    }

    #[test]
    fn test_abort_is_not_a_welcome() {
        let (outbox, _rx) = Outbox::channel();
        let mut session = HelloSession::new(ComponentConfig::new("realm1"));
        session.on_open(&details(), outbox);

        session.on_message(json!([3, {}, "wamp.error.no_such_realm"]));
        assert_eq!(session.welcome(), None);
    }

    #[test]
    fn test_builtins_resolve() {
        let mut registry = ComponentRegistry::new();
        register_builtin(&mut registry);
        assert_eq!(registry.len(), 2);

        let (dist, entry) = HELLO_ENTRY_POINT;
        assert!(registry.resolve(&ComponentSpec::class(HELLO_CLASS), "realm1").is_ok());
        assert!(registry.resolve(&ComponentSpec::entry_point(dist, entry), "realm1").is_ok());
    }
}
