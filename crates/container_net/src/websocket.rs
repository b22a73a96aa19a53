//! WAMP over WebSocket.
//!
//! The serializer is negotiated through `Sec-WebSocket-Protocol`
//! (`wamp.2.json` in text frames, `wamp.2.msgpack` in binary frames).

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::debug;
use uuid::Uuid;

use container_component::{CloseReason, Outbox, Session, SessionDetails};

use crate::codec::Serializer;
use crate::connector::ConnectedSession;
use crate::error::{ConnectError, NetError};
use crate::factory::WebSocketClientFactory;

/// Value of the `Sec-WebSocket-Protocol` request header for `serializers`.
#[must_use]
pub fn subprotocol_header(serializers: &[Serializer]) -> String {
    serializers
        .iter()
        .map(|s| s.subprotocol())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Run the opening handshake on `stream`, open a session and spawn its driver.
///
/// # Errors
///
/// Returns [`ConnectError`] if the upgrade fails or the router selects no
/// offered subprotocol; no session is created in that case.
pub async fn start<S>(
    stream: S,
    peer: String,
    factory: &WebSocketClientFactory,
) -> Result<ConnectedSession, ConnectError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let mut request = factory.url().into_client_request()?;
    let offered = subprotocol_header(factory.serializers());
    let header =
        HeaderValue::from_str(&offered).map_err(|e| ConnectError::Handshake(e.to_string()))?;
    request.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, header);

    let (ws, response) = tokio_tungstenite::client_async(request, stream).await?;
    let serializer = response
        .headers()
        .get(SEC_WEBSOCKET_PROTOCOL)
        .and_then(|v| v.to_str().ok())
        .and_then(Serializer::from_subprotocol)
        .filter(|s| factory.serializers().contains(s))
        .ok_or_else(|| {
            ConnectError::Handshake(format!("router accepted none of the offered subprotocols ({offered})"))
        })?;

    let details = SessionDetails {
        session_id: Uuid::new_v4(),
        transport: "websocket",
        serializer: serializer.name(),
        peer,
    };
    if factory.debug() {
        debug!(
            session_id = %details.session_id,
            peer = details.peer,
            serializer = details.serializer,
            url = factory.url(),
            "websocket handshake complete"
        );
    }

    let mut session = factory.session_factory().create();
    let (outbox, outbox_rx) = Outbox::channel();
    session.on_open(&details, outbox);

    let (close_tx, close_rx) = oneshot::channel();
    let driver = Driver {
        session,
        serializer,
        fail_by_drop: factory.fail_by_drop(),
        debug: factory.debug(),
    };
    let task = tokio::spawn(driver.run(ws, outbox_rx, close_rx));
    Ok(ConnectedSession::new(details, close_tx, task))
}

struct Driver {
    session: Box<dyn Session>,
    serializer: Serializer,
    fail_by_drop: bool,
    debug: bool,
}

impl Driver {
    async fn run<S>(
        mut self,
        mut ws: WebSocketStream<S>,
        mut outbox_rx: mpsc::UnboundedReceiver<serde_json::Value>,
        mut close_rx: oneshot::Receiver<()>,
    ) where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let mut close_armed = true;
        let reason = loop {
            tokio::select! {
                closed = &mut close_rx, if close_armed => match closed {
                    Ok(()) => {
                        let _ = ws.close(None).await;
                        break CloseReason::Clean;
                    }
                    // Handle dropped: keep running detached.
                    Err(_) => close_armed = false,
                },
                incoming = ws.next() => match incoming {
                    Some(Ok(message)) => {
                        if let Err(e) = self.handle_message(message) {
                            break CloseReason::Error(e.to_string());
                        }
                    }
                    Some(Err(e)) => break self.classify(e),
                    None => break CloseReason::Clean,
                },
                Some(message) = outbox_rx.recv() => {
                    let frame = match self.encode(&message) {
                        Ok(frame) => frame,
                        Err(e) => break CloseReason::Error(e.to_string()),
                    };
                    if let Err(e) = ws.send(frame).await {
                        break self.classify(e);
                    }
                }
            }
        };

        if self.debug {
            debug!(?reason, "websocket transport closed");
        }
        self.session.on_close(&reason);
    }

    fn handle_message(&mut self, message: Message) -> Result<(), NetError> {
        let decoded = match (message, self.serializer) {
            (Message::Text(text), Serializer::Json) => self.serializer.decode(text.as_bytes())?,
            (Message::Binary(data), Serializer::Msgpack) => self.serializer.decode(&data)?,
            (Message::Text(_), _) => return Err(NetError::UnexpectedFrame("text")),
            (Message::Binary(_), _) => return Err(NetError::UnexpectedFrame("binary")),
            // Pings are answered by tungstenite; the close reply is flushed
            // while we keep reading until the stream ends.
            _ => return Ok(()),
        };
        self.session.on_message(decoded);
        Ok(())
    }

    fn encode(&self, message: &serde_json::Value) -> Result<Message, NetError> {
        Ok(match self.serializer {
            Serializer::Json => Message::Text(serde_json::to_string(message)?),
            Serializer::Msgpack => Message::Binary(self.serializer.encode(message)?),
        })
    }

    /// Map a transport error to a close reason, honouring `fail_by_drop`.
    fn classify(&self, err: WsError) -> CloseReason {
        match err {
            WsError::ConnectionClosed | WsError::AlreadyClosed => CloseReason::Clean,
            WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake) if !self.fail_by_drop => {
                CloseReason::Dropped
            }
            other => CloseReason::Error(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver(fail_by_drop: bool) -> Driver {
        #[derive(Debug)]
        struct Nop;
        impl Session for Nop {
            fn on_open(&mut self, _details: &SessionDetails, _outbox: Outbox) {}
            fn on_message(&mut self, _message: serde_json::Value) {}
        }
        Driver {
            session: Box::new(Nop),
            serializer: Serializer::Json,
            fail_by_drop,
            debug: false,
        }
    }

    #[test]
    fn test_subprotocol_header() {
        assert_eq!(
            subprotocol_header(&[Serializer::Json, Serializer::Msgpack]),
            "wamp.2.json, wamp.2.msgpack"
        );
    }

    #[test]
    fn test_drop_without_close_is_not_fatal() {
        let reset = || WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake);
        assert_eq!(driver(false).classify(reset()), CloseReason::Dropped);
        assert!(matches!(driver(true).classify(reset()), CloseReason::Error(_)));
        assert_eq!(driver(true).classify(WsError::ConnectionClosed), CloseReason::Clean);
    }

    #[test]
    fn test_json_session_rejects_binary_frames() {
        let mut driver = driver(false);
        assert!(driver.handle_message(Message::Text("[1]".to_string())).is_ok());
        assert!(matches!(
            driver.handle_message(Message::Binary(vec![0x91, 0x01])),
            Err(NetError::UnexpectedFrame("binary"))
        ));
    }

    #[test]
    fn test_encode_matches_serializer() {
        let json = driver(false).encode(&serde_json::json!([1])).unwrap();
        assert_eq!(json, Message::Text("[1]".to_string()));
    }
}
