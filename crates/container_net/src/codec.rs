//! Message serializers.
//!
//! Sessions exchange messages as [`serde_json::Value`]s. On the wire they are
//! either JSON or MessagePack, negotiated per transport: a serializer id in
//! the RawSocket handshake, a subprotocol for WebSocket.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::NetError;

/// A wire serializer for session messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Serializer {
    /// UTF-8 JSON.
    Json,
    /// MessagePack.
    Msgpack,
}

impl Serializer {
    /// Short name (`"json"` or `"msgpack"`).
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Msgpack => "msgpack",
        }
    }

    /// Serializer id used in the RawSocket handshake.
    #[must_use]
    pub const fn rawsocket_id(self) -> u8 {
        match self {
            Self::Json => 1,
            Self::Msgpack => 2,
        }
    }

    /// Inverse of [`Serializer::rawsocket_id`].
    #[must_use]
    pub const fn from_rawsocket_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Self::Json),
            2 => Some(Self::Msgpack),
            _ => None,
        }
    }

    /// WebSocket subprotocol announcing this serializer.
    #[must_use]
    pub const fn subprotocol(self) -> &'static str {
        match self {
            Self::Json => "wamp.2.json",
            Self::Msgpack => "wamp.2.msgpack",
        }
    }

    /// Inverse of [`Serializer::subprotocol`].
    #[must_use]
    pub fn from_subprotocol(protocol: &str) -> Option<Self> {
        match protocol.trim() {
            "wamp.2.json" => Some(Self::Json),
            "wamp.2.msgpack" => Some(Self::Msgpack),
            _ => None,
        }
    }

    /// Encode a message.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Json`] or [`NetError::Encode`] if serialisation fails.
    pub fn encode(self, message: &Value) -> Result<Vec<u8>, NetError> {
        match self {
            Self::Json => Ok(serde_json::to_vec(message)?),
            Self::Msgpack => encode(message),
        }
    }

    /// Decode a message.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Json`] or [`NetError::Decode`] if the payload is not
    /// a valid message for this serializer.
    pub fn decode(self, payload: &[u8]) -> Result<Value, NetError> {
        match self {
            Self::Json => Ok(serde_json::from_slice(payload)?),
            Self::Msgpack => decode(payload),
        }
    }
}

/// Encode a value to MessagePack bytes.
///
/// # Errors
///
/// Returns [`NetError::Encode`] if serialisation fails.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, NetError> {
    rmp_serde::to_vec(value).map_err(NetError::Encode)
}

/// Decode a value from MessagePack bytes.
///
/// # Errors
///
/// Returns [`NetError::Decode`] if deserialisation fails.
pub fn decode<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T, NetError> {
    rmp_serde::from_slice(bytes).map_err(NetError::Decode)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_msgpack_hello_roundtrip() {
        let hello = json!([1, "realm1", {"roles": {"caller": {}}}]);
        let bytes = Serializer::Msgpack.encode(&hello).unwrap();
        assert_eq!(Serializer::Msgpack.decode(&bytes).unwrap(), hello);
    }

    #[test]
    fn test_json_is_plain_text() {
        let bytes = Serializer::Json.encode(&json!([2, 42, {}])).unwrap();
        assert_eq!(bytes, b"[2,42,{}]");
    }

    #[test]
    fn test_decode_invalid_bytes() {
        assert!(Serializer::Msgpack.decode(&[0xC1]).is_err());
        assert!(Serializer::Json.decode(b"[1,").is_err());
    }

    #[test]
    fn test_negotiation_identifiers() {
        for serializer in [Serializer::Json, Serializer::Msgpack] {
            assert_eq!(
                Serializer::from_rawsocket_id(serializer.rawsocket_id()),
                Some(serializer)
            );
            assert_eq!(
                Serializer::from_subprotocol(serializer.subprotocol()),
                Some(serializer)
            );
        }
        assert_eq!(Serializer::from_rawsocket_id(0), None);
        assert_eq!(Serializer::from_subprotocol("wamp.2.cbor"), None);
    }
}
