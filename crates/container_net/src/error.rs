//! Network-layer error types.

use std::time::Duration;

use tokio_tungstenite::tungstenite;

/// Errors from encoding, decoding and framing.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// Failed to encode a message to MessagePack.
    #[error("failed to encode message: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// Failed to decode a message from MessagePack.
    #[error("failed to decode message: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Reading or writing the underlying stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A frame exceeded the negotiated maximum length.
    #[error("frame of {len} bytes exceeds limit of {max} bytes")]
    FrameTooLarge {
        /// Length announced or attempted.
        len: usize,
        /// The negotiated limit.
        max: usize,
    },

    /// A RawSocket frame header carried an unknown frame type or reserved bits.
    #[error("invalid frame header byte {0:#04x}")]
    InvalidFrameHeader(u8),

    /// A frame type that does not match the negotiated serializer.
    #[error("unexpected {0} frame for the negotiated serializer")]
    UnexpectedFrame(&'static str),
}

/// Why a connection attempt failed. These are transient and retried.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// Connect plus transport handshake did not finish in time.
    #[error("connection timed out after {0:?}")]
    Timeout(Duration),

    /// The endpoint refused or reset the connection.
    #[error("connection failed: {0}")]
    Io(#[from] std::io::Error),

    /// The router rejected or botched the transport handshake.
    #[error("transport handshake failed: {0}")]
    Handshake(String),

    /// The WebSocket opening handshake failed.
    #[error("WebSocket error: {0}")]
    WebSocket(#[source] Box<tungstenite::Error>),

    /// The endpoint kind cannot be used on this platform.
    #[error("unsupported endpoint: {0}")]
    UnsupportedEndpoint(String),
}

impl From<tungstenite::Error> for ConnectError {
    fn from(err: tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_error_display() {
        let err = ConnectError::Io(std::io::Error::from(std::io::ErrorKind::ConnectionRefused));
        assert!(err.to_string().starts_with("connection failed"));

        let err = ConnectError::Timeout(Duration::from_secs(10));
        assert_eq!(err.to_string(), "connection timed out after 10s");
    }

    #[test]
    fn test_frame_too_large_display() {
        let err = NetError::FrameTooLarge { len: 1024, max: 512 };
        assert_eq!(
            err.to_string(),
            "frame of 1024 bytes exceeds limit of 512 bytes"
        );
    }
}
