//! WAMP RawSocket framing.
//!
//! The client opens with a 4-byte handshake:
//!
//! ```text
//! 0x7F | LLLL SSSS | 0x00 | 0x00
//! ```
//!
//! where `LLLL` is the length exponent (maximum message length
//! `2^(9 + LLLL)`) and `SSSS` the serializer id. The router echoes the
//! serializer with its own limit, or replies with `SSSS = 0` and an error
//! code in `LLLL`.
//!
//! Every frame then carries a 4-byte header: the low three bits of the first
//! octet select the frame type (message, ping, pong), the remaining three
//! octets hold the big-endian payload length.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;
use uuid::Uuid;

use container_component::{CloseReason, Outbox, Session, SessionDetails, SessionFactory};

use crate::codec::Serializer;
use crate::connector::ConnectedSession;
use crate::error::{ConnectError, NetError};
use crate::transport::RawSocketSpec;

/// First octet of every handshake.
pub const MAGIC: u8 = 0x7F;

/// Largest length exponent (16 MiB).
const MAX_LENGTH_EXPONENT: u8 = 15;

/// RawSocket frame types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// A serialized session message.
    Message = 0,
    /// Keep-alive request; answered with a pong echoing the payload.
    Ping = 1,
    /// Keep-alive answer.
    Pong = 2,
}

/// A decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// What the frame carries.
    pub kind: FrameKind,
    /// Payload length in bytes.
    pub len: usize,
}

impl FrameHeader {
    /// Largest payload a 24-bit length can describe.
    pub const MAX_LEN: usize = 0x00FF_FFFF;

    /// Encode to the 4-byte wire header.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::FrameTooLarge`] if `len` does not fit in 24 bits.
    pub fn encode(self) -> Result<[u8; 4], NetError> {
        if self.len > Self::MAX_LEN {
            return Err(NetError::FrameTooLarge {
                len: self.len,
                max: Self::MAX_LEN,
            });
        }
        let len = self.len as u32;
        Ok([
            self.kind as u8,
            (len >> 16) as u8,
            (len >> 8) as u8,
            len as u8,
        ])
    }

    /// Decode a 4-byte wire header.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::InvalidFrameHeader`] for reserved bits or an
    /// unknown frame type.
    pub fn decode(bytes: [u8; 4]) -> Result<Self, NetError> {
        let kind = match bytes[0] {
            0 => FrameKind::Message,
            1 => FrameKind::Ping,
            2 => FrameKind::Pong,
            other => return Err(NetError::InvalidFrameHeader(other)),
        };
        let len = (usize::from(bytes[1]) << 16) | (usize::from(bytes[2]) << 8) | usize::from(bytes[3]);
        Ok(Self { kind, len })
    }
}

/// Smallest length exponent whose limit covers `max_message_size`.
#[must_use]
pub fn length_exponent(max_message_size: u32) -> u8 {
    (0..MAX_LENGTH_EXPONENT)
        .find(|exp| max_length(*exp) >= max_message_size as usize)
        .unwrap_or(MAX_LENGTH_EXPONENT)
}

/// Message length limit described by a length exponent.
#[must_use]
pub const fn max_length(exponent: u8) -> usize {
    1 << (9 + exponent as usize)
}

/// The client's opening handshake.
#[must_use]
pub fn handshake_request(serializer: Serializer, max_message_size: u32) -> [u8; 4] {
    let exponent = length_exponent(max_message_size);
    [MAGIC, (exponent << 4) | serializer.rawsocket_id(), 0, 0]
}

/// Check the router's handshake reply and return the router's message limit.
///
/// # Errors
///
/// Returns [`ConnectError::Handshake`] when the reply is malformed, carries a
/// router error code, or selects a different serializer.
pub fn parse_handshake_reply(reply: [u8; 4], requested: Serializer) -> Result<usize, ConnectError> {
    if reply[0] != MAGIC {
        return Err(ConnectError::Handshake(format!(
            "invalid magic byte {:#04x}",
            reply[0]
        )));
    }
    if reply[2] != 0 || reply[3] != 0 {
        return Err(ConnectError::Handshake("reserved octets must be zero".to_string()));
    }

    let serializer = reply[1] & 0x0F;
    let upper = reply[1] >> 4;
    if serializer == 0 {
        let reason = match upper {
            0 => "illegal (must not be used)",
            1 => "serializer unsupported",
            2 => "maximum message length unacceptable",
            3 => "use of reserved bits (unsupported feature)",
            4 => "maximum connection count reached",
            _ => "unknown error",
        };
        return Err(ConnectError::Handshake(format!("router refused: {reason}")));
    }
    if serializer != requested.rawsocket_id() {
        return Err(ConnectError::Handshake(format!(
            "router selected serializer {serializer}, requested {}",
            requested.rawsocket_id()
        )));
    }
    Ok(max_length(upper))
}

/// A full frame.
#[derive(Debug)]
struct Frame {
    kind: FrameKind,
    payload: Vec<u8>,
}

/// Read one frame. `Ok(None)` means the peer closed the stream between frames.
async fn read_frame<R>(reader: &mut R, max_len: usize) -> Result<Option<Frame>, NetError>
where
    R: AsyncRead + Unpin,
{
    // Only EOF before the first header octet is a clean close.
    let mut header = [0u8; 4];
    header[0] = match reader.read_u8().await {
        Ok(byte) => byte,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    reader.read_exact(&mut header[1..]).await?;
    let header = FrameHeader::decode(header)?;
    if header.len > max_len {
        return Err(NetError::FrameTooLarge {
            len: header.len,
            max: max_len,
        });
    }
    let mut payload = vec![0u8; header.len];
    reader.read_exact(&mut payload).await?;
    Ok(Some(Frame {
        kind: header.kind,
        payload,
    }))
}

async fn write_frame<W>(writer: &mut W, kind: FrameKind, payload: &[u8]) -> Result<(), NetError>
where
    W: AsyncWrite + Unpin,
{
    let header = FrameHeader {
        kind,
        len: payload.len(),
    }
    .encode()?;
    writer.write_all(&header).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Perform the client handshake on `stream`, open a session and spawn its driver.
///
/// # Errors
///
/// Returns [`ConnectError`] if the handshake fails; no session is created
/// in that case.
pub async fn start<S>(
    mut stream: S,
    peer: String,
    spec: &RawSocketSpec,
    sessions: &SessionFactory,
) -> Result<ConnectedSession, ConnectError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let request = handshake_request(spec.serializer, spec.max_message_size);
    stream.write_all(&request).await?;
    stream.flush().await?;

    let mut reply = [0u8; 4];
    stream.read_exact(&mut reply).await?;
    let send_limit = parse_handshake_reply(reply, spec.serializer)?;
    let recv_limit = max_length(length_exponent(spec.max_message_size));

    let details = SessionDetails {
        session_id: Uuid::new_v4(),
        transport: "rawsocket",
        serializer: spec.serializer.name(),
        peer,
    };
    if spec.debug {
        debug!(
            session_id = %details.session_id,
            peer = details.peer,
            serializer = details.serializer,
            send_limit,
            recv_limit,
            "rawsocket handshake complete"
        );
    }

    let mut session = sessions.create();
    let (outbox, outbox_rx) = Outbox::channel();
    session.on_open(&details, outbox);

    let (close_tx, close_rx) = oneshot::channel();
    let driver = Driver {
        session,
        serializer: spec.serializer,
        send_limit,
        recv_limit,
        debug: spec.debug,
    };
    let task = tokio::spawn(driver.run(stream, outbox_rx, close_rx));
    Ok(ConnectedSession::new(details, close_tx, task))
}

struct Driver {
    session: Box<dyn Session>,
    serializer: Serializer,
    send_limit: usize,
    recv_limit: usize,
    debug: bool,
}

impl Driver {
    async fn run<S>(
        mut self,
        stream: S,
        mut outbox_rx: mpsc::UnboundedReceiver<serde_json::Value>,
        mut close_rx: oneshot::Receiver<()>,
    ) where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (mut reader, mut writer) = tokio::io::split(stream);

        // Reads run in their own task so a partially read frame is never
        // dropped by the select below.
        let (frame_tx, mut frame_rx) = mpsc::channel(16);
        let recv_limit = self.recv_limit;
        let reader_task = tokio::spawn(async move {
            loop {
                let frame = read_frame(&mut reader, recv_limit).await;
                let last = !matches!(frame, Ok(Some(_)));
                if frame_tx.send(frame).await.is_err() || last {
                    break;
                }
            }
        });

        let mut close_armed = true;
        let reason = loop {
            tokio::select! {
                closed = &mut close_rx, if close_armed => match closed {
                    Ok(()) => {
                        let _ = writer.shutdown().await;
                        break CloseReason::Clean;
                    }
                    // Handle dropped: keep running detached.
                    Err(_) => close_armed = false,
                },
                frame = frame_rx.recv() => match frame {
                    Some(Ok(Some(frame))) => {
                        if let Err(e) = self.handle_frame(frame, &mut writer).await {
                            break CloseReason::Error(e.to_string());
                        }
                    }
                    Some(Ok(None)) | None => break CloseReason::Clean,
                    Some(Err(e)) => break CloseReason::Error(e.to_string()),
                },
                Some(message) = outbox_rx.recv() => {
                    if let Err(e) = self.send(&message, &mut writer).await {
                        break CloseReason::Error(e.to_string());
                    }
                }
            }
        };

        reader_task.abort();
        if self.debug {
            debug!(?reason, "rawsocket transport closed");
        }
        self.session.on_close(&reason);
    }

    async fn handle_frame<W>(&mut self, frame: Frame, writer: &mut W) -> Result<(), NetError>
    where
        W: AsyncWrite + Unpin,
    {
        match frame.kind {
            FrameKind::Message => {
                let message = self.serializer.decode(&frame.payload)?;
                self.session.on_message(message);
            }
            FrameKind::Ping => write_frame(writer, FrameKind::Pong, &frame.payload).await?,
            FrameKind::Pong => {}
        }
        Ok(())
    }

    async fn send<W>(&mut self, message: &serde_json::Value, writer: &mut W) -> Result<(), NetError>
    where
        W: AsyncWrite + Unpin,
    {
        let payload = self.serializer.encode(message)?;
        if payload.len() > self.send_limit {
            return Err(NetError::FrameTooLarge {
                len: payload.len(),
                max: self.send_limit,
            });
        }
        write_frame(writer, FrameKind::Message, &payload).await
    }
}
