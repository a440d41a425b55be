//! Frame layer of the protocol
//!
//! ```text
//! ┌───────┬──────┬────────────────────┬─────────────┐
//! │ magic │ type │ total length (BE)  │ payload     │
//! │ 1     │ 1    │ 2                  │ length - 4  │
//! └───────┴──────┴────────────────────┴─────────────┘
//! ```
//!
//! A header that fails validation poisons the stream: there is no way to find
//! the next frame boundary, so callers must drop the connection. Payload-level
//! problems are reported separately as [`CodecError`] and only cost the one
//! message.

use bincode::Options;
use std::io;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{MessageType, MAGIC_BYTE};

pub const HEADER_LEN: usize = 4;
pub const MAX_FRAME_LEN: usize = u16::MAX as usize;

/// Stream-level failure. The connection it came from is unusable afterwards.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("invalid magic byte {0:#04x}")]
    BadMagic(u8),

    #[error("declared frame length {0} is shorter than the header")]
    BadLength(u16),

    #[error("connection closed by peer")]
    Closed,

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

/// Message-level failure. The frame boundary is intact, so the stream survives.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("unknown message type {0:#04x}")]
    UnknownType(u8),

    #[error("{kind} payload too short: need {need} bytes, have {have}")]
    Truncated {
        kind: MessageType,
        need: usize,
        have: usize,
    },

    #[error("invalid {0}")]
    InvalidField(&'static str),

    #[error("frame of {0} bytes exceeds the protocol limit")]
    TooLarge(usize),

    #[error("payload serialization failed: {0}")]
    Bincode(#[from] bincode::Error),
}

/// Serializer settings matching the wire: big-endian, fixed-width integers,
/// no length prefixes beyond what the payload structs declare.
pub(crate) fn wire() -> impl Options {
    bincode::DefaultOptions::new()
        .with_big_endian()
        .with_fixint_encoding()
        .allow_trailing_bytes()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub message_type: u8,
    /// Total frame length, header included.
    pub length: u16,
}

impl Header {
    pub fn parse(bytes: [u8; HEADER_LEN]) -> Result<Self, FrameError> {
        if bytes[0] != MAGIC_BYTE {
            return Err(FrameError::BadMagic(bytes[0]));
        }
        let length = u16::from_be_bytes([bytes[2], bytes[3]]);
        if usize::from(length) < HEADER_LEN {
            return Err(FrameError::BadLength(length));
        }
        Ok(Self {
            message_type: bytes[1],
            length,
        })
    }

    pub fn payload_len(&self) -> usize {
        usize::from(self.length) - HEADER_LEN
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let [hi, lo] = self.length.to_be_bytes();
        [MAGIC_BYTE, self.message_type, hi, lo]
    }
}

/// A complete frame whose type tag has not been interpreted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    message_type: u8,
    payload: Vec<u8>,
}

impl Frame {
    pub fn new(message_type: u8, payload: Vec<u8>) -> Result<Self, CodecError> {
        let total = HEADER_LEN + payload.len();
        if total > MAX_FRAME_LEN {
            return Err(CodecError::TooLarge(total));
        }
        Ok(Self {
            message_type,
            payload,
        })
    }

    pub fn message_type(&self) -> u8 {
        self.message_type
    }

    pub fn kind(&self) -> Result<MessageType, CodecError> {
        MessageType::try_from(self.message_type)
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Total length on the wire, header included.
    pub fn len(&self) -> usize {
        HEADER_LEN + self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn header(&self) -> Header {
        Header {
            message_type: self.message_type,
            // Bounded by the check in `new`
            length: self.len() as u16,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.len());
        bytes.extend_from_slice(&self.header().to_bytes());
        bytes.extend_from_slice(&self.payload);
        bytes
    }
}

fn stream_error(error: io::Error) -> FrameError {
    if error.kind() == io::ErrorKind::UnexpectedEof {
        FrameError::Closed
    } else {
        FrameError::Io(error)
    }
}

/// Reads exactly one frame, waiting for as many partial reads as it takes.
///
/// Returns [`FrameError::Closed`] when the peer goes away, including halfway
/// through a frame.
pub async fn read_frame<R>(reader: &mut R) -> Result<Frame, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    reader.read_exact(&mut header).await.map_err(stream_error)?;
    let header = Header::parse(header)?;

    let mut payload = vec![0u8; header.payload_len()];
    reader.read_exact(&mut payload).await.map_err(stream_error)?;

    Ok(Frame {
        message_type: header.message_type,
        payload,
    })
}

/// Writes an encoded frame in full.
pub async fn write_frame<W>(writer: &mut W, bytes: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(bytes).await?;
    writer.flush().await
}
