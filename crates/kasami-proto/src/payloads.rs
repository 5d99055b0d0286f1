//! CBOR-encoded frame payloads.
//!
//! Each [`MessageKind`] has exactly one payload type. The [`Payload`] enum
//! provides type-safe payload handling with CBOR serialization.
//!
//! Payloads carry raw integers. Whether a process id is in range or a grant
//! vector has the right length depends on the size of the system, which only
//! `kasami-core` knows; it validates when converting into domain types.

use bytes::BufMut;
use serde::{Deserialize, Serialize};

use crate::{
    Frame, FrameHeader, MessageKind,
    errors::{ProtocolError, Result},
};

/// Request broadcast: process `sender` reached request number `seq`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestPayload {
    /// Requesting process id
    pub sender: u32,
    /// Sequence number of the request (the sender's own request counter)
    pub seq: u64,
}

/// Token transfer: the token's full state moves with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPayload {
    /// Last granted request number per process
    pub grants: Vec<u64>,
    /// Processes awaiting a grant, head first
    pub pending: Vec<u32>,
}

/// All possible frame payloads
///
/// The payload type is determined by the kind byte in the frame header, so
/// only the inner struct is serialized (no variant tag in CBOR).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Request broadcast
    Request(RequestPayload),
    /// Token transfer
    Token(TokenPayload),
}

impl Payload {
    /// Get the message kind for this payload variant
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        match self {
            Self::Request(_) => MessageKind::Request,
            Self::Token(_) => MessageKind::Token,
        }
    }

    /// Encode payload to buffer
    ///
    /// Serializes only the inner struct, NOT the variant tag.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::CborEncode`] if serialization fails.
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        let mut writer = dst.writer();

        match self {
            Self::Request(inner) => ciborium::ser::into_writer(inner, &mut writer),
            Self::Token(inner) => ciborium::ser::into_writer(inner, &mut writer),
        }
        .map_err(|e| ProtocolError::CborEncode(e.to_string()))
    }

    /// Decode payload from bytes based on message kind
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - `bytes.len() > MAX_PAYLOAD_SIZE`
    /// - CBOR deserialization fails (including negative integers where the
    ///   schema expects unsigned ones)
    pub fn decode(kind: MessageKind, bytes: &[u8]) -> Result<Self> {
        if bytes.len() > FrameHeader::MAX_PAYLOAD_SIZE as usize {
            return Err(ProtocolError::PayloadTooLarge {
                size: bytes.len(),
                max: FrameHeader::MAX_PAYLOAD_SIZE as usize,
            });
        }

        let payload = match kind {
            MessageKind::Request => Self::Request(
                ciborium::de::from_reader(bytes)
                    .map_err(|e| ProtocolError::CborDecode(e.to_string()))?,
            ),
            MessageKind::Token => Self::Token(
                ciborium::de::from_reader(bytes)
                    .map_err(|e| ProtocolError::CborDecode(e.to_string()))?,
            ),
        };

        Ok(payload)
    }

    /// Convert payload into a transport frame sent by `sender`
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::CborEncode` if serialization fails
    pub fn into_frame(self, sender: u32) -> Result<Frame> {
        let mut buf = Vec::new();
        self.encode(&mut buf)?;
        Ok(Frame::new(FrameHeader::new(self.kind(), sender), buf))
    }

    /// Parse payload from a raw transport frame
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Kind byte is invalid
    /// - Header payload size disagrees with the payload bytes
    /// - CBOR deserialization fails
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        let kind = frame
            .header
            .kind_enum()
            .ok_or(ProtocolError::InvalidKind(frame.header.kind()))?;

        if frame.header.payload_size() as usize != frame.payload.len() {
            return Err(ProtocolError::PayloadSizeMismatch {
                header: frame.header.payload_size() as usize,
                actual: frame.payload.len(),
            });
        }

        Self::decode(kind, &frame.payload)
    }
}
