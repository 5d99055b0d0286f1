//! Frame header implementation with zero-copy parsing.
//!
//! The `FrameHeader` is a fixed 16-byte structure serialized as raw binary
//! (Big Endian). A receiver reads exactly one header, learns the payload
//! length and kind, then reads the payload.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{
    MessageKind,
    errors::{ProtocolError, Result},
};

/// Fixed 16-byte frame header (Big Endian network byte order)
///
/// Fields are stored as raw byte arrays to avoid alignment issues with
/// `#[repr(C, packed)]`.
///
/// ```text
/// 0       4   5    6        8        12             16
/// ┌───────┬───┬────┬────────┬────────┬──────────────┐
/// │ magic │ v │kind│reserved│ sender │ payload_size │
/// └───────┴───┴────┴────────┴────────┴──────────────┘
/// ```
///
/// # Security Properties
///
/// - **Zero-Copy Safety**: All 16-byte patterns are valid for the struct
///   layout, so casting untrusted bytes cannot cause undefined behavior.
///   Semantic checks happen in [`FrameHeader::from_bytes`].
///
/// - **No Authentication**: `sender` is self-reported. Authenticating
///   senders is outside the protocol's scope.
#[repr(C, packed)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct FrameHeader {
    magic: [u8; 4],                   // 0x534B544B ("SKTK" in ASCII)
    version: u8,                      // 0x01
    pub(crate) kind: u8,              // MessageKind
    reserved: [u8; 2],                // zero
    sender: [u8; 4],                  // u32 sending process id
    pub(crate) payload_size: [u8; 4], // u32 payload length
}

impl FrameHeader {
    /// Size of the serialized header (16 bytes)
    pub const SIZE: usize = 16;

    /// Magic number: "SKTK" in ASCII (0x534B544B)
    pub const MAGIC: u32 = 0x534B_544B;

    /// Current protocol version
    pub const VERSION: u8 = 0x01;

    /// Maximum payload size (1 MiB)
    ///
    /// A token payload is two vectors of length N; 1 MiB is far above
    /// anything a realistic process count needs.
    pub const MAX_PAYLOAD_SIZE: u32 = 1024 * 1024;

    /// Create a new header for a message of `kind` sent by `sender`.
    #[must_use]
    pub fn new(kind: MessageKind, sender: u32) -> Self {
        Self {
            magic: Self::MAGIC.to_be_bytes(),
            version: Self::VERSION,
            kind: kind.to_u8(),
            reserved: [0; 2],
            sender: sender.to_be_bytes(),
            payload_size: [0; 4],
        }
    }

    /// Parse header from network bytes (zero-copy, safe)
    ///
    /// Trailing bytes after the header are ignored.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if:
    /// - Buffer is too short (< 16 bytes)
    /// - Magic number is invalid
    /// - Protocol version is unsupported
    /// - Message kind is unknown
    /// - Payload size exceeds maximum
    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        let header = Self::ref_from_prefix(bytes)
            .map_err(|_| ProtocolError::FrameTooShort { expected: Self::SIZE, actual: bytes.len() })?
            .0;

        if u32::from_be_bytes(header.magic) != Self::MAGIC {
            return Err(ProtocolError::InvalidMagic);
        }

        if header.version != Self::VERSION {
            return Err(ProtocolError::UnsupportedVersion(header.version));
        }

        if MessageKind::from_u8(header.kind).is_none() {
            return Err(ProtocolError::InvalidKind(header.kind));
        }

        let payload_size = u32::from_be_bytes(header.payload_size);
        if payload_size > Self::MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload_size as usize,
                max: Self::MAX_PAYLOAD_SIZE as usize,
            });
        }

        Ok(header)
    }

    /// Serialize header to bytes
    #[must_use]
    #[allow(clippy::wrong_self_convention)]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let bytes = IntoBytes::as_bytes(self);
        let mut arr = [0u8; Self::SIZE];
        arr.copy_from_slice(bytes);
        arr
    }

    /// Get the magic number
    #[must_use]
    pub fn magic(&self) -> u32 {
        u32::from_be_bytes(self.magic)
    }

    /// Get the protocol version
    #[must_use]
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Get the raw kind byte
    #[must_use]
    pub fn kind(&self) -> u8 {
        self.kind
    }

    /// Get the kind as an enum (if valid)
    #[must_use]
    pub fn kind_enum(&self) -> Option<MessageKind> {
        MessageKind::from_u8(self.kind)
    }

    /// Get the sending process id
    #[must_use]
    pub fn sender(&self) -> u32 {
        u32::from_be_bytes(self.sender)
    }

    /// Get the payload size
    #[must_use]
    pub fn payload_size(&self) -> u32 {
        u32::from_be_bytes(self.payload_size)
    }
}

// Manual Debug implementation (can't derive due to packed repr)
impl std::fmt::Debug for FrameHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameHeader")
            .field("magic", &format!("{:#010x}", self.magic()))
            .field("version", &self.version())
            .field("kind", &format!("{:#04x}", self.kind()))
            .field("sender", &self.sender())
            .field("payload_size", &self.payload_size())
            .finish()
    }
}

// Manual PartialEq implementation (can't derive due to packed repr)
impl PartialEq for FrameHeader {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for FrameHeader {}
