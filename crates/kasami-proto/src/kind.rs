//! Message kinds carried in the frame header.
//!
//! The protocol has two messages: the request broadcast a process sends when
//! it wants the critical section, and the token transfer sent by the current
//! holder to the next grantee.

/// Frame message kind
///
/// Serialized as a single byte in the frame header. The kind determines how
/// the payload is decoded.
///
/// # Security
///
/// Unknown kind bytes are rejected by [`MessageKind::from_u8`] returning
/// `None`; the frame parser turns this into
/// [`ProtocolError::InvalidKind`](crate::ProtocolError::InvalidKind).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageKind {
    /// Request broadcast: `(sender, sequence number)`
    Request = 0x01,
    /// Token transfer: grant vector and pending queue
    Token = 0x02,
}

impl MessageKind {
    /// Convert to raw byte value
    #[must_use]
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    /// Convert from raw byte value
    ///
    /// Returns `None` if the value doesn't correspond to a known kind.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::Request),
            0x02 => Some(Self::Token),
            _ => None,
        }
    }
}
