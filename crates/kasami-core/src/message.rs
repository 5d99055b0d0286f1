//! Messages exchanged between processes.
//!
//! This is the boundary between the wire format (`kasami-proto`, raw
//! integers) and the domain types of the engine. Decoding validates
//! everything that depends on the system size, so a malformed frame fails
//! here instead of corrupting process state.

use kasami_proto::{Frame, Payload, ProtocolError, RequestPayload};
use thiserror::Error;

use crate::{error::ProcessError, token::Token, types::ProcessId};

/// Broadcast notification that `sender`'s request counter reached `seq`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestMessage {
    /// Requesting process
    pub sender: ProcessId,
    /// The sender's `RN[sender]` at the time of the request
    pub seq: u64,
}

/// A protocol message
#[derive(Debug, PartialEq, Eq)]
pub enum Message {
    /// Request broadcast
    Request(RequestMessage),
    /// Token transfer. Receiving this makes the recipient the holder.
    Token(Token),
}

/// A message together with the process that sent it, as carried by a
/// [`MessageBus`](crate::bus::MessageBus).
#[derive(Debug, PartialEq, Eq)]
pub struct Envelope {
    /// Sending process
    pub from: ProcessId,
    /// Message body
    pub message: Message,
}

/// Errors raised while turning frames into messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MessageError {
    /// The frame itself is malformed
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The frame is well-formed but does not fit this system
    #[error(transparent)]
    Process(#[from] ProcessError),

    /// A request frame claims a different origin than its header
    #[error("sender mismatch: header names process {header}, request names {payload}")]
    SenderMismatch {
        /// Sender from the frame header
        header: u32,
        /// Sender from the request payload
        payload: u32,
    },
}

impl Envelope {
    /// Request broadcast from `request.sender`
    #[must_use]
    pub fn request(request: RequestMessage) -> Self {
        Self { from: request.sender, message: Message::Request(request) }
    }

    /// Token transfer from `from`
    #[must_use]
    pub fn token(from: ProcessId, token: Token) -> Self {
        Self { from, message: Message::Token(token) }
    }

    /// Encode into a transport frame.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::Protocol`] if CBOR encoding fails.
    pub fn to_frame(&self) -> Result<Frame, MessageError> {
        let payload = match &self.message {
            Message::Request(request) => Payload::Request(RequestPayload {
                sender: request.sender.as_u32(),
                seq: request.seq,
            }),
            Message::Token(token) => Payload::Token(token.to_payload()),
        };

        Ok(payload.into_frame(self.from.as_u32())?)
    }

    /// Decode and validate a frame received in a system of `process_count`
    /// processes.
    ///
    /// # Errors
    ///
    /// - [`MessageError::Protocol`] if the payload cannot be decoded
    /// - [`MessageError::Process`] with [`ProcessError::UnknownProcess`] if
    ///   the sender is out of range, or [`ProcessError::MalformedToken`] if a
    ///   token does not fit the system
    /// - [`MessageError::SenderMismatch`] if a request names a different
    ///   sender than its header
    pub fn from_frame(frame: &Frame, process_count: usize) -> Result<Self, MessageError> {
        let raw_sender = frame.header.sender();
        let from = ProcessId::checked(raw_sender, process_count)
            .ok_or(ProcessError::UnknownProcess { process: raw_sender, count: process_count })?;

        let message = match Payload::from_frame(frame)? {
            Payload::Request(request) => {
                if request.sender != raw_sender {
                    return Err(MessageError::SenderMismatch {
                        header: raw_sender,
                        payload: request.sender,
                    });
                }
                Message::Request(RequestMessage { sender: from, seq: request.seq })
            },
            Payload::Token(payload) => Message::Token(Token::from_payload(payload, process_count)?),
        };

        Ok(Self { from, message })
    }
}

#[cfg(test)]
mod tests {
    use kasami_proto::{FrameHeader, MessageKind, TokenPayload};

    use super::*;

    #[test]
    fn request_round_trip() {
        let envelope = Envelope::request(RequestMessage { sender: ProcessId::new(2), seq: 5 });

        let frame = envelope.to_frame().expect("should encode");
        let decoded = Envelope::from_frame(&frame, 3).expect("should decode");

        assert_eq!(decoded, envelope);
    }

    #[test]
    fn token_round_trip() {
        let mut token = Token::new(3);
        token.admit_if_eligible(ProcessId::new(1), 1);
        let envelope = Envelope::token(ProcessId::new(0), token);

        let frame = envelope.to_frame().expect("should encode");
        let decoded = Envelope::from_frame(&frame, 3).expect("should decode");

        assert_eq!(decoded, envelope);
    }

    #[test]
    fn rejects_sender_out_of_range() {
        let frame = Payload::Request(RequestPayload { sender: 7, seq: 1 })
            .into_frame(7)
            .expect("should encode");

        let result = Envelope::from_frame(&frame, 3);
        assert_eq!(
            result,
            Err(MessageError::Process(ProcessError::UnknownProcess { process: 7, count: 3 }))
        );
    }

    #[test]
    fn rejects_forged_request_origin() {
        let payload = Payload::Request(RequestPayload { sender: 1, seq: 1 });
        let mut buf = Vec::new();
        payload.encode(&mut buf).expect("should encode");
        let frame = Frame::new(FrameHeader::new(MessageKind::Request, 2), buf);

        let result = Envelope::from_frame(&frame, 3);
        assert_eq!(result, Err(MessageError::SenderMismatch { header: 2, payload: 1 }));
    }

    #[test]
    fn rejects_token_for_other_system_size() {
        let frame = Payload::Token(TokenPayload { grants: vec![0; 4], pending: vec![] })
            .into_frame(0)
            .expect("should encode");

        let result = Envelope::from_frame(&frame, 3);
        assert!(matches!(result, Err(MessageError::Process(ProcessError::MalformedToken(_)))));
    }
}
