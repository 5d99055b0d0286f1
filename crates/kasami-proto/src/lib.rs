//! # Kasami Protocol: Wire Format
//!
//! This crate implements the framing layer used to carry Suzuki–Kasami
//! protocol messages between peer processes.
//!
//! ## Protocol Design
//!
//! Every message travels as a frame:
//! - **FrameHeader**: 16 bytes of raw binary (Big Endian) identifying the
//!   message kind, the sending process and the payload length
//! - **Payload**: Variable-length CBOR-encoded structured data
//!
//! There are exactly two message kinds: a request broadcast
//! ([`RequestPayload`]) and a token transfer ([`TokenPayload`]).
//!
//! ## Implementation Notes
//!
//! - **Zero-Copy Parsing**: [`FrameHeader`] is cast directly from network
//!   bytes with [`zerocopy`](https://docs.rs/zerocopy); no header field is
//!   deserialized before the receiver knows how many payload bytes to read.
//!
//! - **CBOR for Payloads**: Payloads use CBOR so the token's vectors keep
//!   their structure on the wire without a hand-written codec.
//!
//! - **Explicit Validation**: Parsing functions validate magic, version,
//!   kind and size limits and return `Result` types. Semantic validation
//!   (process ids in range, token shape) is the job of `kasami-core`, which
//!   knows the number of participating processes.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod errors;
pub mod frame;
pub mod header;
pub mod kind;
pub mod payloads;

pub use errors::{ProtocolError, Result};
pub use frame::Frame;
pub use header::FrameHeader;
pub use kind::MessageKind;
pub use payloads::{Payload, RequestPayload, TokenPayload};
