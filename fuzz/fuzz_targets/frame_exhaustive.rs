//! Exhaustive positive space fuzzer for Frame encoding/decoding
//!
//! Unlike random fuzzing (envelope_decode.rs), this fuzzer EXHAUSTIVELY tests
//! all combinations of:
//! - Both message kinds
//! - Edge-case values (0, 1, MAX) for the sender and sequence fields
//! - Empty and small payloads
//!
//! This ensures we don't miss bugs that occur only with specific kind+value
//! combinations that random sampling might not hit.

#![no_main]

use kasami_proto::{Frame, FrameHeader, MessageKind};
use libfuzzer_sys::fuzz_target;

const ALL_KINDS: &[MessageKind] = &[MessageKind::Request, MessageKind::Token];

// Edge-case values for the 32-bit sender field
const SENDERS: &[u32] = &[0, 1, 7, 0x1000, u32::MAX / 2, u32::MAX - 1, u32::MAX];

// Payload sizes to test
const PAYLOAD_SIZES: &[usize] = &[
    0,    // Empty
    1,    // Single byte
    15,   // Just under header size
    16,   // Exactly header size
    255,  // One byte
    256,  // Two bytes
    1024, // 1KB
];

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    let kind = ALL_KINDS[data[0] as usize % ALL_KINDS.len()];
    let sender = SENDERS[data[1] as usize % SENDERS.len()];

    for &payload_size in PAYLOAD_SIZES {
        let payload = if payload_size <= data.len() - 2 {
            data[2..2 + payload_size].to_vec()
        } else {
            vec![0u8; payload_size]
        };

        let header = FrameHeader::new(kind, sender);
        let frame = Frame::new(header, payload.clone());

        // INVARIANT 1: Encoding must succeed
        let mut buf = Vec::new();
        frame.encode(&mut buf).expect("encode should never fail for valid frame");

        // INVARIANT 2: Decoding must succeed
        let decoded = Frame::decode(&buf).expect("decode should succeed for valid encoding");

        // INVARIANT 3: Round-trip must be identity
        assert_eq!(decoded.header.kind_enum(), Some(kind), "Kind mismatch for {:?}", kind);
        assert_eq!(decoded.header.sender(), sender, "Sender mismatch for sender={}", sender);
        assert_eq!(decoded.payload.as_ref(), payload.as_slice(), "Payload mismatch");

        // INVARIANT 4: Encoded size must be correct
        let expected_size = FrameHeader::SIZE + payload.len();
        assert_eq!(
            buf.len(),
            expected_size,
            "Encoded size incorrect: expected {}, got {}",
            expected_size,
            buf.len()
        );
        assert_eq!(frame.encoded_len(), expected_size);
    }
});
