//! Random-input fuzzer for the receive path.
//!
//! Arbitrary bytes go through the same steps a node applies to inbound
//! data: frame decoding, then conversion into an envelope for a system of
//! 1 to 8 processes. Neither step may panic, and anything accepted must
//! satisfy the domain rules.

#![no_main]

use kasami_core::{Envelope, Message};
use kasami_proto::Frame;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&n, bytes)) = data.split_first() else {
        return;
    };
    let process_count = usize::from(n % 8) + 1;

    let Ok(frame) = Frame::decode(bytes) else {
        return;
    };
    let Ok(envelope) = Envelope::from_frame(&frame, process_count) else {
        return;
    };

    // INVARIANT 1: accepted senders are in range
    assert!(envelope.from.index() < process_count);

    match &envelope.message {
        // INVARIANT 2: a request always names its own sender
        Message::Request(request) => assert_eq!(request.sender, envelope.from),
        // INVARIANT 3: a token covers the whole system with a duplicate-free queue
        Message::Token(token) => {
            assert_eq!(token.grants().len(), process_count);
            let mut seen = vec![false; process_count];
            for id in token.pending() {
                assert!(!seen[id.index()], "{id} queued twice");
                seen[id.index()] = true;
            }
        },
    }

    // INVARIANT 4: re-encoding an accepted envelope succeeds
    envelope.to_frame().expect("accepted envelope must re-encode");
});
