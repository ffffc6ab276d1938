//! Fuzz target for ChannelEvent::decode
//!
//! Channel frames come straight off the socket, so decoding must survive any
//! text the server (or something pretending to be it) sends.
//!
//! # Invariants
//!
//! - NEVER panic on malformed frames
//! - A frame that decodes re-encodes, and the re-encoded frame decodes to the
//!   same event

#![no_main]

use agora_proto::ChannelEvent;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(event) = ChannelEvent::decode(text) {
        let encoded = event.encode().expect("decoded event must encode");
        let again = ChannelEvent::decode(&encoded).expect("encoded event must decode");
        assert_eq!(event, again);
    }
});
