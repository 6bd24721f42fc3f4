//! Fuzz target: `classifier::classify`
//!
//! Drives arbitrary bytes through the inbound classifier and asserts it
//! never panics and that any known kind came from an exact tag.
//!
//! cargo fuzz run fuzz_classifier

#![no_main]

use feederlink::classifier::{EventKind, classify};
use feederlink::protocol::InboundPayload;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let event = classify(&InboundPayload::from(data.to_vec()));

    assert_eq!(event.kind, EventKind::from_tag(&event.tag));
    assert_eq!(event.raw, event.raw.trim(), "raw text must be trimmed");
    if event.malformed {
        assert_eq!(event.tag, event.raw, "malformed payloads fall back to raw text");
    }
});
