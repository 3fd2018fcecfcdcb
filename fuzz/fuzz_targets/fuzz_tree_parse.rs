#![no_main]
use byteboard::tree::ByteTree;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Parsing must never panic, and an accepted input must re-encode to
    // itself (the encoding is deterministic and trailing bytes are
    // rejected).
    if let Ok(tree) = ByteTree::parse(data) {
        assert_eq!(tree.to_vec(), data);
    }
});
