#![no_main]
use byteboard::tree::validate::check_bytes;
use byteboard::tree::ByteTree;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // The bounded scan allocates nothing and must never panic. Anything it
    // accepts within the budget must also parse.
    if check_bytes(data, 16).is_ok() {
        assert!(ByteTree::parse(data).is_ok());
    }
});
