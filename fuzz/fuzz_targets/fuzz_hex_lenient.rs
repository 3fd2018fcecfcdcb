#![no_main]
use byteboard::codec::{from_hex, strip_comment, to_hex};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    // Lenient decoding accepts anything; round-tripping canonical output
    // must be exact.
    let bytes = from_hex(strip_comment(s));
    let canon = to_hex(&bytes);
    assert_eq!(from_hex(&canon), bytes);
});
