//! Fuzz target for ClassRecord::decode with arbitrary byte input.
//!
//! Run with: cargo +nightly fuzz run class_decode

#![no_main]

use jarwright::classfile::ClassRecord;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(class) = ClassRecord::decode(data) else {
        return;
    };
    let _ = class.string_literals();

    // a decoded class must encode back to something that decodes again
    if let Ok(bytes) = class.encode() {
        let _ = ClassRecord::decode(&bytes);
    }
});
