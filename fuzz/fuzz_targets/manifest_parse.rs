//! Fuzz target for Manifest::parse.

#![no_main]

use jarwright::manifest::Manifest;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(manifest) = Manifest::parse(data) {
        let _ = manifest.to_bytes();
    }
});
