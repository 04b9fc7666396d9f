//! Fuzz target for PluginCache::decode.
//!
//! Run with: cargo +nightly fuzz run plugin_cache_decode

#![no_main]

use jarwright::PluginCache;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(cache) = PluginCache::decode(data) {
        let bytes = cache.encode().expect("decoded cache re-encodes");
        let again = PluginCache::decode(&bytes).expect("encoded cache decodes");
        assert_eq!(again, cache);
    }
});
