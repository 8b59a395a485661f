#![no_main]

use blockwright::{BlockRegistry, DocumentPayload};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let input = String::from_utf8_lossy(data);
    if let Ok(payload) = DocumentPayload::from_json(&input) {
        let registry = BlockRegistry::default();
        let doc = registry.deserialize(&payload);
        let again = registry.deserialize(&registry.serialize(&doc));
        assert_eq!(again.len(), doc.len());
    }
});
