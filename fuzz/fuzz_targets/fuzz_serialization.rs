#![no_main]

use libfuzzer_sys::fuzz_target;
use macaroon::{Macaroon, Slice};

fuzz_target!(|data: &[u8]| {
    // Fuzz binary deserialization of both wire versions
    if let Ok(m) = Macaroon::from_binary(data) {
        // A decoded macaroon must re-encode, and the re-encoding must parse
        // back to the same value
        let encoded = m.to_binary().unwrap();
        let decoded = Macaroon::from_binary(&encoded).unwrap();
        assert_eq!(m, decoded);

        if let Ok(json) = m.to_json() {
            let _ = Macaroon::from_json(&json);
        }

        let _ = m.caveat_count();
        let _ = m.is_unrestricted();
    }

    // Bundles are a plain concatenation; parsing must never panic
    let _ = Slice::from_binary(data);

    // Fuzz the text decoders when the input is UTF-8
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(m) = Macaroon::from_json(s) {
            let _ = m.to_json();
            let _ = m.to_binary();
        }

        if let Ok(m) = Macaroon::from_base64(s) {
            let _ = m.to_base64();
        }
    }
});
