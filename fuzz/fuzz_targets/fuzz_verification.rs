#![no_main]

use libfuzzer_sys::fuzz_target;
use macaroon::verifier::AcceptAllVerifier;
use macaroon::{Macaroon, LATEST_VERSION};

fuzz_target!(|data: &[u8]| {
    // Need at least some data to work with
    if data.len() < 10 {
        return;
    }

    // Split the data into root key and identifier
    let split_point = data.len() / 2;
    let root_key = &data[..split_point];
    let identifier = &data[split_point..];

    let mut m = Macaroon::new(root_key, identifier, "", LATEST_VERSION).unwrap();

    // Attenuate with chunks of the data; non-UTF-8 chunks are rejected
    let caveat_size = (data.len() / 4).max(1);
    for chunk in data.chunks(caveat_size) {
        let _ = m.add_first_party_caveat(chunk);
    }

    // Verification with the minting key must succeed
    m.verify(root_key, &AcceptAllVerifier, &[]).unwrap();

    // Verification with a corrupted key must fail
    if root_key.len() > 1 {
        let mut wrong_key = root_key.to_vec();
        wrong_key[0] ^= 0xff;
        assert!(m.verify(&wrong_key, &AcceptAllVerifier, &[]).is_err());
    }

    // Exercise the third-party flow with fuzz-derived keys and ids
    if data.len() > 20 {
        let split = data.len() / 3;
        let caveat_root_key = &data[..split];
        let caveat_id = &data[split..split * 2];

        m.add_third_party_caveat(caveat_root_key, caveat_id, "http://example.com")
            .unwrap();

        let discharge =
            Macaroon::new(caveat_root_key, caveat_id, "http://example.com", LATEST_VERSION)
                .unwrap();
        let bundle = m.prepare_for_request(&[discharge]);
        m.verify(root_key, &AcceptAllVerifier, bundle.discharges())
            .unwrap();

        // An unbound discharge must be rejected
        let unbound =
            Macaroon::new(caveat_root_key, caveat_id, "http://example.com", LATEST_VERSION)
                .unwrap();
        assert!(m.verify(root_key, &AcceptAllVerifier, &[unbound]).is_err());
    }
});
