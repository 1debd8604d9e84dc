use macaroon::verifier::AcceptAllVerifier;
use macaroon::{Macaroon, Version, LATEST_VERSION};
use proptest::prelude::*;

// Configuration for crypto library: run many more cases than default (100)
// For security-critical code, we want extensive coverage
fn proptest_config() -> ProptestConfig {
    ProptestConfig {
        cases: 10000,
        ..ProptestConfig::default()
    }
}

/// Property: Minting with the same inputs should always produce the same signature
#[test]
fn prop_mint_deterministic() {
    let config = proptest_config();
    proptest!(config, |(
        root_key in prop::collection::vec(any::<u8>(), 1..128),
        id in prop::collection::vec(any::<u8>(), 1..128),
        location in "[ -~]{0,32}"
    )| {
        let m1 = Macaroon::new(&root_key, id.clone(), location.clone(), LATEST_VERSION).unwrap();
        let m2 = Macaroon::new(&root_key, id.clone(), location.clone(), LATEST_VERSION).unwrap();

        prop_assert_eq!(m1.signature(), m2.signature());
        prop_assert_eq!(m1, m2);
    });
}

/// Property: Adding the same caveats in the same order should produce the same signature
#[test]
fn prop_caveat_chain_deterministic() {
    let config = proptest_config();
    proptest!(config, |(
        root_key in prop::collection::vec(any::<u8>(), 1..128),
        id in prop::collection::vec(any::<u8>(), 1..128),
        conditions in prop::collection::vec("[ -~]{1,64}", 0..10)
    )| {
        let mut m1 = Macaroon::new(&root_key, id.clone(), "", LATEST_VERSION).unwrap();
        let mut m2 = Macaroon::new(&root_key, id.clone(), "", LATEST_VERSION).unwrap();

        for condition in &conditions {
            m1.add_first_party_caveat(condition.clone()).unwrap();
            m2.add_first_party_caveat(condition.clone()).unwrap();
        }

        prop_assert_eq!(m1.signature(), m2.signature());
        prop_assert_eq!(m1.caveat_count(), m2.caveat_count());
    });
}

/// Property: Adding caveats in different orders should produce different signatures
#[test]
fn prop_caveat_order_matters() {
    let config = proptest_config();
    proptest!(config, |(
        root_key in prop::collection::vec(any::<u8>(), 1..128),
        id in prop::collection::vec(any::<u8>(), 1..128),
        condition1 in "[ -~]{1,64}",
        condition2 in "[ -~]{1,64}"
    )| {
        prop_assume!(condition1 != condition2);

        let mut m1 = Macaroon::new(&root_key, id.clone(), "", LATEST_VERSION).unwrap();
        m1.add_first_party_caveat(condition1.clone()).unwrap();
        m1.add_first_party_caveat(condition2.clone()).unwrap();

        let mut m2 = Macaroon::new(&root_key, id.clone(), "", LATEST_VERSION).unwrap();
        m2.add_first_party_caveat(condition2).unwrap();
        m2.add_first_party_caveat(condition1).unwrap();

        prop_assert_ne!(m1.signature(), m2.signature());
    });
}

/// Property: A macaroon carrying only first-party caveats always verifies
/// against its root key with a verifier that accepts everything
#[test]
fn prop_first_party_only_always_verifies() {
    let config = proptest_config();
    proptest!(config, |(
        root_key in prop::collection::vec(any::<u8>(), 1..128),
        id in prop::collection::vec(any::<u8>(), 1..128),
        conditions in prop::collection::vec("[ -~]{1,64}", 0..10)
    )| {
        let mut m = Macaroon::new(&root_key, id, "", LATEST_VERSION).unwrap();
        for condition in conditions {
            m.add_first_party_caveat(condition).unwrap();
        }

        prop_assert!(m.verify(&root_key, &AcceptAllVerifier, &[]).is_ok());
    });
}

/// Property: Verification should fail with a different root key
#[test]
fn prop_wrong_key_fails() {
    let config = proptest_config();
    proptest!(config, |(
        root_key in prop::collection::vec(any::<u8>(), 1..128),
        wrong_key in prop::collection::vec(any::<u8>(), 1..128),
        id in prop::collection::vec(any::<u8>(), 1..128)
    )| {
        prop_assume!(root_key != wrong_key);

        let m = Macaroon::new(&root_key, id, "", LATEST_VERSION).unwrap();
        prop_assert!(m.verify(&wrong_key, &AcceptAllVerifier, &[]).is_err());
    });
}

/// Property: A cloned macaroon verifies identically to the original
#[test]
fn prop_clone_verifies_identically() {
    let config = proptest_config();
    proptest!(config, |(
        root_key in prop::collection::vec(any::<u8>(), 1..128),
        presented_key in prop::collection::vec(any::<u8>(), 1..128),
        id in prop::collection::vec(any::<u8>(), 1..128),
        conditions in prop::collection::vec("[ -~]{1,64}", 0..6)
    )| {
        let mut m = Macaroon::new(&root_key, id, "", LATEST_VERSION).unwrap();
        for condition in conditions {
            m.add_first_party_caveat(condition).unwrap();
        }

        let original = m.verify(&presented_key, &AcceptAllVerifier, &[]);
        let cloned = m.clone().verify(&presented_key, &AcceptAllVerifier, &[]);
        prop_assert_eq!(original, cloned);
    });
}

/// Property: The v2 binary form round-trips any macaroon exactly
#[test]
fn prop_binary_roundtrip_v2() {
    let config = proptest_config();
    proptest!(config, |(
        root_key in prop::collection::vec(any::<u8>(), 1..64),
        id in prop::collection::vec(any::<u8>(), 1..64),
        location in "[ -~]{0,32}",
        conditions in prop::collection::vec("[ -~]{1,32}", 0..6),
        third_party in prop::option::of(("[ -~]{1,32}", prop::collection::vec(any::<u8>(), 1..32)))
    )| {
        let mut m = Macaroon::new(&root_key, id, location, Version::V2).unwrap();
        for condition in conditions {
            m.add_first_party_caveat(condition).unwrap();
        }
        if let Some((caveat_id, caveat_key)) = third_party {
            m.add_third_party_caveat(&caveat_key, caveat_id, "remote.example").unwrap();
        }

        let data = m.to_binary().unwrap();
        let decoded = Macaroon::from_binary(&data).unwrap();
        prop_assert_eq!(&m, &decoded);
        prop_assert_eq!(decoded.to_binary().unwrap(), data);
    });
}

/// Property: The v1 binary form round-trips any macaroon with text fields
#[test]
fn prop_binary_roundtrip_v1() {
    let config = proptest_config();
    proptest!(config, |(
        root_key in prop::collection::vec(any::<u8>(), 1..64),
        id in "[ -~]{1,64}",
        location in "[ -~]{0,32}",
        conditions in prop::collection::vec("[ -~]{1,32}", 0..6)
    )| {
        let mut m = Macaroon::new(&root_key, id, location, Version::V1).unwrap();
        for condition in conditions {
            m.add_first_party_caveat(condition).unwrap();
        }

        let data = m.to_binary().unwrap();
        let decoded = Macaroon::from_binary(&data).unwrap();
        prop_assert_eq!(decoded.version(), Version::V1);
        prop_assert_eq!(m, decoded);
    });
}

/// Property: The JSON form round-trips any macaroon, preserving its version
#[test]
fn prop_json_roundtrip() {
    let config = proptest_config();
    proptest!(config, |(
        root_key in prop::collection::vec(any::<u8>(), 1..64),
        id in prop::collection::vec(any::<u8>(), 1..64),
        location in "[ -~]{0,32}",
        conditions in prop::collection::vec("[ -~]{1,32}", 0..6),
        third_party in prop::option::of(("[ -~]{1,32}", prop::collection::vec(any::<u8>(), 1..32)))
    )| {
        let mut m = Macaroon::new(&root_key, id, location, Version::V2).unwrap();
        for condition in conditions {
            m.add_first_party_caveat(condition).unwrap();
        }
        if let Some((caveat_id, caveat_key)) = third_party {
            m.add_third_party_caveat(&caveat_key, caveat_id, "remote.example").unwrap();
        }

        let json = m.to_json().unwrap();
        let decoded = Macaroon::from_json(&json).unwrap();
        prop_assert_eq!(decoded.version(), Version::V2);
        prop_assert_eq!(&m, &decoded);

        // Marshaling the decoded macaroon again is idempotent
        prop_assert_eq!(decoded.to_json().unwrap(), json);
    });
}

/// Property: Flipping any bit of the signature is caught by verification
#[test]
fn prop_tampered_signature_fails() {
    let config = proptest_config();
    proptest!(config, |(
        root_key in prop::collection::vec(any::<u8>(), 1..64),
        id in prop::collection::vec(any::<u8>(), 1..64),
        conditions in prop::collection::vec("[ -~]{1,32}", 0..4),
        bit_position in 0usize..256
    )| {
        let mut m = Macaroon::new(&root_key, id, "", Version::V2).unwrap();
        for condition in conditions {
            m.add_first_party_caveat(condition).unwrap();
        }

        // The signature field sits at the tail of the v2 binary form
        let mut data = m.to_binary().unwrap();
        let sig_start = data.len() - 32;
        data[sig_start + bit_position / 8] ^= 1 << (bit_position % 8);

        let tampered = Macaroon::from_binary(&data).unwrap();
        prop_assert!(tampered.verify(&root_key, &AcceptAllVerifier, &[]).is_err());
    });
}
