use macaroon::verifier::FnVerifier;
use macaroon::{Macaroon, MacaroonError, Result, LATEST_VERSION};

fn main() -> Result<()> {
    println!("=== Third-Party Caveats and Discharge Macaroons ===\n");

    // Scenario: a service grants access, but requires proof of
    // authentication from a separate auth service.

    let root_key = b"service_root_secret";
    let auth_caveat_key = b"key shared with the auth service";

    // Step 1: the service mints a macaroon and attenuates it
    println!("1. Service mints a macaroon with a third-party caveat");
    let mut primary = Macaroon::new(
        root_key,
        "session-12345",
        "https://api.service.com",
        LATEST_VERSION,
    )?;
    primary.add_first_party_caveat("resource = /api/documents")?;
    primary.add_third_party_caveat(
        auth_caveat_key,
        "user-authenticated",
        "https://auth.service.com",
    )?;
    println!("   Primary macaroon carries {} caveats", primary.caveat_count());

    let accepts = |conditions: &'static [&'static str]| {
        FnVerifier::new(move |condition: &str| {
            if conditions.contains(&condition) {
                Ok(())
            } else {
                Err(MacaroonError::ConditionFailed(format!(
                    "condition {condition:?} not met"
                )))
            }
        })
    };
    let verifier = accepts(&["resource = /api/documents", "auth-level >= 5"]);

    // Step 2: verification without a discharge must fail
    println!("\n2. Verifying without a discharge macaroon...");
    match primary.verify(root_key, &verifier, &[]) {
        Ok(()) => println!("   unexpectedly succeeded!"),
        Err(e) => println!("   correctly failed: {e}"),
    }

    // Step 3: the auth service mints a discharge from the shared key,
    // adding its own restrictions
    println!("\n3. Auth service issues a discharge macaroon");
    let mut discharge = Macaroon::new(
        auth_caveat_key,
        "user-authenticated",
        "https://auth.service.com",
        LATEST_VERSION,
    )?;
    discharge.add_first_party_caveat("auth-level >= 5")?;

    // Step 4: the client binds the discharge to the primary
    println!("\n4. Client binds the discharge to the primary");
    let bundle = primary.prepare_for_request(&[discharge]);

    // The whole credential travels as one blob
    let wire = bundle.to_binary()?;
    println!("   Bound credential is {} bytes on the wire", wire.len());

    // Step 5: the service verifies the primary together with the discharge
    println!("\n5. Service verifies the request credential...");
    match primary.verify(root_key, &verifier, bundle.discharges()) {
        Ok(()) => println!("   verification successful, access granted"),
        Err(e) => println!("   verification failed: {e}"),
    }

    // Step 6: a verifier that rejects the discharge's caveat must fail
    println!("\n6. Verifying with an insufficient auth level...");
    let weak_verifier = accepts(&["resource = /api/documents"]);
    match primary.verify(root_key, &weak_verifier, bundle.discharges()) {
        Ok(()) => println!("   unexpectedly succeeded!"),
        Err(e) => println!("   correctly failed: {e}"),
    }

    println!("\n=== Example Complete ===");
    Ok(())
}
