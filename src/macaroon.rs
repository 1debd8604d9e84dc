use crate::caveat::Caveat;
use crate::crypto::{self, SIGNATURE_SIZE};
use crate::random::{RandomSource, SystemRandom};
use crate::slice::Slice;
use crate::verifier::{Verifier, VerifyContext};
use crate::{MacaroonError, Result};

/// Serialization version of a macaroon.
///
/// A macaroon remembers the version it was minted or decoded at, so that
/// re-encoding preserves the original form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Version {
    /// The packet-oriented format; text fields must be valid UTF-8
    V1,
    /// The typed-field binary format; identifiers may hold arbitrary bytes
    V2,
}

/// The version used when minting new macaroons unless stated otherwise
pub const LATEST_VERSION: Version = Version::V2;

/// A macaroon is a bearer credential with embedded, attenuating caveats.
///
/// Macaroons use chained HMAC-SHA-256 signatures so that anyone holding a
/// macaroon can append further restrictions without contacting the issuer,
/// while nobody can remove or reorder the restrictions already present.
///
/// # Example
/// ```
/// use macaroon::{Macaroon, LATEST_VERSION};
///
/// let root_key = b"this is our super secret key; only we should know it";
/// let m = Macaroon::new(root_key, "we used our secret key", "http://mybank/", LATEST_VERSION)
///     .unwrap();
/// assert_eq!(m.location(), "http://mybank/");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Macaroon {
    location: String,
    id: Vec<u8>,
    caveats: Vec<Caveat>,
    sig: [u8; SIGNATURE_SIZE],
    version: Version,
}

impl Macaroon {
    /// Mints a new macaroon
    ///
    /// # Arguments
    /// * `root_key` - The secret root key known only to the issuer; passed
    ///   through the key-derivation transform, so it may be any length
    /// * `id` - A public identifier for this macaroon
    /// * `location` - Advisory location hint for the target service (never
    ///   authenticated); may be empty
    /// * `version` - The serialization version to mint at
    ///
    /// # Errors
    /// Fails if `version` is [`Version::V1`] and `id` is not valid UTF-8.
    pub fn new(
        root_key: &[u8],
        id: impl Into<Vec<u8>>,
        location: impl Into<String>,
        version: Version,
    ) -> Result<Self> {
        let id = id.into();
        if version == Version::V1 && std::str::from_utf8(&id).is_err() {
            return Err(MacaroonError::FieldNotUtf8("identifier"));
        }
        let sig = crypto::keyed_hash(&crypto::make_key(root_key), &id);
        Ok(Self {
            location: location.into(),
            id,
            caveats: Vec::new(),
            sig,
            version,
        })
    }

    /// Returns the advisory location (empty if none was set)
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Returns the public identifier
    pub fn id(&self) -> &[u8] {
        &self.id
    }

    /// Returns the caveats in the order they were added
    pub fn caveats(&self) -> &[Caveat] {
        &self.caveats
    }

    /// Returns the current signature
    pub fn signature(&self) -> &[u8; SIGNATURE_SIZE] {
        &self.sig
    }

    /// Returns the serialization version this macaroon carries
    pub fn version(&self) -> Version {
        self.version
    }

    /// Returns the number of caveats in this macaroon
    pub fn caveat_count(&self) -> usize {
        self.caveats.len()
    }

    /// Returns true if this macaroon has no caveats
    pub fn is_unrestricted(&self) -> bool {
        self.caveats.is_empty()
    }

    /// Converts this macaroon to another serialization version
    ///
    /// Converting to [`Version::V1`] fails when the identifier or any caveat
    /// id holds bytes that are not valid UTF-8, since the V1 form cannot
    /// carry them.
    pub fn set_version(&mut self, version: Version) -> Result<()> {
        if version == Version::V1 {
            if std::str::from_utf8(&self.id).is_err() {
                return Err(MacaroonError::FieldNotUtf8("identifier"));
            }
            for cav in &self.caveats {
                if std::str::from_utf8(&cav.id).is_err() {
                    return Err(MacaroonError::FieldNotUtf8("cid in caveat"));
                }
            }
        }
        self.version = version;
        Ok(())
    }

    /// Adds a first-party caveat to this macaroon
    ///
    /// First-party caveats are conditions evaluated by the verifying service
    /// itself. The condition is folded into the signature chain, so it can
    /// never be removed.
    ///
    /// # Errors
    /// Fails if the condition is not valid UTF-8; conditions are handed to
    /// the verifier as strings.
    ///
    /// # Example
    /// ```
    /// use macaroon::{Macaroon, LATEST_VERSION};
    ///
    /// let mut m = Macaroon::new(b"secret", "some id", "a location", LATEST_VERSION).unwrap();
    /// m.add_first_party_caveat("account = alice").unwrap();
    /// m.add_first_party_caveat("time < 2026-12-31T23:59:59Z").unwrap();
    /// assert_eq!(m.caveat_count(), 2);
    /// ```
    pub fn add_first_party_caveat(&mut self, condition: impl Into<Vec<u8>>) -> Result<()> {
        let condition = condition.into();
        if std::str::from_utf8(&condition).is_err() {
            return Err(MacaroonError::ConditionNotUtf8);
        }
        self.sig = crypto::keyed_hash(&self.sig, &condition);
        self.caveats.push(Caveat::first_party(condition));
        Ok(())
    }

    /// Adds a third-party caveat to this macaroon
    ///
    /// The caveat root key is shared out of band with the third party, which
    /// will mint a discharge macaroon from the same key and `caveat_id`. The
    /// key is derived and then sealed into the caveat's verification id under
    /// the signature as it stands right now, proving the issuer knew it.
    ///
    /// # Arguments
    /// * `caveat_root_key` - The key the discharge macaroon will be minted
    ///   from
    /// * `caveat_id` - An identifier the third party can relate to the
    ///   caveat root key and the condition it stands for
    /// * `location` - Advisory location of the discharging third party
    ///
    /// # Errors
    /// Fails with [`MacaroonError::RandomFailed`] if the system random
    /// source cannot supply a nonce.
    pub fn add_third_party_caveat(
        &mut self,
        caveat_root_key: &[u8],
        caveat_id: impl Into<Vec<u8>>,
        location: impl Into<String>,
    ) -> Result<()> {
        self.add_third_party_caveat_with_rand(
            caveat_root_key,
            caveat_id,
            location,
            &mut SystemRandom,
        )
    }

    /// Adds a third-party caveat, drawing the sealing nonce from `rng`
    ///
    /// This is the seam used to substitute a deterministic or failing random
    /// source; [`Macaroon::add_third_party_caveat`] uses the operating
    /// system CSPRNG.
    pub fn add_third_party_caveat_with_rand(
        &mut self,
        caveat_root_key: &[u8],
        caveat_id: impl Into<Vec<u8>>,
        location: impl Into<String>,
        rng: &mut dyn RandomSource,
    ) -> Result<()> {
        let caveat_id = caveat_id.into();
        let derived = crypto::make_key(caveat_root_key);
        let verification_id = crypto::encrypt(&self.sig, &derived, rng)?;
        self.sig = crypto::keyed_hash2(&self.sig, &verification_id, &caveat_id);
        self.caveats
            .push(Caveat::third_party(caveat_id, verification_id, location));
        Ok(())
    }

    /// Binds this macaroon to the signature of the primary macaroon it will
    /// be presented alongside
    ///
    /// Call this on each discharge macaroon before sending it with a
    /// request; an unbound discharge could otherwise be replayed against a
    /// different primary.
    pub fn bind(&mut self, primary_sig: &[u8]) {
        self.sig = crypto::bind_for_request(primary_sig, &self.sig);
    }

    /// Prepares this macaroon for a request by binding discharge macaroons
    ///
    /// Returns a bundle holding a clone of this macaroon followed by a bound
    /// clone of each discharge.
    ///
    /// # Example
    /// ```
    /// use macaroon::{Macaroon, LATEST_VERSION};
    ///
    /// let mut primary = Macaroon::new(b"secret", "some id", "a location", LATEST_VERSION).unwrap();
    /// primary
    ///     .add_third_party_caveat(b"shared root key", "3rd party caveat", "remote.com")
    ///     .unwrap();
    ///
    /// let discharge =
    ///     Macaroon::new(b"shared root key", "3rd party caveat", "remote.com", LATEST_VERSION)
    ///         .unwrap();
    ///
    /// let bundle = primary.prepare_for_request(&[discharge]);
    /// assert_eq!(bundle.0.len(), 2);
    /// ```
    pub fn prepare_for_request(&self, discharges: &[Macaroon]) -> Slice {
        let mut bundle = Vec::with_capacity(discharges.len() + 1);
        bundle.push(self.clone());
        for dm in discharges {
            let mut bound = dm.clone();
            bound.bind(&self.sig);
            bundle.push(bound);
        }
        Slice(bundle)
    }

    /// Verifies this macaroon against the root key it was minted from
    ///
    /// The signature chain is recomputed from scratch; every first-party
    /// condition (here and in any discharge) is handed to `verifier` exactly
    /// once in traversal order, and every third-party caveat must be matched
    /// by exactly one of `discharges`, each of which must have been bound to
    /// this macaroon with [`Macaroon::bind`]. Discharges that go unused are
    /// an error.
    ///
    /// Verification never mutates the macaroons involved.
    ///
    /// # Example
    /// ```
    /// use macaroon::verifier::AcceptAllVerifier;
    /// use macaroon::{Macaroon, LATEST_VERSION};
    ///
    /// let mut m = Macaroon::new(b"secret", "some id", "a location", LATEST_VERSION).unwrap();
    /// m.add_first_party_caveat("account = alice").unwrap();
    /// assert!(m.verify(b"secret", &AcceptAllVerifier, &[]).is_ok());
    /// ```
    pub fn verify<V: Verifier + ?Sized>(
        &self,
        root_key: &[u8],
        verifier: &V,
        discharges: &[Macaroon],
    ) -> Result<()> {
        let mut ctx = VerifyContext::new(self.sig, verifier, discharges);
        ctx.verify(self, &crypto::make_key(root_key))?;
        ctx.check_all_discharges_used()
    }

    /// Assembles a macaroon from already-decoded parts; the caller vouches
    /// for the signature
    pub(crate) fn from_parts(
        location: String,
        id: Vec<u8>,
        caveats: Vec<Caveat>,
        sig: [u8; SIGNATURE_SIZE],
        version: Version,
    ) -> Self {
        Self {
            location,
            id,
            caveats,
            sig,
            version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::FailingRandom;
    use crate::verifier::AcceptAllVerifier;

    #[test]
    fn test_new_macaroon() {
        let root_key = b"this is our super secret key; only we should know it";
        let m = Macaroon::new(root_key, "we used our secret key", "http://mybank/", LATEST_VERSION)
            .unwrap();

        assert_eq!(m.id(), b"we used our secret key");
        assert_eq!(m.location(), "http://mybank/");
        assert_eq!(m.caveat_count(), 0);
        assert!(m.is_unrestricted());
        assert_eq!(m.version(), Version::V2);

        // Minting is deterministic
        let m2 = Macaroon::new(root_key, "we used our secret key", "http://mybank/", LATEST_VERSION)
            .unwrap();
        assert_eq!(m.signature(), m2.signature());
    }

    #[test]
    fn test_new_v1_rejects_non_utf8_id() {
        let err = Macaroon::new(b"secret", &b"foo\xff"[..], "a location", Version::V1).unwrap_err();
        assert_eq!(err, MacaroonError::FieldNotUtf8("identifier"));

        // V2 has no such constraint
        assert!(Macaroon::new(b"secret", &b"foo\xff"[..], "a location", Version::V2).is_ok());
    }

    #[test]
    fn test_add_first_party_caveat_updates_signature() {
        let mut m = Macaroon::new(b"secret", "some id", "a location", LATEST_VERSION).unwrap();
        let sig_before = *m.signature();

        m.add_first_party_caveat("account = alice").unwrap();

        assert_eq!(m.caveat_count(), 1);
        assert_eq!(m.caveats()[0].id, b"account = alice");
        assert!(m.caveats()[0].is_first_party());
        assert_ne!(m.signature(), &sig_before);
    }

    #[test]
    fn test_add_first_party_caveat_rejects_non_utf8() {
        let mut m = Macaroon::new(b"secret", "some id", "a location", LATEST_VERSION).unwrap();
        let err = m.add_first_party_caveat(&b"foo\xff"[..]).unwrap_err();
        assert_eq!(err, MacaroonError::ConditionNotUtf8);
        assert_eq!(
            err.to_string(),
            "first party caveat condition is not a valid utf-8 string"
        );
        assert_eq!(m.caveat_count(), 0);
    }

    #[test]
    fn test_signature_chaining_is_reproducible() {
        let mut m1 = Macaroon::new(b"secret", "some id", "", LATEST_VERSION).unwrap();
        let mut m2 = Macaroon::new(b"secret", "some id", "", LATEST_VERSION).unwrap();

        m1.add_first_party_caveat("caveat one").unwrap();
        m2.add_first_party_caveat("caveat one").unwrap();
        assert_eq!(m1.signature(), m2.signature());

        m1.add_first_party_caveat("caveat two").unwrap();
        m2.add_first_party_caveat("caveat two").unwrap();
        assert_eq!(m1.signature(), m2.signature());
    }

    #[test]
    fn test_caveat_order_changes_signature() {
        let mut m1 = Macaroon::new(b"secret", "some id", "", LATEST_VERSION).unwrap();
        let mut m2 = Macaroon::new(b"secret", "some id", "", LATEST_VERSION).unwrap();

        m1.add_first_party_caveat("a").unwrap();
        m1.add_first_party_caveat("b").unwrap();
        m2.add_first_party_caveat("b").unwrap();
        m2.add_first_party_caveat("a").unwrap();

        assert_ne!(m1.signature(), m2.signature());
    }

    #[test]
    fn test_add_third_party_caveat() {
        let mut m = Macaroon::new(b"secret", "some id", "a location", LATEST_VERSION).unwrap();
        let sig_before = *m.signature();

        m.add_third_party_caveat(b"bob-caveat-root-key", "bob-is-great", "bob")
            .unwrap();

        assert_eq!(m.caveat_count(), 1);
        let cav = &m.caveats()[0];
        assert!(cav.is_third_party());
        assert_eq!(cav.id, b"bob-is-great");
        assert_eq!(cav.location, "bob");
        assert!(!cav.verification_id.is_empty());
        assert_ne!(m.signature(), &sig_before);

        // The sealed caveat key opens under the signature the macaroon had
        // when the caveat was added
        let opened = crypto::decrypt(&sig_before, &cav.verification_id).unwrap();
        assert_eq!(opened, crypto::make_key(b"bob-caveat-root-key"));
    }

    #[test]
    fn test_add_third_party_caveat_with_failing_rng() {
        let mut m = Macaroon::new(b"secret", "some id", "a location", LATEST_VERSION).unwrap();
        let err = m
            .add_third_party_caveat_with_rand(
                b"shared root key",
                "3rd party caveat",
                "remote.com",
                &mut FailingRandom,
            )
            .unwrap_err();
        assert_eq!(err.to_string(), "cannot generate random bytes: fail");
        assert_eq!(m.caveat_count(), 0);
    }

    #[test]
    fn test_bind_changes_signature_deterministically() {
        let primary = Macaroon::new(b"root", "primary", "", LATEST_VERSION).unwrap();
        let discharge = Macaroon::new(b"shared", "caveat id", "", LATEST_VERSION).unwrap();

        let mut bound1 = discharge.clone();
        bound1.bind(primary.signature());
        let mut bound2 = discharge.clone();
        bound2.bind(primary.signature());

        assert_ne!(bound1.signature(), discharge.signature());
        assert_eq!(bound1.signature(), bound2.signature());

        // Everything but the signature is untouched
        assert_eq!(bound1.id(), discharge.id());
        assert_eq!(bound1.caveats(), discharge.caveats());
    }

    #[test]
    fn test_prepare_for_request() {
        let mut primary = Macaroon::new(b"secret", "some id", "a location", LATEST_VERSION).unwrap();
        primary
            .add_third_party_caveat(b"shared root key", "3rd party caveat", "remote.com")
            .unwrap();

        let discharge =
            Macaroon::new(b"shared root key", "3rd party caveat", "remote location", LATEST_VERSION)
                .unwrap();

        let bundle = primary.prepare_for_request(&[discharge]);
        assert_eq!(bundle.0.len(), 2);
        assert_eq!(bundle.0[0].id(), b"some id");
        assert_eq!(bundle.0[1].id(), b"3rd party caveat");

        assert!(primary
            .verify(b"secret", &AcceptAllVerifier, bundle.discharges())
            .is_ok());
    }

    #[test]
    fn test_clone_is_independent() {
        let mut m = Macaroon::new(b"secret", "some id", "a location", LATEST_VERSION).unwrap();
        m.add_first_party_caveat("a caveat").unwrap();

        let snapshot = m.clone();
        m.add_first_party_caveat("another caveat").unwrap();

        assert_eq!(snapshot.caveat_count(), 1);
        assert_eq!(m.caveat_count(), 2);
        assert_ne!(snapshot.signature(), m.signature());
    }

    #[test]
    fn test_set_version_roundtrip() {
        let mut m = Macaroon::new(b"secret", "some id", "a location", Version::V2).unwrap();
        m.set_version(Version::V1).unwrap();
        assert_eq!(m.version(), Version::V1);
        m.set_version(Version::V2).unwrap();
        assert_eq!(m.version(), Version::V2);
    }

    #[test]
    fn test_set_version_v1_rejects_binary_identifier() {
        let mut m = Macaroon::new(b"secret", &[0xff, 0xfe][..], "a location", Version::V2).unwrap();
        assert_eq!(
            m.set_version(Version::V1),
            Err(MacaroonError::FieldNotUtf8("identifier"))
        );
        assert_eq!(m.version(), Version::V2);
    }

    #[test]
    fn test_tampered_signature_fails_verification() {
        let mut m = Macaroon::new(b"secret", "some id", "a location", LATEST_VERSION).unwrap();
        m.add_first_party_caveat("a caveat").unwrap();

        m.sig[0] ^= 0xff;

        assert_eq!(
            m.verify(b"secret", &AcceptAllVerifier, &[]),
            Err(MacaroonError::SignatureMismatch)
        );
    }

    #[test]
    fn test_wrong_root_key_fails_verification() {
        let m = Macaroon::new(b"secret", "some id", "a location", LATEST_VERSION).unwrap();
        assert_eq!(
            m.verify(b"wrong secret", &AcceptAllVerifier, &[]),
            Err(MacaroonError::SignatureMismatch)
        );
    }
}
