use crate::crypto::{self, SIGNATURE_SIZE};
use crate::macaroon::Macaroon;
use crate::{MacaroonError, Result};

/// A verifier checks whether first-party caveat conditions are satisfied
///
/// Condition language and evaluation are entirely the caller's business; the
/// verification machinery only guarantees that every condition embedded in a
/// macaroon (or any of its discharges) is presented exactly once, in order.
pub trait Verifier {
    /// Verifies a single first-party condition
    ///
    /// # Returns
    /// * `Ok(())` if the condition is satisfied
    /// * an error otherwise, which aborts verification and is returned to
    ///   the caller verbatim
    fn verify_condition(&self, condition: &str) -> Result<()>;
}

/// A verifier that accepts all conditions
///
/// Useful for testing or when only the signature chain matters.
pub struct AcceptAllVerifier;

impl Verifier for AcceptAllVerifier {
    fn verify_condition(&self, _condition: &str) -> Result<()> {
        Ok(())
    }
}

/// A verifier that rejects all conditions
///
/// Useful for testing failure cases and for verifying macaroons that are
/// expected to carry no first-party caveats at all.
pub struct RejectAllVerifier;

impl Verifier for RejectAllVerifier {
    fn verify_condition(&self, condition: &str) -> Result<()> {
        Err(MacaroonError::ConditionFailed(format!(
            "condition {condition:?} not met"
        )))
    }
}

/// A function-based verifier for simple use cases
///
/// # Example
/// ```
/// use macaroon::verifier::{FnVerifier, Verifier};
/// use macaroon::MacaroonError;
///
/// let verifier = FnVerifier::new(|condition: &str| {
///     if condition == "account = alice" {
///         Ok(())
///     } else {
///         Err(MacaroonError::ConditionFailed(format!(
///             "condition {condition:?} not met"
///         )))
///     }
/// });
///
/// assert!(verifier.verify_condition("account = alice").is_ok());
/// assert!(verifier.verify_condition("account = bob").is_err());
/// ```
pub struct FnVerifier<F>
where
    F: Fn(&str) -> Result<()>,
{
    func: F,
}

impl<F> FnVerifier<F>
where
    F: Fn(&str) -> Result<()>,
{
    /// Creates a new function-based verifier
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> Verifier for FnVerifier<F>
where
    F: Fn(&str) -> Result<()>,
{
    fn verify_condition(&self, condition: &str) -> Result<()> {
        (self.func)(condition)
    }
}

/// Transient state for one verification run.
///
/// Holds the discharge set with a used-flag per entry so that every
/// discharge is consumed exactly once, and the primary macaroon's signature
/// as presented, against which every level of the recursion is bound.
pub(crate) struct VerifyContext<'a, V: Verifier + ?Sized> {
    root_sig: [u8; SIGNATURE_SIZE],
    verifier: &'a V,
    discharges: &'a [Macaroon],
    used: Vec<bool>,
}

impl<'a, V: Verifier + ?Sized> VerifyContext<'a, V> {
    pub(crate) fn new(
        root_sig: [u8; SIGNATURE_SIZE],
        verifier: &'a V,
        discharges: &'a [Macaroon],
    ) -> Self {
        Self {
            root_sig,
            verifier,
            discharges,
            used: vec![false; discharges.len()],
        }
    }

    /// Re-derives the signature chain of `m` starting from `key` and checks
    /// it against the signature `m` presents.
    ///
    /// At the outer call `key` is the derived root key; for discharges it is
    /// the 32-byte caveat key recovered from the enclosing verification id.
    /// Recursion depth is bounded by the discharge count, since every level
    /// consumes one discharge and a discharge cannot be consumed twice.
    pub(crate) fn verify(&mut self, m: &Macaroon, key: &[u8; SIGNATURE_SIZE]) -> Result<()> {
        let mut sig = crypto::keyed_hash(key, m.id());
        for cav in m.caveats() {
            if cav.is_third_party() {
                let caveat_key: [u8; SIGNATURE_SIZE] = crypto::decrypt(&sig, &cav.verification_id)?
                    .try_into()
                    .map_err(|_| {
                        MacaroonError::DecryptionFailed(
                            "caveat key has unexpected length".to_string(),
                        )
                    })?;
                let di = self.find_discharge(&cav.id)?;
                self.used[di] = true;
                let discharges = self.discharges;
                self.verify(&discharges[di], &caveat_key)?;
                sig = crypto::keyed_hash2(&sig, &cav.verification_id, &cav.id);
            } else {
                let condition = std::str::from_utf8(&cav.id)
                    .map_err(|_| MacaroonError::ConditionNotUtf8)?;
                self.verifier.verify_condition(condition)?;
                sig = crypto::keyed_hash(&sig, &cav.id);
            }
        }

        // Binding leaves the outer macaroon's signature untouched (it equals
        // root_sig when valid), so one comparison covers both cases.
        let bound = crypto::bind_for_request(&self.root_sig, &sig);
        if !crypto::constant_time_eq(&bound, m.signature()) {
            return Err(MacaroonError::SignatureMismatch);
        }
        Ok(())
    }

    /// Picks the first discharge matching `id` that has not been consumed
    /// yet, in input order
    fn find_discharge(&self, id: &[u8]) -> Result<usize> {
        let mut any_match = false;
        for (i, dm) in self.discharges.iter().enumerate() {
            if dm.id() != id {
                continue;
            }
            if !self.used[i] {
                return Ok(i);
            }
            any_match = true;
        }
        if any_match {
            Err(MacaroonError::DischargeReused(
                String::from_utf8_lossy(id).into_owned(),
            ))
        } else {
            Err(MacaroonError::DischargeMissing(hex::encode(id)))
        }
    }

    /// Reports the first discharge, in input order, that was never consumed
    pub(crate) fn check_all_discharges_used(&self) -> Result<()> {
        for (i, used) in self.used.iter().enumerate() {
            if !used {
                return Err(MacaroonError::DischargeUnused(
                    String::from_utf8_lossy(self.discharges[i].id()).into_owned(),
                ));
            }
        }
        Ok(())
    }
}
