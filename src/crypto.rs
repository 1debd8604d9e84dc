use crypto_secretbox::aead::{Aead, KeyInit};
use crypto_secretbox::{Nonce, XSalsa20Poly1305};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::random::RandomSource;
use crate::{MacaroonError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Size of an HMAC-SHA-256 signature in bytes (32 bytes = 256 bits)
pub const SIGNATURE_SIZE: usize = 32;

/// Size of the secretbox nonce prepended to every verification id
pub const NONCE_SIZE: usize = 24;

/// Fixed HMAC key used to derive working keys from caller-supplied root keys
const KEY_GENERATOR: &[u8] = b"macaroons-key-generator";

const ZERO_KEY: [u8; SIGNATURE_SIZE] = [0u8; SIGNATURE_SIZE];

/// Generates an HMAC-SHA-256 signature
///
/// # Arguments
/// * `key` - The secret key
/// * `data` - The data to authenticate
///
/// # Returns
/// A 32-byte HMAC signature
pub fn keyed_hash(key: &[u8], data: &[u8]) -> [u8; SIGNATURE_SIZE] {
    let mut mac =
        <HmacSha256 as Mac>::new_from_slice(key).expect("HMAC can take key of any length");
    mac.update(data);
    mac.finalize().into_bytes().into()
}

/// Hashes two values under the same key, committing to both halves
/// independently of their lengths
///
/// This computes: HMAC(key, HMAC(key, d1) || HMAC(key, d2))
pub fn keyed_hash2(key: &[u8], d1: &[u8], d2: &[u8]) -> [u8; SIGNATURE_SIZE] {
    let h1 = keyed_hash(key, d1);
    let h2 = keyed_hash(key, d2);
    let mut joined = [0u8; 2 * SIGNATURE_SIZE];
    joined[..SIGNATURE_SIZE].copy_from_slice(&h1);
    joined[SIGNATURE_SIZE..].copy_from_slice(&h2);
    keyed_hash(key, &joined)
}

/// Derives a 32-byte working key from a caller-supplied root key
///
/// Every root key handed to mint or verify passes through this transform, so
/// callers may use keys of any length.
pub fn make_key(root_key: &[u8]) -> [u8; SIGNATURE_SIZE] {
    keyed_hash(KEY_GENERATOR, root_key)
}

/// Folds a discharge macaroon's signature together with the signature of the
/// primary macaroon it accompanies
///
/// When the two signatures are already equal the input is returned unchanged;
/// this makes the final verifier comparison uniform across the primary
/// macaroon and its discharges, and makes binding idempotent.
pub fn bind_for_request(
    root_sig: &[u8],
    discharge_sig: &[u8; SIGNATURE_SIZE],
) -> [u8; SIGNATURE_SIZE] {
    if constant_time_eq(root_sig, discharge_sig) {
        return *discharge_sig;
    }
    keyed_hash2(&ZERO_KEY, root_sig, discharge_sig)
}

/// Seals `plaintext` under `key` with XSalsa20-Poly1305
///
/// The 24-byte nonce is drawn from `rng` and prepended to the authenticated
/// ciphertext.
///
/// # Errors
/// * [`MacaroonError::RandomFailed`] if the random source fails
pub fn encrypt(
    key: &[u8; SIGNATURE_SIZE],
    plaintext: &[u8],
    rng: &mut dyn RandomSource,
) -> Result<Vec<u8>> {
    let mut nonce = [0u8; NONCE_SIZE];
    rng.fill(&mut nonce)
        .map_err(|e| MacaroonError::RandomFailed(e.to_string()))?;

    let cipher = XSalsa20Poly1305::new(key.into());
    let sealed = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| MacaroonError::Crypto(e.to_string()))?;

    let mut blob = Vec::with_capacity(NONCE_SIZE + sealed.len());
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&sealed);
    Ok(blob)
}

/// Opens a blob produced by [`encrypt`]
///
/// # Errors
/// * [`MacaroonError::DecryptionFailed`] if the blob is shorter than a nonce
///   or fails authentication
pub fn decrypt(key: &[u8; SIGNATURE_SIZE], blob: &[u8]) -> Result<Vec<u8>> {
    if blob.len() < NONCE_SIZE {
        return Err(MacaroonError::DecryptionFailed(
            "ciphertext too short".to_string(),
        ));
    }
    let (nonce, sealed) = blob.split_at(NONCE_SIZE);
    let cipher = XSalsa20Poly1305::new(key.into());
    cipher
        .decrypt(Nonce::from_slice(nonce), sealed)
        .map_err(|_| MacaroonError::DecryptionFailed("message authentication failed".to_string()))
}

/// Compares two byte strings without leaking where they differ
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}
