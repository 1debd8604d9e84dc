use thiserror::Error;

/// Errors that can occur when building, decoding, or verifying macaroons
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MacaroonError {
    /// A version 1 field holds bytes that are not valid UTF-8
    #[error("invalid {0}: not a valid utf-8 string")]
    FieldNotUtf8(&'static str),

    /// A first-party caveat condition holds bytes that are not valid UTF-8
    #[error("first party caveat condition is not a valid utf-8 string")]
    ConditionNotUtf8,

    /// The random source could not supply bytes
    #[error("cannot generate random bytes: {0}")]
    RandomFailed(String),

    /// A cryptographic primitive failed
    #[error("cryptographic error: {0}")]
    Crypto(String),

    /// A verification id failed to authenticate or is malformed
    #[error("decryption failure: {0}")]
    DecryptionFailed(String),

    /// No discharge macaroon matches a third-party caveat id (hex-encoded)
    #[error("cannot find discharge macaroon for caveat {0}")]
    DischargeMissing(String),

    /// A discharge macaroon would be consumed more than once
    #[error("discharge macaroon \"{0}\" was used more than once")]
    DischargeReused(String),

    /// A supplied discharge macaroon was never consumed
    #[error("discharge macaroon \"{0}\" was not used")]
    DischargeUnused(String),

    /// The recomputed signature does not match the presented one
    #[error("signature mismatch after caveat verification")]
    SignatureMismatch,

    /// A first-party condition was rejected by the caller's verifier;
    /// the message is surfaced verbatim
    #[error("{0}")]
    ConditionFailed(String),

    /// A decoded signature is not exactly 32 bytes
    #[error("signature has unexpected length {0}")]
    BadSignatureLength(usize),

    /// More than one encoding was supplied for the same JSON field
    #[error("invalid {0}: ambiguous field encoding")]
    AmbiguousFieldEncoding(&'static str),

    /// A required field is absent from the encoded form
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// A length prefix points past the end of the input
    #[error("packet extends past end of buffer")]
    TruncatedPacket,

    /// The leading version byte is not a known serialization version
    #[error("unknown macaroon version {0}")]
    UnknownVersion(u8),

    /// The encoded form is malformed
    #[error("invalid format: {0}")]
    InvalidFormat(String),
}
