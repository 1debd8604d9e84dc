//! Wire formats: the v1 packet framing, the v2 typed-field framing, and the
//! JSON forms, plus the transport-string helpers built on top of them.

pub mod json;
pub mod v1;
pub mod v2;

use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;

use crate::macaroon::{Macaroon, Version};
use crate::{MacaroonError, Result};

impl Macaroon {
    /// Serializes this macaroon to its binary form, selected by
    /// [`Macaroon::version`]
    pub fn to_binary(&self) -> Result<Vec<u8>> {
        match self.version() {
            Version::V1 => v1::encode(self),
            Version::V2 => v2::encode(self),
        }
    }

    /// Deserializes a macaroon from either binary form, detected from the
    /// leading byte; the decoded macaroon remembers the version it came from
    pub fn from_binary(data: &[u8]) -> Result<Self> {
        let (m, rest) = decode_any(data)?;
        if !rest.is_empty() {
            return Err(MacaroonError::InvalidFormat(
                "unexpected data after macaroon".to_string(),
            ));
        }
        Ok(m)
    }

    /// Serializes this macaroon to JSON, in the schema matching its version
    pub fn to_json(&self) -> Result<String> {
        json::marshal(self)
    }

    /// Deserializes a macaroon from JSON, detecting the schema from the
    /// object's keys; a bare JSON string is read as base64-encoded binary
    pub fn from_json(data: &str) -> Result<Self> {
        json::unmarshal(data)
    }

    /// Serializes this macaroon to URL-safe unpadded base64 of its binary
    /// form, suitable for HTTP headers and cookies
    pub fn to_base64(&self) -> Result<String> {
        Ok(URL_SAFE_NO_PAD.encode(self.to_binary()?))
    }

    /// Deserializes a macaroon from base64-encoded binary; both the standard
    /// and URL-safe alphabets are accepted, padded or not
    pub fn from_base64(data: &str) -> Result<Self> {
        Self::from_binary(&base64_decode_any(data)?)
    }
}

/// Decodes one macaroon off the front of `data`, returning the rest
pub(crate) fn decode_any(data: &[u8]) -> Result<(Macaroon, &[u8])> {
    match data.first() {
        None => Err(MacaroonError::InvalidFormat(
            "empty macaroon data".to_string(),
        )),
        Some(&v2::VERSION_BYTE) => v2::decode(data),
        // A v1 macaroon opens with its first packet's lowercase-hex length
        Some(b'0'..=b'9') | Some(b'a'..=b'f') => v1::decode(data),
        Some(&b) => Err(MacaroonError::UnknownVersion(b)),
    }
}

/// Decodes base64 regardless of alphabet and padding
pub(crate) fn base64_decode_any(data: &str) -> Result<Vec<u8>> {
    let trimmed = data.trim_end_matches('=');
    let engine = if trimmed.contains('+') || trimmed.contains('/') {
        &STANDARD_NO_PAD
    } else {
        &URL_SAFE_NO_PAD
    };
    engine
        .decode(trimmed)
        .map_err(|e| MacaroonError::InvalidFormat(format!("invalid base64: {e}")))
}
