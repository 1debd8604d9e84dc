//! The JSON forms.
//!
//! Version 1 uses the long libmacaroons-compatible keys (`caveats`,
//! `location`, `identifier`, hex `signature`). Version 2 uses short keys
//! where every binary-valued field may arrive in exactly one of three
//! encodings, distinguished by a key suffix: the bare key holds a UTF-8
//! string, `H` holds lowercase hex, and `64` holds base64 in either
//! alphabet. A bare JSON string at the top level is base64 of the binary
//! form.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::de::Error as _;
use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::caveat::Caveat;
use crate::crypto::SIGNATURE_SIZE;
use crate::macaroon::{Macaroon, Version};
use crate::serialization::base64_decode_any;
use crate::{MacaroonError, Result};

pub(crate) fn marshal(m: &Macaroon) -> Result<String> {
    let out = match m.version() {
        Version::V1 => serde_json::to_string(&v1_object(m)?),
        Version::V2 => serde_json::to_string(&v2_object(m)),
    };
    out.map_err(|e| MacaroonError::InvalidFormat(format!("cannot encode JSON: {e}")))
}

pub(crate) fn unmarshal(data: &str) -> Result<Macaroon> {
    let value: Value = serde_json::from_str(data)
        .map_err(|e| MacaroonError::InvalidFormat(format!("invalid JSON: {e}")))?;
    from_value(value)
}

pub(crate) fn from_value(value: Value) -> Result<Macaroon> {
    match value {
        Value::String(data) => Macaroon::from_binary(&base64_decode_any(&data)?),
        Value::Object(map) => {
            let is_v1 = map.contains_key("caveats")
                || map.contains_key("identifier")
                || map.contains_key("signature");
            let value = Value::Object(map);
            if is_v1 {
                let object: MacaroonJsonV1 = serde_json::from_value(value)
                    .map_err(|e| MacaroonError::InvalidFormat(format!("invalid JSON: {e}")))?;
                macaroon_from_v1(object)
            } else {
                let object: MacaroonJsonV2 = serde_json::from_value(value)
                    .map_err(|e| MacaroonError::InvalidFormat(format!("invalid JSON: {e}")))?;
                macaroon_from_v2(object)
            }
        }
        _ => Err(MacaroonError::InvalidFormat(
            "unexpected JSON value for macaroon".to_string(),
        )),
    }
}

impl Serialize for Macaroon {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.version() {
            Version::V1 => v1_object(self)
                .map_err(S::Error::custom)?
                .serialize(serializer),
            Version::V2 => v2_object(self).serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Macaroon {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        from_value(value).map_err(D::Error::custom)
    }
}

/// The libmacaroons-compatible v1 object
#[derive(Serialize, Deserialize, Default)]
#[serde(default)]
struct MacaroonJsonV1 {
    caveats: Vec<CaveatJsonV1>,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    identifier: Option<String>,
    /// Hex-encoded
    #[serde(skip_serializing_if = "Option::is_none")]
    signature: Option<String>,
}

#[derive(Serialize, Deserialize, Default)]
#[serde(default)]
struct CaveatJsonV1 {
    #[serde(skip_serializing_if = "Option::is_none")]
    cid: Option<String>,
    /// Base64-encoded
    #[serde(skip_serializing_if = "Option::is_none")]
    vid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cl: Option<String>,
}

/// The v2 object; binary-valued fields each carry at most one of their
/// three encodings
#[derive(Serialize, Deserialize, Default)]
#[serde(default)]
struct MacaroonJsonV2 {
    #[serde(rename = "c", skip_serializing_if = "Vec::is_empty")]
    caveats: Vec<CaveatJsonV2>,
    #[serde(rename = "l", skip_serializing_if = "Option::is_none")]
    location: Option<String>,
    #[serde(rename = "i", skip_serializing_if = "Option::is_none")]
    identifier: Option<String>,
    #[serde(rename = "iH", skip_serializing_if = "Option::is_none")]
    identifier_hex: Option<String>,
    #[serde(rename = "i64", skip_serializing_if = "Option::is_none")]
    identifier_b64: Option<String>,
    #[serde(rename = "s", skip_serializing_if = "Option::is_none")]
    signature: Option<String>,
    #[serde(rename = "sH", skip_serializing_if = "Option::is_none")]
    signature_hex: Option<String>,
    #[serde(rename = "s64", skip_serializing_if = "Option::is_none")]
    signature_b64: Option<String>,
}

#[derive(Serialize, Deserialize, Default)]
#[serde(default)]
struct CaveatJsonV2 {
    #[serde(rename = "i", skip_serializing_if = "Option::is_none")]
    cid: Option<String>,
    #[serde(rename = "iH", skip_serializing_if = "Option::is_none")]
    cid_hex: Option<String>,
    #[serde(rename = "i64", skip_serializing_if = "Option::is_none")]
    cid_b64: Option<String>,
    #[serde(rename = "v", skip_serializing_if = "Option::is_none")]
    vid: Option<String>,
    #[serde(rename = "vH", skip_serializing_if = "Option::is_none")]
    vid_hex: Option<String>,
    #[serde(rename = "v64", skip_serializing_if = "Option::is_none")]
    vid_b64: Option<String>,
    #[serde(rename = "l", skip_serializing_if = "Option::is_none")]
    location: Option<String>,
}

/// How a binary-valued v2 field is encoded, decided once from the key
/// suffix it arrived under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldEncoding {
    Utf8,
    Hex,
    Base64,
}

/// Decodes a binary-valued field, insisting that at most one of its three
/// encodings is present
fn decode_binary_field(
    field: &'static str,
    plain: &Option<String>,
    hex_value: &Option<String>,
    b64_value: &Option<String>,
) -> Result<Option<Vec<u8>>> {
    let mut found: Option<(FieldEncoding, &str)> = None;
    let candidates = [
        (FieldEncoding::Utf8, plain),
        (FieldEncoding::Hex, hex_value),
        (FieldEncoding::Base64, b64_value),
    ];
    for (encoding, value) in candidates {
        if let Some(value) = value {
            if found.is_some() {
                return Err(MacaroonError::AmbiguousFieldEncoding(field));
            }
            found = Some((encoding, value));
        }
    }
    match found {
        None => Ok(None),
        Some((FieldEncoding::Utf8, value)) => Ok(Some(value.as_bytes().to_vec())),
        Some((FieldEncoding::Hex, value)) => hex::decode(value)
            .map(Some)
            .map_err(|_| MacaroonError::InvalidFormat(format!("invalid hex in {field}"))),
        Some((FieldEncoding::Base64, value)) => base64_decode_any(value).map(Some),
    }
}

/// Emits a binary value under the bare key when it is valid UTF-8, else
/// under the `64` key as URL-safe unpadded base64
fn put_binary_field(bytes: &[u8], plain: &mut Option<String>, b64_value: &mut Option<String>) {
    match std::str::from_utf8(bytes) {
        Ok(s) => *plain = Some(s.to_string()),
        Err(_) => *b64_value = Some(URL_SAFE_NO_PAD.encode(bytes)),
    }
}

fn signature_array(sig: Vec<u8>) -> Result<[u8; SIGNATURE_SIZE]> {
    let len = sig.len();
    sig.try_into()
        .map_err(|_| MacaroonError::BadSignatureLength(len))
}

fn v1_object(m: &Macaroon) -> Result<MacaroonJsonV1> {
    let identifier = std::str::from_utf8(m.id())
        .map_err(|_| MacaroonError::FieldNotUtf8("identifier"))?
        .to_string();
    let mut caveats = Vec::with_capacity(m.caveats().len());
    for cav in m.caveats() {
        let cid = std::str::from_utf8(&cav.id)
            .map_err(|_| MacaroonError::FieldNotUtf8("cid in caveat"))?
            .to_string();
        caveats.push(CaveatJsonV1 {
            cid: Some(cid),
            vid: (!cav.verification_id.is_empty())
                .then(|| URL_SAFE_NO_PAD.encode(&cav.verification_id)),
            cl: (!cav.location.is_empty()).then(|| cav.location.clone()),
        });
    }
    Ok(MacaroonJsonV1 {
        caveats,
        location: (!m.location().is_empty()).then(|| m.location().to_string()),
        identifier: Some(identifier),
        signature: Some(hex::encode(m.signature())),
    })
}

fn macaroon_from_v1(object: MacaroonJsonV1) -> Result<Macaroon> {
    let identifier = object
        .identifier
        .ok_or(MacaroonError::MissingField("identifier"))?;
    let signature = object
        .signature
        .ok_or(MacaroonError::MissingField("signature"))?;
    let sig = hex::decode(&signature)
        .map_err(|_| MacaroonError::InvalidFormat("invalid hex in signature".to_string()))?;
    let sig = signature_array(sig)?;

    let mut caveats = Vec::with_capacity(object.caveats.len());
    for cav in object.caveats {
        let cid = cav.cid.ok_or(MacaroonError::MissingField("cid in caveat"))?;
        let vid = match cav.vid {
            Some(vid) => base64_decode_any(&vid)?,
            None => Vec::new(),
        };
        caveats.push(Caveat {
            id: cid.into_bytes(),
            verification_id: vid,
            location: cav.cl.unwrap_or_default(),
        });
    }

    Ok(Macaroon::from_parts(
        object.location.unwrap_or_default(),
        identifier.into_bytes(),
        caveats,
        sig,
        Version::V1,
    ))
}

fn v2_object(m: &Macaroon) -> MacaroonJsonV2 {
    let mut object = MacaroonJsonV2 {
        location: (!m.location().is_empty()).then(|| m.location().to_string()),
        ..Default::default()
    };
    put_binary_field(m.id(), &mut object.identifier, &mut object.identifier_b64);
    put_binary_field(
        m.signature(),
        &mut object.signature,
        &mut object.signature_b64,
    );
    for cav in m.caveats() {
        let mut cav_object = CaveatJsonV2 {
            location: (!cav.location.is_empty()).then(|| cav.location.clone()),
            ..Default::default()
        };
        put_binary_field(&cav.id, &mut cav_object.cid, &mut cav_object.cid_b64);
        if !cav.verification_id.is_empty() {
            put_binary_field(
                &cav.verification_id,
                &mut cav_object.vid,
                &mut cav_object.vid_b64,
            );
        }
        object.caveats.push(cav_object);
    }
    object
}

fn macaroon_from_v2(object: MacaroonJsonV2) -> Result<Macaroon> {
    let id = decode_binary_field(
        "identifier",
        &object.identifier,
        &object.identifier_hex,
        &object.identifier_b64,
    )?
    .ok_or(MacaroonError::MissingField("identifier"))?;
    let sig = decode_binary_field(
        "signature",
        &object.signature,
        &object.signature_hex,
        &object.signature_b64,
    )?
    .ok_or(MacaroonError::MissingField("signature"))?;
    let sig = signature_array(sig)?;

    let mut caveats = Vec::with_capacity(object.caveats.len());
    for cav in object.caveats {
        let cid = decode_binary_field("cid in caveat", &cav.cid, &cav.cid_hex, &cav.cid_b64)?
            .ok_or(MacaroonError::MissingField("cid in caveat"))?;
        let vid = decode_binary_field("vid in caveat", &cav.vid, &cav.vid_hex, &cav.vid_b64)?
            .unwrap_or_default();
        caveats.push(Caveat {
            id: cid,
            verification_id: vid,
            location: cav.location.unwrap_or_default(),
        });
    }

    Ok(Macaroon::from_parts(
        object.location.unwrap_or_default(),
        id,
        caveats,
        sig,
        Version::V2,
    ))
}
