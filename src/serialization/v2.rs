//! The v2 typed-field framing: a leading version byte, then sections of
//! (uvarint tag, uvarint length, value) fields, each section closed by a
//! zero tag. One header section, one section per caveat, an empty section
//! closing the caveat list, then the signature field.

use crate::caveat::Caveat;
use crate::crypto::SIGNATURE_SIZE;
use crate::macaroon::{Macaroon, Version};
use crate::{MacaroonError, Result};

pub(crate) const VERSION_BYTE: u8 = 2;

const TAG_LOCATION: u64 = 1;
const TAG_IDENTIFIER: u64 = 2;
const TAG_VID: u64 = 4;
const TAG_SIGNATURE: u64 = 6;

pub(crate) fn encode(m: &Macaroon) -> Result<Vec<u8>> {
    let mut out = vec![VERSION_BYTE];
    if !m.location().is_empty() {
        append_field(&mut out, TAG_LOCATION, m.location().as_bytes());
    }
    append_field(&mut out, TAG_IDENTIFIER, m.id());
    out.push(0);
    for cav in m.caveats() {
        if !cav.location.is_empty() {
            append_field(&mut out, TAG_LOCATION, cav.location.as_bytes());
        }
        append_field(&mut out, TAG_IDENTIFIER, &cav.id);
        if !cav.verification_id.is_empty() {
            append_field(&mut out, TAG_VID, &cav.verification_id);
        }
        out.push(0);
    }
    out.push(0);
    append_field(&mut out, TAG_SIGNATURE, m.signature());
    Ok(out)
}

pub(crate) fn decode(data: &[u8]) -> Result<(Macaroon, &[u8])> {
    let (&version, rest) = data.split_first().ok_or_else(|| {
        MacaroonError::InvalidFormat("empty macaroon data".to_string())
    })?;
    if version != VERSION_BYTE {
        return Err(MacaroonError::UnknownVersion(version));
    }

    let (fields, rest) = read_section(rest)?;
    let (location, id, vid) = section_parts(&fields)?;
    if vid.is_some() {
        return Err(MacaroonError::InvalidFormat(
            "unexpected vid field in header section".to_string(),
        ));
    }
    let location = utf8_location(location)?;
    let id = id.to_vec();

    let mut caveats: Vec<Caveat> = Vec::new();
    let mut data = rest;
    loop {
        // A bare end-of-section closes the caveat list
        if data.first() == Some(&0) {
            data = &data[1..];
            break;
        }
        let (fields, rest) = read_section(data)?;
        data = rest;
        let (cav_location, cav_id, cav_vid) = section_parts(&fields)?;
        caveats.push(Caveat {
            id: cav_id.to_vec(),
            verification_id: cav_vid.map(<[u8]>::to_vec).unwrap_or_default(),
            location: utf8_location(cav_location)?,
        });
    }

    let (field, rest) = read_field(data)?;
    let Some((TAG_SIGNATURE, sig_bytes)) = field else {
        return Err(MacaroonError::MissingField("signature"));
    };
    if sig_bytes.len() != SIGNATURE_SIZE {
        return Err(MacaroonError::BadSignatureLength(sig_bytes.len()));
    }
    let mut sig = [0u8; SIGNATURE_SIZE];
    sig.copy_from_slice(sig_bytes);

    Ok((
        Macaroon::from_parts(location, id, caveats, sig, Version::V2),
        rest,
    ))
}

fn append_field(out: &mut Vec<u8>, tag: u64, value: &[u8]) {
    append_uvarint(out, tag);
    append_uvarint(out, value.len() as u64);
    out.extend_from_slice(value);
}

fn append_uvarint(out: &mut Vec<u8>, mut n: u64) {
    while n >= 0x80 {
        out.push(n as u8 | 0x80);
        n >>= 7;
    }
    out.push(n as u8);
}

fn read_uvarint(data: &[u8]) -> Result<(u64, &[u8])> {
    let mut value: u64 = 0;
    let mut shift = 0;
    for (i, &b) in data.iter().enumerate() {
        if shift >= 64 {
            return Err(MacaroonError::InvalidFormat(
                "varint overflows 64 bits".to_string(),
            ));
        }
        value |= u64::from(b & 0x7f) << shift;
        if b & 0x80 == 0 {
            return Ok((value, &data[i + 1..]));
        }
        shift += 7;
    }
    Err(MacaroonError::TruncatedPacket)
}

/// Reads one field; `None` marks an end-of-section tag
fn read_field(data: &[u8]) -> Result<(Option<(u64, &[u8])>, &[u8])> {
    let (tag, rest) = read_uvarint(data)?;
    if tag == 0 {
        return Ok((None, rest));
    }
    let (len, rest) = read_uvarint(rest)?;
    let len = usize::try_from(len)
        .map_err(|_| MacaroonError::TruncatedPacket)?;
    if len > rest.len() {
        return Err(MacaroonError::TruncatedPacket);
    }
    Ok((Some((tag, &rest[..len])), &rest[len..]))
}

fn read_section(mut data: &[u8]) -> Result<(Vec<(u64, &[u8])>, &[u8])> {
    let mut fields = Vec::new();
    loop {
        let (field, rest) = read_field(data)?;
        data = rest;
        match field {
            None => return Ok((fields, data)),
            Some(pair) => fields.push(pair),
        }
    }
}

/// Destructures a section into (optional location, required identifier,
/// optional vid), in that tag order
#[allow(clippy::type_complexity)]
fn section_parts<'a>(
    fields: &[(u64, &'a [u8])],
) -> Result<(Option<&'a [u8]>, &'a [u8], Option<&'a [u8]>)> {
    let mut i = 0;
    let mut location = None;
    if let Some(&(TAG_LOCATION, value)) = fields.get(i) {
        location = Some(value);
        i += 1;
    }
    let id = match fields.get(i) {
        Some(&(TAG_IDENTIFIER, value)) => {
            i += 1;
            value
        }
        _ => return Err(MacaroonError::MissingField("identifier")),
    };
    let mut vid = None;
    if let Some(&(TAG_VID, value)) = fields.get(i) {
        vid = Some(value);
        i += 1;
    }
    if i != fields.len() {
        return Err(MacaroonError::InvalidFormat(format!(
            "unexpected field with tag {} in section",
            fields[i].0
        )));
    }
    Ok((location, id, vid))
}

fn utf8_location(value: Option<&[u8]>) -> Result<String> {
    match value {
        None => Ok(String::new()),
        Some(bytes) => Ok(std::str::from_utf8(bytes)
            .map_err(|_| MacaroonError::FieldNotUtf8("location"))?
            .to_string()),
    }
}
