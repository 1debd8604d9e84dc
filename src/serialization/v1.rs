//! The v1 packet framing: each line-oriented packet opens with four
//! lowercase-hex digits giving the total packet length (those four bytes
//! included), followed by the field name, a space, the value, and a newline.

use crate::caveat::Caveat;
use crate::crypto::SIGNATURE_SIZE;
use crate::macaroon::{Macaroon, Version};
use crate::{MacaroonError, Result};

const HEADER_SIZE: usize = 4;
const MAX_PACKET_SIZE: usize = 0xffff;

pub(crate) fn encode(m: &Macaroon) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    append_packet(&mut out, b"location", m.location().as_bytes())?;
    require_utf8(m.id(), "identifier")?;
    append_packet(&mut out, b"identifier", m.id())?;
    for cav in m.caveats() {
        require_utf8(&cav.id, "cid in caveat")?;
        append_packet(&mut out, b"cid", &cav.id)?;
        if !cav.verification_id.is_empty() {
            append_packet(&mut out, b"vid", &cav.verification_id)?;
        }
        if !cav.location.is_empty() {
            append_packet(&mut out, b"cl", cav.location.as_bytes())?;
        }
    }
    append_packet(&mut out, b"signature", m.signature())?;
    Ok(out)
}

pub(crate) fn decode(data: &[u8]) -> Result<(Macaroon, &[u8])> {
    let (field, value, rest) = parse_packet(data)?;
    if field != b"location" {
        return Err(MacaroonError::InvalidFormat(
            "expected location packet".to_string(),
        ));
    }
    let location = utf8_string(value, "location")?;

    let (field, value, rest) = parse_packet(rest)?;
    if field != b"identifier" {
        return Err(MacaroonError::InvalidFormat(
            "expected identifier packet".to_string(),
        ));
    }
    require_utf8(value, "identifier")?;
    let id = value.to_vec();

    let mut caveats: Vec<Caveat> = Vec::new();
    let mut data = rest;
    loop {
        let (field, value, rest) = parse_packet(data)?;
        data = rest;
        match field {
            b"cid" => {
                require_utf8(value, "cid in caveat")?;
                caveats.push(Caveat::first_party(value));
            }
            b"vid" => {
                let Some(cav) = caveats.last_mut() else {
                    return Err(MacaroonError::InvalidFormat(
                        "vid packet without a preceding cid".to_string(),
                    ));
                };
                if !cav.verification_id.is_empty() {
                    return Err(MacaroonError::InvalidFormat(
                        "duplicate vid packet in caveat".to_string(),
                    ));
                }
                cav.verification_id = value.to_vec();
            }
            b"cl" => {
                let Some(cav) = caveats.last_mut() else {
                    return Err(MacaroonError::InvalidFormat(
                        "cl packet without a preceding cid".to_string(),
                    ));
                };
                if !cav.location.is_empty() {
                    return Err(MacaroonError::InvalidFormat(
                        "duplicate cl packet in caveat".to_string(),
                    ));
                }
                cav.location = utf8_string(value, "cl in caveat")?;
            }
            b"signature" => {
                if value.len() != SIGNATURE_SIZE {
                    return Err(MacaroonError::BadSignatureLength(value.len()));
                }
                let mut sig = [0u8; SIGNATURE_SIZE];
                sig.copy_from_slice(value);
                let m = Macaroon::from_parts(location, id, caveats, sig, Version::V1);
                return Ok((m, data));
            }
            other => {
                return Err(MacaroonError::InvalidFormat(format!(
                    "unexpected packet {:?}",
                    String::from_utf8_lossy(other)
                )));
            }
        }
    }
}

fn append_packet(out: &mut Vec<u8>, field: &[u8], value: &[u8]) -> Result<()> {
    let size = HEADER_SIZE + field.len() + 1 + value.len() + 1;
    if size > MAX_PACKET_SIZE {
        return Err(MacaroonError::InvalidFormat(format!(
            "{} field is too long for a v1 macaroon",
            String::from_utf8_lossy(field)
        )));
    }
    out.extend_from_slice(format!("{size:04x}").as_bytes());
    out.extend_from_slice(field);
    out.push(b' ');
    out.extend_from_slice(value);
    out.push(b'\n');
    Ok(())
}

/// Splits one packet off the front of `data` into field name, value, and
/// the remaining input
fn parse_packet(data: &[u8]) -> Result<(&[u8], &[u8], &[u8])> {
    if data.len() < HEADER_SIZE {
        return Err(MacaroonError::TruncatedPacket);
    }
    let size = parse_size(&data[..HEADER_SIZE])?;
    if size < HEADER_SIZE + 2 {
        return Err(MacaroonError::InvalidFormat(
            "packet size too small".to_string(),
        ));
    }
    if size > data.len() {
        return Err(MacaroonError::TruncatedPacket);
    }
    let body = &data[HEADER_SIZE..size];
    if body.last() != Some(&b'\n') {
        return Err(MacaroonError::InvalidFormat(
            "packet is not newline-terminated".to_string(),
        ));
    }
    let body = &body[..body.len() - 1];
    let sep = body.iter().position(|&b| b == b' ').ok_or_else(|| {
        MacaroonError::InvalidFormat("packet has no field separator".to_string())
    })?;
    Ok((&body[..sep], &body[sep + 1..], &data[size..]))
}

/// Parses a four-digit lowercase-hex length prefix
fn parse_size(header: &[u8]) -> Result<usize> {
    let mut size = 0usize;
    for &c in header {
        let digit = match c {
            b'0'..=b'9' => c - b'0',
            b'a'..=b'f' => c - b'a' + 10,
            _ => {
                return Err(MacaroonError::InvalidFormat(
                    "invalid packet size prefix".to_string(),
                ))
            }
        };
        size = size << 4 | digit as usize;
    }
    Ok(size)
}

fn require_utf8(value: &[u8], field: &'static str) -> Result<()> {
    std::str::from_utf8(value)
        .map(|_| ())
        .map_err(|_| MacaroonError::FieldNotUtf8(field))
}

fn utf8_string(value: &[u8], field: &'static str) -> Result<String> {
    Ok(std::str::from_utf8(value)
        .map_err(|_| MacaroonError::FieldNotUtf8(field))?
        .to_string())
}
