use crate::macaroon::Macaroon;
use crate::serialization;
use crate::Result;

/// A bundle of macaroons: a primary followed by its bound discharges.
///
/// The binary form is simply the concatenation of the members' binary forms,
/// so a whole request credential travels as one blob.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Slice(pub Vec<Macaroon>);

impl Slice {
    /// Returns the primary macaroon, if the bundle is non-empty
    pub fn primary(&self) -> Option<&Macaroon> {
        self.0.first()
    }

    /// Returns the discharge macaroons accompanying the primary
    pub fn discharges(&self) -> &[Macaroon] {
        if self.0.is_empty() {
            &[]
        } else {
            &self.0[1..]
        }
    }

    /// Serializes every member in order, each in its own version's binary
    /// form
    pub fn to_binary(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        for m in &self.0 {
            out.extend_from_slice(&m.to_binary()?);
        }
        Ok(out)
    }

    /// Deserializes a concatenation of binary macaroons
    pub fn from_binary(data: &[u8]) -> Result<Self> {
        let mut macaroons = Vec::new();
        let mut rest = data;
        while !rest.is_empty() {
            let (m, remaining) = serialization::decode_any(rest)?;
            macaroons.push(m);
            rest = remaining;
        }
        Ok(Self(macaroons))
    }
}

impl FromIterator<Macaroon> for Slice {
    fn from_iter<I: IntoIterator<Item = Macaroon>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
