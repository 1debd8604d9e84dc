/// A caveat is a restriction on the authorization granted by a macaroon.
///
/// First-party caveats carry a condition that the verifying service evaluates
/// itself. Third-party caveats carry an opaque identifier together with a
/// verification id that seals the discharge root key; they are satisfied by a
/// separate discharge macaroon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caveat {
    /// The condition bytes (first-party) or the third party's opaque
    /// identifier. First-party conditions must be valid UTF-8.
    pub id: Vec<u8>,

    /// The sealed discharge root key; empty for first-party caveats
    pub verification_id: Vec<u8>,

    /// Advisory location of the discharging third party; empty for
    /// first-party caveats. Never authenticated.
    pub location: String,
}

impl Caveat {
    /// Creates a new first-party caveat
    pub fn first_party(id: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            verification_id: Vec::new(),
            location: String::new(),
        }
    }

    /// Creates a new third-party caveat
    pub fn third_party(
        id: impl Into<Vec<u8>>,
        verification_id: impl Into<Vec<u8>>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            verification_id: verification_id.into(),
            location: location.into(),
        }
    }

    /// Returns true if this is a first-party caveat
    pub fn is_first_party(&self) -> bool {
        self.verification_id.is_empty()
    }

    /// Returns true if this is a third-party caveat
    pub fn is_third_party(&self) -> bool {
        !self.is_first_party()
    }
}
