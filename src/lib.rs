pub mod caveat;
pub mod crypto;
pub mod error;
pub mod macaroon;
pub mod random;
pub mod serialization;
pub mod slice;
pub mod verifier;

pub use caveat::Caveat;
pub use error::MacaroonError;
pub use macaroon::{Macaroon, Version, LATEST_VERSION};
pub use slice::Slice;

/// Result type for macaroon operations
pub type Result<T> = std::result::Result<T, MacaroonError>;
