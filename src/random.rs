use std::io;

use rand::rngs::OsRng;
use rand::TryRngCore;

/// A source of cryptographically secure random bytes.
///
/// The nonce used to seal third-party caveat keys is drawn from an injected
/// source so that callers (and tests) can substitute their own. Failures are
/// reported as [`crate::MacaroonError::RandomFailed`] by the operations that
/// consume the source.
pub trait RandomSource {
    /// Fills `buf` with random bytes, or reports why it could not
    fn fill(&mut self, buf: &mut [u8]) -> io::Result<()>;
}

/// The default random source, backed by the operating system CSPRNG
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRandom;

impl RandomSource for SystemRandom {
    fn fill(&mut self, buf: &mut [u8]) -> io::Result<()> {
        OsRng.try_fill_bytes(buf).map_err(io::Error::other)
    }
}

/// A random source that always fails with "fail".
///
/// Useful for exercising the RNG failure path of third-party attenuation.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingRandom;

impl RandomSource for FailingRandom {
    fn fill(&mut self, _buf: &mut [u8]) -> io::Result<()> {
        Err(io::Error::other("fail"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_random_fills() {
        let mut buf = [0u8; 24];
        SystemRandom.fill(&mut buf).unwrap();
        // 24 zero bytes from a healthy CSPRNG is a 2^-192 event
        assert_ne!(buf, [0u8; 24]);
    }

    #[test]
    fn test_failing_random_reports_error() {
        let mut buf = [0u8; 8];
        let err = FailingRandom.fill(&mut buf).unwrap_err();
        assert_eq!(err.to_string(), "fail");
    }
}
