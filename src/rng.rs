//! Secure randomness for salts, nonces and blob handles
//!
//! Callers take a `&mut dyn SecureRandom` so tests can substitute a seeded
//! CSPRNG. Implementations must be cryptographically secure.

use crate::error::{ErrorCategory, ErrorKind, Result, VaultError};
use rand::RngCore;
use rand::rngs::OsRng;

/// Source of cryptographically secure random bytes.
pub trait SecureRandom {
    /// Fill `dest` entirely, or fail without a partial result being used.
    fn fill(&mut self, dest: &mut [u8]) -> Result<()>;
}

/// The operating system's random source.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl SecureRandom for OsRandom {
    fn fill(&mut self, dest: &mut [u8]) -> Result<()> {
        OsRng.try_fill_bytes(dest).map_err(|e| {
            VaultError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::RandomnessUnavailable,
                "secure random source unavailable",
                e,
            )
        })
    }
}

/// Wraps any seedable CSPRNG from `rand`, e.g. `StdRng`.
///
/// Only for reproducible tests; production code uses [`OsRandom`].
#[derive(Debug)]
pub struct CsprngRandom<R>(pub R);

impl<R: RngCore + rand::CryptoRng> SecureRandom for CsprngRandom<R> {
    fn fill(&mut self, dest: &mut [u8]) -> Result<()> {
        self.0.try_fill_bytes(dest).map_err(|e| {
            VaultError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::RandomnessUnavailable,
                "secure random source unavailable",
                e,
            )
        })
    }
}
