//! Passphrase to key derivation using PBKDF2-HMAC-SHA256
//!
//! The iteration count is what makes offline guessing expensive. It is part
//! of the envelope format (there is no header to record it), so changing it
//! breaks every existing envelope.

use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use zeroize::Zeroizing;

/// Length of salt in bytes
pub const SALT_LEN: usize = 16;

/// Length of derived key in bytes (AES-256)
pub const KEY_LEN: usize = 32;

/// PBKDF2 iteration count
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Derive a 32-byte key from a passphrase and salt.
///
/// Deterministic and infallible; an empty passphrase yields a weak but valid
/// key. The result is wiped from memory when dropped.
pub fn derive_key(passphrase: &[u8], salt: &[u8; SALT_LEN]) -> Zeroizing<[u8; KEY_LEN]> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2_hmac::<Sha256>(passphrase, salt, PBKDF2_ITERATIONS, &mut key[..]);
    key
}
