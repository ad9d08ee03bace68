//! Password-based encryption envelope using PBKDF2 + AES-256-GCM
//!
//! The binary format is:
//! - salt: 16 bytes
//! - nonce: 12 bytes
//! - sealed box: variable length (ciphertext followed by the 16-byte GCM tag)
//!
//! There is no header, version byte or length prefix. The envelope carries
//! no metadata about the plaintext; file names travel out of band.

use crate::error::{ErrorCategory, ErrorKind, Result, VaultError};
use crate::kdf::{self, SALT_LEN};
use crate::rng::{OsRandom, SecureRandom};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};

/// Length of nonce in bytes
pub const NONCE_LEN: usize = 12;

/// Length of the GCM authentication tag in bytes
pub const TAG_LEN: usize = 16;

/// Smallest well-formed envelope: salt and nonce with nothing after them.
///
/// Anything at least this long is handed to the cipher, which rejects
/// sealed boxes shorter than a tag as an authentication failure.
pub const MIN_ENVELOPE_LEN: usize = SALT_LEN + NONCE_LEN;

/// Borrowed view over the three regions of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeView<'a> {
    pub salt: &'a [u8; SALT_LEN],
    pub nonce: &'a [u8; NONCE_LEN],
    /// Ciphertext with the trailing tag.
    pub sealed: &'a [u8],
}

impl<'a> EnvelopeView<'a> {
    /// Split envelope bytes into salt, nonce and sealed box.
    pub fn parse(envelope: &'a [u8]) -> Result<Self> {
        if envelope.len() < MIN_ENVELOPE_LEN {
            return Err(VaultError::with_kind(
                ErrorCategory::User,
                ErrorKind::MalformedEnvelope,
                format!(
                    "input too short to be an envelope ({} bytes, need at least {})",
                    envelope.len(),
                    MIN_ENVELOPE_LEN
                ),
            ));
        }

        let (salt, rest) = envelope.split_at(SALT_LEN);
        let (nonce, sealed) = rest.split_at(NONCE_LEN);
        let salt = salt.try_into().map_err(|_| invariant("salt split"))?;
        let nonce = nonce.try_into().map_err(|_| invariant("nonce split"))?;

        Ok(Self {
            salt,
            nonce,
            sealed,
        })
    }

    /// Serialize the regions back into one envelope.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut output = Vec::with_capacity(MIN_ENVELOPE_LEN + self.sealed.len());
        output.extend_from_slice(self.salt);
        output.extend_from_slice(self.nonce);
        output.extend_from_slice(self.sealed);
        output
    }
}

/// Encrypt plaintext with a passphrase using random salt and nonce from the OS.
///
/// Returns the binary format: salt(16) + nonce(12) + sealedbox(plaintext + 16)
pub fn encode(plaintext: &[u8], passphrase: &[u8]) -> Result<Vec<u8>> {
    encode_with(&mut OsRandom, plaintext, passphrase)
}

/// Encrypt plaintext with a passphrase, drawing salt then nonce from `rng`.
pub fn encode_with(
    rng: &mut dyn SecureRandom,
    plaintext: &[u8],
    passphrase: &[u8],
) -> Result<Vec<u8>> {
    let mut salt = [0u8; SALT_LEN];
    rng.fill(&mut salt)?;

    let mut nonce = [0u8; NONCE_LEN];
    rng.fill(&mut nonce)?;

    encode_deterministic(plaintext, passphrase, &salt, &nonce)
}

/// Encrypt plaintext with a passphrase using provided salt and nonce
///
/// This function is ONLY for testing purposes to generate deterministic output.
/// NEVER use this in production - reusing a nonce under the same key breaks
/// AES-GCM. Always use `encode()` which generates random salt/nonce.
pub fn encode_deterministic(
    plaintext: &[u8],
    passphrase: &[u8],
    salt: &[u8; SALT_LEN],
    nonce: &[u8; NONCE_LEN],
) -> Result<Vec<u8>> {
    let key = kdf::derive_key(passphrase, salt);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key[..]));

    let sealed = cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|_| {
            VaultError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::AeadFailure,
                "AES-256-GCM refused to seal the plaintext",
            )
        })?;

    Ok(EnvelopeView {
        salt,
        nonce,
        sealed: &sealed,
    }
    .to_bytes())
}

/// Decrypt an envelope with a passphrase.
///
/// Wrong passphrase, truncation, corruption and tampering all produce the
/// same `AuthenticationFailed` error, and no plaintext is released.
pub fn decode(envelope: &[u8], passphrase: &[u8]) -> Result<Vec<u8>> {
    let view = EnvelopeView::parse(envelope)?;

    let key = kdf::derive_key(passphrase, view.salt);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key[..]));

    cipher
        .decrypt(Nonce::from_slice(view.nonce), view.sealed)
        .map_err(|_| {
            VaultError::with_kind(
                ErrorCategory::User,
                ErrorKind::AuthenticationFailed,
                "wrong passphrase, or corrupted or tampered-with data",
            )
        })
}

fn invariant(what: &str) -> VaultError {
    VaultError::new(
        ErrorCategory::Internal,
        format!("envelope invariant violated: {}", what),
    )
}
