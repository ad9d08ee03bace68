//! Optional text armor for envelopes
//!
//! Raw envelopes are binary. For pasting into chat, mail or a shell the CLI
//! can wrap them as `securevault1:{base64url-no-padding}`. The armored form
//! is:
//! - Free of whitespace (including newlines)
//! - Safe to embed in URLs
//! - Safe to pass unescaped in a POSIX shell
//!
//! The prefix lives outside the envelope; it is stripped before decoding.

use crate::error::{ErrorCategory, ErrorKind, Result, VaultError};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};

/// Magic prefix for all armor versions
const MAGIC_PREFIX: &[u8] = b"securevault";

/// Version 1 magic marker
const V1_MAGIC: &str = "securevault1:";

/// Wrap envelope bytes in armor, returning the armored string
pub fn wrap(envelope: &[u8]) -> String {
    let encoded = URL_SAFE_NO_PAD.encode(envelope);
    format!("{}{}", V1_MAGIC, encoded)
}

/// Whether `data` claims to be armored (any version).
///
/// A raw envelope starts with a random salt, so a false positive needs the
/// first eleven salt bytes to spell the prefix.
pub fn is_armored(data: &[u8]) -> bool {
    data.starts_with(MAGIC_PREFIX)
}

/// Unwrap an armored string, returning the envelope bytes
pub fn unwrap(armored: &str) -> Result<Vec<u8>> {
    // Tolerate a trailing newline added by editors or `echo`.
    let armored = armored.trim_end_matches(['\r', '\n']);

    if armored.len() < V1_MAGIC.len() && !V1_MAGIC.starts_with(armored) {
        return Err(VaultError::with_kind(
            ErrorCategory::User,
            ErrorKind::ArmoringInvalid,
            "input unrecognized as armored securevault data",
        ));
    }
    if armored.len() < V1_MAGIC.len() {
        return Err(VaultError::with_kind(
            ErrorCategory::User,
            ErrorKind::ArmoringInvalid,
            "input size smaller than magic marker; likely truncated",
        ));
    }

    if let Some(encoded) = armored.strip_prefix(V1_MAGIC) {
        let body = URL_SAFE_NO_PAD.decode(encoded).map_err(|e| {
            VaultError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::ArmoringDecode,
                format!("base64 decoding failed: {}", e),
                e,
            )
        })?;
        Ok(body)
    } else if is_armored(armored.as_bytes()) {
        Err(VaultError::with_kind(
            ErrorCategory::User,
            ErrorKind::ArmoringFromFuture,
            "input claims to be armored securevault data, but not a version we support",
        ))
    } else {
        Err(VaultError::with_kind(
            ErrorCategory::User,
            ErrorKind::ArmoringInvalid,
            "input unrecognized as armored securevault data",
        ))
    }
}
