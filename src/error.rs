use std::error::Error as StdError;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorCategory {
    /// Any failure that cannot be confidently attributed to any other error
    /// category in this enum.
    ///
    /// Use of Internal is never a guarantee that the error is not, for
    /// example, due to a user error - merely that it cannot be confidently
    /// determined by the code.
    Internal,

    /// The user provided invalid input or performed an action that is
    /// unsupported or impossible to complete.
    User,
}

/// Fine-grained condition flags for consumers that want to branch on error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Input is shorter than the 28-byte salt+nonce floor of an envelope.
    MalformedEnvelope,
    /// Authentication failed due to an incorrect passphrase, tampering or
    /// corruption. These causes are deliberately not distinguished.
    AuthenticationFailed,
    /// The secure random source could not supply salt or nonce bytes.
    RandomnessUnavailable,
    /// AES-256-GCM refused to seal the plaintext.
    AeadFailure,
    /// The armored representation is malformed.
    ArmoringInvalid,
    /// Base64 decoding of the armored payload failed.
    ArmoringDecode,
    /// Input claimed to be armored securevault data but used an unsupported version.
    ArmoringFromFuture,
    /// Passphrase could not be obtained from the configured reader.
    PassphraseUnavailable,
    /// Passphrase is shorter than the configured minimum.
    PassphraseTooShort,
    /// A blob handle is not of the form issued by the store.
    InvalidHandle,
    /// No blob is stored under the given handle.
    BlobNotFound,
    /// Interaction with the filesystem, stdin/stdout, or other I/O failed.
    Io,
}

#[derive(Debug, Error)]
#[error("{msg}")]
pub struct VaultError {
    /// Broad error category, always provided.
    pub category: ErrorCategory,
    /// Optional specific condition tag for consumers that need to
    /// branch their behavior. Any code consuming errors MUST handle
    /// the absence of a defined kind.
    pub kind: Option<ErrorKind>,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    msg: String,
}

impl VaultError {
    /// Creates a new error with a required category and display message.
    pub fn new(category: ErrorCategory, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind: None,
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that also tags the failure with a kind.
    pub fn with_kind(category: ErrorCategory, kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind: Some(kind),
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that carries both a kind tag and the originating source error.
    pub fn with_kind_and_source(
        category: ErrorCategory,
        kind: ErrorKind,
        msg: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            category,
            kind: Some(kind),
            source: Some(Box::new(source)),
            msg: msg.into(),
        }
    }

    /// Shorthand for an I/O failure with the io::Error kept as source.
    pub(crate) fn io(category: ErrorCategory, msg: impl Into<String>, err: std::io::Error) -> Self {
        Self::with_kind_and_source(category, ErrorKind::Io, msg, err)
    }

    /// The user-facing message carried by the error.
    pub fn message(&self) -> &str {
        &self.msg
    }

    /// Returns the preserved source error if present.
    pub fn source_error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    /// Wraps the current error with a higher-level message while preserving the original as source.
    pub fn with_context(self, msg: impl Into<String>) -> Self {
        let category = self.category;
        let kind = self.kind;
        Self {
            category,
            kind,
            source: Some(Box::new(self)),
            msg: msg.into(),
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, VaultError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_preserves_kind_and_category() {
        let err = VaultError::with_kind(
            ErrorCategory::User,
            ErrorKind::AuthenticationFailed,
            "inner",
        )
        .with_context("failed to decrypt");

        assert_eq!(err.kind, Some(ErrorKind::AuthenticationFailed));
        assert_eq!(err.category, ErrorCategory::User);
        assert_eq!(err.message(), "failed to decrypt");
        assert_eq!(err.source_error().unwrap().to_string(), "inner");
    }

    #[test]
    fn test_new_has_no_kind() {
        let err = VaultError::new(ErrorCategory::Internal, "boom");
        assert_eq!(err.kind, None);
        assert!(err.source_error().is_none());
        assert_eq!(err.to_string(), "boom");
    }
}
