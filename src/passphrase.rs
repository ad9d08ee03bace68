//! Passphrase reading and the minimum length gate

use crate::error::{ErrorCategory, ErrorKind, Result, VaultError};
use std::io::{self, IsTerminal, Read, Write};
use zeroize::Zeroizing;

/// Shortest passphrase accepted for new encryptions unless configured otherwise.
pub const DEFAULT_MIN_PASSPHRASE_LEN: usize = 6;

/// Trait for reading passphrases from various sources
pub trait PassphraseReader {
    /// Read a passphrase as arbitrary bytes (not necessarily UTF-8)
    ///
    /// Returns the passphrase wrapped in `Zeroizing` to ensure it is securely
    /// wiped from memory when dropped.
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>>;
}

/// Returns a fixed passphrase (for testing)
pub struct ConstantPassphraseReader {
    passphrase: Zeroizing<Vec<u8>>,
}

impl ConstantPassphraseReader {
    pub fn new(passphrase: Vec<u8>) -> Self {
        Self {
            passphrase: Zeroizing::new(passphrase),
        }
    }
}

impl PassphraseReader for ConstantPassphraseReader {
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        Ok(Zeroizing::new((*self.passphrase).clone()))
    }
}

/// Reads passphrase from any io::Read source, consuming it to the end
pub struct ReaderPassphraseReader {
    reader: Box<dyn Read>,
}

impl ReaderPassphraseReader {
    pub fn new(reader: Box<dyn Read>) -> Self {
        Self { reader }
    }
}

impl PassphraseReader for ReaderPassphraseReader {
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        let mut data = Zeroizing::new(Vec::new());
        self.reader.read_to_end(&mut data).map_err(|e| {
            VaultError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::PassphraseUnavailable,
                format!("error reading passphrase: {}", e),
                e,
            )
        })?;
        Ok(data)
    }
}

/// Reads passphrase from terminal with no echo
#[derive(Default)]
pub struct TerminalPassphraseReader;

impl TerminalPassphraseReader {
    pub fn new() -> Self {
        Self
    }
}

impl PassphraseReader for TerminalPassphraseReader {
    /// Read passphrase from terminal.
    ///
    /// Note: Terminal input is limited to UTF-8 due to rpassword library constraints.
    /// For non-UTF-8 passphrases, use --passphrase-stdin instead.
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        if !io::stdin().is_terminal() {
            return Err(VaultError::with_kind(
                ErrorCategory::User,
                ErrorKind::PassphraseUnavailable,
                "cannot read passphrase from terminal - stdin is not a terminal",
            ));
        }

        let mut stderr = io::stderr();
        stderr
            .write_all(b"Passphrase (securevault): ")
            .and_then(|()| stderr.flush())
            .map_err(|e| VaultError::io(ErrorCategory::Internal, "failed to write prompt", e))?;

        // rpassword returns a String, which is not zeroized itself
        let passphrase = rpassword::read_password().map_err(|e| {
            VaultError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::PassphraseUnavailable,
                format!("failure reading passphrase: {}", e),
                e,
            )
        })?;

        Ok(Zeroizing::new(passphrase.into_bytes()))
    }
}

/// Reject passphrases shorter than `min_len`.
///
/// Length counts characters for UTF-8 input and bytes otherwise. A
/// `min_len` of zero disables the gate. Only applied when encrypting; a
/// passphrase that once produced an envelope must always be able to open it.
pub fn check_min_length(passphrase: &[u8], min_len: usize) -> Result<()> {
    let len = match std::str::from_utf8(passphrase) {
        Ok(s) => s.chars().count(),
        Err(_) => passphrase.len(),
    };
    if len < min_len {
        return Err(VaultError::with_kind(
            ErrorCategory::User,
            ErrorKind::PassphraseTooShort,
            format!("passphrase must be at least {} characters", min_len),
        ));
    }
    Ok(())
}
