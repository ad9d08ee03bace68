//! File encryption/decryption operations
//!
//! This module provides high-level file operations for encrypting, decrypting,
//! updating, uploading and downloading files using the envelope format.

use crate::armor;
use crate::envelope;
use crate::error::{ErrorCategory, ErrorKind, Result, VaultError};
use crate::passphrase::{DEFAULT_MIN_PASSPHRASE_LEN, PassphraseReader, check_min_length};
use crate::store::{BlobHandle, BlobStore};
use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Conventional suffix for encrypted files. Presentation only.
pub const ENCRYPTED_SUFFIX: &str = "enc";

/// Knobs for operations that create new envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncryptOptions {
    /// Write the text armor instead of the raw binary envelope.
    pub armor: bool,
    /// Reject shorter passphrases; zero disables the check.
    pub min_passphrase_len: usize,
}

impl Default for EncryptOptions {
    fn default() -> Self {
        Self {
            armor: false,
            min_passphrase_len: DEFAULT_MIN_PASSPHRASE_LEN,
        }
    }
}

/// `secret.pdf` -> `secret.pdf.enc`
pub fn default_encrypted_path(input: &Path) -> PathBuf {
    let mut name = OsString::from(input.as_os_str());
    name.push(".");
    name.push(ENCRYPTED_SUFFIX);
    PathBuf::from(name)
}

/// `secret.pdf.enc` -> `secret.pdf`
///
/// Fails when the input does not carry the suffix, since stripping nothing
/// would point the output at the input itself.
pub fn default_decrypted_path(input: &Path) -> Result<PathBuf> {
    match (input.extension(), input.file_stem()) {
        (Some(ext), Some(stem)) if ext == ENCRYPTED_SUFFIX && !stem.is_empty() => {
            Ok(input.with_file_name(stem))
        }
        _ => Err(VaultError::new(
            ErrorCategory::User,
            format!(
                "cannot infer output path: {} does not end in .{}; pass --output",
                input.display(),
                ENCRYPTED_SUFFIX
            ),
        )),
    }
}

/// Encrypt a file with a passphrase
///
/// Reads plaintext from `input_path`, encrypts it using a passphrase from
/// `passphrase_reader`, and writes the envelope to `output_path`.
///
/// The output file is created with mode 0o600 (read/write for owner only) on Unix systems.
pub fn encrypt_file(
    input_path: &Path,
    output_path: &Path,
    passphrase_reader: &mut dyn PassphraseReader,
    options: &EncryptOptions,
) -> Result<()> {
    let plaintext = fs::read(input_path).map_err(|e| read_error(input_path, e))?;
    let sealed = seal(&plaintext, passphrase_reader, options)?;
    write_file_secure(output_path, &sealed)
        .map_err(|e| e.with_context(format!("failed to write to {}", output_path.display())))?;

    info!(
        input = %input_path.display(),
        output = %output_path.display(),
        bytes = plaintext.len(),
        "encrypted file"
    );
    Ok(())
}

/// Decrypt a file with a passphrase
///
/// Reads a raw or armored envelope from `input_path`, decrypts it using a
/// passphrase from `passphrase_reader`, and writes the plaintext to
/// `output_path`. Nothing is written unless authentication succeeds.
///
/// The output file is created with mode 0o600 (read/write for owner only) on Unix systems.
pub fn decrypt_file(
    input_path: &Path,
    output_path: &Path,
    passphrase_reader: &mut dyn PassphraseReader,
) -> Result<()> {
    let data = fs::read(input_path).map_err(|e| read_error(input_path, e))?;
    let (envelope_bytes, _) = unarmor(&data)?;
    let passphrase = passphrase_reader.read_passphrase()?;
    let plaintext = envelope::decode(&envelope_bytes, &passphrase)
        .map_err(|e| e.with_context("failed to decrypt"))?;
    write_file_secure(output_path, &plaintext)
        .map_err(|e| e.with_context(format!("failed to write to {}", output_path.display())))?;

    info!(
        input = %input_path.display(),
        output = %output_path.display(),
        bytes = plaintext.len(),
        "decrypted file"
    );
    Ok(())
}

/// Update an encrypted file with new plaintext using the same passphrase
///
/// This function:
/// 1. Decrypts the existing file at `crypt_path` to validate the passphrase
/// 2. Reads new plaintext from `plain_path`
/// 3. Encrypts the new plaintext with the validated passphrase, keeping the
///    existing file's armoring
/// 4. Atomically writes to `crypt_path` (tempfile + fsync + rename)
///
/// The passphrase validation prevents accidental passphrase changes.
pub fn update_file(
    plain_path: &Path,
    crypt_path: &Path,
    passphrase_reader: &mut dyn PassphraseReader,
) -> Result<()> {
    let data = fs::read(crypt_path).map_err(|e| read_error(crypt_path, e))?;
    let (envelope_bytes, armored) = unarmor(&data)?;
    let passphrase = passphrase_reader.read_passphrase()?;

    // Validate passphrase by decrypting existing file (discard plaintext)
    envelope::decode(&envelope_bytes, &passphrase)
        .map_err(|e| e.with_context("failed to decrypt"))?;

    let new_plaintext = fs::read(plain_path).map_err(|e| read_error(plain_path, e))?;
    let new_envelope = envelope::encode(&new_plaintext, &passphrase)
        .map_err(|e| e.with_context("failed to encrypt"))?;
    let contents = if armored {
        armor::wrap(&new_envelope).into_bytes()
    } else {
        new_envelope
    };

    write_file_atomic(crypt_path, &contents)?;
    info!(
        input = %plain_path.display(),
        output = %crypt_path.display(),
        bytes = new_plaintext.len(),
        "updated encrypted file"
    );
    Ok(())
}

/// Encrypt a file and hand the envelope to `store`.
///
/// Returns the handle under which the store filed it. The original file
/// name is not recorded anywhere; callers keep it alongside the handle.
pub fn upload_file(
    input_path: &Path,
    store: &dyn BlobStore,
    passphrase_reader: &mut dyn PassphraseReader,
    options: &EncryptOptions,
) -> Result<BlobHandle> {
    let plaintext = fs::read(input_path).map_err(|e| read_error(input_path, e))?;
    let sealed = seal(&plaintext, passphrase_reader, options)?;
    let handle = store
        .store(&sealed)
        .map_err(|e| e.with_context("failed to upload"))?;

    info!(input = %input_path.display(), handle = %handle, "uploaded encrypted file");
    Ok(handle)
}

/// Fetch the envelope stored under `handle` and decrypt it to `output_path`.
pub fn download_file(
    handle: &BlobHandle,
    output_path: &Path,
    store: &dyn BlobStore,
    passphrase_reader: &mut dyn PassphraseReader,
) -> Result<()> {
    let data = store
        .retrieve(handle)
        .map_err(|e| e.with_context("failed to download"))?;
    let (envelope_bytes, _) = unarmor(&data)?;
    let passphrase = passphrase_reader.read_passphrase()?;
    let plaintext = envelope::decode(&envelope_bytes, &passphrase)
        .map_err(|e| e.with_context("failed to decrypt"))?;
    write_file_secure(output_path, &plaintext)
        .map_err(|e| e.with_context(format!("failed to write to {}", output_path.display())))?;

    info!(handle = %handle, output = %output_path.display(), "downloaded and decrypted file");
    Ok(())
}

/// Read a passphrase, apply the length gate, encrypt and optionally armor.
fn seal(
    plaintext: &[u8],
    passphrase_reader: &mut dyn PassphraseReader,
    options: &EncryptOptions,
) -> Result<Vec<u8>> {
    let passphrase = passphrase_reader.read_passphrase()?;
    check_min_length(&passphrase, options.min_passphrase_len)?;
    let sealed =
        envelope::encode(plaintext, &passphrase).map_err(|e| e.with_context("encryption failed"))?;
    debug!(plaintext = plaintext.len(), envelope = sealed.len(), armor = options.armor, "sealed");

    if options.armor {
        Ok(armor::wrap(&sealed).into_bytes())
    } else {
        Ok(sealed)
    }
}

/// Strip the text armor if present; returns the envelope and whether it was armored.
fn unarmor(data: &[u8]) -> Result<(Vec<u8>, bool)> {
    if !armor::is_armored(data) {
        return Ok((data.to_vec(), false));
    }
    let text = std::str::from_utf8(data).map_err(|e| {
        VaultError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::ArmoringInvalid,
            "armored input is not valid UTF-8",
            e,
        )
    })?;
    let envelope_bytes = armor::unwrap(text).map_err(|e| e.with_context("failed to unarmor"))?;
    Ok((envelope_bytes, true))
}

/// Atomically replace `path` with `contents` (tempfile + fsync + rename),
/// leaving the file with mode 0o600 on Unix systems.
///
/// Either the old file or the new file exists afterwards, never a partial one.
pub(crate) fn write_file_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut temp_file = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| VaultError::io(ErrorCategory::Internal, "failed to create tempfile", e))?;

    temp_file
        .write_all(contents)
        .map_err(|e| VaultError::io(ErrorCategory::Internal, "failed to write to tempfile", e))?;
    // Flush and fsync() such that the rename later, if it succeeds, will
    // always point to a valid file.
    temp_file
        .flush()
        .map_err(|e| VaultError::io(ErrorCategory::Internal, "failed to flush tempfile", e))?;
    temp_file.as_file().sync_all().map_err(|e| {
        VaultError::io(ErrorCategory::Internal, "failed to sync file prior to rename", e)
    })?;

    // tempfile already creates 0o600 files on Unix; make it explicit.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        temp_file
            .as_file()
            .set_permissions(fs::Permissions::from_mode(0o600))
            .map_err(|e| {
                VaultError::io(ErrorCategory::Internal, "failed to set tempfile permissions", e)
            })?;
    }

    temp_file.persist(path).map_err(|e| {
        VaultError::io(
            ErrorCategory::Internal,
            format!("failed to rename to target file {}", path.display()),
            e.error,
        )
    })?;
    Ok(())
}

/// Write file with secure permissions (0o600 on Unix)
fn write_file_secure(path: &Path, contents: &[u8]) -> Result<()> {
    #[cfg(unix)]
    {
        use std::fs::OpenOptions;
        use std::os::unix::fs::OpenOptionsExt;

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .map_err(|e| {
                VaultError::io(ErrorCategory::User, format!("failed to open {}", path.display()), e)
            })?;

        file.write_all(contents).map_err(|e| {
            VaultError::io(
                ErrorCategory::Internal,
                format!("failed to write {}", path.display()),
                e,
            )
        })?;
        Ok(())
    }

    #[cfg(not(unix))]
    {
        fs::write(path, contents).map_err(|e| {
            VaultError::io(ErrorCategory::User, format!("failed to write {}", path.display()), e)
        })?;
        Ok(())
    }
}

fn read_error(path: &Path, err: io::Error) -> VaultError {
    let category = if err.kind() == io::ErrorKind::NotFound {
        ErrorCategory::User
    } else {
        ErrorCategory::Internal
    };
    VaultError::io(category, format!("failed to read from {}", path.display()), err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{MIN_ENVELOPE_LEN, TAG_LEN};
    use crate::passphrase::ConstantPassphraseReader;
    use crate::store::DirBlobStore;
    use tempfile::TempDir;

    #[cfg(unix)]
    use std::os::unix::fs::PermissionsExt;

    fn reader(passphrase: &[u8]) -> ConstantPassphraseReader {
        ConstantPassphraseReader::new(passphrase.to_vec())
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let plain_path = temp_dir.path().join("plain.txt");
        let crypt_path = temp_dir.path().join("plain.txt.enc");
        let decrypted_path = temp_dir.path().join("decrypted.txt");

        let plaintext = b"Hello, securevault!";
        fs::write(&plain_path, plaintext).unwrap();

        let options = EncryptOptions::default();
        encrypt_file(&plain_path, &crypt_path, &mut reader(b"test password"), &options).unwrap();

        let envelope_bytes = fs::read(&crypt_path).unwrap();
        assert_eq!(envelope_bytes.len(), plaintext.len() + MIN_ENVELOPE_LEN + TAG_LEN);

        decrypt_file(&crypt_path, &decrypted_path, &mut reader(b"test password")).unwrap();
        assert_eq!(fs::read(&decrypted_path).unwrap(), plaintext);
    }

    #[test]
    fn test_armored_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let plain_path = temp_dir.path().join("plain.txt");
        let crypt_path = temp_dir.path().join("plain.txt.enc");
        let decrypted_path = temp_dir.path().join("decrypted.txt");

        fs::write(&plain_path, b"armored content").unwrap();

        let options = EncryptOptions {
            armor: true,
            ..EncryptOptions::default()
        };
        encrypt_file(&plain_path, &crypt_path, &mut reader(b"test password"), &options).unwrap();
        assert!(fs::read_to_string(&crypt_path).unwrap().starts_with("securevault1:"));

        decrypt_file(&crypt_path, &decrypted_path, &mut reader(b"test password")).unwrap();
        assert_eq!(fs::read(&decrypted_path).unwrap(), b"armored content");
    }

    #[test]
    fn test_short_passphrase_rejected_on_encrypt() {
        let temp_dir = TempDir::new().unwrap();
        let plain_path = temp_dir.path().join("plain.txt");
        let crypt_path = temp_dir.path().join("plain.txt.enc");
        fs::write(&plain_path, b"x").unwrap();

        let err = encrypt_file(
            &plain_path,
            &crypt_path,
            &mut reader(b"12345"),
            &EncryptOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::PassphraseTooShort));
        assert!(!crypt_path.exists());

        let relaxed = EncryptOptions {
            min_passphrase_len: 0,
            ..EncryptOptions::default()
        };
        encrypt_file(&plain_path, &crypt_path, &mut reader(b""), &relaxed).unwrap();
        assert!(crypt_path.exists());
    }

    #[test]
    fn test_short_passphrase_still_decrypts() {
        let temp_dir = TempDir::new().unwrap();
        let crypt_path = temp_dir.path().join("short.enc");
        let out_path = temp_dir.path().join("short");
        fs::write(&crypt_path, envelope::encode(b"legacy", b"abc").unwrap()).unwrap();

        decrypt_file(&crypt_path, &out_path, &mut reader(b"abc")).unwrap();
        assert_eq!(fs::read(&out_path).unwrap(), b"legacy");
    }

    #[test]
    fn test_update_file() {
        let temp_dir = TempDir::new().unwrap();
        let plain1_path = temp_dir.path().join("plain1.txt");
        let plain2_path = temp_dir.path().join("plain2.txt");
        let crypt_path = temp_dir.path().join("crypt.txt.enc");
        let decrypted_path = temp_dir.path().join("decrypted.txt");

        fs::write(&plain1_path, b"Initial content").unwrap();
        let options = EncryptOptions::default();
        encrypt_file(&plain1_path, &crypt_path, &mut reader(b"test password"), &options).unwrap();

        fs::write(&plain2_path, b"Updated content").unwrap();
        update_file(&plain2_path, &crypt_path, &mut reader(b"test password")).unwrap();

        decrypt_file(&crypt_path, &decrypted_path, &mut reader(b"test password")).unwrap();
        assert_eq!(fs::read(&decrypted_path).unwrap(), b"Updated content");
    }

    #[test]
    fn test_update_preserves_armor() {
        let temp_dir = TempDir::new().unwrap();
        let plain_path = temp_dir.path().join("plain.txt");
        let crypt_path = temp_dir.path().join("crypt.txt.enc");

        fs::write(&plain_path, b"v1").unwrap();
        let options = EncryptOptions {
            armor: true,
            ..EncryptOptions::default()
        };
        encrypt_file(&plain_path, &crypt_path, &mut reader(b"test password"), &options).unwrap();

        fs::write(&plain_path, b"v2").unwrap();
        update_file(&plain_path, &crypt_path, &mut reader(b"test password")).unwrap();

        assert!(armor::is_armored(&fs::read(&crypt_path).unwrap()));
    }

    #[test]
    fn test_update_with_wrong_passphrase_fails() {
        let temp_dir = TempDir::new().unwrap();
        let plain1_path = temp_dir.path().join("plain1.txt");
        let plain2_path = temp_dir.path().join("plain2.txt");
        let crypt_path = temp_dir.path().join("crypt.txt.enc");

        fs::write(&plain1_path, b"Initial").unwrap();
        let options = EncryptOptions::default();
        encrypt_file(&plain1_path, &crypt_path, &mut reader(b"correct password"), &options)
            .unwrap();
        let before = fs::read(&crypt_path).unwrap();

        fs::write(&plain2_path, b"Updated").unwrap();
        let err = update_file(&plain2_path, &crypt_path, &mut reader(b"wrong password"))
            .expect_err("expected authentication failure");
        assert_eq!(err.kind, Some(ErrorKind::AuthenticationFailed));
        assert_eq!(fs::read(&crypt_path).unwrap(), before);
    }

    #[test]
    #[cfg(unix)]
    fn test_file_permissions() {
        let temp_dir = TempDir::new().unwrap();
        let plain_path = temp_dir.path().join("plain.txt");
        let crypt_path = temp_dir.path().join("plain.txt.enc");

        fs::write(&plain_path, b"test").unwrap();
        let options = EncryptOptions::default();
        encrypt_file(&plain_path, &crypt_path, &mut reader(b"test password"), &options).unwrap();

        let permissions = fs::metadata(&crypt_path).unwrap().permissions();
        assert_eq!(permissions.mode() & 0o777, 0o600);
    }

    #[test]
    fn test_decrypt_wrong_passphrase_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let plain_path = temp_dir.path().join("plain.txt");
        let crypt_path = temp_dir.path().join("plain.txt.enc");
        let decrypted_path = temp_dir.path().join("decrypted.txt");

        fs::write(&plain_path, b"secret").unwrap();
        let options = EncryptOptions::default();
        encrypt_file(&plain_path, &crypt_path, &mut reader(b"correct"), &options).unwrap();

        let err = decrypt_file(&crypt_path, &decrypted_path, &mut reader(b"wrong!")).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::AuthenticationFailed));
        assert!(!decrypted_path.exists());
    }

    #[test]
    fn test_decrypt_short_file_is_malformed() {
        let temp_dir = TempDir::new().unwrap();
        let crypt_path = temp_dir.path().join("tiny.enc");
        fs::write(&crypt_path, b"not an envelope").unwrap();

        let err = decrypt_file(&crypt_path, &temp_dir.path().join("tiny"), &mut reader(b"pw"))
            .unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::MalformedEnvelope));
    }

    #[test]
    fn test_empty_file() {
        let temp_dir = TempDir::new().unwrap();
        let plain_path = temp_dir.path().join("empty.txt");
        let crypt_path = temp_dir.path().join("empty.txt.enc");
        let decrypted_path = temp_dir.path().join("decrypted.txt");

        fs::write(&plain_path, b"").unwrap();
        let options = EncryptOptions::default();
        encrypt_file(&plain_path, &crypt_path, &mut reader(b"test password"), &options).unwrap();
        assert_eq!(fs::read(&crypt_path).unwrap().len(), MIN_ENVELOPE_LEN + TAG_LEN);

        decrypt_file(&crypt_path, &decrypted_path, &mut reader(b"test password")).unwrap();
        assert_eq!(fs::read(&decrypted_path).unwrap(), b"");
    }

    #[test]
    fn test_upload_download() {
        let temp_dir = TempDir::new().unwrap();
        let plain_path = temp_dir.path().join("report.pdf");
        let out_path = temp_dir.path().join("report-copy.pdf");
        let store = DirBlobStore::open(temp_dir.path().join("uploads")).unwrap();

        fs::write(&plain_path, b"%PDF-1.7 pretend").unwrap();
        let options = EncryptOptions::default();
        let handle =
            upload_file(&plain_path, &store, &mut reader(b"upload pw"), &options).unwrap();

        // The store holds an envelope, not the plaintext.
        let stored = store.retrieve(&handle).unwrap();
        assert_ne!(stored, b"%PDF-1.7 pretend");
        assert_eq!(stored.len(), 16 + MIN_ENVELOPE_LEN + TAG_LEN);

        download_file(&handle, &out_path, &store, &mut reader(b"upload pw")).unwrap();
        assert_eq!(fs::read(&out_path).unwrap(), b"%PDF-1.7 pretend");

        let err = download_file(&handle, &out_path, &store, &mut reader(b"other pw")).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::AuthenticationFailed));
    }

    #[test]
    fn test_default_paths() {
        assert_eq!(
            default_encrypted_path(Path::new("dir/secret.pdf")),
            PathBuf::from("dir/secret.pdf.enc")
        );
        assert_eq!(
            default_decrypted_path(Path::new("dir/secret.pdf.enc")).unwrap(),
            PathBuf::from("dir/secret.pdf")
        );
        assert!(default_decrypted_path(Path::new("dir/secret.pdf")).is_err());
        assert!(default_decrypted_path(Path::new(".enc")).is_err());
    }
}
