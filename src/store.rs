//! Opaque blob storage keyed by server-issued handles
//!
//! A store only ever holds envelope bytes. It never sees a passphrase,
//! derived key or plaintext, and has no idea what the bytes mean.

use crate::error::{ErrorCategory, ErrorKind, Result, VaultError};
use crate::file_ops::write_file_atomic;
use crate::rng::{OsRandom, SecureRandom};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Random bytes behind each handle; rendered as twice as many hex chars.
const HANDLE_BYTES: usize = 16;

/// Name under which a blob was stored.
///
/// Always exactly 32 lowercase hex characters, so it is safe to use as a
/// file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobHandle(String);

impl BlobHandle {
    fn generate(rng: &mut dyn SecureRandom) -> Result<Self> {
        let mut bytes = [0u8; HANDLE_BYTES];
        rng.fill(&mut bytes)?;
        Ok(Self(hex::encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for BlobHandle {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self> {
        let well_formed = s.len() == HANDLE_BYTES * 2
            && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        if !well_formed {
            return Err(VaultError::with_kind(
                ErrorCategory::User,
                ErrorKind::InvalidHandle,
                format!(
                    "invalid blob handle {:?}: expected {} lowercase hex characters",
                    s,
                    HANDLE_BYTES * 2
                ),
            ));
        }
        Ok(Self(s.to_owned()))
    }
}

impl fmt::Display for BlobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Storage collaborator: keeps bytes and returns them unmodified by handle.
pub trait BlobStore {
    fn store(&self, blob: &[u8]) -> Result<BlobHandle>;

    fn retrieve(&self, handle: &BlobHandle) -> Result<Vec<u8>>;
}

/// Blob store backed by one flat directory, one file per blob.
#[derive(Debug, Clone)]
pub struct DirBlobStore {
    root: PathBuf,
}

impl DirBlobStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| {
            VaultError::io(
                ErrorCategory::Internal,
                format!("failed to create store directory {}", root.display()),
                e,
            )
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, handle: &BlobHandle) -> PathBuf {
        self.root.join(handle.as_str())
    }

    fn store_with(&self, rng: &mut dyn SecureRandom, blob: &[u8]) -> Result<BlobHandle> {
        let handle = BlobHandle::generate(rng)?;
        let path = self.blob_path(&handle);

        // 128 random bits make a collision practically impossible, but never
        // silently replace someone else's blob.
        if path.exists() {
            return Err(VaultError::new(
                ErrorCategory::Internal,
                format!("blob handle {} already in use", handle),
            ));
        }

        write_file_atomic(&path, blob)
            .map_err(|e| e.with_context(format!("failed to store blob {}", handle)))?;
        debug!(handle = %handle, bytes = blob.len(), "stored blob");
        Ok(handle)
    }
}

impl BlobStore for DirBlobStore {
    fn store(&self, blob: &[u8]) -> Result<BlobHandle> {
        self.store_with(&mut OsRandom, blob)
    }

    fn retrieve(&self, handle: &BlobHandle) -> Result<Vec<u8>> {
        let path = self.blob_path(handle);
        let blob = fs::read(&path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                VaultError::with_kind_and_source(
                    ErrorCategory::User,
                    ErrorKind::BlobNotFound,
                    format!("no blob stored under {}", handle),
                    e,
                )
            } else {
                VaultError::io(
                    ErrorCategory::Internal,
                    format!("failed to read blob {}", handle),
                    e,
                )
            }
        })?;
        debug!(handle = %handle, bytes = blob.len(), "retrieved blob");
        Ok(blob)
    }
}
