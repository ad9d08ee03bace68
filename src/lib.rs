//! securevault - password-based file encryption using PBKDF2 and AES-256-GCM
//!
//! The core is [`envelope::encode`] and [`envelope::decode`]. Everything else
//! (armor, passphrase readers, blob store, file operations) is built on top
//! of those two calls.

#![forbid(unsafe_code)]

pub mod armor;
pub mod envelope;
pub mod error;
pub mod file_ops;
pub mod kdf;
pub mod passphrase;
pub mod rng;
pub mod store;

pub use envelope::{decode, encode};
pub use error::{ErrorCategory, ErrorKind, Result, VaultError};
