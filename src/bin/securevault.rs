//! securevault CLI - password-based file encryption
//!
//! Command-line interface for encrypting and decrypting files with a
//! PBKDF2-derived AES-256-GCM key, and for parking the encrypted blobs in a
//! local store under an opaque name.

use clap::{Parser, Subcommand};
use std::error::Error as StdError;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use securevault::VaultError;
use securevault::file_ops::{self, EncryptOptions};
use securevault::passphrase::{
    DEFAULT_MIN_PASSPHRASE_LEN, PassphraseReader, ReaderPassphraseReader, TerminalPassphraseReader,
};
use securevault::store::{BlobHandle, DirBlobStore};

#[derive(Parser)]
#[command(name = "securevault")]
#[command(version)]
#[command(about = "Password-based file encryption.", long_about = None)]
struct Cli {
    /// Read passphrase from stdin instead of from terminal
    #[arg(long, global = true)]
    passphrase_stdin: bool,

    /// Refuse to encrypt with passphrases shorter than this (0 disables)
    #[arg(
        long,
        global = true,
        env = "SECUREVAULT_MIN_PASSPHRASE_LEN",
        default_value_t = DEFAULT_MIN_PASSPHRASE_LEN
    )]
    min_passphrase_len: usize,

    /// Directory holding uploaded blobs
    #[arg(
        long,
        global = true,
        value_name = "DIR",
        env = "SECUREVAULT_STORE_DIR",
        default_value = "uploads"
    )]
    store_dir: PathBuf,

    /// Log filter, e.g. "info" or "securevault=debug" (RUST_LOG takes precedence)
    #[arg(long, global = true, env = "SECUREVAULT_LOG", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt a file
    #[command(alias = "e")]
    Encrypt {
        /// Path to the file whose contents is to be encrypted
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Path to write the envelope to [default: INPUT.enc]
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Write base64url text armor instead of raw bytes
        #[arg(long)]
        armor: bool,
    },

    /// Decrypt a file
    #[command(alias = "d")]
    Decrypt {
        /// Path to the raw or armored envelope
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Path to write the plaintext to [default: INPUT without .enc]
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Update an encrypted file with new content, while validating
    /// that the passphrase is not accidentally changed.
    #[command(alias = "u")]
    Update {
        /// Path to the file whose contents is to be encrypted
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Path to the existing encrypted file to replace
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Encrypt a file and put the envelope in the store; prints the handle
    Upload {
        /// Path to the file whose contents is to be encrypted
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,
    },

    /// Fetch an envelope from the store by handle and decrypt it
    Download {
        /// Handle printed by `upload`
        #[arg(short = 'n', long = "name", value_name = "HANDLE")]
        handle: BlobHandle,

        /// Path to write the plaintext to
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", error_chain(&e));
        process::exit(1);
    }
}

fn run(cli: Cli) -> securevault::Result<()> {
    let mut reader = get_passphrase_reader(cli.passphrase_stdin);

    match cli.command {
        Commands::Encrypt {
            input,
            output,
            armor,
        } => {
            let output = output.unwrap_or_else(|| file_ops::default_encrypted_path(&input));
            let options = EncryptOptions {
                armor,
                min_passphrase_len: cli.min_passphrase_len,
            };
            file_ops::encrypt_file(&input, &output, &mut *reader, &options)
        }
        Commands::Decrypt { input, output } => {
            let output = match output {
                Some(path) => path,
                None => file_ops::default_decrypted_path(&input)?,
            };
            file_ops::decrypt_file(&input, &output, &mut *reader)
        }
        Commands::Update { input, output } => {
            file_ops::update_file(&input, &output, &mut *reader)
        }
        Commands::Upload { input } => {
            let store = DirBlobStore::open(&cli.store_dir)?;
            let options = EncryptOptions {
                armor: false,
                min_passphrase_len: cli.min_passphrase_len,
            };
            let handle = file_ops::upload_file(&input, &store, &mut *reader, &options)?;
            println!("{}", handle);
            Ok(())
        }
        Commands::Download { handle, output } => {
            let store = DirBlobStore::open(&cli.store_dir)?;
            file_ops::download_file(&handle, &output, &store, &mut *reader)
        }
    }
}

fn get_passphrase_reader(use_stdin: bool) -> Box<dyn PassphraseReader> {
    if use_stdin {
        Box::new(ReaderPassphraseReader::new(Box::new(std::io::stdin())))
    } else {
        Box::new(TerminalPassphraseReader)
    }
}

/// Logs go to stderr so stdout stays clean for `upload`'s handle.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// "outer: inner: innermost"
fn error_chain(err: &VaultError) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}
