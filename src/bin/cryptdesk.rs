//! Cryptdesk CLI - AES/RSA encryption through a remote crypto service
//!
//! Validates the given files locally, sends a single request to the service,
//! and writes the resulting files into the output directory.

use clap::{ArgAction, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

use cryptdesk::config::Config;
use cryptdesk::error::{CryptdeskError, ErrorCategory, ErrorKind, Result};
use cryptdesk::operation::{OperationState, Session, Slot};
use cryptdesk::package;
use cryptdesk::technique::{Mode, Technique};

#[derive(Parser)]
#[command(name = "cryptdesk")]
#[command(version)]
#[command(
    about = "Encrypt and decrypt text files through a remote AES/RSA crypto service.",
    long_about = None
)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Base URL of the crypto service, overriding configuration and environment
    #[arg(long, global = true, value_name = "URL")]
    service_url: Option<String>,

    /// Increase log verbosity (repeat for more)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt a .txt file; the service generates the keys
    #[command(alias = "e")]
    Encrypt {
        /// Path to the .txt file whose contents is to be encrypted
        #[arg(short, long, value_name = "FILE")]
        input: Option<PathBuf>,

        /// Encryption technique
        #[arg(short, long, value_enum)]
        technique: Option<Technique>,

        /// Directory to write encrypted_content.enc and the key files to
        #[arg(short, long, value_name = "DIR")]
        output: PathBuf,
    },

    /// Decrypt a .enc file with an AES key bundle or RSA private key
    #[command(alias = "d")]
    Decrypt {
        /// Path to the .enc file whose contents is to be decrypted
        #[arg(short, long, value_name = "FILE")]
        input: Option<PathBuf>,

        /// Decryption technique
        #[arg(short, long, value_enum)]
        technique: Option<Technique>,

        /// AES key bundle (.txt) or RSA private key (.pem)
        #[arg(short, long, value_name = "FILE")]
        key: Option<PathBuf>,

        /// Directory to write decrypted_content.txt to
        #[arg(short, long, value_name = "DIR")]
        output: PathBuf,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(written) => {
            for path in written {
                println!("{}", path.display());
            }
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<Vec<PathBuf>> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(url) = cli.service_url {
        config.service.url = url;
    }
    let service = config.service.client()?;

    let (mode, input, technique, key, output) = match cli.command {
        Commands::Encrypt {
            input,
            technique,
            output,
        } => (Mode::Encrypt, input, technique, None, output),
        Commands::Decrypt {
            input,
            technique,
            key,
            output,
        } => (Mode::Decrypt, input, technique, key, output),
    };
    ensure_output_dir(&output)?;

    let mut session = Session::new(mode, service);
    session.select_technique(technique);
    if let Some(path) = input {
        session.load(Slot::Content, &path).await;
    }
    if let Some(path) = key {
        session.load(Slot::Key, &path).await;
    }

    session.run().await?;
    match session.into_state() {
        OperationState::Succeeded { artifacts, .. } => {
            package::write_artifacts(&output, &artifacts)
        }
        OperationState::Failed { error } => Err(error),
        other => Err(CryptdeskError::new(
            ErrorCategory::Internal,
            format!("operation ended in unexpected phase {:?}", other.phase()),
        )),
    }
}

fn ensure_output_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        Ok(())
    } else {
        Err(CryptdeskError::with_kind(
            ErrorCategory::User,
            ErrorKind::Io,
            format!("output directory {} does not exist", dir.display()),
        ))
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("cryptdesk={}", level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
