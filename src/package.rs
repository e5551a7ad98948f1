//! Packaging of successful results into downloadable files
//!
//! Packaging itself is pure. [`write_artifacts`] is the only filesystem
//! touchpoint and writes a whole set or nothing.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::{NamedTempFile, TempPath};
use tracing::warn;

use crate::artifact::{AES_KEY_FIELD, AES_NONCE_FIELD, AES_TAG_FIELD, AesKeyMaterial};
use crate::error::{CryptdeskError, ErrorCategory, ErrorKind, Result};
use crate::outcome::{GeneratedKeys, OperationResult};

pub const DECRYPTED_FILENAME: &str = "decrypted_content.txt";
pub const ENCRYPTED_FILENAME: &str = "encrypted_content.enc";
pub const AES_KEYS_FILENAME: &str = "keys.txt";
pub const RSA_PRIVATE_KEY_FILENAME: &str = "private_key.pem";
pub const RSA_PUBLIC_KEY_FILENAME: &str = "public_key.pem";

/// A named, in-memory output of a successful operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadableArtifact {
    pub filename: &'static str,
    pub contents: String,
}

impl DownloadableArtifact {
    pub fn as_bytes(&self) -> &[u8] {
        self.contents.as_bytes()
    }
}

/// Produce the downloadable files for a successful result.
///
/// Decryption yields the plaintext alone. Encryption yields the ciphertext
/// first, followed by the key bundle (AES) or the private and public key (RSA).
pub fn package(result: &OperationResult) -> Vec<DownloadableArtifact> {
    match result {
        OperationResult::Decrypted(success) => vec![DownloadableArtifact {
            filename: DECRYPTED_FILENAME,
            contents: success.decrypted_content.clone(),
        }],
        OperationResult::Encrypted(success) => {
            let mut artifacts = vec![DownloadableArtifact {
                filename: ENCRYPTED_FILENAME,
                contents: success.encrypted_content.clone(),
            }];
            match &success.generated_keys {
                GeneratedKeys::Aes(keys) => artifacts.push(DownloadableArtifact {
                    filename: AES_KEYS_FILENAME,
                    contents: aes_key_bundle(keys),
                }),
                GeneratedKeys::Rsa(pair) => {
                    artifacts.push(DownloadableArtifact {
                        filename: RSA_PRIVATE_KEY_FILENAME,
                        contents: pair.private_key_pem().to_owned(),
                    });
                    artifacts.push(DownloadableArtifact {
                        filename: RSA_PUBLIC_KEY_FILENAME,
                        contents: pair.public_key_pem().to_owned(),
                    });
                }
            }
            artifacts
        }
    }
}

/// Render AES key material in the bundle format the artifact parser reads back.
pub fn aes_key_bundle(keys: &AesKeyMaterial) -> String {
    format!(
        "{}: {}\n{}: {}\n{}: {}",
        AES_KEY_FIELD,
        keys.encryption_key(),
        AES_NONCE_FIELD,
        keys.nonce(),
        AES_TAG_FIELD,
        keys.tag()
    )
}

/// Write every artifact into `dir`, returning the written paths in order.
///
/// Each artifact is first staged in a tempfile in `dir` (mode 0o600 on Unix)
/// and synced; only once all are staged are they renamed into place. Existing
/// files with the same names are replaced. If any step fails, files already
/// replaced are restored and new ones removed, so the directory is left as it
/// was.
pub fn write_artifacts(dir: &Path, artifacts: &[DownloadableArtifact]) -> Result<Vec<PathBuf>> {
    let targets: Vec<PathBuf> = artifacts.iter().map(|a| dir.join(a.filename)).collect();
    for target in &targets {
        check_target(target)?;
    }

    let mut staged = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        staged.push(stage(dir, artifact)?);
    }

    let mut applied = Vec::with_capacity(staged.len());
    for (temp_file, target) in staged.into_iter().zip(targets) {
        match replace(dir, temp_file, &target) {
            Ok(backup) => applied.push((target, backup)),
            Err(e) => {
                roll_back(applied);
                return Err(e);
            }
        }
    }
    // Dropping the backups deletes them.
    Ok(applied.into_iter().map(|(target, _)| target).collect())
}

fn io_error(
    category: ErrorCategory,
    msg: impl Into<String>,
) -> impl FnOnce(io::Error) -> CryptdeskError {
    let msg = msg.into();
    move |e| CryptdeskError::with_kind_and_source(category, ErrorKind::Io, msg, e)
}

/// Refuse targets that exist but could never be replaced by a file.
fn check_target(target: &Path) -> Result<()> {
    match fs::metadata(target) {
        Ok(meta) if !meta.is_file() => Err(CryptdeskError::with_kind(
            ErrorCategory::User,
            ErrorKind::Io,
            format!("{} exists and is not a regular file", target.display()),
        )),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_error(
            ErrorCategory::Internal,
            format!("failed to inspect {}", target.display()),
        )(e)),
    }
}

/// Move `temp_file` onto `target`, keeping any previous file as a backup.
fn replace(dir: &Path, temp_file: NamedTempFile, target: &Path) -> Result<Option<TempPath>> {
    let backup = if fs::symlink_metadata(target).is_ok() {
        let backup = tempfile::Builder::new()
            .prefix(".cryptdesk-backup-")
            .tempfile_in(dir)
            .map_err(io_error(
                ErrorCategory::Internal,
                format!("failed to create backup file in {}", dir.display()),
            ))?
            .into_temp_path();
        fs::rename(target, &backup).map_err(io_error(
            ErrorCategory::Internal,
            format!("failed to back up {}", target.display()),
        ))?;
        Some(backup)
    } else {
        None
    };

    if let Err(e) = temp_file.persist(target) {
        if let Some(backup) = &backup {
            restore(backup, target);
        }
        return Err(io_error(
            ErrorCategory::Internal,
            format!("failed to rename to target file {}", target.display()),
        )(e.error));
    }
    Ok(backup)
}

/// Undo `replace` for every applied target, newest first.
fn roll_back(applied: Vec<(PathBuf, Option<TempPath>)>) {
    for (target, backup) in applied.into_iter().rev() {
        match backup {
            Some(backup) => restore(&backup, &target),
            None => {
                if let Err(e) = fs::remove_file(&target) {
                    warn!(
                        target = %target.display(),
                        error = %e,
                        "failed to remove partial output"
                    );
                }
            }
        }
    }
}

fn restore(backup: &Path, target: &Path) {
    if let Err(e) = fs::rename(backup, target) {
        warn!(target = %target.display(), error = %e, "failed to restore previous file");
    }
}

fn stage(dir: &Path, artifact: &DownloadableArtifact) -> Result<NamedTempFile> {
    let mut temp_file = NamedTempFile::new_in(dir).map_err(io_error(
        ErrorCategory::User,
        format!("failed to create tempfile in {}", dir.display()),
    ))?;

    temp_file.write_all(artifact.as_bytes()).map_err(io_error(
        ErrorCategory::Internal,
        format!("failed to write {}", artifact.filename),
    ))?;
    temp_file
        .flush()
        .map_err(io_error(ErrorCategory::Internal, "failed to flush tempfile"))?;
    temp_file.as_file().sync_all().map_err(io_error(
        ErrorCategory::Internal,
        "failed to sync file prior to rename",
    ))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        temp_file
            .as_file()
            .set_permissions(fs::Permissions::from_mode(0o600))
            .map_err(io_error(
                ErrorCategory::Internal,
                "failed to set tempfile permissions",
            ))?;
    }

    Ok(temp_file)
}
