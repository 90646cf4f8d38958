// Copyright 2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

use crate::error::ReplacementError;
use nym_upgrade_authority_client::SemVer;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

const STAGING_EXTENSION: &str = "tmp";
const BACKUP_EXTENSION: &str = "old";

fn append_extension(path: &Path, extension: &str) -> PathBuf {
    let mut raw: OsString = path.as_os_str().to_owned();
    raw.push(".");
    raw.push(extension);
    PathBuf::from(raw)
}

/// Location the verified upgrade binary is extracted to before being moved into place,
/// i.e. `<binary>.tmp`
pub fn staging_path<P: AsRef<Path>>(binary: P) -> PathBuf {
    append_extension(binary.as_ref(), STAGING_EXTENSION)
}

/// Location the live binary is moved to for the duration of the replacement,
/// i.e. `<binary>.old.<version>`
pub fn backup_path<P: AsRef<Path>>(binary: P, version: &SemVer) -> PathBuf {
    append_extension(
        binary.as_ref(),
        &format!("{BACKUP_EXTENSION}.{version}"),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SideEffect {
    /// The live binary got moved to the backup path.
    BackedUp,

    /// The staged binary got moved to the live path.
    Installed,
}

/// A single swap of the live binary with an already verified one.
///
/// Every committed rename is recorded in the journal so that a failure
/// can undo them in reverse order. At no point is the live path left with a partial file:
/// it either holds the old binary, the new binary, or (in between the two renames) nothing.
#[derive(Debug)]
pub struct ReplacementAttempt {
    current_version: SemVer,
    target: PathBuf,
    staged: PathBuf,
    backup: PathBuf,
    journal: Vec<SideEffect>,
}

impl ReplacementAttempt {
    pub fn new(target: PathBuf, staged: PathBuf, current_version: SemVer) -> Self {
        let backup = backup_path(&target, &current_version);
        ReplacementAttempt {
            current_version,
            target,
            staged,
            backup,
            journal: Vec::new(),
        }
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup
    }

    /// Perform the whole replacement, rolling back on failure.
    pub fn commit(mut self) -> Result<(), ReplacementError> {
        if let Err(err) = self.backup().and_then(|_| self.install()) {
            self.rollback();
            return Err(err);
        }

        self.cleanup();
        Ok(())
    }

    pub(crate) fn backup(&mut self) -> Result<(), ReplacementError> {
        // zero version means there was no binary to begin with
        if self.current_version.is_zero() {
            debug!("no existing binary to back up");
            return Ok(());
        }

        fs::rename(&self.target, &self.backup).map_err(|source| {
            ReplacementError::BackupFailed {
                binary: self.target.clone(),
                backup: self.backup.clone(),
                source,
            }
        })?;
        self.journal.push(SideEffect::BackedUp);
        debug!(
            "moved '{}' to '{}'",
            self.target.display(),
            self.backup.display()
        );
        Ok(())
    }

    pub(crate) fn install(&mut self) -> Result<(), ReplacementError> {
        fs::rename(&self.staged, &self.target).map_err(|source| {
            ReplacementError::InstallFailed {
                binary: self.target.clone(),
                staged: self.staged.clone(),
                source,
            }
        })?;
        self.journal.push(SideEffect::Installed);
        info!(
            "installed '{}' as '{}'",
            self.staged.display(),
            self.target.display()
        );
        Ok(())
    }

    /// Undo all committed side effects (most recent first) and remove the staged binary.
    pub(crate) fn rollback(&mut self) {
        while let Some(effect) = self.journal.pop() {
            let (from, to) = match effect {
                SideEffect::Installed => (&self.target, &self.staged),
                SideEffect::BackedUp => (&self.backup, &self.target),
            };
            match fs::rename(from, to) {
                Ok(()) => debug!("rolled back {effect:?}"),
                Err(err) => error!(
                    "failed to roll back {effect:?} by moving '{}' to '{}': {err}. manual intervention might be required",
                    from.display(),
                    to.display()
                ),
            }
        }

        remove_if_exists(&self.staged, "staged binary");
    }

    // the replacement has already succeeded at this point, so failures are only logged
    fn cleanup(&mut self) {
        if self.journal.contains(&SideEffect::BackedUp) {
            if let Err(err) = fs::remove_file(&self.backup) {
                if err.kind() != io::ErrorKind::NotFound {
                    warn!(
                        "failed to remove the backup binary '{}': {err}. consider removing it manually",
                        self.backup.display()
                    )
                }
            }
        }
        self.journal.clear();
    }
}

fn remove_if_exists(path: &Path, what: &str) {
    match fs::remove_file(path) {
        Ok(()) => debug!("removed {what} '{}'", path.display()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => warn!("failed to remove {what} '{}': {err}", path.display()),
    }
}

pub(crate) fn discard_staged(staged: &Path) {
    remove_if_exists(staged, "staged binary")
}

fn binary_dir(binary: &Path) -> &Path {
    binary
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
}

/// Find all `<binary>.old.<version>` files, newest version first.
fn leftover_backups(binary: &Path) -> io::Result<Vec<(SemVer, PathBuf)>> {
    let Some(name) = binary.file_name().and_then(|name| name.to_str()) else {
        return Ok(Vec::new());
    };
    let prefix = format!("{name}.{BACKUP_EXTENSION}.");

    let mut backups = Vec::new();
    for entry in fs::read_dir(binary_dir(binary))? {
        let entry = entry?;
        let file_name = entry.file_name();
        let Some(version) = file_name
            .to_str()
            .and_then(|file_name| file_name.strip_prefix(&prefix))
            .and_then(|raw| SemVer::parse(raw).ok())
        else {
            continue;
        };
        backups.push((version, entry.path()));
    }
    backups.sort_by(|a, b| b.0.cmp(&a.0));
    Ok(backups)
}

/// Bring the binary back into a consistent state after the supervisor got killed mid-replacement:
/// - a stale `<binary>.tmp` is removed,
/// - if the binary itself is missing, the newest `<binary>.old.<version>` is moved back in its place,
/// - any remaining backups are removed.
pub fn recover_interrupted_replacement<P: AsRef<Path>>(binary: P) {
    let binary = binary.as_ref();
    remove_if_exists(&staging_path(binary), "stale staged binary");

    let backups = match leftover_backups(binary) {
        Ok(backups) => backups,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return,
        Err(err) => {
            warn!(
                "could not look for leftover backups of '{}': {err}",
                binary.display()
            );
            return;
        }
    };

    let mut backups = backups.into_iter();
    if !binary.exists() {
        if let Some((version, backup)) = backups.next() {
            warn!(
                "'{}' is missing - restoring the backup of version {version} left by an interrupted upgrade",
                binary.display()
            );
            if let Err(err) = fs::rename(&backup, binary) {
                error!(
                    "failed to restore '{}' from '{}': {err}",
                    binary.display(),
                    backup.display()
                );
            }
        }
    }

    for (_, backup) in backups {
        remove_if_exists(&backup, "leftover backup binary");
    }
}
