// Copyright 2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

fn store_entry(store_dir: &Path, binary: &Path) -> io::Result<PathBuf> {
    let name = binary.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("'{}' does not name a file", binary.display()),
        )
    })?;
    Ok(store_dir.join(name))
}

fn is_binary_dir(store_dir: &Path, binary: &Path) -> bool {
    let Some(binary_dir) = binary.parent() else {
        return false;
    };
    match (store_dir.canonicalize(), binary_dir.canonicalize()) {
        (Ok(store), Ok(parent)) => store == parent,
        _ => false,
    }
}

/// Copy the installed binary into the backup store, replacing any previous copy.
/// Returns `None` if the store is the directory the binary already lives in.
pub fn copy_to_store(store_dir: &Path, binary: &Path) -> io::Result<Option<PathBuf>> {
    fs::create_dir_all(store_dir)?;
    if is_binary_dir(store_dir, binary) {
        debug!("the binary store is the binary's own directory - not copying");
        return Ok(None);
    }

    let stored = store_entry(store_dir, binary)?;
    let partial = super::replace::staging_path(&stored);

    info!(
        "copying binary to store: '{}' -> '{}'",
        binary.display(),
        stored.display()
    );
    fs::copy(binary, &partial)?;
    if let Err(err) = fs::rename(&partial, &stored) {
        let _ = fs::remove_file(&partial);
        return Err(err);
    }
    info!("binary copied");

    Ok(Some(stored))
}

/// Put the stored copy of the binary back in place.
/// Returns `false` if the store holds no copy.
pub fn restore_from_store(store_dir: &Path, binary: &Path) -> io::Result<bool> {
    let stored = store_entry(store_dir, binary)?;
    if !stored.is_file() {
        return Ok(false);
    }

    if let Some(parent) = binary.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    // go through the staging path so the live location never holds a partial copy
    let partial = super::replace::staging_path(binary);
    fs::copy(&stored, &partial)?;
    if let Err(err) = fs::rename(&partial, binary) {
        let _ = fs::remove_file(&partial);
        return Err(err);
    }
    info!(
        "restored '{}' from '{}'",
        binary.display(),
        stored.display()
    );
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn copies_and_overwrites_previous_copy() {
        let dir = tempfile::tempdir().unwrap();
        let binary = dir.path().join("bin").join("storagenode");
        let store = dir.path().join("store");
        fs::create_dir_all(binary.parent().unwrap()).unwrap();
        fs::write(&binary, b"v1").unwrap();
        fs::set_permissions(&binary, fs::Permissions::from_mode(0o755)).unwrap();

        let stored = copy_to_store(&store, &binary).unwrap().unwrap();
        assert_eq!(stored, store.join("storagenode"));
        assert_eq!(fs::read(&stored).unwrap(), b"v1");

        fs::write(&binary, b"v2").unwrap();
        copy_to_store(&store, &binary).unwrap();
        assert_eq!(fs::read(&stored).unwrap(), b"v2");
        assert!(!store.join("storagenode.tmp").exists());

        let mode = fs::metadata(&stored).unwrap().permissions().mode();
        assert_eq!(mode & 0o111, 0o111);
    }

    #[test]
    fn store_in_binary_dir_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let binary = dir.path().join("storagenode");
        fs::write(&binary, b"v1").unwrap();

        assert!(copy_to_store(dir.path(), &binary).unwrap().is_none());
    }

    #[test]
    fn restores_missing_binary() {
        let dir = tempfile::tempdir().unwrap();
        let binary = dir.path().join("bin").join("storagenode");
        let store = dir.path().join("store");

        assert!(!restore_from_store(&store, &binary).unwrap());

        fs::create_dir_all(&store).unwrap();
        fs::write(store.join("storagenode"), b"stored").unwrap();
        assert!(restore_from_store(&store, &binary).unwrap());
        assert_eq!(fs::read(&binary).unwrap(), b"stored");
        assert!(store.join("storagenode").exists());
    }
}
