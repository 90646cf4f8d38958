// Copyright 2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

use crate::error::ReplacementError;
use flate2::read::GzDecoder;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use tar::EntryType;
use tracing::{debug, warn};

fn invalid<E: ToString>(reason: E) -> ReplacementError {
    ReplacementError::ArchiveFormatInvalid {
        reason: reason.to_string(),
    }
}

/// Extract the only file contained in the gzipped tar `archive` into `target`.
///
/// `target` is created exclusively with executable permissions, so a leftover file
/// from a previous attempt makes this fail. On any failure nothing is left at `target`.
pub(super) fn unpack_single_binary(archive: &Path, target: &Path) -> Result<(), ReplacementError> {
    let file = File::open(archive).map_err(|source| ReplacementError::ExtractionFailure {
        path: archive.to_path_buf(),
        source,
    })?;

    let mut archive = tar::Archive::new(GzDecoder::new(BufReader::new(file)));
    let mut entries = archive.entries().map_err(invalid)?;

    let mut entry = match entries.next() {
        None => return Err(invalid("the archive is empty")),
        Some(entry) => entry.map_err(invalid)?,
    };

    if entry.header().entry_type() != EntryType::Regular {
        return Err(invalid(format!(
            "the archive entry '{}' is not a regular file",
            entry_name(&entry)
        )));
    }
    debug!("unpacking '{}'", entry_name(&entry));

    let mut out = OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o755)
        .open(target)
        .map_err(|source| ReplacementError::ExtractionFailure {
            path: target.to_path_buf(),
            source,
        })?;

    let written = io::copy(&mut entry, &mut out).and_then(|_| out.sync_all());
    drop(out);
    drop(entry);
    if let Err(source) = written {
        remove_partial(target);
        return Err(ReplacementError::ExtractionFailure {
            path: target.to_path_buf(),
            source,
        });
    }

    // the authority is expected to serve archives with the binary alone,
    // anything more means the url points at something we don't know how to install
    if entries.next().is_some() {
        remove_partial(target);
        return Err(invalid("the archive should contain exactly one file"));
    }

    Ok(())
}

fn entry_name<R: io::Read>(entry: &tar::Entry<'_, R>) -> String {
    entry
        .path()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|_| "<unknown>".to_string())
}

fn remove_partial(path: &Path) {
    if let Err(err) = fs::remove_file(path) {
        if err.kind() != io::ErrorKind::NotFound {
            warn!("failed to remove '{}': {err}", path.display());
        }
    }
}
