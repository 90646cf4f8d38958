// Copyright 2023-2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

use crate::daemon::version::probe_binary_version;
use crate::error::{ProcessError, ReplacementError};
use nym_upgrade_authority_client::SemVer;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

mod archive;
mod download;
pub mod replace;
pub mod store;

pub use replace::{backup_path, recover_interrupted_replacement, staging_path};

/// Everything needed to swap the binary at `target` with the announced release.
#[derive(Debug, Clone, Copy)]
pub struct ReplacementRequest<'a> {
    pub download_url: &'a str,
    pub target: &'a Path,

    /// Version of the binary currently at `target`, zero if there isn't one.
    pub current_version: &'a SemVer,
    pub expected_version: &'a SemVer,
}

/// Downloads, verifies and installs new binaries.
#[derive(Debug, Clone)]
pub struct BinaryReplacer {
    http: reqwest::Client,
}

impl BinaryReplacer {
    pub fn new(http: reqwest::Client) -> Self {
        BinaryReplacer { http }
    }

    /// Replace the binary at `request.target` with the one served at `request.download_url`.
    ///
    /// On success the target holds the verified binary of `expected_version`.
    /// On failure the target is left exactly as it was found.
    #[instrument(skip_all, fields(target = %request.target.display(), version = %request.expected_version))]
    pub async fn replace(
        &self,
        request: ReplacementRequest<'_>,
        shutdown: &CancellationToken,
    ) -> Result<(), ReplacementError> {
        // the temporary archive gets removed once this goes out of scope
        let archive = download::download_archive(&self.http, request.download_url, shutdown).await?;

        let staged = staging_path(request.target);
        let archive_path = archive.path().to_path_buf();
        let staged_target = staged.clone();
        tokio::task::spawn_blocking(move || {
            archive::unpack_single_binary(&archive_path, &staged_target)
        })
        .await
        .map_err(|source| ReplacementError::ExtractionAborted { source })??;
        drop(archive);

        if let Err(err) = verify_staged(&staged, request.expected_version, shutdown).await {
            replace::discard_staged(&staged);
            return Err(err);
        }

        // past this point the replacement always runs to completion
        if shutdown.is_cancelled() {
            replace::discard_staged(&staged);
            return Err(ReplacementError::Cancelled);
        }

        replace::ReplacementAttempt::new(
            request.target.to_path_buf(),
            staged,
            request.current_version.clone(),
        )
        .commit()?;

        info!(
            "'{}' has been replaced with version {}",
            request.target.display(),
            request.expected_version
        );
        Ok(())
    }
}

async fn verify_staged(
    staged: &Path,
    expected: &SemVer,
    shutdown: &CancellationToken,
) -> Result<(), ReplacementError> {
    match probe_binary_version(staged, shutdown).await {
        Ok(actual) if &actual == expected => Ok(()),
        Ok(actual) => Err(ReplacementError::VersionMismatch {
            expected: expected.clone(),
            actual: actual.to_string(),
            source: None,
        }),
        Err(ProcessError::ProbeCancelled { .. }) => Err(ReplacementError::Cancelled),
        Err(err) => Err(ReplacementError::VersionMismatch {
            expected: expected.clone(),
            actual: "<unknown>".to_string(),
            source: Some(err),
        }),
    }
}
