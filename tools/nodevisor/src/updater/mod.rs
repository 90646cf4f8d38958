// Copyright 2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

use crate::daemon::ManagedProcess;
use crate::error::{EvaluationError, ReplacementError, UpdateError};
use crate::upgrades::{store, BinaryReplacer, ReplacementRequest};
use nym_upgrade_authority_client::SemVer;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub mod authority;
pub mod rollout;

pub use authority::ReleaseAuthority;

/// Result of comparing the running version against what the authority announces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateDecision {
    pub should_update: bool,
    pub current_version: SemVer,
    pub target_version: Option<SemVer>,
    pub download_url: Option<String>,
    pub reason: String,
}

impl UpdateDecision {
    fn no_update(current_version: &SemVer, reason: String) -> Self {
        UpdateDecision {
            should_update: false,
            current_version: current_version.clone(),
            target_version: None,
            download_url: None,
            reason,
        }
    }
}

pub struct Updater {
    authority: Box<dyn ReleaseAuthority>,
    replacer: BinaryReplacer,

    /// Kind of the process as known by the authority, e.g. `storagenode`.
    process_name: String,
}

impl Updater {
    pub fn new<A>(authority: A, replacer: BinaryReplacer, process_name: impl Into<String>) -> Self
    where
        A: ReleaseAuthority + 'static,
    {
        Updater {
            authority: Box::new(authority),
            replacer,
            process_name: process_name.into(),
        }
    }

    pub fn process_name(&self) -> &str {
        &self.process_name
    }

    /// Ask the authority about the current release and decide whether this node should move to it.
    pub async fn evaluate(
        &self,
        process: &ManagedProcess,
        current: &SemVer,
        shutdown: &CancellationToken,
    ) -> Result<UpdateDecision, EvaluationError> {
        let release = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Err(EvaluationError::Cancelled),
            release = self.authority.process_release(&self.process_name) => {
                release.map_err(|source| EvaluationError::AuthorityUnavailable { source })?
            }
        };

        let Some(release) = release else {
            return Ok(UpdateDecision::no_update(
                current,
                format!(
                    "the upgrade authority does not announce any release of '{}'",
                    self.process_name
                ),
            ));
        };

        let decision = rollout::should_update(current, process.node_id(), &release)?;
        let Some(target) = decision.target else {
            return Ok(UpdateDecision::no_update(current, decision.reason));
        };

        let target_version = target
            .semver()
            .map_err(|source| EvaluationError::InvalidRelease { source })?;

        Ok(UpdateDecision {
            should_update: true,
            current_version: current.clone(),
            target_version: Some(target_version),
            download_url: Some(target.download_url()),
            reason: decision.reason,
        })
    }

    /// Install the release chosen by `decision`. Returns whether anything got installed.
    pub async fn apply(
        &self,
        process: &ManagedProcess,
        decision: &UpdateDecision,
        shutdown: &CancellationToken,
    ) -> Result<bool, ReplacementError> {
        let (true, Some(target_version), Some(download_url)) = (
            decision.should_update,
            &decision.target_version,
            &decision.download_url,
        ) else {
            return Ok(false);
        };

        info!(
            "upgrading '{}' from {} to {target_version}",
            process.binary_path().display(),
            decision.current_version
        );

        self.replacer
            .replace(
                ReplacementRequest {
                    download_url,
                    target: process.binary_path(),
                    current_version: &decision.current_version,
                    expected_version: target_version,
                },
                shutdown,
            )
            .await?;

        if let Some(store_dir) = process.store_dir() {
            if let Err(err) = store::copy_to_store(store_dir, process.binary_path()) {
                warn!(
                    "failed to copy the upgraded binary to the store at '{}': {err}",
                    store_dir.display()
                )
            }
        }

        Ok(true)
    }

    /// Check for a new release and install it if this node should run it.
    pub async fn update(
        &self,
        process: &ManagedProcess,
        current: &SemVer,
        shutdown: &CancellationToken,
    ) -> Result<bool, UpdateError> {
        let decision = self.evaluate(process, current, shutdown).await?;
        info!("{}", decision.reason);

        self.apply(process, &decision, shutdown)
            .await
            .map_err(|source| UpdateError::Application {
                target: decision.target_version.clone().unwrap_or_default(),
                source,
            })
    }
}
