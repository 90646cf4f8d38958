// Copyright 2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

use nix::sys::signal::Signal;
use nym_upgrade_authority_client::{AuthorityClientError, SemVer};
use reqwest::StatusCode;
use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;
use tokio::task::JoinError;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("the daemon process has already been started")]
    AlreadyStarted,

    #[error("the daemon process has not been started")]
    NotStarted,

    #[error("another task is already waiting for the daemon process to finish")]
    AlreadyWaiting,

    #[error("failed to launch '{}': {source}", binary.display())]
    SpawnFailure {
        binary: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to wait for the daemon process (pid {pid}) to finish: {source}")]
    WaitFailure {
        pid: u32,
        #[source]
        source: io::Error,
    },

    #[error("failed to send {signal:?} to the daemon process (pid {pid}): {source}")]
    SignalFailure {
        pid: u32,
        signal: Signal,
        #[source]
        source: nix::Error,
    },

    #[error("the daemon process exited abnormally: {status}")]
    AbnormalExit { status: ExitStatus },

    #[error("failed to probe the version of '{}': {reason}", binary.display())]
    ProbeFailed { binary: PathBuf, reason: String },

    #[error("the output of '{}' does not contain a valid 'Version: <semver>' line", binary.display())]
    VersionUnparseable { binary: PathBuf },

    #[error("the version probe of '{}' got interrupted by shutdown", binary.display())]
    ProbeCancelled { binary: PathBuf },
}

#[derive(Debug, Error)]
pub enum DownloadFailure {
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error("received unexpected response status {0}")]
    Status(StatusCode),

    #[error("failed to write the temporary archive: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum ReplacementError {
    #[error("failed to download the upgrade archive from {url}: {source}")]
    DownloadFailed {
        url: String,
        #[source]
        source: DownloadFailure,
    },

    #[error("the upgrade archive is invalid: {reason}")]
    ArchiveFormatInvalid { reason: String },

    #[error("failed to extract the upgrade binary to '{}': {source}", path.display())]
    ExtractionFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("the archive extraction task did not complete: {source}")]
    ExtractionAborted {
        #[source]
        source: JoinError,
    },

    #[error("the downloaded binary reports version '{actual}' while {expected} was expected")]
    VersionMismatch {
        expected: SemVer,
        actual: String,
        #[source]
        source: Option<ProcessError>,
    },

    #[error("failed to move '{}' to its backup location '{}': {source}", binary.display(), backup.display())]
    BackupFailed {
        binary: PathBuf,
        backup: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to install '{}' as '{}': {source}", staged.display(), binary.display())]
    InstallFailed {
        binary: PathBuf,
        staged: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("the binary replacement got interrupted by shutdown")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("the upgrade authority is unavailable: {source}")]
    AuthorityUnavailable {
        #[source]
        source: AuthorityClientError,
    },

    #[error("the upgrade authority announced an invalid release: {source}")]
    InvalidRelease {
        #[source]
        source: AuthorityClientError,
    },

    #[error("the upgrade evaluation got interrupted by shutdown")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("failed to evaluate available upgrades: {source}")]
    Evaluation {
        #[from]
        source: EvaluationError,
    },

    #[error("failed to apply the upgrade to {target}: {source}")]
    Application {
        target: SemVer,
        #[source]
        source: ReplacementError,
    },
}

impl UpdateError {
    pub fn is_authority_unavailable(&self) -> bool {
        matches!(
            self,
            UpdateError::Evaluation {
                source: EvaluationError::AuthorityUnavailable { .. }
            }
        )
    }

    /// Whether the update got abandoned because of shutdown rather than an actual failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            UpdateError::Evaluation {
                source: EvaluationError::Cancelled
            } | UpdateError::Application {
                source: ReplacementError::Cancelled,
                ..
            }
        )
    }
}

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("the daemon exited unexpectedly {attempts} times in a row - giving up")]
    RetryLimitExceeded {
        attempts: usize,
        #[source]
        last_failure: Option<ProcessError>,
    },

    #[error("failed to wait for the daemon to shut down: {source}")]
    ShutdownFailure {
        #[source]
        source: ProcessError,
    },

    #[error("the {task} task did not complete: {source}")]
    TaskFailure {
        task: &'static str,
        #[source]
        source: JoinError,
    },
}

#[derive(Debug, Error)]
pub enum NodevisorError {
    #[error("failed to load the env file from '{}': {source}", path.display())]
    EnvFileLoadFailure {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },

    #[error("failed to load the nodevisor configuration from the environment: {source}")]
    ConfigLoadFailure {
        #[source]
        source: envy::Error,
    },

    #[error("the nodevisor configuration is invalid: {reason}")]
    InvalidConfig { reason: String },

    #[error("failed to build the http client: {source}")]
    HttpClientBuildFailure {
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to create the tokio runtime: {source}")]
    RuntimeBuildFailure {
        #[source]
        source: io::Error,
    },

    #[error("failed to register the signal handlers: {source}")]
    SignalHandlerFailure {
        #[source]
        source: io::Error,
    },

    #[error("the daemon binary is not available at '{}' and could not be restored: {reason}", path.display())]
    BinaryUnavailable { path: PathBuf, reason: String },

    #[error(transparent)]
    AuthorityClient(#[from] AuthorityClientError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Update(#[from] UpdateError),

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
}

impl NodevisorError {
    pub fn is_cancelled(&self) -> bool {
        match self {
            NodevisorError::Update(err) => err.is_cancelled(),
            NodevisorError::Process(ProcessError::ProbeCancelled { .. }) => true,
            _ => false,
        }
    }
}
