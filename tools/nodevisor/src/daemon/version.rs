// Copyright 2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

use crate::error::ProcessError;
use nym_upgrade_authority_client::SemVer;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

/// Argument making the daemon print its version information and exit.
pub const VERSION_ARG: &str = "version";

const VERSION_LINE_PREFIX: &str = "Version: ";

// the probe is a short-lived invocation, anything slower than that is a broken binary
const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Extracts the version out of the first line starting with `Version: `.
pub(crate) fn parse_version_output(output: &str) -> Option<SemVer> {
    output
        .lines()
        .find_map(|line| line.strip_prefix(VERSION_LINE_PREFIX))
        .and_then(|raw| SemVer::parse(raw).ok())
}

// each supervised daemon exposes the `version` command that outputs (among other things)
// a `Version: <semver>` line
#[instrument(skip(shutdown))]
pub async fn probe_binary_version(
    binary: &Path,
    shutdown: &CancellationToken,
) -> Result<SemVer, ProcessError> {
    let probe = Command::new(binary)
        .arg(VERSION_ARG)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output();

    let output = tokio::select! {
        biased;
        _ = shutdown.cancelled() => {
            return Err(ProcessError::ProbeCancelled {
                binary: binary.to_path_buf(),
            })
        }
        output = tokio::time::timeout(PROBE_TIMEOUT, probe) => output,
    };

    let output = match output {
        Err(_elapsed) => {
            return Err(ProcessError::ProbeFailed {
                binary: binary.to_path_buf(),
                reason: format!("it did not finish within {}", humantime::format_duration(PROBE_TIMEOUT)),
            })
        }
        Ok(Err(source)) => {
            return Err(ProcessError::ProbeFailed {
                binary: binary.to_path_buf(),
                reason: source.to_string(),
            })
        }
        Ok(Ok(output)) => output,
    };

    if !output.status.success() {
        return Err(ProcessError::ProbeFailed {
            binary: binary.to_path_buf(),
            reason: format!("it exited with {}", output.status),
        });
    }

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push('\n');
    combined.push_str(&String::from_utf8_lossy(&output.stderr));

    let version =
        parse_version_output(&combined).ok_or_else(|| ProcessError::VersionUnparseable {
            binary: binary.to_path_buf(),
        })?;
    debug!("'{}' reports version {version}", binary.display());
    Ok(version)
}
