// Copyright 2023-2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

use crate::error::NodevisorError;
use crate::node_id::NodeId;
use crate::supervisor::SupervisorConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const ENV_PREFIX: &str = "NODEVISOR_";

pub const DEFAULT_ENV_FILE: &str = ".env";

const DEFAULT_UPDATE_CHECK_INTERVAL: Duration = Duration::from_secs(15 * 60);
const DEFAULT_UPDATE_CHECK_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_RESTART_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_RETRY_RESET_AFTER: Duration = Duration::from_secs(10 * 60);
const DEFAULT_SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// Configuration read from the `NODEVISOR_*` environment variables,
/// e.g. `NODEVISOR_UPDATE_CHECK_INTERVAL=30m`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    /// How often the upgrade authority is queried for new releases.
    #[serde(with = "humantime_serde", default = "default_update_check_interval")]
    pub update_check_interval: Duration,

    /// Request timeout for querying the upgrade authority.
    #[serde(with = "humantime_serde", default = "default_update_check_timeout")]
    pub update_check_timeout: Duration,

    /// Location of the managed binary. Defaults to the binary passed to `exec`.
    #[serde(default)]
    pub binary_location: Option<PathBuf>,

    /// Directory keeping a copy of the most recently installed binary.
    #[serde(default)]
    pub binary_store_dir: Option<PathBuf>,

    pub version_server_address: Url,

    pub node_id: NodeId,

    /// Kind of the managed process as known by the upgrade authority.
    /// Defaults to the file name of the binary.
    #[serde(default)]
    pub process_name: Option<String>,

    #[serde(with = "humantime_serde", default = "default_restart_delay")]
    pub restart_delay: Duration,

    /// `0s` disables resetting the failure counter.
    #[serde(with = "humantime_serde", default = "default_retry_reset_after")]
    pub retry_reset_after: Duration,

    #[serde(with = "humantime_serde", default = "default_shutdown_grace_period")]
    pub shutdown_grace_period: Duration,

    #[serde(default)]
    pub disable_logs: bool,
}

fn default_update_check_interval() -> Duration {
    DEFAULT_UPDATE_CHECK_INTERVAL
}

fn default_update_check_timeout() -> Duration {
    DEFAULT_UPDATE_CHECK_TIMEOUT
}

fn default_restart_delay() -> Duration {
    DEFAULT_RESTART_DELAY
}

fn default_retry_reset_after() -> Duration {
    DEFAULT_RETRY_RESET_AFTER
}

fn default_shutdown_grace_period() -> Duration {
    DEFAULT_SHUTDOWN_GRACE_PERIOD
}

/// Load variables from the provided env file, or from `.env` in the working directory if it exists.
/// Variables already present in the environment take precedence.
pub fn load_env_file(path: Option<&Path>) -> Result<(), NodevisorError> {
    match path {
        Some(path) => {
            dotenvy::from_path(path).map_err(|source| NodevisorError::EnvFileLoadFailure {
                path: path.to_path_buf(),
                source,
            })?;
            debug!("loaded environment from '{}'", path.display());
        }
        None => match dotenvy::dotenv() {
            Ok(path) => debug!("loaded environment from '{}'", path.display()),
            Err(err) if err.not_found() => {}
            Err(source) => {
                return Err(NodevisorError::EnvFileLoadFailure {
                    path: PathBuf::from(DEFAULT_ENV_FILE),
                    source,
                })
            }
        },
    }
    Ok(())
}

impl Config {
    pub fn from_env() -> Result<Self, NodevisorError> {
        envy::prefixed(ENV_PREFIX)
            .from_env::<Config>()
            .map_err(|source| NodevisorError::ConfigLoadFailure { source })?
            .validated()
    }

    pub fn from_vars<I>(vars: I) -> Result<Self, NodevisorError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::prefixed(ENV_PREFIX)
            .from_iter::<_, Config>(vars)
            .map_err(|source| NodevisorError::ConfigLoadFailure { source })?
            .validated()
    }

    fn validated(self) -> Result<Self, NodevisorError> {
        if self.update_check_interval.is_zero() {
            return Err(NodevisorError::InvalidConfig {
                reason: "the update check interval must be non-zero".to_string(),
            });
        }
        if self.node_id.as_bytes().is_empty() {
            return Err(NodevisorError::InvalidConfig {
                reason: "the node id must not be empty".to_string(),
            });
        }
        Ok(self)
    }

    pub fn binary_location(&self, exec_binary: &Path) -> PathBuf {
        self.binary_location
            .clone()
            .unwrap_or_else(|| exec_binary.to_path_buf())
    }

    pub fn process_name(&self, binary: &Path) -> String {
        if let Some(name) = &self.process_name {
            return name.clone();
        }
        binary
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn retry_reset_after(&self) -> Option<Duration> {
        (!self.retry_reset_after.is_zero()).then_some(self.retry_reset_after)
    }

    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            check_interval: self.update_check_interval,
            restart_delay: self.restart_delay,
            retry_reset_after: self.retry_reset_after(),
            shutdown_grace_period: self.shutdown_grace_period,
        }
    }
}
