// Copyright 2023-2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

use crate::bootstrap::supervise;
use crate::config::Config;
use crate::error::NodevisorError;
use crate::logging::setup_tracing_logger;
use crate::signal::cancel_on_signal;
use std::path::PathBuf;
use tokio::runtime;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(clap::Args, Debug)]
pub struct Args {
    /// Path to the daemon's executable.
    pub(crate) daemon_binary: PathBuf,

    /// Arguments passed to the daemon on every launch.
    #[clap(trailing_var_arg = true, allow_hyphen_values = true)]
    pub(crate) daemon_args: Vec<String>,
}

pub(crate) fn execute(args: Args) -> Result<(), NodevisorError> {
    let config = Config::from_env()?;
    if !config.disable_logs {
        setup_tracing_logger();
    }

    let rt = runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|source| NodevisorError::RuntimeBuildFailure { source })?;

    rt.block_on(run(config, args))
}

async fn run(config: Config, args: Args) -> Result<(), NodevisorError> {
    let shutdown = CancellationToken::new();
    let signal_handle = cancel_on_signal(shutdown.clone())
        .map_err(|source| NodevisorError::SignalHandlerFailure { source })?;

    let res = supervise(&config, &args.daemon_binary, args.daemon_args, shutdown.clone()).await;
    match &res {
        Ok(()) => info!("nodevisor has finished"),
        Err(err) => error!("nodevisor could not continue running: {err}"),
    }

    // make sure the signal listener doesn't outlive us
    shutdown.cancel();
    let _ = signal_handle.await;
    res
}
