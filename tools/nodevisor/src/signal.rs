// Copyright 2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

use std::io;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Cancel `shutdown` once the process receives a termination signal.
pub fn cancel_on_signal(shutdown: CancellationToken) -> io::Result<tokio::task::JoinHandle<()>> {
    // register the handlers before returning so that no signal gets lost in between
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    Ok(tokio::spawn(async move {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = sigint.recv() => info!("received SIGINT"),
            _ = sigterm.recv() => info!("received SIGTERM"),
            _ = sigquit.recv() => info!("received SIGQUIT"),
        }
        info!("shutting down");
        shutdown.cancel();
    }))
}
