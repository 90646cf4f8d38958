// Copyright 2023-2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

use crate::daemon::{ExitIntent, ManagedProcess, ProcessExit};
use crate::error::{ProcessError, SupervisorError};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Number of consecutive unplanned exits after which the supervisor gives up.
pub const MAX_RETRIES: usize = 3;

/// Counter of consecutive unplanned daemon exits.
#[derive(Debug)]
pub struct RetryState {
    failures: usize,
    last_failure: Option<ProcessError>,

    /// A run lasting at least this long is considered healthy and clears the counter.
    reset_after: Option<Duration>,
}

impl RetryState {
    pub fn new(reset_after: Option<Duration>) -> Self {
        RetryState {
            failures: 0,
            last_failure: None,
            reset_after,
        }
    }

    pub fn failures(&self) -> usize {
        self.failures
    }

    pub fn is_exhausted(&self) -> bool {
        self.failures >= MAX_RETRIES
    }

    /// Account for a finished run. Returns `true` once the retry limit got reached.
    pub fn record_exit(&mut self, exit: ProcessExit) -> bool {
        if let Some(reset_after) = self.reset_after {
            if exit.uptime >= reset_after && self.failures > 0 {
                debug!(
                    "the daemon ran for {}, resetting the failure counter",
                    humantime::format_duration(exit.uptime)
                );
                self.failures = 0;
                self.last_failure = None;
            }
        }

        if exit.is_planned() {
            return false;
        }

        match exit.into_result() {
            Ok(()) => self.record_failure(None),
            Err(err) => self.record_failure(Some(err)),
        }
    }

    /// Account for a run that didn't even get going. Returns `true` once the retry limit got reached.
    pub fn record_failure(&mut self, failure: Option<ProcessError>) -> bool {
        self.failures += 1;
        self.last_failure = failure;
        self.is_exhausted()
    }

    pub fn into_error(self) -> SupervisorError {
        SupervisorError::RetryLimitExceeded {
            attempts: self.failures,
            last_failure: self.last_failure,
        }
    }
}

/// Keeps the daemon running: launches it, waits for it and relaunches it after it exits.
pub struct DaemonLauncher {
    process: Arc<ManagedProcess>,
    retries: RetryState,
    restart_delay: Duration,
    shutdown_grace_period: Duration,
}

impl DaemonLauncher {
    pub fn new(
        process: Arc<ManagedProcess>,
        restart_delay: Duration,
        retry_reset_after: Option<Duration>,
        shutdown_grace_period: Duration,
    ) -> Self {
        DaemonLauncher {
            process,
            retries: RetryState::new(retry_reset_after),
            restart_delay,
            shutdown_grace_period,
        }
    }

    pub async fn run(mut self, shutdown: CancellationToken) -> Result<(), SupervisorError> {
        let process = self.process.clone();

        loop {
            if shutdown.is_cancelled() {
                return Ok(());
            }

            match process.start() {
                Ok(()) => {}
                Err(ProcessError::AlreadyStarted) => {
                    debug!("the daemon is already running - waiting for it instead")
                }
                Err(err) => {
                    error!("failed to launch the daemon: {err}");
                    if self.retries.record_failure(Some(err)) {
                        return Err(self.retries.into_error());
                    }
                    if !self.restart_backoff(&shutdown).await {
                        return Ok(());
                    }
                    continue;
                }
            }

            let wait = process.wait();
            tokio::pin!(wait);

            let res = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return self.stop_daemon(wait).await,
                res = &mut wait => res,
            };

            let exit = match res {
                Ok(exit) => exit,
                Err(err) => {
                    error!("lost track of the daemon: {err}");
                    if self.retries.record_failure(Some(err)) {
                        return Err(self.retries.into_error());
                    }
                    continue;
                }
            };

            if exit.intent == Some(ExitIntent::Upgrade) {
                info!("the daemon stopped for the upgrade - relaunching it");
                self.retries.record_exit(exit);
                continue;
            }

            warn!(
                "the daemon exited unexpectedly with {} after {}",
                exit.status,
                humantime::format_duration(exit.uptime)
            );
            if self.retries.record_exit(exit) {
                error!("the daemon failed {MAX_RETRIES} times in a row - not restarting it anymore");
                return Err(self.retries.into_error());
            }
            info!(
                "restarting the daemon ({}/{MAX_RETRIES} consecutive failures)",
                self.retries.failures()
            );

            if !self.restart_backoff(&shutdown).await {
                return Ok(());
            }
        }
    }

    // returns false if shutdown got requested in the meantime
    async fn restart_backoff(&self, shutdown: &CancellationToken) -> bool {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => false,
            _ = sleep(self.restart_delay) => true,
        }
    }

    async fn stop_daemon<F>(&self, mut wait: Pin<&mut F>) -> Result<(), SupervisorError>
    where
        F: Future<Output = Result<ProcessExit, ProcessError>>,
    {
        info!("stopping the daemon");
        if let Err(err) = self.process.exit_with_intent(ExitIntent::Shutdown) {
            warn!("failed to interrupt the daemon: {err}");
        }

        match timeout(self.shutdown_grace_period, wait.as_mut()).await {
            Ok(res) => {
                let exit = res.map_err(|source| SupervisorError::ShutdownFailure { source })?;
                info!("the daemon stopped with {}", exit.status);
                Ok(())
            }
            Err(_elapsed) => {
                warn!(
                    "the daemon did not stop within {} - killing it",
                    humantime::format_duration(self.shutdown_grace_period)
                );
                self.process
                    .kill()
                    .map_err(|source| SupervisorError::ShutdownFailure { source })?;
                wait.await
                    .map_err(|source| SupervisorError::ShutdownFailure { source })?;
                Ok(())
            }
        }
    }
}
