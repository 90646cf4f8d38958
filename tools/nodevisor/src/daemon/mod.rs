// Copyright 2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

use crate::error::ProcessError;
use crate::node_id::NodeId;
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use nym_upgrade_authority_client::SemVer;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub mod version;

/// Reason the supervisor itself asked the daemon to terminate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitIntent {
    /// A new binary got installed and the daemon has to be relaunched onto it.
    Upgrade,

    /// The supervisor is shutting down.
    Shutdown,
}

/// Outcome of a single daemon run.
#[derive(Debug)]
pub struct ProcessExit {
    pub status: ExitStatus,
    pub intent: Option<ExitIntent>,
    pub uptime: Duration,
}

impl ProcessExit {
    /// Whether the supervisor requested this exit (as opposed to a crash or an unsolicited exit).
    pub fn is_planned(&self) -> bool {
        self.intent.is_some()
    }

    pub fn into_result(self) -> Result<(), ProcessError> {
        if self.status.success() {
            Ok(())
        } else {
            Err(ProcessError::AbnormalExit {
                status: self.status,
            })
        }
    }
}

struct RunHandle {
    pid: Option<u32>,

    // taken out for the duration of `wait`
    child: Option<Child>,
    started_at: Instant,
    intent: Option<ExitIntent>,
}

/// The single daemon process managed by the supervisor.
///
/// The run handle is only ever accessed under the mutex, so `start`, `wait`,
/// `exit` and `kill` can be safely called from concurrent tasks.
pub struct ManagedProcess {
    binary_path: PathBuf,
    store_dir: Option<PathBuf>,

    // the first argument is the name of the binary itself and is not passed on launch
    launch_args: Vec<String>,
    node_id: NodeId,

    run_handle: Mutex<Option<RunHandle>>,
}

// makes sure the handle gets cleared even if the waiting future got dropped
struct ClearOnDrop<'a>(&'a Mutex<Option<RunHandle>>);

impl Drop for ClearOnDrop<'_> {
    fn drop(&mut self) {
        self.0.lock().take();
    }
}

impl ManagedProcess {
    pub fn new(
        node_id: NodeId,
        binary_path: PathBuf,
        store_dir: Option<PathBuf>,
        launch_args: Vec<String>,
    ) -> Self {
        ManagedProcess {
            binary_path,
            store_dir,
            launch_args,
            node_id,
            run_handle: Mutex::new(None),
        }
    }

    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    pub fn store_dir(&self) -> Option<&Path> {
        self.store_dir.as_deref()
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    pub fn is_running(&self) -> bool {
        self.run_handle.lock().is_some()
    }

    /// Launch the daemon. Returns as soon as the process got spawned.
    pub fn start(&self) -> Result<(), ProcessError> {
        let mut handle = self.run_handle.lock();
        if handle.is_some() {
            return Err(ProcessError::AlreadyStarted);
        }

        let child = Command::new(&self.binary_path)
            .args(self.launch_args.iter().skip(1))
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ProcessError::SpawnFailure {
                binary: self.binary_path.clone(),
                source,
            })?;

        let pid = child.id();
        info!(
            "launched '{}' (pid: {})",
            self.binary_path.display(),
            pid.map(|pid| pid.to_string()).unwrap_or_default()
        );

        *handle = Some(RunHandle {
            pid,
            child: Some(child),
            started_at: Instant::now(),
            intent: None,
        });
        Ok(())
    }

    /// Wait for the running daemon to terminate and clear its run handle.
    pub async fn wait(&self) -> Result<ProcessExit, ProcessError> {
        let (mut child, pid) = {
            let mut guard = self.run_handle.lock();
            let handle = guard.as_mut().ok_or(ProcessError::NotStarted)?;
            let child = handle.child.take().ok_or(ProcessError::AlreadyWaiting)?;
            (child, handle.pid)
        };
        let clear_guard = ClearOnDrop(&self.run_handle);

        let res = child.wait().await;

        let finished = self.run_handle.lock().take();
        drop(clear_guard);

        let status = res.map_err(|source| ProcessError::WaitFailure {
            pid: pid.unwrap_or_default(),
            source,
        })?;

        let (intent, uptime) = finished
            .map(|handle| (handle.intent, handle.started_at.elapsed()))
            .unwrap_or((None, Duration::ZERO));

        debug!(
            "the daemon finished with {status} after {}",
            humantime::format_duration(uptime)
        );

        Ok(ProcessExit {
            status,
            intent,
            uptime,
        })
    }

    /// Ask the daemon to gracefully terminate. It's a no-op if nothing is running.
    /// This does not wait for the termination to happen.
    pub fn exit(&self) -> Result<(), ProcessError> {
        self.signal(Signal::SIGINT, None)
    }

    /// Same as [`exit`](Self::exit), but marks the resulting exit as requested by the supervisor.
    pub fn exit_with_intent(&self, intent: ExitIntent) -> Result<(), ProcessError> {
        self.signal(Signal::SIGINT, Some(intent))
    }

    /// Forcefully terminate the daemon. It's a no-op if nothing is running.
    pub fn kill(&self) -> Result<(), ProcessError> {
        self.signal(Signal::SIGKILL, None)
    }

    fn signal(&self, signal: Signal, intent: Option<ExitIntent>) -> Result<(), ProcessError> {
        let mut guard = self.run_handle.lock();
        let Some(handle) = guard.as_mut() else {
            debug!("the daemon is not running - not sending {signal:?}");
            return Ok(());
        };

        let Some(pid) = handle.pid else {
            return Ok(());
        };

        debug!("sending {signal:?} to the daemon (pid: {pid})");
        match kill(Pid::from_raw(pid as i32), signal) {
            Ok(()) => {
                if intent.is_some() {
                    handle.intent = intent;
                }
                Ok(())
            }
            // the process is already gone and whatever made it exit wasn't us
            Err(Errno::ESRCH) => Ok(()),
            Err(source) => Err(ProcessError::SignalFailure {
                pid,
                signal,
                source,
            }),
        }
    }

    /// Run the binary out-of-band to determine its current version.
    pub async fn probe_version(&self, shutdown: &CancellationToken) -> Result<SemVer, ProcessError> {
        version::probe_binary_version(&self.binary_path, shutdown).await
    }
}
