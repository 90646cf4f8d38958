// Copyright 2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

#![cfg(unix)]
#![warn(clippy::expect_used)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::dbg_macro)]

pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod daemon;
pub mod error;
pub mod logging;
pub mod node_id;
pub mod signal;
pub mod supervisor;
pub mod tasks;
pub mod updater;
pub mod upgrades;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use daemon::{ExitIntent, ManagedProcess};
pub use error::NodevisorError;
pub use node_id::NodeId;
pub use supervisor::{Supervisor, SupervisorConfig};
pub use updater::Updater;
pub use upgrades::BinaryReplacer;
