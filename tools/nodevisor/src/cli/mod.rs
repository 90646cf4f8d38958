// Copyright 2023-2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

use crate::config::load_env_file;
use crate::error::NodevisorError;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod exec;

#[derive(Parser, Debug)]
#[clap(author = "Nymtech", version, about)]
pub struct Cli {
    /// Path pointing to an env file that configures the nodevisor.
    /// If not provided, `.env` in the current directory is used when present.
    #[clap(short, long)]
    pub config_env_file: Option<PathBuf>,

    #[clap(subcommand)]
    command: Commands,
}

impl Cli {
    pub fn execute(self) -> Result<(), NodevisorError> {
        load_env_file(self.config_env_file.as_deref())?;

        match self.command {
            Commands::Exec(args) => exec::execute(args),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the daemon binary under supervision, keeping it running and up to date,
    /// e.g. `nodevisor exec /app/bin/storagenode run --config-dir=/app/config`
    Exec(exec::Args),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn daemon_arguments_are_passed_through() {
        let cli = Cli::try_parse_from([
            "nodevisor",
            "--config-env-file",
            "/etc/nodevisor.env",
            "exec",
            "/app/bin/storagenode",
            "run",
            "--config-dir=/app/config",
            "--verbose",
        ])
        .unwrap();

        assert_eq!(
            cli.config_env_file,
            Some(PathBuf::from("/etc/nodevisor.env"))
        );
        let Commands::Exec(args) = cli.command;
        assert_eq!(args.daemon_binary, PathBuf::from("/app/bin/storagenode"));
        assert_eq!(args.daemon_args, ["run", "--config-dir=/app/config", "--verbose"]);
    }

    #[test]
    fn daemon_binary_is_required() {
        assert!(Cli::try_parse_from(["nodevisor", "exec"]).is_err());
    }
}
