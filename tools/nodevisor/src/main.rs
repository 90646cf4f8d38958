// Copyright 2023-2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

#![warn(clippy::expect_used)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::dbg_macro)]

#[cfg(unix)]
fn main() -> anyhow::Result<()> {
    use clap::Parser;

    let args = nodevisor::cli::Cli::parse();

    Ok(args.execute()?)
}

#[cfg(not(unix))]
fn main() {
    panic!("nodevisor is not supported on this platform")
}
