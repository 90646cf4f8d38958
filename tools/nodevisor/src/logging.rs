// Copyright 2022-2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::prelude::*;

pub fn default_tracing_env_filter() -> EnvFilter {
    if ::std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        // if the env value was not found, default to `INFO` level rather than `ERROR`
        EnvFilter::builder()
            .with_default_directive(LevelFilter::INFO.into())
            .parse_lossy("")
    }
}

/// Log to stderr so that the output of the daemon (inherited stdout) stays untouched.
pub fn setup_tracing_logger() {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .compact()
        .with_file(true)
        .with_line_number(true)
        .with_target(false);

    // a subscriber might have already been installed (e.g. in tests)
    let _ = tracing_subscriber::registry()
        .with(fmt_layer)
        .with(default_tracing_env_filter())
        .try_init();
}
