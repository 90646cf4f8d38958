// Copyright 2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Write an executable shell script acting as the daemon.
pub(crate) fn write_stub_binary(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, stub_script(body)).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

pub(crate) fn stub_script(body: &str) -> String {
    format!("#!/bin/sh\n{body}\n")
}

/// Script of a daemon reporting `version` that otherwise runs until interrupted.
pub(crate) fn versioned_daemon_script(version: &str) -> String {
    stub_script(&format!(
        r#"if [ "$1" = "version" ]; then echo "Version: {version}"; exit 0; fi
exec sleep 30"#
    ))
}

/// Build a `.tar.gz` archive containing the provided `(name, content)` entries.
pub(crate) fn tar_gz(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (name, content) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder.append_data(&mut header, name, *content).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}
