// Copyright 2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

use crate::error::AuthorityClientError;
use crate::version::SemVer;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;

pub const ROLLOUT_BYTES_LEN: usize = 32;

pub type RolloutBytes = [u8; ROLLOUT_BYTES_LEN];

/// Release information for every process kind known to the authority.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllReleases {
    #[serde(default)]
    pub processes: HashMap<String, ProcessRelease>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRelease {
    /// The lowest version the authority still considers acceptable.
    /// Nodes below it are upgraded regardless of the rollout.
    #[serde(default)]
    pub minimum: Release,

    /// The version nodes should be running once the rollout reaches them.
    pub suggested: Release,

    #[serde(default)]
    pub rollout: Rollout,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub version: String,

    #[serde(default)]
    pub url: String,
}

impl Release {
    pub fn semver(&self) -> Result<SemVer, AuthorityClientError> {
        SemVer::parse(&self.version).map_err(|source| AuthorityClientError::MalformedVersion {
            raw: self.version.clone(),
            source,
        })
    }

    /// Returns the download url with the `{os}` and `{arch}` placeholders resolved for this host.
    pub fn download_url(&self) -> String {
        resolve_download_url(&self.url)
    }
}

/// Parameters of a staged rollout.
///
/// A node takes part in the rollout if its keyed hash (keyed with `seed`) is
/// lexicographically not greater than `cursor`. Moving the cursor towards `0xff..ff`
/// gradually admits the whole network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rollout {
    #[serde(with = "hex_rollout_bytes")]
    pub seed: RolloutBytes,

    #[serde(with = "hex_rollout_bytes")]
    pub cursor: RolloutBytes,
}

pub fn resolve_download_url(raw: &str) -> String {
    raw.replace("{os}", env::consts::OS)
        .replace("{arch}", release_arch(env::consts::ARCH))
}

// release artifacts are named after the go-style architecture identifiers
fn release_arch(arch: &str) -> &str {
    match arch {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        other => other,
    }
}

mod hex_rollout_bytes {
    use super::{RolloutBytes, ROLLOUT_BYTES_LEN};
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(
        bytes: &RolloutBytes,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<RolloutBytes, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw.is_empty() {
            return Ok([0u8; ROLLOUT_BYTES_LEN]);
        }

        let decoded = hex::decode(&raw).map_err(serde::de::Error::custom)?;
        decoded.try_into().map_err(|bytes: Vec<u8>| {
            serde::de::Error::custom(format!(
                "expected {ROLLOUT_BYTES_LEN} rollout bytes, got {}",
                bytes.len()
            ))
        })
    }
}
