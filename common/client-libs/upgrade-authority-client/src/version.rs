// Copyright 2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt::{self, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Semantic version of a daemon binary.
///
/// Ordering and equality follow semver precedence, so build metadata is ignored
/// (`1.3.0+abc == 1.3.0`), while pre-release identifiers are not.
/// [`SemVer::ZERO`] is used as the "no version known yet" sentinel.
#[derive(Debug, Clone)]
pub struct SemVer(semver::Version);

impl SemVer {
    pub const ZERO: SemVer = SemVer(semver::Version::new(0, 0, 0));

    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        SemVer(semver::Version::new(major, minor, patch))
    }

    /// Parses the version, tolerating surrounding whitespace and a leading `v` (`v1.2.3`).
    pub fn parse(raw: &str) -> Result<Self, semver::Error> {
        let trimmed = raw.trim();
        let stripped = trimmed.strip_prefix('v').unwrap_or(trimmed);
        semver::Version::parse(stripped).map(SemVer)
    }

    pub fn is_zero(&self) -> bool {
        self.0.major == 0 && self.0.minor == 0 && self.0.patch == 0 && self.0.pre.is_empty()
    }

    pub fn inner(&self) -> &semver::Version {
        &self.0
    }
}

impl Default for SemVer {
    fn default() -> Self {
        SemVer::ZERO
    }
}

impl From<semver::Version> for SemVer {
    fn from(value: semver::Version) -> Self {
        SemVer(value)
    }
}

impl FromStr for SemVer {
    type Err = semver::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SemVer::parse(s)
    }
}

impl Display for SemVer {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl PartialEq for SemVer {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SemVer {}

impl PartialOrd for SemVer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SemVer {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp_precedence(&other.0)
    }
}

// must stay consistent with `Eq`, i.e. skip the build metadata
impl Hash for SemVer {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.major.hash(state);
        self.0.minor.hash(state);
        self.0.patch.hash(state);
        self.0.pre.hash(state);
    }
}

impl Serialize for SemVer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SemVer {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        SemVer::parse(&raw).map_err(serde::de::Error::custom)
    }
}
