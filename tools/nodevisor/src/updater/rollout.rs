// Copyright 2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

use crate::error::EvaluationError;
use crate::node_id::NodeId;
use hmac::{Hmac, Mac};
use nym_upgrade_authority_client::{ProcessRelease, Release, Rollout, RolloutBytes, SemVer};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Outcome of matching the local version against the announced release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolloutDecision {
    /// The release to install, if any.
    pub target: Option<Release>,
    pub reason: String,
}

impl RolloutDecision {
    fn update(target: &Release, reason: impl Into<String>) -> Self {
        RolloutDecision {
            target: Some(target.clone()),
            reason: reason.into(),
        }
    }

    fn skip(reason: impl Into<String>) -> Self {
        RolloutDecision {
            target: None,
            reason: reason.into(),
        }
    }
}

pub(crate) fn rollout_hash(seed: &RolloutBytes, node_id: &NodeId) -> Option<RolloutBytes> {
    // hmac accepts keys of any length, so this can't really fail
    let mut mac = HmacSha256::new_from_slice(seed).ok()?;
    mac.update(node_id.as_bytes());

    let mut hash = [0u8; 32];
    hash.copy_from_slice(&mac.finalize().into_bytes());
    Some(hash)
}

/// Whether the node falls within the cohort currently admitted by the rollout.
pub fn is_in_rollout(rollout: &Rollout, node_id: &NodeId) -> bool {
    if rollout.cursor.iter().all(|b| *b == 0) {
        return false;
    }
    rollout_hash(&rollout.seed, node_id).is_some_and(|hash| hash <= rollout.cursor)
}

fn release_version(release: &Release) -> Result<SemVer, EvaluationError> {
    release
        .semver()
        .map_err(|source| EvaluationError::InvalidRelease { source })
}

/// Decide whether a node running `current` should move to the release announced by the authority.
///
/// Nodes without a known version or below the announced minimum are always updated
/// to the suggested version. Otherwise, nodes behind the suggested version are updated
/// only once the staged rollout reaches them.
pub fn should_update(
    current: &SemVer,
    node_id: &NodeId,
    release: &ProcessRelease,
) -> Result<RolloutDecision, EvaluationError> {
    let suggested = release_version(&release.suggested)?;
    let minimum = if release.minimum.version.trim().is_empty() {
        None
    } else {
        Some(release_version(&release.minimum)?)
    };

    if current.is_zero() {
        return Ok(RolloutDecision::update(
            &release.suggested,
            format!("no version is installed, installing {suggested}"),
        ));
    }

    if let Some(minimum) = minimum {
        if current < &minimum {
            return Ok(RolloutDecision::update(
                &release.suggested,
                format!("version {current} is below the minimum {minimum}, updating to {suggested}"),
            ));
        }
    }

    if current >= &suggested {
        return Ok(RolloutDecision::skip(format!(
            "version {current} is up to date (suggested: {suggested})"
        )));
    }

    if !is_in_rollout(&release.rollout, node_id) {
        return Ok(RolloutDecision::skip(format!(
            "the rollout of {suggested} has not reached this node yet"
        )));
    }

    Ok(RolloutDecision::update(
        &release.suggested,
        format!("this node is part of the rollout of {suggested}"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEED: RolloutBytes = [7u8; 32];

    fn release(minimum: &str, suggested: &str, cursor: RolloutBytes) -> ProcessRelease {
        ProcessRelease {
            minimum: Release {
                version: minimum.to_string(),
                url: String::new(),
            },
            suggested: Release {
                version: suggested.to_string(),
                url: "https://releases.example/{os}/{arch}/storagenode.tar.gz".to_string(),
            },
            rollout: Rollout { seed: SEED, cursor },
        }
    }

    fn node() -> NodeId {
        NodeId::new("1ABCDEFGHJKLMNPQRSTUVWXYZ")
    }

    fn decrement(mut bytes: RolloutBytes) -> RolloutBytes {
        for byte in bytes.iter_mut().rev() {
            let (value, borrow) = byte.overflowing_sub(1);
            *byte = value;
            if !borrow {
                break;
            }
        }
        bytes
    }

    #[test]
    fn decision_table() {
        let full = [0xff; 32];
        let none = [0u8; 32];

        // (current, minimum, suggested, cursor, should update)
        let cases = [
            ("0.0.0", "1.0.0", "1.3.0", none, true),
            ("0.9.0", "1.0.0", "1.3.0", none, true),
            ("1.2.0", "", "1.3.0", none, false),
            ("1.2.0", "1.0.0", "1.3.0", none, false),
            ("1.2.0", "1.0.0", "1.3.0", full, true),
            ("1.3.0", "1.0.0", "1.3.0", full, false),
            ("1.4.0", "1.0.0", "1.3.0", full, false),
            ("1.3.0-rc.1", "1.0.0", "1.3.0", full, true),
            ("1.3.0+build.7", "1.0.0", "1.3.0", full, false),
        ];

        for (current, minimum, suggested, cursor, expected) in cases {
            let current = SemVer::parse(current).unwrap();
            let decision = should_update(&current, &node(), &release(minimum, suggested, cursor)).unwrap();
            assert_eq!(
                decision.target.is_some(),
                expected,
                "current: {current}, minimum: {minimum:?}, suggested: {suggested}, reason: {}",
                decision.reason
            );
            if let Some(target) = decision.target {
                assert_eq!(target.version, suggested);
            }
        }
    }

    #[test]
    fn cursor_boundary_is_inclusive() {
        let hash = rollout_hash(&SEED, &node()).unwrap();
        let current = SemVer::new(1, 2, 0);

        let at_hash = should_update(&current, &node(), &release("", "1.3.0", hash)).unwrap();
        assert!(at_hash.target.is_some());

        let below_hash =
            should_update(&current, &node(), &release("", "1.3.0", decrement(hash))).unwrap();
        assert!(below_hash.target.is_none());
    }

    #[test]
    fn rollout_depends_on_node_and_seed() {
        let a = rollout_hash(&SEED, &NodeId::new("node-a")).unwrap();
        let b = rollout_hash(&SEED, &NodeId::new("node-b")).unwrap();
        let a_other_seed = rollout_hash(&[8u8; 32], &NodeId::new("node-a")).unwrap();
        assert_ne!(a, b);
        assert_ne!(a, a_other_seed);
        assert_eq!(a, rollout_hash(&SEED, &NodeId::new("node-a")).unwrap());
    }

    #[test]
    fn invalid_versions_are_rejected() {
        let current = SemVer::new(1, 2, 0);
        assert!(matches!(
            should_update(&current, &node(), &release("", "not-a-version", [0xff; 32])),
            Err(EvaluationError::InvalidRelease { .. })
        ));
        assert!(matches!(
            should_update(&current, &node(), &release("garbage", "1.3.0", [0xff; 32])),
            Err(EvaluationError::InvalidRelease { .. })
        ));
    }
}
