// Copyright 2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use nym_upgrade_authority_client::{AuthorityClientError, ProcessRelease, UpgradeAuthorityClient};

/// Source of release announcements for the supervised processes.
#[async_trait]
pub trait ReleaseAuthority: Send + Sync {
    /// Release information of the process of the given kind,
    /// `None` if the authority does not know anything about it.
    async fn process_release(
        &self,
        process_name: &str,
    ) -> Result<Option<ProcessRelease>, AuthorityClientError>;
}

#[async_trait]
impl ReleaseAuthority for UpgradeAuthorityClient {
    async fn process_release(
        &self,
        process_name: &str,
    ) -> Result<Option<ProcessRelease>, AuthorityClientError> {
        match self.process(process_name).await {
            Ok(release) => Ok(Some(release)),
            Err(AuthorityClientError::UnknownProcess { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }
}
