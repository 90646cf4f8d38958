// Copyright 2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

#![warn(clippy::expect_used)]
#![warn(clippy::unwrap_used)]

use reqwest::header::{HeaderValue, USER_AGENT};
use std::time::Duration;
use tracing::debug;
use url::Url;

pub mod error;
pub mod models;
pub mod version;

pub use error::AuthorityClientError;
pub use models::{AllReleases, ProcessRelease, Release, Rollout, RolloutBytes};
pub use version::SemVer;

const CLIENT_USER_AGENT: &str = concat!("nym-upgrade-authority-client/", env!("CARGO_PKG_VERSION"));

/// Thin client over the upgrade authority, i.e. the remote service announcing
/// which daemon versions nodes should be running.
#[derive(Debug, Clone)]
pub struct UpgradeAuthorityClient {
    inner: reqwest::Client,
    address: Url,
}

impl UpgradeAuthorityClient {
    pub fn new(address: Url, request_timeout: Duration) -> Result<Self, AuthorityClientError> {
        let inner = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|source| AuthorityClientError::ClientBuildFailure { source })?;

        Ok(UpgradeAuthorityClient { inner, address })
    }

    pub fn address(&self) -> &Url {
        &self.address
    }

    /// Retrieve release information of all processes known to the authority.
    pub async fn all(&self) -> Result<AllReleases, AuthorityClientError> {
        debug!("querying the upgrade authority at {}", self.address);

        let response = self
            .inner
            .get(self.address.clone())
            .header(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT))
            .send()
            .await
            .map_err(|source| AuthorityClientError::RequestFailure {
                url: self.address.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthorityClientError::UnexpectedStatus {
                url: self.address.clone(),
                status,
            });
        }

        response
            .json()
            .await
            .map_err(|source| AuthorityClientError::MalformedResponse {
                url: self.address.clone(),
                source,
            })
    }

    /// Retrieve release information of the specified process kind.
    pub async fn process(&self, name: &str) -> Result<ProcessRelease, AuthorityClientError> {
        let mut all = self.all().await?;
        all.processes
            .remove(name)
            .ok_or_else(|| AuthorityClientError::UnknownProcess {
                name: name.to_string(),
            })
    }
}
