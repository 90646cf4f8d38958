// Copyright 2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

use reqwest::StatusCode;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum AuthorityClientError {
    #[error("failed to build the http client: {source}")]
    ClientBuildFailure {
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to query the upgrade authority at {url}: {source}")]
    RequestFailure {
        url: Url,
        #[source]
        source: reqwest::Error,
    },

    #[error("the upgrade authority at {url} responded with {status}")]
    UnexpectedStatus { url: Url, status: StatusCode },

    #[error("the upgrade authority at {url} returned a malformed response: {source}")]
    MalformedResponse {
        url: Url,
        #[source]
        source: reqwest::Error,
    },

    #[error("the upgrade authority does not know about process '{name}'")]
    UnknownProcess { name: String },

    #[error("'{raw}' is not a valid semantic version: {source}")]
    MalformedVersion {
        raw: String,
        #[source]
        source: semver::Error,
    },
}
