// Copyright 2023-2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

use crate::error::{DownloadFailure, ReplacementError};
use bytes::Buf;
use futures::stream::StreamExt;
use std::io::{self, BufWriter, Write};
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

const LOGGING_RATE: Duration = Duration::from_secs(1);

fn log_progress_bar(downloaded: u64, length: u64) {
    let percentage = if length == 0 {
        100.
    } else {
        downloaded as f32 * 100. / length as f32
    };

    let width = 40;
    let filled = ((percentage * width as f32 / 100.) as usize).min(width);
    let empty = width - filled;

    let filled = format!("{:#^width$}", "", width = filled);
    let empty = format!("{: ^width$}", "", width = empty);

    let mb_downloaded = downloaded as f64 / (1024. * 1024.);
    let mb_total = length as f64 / (1024. * 1024.);

    info!("[{filled}{empty}] {mb_downloaded:.2}MB/{mb_total:.2}MB ({percentage:.2}%)");
}

/// Stream the upgrade archive into a private temporary file.
/// The file is removed as soon as the returned handle is dropped.
pub(super) async fn download_archive(
    http: &reqwest::Client,
    url: &str,
    shutdown: &CancellationToken,
) -> Result<NamedTempFile, ReplacementError> {
    let failure = |source: DownloadFailure| ReplacementError::DownloadFailed {
        url: url.to_string(),
        source,
    };

    let archive = tempfile::Builder::new()
        .prefix("nodevisor-upgrade-")
        .suffix(".tar.gz")
        .tempfile()
        .map_err(|err| failure(err.into()))?;

    info!(
        "download started: {url} -> {}",
        archive.path().display()
    );

    let response = tokio::select! {
        biased;
        _ = shutdown.cancelled() => return Err(ReplacementError::Cancelled),
        response = http.get(url).send() => response.map_err(|err| failure(err.into()))?,
    };

    let status = response.status();
    if !status.is_success() {
        return Err(failure(DownloadFailure::Status(status)));
    }

    let maybe_length = response.content_length();
    let mut source = response.bytes_stream();

    {
        let mut out = BufWriter::new(archive.as_file());
        let mut downloaded = 0;
        let mut last_logged = Instant::now();
        loop {
            let chunk = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return Err(ReplacementError::Cancelled),
                chunk = source.next() => chunk,
            };
            let Some(chunk) = chunk else {
                break;
            };

            let mut bytes = chunk.map_err(|err| failure(err.into()))?.reader();
            downloaded += io::copy(&mut bytes, &mut out).map_err(|err| failure(err.into()))?;

            if let Some(length) = maybe_length {
                if last_logged.elapsed() > LOGGING_RATE {
                    log_progress_bar(downloaded, length);
                    last_logged = Instant::now();
                }
            }
        }
        out.flush().map_err(|err| failure(err.into()))?;

        if let Some(length) = maybe_length {
            log_progress_bar(downloaded, length)
        }
    }

    info!(
        "download finished: {url} -> {}",
        archive.path().display()
    );
    Ok(archive)
}
