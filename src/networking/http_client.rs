// Copyright (c) 2026 Byteboard
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Bounded HTTP fetch.
//!
//! A fetch requires the server to declare `Content-Length`, rejects bodies
//! larger than the caller's cap before streaming a single byte, and enforces
//! the deadline while streaming. At most `Content-Length` bytes reach the
//! sink.

use crate::monitoring::metrics::Metrics;
use futures::StreamExt;
use std::io::Write;
use std::time::{Duration, Instant};
use thiserror::Error;

/// HTTP transport errors.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Server did not set `Content-Length`.
    #[error("missing content length")]
    NoContentLength,
    /// Declared body exceeds the caller's byte cap.
    #[error("body larger than allowed")]
    TooLarge,
    /// Deadline expired before the body completed.
    #[error("fetch timed out")]
    Timeout,
    /// Non-success status code.
    #[error("http status")]
    Status,
    /// Request could not be sent or the body stream broke.
    #[error("request failed")]
    Request,
    /// Sink failure.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Effective read deadline.
///
/// `None` means no timeout; a zero duration is bumped to one millisecond so
/// "poll once" still gives the connection a chance.
fn deadline_for(timeout: Option<Duration>) -> Option<tokio::time::Instant> {
    timeout.map(|t| {
        let t = if t.is_zero() { Duration::from_millis(1) } else { t };
        tokio::time::Instant::now() + t
    })
}

async fn bounded<F>(fut: F, deadline: Option<tokio::time::Instant>) -> Result<F::Output, HttpError>
where
    F: std::future::Future,
{
    match deadline {
        Some(d) => tokio::time::timeout_at(d, fut)
            .await
            .map_err(|_| HttpError::Timeout),
        None => Ok(fut.await),
    }
}

/// GET `url` into `out`, returning the elapsed time on success.
///
/// The received-byte counter accumulates everything that reaches the sink.
pub async fn fetch(
    client: &reqwest::Client,
    url: &str,
    out: &mut (dyn Write + Send),
    timeout: Option<Duration>,
    max_bytes: u64,
    metrics: &Metrics,
) -> Result<Duration, HttpError> {
    let start = Instant::now();
    let deadline = deadline_for(timeout);

    let resp = bounded(client.get(url).send(), deadline)
        .await?
        .map_err(|_| HttpError::Request)?;
    if !resp.status().is_success() {
        return Err(HttpError::Status);
    }
    let declared = resp.content_length().ok_or(HttpError::NoContentLength)?;
    if declared > max_bytes {
        return Err(HttpError::TooLarge);
    }

    let mut stream = resp.bytes_stream();
    let mut got: u64 = 0;
    while got < declared {
        let chunk = match bounded(stream.next(), deadline).await? {
            Some(Ok(chunk)) => chunk,
            Some(Err(_)) => return Err(HttpError::Request),
            None => break,
        };
        // Never hand the sink more than the declared length.
        let take = chunk.len().min((declared - got) as usize);
        out.write_all(&chunk[..take])?;
        got += take as u64;
        metrics.received_bytes_total.inc_by(take as u64);
    }
    if got < declared {
        return Err(HttpError::Request);
    }
    Ok(start.elapsed())
}
