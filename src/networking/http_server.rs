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

//! Whitelist-serving static file server for the bulletin board.
//!
//! Request paths may contain only `0-9 A-Z a-z _ / .`, and a `.` must not
//! immediately follow another `.`. Anything else, and anything that does not
//! resolve to a readable file under the root, is a 404. Responses stream
//! with `Content-Type: binary/octet-stream`.

use crate::config::Settings;
use crate::monitoring::metrics::Metrics;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::sync::oneshot;
use tracing::{info, warn};

/// Server errors.
#[derive(Debug, Error)]
pub enum ServeError {
    /// Listener could not be bound within the retry budget.
    #[error("bind failed")]
    Bind,
}

/// Accept exactly the whitelisted request paths.
///
/// Allowed characters are `0-9`, `A-Z`, `a-z`, `_`, `/` and `.`; a `.` must
/// not immediately follow another `.`.
pub fn path_allowed(path: &str) -> bool {
    let mut prev_dot = false;
    for c in path.chars() {
        let ok = c.is_ascii_alphanumeric() || c == '_' || c == '/' || c == '.';
        if !ok {
            return false;
        }
        if c == '.' {
            if prev_dot {
                return false;
            }
            prev_dot = true;
        } else {
            prev_dot = false;
        }
    }
    true
}

struct ServeState {
    root: PathBuf,
    buf_size: usize,
    metrics: Arc<Metrics>,
}

async fn serve_file(State(st): State<Arc<ServeState>>, uri: Uri) -> Response {
    let rel = uri.path().trim_start_matches('/');
    if rel.is_empty() || !path_allowed(rel) {
        return StatusCode::NOT_FOUND.into_response();
    }

    let full = st.root.join(rel);
    let file = match tokio::fs::File::open(&full).await {
        Ok(f) => f,
        Err(_) => return StatusCode::NOT_FOUND.into_response(),
    };
    let len = match file.metadata().await {
        Ok(md) if md.is_file() => md.len(),
        _ => return StatusCode::NOT_FOUND.into_response(),
    };

    let metrics = Arc::clone(&st.metrics);
    let buf_size = st.buf_size.max(1);
    let stream = futures::stream::unfold((file, metrics), move |(mut file, metrics)| async move {
        let mut buf = vec![0u8; buf_size];
        match file.read(&mut buf).await {
            Ok(0) => None,
            Ok(n) => {
                buf.truncate(n);
                metrics.sent_bytes_total.inc_by(n as u64);
                Some((Ok::<Bytes, std::io::Error>(Bytes::from(buf)), (file, metrics)))
            }
            Err(e) => Some((Err(e), (file, metrics))),
        }
    });

    (
        [
            (header::CONTENT_TYPE, "binary/octet-stream".to_string()),
            (header::CONTENT_LENGTH, len.to_string()),
        ],
        Body::from_stream(stream),
    )
        .into_response()
}

/// A running static file server.
pub struct HttpServer {
    /// The bound address (useful when binding port 0).
    pub addr: std::net::SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    join: tokio::task::JoinHandle<()>,
}

impl HttpServer {
    /// Bind and serve `root`, retrying the bind per the settings.
    pub async fn serve(
        root: PathBuf,
        addr: &str,
        metrics: Arc<Metrics>,
        settings: &Settings,
    ) -> Result<HttpServer, ServeError> {
        let mut attempt = 0u32;
        let listener = loop {
            match tokio::net::TcpListener::bind(addr).await {
                Ok(l) => break l,
                Err(e) => {
                    attempt += 1;
                    if attempt > settings.http_bind_retries {
                        warn!(%addr, ?e, "http bind failed");
                        return Err(ServeError::Bind);
                    }
                    tokio::time::sleep(std::time::Duration::from_millis(
                        settings.http_bind_sleep_ms,
                    ))
                    .await;
                }
            }
        };
        let local = listener.local_addr().map_err(|_| ServeError::Bind)?;

        let state = Arc::new(ServeState {
            root,
            buf_size: settings.http_buffer_size,
            metrics,
        });
        let app = Router::new()
            .fallback(get(serve_file))
            .with_state(state);

        let (tx, rx) = oneshot::channel::<()>();
        let join = tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = rx.await;
                })
                .await;
        });
        info!(addr = %local, "http server listening");
        Ok(HttpServer { addr: local, shutdown: Some(tx), join })
    }

    /// Stop accepting and wait for in-flight responses.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = self.join.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitelist_accepts_board_paths() {
        assert!(path_allowed("1/ciphertexts"));
        assert!(path_allowed("2/ciphertexts.sig.3"));
        assert!(path_allowed("a_b/C.d"));
    }

    #[test]
    fn whitelist_rejects_traversal_and_odd_characters() {
        assert!(!path_allowed("../secret"));
        assert!(!path_allowed("a/..%2f"));
        assert!(!path_allowed("a b"));
        assert!(!path_allowed("a-b"));
        assert!(!path_allowed("x\u{e9}"));
        assert!(!path_allowed("a/b?q=1"));
    }

    #[test]
    fn single_dots_are_fine_double_dots_are_not() {
        assert!(path_allowed("a.b.c"));
        assert!(!path_allowed("a..b"));
        assert!(!path_allowed(".."));
    }
}
