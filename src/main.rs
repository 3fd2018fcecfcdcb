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

//! Byteboard daemon (systemd-friendly).
//! Serves one party's HTTP root and hint socket from a TOML config and
//! keeps the process alive.

use anyhow::Context;
use byteboard::config::BoardConfig;
use byteboard::monitoring::metrics::Metrics;
use byteboard::networking::hint::HintServer;
use byteboard::networking::http_server::HttpServer;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

fn env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .compact()
        .try_init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| env("BYTEBOARD_CONFIG", "./byteboard.toml"));
    let cfg = BoardConfig::load(&PathBuf::from(&config_path))
        .with_context(|| format!("load config {config_path}"))?;
    let settings = cfg.settings();

    let metrics = Arc::new(Metrics::new().map_err(|_| anyhow::anyhow!("metrics init failed"))?);

    info!(party = cfg.party, config = %config_path, "byteboard daemon starting");

    let http = HttpServer::serve(
        PathBuf::from(&cfg.http_root),
        &cfg.http_listen,
        Arc::clone(&metrics),
        &settings,
    )
    .await
    .map_err(|e| anyhow::anyhow!("http server: {e}"))?;

    let hints = match &cfg.hint_listen {
        Some(addr) => Some(
            HintServer::bind(addr, cfg.peers.len(), Arc::clone(&metrics), &settings)
                .await
                .map_err(|e| anyhow::anyhow!("hint server: {e}"))?,
        ),
        None => {
            warn!("hint socket disabled; peers fall back to plain polling");
            None
        }
    };

    tokio::signal::ctrl_c().await.ok();
    info!("shutting down");

    if let Some(h) = hints {
        h.stop();
    }
    http.shutdown().await;
    Ok(())
}
