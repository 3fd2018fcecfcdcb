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

//! One-byte UDP hints.
//!
//! A hint is a single datagram whose byte is the sender's party index; it
//! wakes a peer out of its polling sleep, shortening but never extending any
//! deadline. The whole service is best-effort: every error is silently
//! dropped, and losing a hint only costs one poll interval.

use crate::config::Settings;
use crate::monitoring::metrics::Metrics;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::Notify;
use tracing::info;

/// Hint service errors.
#[derive(Debug, Error)]
pub enum HintError {
    /// Socket could not be bound within the retry budget.
    #[error("bind failed")]
    Bind,
}

struct HintState {
    parties: usize,
    /// Index 0 unused; parties are 1-based.
    received: Mutex<Vec<bool>>,
    listeners: Vec<Notify>,
}

/// Receiving side of the hint protocol for one party.
pub struct HintServer {
    state: Arc<HintState>,
    addr: std::net::SocketAddr,
    join: tokio::task::JoinHandle<()>,
}

impl HintServer {
    /// Bind the hint socket (with retries) and start the receive loop.
    pub async fn bind(
        addr: &str,
        parties: usize,
        metrics: Arc<Metrics>,
        settings: &Settings,
    ) -> Result<HintServer, HintError> {
        let mut attempt = 0u32;
        let socket = loop {
            match UdpSocket::bind(addr).await {
                Ok(s) => break s,
                Err(_) => {
                    attempt += 1;
                    if attempt > settings.hint_socket_retries {
                        return Err(HintError::Bind);
                    }
                    tokio::time::sleep(Duration::from_millis(settings.hint_socket_sleep_ms)).await;
                }
            }
        };
        let local = socket.local_addr().map_err(|_| HintError::Bind)?;

        let state = Arc::new(HintState {
            parties,
            received: Mutex::new(vec![false; parties + 1]),
            listeners: (0..=parties).map(|_| Notify::new()).collect(),
        });

        let loop_state = Arc::clone(&state);
        let join = tokio::spawn(async move {
            let mut buf = [0u8; 4];
            loop {
                let Ok((n, _from)) = socket.recv_from(&mut buf).await else {
                    continue;
                };
                if n < 1 {
                    continue;
                }
                let sender = buf[0] as usize;
                if sender == 0 || sender > loop_state.parties {
                    continue;
                }
                metrics.hints_received_total.inc();
                if let Ok(mut flags) = loop_state.received.lock() {
                    flags[sender] = true;
                }
                loop_state.listeners[sender].notify_one();
            }
        });

        info!(addr = %local, parties, "hint server listening");
        Ok(HintServer { state, addr: local, join })
    }

    /// The bound address (useful when binding port 0).
    pub fn addr(&self) -> std::net::SocketAddr {
        self.addr
    }

    /// Wait up to `t_max` for a hint from `sender`.
    ///
    /// Returns true and clears the flag if a matching hint arrived (possibly
    /// before the call); false on timeout.
    pub async fn wait_hint(&self, sender: usize, t_max: Duration) -> bool {
        if sender == 0 || sender > self.state.parties {
            return false;
        }
        if self.take_flag(sender) {
            return true;
        }
        match tokio::time::timeout(t_max, self.state.listeners[sender].notified()).await {
            Ok(()) => {
                self.take_flag(sender);
                true
            }
            Err(_) => false,
        }
    }

    fn take_flag(&self, sender: usize) -> bool {
        let Ok(mut flags) = self.state.received.lock() else {
            return false;
        };
        let was = flags[sender];
        flags[sender] = false;
        was
    }

    /// Stop the receive loop.
    pub fn stop(self) {
        self.join.abort();
    }
}

/// Send a hint claiming party index `sender` to `to`. Best-effort; errors
/// are silently dropped.
pub async fn send_hint(to: &str, sender: usize, metrics: &Metrics) {
    if sender == 0 || sender > u8::MAX as usize {
        return;
    }
    let Ok(socket) = UdpSocket::bind("0.0.0.0:0").await else {
        return;
    };
    if socket.send_to(&[sender as u8], to).await.is_ok() {
        metrics.hints_sent_total.inc();
    }
}
