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

//! Monotonic transfer counters for the bulletin board.
//!
//! Network time counts only successful downloads; failed attempts and
//! polling sleeps count as waiting time.

use prometheus::{IntCounter, Registry};
use thiserror::Error;

/// Metrics errors.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus")]
    Prom,
}

/// Metrics container.
#[derive(Clone)]
pub struct Metrics {
    /// Registry.
    pub registry: Registry,

    /// Milliseconds spent in successful downloads.
    pub network_ms_total: IntCounter,
    /// Milliseconds spent waiting (failed attempts, polling sleeps).
    pub waiting_ms_total: IntCounter,
    /// Bytes served by the HTTP server.
    pub sent_bytes_total: IntCounter,
    /// Bytes received by the HTTP client.
    pub received_bytes_total: IntCounter,
    /// UDP hints sent.
    pub hints_sent_total: IntCounter,
    /// UDP hints received.
    pub hints_received_total: IntCounter,
}

impl Metrics {
    /// Create and register metrics.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let network_ms_total = IntCounter::new(
            "byteboard_network_ms_total",
            "Milliseconds spent in successful downloads",
        )
        .map_err(|_| MetricsError::Prom)?;
        let waiting_ms_total = IntCounter::new(
            "byteboard_waiting_ms_total",
            "Milliseconds spent waiting between attempts",
        )
        .map_err(|_| MetricsError::Prom)?;
        let sent_bytes_total =
            IntCounter::new("byteboard_sent_bytes_total", "Bytes served over HTTP")
                .map_err(|_| MetricsError::Prom)?;
        let received_bytes_total =
            IntCounter::new("byteboard_received_bytes_total", "Bytes fetched over HTTP")
                .map_err(|_| MetricsError::Prom)?;
        let hints_sent_total = IntCounter::new("byteboard_hints_sent_total", "UDP hints sent")
            .map_err(|_| MetricsError::Prom)?;
        let hints_received_total =
            IntCounter::new("byteboard_hints_received_total", "UDP hints received")
                .map_err(|_| MetricsError::Prom)?;

        registry
            .register(Box::new(network_ms_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(waiting_ms_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(sent_bytes_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(received_bytes_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(hints_sent_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(hints_received_total.clone()))
            .map_err(|_| MetricsError::Prom)?;

        Ok(Self {
            registry,
            network_ms_total,
            waiting_ms_total,
            sent_bytes_total,
            received_bytes_total,
            hints_sent_total,
            hints_received_total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_monotonic_and_registered() {
        let m = Metrics::new().unwrap();
        m.network_ms_total.inc_by(5);
        m.received_bytes_total.inc_by(100);
        assert_eq!(m.network_ms_total.get(), 5);
        assert_eq!(m.received_bytes_total.get(), 100);
        assert_eq!(m.registry.gather().len(), 6);
    }
}
