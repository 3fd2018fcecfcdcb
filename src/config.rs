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

//! TOML-backed configuration.
//!
//! [`Settings`] carries the tuning knobs with their documented defaults;
//! [`BoardConfig`] is the daemon-level description of one party and its
//! peers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Cannot read the config file.
    #[error("read config")]
    Read,
    /// Cannot parse TOML.
    #[error("parse config")]
    Parse,
    /// A field fails validation.
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

fn default_max_readers() -> usize {
    10
}
fn default_pause_ms() -> u64 {
    100
}
fn default_digest_buffer_size() -> usize {
    4096
}
fn default_http_buffer_size() -> usize {
    4096
}
fn default_reader_buffer_size() -> usize {
    16384
}
fn default_max_signature_bytes() -> u64 {
    1_024_000
}
fn default_max_classname_bytes() -> usize {
    2048
}
fn default_bind_retries() -> u32 {
    10
}
fn default_bind_sleep_ms() -> u64 {
    500
}
fn default_batch_size() -> usize {
    4096
}

/// Tuning knobs, all with serde defaults so a partial TOML table works.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Settings {
    /// Merge fan-in cap.
    #[serde(default = "default_max_readers")]
    pub max_readers: usize,
    /// Children materialized per external-sort batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Sleep between HTTP poll attempts (ms).
    #[serde(default = "default_pause_ms")]
    pub default_pause_ms: u64,
    /// Streaming digest buffer.
    #[serde(default = "default_digest_buffer_size")]
    pub digest_buffer_size: usize,
    /// Server stream buffer.
    #[serde(default = "default_http_buffer_size")]
    pub http_buffer_size: usize,
    /// Reader buffered-input size.
    #[serde(default = "default_reader_buffer_size")]
    pub reader_buffer_size: usize,
    /// Per-signature download cap.
    #[serde(default = "default_max_signature_bytes")]
    pub max_signature_bytes: u64,
    /// Unmarshal class-name safety cap.
    #[serde(default = "default_max_classname_bytes")]
    pub max_classname_bytes: usize,
    /// Bind-retry attempts for the UDP hint socket.
    #[serde(default = "default_bind_retries")]
    pub hint_socket_retries: u32,
    /// Sleep between UDP bind retries (ms).
    #[serde(default = "default_bind_sleep_ms")]
    pub hint_socket_sleep_ms: u64,
    /// Bind-retry attempts for the HTTP server.
    #[serde(default = "default_bind_retries")]
    pub http_bind_retries: u32,
    /// Sleep between HTTP bind retries (ms).
    #[serde(default = "default_bind_sleep_ms")]
    pub http_bind_sleep_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            max_readers: default_max_readers(),
            batch_size: default_batch_size(),
            default_pause_ms: default_pause_ms(),
            digest_buffer_size: default_digest_buffer_size(),
            http_buffer_size: default_http_buffer_size(),
            reader_buffer_size: default_reader_buffer_size(),
            max_signature_bytes: default_max_signature_bytes(),
            max_classname_bytes: default_max_classname_bytes(),
            hint_socket_retries: default_bind_retries(),
            hint_socket_sleep_ms: default_bind_sleep_ms(),
            http_bind_retries: default_bind_retries(),
            http_bind_sleep_ms: default_bind_sleep_ms(),
        }
    }
}

impl Settings {
    /// External-sort options derived from these settings.
    pub fn sort_opts(&self) -> crate::tree::sort::SortOpts {
        crate::tree::sort::SortOpts {
            batch_size: self.batch_size,
            max_readers: self.max_readers,
            reader_buffer_size: self.reader_buffer_size,
        }
    }
}

/// One peer of the replicated board.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PeerConfig {
    /// HTTP URL serving the peer's board directory.
    pub url: String,
    /// UDP hint address, if the hint variant is used.
    #[serde(default)]
    pub hint_addr: Option<String>,
    /// Ed25519 public key, hex (32 bytes).
    pub pubkey_hex: String,
    /// Hash function of record for this signer ("sha256" or "sha512").
    #[serde(default)]
    pub hash: Option<String>,
}

/// Daemon-level description of one party.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BoardConfig {
    /// This party's 1-based index.
    pub party: usize,
    /// Data directory (keys, temp storage).
    pub data_dir: String,
    /// Directory served over HTTP; also where we publish.
    pub http_root: String,
    /// HTTP listen address, e.g. `0.0.0.0:9090`.
    pub http_listen: String,
    /// UDP hint listen address, if hints are enabled.
    #[serde(default)]
    pub hint_listen: Option<String>,
    /// All parties in index order, including ourselves.
    pub peers: Vec<PeerConfig>,
    /// Tuning knobs.
    #[serde(default)]
    pub settings: Option<Settings>,
}

impl BoardConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml(raw: &str) -> Result<BoardConfig, ConfigError> {
        let cfg: BoardConfig = toml::from_str(raw).map_err(|_| ConfigError::Parse)?;
        if cfg.peers.is_empty() {
            return Err(ConfigError::Invalid("no peers configured"));
        }
        if cfg.party == 0 || cfg.party > cfg.peers.len() {
            return Err(ConfigError::Invalid("party index out of range"));
        }
        Ok(cfg)
    }

    /// Read and parse a TOML file.
    pub fn load(path: &std::path::Path) -> Result<BoardConfig, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::Read)?;
        BoardConfig::from_toml(&raw)
    }

    /// Effective settings (table or defaults).
    pub fn settings(&self) -> Settings {
        self.settings.clone().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let s = Settings::default();
        assert_eq!(s.max_readers, 10);
        assert_eq!(s.default_pause_ms, 100);
        assert_eq!(s.digest_buffer_size, 4096);
        assert_eq!(s.http_buffer_size, 4096);
        assert_eq!(s.reader_buffer_size, 16384);
        assert_eq!(s.max_signature_bytes, 1_024_000);
        assert_eq!(s.max_classname_bytes, 2048);
        assert_eq!(s.hint_socket_retries, 10);
        assert_eq!(s.hint_socket_sleep_ms, 500);
        assert_eq!(s.http_bind_retries, 10);
        assert_eq!(s.http_bind_sleep_ms, 500);
    }

    #[test]
    fn parses_minimal_board_config() {
        let raw = r#"
party = 1
data_dir = "/var/lib/board/data"
http_root = "/var/lib/board/www"
http_listen = "127.0.0.1:9090"

[[peers]]
url = "http://127.0.0.1:9090"
pubkey_hex = "aa"

[[peers]]
url = "http://127.0.0.1:9091"
pubkey_hex = "bb"
hash = "sha512"
"#;
        let cfg = BoardConfig::from_toml(raw).unwrap();
        assert_eq!(cfg.party, 1);
        assert_eq!(cfg.peers.len(), 2);
        assert_eq!(cfg.peers[1].hash.as_deref(), Some("sha512"));
        assert_eq!(cfg.settings().max_readers, 10);
    }

    #[test]
    fn rejects_out_of_range_party() {
        let raw = r#"
party = 3
data_dir = "d"
http_root = "w"
http_listen = "127.0.0.1:9090"

[[peers]]
url = "u"
pubkey_hex = "aa"
"#;
        assert!(matches!(
            BoardConfig::from_toml(raw),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn partial_settings_table_fills_defaults() {
        let s: Settings = toml::from_str("max_readers = 4").unwrap();
        assert_eq!(s.max_readers, 4);
        assert_eq!(s.reader_buffer_size, 16384);
    }
}
