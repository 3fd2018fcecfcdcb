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

//! Byteboard - a self-describing binary tree format ("byte tree") and the
//! signed replicated bulletin board built on it.
//!
//! This crate provides:
//! - The byte-tree codec: in-memory, file-backed and container flavors of
//!   one wire format, with a depth-first streaming reader/writer
//! - Bounded-depth and template validation against hostile inputs
//! - External-memory sort and k-way merge under a file-descriptor budget
//! - A publish/wait bulletin board over HTTP with per-party Ed25519
//!   signature chains, bounded downloads and UDP hint wake-ups
//! - Monitoring via Prometheus counters and structured logging

/// Bulletin board (replicated and single-party) and signing.
pub mod board;
/// Fixed-width integer, hex and UTF-8 primitives.
pub mod codec;
/// TOML-backed settings and daemon configuration.
pub mod config;
/// Class-name-tagged values and the factory registry.
pub mod marshal;
/// Observability (metrics).
pub mod monitoring;
/// HTTP transport and UDP hints.
pub mod networking;
/// Worker pool and randomness seam.
pub mod runtime;
/// Temp-file service.
pub mod storage;
/// The byte tree itself: entity, reader, writer, validator, digest, sort.
pub mod tree;
