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

//! Single-party bulletin board.
//!
//! With one party there is no HTTP or hint traffic: publish writes the
//! payload into a shared directory under a lock via atomic rename, and wait
//! polls for file existence, validating the format with a bounded depth
//! before parsing. Signatures are pointless when there is nobody to
//! convince.

use crate::board::{publish_atomic, BoardError, Deadline, WaitParams};
use crate::config::Settings;
use crate::tree::{validate, ByteTree, FileTree, TreeRef};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

/// Bulletin board degenerated to one party over a shared directory.
pub struct LocalBoard {
    dir: PathBuf,
    settings: Settings,
    publish_lock: Mutex<()>,
}

impl LocalBoard {
    /// Use `dir` as the shared directory (created if missing). Artifacts
    /// live under `<dir>/1/<label>`, matching the replicated layout.
    pub fn create(dir: impl Into<PathBuf>, settings: Settings) -> Result<LocalBoard, BoardError> {
        let dir = dir.into();
        std::fs::create_dir_all(dir.join("1"))?;
        Ok(LocalBoard { dir, settings, publish_lock: Mutex::new(()) })
    }

    fn artifact_path(&self, name: &str) -> PathBuf {
        self.dir.join("1").join(name)
    }

    /// Shared directory root.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Publish `(label, message)` under the lock.
    pub fn publish(&self, label: &str, message: TreeRef<'_>) -> Result<(), BoardError> {
        let _guard = self.publish_lock.lock().map_err(|_| BoardError::Io)?;
        publish_atomic(&self.artifact_path(label), |f| {
            message.write_to(f).map_err(|e| match e {
                crate::tree::TreeError::Io(io) => io,
                _ => std::io::Error::other("encode"),
            })
        })?;
        Ok(())
    }

    /// Poll for `(label)` until it exists and validates, or the deadline
    /// expires.
    pub async fn wait_for(&self, label: &str, params: &WaitParams) -> Result<ByteTree, BoardError> {
        let deadline = Deadline::start(params.max_time);
        let path = self.artifact_path(label);
        loop {
            if path.is_file()
                && validate::check_file(&path, params.max_depth, self.settings.reader_buffer_size)
                    .is_ok()
            {
                return Ok(FileTree::new(&path).load()?);
            }
            if deadline.expired() {
                return Err(BoardError::Timeout);
            }
            let mut pause = Duration::from_millis(self.settings.default_pause_ms);
            if let Some(rem) = deadline.remaining() {
                pause = pause.min(rem);
            }
            tokio::time::sleep(pause).await;
        }
    }

    /// Delete the subtree `<dir>/1/<prefix>`.
    pub fn unpublish(&self, prefix: &str) -> Result<(), BoardError> {
        let p = self.artifact_path(prefix);
        if p.is_dir() {
            std::fs::remove_dir_all(&p)?;
        } else if p.exists() {
            std::fs::remove_file(&p)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_then_wait_roundtrips() {
        let sandbox = tempfile::tempdir().unwrap();
        let board = LocalBoard::create(sandbox.path().join("board"), Settings::default()).unwrap();
        let msg = ByteTree::node(vec![ByteTree::leaf(b"hello")]);
        board.publish("round1/output", msg.as_ref()).unwrap();

        let params = WaitParams {
            max_time: Some(Duration::from_secs(5)),
            max_bytes: 1 << 20,
            max_depth: 8,
        };
        let got = board.wait_for("round1/output", &params).await.unwrap();
        assert_eq!(got, msg);
    }

    #[tokio::test]
    async fn wait_times_out_on_missing_label() {
        let sandbox = tempfile::tempdir().unwrap();
        let board = LocalBoard::create(sandbox.path().join("board"), Settings::default()).unwrap();
        let params = WaitParams {
            max_time: Some(Duration::from_millis(50)),
            max_bytes: 1 << 20,
            max_depth: 8,
        };
        assert!(matches!(
            board.wait_for("missing", &params).await,
            Err(BoardError::Timeout)
        ));
    }

    #[tokio::test]
    async fn unpublish_removes_the_subtree() {
        let sandbox = tempfile::tempdir().unwrap();
        let board = LocalBoard::create(sandbox.path().join("board"), Settings::default()).unwrap();
        board
            .publish("round1/a", ByteTree::empty_leaf().as_ref())
            .unwrap();
        board
            .publish("round1/b", ByteTree::empty_leaf().as_ref())
            .unwrap();
        board.unpublish("round1").unwrap();

        let params = WaitParams {
            max_time: Some(Duration::from_millis(20)),
            max_bytes: 1 << 20,
            max_depth: 8,
        };
        assert!(board.wait_for("round1/a", &params).await.is_err());
    }
}
