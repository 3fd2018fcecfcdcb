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

//! The bulletin board: signed replicated publish/wait over HTTP with UDP
//! hint wake-ups, and a no-network single-party variant.

pub mod local;
pub mod replicated;
pub mod signing;

use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Bulletin-board errors.
#[derive(Debug, Error)]
pub enum BoardError {
    /// Wait exhausted its deadline.
    #[error("wait timed out")]
    Timeout,
    /// A signature failed verification.
    #[error("invalid signature")]
    BadSignature,
    /// Operator declined to retry after a wait failure.
    #[error("operator aborted")]
    Aborted,
    /// Downloaded artifact violates the format.
    #[error("malformed artifact")]
    Malformed,
    /// File system or network failure.
    #[error("io")]
    Io,
    /// Signing backend failure.
    #[error("signing")]
    Signing,
}

impl From<std::io::Error> for BoardError {
    fn from(_: std::io::Error) -> Self {
        BoardError::Io
    }
}
impl From<crate::tree::TreeError> for BoardError {
    fn from(e: crate::tree::TreeError) -> Self {
        match e {
            crate::tree::TreeError::Io(_) => BoardError::Io,
            _ => BoardError::Malformed,
        }
    }
}
impl From<signing::SigningError> for BoardError {
    fn from(_: signing::SigningError) -> Self {
        BoardError::Signing
    }
}

/// Per-wait resource bounds.
#[derive(Clone, Copy, Debug)]
pub struct WaitParams {
    /// Overall deadline; `None` means no timeout.
    pub max_time: Option<Duration>,
    /// Download cap for the message artifact.
    pub max_bytes: u64,
    /// Depth budget for downloaded byte trees.
    pub max_depth: u32,
}

/// Operator prompt used when a wait exhausts its deadline.
///
/// The prompt is an external collaborator; the crate only ships the
/// non-interactive [`DenyPrompt`].
pub trait RetryPrompt: Send + Sync {
    /// Whether to reset the timer and try `what` again.
    fn confirm_retry(&self, what: &str) -> bool;
}

/// Always answers "no": the first exhausted deadline aborts the run.
pub struct DenyPrompt;

impl RetryPrompt for DenyPrompt {
    fn confirm_retry(&self, _what: &str) -> bool {
        false
    }
}

/// Monotonic wall-clock deadline: `end = now + duration`,
/// `remaining = max(0, end - now)`. `None` duration means no timeout.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Deadline {
    duration: Option<Duration>,
    end: Option<Instant>,
}

impl Deadline {
    pub(crate) fn start(duration: Option<Duration>) -> Deadline {
        Deadline { duration, end: duration.map(|d| Instant::now() + d) }
    }

    pub(crate) fn expired(&self) -> bool {
        matches!(self.end, Some(end) if Instant::now() >= end)
    }

    /// Time left; `None` means unbounded.
    pub(crate) fn remaining(&self) -> Option<Duration> {
        self.end.map(|end| end.saturating_duration_since(Instant::now()))
    }

    /// Restart the timer with the original duration.
    pub(crate) fn reset(&mut self) {
        self.end = self.duration.map(|d| Instant::now() + d);
    }
}

/// Publish an artifact atomically: write a temporary sibling, then rename.
/// Readers never observe a partial file.
pub(crate) fn publish_atomic(path: &Path, write: impl FnOnce(&mut fs::File) -> std::io::Result<()>) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(".part");
    let tmp = std::path::PathBuf::from(tmp);
    {
        let mut f = fs::File::create(&tmp)?;
        write(&mut f)?;
        f.flush()?;
        let _ = f.sync_all();
    }
    fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadline_expires_and_resets() {
        let mut d = Deadline::start(Some(Duration::from_millis(0)));
        assert!(d.expired());
        d.reset();
        assert_eq!(d.remaining().map(|r| r <= Duration::from_millis(1)), Some(true));

        let unbounded = Deadline::start(None);
        assert!(!unbounded.expired());
        assert!(unbounded.remaining().is_none());
    }

    #[test]
    fn atomic_publish_leaves_no_partials() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1").join("label");
        publish_atomic(&path, |f| f.write_all(b"payload")).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"payload");
        assert!(!path.with_extension("part").exists());
        assert_eq!(fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
    }
}
