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

//! Session-scoped temporary file service.
//!
//! An explicit injected value, not a process-global: callers receive a
//! `TempDir` during construction and the whole storage directory is
//! recursively deleted on teardown. Names are an 8-digit zero-padded
//! counter guarded by a mutex, so concurrent allocations never collide.
//!
//! Debug mode writes a sibling `<name>.trace` file per allocation holding a
//! capture of the allocating backtrace, which makes leaked temp files
//! attributable.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

/// Temp-file service errors.
#[derive(Debug, Error)]
pub enum TempError {
    /// Directory could not be created or removed.
    #[error("io: {0}")]
    Io(#[from] io::Error),
}

/// Unique-path allocator over one storage directory.
pub struct TempDir {
    dir: PathBuf,
    counter: Mutex<u64>,
    debug: bool,
}

impl TempDir {
    /// Create (or reuse) the storage directory and reset the counter.
    pub fn create(dir: impl Into<PathBuf>) -> Result<TempDir, TempError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(TempDir { dir, counter: Mutex::new(0), debug: false })
    }

    /// Like [`TempDir::create`], with allocation tracing enabled.
    pub fn create_debug(dir: impl Into<PathBuf>) -> Result<TempDir, TempError> {
        let mut t = TempDir::create(dir)?;
        t.debug = true;
        Ok(t)
    }

    /// Storage directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Allocate a fresh unique path `<dir>/<8-digit counter>`.
    ///
    /// The file itself is not created; the name is merely reserved by the
    /// monotonic counter.
    pub fn file(&self) -> PathBuf {
        let n = {
            let mut guard = self.counter.lock().expect("temp counter poisoned");
            let n = *guard;
            *guard += 1;
            n
        };
        let path = self.dir.join(format!("{n:08}"));
        if self.debug {
            let trace = std::backtrace::Backtrace::force_capture();
            let _ = fs::write(
                self.dir.join(format!("{n:08}.trace")),
                format!("{trace}"),
            );
        }
        path
    }

    /// Unlink one temporary file.
    pub fn delete(&self, path: &Path) -> Result<(), TempError> {
        fs::remove_file(path)?;
        if self.debug {
            let mut trace = path.as_os_str().to_os_string();
            trace.push(".trace");
            let _ = fs::remove_file(trace);
        }
        Ok(())
    }

    /// Recursively delete the entire storage directory.
    pub fn free(self) -> Result<(), TempError> {
        fs::remove_dir_all(&self.dir)?;
        Ok(())
    }
}
