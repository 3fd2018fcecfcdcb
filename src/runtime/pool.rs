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

//! Array-split parallelism for CPU-bound work in higher layers.
//!
//! A `WorkerPool` is an explicit injected value, not a process-wide
//! singleton. Each [`WorkerPool::split`] call carves `0..len` into at most
//! `width` disjoint ranges, runs the per-range closure on scoped threads and
//! blocks until all ranges complete. A panicking range propagates as a fatal
//! fault when the scope joins.

use std::num::NonZeroUsize;
use std::thread;

/// Range-split executor sized to the hardware.
#[derive(Clone, Debug)]
pub struct WorkerPool {
    width: usize,
}

impl WorkerPool {
    /// Pool bounded by the number of hardware threads.
    pub fn new() -> WorkerPool {
        let width = thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);
        WorkerPool { width }
    }

    /// Pool with an explicit width (at least 1).
    pub fn with_width(width: usize) -> WorkerPool {
        WorkerPool { width: width.max(1) }
    }

    /// Number of concurrent ranges.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Invoke `f(start, end)` over disjoint ranges covering `0..len`.
    ///
    /// Blocks until every range has completed.
    pub fn split<F>(&self, len: usize, f: F)
    where
        F: Fn(usize, usize) + Sync,
    {
        if len == 0 {
            return;
        }
        let ranges = self.width.min(len);
        let chunk = len.div_ceil(ranges);
        thread::scope(|scope| {
            for i in 0..ranges {
                let start = i * chunk;
                let end = ((i + 1) * chunk).min(len);
                let f = &f;
                scope.spawn(move || f(start, end));
            }
        });
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        WorkerPool::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[test]
    fn ranges_cover_exactly_once() {
        let pool = WorkerPool::with_width(4);
        let hits: Vec<AtomicU64> = (0..1000).map(|_| AtomicU64::new(0)).collect();
        pool.split(hits.len(), |start, end| {
            for h in &hits[start..end] {
                h.fetch_add(1, Ordering::Relaxed);
            }
        });
        assert!(hits.iter().all(|h| h.load(Ordering::Relaxed) == 1));
    }

    #[test]
    fn zero_length_is_a_noop() {
        WorkerPool::with_width(8).split(0, |_, _| panic!("must not run"));
    }
}
