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

//! Random-source seam.
//!
//! Randomness is an external collaborator: factories that need it receive a
//! `&mut dyn RandomSource` rather than reaching for the OS themselves.

use ring::rand::{SecureRandom, SystemRandom};

/// Narrow randomness interface handed to factories.
pub trait RandomSource {
    /// Fill `dst` with random bytes.
    fn fill(&mut self, dst: &mut [u8]);

    /// Fresh random byte vector of length `n`.
    fn bytes(&mut self, n: usize) -> Vec<u8> {
        let mut out = vec![0u8; n];
        self.fill(&mut out);
        out
    }
}

/// OS-backed random source.
pub struct OsRandom {
    rng: SystemRandom,
}

impl OsRandom {
    /// New OS-backed source.
    pub fn new() -> OsRandom {
        OsRandom { rng: SystemRandom::new() }
    }
}

impl Default for OsRandom {
    fn default() -> Self {
        OsRandom::new()
    }
}

impl RandomSource for OsRandom {
    fn fill(&mut self, dst: &mut [u8]) {
        // SystemRandom only fails if the OS RNG is unusable, which is not a
        // recoverable condition for callers of this seam.
        self.rng.fill(dst).expect("os rng unavailable");
    }
}
