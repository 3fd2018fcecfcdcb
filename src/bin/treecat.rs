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

//! Diagnostic pretty-printer: render a byte-tree file as nested JSON arrays
//! with hex leaves. Not a wire format; for humans only.

use anyhow::{bail, Context};
use byteboard::tree::{validate, FileTree};
use std::path::PathBuf;

const MAX_DEPTH: u32 = 64;

fn main() -> anyhow::Result<()> {
    let Some(path) = std::env::args().nth(1).map(PathBuf::from) else {
        bail!("usage: treecat <byte-tree-file>");
    };

    validate::check_file(&path, MAX_DEPTH, 16384)
        .with_context(|| format!("{} is not a valid byte tree", path.display()))?;
    let tree = FileTree::new(&path)
        .load()
        .with_context(|| format!("read {}", path.display()))?;
    println!("{}", tree.to_pretty_string());
    Ok(())
}
