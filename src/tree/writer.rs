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

//! Streaming writer: a node header followed by sequentially written
//! children, landing in a file whose contents become a valid wire encoding.

use crate::codec;
use crate::tree::{FileTree, TreeError, TreeRef, HEADER_BYTES, NODE_TAG};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Emits `0x00 u32_be child_count` and then one subtree per [`TreeWriter::write`]
/// call. The declared count is the caller's contract; no check is performed
/// that it matches the number of writes.
pub struct TreeWriter {
    out: BufWriter<fs::File>,
    path: PathBuf,
}

impl TreeWriter {
    /// Create the output file and write the node header.
    pub fn create(path: &Path, child_count: u32) -> Result<TreeWriter, TreeError> {
        let mut out = BufWriter::new(fs::File::create(path)?);
        let mut header = [0u8; HEADER_BYTES as usize];
        header[0] = NODE_TAG;
        codec::write_u32_be(&mut header, 1, child_count);
        out.write_all(&header)?;
        Ok(TreeWriter { out, path: path.to_path_buf() })
    }

    /// Serialize one child. File-backed sources are copied byte-for-byte.
    pub fn write(&mut self, subtree: TreeRef<'_>) -> Result<(), TreeError> {
        subtree.write_to(&mut self.out)
    }

    /// Flush and close, returning the finished file-backed node.
    pub fn close(mut self) -> Result<FileTree, TreeError> {
        self.out.flush()?;
        Ok(FileTree::new(self.path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::ByteTree;

    #[test]
    fn written_node_parses_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out");

        let a = ByteTree::leaf(&[1, 2]);
        let b = ByteTree::node(vec![ByteTree::leaf(&[3])]);
        let mut w = TreeWriter::create(&path, 2).unwrap();
        w.write(a.as_ref()).unwrap();
        w.write(b.as_ref()).unwrap();
        let file = w.close().unwrap();

        assert_eq!(file.load().unwrap(), ByteTree::node(vec![a, b]));
    }

    #[test]
    fn file_backed_child_is_copied_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let inner = ByteTree::node(vec![ByteTree::leaf(&[9, 9])]);
        let src = FileTree::store(&inner, dir.path().join("src")).unwrap();

        let mut w = TreeWriter::create(&dir.path().join("out"), 1).unwrap();
        w.write(src.as_ref()).unwrap();
        let out = w.close().unwrap();

        assert_eq!(out.load().unwrap(), ByteTree::node(vec![inner]));
    }
}
