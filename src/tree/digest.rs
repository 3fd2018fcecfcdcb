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

//! Streaming digests over byte trees.
//!
//! Every subtree feeds its 5-byte header first, then its payload bytes or,
//! recursively, its children. Since a file-backed tree's file contents are
//! exactly the wire encoding, feeding the file bytes verbatim yields the
//! same digest, so hash(in-memory tree) = hash(file-backed tree) by
//! construction.

use crate::codec;
use crate::tree::{ByteTree, TreeError, TreeRef, HEADER_BYTES, LEAF_TAG, NODE_TAG};
use ring::digest;
use std::fs;
use std::io::Read;

/// Digest the wire encoding of a tree without materializing it.
pub fn digest_tree(
    tree: TreeRef<'_>,
    alg: &'static digest::Algorithm,
    buf_size: usize,
) -> Result<Vec<u8>, TreeError> {
    let mut ctx = digest::Context::new(alg);
    feed(tree, &mut ctx, buf_size)?;
    Ok(ctx.finish().as_ref().to_vec())
}

fn feed(tree: TreeRef<'_>, ctx: &mut digest::Context, buf_size: usize) -> Result<(), TreeError> {
    match tree {
        TreeRef::Mem(t) => {
            feed_mem(t, ctx);
            Ok(())
        }
        TreeRef::File(f) => {
            // The file is the encoding; stream it in digest-buffer chunks.
            let mut file = fs::File::open(f.path())?;
            let mut buf = vec![0u8; buf_size.max(1)];
            loop {
                let n = file.read(&mut buf)?;
                if n == 0 {
                    break;
                }
                ctx.update(&buf[..n]);
            }
            Ok(())
        }
        TreeRef::Seq(cs) => {
            let mut header = [0u8; HEADER_BYTES as usize];
            header[0] = NODE_TAG;
            codec::write_u32_be(&mut header, 1, cs.len() as u32);
            ctx.update(&header);
            for c in cs.iter() {
                feed(*c, ctx, buf_size)?;
            }
            Ok(())
        }
    }
}

fn feed_mem(t: &ByteTree, ctx: &mut digest::Context) {
    let mut header = [0u8; HEADER_BYTES as usize];
    let mut stack: Vec<&ByteTree> = vec![t];
    while let Some(t) = stack.pop() {
        match t {
            ByteTree::Leaf(b) => {
                header[0] = LEAF_TAG;
                codec::write_u32_be(&mut header, 1, b.len() as u32);
                ctx.update(&header);
                ctx.update(b);
            }
            ByteTree::Node(cs) => {
                header[0] = NODE_TAG;
                codec::write_u32_be(&mut header, 1, cs.len() as u32);
                ctx.update(&header);
                stack.extend(cs.iter().rev());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::FileTree;

    #[test]
    fn mem_file_and_encoding_digests_agree() {
        let dir = tempfile::tempdir().unwrap();
        let t = ByteTree::node(vec![
            ByteTree::leaf(&[1, 2, 3]),
            ByteTree::node(vec![ByteTree::empty_leaf()]),
        ]);
        let f = FileTree::store(&t, dir.path().join("t")).unwrap();

        let d_mem = digest_tree(t.as_ref(), &digest::SHA256, 4096).unwrap();
        let d_file = digest_tree(f.as_ref(), &digest::SHA256, 7).unwrap();
        let d_raw = digest::digest(&digest::SHA256, &t.to_vec());

        assert_eq!(d_mem, d_file);
        assert_eq!(d_mem, d_raw.as_ref().to_vec());
    }

    #[test]
    fn container_digest_matches_equivalent_node() {
        let a = ByteTree::leaf(&[1]);
        let b = ByteTree::leaf(&[2]);
        let refs = [a.as_ref(), b.as_ref()];
        let seq = digest_tree(TreeRef::Seq(&refs), &digest::SHA256, 4096).unwrap();
        let node = ByteTree::node(vec![a.clone(), b.clone()]);
        let mem = digest_tree(node.as_ref(), &digest::SHA256, 4096).unwrap();
        assert_eq!(seq, mem);
    }
}
