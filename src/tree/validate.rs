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

//! Format validation for untrusted inputs.
//!
//! The bounded-depth scan walks headers with an explicit work stack (no
//! recursion, no payload materialization), so a hostile encoding can neither
//! blow the call stack nor force allocation. The template validator is the
//! fast path for inputs expected to match a fixed schema: it checks the
//! precomputed header positions of the template against the raw bytes before
//! decoding anything.

use crate::codec;
use crate::tree::{ByteTree, TreeError, TreeRef, HEADER_BYTES, LEAF_TAG, NODE_TAG};
use std::fs;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use thiserror::Error;

/// Validation errors.
#[derive(Debug, Error)]
pub enum ValidateError {
    /// Nesting exceeds the caller-supplied depth budget.
    #[error("nesting deeper than allowed")]
    TooDeep,
    /// Tag byte is neither `0x00` nor `0x01`.
    #[error("malformed tag byte")]
    MalformedTag,
    /// Input continues past the root value.
    #[error("trailing bytes after root")]
    Trailing,
    /// Input ends inside a header or payload.
    #[error("truncated input")]
    Truncated,
    /// Input length differs from the template's total size.
    #[error("length mismatch: expected {expected}, got {got}")]
    LengthMismatch {
        /// Template total size.
        expected: u64,
        /// Input length.
        got: u64,
    },
    /// A header byte or count differs from the template.
    #[error("header mismatch at offset {at}")]
    HeaderMismatch {
        /// Offset of the offending header.
        at: usize,
    },
    /// Underlying file failure.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl From<TreeError> for ValidateError {
    fn from(e: TreeError) -> Self {
        match e {
            TreeError::Trailing => ValidateError::Trailing,
            TreeError::Io(e) => ValidateError::Io(e),
            _ => ValidateError::MalformedTag,
        }
    }
}

fn scan<R: Read + Seek>(input: &mut R, max_depth: u32) -> Result<(), ValidateError> {
    // Children still expected at each open node, innermost last. The stack
    // depth is the current nesting depth.
    let mut open: Vec<u32> = Vec::new();
    let mut header = [0u8; HEADER_BYTES as usize];

    loop {
        input
            .read_exact(&mut header)
            .map_err(|_| ValidateError::Truncated)?;
        let count = codec::read_u32_be(&header, 1);

        let mut subtree_done = match header[0] {
            LEAF_TAG => {
                skip_exact(input, count as u64)?;
                true
            }
            NODE_TAG => {
                if count == 0 {
                    true
                } else {
                    if open.len() as u32 >= max_depth {
                        return Err(ValidateError::TooDeep);
                    }
                    open.push(count);
                    false
                }
            }
            _ => return Err(ValidateError::MalformedTag),
        };

        while subtree_done {
            match open.last_mut() {
                None => {
                    // Root consumed; nothing may follow.
                    let mut probe = [0u8; 1];
                    return match input.read(&mut probe) {
                        Ok(0) => Ok(()),
                        Ok(_) => Err(ValidateError::Trailing),
                        Err(e) => Err(ValidateError::Io(e)),
                    };
                }
                Some(n) => {
                    *n -= 1;
                    if *n == 0 {
                        open.pop();
                    } else {
                        subtree_done = false;
                    }
                }
            }
        }
    }
}

/// Seek forward `n` bytes, failing if the input ends early.
fn skip_exact<R: Read + Seek>(input: &mut R, n: u64) -> Result<(), ValidateError> {
    let pos = input.stream_position()?;
    let end = input.seek(std::io::SeekFrom::End(0))?;
    if end - pos < n {
        return Err(ValidateError::Truncated);
    }
    input.seek(std::io::SeekFrom::Start(pos + n))?;
    Ok(())
}

/// Bounded-depth scan of a byte-tree file.
///
/// Accepts exactly the encodings whose depth is at most `max_depth`, where a
/// lone leaf has depth 0 and each level of node children adds one.
pub fn check_file(path: &Path, max_depth: u32, buf_size: usize) -> Result<(), ValidateError> {
    let file = fs::File::open(path)?;
    let mut input = BufReader::with_capacity(buf_size, file);
    scan(&mut input, max_depth)
}

/// Bounded-depth scan of an in-memory encoding.
pub fn check_bytes(data: &[u8], max_depth: u32) -> Result<(), ValidateError> {
    let mut cur = std::io::Cursor::new(data);
    scan(&mut cur, max_depth)
}

/// One precomputed header of a template encoding.
#[derive(Clone, Copy, Debug)]
struct TemplateHeader {
    /// Offset of the tag byte in the linear encoding.
    position: usize,
    tag: u8,
    /// Child count for a node, byte length for a leaf.
    count: u32,
}

/// Fast validator for inputs expected to match a fixed schema.
///
/// Built once from a template tree; validation checks the input length and
/// every header position against the template before decoding, so schema
/// mismatches are rejected without parsing.
#[derive(Clone, Debug)]
pub struct TreeTemplate {
    headers: Vec<TemplateHeader>,
    total: u64,
}

impl TreeTemplate {
    /// Precompute header positions from a template tree.
    pub fn new(template: TreeRef<'_>) -> Result<TreeTemplate, TreeError> {
        let mut headers = Vec::new();
        let mut offset = 0u64;
        collect_headers(template, &mut offset, &mut headers)?;
        Ok(TreeTemplate { headers, total: offset })
    }

    /// Total wire size of the template.
    pub fn total_bytes(&self) -> u64 {
        self.total
    }

    /// Validate `data` against the template, then decode it.
    ///
    /// The tag byte is checked at each header's `position` and the count at
    /// `position + 1`.
    pub fn validate(&self, data: &[u8]) -> Result<ByteTree, ValidateError> {
        if data.len() as u64 != self.total {
            return Err(ValidateError::LengthMismatch {
                expected: self.total,
                got: data.len() as u64,
            });
        }
        for h in self.headers.iter() {
            if data[h.position] != h.tag || codec::read_u32_be(data, h.position + 1) != h.count {
                return Err(ValidateError::HeaderMismatch { at: h.position });
            }
        }
        Ok(ByteTree::parse(data)?)
    }
}

fn collect_headers(
    tree: TreeRef<'_>,
    offset: &mut u64,
    out: &mut Vec<TemplateHeader>,
) -> Result<(), TreeError> {
    match tree {
        TreeRef::Mem(t) => {
            collect_mem(t, offset, out);
            Ok(())
        }
        TreeRef::File(f) => {
            // Templates are small fixed schemas; materializing is fine here.
            let t = f.load()?;
            collect_mem(&t, offset, out);
            Ok(())
        }
        TreeRef::Seq(cs) => {
            out.push(TemplateHeader {
                position: *offset as usize,
                tag: NODE_TAG,
                count: cs.len() as u32,
            });
            *offset += HEADER_BYTES;
            for c in cs.iter() {
                collect_headers(*c, offset, out)?;
            }
            Ok(())
        }
    }
}

fn collect_mem(t: &ByteTree, offset: &mut u64, out: &mut Vec<TemplateHeader>) {
    match t {
        ByteTree::Leaf(b) => {
            out.push(TemplateHeader {
                position: *offset as usize,
                tag: LEAF_TAG,
                count: b.len() as u32,
            });
            *offset += HEADER_BYTES + b.len() as u64;
        }
        ByteTree::Node(cs) => {
            out.push(TemplateHeader {
                position: *offset as usize,
                tag: NODE_TAG,
                count: cs.len() as u32,
            });
            *offset += HEADER_BYTES;
            for c in cs.iter() {
                collect_mem(c, offset, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// n nested single-child nodes around an empty leaf.
    fn spine(n: usize) -> ByteTree {
        let mut t = ByteTree::empty_leaf();
        for _ in 0..n {
            t = ByteTree::node(vec![t]);
        }
        t
    }

    #[test]
    fn depth_budget_boundary() {
        let enc = spine(4).to_vec();
        assert!(matches!(check_bytes(&enc, 3), Err(ValidateError::TooDeep)));
        assert!(check_bytes(&enc, 4).is_ok());
    }

    #[test]
    fn lone_leaf_has_depth_zero() {
        let enc = ByteTree::leaf(&[1, 2, 3]).to_vec();
        assert!(check_bytes(&enc, 0).is_ok());
    }

    #[test]
    fn bad_tag_and_trailing_rejected() {
        assert!(matches!(
            check_bytes(&[0x07, 0, 0, 0, 0], 8),
            Err(ValidateError::MalformedTag)
        ));
        let mut enc = ByteTree::empty_leaf().to_vec();
        enc.push(0xFF);
        assert!(matches!(check_bytes(&enc, 8), Err(ValidateError::Trailing)));
    }

    #[test]
    fn truncated_rejected() {
        let enc = ByteTree::leaf(&[1, 2, 3, 4]).to_vec();
        assert!(matches!(
            check_bytes(&enc[..enc.len() - 1], 8),
            Err(ValidateError::Truncated)
        ));
        assert!(matches!(
            check_bytes(&enc[..3], 8),
            Err(ValidateError::Truncated)
        ));
    }

    #[test]
    fn file_scan_matches_bytes_scan() {
        let dir = tempfile::tempdir().unwrap();
        let t = spine(3);
        let f = crate::tree::FileTree::store(&t, dir.path().join("t")).unwrap();
        assert!(check_file(f.path(), 3, 4096).is_ok());
        assert!(matches!(
            check_file(f.path(), 2, 4096),
            Err(ValidateError::TooDeep)
        ));
    }

    // Hand-constructed regression for the header indexing convention: the
    // tag is at `position`, the count at `position + 1`.
    #[test]
    fn template_header_positions() {
        let template = ByteTree::node(vec![ByteTree::leaf(&[0, 0]), ByteTree::empty_leaf()]);
        let tpl = TreeTemplate::new(template.as_ref()).unwrap();
        assert_eq!(tpl.total_bytes(), 17);

        // Matching shape, different payload bytes: accepted.
        let ok = ByteTree::node(vec![ByteTree::leaf(&[7, 9]), ByteTree::empty_leaf()]);
        assert_eq!(tpl.validate(&ok.to_vec()).unwrap(), ok);

        // Same total length, different split between the leaves: the second
        // header moves, so validation must fail.
        let moved = ByteTree::node(vec![ByteTree::empty_leaf(), ByteTree::leaf(&[7, 9])]);
        assert_eq!(moved.total_bytes(), 17);
        assert!(matches!(
            tpl.validate(&moved.to_vec()),
            Err(ValidateError::HeaderMismatch { at: 5 })
        ));

        // Wrong length.
        let short = ByteTree::node(vec![ByteTree::leaf(&[7]), ByteTree::empty_leaf()]);
        assert!(matches!(
            tpl.validate(&short.to_vec()),
            Err(ValidateError::LengthMismatch { .. })
        ));

        // Corrupt tag byte at a known header position.
        let mut bytes = ok.to_vec();
        bytes[5] = 0x02;
        assert!(matches!(
            tpl.validate(&bytes),
            Err(ValidateError::HeaderMismatch { at: 5 })
        ));
    }
}
