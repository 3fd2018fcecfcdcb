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

//! The byte tree: a uniform self-describing binary format.
//!
//! Wire encoding, depth-first:
//!
//! ```text
//! byte_tree := 0x01 u32_be len bytes[len]          -- leaf
//!            | 0x00 u32_be n   byte_tree x n       -- node
//! ```
//!
//! One logical format, three physical flavors: [`ByteTree`] holds the whole
//! value in memory, [`FileTree`] references a file whose contents are exactly
//! the wire encoding, and [`TreeRef::Seq`] is a borrowed container of
//! subtrees of mixed flavors. Values larger than addressable memory are
//! handled by streaming ([`reader`], [`writer`]) rather than materializing.

pub mod digest;
pub mod reader;
pub mod sort;
pub mod validate;
pub mod writer;

use crate::codec;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Tag byte opening a node encoding.
pub const NODE_TAG: u8 = 0x00;
/// Tag byte opening a leaf encoding.
pub const LEAF_TAG: u8 = 0x01;
/// Size of the `tag || u32_be count` prefix of every subtree.
pub const HEADER_BYTES: u64 = 5;

/// Byte-tree errors.
#[derive(Debug, Error)]
pub enum TreeError {
    /// Wire encoding or typed-value constraint violated.
    #[error("malformed byte tree")]
    Malformed,
    /// More bytes or children requested than remain.
    #[error("short read")]
    ShortRead,
    /// `next_child` called on a leaf or an exhausted node.
    #[error("no children remain")]
    Exhausted,
    /// Input continues past the root value.
    #[error("trailing bytes after root")]
    Trailing,
    /// Underlying file or stream failure.
    #[error("io: {0}")]
    Io(#[from] io::Error),
}

impl From<codec::CodecError> for TreeError {
    fn from(_: codec::CodecError) -> Self {
        TreeError::Malformed
    }
}

/// A byte tree held in memory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ByteTree {
    /// Byte array of length at most `u32::MAX`.
    Leaf(Vec<u8>),
    /// Ordered sequence of byte trees.
    Node(Vec<ByteTree>),
}

impl ByteTree {
    /// Leaf with no payload.
    pub fn empty_leaf() -> Self {
        ByteTree::Leaf(Vec::new())
    }

    /// Leaf copying the given bytes.
    pub fn leaf(bytes: &[u8]) -> Self {
        ByteTree::Leaf(bytes.to_vec())
    }

    /// Node taking ownership of the child vector.
    pub fn node(children: Vec<ByteTree>) -> Self {
        ByteTree::Node(children)
    }

    /// Whether this is a leaf.
    pub fn is_leaf(&self) -> bool {
        matches!(self, ByteTree::Leaf(_))
    }

    /// Child sequence of a node.
    pub fn children(&self) -> Option<&[ByteTree]> {
        match self {
            ByteTree::Node(cs) => Some(cs),
            ByteTree::Leaf(_) => None,
        }
    }

    /// Payload of a leaf.
    pub fn leaf_bytes(&self) -> Option<&[u8]> {
        match self {
            ByteTree::Leaf(b) => Some(b),
            ByteTree::Node(_) => None,
        }
    }

    /// Total wire size: `5 + |payload|` for leaves, `5 + sum(children)` for
    /// nodes. Iterative so hostile depths cannot exhaust the call stack.
    pub fn total_bytes(&self) -> u64 {
        let mut total = 0u64;
        let mut stack: Vec<&ByteTree> = vec![self];
        while let Some(t) = stack.pop() {
            total += HEADER_BYTES;
            match t {
                ByteTree::Leaf(b) => total += b.len() as u64,
                ByteTree::Node(cs) => stack.extend(cs.iter()),
            }
        }
        total
    }

    /// Parse a complete encoding; trailing bytes are rejected.
    pub fn parse(data: &[u8]) -> Result<ByteTree, TreeError> {
        let mut off = 0usize;
        let t = ByteTree::parse_at(data, &mut off)?;
        if off != data.len() {
            return Err(TreeError::Trailing);
        }
        Ok(t)
    }

    /// Parse one byte tree starting at `*off`, advancing the offset past it.
    ///
    /// Iterative with an explicit work stack; child counts are sanity-checked
    /// against the remaining input before any allocation so a five-byte
    /// header cannot request a gigabyte vector.
    pub fn parse_at(data: &[u8], off: &mut usize) -> Result<ByteTree, TreeError> {
        // (children collected so far, declared count)
        let mut stack: Vec<(Vec<ByteTree>, u32)> = Vec::new();

        loop {
            if data.len() - *off < HEADER_BYTES as usize {
                return Err(TreeError::Malformed);
            }
            let tag = data[*off];
            let count = codec::read_u32_be(data, *off + 1);
            *off += HEADER_BYTES as usize;

            let mut completed = match tag {
                LEAF_TAG => {
                    let len = count as usize;
                    if data.len() - *off < len {
                        return Err(TreeError::Malformed);
                    }
                    let leaf = ByteTree::Leaf(data[*off..*off + len].to_vec());
                    *off += len;
                    Some(leaf)
                }
                NODE_TAG => {
                    // Each child needs at least a header.
                    let min = (count as u64) * HEADER_BYTES;
                    if ((data.len() - *off) as u64) < min {
                        return Err(TreeError::Malformed);
                    }
                    if count == 0 {
                        Some(ByteTree::Node(Vec::new()))
                    } else {
                        stack.push((Vec::with_capacity(count as usize), count));
                        None
                    }
                }
                _ => return Err(TreeError::Malformed),
            };

            while let Some(done) = completed.take() {
                match stack.last_mut() {
                    None => return Ok(done),
                    Some((children, want)) => {
                        children.push(done);
                        if children.len() == *want as usize {
                            let (children, _) = stack.pop().expect("non-empty stack");
                            completed = Some(ByteTree::Node(children));
                        }
                    }
                }
            }
        }
    }

    /// Parse one byte tree from a stream.
    pub fn read_from(r: &mut impl Read) -> Result<ByteTree, TreeError> {
        let mut stack: Vec<(Vec<ByteTree>, u32)> = Vec::new();

        loop {
            let mut header = [0u8; HEADER_BYTES as usize];
            r.read_exact(&mut header)
                .map_err(|_| TreeError::Malformed)?;
            let count = codec::read_u32_be(&header, 1);

            let mut completed = match header[0] {
                LEAF_TAG => {
                    let mut payload = vec![0u8; count as usize];
                    r.read_exact(&mut payload)
                        .map_err(|_| TreeError::Malformed)?;
                    Some(ByteTree::Leaf(payload))
                }
                NODE_TAG => {
                    if count == 0 {
                        Some(ByteTree::Node(Vec::new()))
                    } else {
                        stack.push((Vec::new(), count));
                        None
                    }
                }
                _ => return Err(TreeError::Malformed),
            };

            while let Some(done) = completed.take() {
                match stack.last_mut() {
                    None => return Ok(done),
                    Some((children, want)) => {
                        children.push(done);
                        if children.len() == *want as usize {
                            let (children, _) = stack.pop().expect("non-empty stack");
                            completed = Some(ByteTree::Node(children));
                        }
                    }
                }
            }
        }
    }

    /// Serialize into a fresh buffer.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.total_bytes() as usize);
        self.write_to(&mut out).expect("vec write cannot fail");
        out
    }

    /// Serialize depth-first into a sink. Iterative for the same reason as
    /// [`ByteTree::parse_at`].
    pub fn write_to(&self, w: &mut impl Write) -> Result<(), TreeError> {
        let mut stack: Vec<&ByteTree> = vec![self];
        let mut header = [0u8; HEADER_BYTES as usize];
        while let Some(t) = stack.pop() {
            match t {
                ByteTree::Leaf(b) => {
                    header[0] = LEAF_TAG;
                    codec::write_u32_be(&mut header, 1, b.len() as u32);
                    w.write_all(&header)?;
                    w.write_all(b)?;
                }
                ByteTree::Node(cs) => {
                    header[0] = NODE_TAG;
                    codec::write_u32_be(&mut header, 1, cs.len() as u32);
                    w.write_all(&header)?;
                    // Reverse so children pop in order.
                    stack.extend(cs.iter().rev());
                }
            }
        }
        Ok(())
    }

    /// Borrowed view of this tree.
    pub fn as_ref(&self) -> TreeRef<'_> {
        TreeRef::Mem(self)
    }

    // ---- typed conversions -------------------------------------------------

    /// `leaf([0x00])` or `leaf([0x01])`.
    pub fn from_bool(b: bool) -> Self {
        ByteTree::Leaf(vec![u8::from(b)])
    }

    /// Decode a boolean leaf; anything but a 1-byte `0x00`/`0x01` leaf fails.
    pub fn as_bool(&self) -> Result<bool, TreeError> {
        match self.leaf_bytes() {
            Some([0]) => Ok(false),
            Some([1]) => Ok(true),
            _ => Err(TreeError::Malformed),
        }
    }

    /// Big-endian 2-byte leaf.
    pub fn from_u16(n: u16) -> Self {
        ByteTree::Leaf(n.to_be_bytes().to_vec())
    }

    /// Decode a 2-byte big-endian leaf.
    pub fn as_u16(&self) -> Result<u16, TreeError> {
        match self.leaf_bytes() {
            Some(b) if b.len() == 2 => Ok(codec::read_u16_be(b, 0)),
            _ => Err(TreeError::Malformed),
        }
    }

    /// Big-endian 4-byte leaf.
    pub fn from_u32(n: u32) -> Self {
        ByteTree::Leaf(n.to_be_bytes().to_vec())
    }

    /// Decode a 4-byte big-endian leaf.
    pub fn as_u32(&self) -> Result<u32, TreeError> {
        match self.leaf_bytes() {
            Some(b) if b.len() == 4 => Ok(codec::read_u32_be(b, 0)),
            _ => Err(TreeError::Malformed),
        }
    }

    /// Leaf of `4 * n` bytes, concatenated big-endian.
    pub fn from_u32s(ns: &[u32]) -> Self {
        let mut b = Vec::with_capacity(ns.len() * 4);
        for n in ns {
            b.extend_from_slice(&n.to_be_bytes());
        }
        ByteTree::Leaf(b)
    }

    /// Decode a concatenated big-endian u32 leaf.
    pub fn as_u32s(&self) -> Result<Vec<u32>, TreeError> {
        let b = self.leaf_bytes().ok_or(TreeError::Malformed)?;
        if b.len() % 4 != 0 {
            return Err(TreeError::Malformed);
        }
        Ok(b.chunks_exact(4).map(|c| codec::read_u32_be(c, 0)).collect())
    }

    /// Leaf of one byte per element.
    pub fn from_bools(bs: &[bool]) -> Self {
        ByteTree::Leaf(bs.iter().map(|&b| u8::from(b)).collect())
    }

    /// Decode a boolean-array leaf; every byte must be `0x00` or `0x01`.
    pub fn as_bools(&self) -> Result<Vec<bool>, TreeError> {
        let b = self.leaf_bytes().ok_or(TreeError::Malformed)?;
        b.iter()
            .map(|&x| match x {
                0 => Ok(false),
                1 => Ok(true),
                _ => Err(TreeError::Malformed),
            })
            .collect()
    }

    /// Leaf of the string's UTF-8 bytes.
    pub fn from_string(s: &str) -> Self {
        ByteTree::Leaf(codec::string_to_bytes(s))
    }

    /// Decode a UTF-8 leaf.
    pub fn as_string(&self) -> Result<String, TreeError> {
        let b = self.leaf_bytes().ok_or(TreeError::Malformed)?;
        Ok(codec::bytes_to_string(b)?)
    }

    /// Node of UTF-8 leaves.
    pub fn from_strings(ss: &[String]) -> Self {
        ByteTree::Node(ss.iter().map(|s| ByteTree::from_string(s)).collect())
    }

    /// Decode a node of UTF-8 leaves.
    pub fn as_strings(&self) -> Result<Vec<String>, TreeError> {
        let cs = self.children().ok_or(TreeError::Malformed)?;
        cs.iter().map(|c| c.as_string()).collect()
    }

    // ---- diagnostics -------------------------------------------------------

    /// Render as nested JSON arrays with hex-string leaves. Diagnostic only;
    /// the wire format is the binary encoding.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ByteTree::Leaf(b) => serde_json::Value::String(codec::to_hex(b)),
            ByteTree::Node(cs) => {
                serde_json::Value::Array(cs.iter().map(|c| c.to_json()).collect())
            }
        }
    }

    /// Pretty-printed JSON rendering of [`ByteTree::to_json`].
    pub fn to_pretty_string(&self) -> String {
        serde_json::to_string_pretty(&self.to_json()).unwrap_or_default()
    }

    /// Inverse of [`ByteTree::to_json`], for tooling round-trips.
    pub fn from_json(value: &serde_json::Value) -> Result<ByteTree, TreeError> {
        match value {
            serde_json::Value::String(s) => Ok(ByteTree::Leaf(codec::from_hex(s))),
            serde_json::Value::Array(items) => Ok(ByteTree::Node(
                items
                    .iter()
                    .map(ByteTree::from_json)
                    .collect::<Result<_, _>>()?,
            )),
            _ => Err(TreeError::Malformed),
        }
    }
}

/// A byte tree stored in a file as its exact wire encoding.
///
/// The path's lifetime is managed by the caller (typically the temp-file
/// service); dropping a `FileTree` does not delete anything.
#[derive(Clone, Debug)]
pub struct FileTree {
    path: PathBuf,
}

impl FileTree {
    /// Wrap a path whose contents are a byte-tree encoding.
    ///
    /// No validation happens here; run the bounded-depth scan of
    /// [`validate`] before trusting foreign files.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileTree { path: path.into() }
    }

    /// Materialize a tree into a new file at `path`.
    pub fn store(tree: &ByteTree, path: impl Into<PathBuf>) -> Result<Self, TreeError> {
        let path = path.into();
        let mut f = io::BufWriter::new(fs::File::create(&path)?);
        tree.write_to(&mut f)?;
        f.flush()?;
        Ok(FileTree { path })
    }

    /// Backing path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total wire size, taken from the file length without traversal.
    pub fn total_bytes(&self) -> Result<u64, TreeError> {
        Ok(fs::metadata(&self.path)?.len())
    }

    /// Parse the whole file into memory.
    pub fn load(&self) -> Result<ByteTree, TreeError> {
        let data = fs::read(&self.path)?;
        ByteTree::parse(&data)
    }

    /// Stream the raw encoding into a sink.
    pub fn write_to(&self, w: &mut impl Write) -> Result<(), TreeError> {
        let mut f = fs::File::open(&self.path)?;
        io::copy(&mut f, w)?;
        Ok(())
    }

    /// Borrowed view of this tree.
    pub fn as_ref(&self) -> TreeRef<'_> {
        TreeRef::File(self)
    }

    /// Open a streaming reader over the file.
    pub fn reader(&self, buf_size: usize) -> Result<reader::TreeReader<'static>, TreeError> {
        reader::TreeReader::open_file(&self.path, buf_size)
    }
}

/// Borrowed handle over any physical flavor of byte tree.
///
/// `Seq` is the container flavor: an ordered sequence of subtree handles that
/// is logically a node and never yields bytes directly. Containers borrow
/// their children; nothing is copied or owned here.
#[derive(Clone, Copy, Debug)]
pub enum TreeRef<'a> {
    /// Materialized subtree.
    Mem(&'a ByteTree),
    /// File-backed subtree.
    File(&'a FileTree),
    /// Container of mixed-flavor children.
    Seq(&'a [TreeRef<'a>]),
}

impl<'a> TreeRef<'a> {
    /// Total wire size of the logical tree.
    pub fn total_bytes(&self) -> Result<u64, TreeError> {
        match self {
            TreeRef::Mem(t) => Ok(t.total_bytes()),
            TreeRef::File(f) => f.total_bytes(),
            TreeRef::Seq(cs) => {
                let mut total = HEADER_BYTES;
                for c in cs.iter() {
                    total += c.total_bytes()?;
                }
                Ok(total)
            }
        }
    }

    /// Serialize the logical tree into a sink.
    ///
    /// File-backed subtrees are copied byte-for-byte from disk. Container
    /// nesting is caller-constructed and shallow, so recursing across `Seq`
    /// levels is fine; materialized subtrees serialize iteratively.
    pub fn write_to(&self, w: &mut impl Write) -> Result<(), TreeError> {
        match self {
            TreeRef::Mem(t) => t.write_to(w),
            TreeRef::File(f) => f.write_to(w),
            TreeRef::Seq(cs) => {
                let mut header = [0u8; HEADER_BYTES as usize];
                header[0] = NODE_TAG;
                codec::write_u32_be(&mut header, 1, cs.len() as u32);
                w.write_all(&header)?;
                for c in cs.iter() {
                    c.write_to(w)?;
                }
                Ok(())
            }
        }
    }

    /// Serialize into a fresh buffer.
    pub fn to_vec(&self) -> Result<Vec<u8>, TreeError> {
        let mut out = Vec::new();
        self.write_to(&mut out)?;
        Ok(out)
    }
}
