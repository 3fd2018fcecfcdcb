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

//! Depth-first streaming cursor over any byte-tree flavor.
//!
//! A reader hands out one child reader at a time. Between `next_child` calls
//! on the same parent, the previously returned child must be fully consumed
//! or skipped; for file-backed trees this is not merely a convention, the
//! physical stream position requires it. Violations are programming faults
//! and panic.
//!
//! Readers along the active root-to-current path share a single buffered
//! input for file-backed trees, so at most one file is open per path. A
//! reader that reaches `remaining == 0` with no active child closes itself
//! and walks its parent back-links, clearing the active-child flag and
//! closing every ancestor that has also run dry.

use crate::codec;
use crate::tree::{ByteTree, TreeError, TreeRef, HEADER_BYTES, LEAF_TAG, NODE_TAG};
use std::cell::RefCell;
use std::fs;
use std::io::{BufReader, Read};
use std::rc::Rc;

type SharedInput = Rc<RefCell<BufReader<fs::File>>>;

enum Frame<'a> {
    MemLeaf { bytes: &'a [u8], pos: usize },
    MemNode { children: &'a [ByteTree], next: usize },
    FileLeaf { input: SharedInput },
    FileNode { input: SharedInput },
    SeqNode { children: &'a [TreeRef<'a>], next: usize },
    /// Consumed or closed; all resources released.
    Done,
}

struct ReaderInner<'a> {
    parent: Option<Rc<RefCell<ReaderInner<'a>>>>,
    frame: Frame<'a>,
    leaf: bool,
    /// Bytes remaining for a leaf, children remaining for a node.
    remaining: u32,
    active_child: bool,
    closed: bool,
    buf_size: usize,
}

/// Streaming depth-first reader over a byte tree.
///
/// Single-owner and single-threaded; the shared state along the active path
/// is `Rc`-linked, so readers are deliberately `!Send`.
pub struct TreeReader<'a> {
    inner: Rc<RefCell<ReaderInner<'a>>>,
}

fn read_header(input: &SharedInput) -> Result<(bool, u32), TreeError> {
    let mut header = [0u8; HEADER_BYTES as usize];
    input
        .borrow_mut()
        .read_exact(&mut header)
        .map_err(|_| TreeError::Malformed)?;
    let count = codec::read_u32_be(&header, 1);
    match header[0] {
        LEAF_TAG => Ok((true, count)),
        NODE_TAG => Ok((false, count)),
        _ => Err(TreeError::Malformed),
    }
}

fn root_frame<'a>(
    tree: TreeRef<'a>,
    buf_size: usize,
) -> Result<(Frame<'a>, bool, u32), TreeError> {
    match tree {
        TreeRef::Mem(ByteTree::Leaf(b)) => {
            Ok((Frame::MemLeaf { bytes: b, pos: 0 }, true, b.len() as u32))
        }
        TreeRef::Mem(ByteTree::Node(cs)) => Ok((
            Frame::MemNode { children: cs, next: 0 },
            false,
            cs.len() as u32,
        )),
        TreeRef::File(f) => {
            let file = fs::File::open(f.path())?;
            let input: SharedInput = Rc::new(RefCell::new(BufReader::with_capacity(buf_size, file)));
            // The header of the next subtree is parsed eagerly.
            let (leaf, count) = read_header(&input)?;
            let frame = if leaf {
                Frame::FileLeaf { input }
            } else {
                Frame::FileNode { input }
            };
            Ok((frame, leaf, count))
        }
        TreeRef::Seq(cs) => Ok((
            Frame::SeqNode { children: cs, next: 0 },
            false,
            cs.len() as u32,
        )),
    }
}

/// Close `rc` and propagate "no active child" up the parent chain, closing
/// every finished ancestor on the way.
fn finish(rc: &Rc<RefCell<ReaderInner<'_>>>) {
    let parent = {
        let mut inner = rc.borrow_mut();
        inner.closed = true;
        inner.frame = Frame::Done;
        inner.parent.take()
    };
    let mut cur = parent;
    while let Some(p) = cur {
        let mut pi = p.borrow_mut();
        pi.active_child = false;
        if pi.remaining == 0 {
            pi.closed = true;
            pi.frame = Frame::Done;
            cur = pi.parent.take();
        } else {
            break;
        }
    }
}

impl<'a> TreeReader<'a> {
    /// Open a reader over any flavor. For file-backed trees this opens the
    /// file and eagerly parses the root header.
    pub fn over(tree: TreeRef<'a>, buf_size: usize) -> Result<TreeReader<'a>, TreeError> {
        let (frame, leaf, remaining) = root_frame(tree, buf_size)?;
        let inner = Rc::new(RefCell::new(ReaderInner {
            parent: None,
            frame,
            leaf,
            remaining,
            active_child: false,
            closed: false,
            buf_size,
        }));
        let r = TreeReader { inner };
        if remaining == 0 {
            finish(&r.inner);
        }
        Ok(r)
    }

    /// Open a reader directly over a file containing a wire encoding.
    ///
    /// Unlike [`TreeReader::over`] the result borrows nothing, which lets
    /// callers own the backing [`FileTree`] and its reader side by side.
    pub fn open_file(path: &std::path::Path, buf_size: usize) -> Result<TreeReader<'static>, TreeError> {
        let file = fs::File::open(path)?;
        let input: SharedInput = Rc::new(RefCell::new(BufReader::with_capacity(buf_size, file)));
        let (leaf, remaining) = read_header(&input)?;
        let frame = if leaf {
            Frame::FileLeaf { input }
        } else {
            Frame::FileNode { input }
        };
        let inner = Rc::new(RefCell::new(ReaderInner {
            parent: None,
            frame,
            leaf,
            remaining,
            active_child: false,
            closed: false,
            buf_size,
        }));
        let r = TreeReader { inner };
        if remaining == 0 {
            finish(&r.inner);
        }
        Ok(r)
    }

    /// Whether the current subtree is a leaf.
    pub fn is_leaf(&self) -> bool {
        self.inner.borrow().leaf
    }

    /// Bytes remaining for a leaf, children remaining for a node.
    pub fn remaining(&self) -> u32 {
        self.inner.borrow().remaining
    }

    /// Step to the next child of this node.
    ///
    /// Fails with [`TreeError::Exhausted`] on a leaf or a spent node.
    /// Panics if the previously returned child still has data to consume;
    /// that is a violation of the depth-first discipline, not an input
    /// error.
    pub fn next_child(&self) -> Result<TreeReader<'a>, TreeError> {
        let mut inner = self.inner.borrow_mut();
        if inner.active_child {
            panic!("byte tree reader: next_child while the previous child is unconsumed");
        }
        if inner.leaf || inner.remaining == 0 {
            return Err(TreeError::Exhausted);
        }
        let buf_size = inner.buf_size;
        let (frame, leaf, remaining) = match &mut inner.frame {
            Frame::MemNode { children, next } => {
                let cs: &'a [ByteTree] = *children;
                let c = &cs[*next];
                *next += 1;
                match c {
                    ByteTree::Leaf(b) => {
                        (Frame::MemLeaf { bytes: b, pos: 0 }, true, b.len() as u32)
                    }
                    ByteTree::Node(cs) => (
                        Frame::MemNode { children: cs, next: 0 },
                        false,
                        cs.len() as u32,
                    ),
                }
            }
            Frame::FileNode { input } => {
                let (leaf, count) = read_header(input)?;
                let frame = if leaf {
                    Frame::FileLeaf { input: Rc::clone(input) }
                } else {
                    Frame::FileNode { input: Rc::clone(input) }
                };
                (frame, leaf, count)
            }
            Frame::SeqNode { children, next } => {
                let c = children[*next];
                *next += 1;
                root_frame(c, buf_size)?
            }
            _ => return Err(TreeError::Exhausted),
        };
        inner.remaining -= 1;
        inner.active_child = true;
        drop(inner);

        let child = TreeReader {
            inner: Rc::new(RefCell::new(ReaderInner {
                parent: Some(Rc::clone(&self.inner)),
                frame,
                leaf,
                remaining,
                active_child: false,
                closed: false,
                buf_size,
            })),
        };
        // An empty leaf or childless node is born terminal.
        if remaining == 0 {
            finish(&child.inner);
        }
        Ok(child)
    }

    /// Fill `dst` from a leaf's payload.
    ///
    /// Fails with [`TreeError::ShortRead`] if more bytes are requested than
    /// remain. When the payload is exhausted the reader closes itself and
    /// notifies its ancestors. Panics if called on a node.
    pub fn read(&self, dst: &mut [u8]) -> Result<(), TreeError> {
        let mut inner = self.inner.borrow_mut();
        if !inner.leaf {
            panic!("byte tree reader: read on a node");
        }
        if dst.len() as u64 > inner.remaining as u64 {
            return Err(TreeError::ShortRead);
        }
        if dst.is_empty() {
            return Ok(());
        }
        match &mut inner.frame {
            Frame::MemLeaf { bytes, pos } => {
                dst.copy_from_slice(&bytes[*pos..*pos + dst.len()]);
                *pos += dst.len();
            }
            Frame::FileLeaf { input } => {
                input.borrow_mut().read_exact(dst)?;
            }
            _ => return Err(TreeError::ShortRead),
        }
        inner.remaining -= dst.len() as u32;
        let done = inner.remaining == 0;
        drop(inner);
        if done {
            finish(&self.inner);
        }
        Ok(())
    }

    /// Read the rest of a leaf's payload.
    pub fn read_all(&self) -> Result<Vec<u8>, TreeError> {
        let mut out = vec![0u8; self.remaining() as usize];
        self.read(&mut out)?;
        Ok(out)
    }

    /// Read a big-endian u32 from a leaf.
    pub fn read_u32(&self) -> Result<u32, TreeError> {
        let mut b = [0u8; 4];
        self.read(&mut b)?;
        Ok(u32::from_be_bytes(b))
    }

    /// Read `n` concatenated big-endian u32 values from a leaf.
    pub fn read_u32s(&self, n: usize) -> Result<Vec<u32>, TreeError> {
        let mut b = vec![0u8; n * 4];
        self.read(&mut b)?;
        Ok(b.chunks_exact(4).map(|c| codec::read_u32_be(c, 0)).collect())
    }

    /// Read one boolean byte from a leaf; bytes other than `0x00`/`0x01`
    /// are malformed.
    pub fn read_bool(&self) -> Result<bool, TreeError> {
        let mut b = [0u8; 1];
        self.read(&mut b)?;
        match b[0] {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(TreeError::Malformed),
        }
    }

    /// Read `n` boolean bytes from a leaf.
    pub fn read_bools(&self, n: usize) -> Result<Vec<bool>, TreeError> {
        let mut b = vec![0u8; n];
        self.read(&mut b)?;
        b.iter()
            .map(|&x| match x {
                0 => Ok(false),
                1 => Ok(true),
                _ => Err(TreeError::Malformed),
            })
            .collect()
    }

    /// Read `len` bytes from a leaf and decode them as UTF-8.
    pub fn read_utf8(&self, len: usize) -> Result<String, TreeError> {
        let mut b = vec![0u8; len];
        self.read(&mut b)?;
        Ok(codec::bytes_to_string(&b)?)
    }

    /// Read the rest of a leaf and decode it as UTF-8.
    pub fn read_utf8_all(&self) -> Result<String, TreeError> {
        let b = self.read_all()?;
        Ok(codec::bytes_to_string(&b)?)
    }

    /// Materialize the subtree at the current position.
    ///
    /// Consumes the rest of this reader. Depth equals the subtree's depth;
    /// foreign inputs are expected to have passed the bounded-depth
    /// validator before being read.
    pub fn read_byte_tree(&self) -> Result<ByteTree, TreeError> {
        if self.is_leaf() {
            Ok(ByteTree::Leaf(self.read_all()?))
        } else {
            let mut children = Vec::with_capacity(self.remaining() as usize);
            while self.remaining() > 0 {
                children.push(self.next_child()?.read_byte_tree()?);
            }
            Ok(ByteTree::Node(children))
        }
    }

    /// Fully consume the next child without materializing it.
    pub fn skip_child(&self) -> Result<(), TreeError> {
        self.next_child()?.consume()
    }

    /// Fully consume the next `n` children without materializing them.
    pub fn skip_children(&self, n: u32) -> Result<(), TreeError> {
        for _ in 0..n {
            self.skip_child()?;
        }
        Ok(())
    }

    /// Consume the rest of this subtree without materializing it.
    pub fn consume(&self) -> Result<(), TreeError> {
        if self.is_leaf() {
            let n = self.remaining();
            if n == 0 {
                return Ok(());
            }
            let mut inner = self.inner.borrow_mut();
            match &mut inner.frame {
                Frame::MemLeaf { pos, .. } => {
                    *pos += n as usize;
                }
                Frame::FileLeaf { input } => {
                    input.borrow_mut().seek_relative(n as i64)?;
                }
                _ => {}
            }
            inner.remaining = 0;
            drop(inner);
            finish(&self.inner);
            Ok(())
        } else {
            while self.remaining() > 0 {
                self.next_child()?.consume()?;
            }
            Ok(())
        }
    }

    /// Release resources. Idempotent. Closing a reader that only borrows
    /// from a container closes nothing it does not own.
    pub fn close(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.closed = true;
        inner.frame = Frame::Done;
    }

    /// Whether this reader has been fully consumed or closed.
    pub fn is_closed(&self) -> bool {
        self.inner.borrow().closed
    }
}
