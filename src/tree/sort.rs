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

//! External-memory sort and k-way merge over file-backed byte trees.
//!
//! The children of the input node are read in batches, sorted in memory and
//! written out as runs; runs are then merged at most [`SortOpts::max_readers`]
//! at a time (the file-descriptor budget), driven by a priority queue of
//! single-element look-ahead cursors. The merge is unstable: ties among
//! equal heads resolve in whatever order the heap yields.
//!
//! Run files are allocated from the injected [`TempDir`] and deleted only
//! after the pass that consumed them has succeeded.

use crate::storage::tempdir::TempDir;
use crate::tree::writer::TreeWriter;
use crate::tree::{ByteTree, FileTree, TreeError};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::path::PathBuf;
use std::rc::Rc;
use thiserror::Error;

/// Sort/merge errors.
#[derive(Debug, Error)]
pub enum SortError {
    /// Input tree is a leaf where a node was required.
    #[error("input is not a node")]
    NotANode,
    /// Zip inputs have different child counts.
    #[error("child counts disagree")]
    LengthMismatch,
    /// Projection hit a leaf child or one with too few children.
    #[error("child cannot be projected")]
    Projection,
    /// Underlying tree failure.
    #[error(transparent)]
    Tree(#[from] TreeError),
    /// Temp-file service failure.
    #[error(transparent)]
    Temp(#[from] crate::storage::tempdir::TempError),
}

/// A total order on byte trees, shared by every cursor of a merge.
pub type TreeCmp = Rc<dyn Fn(&ByteTree, &ByteTree) -> Ordering>;

/// Byte-wise lexicographic order on wire encodings.
pub fn encoding_order() -> TreeCmp {
    Rc::new(|a: &ByteTree, b: &ByteTree| a.to_vec().cmp(&b.to_vec()))
}

/// Tuning knobs for the external sort.
#[derive(Clone, Debug)]
pub struct SortOpts {
    /// Children materialized per in-memory batch.
    pub batch_size: usize,
    /// Merge fan-in cap (simultaneously open run files).
    pub max_readers: usize,
    /// Buffered-input size for run readers.
    pub reader_buffer_size: usize,
}

impl Default for SortOpts {
    fn default() -> Self {
        SortOpts { batch_size: 4096, max_readers: 10, reader_buffer_size: 16384 }
    }
}

/// One open run with a single-element look-ahead.
struct RunCursor {
    reader: crate::tree::reader::TreeReader<'static>,
}

impl RunCursor {
    fn open(run: &FileTree, buf_size: usize) -> Result<RunCursor, SortError> {
        let reader = run.reader(buf_size)?;
        if reader.is_leaf() {
            return Err(SortError::NotANode);
        }
        Ok(RunCursor { reader })
    }

    fn advance(&mut self) -> Result<Option<ByteTree>, SortError> {
        if self.reader.remaining() == 0 {
            return Ok(None);
        }
        Ok(Some(self.reader.next_child()?.read_byte_tree()?))
    }
}

struct HeapEntry {
    head: ByteTree,
    cursor: RunCursor,
    cmp: TreeCmp,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        (self.cmp.as_ref())(&self.head, &other.head) == Ordering::Equal
    }
}
impl Eq for HeapEntry {}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(Ord::cmp(self, other))
    }
}
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse for smallest-head-first.
        (self.cmp.as_ref())(&self.head, &other.head).reverse()
    }
}

/// Merge one group of runs (at most `max_readers` of them) into a fresh run.
fn merge_group(
    group: &[FileTree],
    cmp: &TreeCmp,
    tmp: &TempDir,
    opts: &SortOpts,
) -> Result<FileTree, SortError> {
    let mut cursors = Vec::with_capacity(group.len());
    let mut total: u64 = 0;
    for run in group.iter() {
        let cursor = RunCursor::open(run, opts.reader_buffer_size)?;
        total += u64::from(cursor.reader.remaining());
        cursors.push(cursor);
    }

    let out_path = tmp.file();
    let mut writer = TreeWriter::create(&out_path, total as u32)?;

    let mut heap = BinaryHeap::with_capacity(cursors.len());
    for mut cursor in cursors {
        if let Some(head) = cursor.advance()? {
            heap.push(HeapEntry { head, cursor, cmp: Rc::clone(cmp) });
        }
    }

    while let Some(mut entry) = heap.pop() {
        writer.write(entry.head.as_ref())?;
        if let Some(next) = entry.cursor.advance()? {
            entry.head = next;
            heap.push(entry);
        }
    }

    Ok(writer.close()?)
}

struct Run {
    file: FileTree,
    /// Whether this run is an intermediate file we may delete.
    owned: bool,
}

fn merge_passes(
    mut runs: Vec<Run>,
    cmp: &TreeCmp,
    tmp: &TempDir,
    opts: &SortOpts,
) -> Result<FileTree, SortError> {
    if runs.is_empty() {
        return Ok(TreeWriter::create(&tmp.file(), 0)?.close()?);
    }
    let fan_in = opts.max_readers.max(2);
    while runs.len() > 1 {
        let mut next: Vec<Run> = Vec::with_capacity(runs.len() / fan_in + 1);
        let mut spent: Vec<PathBuf> = Vec::new();
        for group in runs.chunks(fan_in) {
            if group.len() == 1 {
                next.push(Run { file: group[0].file.clone(), owned: group[0].owned });
                continue;
            }
            let files: Vec<FileTree> = group.iter().map(|r| r.file.clone()).collect();
            let merged = merge_group(&files, cmp, tmp, opts)?;
            spent.extend(
                group
                    .iter()
                    .filter(|r| r.owned)
                    .map(|r| r.file.path().to_path_buf()),
            );
            next.push(Run { file: merged, owned: true });
        }
        // The pass succeeded; its inputs are no longer needed.
        for p in spent {
            let _ = tmp.delete(&p);
        }
        runs = next;
    }
    Ok(runs.remove(0).file)
}

/// Sort the children of a file-backed node into a new file-backed node.
///
/// Children are materialized `batch_size` at a time; the full child set
/// never has to fit in memory.
pub fn sort(
    input: &FileTree,
    cmp: &TreeCmp,
    tmp: &TempDir,
    opts: &SortOpts,
) -> Result<FileTree, SortError> {
    let reader = input.reader(opts.reader_buffer_size)?;
    if reader.is_leaf() {
        return Err(SortError::NotANode);
    }

    let mut runs: Vec<Run> = Vec::new();
    while reader.remaining() > 0 {
        let want = opts.batch_size.max(1);
        let mut batch = Vec::with_capacity(want.min(reader.remaining() as usize));
        while batch.len() < want && reader.remaining() > 0 {
            batch.push(reader.next_child()?.read_byte_tree()?);
        }
        batch.sort_unstable_by(|a, b| (cmp.as_ref())(a, b));
        let mut writer = TreeWriter::create(&tmp.file(), batch.len() as u32)?;
        for t in batch.iter() {
            writer.write(t.as_ref())?;
        }
        runs.push(Run { file: writer.close()?, owned: true });
    }

    merge_passes(runs, cmp, tmp, opts)
}

/// Merge already-sorted file-backed nodes into one sorted node.
///
/// Caller-supplied inputs are never deleted; only intermediate runs are.
pub fn merge(
    inputs: &[FileTree],
    cmp: &TreeCmp,
    tmp: &TempDir,
    opts: &SortOpts,
) -> Result<FileTree, SortError> {
    let runs = inputs
        .iter()
        .map(|f| Run { file: f.clone(), owned: false })
        .collect();
    merge_passes(runs, cmp, tmp, opts)
}

/// Pair children by index: `zip(a, b)[i] = node([a[i], b[i]])`.
pub fn zip(
    a: &FileTree,
    b: &FileTree,
    tmp: &TempDir,
    opts: &SortOpts,
) -> Result<FileTree, SortError> {
    let ra = a.reader(opts.reader_buffer_size)?;
    let rb = b.reader(opts.reader_buffer_size)?;
    if ra.is_leaf() || rb.is_leaf() {
        return Err(SortError::NotANode);
    }
    if ra.remaining() != rb.remaining() {
        return Err(SortError::LengthMismatch);
    }
    let n = ra.remaining();
    let mut writer = TreeWriter::create(&tmp.file(), n)?;
    for _ in 0..n {
        let ka = ra.next_child()?.read_byte_tree()?;
        let vb = rb.next_child()?.read_byte_tree()?;
        let pair = ByteTree::node(vec![ka, vb]);
        writer.write(pair.as_ref())?;
    }
    Ok(writer.close()?)
}

/// Emit the `i`-th child of each child of `t`.
pub fn project(
    t: &FileTree,
    i: u32,
    tmp: &TempDir,
    opts: &SortOpts,
) -> Result<FileTree, SortError> {
    let reader = t.reader(opts.reader_buffer_size)?;
    if reader.is_leaf() {
        return Err(SortError::NotANode);
    }
    let n = reader.remaining();
    let mut writer = TreeWriter::create(&tmp.file(), n)?;
    for _ in 0..n {
        let child = reader.next_child()?;
        if child.is_leaf() || child.remaining() <= i {
            return Err(SortError::Projection);
        }
        child.skip_children(i)?;
        let item = child.next_child()?.read_byte_tree()?;
        writer.write(item.as_ref())?;
        child.consume()?;
    }
    Ok(writer.close()?)
}

/// Permute `values` by the sorting permutation of `keys`.
///
/// Equivalent to `project(sort(zip(keys, values), key order), 1)`.
pub fn zip_sort_project(
    keys: &FileTree,
    values: &FileTree,
    cmp: &TreeCmp,
    tmp: &TempDir,
    opts: &SortOpts,
) -> Result<FileTree, SortError> {
    let zipped = zip(keys, values, tmp, opts)?;
    let pair_cmp: TreeCmp = {
        let cmp = Rc::clone(cmp);
        Rc::new(move |a: &ByteTree, b: &ByteTree| {
            match (
                a.children().and_then(|c| c.first()),
                b.children().and_then(|c| c.first()),
            ) {
                (Some(x), Some(y)) => (cmp.as_ref())(x, y),
                _ => Ordering::Equal,
            }
        })
    };
    let sorted = sort(&zipped, &pair_cmp, tmp, opts)?;
    let _ = tmp.delete(zipped.path());
    let out = project(&sorted, 1, tmp, opts)?;
    let _ = tmp.delete(sorted.path());
    Ok(out)
}
