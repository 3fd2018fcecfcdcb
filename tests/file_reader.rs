// Copyright (c) 2026 Byteboard
// Licensed under the Apache License, Version 2.0

#![forbid(unsafe_code)]

//! Streaming over the file-backed flavor: the physical stream makes the
//! depth-first discipline mandatory, not advisory.

use byteboard::tree::{ByteTree, FileTree, TreeError};

fn fixture() -> ByteTree {
    ByteTree::node(vec![
        ByteTree::leaf(&vec![0xAB; 1000]),
        ByteTree::node(vec![
            ByteTree::from_u32(0x0102_0304),
            ByteTree::from_string("label"),
        ]),
        ByteTree::from_bools(&[true, false, true]),
    ])
}

#[test]
fn skips_a_large_leaf_without_materializing_it() {
    let dir = tempfile::tempdir().unwrap();
    let file = FileTree::store(&fixture(), dir.path().join("t")).unwrap();

    // A buffer far smaller than the first leaf forces real seeking.
    let r = file.reader(16).unwrap();
    r.skip_child().unwrap();

    let inner = r.next_child().unwrap();
    assert_eq!(inner.next_child().unwrap().read_u32().unwrap(), 0x0102_0304);
    assert_eq!(
        inner.next_child().unwrap().read_utf8_all().unwrap(),
        "label"
    );

    assert_eq!(
        r.next_child().unwrap().read_bools(3).unwrap(),
        vec![true, false, true]
    );
    assert!(r.is_closed());
}

#[test]
fn partial_reads_advance_the_same_stream() {
    let dir = tempfile::tempdir().unwrap();
    let file = FileTree::store(&fixture(), dir.path().join("t")).unwrap();

    let r = file.reader(64).unwrap();
    let big = r.next_child().unwrap();
    assert_eq!(big.remaining(), 1000);

    let mut head = [0u8; 4];
    big.read(&mut head).unwrap();
    assert_eq!(head, [0xAB; 4]);
    assert_eq!(big.remaining(), 996);

    let rest = big.read_all().unwrap();
    assert_eq!(rest.len(), 996);

    // The stream is now positioned exactly at the second child.
    let inner = r.next_child().unwrap();
    assert_eq!(inner.remaining(), 2);
    inner.consume().unwrap();
    r.skip_child().unwrap();
    assert!(matches!(r.next_child(), Err(TreeError::Exhausted)));
}

#[test]
#[should_panic(expected = "previous child is unconsumed")]
fn interleaving_children_on_a_file_panics() {
    let dir = tempfile::tempdir().unwrap();
    let file = FileTree::store(&fixture(), dir.path().join("t")).unwrap();

    let r = file.reader(64).unwrap();
    let _half_read = r.next_child().unwrap();
    let _ = r.next_child();
}

#[test]
fn short_read_on_file_leaf() {
    let dir = tempfile::tempdir().unwrap();
    let file = FileTree::store(&ByteTree::leaf(&[1, 2, 3]), dir.path().join("t")).unwrap();

    let r = file.reader(64).unwrap();
    assert!(r.is_leaf());
    let mut buf = [0u8; 4];
    assert!(matches!(r.read(&mut buf), Err(TreeError::ShortRead)));
}

#[test]
fn truncated_file_surfaces_malformed() {
    let dir = tempfile::tempdir().unwrap();
    let enc = fixture().to_vec();
    let path = dir.path().join("cut");
    std::fs::write(&path, &enc[..enc.len() - 3]).unwrap();

    let file = FileTree::new(&path);
    let r = file.reader(64).unwrap();
    // The damage is at the tail; walking there must fail cleanly.
    let got = r.read_byte_tree();
    assert!(matches!(
        got,
        Err(TreeError::Malformed) | Err(TreeError::Io(_))
    ));
}
