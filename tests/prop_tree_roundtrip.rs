// Copyright (c) 2026 Byteboard
// Licensed under the Apache License, Version 2.0

#![forbid(unsafe_code)]

use proptest::prelude::*;

use byteboard::tree::digest::digest_tree;
use byteboard::tree::{ByteTree, FileTree};

fn arb_tree() -> impl Strategy<Value = ByteTree> {
    let leaf = proptest::collection::vec(any::<u8>(), 0..64).prop_map(ByteTree::Leaf);
    leaf.prop_recursive(4, 64, 8, |inner| {
        proptest::collection::vec(inner, 0..8).prop_map(ByteTree::Node)
    })
}

proptest! {
    #[test]
    fn parse_inverts_encode(t in arb_tree()) {
        let enc = t.to_vec();
        prop_assert_eq!(ByteTree::parse(&enc).unwrap(), t);
    }

    #[test]
    fn encoding_length_matches_total_bytes(t in arb_tree()) {
        prop_assert_eq!(t.to_vec().len() as u64, t.total_bytes());
    }

    #[test]
    fn streaming_digest_agrees_across_flavors(t in arb_tree()) {
        let dir = tempfile::tempdir().unwrap();
        let file = FileTree::store(&t, dir.path().join("t")).unwrap();

        let mem = digest_tree(t.as_ref(), &ring::digest::SHA256, 4096).unwrap();
        let disk = digest_tree(file.as_ref(), &ring::digest::SHA256, 11).unwrap();
        let raw = ring::digest::digest(&ring::digest::SHA256, &t.to_vec());

        prop_assert_eq!(&mem, &disk);
        prop_assert_eq!(mem.as_slice(), raw.as_ref());
    }

    #[test]
    fn file_reader_materializes_the_same_tree(t in arb_tree()) {
        let dir = tempfile::tempdir().unwrap();
        let file = FileTree::store(&t, dir.path().join("t")).unwrap();
        let reader = file.reader(64).unwrap();
        prop_assert_eq!(reader.read_byte_tree().unwrap(), t);
    }

    #[test]
    fn trailing_garbage_is_rejected(t in arb_tree(), tail in proptest::collection::vec(any::<u8>(), 1..8)) {
        let mut enc = t.to_vec();
        enc.extend_from_slice(&tail);
        prop_assert!(ByteTree::parse(&enc).is_err());
    }
}
