// Copyright (c) 2026 Byteboard
// Licensed under the Apache License, Version 2.0

#![forbid(unsafe_code)]

use proptest::prelude::*;

use byteboard::tree::validate::{check_bytes, ValidateError};
use byteboard::tree::ByteTree;

fn arb_tree() -> impl Strategy<Value = ByteTree> {
    let leaf = proptest::collection::vec(any::<u8>(), 0..16).prop_map(ByteTree::Leaf);
    leaf.prop_recursive(5, 48, 6, |inner| {
        proptest::collection::vec(inner, 0..6).prop_map(ByteTree::Node)
    })
}

/// Longest root-to-leaf path through node children.
fn depth(t: &ByteTree) -> u32 {
    match t {
        ByteTree::Leaf(_) => 0,
        ByteTree::Node(cs) => cs.iter().map(depth).max().map_or(0, |d| d + 1),
    }
}

proptest! {
    #[test]
    fn accepts_at_exact_depth_and_rejects_below(t in arb_tree()) {
        let enc = t.to_vec();
        let d = depth(&t);

        prop_assert!(check_bytes(&enc, d).is_ok());
        prop_assert!(check_bytes(&enc, d + 1).is_ok());
        if d > 0 {
            prop_assert!(matches!(check_bytes(&enc, d - 1), Err(ValidateError::TooDeep)));
        }
    }

    #[test]
    fn flipped_tag_byte_never_validates(t in arb_tree(), pos in any::<prop::sample::Index>()) {
        let mut enc = t.to_vec();
        let i = pos.index(enc.len());
        enc[i] = enc[i].wrapping_add(0x40);
        // Whatever the corruption did, the scan must terminate without
        // accepting trailing garbage or panicking.
        let _ = check_bytes(&enc, 16);
    }
}

#[test]
fn right_spine_vector() {
    // Four nested single-child nodes around an empty leaf.
    let mut t = ByteTree::empty_leaf();
    for _ in 0..4 {
        t = ByteTree::node(vec![t]);
    }
    let enc = t.to_vec();
    assert!(matches!(check_bytes(&enc, 3), Err(ValidateError::TooDeep)));
    assert!(check_bytes(&enc, 4).is_ok());
}
