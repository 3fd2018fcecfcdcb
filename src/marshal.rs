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

//! Marshalled values: byte trees carrying a class-name tag.
//!
//! A marshalled value is `node([leaf(utf8(class_name)), payload])`. An
//! explicit registry maps class names to factories; factories return a
//! tagged [`Instance`] and typed unmarshal helpers downcast to the requested
//! variant. The hex form may carry a human-readable description separated by
//! `::`, stripped on unmarshal.

use crate::board::signing::{BoardKey, HashSpec};
use crate::codec;
use crate::runtime::rand::RandomSource;
use crate::tree::ByteTree;
use std::collections::BTreeMap;
use thiserror::Error;

/// Marshalling errors.
#[derive(Debug, Error)]
pub enum MarshalError {
    /// Value is not a `node([leaf(name), payload])` shape.
    #[error("malformed marshalled value")]
    Malformed,
    /// Class name exceeds the safety cap.
    #[error("class name too long")]
    Oversize,
    /// No factory registered under the class name.
    #[error("unknown class")]
    UnknownClass,
    /// Factory rejected the payload.
    #[error("factory failed")]
    Factory,
    /// Instance does not satisfy the requested interface.
    #[error("type mismatch")]
    TypeMismatch,
}

/// Tagged variant over the instantiable types.
#[derive(Clone, Debug)]
pub enum Instance {
    /// A signer's verification key.
    Key(BoardKey),
    /// A hash function of record.
    Hash(HashSpec),
}

/// Factory context: optional randomness and a certainty parameter for
/// probabilistic membership checks.
pub struct FactoryCtx<'a> {
    /// Random source, when the factory needs one.
    pub random: Option<&'a mut dyn RandomSource>,
    /// Certainty parameter (interpretation is per-factory).
    pub certainty: u32,
}

impl FactoryCtx<'_> {
    /// Context with no randomness and zero certainty.
    pub fn none() -> FactoryCtx<'static> {
        FactoryCtx { random: None, certainty: 0 }
    }
}

/// Reconstructs a typed instance from a marshal payload.
pub type Factory = fn(&ByteTree, &mut FactoryCtx<'_>) -> Result<Instance, MarshalError>;

fn key_factory(payload: &ByteTree, _ctx: &mut FactoryCtx<'_>) -> Result<Instance, MarshalError> {
    BoardKey::from_byte_tree(payload)
        .map(Instance::Key)
        .map_err(|_| MarshalError::Factory)
}

fn hash_factory(payload: &ByteTree, _ctx: &mut FactoryCtx<'_>) -> Result<Instance, MarshalError> {
    let name = payload.as_string().map_err(|_| MarshalError::Factory)?;
    HashSpec::from_name(&name)
        .map(Instance::Hash)
        .ok_or(MarshalError::Factory)
}

/// Class name of [`BoardKey`] values.
pub const CLASS_BOARD_KEY: &str = "board.SignaturePublicKey";
/// Class name of [`HashSpec`] values.
pub const CLASS_HASH: &str = "board.HashFunction";

/// Explicit class-name registry.
pub struct Registry {
    factories: BTreeMap<String, Factory>,
    max_classname_bytes: usize,
}

impl Registry {
    /// Empty registry with the given class-name cap.
    pub fn new(max_classname_bytes: usize) -> Registry {
        Registry { factories: BTreeMap::new(), max_classname_bytes }
    }

    /// Registry pre-populated with the crate's own types.
    pub fn with_builtins(max_classname_bytes: usize) -> Registry {
        let mut r = Registry::new(max_classname_bytes);
        r.register(CLASS_BOARD_KEY, key_factory);
        r.register(CLASS_HASH, hash_factory);
        r
    }

    /// Register a factory under a class name.
    pub fn register(&mut self, class_name: &str, factory: Factory) {
        self.factories.insert(class_name.to_string(), factory);
    }

    /// Wrap a payload with its class name.
    pub fn marshal(class_name: &str, payload: ByteTree) -> ByteTree {
        ByteTree::node(vec![ByteTree::from_string(class_name), payload])
    }

    /// Marshal to hex with a human-readable description prefix.
    pub fn marshal_hex(class_name: &str, description: &str, payload: ByteTree) -> String {
        let tree = Registry::marshal(class_name, payload);
        format!("{}::{}", description, codec::to_hex(&tree.to_vec()))
    }

    /// Dispatch a marshalled value through the registry.
    pub fn unmarshal(
        &self,
        tree: &ByteTree,
        ctx: &mut FactoryCtx<'_>,
    ) -> Result<Instance, MarshalError> {
        let cs = tree.children().ok_or(MarshalError::Malformed)?;
        let [name, payload] = cs else {
            return Err(MarshalError::Malformed);
        };
        let name_bytes = name.leaf_bytes().ok_or(MarshalError::Malformed)?;
        if name_bytes.len() > self.max_classname_bytes {
            return Err(MarshalError::Oversize);
        }
        let class_name = name.as_string().map_err(|_| MarshalError::Malformed)?;
        let factory = self
            .factories
            .get(&class_name)
            .ok_or(MarshalError::UnknownClass)?;
        factory(payload, ctx)
    }

    /// Unmarshal from the hex form, stripping any `::` description.
    pub fn unmarshal_hex(
        &self,
        hex: &str,
        ctx: &mut FactoryCtx<'_>,
    ) -> Result<Instance, MarshalError> {
        let bytes = codec::from_hex(codec::strip_comment(hex));
        let tree = ByteTree::parse(&bytes).map_err(|_| MarshalError::Malformed)?;
        self.unmarshal(&tree, ctx)
    }

    /// Unmarshal expecting a verification key.
    pub fn unmarshal_key(
        &self,
        tree: &ByteTree,
        ctx: &mut FactoryCtx<'_>,
    ) -> Result<BoardKey, MarshalError> {
        match self.unmarshal(tree, ctx)? {
            Instance::Key(k) => Ok(k),
            _ => Err(MarshalError::TypeMismatch),
        }
    }

    /// Unmarshal expecting a hash function.
    pub fn unmarshal_hash(
        &self,
        tree: &ByteTree,
        ctx: &mut FactoryCtx<'_>,
    ) -> Result<HashSpec, MarshalError> {
        match self.unmarshal(tree, ctx)? {
            Instance::Hash(h) => Ok(h),
            _ => Err(MarshalError::TypeMismatch),
        }
    }
}
