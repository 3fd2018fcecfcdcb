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

//! Signing tuples and Ed25519 key handling for the bulletin board.
//!
//! The canonical structure whose digest is signed is the tuple
//! `node([leaf(utf8("publisher/label")), payload])`. The digest is streamed
//! through the container flavor, so signing a file-backed payload never
//! materializes it.
//!
//! Each signer has a hash-function-of-record carried next to its public
//! key; with a joint hash configured, everyone signs the joint digest of the
//! tuple instead of their own.

use crate::tree::digest::digest_tree;
use crate::tree::{ByteTree, TreeError, TreeRef};
use ring::digest;
use ring::rand::SystemRandom;
use ring::signature::{Ed25519KeyPair, KeyPair, UnparsedPublicKey, ED25519};
use std::fs;
use std::io::Write;
use std::path::Path;
use thiserror::Error;
use zeroize::Zeroize;

/// Signing errors.
#[derive(Debug, Error)]
pub enum SigningError {
    #[error("io")]
    Io,
    #[error("invalid key encoding")]
    InvalidKey,
    #[error("bad signature")]
    BadSignature,
}

/// Hash function of record for a signer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HashSpec {
    /// SHA-256.
    Sha256,
    /// SHA-512.
    Sha512,
}

impl HashSpec {
    /// The ring algorithm.
    pub fn algorithm(&self) -> &'static digest::Algorithm {
        match self {
            HashSpec::Sha256 => &digest::SHA256,
            HashSpec::Sha512 => &digest::SHA512,
        }
    }

    /// Stable name used in config and marshalled values.
    pub fn name(&self) -> &'static str {
        match self {
            HashSpec::Sha256 => "sha256",
            HashSpec::Sha512 => "sha512",
        }
    }

    /// Parse a stable name.
    pub fn from_name(name: &str) -> Option<HashSpec> {
        match name {
            "sha256" => Some(HashSpec::Sha256),
            "sha512" => Some(HashSpec::Sha512),
            _ => None,
        }
    }
}

/// Signer backend abstraction (HSM compatible).
pub trait SignerBackend: Send + Sync {
    /// Ed25519 public key bytes.
    fn public_key(&self) -> [u8; 32];
    /// Sign message bytes.
    fn sign(&self, msg: &[u8]) -> Result<Vec<u8>, SigningError>;
}

/// File-backed Ed25519 backend (PKCS#8 key file).
pub struct FileEd25519Backend {
    keypair: Ed25519KeyPair,
}

impl FileEd25519Backend {
    /// Load an existing PKCS#8 key file or generate and persist a new one.
    ///
    /// A fresh key lands via a `.staged` sibling plus rename, created
    /// owner-only from the first byte, so a crash can never leave a
    /// partial or world-readable key file.
    pub fn load_or_create(path: &Path) -> Result<Self, SigningError> {
        if path.exists() {
            let bytes = fs::read(path).map_err(|_| SigningError::Io)?;
            let kp = Ed25519KeyPair::from_pkcs8(&bytes).map_err(|_| SigningError::InvalidKey)?;
            return Ok(Self { keypair: kp });
        }

        let rng = SystemRandom::new();
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng).map_err(|_| SigningError::InvalidKey)?;

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|_| SigningError::Io)?;
        }
        let staged = path.with_extension("staged");
        let mut opts = fs::OpenOptions::new();
        opts.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            opts.mode(0o600);
        }
        {
            let mut out = opts.open(&staged).map_err(|_| SigningError::Io)?;
            out.write_all(pkcs8.as_ref()).map_err(|_| SigningError::Io)?;
            out.sync_all().map_err(|_| SigningError::Io)?;
        }
        fs::rename(&staged, path).map_err(|_| SigningError::Io)?;

        let mut scratch = pkcs8.as_ref().to_vec();
        let kp = Ed25519KeyPair::from_pkcs8(&scratch).map_err(|_| SigningError::InvalidKey)?;
        scratch.zeroize();
        Ok(Self { keypair: kp })
    }
}

impl SignerBackend for FileEd25519Backend {
    fn public_key(&self) -> [u8; 32] {
        let pk = self.keypair.public_key().as_ref();
        let mut out = [0u8; 32];
        out.copy_from_slice(pk);
        out
    }

    fn sign(&self, msg: &[u8]) -> Result<Vec<u8>, SigningError> {
        Ok(self.keypair.sign(msg).as_ref().to_vec())
    }
}

/// A signer's public key together with its hash-function-of-record.
#[derive(Clone, Debug)]
pub struct BoardKey {
    /// Ed25519 public key bytes.
    pub public: [u8; 32],
    /// Digest algorithm this signer commits to.
    pub hash: HashSpec,
}

impl BoardKey {
    /// Verify an Ed25519 signature over `msg`.
    pub fn verify(&self, msg: &[u8], sig: &[u8]) -> Result<(), SigningError> {
        // ring requires signature length 64 for Ed25519
        if sig.len() != 64 {
            return Err(SigningError::BadSignature);
        }
        let pk = UnparsedPublicKey::new(&ED25519, &self.public);
        pk.verify(msg, sig).map_err(|_| SigningError::BadSignature)
    }

    /// Marshal payload: `node([leaf(pk), leaf(utf8(hash name))])`.
    pub fn to_byte_tree(&self) -> ByteTree {
        ByteTree::node(vec![
            ByteTree::leaf(&self.public),
            ByteTree::from_string(self.hash.name()),
        ])
    }

    /// Decode the marshal payload.
    pub fn from_byte_tree(t: &ByteTree) -> Result<BoardKey, TreeError> {
        let cs = t.children().ok_or(TreeError::Malformed)?;
        let [pk, hash] = cs else {
            return Err(TreeError::Malformed);
        };
        let pk = pk.leaf_bytes().ok_or(TreeError::Malformed)?;
        if pk.len() != 32 {
            return Err(TreeError::Malformed);
        }
        let mut public = [0u8; 32];
        public.copy_from_slice(pk);
        let hash = HashSpec::from_name(&hash.as_string()?).ok_or(TreeError::Malformed)?;
        Ok(BoardKey { public, hash })
    }
}

/// Digest of the signing tuple `node([leaf("publisher/label"), payload])`.
pub fn tuple_digest(
    hash: HashSpec,
    publisher: usize,
    label: &str,
    payload: TreeRef<'_>,
    buf_size: usize,
) -> Result<Vec<u8>, TreeError> {
    let tag = ByteTree::from_string(&format!("{publisher}/{label}"));
    let parts = [tag.as_ref(), payload];
    digest_tree(TreeRef::Seq(&parts), hash.algorithm(), buf_size)
}

/// The bytes a given signer signs (and peers verify) for a message.
///
/// With a joint hash `H*` configured, everyone signs `H*(tuple)`; otherwise
/// each signer digests the tuple with its own hash-function-of-record.
pub fn signer_message(
    signer_hash: HashSpec,
    joint_hash: Option<HashSpec>,
    publisher: usize,
    label: &str,
    payload: TreeRef<'_>,
    buf_size: usize,
) -> Result<Vec<u8>, TreeError> {
    tuple_digest(
        joint_hash.unwrap_or(signer_hash),
        publisher,
        label,
        payload,
        buf_size,
    )
}
