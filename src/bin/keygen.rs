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

//! Generate a party signing key and print its public half, both as raw hex
//! and as a marshalled value ready for peer config files.

use anyhow::Result;
use byteboard::board::signing::{BoardKey, FileEd25519Backend, HashSpec, SignerBackend};
use byteboard::marshal::{Registry, CLASS_BOARD_KEY};
use std::path::PathBuf;

fn main() -> Result<()> {
    let out_dir = std::env::args().nth(1).unwrap_or_else(|| "data".to_string());
    let hash = std::env::args()
        .nth(2)
        .as_deref()
        .and_then(HashSpec::from_name)
        .unwrap_or(HashSpec::Sha256);

    let mut key_path = PathBuf::from(out_dir);
    std::fs::create_dir_all(&key_path)?;
    key_path.push("party.key");

    let backend = FileEd25519Backend::load_or_create(&key_path)
        .map_err(|e| anyhow::anyhow!("keygen: {e}"))?;
    let key = BoardKey { public: backend.public_key(), hash };

    println!("{}", hex::encode(key.public));
    println!(
        "{}",
        Registry::marshal_hex(
            CLASS_BOARD_KEY,
            &format!("ed25519 verification key ({})", hash.name()),
            key.to_byte_tree(),
        )
    );
    Ok(())
}
