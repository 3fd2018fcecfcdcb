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

//! Signed replicated publish/wait across `k` parties.
//!
//! Party `l` publishes `(label, M)` by atomically renaming the wire encoding
//! into `<root>/l/label` on its own server, publishing its signature at
//! `<root>/l/label.sig.l`, and hinting every peer. Waiters download the
//! message and the publisher signature from `l`'s server, then sweep
//! `s = 1..=k` for co-signatures: their own is written locally at
//! `<root>/l/label.sig.s`, every other one is downloaded from `s`'s server
//! and verified against the signing tuple.
//!
//! Every download attempt is bounded by the wait deadline; between attempts
//! the waiter sleeps at most one pause interval, interruptible by a hint
//! from the party it is waiting on. An exhausted deadline asks the operator
//! whether to reset the timer; declining aborts the run. The co-signature
//! sweep resumes at the index that failed.

use crate::board::signing::{signer_message, BoardKey, HashSpec, SignerBackend};
use crate::board::{publish_atomic, BoardError, Deadline, RetryPrompt, WaitParams};
use crate::config::Settings;
use crate::monitoring::metrics::Metrics;
use crate::networking::hint::{send_hint, HintServer};
use crate::networking::http_client::fetch;
use crate::storage::tempdir::TempDir;
use crate::tree::{validate, ByteTree, FileTree, TreeRef};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Everything a replicated board needs at construction.
pub struct BoardSetup {
    /// This party's 1-based index.
    pub me: usize,
    /// Our private signing backend.
    pub signer: Arc<dyn SignerBackend>,
    /// Public keys of all parties, index `i - 1` for party `i`.
    pub keys: Vec<BoardKey>,
    /// HTTP URLs of all parties, same indexing.
    pub urls: Vec<String>,
    /// UDP hint addresses of all parties; `None` disables hinting a peer.
    pub hint_addrs: Vec<Option<String>>,
    /// Directory our own HTTP server exposes; we also publish into it.
    pub http_root: PathBuf,
    /// Joint hash `H*`; when set, everyone signs `H*(tuple)`.
    pub joint_hash: Option<HashSpec>,
    /// Our hint receiver, if the hint variant is used.
    pub hints: Option<Arc<HintServer>>,
    /// Temp-file service for download staging.
    pub tmp: Arc<TempDir>,
    /// Tuning knobs.
    pub settings: Settings,
    /// Transfer counters.
    pub metrics: Arc<Metrics>,
    /// Operator prompt for deadline resets.
    pub prompt: Arc<dyn RetryPrompt>,
}

/// Replicated bulletin board for one party.
pub struct ReplicatedBoard {
    me: usize,
    signer: Arc<dyn SignerBackend>,
    keys: Vec<BoardKey>,
    urls: Vec<String>,
    hint_addrs: Vec<Option<String>>,
    http_root: PathBuf,
    joint_hash: Option<HashSpec>,
    hints: Option<Arc<HintServer>>,
    tmp: Arc<TempDir>,
    settings: Settings,
    metrics: Arc<Metrics>,
    prompt: Arc<dyn RetryPrompt>,
    client: reqwest::Client,
    /// 1-based activity flags; inactive parties are skipped everywhere.
    active: RwLock<Vec<bool>>,
}

impl ReplicatedBoard {
    /// Validate the setup and build the board.
    pub fn new(setup: BoardSetup) -> Result<ReplicatedBoard, BoardError> {
        let k = setup.keys.len();
        if k == 0
            || setup.urls.len() != k
            || setup.hint_addrs.len() != k
            || setup.me == 0
            || setup.me > k
        {
            return Err(BoardError::Signing);
        }
        if setup.keys[setup.me - 1].public != setup.signer.public_key() {
            return Err(BoardError::Signing);
        }
        Ok(ReplicatedBoard {
            me: setup.me,
            signer: setup.signer,
            keys: setup.keys,
            urls: setup.urls,
            hint_addrs: setup.hint_addrs,
            http_root: setup.http_root,
            joint_hash: setup.joint_hash,
            hints: setup.hints,
            tmp: setup.tmp,
            settings: setup.settings,
            metrics: setup.metrics,
            prompt: setup.prompt,
            client: reqwest::Client::new(),
            active: RwLock::new(vec![true; k + 1]),
        })
    }

    /// Build the party described by a daemon config: load or create its
    /// signing key under the data directory, parse the peer tables, and
    /// stage downloads in `<data_dir>/tmp`.
    pub fn from_config(
        cfg: &crate::config::BoardConfig,
        hints: Option<Arc<HintServer>>,
        metrics: Arc<Metrics>,
        prompt: Arc<dyn RetryPrompt>,
    ) -> Result<ReplicatedBoard, BoardError> {
        use crate::board::signing::FileEd25519Backend;

        let data_dir = std::path::Path::new(&cfg.data_dir);
        let signer = Arc::new(FileEd25519Backend::load_or_create(
            &data_dir.join("party.key"),
        )?);

        let mut keys = Vec::with_capacity(cfg.peers.len());
        for peer in cfg.peers.iter() {
            let bytes = hex::decode(peer.pubkey_hex.trim()).map_err(|_| BoardError::Signing)?;
            if bytes.len() != 32 {
                return Err(BoardError::Signing);
            }
            let mut public = [0u8; 32];
            public.copy_from_slice(&bytes);
            let hash = match peer.hash.as_deref() {
                None => HashSpec::Sha256,
                Some(name) => HashSpec::from_name(name).ok_or(BoardError::Signing)?,
            };
            keys.push(BoardKey { public, hash });
        }

        let tmp = Arc::new(
            crate::storage::tempdir::TempDir::create(data_dir.join("tmp"))
                .map_err(|_| BoardError::Io)?,
        );

        ReplicatedBoard::new(BoardSetup {
            me: cfg.party,
            signer,
            keys,
            urls: cfg.peers.iter().map(|p| p.url.clone()).collect(),
            hint_addrs: cfg.peers.iter().map(|p| p.hint_addr.clone()).collect(),
            http_root: PathBuf::from(&cfg.http_root),
            joint_hash: None,
            hints,
            tmp,
            settings: cfg.settings(),
            metrics,
            prompt,
        })
    }

    /// Number of parties.
    pub fn parties(&self) -> usize {
        self.keys.len()
    }

    /// Our index.
    pub fn index(&self) -> usize {
        self.me
    }

    /// Mark a party inactive; waits on it return the empty node immediately
    /// and its co-signature is no longer collected.
    pub fn deactivate(&self, party: usize) {
        if party >= 1 && party <= self.parties() {
            if let Ok(mut active) = self.active.write() {
                active[party] = false;
            }
        }
    }

    fn is_active(&self, party: usize) -> bool {
        self.active
            .read()
            .map(|a| a.get(party).copied().unwrap_or(false))
            .unwrap_or(false)
    }

    fn key(&self, party: usize) -> &BoardKey {
        &self.keys[party - 1]
    }

    fn url(&self, party: usize) -> &str {
        self.urls[party - 1].trim_end_matches('/')
    }

    fn artifact_path(&self, publisher: usize, name: &str) -> PathBuf {
        self.http_root.join(publisher.to_string()).join(name)
    }

    /// Publish `(label, message)` and collect all co-signatures.
    ///
    /// Returns the published message once every active party has signed it.
    pub async fn publish(
        &self,
        label: &str,
        message: TreeRef<'_>,
        params: &WaitParams,
    ) -> Result<ByteTree, BoardError> {
        let path = self.artifact_path(self.me, label);
        publish_atomic(&path, |f| {
            message.write_to(f).map_err(|e| match e {
                crate::tree::TreeError::Io(io) => io,
                _ => std::io::Error::other("encode"),
            })
        })?;

        let digest = signer_message(
            self.key(self.me).hash,
            self.joint_hash,
            self.me,
            label,
            message,
            self.settings.digest_buffer_size,
        )?;
        let sig = self.signer.sign(&digest)?;
        self.write_signature(self.me, label, self.me, &sig)?;
        info!(party = self.me, label, "published message and own signature");

        for peer in 1..=self.parties() {
            if peer == self.me {
                continue;
            }
            if let Some(addr) = &self.hint_addrs[peer - 1] {
                send_hint(addr, self.me, &self.metrics).await;
            }
        }

        self.wait_for(self.me, label, params).await
    }

    /// Wait for `(publisher, label)` and for co-signatures from every
    /// active party.
    pub async fn wait_for(
        &self,
        publisher: usize,
        label: &str,
        params: &WaitParams,
    ) -> Result<ByteTree, BoardError> {
        if publisher == 0 || publisher > self.parties() {
            return Err(BoardError::Signing);
        }
        if !self.is_active(publisher) {
            return Ok(ByteTree::node(vec![]));
        }
        let mut deadline = Deadline::start(params.max_time);

        let message = if publisher == self.me {
            FileTree::new(self.artifact_path(self.me, label)).load()?
        } else {
            loop {
                if let Some(m) = self
                    .try_fetch_message(publisher, label, params, &deadline)
                    .await?
                {
                    break m;
                }
                if deadline.expired() {
                    if self
                        .prompt
                        .confirm_retry(&format!("download of {publisher}/{label}"))
                    {
                        deadline.reset();
                        continue;
                    }
                    warn!(publisher, label, "operator declined retry; aborting");
                    return Err(BoardError::Aborted);
                }
                self.pause_or_hint(publisher, &deadline).await;
            }
        };

        // Co-signature sweep; on an operator-approved reset the sweep
        // resumes at the index that failed.
        let mut s = 1;
        while s <= self.parties() {
            if s == publisher || !self.is_active(s) {
                s += 1;
                continue;
            }
            if s == self.me {
                let digest = signer_message(
                    self.key(self.me).hash,
                    self.joint_hash,
                    publisher,
                    label,
                    message.as_ref(),
                    self.settings.digest_buffer_size,
                )?;
                let sig = self.signer.sign(&digest)?;
                self.write_signature(publisher, label, self.me, &sig)?;
                s += 1;
                continue;
            }

            if self
                .try_fetch_cosignature(s, publisher, label, &message, &deadline)
                .await?
            {
                s += 1;
                continue;
            }
            if deadline.expired() {
                if self
                    .prompt
                    .confirm_retry(&format!("signature {s} for {publisher}/{label}"))
                {
                    deadline.reset();
                    continue;
                }
                warn!(signer = s, publisher, label, "operator declined retry; aborting");
                return Err(BoardError::Aborted);
            }
            self.pause_or_hint(s, &deadline).await;
        }

        info!(publisher, label, "message and all co-signatures held");
        Ok(message)
    }

    /// Delete the subtree `<root>/i/<prefix>` for every party `i`.
    pub fn unpublish(&self, prefix: &str) -> Result<(), BoardError> {
        for i in 1..=self.parties() {
            let p = self.artifact_path(i, prefix);
            if p.is_dir() {
                fs::remove_dir_all(&p)?;
            } else if p.exists() {
                fs::remove_file(&p)?;
            }
        }
        Ok(())
    }

    // ---- internals ---------------------------------------------------------

    fn write_signature(
        &self,
        publisher: usize,
        label: &str,
        signer: usize,
        sig: &[u8],
    ) -> Result<(), BoardError> {
        let path = self.artifact_path(publisher, &format!("{label}.sig.{signer}"));
        let tree = ByteTree::leaf(sig);
        publish_atomic(&path, |f| f.write_all(&tree.to_vec()))?;
        Ok(())
    }

    /// One bounded download attempt; failures count as waiting time,
    /// successes as network time.
    async fn timed_fetch(
        &self,
        url: &str,
        out: &mut (dyn Write + Send),
        cap: u64,
        deadline: &Deadline,
    ) -> bool {
        let started = Instant::now();
        match fetch(
            &self.client,
            url,
            out,
            deadline.remaining(),
            cap,
            &self.metrics,
        )
        .await
        {
            Ok(elapsed) => {
                self.metrics
                    .network_ms_total
                    .inc_by(elapsed.as_millis() as u64);
                true
            }
            Err(e) => {
                debug!(%url, ?e, "fetch attempt failed");
                self.metrics
                    .waiting_ms_total
                    .inc_by(started.elapsed().as_millis() as u64);
                false
            }
        }
    }

    /// Download a signature artifact (a leaf-shaped byte tree) from
    /// `signer`'s server.
    async fn fetch_signature_bytes(
        &self,
        signer: usize,
        publisher: usize,
        label: &str,
        deadline: &Deadline,
    ) -> Option<Vec<u8>> {
        let url = format!(
            "{}/{}/{}.sig.{}",
            self.url(signer),
            publisher,
            label,
            signer
        );
        let mut buf: Vec<u8> = Vec::new();
        if !self
            .timed_fetch(&url, &mut buf, self.settings.max_signature_bytes, deadline)
            .await
        {
            return None;
        }
        let tree = ByteTree::parse(&buf).ok()?;
        tree.leaf_bytes().map(|b| b.to_vec())
    }

    /// One attempt at the publisher's message plus a valid publisher
    /// signature. `Ok(None)` means "not yet"; the caller decides whether to
    /// sleep or give up.
    async fn try_fetch_message(
        &self,
        publisher: usize,
        label: &str,
        params: &WaitParams,
        deadline: &Deadline,
    ) -> Result<Option<ByteTree>, BoardError> {
        let staging = self.tmp.file();
        let mut file = fs::File::create(&staging).map_err(|_| BoardError::Io)?;
        let url = format!("{}/{}/{}", self.url(publisher), publisher, label);
        let fetched = self
            .timed_fetch(&url, &mut file, params.max_bytes, deadline)
            .await;
        drop(file);
        if !fetched {
            let _ = self.tmp.delete(&staging);
            return Ok(None);
        }

        if validate::check_file(&staging, params.max_depth, self.settings.reader_buffer_size)
            .is_err()
        {
            warn!(publisher, label, "downloaded message failed format validation");
            let _ = self.tmp.delete(&staging);
            return Ok(None);
        }
        let message = FileTree::new(&staging).load()?;
        let _ = self.tmp.delete(&staging);

        let Some(sig) = self
            .fetch_signature_bytes(publisher, publisher, label, deadline)
            .await
        else {
            return Ok(None);
        };
        let key = self.key(publisher);
        let digest = signer_message(
            key.hash,
            self.joint_hash,
            publisher,
            label,
            message.as_ref(),
            self.settings.digest_buffer_size,
        )?;
        if key.verify(&digest, &sig).is_err() {
            warn!(publisher, label, "publisher signature failed verification");
            return Ok(None);
        }
        Ok(Some(message))
    }

    /// One attempt at co-signature `s` over `(publisher, label, message)`.
    async fn try_fetch_cosignature(
        &self,
        s: usize,
        publisher: usize,
        label: &str,
        message: &ByteTree,
        deadline: &Deadline,
    ) -> Result<bool, BoardError> {
        let Some(sig) = self
            .fetch_signature_bytes(s, publisher, label, deadline)
            .await
        else {
            return Ok(false);
        };
        let key = self.key(s);
        let digest = signer_message(
            key.hash,
            self.joint_hash,
            publisher,
            label,
            message.as_ref(),
            self.settings.digest_buffer_size,
        )?;
        if key.verify(&digest, &sig).is_err() {
            warn!(signer = s, publisher, label, "co-signature failed verification");
            return Ok(false);
        }
        Ok(true)
    }

    /// Sleep at most one pause interval or the remaining deadline,
    /// interruptible by a hint from `party`. Hints shorten but never extend
    /// the deadline.
    async fn pause_or_hint(&self, party: usize, deadline: &Deadline) {
        let mut wait = Duration::from_millis(self.settings.default_pause_ms);
        if let Some(rem) = deadline.remaining() {
            wait = wait.min(rem);
        }
        if wait.is_zero() {
            return;
        }
        let started = Instant::now();
        match &self.hints {
            Some(h) => {
                let _ = h.wait_hint(party, wait).await;
            }
            None => tokio::time::sleep(wait).await,
        }
        self.metrics
            .waiting_ms_total
            .inc_by(started.elapsed().as_millis() as u64);
    }
}
