// Copyright (c) 2026 Byteboard
// Licensed under the Apache License, Version 2.0

#![forbid(unsafe_code)]

//! Loopback integration of the replicated board: two real parties, real
//! HTTP servers and hint sockets on 127.0.0.1.

use byteboard::board::replicated::{BoardSetup, ReplicatedBoard};
use byteboard::board::signing::{BoardKey, FileEd25519Backend, HashSpec, SignerBackend};
use byteboard::board::{BoardError, DenyPrompt, WaitParams};
use byteboard::config::Settings;
use byteboard::monitoring::metrics::Metrics;
use byteboard::networking::hint::HintServer;
use byteboard::networking::http_server::HttpServer;
use byteboard::storage::tempdir::TempDir;
use byteboard::tree::ByteTree;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

struct Party {
    board: ReplicatedBoard,
    metrics: Arc<Metrics>,
    http: HttpServer,
    root: PathBuf,
}

async fn loopback_parties(sandbox: &std::path::Path) -> Vec<Party> {
    let k = 2;
    let settings = Settings::default();

    let backends: Vec<Arc<FileEd25519Backend>> = (1..=k)
        .map(|i| {
            Arc::new(
                FileEd25519Backend::load_or_create(&sandbox.join(format!("party{i}.key")))
                    .unwrap(),
            )
        })
        .collect();
    let keys: Vec<BoardKey> = backends
        .iter()
        .map(|b| BoardKey { public: b.public_key(), hash: HashSpec::Sha256 })
        .collect();

    let mut https = Vec::new();
    let mut hints = Vec::new();
    let mut metrics_all = Vec::new();
    let mut roots = Vec::new();
    for i in 1..=k {
        let metrics = Arc::new(Metrics::new().unwrap());
        let root = sandbox.join(format!("www{i}"));
        std::fs::create_dir_all(&root).unwrap();
        let http = HttpServer::serve(root.clone(), "127.0.0.1:0", Arc::clone(&metrics), &settings)
            .await
            .unwrap();
        let hint = HintServer::bind("127.0.0.1:0", k, Arc::clone(&metrics), &settings)
            .await
            .unwrap();
        https.push(http);
        hints.push(Arc::new(hint));
        metrics_all.push(metrics);
        roots.push(root);
    }

    let urls: Vec<String> = https.iter().map(|h| format!("http://{}", h.addr)).collect();
    let hint_addrs: Vec<Option<String>> =
        hints.iter().map(|h| Some(h.addr().to_string())).collect();

    let mut parties = Vec::new();
    for (idx, http) in https.into_iter().enumerate() {
        let i = idx + 1;
        let board = ReplicatedBoard::new(BoardSetup {
            me: i,
            signer: backends[idx].clone(),
            keys: keys.clone(),
            urls: urls.clone(),
            hint_addrs: hint_addrs.clone(),
            http_root: roots[idx].clone(),
            joint_hash: None,
            hints: Some(Arc::clone(&hints[idx])),
            tmp: Arc::new(TempDir::create(sandbox.join(format!("tmp{i}"))).unwrap()),
            settings: settings.clone(),
            metrics: Arc::clone(&metrics_all[idx]),
            prompt: Arc::new(DenyPrompt),
        })
        .unwrap();
        parties.push(Party {
            board,
            metrics: Arc::clone(&metrics_all[idx]),
            http,
            root: roots[idx].clone(),
        });
    }
    parties
}

fn params(max_time: Duration) -> WaitParams {
    WaitParams { max_time: Some(max_time), max_bytes: 1 << 20, max_depth: 16 }
}

#[tokio::test(flavor = "multi_thread")]
async fn publish_collects_all_cosignatures() {
    let sandbox = tempfile::tempdir().unwrap();
    let parties = loopback_parties(sandbox.path()).await;
    let [p1, p2] = match parties.try_into() {
        Ok(arr) => arr,
        Err(_) => unreachable!(),
    };

    let msg = ByteTree::node(vec![ByteTree::from_u32(7), ByteTree::leaf(b"ciphertexts")]);
    let p = params(Duration::from_secs(30));

    let (published, waited) = tokio::join!(
        p1.board.publish("round1/out", msg.as_ref(), &p),
        p2.board.wait_for(1, "round1/out", &p),
    );
    assert_eq!(published.unwrap(), msg);
    assert_eq!(waited.unwrap(), msg);

    // Artifacts landed where the layout says they must.
    assert!(p1.root.join("1/round1/out").is_file());
    assert!(p1.root.join("1/round1/out.sig.1").is_file());
    assert!(p2.root.join("1/round1/out.sig.2").is_file());

    // Both sides transferred real bytes.
    assert!(p2.metrics.received_bytes_total.get() > 0);
    assert!(p1.metrics.sent_bytes_total.get() > 0);

    // Unpublish sweeps the prefix on our own replica.
    p1.board.unpublish("round1").unwrap();
    assert!(!p1.root.join("1/round1").exists());

    p1.http.shutdown().await;
    p2.http.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn board_builds_from_daemon_config() {
    let sandbox = tempfile::tempdir().unwrap();
    let data_dir = sandbox.path().join("data");
    std::fs::create_dir_all(&data_dir).unwrap();

    // The config must carry our real public key, so generate it first.
    let backend = FileEd25519Backend::load_or_create(&data_dir.join("party.key")).unwrap();
    let raw = format!(
        r#"
party = 1
data_dir = "{data}"
http_root = "{root}"
http_listen = "127.0.0.1:0"

[[peers]]
url = "http://127.0.0.1:9090"
pubkey_hex = "{pk}"
hash = "sha512"
"#,
        data = data_dir.display(),
        root = sandbox.path().join("www").display(),
        pk = hex::encode(backend.public_key()),
    );
    let cfg = byteboard::config::BoardConfig::from_toml(&raw).unwrap();

    let metrics = Arc::new(Metrics::new().unwrap());
    let board = byteboard::board::replicated::ReplicatedBoard::from_config(
        &cfg,
        None,
        metrics,
        Arc::new(DenyPrompt),
    )
    .unwrap();
    assert_eq!(board.parties(), 1);
    assert_eq!(board.index(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn waiting_on_an_inactive_party_returns_the_empty_node() {
    let sandbox = tempfile::tempdir().unwrap();
    let parties = loopback_parties(sandbox.path()).await;
    let p2 = &parties[1];

    p2.board.deactivate(1);
    let got = p2
        .board
        .wait_for(1, "never/published", &params(Duration::from_secs(5)))
        .await
        .unwrap();
    assert_eq!(got, ByteTree::node(vec![]));
}

#[tokio::test(flavor = "multi_thread")]
async fn deny_prompt_aborts_after_the_deadline() {
    let sandbox = tempfile::tempdir().unwrap();
    let parties = loopback_parties(sandbox.path()).await;
    let p2 = &parties[1];

    let got = p2
        .board
        .wait_for(1, "never/published", &params(Duration::from_millis(200)))
        .await;
    assert!(matches!(got, Err(BoardError::Aborted)));
}

#[tokio::test(flavor = "multi_thread")]
async fn tampered_message_is_rejected_until_deadline() {
    let sandbox = tempfile::tempdir().unwrap();
    let parties = loopback_parties(sandbox.path()).await;
    let [p1, p2] = match parties.try_into() {
        Ok(arr) => arr,
        Err(_) => unreachable!(),
    };

    // Publish legitimately, then corrupt the payload on disk. The signature
    // no longer matches, so the waiter must refuse the message and
    // eventually abort.
    let msg = ByteTree::leaf(b"original");
    let p = params(Duration::from_secs(30));
    let (published, waited) = tokio::join!(
        p1.board.publish("round2/out", msg.as_ref(), &p),
        p2.board.wait_for(1, "round2/out", &p),
    );
    published.unwrap();
    waited.unwrap();

    std::fs::write(
        p1.root.join("1/round2/out"),
        ByteTree::leaf(b"tampered").to_vec(),
    )
    .unwrap();

    let got = p2
        .board
        .wait_for(1, "round2/out", &params(Duration::from_millis(400)))
        .await;
    assert!(matches!(got, Err(BoardError::Aborted)));

    p1.http.shutdown().await;
    p2.http.shutdown().await;
}
