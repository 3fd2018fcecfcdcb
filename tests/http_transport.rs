// Copyright (c) 2026 Byteboard
// Licensed under the Apache License, Version 2.0

#![forbid(unsafe_code)]

use byteboard::config::Settings;
use byteboard::monitoring::metrics::Metrics;
use byteboard::networking::http_client::{fetch, HttpError};
use byteboard::networking::http_server::HttpServer;
use std::sync::Arc;
use std::time::Duration;

async fn serve_fixture(payload: &[u8]) -> (HttpServer, Arc<Metrics>, tempfile::TempDir) {
    let sandbox = tempfile::tempdir().unwrap();
    let root = sandbox.path().join("www");
    std::fs::create_dir_all(root.join("1")).unwrap();
    std::fs::write(root.join("1").join("msg"), payload).unwrap();

    let metrics = Arc::new(Metrics::new().unwrap());
    let server = HttpServer::serve(root, "127.0.0.1:0", Arc::clone(&metrics), &Settings::default())
        .await
        .unwrap();
    (server, metrics, sandbox)
}

#[tokio::test]
async fn serves_whitelisted_file_with_counters() {
    let (server, metrics, _sandbox) = serve_fixture(&[1, 2, 3]).await;
    let client = reqwest::Client::new();

    let url = format!("http://{}/1/msg", server.addr);
    let mut buf: Vec<u8> = Vec::new();
    fetch(
        &client,
        &url,
        &mut buf,
        Some(Duration::from_secs(5)),
        1024,
        &metrics,
    )
    .await
    .unwrap();

    assert_eq!(buf, vec![1, 2, 3]);
    assert_eq!(metrics.received_bytes_total.get(), 3);
    assert_eq!(metrics.sent_bytes_total.get(), 3);
    server.shutdown().await;
}

#[tokio::test]
async fn rejects_paths_outside_the_whitelist() {
    let (server, metrics, _sandbox) = serve_fixture(b"x").await;
    let client = reqwest::Client::new();

    for path in ["1/m%20sg", "1/a-b", "1/a..b", "1/msg%00"] {
        let url = format!("http://{}/{}", server.addr, path);
        let mut buf: Vec<u8> = Vec::new();
        let got = fetch(
            &client,
            &url,
            &mut buf,
            Some(Duration::from_secs(5)),
            1024,
            &metrics,
        )
        .await;
        assert!(matches!(got, Err(HttpError::Status)), "path {path} must 404");
    }
    server.shutdown().await;
}

#[tokio::test]
async fn missing_file_and_directory_are_404() {
    let (server, metrics, _sandbox) = serve_fixture(b"x").await;
    let client = reqwest::Client::new();

    for path in ["1/other", "1", "2/msg"] {
        let url = format!("http://{}/{}", server.addr, path);
        let mut buf: Vec<u8> = Vec::new();
        let got = fetch(
            &client,
            &url,
            &mut buf,
            Some(Duration::from_secs(5)),
            1024,
            &metrics,
        )
        .await;
        assert!(matches!(got, Err(HttpError::Status)), "path {path} must 404");
    }
    server.shutdown().await;
}

#[tokio::test]
async fn oversized_body_is_rejected_before_streaming() {
    let (server, metrics, _sandbox) = serve_fixture(&[0u8; 64]).await;
    let client = reqwest::Client::new();

    let url = format!("http://{}/1/msg", server.addr);
    let mut buf: Vec<u8> = Vec::new();
    let got = fetch(
        &client,
        &url,
        &mut buf,
        Some(Duration::from_secs(5)),
        63,
        &metrics,
    )
    .await;
    assert!(matches!(got, Err(HttpError::TooLarge)));
    assert!(buf.is_empty());
    server.shutdown().await;
}

#[tokio::test]
async fn unresponsive_server_times_out() {
    // Bind a listener that never answers.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let _keepalive = tokio::spawn(async move {
        // Accept and hold connections open without ever responding.
        let mut open = Vec::new();
        loop {
            if let Ok((stream, _)) = listener.accept().await {
                open.push(stream);
            }
        }
    });

    let metrics = Arc::new(Metrics::new().unwrap());
    let client = reqwest::Client::new();
    let mut buf: Vec<u8> = Vec::new();
    let got = fetch(
        &client,
        &format!("http://{addr}/1/msg"),
        &mut buf,
        Some(Duration::from_millis(100)),
        1024,
        &metrics,
    )
    .await;
    assert!(matches!(got, Err(HttpError::Timeout)));
}
