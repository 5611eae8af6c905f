//! Session lifecycle tests against a real listener on 127.0.0.1.

use anyhow::Result;
use lanshare_core::{SessionConfig, SessionState, ShareError, ShareSession, SharedPath};
use std::io::{Cursor, Read};
use std::net::{IpAddr, Ipv4Addr};
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .try_init()
        .ok();
}

/// `hello.txt` (17 bytes) and `docs/` with a 10 and a 20 byte file
fn share_tree(dir: &std::path::Path) -> Vec<SharedPath> {
    std::fs::write(dir.join("hello.txt"), b"Hello, LAN share!").unwrap();
    std::fs::create_dir_all(dir.join("docs")).unwrap();
    std::fs::write(dir.join("docs/a.txt"), b"0123456789").unwrap();
    std::fs::write(dir.join("docs/b.txt"), b"abcdefghijklmnopqrst").unwrap();

    vec![
        SharedPath::new(dir.join("hello.txt")).unwrap(),
        SharedPath::new(dir.join("docs")).unwrap(),
    ]
}

fn local_config() -> SessionConfig {
    SessionConfig {
        host: LOCALHOST,
        port: 0,
        ..Default::default()
    }
}

async fn wait_stopped(session: &ShareSession, limit: Duration) {
    tokio::time::timeout(limit, session.wait())
        .await
        .expect("session did not stop in time");
}

#[tokio::test]
async fn test_start_download_stop() -> Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let session = ShareSession::new(share_tree(dir.path()), local_config())?;

    let addr = session.start().await?;
    assert_eq!(session.state(), SessionState::Running);
    assert_ne!(addr.port(), 0);
    assert_eq!(session.local_addr(), Some(addr));

    let base = format!("http://{}", addr);
    let client = reqwest::Client::new();

    let response = client.get(format!("{}/download/hello.txt", base)).send().await?;
    assert_eq!(response.status(), 200);
    let body = response.bytes().await?;
    assert_eq!(body.len(), 17);
    assert_eq!(&body[..], b"Hello, LAN share!");

    let response = client.get(format!("{}/download/docs.zip", base)).send().await?;
    assert_eq!(response.status(), 200);
    let data = response.bytes().await?.to_vec();
    let mut archive = zip::ZipArchive::new(Cursor::new(data))?;
    let mut content = String::new();
    archive.by_name("b.txt")?.read_to_string(&mut content)?;
    assert_eq!(content, "abcdefghijklmnopqrst");
    assert_eq!(archive.len(), 2);

    let status: serde_json::Value = client
        .get(format!("{}/api/status", base))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(status["status"], "running");
    assert_eq!(status["port"], addr.port());
    assert_eq!(status["files_count"], 2);
    assert_eq!(status["total_downloads"], 2);
    assert_eq!(status["total_requests"], 3);
    assert_eq!(status["unique_clients"], 1);

    let report = session.status().await.expect("status while running");
    assert_eq!(report.total_downloads, 2);

    session.stop().await;
    assert_eq!(session.state(), SessionState::Stopped);
    assert!(session.status().await.is_none());

    // Idempotent
    session.stop().await;
    assert_eq!(session.state(), SessionState::Stopped);

    let after = reqwest::Client::new()
        .get(format!("{}/api/status", base))
        .send()
        .await;
    assert!(after.is_err(), "server should refuse connections after stop");
    Ok(())
}

#[tokio::test]
async fn test_shutdown_endpoint_from_loopback() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let session = ShareSession::new(share_tree(dir.path()), local_config())?;
    let addr = session.start().await?;

    let response = reqwest::get(format!("http://{}/shutdown", addr)).await?;
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await?, "Server shutting down...");

    wait_stopped(&session, Duration::from_secs(10)).await;
    assert_eq!(session.state(), SessionState::Stopped);

    let after = reqwest::Client::new()
        .get(format!("http://{}/api/status", addr))
        .send()
        .await;
    assert!(after.is_err());
    Ok(())
}

#[tokio::test]
async fn test_timeout_stops_session() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config = SessionConfig {
        timeout: Some(Duration::from_secs(2)),
        ..local_config()
    };
    let session = ShareSession::new(share_tree(dir.path()), config)?;

    let started = Instant::now();
    session.start().await?;
    assert_eq!(session.state(), SessionState::Running);

    wait_stopped(&session, Duration::from_secs(10)).await;
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(1900), "stopped too early: {:?}", elapsed);
    assert_eq!(session.state(), SessionState::Stopped);
    Ok(())
}

#[tokio::test]
async fn test_stop_before_timeout() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config = SessionConfig {
        timeout: Some(Duration::from_secs(600)),
        ..local_config()
    };
    let session = ShareSession::new(share_tree(dir.path()), config)?;
    session.start().await?;

    let started = Instant::now();
    session.stop().await;
    assert_eq!(session.state(), SessionState::Stopped);
    assert!(started.elapsed() < Duration::from_secs(10));
    Ok(())
}

#[tokio::test]
async fn test_bind_failure_returns_to_stopped() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let taken = tokio::net::TcpListener::bind((LOCALHOST, 0)).await?;
    let port = taken.local_addr()?.port();

    let config = SessionConfig {
        port,
        ..local_config()
    };
    let session = ShareSession::new(share_tree(dir.path()), config)?;

    match session.start().await {
        Err(ShareError::Bind { addr, .. }) => assert_eq!(addr.port(), port),
        other => panic!("expected bind error, got {:?}", other),
    }
    assert_eq!(session.state(), SessionState::Stopped);
    Ok(())
}

#[tokio::test]
async fn test_start_twice_returns_same_address() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let session = ShareSession::new(share_tree(dir.path()), local_config())?;

    let first = session.start().await?;
    let second = session.start().await?;
    assert_eq!(first, second);

    session.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_one_time_over_http() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config = SessionConfig {
        one_time: true,
        password: Some("hunter2".to_string()),
        ..local_config()
    };
    let session = ShareSession::new(share_tree(dir.path()), config)?;
    let addr = session.start().await?;
    let token = session.access_token().expect("token").to_string();
    let client = reqwest::Client::new();

    let url = format!("http://{}/download/hello.txt", addr);
    let denied = client.get(&url).send().await?;
    assert_eq!(denied.status(), 401);

    let with_token = format!("{}?token={}", url, token);
    let (a, b) = tokio::join!(
        client.get(&with_token).send(),
        client.get(&with_token).send()
    );
    let mut statuses = vec![a?.status().as_u16(), b?.status().as_u16()];
    statuses.sort();
    assert_eq!(statuses, vec![200, 410]);

    let again = client.get(&with_token).send().await?;
    assert_eq!(again.status(), 410);

    session.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_stop_cuts_off_slow_download() -> Result<()> {
    const SIZE: usize = 64 * 1024 * 1024;
    let dir = tempfile::tempdir()?;
    let big = dir.path().join("big.bin");
    std::fs::write(&big, vec![7u8; SIZE])?;

    let config = SessionConfig {
        shutdown_grace: Duration::from_millis(200),
        ..local_config()
    };
    let session = ShareSession::new(vec![SharedPath::new(&big)?], config)?;
    let addr = session.start().await?;

    // A client that reads a little and then stalls
    let mut stream = tokio::net::TcpStream::connect(addr).await?;
    stream
        .write_all(b"GET /download/big.bin HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await?;
    let mut buf = vec![0u8; 4096];
    let mut received = stream.read(&mut buf).await?;
    assert!(received > 0);

    tokio::time::timeout(Duration::from_secs(10), session.stop()).await?;
    assert_eq!(session.state(), SessionState::Stopped);

    // Only what was already buffered may still arrive
    let drain = async {
        loop {
            match stream.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => received += n,
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(30), drain).await?;
    assert!(
        received < SIZE,
        "transfer kept running after stop: {} bytes received",
        received
    );
    Ok(())
}
