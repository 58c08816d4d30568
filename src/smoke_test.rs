//! End-to-end tests driving a real relay over TCP
//!
//! Each test binds a server on an ephemeral port, serves it from a spawned
//! task, and exercises the documented routes with [`RelayClient`]s the way
//! a console front-end would.

use std::net::SocketAddr;
use std::time::Duration;

use tempfile::TempDir;

use crate::error::RelayError;
use crate::protocol::messages::ClientIdentity;
use crate::{RelayClient, RelayConfig, RelayServer};

async fn spawn_relay(mut config: RelayConfig) -> (SocketAddr, TempDir) {
    let dir = TempDir::new().expect("temp dir");
    config.bind_addr = "127.0.0.1:0".parse().unwrap();
    config.files_dir = dir.path().to_path_buf();

    let server = RelayServer::bind(config).await.expect("bind relay");
    let addr = server.local_addr();
    tokio::spawn(server.serve());
    (addr, dir)
}

#[tokio::test]
async fn test_connect_replay_end_to_end() {
    let (addr, _dir) = spawn_relay(RelayConfig::default()).await;

    // A joins an empty room and gets an empty reply
    let a = RelayClient::new(addr, "A");
    assert_eq!(a.connect().await.unwrap(), "");

    a.send("hi").await.unwrap();

    // B joins afterward; its connect reply carries the history
    let b = RelayClient::new(addr, "B");
    assert_eq!(b.connect().await.unwrap(), "A: hi");

    // Subsequent polls from both are empty until a new message arrives
    assert!(a.get_update().await.unwrap().is_none());
    assert!(b.get_update().await.unwrap().is_none());

    b.send("hello back").await.unwrap();
    assert_eq!(a.get_update().await.unwrap().as_deref(), Some("B: hello back"));
    // The relay does not filter senders; B polls its own message back and
    // the console front-end is the one expected to drop it
    assert_eq!(b.get_update().await.unwrap().as_deref(), Some("B: hello back"));
    assert!(b.get_update().await.unwrap().is_none());
}

#[tokio::test]
async fn test_private_message_delivered_once() {
    let (addr, _dir) = spawn_relay(RelayConfig::default()).await;

    let alice = RelayClient::new(addr, "alice");
    let bob = RelayClient::new(addr, "bob");
    alice.connect().await.unwrap();
    bob.connect().await.unwrap();

    alice.send_line("@bob hello").await.unwrap();

    assert_eq!(
        bob.get_update().await.unwrap().as_deref(),
        Some("***alice***: hello")
    );
    // Immediate second poll yields empty
    assert!(bob.get_update().await.unwrap().is_none());
}

#[tokio::test]
async fn test_file_relay_end_to_end() {
    let (addr, dir) = spawn_relay(RelayConfig::default()).await;

    let alice = RelayClient::new(addr, "alice");
    let bob = RelayClient::new(addr, "bob");
    alice.connect().await.unwrap();
    bob.connect().await.unwrap();

    let filename = alice.send_file("123", "txt", b"0123456789").await.unwrap();
    assert_eq!(filename, "alice-123.txt");

    let (name, bytes) = bob.get_file().await.unwrap().expect("pending file");
    assert_eq!(name, "alice-123.txt");
    assert_eq!(&bytes[..], b"0123456789");

    // Same client fetching again gets nothing
    assert!(bob.get_file().await.unwrap().is_none());

    // Artifact bytes were mirrored to the configured directory
    let on_disk = std::fs::read(dir.path().join("alice-123.txt")).unwrap();
    assert_eq!(on_disk, b"0123456789");
}

#[tokio::test]
async fn test_reconnect_resumes_at_cursor() {
    let (addr, _dir) = spawn_relay(RelayConfig::default()).await;

    let a = RelayClient::new(addr, "A");
    let b = RelayClient::new(addr, "B");
    a.connect().await.unwrap();
    b.connect().await.unwrap();

    b.send("one").await.unwrap();
    assert_eq!(a.get_update().await.unwrap().as_deref(), Some("B: one"));

    a.close().await.unwrap();
    b.send("two").await.unwrap();

    // Reconnecting with the same identity replays only what A missed
    let a_again = RelayClient::with_identity(addr, a.identity().clone());
    assert_eq!(a_again.connect().await.unwrap(), "B: two");
    assert!(a_again.get_update().await.unwrap().is_none());
}

#[tokio::test]
async fn test_rate_limit_over_the_wire() {
    let config = RelayConfig {
        message_limit: 2,
        rate_window: Duration::from_secs(3600),
        ..Default::default()
    };
    let (addr, _dir) = spawn_relay(config).await;

    let alice = RelayClient::new(addr, "alice");
    alice.connect().await.unwrap();

    alice.send("one").await.unwrap();
    alice.send("two").await.unwrap();
    let err = alice.send("three").await.unwrap_err();
    assert!(matches!(err, RelayError::RateLimited(_)));
}

#[tokio::test]
async fn test_close_unknown_identity_fails() {
    let (addr, _dir) = spawn_relay(RelayConfig::default()).await;

    let ghost = RelayClient::with_identity(addr, ClientIdentity::new("ghost", "never-connected"));
    let err = ghost.close().await.unwrap_err();
    assert!(matches!(err, RelayError::NotFound(_)));
}

#[tokio::test]
async fn test_status_reports_connected_count() {
    let (addr, _dir) = spawn_relay(RelayConfig::default()).await;

    let alice = RelayClient::new(addr, "alice");
    let bob = RelayClient::new(addr, "bob");

    assert!(alice.status().await.unwrap().contains("0 user/s"));

    alice.connect().await.unwrap();
    bob.connect().await.unwrap();
    assert!(alice.status().await.unwrap().contains("2 user/s"));

    bob.close().await.unwrap();
    assert!(alice.status().await.unwrap().contains("1 user/s"));
}

#[tokio::test]
async fn test_malformed_request_gets_error_and_server_survives() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let (addr, _dir) = spawn_relay(RelayConfig::default()).await;

    // Garbage request line
    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    stream.write_all(b"BOGUS\r\n").await.unwrap();
    stream.shutdown().await.unwrap();
    let mut reply = String::new();
    stream.read_to_string(&mut reply).await.unwrap();
    assert!(reply.starts_with("HTTP/1.1 400"));

    // The accept loop is still alive
    let alice = RelayClient::new(addr, "alice");
    alice.connect().await.unwrap();
    assert!(alice.status().await.unwrap().contains("1 user/s"));
}
