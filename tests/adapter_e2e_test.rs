use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::oneshot;

use tile_swap::adapter::protocol::create_hello;
use tile_swap::adapter::server::{run_server, ServerConfig};
use tile_swap::core::{Grid, Palettes, Session};
use tile_swap::engine::{Engine, EngineConfig, EngineHandle};
use tile_swap::types::PaletteMode;

struct Client {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn connect(addr: std::net::SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect failed");
        let (read_half, writer) = stream.into_split();
        Self {
            lines: BufReader::new(read_half).lines(),
            writer,
        }
    }

    async fn send(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
        self.writer.flush().await.unwrap();
    }

    async fn recv(&mut self) -> serde_json::Value {
        let line = tokio::time::timeout(Duration::from_secs(2), self.lines.next_line())
            .await
            .expect("timed out waiting for a line")
            .unwrap()
            .expect("connection closed");
        serde_json::from_str(&line).unwrap()
    }

    /// Skip streamed events until a message of `kind` arrives
    async fn recv_type(&mut self, kind: &str) -> serde_json::Value {
        loop {
            let v = self.recv().await;
            if v["type"] == kind {
                return v;
            }
        }
    }
}

async fn start(config: EngineConfig) -> (std::net::SocketAddr, EngineHandle) {
    let grid = Grid::from_letters(&["AABC", "BCAD", "CDBE", "DEDB"]).unwrap();
    let session = Session::with_grid(grid, Palettes::default_names(), 3).unwrap();
    let (engine, handle) = Engine::with_session(config, session);
    tokio::spawn(engine.run());

    let server_config = ServerConfig {
        port: 0,
        ..ServerConfig::default()
    };
    let (ready_tx, ready_rx) = oneshot::channel();
    let server_handle = handle.clone();
    tokio::spawn(async move {
        let _ = run_server(server_config, server_handle, Some(ready_tx)).await;
    });

    let addr = tokio::time::timeout(Duration::from_secs(2), ready_rx)
        .await
        .expect("server did not signal ready")
        .expect("ready channel dropped");
    (addr, handle)
}

#[tokio::test]
async fn adapter_handshake_swap_and_cascade() {
    let (addr, _handle) = start(EngineConfig {
        auto_falls: false,
        ..EngineConfig::instant()
    })
    .await;
    let mut client = Client::connect(addr).await;

    let hello = serde_json::to_string(&create_hello(1, "e2e-test", "1.0.0")).unwrap();
    client.send(&hello).await;

    let welcome = client.recv_type("welcome").await;
    assert_eq!(welcome["seq"], 1);
    assert_eq!(welcome["width"], 4);
    assert_eq!(welcome["palette_size"], 5);

    let obs = client.recv_type("observation").await;
    assert_eq!(obs["kinds"][0][0], "sun");
    assert_eq!(obs["settled"], true);

    client
        .send(r#"{"type":"can_swap","seq":2,"from":{"x":0,"y":0},"to":{"x":1,"y":1}}"#)
        .await;
    let can = client.recv_type("can_swap_result").await;
    assert_eq!(can["seq"], 2);
    assert_eq!(can["allowed"], false);

    client
        .send(r#"{"type":"swap","seq":3,"from":{"x":2,"y":1},"to":{"x":2,"y":0}}"#)
        .await;

    // Answer every fall until the grid settles.
    let mut seq = 3;
    let mut saw_result = false;
    let mut rewards = 0;
    loop {
        let v = client.recv().await;
        match v["type"].as_str().unwrap() {
            "swap_result" => {
                assert_eq!(v["seq"], 3);
                assert_eq!(v["accepted"], true);
                assert_eq!(v["matched"].as_array().unwrap().len(), 3);
                saw_result = true;
            }
            "event" => match v["event"].as_str().unwrap() {
                "token_moved" | "token_spawned" => {
                    seq += 1;
                    let line = format!(
                        r#"{{"type":"fall_complete","seq":{},"fall":{}}}"#,
                        seq, v["fall"]
                    );
                    client.send(&line).await;
                }
                "tokens_matched" => {
                    assert!(v["kind"].is_string());
                    rewards += 1;
                }
                "grid_settled" => break,
                _ => {}
            },
            _ => {}
        }
    }
    assert!(saw_result);
    assert!(rewards >= 1);

    let settled = client.recv_type("observation").await;
    assert_eq!(settled["settled"], true);
    assert_eq!(settled["swap_count"], 1);
    assert_eq!(settled["state_hash"].as_str().unwrap().len(), 16);
}

#[tokio::test]
async fn adapter_rejects_bad_requests() {
    let (addr, _handle) = start(EngineConfig::instant()).await;
    let mut client = Client::connect(addr).await;

    // Anything before hello is refused.
    client.send(r#"{"type":"toggle_mode","seq":1}"#).await;
    let err = client.recv().await;
    assert_eq!(err["type"], "error");
    assert_eq!(err["code"], "handshake_required");

    client
        .send(r#"{"type":"hello","seq":2,"client":{"name":"t","version":"0"},"protocol_version":"1.0.0","stream_events":false}"#)
        .await;
    assert_eq!(client.recv().await["type"], "welcome");

    client
        .send(r#"{"type":"swap","seq":3,"from":{"x":0,"y":0},"to":{"x":2,"y":0}}"#)
        .await;
    let err = client.recv().await;
    assert_eq!(err["code"], "not_adjacent");
    assert_eq!(err["seq"], 3);

    client
        .send(r#"{"type":"swap","seq":4,"from":{"x":3,"y":3},"to":{"x":4,"y":3}}"#)
        .await;
    assert_eq!(client.recv().await["code"], "out_of_bounds");

    // Replayed seq.
    client.send(r#"{"type":"snapshot","seq":4}"#).await;
    assert_eq!(client.recv().await["code"], "invalid_command");

    client.send(r#"{"type":"spin","seq":5}"#).await;
    assert_eq!(client.recv().await["code"], "invalid_command");

    client.send(r#"{"type":"toggle_mode","seq":6}"#).await;
    let ack = client.recv().await;
    assert_eq!(ack["type"], "ack");
    assert_eq!(ack["mode"], "hidden");

    client.send(r#"{"type":"snapshot","seq":7}"#).await;
    let obs = client.recv().await;
    assert_eq!(obs["type"], "observation");
    assert_eq!(obs["seq"], 7);
    assert_eq!(obs["mode"], "hidden");
    assert_eq!(obs["kinds"][0][0], "moon");
}

#[tokio::test]
async fn adapter_rejects_protocol_mismatch() {
    let (addr, _handle) = start(EngineConfig::instant()).await;
    let mut client = Client::connect(addr).await;

    let hello = serde_json::to_string(&create_hello(1, "old", "2.0.0")).unwrap();
    client.send(&hello).await;
    let err = client.recv().await;
    assert_eq!(err["code"], "protocol_mismatch");
}

#[tokio::test]
async fn adapter_disconnect_mid_cascade_releases_falls() {
    let (addr, handle) = start(EngineConfig {
        auto_falls: false,
        ..EngineConfig::instant()
    })
    .await;
    let mut client = Client::connect(addr).await;

    let hello = serde_json::to_string(&create_hello(1, "leaver", "1.0.0")).unwrap();
    client.send(&hello).await;
    client.recv_type("welcome").await;

    client
        .send(r#"{"type":"swap","seq":2,"from":{"x":2,"y":1},"to":{"x":2,"y":0}}"#)
        .await;
    let result = client.recv_type("swap_result").await;
    assert_eq!(result["accepted"], true);

    // Leave with the first pass's falls unreported.
    loop {
        let v = client.recv().await;
        if v["event"] == "token_moved" || v["event"] == "token_spawned" {
            break;
        }
    }
    assert!(handle.outstanding_falls() > 0);
    drop(client);

    let mode = tokio::time::timeout(Duration::from_secs(2), handle.toggle_mode())
        .await
        .expect("engine stayed blocked on a departed client")
        .unwrap();
    assert_eq!(mode, PaletteMode::Hidden);
    assert_eq!(handle.outstanding_falls(), 0);
    assert!(handle.observe().snapshot.settled);
}

#[tokio::test]
async fn adapter_non_streaming_swap_does_not_wait_for_falls() {
    let (addr, handle) = start(EngineConfig {
        auto_falls: false,
        ..EngineConfig::instant()
    })
    .await;
    let mut client = Client::connect(addr).await;

    client
        .send(r#"{"type":"hello","seq":1,"client":{"name":"t","version":"0"},"protocol_version":"1.0.0","stream_events":false}"#)
        .await;
    assert_eq!(client.recv().await["type"], "welcome");

    client
        .send(r#"{"type":"swap","seq":2,"from":{"x":2,"y":1},"to":{"x":2,"y":0}}"#)
        .await;
    let result = client.recv().await;
    assert_eq!(result["type"], "swap_result");
    assert_eq!(result["accepted"], true);

    client.send(r#"{"type":"toggle_mode","seq":3}"#).await;
    let ack = client.recv().await;
    assert_eq!(ack["type"], "ack");
    assert_eq!(ack["mode"], "hidden");
    assert_eq!(handle.outstanding_falls(), 0);
}
