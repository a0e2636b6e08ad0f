//! End-to-end tests over loopback TCP.

use gate_event_system::EventBusBuilder;
use gate_server::protocol::{ByteCursor, Frame, FrameCodec, PacketBuilder};
use gate_server::{GateServer, ServerConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;

const READ_TIMEOUT: Duration = Duration::from_secs(5);

struct TestServer {
    server: Arc<GateServer>,
    addr: std::net::SocketAddr,
    task: JoinHandle<Result<(), gate_server::ServerError>>,
}

fn start(config: ServerConfig) -> TestServer {
    let config = ServerConfig {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        ..config
    };
    let server = Arc::new(GateServer::new(config, EventBusBuilder::new().build()).unwrap());
    let listener = server.bind().unwrap();
    let addr = listener.local_addr().unwrap();
    let serving = server.clone();
    let task = tokio::spawn(async move { serving.serve(listener).await });
    TestServer { server, addr, task }
}

struct TestClient {
    stream: TcpStream,
    cursor: ByteCursor,
    codec: FrameCodec,
}

impl TestClient {
    async fn connect(addr: std::net::SocketAddr) -> Self {
        Self {
            stream: TcpStream::connect(addr).await.unwrap(),
            cursor: ByteCursor::new(),
            codec: FrameCodec::new(),
        }
    }

    async fn send(&mut self, id: i32, body: PacketBuilder) {
        let frame = self.codec.build_frame(id, body.as_bytes()).unwrap();
        self.stream.write_all(&frame).await.unwrap();
    }

    async fn handshake(&mut self, version: i32, next: i32) {
        self.send(
            0x00,
            PacketBuilder::new()
                .varint(version)
                .string("localhost")
                .u16(25565)
                .varint(next),
        )
        .await;
    }

    /// Reads the next frame, or `None` once the server closed the stream.
    async fn recv(&mut self) -> Option<Frame> {
        loop {
            match self.codec.extract_frame(&mut self.cursor) {
                Ok(frame) => return Some(frame),
                Err(e) if e.is_underrun() => {}
                Err(e) => panic!("server sent a bad frame: {e}"),
            }
            let mut buf = [0u8; 4096];
            let n = timeout(READ_TIMEOUT, self.stream.read(&mut buf))
                .await
                .expect("timed out waiting for the server")
                .unwrap_or(0);
            if n == 0 {
                return None;
            }
            self.cursor.add(&buf[..n]);
        }
    }

    async fn recv_id(&mut self, id: i32) -> Frame {
        loop {
            let frame = self.recv().await.expect("connection closed");
            if frame.id == id {
                return frame;
            }
        }
    }

    async fn recv_chat_containing(&mut self, id: i32, needle: &str) -> String {
        loop {
            let text = chat_text(&self.recv_id(id).await);
            if text.contains(needle) {
                return text;
            }
        }
    }

    /// Logs in on protocol 47, following the compression switch.
    async fn login(&mut self, username: &str) {
        self.handshake(47, 2).await;
        self.send(0x00, PacketBuilder::new().string(username)).await;

        let set_compression = self.recv().await.unwrap();
        assert_eq!(set_compression.id, 0x03);
        let threshold = set_compression.reader().read_varint().unwrap();
        self.codec.enable_compression(threshold as usize);

        let success = self.recv().await.unwrap();
        assert_eq!(success.id, 0x02);
        let mut body = success.reader();
        assert_eq!(body.read_string().unwrap().len(), 36);
        assert_eq!(body.read_string().unwrap(), username);
    }

    async fn expect_closed(&mut self) {
        while self.recv().await.is_some() {}
    }
}

fn chat_text(frame: &Frame) -> String {
    let json = frame.reader().read_string().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    value["text"].as_str().unwrap_or_default().to_string()
}

#[tokio::test]
async fn status_request_and_ping() {
    let test = start(ServerConfig::default());
    let mut client = TestClient::connect(test.addr).await;

    client.handshake(340, 1).await;
    client.send(0x00, PacketBuilder::new()).await;
    let response = client.recv().await.unwrap();
    assert_eq!(response.id, 0x00);
    let status: serde_json::Value =
        serde_json::from_str(&response.reader().read_string().unwrap()).unwrap();
    assert_eq!(status["version"]["protocol"], 340);
    assert_eq!(status["players"]["max"], 100);
    assert_eq!(status["players"]["online"], 0);
    assert!(status["description"].as_str().unwrap().contains("Gatekeeper"));

    client.send(0x01, PacketBuilder::new().i64(-42)).await;
    let pong = client.recv().await.unwrap();
    assert_eq!(pong.id, 0x01);
    assert_eq!(pong.reader().read_i64().unwrap(), -42);
    client.expect_closed().await;

    test.server.shutdown();
    test.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn login_delivers_compressed_join_sequence() {
    let test = start(ServerConfig::default());
    let mut client = TestClient::connect(test.addr).await;
    client.login("alice").await;

    assert_eq!(client.recv().await.unwrap().id, 0x01, "join_game");
    assert_eq!(client.recv().await.unwrap().id, 0x08, "position");

    // larger than the threshold, so this one arrived compressed
    let chunk = client.recv().await.unwrap();
    assert_eq!(chunk.id, 0x21);
    assert!(chunk.body.len() > 256);
    let mut body = chunk.reader();
    assert_eq!(body.read_i32().unwrap(), 0);
    assert_eq!(body.read_i32().unwrap(), 0);
    assert!(body.read_bool().unwrap());

    client.recv_chat_containing(0x02, "Welcome").await;
    assert_eq!(test.server.roster().usernames(), vec!["alice".to_string()]);

    drop(client);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(test.server.roster().is_empty());

    test.server.shutdown();
    test.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn chat_fans_out_to_every_player() {
    let test = start(ServerConfig::default());
    let mut alice = TestClient::connect(test.addr).await;
    alice.login("alice").await;
    let mut bob = TestClient::connect(test.addr).await;
    bob.login("bob").await;

    alice.recv_chat_containing(0x02, "bob joined on server!").await;
    alice.send(0x01, PacketBuilder::new().string("hi bob")).await;

    assert_eq!(bob.recv_chat_containing(0x02, "hi bob").await, "<alice> hi bob");
    assert_eq!(alice.recv_chat_containing(0x02, "hi bob").await, "<alice> hi bob");

    drop(bob);
    alice.recv_chat_containing(0x02, "bob left the server!").await;

    test.server.shutdown();
    test.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn shutdown_kicks_connected_players() {
    let test = start(ServerConfig::default());
    let mut client = TestClient::connect(test.addr).await;
    client.login("carol").await;
    client.recv_chat_containing(0x02, "Welcome").await;

    test.server.shutdown();
    let disconnect = client.recv_id(0x40).await;
    assert_eq!(chat_text(&disconnect), "Server stopped");
    client.expect_closed().await;

    test.task.await.unwrap().unwrap();
    assert_eq!(test.server.active_connections(), 0);
}

#[tokio::test]
async fn protocol_error_kicks_with_reason() {
    let test = start(ServerConfig::default());
    let mut client = TestClient::connect(test.addr).await;
    client.login("dave").await;

    client.send(0x7F, PacketBuilder::new()).await;
    let disconnect = client.recv_id(0x40).await;
    assert!(chat_text(&disconnect).starts_with("Protocol Error!\n\nNo name known for packet"));
    client.expect_closed().await;

    test.server.shutdown();
    test.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn slow_login_is_kicked() {
    let test = start(ServerConfig {
        login_timeout: Duration::from_millis(200),
        ..ServerConfig::default()
    });
    let mut client = TestClient::connect(test.addr).await;
    client.handshake(47, 2).await;

    let disconnect = client.recv().await.unwrap();
    assert_eq!(disconnect.id, 0x00);
    assert_eq!(chat_text(&disconnect), "Took too long to log in!");
    client.expect_closed().await;

    test.server.shutdown();
    test.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn connections_over_the_limit_are_refused() {
    let test = start(ServerConfig {
        max_connections: 1,
        ..ServerConfig::default()
    });
    let mut first = TestClient::connect(test.addr).await;
    first.handshake(47, 1).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(test.server.active_connections(), 1);

    let mut second = TestClient::connect(test.addr).await;
    second.expect_closed().await;

    test.server.shutdown();
    test.task.await.unwrap().unwrap();
}
