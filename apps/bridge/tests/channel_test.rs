use nowplaying_bridge::ChannelServer;
use nowplaying_core::test_utils::{FakeLauncher, FakeListenerSettings, FakeRegistry, FakeSession};
use nowplaying_core::{
    ComponentName, MediaBridge, RawMetadata, RegistryError, Session, SessionRegistry,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

const LISTENER: &str = "cc.koto.fluent_lyrics/.MediaSessionListenerService";

fn listener() -> ComponentName {
    LISTENER.parse().unwrap()
}

fn server_with(registry: Arc<dyn SessionRegistry>, timeout: Duration) -> ChannelServer {
    let bridge = MediaBridge::from_parts(
        registry,
        Arc::new(FakeListenerSettings::new(Some(LISTENER))),
        Arc::new(FakeLauncher::default()),
        listener(),
    );
    ChannelServer::new(Arc::new(bridge), timeout)
}

/// Registry that blocks before answering, like a wedged system service
struct SlowRegistry {
    delay: Duration,
    inner: FakeRegistry,
}

impl SessionRegistry for SlowRegistry {
    fn active_sessions(&self, listener: &ComponentName) -> Result<Vec<Session>, RegistryError> {
        std::thread::sleep(self.delay);
        self.inner.active_sessions(listener)
    }
}

async fn exchange(server: ChannelServer, input: &str) -> Vec<Value> {
    let (client, server_end) = tokio::io::duplex(64 * 1024);
    let (server_read, server_write) = tokio::io::split(server_end);
    let handle = tokio::spawn(async move { server.serve(server_read, server_write).await });

    let (client_read, mut client_write) = tokio::io::split(client);
    client_write.write_all(input.as_bytes()).await.unwrap();
    client_write.shutdown().await.unwrap();

    let mut lines = BufReader::new(client_read).lines();
    let mut responses = Vec::new();
    while let Some(line) = lines.next_line().await.unwrap() {
        responses.push(serde_json::from_str(&line).unwrap());
    }

    handle.await.unwrap().unwrap();
    responses
}

#[tokio::test]
async fn test_serves_requests_in_order() {
    let session = FakeSession::playing("com.music")
        .with_metadata(RawMetadata {
            title: Some("Song".into()),
            artist: Some("Band".into()),
            album: None,
            duration_ms: Some(180_000),
        })
        .with_position(42_000);
    let registry = Arc::new(FakeRegistry::with_sessions(vec![session.clone()]));
    let server = server_with(registry, Duration::from_secs(5));

    let input = concat!(
        r#"{"id":1,"method":"checkPermission"}"#,
        "\n",
        r#"{"id":2,"method":"getPosition"}"#,
        "\n",
        "\n",
        r#"{"id":3,"method":"getMetadata"}"#,
        "\n",
        r#"{"id":4,"method":"playPause"}"#,
        "\n",
    );
    let responses = exchange(server, input).await;

    assert_eq!(responses.len(), 4);
    assert_eq!(responses[0], json!({"id": 1, "result": true}));
    assert_eq!(responses[1], json!({"id": 2, "result": 42000}));
    assert_eq!(responses[2]["id"], json!(3));
    assert_eq!(responses[2]["result"]["title"], json!("Song"));
    assert_eq!(responses[2]["result"]["duration"], json!(180000));
    assert!(responses[2]["result"].get("durationMs").is_none());
    assert_eq!(responses[3], json!({"id": 4, "result": true}));
    assert_eq!(session.sent().len(), 1);
}

#[tokio::test]
async fn test_unknown_method_and_bad_line() {
    let registry = Arc::new(FakeRegistry::with_sessions(vec![]));
    let server = server_with(registry.clone(), Duration::from_secs(5));

    let input = concat!(
        r#"{"id":"x","method":"getLyrics"}"#,
        "\n",
        "{broken\n",
        r#"{"id":"y","method":"getStatus"}"#,
        "\n",
    );
    let responses = exchange(server, input).await;

    assert_eq!(responses.len(), 3);
    assert_eq!(responses[0], json!({"id": "x", "notImplemented": true}));
    assert_eq!(responses[1]["error"]["code"], json!("bad_request"));
    assert_eq!(responses[2], json!({"id": "y", "result": null}));
    // Only getStatus reached the registry
    assert_eq!(registry.calls(), 1);
}

#[tokio::test]
async fn test_slow_registry_answers_with_fallback() {
    let registry = Arc::new(SlowRegistry {
        delay: Duration::from_millis(300),
        inner: FakeRegistry::with_sessions(vec![FakeSession::playing("com.music")]),
    });
    let server = server_with(registry, Duration::from_millis(50));

    let status = server.handle_line(r#"{"id":1,"method":"getStatus"}"#).await;
    let playing = server.handle_line(r#"{"id":2,"method":"isPlaying"}"#).await;
    let position = server.handle_line(r#"{"id":3,"method":"getPosition"}"#).await;

    assert_eq!(serde_json::to_value(&status).unwrap(), json!({"id": 1, "result": null}));
    assert_eq!(serde_json::to_value(&playing).unwrap(), json!({"id": 2, "result": false}));
    assert_eq!(serde_json::to_value(&position).unwrap(), json!({"id": 3, "result": 0}));
}

#[tokio::test]
async fn test_permission_denied_degrades_to_empty() {
    let registry = Arc::new(FakeRegistry::denied());
    let server = server_with(registry, Duration::from_secs(5));

    let responses = exchange(
        server,
        "{\"id\":1,\"method\":\"getStatus\"}\n{\"id\":2,\"method\":\"nextTrack\"}\n",
    )
    .await;

    assert_eq!(responses[0], json!({"id": 1, "result": null}));
    assert_eq!(responses[1], json!({"id": 2, "result": false}));
}

#[tokio::test]
async fn test_oversized_line_is_rejected_and_serving_continues() {
    let registry = Arc::new(FakeRegistry::with_sessions(vec![FakeSession::playing("com.music")]));
    let server = server_with(registry.clone(), Duration::from_secs(5));

    let mut input = format!(r#"{{"id":1,"method":"{}"}}"#, "x".repeat(70 * 1024));
    input.push('\n');
    input.push_str(r#"{"id":2,"method":"isPlaying"}"#);
    input.push('\n');
    let responses = exchange(server, &input).await;

    assert_eq!(responses.len(), 2);
    assert_eq!(
        responses[0],
        json!({"error": {"code": "bad_request", "message": "request too long"}})
    );
    assert_eq!(responses[1], json!({"id": 2, "result": true}));
    assert_eq!(registry.calls(), 1);
}
