//! End-to-end session tests: real TCP connections against an in-process
//! server, with the log producer replaced by a channel-backed publisher.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use skywatch_connection::Registry;
use skywatch_protocol::MetricEnvelope;
use skywatch_queue::{Publisher, QueueError};
use skywatch_server::config::TcpServerConfig;
use skywatch_server::server::WorkerPoolServer;
use skywatch_timer::TimerManager;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;

struct CapturePublisher {
    tx: mpsc::UnboundedSender<(String, Vec<u8>)>,
}

#[async_trait]
impl Publisher for CapturePublisher {
    async fn publish(&self, key: &str, value: Vec<u8>) -> Result<(), QueueError> {
        let _ = self.tx.send((key.to_string(), value));
        Ok(())
    }
}

struct TestServer {
    server: Arc<WorkerPoolServer>,
    registry: Arc<Registry>,
    timers: Arc<TimerManager>,
    addr: SocketAddr,
    published: mpsc::UnboundedReceiver<(String, Vec<u8>)>,
}

fn test_config() -> TcpServerConfig {
    TcpServerConfig {
        port: 0,
        max_connections: 100,
        identify_timeout: Duration::from_secs(2),
        inactivity_timeout: Duration::from_secs(30),
        worker_count: 2,
        job_queue_size: 64,
        use_worker_pool: true,
    }
}

async fn start_server(config: TcpServerConfig) -> TestServer {
    let (tx, published) = mpsc::unbounded_channel();
    let registry = Arc::new(Registry::new(config.max_connections));
    let timers = TimerManager::new(2);
    timers.start();

    let server = WorkerPoolServer::new(
        config,
        registry.clone(),
        timers.clone(),
        Arc::new(CapturePublisher { tx }),
    );
    let bound = server.start().await.expect("server should start");
    let addr = SocketAddr::from(([127, 0, 0, 1], bound.port()));

    TestServer {
        server,
        registry,
        timers,
        addr,
        published,
    }
}

async fn connect(addr: SocketAddr) -> (BufReader<tokio::net::tcp::OwnedReadHalf>, tokio::net::tcp::OwnedWriteHalf) {
    let socket = TcpStream::connect(addr).await.expect("connect failed");
    let (read_half, write_half) = socket.into_split();
    (BufReader::new(read_half), write_half)
}

async fn read_line(
    reader: &mut BufReader<tokio::net::tcp::OwnedReadHalf>,
) -> Option<String> {
    let mut line = String::new();
    let n = timeout(Duration::from_secs(5), reader.read_line(&mut line))
        .await
        .expect("timed out waiting for a server frame")
        .expect("read failed");
    if n == 0 {
        None
    } else {
        Some(line.trim_end().to_string())
    }
}

async fn wait_for_count(registry: &Registry, expected: usize) {
    for _ in 0..100 {
        if registry.count() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!(
        "registry never reached {expected} sessions (currently {})",
        registry.count()
    );
}

const IDENTIFY: &str = r#"{"type":"identify","zipcode":"90210","city":"Beverly Hills"}"#;
const METRICS: &str = r#"{"type":"metrics","data":{"timestamp":"2025-10-26T13:30:00Z","temperature":25.3,"humidity":62.5,"precipitation":0.0,"wind_speed":15.2,"wind_direction":"NW","pollution_index":45.0,"pollen_index":3.2}}"#;

#[tokio::test(flavor = "multi_thread")]
async fn identified_client_pushes_metrics_onto_the_log() {
    let mut ts = start_server(test_config()).await;
    let (mut reader, mut writer) = connect(ts.addr).await;

    writer.write_all(IDENTIFY.as_bytes()).await.unwrap();
    writer.write_all(b"\n").await.unwrap();
    assert_eq!(
        read_line(&mut reader).await.as_deref(),
        Some(r#"{"type":"ack","status":"identified"}"#)
    );
    wait_for_count(&ts.registry, 1).await;

    writer.write_all(METRICS.as_bytes()).await.unwrap();
    writer.write_all(b"\n").await.unwrap();

    let (key, value) = timeout(Duration::from_secs(5), ts.published.recv())
        .await
        .expect("no sample published")
        .expect("publisher channel closed");
    assert_eq!(key, "90210");

    let envelope = MetricEnvelope::decode(&value).unwrap();
    assert_eq!(envelope.zipcode, "90210");
    assert_eq!(envelope.city, "Beverly Hills");
    assert_eq!(envelope.data.temperature, Some(25.3));
    assert_eq!(envelope.data.timestamp, "2025-10-26T13:30:00Z");
    assert!(!envelope.connection_id.is_empty());

    // Metrics are never acked; a keepalive is.
    writer.write_all(b"{\"type\":\"keepalive\"}\n").await.unwrap();
    assert_eq!(
        read_line(&mut reader).await.as_deref(),
        Some(r#"{"type":"ack","status":"alive"}"#)
    );

    ts.server.stop().await;
    ts.timers.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn inline_mode_preserves_the_protocol_contract() {
    let mut ts = start_server(TcpServerConfig {
        use_worker_pool: false,
        ..test_config()
    })
    .await;
    let (mut reader, mut writer) = connect(ts.addr).await;

    writer.write_all(IDENTIFY.as_bytes()).await.unwrap();
    writer.write_all(b"\n").await.unwrap();
    assert_eq!(
        read_line(&mut reader).await.as_deref(),
        Some(r#"{"type":"ack","status":"identified"}"#)
    );

    writer.write_all(METRICS.as_bytes()).await.unwrap();
    writer.write_all(b"\n").await.unwrap();
    let (key, _) = timeout(Duration::from_secs(5), ts.published.recv())
        .await
        .expect("no sample published")
        .expect("publisher channel closed");
    assert_eq!(key, "90210");

    ts.server.stop().await;
    ts.timers.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn metrics_before_identify_is_rejected() {
    let ts = start_server(test_config()).await;
    let (mut reader, mut writer) = connect(ts.addr).await;

    writer.write_all(METRICS.as_bytes()).await.unwrap();
    writer.write_all(b"\n").await.unwrap();

    assert_eq!(
        read_line(&mut reader).await.as_deref(),
        Some(r#"{"type":"ack","status":"error"}"#)
    );
    // The server closes the socket; no registry entry was created.
    assert_eq!(read_line(&mut reader).await, None);
    assert_eq!(ts.registry.count(), 0);

    ts.server.stop().await;
    ts.timers.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn silent_client_is_cut_off_at_identify_timeout() {
    let ts = start_server(TcpServerConfig {
        identify_timeout: Duration::from_millis(150),
        ..test_config()
    })
    .await;
    let (mut reader, _writer) = connect(ts.addr).await;

    assert_eq!(
        read_line(&mut reader).await.as_deref(),
        Some(r#"{"type":"ack","status":"error"}"#)
    );
    assert_eq!(read_line(&mut reader).await, None);
    assert_eq!(ts.registry.count(), 0);

    ts.server.stop().await;
    ts.timers.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn inactive_session_is_closed_by_the_timer() {
    let ts = start_server(TcpServerConfig {
        inactivity_timeout: Duration::from_millis(250),
        ..test_config()
    })
    .await;
    let (mut reader, mut writer) = connect(ts.addr).await;

    writer.write_all(IDENTIFY.as_bytes()).await.unwrap();
    writer.write_all(b"\n").await.unwrap();
    assert_eq!(
        read_line(&mut reader).await.as_deref(),
        Some(r#"{"type":"ack","status":"identified"}"#)
    );
    wait_for_count(&ts.registry, 1).await;

    // Go silent; the inactivity event fires and the server closes the
    // socket and unregisters the session.
    assert_eq!(read_line(&mut reader).await, None);
    wait_for_count(&ts.registry, 0).await;

    ts.server.stop().await;
    ts.timers.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn activity_keeps_the_session_alive_past_the_inactivity_window() {
    let ts = start_server(TcpServerConfig {
        inactivity_timeout: Duration::from_millis(400),
        ..test_config()
    })
    .await;
    let (mut reader, mut writer) = connect(ts.addr).await;

    writer.write_all(IDENTIFY.as_bytes()).await.unwrap();
    writer.write_all(b"\n").await.unwrap();
    assert_eq!(
        read_line(&mut reader).await.as_deref(),
        Some(r#"{"type":"ack","status":"identified"}"#)
    );
    wait_for_count(&ts.registry, 1).await;

    // Keepalives every 150 ms re-arm the 400 ms inactivity timer.
    for _ in 0..5 {
        tokio::time::sleep(Duration::from_millis(150)).await;
        writer.write_all(b"{\"type\":\"keepalive\"}\n").await.unwrap();
        assert_eq!(
            read_line(&mut reader).await.as_deref(),
            Some(r#"{"type":"ack","status":"alive"}"#)
        );
    }
    assert_eq!(ts.registry.count(), 1);

    ts.server.stop().await;
    ts.timers.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn over_capacity_connections_are_dropped_at_accept() {
    let ts = start_server(TcpServerConfig {
        max_connections: 1,
        ..test_config()
    })
    .await;

    let (mut reader1, mut writer1) = connect(ts.addr).await;
    writer1.write_all(IDENTIFY.as_bytes()).await.unwrap();
    writer1.write_all(b"\n").await.unwrap();
    assert_eq!(
        read_line(&mut reader1).await.as_deref(),
        Some(r#"{"type":"ack","status":"identified"}"#)
    );
    wait_for_count(&ts.registry, 1).await;

    // The second connection is closed immediately, without any ack.
    let (mut reader2, _writer2) = connect(ts.addr).await;
    assert_eq!(read_line(&mut reader2).await, None);
    assert_eq!(ts.registry.count(), 1);

    ts.server.stop().await;
    ts.timers.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_frames_are_discarded_without_breaking_the_session() {
    let mut ts = start_server(test_config()).await;
    let (mut reader, mut writer) = connect(ts.addr).await;

    writer.write_all(IDENTIFY.as_bytes()).await.unwrap();
    writer.write_all(b"\n").await.unwrap();
    assert_eq!(
        read_line(&mut reader).await.as_deref(),
        Some(r#"{"type":"ack","status":"identified"}"#)
    );

    // Garbage and unknown types are dropped at the worker.
    writer.write_all(b"this is not json\n").await.unwrap();
    writer
        .write_all(b"{\"type\":\"telemetry\"}\n")
        .await
        .unwrap();
    // The session still works afterwards.
    writer.write_all(METRICS.as_bytes()).await.unwrap();
    writer.write_all(b"\n").await.unwrap();

    let (key, _) = timeout(Duration::from_secs(5), ts.published.recv())
        .await
        .expect("no sample published")
        .expect("publisher channel closed");
    assert_eq!(key, "90210");

    ts.server.stop().await;
    ts.timers.stop().await;
}
