//! End-to-end ingest tests: lifecycle, sessions and the server

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use live_ingest::media::{FlvTagType, FLV_HEADER};
use live_ingest::registry::RegistryError;
use live_ingest::{
    CaptureTranscoder, Error, FlvTag, InMemoryStreamRegistry, IngestServer, IngestSession,
    ServerConfig, SessionContext, SinkExit, Stream, StreamKey, StreamLifecycle, StreamRepository,
    StreamStatus, TranscodeSink, Transcoder,
};
use tokio::io::{AsyncReadExt, DuplexStream};
use tokio::sync::oneshot;
use tokio::time::timeout;

/// Transcoder that accepts the header and then never reads again
#[derive(Default)]
struct StalledTranscoder {
    readers: Mutex<Vec<DuplexStream>>,
}

impl Transcoder for StalledTranscoder {
    async fn start(&self, _key: &StreamKey) -> live_ingest::Result<TranscodeSink> {
        let (input, output) = tokio::io::duplex(64);
        self.readers.lock().unwrap().push(output);
        let (_exit_tx, exit) = oneshot::channel();
        Ok(TranscodeSink {
            input: Box::new(input),
            exit,
        })
    }
}

/// Transcoder that reads the header, then exits and closes its input
struct CrashingTranscoder;

impl Transcoder for CrashingTranscoder {
    async fn start(&self, key: &StreamKey) -> live_ingest::Result<TranscodeSink> {
        let (input, mut output) = tokio::io::duplex(1024);
        let (exit_tx, exit) = oneshot::channel();
        let stream_key = key.to_string();

        tokio::spawn(async move {
            let mut header = [0u8; 13];
            let _ = output.read_exact(&mut header).await;
            drop(output);
            let _ = exit_tx.send(SinkExit {
                stream_key,
                success: false,
                code: Some(1),
                detail: None,
            });
        });

        Ok(TranscodeSink {
            input: Box::new(input),
            exit,
        })
    }
}

fn peer(port: u16) -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
}

async fn seeded(keys: &[&str]) -> Arc<InMemoryStreamRegistry> {
    let registry = Arc::new(InMemoryStreamRegistry::new());
    for (i, key) in keys.iter().enumerate() {
        registry
            .seed(Stream::new(format!("stream-{}", i + 1), *key))
            .await;
    }
    registry
}

/// Split a captured FLV byte stream into tags
fn tags(flv: &[u8]) -> Vec<FlvTag> {
    assert_eq!(&flv[..FLV_HEADER.len()], &FLV_HEADER);
    let mut offset = FLV_HEADER.len();
    let mut out = Vec::new();
    while let Some((tag, used)) = FlvTag::decode(&flv[offset..]) {
        out.push(tag);
        offset += used;
    }
    assert_eq!(offset, flv.len(), "trailing bytes after last tag");
    out
}

#[tokio::test]
async fn start_stream_goes_live() {
    let registry = seeded(&["demo"]).await;
    let lifecycle = StreamLifecycle::new(Arc::clone(&registry));

    lifecycle.start_stream("demo").await.unwrap();

    let stream = registry.find_by_key("demo").await.unwrap();
    assert_eq!(stream.status(), StreamStatus::Live);
    assert!(stream.started_at().is_some());
}

#[tokio::test]
async fn second_start_is_rejected_and_changes_nothing() {
    let registry = seeded(&["demo"]).await;
    let lifecycle = StreamLifecycle::new(Arc::clone(&registry));

    lifecycle.start_stream("demo").await.unwrap();
    let after_first = registry.find_by_key("demo").await.unwrap();

    let result = lifecycle.start_stream("demo").await;
    assert!(matches!(result, Err(Error::AlreadyLive(_))));
    assert_eq!(registry.find_by_key("demo").await.unwrap(), after_first);
}

#[tokio::test]
async fn unknown_key_is_not_found() {
    let registry = seeded(&["demo"]).await;
    let lifecycle = StreamLifecycle::new(Arc::clone(&registry));

    let result = lifecycle.start_stream("unknown-key").await;
    assert!(matches!(result, Err(Error::StreamNotFound(_))));

    assert_eq!(registry.stream_count().await, 1);
    assert!(matches!(
        registry.find_by_key("unknown-key").await,
        Err(RegistryError::StreamNotFound(_))
    ));
    assert_eq!(
        registry.find_by_key("demo").await.unwrap().status(),
        StreamStatus::Idle
    );
}

#[tokio::test]
async fn frames_before_publish_never_reach_a_sink() {
    let registry = seeded(&["demo"]).await;
    let lifecycle = Arc::new(StreamLifecycle::new(registry));
    let transcoder = Arc::new(CaptureTranscoder::new());
    let mut session = IngestSession::new(
        SessionContext::new(1, peer(1)),
        Arc::clone(&lifecycle),
        Arc::clone(&transcoder),
    );

    for ts in [0, 33, 66] {
        session
            .on_video(ts, Bytes::from_static(&[0x17, 0x01, 0x00]))
            .await
            .unwrap();
    }
    session.on_publish("demo").await.unwrap();
    session.on_close().await;

    let out = transcoder.wait_finished("demo").await;
    assert_eq!(&out[..], &FLV_HEADER);
    assert_eq!(session.stats().dropped_frames, 3);
}

#[tokio::test]
async fn publishing_name_query_is_stripped() {
    let registry = seeded(&["demo"]).await;
    let lifecycle = Arc::new(StreamLifecycle::new(Arc::clone(&registry)));
    let transcoder = Arc::new(CaptureTranscoder::new());
    let mut session = IngestSession::new(
        SessionContext::new(1, peer(1)),
        lifecycle,
        Arc::clone(&transcoder),
    );

    session.on_publish("demo?user=abc").await.unwrap();

    assert_eq!(session.context().stream_key_str(), Some("demo"));
    assert!(registry.find_by_key("demo").await.unwrap().is_live());
    assert!(transcoder.captured("demo").is_some());
}

#[tokio::test]
async fn concurrent_publishers_on_one_key_only_one_wins() {
    let registry = seeded(&["demo"]).await;
    let transcoder = Arc::new(CaptureTranscoder::new());
    let server = Arc::new(IngestServer::new(
        ServerConfig::default(),
        registry,
        Arc::clone(&transcoder),
    ));

    let mut tasks = Vec::new();
    for port in 0..8 {
        let server = Arc::clone(&server);
        tasks.push(tokio::spawn(async move {
            let conn = server.open_connection(peer(10_000 + port)).unwrap();
            let verdict = conn.publish("demo").await;
            (conn, verdict)
        }));
    }

    let mut winners = Vec::new();
    let mut rejected = 0;
    for task in tasks {
        let (conn, verdict) = task.await.unwrap();
        match verdict {
            Ok(()) => winners.push(conn),
            Err(Error::AlreadyLive(_)) => rejected += 1,
            Err(e) => panic!("unexpected publish error: {}", e),
        }
    }

    assert_eq!(winners.len(), 1);
    assert_eq!(rejected, 7);
    assert_eq!(transcoder.start_count(), 1);
}

#[tokio::test]
async fn sessions_on_distinct_keys_are_independent() {
    let keys = ["cam-a", "cam-b", "cam-c", "cam-d"];
    let registry = seeded(&keys).await;
    let transcoder = Arc::new(CaptureTranscoder::new());
    let server = Arc::new(IngestServer::new(
        ServerConfig::default(),
        Arc::clone(&registry),
        Arc::clone(&transcoder),
    ));

    let mut tasks = Vec::new();
    for (i, key) in keys.iter().enumerate() {
        let server = Arc::clone(&server);
        let key = key.to_string();
        tasks.push(tokio::spawn(async move {
            let conn = server.open_connection(peer(20_000 + i as u16)).unwrap();
            conn.publish(&key).await.unwrap();
            for n in 0..10u32 {
                let payload = Bytes::from(vec![0x27, 0x01, i as u8, n as u8]);
                conn.video(n * 33, payload).await.unwrap();
            }
            conn.close().await.unwrap()
        }));
    }

    for task in tasks {
        let stats = task.await.unwrap();
        assert_eq!(stats.video_frames, 10);
    }

    for (i, key) in keys.iter().enumerate() {
        let tags = tags(&transcoder.wait_finished(key).await);
        assert_eq!(tags.len(), 10);
        for (n, tag) in tags.iter().enumerate() {
            assert_eq!(tag.tag_type, FlvTagType::Video);
            assert_eq!(tag.timestamp, n as u32 * 33);
            assert_eq!(&tag.data[..], &[0x27, 0x01, i as u8, n as u8]);
        }
        assert_eq!(
            registry.find_by_key(key).await.unwrap().status(),
            StreamStatus::Idle
        );
    }
}

#[tokio::test]
async fn frames_reach_the_sink_in_order_under_back_pressure() {
    let registry = seeded(&["demo"]).await;
    // A tiny pipe makes every tag wait on the reader
    let transcoder = Arc::new(CaptureTranscoder::with_pipe_capacity(8));
    let server = IngestServer::new(
        ServerConfig::default().event_buffer(2),
        registry,
        Arc::clone(&transcoder),
    );

    let conn = server.open_connection(peer(1)).unwrap();
    conn.publish("demo").await.unwrap();
    for n in 0..50u32 {
        if n % 2 == 0 {
            conn.video(n, Bytes::from(vec![0x27, 0x01, n as u8])).await.unwrap();
        } else {
            conn.audio(n, Bytes::from(vec![0xAF, 0x01, n as u8])).await.unwrap();
        }
    }
    conn.close().await.unwrap();

    let tags = tags(&transcoder.wait_finished("demo").await);
    assert_eq!(tags.len(), 50);
    for (n, tag) in tags.iter().enumerate() {
        assert_eq!(tag.timestamp, n as u32);
        assert_eq!(tag.data[2], n as u8);
        assert_eq!(tag.is_video(), n % 2 == 0);
    }
}

#[tokio::test]
async fn server_enforces_connection_limit() {
    let registry = seeded(&["demo"]).await;
    let server = IngestServer::new(
        ServerConfig::default().max_connections(2),
        registry,
        Arc::new(CaptureTranscoder::new()),
    );

    let a = server.open_connection(peer(1)).unwrap();
    let _b = server.open_connection(peer(2)).unwrap();
    assert!(matches!(
        server.open_connection(peer(3)),
        Err(Error::ConnectionLimit)
    ));

    a.close().await.unwrap();
    assert!(server.open_connection(peer(4)).is_ok());
}

#[tokio::test]
async fn shutdown_releases_every_sink() {
    let keys = ["cam-a", "cam-b", "cam-c"];
    let registry = seeded(&keys).await;
    let transcoder = Arc::new(CaptureTranscoder::new());
    let server = IngestServer::new(
        ServerConfig::default(),
        Arc::clone(&registry),
        Arc::clone(&transcoder),
    );

    let mut conns = Vec::new();
    for (i, key) in keys.iter().enumerate() {
        let conn = server.open_connection(peer(30_000 + i as u16)).unwrap();
        conn.publish(key).await.unwrap();
        conns.push(conn);
    }

    server.shutdown();
    for conn in conns {
        while !conn.is_closed() {
            tokio::task::yield_now().await;
        }
        conn.join().await.unwrap();
    }

    for key in keys {
        transcoder.wait_finished(key).await;
        assert_eq!(
            registry.find_by_key(key).await.unwrap().status(),
            StreamStatus::Idle
        );
    }
    assert_eq!(server.active_connections(), 0);
}

#[tokio::test]
async fn republish_after_close_restarts_stream() {
    let registry = seeded(&["demo"]).await;
    let transcoder = Arc::new(CaptureTranscoder::new());
    let server = IngestServer::new(ServerConfig::default(), registry, Arc::clone(&transcoder));

    let first = server.open_connection(peer(1)).unwrap();
    first.publish("demo").await.unwrap();
    first.close().await.unwrap();

    let second = server.open_connection(peer(2)).unwrap();
    second.publish("demo").await.unwrap();
    second.close().await.unwrap();

    assert_eq!(transcoder.start_count(), 2);
}

#[tokio::test]
async fn keep_live_on_close_blocks_republish() {
    let registry = seeded(&["demo"]).await;
    let server = IngestServer::new(
        ServerConfig::default().keep_stream_live_on_close(),
        Arc::clone(&registry),
        Arc::new(CaptureTranscoder::new()),
    );

    let first = server.open_connection(peer(1)).unwrap();
    first.publish("demo").await.unwrap();
    first.close().await.unwrap();
    assert!(registry.find_by_key("demo").await.unwrap().is_live());

    let second = server.open_connection(peer(2)).unwrap();
    assert!(matches!(
        second.publish("demo").await,
        Err(Error::AlreadyLive(_))
    ));
}

/// Open a connection, publish `demo` and leave one frame stuck in the sink
async fn stall_on_frame<T: Transcoder>(
    server: &IngestServer<InMemoryStreamRegistry, T>,
    port: u16,
) -> live_ingest::ConnectionHandle {
    let conn = server.open_connection(peer(port)).unwrap();
    conn.publish("demo").await.unwrap();
    conn.video(0, Bytes::from(vec![0x17; 4096])).await.unwrap();
    // Let the task block inside the write
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!conn.is_closed());
    conn
}

async fn wait_for_status(registry: &InMemoryStreamRegistry, key: &str, want: StreamStatus) {
    timeout(Duration::from_secs(2), async {
        while registry.find_by_key(key).await.unwrap().status() != want {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn shutdown_cancels_a_stalled_sink_write() {
    let registry = seeded(&["demo"]).await;
    let server = IngestServer::new(
        ServerConfig::default(),
        Arc::clone(&registry),
        Arc::new(StalledTranscoder::default()),
    );
    let conn = stall_on_frame(&server, 1).await;

    server.shutdown();
    let stats = timeout(Duration::from_secs(2), conn.join())
        .await
        .expect("session did not finish after shutdown")
        .unwrap();

    assert_eq!(stats.video_frames, 0);
    assert_eq!(
        registry.find_by_key("demo").await.unwrap().status(),
        StreamStatus::Idle
    );
}

#[tokio::test]
async fn close_abandons_a_stalled_sink_after_timeout() {
    let registry = seeded(&["demo"]).await;
    let server = IngestServer::new(
        ServerConfig::default().close_timeout(Duration::from_millis(50)),
        Arc::clone(&registry),
        Arc::new(StalledTranscoder::default()),
    );
    let conn = stall_on_frame(&server, 1).await;

    timeout(Duration::from_secs(2), conn.close())
        .await
        .expect("close did not finish")
        .unwrap();
    assert_eq!(
        registry.find_by_key("demo").await.unwrap().status(),
        StreamStatus::Idle
    );

    // The key is free again
    let again = server.open_connection(peer(2)).unwrap();
    again.publish("demo").await.unwrap();
}

#[tokio::test]
async fn dropping_the_handle_cancels_a_stalled_sink_write() {
    let registry = seeded(&["demo"]).await;
    let server = IngestServer::new(
        ServerConfig::default(),
        Arc::clone(&registry),
        Arc::new(StalledTranscoder::default()),
    );
    let conn = stall_on_frame(&server, 1).await;

    drop(conn);
    wait_for_status(&registry, "demo", StreamStatus::Idle).await;
}

#[tokio::test]
async fn transcoder_exit_keeps_connection_until_next_write() {
    let registry = seeded(&["demo"]).await;
    let server = IngestServer::new(
        ServerConfig::default(),
        Arc::clone(&registry),
        Arc::new(CrashingTranscoder),
    );

    let conn = server.open_connection(peer(1)).unwrap();
    conn.publish("demo").await.unwrap();

    // Give the exit notification time to arrive
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!conn.is_closed());
    assert!(registry.find_by_key("demo").await.unwrap().is_live());

    conn.video(0, Bytes::from_static(&[0x17, 0x01, 0x00]))
        .await
        .unwrap();
    timeout(Duration::from_secs(2), async {
        while !conn.is_closed() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("write to exited transcoder did not end the connection");

    let stats = conn.join().await.unwrap();
    assert_eq!(stats.video_frames, 0);
    assert_eq!(
        registry.find_by_key("demo").await.unwrap().status(),
        StreamStatus::Idle
    );
}
