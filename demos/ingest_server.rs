//! Ingest Server - Publishes a synthetic stream through the ingest pipeline
//!
//! Run with: cargo run --example ingest_server -- [--ffmpeg [output_dir]]
//!
//! Without `--ffmpeg` the container bytes are captured in memory and
//! summarised. With it, a real ffmpeg process writes HLS segments to
//! `output_dir/live_demo/` (default `hls/`).
//!
//! ```text
//!   ConnectionHandle ──events──► IngestServer task ──FLV──► transcoder
//!                                      │
//!                                      └──► InMemoryStreamRegistry (live_demo)
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use live_ingest::media::{FlvTag, FLV_HEADER};
use live_ingest::{
    CaptureTranscoder, HlsTranscoder, InMemoryStreamRegistry, IngestServer, ServerConfig, Stream,
    StreamRepository, Transcoder, TranscoderConfig,
};

const STREAM_KEY: &str = "live_demo";

/// AVC sequence header with an empty decoder configuration record
const AVC_SEQUENCE_HEADER: [u8; 5] = [0x17, 0x00, 0x00, 0x00, 0x00];

/// AAC sequence header: AAC-LC, 44.1kHz, stereo
const AAC_SEQUENCE_HEADER: [u8; 4] = [0xAF, 0x00, 0x12, 0x10];

async fn publish_synthetic<T: Transcoder>(
    server: &IngestServer<InMemoryStreamRegistry, T>,
) -> Result<(), Box<dyn std::error::Error>> {
    let peer: SocketAddr = "127.0.0.1:50000".parse()?;
    let conn = server.open_connection(peer)?;

    conn.connect().await?;
    conn.publish(&format!("{}?user=demo", STREAM_KEY)).await?;

    let stream = server.registry().find_by_key(STREAM_KEY).await?;
    println!("Stream {} is {}", stream.stream_key(), stream.status());

    conn.video(0, Bytes::from_static(&AVC_SEQUENCE_HEADER)).await?;
    conn.audio(0, Bytes::from_static(&AAC_SEQUENCE_HEADER)).await?;

    // One second of 30fps video with audio every ~23ms
    for i in 0..30u32 {
        let ts = i * 33;
        let frame_type = if i == 0 { 0x17 } else { 0x27 };
        conn.video(ts, Bytes::from(vec![frame_type, 0x01, 0x00, 0x00, 0x00, 0xAB]))
            .await?;
        conn.audio(ts + 10, Bytes::from_static(&[0xAF, 0x01, 0x21, 0x00]))
            .await?;
        tokio::time::sleep(Duration::from_millis(33)).await;
    }

    let stats = conn.close().await?;
    println!(
        "Session closed: video={} audio={} keyframes={} dropped={} bytes_written={}",
        stats.video_frames,
        stats.audio_frames,
        stats.keyframes,
        stats.dropped_frames,
        stats.bytes_written,
    );

    let stream = server.registry().find_by_key(STREAM_KEY).await?;
    println!("Stream {} is {}", stream.stream_key(), stream.status());

    Ok(())
}

fn summarise(flv: &[u8]) {
    if flv.len() < FLV_HEADER.len() || flv[..FLV_HEADER.len()] != FLV_HEADER {
        println!("Captured {} bytes without an FLV header", flv.len());
        return;
    }

    let mut offset = FLV_HEADER.len();
    let (mut video, mut audio) = (0, 0);
    while let Some((tag, used)) = FlvTag::decode(&flv[offset..]) {
        if tag.is_video() {
            video += 1;
        } else if tag.is_audio() {
            audio += 1;
        }
        offset += used;
    }

    println!(
        "Captured {} bytes of FLV: {} video tags, {} audio tags",
        flv.len(),
        video,
        audio
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("live_ingest=info".parse()?),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let use_ffmpeg = args.next().as_deref() == Some("--ffmpeg");

    let registry = Arc::new(InMemoryStreamRegistry::new());
    registry.seed(Stream::new("stream-1", STREAM_KEY)).await;

    println!("Ingest Demo");
    println!("===========");
    println!("Provisioned streams: {}", registry.stream_count().await);
    println!();

    if use_ffmpeg {
        let output_root = args.next().unwrap_or_else(|| "hls".to_string());
        let transcoder = HlsTranscoder::new(TranscoderConfig::default().output_root(&output_root));
        let server = IngestServer::new(ServerConfig::default(), registry, Arc::new(transcoder));

        publish_synthetic(&server).await?;
        println!("HLS output under {}/{}/", output_root, STREAM_KEY);
    } else {
        let transcoder = Arc::new(CaptureTranscoder::new());
        let server = IngestServer::new(ServerConfig::default(), registry, Arc::clone(&transcoder));

        publish_synthetic(&server).await?;
        summarise(&transcoder.wait_finished(STREAM_KEY).await);
    }

    Ok(())
}
