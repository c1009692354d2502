//! Duplicate Streams - Drives the relay against an in-memory media server
//!
//! Run with: cargo run --example duplicate_streams -- [stream_names]
//!
//! This example demonstrates:
//! - Implementing `Host` for a media server
//! - Configuring the relay from `duplicateStreams*` properties
//! - A stream whose name is known immediately, and one that resolves late
//! - A destination collision followed by a scheduled restart
//! - Teardown when the target application instance goes away
//!
//! # Architecture
//!
//! ```text
//!   source "live/_definst_"                 target "backup/_definst_"
//!  +-----------------------+               +--------------------------+
//!  │ cam1  ──packets──┐    │               │ cam1_dest                │
//!  │ (late)  ─────────┤    │               │ studio_dest              │
//!  +------------------│----+               +------------▲-------------+
//!                     ▼                                 │
//!               RelayEngine ──── OutboundPublisher ──────┘
//!                               (MemoryPublisher, logs calls)
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use stream_dup::{
    Host, OutboundPublisher, Packet, RelayConfig, RelayEngine, StreamId, Subscription, TargetApp,
};

// ============================================================================
// In-memory media server
// ============================================================================

#[derive(Default)]
struct ServerState {
    /// Source streams and their (possibly still empty) names
    names: HashMap<StreamId, String>,
    /// Published streams per target instance
    published: HashSet<(TargetApp, String)>,
}

/// Media server double; every publisher call is logged
#[derive(Clone, Default)]
struct MemoryServer {
    state: Arc<Mutex<ServerState>>,
}

impl MemoryServer {
    fn create_stream(&self, stream: StreamId, name: &str) {
        self.state
            .lock()
            .unwrap()
            .names
            .insert(stream, name.to_string());
    }

    fn destroy_stream(&self, stream: StreamId) {
        self.state.lock().unwrap().names.remove(&stream);
    }

    fn publish_external(&self, target: &TargetApp, name: &str) {
        self.state
            .lock()
            .unwrap()
            .published
            .insert((target.clone(), name.to_string()));
    }

    fn unpublish_external(&self, target: &TargetApp, name: &str) {
        self.state
            .lock()
            .unwrap()
            .published
            .remove(&(target.clone(), name.to_string()));
    }
}

impl Host for MemoryServer {
    fn stream_name(&self, stream: StreamId) -> String {
        self.state
            .lock()
            .unwrap()
            .names
            .get(&stream)
            .cloned()
            .unwrap_or_default()
    }

    fn stream_exists(&self, stream: StreamId) -> bool {
        self.state.lock().unwrap().names.contains_key(&stream)
    }

    fn destination_exists(&self, target: &TargetApp, name: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .published
            .contains(&(target.clone(), name.to_string()))
    }

    fn default_stream_type(&self, _target: &TargetApp) -> String {
        "live".to_string()
    }

    fn open_publisher(&self, target: &TargetApp) -> stream_dup::Result<Box<dyn OutboundPublisher>> {
        Ok(Box::new(MemoryPublisher {
            state: Arc::clone(&self.state),
            target: target.clone(),
            name: None,
            packets: 0,
        }))
    }

    fn subscribe_packets(&self, stream: StreamId) -> Subscription {
        tracing::info!(stream = %stream, "Packet listener added");
        Subscription::new(move || {
            tracing::info!(stream = %stream, "Packet listener removed");
        })
    }

    fn watch_target(&self, target: &TargetApp) {
        tracing::info!(target_app = %target, "Watching target instance");
    }

    fn unwatch_target(&self, target: &TargetApp) {
        tracing::info!(target_app = %target, "No longer watching target instance");
    }
}

struct MemoryPublisher {
    state: Arc<Mutex<ServerState>>,
    target: TargetApp,
    name: Option<String>,
    packets: u64,
}

impl MemoryPublisher {
    fn media(&mut self, kind: &str, data: Bytes, timestamp: u64) -> stream_dup::Result<()> {
        self.packets += 1;
        tracing::debug!(
            destination = self.name.as_deref().unwrap_or("-"),
            kind,
            timestamp,
            size = data.len(),
            "Packet written"
        );
        Ok(())
    }
}

impl OutboundPublisher for MemoryPublisher {
    fn set_stream_type(&mut self, stream_type: &str) {
        tracing::debug!(stream_type, "Stream type set");
    }

    fn publish(&mut self, stream_name: &str) -> stream_dup::Result<()> {
        self.state
            .lock()
            .unwrap()
            .published
            .insert((self.target.clone(), stream_name.to_string()));
        self.name = Some(stream_name.to_string());
        Ok(())
    }

    fn add_audio(&mut self, data: Bytes, timestamp: u64) -> stream_dup::Result<()> {
        self.media("audio", data, timestamp)
    }

    fn add_video(&mut self, data: Bytes, timestamp: u64) -> stream_dup::Result<()> {
        self.media("video", data, timestamp)
    }

    fn add_data(&mut self, data: Bytes, timestamp: u64) -> stream_dup::Result<()> {
        self.media("data", data, timestamp)
    }

    fn unpublish(&mut self) {
        if let Some(name) = self.name.take() {
            self.state
                .lock()
                .unwrap()
                .published
                .remove(&(self.target.clone(), name.clone()));
            tracing::info!(destination = %name, packets = self.packets, "Destination closed");
        }
    }

    fn close(&mut self) {}
}

// ============================================================================
// Scenario driver
// ============================================================================

fn audio(timestamp: u64) -> Packet {
    Packet::audio(vec![0xAF, 0x01, 0x21, 0x10], timestamp)
}

fn video(timestamp: u64) -> Packet {
    Packet::video(vec![0x27, 0x01, 0x00, 0x00, 0x00], timestamp)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let stream_names = std::env::args().nth(1).unwrap_or_else(|| "*".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("stream_dup=debug".parse()?)
                .add_directive("duplicate_streams=debug".parse()?),
        )
        .init();

    let config = RelayConfig::from_properties([
        ("duplicateStreamsStreamNames", stream_names.as_str()),
        ("duplicateStreamsTargetAppName", "backup"),
        ("duplicateStreamsRestartTimeout", "1000"),
    ])?;
    let target = config.target_app.clone();

    let server = Arc::new(MemoryServer::default());
    let engine = RelayEngine::new(Arc::clone(&server), config);
    engine.on_app_start();

    // Name known as soon as the stream is created
    let cam = StreamId(1);
    server.create_stream(cam, "cam1");
    engine.on_stream_create(cam).await;
    for ts in (0..200).step_by(40) {
        engine.on_packet(cam, video(ts)).await;
        engine.on_packet(cam, audio(ts + 5)).await;
    }

    // Name arrives after a few packets; buffered packets are replayed
    let late = StreamId(2);
    server.create_stream(late, "");
    engine.on_stream_create(late).await;
    engine
        .on_metadata(late, Packet::data(Bytes::from_static(b"onMetaData"), 0))
        .await;
    engine.on_packet(late, video(0)).await;
    server.create_stream(late, "studio");
    engine.on_packet(late, audio(10)).await;

    // Destination already taken; freed before the restart fires
    let busy = StreamId(3);
    server.publish_external(&target, "busy_dest");
    server.create_stream(busy, "busy");
    engine.on_stream_create(busy).await;
    engine.on_packet(busy, audio(0)).await;
    server.unpublish_external(&target, "busy_dest");

    tokio::time::sleep(Duration::from_millis(1_200)).await;
    engine.on_packet(busy, audio(1_200)).await;

    tracing::info!(active = ?engine.active_publishers().await, "Duplicates live");

    // Source unpublishes, then the target instance goes away
    engine.on_unpublish(cam).await;
    engine.on_target_destroyed(&target).await;

    for stream in [cam, late, busy] {
        tracing::info!(stream = %stream, state = ?engine.state(stream).await, "Final state");
        server.destroy_stream(stream);
        engine.on_stream_destroy(stream).await;
    }

    engine.on_app_stop().await;
    tracing::info!(stats = ?engine.stats(), "Relay stats");

    Ok(())
}
