//! stream-dup: live stream duplication relay
//!
//! Embedded in a media server, the relay republishes selected live streams
//! under a new name on a (possibly different) application instance, without
//! transcoding:
//! - Rule-based stream selection (`*`, `name`, `head*`, `*tail`, lists)
//! - Buffering of packets that arrive before the stream name is known
//! - At most one duplicate per source, with destination collision checks
//! - Teardown on unpublish, source destroy and target instance destroy
//! - Scheduled restarts after fatal failures
//!
//! The server side is supplied by implementing [`Host`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use stream_dup::{Host, Packet, RelayConfig, RelayEngine, StreamId};
//!
//! async fn run<H: Host>(host: Arc<H>) -> stream_dup::Result<()> {
//!     let config = RelayConfig::from_properties([
//!         ("duplicateStreamsStreamNames", "cam*"),
//!         ("duplicateStreamsTargetAppName", "live/_definst_"),
//!     ])?;
//!
//!     let engine = RelayEngine::new(host, config);
//!     engine.on_app_start();
//!
//!     let stream = StreamId(1);
//!     engine.on_stream_create(stream).await;
//!     engine.on_packet(stream, Packet::audio(vec![0xAF, 0x01], 1000)).await;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod host;
pub mod media;
pub mod relay;
pub mod stats;

// Re-export main types for convenience
pub use error::{Error, Result};
pub use host::{Host, OutboundPublisher, StreamId, Subscription, TargetApp};
pub use media::{Packet, PacketKind};
pub use relay::{RelayConfig, RelayEngine, RelayError, RelayState, TerminationReason};
pub use stats::RelayStatsSnapshot;
