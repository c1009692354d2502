//! Stream duplication relay
//!
//! The relay watches source streams on one application instance and
//! republishes the selected ones, unchanged, under a new name on a target
//! application instance.
//!
//! # Architecture
//!
//! ```text
//!      host callbacks                      Arc<RelayEngine>
//!  on_stream_create ─┐        ┌──────────────────────────────────────┐
//!  on_packet ────────┤        │ Mutex<RelayTable> {                  │
//!  on_metadata ──────┼──────► │   streams: HashMap<StreamId,         │
//!  on_unpublish ─────┤        │     SourceStream { phase, listener }>│
//!  on_stream_destroy ┤        │   publishers: PublisherLifecycle,    │
//!  on_target_destroyed        │ }                                    │
//!                             └──────┬───────────────┬───────────────┘
//!                                    │               │
//!                     NameMatcher ◄──┤               ├──► RestartScheduler
//!              DelayedPacketBuffer ◄─┤               │    (tokio timers)
//!                                    ▼
//!                        PublisherHandle::forward()
//!                                    │
//!                                    ▼
//!                   host OutboundPublisher (target app)
//! ```
//!
//! # Failure handling
//!
//! Nothing escapes an engine callback. A failed attempt detaches the relay
//! from that one stream, records a [`TerminationReason`], and (for the
//! restartable reasons) arms a restart if restarts are enabled.

pub mod buffer;
pub mod config;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod publisher;
pub mod restart;
pub mod state;

pub use buffer::{BufferDecision, DelayedPacketBuffer};
pub use config::RelayConfig;
pub use engine::RelayEngine;
pub use error::RelayError;
pub use matcher::NameMatcher;
pub use publisher::{PublisherHandle, PublisherLifecycle};
pub use restart::{RestartHandle, RestartScheduler};
pub use state::{RelayState, TerminationReason};
