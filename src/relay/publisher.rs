//! Duplicate publisher lifecycle
//!
//! Each relayed source stream owns at most one [`PublisherHandle`], which
//! wraps the outbound publisher the host opened on the target application
//! instance. [`PublisherLifecycle`] tracks which destination names are held
//! by live handles so two source streams can never publish the same
//! destination, even before the host reports the first one as existing.
//!
//! Both types live inside the engine's critical section; nothing here locks.

use std::collections::HashMap;

use crate::host::{Host, OutboundPublisher, StreamId, TargetApp};
use crate::media::{Packet, PacketKind};

use super::error::RelayError;

/// Live binding between one source stream and its duplicate
pub struct PublisherHandle {
    source: StreamId,
    destination: String,
    target: TargetApp,
    publisher: Box<dyn OutboundPublisher>,
    closed: bool,
}

impl PublisherHandle {
    /// Source stream this handle duplicates
    pub fn source(&self) -> StreamId {
        self.source
    }

    /// Destination stream name on the target
    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Target application instance
    pub fn target(&self) -> &TargetApp {
        &self.target
    }

    /// Whether the handle has been torn down
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Forward a packet to the duplicate
    ///
    /// Both data kinds share the data path.
    pub fn forward(&mut self, packet: &Packet) -> Result<(), RelayError> {
        if self.closed {
            return Err(RelayError::HostCall(format!(
                "publisher for {} is closed",
                self.destination
            )));
        }

        let data = packet.payload.clone();
        let result = match packet.kind {
            PacketKind::Audio => self.publisher.add_audio(data, packet.timestamp),
            PacketKind::Video => self.publisher.add_video(data, packet.timestamp),
            PacketKind::Data | PacketKind::DataAmf3 => {
                self.publisher.add_data(data, packet.timestamp)
            }
        };

        result.map_err(RelayError::from)
    }

    /// Unpublish and close the duplicate
    ///
    /// Returns false if the handle was already torn down.
    pub fn teardown(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.closed = true;
        self.publisher.unpublish();
        self.publisher.close();
        true
    }
}

impl std::fmt::Debug for PublisherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublisherHandle")
            .field("source", &self.source)
            .field("destination", &self.destination)
            .field("target", &self.target)
            .field("closed", &self.closed)
            .finish()
    }
}

/// Creates and tears down duplicate publishers
#[derive(Debug, Default)]
pub struct PublisherLifecycle {
    /// Destination name -> source stream holding it
    claimed: HashMap<String, StreamId>,
    /// Whether the host has been asked to report target teardown
    watching: Option<TargetApp>,
}

impl PublisherLifecycle {
    /// Create an empty lifecycle tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a duplicate publisher for `source` on `target`
    ///
    /// Fails with [`RelayError::DestinationCollision`] if the destination is
    /// held by another live handle or already exists on the target. No
    /// publisher is opened in that case.
    pub fn open<H: Host + ?Sized>(
        &mut self,
        host: &H,
        source: StreamId,
        target: &TargetApp,
        destination: String,
    ) -> Result<PublisherHandle, RelayError> {
        if self.is_claimed(&destination) || host.destination_exists(target, &destination)
        {
            return Err(RelayError::DestinationCollision { destination });
        }

        let mut publisher = host.open_publisher(target)?;
        publisher.set_stream_type(&host.default_stream_type(target));

        if let Err(e) = publisher.publish(&destination) {
            publisher.close();
            return Err(e.into());
        }

        if self.watching.as_ref() != Some(target) {
            host.watch_target(target);
            self.watching = Some(target.clone());
        }

        self.claimed.insert(destination.clone(), source);

        Ok(PublisherHandle {
            source,
            destination,
            target: target.clone(),
            publisher,
            closed: false,
        })
    }

    /// Tear down a handle and release its destination name
    ///
    /// Safe to call more than once; only the first call reaches the host.
    pub fn teardown(&mut self, handle: &mut PublisherHandle) -> bool {
        if self.claimed.get(handle.destination()) == Some(&handle.source) {
            self.claimed.remove(handle.destination());
        }
        handle.teardown()
    }

    /// Whether a destination name is held by a live handle
    pub fn is_claimed(&self, destination: &str) -> bool {
        self.claimed.contains_key(destination)
    }

    /// Number of live handles
    pub fn live_count(&self) -> usize {
        self.claimed.len()
    }

    /// Stop watching the target for teardown
    pub fn unwatch<H: Host + ?Sized>(&mut self, host: &H) {
        if let Some(target) = self.watching.take() {
            host.unwatch_target(&target);
        }
    }
}
