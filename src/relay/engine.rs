//! Relay engine
//!
//! The engine reacts to host callbacks and drives each source stream through
//! its relay attempt:
//!
//! ```text
//!   Idle ──create──► AwaitingName ──name resolves, rule matches──► Active
//!                      │  ▲   │                                     │
//!                      └──┘   │ overflow / mismatch / collision     │ unpublish / target
//!                    buffer   ▼                                     ▼ destroyed / failure
//!                           Terminated ◄──────────────────────────────┘
//! ```
//!
//! Every transition runs under one engine-wide lock. The table of streams,
//! the destination-name claims and publisher teardown all need a view that
//! is consistent across streams, so a single coarse lock keeps them correct
//! without any lock ordering. Host calls made under the lock must be quick.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use tokio::sync::Mutex;

use crate::host::{Host, StreamId, TargetApp};
use crate::media::Packet;
use crate::stats::{RelayStats, RelayStatsSnapshot};

use super::buffer::BufferDecision;
use super::config::RelayConfig;
use super::error::RelayError;
use super::matcher::NameMatcher;
use super::publisher::PublisherLifecycle;
use super::restart::{RestartHandle, RestartScheduler};
use super::state::{RelayPhase, RelayState, SourceStream, TerminationReason};

/// State guarded by the engine lock
#[derive(Debug, Default)]
struct RelayTable {
    /// Streams the relay is (or was) attached to
    streams: HashMap<StreamId, SourceStream>,
    /// Live publishers and their destination claims
    publishers: PublisherLifecycle,
    /// Armed restarts per stream, cancelled when the stream is destroyed
    pending: HashMap<StreamId, Vec<RestartHandle>>,
}

/// What to do with an entry once the current phase has been inspected
enum Step {
    Done,
    Resolve(String, Vec<Packet>),
    Terminate(TerminationReason),
}

/// Stream duplication relay for one source application instance
pub struct RelayEngine<H: Host> {
    host: Arc<H>,
    config: RelayConfig,
    matcher: NameMatcher,
    table: Mutex<RelayTable>,
    restarts: RestartScheduler,
    stats: RelayStats,
    stopped: AtomicBool,
    weak_self: Weak<Self>,
}

impl<H: Host> RelayEngine<H> {
    /// Create an engine for a source application instance
    pub fn new(host: Arc<H>, config: RelayConfig) -> Arc<Self> {
        let matcher = NameMatcher::new(config.stream_names.clone(), config.name_suffix.clone());
        let restarts = RestartScheduler::new(config.restart_enabled, config.restart_delay);

        Arc::new_cyclic(|weak_self| Self {
            host,
            config,
            matcher,
            table: Mutex::new(RelayTable::default()),
            restarts,
            stats: RelayStats::new(),
            stopped: AtomicBool::new(false),
            weak_self: weak_self.clone(),
        })
    }

    /// Get the relay configuration
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Get a snapshot of the relay counters
    pub fn stats(&self) -> RelayStatsSnapshot {
        self.stats.snapshot()
    }

    /// Relay state of a source stream
    pub async fn state(&self, stream: StreamId) -> RelayState {
        let table = self.table.lock().await;
        table
            .streams
            .get(&stream)
            .map(SourceStream::state)
            .unwrap_or(RelayState::Idle)
    }

    /// Live duplicates as (source stream, destination name)
    pub async fn active_publishers(&self) -> Vec<(StreamId, String)> {
        let table = self.table.lock().await;
        let mut active: Vec<(StreamId, String)> = table
            .streams
            .values()
            .filter_map(|entry| entry.publisher())
            .map(|handle| (handle.source(), handle.destination().to_string()))
            .collect();
        active.sort();
        active
    }

    /// Number of streams in the table
    pub async fn stream_count(&self) -> usize {
        self.table.lock().await.streams.len()
    }

    /// Source application instance started
    pub fn on_app_start(&self) {
        self.restarts.reset();
        self.stopped.store(false, Ordering::SeqCst);

        tracing::info!(
            stream_names = %self.config.stream_names,
            target_app = %self.config.target_app,
            suffix = %self.config.name_suffix,
            restarts = self.config.restart_enabled,
            restart_delay_ms = self.config.restart_delay.as_millis() as u64,
            max_buffered = self.config.max_buffered_packets,
            "Stream duplication started"
        );
    }

    /// Source application instance stopped
    ///
    /// Stops watching the target instance and cancels pending restarts.
    /// Live duplicates are torn down by the stream destroy callbacks that
    /// follow.
    pub async fn on_app_stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.restarts.cancel_all();

        let mut table = self.table.lock().await;
        table.pending.clear();
        table.publishers.unwatch(&*self.host);

        tracing::info!(
            target_app = %self.config.target_app,
            streams = table.streams.len(),
            live = table.publishers.live_count(),
            "Stream duplication stopped"
        );
    }

    /// Source stream created: attach the packet listener
    pub async fn on_stream_create(&self, stream: StreamId) {
        let mut table = self.table.lock().await;
        self.attach(&mut table, stream);
    }

    /// Source stream destroyed: tear down and forget it
    pub async fn on_stream_destroy(&self, stream: StreamId) {
        let mut table = self.table.lock().await;
        let RelayTable {
            streams,
            publishers,
            pending,
        } = &mut *table;

        if let Some(restarts) = pending.remove(&stream) {
            for restart in &restarts {
                restart.cancel();
            }
            tracing::debug!(
                stream = %stream,
                cancelled = restarts.len(),
                "Pending restarts cancelled"
            );
        }

        let Some(mut entry) = streams.remove(&stream) else {
            return;
        };

        entry.detach();
        if let RelayPhase::Active(handle) = &mut entry.phase {
            if publishers.teardown(handle) {
                self.stats.on_publisher_closed();
                tracing::info!(
                    stream = %stream,
                    destination = %handle.destination(),
                    "Duplicate unpublished (source destroyed)"
                );
            }
        }

        tracing::debug!(stream = %stream, "Source stream removed");
    }

    /// Live packet from a source stream
    pub async fn on_packet(&self, stream: StreamId, packet: Packet) {
        let mut table = self.table.lock().await;
        if let Some(reason) = self.dispatch(&mut table, stream, packet) {
            self.schedule_restart(&mut table, stream, reason);
        }
    }

    /// Metadata packet from a source stream; same path as media
    pub async fn on_metadata(&self, stream: StreamId, packet: Packet) {
        self.on_packet(stream, packet).await;
    }

    /// Source stream stopped publishing
    pub async fn on_unpublish(&self, stream: StreamId) {
        let mut table = self.table.lock().await;
        let RelayTable {
            streams,
            publishers,
            ..
        } = &mut *table;

        if let Some(entry) = streams.get_mut(&stream) {
            if entry.publisher().is_some() {
                self.terminate(publishers, stream, entry, TerminationReason::Unpublished);
            }
        }
    }

    /// Target application instance destroyed
    ///
    /// Tears down every duplicate published into that instance.
    pub async fn on_target_destroyed(&self, target: &TargetApp) {
        let mut table = self.table.lock().await;
        let RelayTable {
            streams,
            publishers,
            ..
        } = &mut *table;

        let mut evicted = Vec::new();
        for (&stream, entry) in streams.iter_mut() {
            let bound = entry
                .publisher()
                .map(|handle| handle.target() == target)
                .unwrap_or(false);

            if bound {
                self.terminate(publishers, stream, entry, TerminationReason::TargetDestroyed);
                evicted.push(stream);
            }
        }

        tracing::info!(
            target_app = %target,
            evicted = evicted.len(),
            "Target application instance destroyed"
        );

        for stream in evicted {
            self.schedule_restart(&mut table, stream, TerminationReason::TargetDestroyed);
        }
    }

    /// Attach the listener and start a fresh attempt
    ///
    /// Returns false if the relay is already listening to the stream.
    fn attach(&self, table: &mut RelayTable, stream: StreamId) -> bool {
        if let Some(entry) = table.streams.get(&stream) {
            if entry.is_listening() {
                tracing::debug!(stream = %stream, "Relay already attached");
                return false;
            }
        }

        let subscription = self.host.subscribe_packets(stream);
        table.streams.insert(
            stream,
            SourceStream::new(subscription, self.config.max_buffered_packets),
        );

        tracing::debug!(stream = %stream, "Relay attached");
        true
    }

    /// Run one packet through the state machine
    ///
    /// Returns the termination reason if this packet ended the attempt.
    fn dispatch(
        &self,
        table: &mut RelayTable,
        stream: StreamId,
        packet: Packet,
    ) -> Option<TerminationReason> {
        let RelayTable {
            streams,
            publishers,
            ..
        } = table;

        let entry = streams.get_mut(&stream)?;
        if !entry.is_listening() {
            return None;
        }

        let step = match &mut entry.phase {
            RelayPhase::Terminated(_) => Step::Done,
            RelayPhase::Active(handle) => {
                let size = packet.size();
                match handle.forward(&packet) {
                    Ok(()) => {
                        self.stats.on_forwarded(size);
                        Step::Done
                    }
                    Err(e) => {
                        self.stats.on_host_failure();
                        tracing::error!(
                            stream = %stream,
                            destination = %handle.destination(),
                            error = %e,
                            "Forwarding to duplicate failed"
                        );
                        Step::Terminate(TerminationReason::HostFailure)
                    }
                }
            }
            RelayPhase::AwaitingName(buffer) => {
                let name = self.host.stream_name(stream);
                match buffer.accept(packet, !name.is_empty()) {
                    BufferDecision::Buffered => {
                        self.stats.on_buffered();
                        tracing::trace!(
                            stream = %stream,
                            buffered = buffer.len(),
                            bytes = buffer.size(),
                            "Packet held until stream name resolves"
                        );
                        Step::Done
                    }
                    BufferDecision::Rejected { discarded } => {
                        self.stats.on_overflow();
                        let err = RelayError::BufferOverflow {
                            stream,
                            buffered: discarded,
                        };
                        tracing::warn!(
                            stream = %stream,
                            error = %err,
                            "Stream name missing for too long, cannot duplicate"
                        );
                        Step::Terminate(TerminationReason::BufferOverflow)
                    }
                    BufferDecision::Flush(packets) => Step::Resolve(name, packets),
                }
            }
        };

        let reason = match step {
            Step::Done => return None,
            Step::Terminate(reason) => reason,
            Step::Resolve(name, packets) => {
                match self.activate(publishers, stream, entry, &name, packets) {
                    Ok(()) => return None,
                    Err(reason) => reason,
                }
            }
        };

        self.terminate(publishers, stream, entry, reason);
        Some(reason)
    }

    /// Name resolved: decide eligibility, open the duplicate, replay packets
    fn activate(
        &self,
        publishers: &mut PublisherLifecycle,
        stream: StreamId,
        entry: &mut SourceStream,
        name: &str,
        packets: Vec<Packet>,
    ) -> Result<(), TerminationReason> {
        if !self.matcher.matches(name) {
            tracing::debug!(
                stream = %stream,
                stream_name = %name,
                rule = %self.matcher.rule(),
                "Stream not selected for duplication"
            );
            return Err(TerminationReason::RuleMismatch);
        }

        let destination = self.config.destination_name(name);
        let mut handle = match publishers.open(
            &*self.host,
            stream,
            &self.config.target_app,
            destination,
        ) {
            Ok(handle) => handle,
            Err(e @ RelayError::DestinationCollision { .. }) => {
                self.stats.on_collision();
                tracing::warn!(
                    stream = %stream,
                    source = %name,
                    error = %e,
                    "Cannot duplicate stream"
                );
                return Err(TerminationReason::DestinationCollision);
            }
            Err(e) => {
                self.stats.on_host_failure();
                tracing::error!(
                    stream = %stream,
                    source = %name,
                    target_app = %self.config.target_app,
                    error = %e,
                    "Failed to open duplicate publisher"
                );
                return Err(TerminationReason::HostFailure);
            }
        };

        self.stats.on_publisher_opened();
        tracing::info!(
            stream = %stream,
            source = %name,
            destination = %handle.destination(),
            target_app = %handle.target(),
            replayed = packets.len().saturating_sub(1),
            "Duplicate published"
        );

        let mut result = Ok(());
        for packet in &packets {
            if let Err(e) = handle.forward(packet) {
                self.stats.on_host_failure();
                tracing::error!(
                    stream = %stream,
                    destination = %handle.destination(),
                    error = %e,
                    "Forwarding to duplicate failed"
                );
                result = Err(TerminationReason::HostFailure);
                break;
            }
            self.stats.on_forwarded(packet.size());
        }

        entry.phase = RelayPhase::Active(handle);
        result
    }

    /// End the current attempt
    ///
    /// The listener is detached before the publisher is released, so no
    /// packet can reach the duplicate once this returns. Safe to call on an
    /// entry that is already terminated.
    fn terminate(
        &self,
        publishers: &mut PublisherLifecycle,
        stream: StreamId,
        entry: &mut SourceStream,
        reason: TerminationReason,
    ) {
        entry.detach();

        let previous = std::mem::replace(&mut entry.phase, RelayPhase::Terminated(reason));
        match previous {
            RelayPhase::Active(mut handle) => {
                if publishers.teardown(&mut handle) {
                    self.stats.on_publisher_closed();
                    tracing::info!(
                        stream = %stream,
                        destination = %handle.destination(),
                        reason = ?reason,
                        "Duplicate unpublished"
                    );
                }
            }
            RelayPhase::AwaitingName(_) => {
                tracing::debug!(
                    stream = %stream,
                    reason = ?reason,
                    elapsed_ms = entry.attached_at.elapsed().as_millis() as u64,
                    "Relay detached before publishing"
                );
            }
            RelayPhase::Terminated(earlier) => {
                entry.phase = RelayPhase::Terminated(earlier);
            }
        }
    }

    /// Arm a restart for a terminated stream
    fn schedule_restart(
        &self,
        table: &mut RelayTable,
        stream: StreamId,
        reason: TerminationReason,
    ) {
        if !reason.is_restartable() || self.stopped.load(Ordering::SeqCst) {
            return;
        }

        let engine = self.weak_self.clone();
        let Some(handle) = self.restarts.schedule(stream, move || async move {
            if let Some(engine) = engine.upgrade() {
                engine.restart(stream).await;
            }
        }) else {
            return;
        };

        let armed = table.pending.entry(stream).or_default();
        armed.retain(|restart| !restart.is_finished());
        armed.push(handle);

        self.stats.on_restart_scheduled();
        tracing::info!(
            stream = %stream,
            reason = ?reason,
            delay_ms = self.restarts.delay().as_millis() as u64,
            "Relay restart scheduled"
        );
    }

    /// Restart timer expired
    ///
    /// Both checks run under the table lock so a concurrent stream destroy
    /// cannot slip in between the check and the re-attach.
    async fn restart(&self, stream: StreamId) {
        let mut table = self.table.lock().await;
        if self.stopped.load(Ordering::SeqCst) {
            return;
        }
        if !self.host.stream_exists(stream) {
            tracing::debug!(stream = %stream, "Restart skipped, stream is gone");
            return;
        }

        if self.attach(&mut table, stream) {
            self.stats.on_restart_fired();
            tracing::info!(stream = %stream, "Relay restarted");
        }
    }
}

impl<H: Host> std::fmt::Debug for RelayEngine<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayEngine")
            .field("config", &self.config)
            .field("stopped", &self.stopped.load(Ordering::Relaxed))
            .finish()
    }
}
