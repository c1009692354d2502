//! Relay counters
//!
//! Updated from inside the engine's critical section and readable at any time
//! without taking it.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters for one relay engine
#[derive(Debug, Default)]
pub struct RelayStats {
    packets_forwarded: AtomicU64,
    packets_buffered: AtomicU64,
    bytes_forwarded: AtomicU64,
    buffer_overflows: AtomicU64,
    collisions: AtomicU64,
    host_failures: AtomicU64,
    publishers_opened: AtomicU64,
    publishers_closed: AtomicU64,
    restarts_scheduled: AtomicU64,
    restarts_fired: AtomicU64,
}

/// Point-in-time copy of [`RelayStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStatsSnapshot {
    /// Packets handed to a duplicate publisher
    pub packets_forwarded: u64,
    /// Packets held while a stream name was unresolved
    pub packets_buffered: u64,
    /// Payload bytes handed to duplicate publishers
    pub bytes_forwarded: u64,
    /// Relay attempts abandoned because the name never resolved
    pub buffer_overflows: u64,
    /// Relay attempts abandoned because the destination already existed
    pub collisions: u64,
    /// Relay attempts abandoned because a host call failed
    pub host_failures: u64,
    /// Duplicate publishers opened
    pub publishers_opened: u64,
    /// Duplicate publishers torn down
    pub publishers_closed: u64,
    /// Restarts armed
    pub restarts_scheduled: u64,
    /// Restarts that re-attached the relay to a stream
    pub restarts_fired: u64,
}

impl RelayStats {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn on_forwarded(&self, bytes: usize) {
        self.packets_forwarded.fetch_add(1, Ordering::Relaxed);
        self.bytes_forwarded.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn on_buffered(&self) {
        self.packets_buffered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn on_overflow(&self) {
        self.buffer_overflows.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn on_collision(&self) {
        self.collisions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn on_host_failure(&self) {
        self.host_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn on_publisher_opened(&self) {
        self.publishers_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn on_publisher_closed(&self) {
        self.publishers_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn on_restart_scheduled(&self) {
        self.restarts_scheduled.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn on_restart_fired(&self) {
        self.restarts_fired.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the current values
    pub fn snapshot(&self) -> RelayStatsSnapshot {
        RelayStatsSnapshot {
            packets_forwarded: self.packets_forwarded.load(Ordering::Relaxed),
            packets_buffered: self.packets_buffered.load(Ordering::Relaxed),
            bytes_forwarded: self.bytes_forwarded.load(Ordering::Relaxed),
            buffer_overflows: self.buffer_overflows.load(Ordering::Relaxed),
            collisions: self.collisions.load(Ordering::Relaxed),
            host_failures: self.host_failures.load(Ordering::Relaxed),
            publishers_opened: self.publishers_opened.load(Ordering::Relaxed),
            publishers_closed: self.publishers_closed.load(Ordering::Relaxed),
            restarts_scheduled: self.restarts_scheduled.load(Ordering::Relaxed),
            restarts_fired: self.restarts_fired.load(Ordering::Relaxed),
        }
    }
}

impl RelayStatsSnapshot {
    /// Duplicate publishers currently open
    pub fn active_publishers(&self) -> u64 {
        self.publishers_opened.saturating_sub(self.publishers_closed)
    }
}
