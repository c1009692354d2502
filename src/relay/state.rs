//! Per-source-stream relay state
//!
//! This module defines the entry the engine keeps for every source stream it
//! is listening to.

use std::time::Instant;

use crate::host::Subscription;

use super::buffer::DelayedPacketBuffer;
use super::publisher::PublisherHandle;

/// Observable relay state of a source stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    /// Relay is not listening to the stream
    Idle,
    /// Listening, name unresolved, packets being buffered
    AwaitingName,
    /// Duplicate publisher live, packets forwarded
    Active,
    /// Relay attempt over; the listener is detached
    Terminated(TerminationReason),
}

/// Why a relay attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// Stream name not selected by the rule (or already a duplicate)
    RuleMismatch,
    /// Name never resolved before the delay buffer filled up
    BufferOverflow,
    /// Destination name already in use on the target
    DestinationCollision,
    /// Publisher open or forward call failed
    HostFailure,
    /// Source stream stopped publishing
    Unpublished,
    /// Target application instance went away
    TargetDestroyed,
}

impl TerminationReason {
    /// Whether this ending may be followed by a scheduled restart
    pub fn is_restartable(self) -> bool {
        matches!(
            self,
            TerminationReason::BufferOverflow
                | TerminationReason::DestinationCollision
                | TerminationReason::HostFailure
                | TerminationReason::TargetDestroyed
        )
    }
}

/// Phase of a relay attempt
#[derive(Debug)]
pub(crate) enum RelayPhase {
    AwaitingName(DelayedPacketBuffer),
    Active(PublisherHandle),
    Terminated(TerminationReason),
}

/// Entry for a single source stream in the engine's table
#[derive(Debug)]
pub(crate) struct SourceStream {
    /// Current phase
    pub phase: RelayPhase,

    /// Packet listener on the host (None once detached)
    pub subscription: Option<Subscription>,

    /// When the current relay attempt started
    pub attached_at: Instant,
}

impl SourceStream {
    /// Start a new attempt with an attached listener
    pub fn new(subscription: Subscription, max_buffered_packets: usize) -> Self {
        Self {
            phase: RelayPhase::AwaitingName(DelayedPacketBuffer::new(max_buffered_packets)),
            subscription: Some(subscription),
            attached_at: Instant::now(),
        }
    }

    /// Public view of the phase
    pub fn state(&self) -> RelayState {
        match &self.phase {
            RelayPhase::AwaitingName(_) => RelayState::AwaitingName,
            RelayPhase::Active(_) => RelayState::Active,
            RelayPhase::Terminated(reason) => RelayState::Terminated(*reason),
        }
    }

    /// Whether the listener is still attached
    pub fn is_listening(&self) -> bool {
        self.subscription.is_some()
    }

    /// Detach the packet listener; no-op if already detached
    pub fn detach(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }

    /// Publisher handle, if active
    pub fn publisher(&self) -> Option<&PublisherHandle> {
        match &self.phase {
            RelayPhase::Active(handle) => Some(handle),
            _ => None,
        }
    }
}
