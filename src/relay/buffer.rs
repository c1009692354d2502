//! Delay buffer for streams whose name is not known yet
//!
//! Some publishers start sending media before the host has assigned the
//! stream its name. Until the name resolves there is no way to decide whether
//! the stream should be duplicated, so packets are held here. Once the name
//! resolves the held packets are released in arrival order, followed by the
//! packet that triggered the release.

use std::collections::VecDeque;

use crate::media::Packet;

/// Outcome of offering a packet to the buffer
#[derive(Debug, PartialEq, Eq)]
pub enum BufferDecision {
    /// Packet held until the name resolves
    Buffered,
    /// Name resolved: buffered packets followed by the triggering packet
    Flush(Vec<Packet>),
    /// Buffer full and name still unresolved; everything was discarded
    Rejected {
        /// Number of packets that were held when the buffer gave up
        discarded: usize,
    },
}

/// Bounded FIFO of packets awaiting stream name resolution
#[derive(Debug)]
pub struct DelayedPacketBuffer {
    /// Maximum number of held packets
    max_packets: usize,
    /// Held packets, oldest first
    packets: VecDeque<Packet>,
    /// Held payload size in bytes
    size: usize,
}

impl DelayedPacketBuffer {
    /// Create a buffer holding at most `max_packets` packets
    pub fn new(max_packets: usize) -> Self {
        Self {
            max_packets,
            packets: VecDeque::new(),
            size: 0,
        }
    }

    /// Offer a packet
    ///
    /// `name_resolved` is the host's answer for the current packet.
    pub fn accept(&mut self, packet: Packet, name_resolved: bool) -> BufferDecision {
        if name_resolved {
            let mut released = self.drain();
            released.push(packet);
            return BufferDecision::Flush(released);
        }

        if self.packets.len() >= self.max_packets {
            let discarded = self.packets.len();
            self.clear();
            return BufferDecision::Rejected { discarded };
        }

        self.size += packet.size();
        self.packets.push_back(packet);
        BufferDecision::Buffered
    }

    /// Take every held packet, oldest first
    pub fn drain(&mut self) -> Vec<Packet> {
        self.size = 0;
        self.packets.drain(..).collect()
    }

    /// Drop every held packet
    pub fn clear(&mut self) {
        self.packets.clear();
        self.size = 0;
    }

    /// Number of held packets
    pub fn len(&self) -> usize {
        self.packets.len()
    }

    /// Whether nothing is held
    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Held payload size in bytes
    pub fn size(&self) -> usize {
        self.size
    }

}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn packet(ts: u64) -> Packet {
        Packet::video(Bytes::from(vec![0u8; 10]), ts)
    }

    #[test]
    fn test_buffers_while_unresolved() {
        let mut buffer = DelayedPacketBuffer::new(3);

        assert_eq!(buffer.accept(packet(0), false), BufferDecision::Buffered);
        assert_eq!(buffer.accept(packet(33), false), BufferDecision::Buffered);

        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.size(), 20);
    }

    #[test]
    fn test_flush_in_arrival_order_then_trigger() {
        let mut buffer = DelayedPacketBuffer::new(10);
        for ts in [10, 20, 30] {
            buffer.accept(packet(ts), false);
        }

        let BufferDecision::Flush(released) = buffer.accept(packet(40), true) else {
            panic!("expected flush");
        };

        let stamps: Vec<u64> = released.iter().map(|p| p.timestamp).collect();
        assert_eq!(stamps, vec![10, 20, 30, 40]);
        assert!(buffer.is_empty());
        assert_eq!(buffer.size(), 0);
    }

    #[test]
    fn test_flush_with_empty_buffer() {
        let mut buffer = DelayedPacketBuffer::new(10);

        assert_eq!(
            buffer.accept(packet(5), true),
            BufferDecision::Flush(vec![packet(5)])
        );
    }

    #[test]
    fn test_reject_on_overflow() {
        let mut buffer = DelayedPacketBuffer::new(2);
        buffer.accept(packet(0), false);
        buffer.accept(packet(1), false);

        assert_eq!(
            buffer.accept(packet(2), false),
            BufferDecision::Rejected { discarded: 2 }
        );
        assert!(buffer.is_empty());
        assert_eq!(buffer.size(), 0);
    }

    #[test]
    fn test_full_buffer_still_flushes_when_resolved() {
        let mut buffer = DelayedPacketBuffer::new(2);
        buffer.accept(packet(0), false);
        buffer.accept(packet(1), false);

        let BufferDecision::Flush(released) = buffer.accept(packet(2), true) else {
            panic!("expected flush");
        };
        assert_eq!(released.len(), 3);
    }

    #[test]
    fn test_zero_capacity_rejects_first_unresolved() {
        let mut buffer = DelayedPacketBuffer::new(0);

        assert_eq!(
            buffer.accept(packet(0), false),
            BufferDecision::Rejected { discarded: 0 }
        );
        assert!(buffer.is_empty());
    }
}
