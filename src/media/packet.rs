//! Live packet types
//!
//! Packets are handed to the relay by the host and forwarded unchanged to the
//! duplicate stream. Payloads are `bytes::Bytes`, so buffering and replaying
//! a packet only bumps a reference count.

use bytes::Bytes;

/// Kind of live packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketKind {
    /// Audio data
    Audio,
    /// Video data
    Video,
    /// Script data encoded as AMF0 (onMetaData, cue points)
    Data,
    /// Script data encoded as AMF3
    DataAmf3,
}

/// A single live packet from a source stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Kind of packet
    pub kind: PacketKind,
    /// Payload bytes (opaque to the relay)
    pub payload: Bytes,
    /// Absolute timestamp in milliseconds
    pub timestamp: u64,
}

impl Packet {
    /// Create a packet of any kind
    pub fn new(kind: PacketKind, payload: impl Into<Bytes>, timestamp: u64) -> Self {
        Self {
            kind,
            payload: payload.into(),
            timestamp,
        }
    }

    /// Create an audio packet
    pub fn audio(payload: impl Into<Bytes>, timestamp: u64) -> Self {
        Self::new(PacketKind::Audio, payload, timestamp)
    }

    /// Create a video packet
    pub fn video(payload: impl Into<Bytes>, timestamp: u64) -> Self {
        Self::new(PacketKind::Video, payload, timestamp)
    }

    /// Create an AMF0 data packet
    pub fn data(payload: impl Into<Bytes>, timestamp: u64) -> Self {
        Self::new(PacketKind::Data, payload, timestamp)
    }

    /// Payload size in bytes
    pub fn size(&self) -> usize {
        self.payload.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        let audio = Packet::audio(Bytes::from_static(&[0xAF, 0x01]), 1000);
        assert_eq!(audio.kind, PacketKind::Audio);
        assert_eq!(audio.timestamp, 1000);
        assert_eq!(audio.size(), 2);

        assert_eq!(Packet::video(vec![0x17], 0).kind, PacketKind::Video);
        assert_eq!(Packet::data(Bytes::new(), 0).kind, PacketKind::Data);
    }

    #[test]
    fn test_clone_shares_payload() {
        let packet = Packet::video(vec![1u8; 64], 33);
        let copy = packet.clone();
        assert_eq!(packet.payload.as_ptr(), copy.payload.as_ptr());
    }
}
