//! Media packets handled by the relay
//!
//! The relay never looks inside a payload; it only needs the packet kind to
//! pick the matching append call on the duplicate publisher.

pub mod packet;

pub use packet::{Packet, PacketKind};
