//! Protocol module containing the fixed-size wire packet and its codec.

pub mod packet;

pub use packet::{Packet, PacketType, PACKET_SIZE};
