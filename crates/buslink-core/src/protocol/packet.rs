//! The buslink wire packet and its binary codec.
//!
//! Wire format (fixed, unpadded):
//! ```text
//! [type:4][addr:8][value:8]
//! ```
//! Total size: 20 bytes.  All fields are little-endian.  There is no length
//! prefix and no framing beyond the fixed size — the receiver always reads
//! exactly [`PACKET_SIZE`] bytes per packet, and a short read is a fatal
//! protocol error, never something to reassemble or retry.
//!
//! The byte order is pinned to little-endian so the layout is portable; the
//! historical peers of this protocol exchanged a native packed struct between
//! little-endian hosts, and this codec stays wire compatible with them.

/// Total size of one packet on the wire, in bytes.
pub const PACKET_SIZE: usize = 20;

/// Value placed in `value` when a field carries no meaning (pulled-up bus).
pub const ALL_ONES: u64 = u64::MAX;

/// All packet type codes.
///
/// Requests (simulator → instrument): `TickClock`, `Write*`, `Read*`,
/// `Reset`, `Handshake`, `Disconnect`.  Responses (instrument → simulator):
/// `Ok`, `Error`, `Handshake`.  `Irq` travels only on the irq channel and is
/// never answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum PacketType {
    /// Invalid or unrecognized message.
    Invalid = 0,
    /// Advance every device's internal clock by one unit.
    TickClock = 1,
    /// Write a 32-bit value to an address.
    Write32 = 2,
    /// Read a 32-bit value from an address.
    Read32 = 3,
    /// Reset every device.
    Reset = 4,
    /// Interrupt notification (irq channel only; addr/value carry no meaning).
    Irq = 5,
    /// Error response.
    Error = 6,
    /// Success response.
    Ok = 7,
    /// Stop serving and close the connection (no response is sent).
    Disconnect = 8,
    /// Handshake; answered with a handshake and no side effects.
    Handshake = 9,
    /// Write a 16-bit value to an address.
    Write16 = 10,
    /// Read a 16-bit value from an address.
    Read16 = 11,
    /// Write an 8-bit value to an address.
    Write8 = 12,
    /// Read an 8-bit value from an address.
    Read8 = 13,
}

impl PacketType {
    /// Maps a wire code to a packet type.
    ///
    /// Unknown codes map to [`PacketType::Invalid`] rather than failing the
    /// decode: an unrecognized request is answered with an ERROR response,
    /// it does not kill the serving loop.
    pub fn from_wire(code: u32) -> Self {
        match code {
            1 => PacketType::TickClock,
            2 => PacketType::Write32,
            3 => PacketType::Read32,
            4 => PacketType::Reset,
            5 => PacketType::Irq,
            6 => PacketType::Error,
            7 => PacketType::Ok,
            8 => PacketType::Disconnect,
            9 => PacketType::Handshake,
            10 => PacketType::Write16,
            11 => PacketType::Read16,
            12 => PacketType::Write8,
            13 => PacketType::Read8,
            _ => PacketType::Invalid,
        }
    }
}

/// One request, response, or IRQ notification.
///
/// Transient: one instance per request or per IRQ notification, never
/// persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet {
    /// Discriminates the operation or response kind.
    pub packet_type: PacketType,
    /// Address for the current operation, if applicable.
    pub addr: u64,
    /// Value for the current operation, if applicable.
    pub value: u64,
}

impl Packet {
    /// Builds a request or notification packet.
    pub fn new(packet_type: PacketType, addr: u64, value: u64) -> Self {
        Self {
            packet_type,
            addr,
            value,
        }
    }

    /// Success response carrying a read value.
    pub fn ok(value: u64) -> Self {
        Self::new(PacketType::Ok, 0, value)
    }

    /// Success response for an operation with no meaningful value (writes,
    /// tick, reset).  `value` is all-ones, modeling an unused pulled-up bus.
    pub fn ok_empty() -> Self {
        Self::new(PacketType::Ok, 0, ALL_ONES)
    }

    /// Error response; `value` is left at all-ones.
    pub fn error() -> Self {
        Self::new(PacketType::Error, 0, ALL_ONES)
    }

    /// Handshake response.  `value` is all-ones like every other response
    /// whose value field carries no meaning, matching historical peers
    /// byte for byte.
    pub fn handshake() -> Self {
        Self::new(PacketType::Handshake, 0, ALL_ONES)
    }

    /// IRQ notification.  addr/value carry no meaning; they are sent as
    /// zeroes so the bytes on the wire are deterministic.
    pub fn irq() -> Self {
        Self::new(PacketType::Irq, 0, 0)
    }

    /// Encodes the packet into its fixed 20-byte wire representation.
    pub fn to_bytes(&self) -> [u8; PACKET_SIZE] {
        let mut buf = [0u8; PACKET_SIZE];
        buf[0..4].copy_from_slice(&(self.packet_type as u32).to_le_bytes());
        buf[4..12].copy_from_slice(&self.addr.to_le_bytes());
        buf[12..20].copy_from_slice(&self.value.to_le_bytes());
        buf
    }

    /// Decodes a packet from exactly [`PACKET_SIZE`] bytes.
    ///
    /// Never fails: unknown type codes become [`PacketType::Invalid`], which
    /// the dispatcher answers with an ERROR response.
    pub fn from_bytes(bytes: &[u8; PACKET_SIZE]) -> Self {
        let code = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let mut addr_bytes = [0u8; 8];
        addr_bytes.copy_from_slice(&bytes[4..12]);
        let mut value_bytes = [0u8; 8];
        value_bytes.copy_from_slice(&bytes[12..20]);
        let addr = u64::from_le_bytes(addr_bytes);
        let value = u64::from_le_bytes(value_bytes);
        Self {
            packet_type: PacketType::from_wire(code),
            addr,
            value,
        }
    }
}
