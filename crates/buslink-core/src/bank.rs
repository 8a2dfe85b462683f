//! The address-space aggregator.
//!
//! An [`InstrumentBank`] combines N devices into the single flat address
//! space the protocol peer sees.  There is deliberately no address decoding
//! and no exclusivity:
//!
//! - a **write** is offered to *every* device (no short-circuit) and
//!   succeeds if at least one accepts it — overlapping claims fan the side
//!   effects out to each accepting device;
//! - a **read** starts from an all-ones accumulator (pulled-up bus) and ANDs
//!   in the value of every device that accepts the address; if none accept,
//!   the aggregate fails and all-ones is what the peer gets.
//!
//! A device answering `Unsupported` or `OutOfRange` is merely "not mine" for
//! that access; it never fails the aggregate by itself.
//!
//! The bank also owns the request → response mapping ([`handle_request`]),
//! kept free of sockets so it can be exercised directly in tests.  The
//! serving loop that feeds it lives in the instrument application crate.
//!
//! [`handle_request`]: InstrumentBank::handle_request

use tracing::warn;

use crate::peripheral::{IrqNotifier, Peripheral};
use crate::protocol::packet::{Packet, PacketType, ALL_ONES};

/// Outcome of dispatching one request.
#[derive(Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// Send this response and keep serving.
    Respond(Packet),
    /// Stop the serving loop; no response is sent.
    Stop,
}

/// Multiplexes many devices behind one protocol endpoint.
///
/// Devices are added once, before the serving loop starts, and never
/// removed.  Identity and dispatch order is insertion order.
#[derive(Default)]
pub struct InstrumentBank {
    instruments: Vec<Box<dyn Peripheral + Send>>,
    irq_notifier: Option<IrqNotifier>,
}

impl InstrumentBank {
    /// Creates an empty bank.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the single IRQ notifier shared by every device.
    ///
    /// Must be called before [`add_instrument`] so the notifier can be wired
    /// into each device as it is added.  The protocol peer cannot tell which
    /// device raised an IRQ; it re-reads status registers to find out.
    ///
    /// [`add_instrument`]: InstrumentBank::add_instrument
    pub fn set_irq_notifier(&mut self, notifier: IrqNotifier) {
        self.irq_notifier = Some(notifier);
    }

    /// Adds a device to the bank and wires the shared IRQ notifier into it.
    pub fn add_instrument(&mut self, mut instrument: Box<dyn Peripheral + Send>) {
        if let Some(notifier) = &self.irq_notifier {
            let notifier = std::sync::Arc::clone(notifier);
            instrument.register_irq_callback(Box::new(move || notifier()));
        }
        self.instruments.push(instrument);
    }

    /// Number of devices in the bank.
    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    /// Whether the bank holds no devices.
    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    // ── Fan-out operations ─────────────────────────────────────────────────

    /// Advances every device by one tick.
    pub fn tick(&mut self) {
        for i in &mut self.instruments {
            i.tick();
        }
    }

    /// Resets every device.
    pub fn reset(&mut self) {
        for i in &mut self.instruments {
            i.reset();
        }
    }

    /// Runs every device's render hook.  Called by an external observation
    /// loop while it holds the bank's lock; the bank never inspects what a
    /// device renders.
    pub fn render(&mut self) {
        for i in &mut self.instruments {
            i.render();
        }
    }

    fn write_with(
        &mut self,
        addr: u64,
        value: u64,
        f: impl Fn(&mut (dyn Peripheral + Send), u64, u64) -> Result<(), crate::AccessError>,
    ) -> bool {
        let mut accepted = false;
        for i in &mut self.instruments {
            if f(i.as_mut(), addr, value).is_ok() {
                accepted = true;
            }
        }
        accepted
    }

    fn read_with(
        &mut self,
        addr: u64,
        f: impl Fn(&mut (dyn Peripheral + Send), u64) -> Result<u64, crate::AccessError>,
    ) -> Option<u64> {
        let mut accumulator = ALL_ONES;
        let mut accepted = false;
        for i in &mut self.instruments {
            if let Ok(v) = f(i.as_mut(), addr) {
                accumulator &= v;
                accepted = true;
            }
        }
        accepted.then_some(accumulator)
    }

    /// 8-bit aggregate write; `true` iff at least one device accepted.
    pub fn write8(&mut self, addr: u64, value: u64) -> bool {
        self.write_with(addr, value, |i, a, v| i.write8(a, v))
    }

    /// 16-bit aggregate write; `true` iff at least one device accepted.
    pub fn write16(&mut self, addr: u64, value: u64) -> bool {
        self.write_with(addr, value, |i, a, v| i.write16(a, v))
    }

    /// 32-bit aggregate write; `true` iff at least one device accepted.
    pub fn write32(&mut self, addr: u64, value: u64) -> bool {
        self.write_with(addr, value, |i, a, v| i.write32(a, v))
    }

    /// 8-bit aggregate read; `None` (meaning all-ones) if no device accepted.
    pub fn read8(&mut self, addr: u64) -> Option<u64> {
        self.read_with(addr, |i, a| i.read8(a))
    }

    /// 16-bit aggregate read; `None` if no device accepted.
    pub fn read16(&mut self, addr: u64) -> Option<u64> {
        self.read_with(addr, |i, a| i.read16(a))
    }

    /// 32-bit aggregate read; `None` if no device accepted.
    pub fn read32(&mut self, addr: u64) -> Option<u64> {
        self.read_with(addr, |i, a| i.read32(a))
    }

    // ── Request dispatch ───────────────────────────────────────────────────

    /// Maps one request packet to its response.
    ///
    /// - `HANDSHAKE` answers `HANDSHAKE` with no state mutation anywhere.
    /// - `WRITE*`/`READ*`/`TICK_CLOCK`/`RESET` dispatch to the devices and
    ///   answer `OK` (value populated for reads, all-ones otherwise) or
    ///   `ERROR` with value all-ones.
    /// - `DISCONNECT` stops the loop; no response is sent.
    /// - Anything else — including response-typed or unknown packets —
    ///   answers `ERROR`.
    pub fn handle_request(&mut self, req: &Packet) -> Dispatch {
        let res = match req.packet_type {
            PacketType::Handshake => Packet::handshake(),
            PacketType::Disconnect => return Dispatch::Stop,
            PacketType::TickClock => {
                self.tick();
                Packet::ok_empty()
            }
            PacketType::Reset => {
                self.reset();
                Packet::ok_empty()
            }
            PacketType::Write8 => self.write_response(req, Self::write8),
            PacketType::Write16 => self.write_response(req, Self::write16),
            PacketType::Write32 => self.write_response(req, Self::write32),
            PacketType::Read8 => self.read_response(req, Self::read8),
            PacketType::Read16 => self.read_response(req, Self::read16),
            PacketType::Read32 => self.read_response(req, Self::read32),
            other => {
                warn!(packet_type = ?other, "unexpected request packet");
                Packet::error()
            }
        };
        Dispatch::Respond(res)
    }

    fn write_response(&mut self, req: &Packet, f: impl Fn(&mut Self, u64, u64) -> bool) -> Packet {
        if f(self, req.addr, req.value) {
            Packet::ok_empty()
        } else {
            warn!(addr = format_args!("{:#010x}", req.addr), "write rejected by every device");
            Packet::error()
        }
    }

    fn read_response(&mut self, req: &Packet, f: impl Fn(&mut Self, u64) -> Option<u64>) -> Packet {
        match f(self, req.addr) {
            Some(value) => Packet::ok(value),
            None => {
                warn!(addr = format_args!("{:#010x}", req.addr), "read rejected by every device");
                Packet::error()
            }
        }
    }
}
