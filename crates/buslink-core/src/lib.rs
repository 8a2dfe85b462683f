//! # buslink-core
//!
//! Shared library for buslink containing the wire packet codec, the
//! peripheral capability contract, the generic register-block device model,
//! the address-space aggregator, and the clocked (Wishbone-style) bus
//! adapter.
//!
//! This crate is used by every out-of-process instrument.  It has zero
//! dependencies on sockets, UI frameworks, or an async runtime.
//!
//! # Architecture overview
//!
//! A buslink instrument is a separate process that a hardware/firmware
//! simulator talks to whenever the simulated firmware touches a memory range
//! assigned to a virtual device.  The simulator sends one fixed-size binary
//! request per bus access and expects exactly one response.  This crate
//! defines everything below the socket:
//!
//! - **`protocol`** – the 20-byte request/response/IRQ packet and its
//!   little-endian codec.
//!
//! - **`peripheral`** – the capability contract every virtual device
//!   implements: tick, sized reads/writes, IRQ callback registration.
//!
//! - **`regblock`** – bounds-checked fixed-size register storage that
//!   concrete devices layer side effects on top of (clear-on-read flags,
//!   write-triggers-step offsets).
//!
//! - **`bank`** – the aggregator that multiplexes many devices behind one
//!   address space: writes fan out to every device, reads AND-combine every
//!   accepting device's value (a bus with pull-ups and distributed address
//!   decoding).
//!
//! - **`bus`** – an adapter that turns a tick-driven synchronous bus target
//!   (for example a clocked hardware description model) into the capability
//!   contract, with a bounded handshake timeout.

pub mod bank;
pub mod bus;
pub mod peripheral;
pub mod protocol;
pub mod regblock;

// Re-export the most-used types at the crate root so callers can write
// `buslink_core::Peripheral` instead of `buslink_core::peripheral::Peripheral`.
pub use bank::{Dispatch, InstrumentBank};
pub use bus::{ClockedModel, WishboneAdapter, WishboneSignals};
pub use peripheral::{AccessError, IrqCallback, IrqNotifier, Peripheral};
pub use protocol::packet::{Packet, PacketType, PACKET_SIZE};
pub use regblock::RegisterBlock;

#[cfg(any(test, feature = "mocks"))]
pub use peripheral::MockPeripheral;
