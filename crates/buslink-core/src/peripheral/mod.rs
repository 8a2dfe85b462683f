//! The peripheral capability contract.
//!
//! Every virtual device — and every bus adapter that fronts a clocked
//! hardware model — implements [`Peripheral`].  The contract is deliberately
//! flat: one tick, sized reads and writes at three widths, reset, IRQ
//! callback registration, and an opaque render hook.  No inheritance chains;
//! the instrument bank holds `Box<dyn Peripheral + Send>` and dispatches to
//! every device.
//!
//! # Width semantics
//!
//! A device that never implements a width reports
//! [`AccessError::Unsupported`] for **every** address at that width.  The
//! bank treats `Unsupported` (and `OutOfRange`) as "not mine" — the device is
//! simply excluded from that access, it does not fail the aggregate.

use thiserror::Error;

/// Status a device reports for an access it cannot complete.
///
/// These are plain values, not non-local control transfer: a failed access
/// returns through the ordinary `Result` path and the caller decides what it
/// means in aggregate.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum AccessError {
    /// The device never implements this width.  Not an error in aggregate:
    /// the access simply is not for this device.
    #[error("access width not implemented by this device")]
    Unsupported,

    /// The address (plus the access width) falls outside the device's
    /// register block.  Reads in this state model a pulled-up bus and yield
    /// all-ones.
    #[error("address out of range for this device")]
    OutOfRange,

    /// A bus handshake exceeded its tick budget.  Surfaced to the caller and
    /// never auto-retried.
    #[error("bus handshake timed out")]
    Timeout,
}

/// Zero-argument interrupt callback a device invokes when an internal
/// condition transitions to pending.
pub type IrqCallback = Box<dyn Fn() + Send + Sync>;

/// Shared notifier handed to every device in a bank.  The bank cannot tell
/// the protocol peer which device raised an IRQ; the peer re-reads status
/// registers to find out.
pub type IrqNotifier = std::sync::Arc<dyn Fn() + Send + Sync>;

/// The capability contract.
///
/// Default method bodies mirror a device that stores nothing and supports
/// nothing: ticks and resets are no-ops, every access is `Unsupported`.
/// Concrete devices override exactly the widths and hooks they implement.
#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
pub trait Peripheral: Send {
    /// Advances device-internal state by one unit.  No-op for pure register
    /// devices; drives the clock of bus-backed devices.
    fn tick(&mut self) {}

    /// Returns the device to its power-on state.
    fn reset(&mut self) {}

    /// Writes an 8-bit value at `addr`.
    fn write8(&mut self, _addr: u64, _data: u64) -> Result<(), AccessError> {
        Err(AccessError::Unsupported)
    }

    /// Writes a 16-bit value at `addr`.
    fn write16(&mut self, _addr: u64, _data: u64) -> Result<(), AccessError> {
        Err(AccessError::Unsupported)
    }

    /// Writes a 32-bit value at `addr`.
    fn write32(&mut self, _addr: u64, _data: u64) -> Result<(), AccessError> {
        Err(AccessError::Unsupported)
    }

    /// Reads an 8-bit value at `addr`.
    fn read8(&mut self, _addr: u64) -> Result<u64, AccessError> {
        Err(AccessError::Unsupported)
    }

    /// Reads a 16-bit value at `addr`.
    fn read16(&mut self, _addr: u64) -> Result<u64, AccessError> {
        Err(AccessError::Unsupported)
    }

    /// Reads a 32-bit value at `addr`.
    fn read32(&mut self, _addr: u64) -> Result<u64, AccessError> {
        Err(AccessError::Unsupported)
    }

    /// Stores the interrupt callback.  At most one callback per device;
    /// registering again replaces the previous one.
    ///
    /// Devices fire the callback on the *edge* of a condition becoming
    /// pending — a condition that is already pending does not re-fire it.
    fn register_irq_callback(&mut self, cb: IrqCallback);

    /// Observation hook for an external visualizer.  The core never inspects
    /// what this does; the bank only fans the call out under its lock.
    fn render(&mut self) {}
}
