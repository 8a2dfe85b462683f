//! Clocked Wishbone-style bus adapter.
//!
//! Adapts a tick-driven synchronous target model (for example a Verilated
//! hardware description) to the [`Peripheral`] capability contract.  The
//! adapter drives the classic Wishbone single-transfer handshake: assert
//! cycle/strobe with the address and (for writes) data, clock the model until
//! the target asserts acknowledge, then deassert and clock until acknowledge
//! falls again.  Both phases are bounded by a tick budget; exhausting it
//! reports [`AccessError::Timeout`] and deliberately leaves the lines in
//! their asserted state so a test harness can inspect the stuck transfer.
//!
//! The bus is 32-bit with word granularity: the two low address bits are
//! dropped (`addr >> 2`) and 8/16-bit transfers report `Unsupported` rather
//! than silently truncating or misaligning.

use crate::peripheral::{AccessError, IrqCallback, Peripheral};

/// Number of rising+falling clock pairs a handshake phase may take before it
/// is declared failed.
pub const DEFAULT_TICK_BUDGET: u32 = 20;

/// Full word byte-select.
const SEL_WORD: u8 = 0xF;

/// The control and data lines presented to a clocked target model.
///
/// Transient from the transfer's point of view: the adapter re-derives the
/// full line state on every transfer.
#[derive(Debug, Clone, Default)]
pub struct WishboneSignals {
    /// Clock line; the adapter drives one rising+falling pair per tick.
    pub clk: bool,
    /// Reset line, active high.
    pub rst: bool,
    /// Cycle valid.
    pub cyc: bool,
    /// Strobe (transfer qualifier).
    pub stb: bool,
    /// Write enable; clear for reads.
    pub we: bool,
    /// Byte select; always the full word here.
    pub sel: u8,
    /// Word address (byte address with the two low bits dropped).
    pub addr: u64,
    /// Write data, initiator → target.
    pub dat_w: u64,
    /// Read data, target → initiator.
    pub dat_r: u64,
    /// Acknowledge, asserted by the target when a transfer may complete.
    pub ack: bool,
}

/// A tick-driven synchronous bus target.
///
/// Implementations settle their internal state in [`eval`], reading and
/// driving the lines in [`signals`] the way a generated hardware model's
/// `eval()` samples its ports on each clock edge.
///
/// [`eval`]: ClockedModel::eval
/// [`signals`]: ClockedModel::signals
pub trait ClockedModel: Send {
    /// The bus lines shared between the adapter and the model.
    fn signals(&mut self) -> &mut WishboneSignals;

    /// Settles the model against the current line state.  Called once after
    /// every clock edge.
    fn eval(&mut self);
}

/// Implements [`Peripheral`] on top of a [`ClockedModel`] by driving the
/// Wishbone handshake with a bounded tick budget.
pub struct WishboneAdapter<M: ClockedModel> {
    model: M,
    tick_budget: u32,
    irq_callback: Option<IrqCallback>,
}

impl<M: ClockedModel> WishboneAdapter<M> {
    /// Wraps `model` with the default tick budget.
    pub fn new(model: M) -> Self {
        Self {
            model,
            tick_budget: DEFAULT_TICK_BUDGET,
            irq_callback: None,
        }
    }

    /// Overrides the handshake tick budget.
    pub fn with_tick_budget(mut self, tick_budget: u32) -> Self {
        self.tick_budget = tick_budget;
        self
    }

    /// The wrapped model, for raw line-level probes beyond the capability
    /// contract (e.g. sampling a serial transmit line in a test harness).
    pub fn model(&mut self) -> &mut M {
        &mut self.model
    }

    /// Drives `n` clock cycles.
    pub fn tick_n(&mut self, n: u64) {
        for _ in 0..n {
            self.model.signals().clk = true;
            self.model.eval();
            self.model.signals().clk = false;
            self.model.eval();
        }
    }

    /// Ticks until `ack` reaches `level`, up to the tick budget.
    ///
    /// On timeout the bus lines are left exactly as they were — the caller
    /// (or a probe) sees the stuck transfer, and nothing is auto-retried.
    fn wait_ack(&mut self, level: bool) -> Result<(), AccessError> {
        for _ in 0..self.tick_budget {
            self.tick_n(1);
            if self.model.signals().ack == level {
                return Ok(());
            }
        }
        Err(AccessError::Timeout)
    }

    fn word_write(&mut self, addr: u64, value: u64) -> Result<(), AccessError> {
        {
            let sig = self.model.signals();
            sig.we = true;
            sig.sel = SEL_WORD;
            sig.cyc = true;
            sig.stb = true;
            // Wishbone B4, 32-bit bus with byte granularity: drop the two
            // low address bits.
            sig.addr = addr >> 2;
            sig.dat_w = value;
        }

        self.wait_ack(true)?;

        {
            let sig = self.model.signals();
            sig.stb = false;
            sig.cyc = false;
            sig.we = false;
            sig.sel = 0;
        }

        self.wait_ack(false)
    }

    fn word_read(&mut self, addr: u64) -> Result<u64, AccessError> {
        {
            let sig = self.model.signals();
            sig.we = false;
            sig.sel = SEL_WORD;
            sig.cyc = true;
            sig.stb = true;
            sig.addr = addr >> 2;
        }

        self.wait_ack(true)?;

        // Latch read data at the moment acknowledge first asserts.
        let value = self.model.signals().dat_r;

        {
            let sig = self.model.signals();
            sig.cyc = false;
            sig.stb = false;
            sig.sel = 0;
        }

        self.wait_ack(false)?;
        Ok(value)
    }
}

impl<M: ClockedModel> Peripheral for WishboneAdapter<M> {
    fn tick(&mut self) {
        self.tick_n(1);
    }

    /// Fixed two-tick reset pulse: reset high for one tick, low for one.
    fn reset(&mut self) {
        self.model.signals().rst = true;
        self.tick_n(1);
        self.model.signals().rst = false;
        self.tick_n(1);
    }

    fn write32(&mut self, addr: u64, data: u64) -> Result<(), AccessError> {
        self.word_write(addr, data)
    }

    fn read32(&mut self, addr: u64) -> Result<u64, AccessError> {
        self.word_read(addr)
    }

    // 8/16-bit transfers are below word granularity and not representable on
    // this bus; the defaults already report Unsupported for them.

    fn register_irq_callback(&mut self, cb: IrqCallback) {
        self.irq_callback = Some(cb);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Word-addressed memory target that acks after a configurable latency.
    struct MemoryTarget {
        signals: WishboneSignals,
        words: Vec<u32>,
        ack_latency: u32,
        /// Rising edges seen while a request is pending.
        pending_for: u32,
        /// When set, the target never acknowledges anything.
        dead: bool,
    }

    impl MemoryTarget {
        fn new(ack_latency: u32) -> Self {
            Self {
                signals: WishboneSignals::default(),
                words: vec![0u32; 16],
                ack_latency,
                pending_for: 0,
                dead: false,
            }
        }
    }

    impl ClockedModel for MemoryTarget {
        fn signals(&mut self) -> &mut WishboneSignals {
            &mut self.signals
        }

        fn eval(&mut self) {
            // Sequential logic: act on the rising edge only.
            if !self.signals.clk {
                return;
            }
            if self.signals.rst {
                self.words.iter_mut().for_each(|w| *w = 0);
                self.signals.ack = false;
                self.pending_for = 0;
                return;
            }
            if self.dead {
                self.signals.ack = false;
                return;
            }
            if self.signals.cyc && self.signals.stb && !self.signals.ack {
                self.pending_for += 1;
                if self.pending_for > self.ack_latency {
                    let idx = self.signals.addr as usize % self.words.len();
                    if self.signals.we {
                        self.words[idx] = self.signals.dat_w as u32;
                    } else {
                        self.signals.dat_r = u64::from(self.words[idx]);
                    }
                    self.signals.ack = true;
                    self.pending_for = 0;
                }
            } else if !(self.signals.cyc && self.signals.stb) {
                self.signals.ack = false;
            }
        }
    }

    #[test]
    fn test_write_then_read_round_trips_through_the_handshake() {
        let mut bus = WishboneAdapter::new(MemoryTarget::new(2));
        bus.write32(0x08, 0xCAFE_F00D).unwrap();
        assert_eq!(bus.read32(0x08), Ok(0xCAFE_F00D));
    }

    #[test]
    fn test_byte_address_is_word_aligned_by_dropping_two_bits() {
        let mut bus = WishboneAdapter::new(MemoryTarget::new(0));
        bus.write32(0x0C, 77).unwrap();
        // 0x0C >> 2 == 3
        assert_eq!(bus.model().words[3], 77);
        // Addresses within the same word alias to it.
        assert_eq!(bus.read32(0x0E), Ok(77));
    }

    #[test]
    fn test_unsupported_widths_fail_for_every_address() {
        let mut bus = WishboneAdapter::new(MemoryTarget::new(0));
        for addr in [0u64, 2, 0x08] {
            assert_eq!(bus.write16(addr, 1), Err(AccessError::Unsupported));
            assert_eq!(bus.write8(addr, 1), Err(AccessError::Unsupported));
            assert_eq!(bus.read16(addr), Err(AccessError::Unsupported));
            assert_eq!(bus.read8(addr), Err(AccessError::Unsupported));
        }
    }

    #[test]
    fn test_timeout_when_ack_never_asserts() {
        let mut target = MemoryTarget::new(0);
        target.dead = true;
        let mut bus = WishboneAdapter::new(target).with_tick_budget(5);

        assert_eq!(bus.write32(0, 1), Err(AccessError::Timeout));
    }

    #[test]
    fn test_timeout_leaves_lines_asserted() {
        let mut target = MemoryTarget::new(0);
        target.dead = true;
        let mut bus = WishboneAdapter::new(target).with_tick_budget(5);

        let _ = bus.read32(0x04);

        let sig = bus.model().signals();
        assert!(sig.cyc, "cyc must stay asserted after timeout");
        assert!(sig.stb, "stb must stay asserted after timeout");
        assert_eq!(sig.sel, SEL_WORD);
        assert_eq!(sig.addr, 0x04 >> 2);
    }

    #[test]
    fn test_ack_latency_beyond_budget_times_out_exactly() {
        // Budget 5 but the target needs 6 rising edges before ack.
        let mut bus = WishboneAdapter::new(MemoryTarget::new(6)).with_tick_budget(5);
        assert_eq!(bus.write32(0, 1), Err(AccessError::Timeout));

        // With one more tick of budget the same transfer completes.
        let mut bus = WishboneAdapter::new(MemoryTarget::new(6)).with_tick_budget(7);
        assert_eq!(bus.write32(0, 1), Ok(()));
    }

    #[test]
    fn test_reset_pulses_rst_for_one_tick() {
        let mut bus = WishboneAdapter::new(MemoryTarget::new(0));
        bus.write32(0x00, 123).unwrap();

        bus.reset();

        assert!(!bus.model().signals.rst, "rst must be deasserted after reset");
        assert_eq!(bus.read32(0x00), Ok(0));
    }
}
