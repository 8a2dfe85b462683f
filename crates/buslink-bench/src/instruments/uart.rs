//! LiteX-style UART instrument behind the Wishbone adapter.
//!
//! The target is a behavioral stand-in for a generated UART core: a CSR
//! block in the 0x800 window and a transmit shift register driving the
//! `serial_tx` line at 115200 baud off a 100 MHz clock.  Only the transmit
//! path is modeled; the receive registers read back as permanently empty.
//!
//! Register map (byte addresses; the bus drops the two low bits):
//!
//! | offset | register     | behaviour                                    |
//! |--------|--------------|----------------------------------------------|
//! | 0x800  | `rxtx`       | write: queue a byte for transmit; read: 0    |
//! | 0x804  | `txfull`     | 1 while a frame is shifting out              |
//! | 0x808  | `rxempty`    | always 1 (no receive path)                   |
//! | 0x80C  | `ev_status`  | bit 0: transmitter idle                      |
//! | 0x810  | `ev_pending` | bit 0 set when a frame completes; W1C        |
//! | 0x814  | `ev_enable`  | plain storage                                |

use buslink_core::bus::{ClockedModel, WishboneAdapter, WishboneSignals};
use buslink_core::peripheral::{AccessError, IrqCallback, Peripheral};

pub const UART_REG_RXTX: u64 = 0x800;
pub const UART_REG_TXFULL: u64 = 0x804;
pub const UART_REG_RXEMPTY: u64 = 0x808;
pub const UART_REG_EV_STATUS: u64 = 0x80C;
pub const UART_REG_EV_PENDING: u64 = 0x810;
pub const UART_REG_EV_ENABLE: u64 = 0x814;

/// Transmit event bit in `ev_status`/`ev_pending`.
pub const UART_EV_TX: u64 = 1 << 0;

pub const UART_FREQ: u64 = 100_000_000;
pub const UART_BAUD: u64 = 115_200;
/// Clock ticks per serial bit time.
pub const TICKS_PER_BIT: u64 = UART_FREQ / UART_BAUD;

/// Start bit, eight data bits LSB-first, stop bit.
const FRAME_BITS: u32 = 10;

/// Behavioral UART core clocked by the bus adapter.
pub struct UartModel {
    signals: WishboneSignals,
    /// Transmit line, idle high.
    serial_tx: bool,
    /// Remaining frame, shifted out LSB-first; meaningful while `bits_left > 0`.
    shift: u16,
    bits_left: u32,
    bit_ticks: u64,
    ev_pending: u64,
    ev_enable: u64,
}

impl UartModel {
    pub fn new() -> Self {
        Self {
            signals: WishboneSignals::default(),
            serial_tx: true,
            shift: 0,
            bits_left: 0,
            bit_ticks: 0,
            ev_pending: 0,
            ev_enable: 0,
        }
    }

    fn tx_busy(&self) -> bool {
        self.bits_left > 0
    }

    fn load_frame(&mut self, data: u8) {
        // Bit 0 is the start bit (0), bit 9 the stop bit (1).
        self.shift = (1 << 9) | (u16::from(data) << 1);
        self.bits_left = FRAME_BITS;
        self.bit_ticks = 0;
        self.serial_tx = false;
    }

    fn shift_tx(&mut self) {
        if !self.tx_busy() {
            return;
        }
        self.bit_ticks += 1;
        if self.bit_ticks < TICKS_PER_BIT {
            return;
        }
        self.bit_ticks = 0;
        self.bits_left -= 1;
        if self.bits_left == 0 {
            self.serial_tx = true;
            self.ev_pending |= UART_EV_TX;
        } else {
            self.shift >>= 1;
            self.serial_tx = self.shift & 1 != 0;
        }
    }

    fn csr_read(&mut self, word_addr: u64) -> u64 {
        match word_addr << 2 {
            UART_REG_RXTX => 0,
            UART_REG_TXFULL => u64::from(self.tx_busy()),
            UART_REG_RXEMPTY => 1,
            UART_REG_EV_STATUS => u64::from(!self.tx_busy()),
            UART_REG_EV_PENDING => self.ev_pending,
            UART_REG_EV_ENABLE => self.ev_enable,
            _ => 0,
        }
    }

    fn csr_write(&mut self, word_addr: u64, data: u64) {
        match word_addr << 2 {
            UART_REG_RXTX => {
                // A write while a frame is in flight is dropped; `txfull`
                // tells the initiator to wait.
                if !self.tx_busy() {
                    self.load_frame(data as u8);
                }
            }
            UART_REG_EV_PENDING => self.ev_pending &= !data,
            UART_REG_EV_ENABLE => self.ev_enable = data,
            _ => {}
        }
    }
}

impl Default for UartModel {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockedModel for UartModel {
    fn signals(&mut self) -> &mut WishboneSignals {
        &mut self.signals
    }

    fn eval(&mut self) {
        // Sequential core: everything happens on the rising edge.
        if !self.signals.clk {
            return;
        }
        if self.signals.rst {
            self.serial_tx = true;
            self.shift = 0;
            self.bits_left = 0;
            self.bit_ticks = 0;
            self.ev_pending = 0;
            self.ev_enable = 0;
            self.signals.ack = false;
            return;
        }

        self.shift_tx();

        // Single-cycle CSR bus: ack on the edge the request is seen.
        if self.signals.cyc && self.signals.stb && !self.signals.ack {
            let addr = self.signals.addr;
            if self.signals.we {
                let data = self.signals.dat_w;
                self.csr_write(addr, data);
            } else {
                self.signals.dat_r = self.csr_read(addr);
            }
            self.signals.ack = true;
        } else if !(self.signals.cyc && self.signals.stb) {
            self.signals.ack = false;
        }
    }
}

/// The UART as a bank-registrable peripheral, plus line-level probes for
/// harnesses that sample the serial output.
pub struct UartInstrument {
    bus: WishboneAdapter<UartModel>,
}

impl UartInstrument {
    pub fn new() -> Self {
        Self {
            bus: WishboneAdapter::new(UartModel::new()),
        }
    }

    /// Same, with a non-default handshake tick budget.
    pub fn with_tick_budget(tick_budget: u32) -> Self {
        Self {
            bus: WishboneAdapter::new(UartModel::new()).with_tick_budget(tick_budget),
        }
    }

    /// Queues one byte on the transmitter via the CSR bus.
    pub fn tx(&mut self, data: u8) -> Result<(), AccessError> {
        self.bus.write32(UART_REG_RXTX, u64::from(data))
    }

    /// Current level of the serial transmit line.
    pub fn tx_line(&mut self) -> bool {
        self.bus.model().serial_tx
    }

    /// Drives `n` clock cycles without any bus activity.
    pub fn tick_n(&mut self, n: u64) {
        self.bus.tick_n(n);
    }
}

impl Default for UartInstrument {
    fn default() -> Self {
        Self::new()
    }
}

impl Peripheral for UartInstrument {
    fn tick(&mut self) {
        self.bus.tick();
    }

    fn reset(&mut self) {
        self.bus.reset();
    }

    fn write32(&mut self, addr: u64, data: u64) -> Result<(), AccessError> {
        self.bus.write32(addr, data)
    }

    fn read32(&mut self, addr: u64) -> Result<u64, AccessError> {
        self.bus.read32(addr)
    }

    fn register_irq_callback(&mut self, cb: IrqCallback) {
        self.bus.register_irq_callback(cb);
    }
}
