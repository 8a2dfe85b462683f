//! Keypad instrument.
//!
//! Register layout (32-bit access only):
//!
//! | offset | register       | behaviour                                  |
//! |--------|----------------|--------------------------------------------|
//! | 0x00   | `keys`         | current key state bitmap                   |
//! | 0x04   | `keys_changed` | change bitmap; reading resets it to zero   |
//!
//! An external source of key events (the visualizer, or a test harness)
//! calls [`KeypadInstrument::set_key_state`].  Each state change sets the
//! key's bit in `keys_changed` and fires the IRQ callback — edge triggered:
//! holding a key down produces exactly one notification.

use buslink_core::peripheral::{AccessError, IrqCallback, Peripheral};
use buslink_core::regblock::RegisterBlock;

/// Offset of the key state bitmap.
pub const KEYPAD_REG_KEYS: u64 = 0;
/// Offset of the self-clearing change bitmap.
pub const KEYPAD_REG_KEYS_CHANGED: u64 = 4;

const KEYS: usize = 0;
const KEYS_CHANGED: usize = 4;
const REG_SIZE: usize = 8;

/// A virtual keypad with up to 32 keys.
pub struct KeypadInstrument {
    regs: RegisterBlock<REG_SIZE>,
    irq_callback: Option<IrqCallback>,
}

impl Default for KeypadInstrument {
    fn default() -> Self {
        Self::new()
    }
}

impl KeypadInstrument {
    pub fn new() -> Self {
        Self {
            regs: RegisterBlock::new(),
            irq_callback: None,
        }
    }

    /// Presses or releases a key.
    ///
    /// A change sets the key's bit in `keys_changed` and fires the IRQ
    /// callback; repeating the same state is a no-op and raises nothing.
    pub fn set_key_state(&mut self, key: u32, pressed: bool) {
        let bit = 1u32 << (key % 32);
        let keys = self.regs.u32_at(KEYS);

        let changed = match (pressed, keys & bit != 0) {
            (true, false) => {
                self.regs.set_u32_at(KEYS, keys | bit);
                true
            }
            (false, true) => {
                self.regs.set_u32_at(KEYS, keys & !bit);
                true
            }
            _ => false,
        };

        if changed {
            let flags = self.regs.u32_at(KEYS_CHANGED);
            self.regs.set_u32_at(KEYS_CHANGED, flags | bit);
            if let Some(cb) = &self.irq_callback {
                cb();
            }
        }
    }
}

impl Peripheral for KeypadInstrument {
    fn reset(&mut self) {
        self.regs.clear();
    }

    fn write32(&mut self, addr: u64, data: u64) -> Result<(), AccessError> {
        self.regs.write32(addr, data)
    }

    fn read32(&mut self, addr: u64) -> Result<u64, AccessError> {
        let value = self.regs.read32(addr)?;
        // Reading the change bitmap resets it.
        if addr == KEYPAD_REG_KEYS_CHANGED {
            self.regs.set_u32_at(KEYS_CHANGED, 0);
        }
        Ok(value)
    }

    fn register_irq_callback(&mut self, cb: IrqCallback) {
        self.irq_callback = Some(cb);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn keypad_with_irq_counter() -> (KeypadInstrument, Arc<AtomicUsize>) {
        let mut keypad = KeypadInstrument::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        keypad.register_irq_callback(Box::new(move || {
            c.fetch_add(1, Ordering::Relaxed);
        }));
        (keypad, count)
    }

    #[test]
    fn test_registers_are_readable_and_zero_by_default() {
        let mut keypad = KeypadInstrument::new();
        assert_eq!(keypad.read32(KEYPAD_REG_KEYS), Ok(0));
        assert_eq!(keypad.read32(KEYPAD_REG_KEYS_CHANGED), Ok(0));
    }

    #[test]
    fn test_invalid_reads_are_out_of_range() {
        let mut keypad = KeypadInstrument::new();
        assert_eq!(
            keypad.read32(REG_SIZE as u64),
            Err(AccessError::OutOfRange)
        );
        assert_eq!(keypad.read32(5), Err(AccessError::OutOfRange));
    }

    #[test]
    fn test_unsupported_widths_report_unsupported() {
        let mut keypad = KeypadInstrument::new();
        assert_eq!(keypad.read8(0), Err(AccessError::Unsupported));
        assert_eq!(keypad.read16(0), Err(AccessError::Unsupported));
        assert_eq!(keypad.write8(0, 1), Err(AccessError::Unsupported));
        assert_eq!(keypad.write16(0, 1), Err(AccessError::Unsupported));
    }

    #[test]
    fn test_registers_reflect_key_press_and_release() {
        let (mut keypad, _) = keypad_with_irq_counter();
        for key in 0..10 {
            let bit = u64::from(1u32 << key);

            // The change register starts clear each round.
            assert_eq!(keypad.read32(KEYPAD_REG_KEYS_CHANGED), Ok(0));

            keypad.set_key_state(key, true);
            assert_eq!(keypad.read32(KEYPAD_REG_KEYS), Ok(bit));
            assert_eq!(keypad.read32(KEYPAD_REG_KEYS_CHANGED), Ok(bit));

            keypad.set_key_state(key, false);
            assert_eq!(keypad.read32(KEYPAD_REG_KEYS), Ok(0));
            assert_eq!(keypad.read32(KEYPAD_REG_KEYS_CHANGED), Ok(bit));
        }
    }

    #[test]
    fn test_change_register_clears_on_read() {
        let (mut keypad, _) = keypad_with_irq_counter();
        keypad.set_key_state(3, true);

        assert_eq!(keypad.read32(KEYPAD_REG_KEYS_CHANGED), Ok(1 << 3));
        assert_eq!(keypad.read32(KEYPAD_REG_KEYS_CHANGED), Ok(0));
        // The key state register is unaffected by the clear.
        assert_eq!(keypad.read32(KEYPAD_REG_KEYS), Ok(1 << 3));
    }

    #[test]
    fn test_irq_fires_on_edges_only() {
        let (mut keypad, count) = keypad_with_irq_counter();

        keypad.set_key_state(1, true);
        assert_eq!(count.load(Ordering::Relaxed), 1);

        // Same state again: no new edge, no new IRQ.
        keypad.set_key_state(1, true);
        assert_eq!(count.load(Ordering::Relaxed), 1);

        keypad.set_key_state(1, false);
        assert_eq!(count.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_reset_clears_both_registers() {
        let (mut keypad, _) = keypad_with_irq_counter();
        keypad.set_key_state(2, true);

        keypad.reset();

        assert_eq!(keypad.read32(KEYPAD_REG_KEYS), Ok(0));
        assert_eq!(keypad.read32(KEYPAD_REG_KEYS_CHANGED), Ok(0));
    }
}
