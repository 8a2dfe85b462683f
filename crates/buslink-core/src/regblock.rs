//! Generic bounds-checked register-block storage.
//!
//! A register block is a fixed-layout, fixed-size byte structure whose
//! contents are addressed by offset.  Concrete devices embed one and layer
//! side effects on specific offsets *before or instead of* the generic path:
//! a write-triggers-step control offset never touches storage, a clear-on-
//! read status offset resets itself after the generic read.
//!
//! Every accessor enforces `addr + width <= N`.  Out-of-range reads model a
//! floating, pulled-up bus: the caller substitutes all-ones for the data.
//! Out-of-range writes change nothing.

use crate::peripheral::AccessError;

/// Fixed-size register storage, addressed by byte offset, little-endian.
#[derive(Debug, Clone)]
pub struct RegisterBlock<const N: usize> {
    bytes: [u8; N],
}

impl<const N: usize> Default for RegisterBlock<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> RegisterBlock<N> {
    /// Creates a zeroed register block.
    pub fn new() -> Self {
        Self { bytes: [0u8; N] }
    }

    /// Total size of the block in bytes.
    pub const fn size(&self) -> usize {
        N
    }

    /// Resets every byte to zero.
    pub fn clear(&mut self) {
        self.bytes = [0u8; N];
    }

    fn check(addr: u64, width: usize) -> Result<usize, AccessError> {
        let addr = usize::try_from(addr).map_err(|_| AccessError::OutOfRange)?;
        if addr.checked_add(width).map_or(true, |end| end > N) {
            return Err(AccessError::OutOfRange);
        }
        Ok(addr)
    }

    /// Reads the 8-bit value at `addr`.
    pub fn read8(&self, addr: u64) -> Result<u64, AccessError> {
        let a = Self::check(addr, 1)?;
        Ok(u64::from(self.bytes[a]))
    }

    /// Reads the 16-bit value at `addr`.
    pub fn read16(&self, addr: u64) -> Result<u64, AccessError> {
        let a = Self::check(addr, 2)?;
        Ok(u64::from(u16::from_le_bytes([
            self.bytes[a],
            self.bytes[a + 1],
        ])))
    }

    /// Reads the 32-bit value at `addr`.
    pub fn read32(&self, addr: u64) -> Result<u64, AccessError> {
        let a = Self::check(addr, 4)?;
        Ok(u64::from(u32::from_le_bytes([
            self.bytes[a],
            self.bytes[a + 1],
            self.bytes[a + 2],
            self.bytes[a + 3],
        ])))
    }

    /// Stores the truncated 8-bit value at `addr`.  No change on failure.
    pub fn write8(&mut self, addr: u64, data: u64) -> Result<(), AccessError> {
        let a = Self::check(addr, 1)?;
        self.bytes[a] = data as u8;
        Ok(())
    }

    /// Stores the truncated 16-bit value at `addr`.  No change on failure.
    pub fn write16(&mut self, addr: u64, data: u64) -> Result<(), AccessError> {
        let a = Self::check(addr, 2)?;
        self.bytes[a..a + 2].copy_from_slice(&(data as u16).to_le_bytes());
        Ok(())
    }

    /// Stores the truncated 32-bit value at `addr`.  No change on failure.
    pub fn write32(&mut self, addr: u64, data: u64) -> Result<(), AccessError> {
        let a = Self::check(addr, 4)?;
        self.bytes[a..a + 4].copy_from_slice(&(data as u32).to_le_bytes());
        Ok(())
    }

    // ── Typed field helpers for device-internal access ────────────────────
    //
    // Devices name their offsets as `const`s, so these take `usize` and rely
    // on the layout being correct by construction.  Slice indexing still
    // bounds-checks a bad layout loudly in debug and release builds.

    /// Returns the `u32` field at a known offset.
    pub fn u32_at(&self, offset: usize) -> u32 {
        u32::from_le_bytes([
            self.bytes[offset],
            self.bytes[offset + 1],
            self.bytes[offset + 2],
            self.bytes[offset + 3],
        ])
    }

    /// Stores a `u32` field at a known offset.
    pub fn set_u32_at(&mut self, offset: usize, value: u32) {
        self.bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// Returns the `f32` field at a known offset (stored as its bit pattern).
    pub fn f32_at(&self, offset: usize) -> f32 {
        f32::from_bits(self.u32_at(offset))
    }

    /// Stores an `f32` field at a known offset (as its bit pattern).
    pub fn set_f32_at(&mut self, offset: usize, value: f32) {
        self.set_u32_at(offset, value.to_bits());
    }
}
