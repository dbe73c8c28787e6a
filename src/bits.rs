//! Fixed size raw bit buffers, one per wire direction.
//!
//! Bits are stored most significant bit first within 32-bit words, which is the order a
//! hardware shift register (such as an RP2040 PIO state machine with left shifting) consumes
//! and produces them.  Transports can therefore hand [`RawBitBuffer::words()`] straight to a
//! TX FIFO and fill [`RawBitBuffer::words_mut()`] straight from an RX FIFO.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use bitvec::prelude::*;

/// Capacity of each buffer, in bits
pub const BUFFER_SIZE_BITS: usize = 4096;

/// Capacity of each buffer, in 32-bit words
pub const BUFFER_SIZE_WORDS: usize = BUFFER_SIZE_BITS / 32;

/// A 4096 bit buffer with a single cursor, used for both writing and reading.
///
/// The buffer never grows.  Writes beyond the capacity are silently dropped, and reads
/// beyond it return a low bit, so a runaway encoder or decoder can't corrupt anything.
#[derive(Clone)]
pub struct RawBitBuffer {
    bits: BitArray<[u32; BUFFER_SIZE_WORDS], Msb0>,
    cursor: usize,
}

impl RawBitBuffer {
    /// Create a new, empty, all-low buffer.
    pub fn new() -> Self {
        Self {
            bits: BitArray::new([0; BUFFER_SIZE_WORDS]),
            cursor: 0,
        }
    }

    /// Capacity in bits.
    pub const fn capacity(&self) -> usize {
        BUFFER_SIZE_BITS
    }

    /// Number of bits written so far (or, while reading, consumed so far).
    pub fn len(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.cursor == 0
    }

    /// Whether the cursor has reached the end of the buffer.
    pub fn is_exhausted(&self) -> bool {
        self.cursor >= BUFFER_SIZE_BITS
    }

    /// Reset the cursor and drive every bit low, leaving a fresh buffer.
    pub fn clear(&mut self) {
        self.bits.fill(false);
        self.cursor = 0;
    }

    /// Reset the cursor without touching the contents, ready to read back from the start.
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    /// Move the cursor to `len` bits.  Used by transports which fill the buffer a word at a
    /// time.  Saturates at the capacity.
    pub fn set_len(&mut self, len: usize) {
        self.cursor = len.min(BUFFER_SIZE_BITS);
    }

    /// Append one literal line bit.  Dropped if the buffer is full.
    pub fn write_raw_bit(&mut self, bit: bool) {
        if self.cursor < BUFFER_SIZE_BITS {
            self.bits.set(self.cursor, bit);
            self.cursor += 1;
        }
    }

    /// Append `count` copies of the same literal line bit.
    pub fn write_raw_bits(&mut self, bit: bool, count: usize) {
        for _ in 0..count {
            self.write_raw_bit(bit);
        }
    }

    /// Read the bit under the cursor and advance.  Returns low once exhausted.
    pub fn read_raw_bit(&mut self) -> bool {
        if self.cursor < BUFFER_SIZE_BITS {
            let bit = self.bits[self.cursor];
            self.cursor += 1;
            bit
        } else {
            false
        }
    }

    /// The bit at `index`, irrespective of the cursor.  Low if out of range.
    pub fn bit(&self, index: usize) -> bool {
        self.bits.get(index).map(|bit| *bit).unwrap_or(false)
    }

    /// The bits written so far.
    pub fn as_bitslice(&self) -> &BitSlice<u32, Msb0> {
        &self.bits[..self.cursor]
    }

    /// The raw backing words, MSB first.
    pub fn words(&self) -> &[u32] {
        self.bits.as_raw_slice()
    }

    /// The raw backing words, for transports filling the buffer directly.  Follow with
    /// [`Self::set_len()`].
    pub fn words_mut(&mut self) -> &mut [u32] {
        self.bits.as_raw_mut_slice()
    }

    /// Number of words covering the bits written so far.
    pub fn word_len(&self) -> usize {
        self.cursor.div_ceil(32)
    }
}

impl Default for RawBitBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for RawBitBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RawBitBuffer")
            .field("len", &self.cursor)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_saturate_at_capacity() {
        let mut buf = RawBitBuffer::new();
        buf.write_raw_bits(true, BUFFER_SIZE_BITS + 100);
        assert_eq!(buf.len(), BUFFER_SIZE_BITS);
        assert!(buf.is_exhausted());

        // Further writes change nothing
        buf.write_raw_bit(false);
        assert_eq!(buf.len(), BUFFER_SIZE_BITS);
        assert!(buf.bit(BUFFER_SIZE_BITS - 1));
        assert!(!buf.bit(BUFFER_SIZE_BITS));
    }

    #[test]
    fn reads_past_end_are_low() {
        let mut buf = RawBitBuffer::new();
        buf.write_raw_bits(true, BUFFER_SIZE_BITS);
        buf.set_len(BUFFER_SIZE_BITS + 7);
        assert_eq!(buf.len(), BUFFER_SIZE_BITS);
        assert!(!buf.read_raw_bit());
        assert_eq!(buf.len(), BUFFER_SIZE_BITS);
    }

    #[test]
    fn words_are_msb_first() {
        let mut buf = RawBitBuffer::new();
        buf.write_raw_bit(true);
        buf.write_raw_bits(false, 30);
        buf.write_raw_bit(true);
        buf.write_raw_bit(true);
        assert_eq!(buf.words()[0], 0x8000_0001);
        assert_eq!(buf.words()[1], 0x8000_0000);
        assert_eq!(buf.word_len(), 2);
    }

    #[test]
    fn words_mut_fills_for_reading() {
        let mut buf = RawBitBuffer::new();
        buf.words_mut()[0] = 0xa000_0000;
        buf.set_len(4);
        buf.rewind();
        assert!(buf.read_raw_bit());
        assert!(!buf.read_raw_bit());
        assert!(buf.read_raw_bit());
        assert!(!buf.read_raw_bit());
    }

    #[test]
    fn clear_and_rewind() {
        let mut buf = RawBitBuffer::new();
        buf.write_raw_bits(true, 10);
        buf.rewind();
        assert!(buf.is_empty());
        assert!(buf.bit(9));

        buf.clear();
        assert!(buf.is_empty());
        assert!(!buf.bit(9));
        assert_eq!(buf.as_bitslice().len(), 0);
    }
}
