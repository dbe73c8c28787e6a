//! SWS line code.
//!
//! The wire idles high.  Each logical bit is sent as a "baked" pulse-width pair of raw line
//! bits:
//!
//! | Logical | Raw line bits |
//! |---|---|
//! | 1 | `0000 1` |
//! | 0 | `0 1111` |
//!
//! A byte is 8 baked bits, most significant first, followed by a baked 0.  On the wire every
//! byte is also preceded by a baked marker bit, 1 for a command byte and 0 for a data byte.
//!
//! Decoding compares the length of each low run with the following high run, so the exact
//! bit rate of the target doesn't matter, only that it is roughly symmetric.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use crate::bits::RawBitBuffer;

/// Raw bits per baked bit
pub const BAKED_BIT_LEN: usize = 5;

/// Raw bits in an unframed byte: 8 baked bits plus the trailing baked 0
pub const BYTE_LEN: usize = 9 * BAKED_BIT_LEN;

/// Raw bits in a command or data byte, including the marker bit
pub const FRAMED_BYTE_LEN: usize = BYTE_LEN + BAKED_BIT_LEN;

// Run lengths making up a baked bit
const LONG_RUN: usize = 4;
const SHORT_RUN: usize = 1;

/// Encoder.  Appends to the buffer at its cursor.
impl RawBitBuffer {
    /// Append one logical bit as a pulse-width pair.
    pub fn write_baked_bit(&mut self, bit: bool) {
        if bit {
            self.write_raw_bits(false, LONG_RUN);
            self.write_raw_bits(true, SHORT_RUN);
        } else {
            self.write_raw_bits(false, SHORT_RUN);
            self.write_raw_bits(true, LONG_RUN);
        }
    }

    /// Append a byte, MSB first, followed by a baked 0.
    pub fn write_byte(&mut self, byte: u8) {
        for i in (0..8).rev() {
            self.write_baked_bit(byte & (1 << i) != 0);
        }
        self.write_baked_bit(false);
    }

    /// Append a command byte.
    pub fn write_cmd_byte(&mut self, byte: u8) {
        self.write_baked_bit(true);
        self.write_byte(byte);
    }

    /// Append a data byte.
    pub fn write_data_byte(&mut self, byte: u8) {
        self.write_baked_bit(false);
        self.write_byte(byte);
    }

    /// Append a 16-bit word as two data bytes, high byte first.
    pub fn write_data_word(&mut self, word: u16) {
        let [hi, lo] = word.to_be_bytes();
        self.write_data_byte(hi);
        self.write_data_byte(lo);
    }
}

/// Result of decoding a byte from an inbound buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoded {
    /// The bits recovered, right aligned
    pub value: u8,
    /// How many bits were recovered before the buffer ran out
    pub bits: u8,
}

impl Decoded {
    /// Whether all 8 bits were recovered.
    pub fn is_complete(&self) -> bool {
        self.bits == 8
    }
}

/// Decode one byte from the start of `buf`.
///
/// Leading high (idle) bits are skipped.  If the buffer runs out part way through, whatever
/// has been recovered so far is returned - this is not treated as an error.
pub fn decode_byte(buf: &mut RawBitBuffer) -> Decoded {
    let mut result = Decoded { value: 0, bits: 0 };

    buf.rewind();

    let mut last_bit = buf.read_raw_bit();
    while last_bit && !buf.is_exhausted() {
        last_bit = buf.read_raw_bit();
    }

    for _ in 0..8 {
        let mut lowcount = 0;
        loop {
            lowcount += 1;
            last_bit = buf.read_raw_bit();
            if buf.is_exhausted() {
                return result;
            }
            if last_bit {
                break;
            }
        }

        let mut highcount = 0;
        loop {
            highcount += 1;
            last_bit = buf.read_raw_bit();
            if buf.is_exhausted() {
                return result;
            }
            if !last_bit {
                break;
            }
        }

        result.value = (result.value << 1) | u8::from(lowcount > highcount);
        result.bits += 1;
    }

    result
}

/// Decode one byte from the start of `buf`, discarding completeness.
pub fn decode(buf: &mut RawBitBuffer) -> u8 {
    decode_byte(buf).value
}
