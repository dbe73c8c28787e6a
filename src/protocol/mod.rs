//! SWS register read and write transactions.
//!
//! Every transaction is framed by a START command byte (`0x5a`), followed by the 16-bit
//! register address, a mode byte, and then one or more data bytes.  The target
//! auto-increments its address after each byte.  An END command byte (`0xff`) closes the
//! transaction.
//!
//! Reads:
//! - [`SwsSession::read_first()`] - START, address, `0x80`, then 4 low bits to clock out the
//!   first byte
//! - [`SwsSession::read_next()`] - 4 low bits to clock out the next byte
//! - [`SwsSession::finish_reading()`] - END
//!
//! Writes:
//! - [`SwsSession::write_first()`] - START, address, `0x00`, first byte
//! - [`SwsSession::write_next()`] - next byte
//! - [`SwsSession::finish_writing()`] - END
//!
//! The session tracks which of these is valid next and rejects anything out of order with
//! [`Error::InvalidOperation`], without touching the wire.
//!
//! [`SwsSession`] is the synchronous version.  [`AsyncSwsSession`] (feature `async`) does the
//! same over an [`crate::io::AsyncWireTransport`].

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

#[cfg(feature = "async")]
pub mod futures;
pub mod sync;

#[cfg(feature = "async")]
pub use futures::AsyncSwsSession;
pub use sync::SwsSession;

use core::time::Duration;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::bits::RawBitBuffer;
use crate::codec::decode_byte;
use crate::{Error, Result};

/// START framing command
pub const CMD_START: u8 = 0x5a;

/// END framing command
pub const CMD_END: u8 = 0xff;

/// Mode byte following the address: read, auto-increment
pub const MODE_READ: u8 = 0x80;

/// Mode byte following the address: write, auto-increment
pub const MODE_WRITE: u8 = 0x00;

/// Low bits sent to clock a byte out of the target
pub const READ_CLOCK_BITS: usize = 4;

/// Bits captured per byte read.  Empirically enough to hold a whole byte from the target
/// at any of the speeds the target initializer will settle on.
pub const BITS_PER_RECEIVED_BYTE: usize = 10 * 10;

/// Where a session is within a register transaction.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// No transaction open
    #[default]
    Idle,
    /// Read transaction open, more bytes may be read
    Reading,
    /// Write transaction open, more bytes may be written
    Writing,
}

/// Session configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// How long to wait for each transfer to complete.  `None` waits forever.
    pub transfer_timeout: Option<Duration>,

    /// Bits to capture for each byte read.
    pub read_bits_per_byte: usize,
}

impl SessionConfig {
    pub const fn new() -> Self {
        Self {
            transfer_timeout: Some(Duration::from_millis(100)),
            read_bits_per_byte: BITS_PER_RECEIVED_BYTE,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}

// A single step of a transaction, i.e. one transfer on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    ReadFirst(u16),
    ReadNext,
    FinishReading,
    WriteFirst(u16, u8),
    WriteNext(u8),
    FinishWriting,
}

impl Step {
    fn required_state(&self) -> TransactionState {
        match self {
            Step::ReadFirst(_) | Step::WriteFirst(_, _) => TransactionState::Idle,
            Step::ReadNext | Step::FinishReading => TransactionState::Reading,
            Step::WriteNext(_) | Step::FinishWriting => TransactionState::Writing,
        }
    }

    fn next_state(&self) -> TransactionState {
        match self {
            Step::ReadFirst(_) | Step::ReadNext => TransactionState::Reading,
            Step::WriteFirst(_, _) | Step::WriteNext(_) => TransactionState::Writing,
            Step::FinishReading | Step::FinishWriting => TransactionState::Idle,
        }
    }

    fn reads(&self) -> bool {
        matches!(self, Step::ReadFirst(_) | Step::ReadNext)
    }
}

// State and buffers shared by the sync and async sessions.  The sessions only add the
// transport call between prepare() and complete().
#[derive(Debug)]
pub(crate) struct SessionCore {
    pub(crate) tx: RawBitBuffer,
    pub(crate) rx: RawBitBuffer,
    state: TransactionState,
    config: SessionConfig,
}

impl SessionCore {
    pub(crate) fn new(config: SessionConfig) -> Self {
        Self {
            tx: RawBitBuffer::new(),
            rx: RawBitBuffer::new(),
            state: TransactionState::Idle,
            config,
        }
    }

    pub(crate) fn state(&self) -> TransactionState {
        self.state
    }

    pub(crate) fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub(crate) fn timeout(&self) -> Option<Duration> {
        self.config.transfer_timeout
    }

    pub(crate) fn abort(&mut self) {
        if self.state != TransactionState::Idle {
            warn!("Aborting open {:?} transaction", self.state);
        }
        self.state = TransactionState::Idle;
    }

    /// Check `step` is valid now, build its frame in the TX buffer, and clear the RX buffer.
    /// Returns the number of bits to capture.
    pub(crate) fn prepare(&mut self, step: Step) -> Result<usize> {
        if self.state != step.required_state() {
            warn!("{step:?} invalid in state {:?}", self.state);
            return Err(Error::InvalidOperation);
        }

        self.tx.rewind();
        match step {
            Step::ReadFirst(address) => {
                self.tx.write_cmd_byte(CMD_START);
                self.tx.write_data_word(address);
                self.tx.write_data_byte(MODE_READ);
                self.tx.write_raw_bits(false, READ_CLOCK_BITS);
            }
            Step::ReadNext => {
                self.tx.write_raw_bits(false, READ_CLOCK_BITS);
            }
            Step::WriteFirst(address, value) => {
                self.tx.write_cmd_byte(CMD_START);
                self.tx.write_data_word(address);
                self.tx.write_data_byte(MODE_WRITE);
                self.tx.write_data_byte(value);
            }
            Step::WriteNext(value) => {
                self.tx.write_data_byte(value);
            }
            Step::FinishReading | Step::FinishWriting => {
                self.tx.write_cmd_byte(CMD_END);
            }
        }
        self.rx.clear();

        let rx_bits = if step.reads() {
            self.config.read_bits_per_byte
        } else {
            0
        };
        trace!("{step:?}: tx {} bits, rx {rx_bits} bits", self.tx.len());
        Ok(rx_bits)
    }

    /// Process the outcome of the transfer for `step`, decoding any byte received.
    pub(crate) fn complete(&mut self, step: Step, outcome: Result<()>) -> Result<u8> {
        if let Err(e) = outcome {
            warn!("{step:?} transfer failed: {e:?}");
            self.abort();
            return Err(e);
        }
        self.state = step.next_state();

        if !step.reads() {
            return Ok(0);
        }
        let decoded = decode_byte(&mut self.rx);
        if !decoded.is_complete() {
            debug!(
                "{step:?} decoded only {} bits: {:#04x}",
                decoded.bits, decoded.value
            );
        }
        Ok(decoded.value)
    }
}
