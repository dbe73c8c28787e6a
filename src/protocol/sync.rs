//! Synchronous SWS session - typically used by probe firmware.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::Result;
use crate::io::WireTransport;
use crate::protocol::{SessionConfig, SessionCore, Step, TransactionState};

/// Synchronous SWS register access over a [`WireTransport`].
///
/// Owns the transport and both bit buffers.  There is one session per target.
///
/// ```rust,ignore
/// use sws_bridge::protocol::SwsSession;
///
/// let mut session = SwsSession::new(pio_transport);
/// let soc_id = session.read_single_word(0x7e)?;
/// session.write_single_byte(0x602, 0x05)?;
/// ```
pub struct SwsSession<T: WireTransport> {
    transport: T,
    core: SessionCore,
}

impl<T: WireTransport> SwsSession<T> {
    /// Create a new session with the default [`SessionConfig`].
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, SessionConfig::default())
    }

    /// Create a new session.
    pub fn with_config(transport: T, config: SessionConfig) -> Self {
        Self {
            transport,
            core: SessionCore::new(config),
        }
    }

    /// Start a read transaction at `address`, returning the first byte.
    pub fn read_first(&mut self, address: u16) -> Result<u8> {
        self.step(Step::ReadFirst(address))
    }

    /// Read the byte at the next address.
    pub fn read_next(&mut self) -> Result<u8> {
        self.step(Step::ReadNext)
    }

    /// Close a read transaction.
    pub fn finish_reading(&mut self) -> Result<()> {
        self.step(Step::FinishReading).map(|_| ())
    }

    /// Start a write transaction at `address`, writing `value` as the first byte.
    pub fn write_first(&mut self, address: u16, value: u8) -> Result<()> {
        self.step(Step::WriteFirst(address, value)).map(|_| ())
    }

    /// Write `value` to the next address.
    pub fn write_next(&mut self, value: u8) -> Result<()> {
        self.step(Step::WriteNext(value)).map(|_| ())
    }

    /// Close a write transaction.
    pub fn finish_writing(&mut self) -> Result<()> {
        self.step(Step::FinishWriting).map(|_| ())
    }

    pub fn read_single_byte(&mut self, address: u16) -> Result<u8> {
        let value = self.read_first(address)?;
        self.finish_reading()?;
        Ok(value)
    }

    /// Read a little-endian 16-bit register.
    pub fn read_single_word(&mut self, address: u16) -> Result<u16> {
        let lo = self.read_first(address)?;
        let hi = self.read_next()?;
        self.finish_reading()?;
        Ok(u16::from_le_bytes([lo, hi]))
    }

    pub fn write_single_byte(&mut self, address: u16, value: u8) -> Result<()> {
        self.write_first(address, value)?;
        self.finish_writing()
    }

    /// Write a 16-bit register, least significant byte first.
    pub fn write_single_word(&mut self, address: u16, value: u16) -> Result<()> {
        self.write_bytes(address, &value.to_le_bytes())
    }

    /// Write a 32-bit register, least significant byte first.
    pub fn write_single_quad(&mut self, address: u16, value: u32) -> Result<()> {
        self.write_bytes(address, &value.to_le_bytes())
    }

    /// Read `buf.len()` consecutive bytes starting at `address`, in a single transaction.
    pub fn read_bytes(&mut self, address: u16, buf: &mut [u8]) -> Result<()> {
        let Some((first, rest)) = buf.split_first_mut() else {
            return Ok(());
        };
        *first = self.read_first(address)?;
        for byte in rest {
            *byte = self.read_next()?;
        }
        self.finish_reading()
    }

    /// Write `data` to consecutive bytes starting at `address`, in a single transaction.
    pub fn write_bytes(&mut self, address: u16, data: &[u8]) -> Result<()> {
        let Some((first, rest)) = data.split_first() else {
            return Ok(());
        };
        self.write_first(address, *first)?;
        for byte in rest {
            self.write_next(*byte)?;
        }
        self.finish_writing()
    }

    /// Forget any open transaction, without telling the target.
    pub fn abort(&mut self) {
        self.core.abort();
    }

    pub fn state(&self) -> TransactionState {
        self.core.state()
    }

    pub fn config(&self) -> &SessionConfig {
        self.core.config()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    fn step(&mut self, step: Step) -> Result<u8> {
        let rx_bits = self.core.prepare(step)?;
        let timeout = self.core.timeout();
        let outcome = self
            .transport
            .transfer(&self.core.tx, &mut self.core.rx, rx_bits, timeout);
        self.core.complete(step, outcome)
    }
}
