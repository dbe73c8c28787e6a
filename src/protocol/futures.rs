//! Asynchronous SWS session - for transports which await transfer completion.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::Result;
use crate::io::AsyncWireTransport;
use crate::protocol::{SessionConfig, SessionCore, Step, TransactionState};

/// Asynchronous SWS register access over an [`AsyncWireTransport`].
///
/// See [`crate::protocol::SwsSession`] for the operations, which are identical.
pub struct AsyncSwsSession<T: AsyncWireTransport> {
    transport: T,
    core: SessionCore,
}

impl<T: AsyncWireTransport> AsyncSwsSession<T> {
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, SessionConfig::default())
    }

    pub fn with_config(transport: T, config: SessionConfig) -> Self {
        Self {
            transport,
            core: SessionCore::new(config),
        }
    }

    pub async fn read_first(&mut self, address: u16) -> Result<u8> {
        self.step(Step::ReadFirst(address)).await
    }

    pub async fn read_next(&mut self) -> Result<u8> {
        self.step(Step::ReadNext).await
    }

    pub async fn finish_reading(&mut self) -> Result<()> {
        self.step(Step::FinishReading).await.map(|_| ())
    }

    pub async fn write_first(&mut self, address: u16, value: u8) -> Result<()> {
        self.step(Step::WriteFirst(address, value)).await.map(|_| ())
    }

    pub async fn write_next(&mut self, value: u8) -> Result<()> {
        self.step(Step::WriteNext(value)).await.map(|_| ())
    }

    pub async fn finish_writing(&mut self) -> Result<()> {
        self.step(Step::FinishWriting).await.map(|_| ())
    }

    pub async fn read_single_byte(&mut self, address: u16) -> Result<u8> {
        let value = self.read_first(address).await?;
        self.finish_reading().await?;
        Ok(value)
    }

    pub async fn read_single_word(&mut self, address: u16) -> Result<u16> {
        let lo = self.read_first(address).await?;
        let hi = self.read_next().await?;
        self.finish_reading().await?;
        Ok(u16::from_le_bytes([lo, hi]))
    }

    pub async fn write_single_byte(&mut self, address: u16, value: u8) -> Result<()> {
        self.write_first(address, value).await?;
        self.finish_writing().await
    }

    pub async fn write_single_word(&mut self, address: u16, value: u16) -> Result<()> {
        self.write_bytes(address, &value.to_le_bytes()).await
    }

    pub async fn write_single_quad(&mut self, address: u16, value: u32) -> Result<()> {
        self.write_bytes(address, &value.to_le_bytes()).await
    }

    pub async fn read_bytes(&mut self, address: u16, buf: &mut [u8]) -> Result<()> {
        let Some((first, rest)) = buf.split_first_mut() else {
            return Ok(());
        };
        *first = self.read_first(address).await?;
        for byte in rest {
            *byte = self.read_next().await?;
        }
        self.finish_reading().await
    }

    pub async fn write_bytes(&mut self, address: u16, data: &[u8]) -> Result<()> {
        let Some((first, rest)) = data.split_first() else {
            return Ok(());
        };
        self.write_first(address, *first).await?;
        for byte in rest {
            self.write_next(*byte).await?;
        }
        self.finish_writing().await
    }

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

    async fn step(&mut self, step: Step) -> Result<u8> {
        let rx_bits = self.core.prepare(step)?;
        let timeout = self.core.timeout();
        let outcome = self
            .transport
            .transfer(&self.core.tx, &mut self.core.rx, rx_bits, timeout)
            .await;
        self.core.complete(step, outcome)
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use alloc::boxed::Box;
    use async_trait::async_trait;
    use core::time::Duration;
    use std::vec::Vec;

    use super::*;
    use crate::Error;
    use crate::bits::RawBitBuffer;

    // Answers every read with the low byte of the number of transfers so far.
    #[derive(Default)]
    struct Counter {
        transfers: Vec<(usize, usize)>,
        stalled: bool,
    }

    #[async_trait(?Send)]
    impl AsyncWireTransport for Counter {
        async fn transfer(
            &mut self,
            tx: &RawBitBuffer,
            rx: &mut RawBitBuffer,
            rx_bits: usize,
            _timeout: Option<Duration>,
        ) -> Result<()> {
            if self.stalled {
                return Err(Error::Timeout);
            }
            self.transfers.push((tx.len(), rx_bits));
            if rx_bits > 0 {
                rx.write_raw_bit(true);
                rx.write_byte(self.transfers.len() as u8);
            }
            Ok(())
        }
    }

    #[test]
    fn word_read() {
        let mut session = AsyncSwsSession::new(Counter::default());
        let word = pollster::block_on(session.read_single_word(0x7e)).unwrap();
        assert_eq!(word, 0x0201);
        assert_eq!(session.transport().transfers, [(204, 100), (4, 100), (50, 0)]);
    }

    #[test]
    fn quad_write() {
        let mut session = AsyncSwsSession::new(Counter::default());
        pollster::block_on(session.write_single_quad(0x620, 0)).unwrap();
        assert_eq!(session.transport().transfers.len(), 5);
        assert_eq!(session.state(), TransactionState::Idle);
    }

    #[test]
    fn ordering_and_stalls() {
        let mut session = AsyncSwsSession::new(Counter::default());
        assert_eq!(
            pollster::block_on(session.finish_writing()),
            Err(Error::InvalidOperation)
        );

        pollster::block_on(session.write_first(0, 1)).unwrap();
        session.transport_mut().stalled = true;
        assert_eq!(
            pollster::block_on(session.write_next(2)),
            Err(Error::Timeout)
        );
        assert_eq!(session.state(), TransactionState::Idle);
    }
}
