//! Asynchronous target initializer.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use embedded_hal::digital::OutputPin;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::io::{AsyncDelay, AsyncWireTransport};
use crate::protocol::AsyncSwsSession;
use crate::target::{ConnectionState, InitConfig, regs, settled_divider};
use crate::{Error, Result};

/// Async version of [`crate::target::Target`], for use with an [`AsyncSwsSession`].
///
/// See [`AsyncDelay`] for the required delay trait.
pub struct AsyncTarget<P: OutputPin, D: AsyncDelay> {
    reset: P,
    delay: D,
    config: InitConfig,
    state: ConnectionState,
}

impl<P: OutputPin, D: AsyncDelay> AsyncTarget<P, D> {
    pub fn new(reset: P, delay: D) -> Self {
        Self::with_config(reset, delay, InitConfig::default())
    }

    pub fn with_config(reset: P, delay: D, config: InitConfig) -> Self {
        Self {
            reset,
            delay,
            config,
            state: ConnectionState::Disconnected,
        }
    }

    /// Reset the target and scan for a working clock divider, returning the divider settled
    /// on.
    pub async fn connect<T: AsyncWireTransport>(
        &mut self,
        session: &mut AsyncSwsSession<T>,
    ) -> Result<u8> {
        let result = self.scan(session).await;
        if let Err(e) = result {
            warn!("Target initialization failed: {e:?}");
            self.state = ConnectionState::Disconnected;
        }
        result
    }

    /// Drive the reset line.  Driving it low also marks the target as disconnected.
    pub fn set_reset(&mut self, high: bool) -> Result<()> {
        debug!("Reset line <- {}", u8::from(high));
        if high {
            self.reset.set_high().map_err(|_| Error::Gpio)?;
        } else {
            self.state = ConnectionState::Disconnected;
            self.reset.set_low().map_err(|_| Error::Gpio)?;
        }
        Ok(())
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    pub fn config(&self) -> &InitConfig {
        &self.config
    }

    pub fn reset_pin(&self) -> &P {
        &self.reset
    }

    async fn scan<T: AsyncWireTransport>(
        &mut self,
        session: &mut AsyncSwsSession<T>,
    ) -> Result<u8> {
        for divider in self.config.dividers.clone() {
            self.state = ConnectionState::Resetting;
            self.pulse_reset().await?;

            match self.try_divider(session, divider).await {
                Ok(id) if id == self.config.expected_id => {
                    return self.settle(session, divider).await;
                }
                Ok(id) => trace!("Divider {divider}: SoC ID {id:#06x}"),
                Err(e) => debug!("Divider {divider}: {e:?}"),
            }
        }

        Err(Error::InitFailed)
    }

    async fn pulse_reset(&mut self) -> Result<()> {
        let hold = self.config.reset_hold_ms;
        self.reset.set_low().map_err(|_| Error::Gpio)?;
        self.delay.delay_ms(hold).await;
        self.reset.set_high().map_err(|_| Error::Gpio)?;
        self.delay.delay_ms(hold).await;
        Ok(())
    }

    async fn try_divider<T: AsyncWireTransport>(
        &mut self,
        session: &mut AsyncSwsSession<T>,
        divider: u8,
    ) -> Result<u16> {
        halt(session).await?;
        self.state = ConnectionState::ScanningSpeed;
        set_clock_divider(session, divider).await?;
        read_soc_id(session).await
    }

    async fn settle<T: AsyncWireTransport>(
        &mut self,
        session: &mut AsyncSwsSession<T>,
        divider: u8,
    ) -> Result<u8> {
        let divider = settled_divider(divider);
        set_clock_divider(session, divider).await?;
        self.state = ConnectionState::Connected { divider };
        info!("Connected, clock divider {divider}");

        disable_watchdog(session).await?;
        Ok(divider)
    }
}

/// Halt the target CPU.
pub async fn halt<T: AsyncWireTransport>(session: &mut AsyncSwsSession<T>) -> Result<()> {
    session
        .write_single_byte(regs::DEBUG_RUNSTATE, regs::RUNSTATE_HALT)
        .await
}

/// Program the target's SWS clock divider.
pub async fn set_clock_divider<T: AsyncWireTransport>(
    session: &mut AsyncSwsSession<T>,
    divider: u8,
) -> Result<()> {
    session.write_single_byte(regs::SWIRE_CLK_DIV, divider).await
}

/// Read the target's SoC ID.
pub async fn read_soc_id<T: AsyncWireTransport>(session: &mut AsyncSwsSession<T>) -> Result<u16> {
    session.read_single_word(regs::SOC_ID).await
}

/// Stop the watchdog by clearing the whole timer control register.
pub async fn disable_watchdog<T: AsyncWireTransport>(
    session: &mut AsyncSwsSession<T>,
) -> Result<()> {
    session.write_single_quad(regs::TMR_CTL, 0).await
}
