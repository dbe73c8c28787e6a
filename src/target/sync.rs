//! Synchronous target initializer.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::io::WireTransport;
use crate::protocol::SwsSession;
use crate::target::{ConnectionState, InitConfig, regs, settled_divider};
use crate::{Error, Result};

/// The target device, as seen through its reset line.
///
/// Owns the reset pin (low holds the target in reset), a delay provider and the
/// [`ConnectionState`].  Register access goes through the [`SwsSession`] passed in to each
/// operation.
pub struct Target<P: OutputPin, D: DelayNs> {
    reset: P,
    delay: D,
    config: InitConfig,
    state: ConnectionState,
}

impl<P: OutputPin, D: DelayNs> Target<P, D> {
    /// Create a new target with the default [`InitConfig`].
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

    /// Reset the target and scan for a working clock divider.
    ///
    /// Returns the divider settled on.  See [`crate::target`] for the details.
    pub fn connect<T: WireTransport>(&mut self, session: &mut SwsSession<T>) -> Result<u8> {
        let result = self.scan(session);
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

    fn scan<T: WireTransport>(&mut self, session: &mut SwsSession<T>) -> Result<u8> {
        debug!(
            "Scanning clock dividers {}..{}",
            self.config.dividers.start, self.config.dividers.end
        );

        for divider in self.config.dividers.clone() {
            self.state = ConnectionState::Resetting;
            self.pulse_reset()?;

            match self.try_divider(session, divider) {
                Ok(id) if id == self.config.expected_id => return self.settle(session, divider),
                Ok(id) => trace!("Divider {divider}: SoC ID {id:#06x}"),
                Err(e) => debug!("Divider {divider}: {e:?}"),
            }
        }

        Err(Error::InitFailed)
    }

    fn pulse_reset(&mut self) -> Result<()> {
        let hold = self.config.reset_hold_ms;
        self.reset.set_low().map_err(|_| Error::Gpio)?;
        self.delay.delay_ms(hold);
        self.reset.set_high().map_err(|_| Error::Gpio)?;
        self.delay.delay_ms(hold);
        Ok(())
    }

    fn try_divider<T: WireTransport>(
        &mut self,
        session: &mut SwsSession<T>,
        divider: u8,
    ) -> Result<u16> {
        halt(session)?;
        self.state = ConnectionState::ScanningSpeed;
        set_clock_divider(session, divider)?;
        read_soc_id(session)
    }

    fn settle<T: WireTransport>(&mut self, session: &mut SwsSession<T>, divider: u8) -> Result<u8> {
        let divider = settled_divider(divider);
        set_clock_divider(session, divider)?;
        self.state = ConnectionState::Connected { divider };
        info!("Connected, clock divider {divider}");

        disable_watchdog(session)?;
        Ok(divider)
    }
}

/// Halt the target CPU.
pub fn halt<T: WireTransport>(session: &mut SwsSession<T>) -> Result<()> {
    session.write_single_byte(regs::DEBUG_RUNSTATE, regs::RUNSTATE_HALT)
}

/// Program the target's SWS clock divider.
pub fn set_clock_divider<T: WireTransport>(session: &mut SwsSession<T>, divider: u8) -> Result<()> {
    session.write_single_byte(regs::SWIRE_CLK_DIV, divider)
}

/// Read the target's SoC ID.
pub fn read_soc_id<T: WireTransport>(session: &mut SwsSession<T>) -> Result<u16> {
    session.read_single_word(regs::SOC_ID)
}

/// Stop the watchdog by clearing the whole timer control register.
pub fn disable_watchdog<T: WireTransport>(session: &mut SwsSession<T>) -> Result<()> {
    session.write_single_quad(regs::TMR_CTL, 0)
}
