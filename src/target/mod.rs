//! Target reset, identification and SWS speed negotiation.
//!
//! The SWS clock divider the target needs depends on its oscillator trim, which isn't known
//! in advance.  Rather than compute it, [`Target::connect()`] tries each divider in turn,
//! from the fastest, resetting and halting the target before each attempt, until the SoC
//! ID register reads back as [`EXPECTED_SOC_ID`].  It then doubles the divider for margin,
//! and disables the target's watchdog so it stays halted.
//!
//! ```text
//! Disconnected -> Resetting -> ScanningSpeed -> Connected
//!                     ^              |
//!                     +--------------+  (next divider)
//! ```
//!
//! If no divider works the target ends up `Disconnected` and [`Error::InitFailed`] is
//! returned.
//!
//! [`Error::InitFailed`]: crate::Error::InitFailed

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

#[cfg(feature = "async")]
pub mod futures;
pub mod sync;

#[cfg(feature = "async")]
pub use futures::AsyncTarget;
pub use sync::Target;

use core::ops::Range;

/// Target register map.
pub mod regs {
    /// SoC ID, 16 bits
    pub const SOC_ID: u16 = 0x7e;

    pub const SWIRE_DATA: u16 = 0xb0;
    pub const SWIRE_CTRL1: u16 = 0xb1;
    /// SWS clock divider, 8 bits
    pub const SWIRE_CLK_DIV: u16 = 0xb2;
    pub const SWIRE_ID: u16 = 0xb3;

    /// Timer control, 32 bits
    pub const TMR_CTL: u16 = 0x620;
    /// Watchdog enable bit within [`TMR_CTL`]
    pub const TMR_CTL_WD_EN: u32 = 1 << 23;

    /// Debug run state, 8 bits
    pub const DEBUG_RUNSTATE: u16 = 0x602;
    /// Value to write to [`DEBUG_RUNSTATE`] to halt the CPU
    pub const RUNSTATE_HALT: u8 = 0x05;
}

/// SoC ID of the supported target family
pub const EXPECTED_SOC_ID: u16 = 0x5316;

/// Connection state of the target.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    /// Pulsing the reset line and halting the target
    Resetting,
    /// Trying a clock divider
    ScanningSpeed,
    /// Connected, using this clock divider
    Connected { divider: u8 },
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected { .. })
    }
}

/// Target initialization configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitConfig {
    /// Clock dividers to try, in order
    pub dividers: Range<u8>,

    /// How long to hold the reset line low, and then high, before talking to the target
    pub reset_hold_ms: u32,

    /// SoC ID indicating the divider works
    pub expected_id: u16,
}

impl InitConfig {
    pub const fn new() -> Self {
        Self {
            dividers: 3..0x7f,
            reset_hold_ms: 20,
            expected_id: EXPECTED_SOC_ID,
        }
    }
}

impl Default for InitConfig {
    fn default() -> Self {
        Self::new()
    }
}

// The divider to settle on, once `divider` has been found to work.
fn settled_divider(divider: u8) -> u8 {
    divider.saturating_mul(2)
}
