//! Traits for the hardware this crate drives but doesn't implement.
//!
//! # Wire transport
//!
//! [`WireTransport`] clocks raw line bits out of one [`RawBitBuffer`] and captures raw line
//! bits into another, at a fixed bit clock.  On an RP2040 this is a PIO state machine fed
//! from [`RawBitBuffer::words()`] and drained into [`RawBitBuffer::words_mut()`].  The
//! protocol layer has already encoded everything, so the transport knows nothing about SWS
//! framing - it just moves bits.
//!
//! # Host link
//!
//! [`HostLink`] is the byte stream to the host tool, typically USB CDC serial.
//!
//! The reset line and delays use the `embedded-hal` [`OutputPin`] and [`DelayNs`] traits
//! directly.
//!
//! [`OutputPin`]: embedded_hal::digital::OutputPin
//! [`DelayNs`]: embedded_hal::delay::DelayNs

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use core::time::Duration;

#[cfg(feature = "async")]
use alloc::boxed::Box;
#[cfg(feature = "async")]
use async_trait::async_trait;

use crate::Result;
use crate::bits::RawBitBuffer;

/// Synchronous wire transport.
pub trait WireTransport {
    /// Transmit the bits in `tx` while capturing `rx_bits` bits into `rx`.
    ///
    /// Only returns once both the transmission and the capture have completed.
    ///
    /// # Arguments
    ///
    /// * `tx` - Bits to transmit, `tx.len()` of them, from the start of the buffer
    /// * `rx` - Buffer to capture into.  Has been cleared by the caller.  The
    ///   implementation must leave its length set to the number of bits captured.
    /// * `rx_bits` - Exact number of bits to capture.  May be 0.
    /// * `timeout` - `None` to wait indefinitely for completion
    ///
    /// # Errors
    ///
    /// - [`crate::Error::Timeout`] if completion isn't signalled within `timeout`
    /// - [`crate::Error::Io`] for any other hardware failure
    fn transfer(
        &mut self,
        tx: &RawBitBuffer,
        rx: &mut RawBitBuffer,
        rx_bits: usize,
        timeout: Option<Duration>,
    ) -> Result<()>;
}

/// Asynchronous wire transport.
///
/// Identical contract to [`WireTransport`], but completion is awaited rather than polled.
#[cfg(feature = "async")]
#[async_trait(?Send)]
pub trait AsyncWireTransport {
    /// See [`WireTransport::transfer()`]
    async fn transfer(
        &mut self,
        tx: &RawBitBuffer,
        rx: &mut RawBitBuffer,
        rx_bits: usize,
        timeout: Option<Duration>,
    ) -> Result<()>;
}

/// Byte stream to the host.
pub trait HostLink {
    /// Block until a byte is available and return it.
    ///
    /// Returns [`crate::Error::HostLink`] if the link drops.
    fn read_byte(&mut self) -> Result<u8>;

    /// Write all of `data`.
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Whether a host is currently attached.  Used to greet the host when it connects.
    fn is_connected(&mut self) -> bool;
}

/// Async delay, used while holding the target in or out of reset.
///
/// This trait keeps the crate free of any specific async runtime.
///
/// Example:
///
/// ```rust,ignore
/// use embassy_time::{Duration, Timer};
/// struct Delay;
/// #[async_trait(?Send)]
/// impl AsyncDelay for Delay {
///     async fn delay_ms(&mut self, ms: u32) {
///         Timer::after(Duration::from_millis(ms as u64)).await;
///     }
/// }
/// ```
#[cfg(feature = "async")]
#[async_trait(?Send)]
pub trait AsyncDelay {
    async fn delay_ms(&mut self, ms: u32);
}
