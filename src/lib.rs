//! Bridge between a simple ASCII host command protocol and the Telink single-wire debug
//! protocol (SWS, sometimes called "swire").
//!
//! This crate lets a host tool halt, identify and read/write the memory-mapped registers of
//! a Telink microcontroller without knowing anything about the wire-level timing.  It is
//! intended to run on a small probe MCU (for example an RP2040, using a PIO state machine to
//! clock the wire) sitting between a USB serial port and the target's SWS pin.
//!
//! `no_std`.  Requires `alloc` only for the async traits.
//!
//! ## Architecture
//!
//! From the wire upwards:
//!
//! - [`bits`] - A fixed 4096 bit [`bits::RawBitBuffer`], one for each direction.  Writes past
//!   the end are dropped.
//! - [`codec`] - The SWS line code.  Every logical bit is "baked" into a 5 bit pulse-width
//!   pair: logical 1 is four low bits then one high bit, logical 0 is one low bit then four
//!   high bits.  The decoder recovers bits from the ratio of low and high run lengths, so it
//!   tolerates clock drift between probe and target.
//! - [`io`] - Traits for the things this crate doesn't do itself: clocking bits on and off
//!   the wire, and the byte stream to the host.
//! - [`protocol`] - Register read and write transactions, framed by START (`0x5a`) and END
//!   (`0xff`) command bytes, with the target auto-incrementing its address between bytes.
//! - [`target`] - Resets the target, halts it, and scans SWS clock dividers until the SoC ID
//!   register reads back as expected.  Then disables the watchdog.
//! - [`bridge`] - Reads single character commands from the host and runs them.
//!
//! ## Host protocol
//!
//! Each command is a single character, followed by fixed-width hex arguments:
//!
//! | Command | Arguments | Action |
//! |---|---|---|
//! | `i` | | Initialize and connect to the target |
//! | `r` | `F` | Drive reset line to `F` (0 or 1).  `r0` also disconnects |
//! | `s` | | Read and report the SoC ID |
//! | `R` | `AAAA` `CCCC` | Read `CCCC` bytes from `AAAA` |
//! | `W` | `AAAA` `CCCC` `HH`... | Write `CCCC` bytes to `AAAA` |
//!
//! Replies are lines.  `S` means success, `E` failure, `?` an unknown command.  Lines starting
//! `#` are informational only.  Read data is returned as a single line of lowercase hex pairs
//! before the `S`.
//!
//! ## Getting Started
//!
//! 1. Implement [`io::WireTransport`] for your bit engine, and [`io::HostLink`] for your USB
//!    serial (or other) host connection.
//! 2. Create a [`protocol::SwsSession`] from the transport.
//! 3. Create a [`target::Target`] from the reset pin and a delay provider (both
//!    `embedded-hal` traits).
//! 4. Create a [`bridge::Bridge`] and call [`bridge::Bridge::run()`].
//!
//! The [`protocol`] and [`target`] layers can equally be used directly, without the host
//! command layer.
//!
//! ## Features
//!
//! Default features:
//! - `async` - Enable [`protocol::AsyncSwsSession`] and [`target::AsyncTarget`], for
//!   transports that await transfer completion rather than polling for it.  Requires
//!   `alloc`.
//!
//! Compile with `--no-default-features` to disable async support.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

#![no_std]

#[cfg(feature = "async")]
extern crate alloc;

pub mod bits;
pub mod bridge;
pub mod codec;
pub mod io;
pub mod protocol;
pub mod target;

/// Bridge errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Transfer didn't complete within the configured timeout
    Timeout,
    /// Wire transport failure
    Io,
    /// Operation not valid in the current transaction state
    InvalidOperation,
    /// No clock divider produced the expected SoC ID
    InitFailed,
    /// Reset line could not be driven
    Gpio,
    /// Host link read or write failed
    HostLink,
}

/// Type to represent the result of a bridge operation
pub type Result<T> = core::result::Result<T, Error>;
