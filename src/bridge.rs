//! Host command dispatcher.
//!
//! Reads single character commands, with fixed width hex arguments, from a [`HostLink`] and
//! runs them against the target.  See [`crate`] for the command set.
//!
//! Every command produces exactly one status line: `S` (success), `E` (failure) or `?`
//! (unknown command).  Read data is sent as a single line of lowercase hex pairs before the
//! status line.  Any line starting `#` is for humans only.
//!
//! ```text
//! > R00000003
//! < 112233
//! < S
//! > W000000020102
//! < S
//! ```
//!
//! Malformed hex arguments are answered with `E`.  For `W` the full payload is still consumed
//! once the byte count has been read, so the host and bridge stay in step.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use core::fmt;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::io::{HostLink, WireTransport};
use crate::protocol::{SwsSession, TransactionState};
use crate::target::{Target, sync::read_soc_id};
use crate::{Error, Result};

/// Success status line
pub const REPLY_OK: &str = "S";

/// Failure status line
pub const REPLY_ERR: &str = "E";

/// Unknown command status line
pub const REPLY_UNKNOWN: &str = "?";

/// Prefix of informational lines
pub const COMMENT: char = '#';

const BANNER_HELP: [&str; 5] = [
    "i          initialize and connect to target",
    "rF         drive reset line to F (0 or 1)",
    "s          read SoC ID",
    "RAAAACCCC  read CCCC bytes from address AAAA",
    "WAAAACCCC  write CCCC bytes to address AAAA, followed by CCCC hex pairs",
];

/// A host command, with its arguments.
///
/// `Write` payload bytes are not part of the command - they are streamed from the host as
/// they are written to the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `i`
    Init,
    /// `rF`
    Reset { high: bool },
    /// `s`
    Identify,
    /// `RAAAACCCC`
    Read { address: u16, count: u16 },
    /// `WAAAACCCC`
    Write { address: u16, count: u16 },
    /// A known command whose arguments weren't valid hex
    Malformed { verb: u8 },
    /// Anything else
    Unknown(u8),
}

impl Command {
    /// Read the arguments for `verb` from `link` and build the command.
    ///
    /// Only fails if the link does.
    pub fn parse<L: HostLink>(verb: u8, link: &mut L) -> Result<Self> {
        let command = match verb {
            b'i' => Command::Init,
            b's' => Command::Identify,
            b'r' => match read_hex(link, 1)? {
                Some(level) => Command::Reset { high: level != 0 },
                None => Command::Malformed { verb },
            },
            b'R' | b'W' => {
                let address = read_hex(link, 4)?;
                let count = read_hex(link, 4)?;
                match (address, count, verb) {
                    (Some(address), Some(count), b'R') => Command::Read { address, count },
                    (Some(address), Some(count), _) => Command::Write { address, count },
                    _ => Command::Malformed { verb },
                }
            }
            _ => Command::Unknown(verb),
        };
        trace!("Command: {command:?}");
        Ok(command)
    }
}

/// Read exactly `digits` hex digits, most significant first.  Returns `None` if any of them
/// wasn't hex, having still consumed them all.
pub fn read_hex<L: HostLink>(link: &mut L, digits: usize) -> Result<Option<u16>> {
    let mut value = Some(0u16);
    for _ in 0..digits {
        let c = link.read_byte()?;
        let digit = (c as char).to_digit(16);
        value = value.zip(digit).map(|(v, d)| (v << 4) | d as u16);
    }
    Ok(value)
}

/// Bridge configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Whether to greet the host when it connects
    pub banner: bool,
}

impl BridgeConfig {
    pub const fn new() -> Self {
        Self { banner: true }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// The bridge: host link in, SWS out.
///
/// ```rust,ignore
/// let session = SwsSession::new(pio_transport);
/// let target = Target::new(reset_pin, delay);
/// let mut bridge = Bridge::new(session, target, usb_serial);
/// bridge.run();
/// ```
pub struct Bridge<T, L, P, D>
where
    T: WireTransport,
    L: HostLink,
    P: OutputPin,
    D: DelayNs,
{
    session: SwsSession<T>,
    target: Target<P, D>,
    link: L,
    config: BridgeConfig,
    was_connected: bool,
}

impl<T, L, P, D> Bridge<T, L, P, D>
where
    T: WireTransport,
    L: HostLink,
    P: OutputPin,
    D: DelayNs,
{
    pub fn new(session: SwsSession<T>, target: Target<P, D>, link: L) -> Self {
        Self::with_config(session, target, link, BridgeConfig::default())
    }

    pub fn with_config(
        session: SwsSession<T>,
        target: Target<P, D>,
        link: L,
        config: BridgeConfig,
    ) -> Self {
        Self {
            session,
            target,
            link,
            config,
            was_connected: false,
        }
    }

    /// Serve the host forever.
    pub fn run(&mut self) -> ! {
        loop {
            if let Err(e) = self.poll() {
                warn!("Command failed: {e:?}");
            }
        }
    }

    /// Greet a newly connected host, then, if a host is connected, read and run a single
    /// command.  Blocks until the command has been received.
    pub fn poll(&mut self) -> Result<()> {
        let connected = self.link.is_connected();
        let greet = connected && !self.was_connected;
        self.was_connected = connected;

        if !connected {
            return Ok(());
        }
        if greet && self.config.banner {
            debug!("Host connected");
            self.banner()?;
        }

        let verb = self.link.read_byte()?;
        let command = Command::parse(verb, &mut self.link)?;
        self.execute(command)
    }

    /// Run a single command, replying to the host.
    ///
    /// Any transaction left open, for example because the host link failed part way through
    /// a read, is closed before returning.
    pub fn execute(&mut self, command: Command) -> Result<()> {
        let result = match command {
            Command::Init => self.init(),
            Command::Reset { high } => self.reset(high),
            Command::Identify => self.identify(),
            Command::Read { address, count } => self.read(address, count),
            Command::Write { address, count } => self.write(address, count),
            Command::Malformed { verb } => {
                debug!("Malformed arguments for {}", verb as char);
                self.line(format_args!("{REPLY_ERR}"))?;
                self.line(format_args!("{COMMENT} bad hex argument"))
            }
            Command::Unknown(verb) => {
                debug!("Unknown command {verb:#04x}");
                self.line(format_args!("{REPLY_UNKNOWN}"))?;
                self.line(format_args!("{COMMENT} unknown command"))
            }
        };

        self.close_transaction();
        result
    }

    pub fn session(&self) -> &SwsSession<T> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SwsSession<T> {
        &mut self.session
    }

    pub fn target(&self) -> &Target<P, D> {
        &self.target
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn into_parts(self) -> (SwsSession<T>, Target<P, D>, L) {
        (self.session, self.target, self.link)
    }

    fn banner(&mut self) -> Result<()> {
        self.line(format_args!(
            "{COMMENT} Telink debugger bridge v{}",
            env!("CARGO_PKG_VERSION")
        ))?;
        for help in BANNER_HELP {
            self.line(format_args!("{COMMENT} {help}"))?;
        }
        Ok(())
    }

    fn init(&mut self) -> Result<()> {
        self.line(format_args!("{COMMENT} init"))?;
        match self.target.connect(&mut self.session) {
            Ok(divider) => {
                self.line(format_args!("{REPLY_OK}"))?;
                self.line(format_args!("{COMMENT} using speed {divider}"))
            }
            Err(_) => {
                self.line(format_args!("{REPLY_ERR}"))?;
                self.line(format_args!("{COMMENT} init failed"))
            }
        }
    }

    fn reset(&mut self, high: bool) -> Result<()> {
        self.line(format_args!("{COMMENT} reset <- {}", u8::from(high)))?;
        if !high {
            self.session.abort();
        }
        // Always S, whatever the pin does
        if let Err(e) = self.target.set_reset(high) {
            warn!("Reset line failed: {e:?}");
            self.line(format_args!("{COMMENT} reset failed: {e:?}"))?;
        }
        self.line(format_args!("{REPLY_OK}"))
    }

    fn identify(&mut self) -> Result<()> {
        match read_soc_id(&mut self.session) {
            Ok(id) => {
                self.line(format_args!("{COMMENT} socid = {id:04x}"))?;
                self.line(format_args!("{REPLY_OK}"))
            }
            Err(e) => self.transfer_failed(e),
        }
    }

    fn read(&mut self, address: u16, count: u16) -> Result<()> {
        if count == 0 {
            return self.line(format_args!("{REPLY_OK}"));
        }

        let mut sent = 0;
        let mut outcome = self.session.read_first(address);
        while let Ok(byte) = outcome {
            self.out(format_args!("{byte:02x}"))?;
            sent += 1;
            if sent == count {
                break;
            }
            outcome = self.session.read_next();
        }
        let outcome = outcome.and_then(|_| self.session.finish_reading());

        if sent > 0 {
            self.line(format_args!(""))?;
        }
        match outcome {
            Ok(()) => self.line(format_args!("{REPLY_OK}")),
            Err(e) => self.transfer_failed(e),
        }
    }

    fn write(&mut self, address: u16, count: u16) -> Result<()> {
        let mut outcome = Ok(());
        let mut bad_hex = false;

        for index in 0..count {
            let byte = read_hex(&mut self.link, 2)?;
            if bad_hex || outcome.is_err() {
                // Keep draining the payload
                continue;
            }
            let Some(byte) = byte else {
                bad_hex = true;
                continue;
            };

            let byte = byte as u8;
            outcome = if index == 0 {
                self.session.write_first(address, byte)
            } else {
                self.session.write_next(byte)
            };
        }
        if outcome.is_ok() && self.session.state() == TransactionState::Writing {
            outcome = self.session.finish_writing();
        }

        match outcome {
            Err(e) => self.transfer_failed(e),
            Ok(()) if bad_hex => {
                self.line(format_args!("{REPLY_ERR}"))?;
                self.line(format_args!("{COMMENT} bad hex argument"))
            }
            Ok(()) => self.line(format_args!("{REPLY_OK}")),
        }
    }

    fn transfer_failed(&mut self, e: Error) -> Result<()> {
        warn!("Transfer failed: {e:?}");
        self.line(format_args!("{REPLY_ERR}"))?;
        self.line(format_args!("{COMMENT} transfer failed: {e:?}"))
    }

    // Close any transaction left open by an early return.
    fn close_transaction(&mut self) {
        let result = match self.session.state() {
            TransactionState::Idle => return,
            TransactionState::Reading => self.session.finish_reading(),
            TransactionState::Writing => self.session.finish_writing(),
        };
        if result.is_err() {
            self.session.abort();
        }
    }

    fn out(&mut self, args: fmt::Arguments<'_>) -> Result<()> {
        let mut writer = LinkWriter {
            link: &mut self.link,
            error: None,
        };
        fmt::write(&mut writer, args).map_err(|_| writer.error.unwrap_or(Error::HostLink))
    }

    fn line(&mut self, args: fmt::Arguments<'_>) -> Result<()> {
        self.out(args)?;
        self.link.write(b"\n")
    }
}

// Adapts a HostLink for core::fmt, keeping hold of the link's own error.
struct LinkWriter<'a, L: HostLink> {
    link: &'a mut L,
    error: Option<Error>,
}

impl<L: HostLink> fmt::Write for LinkWriter<'_, L> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.link.write(s.as_bytes()).map_err(|e| {
            self.error = Some(e);
            fmt::Error
        })
    }
}
