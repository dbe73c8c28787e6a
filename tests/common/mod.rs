// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! A simulated SWS target, and host side mocks, for driving the bridge end to end.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::time::Duration;

use sws_bridge::bits::RawBitBuffer;
use sws_bridge::bridge::Bridge;
use sws_bridge::io::{HostLink, WireTransport};
use sws_bridge::protocol::{READ_CLOCK_BITS, SwsSession};
use sws_bridge::target::{InitConfig, Target, regs};
use sws_bridge::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Cmd(u8),
    Data(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimMode {
    Idle,
    Read,
    Write,
}

/// A target on the other end of the wire.  Decodes the baked bits the bridge sends, keeps a
/// 64KB register space, and answers reads with encoded bytes.
pub struct SimTarget {
    pub mem: Vec<u8>,
    pub mode: SimMode,
    pub address: u16,
    /// Smallest clock divider the target can follow.  Below this SoC ID reads are garbage.
    pub min_divider: u8,
    /// Every value written to the clock divider register, in order
    pub dividers: Vec<u8>,
    pub halts: usize,
    pub transfers: usize,
    pub stalled: bool,
}

impl SimTarget {
    pub fn new(min_divider: u8) -> Self {
        let mut mem = vec![0u8; 0x10000];
        let [lo, hi] = 0x5316u16.to_le_bytes();
        mem[regs::SOC_ID as usize] = lo;
        mem[regs::SOC_ID as usize + 1] = hi;
        let tmr_ctl = regs::TMR_CTL_WD_EN | 0x01;
        mem[regs::TMR_CTL as usize..regs::TMR_CTL as usize + 4]
            .copy_from_slice(&tmr_ctl.to_le_bytes());

        Self {
            mem,
            mode: SimMode::Idle,
            address: 0,
            min_divider,
            dividers: Vec::new(),
            halts: 0,
            transfers: 0,
            stalled: false,
        }
    }

    pub fn tmr_ctl(&self) -> u32 {
        let at = regs::TMR_CTL as usize;
        u32::from_le_bytes(self.mem[at..at + 4].try_into().unwrap())
    }

    fn read_reg(&self, address: u16) -> u8 {
        let soc_id = address == regs::SOC_ID || address == regs::SOC_ID + 1;
        if soc_id && self.mem[regs::SWIRE_CLK_DIV as usize] < self.min_divider {
            return 0xff;
        }
        self.mem[address as usize]
    }

    fn write_reg(&mut self, address: u16, value: u8) {
        match address {
            regs::SWIRE_CLK_DIV => self.dividers.push(value),
            regs::DEBUG_RUNSTATE if value == regs::RUNSTATE_HALT => self.halts += 1,
            _ => {}
        }
        self.mem[address as usize] = value;
    }

    // Split the line bits into command/data bytes, plus any trailing raw bits.
    fn tokens(tx: &RawBitBuffer) -> (Vec<Token>, usize) {
        let raw: Vec<bool> = tx.as_bitslice().iter().by_vals().collect();
        let chunks = raw.chunks_exact(5);
        let trailing = chunks.remainder().len();
        assert!(chunks.remainder().iter().all(|bit| !bit), "trailing bits must be low");

        let baked: Vec<bool> = chunks
            .map(|chunk| match chunk {
                [false, false, false, false, true] => true,
                [false, true, true, true, true] => false,
                other => panic!("not a baked bit: {other:?}"),
            })
            .collect();
        assert_eq!(baked.len() % 10, 0, "partial byte on the wire");

        let tokens = baked
            .chunks_exact(10)
            .map(|unit| {
                assert!(!unit[9], "missing framing bit");
                let byte = unit[1..9]
                    .iter()
                    .fold(0u8, |acc, bit| (acc << 1) | u8::from(*bit));
                if unit[0] {
                    Token::Cmd(byte)
                } else {
                    Token::Data(byte)
                }
            })
            .collect();
        (tokens, trailing)
    }

    fn respond(rx: &mut RawBitBuffer, rx_bits: usize, value: u8) {
        rx.write_raw_bits(true, 2);
        rx.write_byte(value);
        assert!(rx.len() <= rx_bits, "response doesn't fit");
        let pad = rx_bits - rx.len();
        rx.write_raw_bits(true, pad);
    }
}

impl WireTransport for SimTarget {
    fn transfer(
        &mut self,
        tx: &RawBitBuffer,
        rx: &mut RawBitBuffer,
        rx_bits: usize,
        _timeout: Option<Duration>,
    ) -> Result<()> {
        if self.stalled {
            return Err(Error::Timeout);
        }
        self.transfers += 1;

        let (tokens, trailing) = Self::tokens(tx);
        let mut tokens = tokens.into_iter();
        while let Some(token) = tokens.next() {
            match token {
                Token::Cmd(0x5a) => {
                    let mut data = || match tokens.next() {
                        Some(Token::Data(byte)) => byte,
                        other => panic!("expected data after START, got {other:?}"),
                    };
                    let hi = data();
                    let lo = data();
                    let mode = data();
                    self.address = u16::from_be_bytes([hi, lo]);
                    self.mode = if mode & 0x80 != 0 {
                        SimMode::Read
                    } else {
                        SimMode::Write
                    };
                }
                Token::Cmd(0xff) => self.mode = SimMode::Idle,
                Token::Cmd(other) => panic!("unknown command byte {other:#04x}"),
                Token::Data(byte) => {
                    assert_eq!(self.mode, SimMode::Write, "data outside a write");
                    self.write_reg(self.address, byte);
                    self.address = self.address.wrapping_add(1);
                }
            }
        }

        if trailing == READ_CLOCK_BITS {
            assert_eq!(self.mode, SimMode::Read, "read clock outside a read");
            let value = self.read_reg(self.address);
            self.address = self.address.wrapping_add(1);
            Self::respond(rx, rx_bits, value);
        } else {
            assert_eq!(rx_bits, 0, "capture requested without a read clock");
        }
        Ok(())
    }
}

#[cfg(feature = "async")]
#[async_trait::async_trait(?Send)]
impl sws_bridge::io::AsyncWireTransport for SimTarget {
    async fn transfer(
        &mut self,
        tx: &RawBitBuffer,
        rx: &mut RawBitBuffer,
        rx_bits: usize,
        timeout: Option<Duration>,
    ) -> Result<()> {
        WireTransport::transfer(self, tx, rx, rx_bits, timeout)
    }
}

/// Reset pin.  A broken pin fails every write.
#[derive(Default)]
pub struct SimPin {
    pub levels: Vec<bool>,
    pub broken: bool,
}

#[derive(Debug)]
pub struct PinError;

impl embedded_hal::digital::Error for PinError {
    fn kind(&self) -> embedded_hal::digital::ErrorKind {
        embedded_hal::digital::ErrorKind::Other
    }
}

impl SimPin {
    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Self::default()
        }
    }

    fn drive(&mut self, level: bool) -> core::result::Result<(), PinError> {
        if self.broken {
            return Err(PinError);
        }
        self.levels.push(level);
        Ok(())
    }
}

impl embedded_hal::digital::ErrorType for SimPin {
    type Error = PinError;
}

impl embedded_hal::digital::OutputPin for SimPin {
    fn set_low(&mut self) -> core::result::Result<(), PinError> {
        self.drive(false)
    }

    fn set_high(&mut self) -> core::result::Result<(), PinError> {
        self.drive(true)
    }
}

pub struct NoDelay;

impl embedded_hal::delay::DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

/// Host end of the link: a queue of bytes to send and everything received.
pub struct Host {
    pub input: VecDeque<u8>,
    pub output: Vec<u8>,
    pub connected: bool,
}

impl Host {
    pub fn new() -> Self {
        Self {
            input: VecDeque::new(),
            output: Vec::new(),
            connected: true,
        }
    }

    /// All lines received so far.
    pub fn lines(&self) -> Vec<String> {
        String::from_utf8(self.output.clone())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Lines received so far, excluding informational `#` lines.
    pub fn replies(&self) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|line| !line.starts_with('#'))
            .collect()
    }
}

impl HostLink for Host {
    fn read_byte(&mut self) -> Result<u8> {
        self.input.pop_front().ok_or(Error::HostLink)
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.output.extend_from_slice(data);
        Ok(())
    }

    fn is_connected(&mut self) -> bool {
        self.connected
    }
}

pub type SimBridge = Bridge<SimTarget, Host, SimPin, NoDelay>;

pub fn bridge(sim: SimTarget) -> SimBridge {
    bridge_with_config(sim, InitConfig::default())
}

pub fn bridge_with_config(sim: SimTarget, config: InitConfig) -> SimBridge {
    bridge_with_pin(sim, SimPin::default(), config)
}

pub fn bridge_with_pin(sim: SimTarget, pin: SimPin, config: InitConfig) -> SimBridge {
    let session = SwsSession::new(sim);
    let target = Target::with_config(pin, NoDelay, config);
    Bridge::new(session, target, Host::new())
}

/// Queue `input` and run commands until it has all been consumed.
pub fn send(bridge: &mut SimBridge, input: &str) {
    bridge.link_mut().input.extend(input.bytes());
    while !bridge.link().input.is_empty() {
        bridge.poll().unwrap();
    }
}

pub fn sim(bridge: &SimBridge) -> &SimTarget {
    bridge.session().transport()
}
