// Licensed under the Apache-2.0 license

//! Simulated SMBus controller for unit tests.
//!
//! Models just enough of the hardware for the polled engine: START grants
//! mastership, the first SDA write after a START is the address byte, ST is
//! write-one-to-clear, STOP and ACK self-clear and the line levels in CTL3 are
//! read-only. Every access is recorded in order.

use std::collections::{HashMap, HashSet, VecDeque};

use embedded_hal::delay::DelayNs;

use crate::i2c::registers::{ctl1, ctl3, cst, st, Register, SmbusRegisters};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Access {
    Read(Register, u8),
    Write(Register, u8),
}

/// Scripted outcome of one START request.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StartFault {
    /// MASTER never shows up.
    NoMaster,
    /// The controller flags BER instead.
    BusError,
}

pub struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

pub struct MockController {
    values: HashMap<Register, u8>,
    log: Vec<Access>,
    start_script: VecDeque<StartFault>,
    nack_addresses: HashSet<u8>,
    error_addresses: HashSet<u8>,
    nack_data_at: Option<usize>,
    rx: VecDeque<u8>,
    tx: Vec<u8>,
    expect_address: bool,
    reading: bool,
    hold_stop: bool,
    ack_sticks: bool,
    data_never_ready: bool,
    toggles_to_release: Option<u32>,
    toggles: u32,
    base: Option<usize>,
    starts: usize,
    stops: usize,
    addresses: Vec<u8>,
}

impl MockController {
    pub fn new() -> Self {
        let mut values = HashMap::new();
        values.insert(Register::Ctl3, ctl3::SDA_LVL | ctl3::SCL_LVL);
        Self {
            values,
            log: Vec::new(),
            start_script: VecDeque::new(),
            nack_addresses: HashSet::new(),
            error_addresses: HashSet::new(),
            nack_data_at: None,
            rx: VecDeque::new(),
            tx: Vec::new(),
            expect_address: false,
            reading: false,
            hold_stop: false,
            ack_sticks: false,
            data_never_ready: false,
            toggles_to_release: None,
            toggles: 0,
            base: None,
            starts: 0,
            stops: 0,
            addresses: Vec::new(),
        }
    }

    /// Outcome of the next START. Unscripted STARTs succeed.
    pub fn script_start(&mut self, fault: StartFault) {
        self.start_script.push_back(fault);
    }

    pub fn nack_address(&mut self, address: u8) {
        self.nack_addresses.insert(address);
    }

    pub fn bus_error_on_address(&mut self, address: u8) {
        self.error_addresses.insert(address);
    }

    /// Target NACKs the data byte with this index (counted across the test).
    pub fn nack_data_byte(&mut self, index: usize) {
        self.nack_data_at = Some(index);
    }

    pub fn queue_rx(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes.iter().copied());
    }

    /// Keep CTL1.STOP set forever.
    pub fn hold_stop(&mut self, hold: bool) {
        self.hold_stop = hold;
    }

    /// Keep CTL1.ACK set after the NACKed byte was received.
    pub fn ack_sticks(&mut self, sticks: bool) {
        self.ack_sticks = sticks;
    }

    /// SDAST never rises after the address phase.
    pub fn data_never_ready(&mut self, never: bool) {
        self.data_never_ready = never;
    }

    /// A target holds SDA low; it lets go after `toggles` SCL pulses, or
    /// never with `None`.
    pub fn hold_sda_low(&mut self, toggles: Option<u32>) {
        self.toggles_to_release = toggles;
        self.toggles = 0;
        let levels = self.peek(Register::Ctl3) & !ctl3::SDA_LVL;
        self.poke(Register::Ctl3, levels);
    }

    pub fn hold_scl_low(&mut self) {
        let levels = self.peek(Register::Ctl3) & !ctl3::SCL_LVL;
        self.poke(Register::Ctl3, levels);
    }

    /// Report a register block address, as MMIO would.
    pub fn set_base(&mut self, base: usize) {
        self.base = Some(base);
    }

    pub fn peek(&self, reg: Register) -> u8 {
        self.values.get(&reg).copied().unwrap_or(0)
    }

    /// Set a register without logging or side effects.
    pub fn poke(&mut self, reg: Register, value: u8) {
        self.values.insert(reg, value);
    }

    pub fn log(&self) -> &[Access] {
        &self.log
    }

    pub fn writes(&self) -> Vec<(Register, u8)> {
        self.log
            .iter()
            .filter_map(|a| match *a {
                Access::Write(reg, value) => Some((reg, value)),
                Access::Read(..) => None,
            })
            .collect()
    }

    pub fn writes_to(&self, reg: Register) -> Vec<u8> {
        self.writes()
            .into_iter()
            .filter(|(r, _)| *r == reg)
            .map(|(_, v)| v)
            .collect()
    }

    pub fn transmitted(&self) -> &[u8] {
        &self.tx
    }

    /// Address bytes seen after a START, R/W bit included.
    pub fn addresses(&self) -> &[u8] {
        &self.addresses
    }

    pub fn starts(&self) -> usize {
        self.starts
    }

    pub fn stops(&self) -> usize {
        self.stops
    }

    pub fn toggles(&self) -> u32 {
        self.toggles
    }

    fn set_status(&mut self, bits: u8) {
        let status = self.peek(Register::St) | bits;
        self.poke(Register::St, status);
    }

    fn write_ctl1(&mut self, mut value: u8) {
        if value & ctl1::START != 0 {
            value &= !ctl1::START;
            self.starts += 1;
            match self.start_script.pop_front() {
                None => {
                    self.set_status(st::MASTER);
                    self.expect_address = true;
                }
                Some(StartFault::NoMaster) => {}
                Some(StartFault::BusError) => self.set_status(st::BER),
            }
        }
        if value & ctl1::STOP != 0 {
            self.stops += 1;
            if !self.hold_stop {
                value &= !ctl1::STOP;
                let status = self.peek(Register::St) & !(st::MASTER | st::SDAST);
                self.poke(Register::St, status);
            }
        }
        self.poke(Register::Ctl1, value);
    }

    fn write_sda(&mut self, value: u8) {
        if self.expect_address {
            self.expect_address = false;
            self.addresses.push(value);
            self.reading = value & 1 != 0;
            let address = value >> 1;
            if self.error_addresses.contains(&address) {
                self.set_status(st::BER);
            } else if self.nack_addresses.contains(&address) {
                self.set_status(st::NEGACK);
            } else {
                if self.peek(Register::Ctl1) & ctl1::STASTRE != 0 {
                    self.set_status(st::STASTR);
                }
                if !self.data_never_ready {
                    self.set_status(st::SDAST);
                }
            }
            return;
        }

        if self.peek(Register::St) & st::MASTER == 0 {
            // Not on the bus; the byte just sits in the shift register.
            self.poke(Register::Sda, value);
            return;
        }

        let index = self.tx.len();
        self.tx.push(value);
        if self.nack_data_at == Some(index) {
            let status = self.peek(Register::St) & !st::SDAST;
            self.poke(Register::St, status | st::NEGACK);
        }
    }

    fn read_sda(&mut self) -> u8 {
        if !self.reading {
            return self.peek(Register::Sda);
        }
        let ctl = self.peek(Register::Ctl1);
        if ctl & ctl1::ACK != 0 && !self.ack_sticks {
            self.poke(Register::Ctl1, ctl & !ctl1::ACK);
        }
        self.rx.pop_front().unwrap_or(0xFF)
    }
}

impl Default for MockController {
    fn default() -> Self {
        Self::new()
    }
}

impl SmbusRegisters for MockController {
    fn read(&mut self, reg: Register) -> u8 {
        let value = match reg {
            Register::Sda => self.read_sda(),
            _ => self.peek(reg),
        };
        self.log.push(Access::Read(reg, value));
        value
    }

    fn write(&mut self, reg: Register, value: u8) {
        self.log.push(Access::Write(reg, value));
        match reg {
            Register::St => {
                let status = self.peek(Register::St) & !value;
                self.poke(Register::St, status);
            }
            Register::Ctl1 => self.write_ctl1(value),
            Register::Sda => self.write_sda(value),
            Register::Cst => {
                if value & cst::TGSCL != 0 {
                    self.toggles += 1;
                    if self.toggles_to_release.is_some_and(|n| self.toggles >= n) {
                        let levels = self.peek(Register::Ctl3) | ctl3::SDA_LVL;
                        self.poke(Register::Ctl3, levels);
                    }
                }
            }
            Register::Ctl3 => {
                let lines = ctl3::SDA_LVL | ctl3::SCL_LVL;
                let levels = self.peek(Register::Ctl3) & lines;
                self.poke(Register::Ctl3, (value & !lines) | levels);
            }
            _ => self.poke(reg, value),
        }
    }

    fn block_address(&self) -> Option<usize> {
        self.base
    }
}
