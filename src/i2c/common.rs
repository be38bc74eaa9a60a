// Licensed under the Apache-2.0 license

//! Common types and constants for the NPCM SMBus driver modules.
//!
//! This module provides the bus configuration, its builder and the polling
//! budgets shared by the protocol engine and the bring-up helpers.

use fugit::HertzU32;

use crate::i2c::error::Error;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum I2cSpeed {
    Standard = 100_000,
    Fast = 400_000,
    FastPlus = 1_000_000,
}

impl I2cSpeed {
    #[must_use]
    pub const fn frequency(self) -> HertzU32 {
        HertzU32::from_raw(self as u32)
    }
}

/// Default bus frequency when the board description does not name one.
pub const DEFAULT_BUS_FREQUENCY: HertzU32 = HertzU32::from_raw(100_000);

/// Attempt budgets for every bounded wait.
///
/// These are iteration counts with the default [`IterationBudget`] policy.
/// Scale them up on slow cores or pick a time-based policy instead.
///
/// [`IterationBudget`]: crate::i2c::poll::IterationBudget
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PollBudgets {
    /// MASTER flag after a START request.
    pub start: u32,
    /// STOP bit self-clear.
    pub stop: u32,
    /// STASTR flag after an address byte with stall-after-start.
    pub address_stall: u32,
    /// SDAST flag before each data byte.
    pub data_ready: u32,
    /// Hardware clearing the ACK bit before the final received byte.
    pub ack_clear: u32,
    /// START issued by bus recovery.
    pub recovery_start: u32,
}

impl Default for PollBudgets {
    fn default() -> Self {
        Self {
            start: 1000,
            stop: 1000,
            address_stall: 1000,
            data_ready: 10_000,
            ack_clear: 1000,
            recovery_start: 1000,
        }
    }
}

pub struct SmbusConfig {
    pub module: u8,
    pub bus_frequency: HertzU32,
    pub budgets: PollBudgets,
}

impl Default for SmbusConfig {
    fn default() -> Self {
        SmbusConfigBuilder::new().build()
    }
}

pub struct SmbusConfigBuilder {
    module: u8,
    bus_frequency: Option<HertzU32>,
    budgets: PollBudgets,
}

impl Default for SmbusConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SmbusConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            module: 0,
            bus_frequency: None,
            budgets: PollBudgets::default(),
        }
    }
    #[must_use]
    pub fn module(mut self, module: u8) -> Self {
        self.module = module;
        self
    }
    #[must_use]
    pub fn bus_frequency(mut self, frequency: HertzU32) -> Self {
        self.bus_frequency = Some(frequency);
        self
    }
    /// Pick the frequency from a named speed.
    ///
    /// # Errors
    ///
    /// `UnsupportedSpeed` for anything but [`I2cSpeed::Standard`].
    pub fn speed(self, speed: I2cSpeed) -> Result<Self, Error> {
        match speed {
            I2cSpeed::Standard => Ok(self.bus_frequency(speed.frequency())),
            I2cSpeed::Fast | I2cSpeed::FastPlus => Err(Error::UnsupportedSpeed),
        }
    }
    #[must_use]
    pub fn budgets(mut self, budgets: PollBudgets) -> Self {
        self.budgets = budgets;
        self
    }
    #[must_use]
    pub fn build(self) -> SmbusConfig {
        SmbusConfig {
            module: self.module,
            bus_frequency: self.bus_frequency.unwrap_or(DEFAULT_BUS_FREQUENCY),
            budgets: self.budgets,
        }
    }
}
