// Licensed under the Apache-2.0 license

//! NPCM SMBus master driver.
//!
//! A polled, single-byte-at-a-time I2C/SMBus master for the Nuvoton NPCM7xx
//! SMBus modules, designed for bare-metal and `no_std` environments. The
//! protocol engine ([`NpcmSmbus`]) drives the controller through a small
//! register trait so it runs unchanged against hardware or a simulation, and
//! [`I2cController`] exposes it as an `embedded-hal` bus.

pub mod common;
pub mod diagnostics;
pub mod error;
pub mod hardware_instantiation;
pub mod i2c_controller;
pub mod npcm_smbus;
pub mod poll;
pub mod recovery;
pub mod registers;
pub mod system_setup;
pub mod timing;
pub mod traits;
pub mod transaction;

#[cfg(test)]
pub(crate) mod mock;

pub use common::{I2cSpeed, PollBudgets, SmbusConfig, SmbusConfigBuilder};
pub use error::{Error, Fault};
pub use i2c_controller::I2cController;
pub use npcm_smbus::{BusState, NpcmSmbus};
pub use poll::{DelayedPoll, IterationBudget, PollPolicy};
pub use recovery::RecoveryOutcome;
pub use registers::{MmioRegisters, SmbusRegisters};
pub use system_setup::{ClockProvider, FixedClock, SmbusSystemSetup};
pub use traits::{I2cHardwareCore, I2cMaster};
pub use transaction::{Message, Transfer};
