// Licensed under the Apache-2.0 license

//! # SMBus module table for NPCM7xx
//!
//! All sixteen SMBus modules share one register layout at a fixed stride, so
//! unlike peripherals with a distinct PAC type per instance they need no enum
//! wrapper: a [`BusDescriptor`] per module is enough, and every bus is the
//! same `NpcmSmbus<MmioRegisters, ..>` type. That keeps buses storable in one
//! array and indexable by module number.
//!
//! ```rust,ignore
//! use npcm_smbus::i2c::hardware_instantiation::{bus_descriptor, instantiate_bus};
//!
//! let desc = bus_descriptor(8).ok_or(Error::InvalidArgument)?;
//! let mut bus = unsafe { instantiate_bus(&desc, &mut clocks, &mut gcr, delay, logger)? };
//! bus.exchange(&mut [Message::write(0x50, &[0x00])])?;
//! ```

use embedded_hal::delay::DelayNs;
use fugit::HertzU32;

use crate::common::Logger;
use crate::i2c::common::{SmbusConfig, SmbusConfigBuilder, DEFAULT_BUS_FREQUENCY};
use crate::i2c::error::Error;
use crate::i2c::npcm_smbus::NpcmSmbus;
use crate::i2c::poll::IterationBudget;
use crate::i2c::registers::MmioRegisters;
use crate::i2c::system_setup::{ClockProvider, SmbusSystemSetup};
use crate::pinctrl::GcrAccess;

pub const SMBUS_MODULE_COUNT: usize = 16;

/// Register block of module 0.
pub const SMBUS_BASE: usize = 0xF008_0000;

/// Distance between consecutive module register blocks.
pub const SMBUS_STRIDE: usize = 0x1000;

/// Static description of one SMBus module.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BusDescriptor {
    pub module: u8,
    pub base: usize,
    pub bus_frequency: HertzU32,
}

impl BusDescriptor {
    /// Descriptor at the default standard-mode frequency.
    #[must_use]
    pub const fn new(module: u8) -> Self {
        Self {
            module,
            base: SMBUS_BASE + (module as usize) * SMBUS_STRIDE,
            bus_frequency: DEFAULT_BUS_FREQUENCY,
        }
    }

    /// Same module at another frequency, e.g. from a board's device tree.
    #[must_use]
    pub const fn with_frequency(mut self, frequency: HertzU32) -> Self {
        self.bus_frequency = frequency;
        self
    }

    #[must_use]
    pub fn config(&self) -> SmbusConfig {
        SmbusConfigBuilder::new()
            .module(self.module)
            .bus_frequency(self.bus_frequency)
            .build()
    }

    /// # Safety
    ///
    /// The caller must own the module's register block exclusively; see
    /// [`MmioRegisters::new`].
    #[must_use]
    pub unsafe fn registers(&self) -> MmioRegisters {
        // SAFETY: forwarded to the caller.
        unsafe { MmioRegisters::new(self.base) }
    }
}

/// Descriptors of every module, indexed by module number.
#[must_use]
pub const fn create_all_bus_descriptors() -> [BusDescriptor; SMBUS_MODULE_COUNT] {
    [
        BusDescriptor::new(0),
        BusDescriptor::new(1),
        BusDescriptor::new(2),
        BusDescriptor::new(3),
        BusDescriptor::new(4),
        BusDescriptor::new(5),
        BusDescriptor::new(6),
        BusDescriptor::new(7),
        BusDescriptor::new(8),
        BusDescriptor::new(9),
        BusDescriptor::new(10),
        BusDescriptor::new(11),
        BusDescriptor::new(12),
        BusDescriptor::new(13),
        BusDescriptor::new(14),
        BusDescriptor::new(15),
    ]
}

pub static BUS_DESCRIPTORS: [BusDescriptor; SMBUS_MODULE_COUNT] = create_all_bus_descriptors();

#[must_use]
pub fn bus_descriptor(module: u8) -> Option<BusDescriptor> {
    BUS_DESCRIPTORS.get(usize::from(module)).copied()
}

/// Bring up the module `desc` describes, with iteration-count polling.
///
/// # Safety
///
/// As for [`BusDescriptor::registers`]: nothing else may drive this module's
/// registers while the returned bus exists.
///
/// # Errors
///
/// See [`SmbusSystemSetup::init_bus`].
pub unsafe fn instantiate_bus<C, G, D, L>(
    desc: &BusDescriptor,
    clock: &mut C,
    gcr: &mut G,
    delay: D,
    logger: L,
) -> Result<NpcmSmbus<MmioRegisters, D, IterationBudget, L>, Error>
where
    C: ClockProvider,
    G: GcrAccess,
    D: DelayNs,
    L: Logger,
{
    // SAFETY: forwarded to the caller.
    let regs = unsafe { desc.registers() };
    SmbusSystemSetup::init_bus(
        &desc.config(),
        regs,
        clock,
        gcr,
        delay,
        IterationBudget::new(),
        logger,
    )
}
