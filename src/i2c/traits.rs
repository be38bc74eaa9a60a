// Licensed under the Apache-2.0 license

//! # SMBus Hardware Abstraction Traits
//!
//! Two small traits split what a controller must provide:
//!
//! ```text
//! I2cHardwareCore (bring-up, clocking, recovery)
//!     └── I2cMaster (message exchange and the convenience transfers)
//! ```
//!
//! [`I2cController`](crate::i2c::i2c_controller::I2cController) only needs
//! these to provide the `embedded-hal` [`I2c`](embedded_hal::i2c::I2c) trait.

use embedded_hal::i2c::{Operation, SevenBitAddress};
use fugit::HertzU32;

use crate::i2c::recovery::RecoveryOutcome;
use crate::i2c::transaction::Message;

/// Core controller interface
///
/// # Examples
///
/// ```rust,no_run
/// use fugit::RateExtU32;
/// use npcm_smbus::i2c::I2cHardwareCore;
///
/// fn bring_up<T: I2cHardwareCore>(controller: &mut T) -> Result<(), T::Error> {
///     controller.init()?;
///     controller.configure_timing(50.kHz())?;
///     Ok(())
/// }
/// ```
pub trait I2cHardwareCore {
    /// Hardware-specific error type that implements embedded-hal error traits
    type Error: embedded_hal::i2c::Error + core::fmt::Debug;

    /// Program the configured clock and put the controller in master,
    /// polled, single-byte mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured bus frequency cannot be produced
    /// from the controller's input clock. The hardware is left untouched in
    /// that case.
    fn init(&mut self) -> Result<(), Self::Error>;

    /// Change the bus frequency.
    ///
    /// # Returns
    ///
    /// The frequency now in effect.
    ///
    /// # Errors
    ///
    /// Returns an error for speeds the controller does not support or whose
    /// divider is out of range.
    fn configure_timing(&mut self, frequency: HertzU32) -> Result<HertzU32, Self::Error>;

    /// Free a stuck bus and reset the controller.
    ///
    /// `address` is the target the recovery START is sent to once SDA has
    /// been released.
    fn recover_bus(&mut self, address: SevenBitAddress) -> RecoveryOutcome;
}

/// Master mode operations
///
/// Only [`I2cMaster::exchange`] is required; the rest are built on it and
/// inherit its STOP and recovery handling.
///
/// # Examples
///
/// ```rust,no_run
/// use npcm_smbus::i2c::I2cMaster;
///
/// fn read_temperature<T: I2cMaster>(i2c: &mut T) -> Result<u16, T::Error> {
///     let mut data = [0u8; 2];
///     i2c.write_read(0x48, &[0x00], &mut data)?;
///     Ok(u16::from_be_bytes(data))
/// }
/// ```
pub trait I2cMaster: I2cHardwareCore {
    /// Run one or two messages as a single transaction.
    ///
    /// # Errors
    ///
    /// Returns an error for an unsupported message count, before touching
    /// the bus, or the first failure of any message.
    fn exchange(&mut self, messages: &mut [Message<'_>]) -> Result<(), Self::Error>;

    /// Write data to a target device
    ///
    /// # Errors
    ///
    /// Returns an error if the target does not acknowledge or the
    /// controller reports a bus error or timeout.
    fn write(&mut self, addr: SevenBitAddress, bytes: &[u8]) -> Result<(), Self::Error> {
        self.exchange(&mut [Message::write(addr, bytes)])
    }

    /// Read data from a target device
    ///
    /// # Errors
    ///
    /// Returns an error for an empty buffer, if the target does not
    /// acknowledge, or the controller reports a bus error or timeout.
    fn read(&mut self, addr: SevenBitAddress, buffer: &mut [u8]) -> Result<(), Self::Error> {
        self.exchange(&mut [Message::read(addr, buffer)])
    }

    /// Write then read with a repeated START in between
    ///
    /// # Errors
    ///
    /// Returns an error if either phase fails.
    fn write_read(
        &mut self,
        addr: SevenBitAddress,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.exchange(&mut [Message::write(addr, bytes), Message::read(addr, buffer)])
    }

    /// Execute embedded-hal operations as one transaction
    ///
    /// Adjacent operations of the same kind share one address phase.
    ///
    /// # Errors
    ///
    /// Returns an error when the operations need more than two address
    /// phases or if any operation fails.
    fn transaction_slice(
        &mut self,
        addr: SevenBitAddress,
        ops_slice: &mut [Operation<'_>],
    ) -> Result<(), Self::Error>;
}
