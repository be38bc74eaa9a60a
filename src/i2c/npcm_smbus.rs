// Licensed under the Apache-2.0 license

//! Polled, single-byte master engine for the NPCM SMBus controller.
//!
//! [`NpcmSmbus`] owns one controller instance. This file holds the bus state,
//! bring-up and the byte-level primitives (START, STOP, address phase and the
//! status polls). Whole transfers are composed in `transaction.rs` and the
//! stuck-bus procedure lives in `recovery.rs`.
//!
//! Every wait is a bounded poll driven by the injected [`PollPolicy`]; nothing
//! here sleeps or yields except the fixed settle delays of bus recovery.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{Operation, SevenBitAddress};
use fugit::HertzU32;

use crate::common::{Logger, NoOpLogger};
use crate::i2c::common::{PollBudgets, SmbusConfig};
use crate::i2c::diagnostics::RegisterSnapshot;
use crate::i2c::error::Error;
use crate::i2c::poll::{IterationBudget, PollPolicy};
use crate::i2c::recovery::RecoveryOutcome;
use crate::i2c::registers::{ctl1, ctl2, ctl3, fif_ctl, st, Register, SmbusRegisters};
use crate::i2c::timing::ClockTiming;
use crate::i2c::traits::{I2cHardwareCore, I2cMaster};
use crate::i2c::transaction::Message;

/// Protocol state of one bus.
///
/// START is legal from any state (a START while started is a repeated
/// START). STOP is only legal once a START went through.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BusState {
    Idle,
    Started,
    Addressed,
    Data,
    Stopped,
}

impl BusState {
    /// True between a successful START and the matching STOP.
    #[must_use]
    pub fn is_started(self) -> bool {
        matches!(self, BusState::Started | BusState::Addressed | BusState::Data)
    }
}

pub struct NpcmSmbus<R, D, P = IterationBudget, L = NoOpLogger>
where
    R: SmbusRegisters,
    D: DelayNs,
    P: PollPolicy,
    L: Logger,
{
    pub(super) regs: R,
    pub(super) delay: D,
    pub(super) poll: P,
    pub(super) logger: L,
    pub(super) module: u8,
    pub(super) input_clock: HertzU32,
    pub(super) bus_frequency: HertzU32,
    pub(super) budgets: PollBudgets,
    pub(super) state: BusState,
}

impl<R, D, P, L> NpcmSmbus<R, D, P, L>
where
    R: SmbusRegisters,
    D: DelayNs,
    P: PollPolicy,
    L: Logger,
{
    /// Wrap a register block. Nothing is written until [`Self::init`].
    pub fn new(
        regs: R,
        config: &SmbusConfig,
        input_clock: HertzU32,
        delay: D,
        poll: P,
        logger: L,
    ) -> Self {
        Self {
            regs,
            delay,
            poll,
            logger,
            module: config.module,
            input_clock,
            bus_frequency: config.bus_frequency,
            budgets: config.budgets,
            state: BusState::Idle,
        }
    }

    /// Program the clock, enable the module and select single-byte polled
    /// operation.
    ///
    /// # Errors
    ///
    /// Clock configuration errors, see [`Self::set_speed`]. Nothing is
    /// written when the configured speed is rejected.
    pub fn init(&mut self) -> Result<(), Error> {
        if let Err(e) = self.set_speed(self.bus_frequency) {
            self.logger.error(format_args!(
                "bus{}: init_clk failed: {e}",
                self.module
            ));
            return Err(e);
        }

        self.regs.set_bits(Register::Ctl2, ctl2::ENABLE);
        self.regs.clear_bits(Register::Ctl3, ctl3::BNK_SEL);
        self.regs.clear_bits(Register::FifCtl, fif_ctl::FIFO_EN);
        // polling mode: no interrupts, no pending requests
        self.regs.write(Register::Ctl1, 0);
        self.state = BusState::Idle;

        match self.regs.block_address() {
            Some(base) => self.logger.info(format_args!(
                "I2C bus{} ready. speed={} Hz, base=0x{base:x}, input clock={} Hz",
                self.module,
                self.bus_frequency.raw(),
                self.input_clock.raw()
            )),
            None => self.logger.info(format_args!(
                "I2C bus{} ready. speed={} Hz, input clock={} Hz",
                self.module,
                self.bus_frequency.raw(),
                self.input_clock.raw()
            )),
        }
        Ok(())
    }

    /// Reprogram the SCL divider and hold time for `frequency`.
    ///
    /// # Errors
    ///
    /// `UnsupportedSpeed`, `InvalidArgument` or `FrequencyOutOfRange`; the
    /// registers and the recorded bus frequency are left untouched.
    pub fn set_speed(&mut self, frequency: HertzU32) -> Result<(), Error> {
        let timing = ClockTiming::compute(self.input_clock, frequency)?;
        timing.apply(&mut self.regs);
        self.bus_frequency = frequency;
        self.logger.debug(format_args!(
            "bus{}: sclfrq={} hldt={}",
            self.module, timing.divider, timing.hold_time
        ));
        Ok(())
    }

    #[must_use]
    pub fn module(&self) -> u8 {
        self.module
    }

    #[must_use]
    pub fn input_clock(&self) -> HertzU32 {
        self.input_clock
    }

    #[must_use]
    pub fn bus_frequency(&self) -> HertzU32 {
        self.bus_frequency
    }

    #[must_use]
    pub fn state(&self) -> BusState {
        self.state
    }

    /// A STOP is still owed.
    #[must_use]
    pub fn started(&self) -> bool {
        self.state.is_started()
    }

    pub fn logger_mut(&mut self) -> &mut L {
        &mut self.logger
    }

    /// Give back the register block.
    pub fn release(self) -> R {
        self.regs
    }

    /// Log and return the current status/control registers.
    pub fn dump_registers(&mut self) -> RegisterSnapshot {
        let snapshot = RegisterSnapshot::capture(&mut self.regs);
        self.logger
            .error(format_args!("bus{}: {snapshot}", self.module));
        snapshot
    }

    /// Poll `check` until it yields a result or the policy runs out.
    pub(super) fn wait_for<T, F>(&mut self, attempts: u32, mut check: F) -> Result<T, Error>
    where
        F: FnMut(&mut R) -> Option<Result<T, Error>>,
    {
        self.poll.arm(attempts);
        while self.poll.tick() {
            if let Some(outcome) = check(&mut self.regs) {
                return outcome;
            }
        }
        Err(Error::Timeout)
    }

    /// Request a START (or repeated START) and wait to become bus master.
    pub(crate) fn send_start(&mut self, attempts: u32) -> Result<(), Error> {
        self.logger.debug(format_args!("START"));
        self.regs.set_bits(Register::Ctl1, ctl1::START);

        self.wait_for(attempts, |regs| {
            let status = regs.read(Register::St);
            if status & st::BER != 0 {
                Some(Err(Error::BusError))
            } else if status & st::MASTER != 0 {
                Some(Ok(()))
            } else {
                None
            }
        })?;

        self.state = BusState::Started;
        Ok(())
    }

    /// Request a STOP and clear the stall/NACK/bus-error latches.
    ///
    /// With `attempts == 0` this returns at once without waiting for the
    /// controller to finish the STOP.
    pub(crate) fn send_stop(&mut self, attempts: u32) -> Result<(), Error> {
        debug_assert!(
            self.state.is_started(),
            "STOP requested in state {:?}",
            self.state
        );
        self.logger.debug(format_args!("STOP"));
        self.regs.set_bits(Register::Ctl1, ctl1::STOP);
        self.regs
            .write(Register::St, st::STASTR | st::NEGACK | st::BER);
        self.state = BusState::Stopped;

        if attempts == 0 {
            return Ok(());
        }

        let result = self.wait_for(attempts, |regs| {
            (regs.read(Register::Ctl1) & ctl1::STOP == 0).then_some(Ok(()))
        });
        if result.is_err() {
            self.dump_registers();
        }
        result
    }

    /// Put an address byte (address and R/W bit) on the bus.
    ///
    /// With `stall` the controller is told to hold SCL low after the address
    /// phase until software releases it. The caller owns clearing the stall
    /// enable again.
    pub(crate) fn send_address(&mut self, byte: u8, stall: bool) -> Result<(), Error> {
        debug_assert!(self.state.is_started());
        if stall {
            self.logger.debug(format_args!("set STASTRE"));
            self.regs.set_bits(Register::Ctl1, ctl1::STASTRE);
        }

        self.logger.debug(format_args!("send address: 0x{byte:02x}"));
        self.regs.write(Register::Sda, byte);

        if stall {
            let stalled = self.wait_for(self.budgets.address_stall, |regs| {
                let status = regs.read(Register::St);
                if status & st::STASTR != 0 {
                    Some(Ok(()))
                } else if status & st::BER != 0 {
                    Some(Err(Error::BusError))
                } else {
                    None
                }
            });
            match stalled {
                Ok(()) => {}
                Err(Error::BusError) => {
                    self.logger.error(format_args!("send address: BER"));
                    self.regs.clear_bits(Register::Ctl1, ctl1::STASTRE);
                    return Err(Error::BusError);
                }
                // The ACK check below still tells us whether anyone answered.
                Err(_) => self.logger.error(format_args!("send address timeout")),
            }
        }

        let status = self.regs.read(Register::St);
        if status & st::NEGACK != 0 {
            self.logger
                .error(format_args!("NACK on addr 0x{:x}", byte >> 1));
            return Err(Error::Nack);
        }
        if status & st::BER != 0 {
            self.logger.error(format_args!("send address: BER"));
            return Err(Error::BusError);
        }

        self.state = BusState::Addressed;
        Ok(())
    }

    /// Wait for SDAST: the shift register is ready for the next byte.
    pub(crate) fn poll_data_ready(&mut self, attempts: u32) -> Result<(), Error> {
        let result = self.wait_for(attempts, |regs| {
            let status = regs.read(Register::St);
            if status & st::NEGACK != 0 {
                Some(Err(Error::Nack))
            } else if status & st::BER != 0 {
                Some(Err(Error::BusError))
            } else if status & st::SDAST != 0 {
                Some(Ok(()))
            } else {
                None
            }
        });
        if let Err(e) = result {
            self.logger.error(format_args!("check sda: {e}"));
        }
        result
    }

    /// Wait for the controller to drop the ACK request bit, which it does
    /// once the NACK for the final byte has gone out.
    pub(crate) fn poll_ack_cleared(&mut self, attempts: u32) -> Result<(), Error> {
        let result = self.wait_for(attempts, |regs| {
            (regs.read(Register::Ctl1) & ctl1::ACK == 0).then_some(Ok(()))
        });
        if let Err(e) = result {
            self.logger.error(format_args!("wait nack: {e}"));
            self.dump_registers();
        }
        result
    }

    /// NACK the next byte received.
    pub(super) fn request_nack(&mut self) {
        self.logger.debug(format_args!("set NACK"));
        self.regs.set_bits(Register::Ctl1, ctl1::ACK);
    }

    pub(super) fn clear_nack_latch(&mut self) {
        self.regs.write(Register::St, st::NEGACK);
    }

    /// Let a stalled bus run again and stop stalling on later addresses.
    pub(super) fn release_stall(&mut self) {
        self.logger.debug(format_args!("clear STASTRE"));
        self.regs.write(Register::St, st::STASTR);
        self.regs.clear_bits(Register::Ctl1, ctl1::STASTRE);
    }

    pub(super) fn stall_enabled(&mut self) -> bool {
        self.regs.read(Register::Ctl1) & ctl1::STASTRE != 0
    }
}

impl<R, D, P, L> I2cHardwareCore for NpcmSmbus<R, D, P, L>
where
    R: SmbusRegisters,
    D: DelayNs,
    P: PollPolicy,
    L: Logger,
{
    type Error = Error;

    fn init(&mut self) -> Result<(), Error> {
        NpcmSmbus::init(self)
    }

    fn configure_timing(&mut self, frequency: HertzU32) -> Result<HertzU32, Error> {
        self.set_speed(frequency)?;
        Ok(self.bus_frequency)
    }

    fn recover_bus(&mut self, address: SevenBitAddress) -> RecoveryOutcome {
        self.recover(address)
    }
}

impl<R, D, P, L> I2cMaster for NpcmSmbus<R, D, P, L>
where
    R: SmbusRegisters,
    D: DelayNs,
    P: PollPolicy,
    L: Logger,
{
    fn exchange(&mut self, messages: &mut [Message<'_>]) -> Result<(), Error> {
        NpcmSmbus::exchange(self, messages)
    }

    fn transaction_slice(
        &mut self,
        addr: SevenBitAddress,
        ops_slice: &mut [Operation<'_>],
    ) -> Result<(), Error> {
        NpcmSmbus::transaction_slice(self, addr, ops_slice)
    }
}
