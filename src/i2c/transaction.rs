// Licensed under the Apache-2.0 license

//! Message-level transfers: single reads and writes and the one- or
//! two-message exchange built on them.
//!
//! A read always ends with its own STOP. A write leaves the bus started so a
//! following read can use a repeated START; the exchange sends the final
//! STOP. After any failure the exchange recovers the bus, addressing the
//! recovery START at the last message's target.
//!
//! `embedded-hal` operation lists are folded into the same shape: adjacent
//! operations of one kind share a single address phase, so each run of reads
//! or writes becomes one message on the wire.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{Operation, SevenBitAddress};

use crate::common::Logger;
use crate::i2c::error::{Error, Fault};
use crate::i2c::npcm_smbus::{BusState, NpcmSmbus};
use crate::i2c::poll::PollPolicy;
use crate::i2c::recovery::RecoveryOutcome;
use crate::i2c::registers::{ctl1, st, Register, SmbusRegisters};

/// Most messages one exchange accepts.
pub const MAX_MESSAGES: usize = 2;

/// Highest 7-bit target address.
pub const MAX_ADDRESS: SevenBitAddress = 0x7F;

/// Direction and data of a message.
#[derive(Debug)]
pub enum Transfer<'a> {
    /// Fill the buffer from the target.
    Read(&'a mut [u8]),
    /// Send the bytes to the target.
    Write(&'a [u8]),
}

/// One addressed read or write.
#[derive(Debug)]
pub struct Message<'a> {
    pub address: SevenBitAddress,
    pub transfer: Transfer<'a>,
}

impl<'a> Message<'a> {
    pub fn read(address: SevenBitAddress, buffer: &'a mut [u8]) -> Self {
        Self {
            address,
            transfer: Transfer::Read(buffer),
        }
    }

    pub fn write(address: SevenBitAddress, bytes: &'a [u8]) -> Self {
        Self {
            address,
            transfer: Transfer::Write(bytes),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match &self.transfer {
            Transfer::Read(buffer) => buffer.len(),
            Transfer::Write(bytes) => bytes.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn is_read(&self) -> bool {
        matches!(self.transfer, Transfer::Read(_))
    }
}

/// Where a message gave up.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Stage {
    /// START never completed.
    Start,
    /// Address or data phase.
    Transfer,
}

#[derive(Copy, Clone, Debug)]
struct Failure {
    stage: Stage,
    error: Error,
}

impl Failure {
    fn start(error: Error) -> Self {
        Self {
            stage: Stage::Start,
            error,
        }
    }

    fn transfer(error: Error) -> Self {
        Self {
            stage: Stage::Transfer,
            error,
        }
    }
}

/// Anything the exchange can put on the wire as one START, address and data
/// phase.
trait Segment {
    fn target(&self) -> SevenBitAddress;

    fn byte_count(&self) -> usize;

    fn run<R, D, P, L>(&mut self, bus: &mut NpcmSmbus<R, D, P, L>) -> Result<(), Failure>
    where
        R: SmbusRegisters,
        D: DelayNs,
        P: PollPolicy,
        L: Logger;
}

impl Segment for Message<'_> {
    fn target(&self) -> SevenBitAddress {
        self.address
    }

    fn byte_count(&self) -> usize {
        self.len()
    }

    fn run<R, D, P, L>(&mut self, bus: &mut NpcmSmbus<R, D, P, L>) -> Result<(), Failure>
    where
        R: SmbusRegisters,
        D: DelayNs,
        P: PollPolicy,
        L: Logger,
    {
        let address = self.address;
        match &mut self.transfer {
            Transfer::Read(buffer) => {
                let len = buffer.len();
                bus.run_read(address, len, buffer.iter_mut())
            }
            Transfer::Write(bytes) => {
                let len = bytes.len();
                bus.run_write(address, len, bytes.iter().copied())
            }
        }
    }
}

/// Adjacent operations of the same kind, sent under one address phase.
struct OperationRun<'a, 'b> {
    address: SevenBitAddress,
    operations: &'b mut [Operation<'a>],
}

impl OperationRun<'_, '_> {
    fn is_read(&self) -> bool {
        self.operations.first().is_some_and(is_read)
    }
}

fn is_read(operation: &Operation<'_>) -> bool {
    matches!(operation, Operation::Read(_))
}

impl Segment for OperationRun<'_, '_> {
    fn target(&self) -> SevenBitAddress {
        self.address
    }

    fn byte_count(&self) -> usize {
        self.operations
            .iter()
            .map(|operation| match operation {
                Operation::Read(buffer) => buffer.len(),
                Operation::Write(bytes) => bytes.len(),
            })
            .sum()
    }

    fn run<R, D, P, L>(&mut self, bus: &mut NpcmSmbus<R, D, P, L>) -> Result<(), Failure>
    where
        R: SmbusRegisters,
        D: DelayNs,
        P: PollPolicy,
        L: Logger,
    {
        let address = self.address;
        let len = self.byte_count();
        if self.is_read() {
            let slots = self
                .operations
                .iter_mut()
                .flat_map(|operation| match operation {
                    Operation::Read(buffer) => buffer.iter_mut(),
                    Operation::Write(_) => Default::default(),
                });
            bus.run_read(address, len, slots)
        } else {
            let bytes = self
                .operations
                .iter()
                .flat_map(|operation| match operation {
                    Operation::Write(bytes) => bytes.iter().copied(),
                    Operation::Read(_) => Default::default(),
                });
            bus.run_write(address, len, bytes)
        }
    }
}

impl<R, D, P, L> NpcmSmbus<R, D, P, L>
where
    R: SmbusRegisters,
    D: DelayNs,
    P: PollPolicy,
    L: Logger,
{
    /// Run one or two messages as a single bus transaction.
    ///
    /// Latched status is cleared first. A second message starts with a
    /// repeated START. If the bus is still started at the end a STOP is
    /// sent, and after any failure the bus is recovered and the controller
    /// reset.
    ///
    /// # Errors
    ///
    /// * `UnsupportedMessageCount` for zero or more than two messages.
    /// * `InvalidArgument` for an address above 0x7F.
    ///
    /// Neither touches the hardware. Transfer failures come back as
    /// [`Error::Io`] carrying the first fault seen.
    pub fn exchange(&mut self, messages: &mut [Message<'_>]) -> Result<(), Error> {
        self.run_segments(messages)
    }

    /// Same contract as [`embedded_hal::i2c::I2c::transaction`].
    ///
    /// Adjacent operations of the same kind are merged: one address phase,
    /// no repeated START or STOP between them. The merged runs go through
    /// [`Self::exchange`], so at most one run of writes followed by one run
    /// of reads (or the reverse) fits in a transaction.
    ///
    /// # Errors
    ///
    /// See [`Self::exchange`]. More than two runs are rejected with
    /// `UnsupportedMessageCount`.
    pub fn transaction_slice(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Error> {
        let count = operations.len();
        let mut runs: heapless::Vec<OperationRun<'_, '_>, MAX_MESSAGES> = heapless::Vec::new();
        let mut rest = operations;
        while let Some(first) = rest.first() {
            let read = is_read(first);
            let split = rest
                .iter()
                .position(|operation| is_read(operation) != read)
                .unwrap_or(rest.len());
            let (run, tail) = core::mem::take(&mut rest).split_at_mut(split);
            let run = OperationRun {
                address,
                operations: run,
            };
            if runs.push(run).is_err() {
                self.logger.error(format_args!(
                    "bus{}: {count} operations not supported",
                    self.module
                ));
                return Err(Error::UnsupportedMessageCount);
            }
            rest = tail;
        }
        self.run_segments(&mut runs)
    }

    fn run_segments<S: Segment>(&mut self, segments: &mut [S]) -> Result<(), Error> {
        if segments.is_empty() || segments.len() > MAX_MESSAGES {
            self.logger.error(format_args!(
                "bus{}: {} messages not supported",
                self.module,
                segments.len()
            ));
            return Err(Error::UnsupportedMessageCount);
        }
        if segments.iter().any(|s| s.target() > MAX_ADDRESS) {
            return Err(Error::InvalidArgument);
        }

        self.regs.write(Register::St, st::CLEAR_ALL);

        let count = segments.len();
        let mut first_fault: Option<Fault> = None;
        let mut needs_recovery = false;

        for (index, segment) in segments.iter_mut().enumerate() {
            self.logger.debug(format_args!(
                "xfer: chip=0x{:x}, len={}",
                segment.target(),
                segment.byte_count()
            ));

            if let Err(failure) = segment.run(self) {
                self.logger.error(format_args!(
                    "xfer: message {index} to 0x{:x} failed: {}",
                    segment.target(),
                    failure.error
                ));
                first_fault.get_or_insert(failure.error.fault());
                // A START that never happened only matters if nothing follows.
                let is_last = index + 1 == count;
                if failure.stage == Stage::Transfer || is_last {
                    needs_recovery = true;
                }
            }
        }

        if self.started() {
            if let Err(e) = self.send_stop(self.budgets.stop) {
                self.logger
                    .error(format_args!("error generating STOP: {e}"));
            }
        }

        if needs_recovery {
            // Known quirk: the recovery START targets the last message's
            // address even when an earlier message failed.
            if let Some(last) = segments.last() {
                if self.recover(last.target()) == RecoveryOutcome::Failed {
                    self.logger
                        .error(format_args!("bus{}: recovery failed", self.module));
                }
            }
        }

        match first_fault {
            Some(fault) => Err(Error::Io(fault)),
            None => Ok(()),
        }
    }

    /// Read `buffer.len()` bytes from `address` and STOP.
    ///
    /// Does not recover the bus on failure and leaves it started if the STOP
    /// was never reached; use [`Self::exchange`] for a complete transaction.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an empty buffer, otherwise the first START,
    /// address or data failure.
    pub fn read_message(
        &mut self,
        address: SevenBitAddress,
        buffer: &mut [u8],
    ) -> Result<(), Error> {
        self.run_read(address, buffer.len(), buffer.iter_mut())
            .map_err(|f| f.error)
    }

    /// Write `bytes` to `address`, leaving the bus started.
    ///
    /// An empty write is an address-only probe with stall-after-start.
    ///
    /// # Errors
    ///
    /// The first START, address or data failure. A NACK of the final byte
    /// counts.
    pub fn write_message(&mut self, address: SevenBitAddress, bytes: &[u8]) -> Result<(), Error> {
        self.run_write(address, bytes.len(), bytes.iter().copied())
            .map_err(|f| f.error)
    }

    /// Read `len` bytes into `slots`, which may span several buffers.
    fn run_read<'s, I>(
        &mut self,
        address: SevenBitAddress,
        len: usize,
        slots: I,
    ) -> Result<(), Failure>
    where
        I: Iterator<Item = &'s mut u8>,
    {
        if len == 0 {
            return Err(Failure::transfer(Error::InvalidArgument));
        }
        self.logger
            .debug(format_args!("read: addr 0x{address:02x}, {len} bytes"));

        if let Err(e) = self.send_start(self.budgets.start) {
            self.logger.error(format_args!("read: send START err {e}"));
            return Err(Failure::start(e));
        }

        // A single byte has to be NACKed before it is clocked in, so the bus
        // stalls after the address until the NACK request is in place.
        let stall = len == 1;
        let result = self
            .send_address((address << 1) | 1, stall)
            .and_then(|()| self.read_bytes(len, slots));

        if let Err(e) = result {
            if e == Error::Nack {
                self.clear_nack_latch();
            }
            if stall && self.stall_enabled() {
                self.release_stall();
            }
            self.logger.error(format_args!("read: err {e}"));
        }
        result.map_err(Failure::transfer)
    }

    fn read_bytes<'s, I>(&mut self, len: usize, slots: I) -> Result<(), Error>
    where
        I: Iterator<Item = &'s mut u8>,
    {
        self.state = BusState::Data;
        let last = len.saturating_sub(1);

        if last == 0 {
            self.request_nack();
            if self.stall_enabled() {
                self.release_stall();
            }
            self.poll_data_ready(self.budgets.data_ready)?;
        }

        for (index, slot) in slots.enumerate() {
            if index == last {
                if last > 0 {
                    self.poll_ack_cleared(self.budgets.ack_clear)?;
                }
                self.read_final_byte(slot);
            } else {
                self.poll_data_ready(self.budgets.data_ready)?;
                // Reading SDA releases the next byte; NACK the one after it.
                if index + 1 == last {
                    self.request_nack();
                }
                *slot = self.regs.read(Register::Sda);
                self.logger.debug(format_args!("read: 0x{:02x}", *slot));
            }
        }
        Ok(())
    }

    /// STOP goes out before the last byte is taken from the shift register.
    fn read_final_byte(&mut self, slot: &mut u8) {
        if let Err(e) = self.send_stop(0) {
            self.logger
                .error(format_args!("error generating STOP: {e}"));
        }
        *slot = self.regs.read(Register::Sda);
        self.logger.debug(format_args!("read: 0x{:02x}", *slot));
        self.clear_nack_latch();
    }

    fn run_write<I>(
        &mut self,
        address: SevenBitAddress,
        len: usize,
        bytes: I,
    ) -> Result<(), Failure>
    where
        I: Iterator<Item = u8>,
    {
        self.logger
            .debug(format_args!("write: addr 0x{address:02x}, {len} bytes"));

        if let Err(e) = self.send_start(self.budgets.start) {
            self.logger.error(format_args!("write: send START err {e}"));
            return Err(Failure::start(e));
        }

        let probe = len == 0;
        let mut result = self.send_address(address << 1, probe);
        if result.is_ok() && !probe {
            result = self.write_bytes(bytes);
        }
        if probe {
            self.logger.debug(format_args!("clear STASTRE"));
            self.regs.clear_bits(Register::Ctl1, ctl1::STASTRE);
        }

        if let Err(e) = result {
            if e == Error::Nack {
                self.clear_nack_latch();
            }
            self.logger.error(format_args!("write: err {e}"));
        }
        result.map_err(Failure::transfer)
    }

    fn write_bytes<I>(&mut self, bytes: I) -> Result<(), Error>
    where
        I: Iterator<Item = u8>,
    {
        let status = self.regs.read(Register::St);
        if status & st::NEGACK != 0 {
            return Err(Error::Nack);
        }
        if status & st::BER != 0 {
            return Err(Error::BusError);
        }
        if self.stall_enabled() {
            self.regs.clear_bits(Register::Ctl1, ctl1::STASTRE);
        }

        self.state = BusState::Data;
        for byte in bytes {
            self.poll_data_ready(self.budgets.data_ready)?;
            self.logger.debug(format_args!("write: 0x{byte:02x}"));
            self.regs.write(Register::Sda, byte);
        }
        // The last byte has been acknowledged once SDAST comes back.
        self.poll_data_ready(self.budgets.data_ready)
    }
}
