// Licensed under the Apache-2.0 license

//! SCL divider and SDA hold-time programming.
//!
//! In standard mode the controller produces SCL from its input clock as
//! `f_scl = f_in / (4 * SCLFRQ)`, with the 9-bit `SCLFRQ` split across
//! CTL2[7:1] (bits 6..0) and CTL3[1:0] (bits 8..7). The hold time lives in the
//! bank-0 CTL4 register.

use fugit::HertzU32;

use crate::i2c::error::Error;
use crate::i2c::registers::{ctl2, ctl3, Register, SmbusRegisters};

/// Upper bound of standard mode.
pub const STANDARD_MODE_MAX_HZ: u32 = 100_000;

/// Smallest divider the SCL generator accepts.
pub const SCLFRQ_MIN: u16 = 10;
/// Largest value that fits the 9-bit field.
pub const SCLFRQ_MAX: u16 = 511;

/// Divider and hold time for one (input clock, bus frequency) pair.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ClockTiming {
    pub divider: u16,
    pub hold_time: u8,
}

impl ClockTiming {
    /// Work out the register values without touching hardware.
    ///
    /// # Errors
    ///
    /// * `UnsupportedSpeed` above 100 kHz.
    /// * `InvalidArgument` for a 0 Hz target.
    /// * `FrequencyOutOfRange` when the rounded divider is outside 10..=511.
    pub fn compute(input_clock: HertzU32, bus_frequency: HertzU32) -> Result<Self, Error> {
        let target = bus_frequency.raw();
        if target > STANDARD_MODE_MAX_HZ {
            return Err(Error::UnsupportedSpeed);
        }
        if target == 0 {
            return Err(Error::InvalidArgument);
        }

        let denominator = u64::from(target) * 4;
        let divider = (u64::from(input_clock.raw()) + denominator / 2) / denominator;
        if divider < u64::from(SCLFRQ_MIN) || divider > u64::from(SCLFRQ_MAX) {
            return Err(Error::FrequencyOutOfRange);
        }

        Ok(Self {
            divider: u16::try_from(divider).map_err(|_| Error::FrequencyOutOfRange)?,
            hold_time: hold_time_for(input_clock),
        })
    }

    /// Program the divider and hold time.
    ///
    /// Leaves the module enable bit alone, clears the 400 kHz mode bit and
    /// selects bank 0, which is where CTL4 lives.
    pub fn apply<R: SmbusRegisters>(&self, regs: &mut R) {
        let low = u8::try_from(self.divider & ctl2::SCLFRQ_LOW_MASK).unwrap_or(0);
        regs.modify(Register::Ctl2, |v| {
            (v & ctl2::ENABLE) | (low << ctl2::SCLFRQ_SHIFT)
        });

        let high = u8::try_from(self.divider >> 7).unwrap_or(0) & ctl3::SCLFRQ_HIGH_MASK;
        regs.modify(Register::Ctl3, |v| (v & ctl3::DIVIDER_KEEP_MASK) | high);

        regs.write(Register::Ctl4, self.hold_time);
    }

    /// Recombine the divider currently programmed in CTL2/CTL3.
    pub fn programmed_divider<R: SmbusRegisters>(regs: &mut R) -> u16 {
        let low = u16::from(regs.read(Register::Ctl2) >> ctl2::SCLFRQ_SHIFT);
        let high = u16::from(regs.read(Register::Ctl3) & ctl3::SCLFRQ_HIGH_MASK);
        (high << 7) | low
    }

    /// The SCL frequency this divider actually yields.
    #[must_use]
    pub fn bus_frequency(&self, input_clock: HertzU32) -> HertzU32 {
        HertzU32::from_raw(input_clock.raw() / (u32::from(self.divider) * 4))
    }
}

/// Hold time in input-clock cycles.
///
/// The hold requirement is fixed in time, so faster input clocks need more
/// cycles. These tiers are characterised values, not a formula.
#[must_use]
pub fn hold_time_for(input_clock: HertzU32) -> u8 {
    match input_clock.raw() {
        hz if hz >= 40_000_000 => 17,
        hz if hz >= 12_500_000 => 15,
        _ => 7,
    }
}
