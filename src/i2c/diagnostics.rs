// Licensed under the Apache-2.0 license

use core::fmt;

use crate::i2c::registers::{Register, SmbusRegisters};

/// Status and control registers captured for failure analysis.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RegisterSnapshot {
    pub st: u8,
    pub cst: u8,
    pub ctl1: u8,
    pub ctl3: u8,
}

impl RegisterSnapshot {
    /// Reads ST, CST, CTL1 and CTL3. None of these reads has side effects.
    pub fn capture<R: SmbusRegisters>(regs: &mut R) -> Self {
        Self {
            st: regs.read(Register::St),
            cst: regs.read(Register::Cst),
            ctl1: regs.read(Register::Ctl1),
            ctl3: regs.read(Register::Ctl3),
        }
    }
}

impl fmt::Display for RegisterSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}=0x{:02x} {}=0x{:02x} {}=0x{:02x} {}=0x{:02x}",
            Register::St.name(),
            self.st,
            Register::Cst.name(),
            self.cst,
            Register::Ctl1.name(),
            self.ctl1,
            Register::Ctl3.name(),
            self.ctl3,
        )
    }
}
