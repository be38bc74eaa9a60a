// Licensed under the Apache-2.0 license

//! Register interface of the NPCM SMBus controller.
//!
//! The protocol engine never touches memory directly; it goes through
//! [`SmbusRegisters`], which lets the same state machine drive real hardware
//! through [`MmioRegisters`] or a simulated controller in tests.
//!
//! Registers at offsets `0x10..=0x1F` are banked. Which bank is visible is
//! selected by `CTL3.BNK_SEL`; the [`Register`] variants name the register the
//! engine means, and it is the engine's job to have selected the right bank.
//!
//! Field layouts are declared with `register_bitfields!`; the byte masks in
//! the lowercase modules are derived from them.

use tock_registers::fields::Field;
use tock_registers::{register_bitfields, RegisterLongName};

/// Registers the engine knows about.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Register {
    /// SMBnSDA: address/data shift register.
    Sda,
    /// SMBnST: status, most bits write-one-to-clear.
    St,
    /// SMBnCST: controller status, bus busy latch and the SCL toggle.
    Cst,
    /// SMBnCTL1: START/STOP/ACK requests, stall-after-start enable.
    Ctl1,
    /// SMBnCTL2: module enable and SCL divider bits 6..0.
    Ctl2,
    /// SMBnCTL3: SCL divider bits 8..7, bank select, line levels.
    Ctl3,
    /// SMBnCST3 (bank 0): end-of-busy latch.
    Cst3,
    /// SMBnCTL4 (bank 0): SDA hold time.
    Ctl4,
    /// SMBnFIF_CTL (bank 0): FIFO enable. Only ever cleared.
    FifCtl,
    /// SMBnFIF_CTS (bank 1): FIFO control and status. Only ever cleared.
    FifCts,
}

impl Register {
    /// Byte offset from the module base.
    #[must_use]
    pub const fn offset(self) -> usize {
        match self {
            Register::Sda => 0x00,
            Register::St => 0x02,
            Register::Cst => 0x04,
            Register::Ctl1 => 0x06,
            Register::Ctl2 => 0x0A,
            Register::Ctl3 => 0x0E,
            Register::FifCts => 0x10,
            Register::Cst3 => 0x19,
            Register::Ctl4 => 0x1A,
            Register::FifCtl => 0x1D,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Register::Sda => "SMBSDA",
            Register::St => "SMBST",
            Register::Cst => "SMBCST",
            Register::Ctl1 => "SMBCTL1",
            Register::Ctl2 => "SMBCTL2",
            Register::Ctl3 => "SMBCTL3",
            Register::Cst3 => "SMBCST3",
            Register::Ctl4 => "SMBCTL4",
            Register::FifCtl => "SMBFIF_CTL",
            Register::FifCts => "SMBFIF_CTS",
        }
    }
}

register_bitfields![u8,
    pub SMBST [
        XMIT OFFSET(0) NUMBITS(1) [],
        MASTER OFFSET(1) NUMBITS(1) [],
        NMATCH OFFSET(2) NUMBITS(1) [],
        STASTR OFFSET(3) NUMBITS(1) [],
        NEGACK OFFSET(4) NUMBITS(1) [],
        BER OFFSET(5) NUMBITS(1) [],
        SDAST OFFSET(6) NUMBITS(1) [],
        SLVSTP OFFSET(7) NUMBITS(1) []
    ],
    pub SMBCST [
        BUSY OFFSET(0) NUMBITS(1) [],
        BB OFFSET(1) NUMBITS(1) [],
        TGSCL OFFSET(5) NUMBITS(1) []
    ],
    pub SMBCTL1 [
        START OFFSET(0) NUMBITS(1) [],
        STOP OFFSET(1) NUMBITS(1) [],
        INTEN OFFSET(2) NUMBITS(1) [],
        ACK OFFSET(4) NUMBITS(1) [],
        STASTRE OFFSET(7) NUMBITS(1) []
    ],
    pub SMBCTL2 [
        ENABLE OFFSET(0) NUMBITS(1) [],
        // divider bits 6..0
        SCLFRQ OFFSET(1) NUMBITS(7) []
    ],
    pub SMBCTL3 [
        // divider bits 8..7
        SCLFRQ OFFSET(0) NUMBITS(2) [],
        ARPMEN OFFSET(2) NUMBITS(1) [],
        IDL_START OFFSET(3) NUMBITS(1) [],
        MODE_400K OFFSET(4) NUMBITS(1) [],
        BNK_SEL OFFSET(5) NUMBITS(1) [],
        SDA_LVL OFFSET(6) NUMBITS(1) [],
        SCL_LVL OFFSET(7) NUMBITS(1) []
    ],
    pub SMBCST3 [
        EO_BUSY OFFSET(7) NUMBITS(1) []
    ],
    pub SMBFIF_CTL [
        FIFO_EN OFFSET(4) NUMBITS(1) []
    ],
    pub SMBFIF_CTS [
        CLR_FIFO OFFSET(6) NUMBITS(1) []
    ]
];

/// A field's bits in place, for raw byte access.
const fn bits<R: RegisterLongName>(field: Field<u8, R>) -> u8 {
    field.mask << field.shift
}

/// SMBnST bits.
pub mod st {
    use super::{bits, SMBST};

    pub const XMIT: u8 = bits(SMBST::XMIT);
    pub const MASTER: u8 = bits(SMBST::MASTER);
    pub const NMATCH: u8 = bits(SMBST::NMATCH);
    pub const STASTR: u8 = bits(SMBST::STASTR);
    pub const NEGACK: u8 = bits(SMBST::NEGACK);
    pub const BER: u8 = bits(SMBST::BER);
    pub const SDAST: u8 = bits(SMBST::SDAST);
    pub const SLVSTP: u8 = bits(SMBST::SLVSTP);

    /// Writing this clears every latch.
    pub const CLEAR_ALL: u8 = 0xFF;
}

/// SMBnCST bits.
pub mod cst {
    use super::{bits, SMBCST};

    pub const BUSY: u8 = bits(SMBCST::BUSY);
    pub const BB: u8 = bits(SMBCST::BB);
    pub const TGSCL: u8 = bits(SMBCST::TGSCL);
}

/// SMBnCTL1 bits.
pub mod ctl1 {
    use super::{bits, SMBCTL1};

    pub const START: u8 = bits(SMBCTL1::START);
    pub const STOP: u8 = bits(SMBCTL1::STOP);
    pub const INTEN: u8 = bits(SMBCTL1::INTEN);
    pub const ACK: u8 = bits(SMBCTL1::ACK);
    pub const STASTRE: u8 = bits(SMBCTL1::STASTRE);
}

/// SMBnCTL2 bits.
pub mod ctl2 {
    use super::{bits, SMBCTL2};

    pub const ENABLE: u8 = bits(SMBCTL2::ENABLE);
    pub const SCLFRQ_SHIFT: u8 = SMBCTL2::SCLFRQ.shift as u8;
    pub const SCLFRQ_LOW_MASK: u16 = SMBCTL2::SCLFRQ.mask as u16;
}

/// SMBnCTL3 bits.
pub mod ctl3 {
    use super::{bits, SMBCTL3};

    pub const SCLFRQ_HIGH_MASK: u8 = bits(SMBCTL3::SCLFRQ);
    /// Bits kept when the divider is reprogrammed.
    pub const DIVIDER_KEEP_MASK: u8 = bits(SMBCTL3::ARPMEN) | bits(SMBCTL3::IDL_START);
    pub const MODE_400K: u8 = bits(SMBCTL3::MODE_400K);
    pub const BNK_SEL: u8 = bits(SMBCTL3::BNK_SEL);
    pub const SDA_LVL: u8 = bits(SMBCTL3::SDA_LVL);
    pub const SCL_LVL: u8 = bits(SMBCTL3::SCL_LVL);
}

/// SMBnCST3 bits.
pub mod cst3 {
    use super::{bits, SMBCST3};

    pub const EO_BUSY: u8 = bits(SMBCST3::EO_BUSY);
}

/// SMBnFIF_CTL bits.
pub mod fif_ctl {
    use super::{bits, SMBFIF_CTL};

    pub const FIFO_EN: u8 = bits(SMBFIF_CTL::FIFO_EN);
}

/// SMBnFIF_CTS bits.
pub mod fif_cts {
    use super::{bits, SMBFIF_CTS};

    pub const CLR_FIFO: u8 = bits(SMBFIF_CTS::CLR_FIFO);
}

/// Byte-wide access to one controller's register block.
///
/// Accesses are synchronous and cannot fail; a bus fault on the register
/// block is a platform problem, not something the protocol engine recovers.
pub trait SmbusRegisters {
    fn read(&mut self, reg: Register) -> u8;

    fn write(&mut self, reg: Register, value: u8);

    /// Address of the register block, when it has one.
    fn block_address(&self) -> Option<usize> {
        None
    }

    /// Read-modify-write helper.
    fn modify<F>(&mut self, reg: Register, f: F)
    where
        F: FnOnce(u8) -> u8,
    {
        let value = self.read(reg);
        self.write(reg, f(value));
    }

    fn set_bits(&mut self, reg: Register, bits: u8) {
        self.modify(reg, |v| v | bits);
    }

    fn clear_bits(&mut self, reg: Register, bits: u8) {
        self.modify(reg, |v| v & !bits);
    }
}

impl<T: SmbusRegisters + ?Sized> SmbusRegisters for &mut T {
    fn read(&mut self, reg: Register) -> u8 {
        (**self).read(reg)
    }

    fn write(&mut self, reg: Register, value: u8) {
        (**self).write(reg, value);
    }

    fn block_address(&self) -> Option<usize> {
        (**self).block_address()
    }
}

/// Memory-mapped register block.
pub struct MmioRegisters {
    base: usize,
}

impl MmioRegisters {
    /// # Safety
    ///
    /// `base` must be the address of an SMBus module register block that
    /// stays mapped for the lifetime of the returned value, and no other
    /// code may access that block concurrently.
    #[must_use]
    pub const unsafe fn new(base: usize) -> Self {
        Self { base }
    }

    #[must_use]
    pub const fn base(&self) -> usize {
        self.base
    }

    fn ptr(&self, reg: Register) -> *mut u8 {
        (self.base + reg.offset()) as *mut u8
    }
}

impl SmbusRegisters for MmioRegisters {
    fn read(&mut self, reg: Register) -> u8 {
        // SAFETY: validity of the block is the contract of `MmioRegisters::new`.
        unsafe { core::ptr::read_volatile(self.ptr(reg)) }
    }

    fn write(&mut self, reg: Register, value: u8) {
        // SAFETY: validity of the block is the contract of `MmioRegisters::new`.
        unsafe { core::ptr::write_volatile(self.ptr(reg), value) }
    }

    fn block_address(&self) -> Option<usize> {
        Some(self.base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mmio_uses_register_offsets() {
        let mut block = [0u8; 0x20];
        let mut regs = unsafe { MmioRegisters::new(block.as_mut_ptr() as usize) };

        regs.write(Register::Ctl1, 0x5A);
        regs.set_bits(Register::Ctl2, ctl2::ENABLE);
        regs.write(Register::Ctl4, 17);

        assert_eq!(regs.read(Register::Ctl1), 0x5A);
        assert_eq!(block[0x06], 0x5A);
        assert_eq!(block[0x0A], 0x01);
        assert_eq!(block[0x1A], 17);
        assert_eq!(regs.block_address(), Some(block.as_ptr() as usize));
    }

    #[test]
    fn clear_bits_keeps_other_bits() {
        let mut block = [0u8; 0x20];
        block[0x06] = ctl1::STASTRE | ctl1::ACK;
        let mut regs = unsafe { MmioRegisters::new(block.as_mut_ptr() as usize) };

        regs.clear_bits(Register::Ctl1, ctl1::STASTRE);

        assert_eq!(regs.read(Register::Ctl1), ctl1::ACK);
    }

    #[test]
    fn field_masks_match_register_layout() {
        assert_eq!(st::MASTER, 0x02);
        assert_eq!(st::NEGACK | st::BER | st::SDAST, 0x70);
        assert_eq!(cst::TGSCL, 0x20);
        assert_eq!(ctl1::STASTRE | ctl1::ACK, 0x90);
        assert_eq!(ctl2::SCLFRQ_SHIFT, 1);
        assert_eq!(ctl2::SCLFRQ_LOW_MASK, 0x7F);
        assert_eq!(ctl3::SCLFRQ_HIGH_MASK, 0x03);
        assert_eq!(ctl3::DIVIDER_KEEP_MASK, 0x0C);
        assert_eq!(ctl3::SDA_LVL | ctl3::SCL_LVL, 0xC0);
        assert_eq!(fif_cts::CLR_FIFO, 0x40);
    }

    #[test]
    fn banked_registers_share_the_window() {
        assert!((0x10..0x20).contains(&Register::FifCts.offset()));
        assert!((0x10..0x20).contains(&Register::Ctl4.offset()));
        assert!(Register::Ctl3.offset() < 0x10);
    }
}
