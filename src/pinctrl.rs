// Licensed under the Apache-2.0 license

//! SMBus pin routing through the NPCM7xx global control registers.
//!
//! Each SMBus module owns one multi-function select bit that hands its
//! SCL/SDA pins to the controller. Modules 0 and 4 additionally have a
//! segment selector; both are routed to segment A with the data-enable and
//! data-write-enable lines asserted.

use crate::i2c::error::Error;

/// GCR registers touched by SMBus routing.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum GcrRegister {
    Mfsel1,
    Mfsel3,
    Mfsel4,
    I2cSegSel,
    I2cSegCtl,
}

impl GcrRegister {
    #[must_use]
    pub const fn offset(self) -> usize {
        match self {
            GcrRegister::Mfsel1 => 0x260,
            GcrRegister::Mfsel3 => 0x26C,
            GcrRegister::Mfsel4 => 0xB0,
            GcrRegister::I2cSegSel => 0xE0,
            GcrRegister::I2cSegCtl => 0xE4,
        }
    }
}

/// Base of the global control register block.
pub const GCR_BASE: usize = 0xF080_0000;

pub trait GcrAccess {
    fn read32(&mut self, reg: GcrRegister) -> u32;

    fn write32(&mut self, reg: GcrRegister, value: u32);
}

impl<T: GcrAccess + ?Sized> GcrAccess for &mut T {
    fn read32(&mut self, reg: GcrRegister) -> u32 {
        (**self).read32(reg)
    }

    fn write32(&mut self, reg: GcrRegister, value: u32) {
        (**self).write32(reg, value);
    }
}

/// One read-modify-write of a GCR register.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MuxOp {
    pub register: GcrRegister,
    pub clear: u32,
    pub set: u32,
}

impl MuxOp {
    const fn select(register: GcrRegister, bit: u32) -> Self {
        Self {
            register,
            clear: 0,
            set: 1 << bit,
        }
    }

    const fn field(register: GcrRegister, clear: u32, set: u32) -> Self {
        Self {
            register,
            clear,
            set,
        }
    }
}

const S0DECFG_SHIFT: u32 = 3;
const S4DECFG_SHIFT: u32 = 17;
const DECFG_MASK: u32 = 0x3;
const S0DEN: u32 = 1 << 20;
const S0DWE: u32 = 1 << 21;
const S4DEN: u32 = 1 << 24;
const S4DWE: u32 = 1 << 25;

use GcrRegister::{I2cSegCtl, I2cSegSel, Mfsel1, Mfsel3, Mfsel4};

/// Routing steps per module, applied in order.
pub static SMBUS_MUX: [&[MuxOp]; 16] = [
    &[
        MuxOp::select(Mfsel1, 6),
        MuxOp::field(I2cSegSel, DECFG_MASK << S0DECFG_SHIFT, 0),
        MuxOp::field(I2cSegCtl, 0, S0DEN | S0DWE),
    ],
    &[MuxOp::select(Mfsel1, 7)],
    &[MuxOp::select(Mfsel1, 8)],
    &[MuxOp::select(Mfsel1, 9)],
    &[
        MuxOp::select(Mfsel1, 10),
        MuxOp::field(I2cSegSel, DECFG_MASK << S4DECFG_SHIFT, 0),
        MuxOp::field(I2cSegCtl, 0, S4DEN | S4DWE),
    ],
    &[MuxOp::select(Mfsel1, 2)],
    &[MuxOp::select(Mfsel3, 1)],
    &[MuxOp::select(Mfsel3, 2)],
    &[MuxOp::select(Mfsel4, 11)],
    &[MuxOp::select(Mfsel4, 12)],
    &[MuxOp::select(Mfsel4, 13)],
    &[MuxOp::select(Mfsel4, 14)],
    &[MuxOp::select(Mfsel3, 5)],
    &[MuxOp::select(Mfsel3, 6)],
    &[MuxOp::select(Mfsel3, 22)],
    &[MuxOp::select(Mfsel3, 24)],
];

/// Hand the pins of SMBus `module` to the controller.
///
/// # Errors
///
/// `InvalidArgument` for a module without a routing entry. Nothing is
/// written in that case.
pub fn route_smbus<G: GcrAccess>(gcr: &mut G, module: u8) -> Result<(), Error> {
    let ops = SMBUS_MUX
        .get(usize::from(module))
        .ok_or(Error::InvalidArgument)?;
    for op in ops.iter() {
        let value = gcr.read32(op.register);
        gcr.write32(op.register, (value & !op.clear) | op.set);
    }
    Ok(())
}

/// Memory-mapped GCR block.
pub struct MmioGcr {
    base: usize,
}

impl MmioGcr {
    /// # Safety
    ///
    /// `base` must address the GCR block, mapped for the lifetime of the
    /// returned value. Other users of the block must not race the
    /// read-modify-write sequences.
    #[must_use]
    pub const unsafe fn new(base: usize) -> Self {
        Self { base }
    }
}

impl GcrAccess for MmioGcr {
    fn read32(&mut self, reg: GcrRegister) -> u32 {
        // SAFETY: see `MmioGcr::new`.
        unsafe { core::ptr::read_volatile((self.base + reg.offset()) as *const u32) }
    }

    fn write32(&mut self, reg: GcrRegister, value: u32) {
        // SAFETY: see `MmioGcr::new`.
        unsafe { core::ptr::write_volatile((self.base + reg.offset()) as *mut u32, value) }
    }
}
