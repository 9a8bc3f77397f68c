//! Register interface and typed register words
//!
//! The five PIO ports are the only state shared with the fabric. Everything
//! above this module talks to them through [`RegisterInterface`] and the
//! typed [`ControlWord`] / [`StatusWord`] records, never through raw bits.

use crate::backend::BackendType;
use crate::error::Result;
use bitconv_chip::geometry::PLANE_MASK;
use bitconv_chip::regs::{self, control, status};
use std::fmt::Debug;

/// Host-writable ports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteRegister {
    /// `WRITE_0`: input-window bit-plane
    InputPlane,
    /// `WRITE_1`: kernel bit-plane and control bits
    Control,
}

impl WriteRegister {
    /// Byte offset inside the bridge window
    pub const fn offset(self) -> usize {
        match self {
            Self::InputPlane => regs::WRITE_0,
            Self::Control => regs::WRITE_1,
        }
    }
}

/// Host-readable ports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadRegister {
    /// `READ`: status bits and result chunk
    Status,
    /// `READ_COUNT`: compute cycle counter
    ComputeCount,
    /// `READ_COUNT2`: overhead-inclusive cycle counter
    OverheadCount,
}

impl ReadRegister {
    /// Byte offset inside the bridge window
    pub const fn offset(self) -> usize {
        match self {
            Self::Status => regs::READ,
            Self::ComputeCount => regs::READ_COUNT,
            Self::OverheadCount => regs::READ_COUNT2,
        }
    }
}

/// Access to the fabric's register set.
///
/// Every call is one ordered, observable bus access: implementations must
/// not cache, merge or reorder them. Both methods take `&mut self` because
/// a read of `READ` can change fabric state on real hardware and always
/// advances the simulated clock.
///
/// Access is not reentrant. One driver owns one implementation for the
/// whole run; sharing a register set between threads is unsupported.
pub trait RegisterInterface: Debug {
    /// Write a 32-bit word to a host-writable port.
    ///
    /// # Errors
    ///
    /// Returns error if the access cannot be performed.
    fn write(&mut self, reg: WriteRegister, value: u32) -> Result<()>;

    /// Read a 32-bit word from a host-readable port.
    ///
    /// # Errors
    ///
    /// Returns error if the access cannot be performed.
    fn read(&mut self, reg: ReadRegister) -> Result<u32>;

    /// Backend type for logging
    fn backend_type(&self) -> BackendType;
}

impl<R: RegisterInterface + ?Sized> RegisterInterface for Box<R> {
    fn write(&mut self, reg: WriteRegister, value: u32) -> Result<()> {
        (**self).write(reg, value)
    }

    fn read(&mut self, reg: ReadRegister) -> Result<u32> {
        (**self).read(reg)
    }

    fn backend_type(&self) -> BackendType {
        (**self).backend_type()
    }
}

impl<R: RegisterInterface + ?Sized> RegisterInterface for &mut R {
    fn write(&mut self, reg: WriteRegister, value: u32) -> Result<()> {
        (**self).write(reg, value)
    }

    fn read(&mut self, reg: ReadRegister) -> Result<u32> {
        (**self).read(reg)
    }

    fn backend_type(&self) -> BackendType {
        (**self).backend_type()
    }
}

/// Contents of `WRITE_1`.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlWord {
    /// Bit 29: gate for the overhead-inclusive counter
    pub perf2_enable: bool,
    /// Bit 28: zero both counters (pulse)
    pub perf_reset: bool,
    /// Bit 27: per-cell fabric reset (pulse)
    pub reset: bool,
    /// Bit 26: host accepts a result
    pub ready: bool,
    /// Bit 25: host data strobe (pulse)
    pub valid: bool,
    /// Bits 24:0: kernel bit-plane
    pub kernel_plane: u32,
}

impl ControlWord {
    /// Pack into the register layout. Plane bits above 24 are dropped.
    pub const fn encode(&self) -> u32 {
        let mut word = self.kernel_plane & PLANE_MASK;
        if self.perf2_enable {
            word |= control::PERF2_ENABLE;
        }
        if self.perf_reset {
            word |= control::PERF_RESET;
        }
        if self.reset {
            word |= control::RESET;
        }
        if self.ready {
            word |= control::READY;
        }
        if self.valid {
            word |= control::VALID;
        }
        word
    }

    /// Unpack from the register layout
    pub const fn decode(word: u32) -> Self {
        Self {
            perf2_enable: word & control::PERF2_ENABLE != 0,
            perf_reset: word & control::PERF_RESET != 0,
            reset: word & control::RESET != 0,
            ready: word & control::READY != 0,
            valid: word & control::VALID != 0,
            kernel_plane: word & PLANE_MASK,
        }
    }
}

/// Contents of `READ`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusWord {
    /// Bit 3: fabric can accept a plane
    pub fabric_ready: bool,
    /// Bit 2: `chunk` holds a fresh result chunk
    pub output_valid: bool,
    /// Bits 1:0: result chunk
    pub chunk: u8,
}

impl StatusWord {
    /// Pack into the register layout
    #[allow(clippy::cast_lossless)]
    pub const fn encode(&self) -> u32 {
        let mut word = self.chunk as u32 & status::CHUNK_MASK;
        if self.output_valid {
            word |= status::OUTPUT_VALID;
        }
        if self.fabric_ready {
            word |= status::FABRIC_READY;
        }
        word
    }

    /// Unpack from the register layout. Bits above 3 are ignored.
    pub const fn decode(word: u32) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        let chunk = (word & status::CHUNK_MASK) as u8;
        Self {
            fabric_ready: word & status::FABRIC_READY != 0,
            output_valid: word & status::OUTPUT_VALID != 0,
            chunk,
        }
    }
}
