//! Lightweight-bridge backend

use crate::backend::BackendType;
use crate::backends::mmap::DevMemWindow;
use crate::error::{DriverError, Result};
use crate::register::{ReadRegister, RegisterInterface, WriteRegister};
use bitconv_chip::bridge::{fits, DEV_MEM, LW_BASE, LW_SPAN};
use bitconv_chip::regs;
use std::path::PathBuf;

/// Where the PIO window lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Physical-memory device
    pub device_path: PathBuf,
    /// Physical base address of the window
    pub base: u64,
    /// Window span in bytes
    pub span: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            device_path: PathBuf::from(DEV_MEM),
            base: LW_BASE,
            span: LW_SPAN,
        }
    }
}

/// Register set backed by the mapped bridge window
#[derive(Debug)]
pub struct BridgeBackend {
    window: DevMemWindow,
}

impl BridgeBackend {
    /// Map the window described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::MapFailed`] if the span cannot hold every
    /// register or the mapping fails.
    pub fn open(config: &BridgeConfig) -> Result<Self> {
        if !fits(regs::READ_COUNT2, config.span) {
            return Err(DriverError::map_failed(format!(
                "span {:#x} too small for READ_COUNT2 at {:#x}",
                config.span,
                regs::READ_COUNT2
            )));
        }
        let window = DevMemWindow::map(&config.device_path, config.base, config.span)?;
        Ok(Self { window })
    }

    /// The mapped window
    pub const fn window(&self) -> &DevMemWindow {
        &self.window
    }
}

impl RegisterInterface for BridgeBackend {
    fn write(&mut self, reg: WriteRegister, value: u32) -> Result<()> {
        tracing::trace!("bridge[{:#04x}] <- {value:#010x}", reg.offset());
        self.window.write_u32(reg.offset(), value)
    }

    fn read(&mut self, reg: ReadRegister) -> Result<u32> {
        let value = self.window.read_u32(reg.offset())?;
        tracing::trace!("bridge[{:#04x}] -> {value:#010x}", reg.offset());
        Ok(value)
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Bridge
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_points_at_lightweight_bridge() {
        let config = BridgeConfig::default();
        assert_eq!(config.base, 0xFF20_0000);
        assert_eq!(config.span, 0x1000);
        assert_eq!(config.device_path, PathBuf::from("/dev/mem"));
    }

    #[test]
    fn short_span_is_rejected_before_mapping() {
        let config = BridgeConfig {
            span: 0x40,
            ..BridgeConfig::default()
        };
        let err = BridgeBackend::open(&config).unwrap_err();
        assert!(err.to_string().contains("too small"));
    }

    #[test]
    #[ignore = "requires /dev/mem and a programmed fabric"]
    fn hardware_status_register_is_readable() {
        let mut bridge = BridgeBackend::open(&BridgeConfig::default()).unwrap();
        let status = bridge.read(ReadRegister::Status).unwrap();
        assert_eq!(status & !0xF, 0);
    }
}
