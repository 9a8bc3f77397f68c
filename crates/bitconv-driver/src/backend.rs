//! Backend abstraction for register access
//!
//! Two register sets implement [`RegisterInterface`]: the real bridge window
//! over `/dev/mem`, and a cycle-stepped simulation of the fabric for CI and
//! latency studies.

use crate::backends::bridge::{BridgeBackend, BridgeConfig};
use crate::backends::software::{SimConfig, SimulatedAccelerator};
use crate::error::Result;
use crate::register::RegisterInterface;

/// Backend type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// HPS-to-FPGA lightweight bridge mapped from `/dev/mem`
    Bridge,

    /// Simulated fabric, no hardware required
    Software,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bridge => write!(f, "Bridge (/dev/mem)"),
            Self::Software => write!(f, "Software (simulated fabric)"),
        }
    }
}

/// Backend selection strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendSelection {
    /// Map the bridge and talk to the programmed fabric
    Bridge,

    /// Force the simulated fabric
    Software,
}

/// Settings for every backend; [`select_backend`] uses the matching one
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendOptions {
    /// Bridge window location
    pub bridge: BridgeConfig,
    /// Simulated fabric behaviour
    pub sim: SimConfig,
}

/// Open the selected backend.
///
/// # Errors
///
/// Returns error if the bridge window cannot be mapped.
pub fn select_backend(
    selection: BackendSelection,
    options: &BackendOptions,
) -> Result<Box<dyn RegisterInterface>> {
    match selection {
        BackendSelection::Bridge => {
            let backend = BridgeBackend::open(&options.bridge)?;
            tracing::info!(
                "Using bridge backend at {:#x} via {}",
                options.bridge.base,
                options.bridge.device_path.display()
            );
            Ok(Box::new(backend))
        }

        BackendSelection::Software => {
            tracing::info!("Using simulated fabric ({:?})", options.sim);
            Ok(Box::new(SimulatedAccelerator::new(options.sim)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn software_selection_needs_no_hardware() {
        let regs = select_backend(BackendSelection::Software, &BackendOptions::default()).unwrap();
        assert_eq!(regs.backend_type(), BackendType::Software);
    }

    #[test]
    fn bridge_selection_reports_map_failure() {
        let options = BackendOptions {
            bridge: BridgeConfig {
                device_path: PathBuf::from("/nonexistent/mem"),
                ..BridgeConfig::default()
            },
            ..BackendOptions::default()
        };
        assert!(select_backend(BackendSelection::Bridge, &options).is_err());
    }

    #[test]
    fn display_names_are_distinct() {
        assert_ne!(
            BackendType::Bridge.to_string(),
            BackendType::Software.to_string()
        );
    }
}
