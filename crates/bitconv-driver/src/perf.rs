//! Fabric cycle counters.
//!
//! `READ_COUNT` ticks only while the fabric is computing; `READ_COUNT2`
//! ticks whenever the host holds perf counter 2 enabled, so it also sees
//! bus transfers and handshake turnaround. Both are zeroed by the
//! perf-reset pulse in [`HandshakeDriver::initialize`].
//!
//! [`HandshakeDriver::initialize`]: crate::HandshakeDriver::initialize

use crate::error::Result;
use crate::register::{ReadRegister, RegisterInterface};
use bitconv_chip::clock::{cycles_to_seconds, FABRIC_HZ};
use std::fmt;

/// One counter value, normalised per output cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CounterReading {
    /// Raw counter value
    pub cycles: u32,
    /// Output cells the count covers
    pub cells: usize,
    /// Clock the counter runs on
    pub clock_hz: f64,
}

impl CounterReading {
    /// Elapsed fabric time in seconds
    pub fn seconds(&self) -> f64 {
        cycles_to_seconds(u64::from(self.cycles), self.clock_hz)
    }

    /// Mean cycles per output cell
    pub fn cycles_per_cell(&self) -> f64 {
        if self.cells == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let cells = self.cells as f64;
        f64::from(self.cycles) / cells
    }

    /// Mean fabric time per output cell in microseconds
    pub fn micros_per_cell(&self) -> f64 {
        if self.cells == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let cells = self.cells as f64;
        1e6 * self.seconds() / cells
    }

    fn write_block(&self, f: &mut fmt::Formatter<'_>, title: &str) -> fmt::Result {
        writeln!(f, "Performance metrics in FPGA {title}:")?;
        writeln!(
            f,
            "Total number of clock cycles required in FPGA                  : {}",
            self.cycles
        )?;
        writeln!(
            f,
            "Total time in FPGA                                             : {:.9} seconds",
            self.seconds()
        )?;
        writeln!(
            f,
            "Average number of clock cycles required per computation in FPGA: {:.9}",
            self.cycles_per_cell()
        )?;
        write!(
            f,
            "Average time per computation in FPGA                           : {:.9} useconds",
            self.micros_per_cell()
        )
    }
}

/// Both counters sampled after a run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerfSample {
    /// `READ_COUNT`: compute only
    pub compute: CounterReading,
    /// `READ_COUNT2`: compute plus communication and scheduling
    pub overhead: CounterReading,
}

impl fmt::Display for PerfSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.compute.write_block(f, "with no overhead")?;
        writeln!(f)?;
        writeln!(f)?;
        self.overhead
            .write_block(f, "with communication and scheduling overhead")
    }
}

/// Reads the cycle counters and converts them to time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerformanceSampler {
    clock_hz: f64,
}

impl PerformanceSampler {
    /// Sampler for counters running at `clock_hz`
    pub const fn new(clock_hz: f64) -> Self {
        Self { clock_hz }
    }

    /// Clock the sampler converts with
    pub const fn clock_hz(&self) -> f64 {
        self.clock_hz
    }

    /// Read both counters; `cells` is the number of output cells they cover.
    ///
    /// # Errors
    ///
    /// Returns error if a counter read fails.
    pub fn sample<R: RegisterInterface + ?Sized>(
        &self,
        regs: &mut R,
        cells: usize,
    ) -> Result<PerfSample> {
        let compute = regs.read(ReadRegister::ComputeCount)?;
        let overhead = regs.read(ReadRegister::OverheadCount)?;
        tracing::debug!("Counters: compute={compute} overhead={overhead} over {cells} cells");
        Ok(PerfSample {
            compute: CounterReading {
                cycles: compute,
                cells,
                clock_hz: self.clock_hz,
            },
            overhead: CounterReading {
                cycles: overhead,
                cells,
                clock_hz: self.clock_hz,
            },
        })
    }
}

impl Default for PerformanceSampler {
    fn default() -> Self {
        Self::new(FABRIC_HZ)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendType;
    use crate::register::WriteRegister;

    #[derive(Debug)]
    struct Counters(u32, u32);

    impl RegisterInterface for Counters {
        fn write(&mut self, _: WriteRegister, _: u32) -> Result<()> {
            Ok(())
        }

        fn read(&mut self, reg: ReadRegister) -> Result<u32> {
            Ok(match reg {
                ReadRegister::ComputeCount => self.0,
                ReadRegister::OverheadCount => self.1,
                ReadRegister::Status => 0,
            })
        }

        fn backend_type(&self) -> BackendType {
            BackendType::Software
        }
    }

    #[test]
    fn averages_divide_by_cell_count() {
        let s = PerformanceSampler::default()
            .sample(&mut Counters(5_000, 75_000), 25)
            .unwrap();
        assert!((s.compute.cycles_per_cell() - 200.0).abs() < 1e-9);
        assert!((s.overhead.cycles_per_cell() - 3_000.0).abs() < 1e-9);
        assert!((s.compute.seconds() - 1e-4).abs() < 1e-15);
        assert!((s.compute.micros_per_cell() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn metrics_are_non_negative() {
        let s = PerformanceSampler::default()
            .sample(&mut Counters(0, u32::MAX), 1)
            .unwrap();
        for r in [s.compute, s.overhead] {
            assert!(r.seconds() >= 0.0);
            assert!(r.cycles_per_cell() >= 0.0);
            assert!(r.micros_per_cell() >= 0.0);
        }
    }

    #[test]
    fn zero_cells_does_not_divide_by_zero() {
        let s = PerformanceSampler::default()
            .sample(&mut Counters(10, 10), 0)
            .unwrap();
        assert_eq!(s.compute.cycles_per_cell(), 0.0);
        assert_eq!(s.overhead.micros_per_cell(), 0.0);
    }

    #[test]
    fn report_has_both_blocks() {
        let s = PerformanceSampler::default()
            .sample(&mut Counters(100, 200), 4)
            .unwrap();
        let text = s.to_string();
        assert!(text.contains("with no overhead"));
        assert!(text.contains("with communication and scheduling overhead"));
        assert!(text.contains(": 100\n"));
        assert!(text.contains(": 200\n"));
    }
}
