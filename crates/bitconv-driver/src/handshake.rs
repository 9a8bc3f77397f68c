//! Bit-serial handshake with the convolution fabric.
//!
//! One output cell is one pass through `Idle → Reset → Streaming → Done`:
//!
//! ```text
//! Reset      WRITE_1.reset ↑↓                      clear fabric accumulator
//! Streaming  WRITE_1.perf2_enable ↑, ready ↑
//!   loop while bits < 16:
//!     WRITE_0 ← plane(window, p)
//!     WRITE_1 ← plane(kernel, p) | ready
//!     WRITE_1.valid ↑↓                             fabric samples the planes
//!     READ → if output_valid:
//!              acc |= chunk << bits; bits += 2
//!              WRITE_1.ready ↓↑                    ack, clears output_valid
//!     p += 1
//! Done       WRITE_1.perf2_enable ↓
//! ```
//!
//! The plane index keeps counting past 7 while the fabric is still
//! returning chunks; those planes serialize as zero. The loop ends on the
//! 16-bit condition alone, capped by [`HandshakeConfig::cycle_budget`].

use crate::error::{DriverError, Result};
use crate::register::{ControlWord, ReadRegister, RegisterInterface, StatusWord, WriteRegister};
use crate::serializer::bit_plane;
use bitconv_chip::geometry::{CHUNK_BITS, RESULT_BITS};
use bitconv_models::{CellIndex, Image, Kernel, OutputTensor, Window};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Handshake tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeConfig {
    /// Maximum polling cycles per output cell before the fabric is declared
    /// unresponsive
    pub cycle_budget: u32,

    /// Poll `READ.fabric_ready` before each transfer
    pub wait_for_ready: bool,
}

impl HandshakeConfig {
    /// Default per-cell cycle budget
    pub const DEFAULT_CYCLE_BUDGET: u32 = 4096;
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            cycle_budget: Self::DEFAULT_CYCLE_BUDGET,
            wait_for_ready: false,
        }
    }
}

/// Cooperative cancellation flag, checked once per polling cycle.
///
/// Clones share the flag, so one can be handed to a watchdog while the
/// driver holds another.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// New, un-cancelled token
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// True once [`cancel`](Self::cancel) has been called
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Where the driver is in the per-cell sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakePhase {
    /// Between cells
    Idle,
    /// Reset pulse in flight
    Reset,
    /// Planes going out, chunks coming back
    Streaming,
    /// Last cell finished its 16 bits
    Done,
}

/// Polling statistics for one cell
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CellStats {
    /// Loop iterations spent on the cell
    pub cycles: u32,
    /// Planes sent (the last plane index + 1)
    pub planes_sent: u32,
    /// Iterations that produced no chunk
    pub idle_polls: u32,
}

/// Polling statistics for a whole run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Cells completed
    pub cells: usize,
    /// Sum of per-cell cycles
    pub total_cycles: u64,
    /// Fewest cycles any cell needed
    pub min_cycles: u32,
    /// Most cycles any cell needed
    pub max_cycles: u32,
    /// Sum of per-cell idle polls
    pub idle_polls: u64,
}

impl RunStats {
    fn record(&mut self, cell: CellStats) {
        if self.cells == 0 {
            self.min_cycles = cell.cycles;
            self.max_cycles = cell.cycles;
        } else {
            self.min_cycles = self.min_cycles.min(cell.cycles);
            self.max_cycles = self.max_cycles.max(cell.cycles);
        }
        self.cells += 1;
        self.total_cycles += u64::from(cell.cycles);
        self.idle_polls += u64::from(cell.idle_polls);
    }

    /// Mean polling cycles per cell
    #[allow(clippy::cast_precision_loss)]
    pub fn mean_cycles(&self) -> f64 {
        if self.cells == 0 {
            return 0.0;
        }
        self.total_cycles as f64 / self.cells as f64
    }
}

/// Protocol driver owning one register set.
#[derive(Debug)]
pub struct HandshakeDriver<R> {
    regs: R,
    config: HandshakeConfig,
    control: ControlWord,
    phase: HandshakePhase,
    initialized: bool,
    cancel: Option<CancelToken>,
}

impl<R: RegisterInterface> HandshakeDriver<R> {
    /// Wrap a register set
    pub fn new(regs: R, config: HandshakeConfig) -> Self {
        Self {
            regs,
            config,
            control: ControlWord::default(),
            phase: HandshakePhase::Idle,
            initialized: false,
            cancel: None,
        }
    }

    /// Attach a cancellation token
    #[must_use]
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Current phase
    pub const fn phase(&self) -> HandshakePhase {
        self.phase
    }

    /// Active configuration
    pub const fn config(&self) -> &HandshakeConfig {
        &self.config
    }

    /// Last word written to `WRITE_1`
    pub const fn control(&self) -> ControlWord {
        self.control
    }

    /// Borrow the register set
    pub const fn registers(&self) -> &R {
        &self.regs
    }

    /// Borrow the register set mutably, e.g. to sample counters
    pub fn registers_mut(&mut self) -> &mut R {
        &mut self.regs
    }

    /// Release the register set
    pub fn into_inner(self) -> R {
        self.regs
    }

    /// Bring both ports to a known state and zero the cycle counters.
    ///
    /// Runs once before the first cell.
    ///
    /// # Errors
    ///
    /// Returns error if a register access fails.
    pub fn initialize(&mut self) -> Result<()> {
        self.regs.write(WriteRegister::InputPlane, 0)?;
        self.control = ControlWord::default();
        self.write_control()?;
        self.control.ready = true;
        self.write_control()?;

        self.control.perf_reset = true;
        self.write_control()?;
        self.control.perf_reset = false;
        self.write_control()?;

        self.initialized = true;
        self.phase = HandshakePhase::Idle;
        info!(
            "Handshake initialized on {} backend (budget {} cycles/cell)",
            self.regs.backend_type(),
            self.config.cycle_budget
        );
        Ok(())
    }

    /// Compute one output cell on the fabric.
    ///
    /// `cell` is used for diagnostics only.
    ///
    /// # Errors
    ///
    /// - [`DriverError::InvalidState`] if [`initialize`](Self::initialize)
    ///   has not run
    /// - [`DriverError::AcceleratorUnresponsive`] if 16 bits are not
    ///   collected within the cycle budget
    /// - [`DriverError::Cancelled`] if the cancel token fires
    /// - any register access error
    pub fn compute_cell(
        &mut self,
        window: &Window,
        kernel: &Kernel,
        cell: CellIndex,
    ) -> Result<(u16, CellStats)> {
        if !self.initialized {
            return Err(DriverError::invalid_state("compute_cell before initialize"));
        }

        // Idle → Reset
        self.phase = HandshakePhase::Reset;
        self.control.reset = true;
        self.write_control()?;
        self.control.reset = false;
        self.write_control()?;

        // Reset → Streaming
        self.phase = HandshakePhase::Streaming;
        self.control.perf2_enable = true;
        self.control.ready = true;
        self.write_control()?;

        let mut acc: u16 = 0;
        let mut bits: u32 = 0;
        let mut stats = CellStats::default();

        while bits < RESULT_BITS {
            if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                self.abandon_cell()?;
                return Err(DriverError::Cancelled { cell });
            }
            if stats.cycles >= self.config.cycle_budget {
                self.abandon_cell()?;
                return Err(DriverError::AcceleratorUnresponsive {
                    cell,
                    cycles: stats.cycles,
                });
            }
            stats.cycles += 1;

            if self.config.wait_for_ready && !self.read_status()?.fabric_ready {
                stats.idle_polls += 1;
                continue;
            }

            let plane = stats.planes_sent;
            self.regs
                .write(WriteRegister::InputPlane, bit_plane(window, plane))?;
            self.control.kernel_plane = bit_plane(kernel.weights(), plane);
            self.write_control()?;

            self.control.valid = true;
            self.write_control()?;
            self.control.valid = false;
            self.write_control()?;

            let status = self.read_status()?;
            if status.output_valid {
                acc |= u16::from(status.chunk) << bits;
                bits += CHUNK_BITS;

                self.control.ready = false;
                self.write_control()?;
                self.control.ready = true;
                self.write_control()?;
            } else {
                stats.idle_polls += 1;
            }

            stats.planes_sent += 1;
        }

        // Streaming → Done
        self.control.perf2_enable = false;
        self.write_control()?;
        self.phase = HandshakePhase::Done;

        debug!(
            "Cell {cell} = {acc} ({} cycles, {} planes, {} idle)",
            stats.cycles, stats.planes_sent, stats.idle_polls
        );
        Ok((acc, stats))
    }

    /// Initialize, then compute every output cell of `image`.
    ///
    /// Cells are visited channel by channel, row-major within a channel.
    ///
    /// # Errors
    ///
    /// Returns the first error from [`compute_cell`](Self::compute_cell), or
    /// [`DriverError::Model`] if the image is smaller than the window.
    pub fn run(&mut self, image: &Image, kernel: &Kernel) -> Result<(OutputTensor, RunStats)> {
        let mut out = OutputTensor::for_image(image)?;
        self.initialize()?;

        let mut run = RunStats::default();
        let cells: Vec<CellIndex> = out.cells().collect();
        let per_channel = out.shape().height * out.shape().width;

        for (n, cell) in cells.into_iter().enumerate() {
            let window = image.window(cell.row, cell.col, cell.channel);
            let (value, stats) = self.compute_cell(&window, kernel, cell)?;
            out.set(cell, value);
            run.record(stats);

            if (n + 1) % per_channel == 0 {
                info!(
                    "Channel {} complete ({} cells, mean {:.1} cycles/cell)",
                    cell.channel,
                    run.cells,
                    run.mean_cycles()
                );
            }
        }

        self.phase = HandshakePhase::Done;
        Ok((out, run))
    }

    /// Drop perf2 gating and return to idle after an aborted cell. The next
    /// cell's reset pulse clears whatever the fabric was holding.
    fn abandon_cell(&mut self) -> Result<()> {
        self.control.perf2_enable = false;
        self.control.valid = false;
        self.control.ready = true;
        self.write_control()?;
        self.phase = HandshakePhase::Idle;
        Ok(())
    }

    fn write_control(&mut self) -> Result<()> {
        let word = self.control.encode();
        trace!("WRITE_1 <- {word:#010x}");
        self.regs.write(WriteRegister::Control, word)
    }

    fn read_status(&mut self) -> Result<StatusWord> {
        let word = self.regs.read(ReadRegister::Status)?;
        trace!("READ    -> {word:#010x}");
        Ok(StatusWord::decode(word))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendType;
    use bitconv_chip::regs::control;

    /// Scripted register set: replays a fixed sequence of status words and
    /// records every write.
    #[derive(Debug, Default)]
    struct Scripted {
        statuses: Vec<u32>,
        next: usize,
        writes: Vec<(WriteRegister, u32)>,
        status_reads: usize,
    }

    impl Scripted {
        fn new(statuses: Vec<u32>) -> Self {
            Self {
                statuses,
                ..Self::default()
            }
        }

        fn control_writes(&self) -> Vec<u32> {
            self.writes
                .iter()
                .filter(|(r, _)| *r == WriteRegister::Control)
                .map(|&(_, v)| v)
                .collect()
        }
    }

    impl RegisterInterface for Scripted {
        fn write(&mut self, reg: WriteRegister, value: u32) -> Result<()> {
            self.writes.push((reg, value));
            Ok(())
        }

        fn read(&mut self, reg: ReadRegister) -> Result<u32> {
            assert_eq!(reg, ReadRegister::Status);
            self.status_reads += 1;
            let word = self.statuses.get(self.next).copied().unwrap_or(0);
            self.next += 1;
            Ok(word)
        }

        fn backend_type(&self) -> BackendType {
            BackendType::Software
        }
    }

    const VALID: u32 = 0b100;

    fn chunks_of(value: u16) -> Vec<u32> {
        (0..8).map(|i| VALID | u32::from((value >> (2 * i)) & 0b11)).collect()
    }

    fn driver(statuses: Vec<u32>) -> HandshakeDriver<Scripted> {
        let mut d = HandshakeDriver::new(Scripted::new(statuses), HandshakeConfig::default());
        d.initialize().unwrap();
        d
    }

    #[test]
    fn assembles_chunks_low_bits_first() {
        let mut d = driver(chunks_of(0xB4E1));
        let (value, stats) = d
            .compute_cell(&[[0; 5]; 5], &Kernel::CENTER_WEIGHTED, CellIndex::new(0, 0, 0))
            .unwrap();
        assert_eq!(value, 0xB4E1);
        assert_eq!(stats.cycles, 8);
        assert_eq!(stats.idle_polls, 0);
        assert_eq!(d.phase(), HandshakePhase::Done);
    }

    #[test]
    fn idle_polls_keep_advancing_the_plane() {
        let mut script = vec![0, 0, 0];
        script.extend(chunks_of(450));
        let mut d = driver(script);
        let (value, stats) = d
            .compute_cell(&[[10; 5]; 5], &Kernel::CENTER_WEIGHTED, CellIndex::new(0, 0, 0))
            .unwrap();
        assert_eq!(value, 450);
        assert_eq!(stats.cycles, 11);
        assert_eq!(stats.planes_sent, 11);
        assert_eq!(stats.idle_polls, 3);
    }

    #[test]
    fn stops_at_sixteen_bits_despite_more_valid_chunks() {
        let mut script = chunks_of(0x0001);
        script.extend([VALID | 0b11; 4]);
        let mut d = driver(script);
        let (value, _) = d
            .compute_cell(&[[0; 5]; 5], &Kernel::CENTER_WEIGHTED, CellIndex::new(0, 0, 0))
            .unwrap();
        assert_eq!(value, 0x0001);
        assert_eq!(d.registers().status_reads, 8);
    }

    #[test]
    fn unresponsive_fabric_hits_budget() {
        let config = HandshakeConfig {
            cycle_budget: 64,
            ..HandshakeConfig::default()
        };
        let mut d = HandshakeDriver::new(Scripted::new(Vec::new()), config);
        d.initialize().unwrap();
        let err = d
            .compute_cell(&[[0; 5]; 5], &Kernel::CENTER_WEIGHTED, CellIndex::new(1, 2, 0))
            .unwrap_err();
        assert!(matches!(
            err,
            DriverError::AcceleratorUnresponsive { cycles: 64, cell } if cell == CellIndex::new(1, 2, 0)
        ));
        assert_eq!(d.phase(), HandshakePhase::Idle);
        assert!(!d.control().perf2_enable);
    }

    #[test]
    fn cancel_token_stops_the_loop() {
        let token = CancelToken::new();
        let mut d = HandshakeDriver::new(Scripted::new(Vec::new()), HandshakeConfig::default())
            .with_cancel(token.clone());
        d.initialize().unwrap();
        token.cancel();
        let err = d
            .compute_cell(&[[0; 5]; 5], &Kernel::CENTER_WEIGHTED, CellIndex::new(0, 0, 0))
            .unwrap_err();
        assert!(matches!(err, DriverError::Cancelled { .. }));
        assert_eq!(d.registers().status_reads, 0);
    }

    #[test]
    fn compute_before_initialize_is_rejected() {
        let mut d = HandshakeDriver::new(Scripted::new(chunks_of(1)), HandshakeConfig::default());
        assert!(matches!(
            d.compute_cell(&[[0; 5]; 5], &Kernel::CENTER_WEIGHTED, CellIndex::new(0, 0, 0)),
            Err(DriverError::InvalidState { .. })
        ));
    }

    #[test]
    fn initialize_pulses_perf_reset_once_with_ready_high() {
        let d = driver(Vec::new());
        let writes = d.registers().control_writes();
        assert_eq!(
            writes,
            vec![
                0,
                control::READY,
                control::READY | control::PERF_RESET,
                control::READY,
            ]
        );
        assert_eq!(d.registers().writes[0], (WriteRegister::InputPlane, 0));
    }

    #[test]
    fn cell_sequence_matches_protocol() {
        let mut d = driver(chunks_of(0));
        let skip = d.registers().control_writes().len();
        d.compute_cell(&[[0; 5]; 5], &Kernel::CENTER_WEIGHTED, CellIndex::new(0, 0, 0))
            .unwrap();
        let w = &d.registers().control_writes()[skip..];

        let ready = control::READY;
        let perf2 = control::PERF2_ENABLE;
        let k0 = bit_plane(Kernel::CENTER_WEIGHTED.weights(), 0);

        // reset pulse
        assert_eq!(w[0], ready | control::RESET);
        assert_eq!(w[1], ready);
        // enter streaming
        assert_eq!(w[2], ready | perf2);
        // first transfer: kernel plane, valid strobe, ack pulse
        assert_eq!(w[3], ready | perf2 | k0);
        assert_eq!(w[4], ready | perf2 | k0 | control::VALID);
        assert_eq!(w[5], ready | perf2 | k0);
        assert_eq!(w[6], perf2 | k0);
        assert_eq!(w[7], ready | perf2 | k0);
        // leave streaming with perf2 dropped
        let last = *w.last().unwrap();
        assert_eq!(last & perf2, 0);
        assert_ne!(last & ready, 0);
        // 3 + 8 × 5 + 1
        assert_eq!(w.len(), 44);
    }

    #[test]
    fn input_plane_follows_cycle_index() {
        let mut window = [[0u8; 5]; 5];
        window[0][0] = 0b1000_0001;
        let mut d = driver(chunks_of(0));
        d.compute_cell(&window, &Kernel::CENTER_WEIGHTED, CellIndex::new(0, 0, 0))
            .unwrap();
        let planes: Vec<u32> = d
            .registers()
            .writes
            .iter()
            .filter(|(r, _)| *r == WriteRegister::InputPlane)
            .skip(1)
            .map(|&(_, v)| v)
            .collect();
        assert_eq!(planes, vec![1, 0, 0, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn run_stats_track_extremes() {
        let mut run = RunStats::default();
        for cycles in [16, 9, 40] {
            run.record(CellStats {
                cycles,
                planes_sent: cycles,
                idle_polls: cycles - 8,
            });
        }
        assert_eq!(run.min_cycles, 9);
        assert_eq!(run.max_cycles, 40);
        assert_eq!(run.total_cycles, 65);
        assert_eq!(run.idle_polls, 41);
        assert!((run.mean_cycles() - 65.0 / 3.0).abs() < 1e-9);
    }
}
