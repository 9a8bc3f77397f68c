//! Simulated convolution fabric
//!
//! A register-level model of the bit-serial fabric, stepped by host bus
//! accesses instead of a clock. It speaks the same handshake as the
//! hardware, so the driver cannot tell it from the real bridge.
//!
//! ## Behaviour
//!
//! ```text
//! WRITE_1.reset ↑        clear the cell, hold FABRIC_READY low for
//!                        `ready_after_reset` status reads
//! WRITE_1.perf_reset ↑   zero both counters
//! WRITE_1.valid ↑        one strobe: latch WRITE_0 and the kernel plane
//!                        (first 8 strobes of a cell), advance the result
//!                        latency countdown
//! WRITE_1.ready ↓        while output_valid: acknowledge, next chunk
//! ```
//!
//! After eight planes the fabric rebuilds both grids, takes their 16-bit
//! dot product and offers it two bits at a time, low bits first, each chunk
//! `response_latency` strobes after the previous acknowledgement.
//!
//! `READ_COUNT` advances once per strobe while a cell is in flight.
//! `READ_COUNT2` advances by `clocks_per_access` for every bus access made
//! while perf counter 2 is enabled.

use crate::backend::BackendType;
use crate::error::Result;
use crate::register::{ControlWord, ReadRegister, RegisterInterface, StatusWord, WriteRegister};
use crate::serializer::reassemble_grid;
use bitconv_chip::geometry::{CHUNKS_PER_RESULT, CHUNK_BITS, PLANE_MASK, SAMPLE_BITS};
use tracing::{debug, trace};

const PLANES: usize = SAMPLE_BITS as usize;

/// Injected misbehaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Never raise `output_valid`
    Unresponsive,

    /// XOR the result of the `ordinal`-th cell (0-based, in reset order)
    CorruptCell {
        /// Cell to corrupt
        ordinal: usize,
        /// Bits to flip
        xor: u16,
    },

    /// Keep `output_valid` high with a stray chunk after the 8th chunk
    ChattyAfterDone,
}

/// Simulated fabric behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimConfig {
    /// Strobes between a chunk becoming due and `output_valid` rising
    pub response_latency: u32,
    /// Fabric clocks charged to `READ_COUNT2` per bus access
    pub clocks_per_access: u32,
    /// Status reads after a reset during which `FABRIC_READY` stays low
    pub ready_after_reset: u32,
    /// Optional fault injection
    pub fault: Option<Fault>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            response_latency: 0,
            clocks_per_access: 4,
            ready_after_reset: 0,
            fault: None,
        }
    }
}

/// Register-level simulation of the fabric
#[derive(Debug)]
pub struct SimulatedAccelerator {
    config: SimConfig,
    control: ControlWord,
    input_latch: u32,

    input_planes: [u32; PLANES],
    kernel_planes: [u32; PLANES],
    planes_latched: usize,
    result: Option<u16>,
    chunks_acked: u32,
    countdown: u32,
    status: StatusWord,
    busy: bool,
    not_ready_reads: u32,

    compute_count: u64,
    overhead_count: u64,

    cells_started: usize,
    strobes: u64,
    overflow_plane_bits: u64,
    status_reads: u64,
}

impl SimulatedAccelerator {
    /// Fabric in its power-on state
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            control: ControlWord::default(),
            input_latch: 0,
            input_planes: [0; PLANES],
            kernel_planes: [0; PLANES],
            planes_latched: 0,
            result: None,
            chunks_acked: 0,
            countdown: 0,
            status: StatusWord::default(),
            busy: false,
            not_ready_reads: 0,
            compute_count: 0,
            overhead_count: 0,
            cells_started: 0,
            strobes: 0,
            overflow_plane_bits: 0,
            status_reads: 0,
        }
    }

    /// Active configuration
    pub const fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Reset pulses seen
    pub const fn cells_started(&self) -> usize {
        self.cells_started
    }

    /// Valid strobes seen
    pub const fn strobes(&self) -> u64 {
        self.strobes
    }

    /// Nonzero bits received on strobes past the 8th plane of a cell
    pub const fn overflow_plane_bits(&self) -> u64 {
        self.overflow_plane_bits
    }

    /// `READ` accesses seen
    pub const fn status_reads(&self) -> u64 {
        self.status_reads
    }

    fn charge_access(&mut self) {
        if self.control.perf2_enable {
            self.overhead_count += u64::from(self.config.clocks_per_access);
        }
    }

    fn apply_control(&mut self, next: ControlWord) {
        let prev = self.control;
        self.control = next;

        if next.perf_reset && !prev.perf_reset {
            trace!("sim: perf counters cleared");
            self.compute_count = 0;
            self.overhead_count = 0;
        }
        if next.reset && !prev.reset {
            self.reset_cell();
        }
        if next.valid && !prev.valid {
            self.strobe();
        }
        if prev.ready && !next.ready && self.status.output_valid {
            self.acknowledge();
        }
    }

    fn reset_cell(&mut self) {
        self.planes_latched = 0;
        self.result = None;
        self.chunks_acked = 0;
        self.countdown = self.config.response_latency;
        self.status = StatusWord::default();
        self.busy = true;
        self.not_ready_reads = self.config.ready_after_reset;
        self.cells_started += 1;
        trace!("sim: cell {} reset", self.cells_started - 1);
    }

    fn strobe(&mut self) {
        self.strobes += 1;
        if self.not_ready_reads > 0 {
            trace!("sim: strobe dropped, fabric not ready");
            return;
        }
        if self.busy {
            self.compute_count += 1;
        }

        let input = self.input_latch & PLANE_MASK;
        let kernel = self.control.kernel_plane;
        if self.planes_latched < PLANES {
            self.input_planes[self.planes_latched] = input;
            self.kernel_planes[self.planes_latched] = kernel;
            self.planes_latched += 1;
            if self.planes_latched == PLANES {
                self.finish_planes();
            }
        } else {
            self.overflow_plane_bits += u64::from((input | kernel).count_ones());
        }

        self.advance_output();
    }

    fn finish_planes(&mut self) {
        if self.config.fault == Some(Fault::Unresponsive) {
            return;
        }
        let window = reassemble_grid(&self.input_planes);
        let weights = reassemble_grid(&self.kernel_planes);
        let mut acc: u16 = 0;
        for (w_row, k_row) in window.iter().zip(weights.iter()) {
            for (&w, &k) in w_row.iter().zip(k_row.iter()) {
                acc = acc.wrapping_add(u16::from(w).wrapping_mul(u16::from(k)));
            }
        }
        if let Some(Fault::CorruptCell { ordinal, xor }) = self.config.fault {
            if ordinal + 1 == self.cells_started {
                debug!("sim: corrupting cell {ordinal} ({acc} ^ {xor:#x})");
                acc ^= xor;
            }
        }
        self.result = Some(acc);
    }

    fn advance_output(&mut self) {
        let Some(result) = self.result else {
            return;
        };
        if self.status.output_valid || self.chunks_acked >= CHUNKS_PER_RESULT {
            return;
        }
        if self.countdown > 0 {
            self.countdown -= 1;
            return;
        }
        let shift = self.chunks_acked * CHUNK_BITS;
        #[allow(clippy::cast_possible_truncation)]
        let chunk = ((result >> shift) & 0b11) as u8;
        self.status.output_valid = true;
        self.status.chunk = chunk;
    }

    fn acknowledge(&mut self) {
        self.status.output_valid = false;
        self.status.chunk = 0;
        self.chunks_acked += 1;
        self.countdown = self.config.response_latency;

        if self.chunks_acked >= CHUNKS_PER_RESULT {
            self.busy = false;
            if self.config.fault == Some(Fault::ChattyAfterDone) {
                self.status.output_valid = true;
                self.status.chunk = 0b11;
            }
        }
    }

    fn status_word(&mut self) -> u32 {
        self.status_reads += 1;
        let fabric_ready = if self.not_ready_reads > 0 {
            self.not_ready_reads -= 1;
            false
        } else {
            true
        };
        StatusWord {
            fabric_ready,
            ..self.status
        }
        .encode()
    }
}

impl Default for SimulatedAccelerator {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

/// Counters are 32 bits wide on the fabric and wrap.
#[allow(clippy::cast_possible_truncation)]
const fn counter_word(count: u64) -> u32 {
    count as u32
}

impl RegisterInterface for SimulatedAccelerator {
    fn write(&mut self, reg: WriteRegister, value: u32) -> Result<()> {
        self.charge_access();
        match reg {
            WriteRegister::InputPlane => self.input_latch = value,
            WriteRegister::Control => self.apply_control(ControlWord::decode(value)),
        }
        Ok(())
    }

    fn read(&mut self, reg: ReadRegister) -> Result<u32> {
        self.charge_access();
        Ok(match reg {
            ReadRegister::Status => self.status_word(),
            ReadRegister::ComputeCount => counter_word(self.compute_count),
            ReadRegister::OverheadCount => counter_word(self.overhead_count),
        })
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Software
    }
}
