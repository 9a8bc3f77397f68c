//! PIO register map.
//!
//! Five 32-bit parallel ports sit at fixed offsets inside the lightweight
//! bridge window. Two are written by the host, three are read.
//!
//! ```text
//! 0x00  WRITE_0      24:0  input-window bit-plane
//! 0x10  WRITE_1      29    perf counter 2 enable
//!                    28    perf counter reset (pulse)
//!                    27    reset (pulse, per output cell)
//!                    26    ready (host accepts a result; ack pulse)
//!                    25    valid (host data strobe, pulse)
//!                    24:0  kernel bit-plane
//! 0x20  READ         3     fabric ready
//!                    2     fabric output valid
//!                    1:0   result chunk
//! 0x30  READ_COUNT   31:0  compute cycles
//! 0x40  READ_COUNT2  31:0  cycles while perf counter 2 enabled
//! ```

// ── Offsets ──────────────────────────────────────────────────────────────────

/// Input-window bit-plane port.
pub const WRITE_0: usize = 0x00;

/// Kernel bit-plane and control port.
pub const WRITE_1: usize = 0x10;

/// Status and result-chunk port.
pub const READ: usize = 0x20;

/// Compute cycle counter (no communication overhead).
pub const READ_COUNT: usize = 0x30;

/// Cycle counter gated by perf counter 2 enable (includes overhead).
pub const READ_COUNT2: usize = 0x40;

// ── WRITE_1 control bits ─────────────────────────────────────────────────────

pub mod control {
    //! Control bits in `WRITE_1`, above the kernel plane.

    /// Host data-valid strobe.
    pub const VALID: u32 = 1 << 25;
    /// Host ready to accept a result; dropped and raised again as the ack.
    pub const READY: u32 = 1 << 26;
    /// Per-cell reset of the fabric accumulator and handshake.
    pub const RESET: u32 = 1 << 27;
    /// Zero both cycle counters.
    pub const PERF_RESET: u32 = 1 << 28;
    /// Gate for the overhead-inclusive cycle counter.
    pub const PERF2_ENABLE: u32 = 1 << 29;

    /// All control bits.
    pub const MASK: u32 = VALID | READY | RESET | PERF_RESET | PERF2_ENABLE;
}

// ── READ status bits ─────────────────────────────────────────────────────────

pub mod status {
    //! Status bits in `READ`.

    /// Two-bit result chunk.
    pub const CHUNK_MASK: u32 = 0b11;
    /// A result chunk is present.
    pub const OUTPUT_VALID: u32 = 1 << 2;
    /// Fabric ready to accept a plane.
    pub const FABRIC_READY: u32 = 1 << 3;
}
