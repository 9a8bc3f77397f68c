//! Lightweight HPS-to-FPGA bridge window.
//!
//! ```text
//! Region   Physical base  Span    Purpose
//! ──────── ────────────── ─────── ───────────────────────────────────
//!  LW      0xFF200000     4 KB    PIO registers (five 32-bit ports)
//! ```
//!
//! The window is mapped from `/dev/mem` with `O_SYNC`, so every access is
//! uncached and reaches the bridge in program order.

/// Physical base address of the lightweight bridge.
pub const LW_BASE: u64 = 0xFF20_0000;

/// Span of the mapped window in bytes.
pub const LW_SPAN: usize = 0x0000_1000;

/// Character device used to reach physical memory.
pub const DEV_MEM: &str = "/dev/mem";

/// Returns `true` if a register at `offset` (4 bytes wide) fits in a window
/// of `span` bytes.
#[must_use]
pub const fn fits(offset: usize, span: usize) -> bool {
    offset + 4 <= span
}
