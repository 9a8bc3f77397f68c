//! `/dev/mem` mapping of the lightweight bridge window
//!
//! The only `unsafe` in the workspace lives here: one `mmap`, one `munmap`,
//! and volatile 32-bit accesses inside the bounds-checked window.

use crate::error::{DriverError, Result};
use rustix::fs::OFlags;
use rustix::mm::{mmap, munmap, MapFlags, ProtFlags};
use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsFd;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

/// Uncached mapping of a physical register window.
///
/// `Send` but not `Sync`: accesses are ordered side effects and the window
/// must have a single owner.
#[derive(Debug)]
pub struct DevMemWindow {
    ptr: NonNull<u8>,
    span: usize,
    base: u64,
    device: PathBuf,
    _file: File,
}

impl DevMemWindow {
    /// Map `span` bytes of physical memory starting at `base`.
    ///
    /// `device` is normally `/dev/mem`; it is opened `O_RDWR | O_SYNC` so
    /// the mapping is uncached.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::MapFailed`] if the device cannot be opened,
    /// `base` is not page-aligned, `span` is zero, or `mmap` fails.
    pub fn map(device: &Path, base: u64, span: usize) -> Result<Self> {
        if span == 0 {
            return Err(DriverError::map_failed("window span is 0"));
        }
        let page = rustix::param::page_size() as u64;
        if base % page != 0 {
            return Err(DriverError::map_failed(format!(
                "base {base:#x} is not aligned to the {page}-byte page size"
            )));
        }

        // Flag bits are small positive values
        #[allow(clippy::cast_possible_wrap)]
        let sync_flag = OFlags::SYNC.bits() as i32;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(sync_flag)
            .open(device)
            .map_err(|e| {
                DriverError::map_failed(format!(
                    "Cannot open {}: {e}. Running as root?",
                    device.display()
                ))
            })?;

        // SAFETY: mmap of device memory.
        // - fd is valid (just opened) and kept alive in `_file` for the mapping's lifetime
        // - span is non-zero and base is page-aligned (checked above)
        // - MAP_SHARED so writes reach the bridge rather than a private copy
        // - the returned pointer is only dereferenced within [0, span) below
        let addr = unsafe {
            mmap(
                std::ptr::null_mut(),
                span,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED,
                file.as_fd(),
                base,
            )
        }
        .map_err(|e| DriverError::map_failed(format!("mmap of {base:#x}+{span:#x} failed: {e}")))?;

        let ptr = NonNull::new(addr.cast::<u8>())
            .ok_or_else(|| DriverError::map_failed("mmap returned a null pointer"))?;

        tracing::info!(
            "Mapped {} at {base:#x} ({span:#x} bytes) to {ptr:p}",
            device.display()
        );

        Ok(Self {
            ptr,
            span,
            base,
            device: device.to_path_buf(),
            _file: file,
        })
    }

    /// Volatile read of the 32-bit word at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::OutOfBounds`] if the word is outside the window
    /// or misaligned.
    pub fn read_u32(&self, offset: usize) -> Result<u32> {
        self.check(offset)?;
        // SAFETY: volatile read from mapped device memory.
        // - offset + 4 <= span and offset % 4 == 0 (checked above)
        // - ptr is valid for span bytes (successful mmap, not yet unmapped)
        // - volatile so the compiler neither caches nor elides the access
        #[allow(clippy::cast_ptr_alignment)]
        let value = unsafe { self.ptr.as_ptr().add(offset).cast::<u32>().read_volatile() };
        Ok(value)
    }

    /// Volatile write of the 32-bit word at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::OutOfBounds`] if the word is outside the window
    /// or misaligned.
    pub fn write_u32(&mut self, offset: usize, value: u32) -> Result<()> {
        self.check(offset)?;
        // SAFETY: volatile write to mapped device memory.
        // - offset + 4 <= span and offset % 4 == 0 (checked above)
        // - ptr is valid for span bytes; &mut self gives exclusive access
        // - volatile so the write is emitted, in program order, every time
        #[allow(clippy::cast_ptr_alignment)]
        unsafe {
            self.ptr
                .as_ptr()
                .add(offset)
                .cast::<u32>()
                .write_volatile(value);
        }
        Ok(())
    }

    /// Physical base address
    pub const fn base(&self) -> u64 {
        self.base
    }

    /// Window span in bytes
    pub const fn span(&self) -> usize {
        self.span
    }

    /// Device node the window was mapped from
    pub fn device(&self) -> &Path {
        &self.device
    }

    fn check(&self, offset: usize) -> Result<()> {
        if offset % 4 != 0 || offset + 4 > self.span {
            return Err(DriverError::OutOfBounds {
                offset,
                span: self.span,
            });
        }
        Ok(())
    }
}

impl Drop for DevMemWindow {
    fn drop(&mut self) {
        // SAFETY: munmap of the region created in map().
        // - ptr/span are exactly what mmap returned/was given
        // - Drop runs once and no references into the mapping outlive self
        unsafe {
            if let Err(e) = munmap(self.ptr.as_ptr().cast(), self.span) {
                tracing::error!("munmap failed during drop: {e}");
            }
        }
        tracing::debug!("Unmapped {:#x} from {}", self.base, self.device.display());
    }
}

// SAFETY: DevMemWindow owns its mapping exclusively; moving it to another
// thread does not invalidate the mapping. It is deliberately not Sync.
unsafe impl Send for DevMemWindow {}
