//! Low-level device I/O: acquire, lock, dismount, raw read/write, release.
//!
//! Grounded on the teacher's `hardware::drive_interface::DriveInterface`
//! (`CreateFileW` handle acquisition plus a `Drop` impl that guarantees
//! `CloseHandle` runs), generalized into a platform-neutral trait and
//! re-targeted from ATA pass-through IOCTLs to the volume lock/dismount
//! triad used by `examples/original_source/EcoWipe/utils/win_api.py`.

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub use windows::WindowsHandle;

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub use unix::UnixHandle;

pub mod fixture;

use crate::error::WipeError;

/// The capability set the orchestrator drives a device through. A real
/// implementation is expected to lock and dismount on `acquire`, and to
/// guarantee `unlock`+`close` on drop even if the caller never calls
/// `release` explicitly.
pub trait DeviceHandle: Sized {
    /// Open the device for exclusive read/write access, lock the volume and
    /// dismount any mounted filesystem so direct writes are authoritative.
    fn acquire(device_path: &str) -> Result<Self, WipeError>;

    fn seek_start(&mut self) -> Result<(), WipeError>;
    fn read_block(&mut self, buf: &mut [u8]) -> Result<usize, WipeError>;
    fn write_block(&mut self, buf: &[u8]) -> Result<usize, WipeError>;
    fn flush(&mut self) -> Result<(), WipeError>;

    /// Unlock and close the handle. Idempotent: safe to call more than once
    /// (including implicitly via `Drop`).
    fn release(&mut self);
}
