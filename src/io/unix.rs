//! Unix device handle: exclusive `open()` of the block device node with
//! `O_EXCL`, a `BLKRRPART` ioctl to force the kernel to drop cached partition
//! metadata (the Unix equivalent of the Windows dismount step), and raw
//! `pread`/`pwrite`-style sequential access via `Read`/`Write`. `fsync`
//! stands in for the rest of the Windows volume-lock triad -- Linux has no
//! directly equivalent lock syscall; exclusivity comes from `O_EXCL` plus the
//! block layer refusing a second exclusive opener.
//!
//! The `BLKRRPART` wrapper mirrors `coreos-installer`'s `blockdev.rs`, which
//! ioctls the same request code against a retry loop because the reread
//! "sometimes fails inexplicably" on a just-opened device.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;

use nix::ioctl_none;
use tracing::warn;

use super::DeviceHandle;
use crate::error::WipeError;

const O_EXCL: i32 = libc::O_EXCL;

ioctl_none!(blkrrpart, 0x12, 95);

pub struct UnixHandle {
    file: Option<File>,
}

impl DeviceHandle for UnixHandle {
    fn acquire(device_path: &str) -> Result<Self, WipeError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(O_EXCL)
            .open(device_path)
            .map_err(|e| {
                WipeError::wipe_engine(format!("failed to open device {device_path}: {e}"))
            })?;

        // Best-effort: not every block device (e.g. a plain file used in
        // tests, or a device with no partition table) supports this ioctl.
        // Failure here does not block the wipe -- the write path does not
        // depend on cached partition metadata being dropped, only on
        // `O_EXCL` exclusivity.
        if let Err(e) = unsafe { blkrrpart(file.as_raw_fd()) } {
            warn!(device = %device_path, error = %e, "BLKRRPART reread failed, continuing anyway");
        }

        Ok(Self { file: Some(file) })
    }

    fn seek_start(&mut self) -> Result<(), WipeError> {
        self.file
            .as_mut()
            .ok_or_else(|| WipeError::wipe_engine("device handle already released"))?
            .seek(SeekFrom::Start(0))
            .map_err(|e| WipeError::wipe_engine(format!("seek failed: {e}")))?;
        Ok(())
    }

    fn read_block(&mut self, buf: &mut [u8]) -> Result<usize, WipeError> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| WipeError::wipe_engine("device handle already released"))?;
        file.read(buf).map_err(|e| WipeError::wipe_engine(format!("read failed: {e}")))
    }

    fn write_block(&mut self, buf: &[u8]) -> Result<usize, WipeError> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| WipeError::wipe_engine("device handle already released"))?;
        file.write(buf).map_err(|e| WipeError::wipe_engine(format!("write failed: {e}")))
    }

    fn flush(&mut self) -> Result<(), WipeError> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| WipeError::wipe_engine("device handle already released"))?;
        file.flush().map_err(|e| WipeError::wipe_engine(format!("flush failed: {e}")))?;
        file.sync_all().map_err(|e| WipeError::wipe_engine(format!("fsync failed: {e}")))
    }

    fn release(&mut self) {
        self.file.take();
    }
}

impl Drop for UnixHandle {
    fn drop(&mut self) {
        self.release();
    }
}
