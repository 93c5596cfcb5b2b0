//! Windows device handle: `CreateFileW` + `FSCTL_LOCK_VOLUME` /
//! `FSCTL_DISMOUNT_VOLUME` / `FSCTL_UNLOCK_VOLUME` via `DeviceIoControl`,
//! with raw `ReadFile`/`WriteFile`/`FlushFileBuffers` for the overwrite and
//! hashing passes. Constants taken from
//! `examples/original_source/EcoWipe/utils/win_api.py`.

use windows::{
    core::PCWSTR,
    Win32::{
        Foundation::{CloseHandle, GENERIC_READ, GENERIC_WRITE, HANDLE, INVALID_HANDLE_VALUE},
        Storage::FileSystem::{
            CreateFileW, FlushFileBuffers, ReadFile, SetFilePointerEx, WriteFile,
            FILE_ATTRIBUTE_NORMAL, FILE_BEGIN, FILE_SHARE_READ, FILE_SHARE_WRITE, OPEN_EXISTING,
        },
        System::IO::DeviceIoControl,
    },
};

use super::DeviceHandle;
use crate::error::WipeError;

const FSCTL_LOCK_VOLUME: u32 = 0x0009_0018;
const FSCTL_UNLOCK_VOLUME: u32 = 0x0009_001C;
const FSCTL_DISMOUNT_VOLUME: u32 = 0x0009_0020;

pub struct WindowsHandle {
    handle: HANDLE,
    locked: bool,
}

fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

unsafe fn control(handle: HANDLE, code: u32) -> bool {
    let mut bytes_returned = 0u32;
    DeviceIoControl(handle, code, None, 0, None, 0, Some(&mut bytes_returned), None).is_ok()
}

impl DeviceHandle for WindowsHandle {
    fn acquire(device_path: &str) -> Result<Self, WipeError> {
        let wide_path = wide(device_path);

        let handle = unsafe {
            CreateFileW(
                PCWSTR::from_raw(wide_path.as_ptr()),
                GENERIC_READ.0 | GENERIC_WRITE.0,
                FILE_SHARE_READ | FILE_SHARE_WRITE,
                None,
                OPEN_EXISTING,
                FILE_ATTRIBUTE_NORMAL,
                None,
            )
        };

        let handle = match handle {
            Ok(h) if h != INVALID_HANDLE_VALUE => h,
            _ => {
                return Err(WipeError::wipe_engine(format!(
                    "failed to open device: {device_path}"
                )))
            }
        };

        if !unsafe { control(handle, FSCTL_LOCK_VOLUME) } {
            unsafe {
                let _ = CloseHandle(handle);
            }
            return Err(WipeError::wipe_engine("failed to lock volume for exclusive access"));
        }

        if !unsafe { control(handle, FSCTL_DISMOUNT_VOLUME) } {
            unsafe {
                let _ = control(handle, FSCTL_UNLOCK_VOLUME);
                let _ = CloseHandle(handle);
            }
            return Err(WipeError::wipe_engine("failed to dismount volume"));
        }

        Ok(Self { handle, locked: true })
    }

    fn seek_start(&mut self) -> Result<(), WipeError> {
        let ok = unsafe { SetFilePointerEx(self.handle, 0, None, FILE_BEGIN) };
        ok.map_err(|e| WipeError::wipe_engine(format!("seek failed: {e}")))
    }

    fn read_block(&mut self, buf: &mut [u8]) -> Result<usize, WipeError> {
        let mut bytes_read = 0u32;
        unsafe { ReadFile(self.handle, Some(buf), Some(&mut bytes_read), None) }
            .map_err(|e| WipeError::wipe_engine(format!("read failed: {e}")))?;
        Ok(bytes_read as usize)
    }

    fn write_block(&mut self, buf: &[u8]) -> Result<usize, WipeError> {
        let mut bytes_written = 0u32;
        unsafe { WriteFile(self.handle, Some(buf), Some(&mut bytes_written), None) }
            .map_err(|e| WipeError::wipe_engine(format!("write failed: {e}")))?;
        Ok(bytes_written as usize)
    }

    fn flush(&mut self) -> Result<(), WipeError> {
        unsafe { FlushFileBuffers(self.handle) }
            .map_err(|e| WipeError::wipe_engine(format!("flush failed: {e}")))
    }

    fn release(&mut self) {
        if self.handle == INVALID_HANDLE_VALUE {
            return;
        }
        unsafe {
            if self.locked {
                let _ = control(self.handle, FSCTL_UNLOCK_VOLUME);
                self.locked = false;
            }
            let _ = CloseHandle(self.handle);
        }
        self.handle = INVALID_HANDLE_VALUE;
    }
}

impl Drop for WindowsHandle {
    fn drop(&mut self) {
        self.release();
    }
}
