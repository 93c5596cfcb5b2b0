//! An in-memory stand-in for a real block device, used by orchestrator tests
//! so the full wipe pipeline can run without touching real hardware. Never
//! selected outside `#[cfg(test)]` code.

use std::io::{Cursor, Read, Write};

use super::DeviceHandle;
use crate::error::WipeError;

/// A fixed-size in-memory buffer addressed the same way a real device is:
/// sequential `read_block`/`write_block` calls from a position reset by
/// `seek_start`.
pub struct FixtureHandle {
    cursor: Cursor<Vec<u8>>,
    /// When `true`, `write_block` silently does nothing -- used to simulate
    /// the silent-wipe-failure scenario where the underlying hardware
    /// ignores writes but still reports success.
    pub drop_writes: bool,
}

impl FixtureHandle {
    pub fn with_size(size_bytes: usize) -> Self {
        Self { cursor: Cursor::new(vec![0u8; size_bytes]), drop_writes: false }
    }

    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self { cursor: Cursor::new(data), drop_writes: false }
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.cursor.into_inner()
    }

    pub fn len(&self) -> usize {
        self.cursor.get_ref().len()
    }
}

impl DeviceHandle for FixtureHandle {
    fn acquire(_device_path: &str) -> Result<Self, WipeError> {
        Ok(Self::with_size(0))
    }

    fn seek_start(&mut self) -> Result<(), WipeError> {
        self.cursor.set_position(0);
        Ok(())
    }

    fn read_block(&mut self, buf: &mut [u8]) -> Result<usize, WipeError> {
        self.cursor.read(buf).map_err(|e| WipeError::wipe_engine(format!("fixture read failed: {e}")))
    }

    fn write_block(&mut self, buf: &[u8]) -> Result<usize, WipeError> {
        if self.drop_writes {
            let advance = buf.len().min(self.cursor.get_ref().len().saturating_sub(self.cursor.position() as usize));
            self.cursor.set_position(self.cursor.position() + advance as u64);
            return Ok(buf.len());
        }
        self.cursor.write(buf).map_err(|e| WipeError::wipe_engine(format!("fixture write failed: {e}")))
    }

    fn flush(&mut self) -> Result<(), WipeError> {
        Ok(())
    }

    fn release(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_are_visible_on_reread() {
        let mut handle = FixtureHandle::with_size(16);
        handle.write_block(&[0xAA; 16]).unwrap();
        handle.seek_start().unwrap();
        let mut buf = [0u8; 16];
        handle.read_block(&mut buf).unwrap();
        assert_eq!(buf, [0xAA; 16]);
    }

    #[test]
    fn dropped_writes_leave_buffer_unchanged() {
        let mut handle = FixtureHandle::with_size(8);
        handle.drop_writes = true;
        handle.write_block(&[0xFF; 8]).unwrap();
        handle.seek_start().unwrap();
        let mut buf = [0u8; 8];
        handle.read_block(&mut buf).unwrap();
        assert_eq!(buf, [0u8; 8]);
    }
}
