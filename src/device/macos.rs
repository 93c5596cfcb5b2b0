//! No macOS enumeration backend is implemented. `/sys/block` has no macOS
//! equivalent and IOKit device-tree walking is out of scope for this pass, so
//! both entry points fail closed with a clear unsupported-platform error
//! rather than a silently empty device list that would read as "no devices
//! attached" instead of "this platform cannot be enumerated".

use std::collections::HashSet;

use super::{DeviceBackend, RawDisk};
use crate::error::WipeError;

pub struct Backend;

impl DeviceBackend for Backend {
    fn system_drive_indices() -> Result<HashSet<u32>, WipeError> {
        Err(WipeError::system_drive_fail_safe(
            "macOS device enumeration is not implemented; refusing to guess at system-drive indices",
        ))
    }

    fn list_disks() -> Result<Vec<RawDisk>, WipeError> {
        Err(WipeError::system_drive_fail_safe(
            "macOS device enumeration is not implemented on this platform",
        ))
    }
}
