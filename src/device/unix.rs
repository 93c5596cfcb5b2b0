//! Unix removable-device enumeration: `/sys/block/*/removable` plus the
//! device's size and serial number. Grounded on the teacher's
//! `platform.rs::unix_impl` (which used `sysinfo` for mounted disks and a
//! fixed device-path probe list for unmounted ones); this backend instead
//! walks `/sys/block` directly, the idiomatic source of the removable flag
//! on Linux.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use super::{DeviceBackend, RawDisk};
use crate::error::WipeError;

pub struct Backend;

fn read_trimmed(path: impl AsRef<Path>) -> Option<String> {
    fs::read_to_string(path).ok().map(|s| s.trim().to_string())
}

/// The device backing the root filesystem, read from `/proc/mounts`. Used as
/// the system-drive fail-safe: any block device whose name is a prefix of
/// this path's device node is treated as a system drive.
fn root_device_name() -> Option<String> {
    let mounts = fs::read_to_string("/proc/mounts").ok()?;
    for line in mounts.lines() {
        let mut fields = line.split_whitespace();
        let device = fields.next()?;
        let mount_point = fields.next()?;
        if mount_point == "/" && device.starts_with("/dev/") {
            let name = device.trim_start_matches("/dev/");
            // strip a trailing partition number, e.g. sda1 -> sda, nvme0n1p2 -> nvme0n1
            let base: String = name
                .trim_end_matches(|c: char| c.is_ascii_digit())
                .trim_end_matches('p')
                .to_string();
            return Some(if base.is_empty() { name.to_string() } else { base });
        }
    }
    None
}

/// Sentinel index `list_disks` assigns to the root device, since Linux has no
/// stable numeric physical-disk index the way Windows does. Kept in sync with
/// the value `list_disks` actually writes.
const ROOT_DEVICE_SENTINEL: u32 = u32::MAX;

impl DeviceBackend for Backend {
    fn system_drive_indices() -> Result<HashSet<u32>, WipeError> {
        if fs::metadata("/proc/mounts").is_err() {
            return Err(WipeError::system_drive_fail_safe(
                "cannot read /proc/mounts to determine the system drive",
            ));
        }

        let mut indices = HashSet::new();
        if root_device_name().is_some() {
            indices.insert(ROOT_DEVICE_SENTINEL);
        }
        Ok(indices)
    }

    fn list_disks() -> Result<Vec<RawDisk>, WipeError> {
        let root_device = root_device_name();
        let mut disks = Vec::new();

        let entries = match fs::read_dir("/sys/block") {
            Ok(e) => e,
            Err(e) => {
                return Err(WipeError::system_drive_fail_safe(format!(
                    "cannot enumerate /sys/block: {e}"
                )))
            }
        };

        for (index, entry) in entries.flatten().enumerate() {
            let name = entry.file_name().to_string_lossy().to_string();
            let sys_path = entry.path();

            let removable = read_trimmed(sys_path.join("removable")).as_deref() == Some("1");
            if !removable {
                continue;
            }

            let is_system = root_device.as_deref() == Some(name.as_str());

            let size_sectors: u64 = read_trimmed(sys_path.join("size"))
                .and_then(|s| s.parse().ok())
                .unwrap_or(0);
            let size_bytes = size_sectors * 512;

            let serial = read_trimmed(sys_path.join("device/serial")).unwrap_or_default();
            let model = read_trimmed(sys_path.join("device/model")).unwrap_or_else(|| name.clone());

            disks.push(RawDisk {
                device_id: format!("/dev/{name}"),
                model,
                serial_number: serial,
                size_bytes,
                interface_type: "USB".to_string(),
                disk_index: if is_system { ROOT_DEVICE_SENTINEL } else { index as u32 },
            });
        }

        Ok(disks)
    }
}
