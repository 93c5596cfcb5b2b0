//! Device enumeration and the safety gate that keeps system/boot drives out of
//! reach. Grounded on the teacher's `platform.rs` (`windows_impl`/`unix_impl`
//! split) generalized with the strict validation rules of
//! `examples/original_source/EcoWipe/core/device_validator.py`.

#[cfg(windows)]
mod windows;
#[cfg(windows)]
use windows as backend;

#[cfg(all(unix, not(target_os = "macos")))]
mod unix;
#[cfg(all(unix, not(target_os = "macos")))]
use unix as backend;

#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "macos")]
use macos as backend;

use serde::{Deserialize, Serialize};

use crate::error::WipeError;
use crate::validation::validate_device_path;

/// Accepted external bus types. Only `USB` devices may ever be enumerated as
/// wipeable; everything else is filtered out before it reaches the caller.
pub const ALLOWED_INTERFACE: &str = "USB";

/// An immutable record of a device that, at the moment of construction,
/// passed every safety rule: non-system, non-boot, USB, serial-bearing,
/// sized, syntactically valid path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedDevice {
    pub device_id: String,
    pub model: String,
    pub serial_number: String,
    pub size_bytes: u64,
    pub interface_type: String,
    pub is_system_drive: bool,
    pub is_boot_drive: bool,
}

impl ValidatedDevice {
    pub fn size_gb(&self) -> f64 {
        (self.size_bytes as f64 / (1024.0 * 1024.0 * 1024.0) * 100.0).round() / 100.0
    }
}

/// Raw candidate as reported by the platform backend, before the safety gate
/// has run.
#[derive(Debug, Clone)]
pub(crate) struct RawDisk {
    pub device_id: String,
    pub model: String,
    pub serial_number: String,
    pub size_bytes: u64,
    pub interface_type: String,
    pub disk_index: u32,
}

/// List every disk visible to the platform, alongside the set of disk
/// indices the platform backend has determined to be system/boot media.
/// Backends must fail closed: if system-drive determination cannot be
/// performed reliably, return `Err` rather than an empty set.
pub(crate) trait DeviceBackend {
    fn system_drive_indices() -> Result<std::collections::HashSet<u32>, WipeError>;
    fn list_disks() -> Result<Vec<RawDisk>, WipeError>;
}

fn filter_and_validate(disks: Vec<RawDisk>, system_indices: &std::collections::HashSet<u32>) -> Vec<ValidatedDevice> {
    let mut valid = Vec::new();

    for disk in disks {
        if disk.interface_type.to_uppercase() != ALLOWED_INTERFACE {
            tracing::debug!(device = %disk.device_id, interface = %disk.interface_type, "skipping: not USB");
            continue;
        }

        if system_indices.contains(&disk.disk_index) {
            tracing::warn!(device = %disk.device_id, index = disk.disk_index, "system drive detected as removable candidate, blocking");
            continue;
        }

        if disk.size_bytes == 0 {
            tracing::warn!(device = %disk.device_id, "skipping: zero size");
            continue;
        }

        if disk.serial_number.trim().is_empty() {
            tracing::warn!(device = %disk.device_id, "skipping: missing serial number");
            continue;
        }

        if validate_device_path(&disk.device_id).is_err() {
            tracing::warn!(device = %disk.device_id, "skipping: malformed device path");
            continue;
        }

        valid.push(ValidatedDevice {
            device_id: disk.device_id,
            model: disk.model,
            serial_number: disk.serial_number,
            size_bytes: disk.size_bytes,
            interface_type: disk.interface_type,
            is_system_drive: false,
            is_boot_drive: false,
        });
    }

    valid
}

/// Enumerate every currently attached, strictly validated removable device.
/// Fails closed: a system-drive-determination failure is propagated rather
/// than silently yielding an empty list.
pub fn list_valid_removable() -> Result<Vec<ValidatedDevice>, WipeError> {
    let system_indices = backend::Backend::system_drive_indices()?;
    let disks = backend::Backend::list_disks()?;
    Ok(filter_and_validate(disks, &system_indices))
}

/// Re-run full enumeration immediately before a wipe begins and return the
/// matching device iff it is still present and still valid. The candidate
/// set may have changed since the operator made their selection.
pub fn validate_for_wipe(device_id: &str) -> Result<ValidatedDevice, WipeError> {
    validate_device_path(device_id)?;

    let current = list_valid_removable()?;
    current
        .into_iter()
        .find(|d| d.device_id == device_id)
        .ok_or_else(|| {
            WipeError::device_validation(format!(
                "device {device_id} is not valid for wiping or is no longer present"
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn disk(id: &str, iface: &str, idx: u32, size: u64, serial: &str) -> RawDisk {
        RawDisk {
            device_id: id.to_string(),
            model: "Test Model".to_string(),
            serial_number: serial.to_string(),
            size_bytes: size,
            interface_type: iface.to_string(),
            disk_index: idx,
        }
    }

    #[test]
    fn filters_out_system_drives() {
        let mut system = HashSet::new();
        system.insert(0);
        let disks = vec![disk(r"\\.\PhysicalDrive0", "USB", 0, 1000, "SN1")];
        assert!(filter_and_validate(disks, &system).is_empty());
    }

    #[test]
    fn filters_out_non_usb_interfaces() {
        let disks = vec![disk(r"\\.\PhysicalDrive1", "SATA", 1, 1000, "SN1")];
        assert!(filter_and_validate(disks, &HashSet::new()).is_empty());
    }

    #[test]
    fn filters_out_missing_serial_and_zero_size() {
        let disks = vec![
            disk(r"\\.\PhysicalDrive1", "USB", 1, 1000, ""),
            disk(r"\\.\PhysicalDrive2", "USB", 2, 0, "SN2"),
        ];
        assert!(filter_and_validate(disks, &HashSet::new()).is_empty());
    }

    #[test]
    fn accepts_well_formed_removable_candidate() {
        let disks = vec![disk(r"\\.\PhysicalDrive3", "USB", 3, 1 << 30, "SN3")];
        let valid = filter_and_validate(disks, &HashSet::new());
        assert_eq!(valid.len(), 1);
        assert!(!valid[0].is_system_drive);
        assert!(!valid[0].is_boot_drive);
    }
}
