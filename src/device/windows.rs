//! Windows physical-drive enumeration and system/boot-drive detection.
//!
//! Grounded on the teacher's `platform.rs::windows_impl` (logical-drive scan
//! via `GetLogicalDrives`/`GetDriveTypeW`) extended to walk physical drives
//! directly and trace the boot volume back to its physical disk index, the
//! way `examples/original_source/EcoWipe/core/device_validator.py` uses WMI
//! for the same purpose. `DeviceIoControl` struct layouts are hand-defined in
//! the same style as the teacher's `AtaPassThroughEx` in
//! `hardware/drive_interface.rs`.
//!
//! `IOCTL_STORAGE_QUERY_PROPERTY` drives bus-type classification in the
//! common case; `logical_drive_removable_map` corroborates it with
//! `GetDriveTypeW` over every mounted logical drive when that query comes
//! back empty.

use std::collections::HashSet;
use std::env;

use windows::{
    core::PCWSTR,
    Win32::{
        Foundation::{CloseHandle, GENERIC_READ, HANDLE, INVALID_HANDLE_VALUE},
        Storage::FileSystem::{
            CreateFileW, GetDriveTypeW, GetLogicalDrives,
            FILE_ATTRIBUTE_NORMAL, FILE_SHARE_READ, FILE_SHARE_WRITE, OPEN_EXISTING,
        },
        System::IO::DeviceIoControl,
    },
};

use super::{DeviceBackend, RawDisk};
use crate::error::WipeError;

pub struct Backend;

const DRIVE_FIXED: u32 = 3;
const DRIVE_REMOVABLE: u32 = 2;

const IOCTL_STORAGE_QUERY_PROPERTY: u32 = 0x002D1400;
const IOCTL_VOLUME_GET_VOLUME_DISK_EXTENTS: u32 = 0x00560000;

const STORAGE_DEVICE_PROPERTY: u32 = 0;
const PROPERTY_STANDARD_QUERY: u32 = 0;

#[repr(C)]
struct StoragePropertyQuery {
    property_id: u32,
    query_type: u32,
    additional_parameters: [u8; 1],
}

#[repr(C)]
struct StorageDeviceDescriptor {
    version: u32,
    size: u32,
    device_type: u8,
    device_type_modifier: u8,
    removable_media: u8,
    command_queueing: u8,
    vendor_id_offset: u32,
    product_id_offset: u32,
    product_revision_offset: u32,
    serial_number_offset: u32,
    bus_type: u32,
    raw_properties_length: u32,
}

#[repr(C)]
struct DiskExtent {
    disk_number: u32,
    _padding: u32,
    starting_offset: i64,
    extent_length: i64,
}

#[repr(C)]
struct VolumeDiskExtents {
    number_of_disk_extents: u32,
    extents: [DiskExtent; 1],
}

fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

unsafe fn open_for_query(path: &str) -> Option<HANDLE> {
    let wide_path = wide(path);
    let handle = CreateFileW(
        PCWSTR::from_raw(wide_path.as_ptr()),
        GENERIC_READ.0,
        FILE_SHARE_READ | FILE_SHARE_WRITE,
        None,
        OPEN_EXISTING,
        FILE_ATTRIBUTE_NORMAL,
        None,
    );
    match handle {
        Ok(h) if h != INVALID_HANDLE_VALUE => Some(h),
        _ => None,
    }
}

/// Resolve the physical disk index backing an open volume handle via
/// `IOCTL_VOLUME_GET_VOLUME_DISK_EXTENTS`. Shared by the boot-volume lookup
/// and the logical-drive corroboration pass below.
unsafe fn disk_index_for_handle(handle: HANDLE) -> Option<u32> {
    let mut extents = VolumeDiskExtents {
        number_of_disk_extents: 0,
        extents: [DiskExtent { disk_number: 0, _padding: 0, starting_offset: 0, extent_length: 0 }],
    };
    let mut bytes_returned = 0u32;

    let ok = DeviceIoControl(
        handle,
        IOCTL_VOLUME_GET_VOLUME_DISK_EXTENTS,
        None,
        0,
        Some(&mut extents as *mut _ as *mut core::ffi::c_void),
        std::mem::size_of::<VolumeDiskExtents>() as u32,
        Some(&mut bytes_returned),
        None,
    );

    if ok.is_ok() && extents.number_of_disk_extents > 0 {
        Some(extents.extents[0].disk_number)
    } else {
        None
    }
}

/// Trace the volume hosting the Windows install directory back to its
/// physical disk index.
unsafe fn boot_disk_index() -> Option<u32> {
    let windir = env::var("windir").unwrap_or_else(|_| "C:\\Windows".to_string());
    let drive_letter = windir.chars().next()?;
    let volume_path = format!(r"\\.\{drive_letter}:");

    let handle = open_for_query(&volume_path)?;
    let index = disk_index_for_handle(handle);
    let _ = CloseHandle(handle);
    index
}

unsafe fn query_device_descriptor(handle: HANDLE) -> Option<(String, u32)> {
    let query = StoragePropertyQuery {
        property_id: STORAGE_DEVICE_PROPERTY,
        query_type: PROPERTY_STANDARD_QUERY,
        additional_parameters: [0],
    };

    let buffer_size = 1024usize;
    let mut buffer = vec![0u8; buffer_size];
    let mut bytes_returned = 0u32;

    let ok = DeviceIoControl(
        handle,
        IOCTL_STORAGE_QUERY_PROPERTY,
        Some(&query as *const _ as *const core::ffi::c_void),
        std::mem::size_of::<StoragePropertyQuery>() as u32,
        Some(buffer.as_mut_ptr() as *mut core::ffi::c_void),
        buffer_size as u32,
        Some(&mut bytes_returned),
        None,
    );

    if ok.is_err() {
        return None;
    }

    let descriptor = &*(buffer.as_ptr() as *const StorageDeviceDescriptor);
    let serial = if descriptor.serial_number_offset != 0 {
        let start = descriptor.serial_number_offset as usize;
        let raw = &buffer[start..];
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        String::from_utf8_lossy(&raw[..end]).trim().to_string()
    } else {
        String::new()
    };

    Some((serial, descriptor.bus_type))
}

/// Windows `STORAGE_BUS_TYPE` enumerators relevant to our interface filter.
const BUS_TYPE_USB: u32 = 0x07;

fn bus_type_label(bus_type: u32) -> &'static str {
    if bus_type == BUS_TYPE_USB { "USB" } else { "OTHER" }
}

impl DeviceBackend for Backend {
    fn system_drive_indices() -> Result<HashSet<u32>, WipeError> {
        let mut indices = HashSet::new();

        match unsafe { boot_disk_index() } {
            Some(idx) => {
                indices.insert(idx);
                Ok(indices)
            }
            None => Err(WipeError::system_drive_fail_safe(
                "cannot reliably determine system drive indices",
            )),
        }
    }

    fn list_disks() -> Result<Vec<RawDisk>, WipeError> {
        let removable_map = unsafe { logical_drive_removable_map() };
        let mut disks = Vec::new();

        for index in 0..32u32 {
            let path = format!(r"\\.\PhysicalDrive{index}");
            let handle = match unsafe { open_for_query(&path) } {
                Some(h) => h,
                None => continue,
            };

            let descriptor = unsafe { query_device_descriptor(handle) };

            // Drive size via the volume hosting this disk is not directly
            // exposed through the device descriptor; fall back to seeking to
            // the end of the raw handle, mirroring the teacher's
            // `get_device_size` helper in `platform.rs::unix_impl`.
            let size_bytes = unsafe { seek_to_end(handle) }.unwrap_or(0);

            unsafe {
                let _ = CloseHandle(handle);
            }

            let (serial, interface_type) = match descriptor {
                Some((serial, bus_type)) => (serial, bus_type_label(bus_type).to_string()),
                None => {
                    // IOCTL_STORAGE_QUERY_PROPERTY is unavailable on this
                    // storage stack; fall back to the GetDriveTypeW
                    // corroboration gathered from any logical volume that
                    // mounts this physical disk.
                    let label = match removable_map.get(&index) {
                        Some(true) => "REMOVABLE",
                        Some(false) => "FIXED",
                        None => "OTHER",
                    };
                    (String::new(), label.to_string())
                }
            };

            disks.push(RawDisk {
                device_id: path,
                model: format!("Physical Drive {index}"),
                serial_number: serial,
                size_bytes,
                interface_type,
                disk_index: index,
            });
        }

        Ok(disks)
    }
}

/// Build a `disk_index -> is_removable` map by walking every mounted logical
/// drive letter, tracing each back to its physical disk, and classifying it
/// with `GetDriveTypeW`. Used to corroborate the bus-type check above when
/// `IOCTL_STORAGE_QUERY_PROPERTY` comes back empty.
unsafe fn logical_drive_removable_map() -> std::collections::HashMap<u32, bool> {
    let mut map = std::collections::HashMap::new();

    for letter in logical_drive_letters() {
        let drive_type = logical_drive_type(letter);
        if !is_fixed(drive_type) && !is_removable(drive_type) {
            continue;
        }

        let volume_path = format!(r"\\.\{letter}:");
        let Some(handle) = open_for_query(&volume_path) else { continue };
        let disk_index = disk_index_for_handle(handle);
        let _ = CloseHandle(handle);

        if let Some(idx) = disk_index {
            map.insert(idx, is_removable(drive_type));
        }
    }

    map
}

unsafe fn seek_to_end(handle: HANDLE) -> Option<u64> {
    use windows::Win32::Storage::FileSystem::{SetFilePointerEx, FILE_END};
    let mut new_pos = 0i64;
    let ok = SetFilePointerEx(handle, 0, Some(&mut new_pos), FILE_END);
    if ok.is_ok() { Some(new_pos as u64) } else { None }
}

/// Query removable/fixed status for a logical drive letter. Feeds
/// `logical_drive_removable_map`'s corroboration of the bus-type check above
/// on systems where `IOCTL_STORAGE_QUERY_PROPERTY` is unavailable (older or
/// virtualized storage stacks).
fn logical_drive_type(letter: char) -> u32 {
    unsafe {
        let path = wide(&format!("{letter}:\\"));
        GetDriveTypeW(PCWSTR::from_raw(path.as_ptr()))
    }
}

fn logical_drive_letters() -> Vec<char> {
    let mut letters = Vec::new();
    unsafe {
        let mask = GetLogicalDrives();
        for i in 0..26 {
            if mask & (1 << i) != 0 {
                letters.push((b'A' + i as u8) as char);
            }
        }
    }
    letters
}

fn is_fixed(drive_type: u32) -> bool {
    drive_type == DRIVE_FIXED
}

fn is_removable(drive_type: u32) -> bool {
    drive_type == DRIVE_REMOVABLE
}
