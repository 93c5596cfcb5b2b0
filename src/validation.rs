//! Syntactic validation of operator-supplied input: operator names and device
//! paths. Grounded on `examples/original_source/EcoWipe/core/validation_engine.py`;
//! the teacher's own `validation.rs` covers an unrelated HPA/DCO risk report and
//! is not reused here.

use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;

use crate::error::WipeError;

fn operator_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z0-9 \-_]{1,100}$").unwrap())
}

fn device_path_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^\\\\\.\\PhysicalDrive\d+$").unwrap())
}

fn unix_device_path_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^/dev/[A-Za-z0-9_/]+$").unwrap())
}

fn reserved_names() -> &'static HashSet<&'static str> {
    static NAMES: OnceLock<HashSet<&'static str>> = OnceLock::new();
    NAMES.get_or_init(|| {
        [
            "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7",
            "COM8", "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
        ]
        .into_iter()
        .collect()
    })
}

/// Validate an operator name: 1-100 chars, `[A-Za-z0-9 _-]`, after trimming.
pub fn validate_operator_name(name: &str) -> Result<String, WipeError> {
    if name.is_empty() {
        return Err(WipeError::invalid_input("operator name cannot be empty"));
    }

    let clean = name.trim();

    if !operator_regex().is_match(clean) {
        warn!(attempted = %name, "invalid operator name attempted");
        return Err(WipeError::invalid_input(
            "operator name must be 1-100 characters and contain only alphanumeric characters, \
             spaces, hyphens, and underscores",
        ));
    }

    Ok(clean.to_string())
}

/// Validate a device path: `\\.\PhysicalDriveN` (case-insensitive) on
/// Windows, or a `/dev/...` block device node on Unix.
pub fn validate_device_path(device_path: &str) -> Result<String, WipeError> {
    if device_path.is_empty() {
        return Err(WipeError::invalid_input("device path cannot be empty"));
    }

    let matches = if cfg!(windows) {
        device_path_regex().is_match(device_path)
    } else {
        unix_device_path_regex().is_match(device_path)
    };

    if !matches {
        warn!(path = %device_path, "invalid device path format");
        return Err(WipeError::invalid_input(format!(
            "invalid device path format: {device_path}"
        )));
    }

    Ok(device_path.to_string())
}

/// Reject reserved Windows device-stem names anywhere they appear as an
/// output path (certificates, keys, logs). This guards against an operator
/// feeding something like `keys/CON.json` into a file writer.
pub fn validate_safe_path(file_path: &str) -> Result<(), WipeError> {
    if file_path.is_empty() {
        return Err(WipeError::invalid_input("path cannot be empty"));
    }

    let stem = Path::new(file_path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_uppercase();

    if reserved_names().contains(stem.as_str()) {
        warn!(path = %file_path, "reserved name used in path");
        return Err(WipeError::security_violation(format!(
            "path contains reserved device name: {stem}"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_and_accepts_simple_name() {
        assert_eq!(validate_operator_name("  Jane Doe  ").unwrap(), "Jane Doe");
    }

    #[test]
    fn rejects_empty_and_overlong_names() {
        assert!(validate_operator_name("").is_err());
        let long = "a".repeat(101);
        assert!(validate_operator_name(&long).is_err());
    }

    #[test]
    fn rejects_disallowed_characters() {
        assert!(validate_operator_name("Jane; DROP TABLE").is_err());
    }

    #[test]
    #[cfg(windows)]
    fn accepts_valid_physical_drive_paths() {
        assert!(validate_device_path(r"\\.\PhysicalDrive1").is_ok());
        assert!(validate_device_path(r"\\.\physicaldrive2").is_ok());
        assert!(validate_device_path(r"\\.\PhysicalDrive").is_err());
    }

    #[test]
    #[cfg(unix)]
    fn accepts_valid_unix_device_paths() {
        assert!(validate_device_path("/dev/sdb").is_ok());
        assert!(validate_device_path(r"\\.\PhysicalDrive1").is_err());
    }

    #[test]
    fn rejects_empty_device_path() {
        assert!(validate_device_path("").is_err());
    }

    #[test]
    fn rejects_reserved_device_stems() {
        assert!(validate_safe_path("certificates/CON.json").is_err());
        assert!(validate_safe_path("certificates/com1.json").is_err());
        assert!(validate_safe_path("certificates/cert_20260101.json").is_ok());
    }
}
