//! Forensic certificate construction: a strict JSON schema, canonical
//! serialization for hashing, RSA-PSS signing, and a QR code carrying the
//! signed payload that is independently re-decoded before the certificate is
//! considered valid.
//!
//! Grounded on `examples/original_source/EcoWipe/core/certificate_engine.py`
//! and `core/qr_engine.py`, restructured into the teacher's
//! `security::certificate::ErasureCertificate` builder shape.

use std::fs;
use std::path::{Path, PathBuf};

use image::Luma;
use qrcode::{EcLevel, QrCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{APP_VERSION, QR_BORDER, QR_BOX_SIZE};
use crate::crypto::Signer;
use crate::error::{WipeError, WipeResult};
use crate::progress::WipeResult as WipeOutcome;
use crate::validation::validate_safe_path;

pub const SCHEMA_VERSION: &str = "EcoWIPE-Enterprise-v2";

/// The signed, certificate-shaped view of a completed wipe. Field order here
/// does not matter for serialization -- `serde_json`'s default map backing is
/// a `BTreeMap`, so the canonical form is sorted regardless.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Certificate {
    pub schema_version: String,
    pub certificate_id: String,
    pub timestamp_utc: String,
    pub app_version: String,
    pub operator: String,
    pub device: DeviceSummary,
    pub wipe_details: WipeDetails,
    pub payload_hash: String,
    pub rsa_signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSummary {
    pub id: String,
    pub model: String,
    pub serial_number: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WipeDetails {
    pub method: String,
    pub passes: u32,
    pub nist_standard: String,
    pub pre_hash_sha256: String,
    pub post_hash_sha256: String,
    pub start_time_unix: u64,
    pub end_time_unix: u64,
    pub status: String,
}

pub struct GeneratedCertificate {
    pub certificate: Certificate,
    pub json_path: PathBuf,
    pub qr_path: PathBuf,
}

/// Serialize `value` the way `json.dumps(value, sort_keys=True,
/// separators=(',', ':'))` would: `serde_json::Value::Object` is backed by a
/// `BTreeMap` by default, so `to_string` already emits sorted keys with
/// compact separators -- no custom canonicalizer needed.
fn canonical_json(value: &Value) -> WipeResult<String> {
    serde_json::to_string(value).map_err(|e| WipeError::certificate(format!("failed to serialize certificate: {e}")))
}

/// Build, sign, persist and QR-encode a certificate for a completed wipe.
/// Every step that can fail returns `WipeError::Certificate`; a QR readback
/// mismatch deletes the half-written image before returning an error.
pub fn generate_certificate(
    outcome: &WipeOutcome,
    signer: &Signer,
    output_dir: &Path,
) -> WipeResult<GeneratedCertificate> {
    fs::create_dir_all(output_dir)
        .map_err(|e| WipeError::certificate(format!("cannot create certificate directory: {e}")))?;

    let certificate_id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now();
    let timestamp_utc = now.to_rfc3339();

    let mut cert_value = json!({
        "schema_version": SCHEMA_VERSION,
        "certificate_id": certificate_id,
        "timestamp_utc": timestamp_utc,
        "app_version": APP_VERSION,
        "operator": outcome.operator,
        "device": {
            "id": outcome.device_id,
            "model": outcome.model,
            "serial_number": outcome.serial_number,
            "size_bytes": outcome.size_bytes,
        },
        "wipe_details": {
            "method": outcome.method,
            "passes": outcome.passes,
            "nist_standard": outcome.nist_standard,
            "pre_hash_sha256": outcome.pre_hash_sha256,
            "post_hash_sha256": outcome.post_hash_sha256,
            "start_time_unix": outcome.start_time_unix,
            "end_time_unix": outcome.end_time_unix,
            "status": outcome.status,
        }
    });

    let canonical = canonical_json(&cert_value)?;
    let payload_hash = hex::encode(Sha256::digest(canonical.as_bytes()));

    let signature = signer.sign(payload_hash.as_bytes())?;

    let obj = cert_value.as_object_mut().expect("cert_value is always an object");
    obj.insert("payload_hash".to_string(), json!(payload_hash));
    obj.insert("rsa_signature".to_string(), json!(signature));

    let certificate: Certificate = serde_json::from_value(cert_value.clone())
        .map_err(|e| WipeError::certificate(format!("internal schema mismatch: {e}")))?;

    let safe_timestamp = now.format("%Y%m%d_%H%M%S");
    let short_id = &certificate_id[..8];

    let json_path = output_dir.join(format!("cert_{safe_timestamp}_{short_id}.json"));
    let json_path_str = json_path
        .to_str()
        .ok_or_else(|| WipeError::certificate(format!("{json_path:?} is not valid UTF-8")))?;
    validate_safe_path(json_path_str)?;

    let pretty = serde_json::to_string_pretty(&cert_value)
        .map_err(|e| WipeError::certificate(format!("failed to pretty-print certificate: {e}")))?;
    fs::write(&json_path, pretty)
        .map_err(|e| WipeError::certificate(format!("failed to write certificate json: {e}")))?;

    let qr_path = output_dir.join(format!("qr_{safe_timestamp}_{short_id}.png"));
    let qr_path_str = qr_path
        .to_str()
        .ok_or_else(|| WipeError::certificate(format!("{qr_path:?} is not valid UTF-8")))?;
    validate_safe_path(qr_path_str)?;

    let compact = canonical_json(&cert_value)?;
    let b64_payload = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, compact.as_bytes());

    generate_and_verify_qr(&b64_payload, &qr_path)?;

    info!(certificate_id = %certificate_id, "signed certificate generated and verified");

    Ok(GeneratedCertificate { certificate, json_path, qr_path })
}

/// Render `data` into a QR code (error-correction level H, the configured
/// box size and border) and immediately re-decode the saved image with an
/// independent decoder. A mismatch deletes the file and returns an error --
/// using the same encoder to check its own output would not catch encoder
/// bugs.
fn generate_and_verify_qr(data: &str, output_path: &Path) -> WipeResult<()> {
    if data.is_empty() {
        return Err(WipeError::certificate("cannot generate QR code with empty data"));
    }

    let code = QrCode::with_error_correction_level(data.as_bytes(), EcLevel::H)
        .map_err(|e| WipeError::certificate(format!("failed to build QR code: {e}")))?;

    let image = code
        .render::<Luma<u8>>()
        .quiet_zone(false)
        .module_dimensions(QR_BOX_SIZE, QR_BOX_SIZE)
        .build();

    let bordered = add_border(&image, QR_BORDER * QR_BOX_SIZE);

    bordered
        .save(output_path)
        .map_err(|e| WipeError::certificate(format!("failed to save QR image: {e}")))?;

    match verify_qr_readback(output_path, data) {
        Ok(true) => Ok(()),
        Ok(false) => {
            warn!(path = %output_path.display(), "QR readback mismatch, deleting");
            let _ = fs::remove_file(output_path);
            Err(WipeError::certificate("QR code generated but failed auto-decode verification"))
        }
        Err(e) => {
            let _ = fs::remove_file(output_path);
            Err(e)
        }
    }
}

fn add_border(image: &image::GrayImage, border_px: u32) -> image::GrayImage {
    let (w, h) = image.dimensions();
    let mut out = image::GrayImage::from_pixel(w + border_px * 2, h + border_px * 2, Luma([255u8]));
    image::imageops::overlay(&mut out, image, border_px as i64, border_px as i64);
    out
}

/// Decode the saved QR image with `rqrr`, a decoder implementation
/// independent of the `qrcode` crate used to encode it, and compare the
/// recovered payload against what was meant to be encoded.
fn verify_qr_readback(path: &Path, expected: &str) -> WipeResult<bool> {
    let img = image::open(path)
        .map_err(|e| WipeError::certificate(format!("failed to reopen QR image for verification: {e}")))?
        .to_luma8();

    let mut prepared = rqrr::PreparedImage::prepare(img);
    let grids = prepared.detect_grids();

    let Some(grid) = grids.first() else {
        return Ok(false);
    };

    let (_meta, decoded) = grid
        .decode()
        .map_err(|e| WipeError::certificate(format!("failed to decode QR grid: {e}")))?;

    Ok(decoded == expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_outcome() -> WipeOutcome {
        WipeOutcome {
            device_id: r"\\.\PhysicalDrive1".to_string(),
            model: "Test USB".to_string(),
            serial_number: "SN123".to_string(),
            size_bytes: 1 << 30,
            operator: "Jane Doe".to_string(),
            method: "DoD 5220.22-M".to_string(),
            passes: 3,
            nist_standard: "NIST SP 800-88 Purge".to_string(),
            pre_hash_sha256: "a".repeat(64),
            post_hash_sha256: "b".repeat(64),
            start_time_unix: 1_700_000_000,
            end_time_unix: 1_700_000_100,
            status: "completed".to_string(),
        }
    }

    #[test]
    fn canonical_json_sorts_keys_and_is_compact() {
        let value = json!({"b": 1, "a": 2});
        let s = canonical_json(&value).unwrap();
        assert_eq!(s, r#"{"a":2,"b":1}"#);
    }

    #[test]
    fn certificate_round_trips_through_signature_verification() {
        let dir = std::env::temp_dir().join(format!("ecowipe_test_cert_{}", std::process::id()));
        let _ = fs::create_dir_all(&dir);

        let signer = Signer::load_or_generate(&dir).unwrap();
        let outcome = sample_outcome();

        let generated = generate_certificate(&outcome, &signer, &dir).unwrap();
        assert!(generated.json_path.exists());
        assert!(generated.qr_path.exists());
        assert!(signer.verify(generated.certificate.payload_hash.as_bytes(), &generated.certificate.rsa_signature));

        let _ = fs::remove_dir_all(&dir);
    }
}
