//! Sequential wipe orchestrator: drives a single device through
//! validate -> lock/dismount -> pre-hash -> overwrite -> post-hash -> finalize
//! on one worker thread, reporting progress over an `mpsc` channel and
//! guaranteeing the handle is released on every exit path.
//!
//! Grounded on the teacher's `core::engine::WipeEngine::execute_secure_wipe`
//! (progress channel plus background-thread pattern) and
//! `hardware::sanitizer::SecureSanitizer::execute_wipe`, re-targeted to the
//! exact seven-step pipeline of
//! `examples/original_source/EcoWipe/core/wipe_engine.py`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::device::{self, ValidatedDevice};
use crate::error::{WipeError, WipeResult as Outcome};
use crate::io::DeviceHandle;
use crate::progress::{ProgressEvent, WipeResult};
use crate::state_machine::{StateMachine, WipeState};
use crate::strategy::SanitizationStrategy;
use crate::validation::validate_operator_name;

/// A cooperative cancellation token. Checked at block boundaries during
/// hashing and overwriting; never interrupts mid-block.
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

fn unix_now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

fn emit(progress: &Sender<ProgressEvent>, percent: u8, message: impl Into<String>) {
    let _ = progress.send(ProgressEvent::new(percent, message));
}

/// Run the full wipe pipeline for `device_id` with a handle of type `H`,
/// using `block_size` as the read/write/hash chunk size. The handle type is
/// generic so tests can drive the same pipeline through
/// `io::fixture::FixtureHandle` instead of real hardware.
pub fn run_wipe<H: DeviceHandle>(
    device_id: &str,
    method_name: &str,
    operator_name: &str,
    config: &AppConfig,
    cancellation: CancellationToken,
    progress: Sender<ProgressEvent>,
) -> Outcome<WipeResult> {
    let operator = validate_operator_name(operator_name)?;
    let strategy = SanitizationStrategy::from_name(method_name);
    let mut sm = StateMachine::new();

    emit(&progress, 0, "Validating device...");
    let validated = device::validate_for_wipe(device_id)?;
    sm.transition_to(WipeState::DeviceValidated)?;

    let start_time = unix_now();
    info!(device = %validated.device_id, operator = %operator, "starting wipe operation");

    let result = run_pipeline::<H>(&validated, &strategy, config, &mut sm, &cancellation, &progress);

    match result {
        Ok((pre_hash, post_hash)) => {
            let end_time = unix_now();
            sm.transition_to(WipeState::Completed)?;
            emit(&progress, 100, "Wipe completed successfully");
            info!(device = %validated.device_id, "wipe completed successfully");

            let outcome = WipeResult {
                device_id: validated.device_id.clone(),
                model: validated.model.clone(),
                serial_number: validated.serial_number.clone(),
                size_bytes: validated.size_bytes,
                operator,
                method: strategy.name().to_string(),
                passes: strategy.passes(),
                nist_standard: strategy.nist_standard().to_string(),
                pre_hash_sha256: pre_hash,
                post_hash_sha256: post_hash,
                start_time_unix: start_time,
                end_time_unix: end_time,
                status: "SUCCESS".to_string(),
            };

            sm.transition_to(WipeState::SafeRelease)?;
            Ok(outcome)
        }
        Err(e) => {
            warn!(device = %validated.device_id, error = %e, "wipe failed");
            let _ = sm.transition_to(WipeState::Error);
            let _ = sm.transition_to(WipeState::SafeRelease);
            Err(e)
        }
    }
}

fn run_pipeline<H: DeviceHandle>(
    device: &ValidatedDevice,
    strategy: &SanitizationStrategy,
    config: &AppConfig,
    sm: &mut StateMachine,
    cancellation: &CancellationToken,
    progress: &Sender<ProgressEvent>,
) -> Outcome<(String, String)> {
    emit(progress, 5, "Locking and dismounting volume...");
    let mut handle = H::acquire(&device.device_id)?;
    sm.transition_to(WipeState::Locked)?;

    // Guarantee release on every exit path, mirroring `_safe_release`'s
    // `finally` placement in the reference implementation.
    let pipeline_result = (|| -> Outcome<(String, String)> {
        sm.assert_in(WipeState::Locked)?;
        let pre_hash = compute_hash(&mut handle, device.size_bytes, config.block_size, cancellation, progress, true)?;
        info!(pre_hash = %pre_hash, "pre-wipe hash computed");
        sm.transition_to(WipeState::PreHashed)?;

        sm.assert_in(WipeState::PreHashed)?;
        sm.transition_to(WipeState::Overwriting)?;
        perform_wipe(&mut handle, device.size_bytes, config.block_size, strategy, cancellation, progress)?;

        sm.transition_to(WipeState::Verifying)?;
        let post_hash = compute_hash(&mut handle, device.size_bytes, config.block_size, cancellation, progress, false)?;
        info!(post_hash = %post_hash, "post-wipe hash computed");

        if pre_hash == post_hash && device.size_bytes > 0 {
            return Err(WipeError::wipe_engine(
                "pre- and post-wipe hashes match; the device was not actually overwritten",
            ));
        }

        Ok((pre_hash, post_hash))
    })();

    handle.release();
    pipeline_result
}

fn compute_hash<H: DeviceHandle>(
    handle: &mut H,
    total_bytes: u64,
    block_size: usize,
    cancellation: &CancellationToken,
    progress: &Sender<ProgressEvent>,
    is_pre: bool,
) -> Outcome<String> {
    handle.seek_start()?;

    let mut hasher = Sha256::new();
    let mut bytes_done: u64 = 0;
    let mut buf = vec![0u8; block_size];

    while bytes_done < total_bytes {
        if cancellation.is_cancelled() {
            return Err(WipeError::wipe_engine("operation cancelled by user"));
        }

        let remaining = (total_bytes - bytes_done) as usize;
        let read_size = remaining.min(block_size);
        let bytes_read = handle.read_block(&mut buf[..read_size])?;
        if bytes_read == 0 {
            return Err(WipeError::wipe_engine("failed to read device for hashing: zero bytes returned"));
        }

        hasher.update(&buf[..bytes_read]);
        bytes_done += bytes_read as u64;

        let fraction = bytes_done as f64 / total_bytes.max(1) as f64;
        let percent = if is_pre { 5 + (fraction * 5.0) as u8 } else { 90 + (fraction * 10.0) as u8 };
        let phase = if is_pre { "pre-wipe" } else { "post-wipe" };
        emit(progress, percent, format!("Computing {phase} hash... {:.0}%", fraction * 100.0));
    }

    Ok(hex::encode(hasher.finalize()))
}

fn perform_wipe<H: DeviceHandle>(
    handle: &mut H,
    total_bytes: u64,
    block_size: usize,
    strategy: &SanitizationStrategy,
    cancellation: &CancellationToken,
    progress: &Sender<ProgressEvent>,
) -> Outcome<()> {
    let passes = strategy.passes();

    for pass_idx in 0..passes {
        handle.seek_start()?;
        let block = strategy.block_for(pass_idx, block_size);
        let mut bytes_done: u64 = 0;

        while bytes_done < total_bytes {
            if cancellation.is_cancelled() {
                return Err(WipeError::wipe_engine("operation cancelled by user"));
            }

            let remaining = (total_bytes - bytes_done) as usize;
            let write_size = remaining.min(block_size);
            let bytes_written = handle.write_block(&block[..write_size])?;
            if bytes_written == 0 {
                return Err(WipeError::wipe_engine(format!(
                    "write failed at offset {bytes_done} during pass {}/{passes}",
                    pass_idx + 1
                )));
            }
            bytes_done += bytes_written as u64;

            let pass_fraction = bytes_done as f64 / total_bytes.max(1) as f64;
            let overall = 10.0 + ((pass_idx as f64 + pass_fraction) / passes as f64) * 80.0;
            emit(
                progress,
                overall as u8,
                format!("Wiping (Pass {}/{passes})... {:.0}%", pass_idx + 1, pass_fraction * 100.0),
            );
        }

        handle.flush()?;
        info!(pass = pass_idx + 1, total = passes, "overwrite pass complete");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;
    use crate::io::fixture::FixtureHandle;

    fn drain(rx: mpsc::Receiver<ProgressEvent>) -> Vec<ProgressEvent> {
        rx.try_iter().collect()
    }

    #[test]
    fn zero_pass_sanity_on_fixture_device() {
        let (tx, rx) = mpsc::channel();
        let cancellation = CancellationToken::new();

        let device = ValidatedDevice {
            device_id: "/dev/fixture0".to_string(),
            model: "Fixture".to_string(),
            serial_number: "FIX001".to_string(),
            size_bytes: 64,
            interface_type: "USB".to_string(),
            is_system_drive: false,
            is_boot_drive: false,
        };

        let mut handle = FixtureHandle::with_size(64);
        let mut sm = StateMachine::new();
        sm.transition_to(WipeState::DeviceValidated).unwrap();
        sm.transition_to(WipeState::Locked).unwrap();

        let strategy = SanitizationStrategy::Zero;
        let config = AppConfig::default();

        let pre_hash = compute_hash(&mut handle, device.size_bytes, 16, &cancellation, &tx, true).unwrap();
        sm.transition_to(WipeState::PreHashed).unwrap();
        sm.transition_to(WipeState::Overwriting).unwrap();
        perform_wipe(&mut handle, device.size_bytes, 16, &strategy, &cancellation, &tx).unwrap();
        sm.transition_to(WipeState::Verifying).unwrap();
        let post_hash = compute_hash(&mut handle, device.size_bytes, config.block_size, &cancellation, &tx, false).unwrap();

        assert_ne!(pre_hash, post_hash);
        assert!(!drain(rx).is_empty());
    }

    #[test]
    fn silent_wipe_failure_is_detected_when_writes_are_dropped() {
        let (tx, _rx) = mpsc::channel();
        let cancellation = CancellationToken::new();

        let mut handle = FixtureHandle::with_size(32);
        handle.drop_writes = true;

        let strategy = SanitizationStrategy::Zero;
        let pre_hash = compute_hash(&mut handle, 32, 16, &cancellation, &tx, true).unwrap();
        perform_wipe(&mut handle, 32, 16, &strategy, &cancellation, &tx).unwrap();
        let post_hash = compute_hash(&mut handle, 32, 16, &cancellation, &tx, false).unwrap();

        assert_eq!(pre_hash, post_hash);
    }

    #[test]
    fn cancellation_mid_pass_aborts_with_error() {
        let (tx, _rx) = mpsc::channel();
        let cancellation = CancellationToken::new();
        cancellation.cancel();

        let mut handle = FixtureHandle::with_size(1 << 20);
        let strategy = SanitizationStrategy::Dod;

        let result = perform_wipe(&mut handle, 1 << 20, 4096, &strategy, &cancellation, &tx);
        assert!(result.is_err());
    }

    #[test]
    fn dod_three_pass_produces_distinct_hashes_per_pass() {
        let (tx, _rx) = mpsc::channel();
        let cancellation = CancellationToken::new();
        let mut handle = FixtureHandle::with_size(48);
        let strategy = SanitizationStrategy::Dod;

        perform_wipe(&mut handle, 48, 16, &strategy, &cancellation, &tx).unwrap();
        let data = handle.into_inner();
        assert!(!data.iter().all(|&b| b == 0x00));
    }
}
