//! Error taxonomy for the sanitization pipeline.
//!
//! One variant per failure class recognized by the rest of the crate. Low-level
//! errors (`io::Error`, `rsa::Error`, ...) are wrapped with enough context to log
//! and to render to an operator; nothing here is swallowed silently.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WipeError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("security violation: {0}")]
    SecurityViolation(String),

    #[error("device validation failed: {0}")]
    DeviceValidation(String),

    #[error("system-drive fail-safe triggered: {0}")]
    SystemDriveFailSafe(String),

    #[error("wipe engine error: {0}")]
    WipeEngine(String),

    #[error("state machine error: {0}")]
    StateMachine(String),

    #[error("certificate error: {0}")]
    Certificate(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl WipeError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn security_violation(msg: impl Into<String>) -> Self {
        Self::SecurityViolation(msg.into())
    }

    pub fn device_validation(msg: impl Into<String>) -> Self {
        Self::DeviceValidation(msg.into())
    }

    pub fn system_drive_fail_safe(msg: impl Into<String>) -> Self {
        Self::SystemDriveFailSafe(msg.into())
    }

    pub fn wipe_engine(msg: impl Into<String>) -> Self {
        Self::WipeEngine(msg.into())
    }

    pub fn state_machine(msg: impl Into<String>) -> Self {
        Self::StateMachine(msg.into())
    }

    pub fn certificate(msg: impl Into<String>) -> Self {
        Self::Certificate(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

pub type WipeResult<T> = Result<T, WipeError>;
