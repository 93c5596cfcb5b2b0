//! Deterministic state machine governing a single wipe session.
//!
//! Ensures pipeline steps only occur in the correct order. Transitions to
//! `Error` or `SafeRelease` are always forced through regardless of the
//! transition table, so the machine can never get stuck outside the release
//! path.

use tracing::{error, info, warn};

use crate::error::WipeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WipeState {
    Idle,
    DeviceValidated,
    Locked,
    PreHashed,
    Overwriting,
    Verifying,
    Completed,
    Error,
    SafeRelease,
}

impl WipeState {
    fn valid_next_states(self) -> &'static [WipeState] {
        use WipeState::*;
        match self {
            Idle => &[DeviceValidated, Error],
            DeviceValidated => &[Locked, Error, SafeRelease],
            Locked => &[PreHashed, Error, SafeRelease],
            PreHashed => &[Overwriting, Error, SafeRelease],
            Overwriting => &[Verifying, Error, SafeRelease],
            Verifying => &[Completed, Error, SafeRelease],
            Completed => &[SafeRelease],
            Error => &[SafeRelease],
            SafeRelease => &[Idle],
        }
    }

    fn label(self) -> &'static str {
        use WipeState::*;
        match self {
            Idle => "IDLE",
            DeviceValidated => "DEVICE_VALIDATED",
            Locked => "LOCKED",
            PreHashed => "PRE_HASHED",
            Overwriting => "OVERWRITING",
            Verifying => "VERIFYING",
            Completed => "COMPLETED",
            Error => "ERROR",
            SafeRelease => "SAFE_RELEASE",
        }
    }
}

pub struct StateMachine {
    current: WipeState,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self { current: WipeState::Idle }
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_state(&self) -> WipeState {
        self.current
    }

    /// Attempt to move to `new_state`. Transitions to `Error` or
    /// `SafeRelease` are always permitted as forced emergency escapes, even
    /// when absent from the table, with a logged warning.
    pub fn transition_to(&mut self, new_state: WipeState) -> Result<(), WipeError> {
        if self.current.valid_next_states().contains(&new_state) {
            info!(from = self.current.label(), to = new_state.label(), "state transition");
            self.current = new_state;
            return Ok(());
        }

        let msg = format!(
            "invalid state transition attempted: {} -> {}",
            self.current.label(),
            new_state.label()
        );
        error!("{msg}");

        if matches!(new_state, WipeState::Error | WipeState::SafeRelease) {
            warn!(to = new_state.label(), "forcing emergency transition");
            self.current = new_state;
            return Ok(());
        }

        Err(WipeError::state_machine(msg))
    }

    pub fn assert_in(&self, expected: WipeState) -> Result<(), WipeError> {
        if self.current != expected {
            return Err(WipeError::state_machine(format!(
                "expected state {}, but currently in {}",
                expected.label(),
                self.current.label()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_happy_path_succeeds() {
        let mut sm = StateMachine::new();
        for next in [
            WipeState::DeviceValidated,
            WipeState::Locked,
            WipeState::PreHashed,
            WipeState::Overwriting,
            WipeState::Verifying,
            WipeState::Completed,
            WipeState::SafeRelease,
            WipeState::Idle,
        ] {
            sm.transition_to(next).unwrap();
        }
        assert_eq!(sm.current_state(), WipeState::Idle);
    }

    #[test]
    fn skipping_a_step_is_rejected() {
        let mut sm = StateMachine::new();
        let result = sm.transition_to(WipeState::Locked);
        assert!(result.is_err());
        assert_eq!(sm.current_state(), WipeState::Idle);
    }

    #[test]
    fn error_and_safe_release_are_always_reachable() {
        let mut sm = StateMachine::new();
        sm.transition_to(WipeState::DeviceValidated).unwrap();
        sm.transition_to(WipeState::Locked).unwrap();
        sm.transition_to(WipeState::Error).unwrap();
        assert_eq!(sm.current_state(), WipeState::Error);
        sm.transition_to(WipeState::SafeRelease).unwrap();
        assert_eq!(sm.current_state(), WipeState::SafeRelease);
    }

    #[test]
    fn forced_escape_from_idle_never_fails() {
        let mut sm = StateMachine::new();
        sm.transition_to(WipeState::SafeRelease).unwrap();
        assert_eq!(sm.current_state(), WipeState::SafeRelease);
    }

    #[test]
    fn assert_in_rejects_wrong_state() {
        let sm = StateMachine::new();
        assert!(sm.assert_in(WipeState::Locked).is_err());
        assert!(sm.assert_in(WipeState::Idle).is_ok());
    }
}
