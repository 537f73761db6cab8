// ── Radio state monitor ──
//
// Read-only projection of the Bluetooth adapter state. The transport's
// state collaborator pushes updates; orchestrators only ever read.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

use crate::error::CoreError;

/// Adapter state as reported by the platform.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RadioState {
    On,
    Off,
    Unavailable,
    Unauthorized,
    Unsupported,
}

impl RadioState {
    /// Fail-fast check run before any operation touches the link.
    pub fn ensure_ready(self) -> Result<(), CoreError> {
        match self {
            Self::On => Ok(()),
            Self::Off => Err(CoreError::RadioOff),
            Self::Unauthorized => Err(CoreError::PermissionDenied),
            Self::Unavailable | Self::Unsupported => Err(CoreError::RadioUnavailable { state: self }),
        }
    }
}

/// Shared view of the current [`RadioState`].
#[derive(Debug)]
pub struct StateMonitor {
    state: watch::Sender<RadioState>,
}

impl StateMonitor {
    pub fn new(initial: RadioState) -> Self {
        let (state, _) = watch::channel(initial);
        Self { state }
    }

    pub fn current_state(&self) -> RadioState {
        *self.state.borrow()
    }

    /// Hardware present and the app is allowed to use it.
    pub fn is_available(&self) -> bool {
        matches!(self.current_state(), RadioState::On | RadioState::Off)
    }

    pub fn is_powered_on(&self) -> bool {
        self.current_state() == RadioState::On
    }

    pub fn ensure_ready(&self) -> Result<(), CoreError> {
        self.current_state().ensure_ready()
    }

    /// Record a new state. Returns `true` when it differs from the last one.
    pub fn update(&self, next: RadioState) -> bool {
        let changed = self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        if changed {
            debug!(state = %next, "radio state changed");
        }
        changed
    }

    pub fn subscribe(&self) -> watch::Receiver<RadioState> {
        self.state.subscribe()
    }
}

impl Default for StateMonitor {
    fn default() -> Self {
        Self::new(RadioState::On)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn string_forms_are_lowercase() {
        assert_eq!(RadioState::Unauthorized.to_string(), "unauthorized");
        assert_eq!("off".parse::<RadioState>().unwrap(), RadioState::Off);
        assert_eq!(
            serde_json::to_value(RadioState::Unsupported).unwrap(),
            "unsupported"
        );
    }

    #[test]
    fn fail_fast_mapping() {
        let kind = |state: RadioState| state.ensure_ready().unwrap_err().kind();
        assert!(RadioState::On.ensure_ready().is_ok());
        assert_eq!(kind(RadioState::Off), ErrorKind::RadioOff);
        assert_eq!(kind(RadioState::Unavailable), ErrorKind::RadioUnavailable);
        assert_eq!(kind(RadioState::Unsupported), ErrorKind::RadioUnavailable);
        assert_eq!(kind(RadioState::Unauthorized), ErrorKind::PermissionDenied);
    }

    #[test]
    fn update_reports_changes_only() {
        let monitor = StateMonitor::new(RadioState::Off);
        assert!(monitor.is_available());
        assert!(!monitor.is_powered_on());

        assert!(monitor.update(RadioState::On));
        assert!(!monitor.update(RadioState::On));
        assert!(monitor.is_powered_on());
    }

    #[tokio::test]
    async fn subscribers_observe_updates() {
        let monitor = StateMonitor::default();
        let mut rx = monitor.subscribe();
        monitor.update(RadioState::Unauthorized);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), RadioState::Unauthorized);
        assert!(!monitor.is_available());
    }
}
