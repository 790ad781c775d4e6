//! ==============================================================================
//! store.rs - the single source of truth for device state
//! ==============================================================================
//!
//! purpose:
//!     owns the one DeviceState plus the history admission clock. the two are
//!     kept in the same struct because a report merge and its admission check
//!     are one read-modify-write; whoever holds `&mut StateStore` holds both.
//!
//! entry points:
//!     - merge_device_report: controller -> state (never fails)
//!     - apply_command:       dashboard -> state (returns "did it change?")
//!     - snapshot:            state -> an owned copy for one transmission
//!
//! relationships:
//!     - used by: hub.rs (wraps the store in a mutex)
//!     - uses: command.rs (validation), history.rs (admission policy)
//!
//! ==============================================================================

use std::time::{Duration, Instant};

use crate::command::{Command, CommandError, RawCommand};
use crate::domain::{DeviceReport, DeviceState};
use crate::history::{Admission, HistoryPolicy};

#[derive(Debug, Clone)]
pub struct StateStore {
    state: DeviceState,
    policy: HistoryPolicy,
}

impl StateStore {
    pub fn new(history_capacity: usize, history_interval: Duration) -> Self {
        Self {
            state: DeviceState::new(history_capacity),
            policy: HistoryPolicy::new(history_interval),
        }
    }

    /// merge every present field of `report` into the state.
    ///
    /// a numeric temperature is also offered to the history policy, with the
    /// report's humidity riding along. returns the admission outcome, or
    /// `None` when the report carried no temperature sample.
    pub fn merge_device_report(&mut self, report: &DeviceReport, now: Instant) -> Option<Admission> {
        let s = &mut self.state;

        if let Some(t) = report.temperature {
            s.temperature = t;
        }
        if let Some(h) = report.humidity {
            s.humidity = h;
        }
        if let Some(target) = report.target_temp {
            s.target_temp = target;
        }
        if let Some(power) = report.power {
            s.power = power;
        }
        if let Some(mode) = report.mode {
            s.mode = mode;
        }
        if let Some(fan) = report.fan_speed {
            s.fan_speed = fan;
        }
        if let Some(swing) = report.swing {
            s.swing = swing;
        }

        let temperature = report.temperature_sample()?;
        Some(self.policy.offer(
            now,
            temperature,
            report.humidity_sample(),
            &mut s.history,
            &mut s.humidity_history,
        ))
    }

    /// validate and apply a dashboard command. `true` means state changed
    /// and observers should get a fresh snapshot.
    pub fn apply_command(&mut self, raw: &RawCommand) -> bool {
        let command = match Command::parse(raw) {
            Ok(command) => command,
            Err(CommandError::MissingAction) => {
                tracing::warn!("command without action ignored");
                return false;
            }
            Err(e) => {
                tracing::debug!(error = %e, "command rejected");
                return false;
            }
        };

        let s = &mut self.state;
        match &command {
            Command::Power(on) => s.power = *on,
            Command::SetMode(mode) => s.mode = *mode,
            Command::SetFan(fan) => s.fan_speed = *fan,
            Command::SetSwing(swing) => s.swing = *swing,
            Command::Temp(target) => s.target_temp = *target,
            Command::Report => return false,
            Command::Unknown(action) => {
                tracing::warn!(%action, "unknown command action");
                return false;
            }
        }
        tracing::debug!(?command, "command applied");
        true
    }

    /// owned copy of the current state
    pub fn snapshot(&self) -> DeviceState {
        self.state.clone()
    }
}
