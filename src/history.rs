//! ==============================================================================
//! history.rs - bounded rolling history and its admission policy
//! ==============================================================================
//!
//! purpose:
//!     the controller may report several times a second, but dashboards only
//!     chart one point per HISTORY_INTERVAL. this module decouples "current
//!     value" (updated on every report) from "history sample" (throttled).
//!
//! state machine:
//!
//! ```text
//!     ┌──────────────────────┐  temperature report   ┌───────────┐
//!     │ AwaitingFirstSample  │ ───── (admit) ──────▶ │ Throttled │
//!     └──────────────────────┘                       └─────┬─────┘
//!                                                          │ report with
//!                                   elapsed >= interval ──▶│ temperature:
//!                                   admit, restart clock   │ elapsed < interval
//!                                                          │ -> ignore
//! ```
//!
//! elapsed is measured from the last ADMISSION, not the last report.
//!
//! relationships:
//!     - used by: store.rs (one policy per store)
//!     - used by: domain.rs (DeviceState holds two BoundedHistory values)
//!
//! ==============================================================================

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde::{Serialize, Serializer};

// ==============================================================================
// bounded history
// ==============================================================================

/// fixed-capacity fifo of samples; pushing at capacity evicts the oldest
#[derive(Debug, Clone, PartialEq)]
pub struct BoundedHistory {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl BoundedHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// append a sample. a zero-capacity history retains nothing.
    pub fn push(&mut self, sample: f64) {
        if self.capacity == 0 {
            return;
        }
        while self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// samples oldest -> newest
    pub fn to_vec(&self) -> Vec<f64> {
        self.samples.iter().copied().collect()
    }
}

// serialized as a plain json array so dashboards can chart it directly
impl Serialize for BoundedHistory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.samples.iter())
    }
}

// ==============================================================================
// admission policy
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AdmissionState {
    AwaitingFirstSample,
    Throttled { last_admission: Instant },
}

/// outcome of offering a report to the policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// temperature admitted; `with_humidity` tells whether humidity rode along
    Admitted { with_humidity: bool },
    /// inside the throttle window, nothing recorded
    Throttled,
}

impl Admission {
    pub fn is_admitted(self) -> bool {
        matches!(self, Admission::Admitted { .. })
    }
}

#[derive(Debug, Clone)]
pub struct HistoryPolicy {
    interval: Duration,
    state: AdmissionState,
}

impl HistoryPolicy {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            state: AdmissionState::AwaitingFirstSample,
        }
    }

    /// timestamp of the last admission, `None` before the first one
    pub fn last_admission(&self) -> Option<Instant> {
        match self.state {
            AdmissionState::AwaitingFirstSample => None,
            AdmissionState::Throttled { last_admission } => Some(last_admission),
        }
    }

    /// offer one temperature-bearing report to the history.
    ///
    /// humidity is only recorded when the temperature is admitted; it never
    /// enters its history on its own.
    pub fn offer(
        &mut self,
        now: Instant,
        temperature: f64,
        humidity: Option<f64>,
        history: &mut BoundedHistory,
        humidity_history: &mut BoundedHistory,
    ) -> Admission {
        let due = match self.state {
            AdmissionState::AwaitingFirstSample => true,
            AdmissionState::Throttled { last_admission } => {
                now.saturating_duration_since(last_admission) >= self.interval
            }
        };

        if !due {
            tracing::trace!(temperature, "history sample throttled");
            return Admission::Throttled;
        }

        history.push(temperature);
        if let Some(h) = humidity {
            humidity_history.push(h);
        }
        self.state = AdmissionState::Throttled { last_admission: now };
        Admission::Admitted {
            with_humidity: humidity.is_some(),
        }
    }
}
