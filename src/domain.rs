//! ==============================================================================
//! domain.rs - device state and device report types
//! ==============================================================================
//!
//! purpose:
//!     the shared vocabulary of the relay. `DeviceState` is what every
//!     dashboard sees, `DeviceReport` is what the air conditioner controller
//!     sends us.
//!
//! relationships:
//!     - used by: store.rs (owns the single DeviceState)
//!     - used by: command.rs (mutations target these fields)
//!     - used by: hub.rs / server.rs (snapshots go out as web_update)
//!     - uses: history.rs (bounded rolling sequences)
//!
//! wire format:
//!     state serializes with camelCase keys, e.g.
//!     {"temperature": 24.5, "humidity": 51.0, "targetTemp": 25, "power": false,
//!      "mode": "cool", "fanSpeed": "auto", "swing": "off",
//!      "history": [...], "humidityHistory": [...]}
//!
//! ==============================================================================

use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RelayError;
use crate::history::BoundedHistory;

/// lowest accepted target temperature (celsius, inclusive)
pub const MIN_TARGET_TEMP: i64 = 18;
/// highest accepted target temperature (celsius, inclusive)
pub const MAX_TARGET_TEMP: i64 = 32;
/// target temperature of a freshly started relay
pub const DEFAULT_TARGET_TEMP: i64 = 25;

/// returned when a string names no variant of one of the control enums
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized {kind} value {value:?}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

// ==============================================================================
// control enums
// ==============================================================================

/// operating mode of the air conditioner
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Cool,
    Dry,
    Fan,
}

/// fan speed setting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FanSpeed {
    Low,
    Med,
    High,
    #[default]
    Auto,
}

/// louver swing setting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Swing {
    On,
    #[default]
    Off,
}

impl FromStr for Mode {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cool" => Ok(Mode::Cool),
            "dry" => Ok(Mode::Dry),
            "fan" => Ok(Mode::Fan),
            other => Err(UnknownVariant { kind: "mode", value: other.to_string() }),
        }
    }
}

impl FromStr for FanSpeed {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(FanSpeed::Low),
            "med" => Ok(FanSpeed::Med),
            "high" => Ok(FanSpeed::High),
            "auto" => Ok(FanSpeed::Auto),
            other => Err(UnknownVariant { kind: "fan speed", value: other.to_string() }),
        }
    }
}

impl FromStr for Swing {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on" => Ok(Swing::On),
            "off" => Ok(Swing::Off),
            other => Err(UnknownVariant { kind: "swing", value: other.to_string() }),
        }
    }
}

// ==============================================================================
// target temperature
// ==============================================================================

/// setpoint in whole degrees celsius, always within
/// [MIN_TARGET_TEMP, MAX_TARGET_TEMP]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct TargetTemp(i64);

/// a setpoint outside the accepted range
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("target temperature {0} outside [18, 32]")]
pub struct TargetTempOutOfRange(pub i64);

impl TargetTemp {
    pub fn new(celsius: i64) -> Result<Self, TargetTempOutOfRange> {
        if (MIN_TARGET_TEMP..=MAX_TARGET_TEMP).contains(&celsius) {
            Ok(Self(celsius))
        } else {
            Err(TargetTempOutOfRange(celsius))
        }
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl Default for TargetTemp {
    fn default() -> Self {
        Self(DEFAULT_TARGET_TEMP)
    }
}

impl TryFrom<i64> for TargetTemp {
    type Error = TargetTempOutOfRange;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TargetTemp> for i64 {
    fn from(t: TargetTemp) -> Self {
        t.0
    }
}

// ==============================================================================
// device state
// ==============================================================================
// one instance per process, owned by the StateStore. clones of it are the
// snapshots that get pushed to dashboards.

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceState {
    /// last reported ambient temperature
    pub temperature: Option<f64>,
    /// last reported relative humidity
    pub humidity: Option<f64>,
    pub target_temp: TargetTemp,
    pub power: bool,
    pub mode: Mode,
    pub fan_speed: FanSpeed,
    pub swing: Swing,
    /// admitted temperature samples, oldest first
    pub history: BoundedHistory,
    /// humidity samples admitted alongside `history`
    pub humidity_history: BoundedHistory,
}

impl DeviceState {
    /// fresh state with both histories bounded to `history_capacity`
    pub fn new(history_capacity: usize) -> Self {
        Self {
            temperature: None,
            humidity: None,
            target_temp: TargetTemp::default(),
            power: false,
            mode: Mode::default(),
            fan_speed: FanSpeed::default(),
            swing: Swing::default(),
            history: BoundedHistory::new(history_capacity),
            humidity_history: BoundedHistory::new(history_capacity),
        }
    }
}

// ==============================================================================
// device report
// ==============================================================================
// a partial state update from the controller. every field is optional: a
// `None` field was absent from the report and must not touch the state.
//
// temperature/humidity use a nested option so that an explicit json null
// (reading cleared) is distinct from an absent key:
//     absent        -> None
//     null          -> Some(None)
//     24.5          -> Some(Some(24.5))

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceReport {
    pub temperature: Option<Option<f64>>,
    pub humidity: Option<Option<f64>>,
    pub target_temp: Option<TargetTemp>,
    pub power: Option<bool>,
    pub mode: Option<Mode>,
    pub fan_speed: Option<FanSpeed>,
    pub swing: Option<Swing>,
}

impl DeviceReport {
    /// decode a report leniently, field by field.
    ///
    /// the controller is a trusted producer, so a single ill-typed field does
    /// not discard the whole report: that field is skipped with a warning and
    /// everything else still merges. unknown keys are ignored. the history
    /// sequences belong to the admission policy and are never taken from the
    /// device.
    pub fn from_value(value: &Value) -> Result<Self, RelayError> {
        let fields = value.as_object().ok_or(RelayError::ReportNotObject)?;

        let mut report = DeviceReport::default();
        for (key, raw) in fields {
            match key.as_str() {
                "temperature" => report.temperature = decode_reading(key, raw),
                "humidity" => report.humidity = decode_reading(key, raw),
                "targetTemp" => report.target_temp = decode_setpoint(key, raw),
                "power" => report.power = decode_field(key, raw),
                "mode" => report.mode = decode_field(key, raw),
                "fanSpeed" => report.fan_speed = decode_field(key, raw),
                "swing" => report.swing = decode_field(key, raw),
                other => tracing::trace!(key = other, "ignoring report key"),
            }
        }
        Ok(report)
    }

    /// the temperature sample carried by this report, if it holds a number
    pub fn temperature_sample(&self) -> Option<f64> {
        self.temperature.flatten()
    }

    /// the humidity sample carried by this report, if it holds a number
    pub fn humidity_sample(&self) -> Option<f64> {
        self.humidity.flatten()
    }

    pub fn is_empty(&self) -> bool {
        *self == DeviceReport::default()
    }
}

fn decode_reading(key: &str, raw: &Value) -> Option<Option<f64>> {
    match raw {
        Value::Null => Some(None),
        Value::Number(n) => match n.as_f64() {
            Some(v) => Some(Some(v)),
            None => {
                tracing::warn!(field = key, value = %raw, "skipping unrepresentable reading");
                None
            }
        },
        _ => {
            tracing::warn!(field = key, value = %raw, "skipping non-numeric reading");
            None
        }
    }
}

// firmware that stores the setpoint as a float reports `25.0`; a whole
// number float is the same setpoint, a fractional one is not
fn decode_setpoint(key: &str, raw: &Value) -> Option<TargetTemp> {
    let whole = match raw {
        Value::Number(n) if n.is_f64() => n
            .as_f64()
            .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64),
        _ => None,
    };
    match whole {
        Some(f) => decode_field(key, &Value::from(f as i64)),
        None => decode_field(key, raw),
    }
}

fn decode_field<T: DeserializeOwned>(key: &str, raw: &Value) -> Option<T> {
    match T::deserialize(raw) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(field = key, value = %raw, error = %e, "skipping report field");
            None
        }
    }
}
