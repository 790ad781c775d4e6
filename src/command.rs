//! ==============================================================================
//! command.rs - dashboard command validation
//! ==============================================================================
//!
//! purpose:
//!     turns a loosely shaped `{action, value}` payload from a dashboard into a
//!     closed `Command` with a typed payload, or says why it cannot.
//!
//! ```text
//!     | action    | value                         | field      |
//!     |-----------|-------------------------------|------------|
//!     | power     | boolean                       | power      |
//!     | set_mode  | cool / dry / fan              | mode       |
//!     | set_fan   | low / med / high / auto       | fanSpeed   |
//!     | set_swing | on / off                      | swing      |
//!     | temp      | integer in [18, 32]           | targetTemp |
//!     | report    | ignored                       | (none)     |
//! ```
//!
//! validation only guards the shared state. whatever the outcome, the
//! caller still relays the original payload to the controller.
//!
//! relationships:
//!     - used by: store.rs (apply_command)
//!     - uses: domain.rs (Mode, FanSpeed, Swing, TargetTemp)
//!
//! ==============================================================================

use serde_json::Value;

use crate::domain::{FanSpeed, Mode, Swing, TargetTemp, TargetTempOutOfRange, UnknownVariant};

/// the command as it arrived, before validation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawCommand {
    pub action: Option<String>,
    pub value: Option<Value>,
}

impl RawCommand {
    /// pull `action` and `value` out of any json payload. a payload that is
    /// not an object, or has a non-string action, yields no action.
    pub fn from_value(payload: &Value) -> Self {
        Self {
            action: payload
                .get("action")
                .and_then(Value::as_str)
                .map(str::to_owned),
            value: payload.get("value").cloned(),
        }
    }

    pub fn new(action: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            action: Some(action.into()),
            value: Some(value.into()),
        }
    }
}

/// a recognized dashboard command with a validated payload
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Power(bool),
    SetMode(Mode),
    SetFan(FanSpeed),
    SetSwing(Swing),
    Temp(TargetTemp),
    /// ask the controller for a fresh report; never touches state
    Report,
    /// action the relay does not know about
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    #[error("command has no action")]
    MissingAction,

    #[error("{action}: expected a boolean, got {got}")]
    NotABoolean { action: &'static str, got: String },

    #[error("{action}: expected a string, got {got}")]
    NotAString { action: &'static str, got: String },

    #[error("{action}: {source}")]
    UnknownVariant {
        action: &'static str,
        #[source]
        source: UnknownVariant,
    },

    #[error("temp: {got} is not an integer")]
    NotAnInteger { got: String },

    #[error("temp: {0}")]
    OutOfRange(#[from] TargetTempOutOfRange),
}

impl Command {
    /// validate a raw command.
    ///
    /// unknown actions are not an error: they come back as `Command::Unknown`
    /// so the caller can log them distinctly from bad values.
    pub fn parse(raw: &RawCommand) -> Result<Command, CommandError> {
        let action = raw.action.as_deref().ok_or(CommandError::MissingAction)?;
        let value = raw.value.as_ref().unwrap_or(&Value::Null);

        match action {
            "power" => match value {
                Value::Bool(on) => Ok(Command::Power(*on)),
                other => Err(CommandError::NotABoolean {
                    action: "power",
                    got: other.to_string(),
                }),
            },
            "set_mode" => parse_variant("set_mode", value).map(Command::SetMode),
            "set_fan" => parse_variant("set_fan", value).map(Command::SetFan),
            "set_swing" => parse_variant("set_swing", value).map(Command::SetSwing),
            "temp" => {
                let celsius = parse_integer(value).ok_or_else(|| CommandError::NotAnInteger {
                    got: value.to_string(),
                })?;
                Ok(Command::Temp(TargetTemp::new(celsius)?))
            }
            "report" => Ok(Command::Report),
            other => Ok(Command::Unknown(other.to_string())),
        }
    }
}

fn parse_variant<T>(action: &'static str, value: &Value) -> Result<T, CommandError>
where
    T: std::str::FromStr<Err = UnknownVariant>,
{
    let s = value.as_str().ok_or_else(|| CommandError::NotAString {
        action,
        got: value.to_string(),
    })?;
    s.parse()
        .map_err(|source| CommandError::UnknownVariant { action, source })
}

/// lenient integer parsing for setpoints.
///
/// accepts json integers, finite floats (truncated toward zero) and strings
/// whose leading sign/digits form an integer ("24", " 24 ", "24.5", "24c").
fn parse_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.abs() < i64::MAX as f64)
                .map(|f| f.trunc() as i64)
        }),
        Value::String(s) => leading_integer(s.trim()),
        _ => None,
    }
}

fn leading_integer(s: &str) -> Option<i64> {
    let (sign, digits) = match s.as_bytes().first()? {
        b'-' => (-1, &s[1..]),
        b'+' => (1, &s[1..]),
        _ => (1, s),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(action: &str, value: Value) -> Result<Command, CommandError> {
        Command::parse(&RawCommand::new(action, value))
    }

    #[test]
    fn accepts_every_recognized_action() {
        assert_eq!(parse("power", json!(true)), Ok(Command::Power(true)));
        assert_eq!(parse("set_mode", json!("dry")), Ok(Command::SetMode(Mode::Dry)));
        assert_eq!(parse("set_fan", json!("high")), Ok(Command::SetFan(FanSpeed::High)));
        assert_eq!(parse("set_swing", json!("on")), Ok(Command::SetSwing(Swing::On)));
        assert_eq!(
            parse("temp", json!(21)),
            Ok(Command::Temp(TargetTemp::new(21).unwrap()))
        );
    }

    #[test]
    fn temp_range_is_inclusive() {
        assert_eq!(
            parse("temp", json!(17)),
            Err(CommandError::OutOfRange(TargetTempOutOfRange(17)))
        );
        assert!(parse("temp", json!(18)).is_ok());
        assert!(parse("temp", json!(32)).is_ok());
        assert!(parse("temp", json!(33)).is_err());
    }

    #[test]
    fn temp_parses_like_a_lenient_integer() {
        let t = |v| match parse("temp", v) {
            Ok(Command::Temp(t)) => Some(t.get()),
            _ => None,
        };
        assert_eq!(t(json!("24")), Some(24));
        assert_eq!(t(json!(" 26 ")), Some(26));
        assert_eq!(t(json!("22.9")), Some(22));
        assert_eq!(t(json!(22.9)), Some(22));
        assert_eq!(t(json!("20c")), Some(20));
        assert_eq!(t(json!("warm")), None);
        assert_eq!(t(json!("")), None);
        assert_eq!(t(json!(null)), None);
        assert_eq!(t(json!(true)), None);
    }

    #[test]
    fn rejects_values_outside_the_enums() {
        assert!(matches!(
            parse("set_mode", json!("heat")),
            Err(CommandError::UnknownVariant { action: "set_mode", .. })
        ));
        assert!(matches!(
            parse("set_fan", json!(3)),
            Err(CommandError::NotAString { action: "set_fan", .. })
        ));
        assert!(parse("set_swing", json!("sideways")).is_err());
        assert!(matches!(
            parse("power", json!("on")),
            Err(CommandError::NotABoolean { .. })
        ));
    }

    #[test]
    fn report_and_unknown_are_not_errors() {
        let report = Command::parse(&RawCommand {
            action: Some("report".into()),
            value: None,
        })
        .unwrap();
        assert_eq!(report, Command::Report);

        let unknown = parse("self_destruct", json!(1)).unwrap();
        assert_eq!(unknown, Command::Unknown("self_destruct".into()));
    }

    #[test]
    fn missing_action_is_an_error() {
        let raw = RawCommand::from_value(&json!({"value": 3}));
        assert_eq!(Command::parse(&raw), Err(CommandError::MissingAction));

        let raw = RawCommand::from_value(&json!("power"));
        assert_eq!(raw, RawCommand::default());
        assert_eq!(Command::parse(&raw), Err(CommandError::MissingAction));
    }
}
