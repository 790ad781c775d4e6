//! ==============================================================================
//! events.rs - websocket wire protocol
//! ==============================================================================
//!
//! every frame on /ws is a json text message:
//!
//! ```text
//!     {"event": "<name>", "data": <payload>}
//! ```
//!
//! inbound (peer -> relay):
//!     esp32_message   partial device state from the controller
//!     web_command     {action, value} from a dashboard
//!     request_state   no payload; answered with web_update to the asker only
//!
//! outbound (relay -> every peer):
//!     web_update      full device state snapshot
//!     esp32_command   command relayed to the controller
//!
//! ==============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::DeviceState;
use crate::error::{RelayError, Result};

pub const ESP32_MESSAGE: &str = "esp32_message";
pub const WEB_COMMAND: &str = "web_command";
pub const REQUEST_STATE: &str = "request_state";

#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// raw report payload, decoded leniently by DeviceReport::from_value
    DeviceMessage(Value),
    /// raw command payload, relayed to the controller untouched
    WebCommand(Value),
    RequestState,
}

// envelope is decoded by hand so that a missing `data` and unknown event
// names are handled explicitly instead of failing inside serde
#[derive(Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: Value,
}

impl InboundEvent {
    pub fn from_text(text: &str) -> Result<Self> {
        let Envelope { event, data } = serde_json::from_str(text)?;
        match event.as_str() {
            ESP32_MESSAGE => Ok(InboundEvent::DeviceMessage(data)),
            WEB_COMMAND => Ok(InboundEvent::WebCommand(data)),
            REQUEST_STATE => Ok(InboundEvent::RequestState),
            _ => Err(RelayError::UnknownEvent(event)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum OutboundEvent {
    WebUpdate(DeviceState),
    #[serde(rename = "esp32_command")]
    Esp32Command(Value),
}

impl OutboundEvent {
    pub fn name(&self) -> &'static str {
        match self {
            OutboundEvent::WebUpdate(_) => "web_update",
            OutboundEvent::Esp32Command(_) => "esp32_command",
        }
    }

    pub fn to_text(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|source| RelayError::Encode {
            event: self.name(),
            source,
        })
    }
}
