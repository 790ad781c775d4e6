//! climate-relay: a real-time relay between an air conditioner controller and
//! browser dashboards.
//!
//! the controller pushes readings, dashboards push commands, and the relay
//! keeps the one authoritative copy of device state (plus a throttled,
//! bounded history) and fans it out to everyone connected.

pub mod command;
pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod history;
pub mod hub;
pub mod scheduler;
pub mod server;
pub mod store;

pub use command::{Command, CommandError, RawCommand};
pub use config::RelayConfig;
pub use domain::{DeviceReport, DeviceState, FanSpeed, Mode, Swing, TargetTemp};
pub use error::RelayError;
pub use events::{InboundEvent, OutboundEvent};
pub use hub::RelayHub;
pub use store::StateStore;
