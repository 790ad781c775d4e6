//! ==============================================================================
//! hub.rs - serialized state access and fan-out
//! ==============================================================================
//!
//! purpose:
//!     `RelayHub` is the clone-able handle every task uses to talk to the
//!     state store. it guarantees two things:
//!     1. one writer at a time. the store (state + admission clock) sits behind
//!        a single mutex, so a report merge, its admission check and the
//!        broadcast that follows run as one unit.
//!     2. fire-and-forget delivery. outbound events go on a tokio broadcast
//!        channel; publishing never waits on a slow or vanished peer.
//!
//! architecture:
//!
//! ```text
//!     controller ──esp32_message──┐                 ┌──web_update────▶ dashboards
//!                                 ▼                 │
//!     dashboard ───web_command──▶ RelayHub ──events─┤
//!     POST /api/command ─────────▶ (mutex)          │
//!     poll scheduler ────────────▶                  └──esp32_command─▶ controller
//! ```
//!
//! every peer subscribes to the same channel; each one ignores the
//! events that are not meant for it.
//!
//! relationships:
//!     - used by: server.rs (websocket sessions, http handlers)
//!     - used by: scheduler.rs (periodic report requests)
//!     - uses: store.rs, events.rs
//!
//! ==============================================================================

use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value};
use tokio::sync::{broadcast, Mutex};

use crate::command::RawCommand;
use crate::config::RelayConfig;
use crate::domain::{DeviceReport, DeviceState};
use crate::events::OutboundEvent;
use crate::history::Admission;
use crate::store::StateStore;

/// outbound events buffered per subscriber before it starts lagging
pub const EVENT_BUFFER: usize = 256;

#[derive(Clone)]
pub struct RelayHub {
    store: Arc<Mutex<StateStore>>,
    events: broadcast::Sender<OutboundEvent>,
}

impl RelayHub {
    pub fn new(store: StateStore) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            store: Arc::new(Mutex::new(store)),
            events,
        }
    }

    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(StateStore::new(
            config.history.capacity,
            config.history.interval(),
        ))
    }

    /// attach a new peer to the outbound event stream
    pub fn subscribe(&self) -> broadcast::Receiver<OutboundEvent> {
        self.events.subscribe()
    }

    pub fn peer_count(&self) -> usize {
        self.events.receiver_count()
    }

    // ==========================================================================
    // inbound paths
    // ==========================================================================

    /// controller -> state. always followed by a broadcast, whether or not a
    /// history sample was admitted.
    pub async fn handle_device_report(&self, report: &DeviceReport) {
        let mut store = self.store.lock().await;
        let admission = store.merge_device_report(report, Instant::now());
        let snapshot = store.snapshot();

        if let Some(Admission::Admitted { with_humidity }) = admission {
            tracing::debug!(
                with_humidity,
                samples = snapshot.history.len(),
                capacity = snapshot.history.capacity(),
                "history sample admitted"
            );
        }
        self.publish(OutboundEvent::WebUpdate(snapshot));
    }

    /// dashboard -> controller (+ state).
    ///
    /// the payload is relayed to the controller exactly as received, even
    /// when validation rejects it. observers only hear about it when state
    /// actually changed. returns whether it did.
    pub async fn handle_web_command(&self, payload: Value) -> bool {
        let raw = RawCommand::from_value(&payload);

        let mut store = self.store.lock().await;
        self.relay_to_device(payload);
        let updated = store.apply_command(&raw);
        if updated {
            self.publish(OutboundEvent::WebUpdate(store.snapshot()));
        }
        updated
    }

    /// current state, for a single requester. no mutation, no broadcast.
    pub async fn snapshot(&self) -> DeviceState {
        self.store.lock().await.snapshot()
    }

    /// push the current state to every connected peer
    pub async fn broadcast(&self) {
        let store = self.store.lock().await;
        self.publish(OutboundEvent::WebUpdate(store.snapshot()));
    }

    // ==========================================================================
    // outbound paths
    // ==========================================================================

    /// forward a command to the controller. dropped if nobody is listening.
    pub fn relay_to_device(&self, command: Value) {
        tracing::debug!(%command, "relaying command to device");
        self.publish(OutboundEvent::Esp32Command(command));
    }

    /// ask the controller for a fresh report, bypassing validation and
    /// broadcast since `report` never changes state
    pub fn request_device_report(&self) {
        self.publish(OutboundEvent::Esp32Command(json!({ "action": "report" })));
    }

    fn publish(&self, event: OutboundEvent) {
        let name = event.name();
        // send only fails when there are no subscribers
        if self.events.send(event).is_err() {
            tracing::trace!(event = name, "no peers connected, event dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::broadcast::error::TryRecvError;

    fn hub() -> RelayHub {
        RelayHub::new(StateStore::new(10, Duration::from_secs(3600)))
    }

    fn report(v: Value) -> DeviceReport {
        DeviceReport::from_value(&v).unwrap()
    }

    #[tokio::test]
    async fn device_report_always_broadcasts() {
        let hub = hub();
        let mut rx = hub.subscribe();

        hub.handle_device_report(&report(json!({"temperature": 21.0}))).await;
        // second one is throttled out of history but still broadcast
        hub.handle_device_report(&report(json!({"temperature": 22.0}))).await;

        for expected in [21.0, 22.0] {
            match rx.try_recv().unwrap() {
                OutboundEvent::WebUpdate(state) => {
                    assert_eq!(state.temperature, Some(expected));
                    assert_eq!(state.history.to_vec(), vec![21.0]);
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test]
    async fn accepted_command_relays_then_broadcasts() {
        let hub = hub();
        let mut rx = hub.subscribe();

        let payload = json!({"action": "set_mode", "value": "dry"});
        assert!(hub.handle_web_command(payload.clone()).await);

        assert_eq!(rx.try_recv().unwrap(), OutboundEvent::Esp32Command(payload));
        match rx.try_recv().unwrap() {
            OutboundEvent::WebUpdate(state) => assert_eq!(state.mode, crate::domain::Mode::Dry),
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test]
    async fn rejected_or_noop_commands_are_relayed_without_broadcast() {
        let hub = hub();
        let mut rx = hub.subscribe();

        for payload in [
            json!({"action": "report"}),
            json!({"action": "set_mode", "value": "heat"}),
            json!({"action": "temp", "value": 17}),
            json!({"action": "dance"}),
            json!({"value": 3}),
        ] {
            assert!(!hub.handle_web_command(payload.clone()).await);
            assert_eq!(rx.try_recv().unwrap(), OutboundEvent::Esp32Command(payload));
            assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
        }
        assert_eq!(hub.snapshot().await, DeviceState::new(10));
    }

    #[tokio::test]
    async fn snapshot_and_report_request_do_not_broadcast_state() {
        let hub = hub();
        let mut rx = hub.subscribe();

        let _ = hub.snapshot().await;
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));

        hub.request_device_report();
        assert_eq!(
            rx.try_recv().unwrap(),
            OutboundEvent::Esp32Command(json!({"action": "report"}))
        );
    }

    #[tokio::test]
    async fn publishing_without_peers_is_harmless() {
        let hub = hub();
        assert_eq!(hub.peer_count(), 0);
        hub.handle_device_report(&report(json!({"humidity": 40.0}))).await;
        hub.broadcast().await;
        assert_eq!(hub.snapshot().await.humidity, Some(40.0));
    }
}
