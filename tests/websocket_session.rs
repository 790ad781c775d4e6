//! end-to-end websocket sessions against a relay bound to an ephemeral port

use std::net::SocketAddr;
use std::time::Duration;

use climate_relay::config::ServerConfig;
use climate_relay::{server, RelayHub, StateStore};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(2);

async fn start_relay(history_interval: Duration) -> (RelayHub, SocketAddr) {
    let hub = RelayHub::new(StateStore::new(3, history_interval));
    let app = server::router(hub.clone(), &ServerConfig::default());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (hub, addr)
}

async fn connect(addr: SocketAddr) -> Client {
    let (ws, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    ws
}

async fn next_frame(ws: &mut Client) -> Value {
    loop {
        let msg = timeout(WAIT, ws.next()).await.expect("timed out").unwrap().unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

/// skip frames until one with the given event name arrives
async fn next_event(ws: &mut Client, name: &str) -> Value {
    loop {
        let frame = next_frame(ws).await;
        if frame["event"] == name {
            return frame["data"].clone();
        }
    }
}

async fn emit(ws: &mut Client, event: &str, data: Value) {
    let frame = json!({"event": event, "data": data});
    ws.send(Message::Text(frame.to_string())).await.unwrap();
}

#[tokio::test]
async fn new_peer_gets_exactly_one_snapshot() {
    let (_hub, addr) = start_relay(Duration::from_secs(3600)).await;
    let mut ws = connect(addr).await;

    let greeting = next_frame(&mut ws).await;
    assert_eq!(greeting["event"], "web_update");
    assert_eq!(greeting["data"]["targetTemp"], 25);
    assert_eq!(greeting["data"]["mode"], "cool");

    assert!(timeout(Duration::from_millis(200), ws.next()).await.is_err());
}

#[tokio::test]
async fn dashboard_command_reaches_device_and_updates_everyone() {
    let (_hub, addr) = start_relay(Duration::from_secs(3600)).await;
    let mut device = connect(addr).await;
    let mut dashboard = connect(addr).await;
    next_event(&mut device, "web_update").await;
    next_event(&mut dashboard, "web_update").await;

    let command = json!({"action": "set_fan", "value": "high"});
    emit(&mut dashboard, "web_command", command.clone()).await;

    assert_eq!(next_event(&mut device, "esp32_command").await, command);
    let update = next_event(&mut dashboard, "web_update").await;
    assert_eq!(update["fanSpeed"], "high");
}

#[tokio::test]
async fn device_reports_fan_out_with_throttled_history() {
    let (hub, addr) = start_relay(Duration::from_secs(3600)).await;
    let mut device = connect(addr).await;
    let mut dashboard = connect(addr).await;
    next_event(&mut dashboard, "web_update").await;

    emit(&mut device, "esp32_message", json!({"temperature": 24.0, "humidity": 50.0})).await;
    let first = next_event(&mut dashboard, "web_update").await;
    assert_eq!(first["history"], json!([24.0]));
    assert_eq!(first["humidityHistory"], json!([50.0]));

    emit(&mut device, "esp32_message", json!({"temperature": 25.0, "humidity": 52.0})).await;
    let second = next_event(&mut dashboard, "web_update").await;
    assert_eq!(second["temperature"], 25.0);
    assert_eq!(second["history"], json!([24.0]));

    assert_eq!(hub.snapshot().await.humidity, Some(52.0));
}

#[tokio::test]
async fn request_state_answers_only_the_asker() {
    let (_hub, addr) = start_relay(Duration::from_secs(3600)).await;
    let mut asker = connect(addr).await;
    let mut bystander = connect(addr).await;
    next_frame(&mut asker).await;
    next_frame(&mut bystander).await;

    ws_send_raw(&mut asker, r#"{"event":"request_state"}"#).await;

    let reply = next_frame(&mut asker).await;
    assert_eq!(reply["event"], "web_update");
    assert!(timeout(Duration::from_millis(200), bystander.next()).await.is_err());
}

#[tokio::test]
async fn garbage_frames_do_not_close_the_session() {
    let (_hub, addr) = start_relay(Duration::from_secs(3600)).await;
    let mut ws = connect(addr).await;
    next_frame(&mut ws).await;

    ws_send_raw(&mut ws, "definitely not json").await;
    ws_send_raw(&mut ws, r#"{"event":"launch_missiles"}"#).await;
    ws_send_raw(&mut ws, r#"{"event":"request_state"}"#).await;

    assert_eq!(next_frame(&mut ws).await["event"], "web_update");
}

async fn ws_send_raw(ws: &mut Client, text: &str) {
    ws.send(Message::Text(text.to_string())).await.unwrap();
}
