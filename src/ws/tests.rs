use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tempfile::TempDir;
use tungstenite::WebSocket;
use tungstenite::protocol::Message;
use tungstenite::stream::MaybeTlsStream;

use super::server::try_bind_port;
use super::session::OUTBOUND_CAPACITY;
use super::start_ws_server;
use crate::document::DocumentStore;
use crate::hub::{Origin, SyncHub};

type Client = WebSocket<MaybeTlsStream<TcpStream>>;

const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

fn start() -> (TempDir, Arc<SyncHub>, SocketAddr) {
    let temp = TempDir::new().unwrap();
    let store = DocumentStore::open(temp.path().join("data.json")).unwrap();
    let hub = Arc::new(SyncHub::new(store));
    let addr = start_ws_server(LOCALHOST, 0, Arc::clone(&hub)).unwrap();
    (temp, hub, addr)
}

fn connect(addr: SocketAddr) -> Client {
    let (ws, _) = tungstenite::connect(format!("ws://{addr}")).unwrap();
    if let MaybeTlsStream::Plain(stream) = ws.get_ref() {
        stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    }
    ws
}

fn recv(ws: &mut Client) -> Value {
    loop {
        match ws.read().unwrap() {
            Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
            Message::Close(_) => return json!({"type": "close"}),
            _ => continue,
        }
    }
}

fn send(ws: &mut Client, value: Value) {
    ws.send(Message::text(value.to_string())).unwrap();
}

fn wait_for_sessions(hub: &SyncHub, n: usize) {
    for _ in 0..200 {
        if hub.session_count() == n {
            return;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    panic!("expected {n} sessions, have {}", hub.session_count());
}

#[test]
fn test_update_round_trip_over_socket() {
    let (_temp, hub, addr) = start();
    let mut ws = connect(addr);

    assert_eq!(recv(&mut ws), json!({"type": "initial_data", "data": []}));

    send(&mut ws, json!({"type": "update_request", "data": [{"id": 1}]}));
    let update = recv(&mut ws);
    assert_eq!(update["type"], "data_update");
    assert_eq!(update["data"], json!([{"id": 1}]));

    let on_disk = std::fs::read_to_string(hub.store().path()).unwrap();
    assert_eq!(on_disk, "[\n  {\n    \"id\": 1\n  }\n]");
}

#[test]
fn test_broadcast_reaches_other_viewer() {
    let (_temp, hub, addr) = start();
    let mut a = connect(addr);
    let mut b = connect(addr);
    recv(&mut a);
    recv(&mut b);
    wait_for_sessions(&hub, 2);

    send(&mut a, json!({"type": "update_request", "data": ["shared"]}));

    assert_eq!(recv(&mut a)["data"], json!(["shared"]));
    assert_eq!(recv(&mut b)["data"], json!(["shared"]));
}

#[test]
fn test_rest_update_reaches_socket_viewer() {
    let (_temp, hub, addr) = start();
    let mut ws = connect(addr);
    recv(&mut ws);
    wait_for_sessions(&hub, 1);

    hub.apply_update(Origin::Rest, &json!({"via": "rest"})).unwrap();

    let update = recv(&mut ws);
    assert_eq!(update["source"], "rest");
    assert_eq!(update["data"], json!({"via": "rest"}));
}

#[test]
fn test_invalid_frames_get_error_reply() {
    let (_temp, _hub, addr) = start();
    let mut ws = connect(addr);
    recv(&mut ws);

    ws.send(Message::text("{not json")).unwrap();
    assert_eq!(recv(&mut ws)["type"], "error");

    ws.send(Message::binary(vec![1u8, 2, 3])).unwrap();
    assert_eq!(recv(&mut ws)["type"], "error");

    // Still usable afterwards
    send(&mut ws, json!({"type": "update_request", "data": [true]}));
    assert_eq!(recv(&mut ws)["data"], json!([true]));
}

#[test]
fn test_viewer_close_unregisters_session() {
    let (_temp, hub, addr) = start();
    let mut ws = connect(addr);
    recv(&mut ws);
    wait_for_sessions(&hub, 1);

    ws.close(None).unwrap();
    let _ = ws.flush();

    wait_for_sessions(&hub, 0);
}

#[test]
fn test_hub_shutdown_closes_socket() {
    let (_temp, hub, addr) = start();
    let mut ws = connect(addr);
    recv(&mut ws);
    wait_for_sessions(&hub, 1);

    hub.shutdown();

    assert_eq!(recv(&mut ws)["type"], "close");
}

#[test]
fn test_stalled_viewer_is_dropped() {
    let (_temp, hub, addr) = start();
    let mut stalled = connect(addr);
    recv(&mut stalled);
    wait_for_sessions(&hub, 1);

    // Far more than the socket buffers and the outbound queue can hold
    let chunk = "x".repeat(64 * 1024);
    for i in 0..OUTBOUND_CAPACITY * 2 {
        hub.apply_update(Origin::Rest, &json!([i, chunk])).unwrap();
        if hub.session_count() == 0 {
            break;
        }
    }

    for _ in 0..150 {
        if hub.session_count() == 0 {
            break;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    assert_eq!(hub.session_count(), 0);

    // The hub keeps serving new viewers
    let mut fresh = connect(addr);
    assert_eq!(recv(&mut fresh)["type"], "initial_data");
    drop(stalled);
}

#[test]
fn test_try_bind_port_skips_busy_port() {
    let (held, first) = try_bind_port(LOCALHOST, 0, 1).unwrap();
    let (_next, second) = try_bind_port(LOCALHOST, first.port(), 10).unwrap();

    assert_ne!(first.port(), second.port());
    drop(held);
}
