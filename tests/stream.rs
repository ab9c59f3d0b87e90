//! WebSocket streaming tests against a spawned agent binary.

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::collections::HashSet;
use std::process::{Child, Command};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct Agent(Child);

impl Agent {
    fn spawn(port: u16) -> Self {
        let child = Command::new(env!("CARGO_BIN_EXE_pulsemon"))
            .args(["-p", &port.to_string()])
            .spawn()
            .expect("spawn agent");
        Agent(child)
    }
}

impl Drop for Agent {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

async fn connect(port: u16) -> Ws {
    let url = format!("ws://127.0.0.1:{port}/ws/stats");
    for _ in 0..50 {
        if let Ok((ws, _)) = connect_async(&url).await {
            return ws;
        }
        sleep(Duration::from_millis(100)).await;
    }
    panic!("could not reach {url}");
}

async fn next_json(ws: &mut Ws, wait: Duration) -> Option<Value> {
    loop {
        match timeout(wait, ws.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => {
                return Some(serde_json::from_str(&text).expect("JSON frame"))
            }
            Ok(Some(Ok(_))) => continue, // pings etc.
            _ => return None,
        }
    }
}

/// Read frames until one of type `kind` arrives.
async fn next_of_type(ws: &mut Ws, kind: &str, wait: Duration) -> Option<Value> {
    let deadline = Instant::now() + wait;
    loop {
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            return None;
        }
        match next_json(ws, left).await {
            Some(v) if v["type"] == kind => return Some(v),
            Some(_) => continue,
            None => return None,
        }
    }
}

#[tokio::test]
async fn ping_yields_one_heartbeat_and_garbage_is_ignored() {
    let _agent = Agent::spawn(9651);
    let mut ws = connect(9651).await;

    ws.send(Message::Text("ping".into())).await.expect("send ping");

    // Stats pushes may interleave; find the heartbeat among them.
    let hb = next_of_type(&mut ws, "heartbeat", Duration::from_secs(3))
        .await
        .expect("heartbeat reply");
    assert!(hb["data"].is_null());
    assert!(hb["timestamp"].as_u64().unwrap() > 0);

    // Anything that is not "ping" draws no reply: over the next window only
    // periodic stats frames may arrive.
    ws.send(Message::Text("get_metrics".into())).await.expect("send text");
    ws.send(Message::Text("PING".into())).await.expect("send text");
    let deadline = Instant::now() + Duration::from_millis(1800);
    loop {
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            break;
        }
        match next_json(&mut ws, left).await {
            Some(v) => assert_eq!(v["type"], "stats", "unexpected reply: {v}"),
            None => break,
        }
    }

    ws.close(None).await.ok();
}

#[tokio::test]
async fn broadcast_fans_out_and_survives_disconnects() {
    let _agent = Agent::spawn(9652);

    let mut a = connect(9652).await;
    let mut b = connect(9652).await;

    // Both clients see the same cycles: their timestamp sets intersect.
    let mut seen_a = HashSet::new();
    let mut seen_b = HashSet::new();
    for _ in 0..3 {
        if let Some(v) = next_of_type(&mut a, "stats", Duration::from_secs(3)).await {
            seen_a.insert(v["timestamp"].as_u64().unwrap());
        }
        if let Some(v) = next_of_type(&mut b, "stats", Duration::from_secs(3)).await {
            seen_b.insert(v["timestamp"].as_u64().unwrap());
        }
    }
    assert!(
        seen_a.intersection(&seen_b).next().is_some(),
        "no shared cycle between clients: {seen_a:?} vs {seen_b:?}"
    );

    // One client leaving must not disturb the other.
    b.close(None).await.ok();
    drop(b);
    let first = next_of_type(&mut a, "stats", Duration::from_secs(3))
        .await
        .expect("stream continues after peer disconnect");
    let second = next_of_type(&mut a, "stats", Duration::from_secs(3))
        .await
        .expect("next cycle still arrives");
    let gap = second["timestamp"].as_u64().unwrap() - first["timestamp"].as_u64().unwrap();
    assert!((500..=2500).contains(&gap), "cycle gap off: {gap}ms");

    // Last client leaving stops the loop; a reconnect restarts it.
    a.close(None).await.ok();
    drop(a);
    sleep(Duration::from_millis(1500)).await;

    let mut c = connect(9652).await;
    let v = next_of_type(&mut c, "stats", Duration::from_secs(3))
        .await
        .expect("loop restarted for new subscriber");
    assert_eq!(v["data"]["timestamp"], v["timestamp"]);
    c.close(None).await.ok();
}
