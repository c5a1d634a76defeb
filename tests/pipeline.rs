//! End-to-end pipeline scenarios through the public API

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use pressure::pipeline::{queue, upstream, BroadcastWorker, PollWorker};
use pressure::registry::LastKnownState;
use pressure::stats::PipelineStats;
use pressure::{
    ConnectionHandle, ConnectionRegistry, Downstream, OutboundPayload, Pressure, PressureConfig,
    SendError, WireMessage, WrapperTemplate,
};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct Socket {
    received: Mutex<Vec<String>>,
    calls: AtomicUsize,
    reject: Mutex<Option<String>>,
}

#[async_trait]
impl Downstream for Socket {
    async fn send(&self, message: WireMessage) -> Result<(), SendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.reject.lock().unwrap().as_deref() == Some(message.as_str()) {
            return Err(SendError::Other("simulated failure".into()));
        }
        self.received.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

impl Socket {
    fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[tokio::test(start_paused = true)]
async fn poll_worker_queues_one_payload_per_change() {
    init_tracing();

    let cancel = CancellationToken::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let source = {
        let cancel = cancel.clone();
        let calls = Arc::clone(&calls);
        upstream::from_fn(move || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n == 2 {
                cancel.cancel();
                return Ok::<_, std::io::Error>(json!("bar"));
            }
            Ok(json!("foo"))
        })
    };

    let (tx, mut rx) = queue::channel(None);
    let worker = PollWorker::new(
        Arc::new(source),
        tx,
        Arc::new(LastKnownState::new()),
        Arc::new(ArcSwap::from_pointee(WrapperTemplate::new())),
        Arc::new(PipelineStats::new()),
    )
    .delay(Duration::from_millis(5));

    let before = chrono::Utc::now().timestamp();
    worker.run(cancel).await;
    let after = chrono::Utc::now().timestamp();

    assert_eq!(rx.len(), 2);
    for expected in ["foo", "bar"] {
        match rx.try_pop() {
            Some(OutboundPayload::Wrapped(envelope)) => {
                assert_eq!(envelope.upstream_data, json!(expected));
                assert!((before..=after).contains(&envelope.last_update_ts));
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }
}

#[tokio::test]
async fn broadcast_survives_one_failing_socket() {
    init_tracing();

    let registry = Arc::new(ConnectionRegistry::default());
    let sockets: Vec<Arc<Socket>> = (0..3).map(|_| Arc::new(Socket::default())).collect();
    for socket in &sockets {
        assert!(registry.add(ConnectionHandle::from(Arc::clone(socket))).await);
    }
    *sockets[0].reject.lock().unwrap() = Some(r#"["foo"]"#.into());

    let (tx, rx) = queue::channel(None);
    tx.push(OutboundPayload::Raw(json!("foo"))).unwrap();
    tx.push(OutboundPayload::Raw(json!("bar"))).unwrap();

    let mut worker = BroadcastWorker::new(rx, registry, Arc::new(PipelineStats::new()));
    worker.broadcast_once().await;
    worker.broadcast_once().await;

    assert_eq!(sockets[0].received(), vec!["{}", r#"["bar"]"#]);
    for socket in &sockets[1..] {
        assert_eq!(socket.received(), vec!["{}", r#"["foo"]"#, r#"["bar"]"#]);
    }
}

#[tokio::test(start_paused = true)]
async fn pressure_round_trip() {
    init_tracing();

    let value = Arc::new(Mutex::new(json!({"tick": 0})));
    let source = {
        let value = Arc::clone(&value);
        upstream::from_fn(move || Ok::<Value, std::io::Error>(value.lock().unwrap().clone()))
    };

    let config = PressureConfig::from_json(
        r#"{"read_worker_delay": 0.01, "broadcast_worker_delay": 0.01,
            "wrapper_template": {"feed": "ticks"}}"#,
    )
    .unwrap();
    let pressure = Pressure::new(config, source);

    let socket = Arc::new(Socket::default());
    let handle = ConnectionHandle::from(Arc::clone(&socket));
    pressure.add(handle.clone()).await;

    tokio::time::sleep(Duration::from_millis(100)).await;
    *value.lock().unwrap() = json!({"tick": 1});
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(pressure.remove(&handle).await, Some(handle.clone()));
    *value.lock().unwrap() = json!({"tick": 2});
    tokio::time::sleep(Duration::from_millis(100)).await;
    pressure.stop().await;

    let ticks: Vec<Value> = socket
        .received()
        .iter()
        .map(|m| serde_json::from_str::<Value>(m).unwrap())
        .filter_map(|m| m.get("upstream_data").cloned())
        .collect();

    assert_eq!(ticks.last(), Some(&json!({"tick": 1})));
    assert!(!ticks.contains(&json!({"tick": 2})));
    assert_eq!(pressure.last_known().unwrap().upstream_data, json!({"tick": 2}));
    assert_eq!(pressure.last_known().unwrap().template()["feed"], json!("ticks"));
}

#[tokio::test(start_paused = true)]
async fn bounded_queue_still_delivers_latest_value() {
    init_tracing();

    let calls = AtomicUsize::new(0);
    let source = upstream::from_fn(move || {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        Ok::<_, std::io::Error>(json!((n + 1).min(3)))
    });

    let config = PressureConfig::default()
        .manual_start()
        .no_wrap(true)
        .queue_capacity(1)
        .read_worker_delay(Duration::from_millis(10))
        .broadcast_worker_delay(Duration::from_secs(1));
    let pressure = Pressure::new(config, source);

    let socket = Arc::new(Socket::default());
    pressure.add(ConnectionHandle::from(Arc::clone(&socket))).await;
    pressure.start().await;

    tokio::time::sleep(Duration::from_secs(30)).await;
    pressure.stop().await;

    assert_eq!(socket.received(), vec!["{}", "[1]", "[2]", "[3]"]);
    assert_eq!(pressure.last_known().unwrap().upstream_data, json!(3));
}
