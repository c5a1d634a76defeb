//! Ticker demo: broadcast a changing value to console "connections"
//!
//! Run with: cargo run --example ticker
//!
//! A background task replaces the upstream value with a random-looking
//! eight-letter code every five seconds; the broadcaster polls it 20 times a
//! second and only forwards changes. A second connection joins late and is
//! greeted with the last known envelope.
//!
//! Set `RUST_LOG=pressure=debug` to watch the workers.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pressure::{
    pipeline, ConnectionHandle, Downstream, Pressure, PressureConfig, SendError, WireMessage,
};
use serde_json::{json, Value};

/// Connection that prints what it receives
struct Console {
    name: &'static str,
}

#[async_trait]
impl Downstream for Console {
    async fn send(&self, message: WireMessage) -> Result<(), SendError> {
        println!("[{}] {}", self.name, message);
        Ok(())
    }
}

fn code(seed: u64) -> String {
    let mut x = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    (0..8)
        .map(|_| {
            x ^= x >> 33;
            x = x.wrapping_mul(0xff51afd7ed558ccd);
            (b'A' + (x % 26) as u8) as char
        })
        .collect()
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("pressure=info")),
        )
        .init();

    let current = Arc::new(Mutex::new(Value::Null));

    let writer = {
        let current = Arc::clone(&current);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(5));
            for seed in 0u64.. {
                ticker.tick().await;
                if let Ok(mut value) = current.lock() {
                    *value = json!(code(seed));
                }
            }
        })
    };

    let source = {
        let current = Arc::clone(&current);
        pipeline::from_fn(move || {
            current
                .lock()
                .map(|value| value.clone())
                .map_err(|_| "upstream value lock poisoned")
        })
    };

    let pressure = Pressure::new(
        PressureConfig::default()
            .template_field("someKey", "Some Value")
            .template_field("anotherKey", "Another Value"),
        source,
    );

    pressure.add(ConnectionHandle::new(Console { name: "early" })).await;

    tokio::time::sleep(Duration::from_secs(7)).await;
    pressure.add(ConnectionHandle::new(Console { name: "late" })).await;
    println!("Connected: {}", pressure.connection_count().await);

    if let Err(e) = tokio::signal::ctrl_c().await {
        eprintln!("Failed to wait for ctrl-c: {}", e);
    }

    pressure.stop().await;
    writer.abort();

    let stats = pressure.stats();
    println!(
        "Stats: polls={} changes={} broadcasts={} sends={}",
        stats.polls, stats.changes, stats.broadcasts, stats.sends
    );
}
