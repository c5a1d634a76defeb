//! Test doubles shared by unit tests

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::SendError;
use crate::payload::WireMessage;
use crate::registry::{ConnectionHandle, Downstream};

#[derive(Default)]
struct Recorder {
    delivered: Mutex<Vec<String>>,
    attempts: AtomicUsize,
    failing: AtomicBool,
    fail_on: Mutex<Option<String>>,
}

#[async_trait]
impl Downstream for Recorder {
    async fn send(&self, message: WireMessage) -> Result<(), SendError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let targeted = self.fail_on.lock().unwrap().as_deref() == Some(message.as_str());
        if targeted || self.failing.load(Ordering::SeqCst) {
            return Err(SendError::Closed);
        }

        self.delivered.lock().unwrap().push(message.as_str().to_owned());
        Ok(())
    }
}

/// Connection that records what it receives
#[derive(Clone, Default)]
pub(crate) struct RecordingConnection {
    inner: Arc<Recorder>,
}

impl RecordingConnection {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Connection whose every send fails
    pub(crate) fn failing() -> Self {
        let conn = Self::new();
        conn.inner.failing.store(true, Ordering::SeqCst);
        conn
    }

    /// Fail only sends of exactly this text
    pub(crate) fn fail_on(&self, text: &str) {
        *self.inner.fail_on.lock().unwrap() = Some(text.to_owned());
    }

    pub(crate) fn handle(&self) -> ConnectionHandle {
        ConnectionHandle::from(Arc::clone(&self.inner))
    }

    /// Successfully delivered messages, in order
    pub(crate) fn messages(&self) -> Vec<String> {
        self.inner.delivered.lock().unwrap().clone()
    }

    /// Number of send calls, failed ones included
    pub(crate) fn send_count(&self) -> usize {
        self.inner.attempts.load(Ordering::SeqCst)
    }
}

/// Connection whose sends never complete once armed
#[derive(Default)]
pub(crate) struct StalledConnection {
    armed: AtomicBool,
}

impl StalledConnection {
    /// Register first, then arm, so the greeting goes through
    pub(crate) fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Downstream for StalledConnection {
    async fn send(&self, _message: WireMessage) -> Result<(), SendError> {
        if self.armed.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}

/// Connection whose next send panics once armed
#[derive(Default)]
pub(crate) struct PanicOnce {
    armed: AtomicBool,
}

impl PanicOnce {
    pub(crate) fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Downstream for PanicOnce {
    async fn send(&self, _message: WireMessage) -> Result<(), SendError> {
        if self.armed.swap(false, Ordering::SeqCst) {
            panic!("connection exploded");
        }
        Ok(())
    }
}
