//! Broadcaster lifecycle
//!
//! [`Pressure`] owns the connection registry, the last known state and the two
//! worker tasks. Every instance is independent: nothing is shared between
//! instances, and stopping one leaves the others running.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::config::PressureConfig;
use crate::payload::{Envelope, WrapperTemplate};
use crate::pipeline::{queue, BroadcastWorker, PollWorker, Upstream};
use crate::registry::{ConnectionHandle, ConnectionRegistry, ConnectionSnapshot, LastKnownState};
use crate::stats::{PipelineStats, StatsSnapshot};

/// Lifecycle state of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Never started
    Idle,
    /// Workers are running
    Running,
    /// Workers were stopped
    Stopped,
}

struct Workers {
    cancel: CancellationToken,
    poll: JoinHandle<()>,
    broadcast: JoinHandle<()>,
}

/// Polls one upstream source and broadcasts changes to many connections
///
/// ```no_run
/// use pressure::{pipeline, Pressure, PressureConfig};
/// use serde_json::json;
///
/// # async fn example() {
/// let pressure = Pressure::new(
///     PressureConfig::default().template_field("feed", "prices"),
///     pipeline::from_fn(|| Ok::<_, std::io::Error>(json!({"price": 10}))),
/// );
///
/// // hand connections to `pressure.add(..)` from the accept layer
///
/// pressure.stop().await;
/// # }
/// ```
pub struct Pressure {
    config: PressureConfig,
    upstream: Arc<dyn Upstream>,
    registry: Arc<ConnectionRegistry>,
    last_known: Arc<LastKnownState>,
    template: Arc<ArcSwap<WrapperTemplate>>,
    stats: Arc<PipelineStats>,
    running: AtomicBool,
    ever_started: AtomicBool,
    workers: Mutex<Option<Workers>>,
}

impl Pressure {
    /// Create a broadcaster reading from `upstream`
    ///
    /// Workers are spawned right away unless `config.start` is false.
    ///
    /// # Panics
    ///
    /// When `config.start` is true this must be called from within a tokio
    /// runtime, like `tokio::spawn`.
    pub fn new(config: PressureConfig, upstream: impl Upstream) -> Self {
        let last_known = Arc::new(LastKnownState::new());
        let mut pressure = Self {
            upstream: Arc::new(upstream),
            registry: Arc::new(
                ConnectionRegistry::new(Arc::clone(&last_known)).send_timeout(config.send_timeout),
            ),
            last_known,
            template: Arc::new(ArcSwap::from_pointee(config.wrapper_template.clone())),
            stats: Arc::new(PipelineStats::new()),
            running: AtomicBool::new(false),
            ever_started: AtomicBool::new(false),
            workers: Mutex::new(None),
            config,
        };

        if pressure.config.start {
            let workers = pressure.spawn_workers();
            *pressure.workers.get_mut() = Some(workers);
        }

        pressure
    }

    /// Start the workers, stopping any that are already running
    pub async fn start(&self) {
        let mut workers = self.workers.lock().await;
        if let Some(previous) = workers.take() {
            self.running.store(false, Ordering::SeqCst);
            self.shutdown(previous).await;
        }
        *workers = Some(self.spawn_workers());
    }

    /// Stop the workers and wait for them to exit
    ///
    /// Each worker gets `stop_grace_period` to finish its current cycle before
    /// it is aborted. Once this returns no further sends will be made.
    pub async fn stop(&self) {
        let mut workers = self.workers.lock().await;
        self.running.store(false, Ordering::SeqCst);
        if let Some(previous) = workers.take() {
            self.shutdown(previous).await;
            tracing::info!("Broadcaster stopped");
        }
    }

    /// Whether the workers are running
    pub fn running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Current lifecycle state
    pub fn state(&self) -> PipelineState {
        if self.running() {
            PipelineState::Running
        } else if self.ever_started.load(Ordering::SeqCst) {
            PipelineState::Stopped
        } else {
            PipelineState::Idle
        }
    }

    /// Register a downstream connection; see [`ConnectionRegistry::add`]
    pub async fn add(&self, handle: ConnectionHandle) -> bool {
        self.registry.add(handle).await
    }

    /// Unregister a downstream connection; see [`ConnectionRegistry::remove`]
    pub async fn remove(&self, handle: &ConnectionHandle) -> Option<ConnectionHandle> {
        self.registry.remove(handle).await
    }

    /// Currently registered connections
    pub async fn connections(&self) -> ConnectionSnapshot {
        self.registry.snapshot().await
    }

    /// Number of registered connections
    pub async fn connection_count(&self) -> usize {
        self.registry.len().await
    }

    /// Shared registry, for accept layers that outlive a borrow of `self`
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Most recent envelope, if any change has been seen
    pub fn last_known(&self) -> Option<Arc<Envelope>> {
        self.last_known.load()
    }

    /// Template merged into envelopes
    pub fn wrapper_template(&self) -> Arc<WrapperTemplate> {
        self.template.load_full()
    }

    /// Replace the template; applies from the next detected change
    pub fn set_wrapper_template(&self, template: WrapperTemplate) {
        self.template.store(Arc::new(template));
    }

    /// Configuration this broadcaster was built with
    pub fn config(&self) -> &PressureConfig {
        &self.config
    }

    /// Pipeline counters
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    fn spawn_workers(&self) -> Workers {
        let (tx, rx) = queue::channel(self.config.queue_capacity);
        let cancel = CancellationToken::new();

        let poll = PollWorker::new(
            Arc::clone(&self.upstream),
            tx,
            Arc::clone(&self.last_known),
            Arc::clone(&self.template),
            Arc::clone(&self.stats),
        )
        .no_wrap(self.config.no_wrap)
        .delay(self.config.read_worker_delay);

        let broadcast = BroadcastWorker::new(rx, Arc::clone(&self.registry), Arc::clone(&self.stats))
            .delay(self.config.broadcast_worker_delay);

        self.running.store(true, Ordering::SeqCst);
        self.ever_started.store(true, Ordering::SeqCst);

        tracing::info!(
            no_wrap = self.config.no_wrap,
            read_delay = ?self.config.read_worker_delay,
            broadcast_delay = ?self.config.broadcast_worker_delay,
            "Broadcaster started"
        );

        Workers {
            broadcast: tokio::spawn(broadcast.run(cancel.clone())),
            poll: tokio::spawn(poll.run(cancel.clone())),
            cancel,
        }
    }

    async fn shutdown(&self, workers: Workers) {
        let grace = self.config.stop_grace_period;
        workers.cancel.cancel();

        tokio::join!(
            join_with_grace("poll", workers.poll, grace),
            join_with_grace("broadcast", workers.broadcast, grace),
        );
    }
}

impl Drop for Pressure {
    fn drop(&mut self) {
        if let Some(workers) = self.workers.get_mut().take() {
            workers.cancel.cancel();
            workers.poll.abort();
            workers.broadcast.abort();
        }
    }
}

/// Wait for a worker, aborting it if it outlives the grace period
async fn join_with_grace(name: &'static str, mut handle: JoinHandle<()>, grace: Duration) {
    match tokio::time::timeout(grace, &mut handle).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::warn!(worker = name, error = %e, "Worker task failed");
        }
        Err(_) => {
            tracing::warn!(
                worker = name,
                grace = ?grace,
                "Worker did not stop in time, aborting"
            );
            handle.abort();
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    tracing::warn!(worker = name, error = %e, "Worker task failed");
                }
            }
        }
    }
}
