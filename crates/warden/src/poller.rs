//! Fixed-interval log polling.
//!
//! The poller is single-flight: the timer for cycle N+1 is armed only after
//! cycle N, including every enforcement it triggered, has returned. This is
//! what keeps the dispatcher's watermarks race-free.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::dispatcher::{DispatchReport, EventDispatcher};
use crate::error::WardenError;
use crate::game_server::GameServerClient;
use crate::log_entry::{LogEntry, LogStream};
use crate::metrics::WardenMetrics;

/// Latch that opens once the surrounding bot session is established.
///
/// Cloned handles share the same latch; opening is permanent.
#[derive(Clone)]
pub struct SessionGate {
    tx: Arc<watch::Sender<bool>>,
}

impl SessionGate {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn open(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_open(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`open`](Self::open) has been called, immediately if it already was.
    pub async fn wait_open(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so the channel cannot close here.
        let _ = rx.wait_for(|open| *open).await;
    }
}

impl Default for SessionGate {
    fn default() -> Self {
        Self::new()
    }
}

/// What happened to one stream in one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    Dispatched(DispatchReport),
    Empty,
    /// Fetch failed; the watermark was left untouched.
    Failed,
}

/// Outcome of one poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub join_leave: StreamOutcome,
    pub kill: StreamOutcome,
}

/// Drives the fetch -> dispatch cycle on a fixed period.
pub struct LogPoller {
    game: Arc<dyn GameServerClient>,
    dispatcher: EventDispatcher,
    interval: Duration,
    gate: SessionGate,
    cancel: CancellationToken,
    metrics: Arc<WardenMetrics>,
}

impl LogPoller {
    pub fn new(
        game: Arc<dyn GameServerClient>,
        dispatcher: EventDispatcher,
        interval: Duration,
        gate: SessionGate,
        cancel: CancellationToken,
        metrics: Arc<WardenMetrics>,
    ) -> Self {
        Self {
            game,
            dispatcher,
            interval,
            gate,
            cancel,
            metrics,
        }
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    /// Run one cycle: fetch both streams, then dispatch each non-empty batch.
    ///
    /// A failed fetch on one stream never affects the other.
    #[instrument(skip(self))]
    pub async fn run_cycle(&mut self) -> CycleReport {
        let (join_leave, kill) = tokio::join!(
            self.game.fetch_log(LogStream::JoinLeave),
            self.game.fetch_log(LogStream::Kill),
        );
        let join_leave = self.handle_fetch(LogStream::JoinLeave, join_leave).await;
        let kill = self.handle_fetch(LogStream::Kill, kill).await;
        self.metrics.poll_cycles.inc();
        CycleReport { join_leave, kill }
    }

    async fn handle_fetch(
        &mut self,
        stream: LogStream,
        fetched: Result<Vec<LogEntry>, WardenError>,
    ) -> StreamOutcome {
        match fetched {
            Ok(entries) if entries.is_empty() => StreamOutcome::Empty,
            Ok(entries) => StreamOutcome::Dispatched(self.dispatcher.dispatch(stream, entries).await),
            Err(e) => {
                self.metrics
                    .fetch_failures
                    .with_label_values(&[&stream.to_string()])
                    .inc();
                warn!(stream = %stream, error = %e, "log fetch failed, skipping stream this cycle");
                StreamOutcome::Failed
            }
        }
    }

    /// Run until cancelled. Blocks until the session gate opens, then runs
    /// the first cycle immediately and one cycle per interval thereafter.
    ///
    /// Cancellation is observed only between cycles: an in-flight cycle
    /// always runs to completion.
    pub async fn run(mut self) -> EventDispatcher {
        let cancelled = tokio::select! {
            _ = self.cancel.cancelled() => true,
            _ = self.gate.wait_open() => false,
        };
        if cancelled {
            debug!("poller cancelled before session was ready");
            return self.dispatcher;
        }
        info!(interval = ?self.interval, "session ready, starting log polling");

        loop {
            self.run_cycle().await;
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        info!("log polling stopped");
        self.dispatcher
    }

    /// Spawn [`run`](Self::run) on the runtime.
    pub fn spawn(self) -> PollerHandle {
        let cancel = self.cancel.clone();
        let handle = tokio::spawn(self.run());
        PollerHandle { cancel, handle }
    }
}

/// Handle to a spawned poller.
pub struct PollerHandle {
    cancel: CancellationToken,
    handle: JoinHandle<EventDispatcher>,
}

impl PollerHandle {
    /// Stop scheduling cycles and wait up to `grace` for an in-flight cycle.
    ///
    /// Returns `false` if the cycle had to be abandoned.
    pub async fn shutdown(self, grace: Duration) -> bool {
        self.cancel.cancel();
        let mut handle = self.handle;
        match tokio::time::timeout(grace, &mut handle).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                warn!(error = %e, "poller task ended abnormally");
                true
            }
            Err(_) => {
                warn!(grace = ?grace, "in-flight poll cycle exceeded shutdown grace, abandoning");
                handle.abort();
                false
            }
        }
    }
}
