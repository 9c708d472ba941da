//! Watermark deduplication and ordered dispatch of fetched log entries.

use std::sync::Arc;
use tracing::{debug, instrument};

use crate::enforcement::TeamEnforcementEngine;
use crate::log_entry::{LogEntry, LogKind, LogStream};
use crate::metrics::WardenMetrics;
use crate::notify::Notifier;
use crate::watermark::Watermark;

/// Counts from one [`EventDispatcher::dispatch`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Entries newer than the watermark, in the order they were handled.
    pub dispatched: usize,
    /// Entries at or below the watermark.
    pub duplicates: usize,
    /// Join entries handed to the enforcement engine.
    pub enforced: usize,
}

/// Deduplicates fetched entries per stream and emits them exactly once, in
/// timestamp order.
///
/// Owned by the poller and driven by one cycle at a time, so the watermarks
/// need no synchronization.
pub struct EventDispatcher {
    notifier: Notifier,
    enforcement: Option<Arc<TeamEnforcementEngine>>,
    metrics: Arc<WardenMetrics>,
    join_leave: Watermark,
    kill: Watermark,
}

impl EventDispatcher {
    pub fn new(
        notifier: Notifier,
        enforcement: Option<Arc<TeamEnforcementEngine>>,
        metrics: Arc<WardenMetrics>,
    ) -> Self {
        Self {
            notifier,
            enforcement,
            metrics,
            join_leave: Watermark::unset(),
            kill: Watermark::unset(),
        }
    }

    pub fn watermark(&self, stream: LogStream) -> Watermark {
        match stream {
            LogStream::JoinLeave => self.join_leave,
            LogStream::Kill => self.kill,
        }
    }

    /// Seed a stream's watermark (e.g. to skip history on first start).
    pub fn set_watermark(&mut self, stream: LogStream, watermark: Watermark) {
        *self.watermark_mut(stream) = watermark;
    }

    fn watermark_mut(&mut self, stream: LogStream) -> &mut Watermark {
        match stream {
            LogStream::JoinLeave => &mut self.join_leave,
            LogStream::Kill => &mut self.kill,
        }
    }

    /// Dispatch a batch fetched from `stream`.
    ///
    /// Entries are filtered against the watermark as it stood when the call
    /// began, so entries sharing a timestamp within one batch are all
    /// dispatched, in their source order. The watermark for each entry is
    /// advanced before its notification is sent; a crash in between loses that
    /// notification rather than repeating it. Join entries are enforced before
    /// the next entry is handled.
    #[instrument(skip_all, fields(stream = %stream, fetched = entries.len()))]
    pub async fn dispatch(&mut self, stream: LogStream, mut entries: Vec<LogEntry>) -> DispatchReport {
        // Stable: equal timestamps keep their source order.
        entries.sort_by_key(|entry| entry.timestamp);

        let before = self.watermark(stream);
        let mut report = DispatchReport::default();
        for entry in entries {
            if !before.admits(entry.timestamp) {
                report.duplicates += 1;
                continue;
            }
            self.watermark_mut(stream).advance(entry.timestamp);
            report.dispatched += 1;

            self.notifier
                .log_event(entry.kind, &entry.notification_text())
                .await;

            if entry.kind == LogKind::Join {
                if let Some(engine) = &self.enforcement {
                    engine.enforce(&entry.actor_name, &entry.actor_id).await;
                    report.enforced += 1;
                }
            }
        }

        self.metrics
            .events_dispatched
            .with_label_values(&[&stream.to_string()])
            .inc_by(report.dispatched as u64);
        debug!(
            dispatched = report.dispatched,
            duplicates = report.duplicates,
            watermark = ?self.watermark(stream).get(),
            "dispatched log batch"
        );
        report
    }
}
