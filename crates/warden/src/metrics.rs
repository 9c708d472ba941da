use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

/// Relay and enforcement prometheus metrics.
pub struct WardenMetrics {
    /// Completed poll cycles.
    pub poll_cycles: IntCounter,
    /// Failed log fetches, by stream.
    pub fetch_failures: IntCounterVec,
    /// Entries dispatched past the watermark, by stream.
    pub events_dispatched: IntCounterVec,
    /// Policy violations detected.
    pub violations: IntCounter,
    /// Corrective commands that failed after retry.
    pub command_failures: IntCounter,
}

impl WardenMetrics {
    /// Create metrics and register them with the given prometheus registry.
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let metrics = Self::build()?;
        registry.register(Box::new(metrics.poll_cycles.clone()))?;
        registry.register(Box::new(metrics.fetch_failures.clone()))?;
        registry.register(Box::new(metrics.events_dispatched.clone()))?;
        registry.register(Box::new(metrics.violations.clone()))?;
        registry.register(Box::new(metrics.command_failures.clone()))?;
        Ok(metrics)
    }

    /// Create metrics without registering (for testing).
    pub fn unregistered() -> Self {
        Self::build().expect("valid metric definitions")
    }

    fn build() -> Result<Self, prometheus::Error> {
        Ok(Self {
            poll_cycles: IntCounter::with_opts(Opts::new(
                "warden_poll_cycles_total",
                "Completed log poll cycles",
            ))?,
            fetch_failures: IntCounterVec::new(
                Opts::new("warden_fetch_failures_total", "Failed log fetches"),
                &["stream"],
            )?,
            events_dispatched: IntCounterVec::new(
                Opts::new("warden_events_dispatched_total", "Log entries dispatched"),
                &["stream"],
            )?,
            violations: IntCounter::with_opts(Opts::new(
                "warden_policy_violations_total",
                "Team policy violations detected",
            ))?,
            command_failures: IntCounter::with_opts(Opts::new(
                "warden_command_failures_total",
                "Corrective commands that failed",
            ))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_metrics_work() {
        let m = WardenMetrics::unregistered();
        m.violations.inc();
        assert_eq!(m.violations.get(), 1);
    }

    #[test]
    fn registered_metrics_work() {
        let r = Registry::new();
        let m = WardenMetrics::new(&r).unwrap();
        m.fetch_failures.with_label_values(&["kill"]).inc();
        assert_eq!(m.fetch_failures.with_label_values(&["kill"]).get(), 1);
        assert!(!r.gather().is_empty());
    }
}
