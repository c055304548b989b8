use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Counters for the timeout enforcer, shared by its sweeps
#[derive(Debug, Clone, Default)]
pub struct EnforcerMetrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug, Default)]
struct MetricsInner {
    sweeps_run: AtomicU64,
    sweeps_contended: AtomicU64,
    sweeps_skipped: AtomicU64,
    rounds_resolved: AtomicU64,
    round_failures: AtomicU64,
    warnings_sent: AtomicU64,
    total_sweep_time_ms: AtomicU64,
}

impl EnforcerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sweep that held the lock and ran to the end
    pub fn record_sweep(&self, duration_ms: u64) {
        self.inner.sweeps_run.fetch_add(1, Ordering::Relaxed);
        self.inner
            .total_sweep_time_ms
            .fetch_add(duration_ms, Ordering::Relaxed);
        tracing::trace!(duration_ms, "recorded sweep");
    }

    /// Record a sweep that found the lock taken
    pub fn record_contended(&self) {
        self.inner.sweeps_contended.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a scheduled sweep skipped because another instance ran it recently
    pub fn record_skipped(&self) {
        self.inner.sweeps_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_resolved(&self, count: u64) {
        self.inner
            .rounds_resolved
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_failures(&self, count: u64) {
        self.inner.round_failures.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_warnings(&self, count: u64) {
        self.inner.warnings_sent.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> EnforcerSnapshot {
        EnforcerSnapshot {
            sweeps_run: self.inner.sweeps_run.load(Ordering::Relaxed),
            sweeps_contended: self.inner.sweeps_contended.load(Ordering::Relaxed),
            sweeps_skipped: self.inner.sweeps_skipped.load(Ordering::Relaxed),
            rounds_resolved: self.inner.rounds_resolved.load(Ordering::Relaxed),
            round_failures: self.inner.round_failures.load(Ordering::Relaxed),
            warnings_sent: self.inner.warnings_sent.load(Ordering::Relaxed),
            total_sweep_time_ms: self.inner.total_sweep_time_ms.load(Ordering::Relaxed),
        }
    }

    pub fn log_metrics(&self) {
        let s = self.snapshot();
        tracing::info!(
            sweeps_run = s.sweeps_run,
            sweeps_contended = s.sweeps_contended,
            sweeps_skipped = s.sweeps_skipped,
            rounds_resolved = s.rounds_resolved,
            round_failures = s.round_failures,
            warnings_sent = s.warnings_sent,
            avg_sweep_time_ms = s.average_sweep_time_ms(),
            "enforcer metrics"
        );
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct EnforcerSnapshot {
    pub sweeps_run: u64,
    pub sweeps_contended: u64,
    pub sweeps_skipped: u64,
    pub rounds_resolved: u64,
    pub round_failures: u64,
    pub warnings_sent: u64,
    pub total_sweep_time_ms: u64,
}

impl EnforcerSnapshot {
    pub fn average_sweep_time_ms(&self) -> u64 {
        if self.sweeps_run > 0 {
            self.total_sweep_time_ms / self.sweeps_run
        } else {
            0
        }
    }
}

/// Times one sweep; the duration is recorded by [`SweepTimer::finish`]
pub struct SweepTimer {
    start: Instant,
    metrics: EnforcerMetrics,
}

impl SweepTimer {
    pub fn new(metrics: EnforcerMetrics) -> Self {
        Self {
            start: Instant::now(),
            metrics,
        }
    }

    pub fn finish(self) {
        let duration = u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.metrics.record_sweep(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_zero() {
        let snapshot = EnforcerMetrics::new().snapshot();
        assert_eq!(snapshot.sweeps_run, 0);
        assert_eq!(snapshot.round_failures, 0);
        assert_eq!(snapshot.average_sweep_time_ms(), 0);
    }

    #[test]
    fn counters_accumulate() {
        let metrics = EnforcerMetrics::new();
        metrics.record_sweep(10);
        metrics.record_sweep(30);
        metrics.record_contended();
        metrics.record_resolved(3);
        metrics.record_failures(1);
        metrics.record_warnings(2);

        let s = metrics.snapshot();
        assert_eq!(s.sweeps_run, 2);
        assert_eq!(s.sweeps_contended, 1);
        assert_eq!(s.rounds_resolved, 3);
        assert_eq!(s.round_failures, 1);
        assert_eq!(s.warnings_sent, 2);
        assert_eq!(s.average_sweep_time_ms(), 20);
    }

    #[test]
    fn clones_share_counters() {
        let metrics = EnforcerMetrics::new();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let m = metrics.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        m.record_resolved(1);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(metrics.snapshot().rounds_resolved, 200);
    }

    #[test]
    fn timer_records_a_sweep() {
        let metrics = EnforcerMetrics::new();
        SweepTimer::new(metrics.clone()).finish();
        assert_eq!(metrics.snapshot().sweeps_run, 1);
    }
}
