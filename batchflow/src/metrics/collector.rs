//! Concurrent per-operator metrics collection.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Sentinel for "no duration recorded yet".
const NO_MIN: u64 = u64::MAX;

fn duration_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

/// Live counters for one operator.
///
/// All updates are lock-free; min and max are maintained with
/// compare-exchange loops so concurrent writers never lose an update.
#[derive(Debug)]
pub struct OperatorMetrics {
    name: String,
    success_count: AtomicU64,
    failure_count: AtomicU64,
    total_nanos: AtomicU64,
    min_nanos: AtomicU64,
    max_nanos: AtomicU64,
}

impl OperatorMetrics {
    /// Creates empty metrics for an operator.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            success_count: AtomicU64::new(0),
            failure_count: AtomicU64::new(0),
            total_nanos: AtomicU64::new(0),
            min_nanos: AtomicU64::new(NO_MIN),
            max_nanos: AtomicU64::new(0),
        }
    }

    /// Returns the operator name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Records a successful call.
    pub fn record_success(&self, duration: Duration) {
        self.record_duration(duration);
        self.success_count.fetch_add(1, Ordering::Release);
    }

    /// Records a failed call.
    pub fn record_failure(&self, duration: Duration) {
        self.record_duration(duration);
        self.failure_count.fetch_add(1, Ordering::Release);
    }

    fn record_duration(&self, duration: Duration) {
        let nanos = duration_nanos(duration);
        self.total_nanos.fetch_add(nanos, Ordering::Relaxed);
        self.update_min(nanos);
        self.update_max(nanos);
    }

    fn update_min(&self, nanos: u64) {
        let mut current = self.min_nanos.load(Ordering::Relaxed);
        while nanos < current {
            match self.min_nanos.compare_exchange_weak(
                current,
                nanos,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
    }

    fn update_max(&self, nanos: u64) {
        let mut current = self.max_nanos.load(Ordering::Relaxed);
        while nanos > current {
            match self.max_nanos.compare_exchange_weak(
                current,
                nanos,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
    }

    /// Clears all counters.
    pub fn reset(&self) {
        self.success_count.store(0, Ordering::Relaxed);
        self.failure_count.store(0, Ordering::Relaxed);
        self.total_nanos.store(0, Ordering::Relaxed);
        self.min_nanos.store(NO_MIN, Ordering::Relaxed);
        self.max_nanos.store(0, Ordering::Relaxed);
    }

    /// Returns a copy of the counters.
    ///
    /// Fields are read one by one, so a snapshot taken during concurrent
    /// writes is not atomic across fields. Durations are recorded before the
    /// count is published and counts are read first: every counted call's
    /// duration is included, and durations of calls still being recorded may
    /// be too.
    #[must_use]
    pub fn snapshot(&self) -> OperatorMetricsSnapshot {
        let success_count = self.success_count.load(Ordering::Acquire);
        let failure_count = self.failure_count.load(Ordering::Acquire);
        let min = self.min_nanos.load(Ordering::Relaxed);

        OperatorMetricsSnapshot {
            name: self.name.clone(),
            success_count,
            failure_count,
            total_count: success_count + failure_count,
            total_duration: Duration::from_nanos(self.total_nanos.load(Ordering::Relaxed)),
            min_duration: Duration::from_nanos(if min == NO_MIN { 0 } else { min }),
            max_duration: Duration::from_nanos(self.max_nanos.load(Ordering::Relaxed)),
        }
    }
}

/// A copy of one operator's counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorMetricsSnapshot {
    /// Operator name.
    pub name: String,
    /// Number of successful calls.
    pub success_count: u64,
    /// Number of failed calls.
    pub failure_count: u64,
    /// Always `success_count + failure_count`.
    pub total_count: u64,
    /// Sum of all recorded durations.
    pub total_duration: Duration,
    /// Shortest recorded duration, zero if none.
    pub min_duration: Duration,
    /// Longest recorded duration, zero if none.
    pub max_duration: Duration,
}

impl OperatorMetricsSnapshot {
    /// Returns the mean call duration, zero if no calls were recorded.
    #[must_use]
    pub fn avg_duration(&self) -> Duration {
        if self.total_count == 0 {
            return Duration::ZERO;
        }
        let avg = self.total_duration.as_nanos() / u128::from(self.total_count);
        Duration::from_nanos(u64::try_from(avg).unwrap_or(u64::MAX))
    }

    /// Returns the fraction of successful calls in `[0, 1]`, zero if none.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total_count == 0 {
            return 0.0;
        }
        self.success_count as f64 / self.total_count as f64
    }
}

/// Thread-safe aggregator of per-operator call statistics.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    metrics: DashMap<String, Arc<OperatorMetrics>>,
}

impl MetricsCollector {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the live metrics for `name`, creating them on first use.
    pub fn operator(&self, name: &str) -> Arc<OperatorMetrics> {
        if let Some(existing) = self.metrics.get(name) {
            return existing.value().clone();
        }
        self.metrics
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(OperatorMetrics::new(name)))
            .value()
            .clone()
    }

    /// Records a successful call of `name`.
    pub fn record_success(&self, name: &str, duration: Duration) {
        self.operator(name).record_success(duration);
    }

    /// Records a failed call of `name`.
    pub fn record_failure(&self, name: &str, duration: Duration) {
        self.operator(name).record_failure(duration);
    }

    /// Returns a snapshot of one operator's counters.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<OperatorMetricsSnapshot> {
        self.metrics.get(name).map(|m| m.snapshot())
    }

    /// Returns snapshots of every operator, sorted by name.
    #[must_use]
    pub fn get_all_metrics(&self) -> Vec<OperatorMetricsSnapshot> {
        let mut all: Vec<_> = self.metrics.iter().map(|m| m.snapshot()).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Returns the number of operators with recorded metrics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    /// Returns true if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Clears all per-operator state.
    pub fn reset(&self) {
        self.metrics.clear();
    }

    /// Renders a human-readable report, one line per operator.
    #[must_use]
    pub fn report(&self) -> String {
        let mut out = String::from("Operator metrics:");
        for m in self.get_all_metrics() {
            let _ = write!(
                out,
                "\n  {}: invocations={} success={} failure={} success_rate={:.2}% \
                 avg={:?} min={:?} max={:?} total={:?}",
                m.name,
                m.total_count,
                m.success_count,
                m.failure_count,
                m.success_rate() * 100.0,
                m.avg_duration(),
                m.min_duration,
                m.max_duration,
                m.total_duration,
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_operator_reads_zero() {
        let m = OperatorMetrics::new("reader");
        let snap = m.snapshot();

        assert_eq!(snap.total_count, 0);
        assert_eq!(snap.min_duration, Duration::ZERO);
        assert_eq!(snap.max_duration, Duration::ZERO);
        assert_eq!(snap.avg_duration(), Duration::ZERO);
        assert_eq!(snap.success_rate(), 0.0);
    }

    #[test]
    fn test_record_updates_counters() {
        let collector = MetricsCollector::new();
        collector.record_success("reader", Duration::from_millis(10));
        collector.record_success("reader", Duration::from_millis(30));
        collector.record_failure("reader", Duration::from_millis(20));

        let snap = collector.get("reader").unwrap();
        assert_eq!(
            snap,
            OperatorMetricsSnapshot {
                name: "reader".to_string(),
                success_count: 2,
                failure_count: 1,
                total_count: 3,
                total_duration: Duration::from_millis(60),
                min_duration: Duration::from_millis(10),
                max_duration: Duration::from_millis(30),
            }
        );
        assert_eq!(snap.avg_duration(), Duration::from_millis(20));
        assert!((snap.success_rate() - 2.0 / 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let collector = MetricsCollector::new();
        collector.record_success("writer", Duration::from_millis(1));

        let before = collector.get_all_metrics();
        collector.record_success("writer", Duration::from_millis(1));

        assert_eq!(before[0].success_count, 1);
        assert_eq!(collector.get("writer").unwrap().success_count, 2);
    }

    #[test]
    fn test_reset_clears_everything() {
        let collector = MetricsCollector::new();
        collector.record_success("a", Duration::from_millis(1));
        collector.record_failure("b", Duration::from_millis(1));
        assert_eq!(collector.len(), 2);

        collector.reset();
        assert!(collector.is_empty());
        assert!(collector.get("a").is_none());
    }

    #[test]
    fn test_operator_metrics_reset() {
        let m = OperatorMetrics::new("a");
        m.record_failure(Duration::from_millis(5));
        m.reset();

        let snap = m.snapshot();
        assert_eq!(snap.failure_count, 0);
        assert_eq!(snap.min_duration, Duration::ZERO);
    }

    #[test]
    fn test_concurrent_writers_lose_nothing() {
        let collector = Arc::new(MetricsCollector::new());
        let threads = 8u64;
        let per_thread = 500u64;

        let handles: Vec<_> = (0..threads)
            .map(|t| {
                let collector = collector.clone();
                std::thread::spawn(move || {
                    for i in 0..per_thread {
                        let d = Duration::from_nanos(1 + t * per_thread + i);
                        if i % 3 == 0 {
                            collector.record_failure("shared", d);
                        } else {
                            collector.record_success("shared", d);
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let n = threads * per_thread;
        let snap = collector.get("shared").unwrap();
        assert_eq!(snap.total_count, n);
        assert_eq!(snap.success_count + snap.failure_count, snap.total_count);
        assert_eq!(snap.total_duration, Duration::from_nanos(n * (n + 1) / 2));
        assert_eq!(snap.min_duration, Duration::from_nanos(1));
        assert_eq!(snap.max_duration, Duration::from_nanos(n));
    }

    #[test]
    fn test_snapshot_during_writes_covers_counted_calls() {
        let collector = Arc::new(MetricsCollector::new());
        let call = Duration::from_millis(1);
        collector.record_success("shared", call);
        let done = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let writers: Vec<_> = (0..4)
            .map(|_| {
                let collector = collector.clone();
                std::thread::spawn(move || {
                    for i in 0..2_000 {
                        if i % 2 == 0 {
                            collector.record_success("shared", call);
                        } else {
                            collector.record_failure("shared", call);
                        }
                    }
                })
            })
            .collect();

        let reader = {
            let collector = collector.clone();
            let done = done.clone();
            std::thread::spawn(move || {
                let mut reads = 0u32;
                while !done.load(Ordering::Acquire) || reads == 0 {
                    let snap = collector.get("shared").unwrap();
                    let counted = u32::try_from(snap.total_count).unwrap();
                    assert!(snap.total_duration >= call * counted);
                    assert_eq!(snap.min_duration, call);
                    assert_eq!(snap.max_duration, call);
                    reads += 1;
                }
            })
        };

        for w in writers {
            w.join().unwrap();
        }
        done.store(true, Ordering::Release);
        reader.join().unwrap();

        let snap = collector.get("shared").unwrap();
        assert_eq!(snap.total_count, 8_001);
        assert_eq!(snap.total_duration, call * 8_001);
    }

    #[test]
    fn test_report_lists_each_operator() {
        let collector = MetricsCollector::new();
        collector.record_success("reader", Duration::from_millis(2));
        collector.record_failure("writer", Duration::from_millis(4));

        let report = collector.report();
        assert!(report.starts_with("Operator metrics:"));
        assert!(report.contains("reader: invocations=1 success=1 failure=0 success_rate=100.00%"));
        assert!(report.contains("writer: invocations=1 success=0 failure=1 success_rate=0.00%"));
    }
}
