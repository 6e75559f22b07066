use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

use serde::Serialize;

pub struct Metrics {
    // Counters
    total_requests: AtomicUsize,
    successful_requests: AtomicUsize,
    failed_requests: AtomicUsize,

    // Timing (in microseconds)
    total_extract_time_us: AtomicU64,
    total_ask_time_us: AtomicU64,

    // Pipeline counts
    documents_ingested: AtomicUsize,
    nodes_written: AtomicUsize,
    relationships_written: AtomicUsize,
    questions_answered: AtomicUsize,
    answer_cache_hits: AtomicUsize,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            total_requests: AtomicUsize::new(0),
            successful_requests: AtomicUsize::new(0),
            failed_requests: AtomicUsize::new(0),
            total_extract_time_us: AtomicU64::new(0),
            total_ask_time_us: AtomicU64::new(0),
            documents_ingested: AtomicUsize::new(0),
            nodes_written: AtomicUsize::new(0),
            relationships_written: AtomicUsize::new(0),
            questions_answered: AtomicUsize::new(0),
            answer_cache_hits: AtomicUsize::new(0),
        })
    }

    pub fn record_request(&self, success: bool) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successful_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_ingest(
        &self,
        duration: std::time::Duration,
        nodes_written: usize,
        relationships_written: usize,
    ) {
        self.total_extract_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        self.documents_ingested.fetch_add(1, Ordering::Relaxed);
        self.nodes_written.fetch_add(nodes_written, Ordering::Relaxed);
        self.relationships_written
            .fetch_add(relationships_written, Ordering::Relaxed);
    }

    pub fn record_ask(&self, duration: std::time::Duration) {
        self.total_ask_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        self.questions_answered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.answer_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            avg_extract_time_ms: self.avg_time_ms(&self.total_extract_time_us, &self.documents_ingested),
            avg_ask_time_ms: self.avg_time_ms(&self.total_ask_time_us, &self.questions_answered),
            documents_ingested: self.documents_ingested.load(Ordering::Relaxed),
            nodes_written: self.nodes_written.load(Ordering::Relaxed),
            relationships_written: self.relationships_written.load(Ordering::Relaxed),
            questions_answered: self.questions_answered.load(Ordering::Relaxed),
            answer_cache_hits: self.answer_cache_hits.load(Ordering::Relaxed),
        }
    }

    fn avg_time_ms(&self, total_us: &AtomicU64, count: &AtomicUsize) -> f64 {
        let total = total_us.load(Ordering::Relaxed) as f64;
        let cnt = count.load(Ordering::Relaxed) as f64;
        if cnt > 0.0 {
            total / cnt / 1000.0 // Convert to ms
        } else {
            0.0
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: usize,
    pub successful_requests: usize,
    pub failed_requests: usize,
    pub avg_extract_time_ms: f64,
    pub avg_ask_time_ms: f64,
    pub documents_ingested: usize,
    pub nodes_written: usize,
    pub relationships_written: usize,
    pub questions_answered: usize,
    pub answer_cache_hits: usize,
}

pub struct TimedOperation {
    start: Instant,
}

impl TimedOperation {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn snapshot_reflects_recorded_work() {
        let metrics = Metrics::new();
        metrics.record_request(true);
        metrics.record_request(false);
        metrics.record_ingest(Duration::from_millis(20), 5, 3);
        metrics.record_ingest(Duration::from_millis(40), 2, 1);
        metrics.record_ask(Duration::from_millis(10));
        metrics.record_cache_hit();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_requests, 2);
        assert_eq!(snapshot.successful_requests, 1);
        assert_eq!(snapshot.failed_requests, 1);
        assert_eq!(snapshot.documents_ingested, 2);
        assert_eq!(snapshot.nodes_written, 7);
        assert_eq!(snapshot.relationships_written, 4);
        assert_eq!(snapshot.answer_cache_hits, 1);
        assert!((snapshot.avg_extract_time_ms - 30.0).abs() < 1.0);
        assert!((snapshot.avg_ask_time_ms - 10.0).abs() < 1.0);
    }

    #[test]
    fn averages_are_zero_before_any_work() {
        let metrics = Metrics::new();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.avg_extract_time_ms, 0.0);
        assert_eq!(snapshot.avg_ask_time_ms, 0.0);
    }
}
