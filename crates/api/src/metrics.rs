use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

pub struct Metrics {
    // Counters
    total_requests: AtomicUsize,
    successful_requests: AtomicUsize,
    failed_requests: AtomicUsize,

    // Timing (in microseconds)
    total_ingest_time_us: AtomicU64,
    total_store_time_us: AtomicU64,

    // Counts
    documents_ingested: AtomicUsize,
    chunks_produced: AtomicUsize,
    blobs_stored: AtomicUsize,
    bytes_stored: AtomicU64,
    storage_failures: AtomicUsize,
    index_jobs_started: AtomicUsize,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            total_requests: AtomicUsize::new(0),
            successful_requests: AtomicUsize::new(0),
            failed_requests: AtomicUsize::new(0),
            total_ingest_time_us: AtomicU64::new(0),
            total_store_time_us: AtomicU64::new(0),
            documents_ingested: AtomicUsize::new(0),
            chunks_produced: AtomicUsize::new(0),
            blobs_stored: AtomicUsize::new(0),
            bytes_stored: AtomicU64::new(0),
            storage_failures: AtomicUsize::new(0),
            index_jobs_started: AtomicUsize::new(0),
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

    pub fn record_ingest(&self, duration: Duration, chunks: usize) {
        self.total_ingest_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        self.documents_ingested.fetch_add(1, Ordering::Relaxed);
        self.chunks_produced.fetch_add(chunks, Ordering::Relaxed);
    }

    pub fn record_store(&self, duration: Duration, bytes: usize) {
        self.total_store_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        self.blobs_stored.fetch_add(1, Ordering::Relaxed);
        self.bytes_stored.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_storage_failure(&self) {
        self.storage_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_index_job(&self) {
        self.index_jobs_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            avg_ingest_time_ms: avg_time_ms(&self.total_ingest_time_us, &self.documents_ingested),
            avg_store_time_ms: avg_time_ms(&self.total_store_time_us, &self.blobs_stored),
            documents_ingested: self.documents_ingested.load(Ordering::Relaxed),
            chunks_produced: self.chunks_produced.load(Ordering::Relaxed),
            blobs_stored: self.blobs_stored.load(Ordering::Relaxed),
            bytes_stored: self.bytes_stored.load(Ordering::Relaxed),
            storage_failures: self.storage_failures.load(Ordering::Relaxed),
            index_jobs_started: self.index_jobs_started.load(Ordering::Relaxed),
        }
    }
}

fn avg_time_ms(total_us: &AtomicU64, count: &AtomicUsize) -> f64 {
    let total = total_us.load(Ordering::Relaxed) as f64;
    let cnt = count.load(Ordering::Relaxed) as f64;
    if cnt > 0.0 {
        total / cnt / 1000.0 // Convert to ms
    } else {
        0.0
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: usize,
    pub successful_requests: usize,
    pub failed_requests: usize,
    pub avg_ingest_time_ms: f64,
    pub avg_store_time_ms: f64,
    pub documents_ingested: usize,
    pub chunks_produced: usize,
    pub blobs_stored: usize,
    pub bytes_stored: u64,
    pub storage_failures: usize,
    pub index_jobs_started: usize,
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

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
