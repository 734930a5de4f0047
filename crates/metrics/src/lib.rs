use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Thread-safe counters for book merge activity.
#[derive(Debug)]
pub struct MergeMetrics {
    // Counters
    messages_received: AtomicU64,
    snapshots_applied: AtomicU64,
    updates_applied: AtomicU64,
    updates_dropped: AtomicU64,
    malformed_records: AtomicU64,
    parse_errors: AtomicU64,
    rejected_payloads: AtomicU64,

    // Timestamps
    inner: RwLock<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    start_time: Instant,
    last_applied_time: Option<Instant>,
    last_error_time: Option<Instant>,
}

impl Default for MergeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MergeMetrics {
    pub fn new() -> Self {
        Self {
            messages_received: AtomicU64::new(0),
            snapshots_applied: AtomicU64::new(0),
            updates_applied: AtomicU64::new(0),
            updates_dropped: AtomicU64::new(0),
            malformed_records: AtomicU64::new(0),
            parse_errors: AtomicU64::new(0),
            rejected_payloads: AtomicU64::new(0),
            inner: RwLock::new(MetricsInner {
                start_time: Instant::now(),
                last_applied_time: None,
                last_error_time: None,
            }),
        }
    }

    // --- Increment methods ---

    pub fn inc_messages_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_snapshots_applied(&self) {
        self.snapshots_applied.fetch_add(1, Ordering::Relaxed);
        self.inner.write().last_applied_time = Some(Instant::now());
    }

    pub fn inc_updates_applied(&self) {
        self.updates_applied.fetch_add(1, Ordering::Relaxed);
        self.inner.write().last_applied_time = Some(Instant::now());
    }

    pub fn inc_updates_dropped(&self) {
        self.updates_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_malformed_records(&self, count: u64) {
        if count == 0 {
            return;
        }
        self.malformed_records.fetch_add(count, Ordering::Relaxed);
        self.inner.write().last_error_time = Some(Instant::now());
    }

    pub fn inc_parse_errors(&self) {
        self.parse_errors.fetch_add(1, Ordering::Relaxed);
        self.inner.write().last_error_time = Some(Instant::now());
    }

    pub fn inc_rejected_payloads(&self) {
        self.rejected_payloads.fetch_add(1, Ordering::Relaxed);
        self.inner.write().last_error_time = Some(Instant::now());
    }

    // --- Getter methods ---

    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    pub fn snapshots_applied(&self) -> u64 {
        self.snapshots_applied.load(Ordering::Relaxed)
    }

    pub fn updates_applied(&self) -> u64 {
        self.updates_applied.load(Ordering::Relaxed)
    }

    pub fn updates_dropped(&self) -> u64 {
        self.updates_dropped.load(Ordering::Relaxed)
    }

    pub fn malformed_records(&self) -> u64 {
        self.malformed_records.load(Ordering::Relaxed)
    }

    pub fn parse_errors(&self) -> u64 {
        self.parse_errors.load(Ordering::Relaxed)
    }

    pub fn rejected_payloads(&self) -> u64 {
        self.rejected_payloads.load(Ordering::Relaxed)
    }

    pub fn uptime_secs(&self) -> f64 {
        self.inner.read().start_time.elapsed().as_secs_f64()
    }

    pub fn secs_since_last_applied(&self) -> Option<f64> {
        self.inner
            .read()
            .last_applied_time
            .map(|t| t.elapsed().as_secs_f64())
    }

    pub fn secs_since_last_error(&self) -> Option<f64> {
        self.inner
            .read()
            .last_error_time
            .map(|t| t.elapsed().as_secs_f64())
    }

    /// Snapshots plus updates applied per second since start.
    pub fn messages_per_second(&self) -> f64 {
        let uptime = self.uptime_secs();
        if uptime > 0.0 {
            (self.snapshots_applied() + self.updates_applied()) as f64 / uptime
        } else {
            0.0
        }
    }

    /// Generate a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_received: self.messages_received(),
            snapshots_applied: self.snapshots_applied(),
            updates_applied: self.updates_applied(),
            updates_dropped: self.updates_dropped(),
            malformed_records: self.malformed_records(),
            parse_errors: self.parse_errors(),
            rejected_payloads: self.rejected_payloads(),
            uptime_secs: self.uptime_secs(),
            messages_per_second: self.messages_per_second(),
            secs_since_last_applied: self.secs_since_last_applied(),
            secs_since_last_error: self.secs_since_last_error(),
        }
    }
}

/// A point-in-time snapshot of metrics.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub messages_received: u64,
    pub snapshots_applied: u64,
    pub updates_applied: u64,
    pub updates_dropped: u64,
    pub malformed_records: u64,
    pub parse_errors: u64,
    pub rejected_payloads: u64,
    pub uptime_secs: f64,
    pub messages_per_second: f64,
    pub secs_since_last_applied: Option<f64>,
    pub secs_since_last_error: Option<f64>,
}

/// Health status of the book feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Messages are being applied.
    Healthy,
    /// No message applied for a while.
    Degraded,
    /// The book has gone stale.
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "HEALTHY"),
            HealthStatus::Degraded => write!(f, "DEGRADED"),
            HealthStatus::Unhealthy => write!(f, "UNHEALTHY"),
        }
    }
}

impl MetricsSnapshot {
    /// Threshold in seconds for considering the book stale (degraded).
    const STALE_THRESHOLD_SECS: f64 = 30.0;
    /// Threshold in seconds for considering the feed unhealthy.
    const UNHEALTHY_THRESHOLD_SECS: f64 = 60.0;

    /// Determine the health status based on time since the last applied message.
    pub fn health_status(&self) -> HealthStatus {
        let idle_secs = match self.secs_since_last_applied {
            Some(secs) => secs,
            // Nothing applied yet, judge by how long we have been waiting
            None => self.uptime_secs,
        };

        if idle_secs > Self::UNHEALTHY_THRESHOLD_SECS {
            HealthStatus::Unhealthy
        } else if idle_secs > Self::STALE_THRESHOLD_SECS {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Order Book Metrics ===")?;
        writeln!(f, "Uptime:              {:.1}s", self.uptime_secs)?;
        writeln!(f, "Messages received:   {}", self.messages_received)?;
        writeln!(f, "Snapshots applied:   {}", self.snapshots_applied)?;
        writeln!(f, "Updates applied:     {}", self.updates_applied)?;
        writeln!(f, "Updates dropped:     {}", self.updates_dropped)?;
        writeln!(f, "Messages/sec:        {:.2}", self.messages_per_second)?;
        writeln!(f, "Malformed records:   {}", self.malformed_records)?;
        writeln!(f, "Parse errors:        {}", self.parse_errors)?;
        writeln!(f, "Rejected payloads:   {}", self.rejected_payloads)?;
        if let Some(secs) = self.secs_since_last_applied {
            writeln!(f, "Since last applied:  {:.1}s", secs)?;
        }
        if let Some(secs) = self.secs_since_last_error {
            writeln!(f, "Since last error:    {:.1}s", secs)?;
        }
        Ok(())
    }
}

/// Shared handle to metrics.
pub type SharedMetrics = Arc<MergeMetrics>;

pub fn create_metrics() -> SharedMetrics {
    Arc::new(MergeMetrics::new())
}
