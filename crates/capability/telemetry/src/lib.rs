//! 追踪初始化与进程级计数指标。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 基础指标快照。
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub readings_received: u64,
    pub decode_failures: u64,
    pub persist_success: u64,
    pub persist_failure: u64,
    pub aggregates_published: u64,
    pub publish_failures: u64,
}

/// 基础指标。
pub struct TelemetryMetrics {
    readings_received: AtomicU64,
    decode_failures: AtomicU64,
    persist_success: AtomicU64,
    persist_failure: AtomicU64,
    aggregates_published: AtomicU64,
    publish_failures: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            readings_received: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
            persist_success: AtomicU64::new(0),
            persist_failure: AtomicU64::new(0),
            aggregates_published: AtomicU64::new(0),
            publish_failures: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            readings_received: self.readings_received.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            persist_success: self.persist_success.load(Ordering::Relaxed),
            persist_failure: self.persist_failure.load(Ordering::Relaxed),
            aggregates_published: self.aggregates_published.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局指标实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 记录原始读数接收次数。
pub fn record_reading_received() {
    metrics().readings_received.fetch_add(1, Ordering::Relaxed);
}

/// 记录报文解码失败次数。
pub fn record_decode_failure() {
    metrics().decode_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录持久化成功次数。
pub fn record_persist_success() {
    metrics().persist_success.fetch_add(1, Ordering::Relaxed);
}

/// 记录持久化失败次数。
pub fn record_persist_failure() {
    metrics().persist_failure.fetch_add(1, Ordering::Relaxed);
}

/// 记录均值发布成功次数。
pub fn record_aggregate_published() {
    metrics().aggregates_published.fetch_add(1, Ordering::Relaxed);
}

/// 记录均值发布失败次数。
pub fn record_publish_failure() {
    metrics().publish_failures.fetch_add(1, Ordering::Relaxed);
}
