//! 单个代理的计数器

use std::sync::atomic::{AtomicU64, Ordering};

/// 单个代理的计数
#[derive(Debug, Default)]
pub struct ProxyMetrics {
    /// 从 actor 侧取到的数据数
    produced: AtomicU64,
    /// 已对外投递数
    delivered: AtomicU64,
    /// 投递失败数
    failures: AtomicU64,
    /// 通道满而丢弃的数据数
    dropped: AtomicU64,
}

impl ProxyMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn produced(&self) -> u64 {
        self.produced.load(Ordering::Relaxed)
    }

    pub fn inc_produced(&self) {
        self.produced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn inc_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn inc_failures(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn inc_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            produced: self.produced(),
            delivered: self.delivered(),
            failures: self.failures(),
            dropped: self.dropped(),
        }
    }
}

/// [`ProxyMetrics`] 的时点快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub produced: u64,
    pub delivered: u64,
    pub failures: u64,
    pub dropped: u64,
}
