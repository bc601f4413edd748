//! 运行指标收集模块
//!
//! tick 节奏、actor 生命周期、连接状态与代理吞吐。

use std::time::Instant;

use contracts::ActorKind;
use metrics::{counter, gauge, histogram};

/// tick 来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickMode {
    /// 客户端驱动的固定步长
    Synchronous,
    /// 服务器自由运行
    FreeRunning,
}

impl TickMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TickMode::Synchronous => "synchronous",
            TickMode::FreeRunning => "free_running",
        }
    }
}

/// 记录一次 tick
///
/// `waited_secs` 为同步模式下步进前的休眠时长，自由运行时为 0。
pub fn record_tick(mode: TickMode, waited_secs: f64) {
    counter!("carla_utils_ticks_total", "mode" => mode.as_str()).increment(1);
    if mode == TickMode::Synchronous {
        histogram!("carla_utils_tick_wait_seconds").record(waited_secs);
    }
}

/// 记录同步模式切换
pub fn record_sync_mode(synchronous: bool) {
    gauge!("carla_utils_sync_mode").set(if synchronous { 1.0 } else { 0.0 });
}

/// 后台循环因非预期错误退出
pub fn record_loop_fault() {
    counter!("carla_utils_sync_loop_faults_total").increment(1);
}

/// 记录 actor 生成成功
pub fn record_actor_spawned(kind: ActorKind) {
    counter!("carla_utils_actors_spawned_total", "kind" => kind.as_str()).increment(1);
}

/// 记录 actor 生成失败
pub fn record_spawn_failure(kind: ActorKind) {
    counter!("carla_utils_spawn_failures_total", "kind" => kind.as_str()).increment(1);
}

/// 记录 actor 销毁
pub fn record_actor_destroyed(kind: ActorKind) {
    counter!("carla_utils_actors_destroyed_total", "kind" => kind.as_str()).increment(1);
}

/// 记录连接状态
pub fn record_connection_state(alive: bool) {
    gauge!("carla_utils_connection_alive").set(if alive { 1.0 } else { 0.0 });
}

/// 记录代理发送
pub fn record_proxy_packet(proxy_name: &str, success: bool) {
    if success {
        counter!(
            "carla_utils_proxy_packets_total",
            "proxy" => proxy_name.to_string()
        )
        .increment(1);
    } else {
        counter!(
            "carla_utils_proxy_errors_total",
            "proxy" => proxy_name.to_string()
        )
        .increment(1);
    }
}

/// tick 统计聚合器
///
/// 在内存中聚合 tick 间隔，便于运行结束时输出摘要。
#[derive(Debug, Clone, Default)]
pub struct TickStatsAggregator {
    /// 同步模式 tick 数
    pub synchronous_ticks: u64,

    /// 自由运行 tick 数
    pub free_running_ticks: u64,

    /// 相邻 tick 的真实时间间隔 (毫秒)
    pub interval_stats: RunningStats,

    /// 同步模式步进前的休眠时长 (毫秒)
    pub wait_stats: RunningStats,

    last_tick: Option<Instant>,
}

impl TickStatsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新聚合统计
    pub fn update(&mut self, mode: TickMode, waited_secs: f64, now: Instant) {
        match mode {
            TickMode::Synchronous => {
                self.synchronous_ticks += 1;
                self.wait_stats.push(waited_secs * 1000.0);
            }
            TickMode::FreeRunning => self.free_running_ticks += 1,
        }

        if let Some(last) = self.last_tick {
            self.interval_stats
                .push(now.saturating_duration_since(last).as_secs_f64() * 1000.0);
        }
        self.last_tick = Some(now);
    }

    /// 世界不可用时断开间隔统计
    pub fn mark_gap(&mut self) {
        self.last_tick = None;
    }

    pub fn total_ticks(&self) -> u64 {
        self.synchronous_ticks + self.free_running_ticks
    }

    /// 生成摘要报告
    pub fn summary(&self) -> TickSummary {
        TickSummary {
            total_ticks: self.total_ticks(),
            synchronous_ticks: self.synchronous_ticks,
            free_running_ticks: self.free_running_ticks,
            interval_ms: StatsSummary::from(&self.interval_stats),
            wait_ms: StatsSummary::from(&self.wait_stats),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// tick 摘要
#[derive(Debug, Clone, Default)]
pub struct TickSummary {
    pub total_ticks: u64,
    pub synchronous_ticks: u64,
    pub free_running_ticks: u64,
    pub interval_ms: StatsSummary,
    pub wait_ms: StatsSummary,
}

impl std::fmt::Display for TickSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Tick Summary ===")?;
        writeln!(f, "Total ticks: {}", self.total_ticks)?;
        writeln!(
            f,
            "Synchronous / free-running: {} / {}",
            self.synchronous_ticks, self.free_running_ticks
        )?;
        writeln!(f, "Tick interval (ms): {}", self.interval_ms)?;
        writeln!(f, "Step wait (ms): {}", self.wait_ms)?;
        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// 最小值
    pub fn min(&self) -> f64 {
        self.min
    }

    /// 最大值
    pub fn max(&self) -> f64 {
        self.max
    }
}
