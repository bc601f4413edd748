//! 同步控制器
//!
//! 每个连接一个后台线程，持续把期望的步进模式协商到服务器：
//! - 同步模式：按固定步长休眠后主动 `tick()`
//! - 自由运行：阻塞在 `wait_for_tick()` 上
//!
//! 每轮循环结束发出一次 tick 脉冲。调用方只记录期望状态，不直接访问服务器。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use contracts::{Pulse, SharedWorld, SimResult, SimWorld, SimulatorError, WorldSettings};
use observability::{record_loop_fault, record_sync_mode, record_tick, TickMode, TickStatsAggregator, TickSummary};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace, warn};

use crate::error::{Result, SyncError};
use crate::timing::{compute_wait, SimClock};

/// 无世界时的空转间隔
const IDLE_INTERVAL: Duration = Duration::from_millis(100);

/// Drop 时等待后台线程退出的上限
const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

/// 期望的步进模式
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyncOptions {
    /// 客户端驱动的固定步长模式
    pub synchronous: bool,

    /// 固定步长 (秒)
    pub fixed_delta: f64,

    /// 严格计时：让仿真时间跟随真实时间
    pub strict_timing: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            synchronous: false,
            fixed_delta: 0.05,
            strict_timing: false,
        }
    }
}

/// 控制器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// 没有可用世界，后台线程空转
    NoWorld,
    /// 服务器自由运行
    FreeRunning,
    /// 已请求同步模式，尚未应用到服务器
    SyncRequested,
    /// 同步模式已生效
    SyncActive,
}

#[derive(Debug, Default)]
struct Desired {
    options: SyncOptions,
    revision: u64,
}

#[derive(Debug, Default)]
struct Applied {
    /// 后台线程最近一轮是否看到了世界
    world: bool,
    /// 已应用到服务器的期望版本
    revision: u64,
    synchronous: bool,
    /// 后台线程已退出
    stopped: bool,
}

struct Shared {
    world: SharedWorld,
    desired: Mutex<Desired>,
    applied: Mutex<Applied>,
    applied_signal: Condvar,
    clock: Mutex<SimClock>,
    tick: Pulse,
    exit: AtomicBool,
    fault: Mutex<Option<SimulatorError>>,
    stats: Mutex<TickStatsAggregator>,
}

impl Shared {
    fn update_applied(&self, f: impl FnOnce(&mut Applied)) {
        let mut applied = self.applied.lock();
        f(&mut applied);
        self.applied_signal.notify_all();
    }

    fn idle_without_world(&self) {
        {
            let mut clock = self.clock.lock();
            if clock.is_latched() {
                info!("World unavailable, clock reset");
            }
            clock.reset();
        }
        self.stats.lock().mark_gap();
        self.update_applied(|a| a.world = false);
        thread::sleep(IDLE_INTERVAL);
    }

    /// 一轮协商 + 步进
    fn step(&self, world: &dyn SimWorld) -> SimResult<()> {
        let (options, revision) = {
            let desired = self.desired.lock();
            (desired.options, desired.revision)
        };

        let snapshot = world.snapshot()?;
        let mut clock = self.clock.lock();
        if clock.rewound(snapshot.elapsed_seconds) {
            // 新 episode 的仿真时间从零开始
            info!(elapsed = snapshot.elapsed_seconds, "Simulation time rewound, clock reset");
            clock.reset();
        }
        if clock.latch(Instant::now(), snapshot.elapsed_seconds) {
            info!(
                frame = snapshot.frame,
                elapsed = snapshot.elapsed_seconds,
                "World available, clock latched"
            );
        }
        drop(clock);

        self.apply_mode(world, &options)?;
        self.update_applied(|a| {
            a.world = true;
            a.revision = revision;
            a.synchronous = options.synchronous;
        });

        if options.synchronous {
            let drift = self
                .clock
                .lock()
                .diff(Instant::now(), snapshot.elapsed_seconds)
                .unwrap_or(0.0);
            let wait = compute_wait(options.fixed_delta, options.strict_timing, drift);
            let sleep = Duration::try_from_secs_f64(wait)
                .unwrap_or_else(|_| Duration::from_secs_f64(options.fixed_delta));
            thread::sleep(sleep);

            let frame = world.tick()?;
            trace!(frame, wait, drift, "Synchronous step");
            self.record(TickMode::Synchronous, wait);
        } else {
            let snapshot = world.wait_for_tick()?;
            trace!(frame = snapshot.frame, "Free-running tick");
            self.record(TickMode::FreeRunning, 0.0);
        }
        Ok(())
    }

    /// 仅在与服务器当前设置不同时应用
    fn apply_mode(&self, world: &dyn SimWorld, options: &SyncOptions) -> SimResult<()> {
        let current = world.settings()?;
        let target = WorldSettings {
            synchronous_mode: options.synchronous,
            fixed_delta_seconds: if options.synchronous {
                Some(options.fixed_delta)
            } else {
                current.fixed_delta_seconds
            },
        };
        if current == target {
            return Ok(());
        }

        world.apply_settings(&target)?;
        record_sync_mode(options.synchronous);
        if options.synchronous {
            info!(
                fixed_delta = options.fixed_delta,
                strict_timing = options.strict_timing,
                "Entered synchronous mode"
            );
        } else {
            info!("Entered free-running mode");
        }
        Ok(())
    }

    fn record(&self, mode: TickMode, waited_secs: f64) {
        record_tick(mode, waited_secs);
        self.stats.lock().update(mode, waited_secs, Instant::now());
    }

    /// 步进期间世界被清空或替换
    fn world_replaced(&self, stepped: &Arc<dyn SimWorld>) -> bool {
        match self.world.get() {
            Some(current) => !Arc::ptr_eq(&current, stepped),
            None => true,
        }
    }

    fn run(&self) {
        debug!("Sync loop started");
        while !self.exit.load(Ordering::Acquire) {
            let Some(world) = self.world.get() else {
                self.idle_without_world();
                continue;
            };

            match self.step(world.as_ref()) {
                Ok(()) => {}
                Err(e) if e.is_world_lost() || self.world_replaced(&world) => {
                    debug!(error = %e, "World went away during step, retrying");
                    thread::sleep(IDLE_INTERVAL);
                    continue;
                }
                Err(e) => {
                    error!(error = %e, "Sync loop fault, stopping");
                    record_loop_fault();
                    *self.fault.lock() = Some(e);
                    break;
                }
            }
            self.tick.fire();
        }

        self.update_applied(|a| a.stopped = true);
        // 唤醒仍在等待 tick 的调用方
        self.tick.fire();
        debug!("Sync loop exited");
    }
}

/// 同步控制器
///
/// 创建即启动后台线程，Drop 时先切回自由运行再退出。
pub struct SyncController {
    shared: Arc<Shared>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl SyncController {
    /// 在共享世界槽上启动控制器
    pub fn new(world: SharedWorld) -> Result<Self> {
        let shared = Arc::new(Shared {
            world,
            desired: Mutex::new(Desired::default()),
            applied: Mutex::new(Applied::default()),
            applied_signal: Condvar::new(),
            clock: Mutex::new(SimClock::new()),
            tick: Pulse::new(),
            exit: AtomicBool::new(false),
            fault: Mutex::new(None),
            stats: Mutex::new(TickStatsAggregator::new()),
        });

        let thread = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("carla-sync".into())
                .spawn(move || shared.run())
                .map_err(|e| SyncError::loop_fault(format!("failed to start sync thread: {e}")))?
        };

        Ok(Self {
            shared,
            thread: Mutex::new(Some(thread)),
        })
    }

    /// 记录期望的步进模式，由后台线程应用
    ///
    /// 启用同步模式时 `fixed_delta` 必须为正。关闭时保留之前的步长。
    pub fn use_sync_primary_mode(
        &self,
        enable: bool,
        fixed_delta: f64,
        strict_timing: bool,
    ) -> Result<()> {
        if enable && !(fixed_delta > 0.0 && fixed_delta.is_finite()) {
            return Err(SyncError::invalid_argument(
                "fixed_delta",
                format!("must be > 0 when enabling synchronous mode, got {fixed_delta}"),
            ));
        }

        let mut desired = self.shared.desired.lock();
        desired.options.synchronous = enable;
        if enable {
            desired.options.fixed_delta = fixed_delta;
        }
        desired.options.strict_timing = strict_timing;
        desired.revision += 1;
        debug!(enable, fixed_delta, strict_timing, "Sync mode requested");
        Ok(())
    }

    /// 当前期望的模式
    pub fn options(&self) -> SyncOptions {
        self.shared.desired.lock().options
    }

    pub fn state(&self) -> SyncState {
        let applied = self.shared.applied.lock();
        if !applied.world {
            return SyncState::NoWorld;
        }
        let desired = self.shared.desired.lock();
        match (desired.options.synchronous, applied.synchronous) {
            (true, true) if applied.revision == desired.revision => SyncState::SyncActive,
            (true, _) => SyncState::SyncRequested,
            (false, true) => SyncState::SyncActive,
            (false, false) => SyncState::FreeRunning,
        }
    }

    /// 阻塞直到 `count` 个 tick 脉冲，`timeout` 约束整个等待
    pub fn wait_for_ticks(&self, count: u64, timeout: Option<Duration>) -> Result<()> {
        let shared = &self.shared;
        let result = shared.tick.wait_count_or(count, timeout, || {
            shared.exit.load(Ordering::Acquire) || shared.fault.lock().is_some()
        });

        match result {
            Ok(()) => Ok(()),
            Err(observed) => {
                if let Some(fault) = self.fault() {
                    Err(SyncError::loop_fault(fault.to_string()))
                } else if shared.exit.load(Ordering::Acquire) {
                    Err(SyncError::loop_fault("controller is shutting down"))
                } else {
                    Err(SyncError::Timeout {
                        observed,
                        requested: count,
                    })
                }
            }
        }
    }

    /// 阻塞直到后台线程应用了最近一次期望模式
    ///
    /// 没有世界时视为已应用。后台线程已退出或超时返回 `false`。
    pub fn wait_mode_applied(&self, timeout: Duration) -> bool {
        let target = self.shared.desired.lock().revision;
        let deadline = Instant::now() + timeout;

        let mut applied = self.shared.applied.lock();
        loop {
            if applied.stopped {
                return false;
            }
            if !applied.world || applied.revision >= target {
                return true;
            }
            if self
                .shared
                .applied_signal
                .wait_until(&mut applied, deadline)
                .timed_out()
            {
                return !applied.world || applied.revision >= target;
            }
        }
    }

    /// 丢弃锁存的起点，下一轮步进重新锁存
    ///
    /// 切换地图或重新加载世界后调用。
    pub fn reset_clock(&self) {
        self.shared.clock.lock().reset();
        debug!("Clock reset requested");
    }

    /// tick 脉冲，供需要自行等待的调用方使用
    pub fn tick_pulse(&self) -> &Pulse {
        &self.shared.tick
    }

    /// 锁存以来的仿真时间 (秒)
    pub fn timespan_simulation(&self) -> Result<f64> {
        let elapsed = self.simulation_elapsed()?;
        self.shared
            .clock
            .lock()
            .timespan_simulation(elapsed)
            .ok_or(SyncError::WorldUnavailable)
    }

    /// 锁存以来的真实时间 (秒)
    pub fn timespan_realworld(&self) -> Result<f64> {
        self.shared
            .clock
            .lock()
            .timespan_realworld(Instant::now())
            .ok_or(SyncError::WorldUnavailable)
    }

    /// 真实时间减仿真时间 (秒)
    pub fn timespan_diff(&self) -> Result<f64> {
        let elapsed = self.simulation_elapsed()?;
        self.shared
            .clock
            .lock()
            .diff(Instant::now(), elapsed)
            .ok_or(SyncError::WorldUnavailable)
    }

    fn simulation_elapsed(&self) -> Result<f64> {
        let world = self.shared.world.get().ok_or(SyncError::WorldUnavailable)?;
        Ok(world.snapshot()?.elapsed_seconds)
    }

    /// 使后台线程停止的错误
    pub fn fault(&self) -> Option<SimulatorError> {
        self.shared.fault.lock().clone()
    }

    pub fn is_running(&self) -> bool {
        !self.shared.applied.lock().stopped
    }

    pub fn tick_stats(&self) -> TickSummary {
        self.shared.stats.lock().summary()
    }

    /// 切回自由运行并停止后台线程
    ///
    /// 在 `join_timeout` 内未退出返回 `JoinTimeout`，线程被分离。
    pub fn shutdown(&self, join_timeout: Duration) -> Result<()> {
        let Some(handle) = self.thread.lock().take() else {
            return Ok(());
        };

        // 给后台线程一次机会切回自由运行
        if self.options().synchronous {
            let strict = self.options().strict_timing;
            self.use_sync_primary_mode(false, 0.0, strict)?;
            if !self.wait_mode_applied(join_timeout) {
                warn!("Free-running mode not confirmed before shutdown");
            }
        }

        self.shared.exit.store(true, Ordering::Release);
        self.shared.tick.fire();

        let deadline = Instant::now() + join_timeout;
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                warn!(?join_timeout, "Sync thread did not exit in time, detaching");
                return Err(SyncError::JoinTimeout {
                    timeout_ms: join_timeout.as_millis() as u64,
                });
            }
            thread::sleep(Duration::from_millis(5));
        }
        if handle.join().is_err() {
            return Err(SyncError::loop_fault("sync thread panicked"));
        }
        Ok(())
    }
}

impl Drop for SyncController {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown(DEFAULT_JOIN_TIMEOUT) {
            warn!(error = %e, "Sync controller shutdown incomplete");
        }
    }
}

impl std::fmt::Debug for SyncController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncController")
            .field("state", &self.state())
            .field("options", &self.options())
            .finish()
    }
}
