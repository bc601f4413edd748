//! 时钟对齐计算
//!
//! 真实时间与仿真时间的锁存起点，以及同步模式下每步的休眠时长。

use std::time::Instant;

/// 严格计时模式下休眠时长的下限比例
pub const WAIT_FLOOR_RATIO: f64 = 0.1;

/// 同步模式步进前的休眠时长 (秒)
///
/// 默认等于固定步长。严格计时模式下减去真实时间领先仿真时间的差值 `drift`，
/// 并限制在 `0.1 × fixed_delta` 以上。
pub fn compute_wait(fixed_delta: f64, strict_timing: bool, drift: f64) -> f64 {
    if !strict_timing {
        return fixed_delta;
    }
    let floor = fixed_delta * WAIT_FLOOR_RATIO;
    let wait = fixed_delta - drift;
    if wait.is_nan() || wait <= floor {
        floor
    } else {
        wait
    }
}

/// 锁存的起点
#[derive(Debug, Clone, Copy, PartialEq)]
struct ClockOrigin {
    realworld: Instant,
    simulation: f64,
}

/// 仿真时钟起点
///
/// 两个起点总是同时锁存、同时重置。
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SimClock {
    origin: Option<ClockOrigin>,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// 锁存起点，已锁存时不变。返回是否为新锁存。
    pub fn latch(&mut self, now: Instant, simulation_elapsed: f64) -> bool {
        if self.origin.is_some() {
            return false;
        }
        self.origin = Some(ClockOrigin {
            realworld: now,
            simulation: simulation_elapsed,
        });
        true
    }

    /// 回到未锁存
    pub fn reset(&mut self) {
        self.origin = None;
    }

    /// 仿真时间早于锁存起点，说明世界换了 episode
    pub fn rewound(&self, simulation_elapsed: f64) -> bool {
        self.origin
            .is_some_and(|o| simulation_elapsed < o.simulation)
    }

    pub fn is_latched(&self) -> bool {
        self.origin.is_some()
    }

    /// 锁存以来的真实时间 (秒)
    pub fn timespan_realworld(&self, now: Instant) -> Option<f64> {
        self.origin
            .map(|o| now.saturating_duration_since(o.realworld).as_secs_f64())
    }

    /// 锁存以来的仿真时间 (秒)
    pub fn timespan_simulation(&self, simulation_elapsed: f64) -> Option<f64> {
        self.origin.map(|o| simulation_elapsed - o.simulation)
    }

    /// 真实时间减仿真时间 (秒)，正值表示仿真落后
    pub fn diff(&self, now: Instant, simulation_elapsed: f64) -> Option<f64> {
        Some(self.timespan_realworld(now)? - self.timespan_simulation(simulation_elapsed)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_wait_without_strict_is_fixed_delta() {
        assert_eq!(compute_wait(0.05, false, 10.0), 0.05);
        assert_eq!(compute_wait(0.05, false, -10.0), 0.05);
    }

    #[test]
    fn test_strict_wait_floor() {
        let wait = compute_wait(0.05, true, 10.0);
        assert!((wait - 0.005).abs() < 1e-12);
    }

    #[test]
    fn test_strict_wait_never_below_floor() {
        for drift in [-100.0, -1.0, -0.01, 0.0, 0.01, 0.045, 0.05, 1.0, 1e9, f64::INFINITY] {
            for delta in [0.001, 0.01, 0.05, 0.1, 1.0] {
                let wait = compute_wait(delta, true, drift);
                assert!(
                    wait >= delta * WAIT_FLOOR_RATIO,
                    "delta={delta} drift={drift} wait={wait}"
                );
            }
        }
    }

    #[test]
    fn test_strict_wait_compensates_drift() {
        // 仿真领先真实时间时多等
        assert!((compute_wait(0.05, true, -0.02) - 0.07).abs() < 1e-12);
        // 真实时间领先时少等
        assert!((compute_wait(0.05, true, 0.02) - 0.03).abs() < 1e-12);
    }

    #[test]
    fn test_clock_zero_after_latch() {
        let now = Instant::now();
        let mut clock = SimClock::new();
        assert!(clock.timespan_realworld(now).is_none());

        assert!(clock.latch(now, 12.5));
        assert_eq!(clock.timespan_realworld(now), Some(0.0));
        assert_eq!(clock.timespan_simulation(12.5), Some(0.0));
        assert_eq!(clock.diff(now, 12.5), Some(0.0));
    }

    #[test]
    fn test_clock_latch_is_sticky_until_reset() {
        let t0 = Instant::now();
        let mut clock = SimClock::new();
        clock.latch(t0, 1.0);
        assert!(!clock.latch(t0 + Duration::from_secs(5), 100.0));
        assert_eq!(clock.timespan_simulation(3.0), Some(2.0));

        clock.reset();
        assert!(!clock.is_latched());
        assert!(clock.latch(t0 + Duration::from_secs(5), 100.0));
        assert_eq!(clock.timespan_simulation(100.0), Some(0.0));
    }

    #[test]
    fn test_clock_rewound() {
        let t0 = Instant::now();
        let mut clock = SimClock::new();
        assert!(!clock.rewound(0.0));

        clock.latch(t0, 40.0);
        assert!(!clock.rewound(40.0));
        assert!(!clock.rewound(41.5));
        assert!(clock.rewound(0.05));
    }

    #[test]
    fn test_clock_diff_sign() {
        let t0 = Instant::now();
        let mut clock = SimClock::new();
        clock.latch(t0, 0.0);

        let diff = clock.diff(t0 + Duration::from_secs(2), 0.5).unwrap();
        assert!((diff - 1.5).abs() < 1e-9);
    }
}
