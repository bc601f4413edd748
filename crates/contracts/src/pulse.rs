//! 瞬时通知脉冲
//!
//! 用于 tick 到达和传感器数据更新。只有触发时已在等待的线程能看到脉冲，
//! 之后才开始等待的线程看不到；连续的脉冲逐个计数，不会合并。

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// 代计数 + 条件变量实现的广播脉冲
#[derive(Debug, Default)]
pub struct Pulse {
    generation: Mutex<u64>,
    signal: Condvar,
}

impl Pulse {
    pub fn new() -> Self {
        Self::default()
    }

    /// 触发一次脉冲，唤醒当前所有等待者，返回新的代数
    pub fn fire(&self) -> u64 {
        let mut generation = self.generation.lock();
        *generation = generation.wrapping_add(1);
        self.signal.notify_all();
        *generation
    }

    /// 已触发的脉冲数
    pub fn generation(&self) -> u64 {
        *self.generation.lock()
    }

    /// 等待下一次脉冲，超时返回 `false`
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        self.wait_count(1, timeout).is_ok()
    }

    /// 等待调用开始后触发的 `count` 次脉冲
    ///
    /// `timeout` 限制整个等待过程，而不是单次脉冲。超时返回
    /// `Err(observed)`，即预算耗尽前看到的脉冲数。
    pub fn wait_count(&self, count: u64, timeout: Option<Duration>) -> Result<(), u64> {
        self.wait_count_or(count, timeout, || false)
    }

    /// 同 [`Pulse::wait_count`]，`abort` 返回 true 时提前放弃
    ///
    /// 每次等待前在脉冲锁内检查 `abort`；生产者先设置中止条件再触发，
    /// 等待者就不会被卡住。
    pub fn wait_count_or(
        &self,
        count: u64,
        timeout: Option<Duration>,
        abort: impl Fn() -> bool,
    ) -> Result<(), u64> {
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let mut generation = self.generation.lock();
        let start = *generation;

        loop {
            let observed = generation.wrapping_sub(start);
            if observed >= count {
                return Ok(());
            }
            if abort() {
                return Err(observed);
            }
            match deadline {
                Some(deadline) => {
                    if self.signal.wait_until(&mut generation, deadline).timed_out() {
                        let observed = generation.wrapping_sub(start);
                        return if observed >= count {
                            Ok(())
                        } else {
                            Err(observed)
                        };
                    }
                }
                None => self.signal.wait(&mut generation),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_pulse_fired_before_wait_is_missed() {
        let pulse = Pulse::new();
        pulse.fire();
        pulse.fire();

        assert!(!pulse.wait(Some(Duration::from_millis(30))));
    }

    #[test]
    fn test_wait_observes_later_pulse() {
        let pulse = Arc::new(Pulse::new());
        let firer = {
            let pulse = Arc::clone(&pulse);
            thread::spawn(move || {
                for _ in 0..50 {
                    thread::sleep(Duration::from_millis(5));
                    pulse.fire();
                }
            })
        };

        assert!(pulse.wait(Some(Duration::from_secs(2))));
        firer.join().unwrap();
    }

    #[test]
    fn test_wait_count_counts_every_pulse() {
        let pulse = Arc::new(Pulse::new());
        let firer = {
            let pulse = Arc::clone(&pulse);
            thread::spawn(move || {
                for _ in 0..100 {
                    thread::sleep(Duration::from_millis(2));
                    pulse.fire();
                }
            })
        };

        assert_eq!(pulse.wait_count(3, Some(Duration::from_secs(2))), Ok(()));
        firer.join().unwrap();
    }

    #[test]
    fn test_wait_count_reports_observed_on_timeout() {
        let pulse = Pulse::new();
        assert_eq!(pulse.wait_count(2, Some(Duration::from_millis(20))), Err(0));
    }

    #[test]
    fn test_abort_wakes_waiter() {
        let pulse = Arc::new(Pulse::new());
        let stopped = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let stopper = {
            let pulse = Arc::clone(&pulse);
            let stopped = Arc::clone(&stopped);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                stopped.store(true, std::sync::atomic::Ordering::SeqCst);
                pulse.fire();
            })
        };

        let result = pulse.wait_count_or(5, None, || {
            stopped.load(std::sync::atomic::Ordering::SeqCst)
        });
        assert_eq!(result, Err(1));
        stopper.join().unwrap();
    }

    #[test]
    fn test_zero_count_returns_immediately() {
        let pulse = Pulse::new();
        assert_eq!(pulse.wait_count(0, Some(Duration::ZERO)), Ok(()));
    }
}
