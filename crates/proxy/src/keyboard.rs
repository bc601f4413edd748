//! 键盘控制代理
//!
//! 按键在调用方一侧转换为控制命令，actor 侧线程应用最新命令并回传车辆状态。

use std::str::FromStr;
use std::sync::Arc;
use std::thread;

use actor_factory::ActorHandle;
use contracts::{VehicleControl, VehicleStatus};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{ProxyError, Result};
use crate::handle::{ProxyHandle, ProxyOptions};
use crate::output::WatchOutput;

/// 每次按键的增量
pub const CONTROL_STEP: f32 = 0.1;

const HEADER_WIDTH: usize = 12;
const SPEED_HEADER_WIDTH: usize = 15;

/// [`KeyboardController`] 识别的按键
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    W,
    A,
    S,
    D,
    Up,
    Down,
    Left,
    Right,
    Space,
    R,
}

impl FromStr for Key {
    type Err = ProxyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "w" => Ok(Key::W),
            "a" => Ok(Key::A),
            "s" => Ok(Key::S),
            "d" => Ok(Key::D),
            "up" => Ok(Key::Up),
            "down" => Ok(Key::Down),
            "left" => Ok(Key::Left),
            "right" => Ok(Key::Right),
            "space" | " " => Ok(Key::Space),
            "r" => Ok(Key::R),
            other => Err(ProxyError::invalid_argument("key", format!("unmapped key '{other}'"))),
        }
    }
}

/// 键盘到车辆控制的映射
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct KeyboardController {
    control: VehicleControl,
}

impl KeyboardController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn control(&self) -> VehicleControl {
        self.control
    }

    /// 处理一次按键，返回得到的控制指令
    pub fn press(&mut self, key: Key) -> VehicleControl {
        let c = &mut self.control;
        match key {
            Key::W | Key::Up => {
                c.throttle = (c.throttle + CONTROL_STEP).min(1.0);
                c.brake = 0.0;
            }
            Key::S | Key::Down => {
                c.brake = (c.brake + CONTROL_STEP).min(1.0);
                c.throttle = 0.0;
            }
            Key::A | Key::Left => c.steer = (c.steer - CONTROL_STEP).max(-1.0),
            Key::D | Key::Right => c.steer = (c.steer + CONTROL_STEP).min(1.0),
            Key::Space => c.hand_brake = !c.hand_brake,
            Key::R => c.reverse = !c.reverse,
        }
        self.control
    }

    pub fn reset(&mut self) {
        self.control = VehicleControl::default();
    }
}

fn row(header: &str, width: usize, value: impl std::fmt::Display) -> String {
    format!("{header:<width$}{value}")
}

fn percent(value: f32) -> String {
    format!("{:.0}%", value * 100.0)
}

/// 状态样本的文本 HUD
pub fn status_lines(status: Option<&VehicleStatus>) -> Vec<String> {
    let Some(status) = status else {
        return vec!["[NO-DATA]".to_string()];
    };
    let c = &status.control;
    vec![
        row("Throttle:", HEADER_WIDTH, percent(c.throttle)),
        row("Brake:", HEADER_WIDTH, percent(c.brake)),
        row("Steer:", HEADER_WIDTH, percent(c.steer)),
        row("Handbrake:", HEADER_WIDTH, c.hand_brake),
        row("Reverse:", HEADER_WIDTH, c.reverse),
        "-".repeat(30),
        row("Speed(m/s):", SPEED_HEADER_WIDTH, format!("{:.1}", status.speed)),
        row("Speed(km/h):", SPEED_HEADER_WIDTH, format!("{:.1}", status.speed * 3.6)),
    ]
}

/// 键盘驱动的车辆控制
pub struct VehicleControlProxy {
    handle: ProxyHandle,
    controller: KeyboardController,
    command_tx: watch::Sender<VehicleControl>,
    status_rx: watch::Receiver<Option<VehicleStatus>>,
}

impl VehicleControlProxy {
    /// 在车辆句柄上启动代理
    pub fn start(vehicle: Arc<ActorHandle>, options: ProxyOptions) -> Result<Self> {
        vehicle.vehicle()?;

        let identity = options.identity("VehicleControl");
        let (output, status_rx) = WatchOutput::new(identity.1.clone());
        let (command_tx, mut command_rx) = watch::channel(VehicleControl::default());

        let actor = Arc::clone(&vehicle);
        let produce = move |interval| -> Option<VehicleStatus> {
            if command_rx.has_changed().unwrap_or(false) {
                let command = *command_rx.borrow_and_update();
                if let Err(e) = actor.vehicle().and_then(|v| v.apply_control(&command)) {
                    warn!(handle = %actor.id(), error = %e, "Failed to apply control");
                }
            }
            thread::sleep(interval);
            match actor.vehicle().and_then(|v| v.status()) {
                Ok(status) => Some(status),
                Err(e) => {
                    debug!(handle = %actor.id(), error = %e, "Vehicle status unavailable");
                    None
                }
            }
        };

        let handle = ProxyHandle::spawn(identity, &options, produce, output)?;
        info!(proxy = handle.name(), vehicle = %vehicle.id(), "Vehicle control proxy started");

        Ok(Self {
            handle,
            controller: KeyboardController::new(),
            command_tx,
            status_rx,
        })
    }

    pub fn name(&self) -> &str {
        self.handle.name()
    }

    /// 映射按键并把指令转给 actor 侧
    pub fn press(&mut self, key: Key) -> VehicleControl {
        let command = self.controller.press(key);
        self.command_tx.send_replace(command);
        command
    }

    pub fn control(&self) -> VehicleControl {
        self.controller.control()
    }

    /// actor 侧发布的最新状态
    pub fn status(&self) -> Option<VehicleStatus> {
        *self.status_rx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<VehicleStatus>> {
        self.status_rx.clone()
    }

    pub fn hud(&self) -> Vec<String> {
        status_lines(self.status().as_ref())
    }

    pub async fn stop(self) -> Result<()> {
        self.handle.stop().await
    }
}
