//! 车辆控制命令与状态

use serde::{Deserialize, Serialize};

use crate::Vector3;

/// 直接控制命令 (油门/转向/刹车)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleControl {
    /// 油门 [0, 1]
    pub throttle: f32,

    /// 转向 [-1, 1]
    pub steer: f32,

    /// 刹车 [0, 1]
    pub brake: f32,

    pub hand_brake: bool,
    pub reverse: bool,
    pub manual_gear_shift: bool,
    pub gear: i32,
}

impl VehicleControl {
    /// 限幅到服务器接受的范围
    pub fn clamped(&self) -> Self {
        Self {
            throttle: self.throttle.clamp(0.0, 1.0),
            steer: self.steer.clamp(-1.0, 1.0),
            brake: self.brake.clamp(0.0, 1.0),
            ..*self
        }
    }
}

/// 直接控制的逐字段覆盖，未给出的字段取当前值
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleControlPatch {
    pub throttle: Option<f32>,
    pub steer: Option<f32>,
    pub brake: Option<f32>,
    pub hand_brake: Option<bool>,
    pub reverse: Option<bool>,
    pub manual_gear_shift: Option<bool>,
    pub gear: Option<i32>,
}

impl VehicleControlPatch {
    pub fn apply_to(&self, current: &VehicleControl) -> VehicleControl {
        VehicleControl {
            throttle: self.throttle.unwrap_or(current.throttle),
            steer: self.steer.unwrap_or(current.steer),
            brake: self.brake.unwrap_or(current.brake),
            hand_brake: self.hand_brake.unwrap_or(current.hand_brake),
            reverse: self.reverse.unwrap_or(current.reverse),
            manual_gear_shift: self.manual_gear_shift.unwrap_or(current.manual_gear_shift),
            gear: self.gear.unwrap_or(current.gear),
        }
    }
}

/// Ackermann 控制命令
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AckermannControl {
    /// 目标转向角 (rad)
    pub steer: f32,

    /// 转向角速度 (rad/s)
    pub steer_speed: f32,

    /// 目标速度 (m/s)
    pub speed: f32,

    /// 目标加速度 (m/s²)
    pub acceleration: f32,

    /// 目标加加速度 (m/s³)
    pub jerk: f32,
}

/// Ackermann 控制器 PID 参数
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AckermannSettings {
    pub speed_kp: f32,
    pub speed_ki: f32,
    pub speed_kd: f32,
    pub accel_kp: f32,
    pub accel_ki: f32,
    pub accel_kd: f32,
}

/// Ackermann PID 参数的逐字段覆盖
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AckermannSettingsPatch {
    pub speed_kp: Option<f32>,
    pub speed_ki: Option<f32>,
    pub speed_kd: Option<f32>,
    pub accel_kp: Option<f32>,
    pub accel_ki: Option<f32>,
    pub accel_kd: Option<f32>,
}

impl AckermannSettingsPatch {
    pub fn apply_to(&self, current: &AckermannSettings) -> AckermannSettings {
        AckermannSettings {
            speed_kp: self.speed_kp.unwrap_or(current.speed_kp),
            speed_ki: self.speed_ki.unwrap_or(current.speed_ki),
            speed_kd: self.speed_kd.unwrap_or(current.speed_kd),
            accel_kp: self.accel_kp.unwrap_or(current.accel_kp),
            accel_ki: self.accel_ki.unwrap_or(current.accel_ki),
            accel_kd: self.accel_kd.unwrap_or(current.accel_kd),
        }
    }
}

/// 车轮位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WheelLocation {
    FrontLeft,
    FrontRight,
    BackLeft,
    BackRight,
}

impl WheelLocation {
    pub const ALL: [WheelLocation; 4] = [
        WheelLocation::FrontLeft,
        WheelLocation::FrontRight,
        WheelLocation::BackLeft,
        WheelLocation::BackRight,
    ];

    pub fn short_name(&self) -> &'static str {
        match self {
            WheelLocation::FrontLeft => "FL",
            WheelLocation::FrontRight => "FR",
            WheelLocation::BackLeft => "RL",
            WheelLocation::BackRight => "RR",
        }
    }
}

/// 四轮转向角 (度)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WheelSteerAngles {
    pub front_left: f32,
    pub front_right: f32,
    pub back_left: f32,
    pub back_right: f32,
}

impl WheelSteerAngles {
    pub fn get(&self, wheel: WheelLocation) -> f32 {
        match wheel {
            WheelLocation::FrontLeft => self.front_left,
            WheelLocation::FrontRight => self.front_right,
            WheelLocation::BackLeft => self.back_left,
            WheelLocation::BackRight => self.back_right,
        }
    }

    pub fn set(&mut self, wheel: WheelLocation, degrees: f32) {
        match wheel {
            WheelLocation::FrontLeft => self.front_left = degrees,
            WheelLocation::FrontRight => self.front_right = degrees,
            WheelLocation::BackLeft => self.back_left = degrees,
            WheelLocation::BackRight => self.back_right = degrees,
        }
    }
}

/// 车辆状态快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleStatus {
    /// 速度模长 (m/s)
    pub speed: f64,

    pub velocity: Vector3,
    pub acceleration: Vector3,

    /// 当前生效的控制
    pub control: VehicleControl,

    pub wheel_steer: WheelSteerAngles,
}
