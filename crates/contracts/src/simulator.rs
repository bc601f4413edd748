//! 仿真器边界
//!
//! 核心对仿真器客户端库的需求。真实 CARLA 客户端和内存 mock 都实现这些 trait。
//!
//! 与原生客户端一致，所有调用都是阻塞的。实现必须 `Send + Sync`：
//! 同步控制器线程和调用方线程共享同一个世界。

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    AckermannControl, AckermannSettings, ActorId, SensorMeasurement, SimulatorError, Transform,
    Vector3, VehicleControl, WheelLocation,
};

/// 仿真器调用的 Result 别名
pub type SimResult<T> = std::result::Result<T, SimulatorError>;

/// 传感器数据回调
///
/// 每个新测量都在客户端库的回调线程上调用。
pub type MeasurementCallback = Arc<dyn Fn(SensorMeasurement) + Send + Sync>;

/// 打开到仿真服务器的会话
pub trait SimulatorConnector: Send + Sync {
    /// 打开会话并设置客户端超时，不探测存活
    fn connect(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> SimResult<Arc<dyn SimulatorSession>>;
}

/// 一个客户端会话
///
/// 最后一个引用释放时会话随之释放。
pub trait SimulatorSession: Send + Sync {
    /// 轻量存活探测
    fn server_version(&self) -> SimResult<String>;

    /// 会话当前的世界
    fn world(&self) -> SimResult<Arc<dyn SimWorld>>;

    /// 加载另一张地图，之前返回的世界随之失效
    fn load_world(&self, map: &str) -> SimResult<()>;

    /// 重新加载当前地图
    fn reload_world(&self, reset_settings: bool) -> SimResult<()>;
}

/// 世界步进设置
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldSettings {
    pub synchronous_mode: bool,
    pub fixed_delta_seconds: Option<f64>,
}

/// 最近一次被确认帧的时间信息
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub frame: u64,

    /// episode 开始以来的仿真时间 (秒)
    pub elapsed_seconds: f64,

    /// 上一步覆盖的仿真时间 (秒)
    pub delta_seconds: f64,
}

/// 目录蓝图的一个属性
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeInfo {
    pub id: String,
    pub modifiable: bool,
    #[serde(default)]
    pub recommended_values: Vec<String>,
}

/// 服务器目录中的蓝图
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlueprintInfo {
    pub id: String,
    #[serde(default)]
    pub attributes: Vec<AttributeInfo>,
}

impl BlueprintInfo {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: Vec::new(),
        }
    }

    pub fn with_attribute(
        mut self,
        id: impl Into<String>,
        modifiable: bool,
        recommended_values: &[&str],
    ) -> Self {
        self.attributes.push(AttributeInfo {
            id: id.into(),
            modifiable,
            recommended_values: recommended_values.iter().map(|v| v.to_string()).collect(),
        });
        self
    }

    pub fn attribute(&self, id: &str) -> Option<&AttributeInfo> {
        self.attributes.iter().find(|a| a.id == id)
    }
}

/// 所有属性覆盖都已解析为具体值的蓝图
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedBlueprint {
    pub id: String,
    pub attributes: HashMap<String, String>,
}

/// 世界句柄
pub trait SimWorld: Send + Sync {
    /// 已加载的地图名
    fn map_name(&self) -> SimResult<String>;

    fn settings(&self) -> SimResult<WorldSettings>;

    /// 应用设置，返回生效的帧号
    fn apply_settings(&self, settings: &WorldSettings) -> SimResult<u64>;

    /// 前进一步 (同步模式)，阻塞到服务器确认
    fn tick(&self) -> SimResult<u64>;

    /// 阻塞等待服务器下一个 tick，不主动推进
    fn wait_for_tick(&self) -> SimResult<WorldSnapshot>;

    fn snapshot(&self) -> SimResult<WorldSnapshot>;

    /// 按蓝图 id 精确查目录
    fn find_blueprint(&self, id: &str) -> SimResult<Option<BlueprintInfo>>;

    fn spawn_actor(
        &self,
        blueprint: &ResolvedBlueprint,
        transform: &Transform,
        attach_to: Option<&Arc<dyn NativeActor>>,
    ) -> SimResult<Arc<dyn NativeActor>>;
}

/// 服务器上已生成的 actor
pub trait NativeActor: Send + Sync + fmt::Debug {
    fn id(&self) -> ActorId;

    /// 生成该 actor 的蓝图 id
    fn blueprint_id(&self) -> &str;

    fn is_alive(&self) -> bool;

    /// 在服务器上销毁，返回服务器是否确认
    fn destroy(&self) -> SimResult<bool>;

    fn transform(&self) -> SimResult<Transform>;
    fn set_transform(&self, transform: &Transform) -> SimResult<()>;
    fn velocity(&self) -> SimResult<Vector3>;
    fn angular_velocity(&self) -> SimResult<Vector3>;
    fn acceleration(&self) -> SimResult<Vector3>;
    fn set_simulate_physics(&self, enabled: bool) -> SimResult<()>;

    fn as_vehicle(&self) -> Option<&dyn NativeVehicle> {
        None
    }

    fn as_sensor(&self) -> Option<&dyn NativeSensor> {
        None
    }

    /// 适配器通过它对挂载目标做 downcast
    fn as_any(&self) -> &dyn Any;
}

/// 原生 actor 的车辆能力
pub trait NativeVehicle: Send + Sync {
    fn control(&self) -> SimResult<VehicleControl>;
    fn apply_control(&self, control: &VehicleControl) -> SimResult<()>;
    fn apply_ackermann_control(&self, control: &AckermannControl) -> SimResult<()>;
    fn ackermann_settings(&self) -> SimResult<AckermannSettings>;
    fn apply_ackermann_settings(&self, settings: &AckermannSettings) -> SimResult<()>;

    /// 单个车轮的物理转向角 (度)
    fn wheel_steer_angle(&self, wheel: WheelLocation) -> SimResult<f32>;

    /// 仅影响显示的转向角覆盖 (度)
    fn set_wheel_steer_direction(&self, wheel: WheelLocation, degrees: f32) -> SimResult<()>;
}

/// 原生 actor 的传感器能力
pub trait NativeSensor: Send + Sync {
    /// 注册测量回调，替换之前的回调
    fn listen(&self, callback: MeasurementCallback) -> SimResult<()>;

    fn stop(&self) -> SimResult<()>;

    fn is_listening(&self) -> bool;
}
