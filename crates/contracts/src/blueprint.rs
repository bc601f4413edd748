//! ContextBlueprint - Config Loader 输出
//!
//! 描述一次会话：服务器连接、同步模式、actor 树、代理。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

use crate::{ActorKind, Transform};

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的会话配置蓝图
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ContextBlueprint {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 服务器与世界设置
    #[validate(nested)]
    pub world: WorldConfig,

    /// 同步模式
    #[serde(default)]
    #[validate(nested)]
    pub sync: SyncConfig,

    /// actor 定义列表，父节点需先于子节点出现
    #[serde(default)]
    #[validate(nested)]
    pub actors: Vec<ActorConfig>,

    /// 代理定义列表
    #[serde(default)]
    #[validate(nested)]
    pub proxies: Vec<ProxyConfig>,
}

impl ContextBlueprint {
    /// 按 id 查找 actor
    pub fn actor(&self, id: &str) -> Option<&ActorConfig> {
        self.actors.iter().find(|a| a.id == id)
    }
}

/// 服务器与世界配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct WorldConfig {
    /// CARLA 服务器地址
    #[serde(default = "default_carla_host")]
    #[validate(length(min = 1))]
    pub carla_host: String,

    /// CARLA 服务器端口
    #[serde(default = "default_carla_port")]
    #[validate(range(min = 1))]
    pub carla_port: u16,

    /// 客户端 RPC 超时 (秒)
    #[serde(default = "default_timeout_sec")]
    #[validate(range(exclusive_min = 0.0))]
    pub timeout_sec: f64,

    /// 连接后加载的地图 (e.g., "Town01")
    #[serde(default)]
    pub map: Option<String>,

    /// 连接后重新加载当前地图
    #[serde(default)]
    pub reload_world: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            carla_host: default_carla_host(),
            carla_port: default_carla_port(),
            timeout_sec: default_timeout_sec(),
            map: None,
            reload_world: false,
        }
    }
}

fn default_carla_host() -> String {
    "127.0.0.1".to_string()
}

fn default_carla_port() -> u16 {
    2000
}

fn default_timeout_sec() -> f64 {
    2.0
}

/// 同步模式配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SyncConfig {
    /// 客户端驱动步进 (同步模式)
    #[serde(default)]
    pub primary_mode: bool,

    /// 固定步长 (秒)，同步模式下必须 > 0
    #[serde(default = "default_fixed_delta")]
    pub fixed_delta_sec: f64,

    /// 让仿真时间跟随真实时间
    #[serde(default)]
    pub strict_timing: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            primary_mode: false,
            fixed_delta_sec: default_fixed_delta(),
            strict_timing: false,
        }
    }
}

fn default_fixed_delta() -> f64 {
    0.05
}

/// actor 配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ActorConfig {
    /// 唯一标识符
    #[validate(length(min = 1))]
    pub id: String,

    /// 蓝图名称 (e.g., "vehicle.tesla.model3")
    #[validate(length(min = 1))]
    pub blueprint: String,

    /// 显式类型；缺省时按蓝图名解析
    #[serde(default)]
    pub kind: Option<ActorKind>,

    /// 父 actor id，生成时挂载到父 actor
    #[serde(default)]
    pub parent: Option<String>,

    /// 初始位姿 (有父节点时为相对位姿)
    #[serde(default)]
    pub transform: Transform,

    /// 蓝图属性覆盖，空字符串表示随机选取推荐值
    #[serde(default)]
    pub attributes: HashMap<String, String>,

    /// 是否启用物理仿真
    #[serde(default = "default_physics")]
    pub physics: bool,
}

fn default_physics() -> bool {
    true
}

/// 代理配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProxyConfig {
    /// 代理名称
    #[validate(length(min = 1))]
    pub name: String,

    /// 代理类型
    #[serde(rename = "type")]
    pub proxy_type: ProxyType,

    /// 数据来源 actor id
    #[validate(length(min = 1))]
    pub actor: String,

    /// 类型特定参数 (addr / format / interval_ms / dir)
    #[serde(default)]
    pub params: HashMap<String, String>,
}

/// 代理类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProxyType {
    /// IMU 遥测 (UDP)
    ImuUdp,
    /// GNSS 遥测 (UDP)
    GnssUdp,
    /// Radar 遥测 (UDP)
    RadarUdp,
    /// LiDAR 遥测 (UDP)
    LidarUdp,
    /// 车辆状态 (UDP, JSON)
    VehicleStatusUdp,
    /// 相机画面，逐帧写 PNG 到 `dir`
    CameraFrames,
}

impl ProxyType {
    /// 数据来源 actor 需要的类型
    pub fn required_kind(&self) -> ActorKind {
        match self {
            ProxyType::ImuUdp => ActorKind::Imu,
            ProxyType::GnssUdp => ActorKind::Gnss,
            ProxyType::RadarUdp => ActorKind::Radar,
            ProxyType::LidarUdp => ActorKind::Lidar,
            ProxyType::VehicleStatusUdp => ActorKind::Vehicle,
            ProxyType::CameraFrames => ActorKind::Camera,
        }
    }

    /// 是否经 UDP 发送，需要 `addr` 参数
    pub fn is_udp(&self) -> bool {
        !matches!(self, ProxyType::CameraFrames)
    }
}
