//! 运行时标识与 actor 类型

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 服务器分配的 CARLA actor id
pub type ActorId = u32;

/// actor 句柄的客户端标识
///
/// 与 [`ActorId`] 不同，跨 spawn/destroy 保持不变。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HandleId(Uuid);

impl HandleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// 前 8 位十六进制，用于默认名称
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for HandleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// actor 逻辑类型
///
/// 封闭集合。`Generic` 为根，`Vehicle` 与 `Sensor` 是它的特化，
/// 具体传感器类型再特化 `Sensor`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    #[default]
    Generic,
    Vehicle,
    Sensor,
    Camera,
    Lidar,
    Imu,
    Gnss,
    Radar,
}

impl ActorKind {
    pub const ALL: [ActorKind; 8] = [
        ActorKind::Generic,
        ActorKind::Vehicle,
        ActorKind::Sensor,
        ActorKind::Camera,
        ActorKind::Lidar,
        ActorKind::Imu,
        ActorKind::Gnss,
        ActorKind::Radar,
    ];

    /// 直接上级类型
    pub fn parent(&self) -> Option<ActorKind> {
        match self {
            ActorKind::Generic => None,
            ActorKind::Vehicle | ActorKind::Sensor => Some(ActorKind::Generic),
            ActorKind::Camera
            | ActorKind::Lidar
            | ActorKind::Imu
            | ActorKind::Gnss
            | ActorKind::Radar => Some(ActorKind::Sensor),
        }
    }

    /// 特化深度，`Generic` 为 0
    pub fn depth(&self) -> usize {
        self.parent().map_or(0, |p| p.depth() + 1)
    }

    /// `self` 是 `other` 本身或其上级类型时为 `true`
    pub fn generalises(&self, other: ActorKind) -> bool {
        let mut current = Some(other);
        while let Some(kind) = current {
            if kind == *self {
                return true;
            }
            current = kind.parent();
        }
        false
    }

    pub fn is_sensor(&self) -> bool {
        ActorKind::Sensor.generalises(*self)
    }

    pub fn is_vehicle(&self) -> bool {
        *self == ActorKind::Vehicle
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActorKind::Generic => "generic",
            ActorKind::Vehicle => "vehicle",
            ActorKind::Sensor => "sensor",
            ActorKind::Camera => "camera",
            ActorKind::Lidar => "lidar",
            ActorKind::Imu => "imu",
            ActorKind::Gnss => "gnss",
            ActorKind::Radar => "radar",
        }
    }

    /// 默认句柄名称使用的类型名，如 `Camera-1a2b3c4d`
    pub fn type_name(&self) -> &'static str {
        match self {
            ActorKind::Generic => "Actor",
            ActorKind::Vehicle => "Vehicle",
            ActorKind::Sensor => "Sensor",
            ActorKind::Camera => "Camera",
            ActorKind::Lidar => "Lidar",
            ActorKind::Imu => "Imu",
            ActorKind::Gnss => "Gnss",
            ActorKind::Radar => "Radar",
        }
    }
}

impl fmt::Display for ActorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
