//! 蓝图名到 actor 类型的解析
//!
//! 有序的 (前缀, 类型) 表，取特化深度最大的匹配。

use contracts::ActorKind;

use crate::error::{ActorFactoryError, Result};

/// 前缀表。新类型在此追加一行并扩展 `ActorKind`。
const KIND_PATTERNS: &[(&str, ActorKind)] = &[
    ("vehicle.", ActorKind::Vehicle),
    ("sensor.", ActorKind::Sensor),
    ("sensor.camera", ActorKind::Camera),
    ("sensor.lidar.", ActorKind::Lidar),
    ("sensor.other.imu", ActorKind::Imu),
    ("sensor.other.gnss", ActorKind::Gnss),
    ("sensor.other.radar", ActorKind::Radar),
];

/// 按蓝图名解析类型，未匹配时为 `Generic`
pub fn resolve_kind(blueprint: &str) -> ActorKind {
    KIND_PATTERNS
        .iter()
        .filter(|(pattern, _)| blueprint.starts_with(pattern))
        .map(|(_, kind)| *kind)
        .max_by_key(|kind| kind.depth())
        .unwrap_or(ActorKind::Generic)
}

/// 解析类型；给出显式类型时要求它是解析结果本身或其泛化
pub fn resolve_kind_checked(blueprint: &str, explicit: Option<ActorKind>) -> Result<ActorKind> {
    let resolved = resolve_kind(blueprint);
    match explicit {
        None => Ok(resolved),
        Some(kind) if kind.generalises(resolved) => Ok(kind),
        Some(kind) => Err(ActorFactoryError::kind_mismatch(blueprint, kind, resolved)),
    }
}
