//! 坐标与位姿值类型
//!
//! 与 CARLA 约定一致：位置单位米，旋转单位度。

use serde::{Deserialize, Serialize};

/// 3D 向量
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// 模长
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// 位置 (x, y, z) 单位：米
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Location {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// 两点间欧氏距离
    pub fn distance(&self, other: &Location) -> f64 {
        Vector3::new(self.x - other.x, self.y - other.y, self.z - other.z).magnitude()
    }
}

/// 旋转 (pitch, yaw, roll) 单位：度
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    pub pitch: f64,
    pub yaw: f64,
    pub roll: f64,
}

impl Rotation {
    pub fn new(pitch: f64, yaw: f64, roll: f64) -> Self {
        Self { pitch, yaw, roll }
    }
}

/// 3D 变换：位置 + 旋转
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// 位置 (x, y, z) 单位：米
    #[serde(default)]
    pub location: Location,

    /// 旋转 (pitch, yaw, roll) 单位：度
    #[serde(default)]
    pub rotation: Rotation,
}

impl Transform {
    pub fn new(location: Location, rotation: Rotation) -> Self {
        Self { location, rotation }
    }

    /// 仅指定位置，旋转为零
    pub fn from_xyz(x: f64, y: f64, z: f64) -> Self {
        Self::new(Location::new(x, y, z), Rotation::default())
    }

    /// 按字段覆盖，未给出的字段保持不变
    pub fn patched(&self, patch: &TransformPatch) -> Self {
        Self {
            location: Location {
                x: patch.x.unwrap_or(self.location.x),
                y: patch.y.unwrap_or(self.location.y),
                z: patch.z.unwrap_or(self.location.z),
            },
            rotation: Rotation {
                pitch: patch.pitch.unwrap_or(self.rotation.pitch),
                yaw: patch.yaw.unwrap_or(self.rotation.yaw),
                roll: patch.roll.unwrap_or(self.rotation.roll),
            },
        }
    }
}

/// 位姿的逐字段修改
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformPatch {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
    pub pitch: Option<f64>,
    pub yaw: Option<f64>,
    pub roll: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_magnitude() {
        assert!((Vector3::new(3.0, 4.0, 0.0).magnitude() - 5.0).abs() < 1e-12);
        assert_eq!(Vector3::ZERO.magnitude(), 0.0);
    }

    #[test]
    fn test_transform_patch_keeps_unset_fields() {
        let base = Transform::new(Location::new(1.0, 2.0, 3.0), Rotation::new(4.0, 5.0, 6.0));
        let patched = base.patched(&TransformPatch {
            y: Some(20.0),
            yaw: Some(90.0),
            ..Default::default()
        });

        assert_eq!(patched.location, Location::new(1.0, 20.0, 3.0));
        assert_eq!(patched.rotation, Rotation::new(4.0, 90.0, 6.0));
    }

    #[test]
    fn test_transform_deserialize_partial() {
        let t: Transform = serde_json::from_str(r#"{"location": {"x": 1.0, "y": 0.0, "z": 2.5}}"#)
            .unwrap();
        assert_eq!(t.location.z, 2.5);
        assert_eq!(t.rotation, Rotation::default());
    }
}
