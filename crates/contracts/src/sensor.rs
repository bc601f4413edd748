//! SensorMeasurement - 传感器回调输出
//!
//! 解码后的传感器数据。

use bytemuck::{Pod, Zeroable};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{ActorKind, Transform, Vector3};

/// 传感器测量
///
/// 每次传感器回调产生一条。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorMeasurement {
    /// 帧序号
    pub frame: u64,

    /// CARLA 仿真时间戳 (seconds, f64)
    pub timestamp: f64,

    /// 测量时传感器的世界位姿
    pub transform: Transform,

    /// 数据载荷
    pub payload: SensorPayload,
}

impl SensorMeasurement {
    /// 载荷对应的 actor 类型
    pub fn kind(&self) -> ActorKind {
        match self.payload {
            SensorPayload::Image(_) => ActorKind::Camera,
            SensorPayload::Lidar(_) => ActorKind::Lidar,
            SensorPayload::Imu(_) => ActorKind::Imu,
            SensorPayload::Gnss(_) => ActorKind::Gnss,
            SensorPayload::Radar(_) => ActorKind::Radar,
            SensorPayload::Raw(_) => ActorKind::Sensor,
        }
    }
}

/// 传感器数据载荷
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SensorPayload {
    /// 图像数据
    Image(ImageData),

    /// LiDAR 点云
    Lidar(LidarData),

    /// IMU 数据
    Imu(ImuData),

    /// GNSS 数据
    Gnss(GnssData),

    /// Radar 数据
    Radar(RadarData),

    /// 原始字节 (fallback)
    Raw(Bytes),
}

/// 图像数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageData {
    /// 图像宽度
    pub width: u32,

    /// 图像高度
    pub height: u32,

    /// 水平视场角 (度)
    pub fov: f64,

    /// 像素格式
    pub format: ImageFormat,

    /// 原始像素数据
    pub data: Bytes,
}

/// 图像格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFormat {
    Bgra8,
    Depth,
    SemanticSeg,
}

/// LiDAR 单点，与 CARLA 内存布局一致
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable, Serialize, Deserialize)]
pub struct LidarPoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub intensity: f32,
}

/// LiDAR 点云数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LidarData {
    /// 激光线数
    pub channels: u32,

    /// 当前水平角 (rad)
    pub horizontal_angle: f64,

    /// 点数量
    pub num_points: u32,

    /// 点云数据，每点 16 字节: x,y,z,intensity
    pub data: Bytes,
}

impl LidarData {
    pub const POINT_STRIDE: usize = std::mem::size_of::<LidarPoint>();

    pub fn from_points(channels: u32, horizontal_angle: f64, points: &[LidarPoint]) -> Self {
        Self {
            channels,
            horizontal_angle,
            num_points: points.len() as u32,
            data: Bytes::copy_from_slice(bytemuck::cast_slice(points)),
        }
    }

    /// 解码点云，忽略末尾不完整的点
    pub fn points(&self) -> Vec<LidarPoint> {
        self.data
            .chunks_exact(Self::POINT_STRIDE)
            .map(bytemuck::pod_read_unaligned::<LidarPoint>)
            .collect()
    }
}

/// IMU 数据
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ImuData {
    /// 加速度计 (m/s²)
    pub accelerometer: Vector3,

    /// 陀螺仪 (rad/s)
    pub gyroscope: Vector3,

    /// 指南针 (rad)
    pub compass: f64,
}

/// GNSS 数据
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GnssData {
    /// 纬度 (度)
    pub latitude: f64,

    /// 经度 (度)
    pub longitude: f64,

    /// 高度 (米)
    pub altitude: f64,
}

/// Radar 单个检测点
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RadarDetection {
    /// 俯仰角 (rad)
    pub altitude: f32,

    /// 方位角 (rad)
    pub azimuth: f32,

    /// 距离 (m)
    pub depth: f32,

    /// 径向速度 (m/s)
    pub velocity: f32,
}

/// Radar 数据
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RadarData {
    pub detections: Vec<RadarDetection>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lidar_points_decode() {
        let points = vec![
            LidarPoint {
                x: 1.0,
                y: 2.0,
                z: 3.0,
                intensity: 0.5,
            },
            LidarPoint {
                x: -1.0,
                y: 0.0,
                z: 0.25,
                intensity: 1.0,
            },
        ];
        let lidar = LidarData::from_points(32, 0.1, &points);

        assert_eq!(lidar.num_points, 2);
        assert_eq!(lidar.data.len(), 2 * LidarData::POINT_STRIDE);
        assert_eq!(lidar.points(), points);
    }

    #[test]
    fn test_lidar_points_ignore_trailing_bytes() {
        let mut raw = vec![0u8; LidarData::POINT_STRIDE + 3];
        raw[..4].copy_from_slice(&2.0f32.to_ne_bytes());
        let lidar = LidarData {
            channels: 1,
            horizontal_angle: 0.0,
            num_points: 1,
            data: Bytes::from(raw),
        };

        let points = lidar.points();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].x, 2.0);
    }

    #[test]
    fn test_measurement_kind() {
        let m = SensorMeasurement {
            frame: 1,
            timestamp: 0.05,
            transform: Transform::default(),
            payload: SensorPayload::Gnss(GnssData::default()),
        };
        assert_eq!(m.kind(), ActorKind::Gnss);
    }
}
