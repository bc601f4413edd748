//! CARLA 传感器数据转换
//!
//! 将 CARLA 原生传感器数据转换为 `SensorMeasurement`。
//! 仅在 `real-carla` feature 启用时编译。

use bytes::Bytes;
use carla::sensor::data::{
    GnssMeasurement, Image, ImuMeasurement, LidarMeasurement, RadarMeasurement,
};
use carla::sensor::{SensorData, SensorDataBase};
use contracts::{
    ActorKind, GnssData, ImageData, ImageFormat, ImuData, LidarData, LidarPoint, RadarData,
    RadarDetection, SensorMeasurement, SensorPayload, Vector3,
};

use crate::carla_client::from_carla_transform;

fn image_to_payload(image: &Image) -> SensorPayload {
    SensorPayload::Image(ImageData {
        width: image.width() as u32,
        height: image.height() as u32,
        fov: image.fov_angle() as f64,
        format: ImageFormat::Bgra8,
        data: Bytes::copy_from_slice(image.as_raw_bytes()),
    })
}

fn lidar_to_payload(lidar: &LidarMeasurement) -> SensorPayload {
    let points: Vec<LidarPoint> = lidar
        .as_slice()
        .iter()
        .map(|d| LidarPoint {
            x: d.point.x,
            y: d.point.y,
            z: d.point.z,
            intensity: d.intensity,
        })
        .collect();
    SensorPayload::Lidar(LidarData::from_points(
        lidar.channel_count() as u32,
        lidar.horizontal_angle() as f64,
        &points,
    ))
}

fn imu_to_payload(imu: &ImuMeasurement) -> SensorPayload {
    let accel = imu.accelerometer();
    let gyro = imu.gyroscope();
    SensorPayload::Imu(ImuData {
        accelerometer: Vector3::new(accel.x as f64, accel.y as f64, accel.z as f64),
        gyroscope: Vector3::new(gyro.x as f64, gyro.y as f64, gyro.z as f64),
        compass: imu.compass() as f64,
    })
}

fn gnss_to_payload(gnss: &GnssMeasurement) -> SensorPayload {
    SensorPayload::Gnss(GnssData {
        latitude: gnss.latitude(),
        longitude: gnss.longitude(),
        altitude: gnss.attitude(), // Note: carla-rust uses attitude() for altitude
    })
}

fn radar_to_payload(radar: &RadarMeasurement) -> SensorPayload {
    SensorPayload::Radar(RadarData {
        detections: radar
            .as_slice()
            .iter()
            .map(|d| RadarDetection {
                altitude: d.altitude,
                azimuth: d.azimuth,
                depth: d.depth,
                velocity: d.velocity,
            })
            .collect(),
    })
}

/// 按 actor 类型转换传感器数据
///
/// 数据类型与 actor 类型不匹配时返回 None。
pub fn convert_sensor_data(kind: ActorKind, data: &SensorData) -> Option<SensorMeasurement> {
    let payload = match kind {
        ActorKind::Camera => image_to_payload(&Image::try_from(data.clone()).ok()?),
        ActorKind::Lidar => lidar_to_payload(&LidarMeasurement::try_from(data.clone()).ok()?),
        ActorKind::Imu => imu_to_payload(&ImuMeasurement::try_from(data.clone()).ok()?),
        ActorKind::Gnss => gnss_to_payload(&GnssMeasurement::try_from(data.clone()).ok()?),
        ActorKind::Radar => radar_to_payload(&RadarMeasurement::try_from(data.clone()).ok()?),
        _ => SensorPayload::Raw(Bytes::new()),
    };

    Some(SensorMeasurement {
        frame: data.frame() as u64,
        timestamp: data.timestamp(),
        transform: from_carla_transform(&data.sensor_transform()),
        payload,
    })
}
