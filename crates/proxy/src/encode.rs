//! UDP 遥测报文编码
//!
//! 二进制格式统一为大端序，4 字节报文头：类型字节 + 3 个保留零字节。
//!
//! | 类型 | 载荷 |
//! |------|------|
//! | `0x01` Radar | i32 检测数，每个检测 i32 序号 + x, y, vx, vy (f32) |
//! | `0x02` GNSS  | latitude, longitude, altitude (f32) |
//! | `0x03` IMU   | accel x/y/z, compass, gyro x/y/z (f32) |
//! | `0x04` LiDAR | i32 点数 |

use std::str::FromStr;

use actor_factory::SensorSnapshot;
use bytes::{BufMut, Bytes, BytesMut};
use contracts::{GnssData, ImuData, LidarData, RadarData, SensorPayload};

use crate::error::{ProxyError, Result};

pub const MSG_RADAR: u8 = 0x01;
pub const MSG_GNSS: u8 = 0x02;
pub const MSG_IMU: u8 = 0x03;
pub const MSG_LIDAR: u8 = 0x04;

/// 报文头长度
pub const HEADER_LEN: usize = 4;

/// 遥测序列化格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TelemetryFormat {
    /// 定长大端二进制
    #[default]
    Binary,
    /// 整条测量的 JSON 文档
    Json,
}

impl FromStr for TelemetryFormat {
    type Err = ProxyError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "binary" => Ok(Self::Binary),
            "json" => Ok(Self::Json),
            other => Err(ProxyError::invalid_argument(
                "format",
                format!("unknown format '{other}', expected binary or json"),
            )),
        }
    }
}

fn header(buf: &mut BytesMut, msg_type: u8) {
    buf.put_u8(msg_type);
    buf.put_bytes(0, 3);
}

pub fn encode_imu(imu: &ImuData) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + 7 * 4);
    header(&mut buf, MSG_IMU);
    for value in [
        imu.accelerometer.x,
        imu.accelerometer.y,
        imu.accelerometer.z,
        imu.compass,
        imu.gyroscope.x,
        imu.gyroscope.y,
        imu.gyroscope.z,
    ] {
        buf.put_f32(value as f32);
    }
    buf.freeze()
}

pub fn encode_gnss(gnss: &GnssData) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + 3 * 4);
    header(&mut buf, MSG_GNSS);
    buf.put_f32(gnss.latitude as f32);
    buf.put_f32(gnss.longitude as f32);
    buf.put_f32(gnss.altitude as f32);
    buf.freeze()
}

/// 检测点投影到传感器平面：位置与径向速度分量
pub fn encode_radar(radar: &RadarData) -> Bytes {
    let count = radar.detections.len();
    let mut buf = BytesMut::with_capacity(HEADER_LEN + 4 + count * 20);
    header(&mut buf, MSG_RADAR);
    buf.put_i32(count as i32);

    for (index, d) in radar.detections.iter().enumerate() {
        let forward = d.azimuth.cos() * (-d.altitude).cos();
        let lateral = (-d.azimuth).sin() * d.altitude.cos();
        buf.put_i32(index as i32);
        buf.put_f32(d.depth * forward);
        buf.put_f32(d.depth * lateral);
        buf.put_f32(d.velocity * forward);
        buf.put_f32(d.velocity * lateral);
    }
    buf.freeze()
}

pub fn encode_lidar(lidar: &LidarData) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + 4);
    header(&mut buf, MSG_LIDAR);
    buf.put_i32(lidar.num_points as i32);
    buf.freeze()
}

/// 按格式编码一条快照
///
/// 二进制格式不支持的载荷 (图像、原始字节) 返回 `Ok(None)`。
pub fn encode_snapshot(snapshot: &SensorSnapshot, format: TelemetryFormat) -> Result<Option<Bytes>> {
    match format {
        TelemetryFormat::Json => serde_json::to_vec(&snapshot.measurement)
            .map(|v| Some(Bytes::from(v)))
            .map_err(|e| ProxyError::encode("measurement", e.to_string())),
        TelemetryFormat::Binary => Ok(match &snapshot.measurement.payload {
            SensorPayload::Imu(imu) => Some(encode_imu(imu)),
            SensorPayload::Gnss(gnss) => Some(encode_gnss(gnss)),
            SensorPayload::Radar(radar) => Some(encode_radar(radar)),
            SensorPayload::Lidar(lidar) => Some(encode_lidar(lidar)),
            SensorPayload::Image(_) | SensorPayload::Raw(_) => None,
        }),
    }
}
