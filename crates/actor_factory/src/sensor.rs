//! 传感器 actor
//!
//! 每个传感器句柄持有一个 [`SensorChannel`]：最新解码的测量加一个瞬时数据更新脉冲。
//! 原生 listen 回调在客户端库线程上写入通道。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use contracts::{
    GnssData, ImageData, ImuData, LidarData, MeasurementCallback, NativeActor, Pulse,
    RadarData, SensorMeasurement, SensorPayload,
};
use parking_lot::Mutex;
use tracing::{debug, instrument};

use crate::error::{ActorFactoryError, Result};
use crate::handle::ActorHandle;

/// 带客户端接收时间的测量
#[derive(Debug, Clone)]
pub struct SensorSnapshot {
    pub measurement: SensorMeasurement,
    pub received_at: DateTime<Utc>,
}

impl SensorSnapshot {
    pub fn image(&self) -> Option<&ImageData> {
        match &self.measurement.payload {
            SensorPayload::Image(data) => Some(data),
            _ => None,
        }
    }

    pub fn lidar(&self) -> Option<&LidarData> {
        match &self.measurement.payload {
            SensorPayload::Lidar(data) => Some(data),
            _ => None,
        }
    }

    pub fn imu(&self) -> Option<&ImuData> {
        match &self.measurement.payload {
            SensorPayload::Imu(data) => Some(data),
            _ => None,
        }
    }

    pub fn gnss(&self) -> Option<&GnssData> {
        match &self.measurement.payload {
            SensorPayload::Gnss(data) => Some(data),
            _ => None,
        }
    }

    pub fn radar(&self) -> Option<&RadarData> {
        match &self.measurement.payload {
            SensorPayload::Radar(data) => Some(data),
            _ => None,
        }
    }
}

/// 单个传感器的最新测量与数据更新脉冲
#[derive(Debug, Default)]
pub struct SensorChannel {
    latest: Mutex<Option<Arc<SensorSnapshot>>>,
    updated: Pulse,
    received: AtomicU64,
}

impl SensorChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// 先存测量，再触发脉冲
    pub fn publish(&self, measurement: SensorMeasurement) {
        let snapshot = Arc::new(SensorSnapshot {
            measurement,
            received_at: Utc::now(),
        });
        *self.latest.lock() = Some(snapshot);
        self.received.fetch_add(1, Ordering::Relaxed);
        self.updated.fire();
    }

    pub fn latest(&self) -> Option<Arc<SensorSnapshot>> {
        self.latest.lock().clone()
    }

    pub fn pulse(&self) -> &Pulse {
        &self.updated
    }

    /// 创建以来收到的测量数
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    /// 等待并返回下一个测量
    pub fn wait_for_data(&self, timeout: Option<Duration>) -> Option<Arc<SensorSnapshot>> {
        if self.updated.wait(timeout) {
            self.latest()
        } else {
            None
        }
    }

    pub(crate) fn callback(self: &Arc<Self>) -> MeasurementCallback {
        let channel = Arc::clone(self);
        Arc::new(move |measurement| channel.publish(measurement))
    }
}

/// actor 句柄的传感器视图
pub struct Sensor<'a> {
    handle: &'a ActorHandle,
    channel: &'a Arc<SensorChannel>,
}

impl<'a> Sensor<'a> {
    pub(crate) fn new(handle: &'a ActorHandle, channel: &'a Arc<SensorChannel>) -> Self {
        Self { handle, channel }
    }

    /// 最近一次测量
    pub fn data(&self) -> Option<Arc<SensorSnapshot>> {
        self.channel.latest()
    }

    /// 每个新测量触发一次，只有正在等待的线程能看到
    pub fn data_pulse(&self) -> &Pulse {
        self.channel.pulse()
    }

    /// 共享通道，供生命周期长于借用的消费者使用
    pub fn channel(&self) -> Arc<SensorChannel> {
        Arc::clone(self.channel)
    }

    pub fn wait_for_data(&self, timeout: Option<Duration>) -> Option<Arc<SensorSnapshot>> {
        self.channel.wait_for_data(timeout)
    }

    pub fn is_listening(&self) -> bool {
        self.handle
            .live_native()
            .and_then(|native| native.as_sensor().map(|s| s.is_listening()))
            .unwrap_or(false)
    }

    #[instrument(name = "sensor_start_listen", skip(self), fields(handle = %self.handle.id()))]
    pub fn start_listening(&self) -> Result<()> {
        let native = self.handle.ensure_alive()?;
        start_listening(native.as_ref(), self.channel)
    }

    #[instrument(name = "sensor_stop_listen", skip(self), fields(handle = %self.handle.id()))]
    pub fn stop_listening(&self) -> Result<()> {
        let native = self.handle.ensure_alive()?;
        match native.as_sensor() {
            Some(sensor) => Ok(sensor.stop()?),
            None => Err(no_sensor_interface(native.as_ref())),
        }
    }
}

pub(crate) fn start_listening(native: &dyn NativeActor, channel: &Arc<SensorChannel>) -> Result<()> {
    match native.as_sensor() {
        Some(sensor) => {
            sensor.listen(channel.callback())?;
            debug!(actor_id = native.id(), "Sensor listening");
            Ok(())
        }
        None => Err(no_sensor_interface(native)),
    }
}

fn no_sensor_interface(native: &dyn NativeActor) -> ActorFactoryError {
    ActorFactoryError::invalid_argument(
        "actor",
        format!(
            "native actor {} ({}) has no sensor interface",
            native.id(),
            native.blueprint_id()
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::Transform;
    use std::thread;

    fn gnss(frame: u64) -> SensorMeasurement {
        SensorMeasurement {
            frame,
            timestamp: frame as f64 * 0.05,
            transform: Transform::default(),
            payload: SensorPayload::Gnss(GnssData {
                latitude: 48.0,
                longitude: 11.0,
                altitude: 500.0,
            }),
        }
    }

    #[test]
    fn test_publish_updates_snapshot() {
        let channel = SensorChannel::new();
        assert!(channel.latest().is_none());

        channel.publish(gnss(7));

        let snapshot = channel.latest().unwrap();
        assert_eq!(snapshot.measurement.frame, 7);
        assert_eq!(snapshot.gnss().map(|g| g.altitude), Some(500.0));
        assert!(snapshot.imu().is_none());
        assert_eq!(channel.received(), 1);
    }

    #[test]
    fn test_pulse_not_latched() {
        let channel = SensorChannel::new();
        channel.publish(gnss(1));

        assert!(channel.wait_for_data(Some(Duration::from_millis(20))).is_none());
    }

    #[test]
    fn test_wait_for_data_sees_new_measurement() {
        let channel = Arc::new(SensorChannel::new());
        let callback = channel.callback();
        let producer = thread::spawn(move || {
            for frame in 1..=50 {
                thread::sleep(Duration::from_millis(5));
                callback(gnss(frame));
            }
        });

        let snapshot = channel.wait_for_data(Some(Duration::from_secs(2))).unwrap();
        assert!(snapshot.measurement.frame >= 1);
        producer.join().unwrap();
    }
}
