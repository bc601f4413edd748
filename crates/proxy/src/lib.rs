//! # Proxy
//!
//! 把 actor 数据转发给外部进程的代理。
//!
//! 每个代理两个 worker：
//! - actor 侧线程：等待数据脉冲或按间隔采样
//! - tokio 任务：向外投递 (UDP / PNG 文件 / watch 订阅者)
//!
//! 两者之间是有界 `mpsc` 通道；队列满时丢弃并计数。
//!
//! ## 使用示例
//!
//! ```ignore
//! use proxy::{start_sensor_udp, ProxyOptions, TelemetryFormat};
//!
//! let proxy = start_sensor_udp(&imu, "127.0.0.1:9000".parse()?, TelemetryFormat::Binary, ProxyOptions::default()).await?;
//! // ...
//! proxy.stop().await?;
//! ```

pub mod camera;
pub mod encode;
pub mod error;
pub mod factory;
pub mod handle;
pub mod keyboard;
pub mod metrics;
pub mod output;
pub mod telemetry;
pub mod vehicle_status;

pub use camera::{
    source_size, start_camera_frames, CameraDisplayProxy, CameraFrame, FrameFileOutput,
    DEFAULT_SOURCE_SIZE,
};
pub use encode::{encode_snapshot, TelemetryFormat};
pub use error::{ProxyError, Result};
pub use factory::{start_from_config, FrameParams, UdpParams};
pub use handle::{default_name, ProxyHandle, ProxyOptions};
pub use keyboard::{status_lines, Key, KeyboardController, VehicleControlProxy};
pub use metrics::{MetricsSnapshot, ProxyMetrics};
pub use output::{LocalProxyOutput, ProxyOutput, UdpOutput, WatchOutput};
pub use telemetry::start_sensor_udp;
pub use vehicle_status::{encode_status, start_vehicle_status_udp};
