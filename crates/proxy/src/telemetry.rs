//! 传感器 UDP 遥测代理

use std::net::SocketAddr;

use actor_factory::ActorHandle;
use bytes::Bytes;
use tracing::{info, warn};

use crate::encode::{encode_snapshot, TelemetryFormat};
use crate::error::Result;
use crate::handle::{ProxyHandle, ProxyOptions};
use crate::output::UdpOutput;

/// 把 `sensor` 的每个新测量转发到 `target`
///
/// 数据更新后立即发送最新快照；两次等待之间错过的脉冲通过接收计数补上。
pub async fn start_sensor_udp(
    sensor: &ActorHandle,
    target: SocketAddr,
    format: TelemetryFormat,
    options: ProxyOptions,
) -> Result<ProxyHandle> {
    let channel = sensor.sensor()?.channel();
    let identity = options.identity(sensor.kind().type_name());
    let output = UdpOutput::bind(identity.1.clone(), target).await?;

    let proxy_name = identity.1.clone();
    let mut last_seen = channel.received();
    let produce = move |interval| -> Option<Bytes> {
        if channel.received() == last_seen && !channel.pulse().wait(Some(interval)) {
            return None;
        }
        last_seen = channel.received();

        let snapshot = channel.latest()?;
        match encode_snapshot(&snapshot, format) {
            Ok(packet) => packet,
            Err(e) => {
                warn!(proxy = %proxy_name, frame = snapshot.measurement.frame, error = %e, "Encode failed");
                None
            }
        }
    };

    let handle = ProxyHandle::spawn(identity, &options, produce, output)?;
    info!(
        proxy = handle.name(),
        sensor = %sensor.id(),
        kind = %sensor.kind(),
        %target,
        ?format,
        "Sensor telemetry proxy started"
    );
    Ok(handle)
}
