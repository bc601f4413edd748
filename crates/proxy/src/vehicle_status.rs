//! 车辆状态 UDP 代理 (JSON)

use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;

use actor_factory::ActorHandle;
use bytes::Bytes;
use contracts::VehicleStatus;
use tracing::{debug, info};

use crate::error::{ProxyError, Result};
use crate::handle::{ProxyHandle, ProxyOptions};
use crate::output::UdpOutput;

/// 序列化一个状态样本
pub fn encode_status(status: &VehicleStatus) -> Result<Bytes> {
    serde_json::to_vec(status)
        .map(Bytes::from)
        .map_err(|e| ProxyError::encode("vehicle status", e.to_string()))
}

/// 每个间隔采样一次 `vehicle`，以 JSON 发送状态
pub async fn start_vehicle_status_udp(
    vehicle: Arc<ActorHandle>,
    target: SocketAddr,
    options: ProxyOptions,
) -> Result<ProxyHandle> {
    // 类型检查放在启动前
    vehicle.vehicle()?;

    let identity = options.identity("VehicleStatus");
    let output = UdpOutput::bind(identity.1.clone(), target).await?;

    let actor = Arc::clone(&vehicle);
    let produce = move |interval| -> Option<Bytes> {
        thread::sleep(interval);
        let status = match actor.vehicle().and_then(|v| v.status()) {
            Ok(status) => status,
            Err(e) => {
                debug!(handle = %actor.id(), error = %e, "Vehicle status unavailable");
                return None;
            }
        };
        encode_status(&status).ok()
    };

    let handle = ProxyHandle::spawn(identity, &options, produce, output)?;
    info!(
        proxy = handle.name(),
        vehicle = %vehicle.id(),
        %target,
        interval_ms = options.running_interval.as_millis() as u64,
        "Vehicle status proxy started"
    );
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use actor_factory::{ActorRegistry, ActorRequest, MockSimulator};
    use contracts::{Vector3, WorldSlot};
    use tokio::net::UdpSocket;

    #[tokio::test]
    async fn test_status_json_over_udp() {
        let sim = MockSimulator::new();
        let slot = WorldSlot::shared();
        slot.set(sim.world_handle());
        let registry = ActorRegistry::new(slot);
        let vehicle = registry
            .new_actor(ActorRequest::new("vehicle.tesla.model3"))
            .unwrap();
        registry.spawn(&[vehicle.clone()]).unwrap();
        sim.set_actor_velocity(vehicle.actor_id().unwrap(), Vector3::new(3.0, 4.0, 0.0));

        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let options = ProxyOptions {
            running_interval: Duration::from_millis(20),
            ..ProxyOptions::default()
        };
        let proxy = start_vehicle_status_udp(vehicle, receiver.local_addr().unwrap(), options)
            .await
            .unwrap();
        assert!(proxy.name().starts_with("VehicleStatus-"));

        let mut buf = vec![0u8; 4096];
        let n = tokio::time::timeout(Duration::from_secs(2), receiver.recv(&mut buf))
            .await
            .unwrap()
            .unwrap();
        let status: VehicleStatus = serde_json::from_slice(&buf[..n]).unwrap();
        assert!((status.speed - 5.0).abs() < 1e-9);

        proxy.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_sensor_actor() {
        let sim = MockSimulator::new();
        let slot = WorldSlot::shared();
        slot.set(sim.world_handle());
        let registry = ActorRegistry::new(slot);
        let imu = registry.new_actor(ActorRequest::new("sensor.other.imu")).unwrap();

        let result = start_vehicle_status_udp(imu, "127.0.0.1:9".parse().unwrap(), ProxyOptions::default()).await;
        assert!(matches!(result, Err(ProxyError::Actor(_))));
    }
}
