//! 根据 [`ProxyConfig`] 创建代理

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use actor_factory::ActorHandle;
use contracts::{ProxyConfig, ProxyType};
use tracing::instrument;

use crate::camera::start_camera_frames;
use crate::encode::TelemetryFormat;
use crate::error::{ProxyError, Result};
use crate::handle::{ProxyHandle, ProxyOptions};
use crate::telemetry::start_sensor_udp;
use crate::vehicle_status::start_vehicle_status_udp;

/// UDP 代理解析后的 `params`
#[derive(Debug, Clone, PartialEq)]
pub struct UdpParams {
    pub addr: SocketAddr,
    pub format: TelemetryFormat,
    pub interval: Option<Duration>,
}

impl UdpParams {
    pub fn parse(config: &ProxyConfig) -> Result<Self> {
        let addr = config
            .params
            .get("addr")
            .ok_or_else(|| ProxyError::invalid_argument("addr", "missing required param"))?
            .parse::<SocketAddr>()
            .map_err(|e| ProxyError::invalid_argument("addr", e.to_string()))?;

        let format = match config.params.get("format") {
            Some(format) => format.parse()?,
            None => TelemetryFormat::default(),
        };

        Ok(Self {
            addr,
            format,
            interval: parse_interval(config)?,
        })
    }
}

/// `camera_frames` 的参数
#[derive(Debug, Clone, PartialEq)]
pub struct FrameParams {
    pub dir: PathBuf,
    pub interval: Option<Duration>,
}

impl FrameParams {
    pub fn parse(config: &ProxyConfig) -> Result<Self> {
        let dir = config
            .params
            .get("dir")
            .filter(|d| !d.trim().is_empty())
            .ok_or_else(|| ProxyError::invalid_argument("dir", "missing required param"))?;

        Ok(Self {
            dir: PathBuf::from(dir),
            interval: parse_interval(config)?,
        })
    }
}

fn parse_interval(config: &ProxyConfig) -> Result<Option<Duration>> {
    let Some(raw) = config.params.get("interval_ms") else {
        return Ok(None);
    };
    let ms: u64 = raw
        .parse()
        .map_err(|_| ProxyError::invalid_argument("interval_ms", format!("'{raw}' is not an integer")))?;
    if ms == 0 {
        return Err(ProxyError::invalid_argument("interval_ms", "must be > 0"));
    }
    Ok(Some(Duration::from_millis(ms)))
}

fn options_for(config: &ProxyConfig, interval: Option<Duration>) -> ProxyOptions {
    let mut options = ProxyOptions::named(config.name.clone());
    if let Some(interval) = interval {
        options.running_interval = interval;
    }
    options
}

/// 按 `config` 在 `actor` 上启动代理
#[instrument(name = "proxy_start_from_config", skip(config, actor), fields(proxy = %config.name))]
pub async fn start_from_config(config: &ProxyConfig, actor: &Arc<ActorHandle>) -> Result<ProxyHandle> {
    let required = config.proxy_type.required_kind();
    if !required.generalises(actor.kind()) {
        return Err(ProxyError::invalid_argument(
            "actor",
            format!(
                "proxy '{}' needs a {} actor, '{}' is {}",
                config.name,
                required,
                config.actor,
                actor.kind()
            ),
        ));
    }

    match config.proxy_type {
        ProxyType::CameraFrames => {
            let params = FrameParams::parse(config)?;
            let options = options_for(config, params.interval);
            start_camera_frames(actor, params.dir, options).await
        }
        ProxyType::VehicleStatusUdp => {
            let params = UdpParams::parse(config)?;
            let options = options_for(config, params.interval);
            start_vehicle_status_udp(Arc::clone(actor), params.addr, options).await
        }
        ProxyType::ImuUdp | ProxyType::GnssUdp | ProxyType::RadarUdp | ProxyType::LidarUdp => {
            let params = UdpParams::parse(config)?;
            let options = options_for(config, params.interval);
            start_sensor_udp(actor, params.addr, params.format, options).await
        }
    }
}
