//! 配置校验模块
//!
//! 校验规则：
//! - 字段级规则 (`validator` derive)：非空 id、端口、超时 > 0
//! - actor id 唯一，父节点存在且无环
//! - 同步模式下 fixed_delta_sec > 0
//! - proxy 名称唯一，引用的 actor 存在，参数合法 (UDP 需要 addr，camera_frames 需要 dir)

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;

use contracts::{ContextBlueprint, ContractError};
use validator::Validate;

/// 校验 ContextBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &ContextBlueprint) -> Result<(), ContractError> {
    validate_fields(blueprint)?;
    validate_sync_config(blueprint)?;
    validate_actor_ids(blueprint)?;
    validate_actor_tree(blueprint)?;
    validate_proxies(blueprint)?;
    Ok(())
}

/// 字段级规则
fn validate_fields(blueprint: &ContextBlueprint) -> Result<(), ContractError> {
    blueprint
        .validate()
        .map_err(|e| ContractError::config_validation("blueprint", e.to_string()))
}

/// 校验同步配置
fn validate_sync_config(blueprint: &ContextBlueprint) -> Result<(), ContractError> {
    let sync = &blueprint.sync;
    if sync.primary_mode && sync.fixed_delta_sec <= 0.0 {
        return Err(ContractError::config_validation(
            "sync.fixed_delta_sec",
            format!(
                "fixed_delta_sec must be > 0 in primary mode, got {}",
                sync.fixed_delta_sec
            ),
        ));
    }
    Ok(())
}

/// 校验 actor id 唯一性
fn validate_actor_ids(blueprint: &ContextBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for actor in &blueprint.actors {
        if !seen.insert(&actor.id) {
            return Err(ContractError::config_validation(
                format!("actors[id={}]", actor.id),
                "duplicate actor id",
            ));
        }
    }
    Ok(())
}

/// 校验挂载拓扑：父节点存在、不成环且先于子节点声明
fn validate_actor_tree(blueprint: &ContextBlueprint) -> Result<(), ContractError> {
    let positions: HashMap<&str, usize> = blueprint
        .actors
        .iter()
        .enumerate()
        .map(|(i, a)| (a.id.as_str(), i))
        .collect();
    let parents: HashMap<&str, Option<&str>> = blueprint
        .actors
        .iter()
        .map(|a| (a.id.as_str(), a.parent.as_deref()))
        .collect();

    for actor in &blueprint.actors {
        if let Some(parent) = actor.parent.as_deref() {
            if !parents.contains_key(parent) {
                return Err(ContractError::config_validation(
                    format!("actors[{}].parent", actor.id),
                    format!("parent '{parent}' not found"),
                ));
            }
        }

        let mut visited = HashSet::from([actor.id.as_str()]);
        let mut current = actor.parent.as_deref();
        while let Some(id) = current {
            if !visited.insert(id) {
                return Err(ContractError::config_validation(
                    format!("actors[{}].parent", actor.id),
                    "attachment cycle detected",
                ));
            }
            current = parents.get(id).copied().flatten();
        }
    }

    for (index, actor) in blueprint.actors.iter().enumerate() {
        if let Some(parent) = actor.parent.as_deref() {
            if positions.get(parent).is_some_and(|&p| p >= index) {
                return Err(ContractError::config_validation(
                    format!("actors[{}].parent", actor.id),
                    format!("parent '{parent}' must be declared before its children"),
                ));
            }
        }
    }
    Ok(())
}

/// 校验 proxy 配置
fn validate_proxies(blueprint: &ContextBlueprint) -> Result<(), ContractError> {
    let mut names = HashSet::new();
    for proxy in &blueprint.proxies {
        let field = |name: &str| format!("proxies[{}].{}", proxy.name, name);

        if !names.insert(&proxy.name) {
            return Err(ContractError::config_validation(
                field("name"),
                "duplicate proxy name",
            ));
        }

        if blueprint.actor(&proxy.actor).is_none() {
            return Err(ContractError::config_validation(
                field("actor"),
                format!("actor '{}' not found", proxy.actor),
            ));
        }

        if proxy.proxy_type.is_udp() {
            let addr = proxy
                .params
                .get("addr")
                .ok_or_else(|| ContractError::config_validation(field("params.addr"), "missing addr"))?;
            addr.parse::<SocketAddr>().map_err(|e| {
                ContractError::config_validation(field("params.addr"), format!("'{addr}': {e}"))
            })?;
        } else if proxy.params.get("dir").is_none_or(|d| d.trim().is_empty()) {
            return Err(ContractError::config_validation(
                field("params.dir"),
                "missing output directory",
            ));
        }

        if let Some(format) = proxy.params.get("format") {
            if format != "binary" && format != "json" {
                return Err(ContractError::config_validation(
                    field("params.format"),
                    format!("expected 'binary' or 'json', got '{format}'"),
                ));
            }
        }

        if let Some(interval) = proxy.params.get("interval_ms") {
            match interval.parse::<u64>() {
                Ok(ms) if ms > 0 => {}
                _ => {
                    return Err(ContractError::config_validation(
                        field("params.interval_ms"),
                        format!("interval_ms must be a positive integer, got '{interval}'"),
                    ))
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{
        ActorConfig, ConfigVersion, ProxyConfig, ProxyType, SyncConfig, Transform, WorldConfig,
    };

    fn actor(id: &str, blueprint: &str, parent: Option<&str>) -> ActorConfig {
        ActorConfig {
            id: id.into(),
            blueprint: blueprint.into(),
            kind: None,
            parent: parent.map(Into::into),
            transform: Transform::default(),
            attributes: Default::default(),
            physics: true,
        }
    }

    fn minimal_blueprint() -> ContextBlueprint {
        ContextBlueprint {
            version: ConfigVersion::V1,
            world: WorldConfig::default(),
            sync: SyncConfig {
                primary_mode: true,
                fixed_delta_sec: 0.05,
                strict_timing: false,
            },
            actors: vec![
                actor("ego", "vehicle.tesla.model3", None),
                actor("imu", "sensor.other.imu", Some("ego")),
            ],
            proxies: vec![ProxyConfig {
                name: "imu_out".into(),
                proxy_type: ProxyType::ImuUdp,
                actor: "imu".into(),
                params: HashMap::from([("addr".to_string(), "127.0.0.1:9100".to_string())]),
            }],
        }
    }

    #[test]
    fn test_valid_config() {
        let bp = minimal_blueprint();
        assert!(validate(&bp).is_ok(), "{:?}", validate(&bp));
    }

    #[test]
    fn test_duplicate_actor_id() {
        let mut bp = minimal_blueprint();
        bp.actors.push(bp.actors[0].clone());
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("duplicate actor id"), "got: {err}");
    }

    #[test]
    fn test_missing_parent() {
        let mut bp = minimal_blueprint();
        bp.actors[1].parent = Some("ghost".into());
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("parent 'ghost' not found"), "got: {err}");
    }

    #[test]
    fn test_parent_cycle() {
        let mut bp = minimal_blueprint();
        bp.actors[0].parent = Some("imu".into());
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("cycle"), "got: {err}");
    }

    #[test]
    fn test_child_declared_before_parent() {
        let mut bp = minimal_blueprint();
        bp.actors.swap(0, 1);
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("declared before"), "got: {err}");
    }

    #[test]
    fn test_non_positive_fixed_delta_in_primary_mode() {
        let mut bp = minimal_blueprint();
        bp.sync.fixed_delta_sec = 0.0;
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("fixed_delta_sec"), "got: {err}");

        bp.sync.primary_mode = false;
        assert!(validate(&bp).is_ok());
    }

    #[test]
    fn test_non_positive_timeout() {
        let mut bp = minimal_blueprint();
        bp.world.timeout_sec = -1.0;
        assert!(matches!(
            validate(&bp),
            Err(ContractError::ConfigValidation { .. })
        ));
    }

    #[test]
    fn test_proxy_unknown_actor() {
        let mut bp = minimal_blueprint();
        bp.proxies[0].actor = "lidar".into();
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("actor 'lidar' not found"), "got: {err}");
    }

    #[test]
    fn test_proxy_bad_addr() {
        let mut bp = minimal_blueprint();
        bp.proxies[0]
            .params
            .insert("addr".into(), "not-an-address".into());
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("params.addr"), "got: {err}");
    }

    #[test]
    fn test_camera_frames_needs_dir_not_addr() {
        let mut bp = minimal_blueprint();
        bp.actors.push(actor("cam", "sensor.camera.rgb", Some("ego")));
        bp.proxies.push(ProxyConfig {
            name: "front".into(),
            proxy_type: ProxyType::CameraFrames,
            actor: "cam".into(),
            params: HashMap::new(),
        });
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("params.dir"), "got: {err}");

        bp.proxies[1]
            .params
            .insert("dir".into(), "frames/front".into());
        assert!(validate(&bp).is_ok(), "{:?}", validate(&bp));
    }

    #[test]
    fn test_proxy_bad_format_and_interval() {
        let mut bp = minimal_blueprint();
        bp.proxies[0].params.insert("format".into(), "xml".into());
        assert!(validate(&bp).is_err());

        let mut bp = minimal_blueprint();
        bp.proxies[0].params.insert("interval_ms".into(), "0".into());
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("interval_ms"), "got: {err}");
    }

    #[test]
    fn test_duplicate_proxy_name() {
        let mut bp = minimal_blueprint();
        bp.proxies.push(bp.proxies[0].clone());
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("duplicate proxy name"), "got: {err}");
    }
}
