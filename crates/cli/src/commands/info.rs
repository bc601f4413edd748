//! `info` command implementation.

use std::collections::BTreeMap;

use anyhow::Context;
use contracts::ContextBlueprint;
use serde::Serialize;
use tracing::info;

use super::load_blueprint;
use super::validate::resolved_kind;
use crate::cli::InfoArgs;
use crate::error::{CliError, Result};

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    world: WorldInfo,
    sync: SyncInfo,
    actors: Vec<ActorInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    proxies: Vec<ProxyInfo>,
}

#[derive(Serialize)]
struct WorldInfo {
    carla_host: String,
    carla_port: u16,
    timeout_sec: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    map: Option<String>,
    reload_world: bool,
}

#[derive(Serialize)]
struct SyncInfo {
    primary_mode: bool,
    fixed_delta_sec: f64,
    strict_timing: bool,
}

#[derive(Serialize)]
struct ActorInfo {
    id: String,
    blueprint: String,
    kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent: Option<String>,
    physics: bool,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    attributes: BTreeMap<String, String>,
}

#[derive(Serialize)]
struct ProxyInfo {
    name: String,
    proxy_type: String,
    actor: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    params: BTreeMap<String, String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    let blueprint = load_blueprint(&args.config)?;

    if args.json {
        let info = build_config_info(&blueprint);
        let json = serde_json::to_string_pretty(&info)
            .context("Failed to serialize config info")
            .map_err(CliError::from)?;
        println!("{json}");
    } else {
        print_config_info(&blueprint);
    }

    Ok(())
}

fn build_config_info(blueprint: &ContextBlueprint) -> ConfigInfo {
    let actors = blueprint
        .actors
        .iter()
        .map(|a| ActorInfo {
            id: a.id.clone(),
            blueprint: a.blueprint.clone(),
            kind: resolved_kind(a).to_string(),
            parent: a.parent.clone(),
            physics: a.physics,
            attributes: a.attributes.clone().into_iter().collect(),
        })
        .collect();

    let proxies = blueprint
        .proxies
        .iter()
        .map(|p| ProxyInfo {
            name: p.name.clone(),
            proxy_type: format!("{:?}", p.proxy_type),
            actor: p.actor.clone(),
            params: p.params.clone().into_iter().collect(),
        })
        .collect();

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        world: WorldInfo {
            carla_host: blueprint.world.carla_host.clone(),
            carla_port: blueprint.world.carla_port,
            timeout_sec: blueprint.world.timeout_sec,
            map: blueprint.world.map.clone(),
            reload_world: blueprint.world.reload_world,
        },
        sync: SyncInfo {
            primary_mode: blueprint.sync.primary_mode,
            fixed_delta_sec: blueprint.sync.fixed_delta_sec,
            strict_timing: blueprint.sync.strict_timing,
        },
        actors,
        proxies,
    }
}

fn print_config_info(blueprint: &ContextBlueprint) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                 carla-utils Configuration                    ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let world = &blueprint.world;
    println!("📍 World");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!("   ├─ CARLA Server: {}:{} (timeout {}s)", world.carla_host, world.carla_port, world.timeout_sec);
    match (&world.map, world.reload_world) {
        (Some(map), _) => println!("   └─ Map: {map}"),
        (None, true) => println!("   └─ Map: (reload current)"),
        (None, false) => println!("   └─ Map: (current)"),
    }

    let sync = &blueprint.sync;
    println!("\n⚙️  Sync Settings");
    if sync.primary_mode {
        println!("   ├─ Mode: synchronous, Δt = {}s", sync.fixed_delta_sec);
        println!("   └─ Strict timing: {}", sync.strict_timing);
    } else {
        println!("   └─ Mode: free-running");
    }

    // indent children under their parent
    println!("\n🚗 Actors ({})", blueprint.actors.len());
    let roots: Vec<_> = blueprint.actors.iter().filter(|a| a.parent.is_none()).collect();
    for (i, actor) in roots.iter().enumerate() {
        print_actor(blueprint, actor, "   ", i == roots.len() - 1);
    }

    if !blueprint.proxies.is_empty() {
        println!("\n📤 Proxies ({})", blueprint.proxies.len());
        for (i, proxy) in blueprint.proxies.iter().enumerate() {
            let prefix = if i == blueprint.proxies.len() - 1 { "└─" } else { "├─" };
            let target = proxy
                .params
                .get(if proxy.proxy_type.is_udp() { "addr" } else { "dir" })
                .map(String::as_str)
                .unwrap_or("-");
            println!(
                "   {} {} ({:?}) <- {} -> {}",
                prefix, proxy.name, proxy.proxy_type, proxy.actor, target
            );
        }
    }

    println!();
}

fn print_actor(blueprint: &ContextBlueprint, actor: &contracts::ActorConfig, indent: &str, is_last: bool) {
    let prefix = if is_last { "└─" } else { "├─" };
    println!(
        "{indent}{prefix} {} ({}, {})",
        actor.id,
        actor.blueprint,
        resolved_kind(actor)
    );

    let children: Vec<_> = blueprint
        .actors
        .iter()
        .filter(|a| a.parent.as_deref() == Some(actor.id.as_str()))
        .collect();
    let child_indent = format!("{indent}{}", if is_last { "   " } else { "│  " });
    for (i, child) in children.iter().enumerate() {
        print_actor(blueprint, child, &child_indent, i == children.len() - 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config_loader::{ConfigFormat, ConfigLoader};

    #[test]
    fn test_info_resolves_kinds() {
        let blueprint = ConfigLoader::load_from_str(
            r#"
[world]

[[actors]]
id = "ego"
blueprint = "vehicle.tesla.model3"

[[actors]]
id = "radar"
blueprint = "sensor.other.radar"
parent = "ego"

[[proxies]]
name = "radar-udp"
type = "radar_udp"
actor = "radar"
params = { addr = "127.0.0.1:9100", format = "json" }
"#,
            ConfigFormat::Toml,
        )
        .unwrap();

        let info = build_config_info(&blueprint);
        assert_eq!(info.actors[0].kind, "vehicle");
        assert_eq!(info.actors[1].kind, "radar");
        assert_eq!(info.actors[1].parent.as_deref(), Some("ego"));
        assert_eq!(info.proxies[0].params["format"], "json");

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["world"]["carla_port"], 2000);
        assert!(json["world"].get("map").is_none());
    }
}
