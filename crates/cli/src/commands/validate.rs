//! `validate` command implementation.

use anyhow::Context;
use contracts::ContextBlueprint;
use serde::Serialize;
use tracing::info;

use super::load_blueprint;
use crate::cli::ValidateArgs;
use crate::error::{CliError, Result};

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    server: String,
    map: Option<String>,
    primary_mode: bool,
    actor_count: usize,
    sensor_count: usize,
    proxy_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let config_path = args.config.display().to_string();
    let (result, failure) = match load_blueprint(&args.config) {
        Ok(blueprint) => (
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: collect_warnings(&blueprint),
                summary: Some(summarize(&blueprint)),
            },
            None,
        ),
        Err(e) => (
            ValidationResult {
                valid: false,
                config_path,
                error: Some(e.to_string()),
                warnings: Vec::new(),
                summary: None,
            },
            Some(e),
        ),
    };

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")
            .map_err(CliError::from)?;
        println!("{json}");
    } else {
        print_validation_result(&result);
    }

    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn summarize(blueprint: &ContextBlueprint) -> ConfigSummary {
    ConfigSummary {
        version: format!("{:?}", blueprint.version),
        server: format!(
            "{}:{}",
            blueprint.world.carla_host, blueprint.world.carla_port
        ),
        map: blueprint.world.map.clone(),
        primary_mode: blueprint.sync.primary_mode,
        actor_count: blueprint.actors.len(),
        sensor_count: blueprint
            .actors
            .iter()
            .filter(|a| resolved_kind(a).is_sensor())
            .count(),
        proxy_count: blueprint.proxies.len(),
    }
}

pub(crate) fn resolved_kind(actor: &contracts::ActorConfig) -> contracts::ActorKind {
    actor
        .kind
        .unwrap_or_else(|| actor_factory::resolve_kind(&actor.blueprint))
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &ContextBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.actors.is_empty() {
        warnings.push("No actors configured".to_string());
    }

    for actor in &blueprint.actors {
        if resolved_kind(actor).is_sensor() && actor.parent.is_none() {
            warnings.push(format!(
                "Sensor '{}' has no parent and will be spawned at a fixed world pose",
                actor.id
            ));
        }
    }

    if blueprint.sync.strict_timing && !blueprint.sync.primary_mode {
        warnings.push("sync.strict_timing has no effect without sync.primary_mode".to_string());
    }

    if blueprint.world.map.is_some() && blueprint.world.reload_world {
        warnings.push("world.reload_world is ignored when world.map is set".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Server: {}", summary.server);
            println!("  Map: {}", summary.map.as_deref().unwrap_or("(current)"));
            println!("  Synchronous: {}", summary.primary_mode);
            println!("  Actors: {} ({} sensors)", summary.actor_count, summary.sensor_count);
            println!("  Proxies: {}", summary.proxy_count);
        }

        if !result.warnings.is_empty() {
            println!("\n⚠ Warnings:");
            for warning in &result.warnings {
                println!("  - {warning}");
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {error}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config_loader::{ConfigFormat, ConfigLoader};

    #[test]
    fn test_warnings() {
        let blueprint = ConfigLoader::load_from_str(
            r#"
[world]
map = "Town01"
reload_world = true

[sync]
strict_timing = true

[[actors]]
id = "gnss"
blueprint = "sensor.other.gnss"
"#,
            ConfigFormat::Toml,
        )
        .unwrap();

        let warnings = collect_warnings(&blueprint);
        assert_eq!(warnings.len(), 3);
        assert!(warnings[0].contains("'gnss'"));

        let summary = summarize(&blueprint);
        assert_eq!(summary.sensor_count, 1);
        assert_eq!(summary.server, "127.0.0.1:2000");
    }

    #[test]
    fn test_invalid_file_keeps_config_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[sync]\nprimary_mode = true\n").unwrap();

        let err = run_validate(&ValidateArgs {
            config: path,
            json: true,
        })
        .unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }
}
