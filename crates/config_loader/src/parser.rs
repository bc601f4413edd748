//! 配置解析模块
//!
//! 支持 TOML (主要) 和 JSON (可选) 格式。

use contracts::{ContextBlueprint, ContractError};

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML 格式 (推荐)
    Toml,
    /// JSON 格式
    Json,
}

impl ConfigFormat {
    /// 从文件扩展名推断格式
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

impl std::fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Toml => "TOML",
            Self::Json => "JSON",
        })
    }
}

fn parse_error<E>(format: ConfigFormat, e: E) -> ContractError
where
    E: std::error::Error + Send + Sync + 'static,
{
    ContractError::ConfigParse {
        message: format!("{format} parse error: {e}"),
        source: Some(Box::new(e)),
    }
}

/// 解析 TOML 格式配置
pub fn parse_toml(content: &str) -> Result<ContextBlueprint, ContractError> {
    toml::from_str(content).map_err(|e| parse_error(ConfigFormat::Toml, e))
}

/// 解析 JSON 格式配置
pub fn parse_json(content: &str) -> Result<ContextBlueprint, ContractError> {
    serde_json::from_str(content).map_err(|e| parse_error(ConfigFormat::Json, e))
}

/// 根据格式解析配置；空文件视为错误而非全默认配置
pub fn parse(content: &str, format: ConfigFormat) -> Result<ContextBlueprint, ContractError> {
    if content.trim().is_empty() {
        return Err(ContractError::config_parse(format!("empty {format} document")));
    }
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ActorKind, ProxyType};

    #[test]
    fn test_parse_toml_minimal() {
        let content = r#"
[world]
carla_host = "10.0.0.2"
map = "Town03"

[sync]
primary_mode = true
fixed_delta_sec = 0.1

[[actors]]
id = "ego"
blueprint = "vehicle.tesla.model3"
attributes = { role_name = "hero", color = "" }
[actors.transform.location]
x = 10.0
y = -3.0
z = 0.5

[[actors]]
id = "imu"
blueprint = "sensor.other.imu"
parent = "ego"
"#;
        let result = parse_toml(content);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let bp = result.unwrap();
        assert_eq!(bp.world.carla_host, "10.0.0.2");
        assert_eq!(bp.world.map.as_deref(), Some("Town03"));
        assert!(bp.sync.primary_mode);
        assert_eq!(bp.actors.len(), 2);
        assert_eq!(bp.actors[0].attributes.get("color").map(String::as_str), Some(""));
        assert_eq!(bp.actors[0].transform.location.x, 10.0);
        assert_eq!(bp.actors[1].parent.as_deref(), Some("ego"));
        assert!(bp.actors[1].physics);
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{
            "world": { "carla_port": 2010 },
            "actors": [
                { "id": "ego", "blueprint": "vehicle.lincoln.mkz_2020", "kind": "vehicle" },
                { "id": "gnss", "blueprint": "sensor.other.gnss", "parent": "ego" }
            ],
            "proxies": [
                { "name": "gnss_out", "type": "gnss_udp", "actor": "gnss",
                  "params": { "addr": "127.0.0.1:9101" } }
            ]
        }"#;
        let result = parse_json(content);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let bp = result.unwrap();
        assert_eq!(bp.world.carla_port, 2010);
        assert_eq!(bp.actors[0].kind, Some(ActorKind::Vehicle));
        assert_eq!(bp.proxies[0].proxy_type, ProxyType::GnssUdp);
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let content = "invalid toml [[[";
        let result = parse_toml(content);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_parse_unknown_kind_rejected() {
        let content = r#"{ "world": {}, "actors": [{ "id": "x", "blueprint": "walker.pedestrian.0001", "kind": "walker" }] }"#;
        assert!(matches!(
            parse_json(content),
            Err(ContractError::ConfigParse { .. })
        ));
    }

    #[test]
    fn test_empty_document_rejected() {
        let err = parse("  \n", ConfigFormat::Toml).unwrap_err();
        assert!(err.to_string().contains("empty TOML document"));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            ConfigFormat::from_extension("toml"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("TOML"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("json"),
            Some(ConfigFormat::Json)
        );
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
