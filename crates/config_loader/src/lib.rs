//! # Config Loader
//!
//! 配置加载与解析模块。
//!
//! 负责：
//! - 解析 TOML/JSON 配置文件
//! - 校验配置合法性
//! - 为连接管理和 CLI 生成 `ContextBlueprint`
//!
//! # 使用示例
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let blueprint = ConfigLoader::load_from_path(Path::new("config.toml")).unwrap();
//! println!("Server: {}:{}", blueprint.world.carla_host, blueprint.world.carla_port);
//! ```

mod parser;
mod validator;

pub use contracts::ContextBlueprint;
pub use parser::ConfigFormat;

use contracts::ContractError;
use std::path::Path;

/// 配置加载器
///
/// 提供从文件或字符串加载配置的静态方法。
pub struct ConfigLoader;

impl ConfigLoader {
    /// 从文件路径加载配置
    ///
    /// 按扩展名 (.toml / .json) 自动识别格式。
    ///
    /// # Errors
    /// - 文件读取失败
    /// - 格式不支持
    /// - 解析失败
    /// - 校验失败
    pub fn load_from_path(path: &Path) -> Result<ContextBlueprint, ContractError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        Self::load_from_str(&content, format)
    }

    /// 从字符串加载配置
    ///
    /// # Errors
    /// - 解析失败
    /// - 校验失败
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<ContextBlueprint, ContractError> {
        Self::parse_and_validate(content, format)
    }
}

impl ConfigLoader {
    /// 按扩展名推断配置格式
    pub fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    /// 读取配置文件内容
    fn read_file(path: &Path) -> Result<String, ContractError> {
        Ok(std::fs::read_to_string(path)?)
    }

    /// 解析并校验配置内容
    fn parse_and_validate(
        content: &str,
        format: ConfigFormat,
    ) -> Result<ContextBlueprint, ContractError> {
        let blueprint = parser::parse(content, format)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL_TOML: &str = r#"
[world]
carla_host = "127.0.0.1"
carla_port = 2000
timeout_sec = 5.0

[sync]
primary_mode = true
fixed_delta_sec = 0.05
strict_timing = true

[[actors]]
id = "ego"
blueprint = "vehicle.tesla.model3"
attributes = { role_name = "hero" }

[[actors]]
id = "radar"
blueprint = "sensor.other.radar"
parent = "ego"
[actors.transform.location]
x = 2.0
z = 1.0

[[proxies]]
name = "radar_out"
type = "radar_udp"
actor = "radar"
params = { addr = "127.0.0.1:9102", format = "binary" }
"#;

    #[test]
    fn test_load_from_str_toml() {
        let result = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let bp = result.unwrap();
        assert_eq!(bp.world.timeout_sec, 5.0);
        assert!(bp.sync.strict_timing);
        assert_eq!(bp.actors[1].transform.location.x, 2.0);
    }

    #[test]
    fn test_json_file_detected() {
        let json = r#"{ "world": { "carla_port": 3000 }, "actors": [] }"#;
        let mut file = tempfile::Builder::new().suffix(".JSON").tempfile().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let bp = ConfigLoader::load_from_path(file.path()).unwrap();
        assert_eq!(bp.world.carla_port, 3000);
        assert!(bp.actors.is_empty());
    }

    #[test]
    fn test_validation_runs_after_parse() {
        let content = MINIMAL_TOML.replace("parent = \"ego\"", "parent = \"nobody\"");
        let result = ConfigLoader::load_from_str(&content, ConfigFormat::Toml);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("not found"));
    }

    #[test]
    fn test_load_from_path_detects_format() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(MINIMAL_TOML.as_bytes()).unwrap();

        let bp = ConfigLoader::load_from_path(file.path()).unwrap();
        assert_eq!(bp.actors.len(), 2);
    }

    #[test]
    fn test_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        let err = ConfigLoader::load_from_path(file.path()).unwrap_err();
        assert!(err.to_string().contains("unsupported config format"));
    }
}
