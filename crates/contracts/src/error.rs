//! 分层错误定义
//!
//! 按来源分类：配置 / 仿真器边界 / 参数

use thiserror::Error;

/// 统一的契约错误类型
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// 配置解析错误
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// 配置校验错误
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Argument Errors =====
    /// 操作参数非法
    #[error("invalid argument '{name}': {message}")]
    InvalidArgument { name: String, message: String },

    // ===== Simulator Errors =====
    /// 仿真器边界错误
    #[error(transparent)]
    Simulator(#[from] SimulatorError),

    // ===== General Errors =====
    /// IO 错误
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 其他错误
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// 创建配置解析错误
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// 创建配置校验错误
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// 创建参数错误
    pub fn invalid_argument(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// 仿真器边界上报的错误
///
/// [`SimWorld`](crate::SimWorld)、[`SimulatorSession`](crate::SimulatorSession) 和
/// [`NativeActor`](crate::NativeActor) 的调用都返回该类型。后台循环只能吞掉
/// [`SimulatorError::is_world_lost`] 一类。
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SimulatorError {
    /// 世界 (或其所属会话) 已不存在
    #[error("simulator world unavailable")]
    WorldUnavailable,

    /// RPC / 传输失败
    #[error("simulator transport error: {message}")]
    Transport { message: String },

    /// 阻塞的服务器调用超时
    #[error("simulator call '{operation}' timed out")]
    Timeout { operation: String },

    /// 蓝图不在服务器目录中
    #[error("blueprint not found: {blueprint}")]
    BlueprintNotFound { blueprint: String },

    /// 蓝图没有该属性
    #[error("blueprint '{blueprint}' has no attribute '{attribute}'")]
    AttributeNotFound { blueprint: String, attribute: String },

    /// 属性存在但不可修改
    #[error("attribute '{attribute}' of blueprint '{blueprint}' is not modifiable")]
    AttributeNotModifiable { blueprint: String, attribute: String },

    /// 要求随机取值，但属性没有推荐值
    #[error("attribute '{attribute}' of blueprint '{blueprint}' has no recommended values")]
    NoRecommendedValue { blueprint: String, attribute: String },

    /// 服务器拒绝生成 actor
    #[error("spawn of '{blueprint}' rejected: {message}")]
    SpawnRejected { blueprint: String, message: String },

    /// 其他仿真器错误
    #[error("{0}")]
    Other(String),
}

impl SimulatorError {
    /// 创建传输错误
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// 创建超时错误
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    /// 创建蓝图缺失错误
    pub fn blueprint_not_found(blueprint: impl Into<String>) -> Self {
        Self::BlueprintNotFound {
            blueprint: blueprint.into(),
        }
    }

    /// 创建生成被拒错误
    pub fn spawn_rejected(blueprint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SpawnRejected {
            blueprint: blueprint.into(),
            message: message.into(),
        }
    }

    /// 调用期间世界已消失
    ///
    /// 后台循环只对这一类吞掉并重试。
    pub fn is_world_lost(&self) -> bool {
        matches!(self, Self::WorldUnavailable)
    }
}
