//! Proxy 错误类型

use thiserror::Error;

/// Proxy 错误
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Socket 错误
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 载荷无法编码
    #[error("failed to encode {what}: {message}")]
    Encode { what: String, message: String },

    /// 参数非法或 actor 类型不符
    #[error("invalid argument '{name}': {message}")]
    InvalidArgument { name: String, message: String },

    /// worker 未在等待上限内停止
    #[error("proxy '{name}' did not stop within {timeout_ms} ms")]
    Timeout { name: String, timeout_ms: u64 },

    /// 通道另一端已关闭
    #[error("proxy '{name}' channel closed")]
    Closed { name: String },

    /// actor 侧失败
    #[error(transparent)]
    Actor(#[from] actor_factory::ActorFactoryError),
}

impl ProxyError {
    /// 创建编码错误
    pub fn encode(what: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Encode {
            what: what.into(),
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

/// Result 别名
pub type Result<T> = std::result::Result<T, ProxyError>;
