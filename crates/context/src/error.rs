//! 连接管理错误类型

use actor_factory::ActorFactoryError;
use contracts::SimulatorError;
use sync_engine::SyncError;
use thiserror::Error;

/// 连接管理错误
#[derive(Debug, Error)]
pub enum ContextError {
    /// 会话不可达或已丢失
    #[error("cannot reach simulator at {host}:{port}: {message}")]
    Connection {
        host: String,
        port: u16,
        message: String,
    },

    /// 有界等待超出预算
    #[error("timed out: {operation}")]
    Timeout { operation: String },

    /// actor registry 错误
    #[error(transparent)]
    Actor(#[from] ActorFactoryError),

    /// 同步控制器错误
    #[error(transparent)]
    Sync(SyncError),

    /// 存活探测之外的仿真器错误 (地图操作)
    #[error(transparent)]
    Simulator(#[from] SimulatorError),
}

impl ContextError {
    /// 创建连接错误
    pub fn connection(host: impl Into<String>, port: u16, message: impl Into<String>) -> Self {
        Self::Connection {
            host: host.into(),
            port,
            message: message.into(),
        }
    }

    /// 创建超时错误
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

impl From<SyncError> for ContextError {
    fn from(e: SyncError) -> Self {
        match e {
            SyncError::Timeout { observed, requested } => Self::timeout(format!(
                "waiting for {requested} tick(s), observed {observed}"
            )),
            SyncError::JoinTimeout { timeout_ms } => {
                Self::timeout(format!("joining the sync thread within {timeout_ms} ms"))
            }
            SyncError::Simulator(e) => Self::Simulator(e),
            other => Self::Sync(other),
        }
    }
}

/// Result 别名
pub type Result<T> = std::result::Result<T, ContextError>;
