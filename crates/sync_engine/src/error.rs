//! 同步控制器错误类型

use contracts::SimulatorError;
use thiserror::Error;

/// 同步控制器错误
#[derive(Debug, Error)]
pub enum SyncError {
    /// 模式请求非法
    #[error("invalid argument '{name}': {message}")]
    InvalidArgument { name: String, message: String },

    /// tick 等待预算耗尽
    #[error("timed out waiting for ticks: observed {observed} of {requested}")]
    Timeout { observed: u64, requested: u64 },

    /// 同步线程未在等待上限内退出
    #[error("sync thread did not exit within {timeout_ms} ms")]
    JoinTimeout { timeout_ms: u64 },

    /// 没有可读取的世界
    #[error("world unavailable")]
    WorldUnavailable,

    /// 后台循环已停止
    #[error("sync loop stopped: {message}")]
    LoopFault { message: String },

    #[error(transparent)]
    Simulator(#[from] SimulatorError),
}

impl SyncError {
    /// 创建参数错误
    pub fn invalid_argument(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            message: message.into(),
        }
    }

    /// 创建循环故障错误
    pub fn loop_fault(message: impl Into<String>) -> Self {
        Self::LoopFault {
            message: message.into(),
        }
    }
}

/// Result 别名
pub type Result<T> = std::result::Result<T, SyncError>;
