//! Actor Factory 错误类型

use contracts::{ActorKind, ContractError, HandleId, SimulatorError};
use thiserror::Error;

/// Actor Factory 错误
#[derive(Debug, Error)]
pub enum ActorFactoryError {
    /// 操作需要已绑定的 actor
    #[error("{kind} actor {handle} is not alive")]
    NotAlive { handle: HandleId, kind: ActorKind },

    /// 参数格式错误或句柄类型不符
    #[error("invalid argument '{name}': {message}")]
    InvalidArgument { name: String, message: String },

    /// 服务器返回的 actor 已失效
    #[error("spawned actor {actor_id} is not alive, an extra tick may be needed")]
    BindFailed { actor_id: u32 },

    /// 批量生成中有成员失败，成功的保持已生成
    #[error("{}", describe_failures(.failures))]
    SpawnBatch { failures: Vec<SpawnFailure> },

    /// 仿真器边界错误
    #[error(transparent)]
    Simulator(#[from] SimulatorError),

    /// 包装 ContractError
    #[error(transparent)]
    Contract(#[from] ContractError),
}

/// 批量生成中失败的一个成员
#[derive(Debug)]
pub struct SpawnFailure {
    pub handle: HandleId,
    pub blueprint: String,
    pub error: Box<ActorFactoryError>,
}

fn describe_failures(failures: &[SpawnFailure]) -> String {
    let details: Vec<String> = failures
        .iter()
        .map(|f| format!("{} ({}): {}", f.blueprint, f.handle.short(), f.error))
        .collect();
    format!(
        "failed to spawn {} actor(s): {}",
        failures.len(),
        details.join("; ")
    )
}

impl ActorFactoryError {
    /// 创建参数错误
    pub fn invalid_argument(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            message: message.into(),
        }
    }

    /// 创建类型不符错误
    pub fn kind_mismatch(blueprint: &str, expected: ActorKind, resolved: ActorKind) -> Self {
        Self::invalid_argument(
            "kind",
            format!("blueprint {blueprint} resolves to {resolved}, which is not a {expected}"),
        )
    }

    /// 批量失败的逐个成员，其他变体为空
    pub fn spawn_failures(&self) -> &[SpawnFailure] {
        match self {
            Self::SpawnBatch { failures } => failures,
            _ => &[],
        }
    }

    /// 操作期间世界已消失
    pub fn is_world_lost(&self) -> bool {
        matches!(self, Self::Simulator(e) if e.is_world_lost())
    }
}

/// Result 别名
pub type Result<T> = std::result::Result<T, ActorFactoryError>;
