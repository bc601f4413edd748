//! # Context
//!
//! 仿真器连接管理。
//!
//! 负责：
//! - 打开、探测、释放仿真器会话
//! - 让共享世界槽跟随会话存活状态
//! - 持有一个连接的 actor registry 与同步控制器
//! - 有序拆除：自由运行、销毁 actor、稳定若干 tick、释放会话
//!
//! # 使用示例
//!
//! ```ignore
//! use context::{CarlaContext, ConnectionSettings};
//!
//! let ctx = CarlaContext::new(connector, ConnectionSettings::default())?;
//! ctx.connect()?;
//! ctx.running().use_sync_primary_mode(true, 0.05, false)?;
//! ctx.wait_for_ticks(10, Some(Duration::from_secs(2)))?;
//! ctx.disconnect()?;
//! ```

mod context;
mod error;
mod tree;

pub use context::{CarlaContext, ConnectionSettings};
pub use error::{ContextError, Result};
pub use tree::ActorTree;
