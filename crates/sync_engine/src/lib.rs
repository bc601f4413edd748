//! # Sync Engine
//!
//! 仿真时钟同步控制器。
//!
//! 负责：
//! - 后台线程协商同步 / 自由运行模式
//! - 严格计时模式下对齐真实时间与仿真时间
//! - 每个 tick 发出一次瞬时脉冲
//!
//! ## 使用示例
//!
//! ```ignore
//! use sync_engine::SyncController;
//!
//! let controller = SyncController::new(world_slot)?;
//! controller.use_sync_primary_mode(true, 0.05, false)?;
//!
//! // 等待 10 个 tick，总超时 2 秒
//! controller.wait_for_ticks(10, Some(Duration::from_secs(2)))?;
//! ```

mod controller;
mod error;
mod timing;

pub use controller::{SyncController, SyncOptions, SyncState};
pub use error::{Result, SyncError};
pub use timing::{compute_wait, SimClock, WAIT_FLOOR_RATIO};
