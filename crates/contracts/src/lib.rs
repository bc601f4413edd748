//! # Contracts
//!
//! carla_utils 工作区共享的接口契约：值类型、仿真器边界 trait，
//! 以及 registry、同步控制器、连接管理之间共用的原语。
//! 所有业务 crate 依赖本 crate，禁止反向依赖。
//!
//! ## 时间模型
//! - 仿真时间：服务器上报的 elapsed 秒数 (f64)
//! - 真实时间：客户端单调时钟
//! - `frame`：一次被确认的仿真步

mod blueprint;
mod error;
mod geometry;
mod pulse;
mod runtime;
mod sensor;
mod simulator;
mod vehicle;
mod world_slot;

pub use blueprint::*;
pub use error::*;
pub use geometry::*;
pub use pulse::Pulse;
pub use runtime::*;
pub use sensor::*;
pub use simulator::*;
pub use vehicle::*;
pub use world_slot::{SharedWorld, WorldSlot};
