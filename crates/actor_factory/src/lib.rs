//! # Actor Factory
//!
//! 逻辑 actor 句柄及其在仿真世界中的生命周期。
//!
//! 职责：
//! - 蓝图名解析为 actor 类型
//! - 创建未绑定句柄，维护挂载树
//! - 批量生成并汇总失败；销毁不注销
//! - 已绑定句柄上的车辆控制与传感器数据视图
//! - 供测试和无 CARLA 运行使用的 mock 仿真器
//!
//! ## Feature Flags
//!
//! - `real-carla`: 启用真实 CARLA 客户端 (需要 carla crate)

pub mod blueprint;
pub mod error;
pub mod handle;
pub mod kind;
pub mod mock_client;
pub mod registry;
pub mod sensor;
pub mod vehicle;

#[cfg(feature = "real-carla")]
pub mod carla_client;
#[cfg(feature = "real-carla")]
pub mod sensor_data_converter;

pub use blueprint::{Blueprint, ROLE_NAME};
pub use contracts::{ActorId, ActorKind, HandleId};
pub use error::{ActorFactoryError, Result, SpawnFailure};
pub use handle::ActorHandle;
pub use kind::{resolve_kind, resolve_kind_checked};
pub use mock_client::{MockCall, MockConfig, MockSimulator};
pub use registry::{ActorRegistry, ActorRequest};
pub use sensor::{Sensor, SensorChannel, SensorSnapshot};
pub use vehicle::Vehicle;

#[cfg(feature = "real-carla")]
pub use carla_client::CarlaConnector;
