//! 共享世界槽
//!
//! 连接管理、actor registry 与同步控制器共享的可空世界引用。
//! 只有连接管理写入；其他方读取快照，`None` 一律视为世界已消失。

use std::sync::Arc;

use parking_lot::RwLock;

use crate::SimWorld;

/// 槽的共享所有权
pub type SharedWorld = Arc<WorldSlot>;

#[derive(Default)]
pub struct WorldSlot {
    world: RwLock<Option<Arc<dyn SimWorld>>>,
}

impl WorldSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedWorld {
        Arc::new(Self::new())
    }

    /// 当前世界的快照
    pub fn get(&self) -> Option<Arc<dyn SimWorld>> {
        self.world.read().clone()
    }

    pub fn set(&self, world: Arc<dyn SimWorld>) {
        *self.world.write() = Some(world);
    }

    /// 清空槽，返回之前的世界
    pub fn clear(&self) -> Option<Arc<dyn SimWorld>> {
        self.world.write().take()
    }

    pub fn is_available(&self) -> bool {
        self.world.read().is_some()
    }
}

impl std::fmt::Debug for WorldSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorldSlot")
            .field("available", &self.is_available())
            .finish()
    }
}
