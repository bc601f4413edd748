//! 按配置构建 actor 树
//!
//! 配置中父节点先于子节点出现，因此按顺序创建、按顺序 spawn 即可
//! 让子节点挂载到已绑定的父 actor 上。

use std::collections::HashMap;
use std::sync::Arc;

use actor_factory::{ActorFactoryError, ActorHandle, ActorRegistry, ActorRequest, ROLE_NAME};
use contracts::ActorConfig;
use tracing::{debug, info};

use crate::error::Result;

/// 配置 id 到句柄的映射，保持配置顺序
#[derive(Debug, Default)]
pub struct ActorTree {
    order: Vec<String>,
    handles: HashMap<String, Arc<ActorHandle>>,
}

impl ActorTree {
    /// 在注册表中创建全部句柄，不访问服务器
    ///
    /// 未显式设置 `role_name` 时使用配置 id。
    pub fn build(registry: &ActorRegistry, actors: &[ActorConfig]) -> Result<Self> {
        let mut tree = Self::default();

        for config in actors {
            let mut request = ActorRequest::new(&config.blueprint)
                .transform(config.transform)
                .physics(config.physics);

            if let Some(kind) = config.kind {
                request = request.kind(kind);
            }
            if let Some(parent_id) = &config.parent {
                let parent = tree.handles.get(parent_id).ok_or_else(|| {
                    ActorFactoryError::invalid_argument(
                        "parent",
                        format!("actor '{}' references unknown parent '{parent_id}'", config.id),
                    )
                })?;
                request = request.parent(parent);
            }

            let mut keys: Vec<_> = config.attributes.keys().collect();
            keys.sort();
            for key in keys {
                let value = &config.attributes[key];
                request = if value.is_empty() {
                    request.random_attribute(key.as_str())
                } else {
                    request.attribute(key.as_str(), value.as_str())
                };
            }
            if !config.attributes.contains_key(ROLE_NAME) {
                request = request.attribute(ROLE_NAME, config.id.as_str());
            }

            let handle = registry.new_actor(request)?;
            debug!(id = %config.id, kind = %handle.kind(), "Actor created from config");
            tree.order.push(config.id.clone());
            tree.handles.insert(config.id.clone(), handle);
        }

        info!(count = tree.order.len(), "Actor tree built");
        Ok(tree)
    }

    pub fn get(&self, id: &str) -> Option<&Arc<ActorHandle>> {
        self.handles.get(id)
    }

    /// 全部句柄，父节点在前
    pub fn handles(&self) -> Vec<Arc<ActorHandle>> {
        self.order
            .iter()
            .filter_map(|id| self.handles.get(id).cloned())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<ActorHandle>)> {
        self.order
            .iter()
            .filter_map(|id| self.handles.get(id).map(|h| (id.as_str(), h)))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
