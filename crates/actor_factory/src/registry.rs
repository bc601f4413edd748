//! ActorRegistry 核心实现
//!
//! 创建逻辑 actor 句柄，批量 spawn / destroy，管理生命周期。
//! 句柄一旦登记，直到注册表销毁才会移除。

use std::sync::Arc;

use contracts::{ActorKind, HandleId, SharedWorld, SimWorld, SimulatorError, Transform};
use observability::{record_actor_destroyed, record_actor_spawned, record_spawn_failure};
use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::blueprint::Blueprint;
use crate::error::{ActorFactoryError, Result, SpawnFailure};
use crate::handle::ActorHandle;
use crate::kind::resolve_kind_checked;

/// 新句柄的构造参数
#[derive(Debug, Clone)]
pub struct ActorRequest {
    blueprint: String,
    kind: Option<ActorKind>,
    parent: Option<Arc<ActorHandle>>,
    attributes: Vec<(String, Option<String>)>,
    transform: Transform,
    physics: bool,
}

impl ActorRequest {
    pub fn new(blueprint: impl Into<String>) -> Self {
        Self {
            blueprint: blueprint.into(),
            kind: None,
            parent: None,
            attributes: Vec::new(),
            transform: Transform::default(),
            physics: true,
        }
    }

    /// 显式类型，必须是蓝图解析结果本身或其泛化
    pub fn kind(mut self, kind: ActorKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn parent(mut self, parent: &Arc<ActorHandle>) -> Self {
        self.parent = Some(Arc::clone(parent));
        self
    }

    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), Some(value.into())));
        self
    }

    /// spawn 时从推荐值中随机取值
    pub fn random_attribute(mut self, key: impl Into<String>) -> Self {
        self.attributes.push((key.into(), None));
        self
    }

    pub fn transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn physics(mut self, enabled: bool) -> Self {
        self.physics = enabled;
        self
    }
}

/// Actor 注册表
pub struct ActorRegistry {
    world: SharedWorld,
    /// 按登记顺序
    members: Mutex<Vec<Arc<ActorHandle>>>,
}

impl ActorRegistry {
    /// 创建新的 ActorRegistry
    pub fn new(world: SharedWorld) -> Self {
        Self {
            world,
            members: Mutex::new(Vec::new()),
        }
    }

    /// 共享的世界引用
    pub fn world(&self) -> &SharedWorld {
        &self.world
    }

    /// 创建并登记未绑定句柄，不访问服务器
    #[instrument(name = "actor_registry_new_actor", skip(self, request), fields(blueprint = %request.blueprint))]
    pub fn new_actor(&self, request: ActorRequest) -> Result<Arc<ActorHandle>> {
        let kind = resolve_kind_checked(&request.blueprint, request.kind)?;

        let mut blueprint = Blueprint::new(&request.blueprint);
        for (key, value) in request.attributes {
            blueprint.set_attribute(key, value);
        }

        let handle = Arc::new(ActorHandle::new(kind, blueprint));
        handle.set_transform(request.transform)?;
        handle.use_physics(request.physics)?;
        if let Some(parent) = &request.parent {
            handle.set_parent(parent)?;
        }

        self.register(&handle);
        debug!(handle = %handle.id(), %kind, "Actor handle created");
        Ok(handle)
    }

    /// 批量 spawn
    ///
    /// 每个句柄都会尝试，与之前的失败无关。已成功的不回滚；
    /// 有任一失败时在批次结束后返回 `SpawnBatch`，列出全部失败。
    #[instrument(name = "actor_registry_spawn", skip(self, handles), fields(count = handles.len()))]
    pub fn spawn(&self, handles: &[Arc<ActorHandle>]) -> Result<()> {
        let world = self.world.get();
        let mut failures = Vec::new();

        for handle in handles {
            let outcome = match &world {
                Some(world) => self.spawn_one(world.as_ref(), handle),
                None => Err(SimulatorError::WorldUnavailable.into()),
            };

            match outcome {
                Ok(()) => self.register(handle),
                Err(e) => {
                    warn!(
                        handle = %handle.id(),
                        blueprint = %handle.blueprint().name(),
                        error = %e,
                        "Actor spawn failed"
                    );
                    record_spawn_failure(handle.kind());
                    failures.push(SpawnFailure {
                        handle: handle.id(),
                        blueprint: handle.blueprint().name().to_string(),
                        error: Box::new(e),
                    });
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ActorFactoryError::SpawnBatch { failures })
        }
    }

    fn spawn_one(&self, world: &dyn SimWorld, handle: &Arc<ActorHandle>) -> Result<()> {
        if handle.is_alive() {
            debug!(handle = %handle.id(), "Actor already spawned, skipping");
            return Ok(());
        }

        // 父节点未绑定时不挂载，也不隐式 spawn 父节点
        let attach_to = handle.parent().and_then(|p| p.live_native());
        let resolved = handle.blueprint().resolve(world)?;
        let native = world.spawn_actor(&resolved, &handle.transform_init(), attach_to.as_ref())?;

        if let Err(e) = handle.bind(Arc::clone(&native)) {
            if native.is_alive() {
                let _ = native.destroy();
            }
            return Err(e);
        }

        record_actor_spawned(handle.kind());
        info!(
            handle = %handle.id(),
            actor_id = native.id(),
            blueprint = %resolved.id,
            attached = attach_to.is_some(),
            "Actor spawned"
        );
        Ok(())
    }

    /// 销毁绑定中的句柄，句柄保留在注册表中。返回服务器确认销毁的数量。
    #[instrument(name = "actor_registry_destroy", skip(self, handles), fields(count = handles.len()))]
    pub fn destroy(&self, handles: &[Arc<ActorHandle>]) -> usize {
        let mut destroyed = 0;
        for handle in handles {
            // 即使服务器端已不可达，也要清除绑定
            match handle.destroy() {
                Ok(true) => {
                    record_actor_destroyed(handle.kind());
                    destroyed += 1;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(handle = %handle.id(), error = %e, "Failed to destroy actor");
                }
            }
        }
        destroyed
    }

    /// 销毁全部成员，子节点先于父节点
    pub fn destroy_all(&self) -> usize {
        let mut members = self.members();
        members.sort_by_key(|h| std::cmp::Reverse(h.depth()));
        let destroyed = self.destroy(&members);
        if destroyed > 0 {
            info!(destroyed, "All registry actors destroyed");
        }
        destroyed
    }

    /// 全部成员，按登记顺序
    pub fn members(&self) -> Vec<Arc<ActorHandle>> {
        self.members.lock().clone()
    }

    pub fn get(&self, id: HandleId) -> Option<Arc<ActorHandle>> {
        self.members.lock().iter().find(|h| h.id() == id).cloned()
    }

    pub fn find_by_name(&self, name: &str) -> Option<Arc<ActorHandle>> {
        self.members.lock().iter().find(|h| h.name() == name).cloned()
    }

    pub fn contains(&self, handle: &ActorHandle) -> bool {
        self.members.lock().iter().any(|h| h.id() == handle.id())
    }

    pub fn len(&self) -> usize {
        self.members.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.lock().is_empty()
    }

    /// 当前绑定中的成员数量
    pub fn alive_count(&self) -> usize {
        self.members.lock().iter().filter(|h| h.is_alive()).count()
    }

    /// 重复登记无效果
    fn register(&self, handle: &Arc<ActorHandle>) {
        let mut members = self.members.lock();
        if !members.iter().any(|h| h.id() == handle.id()) {
            members.push(Arc::clone(handle));
        }
    }
}

impl Drop for ActorRegistry {
    fn drop(&mut self) {
        self.destroy_all();
    }
}

impl std::fmt::Debug for ActorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorRegistry")
            .field("members", &self.len())
            .field("world", &self.world)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_client::{MockCall, MockConfig, MockSimulator};
    use contracts::WorldSlot;

    fn registry(sim: &MockSimulator) -> ActorRegistry {
        let slot = WorldSlot::shared();
        slot.set(sim.world_handle());
        ActorRegistry::new(slot)
    }

    #[test]
    fn test_new_actor_resolves_kind_without_server() {
        let sim = MockSimulator::new();
        let registry = registry(&sim);

        let camera = registry
            .new_actor(ActorRequest::new("sensor.camera.rgb"))
            .unwrap();
        let generic = registry
            .new_actor(ActorRequest::new("sensor.camera.rgb").kind(ActorKind::Sensor))
            .unwrap();

        assert_eq!(camera.kind(), ActorKind::Camera);
        assert_eq!(generic.kind(), ActorKind::Sensor);
        assert_eq!(registry.len(), 2);
        assert!(sim.calls().is_empty());
    }

    #[test]
    fn test_new_actor_kind_mismatch() {
        let registry = ActorRegistry::new(WorldSlot::shared());
        let err = registry
            .new_actor(ActorRequest::new("vehicle.audi.tt").kind(ActorKind::Lidar))
            .unwrap_err();

        assert!(matches!(err, ActorFactoryError::InvalidArgument { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_spawn_batch_aggregates_failures() {
        let sim = MockSimulator::new();
        let registry = registry(&sim);

        let first = registry
            .new_actor(ActorRequest::new("vehicle.tesla.model3"))
            .unwrap();
        let second = registry
            .new_actor(ActorRequest::new("vehicle.does.not_exist"))
            .unwrap();
        let third = registry
            .new_actor(ActorRequest::new("sensor.other.gnss"))
            .unwrap();

        let err = registry
            .spawn(&[first.clone(), second.clone(), third.clone()])
            .unwrap_err();

        assert!(first.is_alive());
        assert!(!second.is_alive());
        assert!(third.is_alive());

        let failures = err.spawn_failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].handle, second.id());
        assert!(matches!(
            *failures[0].error,
            ActorFactoryError::Simulator(SimulatorError::BlueprintNotFound { .. })
        ));
    }

    #[test]
    fn test_spawn_attaches_to_bound_parent() {
        let sim = MockSimulator::new();
        let registry = registry(&sim);

        let vehicle = registry
            .new_actor(ActorRequest::new("vehicle.tesla.model3"))
            .unwrap();
        let imu = registry
            .new_actor(ActorRequest::new("sensor.other.imu").parent(&vehicle))
            .unwrap();

        registry.spawn(&[vehicle.clone()]).unwrap();
        registry.spawn(&[imu.clone()]).unwrap();

        assert_eq!(
            sim.actor_parent(imu.actor_id().unwrap()),
            vehicle.actor_id()
        );
    }

    #[test]
    fn test_spawn_unbound_parent_means_no_attachment() {
        let sim = MockSimulator::new();
        let registry = registry(&sim);

        let vehicle = registry
            .new_actor(ActorRequest::new("vehicle.tesla.model3"))
            .unwrap();
        let imu = registry
            .new_actor(ActorRequest::new("sensor.other.imu").parent(&vehicle))
            .unwrap();

        registry.spawn(&[imu.clone()]).unwrap();

        assert!(!vehicle.is_alive());
        assert!(imu.is_alive());
        assert_eq!(sim.actor_parent(imu.actor_id().unwrap()), None);
        assert!(matches!(
            sim.calls().as_slice(),
            [MockCall::Spawn { attach_to: None, .. }]
        ));
    }

    #[test]
    fn test_spawn_skips_bound_handles() {
        let sim = MockSimulator::new();
        let registry = registry(&sim);
        let vehicle = registry
            .new_actor(ActorRequest::new("vehicle.tesla.model3"))
            .unwrap();

        registry.spawn(&[vehicle.clone()]).unwrap();
        registry.spawn(&[vehicle.clone()]).unwrap();

        assert_eq!(sim.actor_count(), 1);
    }

    #[test]
    fn test_spawn_without_world_fails_every_member() {
        let registry = ActorRegistry::new(WorldSlot::shared());
        let a = registry
            .new_actor(ActorRequest::new("vehicle.tesla.model3"))
            .unwrap();
        let b = registry
            .new_actor(ActorRequest::new("sensor.other.gnss"))
            .unwrap();

        let err = registry.spawn(&[a, b]).unwrap_err();
        assert_eq!(err.spawn_failures().len(), 2);
        assert!(err.spawn_failures().iter().all(|f| f.error.is_world_lost()));
    }

    #[test]
    fn test_rejected_spawn_collected() {
        let sim = MockSimulator::with_config(MockConfig {
            fail_spawn: vec!["sensor.other.radar".into()],
            ..Default::default()
        });
        let registry = registry(&sim);
        let radar = registry
            .new_actor(ActorRequest::new("sensor.other.radar"))
            .unwrap();

        let err = registry.spawn(&[radar]).unwrap_err();
        assert!(err.to_string().contains("failed to spawn 1 actor(s)"));
    }

    #[test]
    fn test_destroy_keeps_membership() {
        let sim = MockSimulator::new();
        let registry = registry(&sim);
        let vehicle = registry
            .new_actor(ActorRequest::new("vehicle.tesla.model3"))
            .unwrap();
        registry.spawn(&[vehicle.clone()]).unwrap();

        assert_eq!(registry.destroy(&[vehicle.clone()]), 1);

        assert!(!vehicle.is_alive());
        assert!(registry.contains(&vehicle));
        assert_eq!(registry.alive_count(), 0);
        assert_eq!(sim.actor_count(), 0);
    }

    #[test]
    fn test_destroy_all_children_first() {
        let sim = MockSimulator::new();
        let registry = registry(&sim);
        let vehicle = registry
            .new_actor(ActorRequest::new("vehicle.tesla.model3"))
            .unwrap();
        let camera = registry
            .new_actor(ActorRequest::new("sensor.camera.rgb").parent(&vehicle))
            .unwrap();
        registry.spawn(&[vehicle.clone(), camera.clone()]).unwrap();
        let expected = vec![camera.actor_id().unwrap(), vehicle.actor_id().unwrap()];
        sim.clear_calls();

        assert_eq!(registry.destroy_all(), 2);

        let order: Vec<_> = sim
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                MockCall::Destroy { actor_id } => Some(actor_id),
                _ => None,
            })
            .collect();
        assert_eq!(order, expected);
    }

    #[test]
    fn test_registry_drop_destroys_members() {
        let sim = MockSimulator::new();
        {
            let registry = registry(&sim);
            let vehicle = registry
                .new_actor(ActorRequest::new("vehicle.tesla.model3"))
                .unwrap();
            registry.spawn(&[vehicle]).unwrap();
            assert_eq!(sim.actor_count(), 1);
        }
        assert_eq!(sim.actor_count(), 0);
    }

    #[test]
    fn test_find_by_name() {
        let registry = ActorRegistry::new(WorldSlot::shared());
        let hero = registry
            .new_actor(ActorRequest::new("vehicle.tesla.model3").attribute("role_name", "hero"))
            .unwrap();

        assert_eq!(registry.find_by_name("hero").map(|h| h.id()), Some(hero.id()));
        assert!(registry.find_by_name("villain").is_none());
    }
}
