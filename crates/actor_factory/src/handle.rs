//! ActorHandle - 逻辑 actor
//!
//! 句柄独立于服务器端实例存在：未绑定时读写初始位姿，绑定后读写服务器上的实时值。
//! 销毁只清除绑定，句柄本身留在注册表中。

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use contracts::{
    ActorId, ActorKind, HandleId, NativeActor, Transform, TransformPatch, Vector3,
};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, instrument, warn};

use crate::blueprint::{Blueprint, ROLE_NAME};
use crate::error::{ActorFactoryError, Result};
use crate::sensor::{self, Sensor, SensorChannel};
use crate::vehicle::Vehicle;

/// 逻辑 actor 句柄
pub struct ActorHandle {
    id: HandleId,
    kind: ActorKind,
    blueprint: Mutex<Blueprint>,
    /// 未绑定时使用的位姿
    transform_init: Mutex<Transform>,
    parent: Mutex<Option<Arc<ActorHandle>>>,
    children: Mutex<Vec<Weak<ActorHandle>>>,
    native: RwLock<Option<Arc<dyn NativeActor>>>,
    physics: AtomicBool,
    /// 仅传感器类型持有
    sensor: Option<Arc<SensorChannel>>,
}

impl ActorHandle {
    /// 创建未绑定句柄，由注册表调用
    pub(crate) fn new(kind: ActorKind, blueprint: Blueprint) -> Self {
        Self {
            id: HandleId::new(),
            kind,
            blueprint: Mutex::new(blueprint),
            transform_init: Mutex::new(Transform::default()),
            parent: Mutex::new(None),
            children: Mutex::new(Vec::new()),
            native: RwLock::new(None),
            physics: AtomicBool::new(true),
            sensor: kind.is_sensor().then(|| Arc::new(SensorChannel::new())),
        }
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    pub fn kind(&self) -> ActorKind {
        self.kind
    }

    /// `role_name` 属性，未设置时为 `<Kind>-<id 前 8 位>`
    pub fn name(&self) -> String {
        self.blueprint
            .lock()
            .attribute(ROLE_NAME)
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}-{}", self.kind.type_name(), self.id.short()))
    }

    /// 设置名称，仅未绑定时允许
    pub fn set_name(&self, name: impl Into<String>) -> Result<()> {
        self.set_attribute(ROLE_NAME, Some(name))
    }

    pub fn blueprint(&self) -> Blueprint {
        self.blueprint.lock().clone()
    }

    /// 设置蓝图属性，仅未绑定时允许；`None` 表示随机推荐值
    pub fn set_attribute(&self, key: impl Into<String>, value: Option<impl Into<String>>) -> Result<()> {
        let key = key.into();
        if self.is_alive() {
            return Err(ActorFactoryError::invalid_argument(
                key,
                "cannot change blueprint attributes of a spawned actor",
            ));
        }
        self.blueprint.lock().set_attribute(key, value);
        Ok(())
    }

    /// 服务器端 actor id，未绑定时为 None
    pub fn actor_id(&self) -> Option<ActorId> {
        self.live_native().map(|n| n.id())
    }

    /// 已绑定且服务器端存活
    pub fn is_alive(&self) -> bool {
        self.live_native().is_some()
    }

    /// 要求已绑定，返回服务器端 actor
    pub fn ensure_alive(&self) -> Result<Arc<dyn NativeActor>> {
        self.live_native().ok_or(ActorFactoryError::NotAlive {
            handle: self.id,
            kind: self.kind,
        })
    }

    /// 已绑定且存活的服务器端 actor
    pub fn live_native(&self) -> Option<Arc<dyn NativeActor>> {
        self.native
            .read()
            .as_ref()
            .filter(|n| n.is_alive())
            .cloned()
    }

    // ===== Pose & motion =====

    /// 未绑定时为初始位姿，绑定后为服务器上的实时位姿
    pub fn transform(&self) -> Result<Transform> {
        match self.live_native() {
            Some(native) => Ok(native.transform()?),
            None => Ok(*self.transform_init.lock()),
        }
    }

    /// 构造时 (或未绑定期间最后一次设置) 的初始位姿
    pub fn transform_init(&self) -> Transform {
        *self.transform_init.lock()
    }

    /// 绑定时移动服务器上的 actor，否则更新初始位姿
    pub fn set_transform(&self, transform: Transform) -> Result<()> {
        match self.live_native() {
            Some(native) => Ok(native.set_transform(&transform)?),
            None => {
                *self.transform_init.lock() = transform;
                Ok(())
            }
        }
    }

    /// 逐字段修改位姿
    pub fn set_transform_direct(&self, patch: &TransformPatch) -> Result<()> {
        let current = self.transform()?;
        self.set_transform(current.patched(patch))
    }

    pub fn velocity(&self) -> Result<Vector3> {
        match self.live_native() {
            Some(native) => Ok(native.velocity()?),
            None => Ok(Vector3::ZERO),
        }
    }

    pub fn angular_velocity(&self) -> Result<Vector3> {
        match self.live_native() {
            Some(native) => Ok(native.angular_velocity()?),
            None => Ok(Vector3::ZERO),
        }
    }

    pub fn acceleration(&self) -> Result<Vector3> {
        match self.live_native() {
            Some(native) => Ok(native.acceleration()?),
            None => Ok(Vector3::ZERO),
        }
    }

    /// 物理仿真开关；绑定时立即生效，否则在绑定时应用
    pub fn use_physics(&self, enabled: bool) -> Result<()> {
        self.physics.store(enabled, Ordering::SeqCst);
        if let Some(native) = self.live_native() {
            native.set_simulate_physics(enabled)?;
        }
        Ok(())
    }

    pub fn physics_enabled(&self) -> bool {
        self.physics.load(Ordering::SeqCst)
    }

    // ===== Attachment tree =====

    pub fn parent(&self) -> Option<Arc<ActorHandle>> {
        self.parent.lock().clone()
    }

    /// 存活的子节点，按挂载顺序
    pub fn children(&self) -> Vec<Arc<ActorHandle>> {
        self.children
            .lock()
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    /// 挂载到父节点；仅未绑定时允许，且不得成环
    pub fn set_parent(self: &Arc<Self>, parent: &Arc<ActorHandle>) -> Result<()> {
        if self.is_alive() {
            return Err(ActorFactoryError::invalid_argument(
                "parent",
                "cannot re-attach a spawned actor",
            ));
        }

        let mut ancestor = Some(Arc::clone(parent));
        while let Some(handle) = ancestor {
            if handle.id == self.id {
                return Err(ActorFactoryError::invalid_argument(
                    "parent",
                    "attachment would create a cycle",
                ));
            }
            ancestor = handle.parent();
        }

        if let Some(old) = self.parent.lock().replace(Arc::clone(parent)) {
            old.children
                .lock()
                .retain(|c| c.upgrade().is_some_and(|c| c.id != self.id));
        }
        parent.children.lock().push(Arc::downgrade(self));
        Ok(())
    }

    /// 到根节点的层数，根为 0
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self.parent();
        while let Some(handle) = current {
            depth += 1;
            current = handle.parent();
        }
        depth
    }

    // ===== Views =====

    /// 车辆视图
    pub fn vehicle(&self) -> Result<Vehicle<'_>> {
        if self.kind.is_vehicle() {
            Ok(Vehicle::new(self))
        } else {
            Err(ActorFactoryError::invalid_argument(
                "handle",
                format!("{} actor {} is not a vehicle", self.kind, self.id.short()),
            ))
        }
    }

    /// 传感器视图
    pub fn sensor(&self) -> Result<Sensor<'_>> {
        match &self.sensor {
            Some(channel) => Ok(Sensor::new(self, channel)),
            None => Err(ActorFactoryError::invalid_argument(
                "handle",
                format!("{} actor {} is not a sensor", self.kind, self.id.short()),
            )),
        }
    }

    // ===== Lifecycle =====

    /// 绑定服务器端 actor：应用物理开关，传感器开始监听
    #[instrument(
        name = "actor_handle_bind",
        skip(self, native),
        fields(handle = %self.id, actor_id = native.id())
    )]
    pub(crate) fn bind(&self, native: Arc<dyn NativeActor>) -> Result<()> {
        if !native.is_alive() {
            return Err(ActorFactoryError::BindFailed {
                actor_id: native.id(),
            });
        }

        native.set_simulate_physics(self.physics_enabled())?;
        if let Some(channel) = &self.sensor {
            sensor::start_listening(native.as_ref(), channel)?;
        }

        *self.native.write() = Some(native);
        Ok(())
    }

    /// 销毁服务器端 actor 并清除绑定
    ///
    /// 绑定总会被清除，即使连接已断开。返回服务器是否确认销毁。
    #[instrument(name = "actor_handle_destroy", skip(self), fields(handle = %self.id))]
    pub(crate) fn destroy(&self) -> Result<bool> {
        let Some(native) = self.native.write().take() else {
            return Ok(false);
        };
        if !native.is_alive() {
            return Ok(false);
        }

        if self.sensor.is_some() {
            if let Some(sensor) = native.as_sensor() {
                if let Err(e) = sensor.stop() {
                    debug!(error = %e, "Failed to stop sensor before destroy");
                }
            }
        }

        match native.destroy() {
            Ok(confirmed) => Ok(confirmed),
            Err(e) if e.is_world_lost() => {
                warn!(actor_id = native.id(), "World gone, binding cleared without destroy");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl fmt::Debug for ActorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorHandle")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("blueprint", &self.blueprint.lock().name())
            .field("actor_id", &self.actor_id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_client::MockSimulator;
    use contracts::{Location, Rotation, SimWorld};

    fn handle(blueprint: &str) -> Arc<ActorHandle> {
        Arc::new(ActorHandle::new(
            crate::kind::resolve_kind(blueprint),
            Blueprint::new(blueprint),
        ))
    }

    fn spawn(world: &Arc<dyn SimWorld>, handle: &ActorHandle) {
        let resolved = handle.blueprint().resolve(world.as_ref()).unwrap();
        let native = world
            .spawn_actor(&resolved, &handle.transform_init(), None)
            .unwrap();
        handle.bind(native).unwrap();
    }

    #[test]
    fn test_unbound_defaults() {
        let h = handle("vehicle.tesla.model3");

        assert!(!h.is_alive());
        assert!(h.actor_id().is_none());
        assert_eq!(h.velocity().unwrap(), Vector3::ZERO);
        assert_eq!(h.acceleration().unwrap(), Vector3::ZERO);
        assert!(h.name().starts_with("Vehicle-"));
        assert!(matches!(
            h.ensure_alive(),
            Err(ActorFactoryError::NotAlive { .. })
        ));
    }

    #[test]
    fn test_unbound_transform_is_initial_pose() {
        let h = handle("vehicle.tesla.model3");
        let pose = Transform::new(Location::new(1.0, 2.0, 3.0), Rotation::new(0.0, 90.0, 0.0));

        h.set_transform(pose).unwrap();
        assert_eq!(h.transform().unwrap(), pose);

        h.set_transform_direct(&TransformPatch {
            z: Some(0.5),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(h.transform().unwrap().location, Location::new(1.0, 2.0, 0.5));
    }

    #[test]
    fn test_bound_transform_is_live() {
        let sim = MockSimulator::new();
        let world = sim.world_handle();
        let h = handle("vehicle.tesla.model3");
        h.set_transform(Transform::from_xyz(5.0, 0.0, 0.0)).unwrap();
        spawn(&world, &h);

        let actor_id = h.actor_id().unwrap();
        sim.set_actor_transform(actor_id, Transform::from_xyz(42.0, 1.0, 0.0));
        assert_eq!(h.transform().unwrap().location.x, 42.0);

        h.set_transform(Transform::from_xyz(7.0, 7.0, 7.0)).unwrap();
        assert_eq!(sim.actor_transform(actor_id).unwrap().location.x, 7.0);
        assert_eq!(h.transform_init().location.x, 5.0);
    }

    #[test]
    fn test_destroy_clears_binding_and_reverts_pose() {
        let sim = MockSimulator::new();
        let world = sim.world_handle();
        let h = handle("vehicle.tesla.model3");
        h.set_transform(Transform::from_xyz(5.0, 0.0, 0.0)).unwrap();
        spawn(&world, &h);
        sim.set_actor_transform(h.actor_id().unwrap(), Transform::from_xyz(99.0, 0.0, 0.0));

        assert!(h.destroy().unwrap());
        assert!(!h.is_alive());
        assert_eq!(h.transform().unwrap().location.x, 5.0);
        assert!(!h.destroy().unwrap());
    }

    #[test]
    fn test_destroy_after_disconnect_still_clears_binding() {
        let sim = MockSimulator::new();
        let world = sim.world_handle();
        let h = handle("sensor.other.imu");
        spawn(&world, &h);

        sim.disconnect_all();
        let _ = h.destroy();
        assert!(!h.is_alive());
    }

    #[test]
    fn test_attributes_locked_after_spawn() {
        let sim = MockSimulator::new();
        let world = sim.world_handle();
        let h = handle("vehicle.tesla.model3");
        h.set_name("hero").unwrap();
        assert_eq!(h.name(), "hero");

        spawn(&world, &h);
        assert!(matches!(
            h.set_name("villain"),
            Err(ActorFactoryError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_set_parent_links_tree() {
        let vehicle = handle("vehicle.tesla.model3");
        let camera = handle("sensor.camera.rgb");
        let lidar = handle("sensor.lidar.ray_cast");

        camera.set_parent(&vehicle).unwrap();
        lidar.set_parent(&vehicle).unwrap();

        let children: Vec<_> = vehicle.children().iter().map(|c| c.id()).collect();
        assert_eq!(children, vec![camera.id(), lidar.id()]);
        assert_eq!(camera.depth(), 1);
        assert_eq!(vehicle.depth(), 0);
    }

    #[test]
    fn test_set_parent_rejects_cycle() {
        let a = handle("vehicle.tesla.model3");
        let b = handle("sensor.other.imu");
        b.set_parent(&a).unwrap();

        assert!(a.set_parent(&b).is_err());
        assert!(a.set_parent(&a).is_err());
    }

    #[test]
    fn test_views_check_kind() {
        let vehicle = handle("vehicle.tesla.model3");
        let gnss = handle("sensor.other.gnss");

        assert!(vehicle.vehicle().is_ok());
        assert!(vehicle.sensor().is_err());
        assert!(gnss.sensor().is_ok());
        assert!(gnss.vehicle().is_err());
    }

    #[test]
    fn test_physics_flag_applied_on_bind() {
        let sim = MockSimulator::new();
        let world = sim.world_handle();
        let h = handle("vehicle.tesla.model3");
        h.use_physics(false).unwrap();
        spawn(&world, &h);

        assert_eq!(sim.actor_physics(h.actor_id().unwrap()), Some(false));

        h.use_physics(true).unwrap();
        assert_eq!(sim.actor_physics(h.actor_id().unwrap()), Some(true));
    }
}
