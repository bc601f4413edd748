//! 真实 CARLA 客户端实现
//!
//! 基于 carla-rust 实现仿真器边界 trait。
//! 仅在启用 `real-carla` feature 时编译。

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use carla::client::{ActorBase, Client, Sensor as CarlaSensor, Vehicle as CarlaVehicle, World};
use carla::geom::{Location, Rotation, Transform as CarlaTransform};
use carla::rpc::{
    AckermannControllerSettings, VehicleAckermannControl, VehicleControl as CarlaControl,
    VehicleWheelLocation,
};
use contracts::{
    AckermannControl, AckermannSettings, ActorId, AttributeInfo, BlueprintInfo,
    MeasurementCallback, NativeActor, NativeSensor, NativeVehicle, ResolvedBlueprint, SimResult,
    SimWorld, SimulatorConnector, SimulatorError, SimulatorSession, Transform, Vector3,
    VehicleControl, WheelLocation, WorldSettings, WorldSnapshot,
};
use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::kind::resolve_kind;
use crate::sensor_data_converter::convert_sensor_data;

/// 真实 CARLA 连接器
#[derive(Debug, Default, Clone)]
pub struct CarlaConnector;

impl CarlaConnector {
    pub fn new() -> Self {
        Self
    }
}

impl SimulatorConnector for CarlaConnector {
    #[instrument(name = "real_carla_connect", skip(self, timeout), fields(host = %host, port))]
    fn connect(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> SimResult<Arc<dyn SimulatorSession>> {
        let mut client = Client::connect(host, port, None);
        client.set_timeout(timeout);
        Ok(Arc::new(CarlaSession {
            client: Mutex::new(client),
            released: Arc::new(AtomicBool::new(false)),
        }))
    }
}

struct CarlaSession {
    client: Mutex<Client>,
    /// 会话释放后，已发出的世界句柄一律返回 `WorldUnavailable`
    released: Arc<AtomicBool>,
}

impl Drop for CarlaSession {
    fn drop(&mut self) {
        self.released.store(true, Ordering::Release);
    }
}

impl SimulatorSession for CarlaSession {
    fn server_version(&self) -> SimResult<String> {
        let version = self.client.lock().server_version();
        if version.is_empty() {
            Err(SimulatorError::transport("empty server version"))
        } else {
            Ok(version)
        }
    }

    fn world(&self) -> SimResult<Arc<dyn SimWorld>> {
        let world = self.client.lock().world();
        info!(map = %world.map().name(), "CARLA world acquired");
        Ok(Arc::new(CarlaWorld {
            world: Mutex::new(world),
            released: Arc::clone(&self.released),
        }))
    }

    fn load_world(&self, map: &str) -> SimResult<()> {
        self.client.lock().load_world(map);
        Ok(())
    }

    fn reload_world(&self, reset_settings: bool) -> SimResult<()> {
        self.client.lock().reload_world(reset_settings);
        Ok(())
    }
}

struct CarlaWorld {
    world: Mutex<World>,
    released: Arc<AtomicBool>,
}

impl CarlaWorld {
    /// 克隆一份世界句柄，阻塞调用期间不持锁
    ///
    /// 所属会话释放后返回 `WorldUnavailable`。
    fn handle(&self) -> SimResult<World> {
        if self.released.load(Ordering::Acquire) {
            return Err(SimulatorError::WorldUnavailable);
        }
        Ok(self.world.lock().clone())
    }
}

impl SimWorld for CarlaWorld {
    fn map_name(&self) -> SimResult<String> {
        Ok(self.handle()?.map().name().to_string())
    }

    fn settings(&self) -> SimResult<WorldSettings> {
        let settings = self.handle()?.settings();
        Ok(WorldSettings {
            synchronous_mode: settings.synchronous_mode,
            fixed_delta_seconds: settings.fixed_delta_seconds,
        })
    }

    fn apply_settings(&self, settings: &WorldSettings) -> SimResult<u64> {
        let mut world = self.handle()?;
        let mut native = world.settings();
        native.synchronous_mode = settings.synchronous_mode;
        native.fixed_delta_seconds = settings.fixed_delta_seconds;
        Ok(world.apply_settings(&native, Duration::from_secs(2)))
    }

    fn tick(&self) -> SimResult<u64> {
        Ok(self.handle()?.tick())
    }

    fn wait_for_tick(&self) -> SimResult<WorldSnapshot> {
        let snapshot = self.handle()?.wait_for_tick();
        let timestamp = snapshot.timestamp();
        Ok(WorldSnapshot {
            frame: timestamp.frame as u64,
            elapsed_seconds: timestamp.elapsed_seconds,
            delta_seconds: timestamp.delta_seconds,
        })
    }

    fn snapshot(&self) -> SimResult<WorldSnapshot> {
        let snapshot = self.handle()?.snapshot();
        let timestamp = snapshot.timestamp();
        Ok(WorldSnapshot {
            frame: timestamp.frame as u64,
            elapsed_seconds: timestamp.elapsed_seconds,
            delta_seconds: timestamp.delta_seconds,
        })
    }

    fn find_blueprint(&self, id: &str) -> SimResult<Option<BlueprintInfo>> {
        let library = self.handle()?.blueprint_library();
        Ok(library.find(id).map(|bp| BlueprintInfo {
            id: bp.id().to_string(),
            attributes: bp
                .attributes()
                .map(|attr| AttributeInfo {
                    id: attr.id().to_string(),
                    modifiable: attr.is_modifiable(),
                    recommended_values: attr.recommended_values().map(|v| v.to_string()).collect(),
                })
                .collect(),
        }))
    }

    #[instrument(
        name = "real_carla_spawn_actor",
        skip(self, blueprint, transform, attach_to),
        fields(blueprint = %blueprint.id)
    )]
    fn spawn_actor(
        &self,
        blueprint: &ResolvedBlueprint,
        transform: &Transform,
        attach_to: Option<&Arc<dyn NativeActor>>,
    ) -> SimResult<Arc<dyn NativeActor>> {
        let mut world = self.handle()?;
        let mut bp = world
            .blueprint_library()
            .find(&blueprint.id)
            .ok_or_else(|| SimulatorError::blueprint_not_found(&blueprint.id))?;

        for (key, value) in &blueprint.attributes {
            if !bp.set_attribute(key, value) {
                warn!(key, value, "failed to set blueprint attribute");
            }
        }

        let carla_transform = to_carla_transform(transform);
        let actor = match attach_to {
            Some(parent) => {
                let parent = parent
                    .as_any()
                    .downcast_ref::<CarlaActor>()
                    .ok_or_else(|| {
                        SimulatorError::spawn_rejected(&blueprint.id, "attach target is not a CARLA actor")
                    })?;
                world.spawn_actor_attached(&bp, &carla_transform, &parent.actor, None)
            }
            None => world.spawn_actor(&bp, &carla_transform),
        }
        .map_err(|e| SimulatorError::spawn_rejected(&blueprint.id, e.to_string()))?;

        let id = actor.id();
        debug!(actor_id = id, "CARLA actor spawned");
        Ok(Arc::new(CarlaActor::new(blueprint.id.clone(), actor)))
    }
}

/// 服务器端 CARLA actor
pub struct CarlaActor {
    blueprint: String,
    actor: carla::client::Actor,
    vehicle: Option<CarlaVehicle>,
    sensor: Option<CarlaSensor>,
    listening: Mutex<bool>,
}

impl std::fmt::Debug for CarlaActor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CarlaActor")
            .field("id", &self.actor.id())
            .field("blueprint", &self.blueprint)
            .finish()
    }
}

impl CarlaActor {
    fn new(blueprint: String, actor: carla::client::Actor) -> Self {
        let kind = resolve_kind(&blueprint);
        let vehicle = kind
            .is_vehicle()
            .then(|| CarlaVehicle::try_from(actor.clone()).ok())
            .flatten();
        let sensor = kind
            .is_sensor()
            .then(|| CarlaSensor::try_from(actor.clone()).ok())
            .flatten();
        Self {
            blueprint,
            actor,
            vehicle,
            sensor,
            listening: Mutex::new(false),
        }
    }
}

impl NativeActor for CarlaActor {
    fn id(&self) -> ActorId {
        self.actor.id()
    }

    fn blueprint_id(&self) -> &str {
        &self.blueprint
    }

    fn is_alive(&self) -> bool {
        self.actor.is_alive()
    }

    fn destroy(&self) -> SimResult<bool> {
        Ok(self.actor.destroy())
    }

    fn transform(&self) -> SimResult<Transform> {
        Ok(from_carla_transform(&self.actor.transform()))
    }

    fn set_transform(&self, transform: &Transform) -> SimResult<()> {
        self.actor.set_transform(&to_carla_transform(transform));
        Ok(())
    }

    fn velocity(&self) -> SimResult<Vector3> {
        let v = self.actor.velocity();
        Ok(Vector3::new(v.x as f64, v.y as f64, v.z as f64))
    }

    fn angular_velocity(&self) -> SimResult<Vector3> {
        let v = self.actor.angular_velocity();
        Ok(Vector3::new(v.x as f64, v.y as f64, v.z as f64))
    }

    fn acceleration(&self) -> SimResult<Vector3> {
        let v = self.actor.acceleration();
        Ok(Vector3::new(v.x as f64, v.y as f64, v.z as f64))
    }

    fn set_simulate_physics(&self, enabled: bool) -> SimResult<()> {
        self.actor.set_simulate_physics(enabled);
        Ok(())
    }

    fn as_vehicle(&self) -> Option<&dyn NativeVehicle> {
        self.vehicle.as_ref().map(|_| self as &dyn NativeVehicle)
    }

    fn as_sensor(&self) -> Option<&dyn NativeSensor> {
        self.sensor.as_ref().map(|_| self as &dyn NativeSensor)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl CarlaActor {
    fn vehicle(&self) -> SimResult<&CarlaVehicle> {
        self.vehicle
            .as_ref()
            .ok_or_else(|| SimulatorError::Other(format!("actor {} is not a vehicle", self.id())))
    }

    fn sensor(&self) -> SimResult<&CarlaSensor> {
        self.sensor
            .as_ref()
            .ok_or_else(|| SimulatorError::Other(format!("actor {} is not a sensor", self.id())))
    }
}

impl NativeVehicle for CarlaActor {
    fn control(&self) -> SimResult<VehicleControl> {
        let c = self.vehicle()?.control();
        Ok(VehicleControl {
            throttle: c.throttle,
            steer: c.steer,
            brake: c.brake,
            hand_brake: c.hand_brake,
            reverse: c.reverse,
            manual_gear_shift: c.manual_gear_shift,
            gear: c.gear,
        })
    }

    fn apply_control(&self, control: &VehicleControl) -> SimResult<()> {
        self.vehicle()?.apply_control(&CarlaControl {
            throttle: control.throttle,
            steer: control.steer,
            brake: control.brake,
            hand_brake: control.hand_brake,
            reverse: control.reverse,
            manual_gear_shift: control.manual_gear_shift,
            gear: control.gear,
        });
        Ok(())
    }

    fn apply_ackermann_control(&self, control: &AckermannControl) -> SimResult<()> {
        self.vehicle()?
            .apply_ackermann_control(&VehicleAckermannControl {
                steer: control.steer,
                steer_speed: control.steer_speed,
                speed: control.speed,
                acceleration: control.acceleration,
                jerk: control.jerk,
            });
        Ok(())
    }

    fn ackermann_settings(&self) -> SimResult<AckermannSettings> {
        let s = self.vehicle()?.ackermann_controller_settings();
        Ok(AckermannSettings {
            speed_kp: s.speed_kp,
            speed_ki: s.speed_ki,
            speed_kd: s.speed_kd,
            accel_kp: s.accel_kp,
            accel_ki: s.accel_ki,
            accel_kd: s.accel_kd,
        })
    }

    fn apply_ackermann_settings(&self, settings: &AckermannSettings) -> SimResult<()> {
        self.vehicle()?
            .apply_ackermann_controller_settings(&AckermannControllerSettings {
                speed_kp: settings.speed_kp,
                speed_ki: settings.speed_ki,
                speed_kd: settings.speed_kd,
                accel_kp: settings.accel_kp,
                accel_ki: settings.accel_ki,
                accel_kd: settings.accel_kd,
            });
        Ok(())
    }

    fn wheel_steer_angle(&self, wheel: WheelLocation) -> SimResult<f32> {
        Ok(self.vehicle()?.wheel_steer_angle(to_carla_wheel(wheel)))
    }

    fn set_wheel_steer_direction(&self, wheel: WheelLocation, degrees: f32) -> SimResult<()> {
        self.vehicle()?
            .set_wheel_steer_direction(to_carla_wheel(wheel), degrees);
        Ok(())
    }
}

impl NativeSensor for CarlaActor {
    fn listen(&self, callback: MeasurementCallback) -> SimResult<()> {
        let sensor = self.sensor()?;
        let kind = resolve_kind(&self.blueprint);
        let actor_id = self.id();

        sensor.listen(move |data| match convert_sensor_data(kind, &data) {
            Some(measurement) => callback(measurement),
            None => debug!(actor_id, "failed to convert sensor data"),
        });
        *self.listening.lock() = true;
        Ok(())
    }

    fn stop(&self) -> SimResult<()> {
        let mut listening = self.listening.lock();
        if *listening {
            self.sensor()?.stop();
            *listening = false;
        }
        Ok(())
    }

    fn is_listening(&self) -> bool {
        self.sensor
            .as_ref()
            .map(|s| s.is_listening())
            .unwrap_or(false)
    }
}

fn to_carla_wheel(wheel: WheelLocation) -> VehicleWheelLocation {
    match wheel {
        WheelLocation::FrontLeft => VehicleWheelLocation::FL_Wheel,
        WheelLocation::FrontRight => VehicleWheelLocation::FR_Wheel,
        WheelLocation::BackLeft => VehicleWheelLocation::BL_Wheel,
        WheelLocation::BackRight => VehicleWheelLocation::BR_Wheel,
    }
}

/// 内部 Transform 转 CARLA Transform
pub(crate) fn to_carla_transform(transform: &Transform) -> CarlaTransform {
    CarlaTransform {
        location: Location {
            x: transform.location.x as f32,
            y: transform.location.y as f32,
            z: transform.location.z as f32,
        },
        rotation: Rotation {
            pitch: transform.rotation.pitch as f32,
            yaw: transform.rotation.yaw as f32,
            roll: transform.rotation.roll as f32,
        },
    }
}

pub(crate) fn from_carla_transform(transform: &CarlaTransform) -> Transform {
    Transform::new(
        contracts::Location::new(
            transform.location.x as f64,
            transform.location.y as f64,
            transform.location.z as f64,
        ),
        contracts::Rotation::new(
            transform.rotation.pitch as f64,
            transform.rotation.yaw as f64,
            transform.rotation.roll as f64,
        ),
    )
}
