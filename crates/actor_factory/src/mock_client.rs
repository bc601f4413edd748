//! Mock CARLA 模拟器
//!
//! 实现 simulator 边界的全部 trait，用于单元测试与无 CARLA 环境运行。
//! 记录调用顺序，支持注入失败场景。

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use contracts::{
    AckermannControl, AckermannSettings, ActorId, BlueprintInfo, GnssData, ImageData,
    ImageFormat, ImuData, LidarData, LidarPoint, MeasurementCallback, NativeActor, NativeSensor,
    NativeVehicle, RadarData, RadarDetection, ResolvedBlueprint, SensorMeasurement,
    SensorPayload, SimResult, SimWorld, SimulatorConnector, SimulatorError, SimulatorSession,
    Transform, Vector3, VehicleControl, WheelLocation, WheelSteerAngles, WorldSettings,
    WorldSnapshot,
};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, instrument};

use crate::kind::resolve_kind;
use contracts::ActorKind;

/// 前轮最大物理转向角 (度)
const MAX_STEER_DEGREES: f32 = 70.0;

/// 同步模式下 wait_for_tick 的最长等待
const SYNC_WAIT_TIMEOUT: Duration = Duration::from_secs(2);

/// Mock 调用记录
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    Connect { host: String, port: u16 },
    ApplySettings { synchronous: bool, fixed_delta: Option<f64> },
    Tick { frame: u64 },
    WaitForTick { frame: u64 },
    Spawn { blueprint: String, actor_id: ActorId, attach_to: Option<ActorId> },
    Destroy { actor_id: ActorId },
    LoadWorld { map: String },
    ReloadWorld { reset_settings: bool },
    SessionReleased,
}

/// Mock 配置
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// 蓝图目录
    pub catalog: Vec<BlueprintInfo>,
    /// 可加载的地图
    pub maps: Vec<String>,
    /// 应该 spawn 失败的蓝图
    pub fail_spawn: Vec<String>,
    /// 服务器不可达：连接可以打开，但版本探测失败
    pub unreachable: bool,
    /// 自由运行模式下服务器的 tick 间隔
    pub tick_interval: Duration,
    /// 每个 tick 为监听中的传感器生成测量
    pub emit_sensor_data: bool,
    /// 记录调用顺序；长时间运行时关闭
    pub record_calls: bool,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            catalog: default_catalog(),
            maps: vec!["Town01".into(), "Town03".into(), "Town10HD_Opt".into()],
            fail_spawn: Vec::new(),
            unreachable: false,
            tick_interval: Duration::from_millis(5),
            emit_sensor_data: true,
            record_calls: true,
        }
    }
}

/// 默认蓝图目录
pub fn default_catalog() -> Vec<BlueprintInfo> {
    let colors = &["255,0,0", "0,0,255", "20,20,20"];
    let vehicle = |id: &str| {
        BlueprintInfo::new(id)
            .with_attribute("color", true, colors)
            .with_attribute("number_of_wheels", false, &["4"])
            .with_attribute("role_name", true, &[])
    };
    let sensor = |id: &str| {
        BlueprintInfo::new(id)
            .with_attribute("sensor_tick", true, &["0.0"])
            .with_attribute("role_name", true, &[])
    };
    let camera = |id: &str| {
        sensor(id)
            .with_attribute("image_size_x", true, &["800"])
            .with_attribute("image_size_y", true, &["600"])
            .with_attribute("fov", true, &["90"])
    };

    vec![
        vehicle("vehicle.tesla.model3"),
        vehicle("vehicle.audi.tt"),
        vehicle("vehicle.lincoln.mkz_2020"),
        camera("sensor.camera.rgb"),
        camera("sensor.camera.depth"),
        camera("sensor.camera.semantic_segmentation"),
        sensor("sensor.lidar.ray_cast")
            .with_attribute("channels", true, &["32", "64"])
            .with_attribute("range", true, &["50", "100"])
            .with_attribute("points_per_second", true, &["56000"])
            .with_attribute("rotation_frequency", true, &["10", "20"]),
        sensor("sensor.other.imu"),
        sensor("sensor.other.gnss"),
        sensor("sensor.other.radar")
            .with_attribute("horizontal_fov", true, &["30"])
            .with_attribute("vertical_fov", true, &["30"])
            .with_attribute("range", true, &["100"]),
        sensor("sensor.other.collision"),
        BlueprintInfo::new("static.prop.box01").with_attribute("role_name", true, &[]),
    ]
}

/// 服务器端 actor 记录
#[derive(Clone)]
struct ActorRecord {
    blueprint: String,
    alive: bool,
    parent: Option<ActorId>,
    transform: Transform,
    velocity: Vector3,
    angular_velocity: Vector3,
    acceleration: Vector3,
    physics: bool,
    control: VehicleControl,
    ackermann: Option<AckermannControl>,
    ackermann_settings: AckermannSettings,
    visual_steer: WheelSteerAngles,
    callback: Option<MeasurementCallback>,
}

impl ActorRecord {
    fn new(blueprint: &str, transform: Transform, parent: Option<ActorId>) -> Self {
        Self {
            blueprint: blueprint.to_string(),
            alive: true,
            parent,
            transform,
            velocity: Vector3::ZERO,
            angular_velocity: Vector3::ZERO,
            acceleration: Vector3::ZERO,
            physics: true,
            control: VehicleControl::default(),
            ackermann: None,
            // CARLA 默认 PID 参数
            ackermann_settings: AckermannSettings {
                speed_kp: 0.15,
                speed_ki: 0.0,
                speed_kd: 0.25,
                accel_kp: 0.01,
                accel_ki: 0.0,
                accel_kd: 0.01,
            },
            visual_steer: WheelSteerAngles::default(),
            callback: None,
        }
    }

    fn physical_steer(&self, wheel: WheelLocation) -> f32 {
        match wheel {
            WheelLocation::FrontLeft | WheelLocation::FrontRight => {
                self.control.steer * MAX_STEER_DEGREES
            }
            WheelLocation::BackLeft | WheelLocation::BackRight => 0.0,
        }
    }
}

struct MockState {
    available: bool,
    sessions_opened: u32,
    sessions_released: u32,
    calls: Vec<MockCall>,
    actors: HashMap<ActorId, ActorRecord>,
    next_actor_id: ActorId,
    settings: WorldSettings,
    map_name: String,
    frame: u64,
    elapsed: f64,
    last_delta: f64,
}

struct MockShared {
    config: MockConfig,
    state: Mutex<MockState>,
    /// 每次帧推进时通知
    frame_advanced: Condvar,
}

impl MockShared {
    fn record(&self, state: &mut MockState, call: MockCall) {
        if self.config.record_calls {
            state.calls.push(call);
        }
    }

    fn ensure_available(state: &MockState) -> SimResult<()> {
        if state.available {
            Ok(())
        } else {
            Err(SimulatorError::WorldUnavailable)
        }
    }

    /// 推进一帧并为监听中的传感器生成测量。回调在锁外执行。
    fn advance(&self, delta: f64, call: impl FnOnce(u64) -> MockCall) -> WorldSnapshot {
        let (snapshot, deliveries) = {
            let mut state = self.state.lock();
            state.frame += 1;
            state.elapsed += delta;
            state.last_delta = delta;
            let frame = state.frame;
            self.record(&mut state, call(frame));

            let snapshot = WorldSnapshot {
                frame,
                elapsed_seconds: state.elapsed,
                delta_seconds: delta,
            };

            let deliveries: Vec<_> = if self.config.emit_sensor_data {
                state
                    .actors
                    .values()
                    .filter(|a| a.alive)
                    .filter_map(|a| {
                        a.callback.as_ref().map(|cb| {
                            (
                                Arc::clone(cb),
                                synthesize_measurement(&a.blueprint, a.transform, &snapshot),
                            )
                        })
                    })
                    .collect()
            } else {
                Vec::new()
            };
            (snapshot, deliveries)
        };

        self.frame_advanced.notify_all();
        for (callback, measurement) in deliveries {
            callback(measurement);
        }
        snapshot
    }
}

/// 按传感器类型生成测量
fn synthesize_measurement(
    blueprint: &str,
    transform: Transform,
    snapshot: &WorldSnapshot,
) -> SensorMeasurement {
    let frame = snapshot.frame;
    let payload = match resolve_kind(blueprint) {
        ActorKind::Camera => SensorPayload::Image(ImageData {
            width: 4,
            height: 2,
            fov: 90.0,
            format: ImageFormat::Bgra8,
            data: Bytes::from(vec![128u8; 4 * 2 * 4]),
        }),
        ActorKind::Lidar => {
            let points: Vec<LidarPoint> = (0..4)
                .map(|i| LidarPoint {
                    x: i as f32,
                    y: -(i as f32),
                    z: 0.5,
                    intensity: 0.9,
                })
                .collect();
            SensorPayload::Lidar(LidarData::from_points(32, 0.0, &points))
        }
        ActorKind::Imu => SensorPayload::Imu(ImuData {
            accelerometer: Vector3::new(0.0, 0.0, 9.81),
            gyroscope: Vector3::ZERO,
            compass: 0.0,
        }),
        ActorKind::Gnss => SensorPayload::Gnss(GnssData {
            latitude: 49.0 + frame as f64 * 1e-6,
            longitude: 8.0 + frame as f64 * 1e-6,
            altitude: 120.0,
        }),
        ActorKind::Radar => SensorPayload::Radar(RadarData {
            detections: vec![
                RadarDetection {
                    altitude: 0.0,
                    azimuth: 0.1,
                    depth: 12.5,
                    velocity: -1.0,
                },
                RadarDetection {
                    altitude: 0.05,
                    azimuth: -0.2,
                    depth: 30.0,
                    velocity: 0.5,
                },
            ],
        }),
        _ => SensorPayload::Raw(Bytes::new()),
    };

    SensorMeasurement {
        frame,
        timestamp: snapshot.elapsed_seconds,
        transform,
        payload,
    }
}

/// Mock 模拟器
///
/// 克隆共享同一个服务器状态。
#[derive(Clone)]
pub struct MockSimulator {
    shared: Arc<MockShared>,
}

impl MockSimulator {
    /// 创建默认 mock 模拟器
    pub fn new() -> Self {
        Self::with_config(MockConfig::default())
    }

    /// 使用配置创建 mock 模拟器
    pub fn with_config(config: MockConfig) -> Self {
        let map_name = config.maps.first().cloned().unwrap_or_default();
        Self {
            shared: Arc::new(MockShared {
                config,
                state: Mutex::new(MockState {
                    available: true,
                    sessions_opened: 0,
                    sessions_released: 0,
                    calls: Vec::new(),
                    actors: HashMap::new(),
                    next_actor_id: 1000, // 从 1000 开始，便于识别
                    settings: WorldSettings::default(),
                    map_name,
                    frame: 0,
                    elapsed: 0.0,
                    last_delta: 0.0,
                }),
                frame_advanced: Condvar::new(),
            }),
        }
    }

    /// 直接获取世界句柄，不经过会话
    pub fn world_handle(&self) -> Arc<dyn SimWorld> {
        Arc::new(MockWorld {
            shared: Arc::clone(&self.shared),
        })
    }

    /// 模拟连接丢失：之后所有世界调用返回 `WorldUnavailable`
    pub fn disconnect_all(&self) {
        self.shared.state.lock().available = false;
        self.shared.frame_advanced.notify_all();
    }

    pub fn is_available(&self) -> bool {
        self.shared.state.lock().available
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.shared.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.shared.state.lock().calls.clear();
    }

    pub fn sessions_opened(&self) -> u32 {
        self.shared.state.lock().sessions_opened
    }

    pub fn sessions_released(&self) -> u32 {
        self.shared.state.lock().sessions_released
    }

    pub fn settings(&self) -> WorldSettings {
        self.shared.state.lock().settings
    }

    pub fn frame(&self) -> u64 {
        self.shared.state.lock().frame
    }

    pub fn map_name(&self) -> String {
        self.shared.state.lock().map_name.clone()
    }

    /// 服务器上存活的 actor 数量
    pub fn actor_count(&self) -> usize {
        self.shared
            .state
            .lock()
            .actors
            .values()
            .filter(|a| a.alive)
            .count()
    }

    /// 存活 actor IDs，升序
    pub fn alive_actor_ids(&self) -> Vec<ActorId> {
        let state = self.shared.state.lock();
        let mut ids: Vec<_> = state
            .actors
            .iter()
            .filter(|(_, a)| a.alive)
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn actor_parent(&self, actor_id: ActorId) -> Option<ActorId> {
        self.shared
            .state
            .lock()
            .actors
            .get(&actor_id)
            .and_then(|a| a.parent)
    }

    pub fn actor_transform(&self, actor_id: ActorId) -> Option<Transform> {
        self.with_record(actor_id, |a| a.transform)
    }

    pub fn actor_physics(&self, actor_id: ActorId) -> Option<bool> {
        self.with_record(actor_id, |a| a.physics)
    }

    pub fn actor_ackermann(&self, actor_id: ActorId) -> Option<AckermannControl> {
        self.with_record(actor_id, |a| a.ackermann).flatten()
    }

    pub fn actor_visual_steer(&self, actor_id: ActorId) -> Option<WheelSteerAngles> {
        self.with_record(actor_id, |a| a.visual_steer)
    }

    pub fn set_actor_transform(&self, actor_id: ActorId, transform: Transform) {
        self.with_record_mut(actor_id, |a| a.transform = transform);
    }

    pub fn set_actor_velocity(&self, actor_id: ActorId, velocity: Vector3) {
        self.with_record_mut(actor_id, |a| a.velocity = velocity);
    }

    pub fn set_actor_acceleration(&self, actor_id: ActorId, acceleration: Vector3) {
        self.with_record_mut(actor_id, |a| a.acceleration = acceleration);
    }

    /// 服务器侧销毁 actor (不经过客户端)
    pub fn kill_actor(&self, actor_id: ActorId) {
        self.with_record_mut(actor_id, |a| {
            a.alive = false;
            a.callback = None;
        });
    }

    /// 向传感器投递一条测量，返回是否有监听者
    pub fn emit_measurement(&self, actor_id: ActorId, measurement: SensorMeasurement) -> bool {
        let callback = self
            .shared
            .state
            .lock()
            .actors
            .get(&actor_id)
            .filter(|a| a.alive)
            .and_then(|a| a.callback.clone());
        match callback {
            Some(callback) => {
                callback(measurement);
                true
            }
            None => false,
        }
    }

    fn with_record<T>(&self, actor_id: ActorId, f: impl FnOnce(&ActorRecord) -> T) -> Option<T> {
        self.shared.state.lock().actors.get(&actor_id).map(f)
    }

    fn with_record_mut(&self, actor_id: ActorId, f: impl FnOnce(&mut ActorRecord)) {
        if let Some(record) = self.shared.state.lock().actors.get_mut(&actor_id) {
            f(record);
        }
    }
}

impl Default for MockSimulator {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatorConnector for MockSimulator {
    #[instrument(name = "mock_carla_connect", skip(self, timeout), fields(host = %host, port))]
    fn connect(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> SimResult<Arc<dyn SimulatorSession>> {
        let _ = timeout;
        {
            let mut state = self.shared.state.lock();
            state.sessions_opened += 1;
            state.available = !self.shared.config.unreachable;
            self.shared.record(
                &mut state,
                MockCall::Connect {
                    host: host.to_string(),
                    port,
                },
            );
        }
        Ok(Arc::new(MockSession {
            shared: Arc::clone(&self.shared),
        }))
    }
}

struct MockSession {
    shared: Arc<MockShared>,
}

impl SimulatorSession for MockSession {
    fn server_version(&self) -> SimResult<String> {
        if self.shared.config.unreachable {
            return Err(SimulatorError::transport("time-out while waiting for the simulator"));
        }
        let state = self.shared.state.lock();
        if state.available {
            Ok("0.9.15-mock".to_string())
        } else {
            Err(SimulatorError::transport("connection closed"))
        }
    }

    fn world(&self) -> SimResult<Arc<dyn SimWorld>> {
        MockShared::ensure_available(&self.shared.state.lock())?;
        Ok(Arc::new(MockWorld {
            shared: Arc::clone(&self.shared),
        }))
    }

    fn load_world(&self, map: &str) -> SimResult<()> {
        let mut state = self.shared.state.lock();
        MockShared::ensure_available(&state)?;
        if !self.shared.config.maps.iter().any(|m| m == map) {
            return Err(SimulatorError::Other(format!("map not found: {map}")));
        }
        self.shared.record(&mut state, MockCall::LoadWorld { map: map.to_string() });
        state.map_name = map.to_string();
        reset_episode(&mut state, false);
        Ok(())
    }

    fn reload_world(&self, reset_settings: bool) -> SimResult<()> {
        let mut state = self.shared.state.lock();
        MockShared::ensure_available(&state)?;
        self.shared.record(&mut state, MockCall::ReloadWorld { reset_settings });
        reset_episode(&mut state, reset_settings);
        Ok(())
    }
}

/// 新 episode：清空全部 actor，仿真时间归零
fn reset_episode(state: &mut MockState, reset_settings: bool) {
    for actor in state.actors.values_mut() {
        actor.alive = false;
        actor.callback = None;
    }
    state.elapsed = 0.0;
    if reset_settings {
        state.settings = WorldSettings::default();
    }
}

impl Drop for MockSession {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock();
        state.sessions_released += 1;
        state.available = false;
        self.shared.record(&mut state, MockCall::SessionReleased);
        drop(state);
        self.shared.frame_advanced.notify_all();
    }
}

struct MockWorld {
    shared: Arc<MockShared>,
}

impl SimWorld for MockWorld {
    fn map_name(&self) -> SimResult<String> {
        let state = self.shared.state.lock();
        MockShared::ensure_available(&state)?;
        Ok(state.map_name.clone())
    }

    fn settings(&self) -> SimResult<WorldSettings> {
        let state = self.shared.state.lock();
        MockShared::ensure_available(&state)?;
        Ok(state.settings)
    }

    fn apply_settings(&self, settings: &WorldSettings) -> SimResult<u64> {
        let mut state = self.shared.state.lock();
        MockShared::ensure_available(&state)?;
        state.settings = *settings;
        self.shared.record(
            &mut state,
            MockCall::ApplySettings {
                synchronous: settings.synchronous_mode,
                fixed_delta: settings.fixed_delta_seconds,
            },
        );
        Ok(state.frame)
    }

    fn tick(&self) -> SimResult<u64> {
        let delta = {
            let state = self.shared.state.lock();
            MockShared::ensure_available(&state)?;
            state
                .settings
                .fixed_delta_seconds
                .unwrap_or(self.shared.config.tick_interval.as_secs_f64())
        };
        let snapshot = self.shared.advance(delta, |frame| MockCall::Tick { frame });
        Ok(snapshot.frame)
    }

    fn wait_for_tick(&self) -> SimResult<WorldSnapshot> {
        let synchronous = {
            let state = self.shared.state.lock();
            MockShared::ensure_available(&state)?;
            state.settings.synchronous_mode
        };

        if !synchronous {
            let interval = self.shared.config.tick_interval;
            std::thread::sleep(interval);
            MockShared::ensure_available(&self.shared.state.lock())?;
            return Ok(self
                .shared
                .advance(interval.as_secs_f64(), |frame| MockCall::WaitForTick { frame }));
        }

        // 同步模式下服务器只在客户端 tick 时推进
        let deadline = Instant::now() + SYNC_WAIT_TIMEOUT;
        let mut state = self.shared.state.lock();
        let start_frame = state.frame;
        while state.frame == start_frame {
            MockShared::ensure_available(&state)?;
            if self
                .shared
                .frame_advanced
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                return Err(SimulatorError::timeout("wait_for_tick"));
            }
        }
        MockShared::ensure_available(&state)?;
        Ok(WorldSnapshot {
            frame: state.frame,
            elapsed_seconds: state.elapsed,
            delta_seconds: state.last_delta,
        })
    }

    fn snapshot(&self) -> SimResult<WorldSnapshot> {
        let state = self.shared.state.lock();
        MockShared::ensure_available(&state)?;
        Ok(WorldSnapshot {
            frame: state.frame,
            elapsed_seconds: state.elapsed,
            delta_seconds: state.last_delta,
        })
    }

    fn find_blueprint(&self, id: &str) -> SimResult<Option<BlueprintInfo>> {
        MockShared::ensure_available(&self.shared.state.lock())?;
        Ok(self.shared.config.catalog.iter().find(|b| b.id == id).cloned())
    }

    #[instrument(
        name = "mock_carla_spawn_actor",
        skip(self, blueprint, transform, attach_to),
        fields(blueprint = %blueprint.id)
    )]
    fn spawn_actor(
        &self,
        blueprint: &ResolvedBlueprint,
        transform: &Transform,
        attach_to: Option<&Arc<dyn NativeActor>>,
    ) -> SimResult<Arc<dyn NativeActor>> {
        let mut state = self.shared.state.lock();
        MockShared::ensure_available(&state)?;

        if !self.shared.config.catalog.iter().any(|b| b.id == blueprint.id) {
            return Err(SimulatorError::blueprint_not_found(&blueprint.id));
        }
        if self.shared.config.fail_spawn.contains(&blueprint.id) {
            return Err(SimulatorError::spawn_rejected(&blueprint.id, "mock failure"));
        }

        let parent = match attach_to {
            Some(target) => {
                let parent_id = target
                    .as_any()
                    .downcast_ref::<MockActor>()
                    .map(|a| a.id)
                    .filter(|id| state.actors.get(id).is_some_and(|a| a.alive))
                    .ok_or_else(|| {
                        SimulatorError::spawn_rejected(&blueprint.id, "attach target not found")
                    })?;
                Some(parent_id)
            }
            None => None,
        };

        let actor_id = state.next_actor_id;
        state.next_actor_id += 1;
        state
            .actors
            .insert(actor_id, ActorRecord::new(&blueprint.id, *transform, parent));
        self.shared.record(
            &mut state,
            MockCall::Spawn {
                blueprint: blueprint.id.clone(),
                actor_id,
                attach_to: parent,
            },
        );
        debug!(actor_id, "Mock actor spawned");

        Ok(Arc::new(MockActor {
            id: actor_id,
            blueprint: blueprint.id.clone(),
            kind: resolve_kind(&blueprint.id),
            shared: Arc::clone(&self.shared),
        }))
    }
}

/// Mock 服务器端 actor
pub struct MockActor {
    id: ActorId,
    blueprint: String,
    kind: ActorKind,
    shared: Arc<MockShared>,
}

impl std::fmt::Debug for MockActor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockActor")
            .field("id", &self.id)
            .field("blueprint", &self.blueprint)
            .finish()
    }
}

impl MockActor {
    fn read<T>(&self, f: impl FnOnce(&ActorRecord) -> T) -> SimResult<T> {
        let state = self.shared.state.lock();
        MockShared::ensure_available(&state)?;
        match state.actors.get(&self.id) {
            Some(record) if record.alive => Ok(f(record)),
            _ => Err(self.destroyed()),
        }
    }

    fn write(&self, f: impl FnOnce(&mut ActorRecord)) -> SimResult<()> {
        let mut state = self.shared.state.lock();
        MockShared::ensure_available(&state)?;
        match state.actors.get_mut(&self.id) {
            Some(record) if record.alive => {
                f(record);
                Ok(())
            }
            _ => Err(self.destroyed()),
        }
    }

    fn destroyed(&self) -> SimulatorError {
        SimulatorError::Other(format!("actor {} has been destroyed", self.id))
    }
}

impl NativeActor for MockActor {
    fn id(&self) -> ActorId {
        self.id
    }

    fn blueprint_id(&self) -> &str {
        &self.blueprint
    }

    fn is_alive(&self) -> bool {
        self.shared
            .state
            .lock()
            .actors
            .get(&self.id)
            .is_some_and(|a| a.alive)
    }

    fn destroy(&self) -> SimResult<bool> {
        let mut state = self.shared.state.lock();
        MockShared::ensure_available(&state)?;
        self.shared.record(&mut state, MockCall::Destroy { actor_id: self.id });
        match state.actors.get_mut(&self.id) {
            Some(record) if record.alive => {
                record.alive = false;
                record.callback = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn transform(&self) -> SimResult<Transform> {
        self.read(|a| a.transform)
    }

    fn set_transform(&self, transform: &Transform) -> SimResult<()> {
        self.write(|a| a.transform = *transform)
    }

    fn velocity(&self) -> SimResult<Vector3> {
        self.read(|a| a.velocity)
    }

    fn angular_velocity(&self) -> SimResult<Vector3> {
        self.read(|a| a.angular_velocity)
    }

    fn acceleration(&self) -> SimResult<Vector3> {
        self.read(|a| a.acceleration)
    }

    fn set_simulate_physics(&self, enabled: bool) -> SimResult<()> {
        self.write(|a| a.physics = enabled)
    }

    fn as_vehicle(&self) -> Option<&dyn NativeVehicle> {
        self.kind.is_vehicle().then_some(self as &dyn NativeVehicle)
    }

    fn as_sensor(&self) -> Option<&dyn NativeSensor> {
        self.kind.is_sensor().then_some(self as &dyn NativeSensor)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl NativeVehicle for MockActor {
    fn control(&self) -> SimResult<VehicleControl> {
        self.read(|a| a.control)
    }

    fn apply_control(&self, control: &VehicleControl) -> SimResult<()> {
        self.write(|a| a.control = *control)
    }

    fn apply_ackermann_control(&self, control: &AckermannControl) -> SimResult<()> {
        self.write(|a| a.ackermann = Some(*control))
    }

    fn ackermann_settings(&self) -> SimResult<AckermannSettings> {
        self.read(|a| a.ackermann_settings)
    }

    fn apply_ackermann_settings(&self, settings: &AckermannSettings) -> SimResult<()> {
        self.write(|a| a.ackermann_settings = *settings)
    }

    fn wheel_steer_angle(&self, wheel: WheelLocation) -> SimResult<f32> {
        self.read(|a| a.physical_steer(wheel))
    }

    fn set_wheel_steer_direction(&self, wheel: WheelLocation, degrees: f32) -> SimResult<()> {
        self.write(|a| a.visual_steer.set(wheel, degrees))
    }
}

impl NativeSensor for MockActor {
    fn listen(&self, callback: MeasurementCallback) -> SimResult<()> {
        self.write(|a| a.callback = Some(callback))
    }

    fn stop(&self) -> SimResult<()> {
        self.write(|a| a.callback = None)
    }

    fn is_listening(&self) -> bool {
        self.read(|a| a.callback.is_some()).unwrap_or(false)
    }
}
