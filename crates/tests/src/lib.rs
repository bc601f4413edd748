//! # Integration Tests
//!
//! 跨 crate 的端到端测试，全部运行在 mock 模拟器上。
//!
//! 负责：
//! - 连接、同步、注册表的行为性质
//! - 配置 → 上下文 → 代理 的完整流程

#[cfg(test)]
mod support {
    use std::sync::Arc;

    use actor_factory::{MockConfig, MockSimulator};
    use context::{CarlaContext, ConnectionSettings};

    pub fn context(sim: &MockSimulator) -> CarlaContext {
        observability::init_for_tests();
        CarlaContext::new(Arc::new(sim.clone()), ConnectionSettings::default()).unwrap()
    }

    pub fn quiet_sim() -> MockSimulator {
        MockSimulator::with_config(MockConfig {
            emit_sensor_data: false,
            ..MockConfig::default()
        })
    }
}

#[cfg(test)]
mod property_tests {
    use std::time::Duration;

    use actor_factory::{ActorFactoryError, ActorRequest, MockCall, MockSimulator};
    use contracts::{Location, Pulse, Rotation, Transform};
    use sync_engine::{compute_wait, SyncController};

    use crate::support::{context, quiet_sim};

    /// 两次 connect 只保留一个会话，两次 disconnect 不报错
    #[test]
    fn test_idempotent_connect_disconnect() {
        let sim = quiet_sim();
        let ctx = context(&sim);

        ctx.connect().unwrap();
        ctx.connect().unwrap();
        assert_eq!(sim.sessions_opened(), 1);
        assert!(ctx.is_alive(false).unwrap());

        ctx.disconnect().unwrap();
        ctx.disconnect().unwrap();
        assert_eq!(sim.sessions_released(), 1);
        assert!(!ctx.is_alive(false).unwrap());
    }

    /// 等待开始前触发的脉冲不可见
    #[test]
    fn test_pulse_is_transient() {
        let pulse = Pulse::new();
        pulse.fire();
        assert!(!pulse.wait(Some(Duration::from_millis(30))));
    }

    /// 晚到的等待者看到下一个 tick，而不是上一个
    #[test]
    fn test_tick_pulse_requires_next_tick() {
        let sim = quiet_sim();
        let ctx = context(&sim);
        ctx.connect().unwrap();

        ctx.wait_for_ticks(2, Some(Duration::from_secs(2))).unwrap();
        let before = ctx.running().tick_pulse().generation();
        assert!(ctx.running().tick_pulse().wait(Some(Duration::from_secs(2))));
        assert!(ctx.running().tick_pulse().generation() > before);

        ctx.disconnect().unwrap();
    }

    /// 严格计时的等待不低于步长的十分之一
    #[test]
    fn test_strict_timing_floor() {
        assert!((compute_wait(0.05, true, 10.0) - 0.005).abs() < 1e-12);

        for delta in [0.001, 0.01, 0.05, 0.1] {
            for drift in [-1e6, -10.0, -0.5, 0.0, 0.02, 0.5, 10.0, 1e6] {
                let wait = compute_wait(delta, true, drift);
                assert!(wait >= 0.1 * delta - 1e-15, "delta={delta} drift={drift} wait={wait}");
            }
        }
        assert_eq!(compute_wait(0.05, false, 10.0), 0.05);
    }

    /// 三个一批，其中一个蓝图失败
    #[test]
    fn test_spawn_batch_aggregation() {
        let sim = quiet_sim();
        let ctx = context(&sim);
        ctx.connect().unwrap();
        let registry = ctx.actors();

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
        match err {
            ActorFactoryError::SpawnBatch { failures } => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].handle, second.id());
            }
            other => panic!("expected SpawnBatch, got {other:?}"),
        }

        assert!(first.is_alive());
        assert!(!second.is_alive());
        assert!(third.is_alive());

        ctx.disconnect().unwrap();
    }

    /// 父节点已绑定时才挂载
    #[test]
    fn test_attachment_propagation() {
        let sim = quiet_sim();
        let ctx = context(&sim);
        ctx.connect().unwrap();
        let registry = ctx.actors();

        let vehicle = registry
            .new_actor(ActorRequest::new("vehicle.tesla.model3"))
            .unwrap();
        let early = registry
            .new_actor(ActorRequest::new("sensor.other.imu").parent(&vehicle))
            .unwrap();
        let late = registry
            .new_actor(ActorRequest::new("sensor.other.gnss").parent(&vehicle))
            .unwrap();

        // 父节点未生成：不挂载，也不会隐式生成父节点
        registry.spawn(&[early.clone()]).unwrap();
        assert!(!vehicle.is_alive());
        assert_eq!(sim.actor_parent(early.actor_id().unwrap()), None);

        registry.spawn(&[vehicle.clone(), late.clone()]).unwrap();
        assert_eq!(sim.actor_parent(late.actor_id().unwrap()), vehicle.actor_id());

        let spawns: Vec<_> = sim
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                MockCall::Spawn { attach_to, .. } => Some(attach_to),
                _ => None,
            })
            .collect();
        assert_eq!(spawns, vec![None, None, vehicle.actor_id()]);

        ctx.disconnect().unwrap();
    }

    /// 未绑定用初始位姿，绑定后用实时位姿，销毁后回到初始位姿
    #[test]
    fn test_pose_fallback() {
        let sim = quiet_sim();
        let ctx = context(&sim);
        ctx.connect().unwrap();
        let registry = ctx.actors();

        let initial = Transform::new(Location::new(10.0, -2.0, 0.5), Rotation::new(0.0, 90.0, 0.0));
        let vehicle = registry
            .new_actor(ActorRequest::new("vehicle.tesla.model3").transform(initial))
            .unwrap();
        assert_eq!(vehicle.transform().unwrap(), initial);

        registry.spawn(&[vehicle.clone()]).unwrap();
        let moved = Transform::new(Location::new(42.0, 7.0, 0.5), Rotation::new(0.0, 180.0, 0.0));
        sim.set_actor_transform(vehicle.actor_id().unwrap(), moved);
        assert_eq!(vehicle.transform().unwrap(), moved);

        registry.destroy(&[vehicle.clone()]);
        assert_eq!(vehicle.transform().unwrap(), initial);

        ctx.disconnect().unwrap();
    }

    /// 销毁解除绑定，但仍留在 registry 中
    #[test]
    fn test_registry_survives_destroy() {
        let sim = quiet_sim();
        let ctx = context(&sim);
        ctx.connect().unwrap();
        let registry = ctx.actors();

        let vehicle = registry
            .new_actor(ActorRequest::new("vehicle.tesla.model3"))
            .unwrap();
        registry.spawn(&[vehicle.clone()]).unwrap();
        assert!(vehicle.is_alive());

        assert_eq!(registry.destroy(&[vehicle.clone()]), 1);
        assert!(!vehicle.is_alive());
        assert!(registry.contains(&vehicle));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.alive_count(), 0);

        ctx.disconnect().unwrap();
        assert_eq!(registry.len(), 1);
    }

    /// 顺序：自由运行、销毁、稳定 tick、释放
    #[test]
    fn test_disconnect_ordering() {
        let sim = quiet_sim();
        let ctx = context(&sim);
        ctx.connect().unwrap();

        let registry = ctx.actors();
        let vehicle = registry
            .new_actor(ActorRequest::new("vehicle.tesla.model3"))
            .unwrap();
        let imu = registry
            .new_actor(ActorRequest::new("sensor.other.imu").parent(&vehicle))
            .unwrap();
        registry.spawn(&[vehicle.clone(), imu.clone()]).unwrap();

        ctx.running().use_sync_primary_mode(true, 0.01, false).unwrap();
        assert!(ctx.running().wait_mode_applied(Duration::from_secs(2)));
        ctx.wait_for_ticks(3, Some(Duration::from_secs(2))).unwrap();
        assert!(sim.settings().synchronous_mode);

        sim.clear_calls();
        ctx.disconnect().unwrap();
        let calls = sim.calls();

        let free_running = calls
            .iter()
            .position(|c| matches!(c, MockCall::ApplySettings { synchronous: false, .. }))
            .expect("free-running settings applied");
        let destroys: Vec<usize> = calls
            .iter()
            .enumerate()
            .filter(|(_, c)| matches!(c, MockCall::Destroy { .. }))
            .map(|(i, _)| i)
            .collect();
        let released = calls
            .iter()
            .position(|c| matches!(c, MockCall::SessionReleased))
            .expect("session released");

        assert_eq!(destroys.len(), 2);
        assert!(destroys.iter().all(|&i| i > free_running));
        let last_destroy = *destroys.iter().max().unwrap();

        let settle_ticks = calls[last_destroy..released]
            .iter()
            .filter(|c| matches!(c, MockCall::Tick { .. } | MockCall::WaitForTick { .. }))
            .count();
        assert!(settle_ticks >= 5, "only {settle_ticks} ticks before release");
        assert!(!sim.settings().synchronous_mode);
    }

    /// 仅有世界槽的控制器：没有 context 时自由运行 tick
    #[test]
    fn test_controller_standalone() {
        let sim = MockSimulator::new();
        let slot = contracts::WorldSlot::shared();
        slot.set(sim.world_handle());

        let controller = SyncController::new(slot).unwrap();
        controller.wait_for_ticks(3, Some(Duration::from_secs(2))).unwrap();
        assert!(controller.timespan_realworld().unwrap() >= 0.0);
        controller.shutdown(Duration::from_secs(2)).unwrap();
    }
}

#[cfg(test)]
mod flow_tests {
    use std::io::Write;
    use std::sync::Arc;
    use std::time::Duration;

    use actor_factory::{MockCall, MockSimulator};
    use config_loader::ConfigLoader;
    use context::{ActorTree, CarlaContext, ConnectionSettings};
    use proxy::encode::{MSG_GNSS, MSG_IMU};
    use tokio::net::UdpSocket;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    /// 配置 → 连接 → 生成 actor → 同步模式 → UDP 遥测 → 断开
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_config_to_udp_telemetry() {
        observability::init_for_tests();
        let imu_rx = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let gnss_rx = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        let file = write_config(&format!(
            r#"
[world]
map = "Town10HD_Opt"

[sync]
primary_mode = true
fixed_delta_sec = 0.01

[[actors]]
id = "ego"
blueprint = "vehicle.tesla.model3"
attributes = {{ color = "" }}

[[actors]]
id = "imu"
blueprint = "sensor.other.imu"
parent = "ego"

[[actors]]
id = "gnss"
blueprint = "sensor.other.gnss"
parent = "ego"

[[proxies]]
name = "imu-udp"
type = "imu_udp"
actor = "imu"
params = {{ addr = "{imu}" }}

[[proxies]]
name = "gnss-udp"
type = "gnss_udp"
actor = "gnss"
params = {{ addr = "{gnss}", interval_ms = "5" }}
"#,
            imu = imu_rx.local_addr().unwrap(),
            gnss = gnss_rx.local_addr().unwrap(),
        ));

        let blueprint = ConfigLoader::load_from_path(file.path()).unwrap();
        let sim = MockSimulator::new();
        let ctx = Arc::new(
            CarlaContext::new(Arc::new(sim.clone()), ConnectionSettings::from(&blueprint.world))
                .unwrap(),
        );

        ctx.connect().unwrap();
        ctx.use_map(blueprint.world.map.as_deref().unwrap()).unwrap();
        assert_eq!(sim.map_name(), "Town10HD_Opt");

        let tree = ActorTree::build(ctx.actors(), &blueprint.actors).unwrap();
        ctx.actors().spawn(&tree.handles()).unwrap();
        assert_eq!(sim.alive_actor_ids().len(), 3);
        assert_eq!(
            sim.actor_parent(tree.get("imu").unwrap().actor_id().unwrap()),
            tree.get("ego").unwrap().actor_id()
        );

        let mut proxies = Vec::new();
        for config in &blueprint.proxies {
            let actor = tree.get(&config.actor).unwrap();
            proxies.push(proxy::start_from_config(config, actor).await.unwrap());
        }

        ctx.running()
            .use_sync_primary_mode(true, blueprint.sync.fixed_delta_sec, false)
            .unwrap();

        let mut buf = [0u8; 256];
        let n = tokio::time::timeout(Duration::from_secs(3), imu_rx.recv(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(n, 32);
        assert_eq!(buf[0], MSG_IMU);

        let n = tokio::time::timeout(Duration::from_secs(3), gnss_rx.recv(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(n, 16);
        assert_eq!(buf[0], MSG_GNSS);

        for proxy in proxies {
            proxy.stop().await.unwrap();
        }

        let teardown = Arc::clone(&ctx);
        tokio::task::spawn_blocking(move || teardown.disconnect())
            .await
            .unwrap()
            .unwrap();

        assert!(sim.alive_actor_ids().is_empty());
        assert!(sim
            .calls()
            .iter()
            .any(|c| matches!(c, MockCall::Tick { .. })));
        assert!(ctx.running().tick_stats().synchronous_ticks > 0);
    }

    /// 车辆状态代理：JSON 报文随车辆速度变化
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_vehicle_status_flow() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let blueprint = ConfigLoader::load_from_str(
            &format!(
                r#"{{
                    "world": {{}},
                    "actors": [{{"id": "ego", "blueprint": "vehicle.audi.tt"}}],
                    "proxies": [{{
                        "name": "status",
                        "type": "vehicle_status_udp",
                        "actor": "ego",
                        "params": {{"addr": "{}", "interval_ms": "10"}}
                    }}]
                }}"#,
                receiver.local_addr().unwrap()
            ),
            config_loader::ConfigFormat::Json,
        )
        .unwrap();

        let sim = MockSimulator::new();
        let ctx = CarlaContext::new(Arc::new(sim.clone()), ConnectionSettings::default()).unwrap();
        ctx.connect().unwrap();
        let tree = ActorTree::build(ctx.actors(), &blueprint.actors).unwrap();
        ctx.actors().spawn(&tree.handles()).unwrap();

        let ego = tree.get("ego").unwrap();
        sim.set_actor_velocity(ego.actor_id().unwrap(), contracts::Vector3::new(0.0, 12.0, 0.0));

        let proxy = proxy::start_from_config(&blueprint.proxies[0], ego).await.unwrap();
        assert_eq!(proxy.name(), "status");

        let mut buf = vec![0u8; 4096];
        let n = tokio::time::timeout(Duration::from_secs(2), receiver.recv(&mut buf))
            .await
            .unwrap()
            .unwrap();
        let status: serde_json::Value = serde_json::from_slice(&buf[..n]).unwrap();
        assert_eq!(status["speed"], 12.0);

        proxy.stop().await.unwrap();
        tokio::task::block_in_place(|| ctx.disconnect()).unwrap();
    }

    /// 键盘控制：按键 → 命令 → 车辆 → 状态 → HUD
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_keyboard_control_flow() {
        use proxy::{Key, ProxyOptions, VehicleControlProxy};

        let sim = MockSimulator::new();
        let ctx = CarlaContext::new(Arc::new(sim.clone()), ConnectionSettings::default()).unwrap();
        ctx.connect().unwrap();
        let vehicle = ctx
            .actors()
            .new_actor(actor_factory::ActorRequest::new("vehicle.tesla.model3"))
            .unwrap();
        ctx.actors().spawn(&[vehicle.clone()]).unwrap();

        let mut control = VehicleControlProxy::start(vehicle.clone(), ProxyOptions::default()).unwrap();
        for key in [Key::W, Key::W, Key::W, Key::Space] {
            control.press(key);
        }

        let mut status_rx = control.subscribe();
        let status = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                status_rx.changed().await.unwrap();
                let latest = *status_rx.borrow_and_update();
                if let Some(s) = latest.filter(|s| s.control.hand_brake) {
                    return s;
                }
            }
        })
        .await
        .unwrap();

        assert!((status.control.throttle - 0.3).abs() < 1e-5);
        let hud = proxy::status_lines(Some(&status));
        assert_eq!(hud[0], "Throttle:   30%");
        assert_eq!(hud[3], "Handbrake:  true");

        control.stop().await.unwrap();
        tokio::task::block_in_place(|| ctx.disconnect()).unwrap();
    }

    /// 不可达的服务器：连接失败并释放会话
    #[test]
    fn test_unreachable_server() {
        let sim = MockSimulator::with_config(actor_factory::MockConfig {
            unreachable: true,
            ..Default::default()
        });
        let ctx = CarlaContext::new(
            Arc::new(sim.clone()),
            ConnectionSettings {
                host: "10.0.0.1".to_string(),
                port: 2000,
                timeout: Duration::from_millis(100),
            },
        )
        .unwrap();

        let err = ctx.connect().unwrap_err();
        assert!(err.is_connection());
        assert!(ctx.world().is_none());
        assert!(!ctx.is_alive(false).unwrap());
        assert!(ctx.ensure_alive().is_err());
    }
}
