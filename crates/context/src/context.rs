//! 连接监管
//!
//! 持有到模拟器的会话，并保证世界引用只在存活探测后才被信任。
//! 注册表与同步控制器通过共享世界槽读取同一个世界。

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use actor_factory::ActorRegistry;
use contracts::{SharedWorld, SimWorld, SimulatorConnector, SimulatorSession, WorldConfig, WorldSlot};
use observability::record_connection_state;
use parking_lot::Mutex;
use sync_engine::SyncController;
use tracing::{debug, info, instrument, warn};

use crate::error::{ContextError, Result};

/// 断开前等待服务器稳定的 tick 数
const DISCONNECT_SETTLE_TICKS: u64 = 5;

/// 断开前等待 tick 的总预算
const DISCONNECT_SETTLE_TIMEOUT: Duration = Duration::from_secs(2);

/// 等待后台线程切回自由运行的上限
const MODE_APPLY_TIMEOUT: Duration = Duration::from_secs(2);

/// 连接参数
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionSettings {
    pub host: String,
    pub port: u16,
    /// 客户端 RPC 超时
    pub timeout: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 2000,
            timeout: Duration::from_secs(2),
        }
    }
}

impl From<&WorldConfig> for ConnectionSettings {
    fn from(world: &WorldConfig) -> Self {
        Self {
            host: world.carla_host.clone(),
            port: world.carla_port,
            timeout: Duration::try_from_secs_f64(world.timeout_sec)
                .unwrap_or_else(|_| Duration::from_secs(2)),
        }
    }
}

/// 模拟器上下文：连接、actor 注册表、同步控制器
pub struct CarlaContext {
    settings: ConnectionSettings,
    connector: Arc<dyn SimulatorConnector>,
    session: Mutex<Option<Arc<dyn SimulatorSession>>>,
    world: SharedWorld,
    running: SyncController,
    actors: ActorRegistry,
}

impl CarlaContext {
    /// 创建上下文并启动同步线程，不连接服务器
    pub fn new(connector: Arc<dyn SimulatorConnector>, settings: ConnectionSettings) -> Result<Self> {
        let world = WorldSlot::shared();
        let running = SyncController::new(Arc::clone(&world))?;
        let actors = ActorRegistry::new(Arc::clone(&world));
        Ok(Self {
            settings,
            connector,
            session: Mutex::new(None),
            world,
            running,
            actors,
        })
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    pub fn host(&self) -> &str {
        &self.settings.host
    }

    pub fn port(&self) -> u16 {
        self.settings.port
    }

    /// Actor 注册表
    pub fn actors(&self) -> &ActorRegistry {
        &self.actors
    }

    /// 同步控制器
    pub fn running(&self) -> &SyncController {
        &self.running
    }

    fn connection_error(&self, message: impl Into<String>) -> ContextError {
        ContextError::connection(&self.settings.host, self.settings.port, message)
    }

    /// 建立连接，已连接时不做任何事
    ///
    /// 探测失败时释放刚打开的会话并返回 `Connection`。
    #[instrument(
        name = "context_connect",
        skip(self),
        fields(host = %self.settings.host, port = self.settings.port)
    )]
    pub fn connect(&self) -> Result<()> {
        if self.is_alive(false)? {
            debug!("Already connected");
            return Ok(());
        }

        let session = self
            .connector
            .connect(&self.settings.host, self.settings.port, self.settings.timeout)
            .map_err(|e| self.connection_error(e.to_string()))?;

        let probe = session
            .server_version()
            .and_then(|version| session.world().map(|world| (version, world)));
        let (version, world) = match probe {
            Ok(probe) => probe,
            Err(e) => {
                drop(session);
                record_connection_state(false);
                warn!(error = %e, "Connection probe failed, session released");
                return Err(self.connection_error(e.to_string()));
            }
        };

        *self.session.lock() = Some(session);
        self.world.set(world);
        record_connection_state(true);
        info!(%version, "Connected to simulator");
        Ok(())
    }

    /// 探测会话是否存活，并刷新共享世界引用
    ///
    /// `raise_on_failure` 为 true 时探测失败返回 `Connection`，否则返回 `Ok(false)`。
    pub fn is_alive(&self, raise_on_failure: bool) -> Result<bool> {
        let session = self.session.lock().clone();
        let Some(session) = session else {
            self.world.clear();
            return if raise_on_failure {
                Err(self.connection_error("not connected"))
            } else {
                Ok(false)
            };
        };

        match session.server_version().and_then(|_| session.world()) {
            Ok(world) => {
                self.world.set(world);
                Ok(true)
            }
            Err(e) => {
                if self.world.clear().is_some() {
                    record_connection_state(false);
                    warn!(error = %e, "Simulator connection lost");
                }
                if raise_on_failure {
                    Err(self.connection_error(e.to_string()))
                } else {
                    Ok(false)
                }
            }
        }
    }

    /// `is_alive(true)` 的简写
    pub fn ensure_alive(&self) -> Result<()> {
        self.is_alive(true).map(|_| ())
    }

    /// 重新探测后的世界引用
    pub fn world(&self) -> Option<Arc<dyn SimWorld>> {
        match self.is_alive(false) {
            Ok(true) => self.world.get(),
            _ => None,
        }
    }

    /// 共享世界槽
    pub fn world_slot(&self) -> &SharedWorld {
        &self.world
    }

    /// 断开连接
    ///
    /// 顺序：切回自由运行，销毁全部 actor，等待若干 tick，释放会话。
    /// 未连接时不做任何事，可重复调用。
    #[instrument(
        name = "context_disconnect",
        skip(self),
        fields(host = %self.settings.host, port = self.settings.port)
    )]
    pub fn disconnect(&self) -> Result<()> {
        if self.session.lock().is_none() {
            return Ok(());
        }

        if self.is_alive(false)? {
            self.running.use_sync_primary_mode(false, 0.0, false)?;
            if !self.running.wait_mode_applied(MODE_APPLY_TIMEOUT) {
                warn!("Free-running mode not confirmed before teardown");
            }

            let destroyed = self.actors.destroy_all();
            debug!(destroyed, "Actors destroyed before disconnect");

            if let Err(e) = self
                .running
                .wait_for_ticks(DISCONNECT_SETTLE_TICKS, Some(DISCONNECT_SETTLE_TIMEOUT))
            {
                warn!(error = %e, "Server did not settle before disconnect");
            }
        } else {
            // 会话已失效，只清理本地绑定
            self.actors.destroy_all();
        }

        self.world.clear();
        if let Some(session) = self.session.lock().take() {
            drop(session);
        }
        record_connection_state(false);
        info!("Disconnected from simulator");
        Ok(())
    }

    /// 切换地图
    #[instrument(name = "context_use_map", skip(self))]
    pub fn use_map(&self, map: &str) -> Result<()> {
        let session = self.live_session()?;
        session.load_world(map)?;
        info!(map, "Map loaded");
        self.running.reset_clock();
        self.is_alive(false)?;
        Ok(())
    }

    /// 重新加载当前世界，场景中的 actor 全部清空
    #[instrument(name = "context_reload_world", skip(self))]
    pub fn reload_world(&self, reset_settings: bool) -> Result<()> {
        let session = self.live_session()?;
        session.reload_world(reset_settings)?;
        info!(reset_settings, "World reloaded");
        self.running.reset_clock();
        self.is_alive(false)?;
        Ok(())
    }

    fn live_session(&self) -> Result<Arc<dyn SimulatorSession>> {
        self.ensure_alive()?;
        self.session
            .lock()
            .clone()
            .ok_or_else(|| self.connection_error("not connected"))
    }

    /// 等待 `count` 个 tick，`timeout` 约束整个等待
    pub fn wait_for_ticks(&self, count: u64, timeout: Option<Duration>) -> Result<()> {
        self.running.wait_for_ticks(count, timeout)?;
        Ok(())
    }

    /// 让调用线程休眠，给服务器留出处理时间
    pub fn wait_for_seconds(&self, seconds: f64) {
        if let Ok(duration) = Duration::try_from_secs_f64(seconds) {
            thread::sleep(duration);
        }
    }
}

impl Drop for CarlaContext {
    fn drop(&mut self) {
        if let Err(e) = self.disconnect() {
            warn!(error = %e, "Disconnect on drop failed");
        }
    }
}

impl std::fmt::Debug for CarlaContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CarlaContext")
            .field("settings", &self.settings)
            .field("connected", &self.session.lock().is_some())
            .field("actors", &self.actors.len())
            .finish()
    }
}
