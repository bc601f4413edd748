//! ProxyHandle：每个代理一个 actor 侧线程加一个对外投递任务
//!
//! ```text
//! actor thread ── produce(interval) ──► mpsc (bounded) ──► tokio task ── deliver ──► output
//! ```
//!
//! 两侧都监听同一个 `watch` 停止信号。

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};
use uuid::Uuid;

use crate::error::{ProxyError, Result};
use crate::metrics::ProxyMetrics;
use crate::output::ProxyOutput;

/// 默认采样间隔
pub const DEFAULT_RUNNING_INTERVAL: Duration = Duration::from_millis(10);
/// 默认停止等待上限
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(2);
/// 默认通道容量
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

/// Proxy 启动参数
#[derive(Debug, Clone)]
pub struct ProxyOptions {
    /// 名称；缺省为 `<Kind>-<uuid 前 8 位>`
    pub name: Option<String>,
    /// actor 侧线程单次等待/采样的间隔
    pub running_interval: Duration,
    /// `stop()` 的等待上限
    pub join_timeout: Duration,
    pub queue_capacity: usize,
}

impl Default for ProxyOptions {
    fn default() -> Self {
        Self {
            name: None,
            running_interval: DEFAULT_RUNNING_INTERVAL,
            join_timeout: DEFAULT_JOIN_TIMEOUT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl ProxyOptions {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// 生成 id，并解析出最终名称
    pub(crate) fn identity(&self, kind: &str) -> (Uuid, String) {
        let id = Uuid::new_v4();
        let name = match &self.name {
            Some(name) => name.clone(),
            None => default_name(kind, &id),
        };
        (id, name)
    }
}

/// `<Kind>-<uuid 前 8 位>`
pub fn default_name(kind: &str, id: &Uuid) -> String {
    let simple = id.simple().to_string();
    format!("{kind}-{}", &simple[..8])
}

/// 运行中代理的句柄
pub struct ProxyHandle {
    id: Uuid,
    name: String,
    join_timeout: Duration,
    stop_tx: watch::Sender<bool>,
    thread: Option<thread::JoinHandle<()>>,
    task: Option<JoinHandle<()>>,
    metrics: Arc<ProxyMetrics>,
}

impl ProxyHandle {
    /// 启动两个 worker
    ///
    /// `produce` 在独立线程上运行，单次阻塞不应超过约一个间隔；返回 `None` 表示本轮无数据。
    /// 必须在 tokio runtime 内调用。
    pub fn spawn<T, P, O>(
        identity: (Uuid, String),
        options: &ProxyOptions,
        produce: P,
        output: O,
    ) -> Result<Self>
    where
        T: Send + 'static,
        P: FnMut(Duration) -> Option<T> + Send + 'static,
        O: ProxyOutput<Item = T> + Send + 'static,
    {
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            ProxyError::invalid_argument("runtime", format!("proxy needs a tokio runtime: {e}"))
        })?;

        let (id, name) = identity;
        let (stop_tx, stop_rx) = watch::channel(false);
        let (tx, rx) = mpsc::channel(options.queue_capacity.max(1));
        let metrics = Arc::new(ProxyMetrics::new());

        let thread = thread::Builder::new()
            .name(format!("proxy-{name}"))
            .spawn({
                let name = name.clone();
                let metrics = Arc::clone(&metrics);
                let stop_rx = stop_rx.clone();
                let interval = options.running_interval;
                move || actor_side_loop(name, produce, tx, stop_rx, metrics, interval)
            })?;

        let task = runtime.spawn(deliver_loop(
            output,
            rx,
            stop_rx,
            Arc::clone(&metrics),
            name.clone(),
        ));

        debug!(proxy = %name, %id, "Proxy started");
        Ok(Self {
            id,
            name,
            join_timeout: options.join_timeout,
            stop_tx,
            thread: Some(thread),
            task: Some(task),
            metrics,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> &Arc<ProxyMetrics> {
        &self.metrics
    }

    /// 两个 worker 都还在运行
    pub fn is_running(&self) -> bool {
        let thread_alive = self.thread.as_ref().is_some_and(|t| !t.is_finished());
        let task_alive = self.task.as_ref().is_some_and(|t| !t.is_finished());
        thread_alive && task_alive
    }

    /// 通知两个 worker 停止，最多等待 join_timeout
    #[instrument(name = "proxy_stop", skip(self), fields(proxy = %self.name))]
    pub async fn stop(mut self) -> Result<()> {
        self.stop_tx.send_replace(true);

        let thread = self.thread.take();
        let task = self.task.take();
        let name = self.name.clone();

        let joined = tokio::time::timeout(self.join_timeout, async move {
            if let Some(thread) = thread {
                match tokio::task::spawn_blocking(move || thread.join()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(_)) => error!(proxy = %name, "Actor-side thread panicked"),
                    Err(e) => error!(proxy = %name, error = %e, "Failed to join actor-side thread"),
                }
            }
            if let Some(task) = task {
                if let Err(e) = task.await {
                    error!(proxy = %name, error = %e, "Deliver task panicked");
                }
            }
        })
        .await;

        match joined {
            Ok(()) => {
                debug!(proxy = %self.name, "Proxy stopped");
                Ok(())
            }
            Err(_) => Err(ProxyError::Timeout {
                name: self.name.clone(),
                timeout_ms: self.join_timeout.as_millis() as u64,
            }),
        }
    }
}

impl Drop for ProxyHandle {
    fn drop(&mut self) {
        // 未经 stop() 丢弃时只发信号，不等待
        if self.thread.is_some() || self.task.is_some() {
            self.stop_tx.send_replace(true);
        }
    }
}

impl std::fmt::Debug for ProxyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyHandle")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("metrics", &self.metrics.snapshot())
            .finish()
    }
}

fn stop_requested(stop_rx: &watch::Receiver<bool>) -> bool {
    *stop_rx.borrow() || stop_rx.has_changed().is_err()
}

fn actor_side_loop<T, P>(
    name: String,
    mut produce: P,
    tx: mpsc::Sender<T>,
    stop_rx: watch::Receiver<bool>,
    metrics: Arc<ProxyMetrics>,
    interval: Duration,
) where
    P: FnMut(Duration) -> Option<T>,
{
    debug!(proxy = %name, "Actor-side worker started");

    while !stop_requested(&stop_rx) && !tx.is_closed() {
        let Some(item) = produce(interval) else {
            continue;
        };
        metrics.inc_produced();

        match tx.try_send(item) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                metrics.inc_dropped();
                warn!(proxy = %name, "Queue full, item dropped");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => break,
        }
    }

    debug!(proxy = %name, "Actor-side worker stopped");
}

#[instrument(name = "proxy_deliver_loop", skip(output, rx, stop_rx, metrics), fields(proxy = %name))]
async fn deliver_loop<O: ProxyOutput>(
    mut output: O,
    mut rx: mpsc::Receiver<O::Item>,
    mut stop_rx: watch::Receiver<bool>,
    metrics: Arc<ProxyMetrics>,
    name: String,
) {
    loop {
        tokio::select! {
            biased;
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
            }
            item = rx.recv() => {
                let Some(item) = item else { break };
                match output.deliver(item).await {
                    Ok(()) => {
                        metrics.inc_delivered();
                        observability::record_proxy_packet(&name, true);
                    }
                    Err(e) => {
                        metrics.inc_failures();
                        observability::record_proxy_packet(&name, false);
                        warn!(proxy = %name, output = output.name(), error = %e, "Deliver failed");
                    }
                }
            }
        }
    }

    rx.close();
    if let Err(e) = output.close().await {
        error!(proxy = %name, error = %e, "Close failed on shutdown");
    }
}
