//! 代理的对外投递端

use std::net::SocketAddr;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, instrument, warn};

use crate::error::{ProxyError, Result};

/// IPv4 下 UDP 载荷上限
pub const MAX_UDP_PAYLOAD: usize = 65507;

/// 代理数据的异步消费者
///
/// 运行在代理的 tokio 任务上，不在 actor 侧线程。
#[trait_variant::make(ProxyOutput: Send)]
pub trait LocalProxyOutput {
    type Item;

    /// 输出名称 (日志/指标使用)
    fn name(&self) -> &str;

    /// 投递一条数据
    async fn deliver(&mut self, item: Self::Item) -> Result<()>;

    /// 释放资源
    async fn close(&mut self) -> Result<()>;
}

/// 只发不收的 UDP 数据报
pub struct UdpOutput {
    name: String,
    target: SocketAddr,
    socket: Option<UdpSocket>,
}

impl UdpOutput {
    /// 绑定临时本地端口并连接到 `target`
    #[instrument(name = "udp_output_bind", skip(name))]
    pub async fn bind(name: impl Into<String>, target: SocketAddr) -> Result<Self> {
        let name = name.into();
        let local: SocketAddr = if target.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(target).await?;
        debug!(output = %name, %target, "UDP output connected");

        Ok(Self {
            name,
            target,
            socket: Some(socket),
        })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

impl ProxyOutput for UdpOutput {
    type Item = Bytes;

    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&mut self, packet: Bytes) -> Result<()> {
        let socket = self.socket.as_ref().ok_or_else(|| ProxyError::Closed {
            name: self.name.clone(),
        })?;

        if packet.len() > MAX_UDP_PAYLOAD {
            warn!(
                output = %self.name,
                size = packet.len(),
                "Packet exceeds UDP payload limit, dropped"
            );
            return Err(ProxyError::encode(
                "datagram",
                format!("{} bytes exceeds {MAX_UDP_PAYLOAD}", packet.len()),
            ));
        }

        socket.send(&packet).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.socket = None;
        debug!(output = %self.name, "UDP output closed");
        Ok(())
    }
}

/// 向进程内订阅者发布最新数据
pub struct WatchOutput<T> {
    name: String,
    tx: watch::Sender<Option<T>>,
}

impl<T> WatchOutput<T> {
    pub fn new(name: impl Into<String>) -> (Self, watch::Receiver<Option<T>>) {
        let (tx, rx) = watch::channel(None);
        (
            Self {
                name: name.into(),
                tx,
            },
            rx,
        )
    }
}

impl<T: Send + Sync + 'static> ProxyOutput for WatchOutput<T> {
    type Item = T;

    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&mut self, item: T) -> Result<()> {
        // 没有订阅者时仍然保留最新值
        self.tx.send_replace(Some(item));
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ProxyOutput, UdpOutput, WatchOutput};
    use crate::error::ProxyError;
    use bytes::Bytes;
    use tokio::net::UdpSocket;

    #[tokio::test]
    async fn test_watch_output_keeps_latest() {
        let (mut output, rx) = WatchOutput::new("status");
        output.deliver(1u8).await.unwrap();
        output.deliver(2u8).await.unwrap();
        assert_eq!(*rx.borrow(), Some(2));
    }

    #[tokio::test]
    async fn test_udp_output_delivers() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let target = receiver.local_addr().unwrap();

        let mut output = UdpOutput::bind("test", target).await.unwrap();
        output.deliver(Bytes::from_static(b"\x03\0\0\0")).await.unwrap();

        let mut buf = [0u8; 16];
        let n = receiver.recv(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"\x03\0\0\0");
    }

    #[tokio::test]
    async fn test_closed_output_rejects() {
        let mut output = UdpOutput::bind("test", "127.0.0.1:9".parse().unwrap())
            .await
            .unwrap();
        output.close().await.unwrap();
        assert!(matches!(
            output.deliver(Bytes::new()).await,
            Err(ProxyError::Closed { .. })
        ));
    }
}
