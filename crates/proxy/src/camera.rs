//! 相机画面代理
//!
//! 相机每出一帧就转换成 RGB 帧：
//! - [`CameraDisplayProxy`]：通过 `watch` 发布给进程内的显示端
//! - [`start_camera_frames`]：按帧号写成 PNG 文件
//!
//! 第一帧到达前，显示端拿到的是按相机分辨率生成的调试纹理。

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use actor_factory::ActorHandle;
use bytes::Bytes;
use contracts::{ActorKind, ImageData};
use rand::Rng;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::error::{ProxyError, Result};
use crate::handle::{ProxyHandle, ProxyOptions};
use crate::metrics::ProxyMetrics;
use crate::output::{ProxyOutput, WatchOutput};

/// 未设置 `image_size_x` / `image_size_y` 时的分辨率
pub const DEFAULT_SOURCE_SIZE: (u32, u32) = (800, 600);

/// 调试纹理色块边长 (像素)
const DEBUG_TILE: u32 = 16;

/// 一帧 RGB8 画面
#[derive(Debug, Clone, PartialEq)]
pub struct CameraFrame {
    /// 仿真帧号；调试纹理为 0
    pub frame: u64,
    pub timestamp: f64,
    pub width: u32,
    pub height: u32,
    /// 行优先，每像素 3 字节
    pub rgb: Bytes,
}

impl CameraFrame {
    /// 从 BGRA 图像转换，丢弃 alpha
    pub fn from_image(frame: u64, timestamp: f64, image: &ImageData) -> Result<Self> {
        let pixels = image.width as usize * image.height as usize;
        if image.data.len() != pixels * 4 {
            return Err(ProxyError::encode(
                "camera frame",
                format!(
                    "{}x{} image needs {} bytes, got {}",
                    image.width,
                    image.height,
                    pixels * 4,
                    image.data.len()
                ),
            ));
        }

        let mut rgb = Vec::with_capacity(pixels * 3);
        for bgra in image.data.chunks_exact(4) {
            rgb.extend_from_slice(&[bgra[2], bgra[1], bgra[0]]);
        }

        Ok(Self {
            frame,
            timestamp,
            width: image.width,
            height: image.height,
            rgb: Bytes::from(rgb),
        })
    }

    /// 随机色块组成的调试纹理
    pub fn placeholder(width: u32, height: u32) -> Self {
        let tiles_x = width.div_ceil(DEBUG_TILE) as usize;
        let tiles_y = height.div_ceil(DEBUG_TILE) as usize;
        let mut rng = rand::rng();
        let palette: Vec<[u8; 3]> = (0..tiles_x * tiles_y)
            .map(|_| [rng.random(), rng.random(), rng.random()])
            .collect();

        let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
        for y in 0..height {
            let row = (y / DEBUG_TILE) as usize * tiles_x;
            for x in 0..width {
                rgb.extend_from_slice(&palette[row + (x / DEBUG_TILE) as usize]);
            }
        }

        Self {
            frame: 0,
            timestamp: 0.0,
            width,
            height,
            rgb: Bytes::from(rgb),
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 3;
        Some([self.rgb[offset], self.rgb[offset + 1], self.rgb[offset + 2]])
    }
}

/// 相机蓝图声明的输出分辨率
pub fn source_size(camera: &ActorHandle) -> (u32, u32) {
    let blueprint = camera.blueprint();
    let dimension = |key: &str, default: u32| {
        blueprint
            .attribute(key)
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|&v| v > 0)
            .unwrap_or(default)
    };
    (
        dimension("image_size_x", DEFAULT_SOURCE_SIZE.0),
        dimension("image_size_y", DEFAULT_SOURCE_SIZE.1),
    )
}

fn ensure_camera(camera: &ActorHandle) -> Result<()> {
    if !ActorKind::Camera.generalises(camera.kind()) {
        return Err(ProxyError::invalid_argument(
            "actor",
            format!("camera proxy needs a camera, got {}", camera.kind()),
        ));
    }
    Ok(())
}

/// 等待相机新帧并转换；与传感器遥测一样按接收计数补上错过的脉冲
fn frame_producer(
    camera: &ActorHandle,
    proxy_name: String,
) -> Result<impl FnMut(Duration) -> Option<CameraFrame> + Send + 'static> {
    let channel = camera.sensor()?.channel();
    let mut last_seen = channel.received();
    Ok(move |interval| {
        if channel.received() == last_seen && !channel.pulse().wait(Some(interval)) {
            return None;
        }
        last_seen = channel.received();

        let snapshot = channel.latest()?;
        let Some(image) = snapshot.image() else {
            debug!(proxy = %proxy_name, frame = snapshot.measurement.frame, "Not an image, skipped");
            return None;
        };
        match CameraFrame::from_image(snapshot.measurement.frame, snapshot.measurement.timestamp, image) {
            Ok(frame) => Some(frame),
            Err(e) => {
                warn!(proxy = %proxy_name, frame = snapshot.measurement.frame, error = %e, "Convert failed");
                None
            }
        }
    })
}

/// 进程内相机显示代理
///
/// 显示端通过 [`latest`](Self::latest) 或 [`subscribe`](Self::subscribe) 取帧。
pub struct CameraDisplayProxy {
    handle: ProxyHandle,
    source_size: (u32, u32),
    placeholder: CameraFrame,
    frames: watch::Receiver<Option<CameraFrame>>,
}

impl CameraDisplayProxy {
    pub fn start(camera: &ActorHandle, options: ProxyOptions) -> Result<Self> {
        ensure_camera(camera)?;

        let identity = options.identity("CameraDisplay");
        let produce = frame_producer(camera, identity.1.clone())?;
        let (output, frames) = WatchOutput::new(identity.1.clone());
        let source_size = source_size(camera);

        let handle = ProxyHandle::spawn(identity, &options, produce, output)?;
        info!(
            proxy = handle.name(),
            camera = %camera.id(),
            width = source_size.0,
            height = source_size.1,
            "Camera display proxy started"
        );

        Ok(Self {
            handle,
            source_size,
            placeholder: CameraFrame::placeholder(source_size.0, source_size.1),
            frames,
        })
    }

    pub fn name(&self) -> &str {
        self.handle.name()
    }

    pub fn source_size(&self) -> (u32, u32) {
        self.source_size
    }

    /// 最新一帧，第一帧到达前为调试纹理
    pub fn latest(&self) -> CameraFrame {
        self.frames
            .borrow()
            .clone()
            .unwrap_or_else(|| self.placeholder.clone())
    }

    pub fn has_frame(&self) -> bool {
        self.frames.borrow().is_some()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<CameraFrame>> {
        self.frames.clone()
    }

    pub fn metrics(&self) -> &Arc<ProxyMetrics> {
        self.handle.metrics()
    }

    pub async fn stop(self) -> Result<()> {
        self.handle.stop().await
    }
}

/// 把帧写成 `<dir>/<frame:08>.png`
pub struct FrameFileOutput {
    name: String,
    dir: PathBuf,
    written: u64,
}

impl FrameFileOutput {
    #[instrument(name = "frame_file_output_create", skip(name))]
    pub async fn create(name: impl Into<String>, dir: impl AsRef<Path> + std::fmt::Debug) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            name: name.into(),
            dir,
            written: 0,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn frame_path(&self, frame: u64) -> PathBuf {
        self.dir.join(format!("{frame:08}.png"))
    }
}

impl ProxyOutput for FrameFileOutput {
    type Item = CameraFrame;

    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&mut self, frame: CameraFrame) -> Result<()> {
        let path = self.frame_path(frame.frame);
        let CameraFrame {
            width, height, rgb, ..
        } = frame;

        let target = path.clone();
        tokio::task::spawn_blocking(move || {
            image::save_buffer(&target, &rgb, width, height, image::ColorType::Rgb8)
        })
        .await
        .map_err(|e| ProxyError::encode("png", e.to_string()))?
        .map_err(|e| ProxyError::encode("png", format!("{}: {e}", path.display())))?;

        self.written += 1;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        debug!(output = %self.name, dir = %self.dir.display(), written = self.written, "Frame output closed");
        Ok(())
    }
}

/// 把 `camera` 的每个新帧以 PNG 写入 `dir`
pub async fn start_camera_frames(
    camera: &ActorHandle,
    dir: PathBuf,
    options: ProxyOptions,
) -> Result<ProxyHandle> {
    ensure_camera(camera)?;

    let identity = options.identity("CameraFrames");
    let produce = frame_producer(camera, identity.1.clone())?;
    let output = FrameFileOutput::create(identity.1.clone(), &dir).await?;

    let handle = ProxyHandle::spawn(identity, &options, produce, output)?;
    info!(
        proxy = handle.name(),
        camera = %camera.id(),
        dir = %dir.display(),
        "Camera frame proxy started"
    );
    Ok(handle)
}
