//! 媒体后端的接口。
//!
//! 后端在自己的线程里解码和输出，播放器只通过 [`MediaBackend`] 下达命令，
//! 后端的回调以 [`BackendEvent`] 的形式发送到一个 tokio 通道，由事件循环
//! 交给 [`Player::handle_backend_event`](super::Player::handle_backend_event)。

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::debug;

use crate::{error::Result, media::Media};

/// 一个文件结束播放的原因。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// 正常播放到结尾
    Eof,
    /// 被新的 `play` 或 `stop` 打断
    Aborted,
    /// 解码或输出出错
    Error,
    /// 后端退出
    Quit,
}

/// 后端上报的事件。
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    /// 播放进度，单位为秒
    Position(f64),
    /// 当前媒体的时长，单位为秒
    Duration(f64),
    /// 当前文件结束
    EndFile(EndReason),
    /// 无法加载媒体
    LoadError(String),
}

/// 播放器对媒体后端的要求。所有方法都不能阻塞事件循环。
pub trait MediaBackend: Send + Sync {
    /// 加载并播放媒体。
    fn play(&self, media: &Media, video: bool) -> Result<()>;
    /// 暂停。
    fn pause(&self);
    /// 恢复。
    fn resume(&self);
    /// 停止并卸载当前媒体。
    fn stop(&self);
    /// 跳转到指定位置（秒）。
    fn seek(&self, position: f64);
    /// 设置音量，范围 `0..=100`。
    fn set_volume(&self, volume: u8);
    /// 清空后端内部的播放队列。
    fn clear_queue(&self);
}

/// [`NullBackend`] 记录下的命令。
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum BackendCommand {
    Play { url: String, video: bool },
    Pause,
    Resume,
    Stop,
    Seek(f64),
    SetVolume(u8),
    ClearQueue,
}

/// 不输出任何声音的后端，只记录收到的命令。
///
/// 用于没有音频设备的环境和测试，调用方可以通过 [`NullBackend::inject`]
/// 模拟后端事件。
#[derive(Debug)]
pub struct NullBackend {
    commands: Mutex<Vec<BackendCommand>>,
    events: mpsc::UnboundedSender<BackendEvent>,
}

impl NullBackend {
    /// 创建后端，同时返回事件的接收端。
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<BackendEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let backend = Arc::new(Self {
            commands: Mutex::new(Vec::new()),
            events: tx,
        });
        (backend, rx)
    }

    /// 模拟一个后端事件。
    pub fn inject(&self, event: BackendEvent) {
        let _ = self.events.send(event);
    }

    /// 取出并清空已记录的命令。
    pub fn take_commands(&self) -> Vec<BackendCommand> {
        std::mem::take(&mut *self.lock())
    }

    fn record(&self, command: BackendCommand) {
        debug!("空后端收到命令: {command:?}");
        self.lock().push(command);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<BackendCommand>> {
        self.commands
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl MediaBackend for NullBackend {
    fn play(&self, media: &Media, video: bool) -> Result<()> {
        self.record(BackendCommand::Play {
            url: media.url.clone(),
            video,
        });
        Ok(())
    }

    fn pause(&self) {
        self.record(BackendCommand::Pause);
    }

    fn resume(&self) {
        self.record(BackendCommand::Resume);
    }

    fn stop(&self) {
        self.record(BackendCommand::Stop);
    }

    fn seek(&self, position: f64) {
        self.record(BackendCommand::Seek(position));
    }

    fn set_volume(&self, volume: u8) {
        self.record(BackendCommand::SetVolume(volume));
    }

    fn clear_queue(&self) {
        self.record(BackendCommand::ClearQueue);
    }
}
