//! 播放器。
//!
//! 播放器持有播放列表和媒体后端。播放列表准备好当前歌曲的媒体后，
//! 会通过 `song_changed_with_media` 信号让播放器调用后端播放；后端的
//! 事件则经由 [`Player::handle_backend_event`] 回到播放器，驱动切歌。

pub mod backend;

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde::Serialize;
use strum_macros::{Display, EnumString};
use tracing::{debug, info, instrument, warn};

use crate::{
    error::Result,
    library::Library,
    media::{Media, MediaType},
    model::{Model, SongModel, lyric::Lyric},
    playlist::{PlaybackMode, Playlist},
    signal::{Signal, Slot},
};

use backend::{BackendEvent, EndReason, MediaBackend};

/// 播放状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum State {
    /// 停止
    #[default]
    Stopped,
    /// 暂停
    Paused,
    /// 播放中
    Playing,
}

#[derive(Debug, Default)]
struct PlayerInner {
    state: State,
    position: f64,
    duration: f64,
    volume: u8,
    current_media: Option<Media>,
    current_lyric: Option<Lyric>,
}

/// 播放器。
pub struct Player {
    backend: Arc<dyn MediaBackend>,
    playlist: Arc<Playlist>,
    library: Arc<Library>,
    inner: Mutex<PlayerInner>,
    on_song_changed: Slot<Option<SongModel>>,
    on_media_ready: Slot<(SongModel, Media)>,

    /// 播放状态改变
    pub state_changed: Signal<State>,
    /// 后端接受了新的媒体，停止时为 `None`
    pub media_changed: Signal<Option<Media>>,
    /// 音量改变
    pub volume_changed: Signal<u8>,
    /// 播放进度改变
    pub position_changed: Signal<f64>,
    /// 媒体时长改变
    pub duration_changed: Signal<f64>,
    /// 当前歌曲播放结束
    pub song_finished: Signal<SongModel>,
    /// 当前媒体播放结束
    pub media_finished: Signal<()>,
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("inner", &*self.lock())
            .field("playlist", &self.playlist)
            .finish()
    }
}

impl Player {
    ///
    /// 创建播放器，并连接到播放列表的信号上。
    ///
    /// # 参数
    /// * `backend` - 媒体后端。
    /// * `playlist` - 播放列表，当前歌曲的变化会驱动后端。
    /// * `library` - 用于获取歌词。
    /// * `volume` - 初始音量，会被限制在 `0..=100`。
    ///
    pub fn new(
        backend: Arc<dyn MediaBackend>,
        playlist: Arc<Playlist>,
        library: Arc<Library>,
        volume: i64,
    ) -> Arc<Self> {
        let player = Arc::new_cyclic(|weak: &Weak<Player>| {
            let on_song_changed: Slot<Option<SongModel>> = {
                let weak = weak.clone();
                Arc::new(move |song: &Option<SongModel>| {
                    if let Some(player) = weak.upgrade() {
                        player.on_song_changed(song.as_ref());
                    }
                })
            };
            let on_media_ready: Slot<(SongModel, Media)> = {
                let weak = weak.clone();
                Arc::new(move |(song, media): &(SongModel, Media)| {
                    let Some(player) = weak.upgrade() else {
                        return;
                    };
                    debug!("歌曲 {} 的媒体已就绪", song.uri());
                    let video = media.kind == MediaType::Video;
                    if let Err(e) = player.play(media.clone(), video) {
                        warn!("后端无法播放 {}: {e}", media.url);
                        player.spawn_load_failed(song.clone());
                    }
                })
            };
            playlist.song_changed.connect(&on_song_changed);
            playlist.song_changed_with_media.connect(&on_media_ready);

            Player {
                backend,
                playlist,
                library,
                inner: Mutex::new(PlayerInner {
                    volume: volume.clamp(0, 100) as u8,
                    ..Default::default()
                }),
                on_song_changed,
                on_media_ready,
                state_changed: Signal::new("state_changed"),
                media_changed: Signal::new("media_changed"),
                volume_changed: Signal::new("volume_changed"),
                position_changed: Signal::new("position_changed"),
                duration_changed: Signal::new("duration_changed"),
                song_finished: Signal::new("song_finished"),
                media_finished: Signal::new("media_finished"),
            }
        });
        player.backend.set_volume(player.volume());
        player
    }

    fn lock(&self) -> MutexGuard<'_, PlayerInner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// 播放列表。
    pub fn playlist(&self) -> &Arc<Playlist> {
        &self.playlist
    }

    /// 播放状态。
    pub fn state(&self) -> State {
        self.lock().state
    }

    /// 播放进度（秒）。
    pub fn position(&self) -> f64 {
        self.lock().position
    }

    /// 当前媒体时长（秒）。
    pub fn duration(&self) -> f64 {
        self.lock().duration
    }

    /// 音量。
    pub fn volume(&self) -> u8 {
        self.lock().volume
    }

    /// 当前媒体。
    pub fn current_media(&self) -> Option<Media> {
        self.lock().current_media.clone()
    }

    /// 当前歌曲，即播放列表的当前歌曲。
    pub fn current_song(&self) -> Option<SongModel> {
        self.playlist.current_song()
    }

    fn set_state(&self, state: State) {
        let old = std::mem::replace(&mut self.lock().state, state);
        if old != state {
            debug!("播放状态: {old} -> {state}");
            self.state_changed.emit(state);
        }
    }

    ///
    /// 让后端加载并播放媒体。
    ///
    /// 播放前会清空后端队列，避免后端跳到上一个媒体的进度。
    /// `media_changed` 只在后端接受媒体之后发出。
    ///
    #[instrument(skip(self, media), fields(url = %media.url))]
    pub fn play(&self, media: Media, video: bool) -> Result<()> {
        self.backend.clear_queue();
        self.backend.play(&media, video)?;
        {
            let mut inner = self.lock();
            inner.current_media = Some(media.clone());
            inner.position = 0.0;
        }
        info!("开始播放 {}", media.url);
        self.set_state(State::Playing);
        self.media_changed.emit(Some(media));
        Ok(())
    }

    /// 播放一个没有任何元信息的 URL。
    pub fn play_url(&self, url: &str) -> Result<()> {
        self.play(Media::from_url(url), true)
    }

    /// 播放一首歌曲。与当前歌曲相同时什么也不做。
    pub async fn play_song(&self, song: SongModel) {
        if self.current_song().as_ref() == Some(&song) {
            debug!("歌曲 {} 已经是当前歌曲", song.uri());
            return;
        }
        self.playlist.set_current_song(Some(song)).await;
    }

    /// 用一组歌曲替换播放列表，然后从第一首开始播放。
    pub async fn play_songs(&self, songs: Vec<SongModel>) {
        self.playlist.init_from(songs);
        self.playlist.next().await;
    }

    /// 恢复播放。
    pub fn resume(&self) {
        if self.lock().current_media.is_none() {
            warn!("没有已加载的媒体，无法恢复播放");
            return;
        }
        self.backend.resume();
        self.set_state(State::Playing);
    }

    /// 暂停。
    pub fn pause(&self) {
        if self.state() == State::Stopped {
            debug!("播放器已停止，忽略暂停");
            return;
        }
        self.backend.pause();
        self.set_state(State::Paused);
    }

    /// 在播放和暂停之间切换。
    pub fn toggle(&self) {
        match self.state() {
            State::Playing => self.pause(),
            State::Paused => self.resume(),
            State::Stopped => debug!("播放器已停止，忽略切换"),
        }
    }

    /// 停止播放，并清空当前媒体和后端队列。
    pub fn stop(&self) {
        self.backend.stop();
        self.backend.clear_queue();
        let had_media = {
            let mut inner = self.lock();
            inner.position = 0.0;
            inner.current_media.take().is_some()
        };
        self.set_state(State::Stopped);
        if had_media {
            self.media_changed.emit(None);
        }
    }

    /// 跳转到指定位置。没有加载媒体时什么也不做。
    pub fn set_position(&self, position: f64) {
        if self.lock().current_media.is_none() {
            warn!("没有已加载的媒体，无法跳转到 {position:.2}");
            return;
        }
        let position = position.max(0.0);
        self.backend.seek(position);
        self.lock().position = position;
        self.position_changed.emit(position);
    }

    /// 设置音量，超出 `0..=100` 的值会被截断。
    pub fn set_volume(&self, volume: i64) {
        let volume = volume.clamp(0, 100) as u8;
        self.lock().volume = volume;
        self.backend.set_volume(volume);
        self.volume_changed.emit(volume);
    }

    /// 从头播放当前媒体。
    pub fn replay(&self) -> Result<()> {
        match self.current_media() {
            Some(media) => {
                let video = media.kind == MediaType::Video;
                self.play(media, video)
            }
            None => {
                warn!("没有可以重新播放的媒体");
                Ok(())
            }
        }
    }

    // 槽函数是同步的，备用歌曲的查找放到单独的任务里
    fn spawn_load_failed(&self, song: SongModel) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("没有运行中的异步运行时，无法处理 {} 的加载失败", song.uri());
            self.stop();
            return;
        };
        let playlist = Arc::downgrade(&self.playlist);
        handle.spawn(async move {
            if let Some(playlist) = playlist.upgrade() {
                playlist.on_song_load_failed(&song).await;
            }
        });
    }

    fn on_song_changed(&self, song: Option<&SongModel>) {
        {
            let mut inner = self.lock();
            inner.duration = 0.0;
            inner.current_lyric = None;
        }
        if song.is_none() {
            self.stop();
        }
    }

    /// 处理一个后端事件。
    pub async fn handle_backend_event(&self, event: BackendEvent) {
        match event {
            BackendEvent::Position(position) => {
                self.lock().position = position;
                self.position_changed.emit(position);
            }
            BackendEvent::Duration(duration) => {
                self.lock().duration = duration;
                self.duration_changed.emit(duration);
            }
            BackendEvent::EndFile(reason) => self.on_end_file(reason).await,
            BackendEvent::LoadError(message) => {
                warn!("后端无法加载媒体: {message}");
                match self.current_song() {
                    Some(song) => self.playlist.on_song_load_failed(&song).await,
                    None => self.stop(),
                }
            }
        }
    }

    async fn on_end_file(&self, reason: EndReason) {
        if reason == EndReason::Aborted || self.state() == State::Stopped {
            debug!("忽略文件结束事件: {reason:?}");
            return;
        }
        self.media_finished.emit(());
        let Some(song) = self.current_song() else {
            return;
        };
        self.song_finished.emit(song);

        if self.playlist.mode() == PlaybackMode::OneLoop {
            if let Err(e) = self.replay() {
                warn!("单曲循环重新播放失败: {e}");
            }
        } else {
            self.playlist.next().await;
        }
    }

    /// 为当前歌曲加载歌词，之后可以通过 [`Player::lyric_sentence`] 获取当前句。
    pub async fn refresh_lyric(&self) {
        let Some(song) = self.current_song() else {
            return;
        };
        let lyric = match self.library.song_get_parsed_lyric(&song).await {
            Ok(lyric) => lyric,
            Err(e) => {
                debug!("获取歌曲 {} 的歌词失败: {e}", song.uri());
                None
            }
        };
        if self.current_song().as_ref() == Some(&song) {
            self.lock().current_lyric = lyric;
        }
    }

    /// 当前进度对应的歌词。
    pub fn lyric_sentence(&self) -> Option<String> {
        let inner = self.lock();
        let pos_ms = (inner.position.max(0.0) * 1000.0) as u64;
        inner
            .current_lyric
            .as_ref()
            .and_then(|l| l.current_sentence(pos_ms))
            .map(str::to_string)
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.playlist.song_changed.disconnect(&self.on_song_changed);
        self.playlist
            .song_changed_with_media
            .disconnect(&self.on_media_ready);
    }
}
