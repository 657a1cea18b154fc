//! 播放列表。
//!
//! [`PlaylistEngine`] 是一个与具体元素无关的纯数据结构，负责维护不重复的
//! 序列、当前指针、坏元素集合以及按播放模式推导上一首/下一首。
//!
//! [`Playlist`] 在它的基础上处理歌曲：当前歌曲改变时先发出 `song_changed`，
//! 然后按音质策略准备媒体，失败时尝试其它提供商的备用歌曲，仍然失败则把
//! 歌曲标记为坏并跳到下一首。准备好的媒体通过 `song_changed_with_media`
//! 交给播放器。

use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::BoxFuture;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use tracing::{debug, info, warn};

use crate::{
    config::Config,
    library::Library,
    media::Media,
    model::{Model, SongModel},
    signal::Signal,
};

/// 播放模式，序列化为整数 `0..=3`。
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum PlaybackMode {
    /// 单曲循环
    OneLoop = 0,
    /// 顺序播放，到结尾停止
    Sequential = 1,
    /// 列表循环
    #[default]
    Loop = 2,
    /// 随机播放
    Random = 3,
}

impl From<PlaybackMode> for u8 {
    fn from(mode: PlaybackMode) -> Self {
        mode as u8
    }
}

impl TryFrom<u8> for PlaybackMode {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PlaybackMode::OneLoop),
            1 => Ok(PlaybackMode::Sequential),
            2 => Ok(PlaybackMode::Loop),
            3 => Ok(PlaybackMode::Random),
            other => Err(format!("未知的播放模式: {other}")),
        }
    }
}

impl PlaybackMode {
    /// 到达结尾时是否回到开头。
    fn wraps(self) -> bool {
        matches!(self, PlaybackMode::Loop | PlaybackMode::OneLoop)
    }
}

/// 与元素类型无关的播放列表状态机。
#[derive(Debug, Clone)]
pub struct PlaylistEngine<T> {
    items: Vec<T>,
    current: Option<T>,
    bad: HashSet<T>,
    mode: PlaybackMode,
}

impl<T: Clone + Eq + Hash> Default for PlaylistEngine<T> {
    fn default() -> Self {
        Self::new(PlaybackMode::default())
    }
}

impl<T: Clone + Eq + Hash> PlaylistEngine<T> {
    /// 创建一个空的播放列表。
    pub fn new(mode: PlaybackMode) -> Self {
        Self {
            items: Vec::new(),
            current: None,
            bad: HashSet::new(),
            mode,
        }
    }

    /// 所有元素，包括坏元素。
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// 元素数量。
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// 是否为空。
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// 当前元素。
    pub fn current(&self) -> Option<&T> {
        self.current.as_ref()
    }

    /// 播放模式。
    pub fn mode(&self) -> PlaybackMode {
        self.mode
    }

    /// 设置播放模式，返回是否发生了变化。
    pub fn set_mode(&mut self, mode: PlaybackMode) -> bool {
        std::mem::replace(&mut self.mode, mode) != mode
    }

    /// 是否已被标记为坏。
    pub fn is_bad(&self, item: &T) -> bool {
        self.bad.contains(item)
    }

    fn position(&self, item: &T) -> Option<usize> {
        self.items.iter().position(|i| i == item)
    }

    fn is_good(&self, item: &T) -> bool {
        !self.bad.contains(item)
    }

    /// 追加到末尾，已存在时什么也不做并返回 `false`。
    pub fn add(&mut self, item: T) -> bool {
        if self.position(&item).is_some() {
            return false;
        }
        self.items.push(item);
        true
    }

    /// 插入到当前元素之后，没有当前元素时追加到末尾。
    pub fn insert(&mut self, item: T) -> bool {
        if self.position(&item).is_some() {
            return false;
        }
        let index = self
            .current
            .as_ref()
            .and_then(|c| self.position(c))
            .map_or(self.items.len(), |i| i + 1);
        self.items.insert(index, item);
        true
    }

    ///
    /// 移除一个元素。
    ///
    /// 移除的是当前元素时，当前指针会先移动到下一个元素；如果下一个元素
    /// 就是它自己，则先清空指针、移除，再从头推导下一个元素。
    ///
    /// # 返回
    /// `(是否移除了元素, 当前指针是否改变)`
    ///
    pub fn remove(&mut self, item: &T) -> (bool, bool) {
        self.bad.remove(item);
        let Some(index) = self.position(item) else {
            return (false, false);
        };

        if self.current.as_ref() != Some(item) {
            self.items.remove(index);
            return (true, false);
        }

        let next = self.next_item();
        if next.as_ref() == Some(item) {
            self.current = None;
            self.items.remove(index);
            self.current = self.next_item();
        } else {
            self.current = next;
            self.items.remove(index);
        }
        (true, true)
    }

    /// 清空所有元素和当前指针。
    pub fn clear(&mut self) {
        self.items.clear();
        self.bad.clear();
        self.current = None;
    }

    /// 用一组元素替换整个序列，当前指针被清空。重复的元素只保留第一个。
    pub fn init_from(&mut self, items: impl IntoIterator<Item = T>) {
        self.clear();
        for item in items {
            self.add(item);
        }
    }

    /// 把一个存在于序列中的元素标记为坏。
    pub fn mark_as_bad(&mut self, item: &T) -> bool {
        if self.position(item).is_none() {
            return false;
        }
        self.bad.insert(item.clone())
    }

    fn first_good(&self) -> Option<T> {
        self.items.iter().find(|i| self.is_good(i)).cloned()
    }

    fn random_good(&self) -> Option<T> {
        let candidates: Vec<&T> = self
            .items
            .iter()
            .filter(|i| self.is_good(i) && Some(*i) != self.current.as_ref())
            .collect();
        match candidates.choose(&mut rand::rng()) {
            Some(item) => Some((*item).clone()),
            None => self.current.clone().filter(|c| self.is_good(c)),
        }
    }

    /// 按播放模式推导下一个元素，不会修改状态。
    pub fn next_item(&self) -> Option<T> {
        let Some(current) = &self.current else {
            return self.first_good();
        };
        if self.mode == PlaybackMode::Random {
            return self.random_good();
        }
        let Some(index) = self.position(current) else {
            return self.first_good();
        };

        if let Some(found) = self.items[index + 1..].iter().find(|i| self.is_good(i)) {
            return Some(found.clone());
        }
        if self.mode.wraps() {
            return self.items[..=index].iter().find(|i| self.is_good(i)).cloned();
        }
        None
    }

    /// 按播放模式推导上一个元素，不会修改状态。
    pub fn previous_item(&self) -> Option<T> {
        let Some(current) = &self.current else {
            return self.items.iter().rev().find(|i| self.is_good(i)).cloned();
        };
        if self.mode == PlaybackMode::Random {
            return self.random_good();
        }
        let Some(index) = self.position(current) else {
            return self.items.iter().rev().find(|i| self.is_good(i)).cloned();
        };

        if let Some(found) = self.items[..index].iter().rev().find(|i| self.is_good(i)) {
            return Some(found.clone());
        }
        if self.mode.wraps() {
            return self.items[index..].iter().rev().find(|i| self.is_good(i)).cloned();
        }
        None
    }

    /// 设置当前元素。不在序列中的元素会被插入到原当前元素之后。
    ///
    /// # 返回
    /// 当前指针是否改变。
    pub fn set_current(&mut self, item: Option<T>) -> bool {
        if let Some(item) = &item {
            self.insert(item.clone());
        }
        if self.current == item {
            return false;
        }
        self.current = item;
        true
    }
}

/// 歌曲播放列表。
pub struct Playlist {
    engine: Mutex<PlaylistEngine<SongModel>>,
    library: Arc<Library>,
    audio_select_policy: String,
    generation: AtomicU64,
    load_failed: Mutex<HashSet<SongModel>>,
    /// 当前歌曲改变，在准备媒体之前发出
    pub song_changed: Signal<Option<SongModel>>,
    /// 当前歌曲的媒体已经准备好
    pub song_changed_with_media: Signal<(SongModel, Media)>,
    /// 播放模式改变
    pub mode_changed: Signal<PlaybackMode>,
    /// 添加了歌曲
    pub songs_added: Signal<Vec<SongModel>>,
    /// 移除了歌曲
    pub songs_removed: Signal<Vec<SongModel>>,
    /// 播放列表被清空
    pub playlist_cleared: Signal<()>,
}

impl std::fmt::Debug for Playlist {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let engine = self.lock();
        f.debug_struct("Playlist")
            .field("len", &engine.len())
            .field("current", &engine.current().map(Model::uri))
            .field("mode", &engine.mode())
            .finish()
    }
}

impl Playlist {
    /// 创建一个空的播放列表。
    ///
    /// # 参数
    /// * `library` - 用于准备媒体和寻找备用歌曲的曲库。
    /// * `mode` - 初始播放模式。
    /// * `audio_select_policy` - 音质排序策略，例如 `hq<>`。
    pub fn new(library: Arc<Library>, mode: PlaybackMode, audio_select_policy: &str) -> Self {
        Self {
            engine: Mutex::new(PlaylistEngine::new(mode)),
            library,
            audio_select_policy: audio_select_policy.to_string(),
            generation: AtomicU64::new(0),
            load_failed: Mutex::new(HashSet::new()),
            song_changed: Signal::new("song_changed"),
            song_changed_with_media: Signal::new("song_changed_with_media"),
            mode_changed: Signal::new("mode_changed"),
            songs_added: Signal::new("songs_added"),
            songs_removed: Signal::new("songs_removed"),
            playlist_cleared: Signal::new("playlist_cleared"),
        }
    }

    /// 按配置创建播放列表。
    pub fn from_config(library: Arc<Library>, config: &Config) -> Self {
        Self::new(library, config.playback_mode, &config.audio_select_policy)
    }

    fn lock(&self) -> MutexGuard<'_, PlaylistEngine<SongModel>> {
        self.engine
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// 播放模式。
    pub fn mode(&self) -> PlaybackMode {
        self.lock().mode()
    }

    /// 设置播放模式。
    pub fn set_mode(&self, mode: PlaybackMode) {
        let changed = self.lock().set_mode(mode);
        if changed {
            info!("播放模式切换为 {mode}");
            self.mode_changed.emit(mode);
        }
    }

    /// 所有歌曲。
    pub fn list(&self) -> Vec<SongModel> {
        self.lock().items().to_vec()
    }

    /// 歌曲数量。
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// 是否为空。
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// 当前歌曲。
    pub fn current_song(&self) -> Option<SongModel> {
        self.lock().current().cloned()
    }

    /// 歌曲是否被标记为坏。
    pub fn is_bad(&self, song: &SongModel) -> bool {
        self.lock().is_bad(song)
    }

    /// 追加一首歌曲。
    pub fn add(&self, song: SongModel) -> bool {
        let added = self.lock().add(song.clone());
        if added {
            self.songs_added.emit(vec![song]);
        }
        added
    }

    /// 追加多首歌曲，返回实际添加的数量。
    pub fn add_many(&self, songs: Vec<SongModel>) -> usize {
        let added: Vec<SongModel> = {
            let mut engine = self.lock();
            songs.into_iter().filter(|s| engine.add(s.clone())).collect()
        };
        let count = added.len();
        if count > 0 {
            self.songs_added.emit(added);
        }
        count
    }

    /// 把歌曲插入到当前歌曲之后。
    pub fn insert(&self, song: SongModel) -> bool {
        let inserted = self.lock().insert(song.clone());
        if inserted {
            self.songs_added.emit(vec![song]);
        }
        inserted
    }

    /// 移除一首歌曲。移除的是当前歌曲时会切换到下一首。
    pub async fn remove(&self, song: &SongModel) -> bool {
        let (removed, current_changed, current) = {
            let mut engine = self.lock();
            let (removed, changed) = engine.remove(song);
            (removed, changed, engine.current().cloned())
        };
        self.forget_load_failure(song);
        if removed {
            debug!("已从播放列表移除 {}", song.uri());
            self.songs_removed.emit(vec![song.clone()]);
        }
        if current_changed {
            self.apply_current(current).await;
        }
        removed
    }

    /// 清空播放列表。
    pub fn clear(&self) {
        let had_current = {
            let mut engine = self.lock();
            let had_current = engine.current().is_some();
            engine.clear();
            had_current
        };
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.lock_load_failed().clear();
        info!("播放列表已清空");
        self.playlist_cleared.emit(());
        if had_current {
            self.song_changed.emit(None);
        }
    }

    /// 用一组歌曲替换播放列表，当前歌曲被清空。
    pub fn init_from(&self, songs: Vec<SongModel>) {
        {
            let mut engine = self.lock();
            engine.init_from(songs);
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.lock_load_failed().clear();
        self.playlist_cleared.emit(());
        let songs = self.list();
        if !songs.is_empty() {
            self.songs_added.emit(songs);
        }
    }

    /// 把歌曲标记为坏，之后的切歌会跳过它。
    pub fn mark_as_bad(&self, song: &SongModel) -> bool {
        let marked = self.lock().mark_as_bad(song);
        if marked {
            warn!("歌曲 {} 被标记为无法播放", song.to_line());
        }
        marked
    }

    /// 下一首歌曲（不切换）。
    pub fn next_item(&self) -> Option<SongModel> {
        self.lock().next_item()
    }

    /// 上一首歌曲（不切换）。
    pub fn previous_item(&self) -> Option<SongModel> {
        self.lock().previous_item()
    }

    /// 切换到下一首。
    pub async fn next(&self) {
        let next = self.next_item();
        self.set_current_song(next).await;
    }

    /// 切换到上一首。
    pub async fn previous(&self) {
        let previous = self.previous_item();
        self.set_current_song(previous).await;
    }

    ///
    /// 设置当前歌曲，并为它准备媒体。
    ///
    /// 歌曲不在列表中时会被插入到原当前歌曲之后。媒体准备失败且没有可用
    /// 的备用歌曲时，歌曲会被标记为坏并自动切换到下一首。
    ///
    pub fn set_current_song(&self, song: Option<SongModel>) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let inserted = song.as_ref().is_some_and(|s| {
                let mut engine = self.lock();
                let inserted = !engine.items().contains(s);
                engine.set_current(Some(s.clone()));
                inserted
            });
            if song.is_none() {
                self.lock().set_current(None);
            }
            if inserted && let Some(s) = &song {
                self.songs_added.emit(vec![s.clone()]);
            }
            self.apply_current(song).await;
        })
    }

    fn is_current_generation(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    async fn apply_current(&self, song: Option<SongModel>) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.song_changed.emit(song.clone());
        let Some(song) = song else {
            info!("播放列表没有当前歌曲");
            return;
        };
        info!("当前歌曲切换为 {}", song.to_line());

        let media = self.prepare_media(&song).await;
        if !self.is_current_generation(generation) {
            debug!("歌曲 {} 的媒体准备已过时，丢弃结果", song.uri());
            return;
        }
        match media {
            Some(media) => self.song_changed_with_media.emit((song, media)),
            None => {
                self.mark_as_bad(&song);
                self.next().await;
            }
        }
    }

    /// 准备媒体，失败时尝试备用歌曲。
    async fn prepare_media(&self, song: &SongModel) -> Option<Media> {
        match self
            .library
            .song_prepare_media(song, &self.audio_select_policy)
            .await
        {
            Ok(Some(media)) => return Some(media),
            Ok(None) => info!("歌曲 {} 没有可用的媒体，尝试寻找备用歌曲", song.uri()),
            Err(e) => warn!("为歌曲 {} 准备媒体失败: {e}，尝试寻找备用歌曲", song.uri()),
        }
        self.standby_media(song).await
    }

    async fn standby_media(&self, song: &SongModel) -> Option<Media> {
        let (standby, media) = self
            .library
            .a_list_song_standby_with_media(song, true, &self.audio_select_policy)
            .await
            .into_iter()
            .next()?;
        info!("使用备用歌曲 {} 播放 {}", standby.uri(), song.uri());
        Some(media)
    }

    ///
    /// 播放后端无法加载当前歌曲的媒体。
    ///
    /// 第一次失败时尝试备用歌曲，再次失败则标记为坏并切换到下一首。
    ///
    pub async fn on_song_load_failed(&self, song: &SongModel) {
        if self.current_song().as_ref() != Some(song) {
            debug!("加载失败的歌曲 {} 已不是当前歌曲，忽略", song.uri());
            return;
        }
        let generation = self.generation.load(Ordering::SeqCst);
        let first_failure = self.lock_load_failed().insert(song.clone());

        let media = if first_failure {
            self.standby_media(song).await
        } else {
            None
        };
        if !self.is_current_generation(generation) {
            return;
        }
        match media {
            Some(media) => self.song_changed_with_media.emit((song.clone(), media)),
            None => {
                self.mark_as_bad(song);
                self.next().await;
            }
        }
    }

    fn lock_load_failed(&self) -> MutexGuard<'_, HashSet<SongModel>> {
        self.load_failed
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn forget_load_failure(&self, song: &SongModel) {
        self.lock_load_failed().remove(song);
    }

    /// 每首歌被标记为坏的状态，主要用于展示。
    pub fn bad_songs(&self) -> HashMap<String, bool> {
        let engine = self.lock();
        engine
            .items()
            .iter()
            .map(|s| (s.uri(), engine.is_bad(s)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FakeProvider;

    fn engine(items: &[&'static str], mode: PlaybackMode) -> PlaylistEngine<&'static str> {
        let mut engine = PlaylistEngine::new(mode);
        engine.init_from(items.iter().copied());
        engine
    }

    #[test]
    fn test_next_skips_bad_and_wraps() {
        let mut p = engine(&["A", "B", "C"], PlaybackMode::Loop);
        p.set_current(Some("A"));
        assert!(p.mark_as_bad(&"B"));

        p.set_current(p.next_item());
        assert_eq!(p.current(), Some(&"C"));
        p.set_current(p.next_item());
        assert_eq!(p.current(), Some(&"A"));
        assert_eq!(p.items(), &["A", "B", "C"], "坏元素仍然可见");
    }

    #[test]
    fn test_sequential_stops_at_end() {
        let mut p = engine(&["A", "B"], PlaybackMode::Sequential);
        assert_eq!(p.next_item(), Some("A"));
        p.set_current(Some("B"));
        assert_eq!(p.next_item(), None);
        assert_eq!(p.previous_item(), Some("A"));
        p.set_current(Some("A"));
        assert_eq!(p.previous_item(), None);
    }

    #[test]
    fn test_previous_wraps_in_loop() {
        let mut p = engine(&["A", "B", "C"], PlaybackMode::OneLoop);
        p.set_current(Some("A"));
        assert_eq!(p.previous_item(), Some("C"));
        p.mark_as_bad(&"C");
        assert_eq!(p.previous_item(), Some("B"));
    }

    #[test]
    fn test_remove_current_advances() {
        let mut p = engine(&["A", "B"], PlaybackMode::Loop);
        p.set_current(Some("A"));
        assert_eq!(p.remove(&"A"), (true, true));
        assert_eq!(p.current(), Some(&"B"));
        assert_eq!(p.items(), &["B"]);

        assert_eq!(p.remove(&"B"), (true, true));
        assert_eq!(p.current(), None);
        assert!(p.is_empty());
    }

    #[test]
    fn test_remove_non_current_and_missing() {
        let mut p = engine(&["A", "B", "C"], PlaybackMode::Loop);
        p.set_current(Some("B"));
        p.mark_as_bad(&"C");
        assert_eq!(p.remove(&"C"), (true, false));
        assert!(!p.is_bad(&"C"));
        assert_eq!(p.remove(&"Z"), (false, false));
        assert_eq!(p.current(), Some(&"B"));
    }

    #[test]
    fn test_add_insert_and_set_current() {
        let mut p = engine(&["A", "B"], PlaybackMode::Loop);
        assert!(!p.add("A"), "重复添加应当无效");
        p.set_current(Some("A"));
        assert!(p.insert("X"));
        assert_eq!(p.items(), &["A", "X", "B"]);

        p.set_current(Some("Y"));
        assert_eq!(p.items(), &["A", "X", "Y", "B"]);
        assert!(!p.mark_as_bad(&"nope"));

        p.init_from(["B", "B", "C"]);
        assert_eq!(p.items(), &["B", "C"]);
        assert_eq!(p.current(), None);
    }

    #[test]
    fn test_random_visits_every_good_item() {
        let mut p = engine(&["A", "B", "C", "D"], PlaybackMode::Random);
        p.mark_as_bad(&"D");
        p.set_current(Some("A"));
        let mut seen = HashSet::new();
        for _ in 0..200 {
            let next = p.next_item().unwrap();
            assert_ne!(next, "D");
            assert_ne!(Some(&next), p.current(), "随机模式应尽量选择不同的元素");
            seen.insert(next);
            p.set_current(Some(next));
        }
        assert_eq!(seen.len(), 3);

        let mut single = engine(&["A"], PlaybackMode::Random);
        single.set_current(Some("A"));
        assert_eq!(single.next_item(), Some("A"));
    }

    #[test]
    fn test_mode_wire_values() {
        assert_eq!(serde_json::to_string(&PlaybackMode::OneLoop).unwrap(), "0");
        assert_eq!(
            serde_json::from_str::<PlaybackMode>("3").unwrap(),
            PlaybackMode::Random
        );
        assert!(serde_json::from_str::<PlaybackMode>("4").is_err());
        assert_eq!("one_loop".parse::<PlaybackMode>().unwrap(), PlaybackMode::OneLoop);
    }

    fn playlist_with(provider: FakeProvider) -> (Arc<FakeProvider>, Playlist) {
        let provider = Arc::new(provider);
        let library = Arc::new(Library::new());
        library.register(provider.clone()).unwrap();
        let playlist = Playlist::new(library, PlaybackMode::Loop, "hq<>");
        (provider, playlist)
    }

    #[test_log::test(tokio::test)]
    async fn test_unplayable_song_is_marked_bad_and_skipped() {
        let (provider, playlist) = playlist_with(
            FakeProvider::new("qq")
                .with_song("坏歌", "", false)
                .with_song("好歌", "", true),
        );
        let mut prepared = playlist.song_changed_with_media.connect_queued();
        let mut changed = playlist.song_changed.connect_queued();

        playlist.init_from(provider.songs.clone());
        playlist.next().await;

        assert!(playlist.is_bad(&provider.song("1")));
        assert_eq!(playlist.current_song(), Some(provider.song("2")));
        let (song, media) = prepared.try_recv().unwrap();
        assert_eq!(song.identifier, "2");
        assert_eq!(media.url, "http://qq/2.mp3");
        assert!(prepared.try_recv().is_err());

        let order: Vec<_> = std::iter::from_fn(|| changed.try_recv().ok())
            .map(|s| s.map(|s| s.identifier))
            .collect();
        assert_eq!(order, vec![Some("1".to_string()), Some("2".to_string())]);
    }

    #[tokio::test]
    async fn test_all_bad_stops() {
        let (provider, playlist) = playlist_with(
            FakeProvider::new("qq")
                .with_song("坏歌1", "", false)
                .with_song("坏歌2", "", false),
        );
        playlist.init_from(provider.songs.clone());
        playlist.next().await;
        assert_eq!(playlist.current_song(), None);
        assert!(playlist.is_bad(&provider.song("1")));
        assert!(playlist.is_bad(&provider.song("2")));
    }

    #[tokio::test]
    async fn test_remove_current_plays_next() {
        let (provider, playlist) = playlist_with(
            FakeProvider::new("qq")
                .with_song("A", "", true)
                .with_song("B", "", true),
        );
        playlist.init_from(provider.songs.clone());
        playlist.set_current_song(Some(provider.song("1"))).await;
        let mut prepared = playlist.song_changed_with_media.connect_queued();

        assert!(playlist.remove(&provider.song("1")).await);
        assert_eq!(playlist.current_song(), Some(provider.song("2")));
        assert_eq!(playlist.list(), vec![provider.song("2")]);
        assert_eq!(prepared.try_recv().unwrap().0.identifier, "2");
    }

    #[test_log::test(tokio::test)]
    async fn test_load_failure_retries_once_then_skips() {
        let (provider, playlist) = playlist_with(
            FakeProvider::new("qq")
                .with_song("A", "", true)
                .with_song("B", "", true),
        );
        playlist.init_from(provider.songs.clone());
        playlist.set_current_song(Some(provider.song("1"))).await;

        // 没有其它提供商，找不到备用歌曲
        playlist.on_song_load_failed(&provider.song("1")).await;
        assert!(playlist.is_bad(&provider.song("1")));
        assert_eq!(playlist.current_song(), Some(provider.song("2")));
    }

    #[tokio::test]
    async fn test_mode_changed_signal() {
        let (_, playlist) = playlist_with(FakeProvider::new("qq"));
        let mut rx = playlist.mode_changed.connect_queued();
        playlist.set_mode(PlaybackMode::Random);
        playlist.set_mode(PlaybackMode::Random);
        assert_eq!(rx.try_recv().unwrap(), PlaybackMode::Random);
        assert!(rx.try_recv().is_err());
    }
}
