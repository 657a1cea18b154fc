//! 单元测试共用的假提供商。

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::{
    error::{FuoError, Result},
    media::{AudioQuality, Media, VideoQuality},
    model::{
        BriefArtistModel, BriefSongModel, LyricModel, ModelExistence, ModelStage, ModelType,
        PlaylistModel, SongModel, VideoModel, reader::Reader,
    },
    providers::{Provider, ProviderFlags, SearchResult, SearchType},
};

/// 构造一首 `Inited` 阶段的歌曲。
pub fn song(source: &str, id: &str, title: &str, artist: &str) -> SongModel {
    let mut song = SongModel::new(source, id, title);
    song.exists = ModelExistence::Yes;
    if !artist.is_empty() {
        song.artists.push(BriefArtistModel {
            source: source.into(),
            identifier: format!("ar-{artist}"),
            name: artist.into(),
        });
    }
    song
}

/// 行为可配置的内存提供商。
#[derive(Default)]
pub struct FakeProvider {
    pub id: String,
    pub songs: Vec<SongModel>,
    pub playable: HashSet<String>,
    pub qualities: Option<Vec<AudioQuality>>,
    pub lyrics: HashMap<String, String>,
    pub playlists: Vec<(PlaylistModel, Vec<BriefSongModel>)>,
    pub videos: Vec<(VideoModel, Vec<VideoQuality>)>,
    pub fail_search: bool,
    pub get_calls: AtomicUsize,
    pub search_calls: AtomicUsize,
}

impl FakeProvider {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Default::default()
        }
    }

    /// 添加一首歌曲，`playable` 决定能否获取到媒体。
    pub fn with_song(mut self, title: &str, artist: &str, playable: bool) -> Self {
        let id = format!("{}", self.songs.len() + 1);
        let mut s = song(&self.id, &id, title, artist);
        if playable {
            self.playable.insert(id.clone());
            if self.qualities.is_none() {
                s.url = format!("http://{}/{id}.mp3", self.id);
            }
        }
        self.songs.push(s);
        self
    }

    pub fn with_qualities(mut self, qualities: Vec<AudioQuality>) -> Self {
        self.qualities = Some(qualities);
        for s in &mut self.songs {
            s.url.clear();
        }
        self
    }

    pub fn with_lyric(mut self, song_id: &str, lrc: &str) -> Self {
        self.lyrics.insert(song_id.to_string(), lrc.to_string());
        self
    }

    pub fn with_playlist(mut self, id: &str, name: &str) -> Self {
        let playlist = PlaylistModel {
            source: self.id.clone(),
            identifier: id.into(),
            stage: ModelStage::Inited,
            exists: ModelExistence::Yes,
            name: name.into(),
            ..Default::default()
        };
        let songs = self.songs.iter().map(SongModel::brief).collect();
        self.playlists.push((playlist, songs));
        self
    }

    /// 添加一个视频，只有 `qualities` 中的画质能获取到媒体。
    pub fn with_video(mut self, id: &str, title: &str, qualities: Vec<VideoQuality>) -> Self {
        let video = VideoModel {
            source: self.id.clone(),
            identifier: id.into(),
            stage: ModelStage::Inited,
            exists: ModelExistence::Yes,
            title: title.into(),
            ..Default::default()
        };
        self.videos.push((video, qualities));
        self
    }

    pub fn failing_search(mut self) -> Self {
        self.fail_search = true;
        self
    }

    pub fn song(&self, id: &str) -> SongModel {
        self.songs
            .iter()
            .find(|s| s.identifier == id)
            .cloned()
            .unwrap_or_else(|| panic!("没有歌曲 {id}"))
    }
}

#[async_trait]
impl Provider for FakeProvider {
    fn identifier(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.id
    }

    fn flags(&self, model_type: ModelType) -> ProviderFlags {
        match model_type {
            ModelType::Song => {
                let mut flags = ProviderFlags::GET | ProviderFlags::SEARCH | ProviderFlags::LYRIC;
                if self.qualities.is_some() {
                    flags |= ProviderFlags::MULTI_QUALITY;
                }
                flags
            }
            ModelType::Playlist => ProviderFlags::GET | ProviderFlags::SONGS_RD,
            ModelType::Video => ProviderFlags::GET | ProviderFlags::MULTI_QUALITY,
            _ => ProviderFlags::empty(),
        }
    }

    async fn search(&self, keyword: &str, search_type: SearchType) -> Result<Option<SearchResult>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_search {
            return Err(FuoError::provider_io(&self.id, "搜索接口超时"));
        }
        if search_type != SearchType::Song {
            return Ok(None);
        }
        let parts: Vec<&str> = keyword.split_whitespace().collect();
        let songs = self
            .songs
            .iter()
            .filter(|s| {
                let repr = format!("{} {}", s.title, s.artists_name());
                parts.iter().any(|p| repr.contains(p))
            })
            .map(SongModel::brief)
            .collect();
        Ok(Some(SearchResult {
            source: self.id.clone(),
            songs,
            ..Default::default()
        }))
    }

    async fn song_get(&self, identifier: &str) -> Result<Option<SongModel>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.songs.iter().find(|s| s.identifier == identifier).cloned())
    }

    async fn song_list_quality(&self, song: &SongModel) -> Result<Vec<AudioQuality>> {
        if self.playable.contains(&song.identifier) {
            Ok(self.qualities.clone().unwrap_or_default())
        } else {
            Ok(Vec::new())
        }
    }

    async fn song_get_media(&self, song: &SongModel, quality: AudioQuality) -> Result<Option<Media>> {
        Ok(self
            .playable
            .contains(&song.identifier)
            .then(|| Media::from_url(format!("http://{}/{}.{quality}", self.id, song.identifier))))
    }

    async fn song_get_lyric(&self, song: &SongModel) -> Result<Option<LyricModel>> {
        Ok(self.lyrics.get(&song.identifier).map(|content| LyricModel {
            source: self.id.clone(),
            identifier: song.identifier.clone(),
            content: content.clone(),
            ..Default::default()
        }))
    }

    async fn playlist_get(&self, identifier: &str) -> Result<Option<PlaylistModel>> {
        Ok(self
            .playlists
            .iter()
            .find(|(p, _)| p.identifier == identifier)
            .map(|(p, _)| p.clone()))
    }

    async fn video_get(&self, identifier: &str) -> Result<Option<VideoModel>> {
        Ok(self
            .videos
            .iter()
            .find(|(v, _)| v.identifier == identifier)
            .map(|(v, _)| v.clone()))
    }

    async fn video_list_quality(&self, video: &VideoModel) -> Result<Vec<VideoQuality>> {
        Ok(self
            .videos
            .iter()
            .find(|(v, _)| v.identifier == video.identifier)
            .map(|(_, q)| q.clone())
            .unwrap_or_default())
    }

    async fn video_get_media(
        &self,
        video: &VideoModel,
        quality: VideoQuality,
    ) -> Result<Option<Media>> {
        Ok(Some(Media::from_url(format!(
            "http://{}/{}.{quality}",
            self.id, video.identifier
        ))))
    }

    async fn playlist_create_songs_rd(
        &self,
        playlist: &PlaylistModel,
    ) -> Result<Reader<BriefSongModel>> {
        let songs = self
            .playlists
            .iter()
            .find(|(p, _)| p.identifier == playlist.identifier)
            .map(|(_, songs)| songs.clone())
            .unwrap_or_default();
        Ok(Reader::from_list(songs))
    }
}
