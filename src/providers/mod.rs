//! 提供商模块
//!
//! 该模块定义了与 Providers 进行交互的核心抽象。一个提供商对应一个音乐
//! 平台的曲库及其媒体流。提供商通过 [`ProviderFlags`] 按模型类型声明自己的
//! 能力，没有实现的操作默认返回 `FuoError::NotSupported`。

use std::sync::Arc;

use async_trait::async_trait;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};
use tracing::debug;

use crate::{
    error::{FuoError, Result},
    media::{AudioQuality, Media, VideoQuality},
    model::{
        AlbumModel, ArtistModel, BriefAlbumModel, BriefArtistModel, BriefPlaylistModel,
        BriefSongModel, BriefVideoModel, CommentModel, LyricModel, ModelType, PlaylistModel,
        SongModel, UserModel, VideoModel, reader::Reader,
    },
};

pub mod local;

bitflags! {
    /// 提供商针对某一种模型类型的能力。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ProviderFlags: u32 {
        /// 可以按 ID 获取完整模型
        const GET = 1;
        /// 可以创建歌曲读取器
        const SONGS_RD = 1 << 1;
        /// 可以获取相似歌曲
        const SIMILAR = 1 << 2;
        /// 可以获取热门评论
        const HOT_COMMENTS = 1 << 3;
        /// 支持 v2 模型接口
        const MODEL_V2 = 1 << 4;
        /// 支持多音质/多画质
        const MULTI_QUALITY = 1 << 5;
        /// 可以搜索
        const SEARCH = 1 << 6;
        /// 可以获取歌词
        const LYRIC = 1 << 7;
        /// 可以获取 MV
        const MV = 1 << 8;
    }
}

/// 搜索的类型。
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(ascii_case_insensitive)]
pub enum SearchType {
    /// 歌曲
    #[strum(serialize = "so")]
    #[serde(rename = "so")]
    Song,
    /// 专辑
    #[strum(serialize = "al")]
    #[serde(rename = "al")]
    Album,
    /// 歌手
    #[strum(serialize = "ar")]
    #[serde(rename = "ar")]
    Artist,
    /// 歌单
    #[strum(serialize = "pl")]
    #[serde(rename = "pl")]
    Playlist,
    /// 视频
    #[strum(serialize = "vi")]
    #[serde(rename = "vi")]
    Video,
}

impl SearchType {
    /// 对应的模型类型。
    pub fn model_type(self) -> ModelType {
        match self {
            SearchType::Song => ModelType::Song,
            SearchType::Album => ModelType::Album,
            SearchType::Artist => ModelType::Artist,
            SearchType::Playlist => ModelType::Playlist,
            SearchType::Video => ModelType::Video,
        }
    }
}

/// 一个提供商对一次搜索的结果。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// 提供商标识
    pub source: String,
    /// 搜索类型
    pub search_type: Option<SearchType>,
    /// 歌曲
    pub songs: Vec<BriefSongModel>,
    /// 专辑
    pub albums: Vec<BriefAlbumModel>,
    /// 歌手
    pub artists: Vec<BriefArtistModel>,
    /// 歌单
    pub playlists: Vec<BriefPlaylistModel>,
    /// 视频
    pub videos: Vec<BriefVideoModel>,
}

impl SearchResult {
    /// 结果中是否没有任何模型。
    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
            && self.albums.is_empty()
            && self.artists.is_empty()
            && self.playlists.is_empty()
            && self.videos.is_empty()
    }
}

/// 定义了所有音乐平台提供商需要实现的通用接口。
#[async_trait]
pub trait Provider: Send + Sync {
    ///
    /// 返回提供商的唯一标识。
    ///
    /// 一个全小写的字符串，例如 `"qq"`, `"netease"`，会出现在 URI 中。
    ///
    fn identifier(&self) -> &str;

    /// 展示用的名称。
    fn name(&self) -> &str;

    ///
    /// 提供商对某种模型类型支持的能力。
    ///
    fn flags(&self, model_type: ModelType) -> ProviderFlags {
        let _ = model_type;
        ProviderFlags::empty()
    }

    /// 是否对 `model_type` 具备全部的 `flags` 能力。
    fn check_flags(&self, model_type: ModelType, flags: ProviderFlags) -> bool {
        self.flags(model_type).contains(flags)
    }

    /// 当前登录的用户。
    fn current_user(&self) -> Option<UserModel> {
        None
    }

    /// 切换当前用户，`None` 表示登出。
    fn set_current_user(&self, user: Option<UserModel>) {
        debug!("提供商 '{}' 不支持用户，忽略 {user:?}", self.identifier());
    }

    ///
    /// 根据关键词搜索。
    ///
    /// # 参数
    /// * `keyword` - 搜索关键词。
    /// * `search_type` - 搜索的类型。
    ///
    /// # 返回
    /// 一个 `Result`，成功时包含该提供商的 `SearchResult`，没有结果时为 `None`。
    ///
    async fn search(&self, keyword: &str, search_type: SearchType) -> Result<Option<SearchResult>> {
        let _ = (keyword, search_type);
        Err(self.not_supported("search"))
    }

    /// 根据 ID 获取歌曲。
    async fn song_get(&self, identifier: &str) -> Result<Option<SongModel>> {
        let _ = identifier;
        Err(self.not_supported("song_get"))
    }

    /// 根据 ID 获取专辑。
    async fn album_get(&self, identifier: &str) -> Result<Option<AlbumModel>> {
        let _ = identifier;
        Err(self.not_supported("album_get"))
    }

    /// 根据 ID 获取歌手。
    async fn artist_get(&self, identifier: &str) -> Result<Option<ArtistModel>> {
        let _ = identifier;
        Err(self.not_supported("artist_get"))
    }

    /// 根据 ID 获取歌单。
    async fn playlist_get(&self, identifier: &str) -> Result<Option<PlaylistModel>> {
        let _ = identifier;
        Err(self.not_supported("playlist_get"))
    }

    /// 根据 ID 获取用户。
    async fn user_get(&self, identifier: &str) -> Result<Option<UserModel>> {
        let _ = identifier;
        Err(self.not_supported("user_get"))
    }

    /// 根据 ID 获取视频。
    async fn video_get(&self, identifier: &str) -> Result<Option<VideoModel>> {
        let _ = identifier;
        Err(self.not_supported("video_get"))
    }

    ///
    /// 列出歌曲可用的音质。
    ///
    /// 只有声明了 `MULTI_QUALITY` 的提供商需要实现。
    ///
    async fn song_list_quality(&self, song: &SongModel) -> Result<Vec<AudioQuality>> {
        let _ = song;
        Err(self.not_supported("song_list_quality"))
    }

    ///
    /// 获取歌曲指定音质的媒体。
    ///
    /// # 注意
    /// 大概率因版权、地区限制或 VIP 而失败，此时应返回 `Ok(None)`。
    ///
    async fn song_get_media(&self, song: &SongModel, quality: AudioQuality) -> Result<Option<Media>> {
        let _ = (song, quality);
        Err(self.not_supported("song_get_media"))
    }

    /// 获取歌曲的 MV。
    async fn song_get_mv(&self, song: &SongModel) -> Result<Option<VideoModel>> {
        let _ = song;
        Err(self.not_supported("song_get_mv"))
    }

    /// 获取歌曲的歌词。
    async fn song_get_lyric(&self, song: &SongModel) -> Result<Option<LyricModel>> {
        let _ = song;
        Err(self.not_supported("song_get_lyric"))
    }

    /// 获取相似歌曲。
    async fn song_list_similar(&self, song: &SongModel) -> Result<Vec<BriefSongModel>> {
        let _ = song;
        Err(self.not_supported("song_list_similar"))
    }

    /// 获取歌曲的热门评论。
    async fn song_list_hot_comments(&self, song: &SongModel) -> Result<Vec<CommentModel>> {
        let _ = song;
        Err(self.not_supported("song_list_hot_comments"))
    }

    /// 创建专辑歌曲的读取器。
    async fn album_create_songs_rd(&self, album: &AlbumModel) -> Result<Reader<BriefSongModel>> {
        Ok(Reader::from_list(album.songs.clone()))
    }

    /// 创建歌手歌曲的读取器，默认返回热门歌曲。
    async fn artist_create_songs_rd(&self, artist: &ArtistModel) -> Result<Reader<BriefSongModel>> {
        Ok(Reader::from_list(artist.hot_songs.clone()))
    }

    /// 创建歌手专辑的读取器。
    async fn artist_create_albums_rd(
        &self,
        artist: &ArtistModel,
    ) -> Result<Reader<BriefAlbumModel>> {
        let _ = artist;
        Err(self.not_supported("artist_create_albums_rd"))
    }

    /// 创建歌单歌曲的读取器。
    async fn playlist_create_songs_rd(
        &self,
        playlist: &PlaylistModel,
    ) -> Result<Reader<BriefSongModel>> {
        let _ = playlist;
        Err(self.not_supported("playlist_create_songs_rd"))
    }

    /// 列出视频可用的画质。
    async fn video_list_quality(&self, video: &VideoModel) -> Result<Vec<VideoQuality>> {
        let _ = video;
        Err(self.not_supported("video_list_quality"))
    }

    /// 获取视频指定画质的媒体。
    async fn video_get_media(
        &self,
        video: &VideoModel,
        quality: VideoQuality,
    ) -> Result<Option<Media>> {
        let _ = (video, quality);
        Err(self.not_supported("video_get_media"))
    }

    /// 构造一个“不支持”错误。
    fn not_supported(&self, operation: &str) -> FuoError {
        FuoError::NotSupported(format!("提供商 '{}' 不支持 {operation}", self.identifier()))
    }
}

/// 以某个用户的身份使用提供商，离开作用域时恢复之前的用户。
#[must_use = "AuthGuard 被丢弃时会立即恢复之前的用户"]
pub struct AuthGuard {
    provider: Arc<dyn Provider>,
    previous: Option<UserModel>,
}

impl Drop for AuthGuard {
    fn drop(&mut self) {
        debug!("恢复提供商 '{}' 之前的用户", self.provider.identifier());
        self.provider.set_current_user(self.previous.take());
    }
}

/// 切换提供商的当前用户，返回的 [`AuthGuard`] 被丢弃时恢复原用户。
pub fn auth_as(provider: &Arc<dyn Provider>, user: UserModel) -> AuthGuard {
    let previous = provider.current_user();
    provider.set_current_user(Some(user));
    AuthGuard {
        provider: Arc::clone(provider),
        previous,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct UserProvider {
        user: Mutex<Option<UserModel>>,
    }

    #[async_trait]
    impl Provider for UserProvider {
        fn identifier(&self) -> &str {
            "fake"
        }

        fn name(&self) -> &str {
            "Fake"
        }

        fn current_user(&self) -> Option<UserModel> {
            self.user.lock().unwrap().clone()
        }

        fn set_current_user(&self, user: Option<UserModel>) {
            *self.user.lock().unwrap() = user;
        }
    }

    fn user(id: &str) -> UserModel {
        UserModel {
            source: "fake".into(),
            identifier: id.into(),
            name: id.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_auth_as_restores_previous_user() {
        let provider: Arc<dyn Provider> = Arc::new(UserProvider {
            user: Mutex::new(Some(user("alice"))),
        });
        {
            let _guard = auth_as(&provider, user("bob"));
            assert_eq!(provider.current_user().unwrap().identifier, "bob");
        }
        assert_eq!(provider.current_user().unwrap().identifier, "alice");
    }

    #[tokio::test]
    async fn test_missing_capability_is_not_supported() {
        let provider = UserProvider {
            user: Mutex::new(None),
        };
        assert!(provider.flags(ModelType::Song).is_empty());
        let err = provider.song_get("1").await.unwrap_err();
        assert!(matches!(err, FuoError::NotSupported(_)));
    }

    #[test]
    fn test_search_type_parsing() {
        assert_eq!("so".parse::<SearchType>().unwrap(), SearchType::Song);
        assert_eq!("AL".parse::<SearchType>().unwrap(), SearchType::Album);
        assert_eq!(SearchType::Video.to_string(), "vi");
        assert!("xx".parse::<SearchType>().is_err());
    }
}
