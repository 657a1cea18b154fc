//! 曲库模块
//!
//! [`Library`] 是所有提供商的注册表，负责跨提供商的搜索、备用歌曲的查找、
//! 媒体的准备以及模型的按需获取。单个提供商的故障只会被记录，不会中断
//! 整个搜索。

use std::any::Any;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use dashmap::DashMap;
use futures::{
    StreamExt,
    future::{self, BoxFuture},
    stream::{self, BoxStream, FuturesUnordered},
};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::{
    config::Config,
    error::{FuoError, Result},
    media::{Media, MediaType, select_media},
    model::{
        AlbumModel, ArtistModel, BriefSongModel, LyricModel, Model, ModelExistence, ModelStage,
        ModelType, PlaylistModel, SongModel, UserModel, VideoModel, lyric::Lyric, uri,
    },
    providers::{Provider, ProviderFlags, SearchResult, SearchType},
    signal::Signal,
};

pub mod matcher;

/// 每个提供商最多取多少个备用候选。
const STANDBY_CANDIDATES_PER_PROVIDER: usize = 2;

/// 可以由提供商按 ID 获取的完整模型。
pub trait Fetch: Model {
    /// 从提供商处获取完整模型。
    fn fetch<'a>(provider: &'a dyn Provider, identifier: &'a str)
    -> BoxFuture<'a, Result<Option<Self>>>;
}

macro_rules! impl_fetch {
    ($($ty:ty => $method:ident),* $(,)?) => {
        $(
            impl Fetch for $ty {
                fn fetch<'a>(
                    provider: &'a dyn Provider,
                    identifier: &'a str,
                ) -> BoxFuture<'a, Result<Option<Self>>> {
                    provider.$method(identifier)
                }
            }
        )*
    };
}

impl_fetch!(
    SongModel => song_get,
    AlbumModel => album_get,
    ArtistModel => artist_get,
    PlaylistModel => playlist_get,
    UserModel => user_get,
    VideoModel => video_get,
);

/// 由 URI 获取到的完整模型。
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FullModel {
    /// 歌曲
    Song(SongModel),
    /// 专辑
    Album(AlbumModel),
    /// 歌手
    Artist(ArtistModel),
    /// 歌单
    Playlist(PlaylistModel),
    /// 用户
    User(UserModel),
    /// 视频
    Video(VideoModel),
}

/// 提供商注册表与跨提供商操作。
pub struct Library {
    providers: RwLock<Vec<Arc<dyn Provider>>>,
    model_cache: DashMap<String, Arc<dyn Any + Send + Sync>>,
    audio_select_policy: String,
    video_select_policy: String,
    search_timeout: Option<Duration>,
    standby_limit: usize,
    /// 注册了新的提供商
    pub provider_added: Signal<Arc<dyn Provider>>,
    /// 移除了一个提供商
    pub provider_removed: Signal<Arc<dyn Provider>>,
}

impl Default for Library {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library")
            .field(
                "providers",
                &self.list().iter().map(|p| p.identifier().to_string()).collect::<Vec<_>>(),
            )
            .field("audio_select_policy", &self.audio_select_policy)
            .field("video_select_policy", &self.video_select_policy)
            .finish()
    }
}

impl Library {
    /// 使用默认配置创建一个空的曲库。
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用给定的配置创建一个空的曲库。
    pub fn from_config(config: &Config) -> Self {
        Self {
            providers: RwLock::new(Vec::new()),
            model_cache: DashMap::new(),
            audio_select_policy: config.audio_select_policy.clone(),
            video_select_policy: config.video_select_policy.clone(),
            search_timeout: config.search_timeout(),
            standby_limit: config.standby_limit.max(1),
            provider_added: Signal::new("provider_added"),
            provider_removed: Signal::new("provider_removed"),
        }
    }

    /// 默认的音质排序策略。
    pub fn audio_select_policy(&self) -> &str {
        &self.audio_select_policy
    }

    /// 默认的画质排序策略。
    pub fn video_select_policy(&self) -> &str {
        &self.video_select_policy
    }

    fn read_providers(&self) -> std::sync::RwLockReadGuard<'_, Vec<Arc<dyn Provider>>> {
        self.providers
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// 注册一个提供商。
    ///
    /// # 返回
    /// 标识重复时返回 `FuoError::AlreadyExists`。
    pub fn register(&self, provider: Arc<dyn Provider>) -> Result<()> {
        {
            let mut providers = self
                .providers
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if providers
                .iter()
                .any(|p| p.identifier() == provider.identifier())
            {
                return Err(FuoError::AlreadyExists(format!(
                    "提供商 '{}'",
                    provider.identifier()
                )));
            }
            providers.push(Arc::clone(&provider));
        }
        info!("已注册提供商 '{}' ({})", provider.identifier(), provider.name());
        self.provider_added.emit(provider);
        Ok(())
    }

    /// 移除一个提供商。
    ///
    /// # 返回
    /// 没有该提供商时返回 `FuoError::NotFound`。
    pub fn deregister(&self, identifier: &str) -> Result<Arc<dyn Provider>> {
        let removed = {
            let mut providers = self
                .providers
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            let index = providers
                .iter()
                .position(|p| p.identifier() == identifier)
                .ok_or_else(|| FuoError::NotFound(format!("提供商 '{identifier}'")))?;
            providers.remove(index)
        };
        self.model_cache
            .retain(|uri, _| !uri.starts_with(&format!("{}{identifier}/", uri::SCHEME)));
        info!("已移除提供商 '{identifier}'");
        self.provider_removed.emit(Arc::clone(&removed));
        Ok(removed)
    }

    /// 按标识查找提供商。
    pub fn get(&self, identifier: &str) -> Option<Arc<dyn Provider>> {
        self.read_providers()
            .iter()
            .find(|p| p.identifier() == identifier)
            .cloned()
    }

    /// 按注册顺序列出所有提供商。
    pub fn list(&self) -> Vec<Arc<dyn Provider>> {
        self.read_providers().clone()
    }

    fn get_or_err(&self, identifier: &str) -> Result<Arc<dyn Provider>> {
        self.get(identifier)
            .ok_or_else(|| FuoError::ResolveFailed(format!("没有标识为 '{identifier}' 的提供商")))
    }

    fn filter_providers(&self, source_in: Option<&[String]>) -> Vec<Arc<dyn Provider>> {
        self.list()
            .into_iter()
            .filter(|p| source_in.is_none_or(|s| s.iter().any(|id| id == p.identifier())))
            .collect()
    }

    fn search_tasks(
        &self,
        keyword: &str,
        type_in: &[SearchType],
        source_in: Option<&[String]>,
    ) -> Vec<BoxFuture<'static, Option<SearchResult>>> {
        let types: Vec<SearchType> = if type_in.is_empty() {
            vec![SearchType::Song]
        } else {
            type_in.to_vec()
        };
        let mut tasks = Vec::new();
        for provider in self.filter_providers(source_in) {
            for search_type in &types {
                tasks.push(search_one(
                    Arc::clone(&provider),
                    keyword.to_string(),
                    *search_type,
                ));
            }
        }
        tasks
    }

    ///
    /// 按注册顺序依次在各个提供商中搜索。
    ///
    /// # 参数
    /// * `keyword` - 搜索关键词。
    /// * `type_in` - 搜索的类型，为空时只搜索歌曲。
    /// * `source_in` - 只在这些提供商中搜索，`None` 表示全部。
    ///
    /// # 返回
    /// 每个提供商、每种类型的结果组成的流，出错或没有结果的提供商会被跳过。
    ///
    pub fn search(
        &self,
        keyword: &str,
        type_in: &[SearchType],
        source_in: Option<&[String]>,
    ) -> BoxStream<'static, SearchResult> {
        let tasks = self.search_tasks(keyword, type_in, source_in);
        stream::iter(tasks)
            .then(|task| task)
            .filter_map(future::ready)
            .boxed()
    }

    ///
    /// 在各个提供商中并发搜索，按完成的顺序产出结果。
    ///
    /// 超过配置的总超时后，尚未完成的搜索会被丢弃。
    ///
    pub fn a_search(
        &self,
        keyword: &str,
        type_in: &[SearchType],
        source_in: Option<&[String]>,
    ) -> BoxStream<'static, SearchResult> {
        self.a_search_with_timeout(keyword, type_in, source_in, self.search_timeout)
    }

    /// 与 [`Library::a_search`] 相同，但使用指定的超时。
    pub fn a_search_with_timeout(
        &self,
        keyword: &str,
        type_in: &[SearchType],
        source_in: Option<&[String]>,
        timeout: Option<Duration>,
    ) -> BoxStream<'static, SearchResult> {
        let tasks: FuturesUnordered<_> = self
            .search_tasks(keyword, type_in, source_in)
            .into_iter()
            .collect();
        info!("开始并发搜索 '{keyword}'，共 {} 个任务", tasks.len());

        let results = tasks.filter_map(future::ready);
        match timeout {
            Some(timeout) => results
                .take_until(tokio::time::sleep(timeout))
                .boxed(),
            None => results.boxed(),
        }
    }

    /// 在除原提供商之外的提供商中搜索候选，并按相似度排序。
    async fn standby_candidates(&self, song: &SongModel, concurrent: bool) -> Vec<BriefSongModel> {
        let providers: Vec<String> = self
            .list()
            .into_iter()
            .filter(|p| p.identifier() != song.source)
            .filter(|p| p.check_flags(ModelType::Song, ProviderFlags::SEARCH))
            .map(|p| p.identifier().to_string())
            .collect();
        if providers.is_empty() {
            return Vec::new();
        }

        let artists_name = song.artists_name();
        let origin_repr = format!("{} {artists_name}", song.title);
        let keyword = origin_repr.trim();

        let mut results: Vec<SearchResult> = if concurrent {
            self.a_search(keyword, &[SearchType::Song], Some(providers.as_slice()))
                .collect()
                .await
        } else {
            self.search(keyword, &[SearchType::Song], Some(providers.as_slice()))
                .collect()
                .await
        };
        // 并发搜索的结果按完成顺序到达，恢复成注册顺序以便平分时按提供商顺序排列
        results.sort_by_key(|r| providers.iter().position(|p| *p == r.source));

        let mut candidates: Vec<(i64, BriefSongModel)> = results
            .into_iter()
            .flat_map(|r| r.songs.into_iter().take(STANDBY_CANDIDATES_PER_PROVIDER))
            .map(|c| (matcher::score(&song.title, keyword, &c), c))
            .collect();
        candidates.sort_by(|a, b| b.0.cmp(&a.0));

        debug!(
            "歌曲 '{}' 的备用候选: {:?}",
            song.title,
            candidates
                .iter()
                .map(|(s, c)| format!("{}:{}({s})", c.source, c.title))
                .collect::<Vec<_>>()
        );
        candidates.into_iter().map(|(_, c)| c).collect()
    }

    async fn probe_standby(
        &self,
        candidates: Vec<BriefSongModel>,
        onlyone: bool,
        policy: &str,
    ) -> Vec<(SongModel, Media)> {
        let limit = if onlyone { 1 } else { self.standby_limit };
        let mut standbys = Vec::new();
        for candidate in candidates {
            let standby = SongModel::from_brief(candidate);
            match self.song_prepare_media(&standby, policy).await {
                Ok(Some(media)) => {
                    info!("找到可播放的备用歌曲: {}", standby.to_line());
                    standbys.push((standby, media));
                    if standbys.len() >= limit {
                        break;
                    }
                }
                Ok(None) => debug!("备用候选 {} 没有可用的媒体", standby.uri()),
                Err(e) => warn!("探测备用候选 {} 失败: {e}", standby.uri()),
            }
        }
        standbys
    }

    /// 依次搜索其它提供商，返回可播放的备用歌曲。
    #[instrument(skip(self, song), fields(song = %song.uri()))]
    pub async fn list_song_standby(&self, song: &SongModel, onlyone: bool) -> Vec<SongModel> {
        let candidates = self.standby_candidates(song, false).await;
        self.probe_standby(candidates, onlyone, &self.audio_select_policy)
            .await
            .into_iter()
            .map(|(s, _)| s)
            .collect()
    }

    /// 并发搜索其它提供商，返回可播放的备用歌曲。
    pub async fn a_list_song_standby(&self, song: &SongModel, onlyone: bool) -> Vec<SongModel> {
        self.a_list_song_standby_with_media(song, onlyone, &self.audio_select_policy)
            .await
            .into_iter()
            .map(|(s, _)| s)
            .collect()
    }

    /// 并发搜索其它提供商，返回可播放的备用歌曲以及已经准备好的媒体。
    #[instrument(skip(self, song), fields(song = %song.uri()))]
    pub async fn a_list_song_standby_with_media(
        &self,
        song: &SongModel,
        onlyone: bool,
        policy: &str,
    ) -> Vec<(SongModel, Media)> {
        let candidates = self.standby_candidates(song, true).await;
        self.probe_standby(candidates, onlyone, policy).await
    }

    ///
    /// 为歌曲准备可播放的媒体。
    ///
    /// 支持多音质的提供商按 `policy` 选择音质，否则使用歌曲的 `url`。
    ///
    /// # 返回
    /// 没有可用的媒体时返回 `Ok(None)`。
    ///
    pub async fn song_prepare_media(&self, song: &SongModel, policy: &str) -> Result<Option<Media>> {
        let provider = self.get_or_err(&song.source)?;
        if provider.check_flags(ModelType::Song, ProviderFlags::MULTI_QUALITY) {
            let qualities = provider.song_list_quality(song).await?;
            let provider: &dyn Provider = provider.as_ref();
            let (media, _) =
                select_media(&qualities, policy, |q| provider.song_get_media(song, q)).await?;
            return Ok(media);
        }

        let mut song = song.clone();
        if song.url.is_empty() {
            self.ensure_gotten(&mut song).await?;
        }
        Ok((!song.url.is_empty()).then(|| Media::from_url(song.url)))
    }

    /// 按 `policy` 为视频选择画质并准备媒体，没有可用的画质时返回 `Ok(None)`。
    pub async fn video_prepare_media(
        &self,
        video: &VideoModel,
        policy: &str,
    ) -> Result<Option<Media>> {
        let provider = self.get_or_err(&video.source)?;
        let qualities = provider.video_list_quality(video).await?;
        let provider: &dyn Provider = provider.as_ref();
        let (media, quality) =
            select_media(&qualities, policy, |q| provider.video_get_media(video, q)).await?;
        if let Some(quality) = quality {
            debug!("视频 {} 使用画质 {quality}", video.identifier);
        }
        Ok(media.map(|mut media| {
            media.kind = MediaType::Video;
            media
        }))
    }

    ///
    /// 确保模型已经获取了完整的字段。
    ///
    /// 已经是 `Gotten` 阶段或者确认不存在的模型会直接返回；同一个 URI 的完整
    /// 模型会被缓存，不会重复请求提供商。
    ///
    pub async fn ensure_gotten<M: Fetch>(&self, model: &mut M) -> Result<()> {
        if model.stage() == ModelStage::Gotten || model.exists() == ModelExistence::No {
            return Ok(());
        }

        let uri = model.uri();
        let cached = self
            .model_cache
            .get(&uri)
            .and_then(|entry| entry.value().downcast_ref::<M>().cloned());
        if let Some(full) = cached {
            debug!("模型 {uri} 命中缓存");
            model.upgrade_from(full);
            return Ok(());
        }

        let provider = self.get_or_err(model.source())?;
        match M::fetch(provider.as_ref(), model.identifier()).await? {
            Some(full) => {
                debug!("已获取模型 {uri}");
                self.model_cache.insert(uri, Arc::new(full.clone()));
                model.upgrade_from(full);
            }
            None => {
                debug!("模型 {uri} 不存在");
                model.set_exists(ModelExistence::No);
            }
        }
        Ok(())
    }

    /// 确保歌曲已经获取了完整的字段。
    pub async fn ensure_song_gotten(&self, song: &mut SongModel) -> Result<()> {
        self.ensure_gotten(song).await
    }

    async fn get_full<M: Fetch + Default>(&self, source: &str, identifier: &str) -> Result<M>
    where
        M: SetIdentity,
    {
        let mut model = M::default();
        model.set_identity(source, identifier);
        self.ensure_gotten(&mut model).await?;
        if model.exists() == ModelExistence::No {
            return Err(FuoError::ResolveFailed(format!("{} 不存在", model.uri())));
        }
        Ok(model)
    }

    /// 由 URI 获取完整模型。
    pub async fn model_get(&self, uri_str: &str) -> Result<FullModel> {
        let uri = uri::resolve(uri_str)?;
        let (p, id) = (uri.provider.as_str(), uri.identifier.as_str());
        Ok(match uri.model_type {
            ModelType::Song => FullModel::Song(self.get_full(p, id).await?),
            ModelType::Album => FullModel::Album(self.get_full(p, id).await?),
            ModelType::Artist => FullModel::Artist(self.get_full(p, id).await?),
            ModelType::Playlist => FullModel::Playlist(self.get_full(p, id).await?),
            ModelType::User => FullModel::User(self.get_full(p, id).await?),
            ModelType::Video => FullModel::Video(self.get_full(p, id).await?),
            ModelType::Lyric => {
                return Err(FuoError::NotSupported(format!("无法直接获取歌词 {uri_str}")));
            }
        })
    }

    /// 获取歌曲的歌词模型。
    pub async fn song_get_lyric(&self, song: &SongModel) -> Result<Option<LyricModel>> {
        let provider = self.get_or_err(&song.source)?;
        provider.song_get_lyric(song).await
    }

    /// 获取并解析歌曲的歌词，翻译会合并到每一句的后面。
    pub async fn song_get_parsed_lyric(&self, song: &SongModel) -> Result<Option<Lyric>> {
        let Some(model) = self.song_get_lyric(song).await? else {
            return Ok(None);
        };
        let mut lyric = Lyric::parse(&model.content);
        if !model.trans_content.is_empty() {
            lyric.merge_translation(&Lyric::parse(&model.trans_content));
        }
        Ok((!lyric.is_empty()).then_some(lyric))
    }

    /// 获取歌曲的 MV。
    pub async fn song_get_mv(&self, song: &SongModel) -> Result<Option<VideoModel>> {
        let provider = self.get_or_err(&song.source)?;
        provider.song_get_mv(song).await
    }

    /// 读取歌单的全部歌曲。
    pub async fn playlist_list_songs(&self, playlist: &PlaylistModel) -> Result<Vec<BriefSongModel>> {
        let provider = self.get_or_err(&playlist.source)?;
        provider.playlist_create_songs_rd(playlist).await?.readall().await
    }

    /// 读取专辑的全部歌曲。
    pub async fn album_list_songs(&self, album: &AlbumModel) -> Result<Vec<BriefSongModel>> {
        let provider = self.get_or_err(&album.source)?;
        provider.album_create_songs_rd(album).await?.readall().await
    }

    /// 读取歌手的歌曲。
    pub async fn artist_list_songs(&self, artist: &ArtistModel) -> Result<Vec<BriefSongModel>> {
        let provider = self.get_or_err(&artist.source)?;
        provider.artist_create_songs_rd(artist).await?.readall().await
    }

    /// 读取歌手的专辑。
    pub async fn artist_list_albums(
        &self,
        artist: &ArtistModel,
    ) -> Result<Vec<crate::model::BriefAlbumModel>> {
        let provider = self.get_or_err(&artist.source)?;
        provider.artist_create_albums_rd(artist).await?.readall().await
    }
}

/// 设置完整模型的 `(source, identifier)`，用于从 URI 构造占位模型。
pub trait SetIdentity {
    /// 设置标识。
    fn set_identity(&mut self, source: &str, identifier: &str);
}

macro_rules! impl_set_identity {
    ($($ty:ty),*) => {
        $(
            impl SetIdentity for $ty {
                fn set_identity(&mut self, source: &str, identifier: &str) {
                    self.source = source.to_string();
                    self.identifier = identifier.to_string();
                    self.stage = ModelStage::Display;
                }
            }
        )*
    };
}

impl_set_identity!(SongModel, AlbumModel, ArtistModel, PlaylistModel, UserModel, VideoModel);

/// 在单个提供商中搜索，失败只记录日志。
fn search_one(
    provider: Arc<dyn Provider>,
    keyword: String,
    search_type: SearchType,
) -> BoxFuture<'static, Option<SearchResult>> {
    Box::pin(async move {
        if !provider.check_flags(search_type.model_type(), ProviderFlags::SEARCH) {
            debug!(
                "提供商 '{}' 不支持搜索 {search_type}，跳过",
                provider.identifier()
            );
            return None;
        }
        let mut outcome = provider.search(&keyword, search_type).await;
        if let Err(e) = &outcome
            && e.is_retriable()
        {
            debug!("提供商 '{}' 的搜索失败: {e}，重试一次", provider.identifier());
            outcome = provider.search(&keyword, search_type).await;
        }
        match outcome {
            Ok(Some(mut result)) => {
                if result.source.is_empty() {
                    result.source = provider.identifier().to_string();
                }
                result.search_type.get_or_insert(search_type);
                info!(
                    "提供商 '{}' 搜索 '{keyword}' 返回 {} 首歌曲",
                    provider.identifier(),
                    result.songs.len()
                );
                Some(result)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(
                    "提供商 '{}' 的搜索失败: {}. 将忽略此提供商的结果。",
                    provider.identifier(),
                    e
                );
                None
            }
        }
    })
}
