//! 命令的分发与处理。

use std::collections::HashMap;
use std::sync::Arc;

use futures::{StreamExt, future::BoxFuture};
use tracing::{debug, info, warn};

use crate::{
    config::Config,
    error::{FuoError, Result},
    library::{FullModel, Library, matcher},
    model::{BriefModel, Model, ModelType, SongModel, collection::Collection, uri},
    player::{Player, State},
    playlist::PlaybackMode,
    protocol::{
        Output, Request, Router, StatusInfo, Value, frame, parse, render,
        serializers::ProviderInfo,
    },
    providers::{SearchResult, SearchType},
};

/// `play` 一次最多返回的候选数量。
const PLAY_ALTERNATIVES: usize = 4;

const HELP_TEXT: &str = "\
play <furi|url|关键词>      播放资源、URL 或搜索结果中最匹配的歌曲
pause / resume / toggle    暂停 / 恢复 / 切换
stop                       停止
next / previous            下一首 / 上一首
add <furi>...              添加歌曲，或歌单、专辑中的全部歌曲
remove <furi>...           从播放列表移除歌曲
clear                      清空播放列表
list                       列出播放列表
status                     播放器状态
search <关键词> [type=so,al,ar,pl,vi, source=p1,p2]
show [furi]                查看资源详情，列表可以带 ?limit=<n>
show collections[/<名字>]   查看本地收藏
set [volume=<0-100>, position=<秒>, mode=<0-3|名字>]
exec <<EOF                 依次执行多条命令（需要在配置中开启）
help                       显示本帮助
quit                       断开连接

请求选项: #: format=plain|json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShowRoute {
    Root,
    Song,
    SongLyric,
    SongMv,
    Album,
    AlbumSongs,
    Artist,
    ArtistAlbums,
    ArtistSongs,
    Playlist,
    PlaylistSongs,
    User,
    Video,
    Collections,
    Collection,
}

fn show_router() -> Router<ShowRoute> {
    Router::new()
        .route("/", ShowRoute::Root)
        .route("/<provider>/songs/<id>", ShowRoute::Song)
        .route("/<provider>/songs/<id>/lyric", ShowRoute::SongLyric)
        .route("/<provider>/songs/<id>/mv", ShowRoute::SongMv)
        .route("/<provider>/albums/<id>", ShowRoute::Album)
        .route("/<provider>/albums/<id>/songs", ShowRoute::AlbumSongs)
        .route("/<provider>/artists/<id>", ShowRoute::Artist)
        .route("/<provider>/artists/<id>/albums", ShowRoute::ArtistAlbums)
        .route("/<provider>/artists/<id>/songs", ShowRoute::ArtistSongs)
        .route("/<provider>/playlists/<id>", ShowRoute::Playlist)
        .route("/<provider>/playlists/<id>/songs", ShowRoute::PlaylistSongs)
        .route("/<provider>/users/<id>", ShowRoute::User)
        .route("/<provider>/videos/<id>", ShowRoute::Video)
        .route("/collections", ShowRoute::Collections)
        .route("/collections/<name>", ShowRoute::Collection)
}

/// 读取列表类路由的 `limit` 查询参数。
fn query_limit(query: &HashMap<String, String>) -> Result<usize> {
    match query.get("limit") {
        Some(v) => v
            .parse()
            .map_err(|_| FuoError::Cmd(format!("非法的 limit: {v}"))),
        None => Ok(usize::MAX),
    }
}

fn is_raw_url(text: &str) -> bool {
    ["http://", "https://", "file://"]
        .iter()
        .any(|p| text.starts_with(p))
}

/// 命令分发器，持有执行命令所需的全部句柄。
pub struct Dispatcher {
    library: Arc<Library>,
    player: Arc<Player>,
    config: Arc<Config>,
    router: Router<ShowRoute>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("library", &self.library)
            .field("enable_exec_command", &self.config.enable_exec_command)
            .finish()
    }
}

impl Dispatcher {
    /// 创建分发器。
    pub fn new(library: Arc<Library>, player: Arc<Player>, config: Arc<Config>) -> Self {
        Self {
            library,
            player,
            config,
            router: show_router(),
        }
    }

    ///
    /// 处理请求并生成带外框的完整响应。
    ///
    /// 错误只会出现在响应中，不会返回给调用方。
    ///
    pub async fn respond(&self, request: &Request) -> String {
        let ack = format!("{} {}", request.cmd, request.args_text());
        let format = match request.format() {
            Ok(format) => format,
            Err(e) => return frame(&ack, &e.to_string(), false),
        };
        let result = self.handle(request).await;
        if let Err(e) = &result {
            warn!("命令 '{}' 执行失败: {e}", request.cmd);
        }
        frame(&ack, &render(format, &result), result.is_ok())
    }

    /// 执行一个请求。
    pub fn handle<'a>(&'a self, req: &'a Request) -> BoxFuture<'a, Result<Output>> {
        Box::pin(async move {
            debug!("执行命令: {} {}", req.cmd, req.args_text());
            let player = &self.player;
            let playlist = player.playlist();
            match req.cmd.as_str() {
                "play" => self.cmd_play(req).await,
                "pause" => {
                    player.pause();
                    Ok(Output::Empty)
                }
                "resume" => {
                    player.resume();
                    Ok(Output::Empty)
                }
                "toggle" => {
                    player.toggle();
                    Ok(Output::Empty)
                }
                "stop" => {
                    player.stop();
                    Ok(Output::Empty)
                }
                "next" => {
                    playlist.next().await;
                    Ok(Output::Empty)
                }
                "previous" => {
                    playlist.previous().await;
                    Ok(Output::Empty)
                }
                "add" => self.cmd_add(req).await,
                "remove" => self.cmd_remove(req).await,
                "clear" => {
                    playlist.clear();
                    Ok(Output::Empty)
                }
                "list" => Ok(Output::songs(playlist.list().iter().map(SongModel::brief))),
                "status" => Ok(Output::Status(self.status())),
                "search" => self.cmd_search(req).await,
                "show" => self.cmd_show(req).await,
                "set" => self.cmd_set(req),
                "exec" => self.cmd_exec(req).await,
                "help" => Ok(Output::Text(HELP_TEXT.to_string())),
                "quit" => Ok(Output::Empty),
                other => Err(FuoError::Cmd(format!("未知的命令: {other}"))),
            }
        })
    }

    fn joined_args(req: &Request) -> String {
        req.cmd_args
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// 参数中的每一行都视为一个模型行或者 URI。
    fn model_args(req: &Request) -> Result<Vec<BriefModel>> {
        req.cmd_args
            .iter()
            .flat_map(|v| {
                v.to_string()
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty() && !l.starts_with('#'))
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .map(|line| uri::parse_line(&line))
            .collect()
    }

    fn status(&self) -> StatusInfo {
        let player = &self.player;
        let mode = player.playlist().mode();
        let state = player.state();
        let has_media = state != State::Stopped && player.current_media().is_some();
        StatusInfo {
            repeat: matches!(mode, PlaybackMode::Loop | PlaybackMode::OneLoop),
            random: mode == PlaybackMode::Random,
            volume: player.volume(),
            state,
            duration: has_media.then(|| player.duration()),
            position: has_media.then(|| player.position()),
            song: player.current_song().map(|s| s.brief()),
            lyric_s: player.lyric_sentence(),
        }
    }

    async fn fetch_song(&self, uri_str: &str) -> Result<SongModel> {
        match self.library.model_get(uri_str).await? {
            FullModel::Song(song) => Ok(song),
            _ => Err(FuoError::Cmd(format!("{uri_str} 不是歌曲"))),
        }
    }

    /// 把一个资源展开为歌曲。歌单、专辑和歌手会读取它们的全部歌曲。
    async fn expand_songs(&self, model: &BriefModel) -> Result<Vec<SongModel>> {
        if let BriefModel::Song(brief) = model
            && !brief.title.is_empty()
        {
            return Ok(vec![SongModel::from_brief(brief.clone())]);
        }
        let briefs = match self.library.model_get(&model.uri()).await? {
            FullModel::Song(song) => return Ok(vec![song]),
            FullModel::Playlist(p) => self.library.playlist_list_songs(&p).await?,
            FullModel::Album(a) => self.library.album_list_songs(&a).await?,
            FullModel::Artist(a) => self.library.artist_list_songs(&a).await?,
            FullModel::User(_) | FullModel::Video(_) => {
                return Err(FuoError::Cmd(format!("无法播放或添加 {}", model.uri())));
            }
        };
        Ok(briefs.into_iter().map(SongModel::from_brief).collect())
    }

    async fn play_video(&self, model: &BriefModel) -> Result<Output> {
        let FullModel::Video(video) = self.library.model_get(&model.uri()).await? else {
            return Err(FuoError::Cmd(format!("{} 不是视频", model.uri())));
        };
        let media = self
            .library
            .video_prepare_media(&video, self.library.video_select_policy())
            .await?
            .ok_or_else(|| FuoError::Cmd(format!("视频 {} 没有可用的媒体", model.uri())))?;
        self.player.play(media, true)?;
        Ok(Output::Empty)
    }

    async fn cmd_play(&self, req: &Request) -> Result<Output> {
        let text = Self::joined_args(req);
        let text = text.trim();
        if text.is_empty() {
            return Err(FuoError::Cmd("play 需要一个参数".into()));
        }

        if text.starts_with(uri::SCHEME) {
            let model = uri::parse_line(text)?;
            if model.model_type() == ModelType::Video {
                return self.play_video(&model).await;
            }
            let songs = self.expand_songs(&model).await?;
            if songs.is_empty() {
                return Err(FuoError::Cmd(format!("{} 中没有歌曲", model.uri())));
            }
            if let [song] = songs.as_slice() {
                let song = song.clone();
                let selected = song.brief();
                self.player.play_song(song).await;
                return Ok(Output::Played {
                    selected,
                    alternatives: Vec::new(),
                });
            }
            let briefs: Vec<_> = songs.iter().map(SongModel::brief).collect();
            self.player.play_songs(songs).await;
            return Ok(Output::songs(briefs));
        }

        if is_raw_url(text) {
            self.player.play_url(text)?;
            return Ok(Output::Empty);
        }

        let results: Vec<SearchResult> = self
            .library
            .a_search(text, &[SearchType::Song], None)
            .collect()
            .await;
        let mut candidates: Vec<(i64, _)> = results
            .into_iter()
            .flat_map(|r| r.songs)
            .map(|s| (matcher::score(text, text, &s), s))
            .collect();
        candidates.sort_by(|a, b| b.0.cmp(&a.0));

        let mut candidates = candidates.into_iter().map(|(_, s)| s);
        let selected = candidates
            .next()
            .ok_or_else(|| FuoError::Cmd(format!("没有找到与 '{text}' 相关的歌曲")))?;
        let alternatives: Vec<_> = candidates.take(PLAY_ALTERNATIVES).collect();

        info!("'{text}' 的最佳匹配: {}", selected.title);
        self.player
            .play_song(SongModel::from_brief(selected.clone()))
            .await;
        Ok(Output::Played {
            selected,
            alternatives,
        })
    }

    async fn cmd_add(&self, req: &Request) -> Result<Output> {
        let models = Self::model_args(req)?;
        if models.is_empty() {
            return Err(FuoError::Cmd("add 需要至少一个资源".into()));
        }
        let mut songs = Vec::new();
        for model in &models {
            songs.extend(self.expand_songs(model).await?);
        }
        let count = self.player.playlist().add_many(songs);
        info!("向播放列表添加了 {count} 首歌曲");
        Ok(Output::Empty)
    }

    async fn cmd_remove(&self, req: &Request) -> Result<Output> {
        let models = Self::model_args(req)?;
        let playlist = self.player.playlist();
        for model in models {
            let target = model.uri();
            let found = playlist.list().into_iter().find(|s| s.uri() == target);
            match found {
                Some(song) => {
                    playlist.remove(&song).await;
                }
                None => debug!("播放列表中没有 {target}"),
            }
        }
        Ok(Output::Empty)
    }

    async fn cmd_search(&self, req: &Request) -> Result<Output> {
        let keyword = Self::joined_args(req);
        if keyword.trim().is_empty() {
            return Err(FuoError::Cmd("search 需要关键词".into()));
        }
        let types: Vec<SearchType> = match req.cmd_options.get("type") {
            Some(value) => value
                .to_str_list()
                .iter()
                .map(|t| {
                    t.parse()
                        .map_err(|_| FuoError::Cmd(format!("未知的搜索类型: {t}")))
                })
                .collect::<Result<_>>()?,
            None => vec![SearchType::Song],
        };
        let sources = req.cmd_options.get("source").map(Value::to_str_list);

        let results: Vec<SearchResult> = self
            .library
            .a_search(keyword.trim(), &types, sources.as_deref())
            .filter(|r| futures::future::ready(!r.is_empty()))
            .collect()
            .await;
        Ok(Output::SearchResults(results))
    }

    async fn cmd_show(&self, req: &Request) -> Result<Output> {
        let arg = Self::joined_args(req);
        let path = format!("/{}", arg.trim().trim_start_matches(uri::SCHEME));
        let matched = self.router.dispatch(&path)?;
        let route = *matched.handler;
        let provider = matched.param("provider");
        let id = matched.param("id");
        let limit = query_limit(&matched.query)?;
        let uri_of = |t: ModelType| uri::reverse(provider, t, id);

        let model = |m: FullModel| Output::Model(Box::new(m));
        match route {
            ShowRoute::Root => Ok(Output::Providers(
                self.library
                    .list()
                    .iter()
                    .map(|p| ProviderInfo {
                        identifier: p.identifier().to_string(),
                        name: p.name().to_string(),
                    })
                    .collect(),
            )),
            ShowRoute::Song
            | ShowRoute::Album
            | ShowRoute::Artist
            | ShowRoute::Playlist
            | ShowRoute::User
            | ShowRoute::Video => {
                let t = match route {
                    ShowRoute::Song => ModelType::Song,
                    ShowRoute::Album => ModelType::Album,
                    ShowRoute::Artist => ModelType::Artist,
                    ShowRoute::Playlist => ModelType::Playlist,
                    ShowRoute::User => ModelType::User,
                    _ => ModelType::Video,
                };
                Ok(model(self.library.model_get(&uri_of(t)).await?))
            }
            ShowRoute::SongLyric => {
                let song = self.fetch_song(&uri_of(ModelType::Song)).await?;
                match self.library.song_get_lyric(&song).await? {
                    Some(lyric) => Ok(Output::Text(lyric.content)),
                    None => Err(FuoError::Cmd(format!("{} 没有歌词", song.uri()))),
                }
            }
            ShowRoute::SongMv => {
                let song = self.fetch_song(&uri_of(ModelType::Song)).await?;
                match self.library.song_get_mv(&song).await? {
                    Some(mv) => Ok(model(FullModel::Video(mv))),
                    None => Err(FuoError::Cmd(format!("{} 没有 MV", song.uri()))),
                }
            }
            ShowRoute::AlbumSongs | ShowRoute::PlaylistSongs | ShowRoute::ArtistSongs => {
                let t = match route {
                    ShowRoute::AlbumSongs => ModelType::Album,
                    ShowRoute::PlaylistSongs => ModelType::Playlist,
                    _ => ModelType::Artist,
                };
                let songs = self
                    .expand_songs(&BriefModel::new(provider, t, id))
                    .await?;
                Ok(Output::songs(songs.iter().take(limit).map(SongModel::brief)))
            }
            ShowRoute::ArtistAlbums => {
                let FullModel::Artist(artist) =
                    self.library.model_get(&uri_of(ModelType::Artist)).await?
                else {
                    return Err(FuoError::Internal("资源类型不一致".into()));
                };
                let albums = self.library.artist_list_albums(&artist).await?;
                Ok(Output::Models(
                    albums.into_iter().take(limit).map(BriefModel::Album).collect(),
                ))
            }
            ShowRoute::Collections => {
                let collections = self.collections()?;
                Ok(Output::Text(
                    collections
                        .iter()
                        .take(limit)
                        .map(|c| format!("{}\t# {} ({})", c.stem(), c.name, c.models.len()))
                        .collect::<Vec<_>>()
                        .join("\n"),
                ))
            }
            ShowRoute::Collection => {
                let name = matched.param("name");
                let collection = self
                    .collections()?
                    .into_iter()
                    .find(|c| c.stem() == name)
                    .ok_or_else(|| FuoError::NotFound(format!("没有名为 {name} 的收藏")))?;
                Ok(Output::Models(
                    collection.models.into_iter().take(limit).collect(),
                ))
            }
        }
    }

    /// 每次都从磁盘重新加载，收藏文件可能被其它程序修改。
    fn collections(&self) -> Result<Vec<Collection>> {
        match &self.config.collections_dir {
            Some(dir) => Collection::load_dir(dir),
            None => Ok(Vec::new()),
        }
    }

    fn cmd_set(&self, req: &Request) -> Result<Output> {
        if req.cmd_options.is_empty() {
            return Err(FuoError::Cmd("set 需要至少一个选项".into()));
        }
        for (key, value) in &req.cmd_options {
            match key.as_str() {
                "volume" => {
                    let volume = value
                        .as_f64()
                        .ok_or_else(|| FuoError::Cmd(format!("非法的音量: {value}")))?;
                    self.player.set_volume(volume.round() as i64);
                }
                "position" => {
                    let position = value
                        .as_f64()
                        .ok_or_else(|| FuoError::Cmd(format!("非法的进度: {value}")))?;
                    self.player.set_position(position);
                }
                "mode" => {
                    let mode = match value {
                        Value::Int(i) => u8::try_from(*i)
                            .ok()
                            .and_then(|i| PlaybackMode::try_from(i).ok()),
                        other => other.to_string().parse().ok(),
                    }
                    .ok_or_else(|| FuoError::Cmd(format!("非法的播放模式: {value}")))?;
                    self.player.playlist().set_mode(mode);
                }
                other => return Err(FuoError::Cmd(format!("未知的选项: {other}"))),
            }
        }
        Ok(Output::Empty)
    }

    async fn cmd_exec(&self, req: &Request) -> Result<Output> {
        if !self.config.enable_exec_command {
            return Err(FuoError::Cmd(
                "exec 命令未启用，请在配置中设置 enable_exec_command".into(),
            ));
        }
        let script = req
            .cmd_args
            .last()
            .map(ToString::to_string)
            .unwrap_or_default();

        let mut outputs = Vec::new();
        for (lineno, line) in script.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let request =
                parse(line).map_err(|e| FuoError::Cmd(format!("第 {} 行: {e}", lineno + 1)))?;
            if request.has_heredoc() {
                return Err(FuoError::Cmd(format!(
                    "第 {} 行: exec 中不支持 heredoc",
                    lineno + 1
                )));
            }
            let output = self
                .handle(&request)
                .await
                .map_err(|e| FuoError::Cmd(format!("第 {} 行: {e}", lineno + 1)))?;
            outputs.push(output);
        }
        Ok(Output::Many(outputs))
    }
}
