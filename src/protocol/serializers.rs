//! 响应的序列化。
//!
//! 命令处理器返回 [`Output`]，再由请求的 `format` 选项决定输出为纯文本
//! 还是 JSON，最后用 [`frame`] 加上 `ACK ... OK` 或 `Oops` 的外框。

use serde::Serialize;
use serde_json::json;

use super::parser::Format;
use crate::{
    error::FuoError,
    library::FullModel,
    model::{
        AlbumModel, ArtistModel, BriefModel, BriefSongModel, Model, PlaylistModel, SongModel,
        UserModel, VideoModel,
        uri::{format_duration, model_to_line},
    },
    player::State,
    providers::SearchResult,
};

/// `status` 命令的结果。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusInfo {
    /// 是否循环（列表循环或单曲循环）
    pub repeat: bool,
    /// 是否随机播放
    pub random: bool,
    /// 音量
    pub volume: u8,
    /// 播放状态
    pub state: State,
    /// 时长（秒）
    pub duration: Option<f64>,
    /// 进度（秒）
    pub position: Option<f64>,
    /// 当前歌曲
    pub song: Option<BriefSongModel>,
    /// 当前歌词
    #[serde(rename = "lyric-s")]
    pub lyric_s: Option<String>,
}

/// 提供商的简要信息。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderInfo {
    /// 标识
    pub identifier: String,
    /// 名字
    pub name: String,
}

/// 命令处理器的输出。
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Output {
    /// 没有内容
    Empty,
    /// 原样输出的文本
    Text(String),
    /// 一组模型，每个一行
    Models(Vec<BriefModel>),
    /// 一个完整模型的详情
    Model(Box<FullModel>),
    /// 状态
    Status(StatusInfo),
    /// 搜索结果
    SearchResults(Vec<SearchResult>),
    /// 已注册的提供商
    Providers(Vec<ProviderInfo>),
    /// `play` 选中的歌曲和其它候选
    Played {
        /// 选中的歌曲
        selected: BriefSongModel,
        /// 其它候选
        alternatives: Vec<BriefSongModel>,
    },
    /// 多个命令的输出，用于 `exec`
    Many(Vec<Output>),
}

impl Output {
    /// 由一组歌曲构造输出。
    pub fn songs(songs: impl IntoIterator<Item = BriefSongModel>) -> Self {
        Output::Models(songs.into_iter().map(BriefModel::Song).collect())
    }

    /// 按纯文本格式输出。
    pub fn to_plain(&self) -> String {
        match self {
            Output::Empty => String::new(),
            Output::Text(text) => text.clone(),
            Output::Models(models) => lines(models.iter().map(model_to_line)),
            Output::Model(model) => render_full_model(model),
            Output::Status(status) => render_status(status),
            Output::SearchResults(results) => lines(
                results
                    .iter()
                    .flat_map(result_models)
                    .map(|m| model_to_line(&m)),
            ),
            Output::Providers(providers) => lines(
                providers
                    .iter()
                    .map(|p| format!("fuo://{}\t# {}", p.identifier, p.name)),
            ),
            Output::Played {
                selected,
                alternatives,
            } => {
                let mut detail = Detail::default();
                detail.field("playing", model_to_line(&BriefModel::Song(selected.clone())));
                detail.list(
                    "alternatives",
                    alternatives
                        .iter()
                        .map(|s| model_to_line(&BriefModel::Song(s.clone()))),
                );
                detail.finish()
            }
            Output::Many(outputs) => lines(
                outputs
                    .iter()
                    .map(Output::to_plain)
                    .filter(|s| !s.is_empty()),
            ),
        }
    }
}

fn lines(iter: impl Iterator<Item = String>) -> String {
    iter.collect::<Vec<_>>().join("\n")
}

fn result_models(result: &SearchResult) -> Vec<BriefModel> {
    result
        .songs
        .iter()
        .cloned()
        .map(BriefModel::Song)
        .chain(result.albums.iter().cloned().map(BriefModel::Album))
        .chain(result.artists.iter().cloned().map(BriefModel::Artist))
        .chain(result.playlists.iter().cloned().map(BriefModel::Playlist))
        .chain(result.videos.iter().cloned().map(BriefModel::Video))
        .collect()
}

/// `key: value` 形式的详情，空值会被跳过。
#[derive(Default)]
struct Detail {
    lines: Vec<String>,
}

impl Detail {
    fn field(&mut self, key: &str, value: impl AsRef<str>) -> &mut Self {
        let value = value.as_ref();
        if !value.is_empty() {
            self.lines.push(format!("{key}: {value}"));
        }
        self
    }

    fn list(&mut self, key: &str, items: impl Iterator<Item = String>) -> &mut Self {
        let items: Vec<String> = items.collect();
        if !items.is_empty() {
            self.lines.push(format!("{key}::"));
            self.lines.extend(items.into_iter().map(|i| format!("\t{i}")));
        }
        self
    }

    fn finish(&mut self) -> String {
        self.lines.join("\n")
    }
}

fn duration_text(ms: u64) -> String {
    if ms > 0 {
        format_duration(ms)
    } else {
        String::new()
    }
}

fn render_song(song: &SongModel) -> String {
    let mut d = Detail::default();
    d.field("provider", &song.source)
        .field("uri", song.uri())
        .field("title", &song.title)
        .field("artists", song.artists_name())
        .field("album", song.album_name())
        .field("duration", duration_text(song.duration_ms))
        .field("url", &song.url);
    if let Some(mv) = &song.mv {
        d.field("mv", model_to_line(&BriefModel::Video(mv.clone())));
    }
    d.finish()
}

fn render_album(album: &AlbumModel) -> String {
    Detail::default()
        .field("provider", &album.source)
        .field("uri", album.uri())
        .field("name", &album.name)
        .field("type", album.type_.to_string())
        .field("artists", album.artists_name())
        .field("released", &album.released)
        .field("description", &album.description)
        .list(
            "songs",
            album
                .songs
                .iter()
                .map(|s| model_to_line(&BriefModel::Song(s.clone()))),
        )
        .finish()
}

fn render_artist(artist: &ArtistModel) -> String {
    Detail::default()
        .field("provider", &artist.source)
        .field("uri", artist.uri())
        .field("name", &artist.name)
        .field("aliases", artist.aliases.join(","))
        .field("description", &artist.description)
        .list(
            "songs",
            artist
                .hot_songs
                .iter()
                .map(|s| model_to_line(&BriefModel::Song(s.clone()))),
        )
        .finish()
}

fn render_playlist(playlist: &PlaylistModel) -> String {
    Detail::default()
        .field("provider", &playlist.source)
        .field("uri", playlist.uri())
        .field("name", &playlist.name)
        .field(
            "creator",
            playlist.creator.as_ref().map_or("", |c| c.name.as_str()),
        )
        .field("description", &playlist.description)
        .finish()
}

fn render_user(user: &UserModel) -> String {
    Detail::default()
        .field("provider", &user.source)
        .field("uri", user.uri())
        .field("name", &user.name)
        .finish()
}

fn render_video(video: &VideoModel) -> String {
    let brief = video.brief();
    Detail::default()
        .field("provider", &video.source)
        .field("uri", video.uri())
        .field("title", &video.title)
        .field("artists", &brief.artists_name)
        .field("duration", duration_text(video.duration_ms))
        .finish()
}

fn render_full_model(model: &FullModel) -> String {
    match model {
        FullModel::Song(s) => render_song(s),
        FullModel::Album(a) => render_album(a),
        FullModel::Artist(a) => render_artist(a),
        FullModel::Playlist(p) => render_playlist(p),
        FullModel::User(u) => render_user(u),
        FullModel::Video(v) => render_video(v),
    }
}

fn render_status(status: &StatusInfo) -> String {
    let mut d = Detail::default();
    d.field("repeat", u8::from(status.repeat).to_string())
        .field("random", u8::from(status.random).to_string())
        .field("volume", status.volume.to_string())
        .field("state", status.state.to_string());
    if let Some(duration) = status.duration {
        d.field("duration", format!("{duration:.2}"));
    }
    if let Some(position) = status.position {
        d.field("position", format!("{position:.2}"));
    }
    if let Some(song) = &status.song {
        d.field("song", model_to_line(&BriefModel::Song(song.clone())));
    }
    if let Some(lyric) = &status.lyric_s {
        d.field("lyric-s", lyric);
    }
    d.finish()
}

fn error_status(err: &FuoError) -> &'static str {
    match err {
        FuoError::Cmd(_)
        | FuoError::NotFound(_)
        | FuoError::Syntax { .. }
        | FuoError::ResolveFailed(_)
        | FuoError::NotSupported(_)
        | FuoError::InvalidPolicy(_)
        | FuoError::AlreadyExists(_) => "fail",
        _ => "error",
    }
}

/// 把处理结果渲染为响应体。
pub fn render(format: Format, result: &Result<Output, FuoError>) -> String {
    match (format, result) {
        (Format::Plain, Ok(output)) => output.to_plain(),
        (Format::Plain, Err(err)) => err.to_string(),
        (Format::Json, Ok(Output::Empty)) => json!({ "status": "success" }).to_string(),
        (Format::Json, Ok(output)) => json!({ "status": "success", "data": output }).to_string(),
        (Format::Json, Err(err)) => {
            json!({ "status": error_status(err), "msg": err.to_string() }).to_string()
        }
    }
}

///
/// 给响应体加上外框。
///
/// 成功时为 `ACK <cmd> <args>\n<body>\nOK\n`，失败时为 `<body>\nOops\n`。
/// 响应体为空时省略它所在的行。
///
pub fn frame(ack: &str, body: &str, ok: bool) -> String {
    let mut out = String::new();
    if ok {
        out.push_str("ACK ");
        out.push_str(ack.trim_end());
        out.push('\n');
    }
    if !body.is_empty() {
        out.push_str(body);
        out.push('\n');
    }
    out.push_str(if ok { "OK\n" } else { "Oops\n" });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BriefAlbumModel, BriefArtistModel, ModelStage};

    fn brief_song() -> BriefSongModel {
        BriefSongModel {
            source: "netease".into(),
            identifier: "16841667".into(),
            title: "No Matter What".into(),
            artists_name: "Boyzone".into(),
            album_name: String::new(),
            duration_ms: 0,
        }
    }

    fn status() -> StatusInfo {
        StatusInfo {
            repeat: true,
            random: false,
            volume: 80,
            state: State::Paused,
            duration: Some(269.0),
            position: Some(12.345),
            song: Some(brief_song()),
            lyric_s: None,
        }
    }

    #[test]
    fn test_status_plain() {
        insta::assert_snapshot!(Output::Status(status()).to_plain(), @r#"
        repeat: 1
        random: 0
        volume: 80
        state: paused
        duration: 269.00
        position: 12.35
        song: fuo://netease/songs/16841667	# "No Matter What" - Boyzone
        "#);
    }

    #[test]
    fn test_status_json() {
        let body = render(Format::Json, &Ok(Output::Status(status())));
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["data"]["state"], "paused");
        assert_eq!(value["data"]["song"]["identifier"], "16841667");
        assert!(value["data"]["lyric-s"].is_null());
    }

    #[test]
    fn test_song_detail_plain() {
        let song = SongModel {
            source: "qq".into(),
            identifier: "1".into(),
            stage: ModelStage::Gotten,
            title: "晴天".into(),
            artists: vec![BriefArtistModel {
                source: "qq".into(),
                identifier: "2".into(),
                name: "周杰伦".into(),
            }],
            album: Some(BriefAlbumModel {
                source: "qq".into(),
                identifier: "3".into(),
                name: "叶惠美".into(),
                artists_name: "周杰伦".into(),
            }),
            duration_ms: 269_000,
            ..Default::default()
        };
        insta::assert_snapshot!(Output::Model(Box::new(FullModel::Song(song))).to_plain(), @r"
        provider: qq
        uri: fuo://qq/songs/1
        title: 晴天
        artists: 周杰伦
        album: 叶惠美
        duration: 04:29
        ");
    }

    #[test]
    fn test_played_plain() {
        let mut other = brief_song();
        other.identifier = "2".into();
        other.title = "Other".into();
        let output = Output::Played {
            selected: brief_song(),
            alternatives: vec![other],
        };
        assert_eq!(
            output.to_plain(),
            "playing: fuo://netease/songs/16841667\t# \"No Matter What\" - Boyzone\n\
             alternatives::\n\
             \tfuo://netease/songs/2\t# Other - Boyzone"
        );
    }

    #[test]
    fn test_framing() {
        assert_eq!(frame("status", "state: paused", true), "ACK status\nstate: paused\nOK\n");
        assert_eq!(frame("clear ", "", true), "ACK clear\nOK\n");
        assert_eq!(frame("play x", "没有找到", false), "没有找到\nOops\n");

        let err = FuoError::Cmd("坏了".into());
        let body = render(Format::Json, &Err(err));
        assert_eq!(body, r#"{"msg":"坏了","status":"fail"}"#);
    }
}
