//! 集成测试共用的假提供商与连接辅助函数。
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use feeluown_rs::{
    App, Config, Result,
    media::{Media, VideoQuality},
    model::{BriefArtistModel, LyricModel, ModelExistence, ModelType, SongModel, VideoModel},
    player::backend::NullBackend,
    providers::{Provider, ProviderFlags, SearchResult, SearchType},
    server::Running,
};

/// 所有歌曲都直接带有播放地址的内存提供商。
pub struct MemoryProvider {
    pub songs: Vec<SongModel>,
    pub lyrics: HashMap<String, String>,
}

impl MemoryProvider {
    pub fn new(titles: &[(&str, &str)]) -> Self {
        let songs = titles
            .iter()
            .enumerate()
            .map(|(i, (title, artist))| {
                let id = (i + 1).to_string();
                let mut song = SongModel::new("mem", id.clone(), *title);
                song.exists = ModelExistence::Yes;
                song.url = format!("http://mem/{id}.mp3");
                song.duration_ms = 200_000;
                song.artists.push(BriefArtistModel {
                    source: "mem".into(),
                    identifier: format!("ar-{artist}"),
                    name: (*artist).into(),
                });
                song
            })
            .collect();
        Self {
            songs,
            lyrics: HashMap::new(),
        }
    }

    pub fn with_lyric(mut self, song_id: &str, lrc: &str) -> Self {
        self.lyrics.insert(song_id.into(), lrc.into());
        self
    }
}

#[async_trait]
impl Provider for MemoryProvider {
    fn identifier(&self) -> &str {
        "mem"
    }

    fn name(&self) -> &str {
        "内存"
    }

    fn flags(&self, model_type: ModelType) -> ProviderFlags {
        match model_type {
            ModelType::Song => ProviderFlags::GET | ProviderFlags::SEARCH | ProviderFlags::LYRIC,
            ModelType::Video => ProviderFlags::GET | ProviderFlags::MULTI_QUALITY,
            _ => ProviderFlags::empty(),
        }
    }

    async fn search(&self, keyword: &str, search_type: SearchType) -> Result<Option<SearchResult>> {
        if search_type != SearchType::Song {
            return Ok(None);
        }
        let songs = self
            .songs
            .iter()
            .filter(|s| s.title.contains(keyword) || s.artists_name().contains(keyword))
            .map(SongModel::brief)
            .collect();
        Ok(Some(SearchResult {
            source: "mem".into(),
            search_type: Some(SearchType::Song),
            songs,
            ..Default::default()
        }))
    }

    async fn song_get(&self, identifier: &str) -> Result<Option<SongModel>> {
        Ok(self.songs.iter().find(|s| s.identifier == identifier).cloned())
    }

    async fn song_get_lyric(&self, song: &SongModel) -> Result<Option<LyricModel>> {
        Ok(self.lyrics.get(&song.identifier).map(|content| LyricModel {
            source: "mem".into(),
            identifier: song.identifier.clone(),
            content: content.clone(),
            ..Default::default()
        }))
    }

    /// 只有一个 `mv1`，提供标清和高清两种画质。
    async fn video_get(&self, identifier: &str) -> Result<Option<VideoModel>> {
        Ok((identifier == "mv1").then(|| VideoModel {
            source: "mem".into(),
            identifier: identifier.into(),
            exists: ModelExistence::Yes,
            title: "七里香 MV".into(),
            ..Default::default()
        }))
    }

    async fn video_list_quality(&self, _video: &VideoModel) -> Result<Vec<VideoQuality>> {
        Ok(vec![VideoQuality::Sd, VideoQuality::Hd])
    }

    async fn video_get_media(
        &self,
        video: &VideoModel,
        quality: VideoQuality,
    ) -> Result<Option<Media>> {
        Ok(Some(Media::from_url(format!(
            "http://mem/{}.{quality}",
            video.identifier
        ))))
    }
}

pub struct Harness {
    pub app: App,
    pub backend: Arc<NullBackend>,
    pub running: Running,
}

/// 在随机端口上启动一个应用。
pub async fn start(provider: MemoryProvider, enable_exec: bool) -> Harness {
    start_with(
        provider,
        Config {
            enable_exec_command: enable_exec,
            ..Default::default()
        },
    )
    .await
}

/// 用给定的配置启动，端口总是随机的。
pub async fn start_with(provider: MemoryProvider, config: Config) -> Harness {
    let config = Config {
        rpc_port: 0,
        pubsub_port: 0,
        search_timeout_ms: 1000,
        ..config
    };
    let (backend, events) = NullBackend::new();
    let app = App::new(config, backend.clone());
    app.library.register(Arc::new(provider)).unwrap();
    let running = app.serve(events).await.unwrap();
    Harness {
        app,
        backend,
        running,
    }
}

/// 一个行式的 TCP 客户端。
pub struct Client {
    pub lines: Lines<BufReader<OwnedReadHalf>>,
    pub writer: OwnedWriteHalf,
}

impl Client {
    pub async fn connect(addr: std::net::SocketAddr) -> (Self, String) {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (reader, writer) = stream.into_split();
        let mut client = Self {
            lines: BufReader::new(reader).lines(),
            writer,
        };
        let greeting = client.read_line().await.unwrap();
        (client, greeting)
    }

    pub async fn send(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
    }

    /// 读取一行，超时或连接关闭时返回 `None`。
    pub async fn read_line(&mut self) -> Option<String> {
        tokio::time::timeout(Duration::from_secs(2), self.lines.next_line())
            .await
            .ok()?
            .ok()?
    }

    /// 读取一个完整的响应，直到 `OK` 或 `Oops` 行。
    pub async fn read_response(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(line) = self.read_line().await {
            let done = line == "OK" || line == "Oops";
            lines.push(line);
            if done {
                break;
            }
        }
        lines
    }

    pub async fn request(&mut self, line: &str) -> Vec<String> {
        self.send(line).await;
        self.read_response().await
    }
}
