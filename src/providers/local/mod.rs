//! 此模块实现了读取本地音乐目录的 `Provider`。
//!
//! 只做平铺的目录枚举，不读取音频标签：文件名形如 `歌手 - 标题.mp3`
//! 时会拆出歌手和标题，否则整个文件名都作为标题。与音频文件同名的
//! `.lrc` 文件会作为它的歌词。

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    error::Result,
    media::{AudioQuality, Media},
    model::{
        BriefArtistModel, LyricModel, ModelExistence, ModelStage, ModelType, SongModel,
        BriefLyricModel,
    },
    providers::{Provider, ProviderFlags, SearchResult, SearchType},
};

/// 本地提供商的标识。
pub const LOCAL_PROVIDER_ID: &str = "local";

/// 被识别为音频的扩展名。
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "ogg", "m4a", "wav", "ape", "opus"];

/// 本地音乐提供商。
#[derive(Debug, Default)]
pub struct LocalProvider {
    dirs: Vec<PathBuf>,
    songs: RwLock<Vec<SongModel>>,
}

/// 由文件的绝对路径生成稳定的 ID。
fn song_id_for(path: &Path) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, path.to_string_lossy().as_bytes())
        .simple()
        .to_string()
}

fn is_audio(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| AUDIO_EXTENSIONS.iter().any(|a| a.eq_ignore_ascii_case(ext)))
}

/// 从文件路径构造歌曲。
fn song_from_path(path: &Path) -> Option<SongModel> {
    let stem = path.file_stem()?.to_string_lossy().into_owned();
    let (artist, title) = match stem.split_once(" - ") {
        Some((artist, title)) => (artist.trim().to_string(), title.trim().to_string()),
        None => (String::new(), stem.trim().to_string()),
    };

    let id = song_id_for(path);
    let mut song = SongModel::new(LOCAL_PROVIDER_ID, id.clone(), title);
    song.stage = ModelStage::Gotten;
    song.exists = ModelExistence::Yes;
    song.url = path.to_string_lossy().into_owned();
    if !artist.is_empty() {
        song.artists = artist
            .split([',', '&', '、'])
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(|name| BriefArtistModel {
                source: LOCAL_PROVIDER_ID.to_string(),
                identifier: song_id_for(Path::new(name)),
                name: name.to_string(),
            })
            .collect();
    }
    if path.with_extension("lrc").is_file() {
        song.lyric = Some(BriefLyricModel {
            source: LOCAL_PROVIDER_ID.to_string(),
            identifier: id,
        });
    }
    Some(song)
}

impl LocalProvider {
    /// 创建提供商，需要调用 [`LocalProvider::scan`] 后才有歌曲。
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self {
            dirs,
            songs: RwLock::new(Vec::new()),
        }
    }

    ///
    /// 扫描配置的所有目录（不递归）。
    ///
    /// 目录不存在或无法读取时只记录警告。
    ///
    /// # 返回
    /// 扫描到的歌曲数量。
    ///
    pub async fn scan(&self) -> Result<usize> {
        let mut songs = Vec::new();
        for dir in &self.dirs {
            let mut entries = match tokio::fs::read_dir(dir).await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("无法读取本地音乐目录 {}: {e}", dir.display());
                    continue;
                }
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if !entry.file_type().await?.is_file() || !is_audio(&path) {
                    continue;
                }
                let path = std::path::absolute(&path).unwrap_or(path);
                if let Some(song) = song_from_path(&path) {
                    debug!("发现本地歌曲: {}", path.display());
                    songs.push(song);
                }
            }
        }
        songs.sort_by(|a, b| a.url.cmp(&b.url));

        let count = songs.len();
        *self.songs.write().unwrap_or_else(std::sync::PoisonError::into_inner) = songs;
        info!("本地音乐扫描完成，共 {count} 首歌曲。");
        Ok(count)
    }

    /// 所有本地歌曲。
    pub fn songs(&self) -> Vec<SongModel> {
        self.songs
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn find(&self, identifier: &str) -> Option<SongModel> {
        self.songs
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .find(|s| s.identifier == identifier)
            .cloned()
    }
}

#[async_trait]
impl Provider for LocalProvider {
    fn identifier(&self) -> &str {
        LOCAL_PROVIDER_ID
    }

    fn name(&self) -> &str {
        "本地音乐"
    }

    fn flags(&self, model_type: ModelType) -> ProviderFlags {
        match model_type {
            ModelType::Song => ProviderFlags::GET | ProviderFlags::SEARCH | ProviderFlags::LYRIC,
            _ => ProviderFlags::empty(),
        }
    }

    async fn search(&self, keyword: &str, search_type: SearchType) -> Result<Option<SearchResult>> {
        if search_type != SearchType::Song {
            return Ok(None);
        }
        let parts: Vec<String> = keyword.split_whitespace().map(str::to_lowercase).collect();
        if parts.is_empty() {
            return Ok(None);
        }

        let songs: Vec<_> = self
            .songs()
            .iter()
            .filter(|song| {
                let repr = format!("{} {}", song.title, song.artists_name()).to_lowercase();
                parts.iter().all(|p| repr.contains(p.as_str()))
            })
            .map(SongModel::brief)
            .collect();

        debug!("本地搜索 '{keyword}' 得到 {} 首歌曲", songs.len());
        Ok(Some(SearchResult {
            source: LOCAL_PROVIDER_ID.to_string(),
            search_type: Some(SearchType::Song),
            songs,
            ..Default::default()
        }))
    }

    async fn song_get(&self, identifier: &str) -> Result<Option<SongModel>> {
        Ok(self.find(identifier))
    }

    async fn song_list_quality(&self, _song: &SongModel) -> Result<Vec<AudioQuality>> {
        Ok(vec![AudioQuality::Sq])
    }

    async fn song_get_media(&self, song: &SongModel, _quality: AudioQuality) -> Result<Option<Media>> {
        let Some(song) = self.find(&song.identifier) else {
            return Ok(None);
        };
        let format = Path::new(&song.url)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase());
        let mut media = Media::from_url(song.url);
        media.format = format;
        Ok(Some(media))
    }

    async fn song_get_lyric(&self, song: &SongModel) -> Result<Option<LyricModel>> {
        let Some(song) = self.find(&song.identifier) else {
            return Ok(None);
        };
        let lrc_path = Path::new(&song.url).with_extension("lrc");
        match tokio::fs::read_to_string(&lrc_path).await {
            Ok(content) => Ok(Some(LyricModel {
                source: LOCAL_PROVIDER_ID.to_string(),
                identifier: song.identifier,
                stage: ModelStage::Gotten,
                exists: ModelExistence::Yes,
                content,
                trans_content: String::new(),
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn music_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("周杰伦 - 晴天.mp3"), b"").unwrap();
        fs::write(dir.path().join("周杰伦 - 晴天.lrc"), "[00:01.00]故事的小黄花").unwrap();
        fs::write(dir.path().join("Boyzone - No Matter What.flac"), b"").unwrap();
        fs::write(dir.path().join("纯音乐.OGG"), b"").unwrap();
        fs::write(dir.path().join("cover.jpg"), b"").unwrap();
        fs::create_dir(dir.path().join("子目录.mp3")).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_scan_and_search() {
        let dir = music_dir();
        let provider = LocalProvider::new(vec![dir.path().to_path_buf(), dir.path().join("不存在")]);
        assert_eq!(provider.scan().await.unwrap(), 3);

        let result = provider
            .search("晴天 周杰伦", SearchType::Song)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.songs.len(), 1);
        assert_eq!(result.songs[0].title, "晴天");
        assert_eq!(result.songs[0].artists_name, "周杰伦");

        let plain = provider.songs().into_iter().find(|s| s.title == "纯音乐").unwrap();
        assert!(plain.artists.is_empty());
    }

    #[tokio::test]
    async fn test_ids_are_stable_and_media_is_the_file() {
        let dir = music_dir();
        let provider = LocalProvider::new(vec![dir.path().to_path_buf()]);
        provider.scan().await.unwrap();
        let first: Vec<_> = provider.songs().iter().map(|s| s.identifier.clone()).collect();
        provider.scan().await.unwrap();
        let second: Vec<_> = provider.songs().iter().map(|s| s.identifier.clone()).collect();
        assert_eq!(first, second);

        let song = provider
            .songs()
            .into_iter()
            .find(|s| s.title == "No Matter What")
            .unwrap();
        let fetched = provider.song_get(&song.identifier).await.unwrap().unwrap();
        assert_eq!(fetched, song);

        let media = provider
            .song_get_media(&song, AudioQuality::Sq)
            .await
            .unwrap()
            .unwrap();
        assert!(media.url.ends_with("No Matter What.flac"));
        assert_eq!(media.format.as_deref(), Some("flac"));
    }

    #[tokio::test]
    async fn test_sibling_lrc_is_the_lyric() {
        let dir = music_dir();
        let provider = LocalProvider::new(vec![dir.path().to_path_buf()]);
        provider.scan().await.unwrap();
        for song in provider.songs() {
            let lyric = provider.song_get_lyric(&song).await.unwrap();
            if song.title == "晴天" {
                assert!(song.lyric.is_some());
                assert!(lyric.unwrap().content.contains("小黄花"));
            } else {
                assert!(lyric.is_none());
            }
        }
    }
}
