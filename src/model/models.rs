//! 简略模型与完整模型的定义。
//!
//! 完整模型之间不互相持有，只保存对方的简略模型，需要详细信息时再
//! 通过 `Library` 获取。所有模型的相等性与哈希都只由 `(source, identifier)`
//! 决定。

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use super::{AlbumType, BriefModel, Model, ModelExistence, ModelStage, ModelType};

/// 为模型实现只比较 `(source, identifier)` 的 `PartialEq`/`Eq`/`Hash`。
macro_rules! impl_identity {
    ($($ty:ty),* $(,)?) => {
        $(
            impl PartialEq for $ty {
                fn eq(&self, other: &Self) -> bool {
                    self.source == other.source && self.identifier == other.identifier
                }
            }

            impl Eq for $ty {}

            impl Hash for $ty {
                fn hash<H: Hasher>(&self, state: &mut H) {
                    self.source.hash(state);
                    self.identifier.hash(state);
                }
            }
        )*
    };
}

/// 为完整模型实现 [`Model`] trait。
macro_rules! impl_model {
    ($ty:ty, $model_type:expr) => {
        impl Model for $ty {
            const MODEL_TYPE: ModelType = $model_type;

            fn source(&self) -> &str {
                &self.source
            }

            fn identifier(&self) -> &str {
                &self.identifier
            }

            fn stage(&self) -> ModelStage {
                self.stage
            }

            fn exists(&self) -> ModelExistence {
                self.exists
            }

            fn set_exists(&mut self, exists: ModelExistence) {
                self.exists = exists;
            }

            fn upgrade_from(&mut self, full: Self) {
                *self = full;
                self.stage = ModelStage::Gotten;
                self.exists = ModelExistence::Yes;
            }
        }
    };
}

// ---- 简略模型 ----

/// 简略的歌曲模型。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct BriefSongModel {
    pub source: String,
    pub identifier: String,
    pub title: String,
    pub artists_name: String,
    pub album_name: String,
    pub duration_ms: u64,
}

/// 简略的歌手模型。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct BriefArtistModel {
    pub source: String,
    pub identifier: String,
    pub name: String,
}

/// 简略的专辑模型。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct BriefAlbumModel {
    pub source: String,
    pub identifier: String,
    pub name: String,
    pub artists_name: String,
}

/// 简略的歌单模型。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct BriefPlaylistModel {
    pub source: String,
    pub identifier: String,
    pub name: String,
}

/// 简略的用户模型。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct BriefUserModel {
    pub source: String,
    pub identifier: String,
    pub name: String,
}

/// 简略的视频模型。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct BriefVideoModel {
    pub source: String,
    pub identifier: String,
    pub title: String,
    pub artists_name: String,
    pub duration_ms: u64,
}

/// 简略的歌词模型，没有展示字段。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct BriefLyricModel {
    pub source: String,
    pub identifier: String,
}

impl_identity!(
    BriefSongModel,
    BriefArtistModel,
    BriefAlbumModel,
    BriefPlaylistModel,
    BriefUserModel,
    BriefVideoModel,
    BriefLyricModel,
);

// ---- 完整模型 ----

/// 一条评论。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[allow(missing_docs)]
pub struct CommentModel {
    pub identifier: String,
    pub user: BriefUserModel,
    pub content: String,
    pub liked_count: u64,
    /// Unix 时间戳（秒）。
    pub time: i64,
}

/// 完整的歌曲模型。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct SongModel {
    pub source: String,
    pub identifier: String,
    pub stage: ModelStage,
    pub exists: ModelExistence,
    pub title: String,
    pub artists: Vec<BriefArtistModel>,
    pub album: Option<BriefAlbumModel>,
    pub duration_ms: u64,
    /// 不支持多音质的提供商直接在这里给出播放地址。
    pub url: String,
    pub lyric: Option<BriefLyricModel>,
    pub mv: Option<BriefVideoModel>,
    pub comments: Vec<CommentModel>,
    /// 展示阶段时的歌手名，`artists` 为空时使用。
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_artists_name: String,
    /// 展示阶段时的专辑名，`album` 为空时使用。
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_album_name: String,
}

impl SongModel {
    /// 创建一个由提供商构造的歌曲。
    pub fn new(source: impl Into<String>, identifier: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            identifier: identifier.into(),
            stage: ModelStage::Inited,
            title: title.into(),
            ..Default::default()
        }
    }

    /// 从简略模型创建一个展示阶段的歌曲。
    pub fn from_brief(brief: BriefSongModel) -> Self {
        Self {
            source: brief.source,
            identifier: brief.identifier,
            stage: ModelStage::Display,
            title: brief.title,
            duration_ms: brief.duration_ms,
            display_artists_name: brief.artists_name,
            display_album_name: brief.album_name,
            ..Default::default()
        }
    }

    /// 以 `,` 连接的歌手名。
    pub fn artists_name(&self) -> String {
        if self.artists.is_empty() {
            self.display_artists_name.clone()
        } else {
            self.artists
                .iter()
                .map(|a| a.name.as_str())
                .collect::<Vec<_>>()
                .join(",")
        }
    }

    /// 专辑名。
    pub fn album_name(&self) -> String {
        match &self.album {
            Some(album) => album.name.clone(),
            None => self.display_album_name.clone(),
        }
    }

    /// 转换成简略模型。
    pub fn brief(&self) -> BriefSongModel {
        BriefSongModel {
            source: self.source.clone(),
            identifier: self.identifier.clone(),
            title: self.title.clone(),
            artists_name: self.artists_name(),
            album_name: self.album_name(),
            duration_ms: self.duration_ms,
        }
    }

    /// 对应的模型行。
    pub fn to_line(&self) -> String {
        super::uri::model_to_line(&BriefModel::Song(self.brief()))
    }
}

/// 完整的歌手模型。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct ArtistModel {
    pub source: String,
    pub identifier: String,
    pub stage: ModelStage,
    pub exists: ModelExistence,
    pub name: String,
    pub pic_url: String,
    pub aliases: Vec<String>,
    pub hot_songs: Vec<BriefSongModel>,
    pub description: String,
}

#[allow(missing_docs)]
impl ArtistModel {
    pub fn brief(&self) -> BriefArtistModel {
        BriefArtistModel {
            source: self.source.clone(),
            identifier: self.identifier.clone(),
            name: self.name.clone(),
        }
    }
}

/// 完整的专辑模型。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct AlbumModel {
    pub source: String,
    pub identifier: String,
    pub stage: ModelStage,
    pub exists: ModelExistence,
    pub name: String,
    pub cover: String,
    pub type_: AlbumType,
    pub artists: Vec<BriefArtistModel>,
    pub songs: Vec<BriefSongModel>,
    pub song_count: Option<usize>,
    pub description: String,
    /// 发行日期，格式由提供商决定。
    pub released: String,
}

#[allow(missing_docs)]
impl AlbumModel {
    pub fn artists_name(&self) -> String {
        self.artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn brief(&self) -> BriefAlbumModel {
        BriefAlbumModel {
            source: self.source.clone(),
            identifier: self.identifier.clone(),
            name: self.name.clone(),
            artists_name: self.artists_name(),
        }
    }
}

/// 完整的歌单模型。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct PlaylistModel {
    pub source: String,
    pub identifier: String,
    pub stage: ModelStage,
    pub exists: ModelExistence,
    pub name: String,
    pub cover: String,
    pub creator: Option<BriefUserModel>,
    pub description: String,
    pub song_count: Option<usize>,
}

#[allow(missing_docs)]
impl PlaylistModel {
    pub fn brief(&self) -> BriefPlaylistModel {
        BriefPlaylistModel {
            source: self.source.clone(),
            identifier: self.identifier.clone(),
            name: self.name.clone(),
        }
    }
}

/// 完整的用户模型。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct UserModel {
    pub source: String,
    pub identifier: String,
    pub stage: ModelStage,
    pub exists: ModelExistence,
    pub name: String,
    pub avatar_url: String,
}

#[allow(missing_docs)]
impl UserModel {
    pub fn brief(&self) -> BriefUserModel {
        BriefUserModel {
            source: self.source.clone(),
            identifier: self.identifier.clone(),
            name: self.name.clone(),
        }
    }
}

/// 完整的视频模型。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct VideoModel {
    pub source: String,
    pub identifier: String,
    pub stage: ModelStage,
    pub exists: ModelExistence,
    pub title: String,
    pub artists: Vec<BriefArtistModel>,
    pub duration_ms: u64,
    pub cover: String,
}

#[allow(missing_docs)]
impl VideoModel {
    pub fn brief(&self) -> BriefVideoModel {
        BriefVideoModel {
            source: self.source.clone(),
            identifier: self.identifier.clone(),
            title: self.title.clone(),
            artists_name: self
                .artists
                .iter()
                .map(|a| a.name.as_str())
                .collect::<Vec<_>>()
                .join(","),
            duration_ms: self.duration_ms,
        }
    }
}

/// 歌词模型，`content` 为 LRC 文本。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct LyricModel {
    pub source: String,
    pub identifier: String,
    pub stage: ModelStage,
    pub exists: ModelExistence,
    pub content: String,
    /// 翻译歌词，同样为 LRC 文本。
    pub trans_content: String,
}

impl_identity!(
    SongModel,
    ArtistModel,
    AlbumModel,
    PlaylistModel,
    UserModel,
    VideoModel,
    LyricModel,
);

impl_model!(SongModel, ModelType::Song);
impl_model!(ArtistModel, ModelType::Artist);
impl_model!(AlbumModel, ModelType::Album);
impl_model!(PlaylistModel, ModelType::Playlist);
impl_model!(UserModel, ModelType::User);
impl_model!(VideoModel, ModelType::Video);
impl_model!(LyricModel, ModelType::Lyric);

impl From<BriefSongModel> for SongModel {
    fn from(brief: BriefSongModel) -> Self {
        Self::from_brief(brief)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_song_identity_ignores_display_fields() {
        let a = SongModel::new("netease", "1", "晴天");
        let mut b = SongModel::new("netease", "1", "另一个标题");
        b.stage = ModelStage::Gotten;
        let c = SongModel::new("qq", "1", "晴天");

        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<_> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_brief_round_trip_keeps_display_fields() {
        let brief = BriefSongModel {
            source: "local".into(),
            identifier: "abc".into(),
            title: "晴天".into(),
            artists_name: "周杰伦".into(),
            album_name: "叶惠美".into(),
            duration_ms: 1000,
        };
        let song = SongModel::from_brief(brief.clone());
        assert_eq!(song.stage, ModelStage::Display);
        assert_eq!(song.artists_name(), "周杰伦");
        assert_eq!(song.album_name(), "叶惠美");
        assert_eq!(song.uri(), "fuo://local/songs/abc");

        let back = song.brief();
        assert_eq!(back.title, brief.title);
        assert_eq!(back.artists_name, brief.artists_name);
        assert_eq!(back.album_name, brief.album_name);
    }

    #[test]
    fn test_upgrade_promotes_stage() {
        let mut song = SongModel::from_brief(BriefSongModel {
            source: "local".into(),
            identifier: "1".into(),
            ..Default::default()
        });
        let mut full = SongModel::new("local", "1", "完整标题");
        full.artists.push(BriefArtistModel {
            source: "local".into(),
            identifier: "a".into(),
            name: "歌手".into(),
        });

        song.upgrade_from(full);
        assert_eq!(song.stage, ModelStage::Gotten);
        assert_eq!(song.exists, ModelExistence::Yes);
        assert_eq!(song.artists_name(), "歌手");
    }
}
