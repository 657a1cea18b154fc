//! 定义了整个库通用的、与具体提供商无关的核心数据模型。
//!
//! 每个模型实例都由 `(provider, type, id)` 唯一确定，对应的 URI 为
//! `fuo://<provider>/<type-plural>/<id>`。模型之间只通过简略模型
//! (`Brief*Model`) 互相引用，完整模型需要时再通过 `Library` 获取。

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

pub mod album_type;
pub mod collection;
pub mod lyric;
pub mod models;
pub mod reader;
pub mod uri;

pub use album_type::AlbumType;
pub use models::*;

/// 模型的类型。
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    /// 歌曲
    Song,
    /// 歌手
    Artist,
    /// 专辑
    Album,
    /// 歌单
    Playlist,
    /// 用户
    User,
    /// 歌词
    Lyric,
    /// 视频
    Video,
}

impl ModelType {
    /// URI 中使用的复数形式。
    pub fn plural(self) -> &'static str {
        match self {
            ModelType::Song => "songs",
            ModelType::Artist => "artists",
            ModelType::Album => "albums",
            ModelType::Playlist => "playlists",
            ModelType::User => "users",
            ModelType::Lyric => "lyrics",
            ModelType::Video => "videos",
        }
    }

    /// 从复数形式解析模型类型。
    pub fn from_plural(plural: &str) -> Option<Self> {
        Some(match plural {
            "songs" => ModelType::Song,
            "artists" => ModelType::Artist,
            "albums" => ModelType::Album,
            "playlists" => ModelType::Playlist,
            "users" => ModelType::User,
            "lyrics" => ModelType::Lyric,
            "videos" => ModelType::Video,
            _ => return None,
        })
    }
}

/// 模型所处的阶段，严格有序。
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ModelStage {
    /// 只有标识和用于展示的字段，还没有获取过。
    #[default]
    Display,
    /// 由提供商构造，但部分字段可能缺失。
    Inited,
    /// 已包含提供商能提供的全部字段。
    Gotten,
}

/// 模型在提供商处是否存在。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelExistence {
    /// 未知
    #[default]
    Unknown,
    /// 存在
    Yes,
    /// 不存在
    No,
}

/// 所有模型的公共接口。
pub trait Model: Clone + Send + Sync + 'static {
    /// 模型的类型。
    const MODEL_TYPE: ModelType;

    /// 提供商标识。
    fn source(&self) -> &str;

    /// 在提供商处的 ID。
    fn identifier(&self) -> &str;

    /// 当前阶段。
    fn stage(&self) -> ModelStage;

    /// 是否存在。
    fn exists(&self) -> ModelExistence;

    /// 标记模型的存在性。
    fn set_exists(&mut self, exists: ModelExistence);

    /// 用完整模型的字段覆盖自身，并将阶段提升为 `Gotten`。
    fn upgrade_from(&mut self, full: Self);

    /// 模型的规范 URI。
    fn uri(&self) -> String {
        uri::reverse(self.source(), Self::MODEL_TYPE, self.identifier())
    }
}

/// 用于展示的简略模型，即 URI 加上展示字段。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BriefModel {
    /// 歌曲
    Song(BriefSongModel),
    /// 歌手
    Artist(BriefArtistModel),
    /// 专辑
    Album(BriefAlbumModel),
    /// 歌单
    Playlist(BriefPlaylistModel),
    /// 用户
    User(BriefUserModel),
    /// 视频
    Video(BriefVideoModel),
    /// 歌词
    Lyric(BriefLyricModel),
}

impl BriefModel {
    /// 构造一个只有标识、没有展示字段的简略模型。
    pub fn new(source: &str, model_type: ModelType, identifier: &str) -> Self {
        let (source, identifier) = (source.to_string(), identifier.to_string());
        match model_type {
            ModelType::Song => Self::Song(BriefSongModel {
                source,
                identifier,
                ..Default::default()
            }),
            ModelType::Artist => Self::Artist(BriefArtistModel {
                source,
                identifier,
                ..Default::default()
            }),
            ModelType::Album => Self::Album(BriefAlbumModel {
                source,
                identifier,
                ..Default::default()
            }),
            ModelType::Playlist => Self::Playlist(BriefPlaylistModel {
                source,
                identifier,
                ..Default::default()
            }),
            ModelType::User => Self::User(BriefUserModel {
                source,
                identifier,
                ..Default::default()
            }),
            ModelType::Video => Self::Video(BriefVideoModel {
                source,
                identifier,
                ..Default::default()
            }),
            ModelType::Lyric => Self::Lyric(BriefLyricModel { source, identifier }),
        }
    }

    /// 模型类型。
    pub fn model_type(&self) -> ModelType {
        match self {
            Self::Song(_) => ModelType::Song,
            Self::Artist(_) => ModelType::Artist,
            Self::Album(_) => ModelType::Album,
            Self::Playlist(_) => ModelType::Playlist,
            Self::User(_) => ModelType::User,
            Self::Video(_) => ModelType::Video,
            Self::Lyric(_) => ModelType::Lyric,
        }
    }

    /// 提供商标识。
    pub fn source(&self) -> &str {
        match self {
            Self::Song(m) => &m.source,
            Self::Artist(m) => &m.source,
            Self::Album(m) => &m.source,
            Self::Playlist(m) => &m.source,
            Self::User(m) => &m.source,
            Self::Video(m) => &m.source,
            Self::Lyric(m) => &m.source,
        }
    }

    /// 在提供商处的 ID。
    pub fn identifier(&self) -> &str {
        match self {
            Self::Song(m) => &m.identifier,
            Self::Artist(m) => &m.identifier,
            Self::Album(m) => &m.identifier,
            Self::Playlist(m) => &m.identifier,
            Self::User(m) => &m.identifier,
            Self::Video(m) => &m.identifier,
            Self::Lyric(m) => &m.identifier,
        }
    }

    /// 规范 URI。
    pub fn uri(&self) -> String {
        uri::reverse(self.source(), self.model_type(), self.identifier())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_plural_round_trip() {
        for t in ModelType::iter() {
            assert_eq!(ModelType::from_plural(t.plural()), Some(t));
        }
        assert_eq!(ModelType::from_plural("song"), None);
    }

    #[test]
    fn test_stage_is_ordered() {
        assert!(ModelStage::Display < ModelStage::Inited);
        assert!(ModelStage::Inited < ModelStage::Gotten);
    }
}
