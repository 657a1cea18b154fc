//! 模型 URI 与模型行的解析和生成。
//!
//! URI 形如 `fuo://netease/songs/16841667`。模型行在 URI 后面追加一段
//! 用于展示的描述，例如：
//!
//! ```text
//! fuo://netease/songs/16841667	# "No Matter What" - Boyzone
//! ```

use crate::error::{FuoError, Result};
use crate::model::{
    BriefAlbumModel, BriefArtistModel, BriefModel, BriefPlaylistModel, BriefSongModel,
    BriefUserModel, BriefVideoModel, ModelType,
};

/// URI 的协议前缀。
pub const SCHEME: &str = "fuo://";

/// 解析后的 URI。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelUri {
    /// 提供商标识。
    pub provider: String,
    /// 模型类型。
    pub model_type: ModelType,
    /// 在提供商处的 ID。
    pub identifier: String,
    /// ID 之后的子路径，例如 `lyric`。
    pub sub_path: Option<String>,
}

impl ModelUri {
    /// 转换成没有展示字段的简略模型。
    pub fn to_brief(&self) -> BriefModel {
        BriefModel::new(&self.provider, self.model_type, &self.identifier)
    }
}

/// 将 URI 解析为 `(provider, type, id)`。
///
/// # 参数
/// * `uri` - 以 `fuo://` 开头的 URI，允许带有子路径，例如 `fuo://local/songs/1/lyric`。
///
/// # 返回
/// 协议错误、未知的类型或空 ID 都会返回 `FuoError::ResolveFailed`。
pub fn resolve(uri: &str) -> Result<ModelUri> {
    let rest = uri
        .strip_prefix(SCHEME)
        .ok_or_else(|| FuoError::ResolveFailed(format!("无效的协议: {uri}")))?;

    let mut parts = rest.splitn(4, '/');
    let provider = parts.next().unwrap_or_default();
    let plural = parts.next().unwrap_or_default();
    let identifier = parts.next().unwrap_or_default();
    let sub_path = parts.next().filter(|s| !s.is_empty()).map(str::to_string);

    if provider.is_empty() {
        return Err(FuoError::ResolveFailed(format!("缺少提供商: {uri}")));
    }
    let model_type = ModelType::from_plural(plural)
        .ok_or_else(|| FuoError::ResolveFailed(format!("未知的模型类型 '{plural}': {uri}")))?;
    if identifier.is_empty() {
        return Err(FuoError::ResolveFailed(format!("缺少 ID: {uri}")));
    }

    Ok(ModelUri {
        provider: provider.to_string(),
        model_type,
        identifier: identifier.to_string(),
        sub_path,
    })
}

/// 由 `(provider, type, id)` 生成 URI，是 [`resolve`] 的逆操作。
pub fn reverse(provider: &str, model_type: ModelType, identifier: &str) -> String {
    format!("{SCHEME}{provider}/{}/{identifier}", model_type.plural())
}

/// 将毫秒格式化为 `mm:ss`。
pub fn format_duration(ms: u64) -> String {
    let total_secs = ms / 1000;
    format!("{:02}:{:02}", total_secs / 60, total_secs % 60)
}

/// 解析 `mm:ss` 格式的时长，失败时返回 `None`。
pub fn parse_duration(text: &str) -> Option<u64> {
    let (mm, ss) = text.trim().split_once(':')?;
    let mm: u64 = mm.parse().ok()?;
    let ss: u64 = ss.parse().ok()?;
    (ss < 60).then_some((mm * 60 + ss) * 1000)
}

fn needs_quote(field: &str) -> bool {
    field.is_empty()
        || field.starts_with('"')
        || field.contains('-')
        || field.chars().any(char::is_whitespace)
}

fn quote(field: &str) -> String {
    if !needs_quote(field) {
        return field.to_string();
    }
    let mut out = String::with_capacity(field.len() + 2);
    out.push('"');
    for c in field.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

fn join_fields(fields: &[String]) -> String {
    let end = fields
        .iter()
        .rposition(|f| !f.is_empty())
        .map_or(0, |i| i + 1);
    fields[..end]
        .iter()
        .map(|f| quote(f))
        .collect::<Vec<_>>()
        .join(" - ")
}

/// 将简略模型序列化为一行文本。
pub fn model_to_line(model: &BriefModel) -> String {
    let fields: Vec<String> = match model {
        BriefModel::Song(s) => vec![
            s.title.clone(),
            s.artists_name.clone(),
            s.album_name.clone(),
            if s.duration_ms > 0 {
                format_duration(s.duration_ms)
            } else {
                String::new()
            },
        ],
        BriefModel::Album(a) => vec![a.name.clone(), a.artists_name.clone()],
        BriefModel::Artist(a) => vec![a.name.clone()],
        BriefModel::Playlist(p) => vec![p.name.clone()],
        BriefModel::User(u) => vec![u.name.clone()],
        BriefModel::Video(v) => vec![
            v.title.clone(),
            v.artists_name.clone(),
            if v.duration_ms > 0 {
                format_duration(v.duration_ms)
            } else {
                String::new()
            },
        ],
        BriefModel::Lyric(_) => Vec::new(),
    };

    let desc = join_fields(&fields);
    if desc.is_empty() {
        model.uri()
    } else {
        format!("{}\t# {desc}", model.uri())
    }
}

/// 把描述部分切分成字段，支持带引号的字段以及结尾多余的 ` -`。
fn split_fields(desc: &str) -> Result<Vec<String>> {
    let chars: Vec<char> = desc.chars().collect();
    let mut fields = Vec::new();
    let mut i = 0;

    loop {
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        if i >= chars.len() {
            break;
        }

        if chars[i] == '"' {
            let start = i;
            let mut field = String::new();
            i += 1;
            loop {
                match chars.get(i) {
                    None => {
                        return Err(FuoError::ResolveFailed(format!(
                            "第 {start} 列的引号没有闭合: {desc}"
                        )));
                    }
                    Some('\\') if i + 1 < chars.len() => {
                        field.push(chars[i + 1]);
                        i += 2;
                    }
                    Some('"') => {
                        i += 1;
                        break;
                    }
                    Some(&c) => {
                        field.push(c);
                        i += 1;
                    }
                }
            }
            fields.push(field);

            while i < chars.len() && chars[i].is_whitespace() {
                i += 1;
            }
            match chars.get(i) {
                None => break,
                Some('-') => i += 1,
                Some(_) => {
                    return Err(FuoError::ResolveFailed(format!(
                        "第 {i} 列缺少字段分隔符: {desc}"
                    )));
                }
            }
        } else {
            let rest: String = chars[i..].iter().collect();
            match rest.find(" - ") {
                Some(pos) => {
                    fields.push(rest[..pos].trim().to_string());
                    i += rest[..pos + 3].chars().count();
                }
                None => {
                    let field = rest.trim_end();
                    let field = field.strip_suffix(" -").unwrap_or(field);
                    if field != "-" {
                        fields.push(field.trim().to_string());
                    }
                    break;
                }
            }
        }
    }

    Ok(fields)
}

/// 解析一行模型文本，得到展示阶段的简略模型。
///
/// 只有 URI、没有描述的行也是合法的。
pub fn parse_line(line: &str) -> Result<BriefModel> {
    let line = line.trim();
    let (uri_part, desc) = match line.split_once('#') {
        Some((uri, desc)) => (uri.trim(), desc),
        None => (line, ""),
    };
    let uri = resolve(uri_part)?;
    let fields = split_fields(desc)?;
    let field = |i: usize| fields.get(i).cloned().unwrap_or_default();

    let (source, identifier) = (uri.provider, uri.identifier);
    let model = match uri.model_type {
        ModelType::Song => BriefModel::Song(BriefSongModel {
            source,
            identifier,
            title: field(0),
            artists_name: field(1),
            album_name: field(2),
            duration_ms: parse_duration(&field(3)).unwrap_or(0),
        }),
        ModelType::Album => BriefModel::Album(BriefAlbumModel {
            source,
            identifier,
            name: field(0),
            artists_name: field(1),
        }),
        ModelType::Artist => BriefModel::Artist(BriefArtistModel {
            source,
            identifier,
            name: field(0),
        }),
        ModelType::Playlist => BriefModel::Playlist(BriefPlaylistModel {
            source,
            identifier,
            name: field(0),
        }),
        ModelType::User => BriefModel::User(BriefUserModel {
            source,
            identifier,
            name: field(0),
        }),
        ModelType::Video => BriefModel::Video(BriefVideoModel {
            source,
            identifier,
            title: field(0),
            artists_name: field(1),
            duration_ms: parse_duration(&field(2)).unwrap_or(0),
        }),
        ModelType::Lyric => BriefModel::new(&source, ModelType::Lyric, &identifier),
    };
    Ok(model)
}
