//! 媒体对象、音质/画质以及按排序策略选择媒体。
//!
//! 排序策略是一个很短的字符串，决定在多个可用音质之间的偏好顺序：
//!
//! | 语法 | 含义 |
//! |---|---|
//! | `>>>` | 从好到差 |
//! | `<<<` | 从差到好 |
//! | `Q<>` | 从 Q 开始，先向更好的方向，再向更差的方向交替扩展 |
//! | `Q><` | 从 Q 开始，先向更差的方向，再向更好的方向交替扩展 |
//! | `Q>>` | Q，然后比 Q 差的（由近到远），最后比 Q 好的（由近到远） |
//! | `Q<<` | Q，然后比 Q 好的（由近到远），最后比 Q 差的（由近到远） |

use std::collections::HashMap;
use std::fmt::{Debug, Display};
use std::future::Future;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display as StrumDisplay, EnumIter, EnumString};
use tracing::{debug, warn};

use crate::error::{FuoError, Result};

/// 音质或画质，`iter()` 的顺序即从好到差。
pub trait Quality:
    Copy + Eq + Debug + Display + FromStr + IntoEnumIterator + Send + Sync + 'static
{
}

/// 音频音质，从好到差。
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    StrumDisplay,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum AudioQuality {
    /// 无损及以上
    Shq,
    /// 高品质
    Hq,
    /// 标准
    Sq,
    /// 低品质
    Lq,
}

impl Quality for AudioQuality {}

/// 视频画质，从好到差。
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    StrumDisplay,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum VideoQuality {
    /// 1080p
    Fhd,
    /// 720p
    Hd,
    /// 480p
    Sd,
    /// 更低
    Ld,
}

impl Quality for VideoQuality {}

/// 解析排序策略，返回包含全部音质的偏好顺序。
///
/// # 参数
/// * `policy` - 策略字符串，例如 `hq<>`。
///
/// # 返回
/// 无法解析时返回 `FuoError::InvalidPolicy`。
pub fn parse_sort_policy<Q: Quality>(policy: &str) -> Result<Vec<Q>> {
    let all: Vec<Q> = Q::iter().collect();
    let policy = policy.trim();

    match policy {
        ">>>" => return Ok(all),
        "<<<" => return Ok(all.into_iter().rev().collect()),
        _ => {}
    }

    let invalid = || FuoError::InvalidPolicy(policy.to_string());
    if policy.len() < 3 || !policy.is_char_boundary(policy.len() - 2) {
        return Err(invalid());
    }
    let (quality, rule) = policy.split_at(policy.len() - 2);
    let quality: Q = quality.parse().map_err(|_| invalid())?;
    let index = all.iter().position(|q| *q == quality).ok_or_else(invalid)?;

    // 比 Q 好的，由近到远
    let better: Vec<Q> = all[..index].iter().rev().copied().collect();
    // 比 Q 差的，由近到远
    let worse: Vec<Q> = all[index + 1..].to_vec();

    let mut result = vec![quality];
    match rule {
        "<>" => result.extend(interleave(&better, &worse)),
        "><" => result.extend(interleave(&worse, &better)),
        ">>" => {
            result.extend(worse);
            result.extend(better);
        }
        "<<" => {
            result.extend(better);
            result.extend(worse);
        }
        _ => return Err(invalid()),
    }
    Ok(result)
}

fn interleave<Q: Copy>(first: &[Q], second: &[Q]) -> Vec<Q> {
    let mut out = Vec::with_capacity(first.len() + second.len());
    for i in 0..first.len().max(second.len()) {
        out.extend(first.get(i));
        out.extend(second.get(i));
    }
    out
}

/// 媒体的种类。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    /// 音频
    #[default]
    Audio,
    /// 视频
    Video,
}

/// 一个可以交给播放后端的媒体。
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Media {
    /// 播放地址，可以是 URL 或本地路径
    pub url: String,
    /// 媒体种类
    pub kind: MediaType,
    /// 格式，例如 `mp3`、`flac`
    pub format: Option<String>,
    /// 比特率（kbps）
    pub bitrate: Option<u32>,
    /// 请求媒体时需要附带的 HTTP 头
    pub http_headers: HashMap<String, String>,
    /// 请求媒体时使用的代理
    pub http_proxy: Option<String>,
}

impl Media {
    /// 用一个地址创建没有任何元数据的音频媒体。
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// 设置格式和比特率。
    pub fn with_format(mut self, format: impl Into<String>, bitrate: Option<u32>) -> Self {
        self.format = Some(format.into());
        self.bitrate = bitrate;
        self
    }
}

/// 根据排序策略从可用的质量中选择媒体。
///
/// 按策略给出的顺序依次尝试可用的质量，返回第一个能获取到媒体的结果。
/// `get_media` 返回 `None` 或出错时会继续尝试下一个。
///
/// # 返回
/// 没有任何可用质量时返回 `(None, None)`。
pub async fn select_media<Q, F, Fut>(
    available: &[Q],
    policy: &str,
    mut get_media: F,
) -> Result<(Option<Media>, Option<Q>)>
where
    Q: Quality,
    F: FnMut(Q) -> Fut,
    Fut: Future<Output = Result<Option<Media>>>,
{
    let sorted = parse_sort_policy::<Q>(policy)?;
    for quality in sorted.into_iter().filter(|q| available.contains(q)) {
        match get_media(quality).await {
            Ok(Some(media)) => {
                debug!("按策略 '{policy}' 选择了 {quality}");
                return Ok((Some(media), Some(quality)));
            }
            Ok(None) => debug!("质量 {quality} 没有可用的媒体"),
            Err(e) => warn!("获取质量 {quality} 的媒体失败: {e}"),
        }
    }
    Ok((None, None))
}
