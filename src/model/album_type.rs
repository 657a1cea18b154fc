//! 专辑类型以及根据专辑名猜测类型的启发式规则。

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// 专辑的类型。
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AlbumType {
    /// 普通专辑
    #[default]
    Standard,
    /// 单曲
    Single,
    /// 迷你专辑
    Ep,
    /// 现场
    Live,
    /// 合辑、精选集
    Compilation,
    /// 纪念、回顾
    Retrospective,
    /// 提供商无法确定的类型
    Unknown,
}

static EP_SINGLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\b|\s|-|\(|\[|（|【)(ep|single)(\b|\s|\)|\]|）|】|$)")
        .expect("编译 EP_SINGLE_RE 失败")
});

static LIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\blive\b|演唱会|音乐会|现场)").expect("编译 LIVE_RE 失败")
});

static COMPILATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\bcompilation\b|\bbest\s+of\b|\bgreatest\s+hits\b|\bcollection\b|精选|合辑|合集)")
        .expect("编译 COMPILATION_RE 失败")
});

static RETROSPECTIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\bretrospective\b|\banniversary\b|周年|回顾|纪念)")
        .expect("编译 RETROSPECTIVE_RE 失败")
});

impl AlbumType {
    /// 根据专辑名猜测专辑类型，无法判断时返回 `Standard`。
    pub fn guess_by_name(name: &str) -> Self {
        if let Some(caps) = EP_SINGLE_RE.captures(name) {
            return if caps[2].eq_ignore_ascii_case("ep") {
                AlbumType::Ep
            } else {
                AlbumType::Single
            };
        }
        if LIVE_RE.is_match(name) {
            return AlbumType::Live;
        }
        if COMPILATION_RE.is_match(name) {
            return AlbumType::Compilation;
        }
        if RETROSPECTIVE_RE.is_match(name) {
            return AlbumType::Retrospective;
        }
        AlbumType::Standard
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guess_by_name() {
        let cases = [
            ("叶惠美", AlbumType::Standard),
            ("Something - EP", AlbumType::Ep),
            ("Hello (Single)", AlbumType::Single),
            ("2004 无与伦比演唱会 Live CD", AlbumType::Live),
            ("Best of Boyzone", AlbumType::Compilation),
            ("十年精选", AlbumType::Compilation),
            ("20th Anniversary Edition", AlbumType::Retrospective),
            ("Epic", AlbumType::Standard),
        ];
        for (name, expected) in cases {
            assert_eq!(AlbumType::guess_by_name(name), expected, "专辑名: {name}");
        }
    }

    #[test]
    fn test_unknown_wire_value() {
        assert_eq!(AlbumType::Unknown.to_string(), "unknown");
        assert_eq!("unknown".parse::<AlbumType>().unwrap(), AlbumType::Unknown);
        assert_eq!(
            serde_json::to_string(&AlbumType::Unknown).unwrap(),
            r#""unknown""#
        );
        assert_eq!(
            serde_json::from_str::<AlbumType>(r#""unknown""#).unwrap(),
            AlbumType::Unknown
        );
        assert_ne!(AlbumType::guess_by_name("unknown"), AlbumType::Unknown);
    }
}
