//! # LRC 歌词解析
//!
//! 把 `[mm:ss.xx]text` 格式的歌词解析为按时间排序的映射，并提供
//! “当前句”的查询。

use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

/// 查询当前句时，向后多看的毫秒数。
pub const LOOKAHEAD_MS: u64 = 300;

/// 用于匹配一个完整的 LRC 歌词行，捕获时间戳部分和文本部分
static LRC_LINE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^((?:\[\d{1,}:\d{2}(?:[.:]\d{1,3})?\])+)(.*)$").expect("未能编译 LRC_LINE_REGEX")
});

/// 用于从一个时间戳组中提取出单个时间戳
static LRC_TIMESTAMP_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[(\d{1,}):(\d{2})(?:[.:](\d{1,3}))?\]").expect("未能编译 LRC_TIMESTAMP_REGEX")
});

/// 用于匹配 [key:value] 格式的元数据标签
static LRC_METADATA_TAG_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[([a-zA-Z_][a-zA-Z0-9_]*):(.*?)\]$").expect("未能编译 LRC_METADATA_TAG_REGEX")
});

/// 解析后的歌词。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Lyric {
    /// 毫秒 -> 歌词文本
    pub sentences: BTreeMap<u64, String>,
    /// `[ar:周杰伦]` 这样的元数据标签
    pub metadata: HashMap<String, String>,
}

fn fraction_to_ms(fraction: &str) -> u64 {
    let value: u64 = fraction.parse().unwrap_or(0);
    match fraction.len() {
        1 => value * 100,
        2 => value * 10,
        _ => value,
    }
}

impl Lyric {
    /// 解析 LRC 文本。无法识别的行会被跳过。
    pub fn parse(content: &str) -> Self {
        let mut lyric = Lyric::default();

        for (line_num, raw_line) in content.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(line_caps) = LRC_LINE_REGEX.captures(line) {
                let timestamps = line_caps.get(1).map_or("", |m| m.as_str());
                let text = line_caps.get(2).map_or("", |m| m.as_str()).trim();

                for ts in LRC_TIMESTAMP_REGEX.captures_iter(timestamps) {
                    let minutes: u64 = ts[1].parse().unwrap_or(0);
                    let seconds: u64 = ts[2].parse().unwrap_or(0);
                    if seconds >= 60 {
                        debug!("LRC 第 {} 行的秒数无效: '{}'", line_num + 1, &ts[0]);
                        continue;
                    }
                    let ms = ts.get(3).map_or(0, |m| fraction_to_ms(m.as_str()));
                    let total = (minutes * 60 + seconds) * 1000 + ms;
                    lyric.sentences.insert(total, text.to_string());
                }
                continue;
            }

            if let Some(meta) = LRC_METADATA_TAG_REGEX.captures(line) {
                lyric
                    .metadata
                    .insert(meta[1].trim().to_string(), meta[2].trim().to_string());
                continue;
            }

            debug!("LRC 第 {} 行无法识别，已跳过: '{line}'", line_num + 1);
        }

        lyric
    }

    /// 是否没有任何歌词句子。
    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }

    /// 位置 `pos_ms` 处的当前句，即时间不晚于 `pos_ms + 300` 的最后一句。
    pub fn current_sentence(&self, pos_ms: u64) -> Option<&str> {
        self.sentences
            .range(..=pos_ms.saturating_add(LOOKAHEAD_MS))
            .next_back()
            .map(|(_, text)| text.as_str())
    }

    /// 把翻译歌词按时间戳附加到每句后面，以 ` / ` 分隔。
    pub fn merge_translation(&mut self, translation: &Lyric) {
        for (ts, text) in self.sentences.iter_mut() {
            if let Some(trans) = translation.sentences.get(ts)
                && !trans.is_empty()
            {
                text.push_str(" / ");
                text.push_str(trans);
            }
        }
    }
}
